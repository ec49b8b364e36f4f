use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use txnative::{PushPayload, storage::DEFAULT_DIRECTORY};
use txnative_cli::{
    Overrides, expand_input_globs, load_config,
    pull::{print_pull_report, run_pull},
    push::{build_payload, print_job_summary, run_push},
    validation::split_list,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// CDS host to talk to
    #[arg(long, global = true)]
    url: Option<String>,

    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Project token
    #[arg(long, global = true, env = "TRANSIFEX_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Project secret, needed to push
    #[arg(long, global = true, env = "TRANSIFEX_SECRET", hide_env_values = true)]
    secret: Option<String>,

    /// Log requests and retries
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    commands: Commands,
}

/// Supported subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Push source strings from JSON files.
    Push {
        /// Files or glob patterns of JSON source documents
        #[arg(required = true)]
        files: Vec<String>,

        /// Tags added to every pushed string (comma-separated or repeated)
        #[arg(long, value_name = "TAGS")]
        append_tags: Vec<String>,

        /// Replace every remote source string with the pushed ones
        #[arg(long)]
        purge: bool,

        /// Print the payload instead of pushing it
        #[arg(long)]
        dry_run: bool,
    },

    /// Pull translations into per-locale storage documents.
    Pull {
        /// Locales to pull (comma-separated or repeated); defaults to the configured app locales
        #[arg(short, long)]
        locales: Vec<String>,

        /// Output directory; defaults to the configured storage directory
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },

    /// Delete every remote source string.
    Clear,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(args: Args) -> Result<(), String> {
    let overrides = Overrides {
        url: args.url,
        token: args.token,
        secret: args.secret,
    };

    match args.commands {
        Commands::Push {
            files,
            append_tags,
            purge,
            dry_run,
        } => {
            let files = expand_input_globs(&files)?;
            let payload = build_payload(&files, &split_list(&append_tags), purge)?;
            if dry_run {
                let json = serde_json::to_string_pretty(&payload).map_err(|e| e.to_string())?;
                println!("{}", json);
                return Ok(());
            }

            let config = load_config(args.config.as_deref(), &overrides)?;
            println!("Pushing {} source strings", payload.data.len());
            let status = run_push(&config, &payload).await?;
            print_job_summary(&status);
            Ok(())
        }
        Commands::Pull { locales, dir } => {
            let config = load_config(args.config.as_deref(), &overrides)?;
            let locales = match split_list(&locales) {
                requested if requested.is_empty() => config.app_locales.clone(),
                requested => requested,
            };
            let dir = dir
                .or_else(|| config.cache.storage_dir.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DIRECTORY));

            let report = run_pull(&config, &locales, &dir).await?;
            if print_pull_report(&report, &dir) {
                Ok(())
            } else {
                Err("Some locales could not be pulled".to_string())
            }
        }
        Commands::Clear => {
            let config = load_config(args.config.as_deref(), &overrides)?;
            let status = run_push(&config, &PushPayload::purge_all()).await?;
            print_job_summary(&status);
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    if let Err(e) = run(args).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
