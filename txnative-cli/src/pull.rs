use std::{collections::BTreeMap, path::Path, sync::Arc};

use txnative::{CdsClient, Config, FsFileProvider, TranslationMapStorage, types::PullOutcome};

use crate::validation::{validate_locale_code, validate_output_dir};

/// Result of pulling one locale into the output directory.
#[derive(Debug)]
pub enum PulledLocale {
    Written { strings: usize },
    Failed(String),
}

/// Pulls `locales` and writes one storage document per locale under `dir`.
pub async fn run_pull(
    config: &Config,
    locales: &[String],
    dir: &Path,
) -> Result<BTreeMap<String, PulledLocale>, String> {
    if locales.is_empty() {
        return Err("No locales to pull; pass --locales or set app_locales".to_string());
    }
    for locale in locales {
        validate_locale_code(locale)?;
    }
    validate_output_dir(dir)?;

    let client = CdsClient::from_config(config).map_err(|e| e.to_string())?;
    let storage = TranslationMapStorage::with_filename(
        Arc::new(FsFileProvider::new(dir)),
        config.cache.filename.clone(),
    );

    let results = client.pull(locales, &BTreeMap::new()).await;
    let mut report = BTreeMap::new();
    for (locale, result) in results {
        let outcome = match result {
            Ok(PullOutcome::Updated(response)) => {
                let strings = response.strings.len();
                match storage.save_locale(&locale, &response.strings) {
                    Ok(()) => PulledLocale::Written { strings },
                    Err(e) => PulledLocale::Failed(e.to_string()),
                }
            }
            // Without a token the server always answers with content.
            Ok(PullOutcome::NotModified) => PulledLocale::Written { strings: 0 },
            Err(e) => PulledLocale::Failed(e.to_string()),
        };
        report.insert(locale, outcome);
    }
    Ok(report)
}

/// Prints one line per locale; returns `true` when every locale was written.
pub fn print_pull_report(report: &BTreeMap<String, PulledLocale>, dir: &Path) -> bool {
    let mut ok = true;
    for (locale, outcome) in report {
        match outcome {
            PulledLocale::Written { strings } => {
                println!("{}: {} strings -> {}", locale, strings, dir.join(locale).display())
            }
            PulledLocale::Failed(message) => {
                ok = false;
                eprintln!("{}: failed: {}", locale, message);
            }
        }
    }
    ok
}
