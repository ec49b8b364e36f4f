//! Builds the engine configuration from an optional TOML file plus
//! command-line overrides.

use std::path::Path;

use txnative::Config;

#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub url: Option<String>,
    pub token: Option<String>,
    pub secret: Option<String>,
}

pub fn load_config(path: Option<&Path>, overrides: &Overrides) -> Result<Config, String> {
    let mut config = match path {
        Some(path) => Config::read_file(path)
            .map_err(|e| format!("Cannot load config {}: {}", path.display(), e))?,
        None => Config::default(),
    };

    if let Some(url) = &overrides.url {
        config.cds_host = url.clone();
    }
    if let Some(token) = &overrides.token {
        config.token = token.clone();
    }
    if let Some(secret) = &overrides.secret {
        config.secret = Some(secret.clone());
    }

    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}
