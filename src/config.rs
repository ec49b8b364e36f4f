//! Runtime configuration, loaded from TOML.
//!
//! ```toml
//! token = "1/abc"
//! source_locale = "en"
//! app_locales = ["fr", "de"]
//!
//! [cache]
//! update_policy = "merge_overwrite"
//! layers = ["provider_based", "update_filter"]
//!
//! [missing_policy]
//! chain = ["pseudo", "wrapped"]
//! ```

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use unic_langid::LanguageIdentifier;

use crate::{
    cache::CacheLayerKind, error::Error, missing_policy::MissingPolicyKind,
    storage::DEFAULT_FILENAME, types::UpdatePolicy,
};

pub const DEFAULT_CDS_HOST: &str = "https://cds.svc.transifex.net";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub cds_host: String,
    /// Project token; required.
    pub token: String,
    /// Only needed for pushing source strings.
    pub secret: Option<String>,
    pub source_locale: String,
    /// Locales the application supports; the source locale is always added.
    pub app_locales: Vec<String>,
    /// Only pull strings carrying all of these tags.
    pub tags: Vec<String>,
    /// `translate` returns `"test: " + source` when set.
    pub test_mode: bool,
    pub refresh: RefreshConfig,
    pub cache: CacheConfig,
    pub missing_policy: MissingPolicyConfig,
    pub http: HttpConfig,
    pub polling: PollingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cds_host: DEFAULT_CDS_HOST.to_string(),
            token: String::new(),
            secret: None,
            source_locale: "en".to_string(),
            app_locales: Vec::new(),
            tags: Vec::new(),
            test_mode: false,
            refresh: RefreshConfig::default(),
            cache: CacheConfig::default(),
            missing_policy: MissingPolicyConfig::default(),
            http: HttpConfig::default(),
            polling: PollingConfig::default(),
        }
    }
}

/// When the host should trigger a refresh. The engine never schedules one itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RefreshConfig {
    pub on_startup: bool,
    /// Periodic refresh interval; `None` disables periodic refresh.
    pub interval_secs: Option<u64>,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            on_startup: true,
            interval_secs: None,
        }
    }
}

impl RefreshConfig {
    pub fn interval(&self) -> Option<Duration> {
        self.interval_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    pub update_policy: UpdatePolicy,
    /// Decorators wrapped around the memory cache, outermost first.
    pub layers: Vec<CacheLayerKind>,
    pub filename: String,
    /// Where downloaded translations are stored.
    pub storage_dir: Option<PathBuf>,
    /// Translations shipped with the application, read before downloaded ones.
    pub bundled_dir: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            update_policy: UpdatePolicy::MergeOverwrite,
            layers: vec![CacheLayerKind::ProviderBased, CacheLayerKind::UpdateFilter],
            filename: DEFAULT_FILENAME.to_string(),
            storage_dir: None,
            bundled_dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct MissingPolicyConfig {
    /// Policies applied in order, each one receiving the previous output.
    pub chain: Vec<MissingPolicyKind>,
    pub wrap_start: String,
    pub wrap_end: String,
}

impl Default for MissingPolicyConfig {
    fn default() -> Self {
        Self {
            chain: vec![MissingPolicyKind::Source],
            wrap_start: "[".to_string(),
            wrap_end: "]".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    /// Retries after the first attempt of a pull.
    pub max_retries: u32,
    /// Base delay of the exponential retry backoff.
    pub retry_delay_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_retries: 3,
            retry_delay_ms: 500,
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct PollingConfig {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub max_attempts: u32,
    pub timeout_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 1_000,
            max_delay_ms: 10_000,
            max_attempts: 30,
            timeout_secs: 120,
        }
    }
}

impl PollingConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            ..Self::default()
        }
    }

    /// Parses and validates a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, Error> {
        let config: Config = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let config = Self::read_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parses a TOML file without validating it, for callers that layer
    /// overrides on top before calling [`Config::validate`].
    pub fn read_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.token.trim().is_empty() {
            return Err(Error::config_error("token must not be empty"));
        }

        let url = reqwest::Url::parse(&self.cds_host)
            .map_err(|e| Error::InvalidUrl(format!("{}: {}", self.cds_host, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::InvalidUrl(format!(
                "{}: scheme must be http or https",
                self.cds_host
            )));
        }

        for locale in std::iter::once(&self.source_locale).chain(self.app_locales.iter()) {
            if locale.replace('_', "-").parse::<LanguageIdentifier>().is_err() {
                return Err(Error::config_error(format!(
                    "invalid locale code: {:?}",
                    locale
                )));
            }
        }

        if self.cache.filename.is_empty() || self.cache.filename.contains('/') {
            return Err(Error::config_error(format!(
                "invalid cache filename: {:?}",
                self.cache.filename
            )));
        }

        if self.polling.max_attempts == 0 {
            return Err(Error::config_error("polling.max_attempts must be at least 1"));
        }
        if self.polling.initial_delay_ms > self.polling.max_delay_ms {
            return Err(Error::config_error(
                "polling.initial_delay_ms must not exceed polling.max_delay_ms",
            ));
        }
        Ok(())
    }
}
