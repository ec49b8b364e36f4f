//! The [`TxNative`] facade: translation lookups, refreshes and pushes behind
//! one explicit context.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::{
    cache::{Cache, CacheBuilder, CacheLayerKind},
    cds::{CdsClient, JobPoller, Transport},
    config::{Config, RefreshConfig},
    error::Error,
    locale::LocaleState,
    missing_policy::{
        BundledStringsPolicy, CompositePolicy, MissingPolicy, MissingPolicyKind,
        PlatformFallbackPolicy,
    },
    plural_rules::category_for,
    storage::{FileProvider, FsFileProvider, TranslationMapStorage},
    sync::{RefreshReport, SyncOrchestrator},
    traits::TranslationsProvider,
    types::{PluralCategory, PluralForms, PushPayload, TxJobStatus},
};

const TEST_MODE_PREFIX: &str = "test: ";

/// Assembles a [`TxNative`] from a [`Config`] plus host-supplied pieces.
///
/// Anything not supplied is derived from the configuration: a `reqwest`
/// transport, filesystem storage under `cache.storage_dir` and
/// `cache.bundled_dir`, and the configured missing-policy chain.
pub struct TxNativeBuilder {
    config: Config,
    system_locale: Option<String>,
    transport: Option<Arc<dyn Transport>>,
    storage: Option<Arc<dyn FileProvider>>,
    bundled: Option<Arc<dyn FileProvider>>,
    platform: Option<PlatformFallbackPolicy>,
    missing_policy: Option<Arc<dyn MissingPolicy>>,
}

impl TxNativeBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            system_locale: None,
            transport: None,
            storage: None,
            bundled: None,
            platform: None,
            missing_policy: None,
        }
    }

    /// The locale the host system reports; defaults to the source locale.
    pub fn system_locale(mut self, locale: impl Into<String>) -> Self {
        self.system_locale = Some(locale.into());
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Where downloaded translations are kept.
    pub fn storage(mut self, provider: Arc<dyn FileProvider>) -> Self {
        self.storage = Some(provider);
        self
    }

    /// Translations shipped with the application.
    pub fn bundled(mut self, provider: Arc<dyn FileProvider>) -> Self {
        self.bundled = Some(provider);
        self
    }

    /// Host lookup backing the `platform` entry of the missing-policy chain.
    pub fn platform_fallback(mut self, policy: PlatformFallbackPolicy) -> Self {
        self.platform = Some(policy);
        self
    }

    /// Replaces the configured missing-policy chain.
    pub fn missing_policy(mut self, policy: Arc<dyn MissingPolicy>) -> Self {
        self.missing_policy = Some(policy);
        self
    }

    pub fn build(self) -> Result<TxNative, Error> {
        let config = self.config;
        config.validate()?;

        let filename = config.cache.filename.clone();
        let open = |explicit: Option<Arc<dyn FileProvider>>, dir: Option<&std::path::PathBuf>| {
            explicit
                .or_else(|| {
                    dir.map(|dir| Arc::new(FsFileProvider::new(dir.clone())) as Arc<dyn FileProvider>)
                })
                .map(|provider| TranslationMapStorage::with_filename(provider, filename.clone()))
        };
        let storage = open(self.storage, config.cache.storage_dir.as_ref());
        let bundled = open(self.bundled, config.cache.bundled_dir.as_ref());

        let bundled_policy = match &bundled {
            Some(bundled) if config.missing_policy.chain.contains(&MissingPolicyKind::Bundled) => {
                Some(BundledStringsPolicy::new(bundled.load()))
            }
            _ => None,
        };

        let mut providers: Vec<Arc<dyn TranslationsProvider>> = Vec::new();
        if let Some(bundled) = bundled {
            providers.push(Arc::new(bundled));
        }
        if let Some(storage) = &storage {
            providers.push(Arc::new(storage.clone()));
        }

        let stack = CacheBuilder::from_config(&config.cache, storage.clone(), providers)?.build();
        let writes_files = stack.layers().contains(&CacheLayerKind::FileOutput);
        let cache: Arc<dyn Cache> = Arc::new(stack);

        let client = match self.transport {
            Some(transport) => CdsClient::from_config_with_transport(&config, transport),
            None => CdsClient::from_config(&config)?,
        };

        let system_locale = self
            .system_locale
            .unwrap_or_else(|| config.source_locale.clone());
        let locale = LocaleState::new(
            Some(&config.source_locale),
            &config.app_locales,
            &system_locale,
        );

        let mut sync = SyncOrchestrator::new(client, cache.clone(), locale.app_locales().to_vec())
            .with_policy(config.cache.update_policy);
        if let (Some(storage), false) = (storage, writes_files) {
            sync = sync.with_storage(storage);
        }

        let missing_policy = match self.missing_policy {
            Some(policy) => policy,
            None => Arc::new(CompositePolicy::from_config(
                &config.missing_policy,
                self.platform,
                bundled_policy,
            )),
        };

        tracing::debug!(
            source = locale.source_locale(),
            locales = ?locale.app_locales(),
            "Initialized localization engine"
        );

        Ok(TxNative {
            poller: JobPoller::from_config(&config.polling),
            config,
            locale,
            cache,
            sync,
            missing_policy,
        })
    }
}

/// Entry point for applications: resolves strings from the cache, falls back
/// to the missing-policy chain, and keeps translations fresh on request.
pub struct TxNative {
    config: Config,
    locale: LocaleState,
    cache: Arc<dyn Cache>,
    sync: SyncOrchestrator,
    missing_policy: Arc<dyn MissingPolicy>,
    poller: JobPoller,
}

impl std::fmt::Debug for TxNative {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TxNative")
            .field("locale", &self.locale)
            .field("sync", &self.sync)
            .finish_non_exhaustive()
    }
}

impl TxNative {
    pub fn builder(config: Config) -> TxNativeBuilder {
        TxNativeBuilder::new(config)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cache(&self) -> &Arc<dyn Cache> {
        &self.cache
    }

    pub fn locale_state(&self) -> &LocaleState {
        &self.locale
    }

    /// Text to show for `key` in `locale`. Never fails.
    pub fn translate(&self, key: &str, locale: &str, source: &str) -> String {
        if self.config.test_mode {
            return format!("{}{}", TEST_MODE_PREFIX, source);
        }

        let locale = self.locale.resolve(locale);
        let cached = self.cache.get(&locale, key).filter(|text| !text.is_empty());
        if locale == self.locale.source_locale() {
            return cached.unwrap_or_else(|| source.to_string());
        }

        match cached {
            Some(text) => text,
            None => {
                tracing::debug!(key, locale = %locale, "Missing translation");
                self.missing_policy.resolve(source, key, &locale)
            }
        }
    }

    /// [`TxNative::translate`] in the active locale.
    pub fn translate_current(&self, key: &str, source: &str) -> String {
        self.translate(key, &self.locale.current_locale(), source)
    }

    /// Picks the plural form for `quantity` from an ICU plural string.
    ///
    /// The cached translation's form for the locale's category wins, then its
    /// `other` form. Otherwise the matching form of `source_icu` goes through
    /// the missing-policy chain.
    pub fn translate_plural(&self, key: &str, locale: &str, source_icu: &str, quantity: u64) -> String {
        if self.config.test_mode {
            return format!("{}{}", TEST_MODE_PREFIX, source_icu);
        }

        let locale = self.locale.resolve(locale);
        let category = category_for(&locale, quantity);
        let translated = self
            .cache
            .get(&locale, key)
            .filter(|text| !text.is_empty())
            .and_then(|icu| match PluralForms::from_icu(&icu) {
                Ok(forms) => pick_form(&forms, category),
                Err(e) => {
                    tracing::warn!(key, locale = %locale, "Unusable plural translation: {}", e);
                    None
                }
            });
        if let Some(text) = translated {
            return text;
        }

        let source_category = category_for(self.locale.source_locale(), quantity);
        let source_form = PluralForms::from_icu(source_icu)
            .ok()
            .and_then(|forms| pick_form(&forms, source_category))
            .unwrap_or_else(|| source_icu.to_string());
        if locale == self.locale.source_locale() {
            return source_form;
        }
        self.missing_policy.resolve(&source_form, key, &locale)
    }

    /// Pulls every supported locale and publishes what changed.
    pub async fn refresh(&self) -> RefreshReport {
        self.sync.refresh().await
    }

    pub async fn refresh_locale(&self, locale: &str) -> RefreshReport {
        self.sync.refresh_locale(&self.locale.resolve(locale)).await
    }

    /// When the host should call [`TxNative::refresh`].
    pub fn refresh_policy(&self) -> RefreshConfig {
        self.config.refresh
    }

    /// Pins the active locale; `None` follows the system locale again.
    pub fn set_locale(&self, locale: Option<&str>) {
        self.locale.set_locale(locale);
    }

    pub fn notify_locale_changed(&self, system_locale: &str) {
        self.locale.notify_locale_changed(system_locale);
    }

    pub fn current_locale(&self) -> String {
        self.locale.current_locale()
    }

    pub fn supported_locales(&self) -> &[String] {
        self.locale.app_locales()
    }

    /// Runs `observer(active, resolved)` whenever the active locale changes.
    pub fn on_locale_changed<F>(&self, observer: F)
    where
        F: Fn(&str, &str) + Send + Sync + 'static,
    {
        self.locale.subscribe(observer);
    }

    /// Uploads source strings and waits for the push job to settle.
    pub async fn push(
        &self,
        payload: &PushPayload,
        cancel: &CancellationToken,
    ) -> Result<TxJobStatus, Error> {
        self.sync
            .client()
            .push_and_wait(payload, &self.poller, cancel)
            .await
    }
}

fn pick_form(forms: &PluralForms, category: PluralCategory) -> Option<String> {
    forms
        .get(category)
        .or_else(|| forms.get(PluralCategory::Other))
        .map(str::to_string)
}
