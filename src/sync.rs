//! Pulls translations from the CDS and publishes them to the cache.

use std::{collections::BTreeMap, sync::Arc};

use parking_lot::Mutex;

use crate::{
    cache::Cache,
    cds::CdsClient,
    error::Error,
    storage::TranslationMapStorage,
    types::{PullOutcome, TranslationMap, UpdatePolicy},
};

/// What happened to one locale during a refresh.
#[derive(Debug)]
pub enum LocaleRefresh {
    Updated { strings: usize },
    NotModified,
    Failed { error: Error },
}

impl LocaleRefresh {
    pub fn is_failed(&self) -> bool {
        matches!(self, LocaleRefresh::Failed { .. })
    }
}

#[derive(Debug, Default)]
pub struct RefreshReport {
    pub locales: BTreeMap<String, LocaleRefresh>,
    /// Locales that were pulled but could not be written to storage.
    pub persist_errors: BTreeMap<String, Error>,
    /// Set when the cache refused the update, e.g. a read-only stack.
    pub cache_error: Option<Error>,
}

impl RefreshReport {
    /// True when no locale failed to pull. Storage and cache errors are
    /// reported separately.
    pub fn is_success(&self) -> bool {
        !self.locales.values().any(LocaleRefresh::is_failed)
    }

    pub fn updated(&self) -> impl Iterator<Item = &str> {
        self.locales.iter().filter_map(|(locale, outcome)| {
            matches!(outcome, LocaleRefresh::Updated { .. }).then_some(locale.as_str())
        })
    }

    pub fn failed(&self) -> impl Iterator<Item = (&str, &Error)> {
        self.locales.iter().filter_map(|(locale, outcome)| match outcome {
            LocaleRefresh::Failed { error } => Some((locale.as_str(), error)),
            _ => None,
        })
    }
}

/// Keeps the cache in sync with the CDS.
///
/// Validation tokens are remembered per locale for the lifetime of the
/// orchestrator, so unchanged locales cost a `304`.
pub struct SyncOrchestrator {
    client: CdsClient,
    cache: Arc<dyn Cache>,
    storage: Option<TranslationMapStorage>,
    locales: Vec<String>,
    policy: UpdatePolicy,
    tokens: Mutex<BTreeMap<String, String>>,
}

impl std::fmt::Debug for SyncOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncOrchestrator")
            .field("client", &self.client)
            .field("locales", &self.locales)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl SyncOrchestrator {
    pub fn new(client: CdsClient, cache: Arc<dyn Cache>, locales: Vec<String>) -> Self {
        Self {
            client,
            cache,
            storage: None,
            locales,
            policy: UpdatePolicy::default(),
            tokens: Mutex::new(BTreeMap::new()),
        }
    }

    /// Persists updated locales before they are published.
    pub fn with_storage(mut self, storage: TranslationMapStorage) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn with_policy(mut self, policy: UpdatePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn client(&self) -> &CdsClient {
        &self.client
    }

    pub fn locales(&self) -> &[String] {
        &self.locales
    }

    /// Last validation token received for `locale`. Content served without
    /// one clears it, so the next pull asks for the full document.
    pub fn token(&self, locale: &str) -> Option<String> {
        self.tokens.lock().get(locale).cloned()
    }

    /// Pulls every configured locale.
    pub async fn refresh(&self) -> RefreshReport {
        self.refresh_locales(&self.locales).await
    }

    /// Pulls a single locale.
    pub async fn refresh_locale(&self, locale: &str) -> RefreshReport {
        self.refresh_locales(&[locale.to_string()]).await
    }

    async fn refresh_locales(&self, locales: &[String]) -> RefreshReport {
        let tokens = self.tokens.lock().clone();
        let results = self.client.pull(locales, &tokens).await;

        let mut report = RefreshReport::default();
        let mut updated = TranslationMap::new();
        let mut fresh_tokens = Vec::new();
        for (locale, result) in results {
            let outcome = match result {
                Ok(PullOutcome::Updated(response)) => {
                    fresh_tokens.push((locale.clone(), response.token));
                    let strings = response.strings.len();
                    updated.insert(locale.clone(), response.strings);
                    LocaleRefresh::Updated { strings }
                }
                Ok(PullOutcome::NotModified) => LocaleRefresh::NotModified,
                Err(error) => {
                    tracing::warn!(locale = %locale, "Failed to refresh translations: {}", error);
                    LocaleRefresh::Failed { error }
                }
            };
            report.locales.insert(locale, outcome);
        }

        if updated.is_empty() {
            tracing::debug!("No translations changed");
            return report;
        }

        if let Some(storage) = &self.storage {
            for (locale, outcome) in storage.save(&updated) {
                if let Err(error) = outcome {
                    report.persist_errors.insert(locale, error);
                }
            }
        }

        match self.cache.update(&updated, self.policy) {
            Ok(()) => {
                // Tokens only advance once the content is published; a vetoed
                // update is pulled again in full next time.
                let mut tokens = self.tokens.lock();
                for (locale, token) in fresh_tokens {
                    match token {
                        Some(token) => {
                            tokens.insert(locale, token);
                        }
                        // Content without a validator no longer matches the old one.
                        None => {
                            tokens.remove(&locale);
                        }
                    }
                }
                drop(tokens);
                tracing::info!(locales = updated.len(), "Published refreshed translations");
            }
            Err(error) => {
                tracing::warn!("Cache rejected refreshed translations: {}", error);
                report.cache_error = Some(error);
            }
        }
        report
    }
}
