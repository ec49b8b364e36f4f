use std::{collections::BTreeSet, sync::Arc};

use arc_swap::ArcSwap;
use parking_lot::Mutex;

use super::{Cache, CacheDecorator};
use crate::{
    error::Error,
    traits::TranslationsProvider,
    types::{LocaleStrings, TranslationMap, UpdatePolicy},
};

/// Seeds the inner cache from translation providers, one locale at a time.
///
/// A locale is loaded the first time it is read or updated through this
/// layer, so provider data always lands before fresher updates for the same
/// locale. Providers are merged in order, later ones overwriting earlier ones.
pub struct ProviderBasedCache {
    inner: Arc<dyn Cache>,
    providers: Vec<Arc<dyn TranslationsProvider>>,
    loaded: ArcSwap<BTreeSet<String>>,
    load_lock: Mutex<()>,
}

impl ProviderBasedCache {
    pub fn new(providers: Vec<Arc<dyn TranslationsProvider>>, inner: Arc<dyn Cache>) -> Self {
        Self {
            inner,
            providers,
            loaded: ArcSwap::from_pointee(BTreeSet::new()),
            load_lock: Mutex::new(()),
        }
    }

    fn ensure_loaded(&self, locale: &str) {
        if self.providers.is_empty() || self.loaded.load().contains(locale) {
            return;
        }
        let _guard = self.load_lock.lock();
        if self.loaded.load().contains(locale) {
            return;
        }

        let mut strings = LocaleStrings::new();
        for provider in &self.providers {
            if let Some(provided) = provider.provide(locale) {
                for (key, info) in provided {
                    strings.insert(key, info);
                }
            }
        }

        if !strings.is_empty() {
            let count = strings.len();
            let mut seed = TranslationMap::new();
            seed.insert(locale, strings);
            match self.inner.update(&seed, UpdatePolicy::MergeKeepExisting) {
                Ok(()) => tracing::debug!(locale, strings = count, "Loaded provided translations"),
                Err(e) => tracing::warn!(locale, "Could not load provided translations: {}", e),
            }
        }

        let mut next = BTreeSet::clone(&self.loaded.load());
        next.insert(locale.to_string());
        self.loaded.store(Arc::new(next));
    }

    fn ensure_all_loaded(&self) {
        let locales: BTreeSet<String> = self
            .providers
            .iter()
            .flat_map(|provider| provider.locales())
            .collect();
        for locale in locales {
            self.ensure_loaded(&locale);
        }
    }
}

impl CacheDecorator for ProviderBasedCache {
    fn inner(&self) -> &dyn Cache {
        self.inner.as_ref()
    }

    fn lookup(&self, locale: &str, key: &str) -> Option<String> {
        self.ensure_loaded(locale);
        self.inner.get(locale, key)
    }

    fn apply_update(&self, map: &TranslationMap, policy: UpdatePolicy) -> Result<(), Error> {
        for locale in map.locales() {
            self.ensure_loaded(&locale);
        }
        self.inner.update(map, policy)
    }

    fn list_locales(&self) -> BTreeSet<String> {
        self.ensure_all_loaded();
        self.inner.locales()
    }

    fn take_snapshot(&self) -> Arc<TranslationMap> {
        self.ensure_all_loaded();
        self.inner.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cache::{MemoryCache, test_support::map},
        storage::{MemoryFileProvider, TranslationMapStorage},
        types::StringInfo,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn strings(pairs: &[(&str, &str)]) -> LocaleStrings {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), StringInfo::new(*v)))
            .collect()
    }

    #[test]
    fn test_later_providers_overwrite_earlier_ones() {
        let bundled: Arc<dyn TranslationsProvider> = Arc::new(|locale: &str| {
            (locale == "fr").then(|| strings(&[("a", "bundled A"), ("b", "bundled B")]))
        });
        let downloaded: Arc<dyn TranslationsProvider> =
            Arc::new(|locale: &str| (locale == "fr").then(|| strings(&[("a", "fresh A")])));

        let cache = ProviderBasedCache::new(vec![bundled, downloaded], Arc::new(MemoryCache::new()));
        assert_eq!(cache.get("fr", "a").as_deref(), Some("fresh A"));
        assert_eq!(cache.get("fr", "b").as_deref(), Some("bundled B"));
        assert_eq!(cache.get("de", "a"), None);
    }

    #[test]
    fn test_each_locale_is_loaded_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let provider: Arc<dyn TranslationsProvider> = Arc::new(move |_: &str| {
            counter.fetch_add(1, Ordering::SeqCst);
            Some(strings(&[("a", "A")]))
        });
        let cache = ProviderBasedCache::new(vec![provider], Arc::new(MemoryCache::new()));

        for _ in 0..3 {
            cache.get("fr", "a");
        }
        cache.get("de", "a");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_updates_win_over_provided_strings() {
        let provider: Arc<dyn TranslationsProvider> =
            Arc::new(|_: &str| Some(strings(&[("a", "old"), ("b", "B")])));
        let cache = ProviderBasedCache::new(vec![provider], Arc::new(MemoryCache::new()));

        cache
            .update(&map(&[("fr", &[("a", "new")])]), UpdatePolicy::MergeOverwrite)
            .unwrap();
        assert_eq!(cache.get("fr", "a").as_deref(), Some("new"));
        assert_eq!(cache.get("fr", "b").as_deref(), Some("B"));
    }

    #[test]
    fn test_snapshot_includes_stored_locales() {
        let files = Arc::new(MemoryFileProvider::new());
        let storage = TranslationMapStorage::new(files);
        storage.save_locale("es", &strings(&[("a", "Hola")])).unwrap();

        let provider: Arc<dyn TranslationsProvider> = Arc::new(storage);
        let cache = ProviderBasedCache::new(vec![provider], Arc::new(MemoryCache::new()));
        assert!(cache.locales().contains("es"));
        assert_eq!(cache.snapshot().get_string("es", "a"), Some("Hola"));
    }
}
