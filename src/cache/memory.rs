use std::{collections::BTreeSet, sync::Arc};

use arc_swap::ArcSwap;
use parking_lot::Mutex;

use super::Cache;
use crate::{
    error::Error,
    types::{TranslationMap, UpdatePolicy},
};

/// Base store of a cache stack.
///
/// Readers load the current snapshot without locking; writers build the next
/// map and swap it in under a per-instance lock.
#[derive(Debug)]
pub struct MemoryCache {
    current: ArcSwap<TranslationMap>,
    write_lock: Mutex<()>,
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::with_translations(TranslationMap::new())
    }

    pub fn with_translations(map: TranslationMap) -> Self {
        Self {
            current: ArcSwap::from_pointee(map),
            write_lock: Mutex::new(()),
        }
    }
}

impl Cache for MemoryCache {
    fn get(&self, locale: &str, key: &str) -> Option<String> {
        self.current
            .load()
            .get_string(locale, key)
            .map(str::to_string)
    }

    fn update(&self, map: &TranslationMap, policy: UpdatePolicy) -> Result<(), Error> {
        let _guard = self.write_lock.lock();
        let next = self.current.load().merged(map, policy);
        self.current.store(Arc::new(next));
        tracing::debug!(locales = map.len(), %policy, "Memory cache updated");
        Ok(())
    }

    fn locales(&self) -> BTreeSet<String> {
        self.current.load().locales()
    }

    fn snapshot(&self) -> Arc<TranslationMap> {
        self.current.load_full()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::test_support::map;
    use std::thread;

    #[test]
    fn test_get_miss_is_none() {
        let cache = MemoryCache::new();
        assert_eq!(cache.get("fr", "hello"), None);
        assert!(cache.locales().is_empty());
    }

    #[test]
    fn test_update_policies() {
        let cache = MemoryCache::with_translations(map(&[("fr", &[("a", "A"), ("b", "B")])]));

        cache
            .update(&map(&[("fr", &[("a", "A2")])]), UpdatePolicy::MergeKeepExisting)
            .unwrap();
        assert_eq!(cache.get("fr", "a").as_deref(), Some("A"));

        cache
            .update(&map(&[("fr", &[("a", "A3")])]), UpdatePolicy::MergeOverwrite)
            .unwrap();
        assert_eq!(cache.get("fr", "a").as_deref(), Some("A3"));
        assert_eq!(cache.get("fr", "b").as_deref(), Some("B"));

        cache
            .update(&map(&[("fr", &[("c", "C")])]), UpdatePolicy::Replace)
            .unwrap();
        assert_eq!(cache.get("fr", "a"), None);
        assert_eq!(cache.get("fr", "c").as_deref(), Some("C"));
    }

    #[test]
    fn test_snapshot_is_stable_across_updates() {
        let cache = MemoryCache::with_translations(map(&[("fr", &[("a", "A")])]));
        let before = cache.snapshot();
        cache
            .update(&map(&[("fr", &[("a", "B")])]), UpdatePolicy::Replace)
            .unwrap();
        assert_eq!(before.get_string("fr", "a"), Some("A"));
        assert_eq!(cache.snapshot().get_string("fr", "a"), Some("B"));
    }

    #[test]
    fn test_concurrent_updates_are_not_lost() {
        let cache = Arc::new(MemoryCache::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    let key = format!("key{}", i);
                    let incoming = map(&[("fr", &[(key.as_str(), "x")])]);
                    cache.update(&incoming, UpdatePolicy::MergeOverwrite).unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cache.snapshot().get("fr").map(|s| s.len()), Some(8));
    }
}
