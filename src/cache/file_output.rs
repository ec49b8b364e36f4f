use std::sync::Arc;

use super::{Cache, CacheDecorator};
use crate::{
    error::Error,
    storage::TranslationMapStorage,
    types::{TranslationMap, UpdatePolicy},
};

/// Persists updates after forwarding them inward.
///
/// When the inner cache accepts the update, the touched locales of the
/// resulting snapshot are written. When it vetoes, the incoming map is written
/// as-is so the next start picks it up, and the veto is returned. Write
/// failures are logged and never undo the in-memory update.
pub struct FileOutputCache {
    inner: Arc<dyn Cache>,
    storage: TranslationMapStorage,
}

impl FileOutputCache {
    pub fn new(storage: TranslationMapStorage, inner: Arc<dyn Cache>) -> Self {
        Self { inner, storage }
    }

    fn persist(&self, map: &TranslationMap) {
        let failures = self
            .storage
            .save(map)
            .into_iter()
            .filter(|(_, outcome)| outcome.is_err())
            .count();
        if failures > 0 {
            tracing::error!(failures, "Could not store updated translations");
        }
    }
}

impl CacheDecorator for FileOutputCache {
    fn inner(&self) -> &dyn Cache {
        self.inner.as_ref()
    }

    fn apply_update(&self, map: &TranslationMap, policy: UpdatePolicy) -> Result<(), Error> {
        match self.inner.update(map, policy) {
            Ok(()) => {
                let snapshot = self.inner.snapshot();
                let touched: TranslationMap = map
                    .iter()
                    .filter_map(|(locale, _)| {
                        snapshot
                            .get(locale)
                            .map(|strings| (locale.clone(), strings.clone()))
                    })
                    .collect();
                self.persist(&touched);
                Ok(())
            }
            Err(e) => {
                tracing::info!("Inner cache declined update, persisting for next start: {}", e);
                self.persist(map);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cache::{MemoryCache, ReadOnlyCache, test_support::map},
        storage::{FileProvider, MemoryFileProvider, PendingWrite},
    };
    use std::io::{self, Read};

    fn storage() -> TranslationMapStorage {
        TranslationMapStorage::new(Arc::new(MemoryFileProvider::new()))
    }

    #[test]
    fn test_persists_merged_snapshot() {
        let storage = storage();
        let base = Arc::new(MemoryCache::with_translations(map(&[
            ("fr", &[("a", "A")]),
            ("de", &[("a", "DA")]),
        ])));
        let cache = FileOutputCache::new(storage.clone(), base);

        cache
            .update(&map(&[("fr", &[("b", "B")])]), UpdatePolicy::MergeOverwrite)
            .unwrap();

        let stored = storage.load_locale("fr").unwrap();
        assert_eq!(stored.get("a"), Some("A"));
        assert_eq!(stored.get("b"), Some("B"));
        assert_eq!(storage.load_locale("de"), None);
    }

    #[test]
    fn test_veto_still_persists_incoming_map() {
        let storage = storage();
        let base = Arc::new(MemoryCache::with_translations(map(&[("fr", &[("a", "A")])])));
        let cache = FileOutputCache::new(storage.clone(), Arc::new(ReadOnlyCache::new(base)));

        let result = cache.update(&map(&[("fr", &[("a", "A2")])]), UpdatePolicy::Replace);
        assert!(matches!(result, Err(Error::CacheWriteRejected)));
        assert_eq!(cache.get("fr", "a").as_deref(), Some("A"));
        assert_eq!(storage.load_locale("fr").unwrap().get("a"), Some("A2"));
    }

    struct BrokenDisk;

    impl FileProvider for BrokenDisk {
        fn open_read(&self, _path: &str) -> Result<Box<dyn Read + Send>, Error> {
            Err(Error::Storage(io::Error::other("disk unplugged")))
        }

        fn open_write(&self, _path: &str) -> Result<Box<dyn PendingWrite>, Error> {
            Err(Error::Storage(io::Error::other("disk unplugged")))
        }

        fn list(&self, _dir: &str) -> Result<Vec<String>, Error> {
            Ok(Vec::new())
        }

        fn delete(&self, _path: &str) -> Result<(), Error> {
            Ok(())
        }
    }

    #[test]
    fn test_persist_failure_keeps_memory_update() {
        let storage = TranslationMapStorage::new(Arc::new(BrokenDisk));
        let cache = FileOutputCache::new(storage, Arc::new(MemoryCache::new()));

        cache
            .update(&map(&[("fr", &[("a", "A")])]), UpdatePolicy::Replace)
            .unwrap();
        assert_eq!(cache.get("fr", "a").as_deref(), Some("A"));
    }
}
