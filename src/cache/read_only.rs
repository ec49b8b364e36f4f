use std::sync::Arc;

use super::{Cache, CacheDecorator};
use crate::{
    error::Error,
    types::{TranslationMap, UpdatePolicy},
};

/// Rejects every update; reads pass through.
pub struct ReadOnlyCache {
    inner: Arc<dyn Cache>,
}

impl ReadOnlyCache {
    pub fn new(inner: Arc<dyn Cache>) -> Self {
        Self { inner }
    }
}

impl CacheDecorator for ReadOnlyCache {
    fn inner(&self) -> &dyn Cache {
        self.inner.as_ref()
    }

    fn apply_update(&self, map: &TranslationMap, _policy: UpdatePolicy) -> Result<(), Error> {
        tracing::warn!(locales = map.len(), "Update rejected by read-only cache");
        Err(Error::CacheWriteRejected)
    }
}
