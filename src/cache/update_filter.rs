use std::sync::Arc;

use super::{Cache, CacheDecorator};
use crate::{
    error::Error,
    types::{TranslationMap, UpdatePolicy},
};

/// Applies a fixed update policy regardless of what the caller asks for.
///
/// Under a merging policy, incoming entries with empty text are dropped so an
/// untranslated string never hides an existing translation.
pub struct UpdateFilterCache {
    inner: Arc<dyn Cache>,
    policy: UpdatePolicy,
}

impl UpdateFilterCache {
    pub fn new(policy: UpdatePolicy, inner: Arc<dyn Cache>) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> UpdatePolicy {
        self.policy
    }
}

impl CacheDecorator for UpdateFilterCache {
    fn inner(&self) -> &dyn Cache {
        self.inner.as_ref()
    }

    fn apply_update(&self, map: &TranslationMap, requested: UpdatePolicy) -> Result<(), Error> {
        if requested != self.policy {
            tracing::debug!(%requested, applied = %self.policy, "Overriding update policy");
        }
        match self.policy {
            UpdatePolicy::Replace => self.inner.update(map, self.policy),
            UpdatePolicy::MergeKeepExisting | UpdatePolicy::MergeOverwrite => {
                self.inner.update(&map.without_empty_strings(), self.policy)
            }
        }
    }
}
