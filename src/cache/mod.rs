//! Layered translation cache.
//!
//! A [`MemoryCache`] holds the current [`TranslationMap`] snapshot. Decorators
//! wrap it to veto writes, persist updates, filter incoming strings or load
//! translations from providers on demand. [`CacheBuilder`] assembles a stack
//! from an ordered list of layers.

mod builder;
mod file_output;
mod memory;
mod provider_based;
mod read_only;
mod update_filter;

use std::{collections::BTreeSet, sync::Arc};

use serde::{Deserialize, Serialize};

pub use builder::{CacheBuilder, CacheLayer, CacheStack};
pub use file_output::FileOutputCache;
pub use memory::MemoryCache;
pub use provider_based::ProviderBasedCache;
pub use read_only::ReadOnlyCache;
pub use update_filter::UpdateFilterCache;

use crate::{
    error::Error,
    types::{TranslationMap, UpdatePolicy},
};

/// Read/write access to cached translations.
///
/// A miss is `None`; caches never substitute fallbacks.
pub trait Cache: Send + Sync {
    fn get(&self, locale: &str, key: &str) -> Option<String>;

    /// Applies `map` under `policy`. Readers see either the old or the new
    /// snapshot, never a mix.
    fn update(&self, map: &TranslationMap, policy: UpdatePolicy) -> Result<(), Error>;

    fn locales(&self) -> BTreeSet<String>;

    fn snapshot(&self) -> Arc<TranslationMap>;
}

/// A cache wrapping another one.
///
/// Every hook delegates to [`CacheDecorator::inner`] unless overridden; the
/// blanket impl turns any decorator into a [`Cache`].
pub trait CacheDecorator: Send + Sync {
    fn inner(&self) -> &dyn Cache;

    fn lookup(&self, locale: &str, key: &str) -> Option<String> {
        self.inner().get(locale, key)
    }

    fn apply_update(&self, map: &TranslationMap, policy: UpdatePolicy) -> Result<(), Error> {
        self.inner().update(map, policy)
    }

    fn list_locales(&self) -> BTreeSet<String> {
        self.inner().locales()
    }

    fn take_snapshot(&self) -> Arc<TranslationMap> {
        self.inner().snapshot()
    }
}

impl<T: CacheDecorator> Cache for T {
    fn get(&self, locale: &str, key: &str) -> Option<String> {
        self.lookup(locale, key)
    }

    fn update(&self, map: &TranslationMap, policy: UpdatePolicy) -> Result<(), Error> {
        self.apply_update(map, policy)
    }

    fn locales(&self) -> BTreeSet<String> {
        self.list_locales()
    }

    fn snapshot(&self) -> Arc<TranslationMap> {
        self.take_snapshot()
    }
}

/// Layer identifiers accepted in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheLayerKind {
    ReadOnly,
    UpdateFilter,
    FileOutput,
    ProviderBased,
}
