use std::{collections::BTreeSet, sync::Arc};

use parking_lot::Mutex;

use super::{
    Cache, CacheLayerKind, FileOutputCache, MemoryCache, ProviderBasedCache, ReadOnlyCache,
    UpdateFilterCache,
};
use crate::{
    config::CacheConfig,
    error::Error,
    storage::TranslationMapStorage,
    traits::TranslationsProvider,
    types::{TranslationMap, UpdatePolicy},
};

/// One decorator of a cache stack, with what it needs to be built.
pub enum CacheLayer {
    ReadOnly,
    UpdateFilter(UpdatePolicy),
    FileOutput(TranslationMapStorage),
    ProviderBased(Vec<Arc<dyn TranslationsProvider>>),
}

impl CacheLayer {
    pub fn kind(&self) -> CacheLayerKind {
        match self {
            CacheLayer::ReadOnly => CacheLayerKind::ReadOnly,
            CacheLayer::UpdateFilter(_) => CacheLayerKind::UpdateFilter,
            CacheLayer::FileOutput(_) => CacheLayerKind::FileOutput,
            CacheLayer::ProviderBased(_) => CacheLayerKind::ProviderBased,
        }
    }

    fn wrap(self, inner: Arc<dyn Cache>) -> Arc<dyn Cache> {
        match self {
            CacheLayer::ReadOnly => Arc::new(ReadOnlyCache::new(inner)),
            CacheLayer::UpdateFilter(policy) => Arc::new(UpdateFilterCache::new(policy, inner)),
            CacheLayer::FileOutput(storage) => Arc::new(FileOutputCache::new(storage, inner)),
            CacheLayer::ProviderBased(providers) => {
                Arc::new(ProviderBasedCache::new(providers, inner))
            }
        }
    }
}

/// Assembles decorators around a base cache.
///
/// Layers are listed from the outermost to the innermost.
pub struct CacheBuilder {
    base: Arc<dyn Cache>,
    layers: Vec<CacheLayer>,
}

impl Default for CacheBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheBuilder {
    pub fn new() -> Self {
        Self::with_base(Arc::new(MemoryCache::new()))
    }

    pub fn with_base(base: Arc<dyn Cache>) -> Self {
        Self {
            base,
            layers: Vec::new(),
        }
    }

    /// Adds a layer inside the ones added before it.
    pub fn layer(mut self, layer: CacheLayer) -> Self {
        self.layers.push(layer);
        self
    }

    /// Providers seed each locale on first use, updates go through `policy`.
    pub fn standard(policy: UpdatePolicy, providers: Vec<Arc<dyn TranslationsProvider>>) -> Self {
        Self::new()
            .layer(CacheLayer::ProviderBased(providers))
            .layer(CacheLayer::UpdateFilter(policy))
    }

    /// Maps configured layer kinds to layers.
    ///
    /// `storage` backs a `file_output` layer; `providers` feed a
    /// `provider_based` layer.
    pub fn from_config(
        config: &CacheConfig,
        storage: Option<TranslationMapStorage>,
        providers: Vec<Arc<dyn TranslationsProvider>>,
    ) -> Result<Self, Error> {
        let mut builder = Self::new();
        for kind in &config.layers {
            let layer = match kind {
                CacheLayerKind::ReadOnly => CacheLayer::ReadOnly,
                CacheLayerKind::UpdateFilter => CacheLayer::UpdateFilter(config.update_policy),
                CacheLayerKind::FileOutput => {
                    CacheLayer::FileOutput(storage.clone().ok_or_else(|| {
                        Error::config_error("the file_output cache layer needs a storage directory")
                    })?)
                }
                CacheLayerKind::ProviderBased => CacheLayer::ProviderBased(providers.clone()),
            };
            builder = builder.layer(layer);
        }
        Ok(builder)
    }

    pub fn build(self) -> CacheStack {
        let kinds = self.layers.iter().map(CacheLayer::kind).collect();
        let top = self
            .layers
            .into_iter()
            .rev()
            .fold(self.base, |inner, layer| layer.wrap(inner));
        CacheStack {
            top,
            kinds,
            update_lock: Mutex::new(()),
        }
    }
}

/// A built cache stack. Updates are serialized; reads go straight to the
/// outermost layer.
pub struct CacheStack {
    top: Arc<dyn Cache>,
    kinds: Vec<CacheLayerKind>,
    update_lock: Mutex<()>,
}

impl CacheStack {
    /// Layer kinds, outermost first.
    pub fn layers(&self) -> &[CacheLayerKind] {
        &self.kinds
    }
}

impl Cache for CacheStack {
    fn get(&self, locale: &str, key: &str) -> Option<String> {
        self.top.get(locale, key)
    }

    fn update(&self, map: &TranslationMap, policy: UpdatePolicy) -> Result<(), Error> {
        let _guard = self.update_lock.lock();
        self.top.update(map, policy)
    }

    fn locales(&self) -> BTreeSet<String> {
        self.top.locales()
    }

    fn snapshot(&self) -> Arc<TranslationMap> {
        self.top.snapshot()
    }
}
