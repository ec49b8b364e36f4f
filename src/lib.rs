//! Localization sync and caching engine.
//!
//! Pulls translations from a Content Delivery Service (CDS), keeps them in a
//! layered cache backed by per-locale JSON documents, and resolves missing
//! strings through a configurable policy chain. [`TxNative`] ties it together.

#![forbid(unsafe_code)]

pub mod cache;
pub mod cds;
pub mod config;
pub mod error;
pub mod locale;
pub mod missing_policy;
pub mod native;
pub mod plural_rules;
pub mod storage;
pub mod sync;
pub mod traits;
pub mod types;

// Re-export most used types for easy consumption
pub use crate::{
    cache::{Cache, CacheBuilder, CacheLayer, CacheLayerKind, CacheStack, MemoryCache},
    cds::{CdsClient, JobPoller, ReqwestTransport, Transport},
    config::Config,
    error::{Error, JobFailure},
    locale::{LocaleState, negotiate},
    missing_policy::{CompositePolicy, MissingPolicy, MissingPolicyKind},
    native::{TxNative, TxNativeBuilder},
    storage::{FileProvider, FsFileProvider, MemoryFileProvider, TranslationMapStorage},
    sync::{LocaleRefresh, RefreshReport, SyncOrchestrator},
    traits::{Parser, TranslationsProvider},
    types::{
        LocaleStrings, Meta, PluralCategory, PluralForms, PushMeta, PushPayload, StringInfo,
        TranslationMap, TxJobStatus, UpdatePolicy,
    },
};
