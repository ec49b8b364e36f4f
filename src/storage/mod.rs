//! Persistence of translation maps, one JSON document per locale.
//!
//! Storage logic only talks to a [`FileProvider`]; the filesystem backend and
//! the in-memory backend are interchangeable.

mod fs;
mod memory;

use std::{
    collections::BTreeMap,
    io::{self, Read, Write},
    sync::Arc,
};

pub use fs::FsFileProvider;
pub use memory::MemoryFileProvider;

use crate::{
    error::Error,
    traits::{Parser, TranslationsProvider},
    types::{LocaleDocument, LocaleStrings, TranslationMap},
};

/// Name of the per-locale document when none is configured.
pub const DEFAULT_FILENAME: &str = "txstrings.json";

/// Directory name used for downloaded translations.
pub const DEFAULT_DIRECTORY: &str = "txnative";

/// A write in progress. Data becomes visible at the target path only after
/// [`PendingWrite::commit`]; dropping the value discards it.
pub trait PendingWrite: Write + Send {
    fn commit(self: Box<Self>) -> Result<(), Error>;
}

/// Minimal file capability the storage needs.
///
/// Paths are relative and `/`-separated.
pub trait FileProvider: Send + Sync {
    /// Opens a file for reading. A missing file is an `io::ErrorKind::NotFound` storage error.
    fn open_read(&self, path: &str) -> Result<Box<dyn Read + Send>, Error>;

    fn open_write(&self, path: &str) -> Result<Box<dyn PendingWrite>, Error>;

    /// Names of the direct children of `dir`. A missing directory or a plain
    /// file lists as empty.
    fn list(&self, dir: &str) -> Result<Vec<String>, Error>;

    /// Removes a file or a directory tree. Removing nothing is not an error.
    fn delete(&self, path: &str) -> Result<(), Error>;
}

pub(crate) fn check_relative_path(path: &str) -> Result<(), Error> {
    let escapes = path
        .split('/')
        .any(|segment| segment == ".." || segment.contains('\\'));
    if path.starts_with('/') || escapes {
        return Err(Error::Storage(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("path escapes the storage root: {}", path),
        )));
    }
    Ok(())
}

fn check_locale_code(locale: &str) -> Result<(), Error> {
    if locale.is_empty() || locale.contains('/') || locale == "." || locale == ".." {
        return Err(Error::Storage(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid locale directory name: {:?}", locale),
        )));
    }
    Ok(())
}

/// Reads and writes [`TranslationMap`]s as `<locale>/<filename>` documents.
#[derive(Clone)]
pub struct TranslationMapStorage {
    provider: Arc<dyn FileProvider>,
    filename: String,
}

impl std::fmt::Debug for TranslationMapStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranslationMapStorage")
            .field("filename", &self.filename)
            .finish_non_exhaustive()
    }
}

impl TranslationMapStorage {
    pub fn new(provider: Arc<dyn FileProvider>) -> Self {
        Self::with_filename(provider, DEFAULT_FILENAME)
    }

    pub fn with_filename(provider: Arc<dyn FileProvider>, filename: impl Into<String>) -> Self {
        Self {
            provider,
            filename: filename.into(),
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    fn path_for(&self, locale: &str) -> String {
        format!("{}/{}", locale, self.filename)
    }

    /// Writes every locale of `map`; one failing locale does not stop the others.
    pub fn save(&self, map: &TranslationMap) -> BTreeMap<String, Result<(), Error>> {
        map.iter()
            .map(|(locale, strings)| {
                let outcome = self.save_locale(locale, strings);
                if let Err(e) = &outcome {
                    tracing::warn!(locale = %locale, "Failed to save translations: {}", e);
                }
                (locale.clone(), outcome)
            })
            .collect()
    }

    /// Atomically replaces the document of one locale.
    pub fn save_locale(&self, locale: &str, strings: &LocaleStrings) -> Result<(), Error> {
        check_locale_code(locale)?;
        let document = LocaleDocument::new(strings.clone());
        let mut pending = self.provider.open_write(&self.path_for(locale))?;
        document.to_writer(&mut pending)?;
        pending.flush()?;
        pending.commit()?;
        tracing::debug!(locale, strings = strings.len(), "Saved translations");
        Ok(())
    }

    /// Reads one locale, explaining why it could not be loaded.
    pub fn try_load_locale(&self, locale: &str) -> Result<LocaleStrings, Error> {
        check_locale_code(locale)?;
        let mut reader = self.provider.open_read(&self.path_for(locale))?;
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Ok(LocaleDocument::from_bytes(&bytes)?.data)
    }

    /// Reads one locale; a missing or malformed document yields `None`.
    pub fn load_locale(&self, locale: &str) -> Option<LocaleStrings> {
        match self.try_load_locale(locale) {
            Ok(strings) => Some(strings),
            Err(Error::Storage(e)) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(locale, "No stored translations");
                None
            }
            Err(e) => {
                tracing::warn!(locale, "Ignoring stored translations: {}", e);
                None
            }
        }
    }

    /// Locales that currently have a document.
    pub fn locales(&self) -> Result<Vec<String>, Error> {
        let mut locales = Vec::new();
        for entry in self.provider.list("")? {
            if check_locale_code(&entry).is_err() {
                continue;
            }
            match self.provider.list(&entry) {
                Ok(files) if files.iter().any(|f| f == &self.filename) => locales.push(entry),
                Ok(_) => {}
                Err(e) => tracing::debug!(entry = %entry, "Skipping storage entry: {}", e),
            }
        }
        Ok(locales)
    }

    /// Reads every stored locale, skipping the ones that cannot be loaded.
    pub fn load(&self) -> TranslationMap {
        let locales = match self.locales() {
            Ok(locales) => locales,
            Err(e) => {
                tracing::warn!("Failed to list stored locales: {}", e);
                return TranslationMap::new();
            }
        };
        locales
            .into_iter()
            .filter_map(|locale| {
                let strings = self.load_locale(&locale)?;
                Some((locale, strings))
            })
            .collect()
    }

    pub fn delete_locale(&self, locale: &str) -> Result<(), Error> {
        check_locale_code(locale)?;
        self.provider.delete(&self.path_for(locale))?;
        if self.provider.list(locale)?.is_empty() {
            self.provider.delete(locale)?;
        }
        Ok(())
    }

    /// Deletes every stored locale document.
    pub fn clear(&self) -> Result<(), Error> {
        for locale in self.locales()? {
            self.delete_locale(&locale)?;
        }
        Ok(())
    }
}

impl TranslationsProvider for TranslationMapStorage {
    fn provide(&self, locale: &str) -> Option<LocaleStrings> {
        self.load_locale(locale)
    }

    fn locales(&self) -> Vec<String> {
        TranslationMapStorage::locales(self).unwrap_or_else(|e| {
            tracing::warn!("Failed to list stored locales: {}", e);
            Vec::new()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Meta, StringInfo};

    fn sample() -> LocaleStrings {
        let mut strings = LocaleStrings::new();
        strings.insert("hello", StringInfo::new("Bonjour"));
        strings.insert(
            "bye",
            StringInfo::with_meta(
                "Au revoir",
                Meta {
                    developer_comment: Some("farewell".to_string()),
                    character_limit: Some(20),
                    tags: ["ui".to_string()].into_iter().collect(),
                    ..Meta::default()
                },
            ),
        );
        strings
    }

    fn memory_storage() -> (Arc<MemoryFileProvider>, TranslationMapStorage) {
        let provider = Arc::new(MemoryFileProvider::new());
        let storage = TranslationMapStorage::new(provider.clone());
        (provider, storage)
    }

    #[test]
    fn test_save_and_load_locale() {
        let (_, storage) = memory_storage();
        storage.save_locale("fr", &sample()).unwrap();
        assert_eq!(storage.load_locale("fr"), Some(sample()));
        assert_eq!(storage.load_locale("de"), None);
    }

    #[test]
    fn test_document_layout() {
        let (provider, storage) = memory_storage();
        storage.save_locale("fr", &sample()).unwrap();
        let bytes = provider.contents("fr/txstrings.json").unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["data"]["hello"]["string"], "Bonjour");
        assert_eq!(value["data"]["bye"]["meta"]["character_limit"], 20);
    }

    #[test]
    fn test_malformed_document_loads_as_none() {
        let (provider, storage) = memory_storage();
        provider.insert("fr/txstrings.json", b"not json".to_vec());
        assert_eq!(storage.load_locale("fr"), None);
        assert!(matches!(storage.try_load_locale("fr"), Err(Error::Parse(_))));
    }

    #[test]
    fn test_missing_document_reason() {
        let (_, storage) = memory_storage();
        match storage.try_load_locale("fr") {
            Err(Error::Storage(e)) => assert_eq!(e.kind(), io::ErrorKind::NotFound),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_save_map_and_list_locales() {
        let (_, storage) = memory_storage();
        let mut map = TranslationMap::new();
        map.insert("fr", sample());
        map.insert("de", LocaleStrings::new());

        let outcomes = storage.save(&map);
        assert!(outcomes.values().all(|r| r.is_ok()));

        let mut locales = storage.locales().unwrap();
        locales.sort();
        assert_eq!(locales, vec!["de".to_string(), "fr".to_string()]);
        assert_eq!(storage.load(), map);
    }

    #[test]
    fn test_custom_filename() {
        let provider = Arc::new(MemoryFileProvider::new());
        let storage = TranslationMapStorage::with_filename(provider.clone(), "strings.json");
        storage.save_locale("es", &sample()).unwrap();
        assert!(provider.contents("es/strings.json").is_some());
        assert_eq!(storage.locales().unwrap(), vec!["es".to_string()]);
    }

    #[test]
    fn test_delete_and_clear() {
        let (_, storage) = memory_storage();
        storage.save_locale("fr", &sample()).unwrap();
        storage.save_locale("de", &sample()).unwrap();

        storage.delete_locale("fr").unwrap();
        assert_eq!(storage.locales().unwrap(), vec!["de".to_string()]);

        storage.clear().unwrap();
        assert!(storage.locales().unwrap().is_empty());
    }

    #[test]
    fn test_rejects_locale_with_separator() {
        let (_, storage) = memory_storage();
        assert!(storage.save_locale("../fr", &sample()).is_err());
        assert!(storage.try_load_locale("a/b").is_err());
    }

    #[test]
    fn test_stray_root_files_do_not_hide_locales() {
        let dir = tempfile::TempDir::new().unwrap();
        let storage = TranslationMapStorage::new(Arc::new(FsFileProvider::new(dir.path())));
        storage.save_locale("fr", &sample()).unwrap();
        std::fs::write(dir.path().join(".DS_Store"), b"junk").unwrap();
        std::fs::write(dir.path().join("txnative.toml"), b"token = \"1/abc\"").unwrap();

        assert_eq!(storage.locales().unwrap(), vec!["fr".to_string()]);
        assert_eq!(storage.load().len(), 1);
        assert_eq!(TranslationsProvider::locales(&storage), vec!["fr".to_string()]);

        storage.clear().unwrap();
        assert!(storage.locales().unwrap().is_empty());
        assert!(dir.path().join(".DS_Store").is_file());
    }

    #[test]
    fn test_storage_as_provider() {
        let (_, storage) = memory_storage();
        storage.save_locale("fr", &sample()).unwrap();
        let provider: &dyn TranslationsProvider = &storage;
        assert_eq!(provider.provide("fr"), Some(sample()));
        assert_eq!(provider.provide("it"), None);
        assert_eq!(provider.locales(), vec!["fr".to_string()]);
    }
}
