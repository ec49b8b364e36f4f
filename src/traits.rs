//! Traits shared across txnative: document parsing and translation sources.

use std::{
    fs::File,
    io::{BufRead, BufReader, BufWriter, Cursor, Write},
    path::Path,
};

use crate::{error::Error, types::LocaleStrings};

/// A trait for parsing and writing documents from/to bytes, readers or files.
///
/// # Example
///
/// ```rust,no_run
/// use txnative::traits::Parser;
/// use txnative::types::LocaleDocument;
/// let document = LocaleDocument::read_from("txnative/fr/txstrings.json")?;
/// document.write_to("fr_copy.json")?;
/// Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub trait Parser {
    /// Parse from any reader.
    fn from_reader<R: BufRead>(reader: R) -> Result<Self, Error>
    where
        Self: Sized;

    /// Parse from file path.
    fn read_from<P: AsRef<Path>>(path: P) -> Result<Self, Error>
    where
        Self: Sized,
    {
        let file = File::open(path).map_err(Error::Storage)?;
        let reader = BufReader::new(file);
        Self::from_reader(reader)
    }

    /// Write to any writer (file, memory, etc.).
    fn to_writer<W: Write>(&self, writer: W) -> Result<(), Error>;

    /// Write to file path.
    fn write_to<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        self.to_writer(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Parse from a string.
    fn from_str(s: &str) -> Result<Self, Error>
    where
        Self: Sized,
    {
        Self::from_reader(Cursor::new(s))
    }

    /// Parse from bytes.
    fn from_bytes(bytes: &[u8]) -> Result<Self, Error>
    where
        Self: Sized,
    {
        Self::from_reader(Cursor::new(bytes))
    }

    /// Serialize into a byte buffer.
    fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        let mut buffer = Vec::new();
        self.to_writer(&mut buffer)?;
        Ok(buffer)
    }
}

/// A source of translations consulted lazily by the provider-based cache.
///
/// Returning `None` means the provider has nothing for the locale; providers
/// log their own failures instead of surfacing them.
pub trait TranslationsProvider: Send + Sync {
    fn provide(&self, locale: &str) -> Option<LocaleStrings>;

    /// Locales this provider knows about, if it can enumerate them.
    fn locales(&self) -> Vec<String> {
        Vec::new()
    }
}

impl<F> TranslationsProvider for F
where
    F: Fn(&str) -> Option<LocaleStrings> + Send + Sync,
{
    fn provide(&self, locale: &str) -> Option<LocaleStrings> {
        self(locale)
    }
}
