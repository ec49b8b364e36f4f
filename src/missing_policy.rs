//! Resolution of strings that have no usable translation.
//!
//! A policy turns the source string into what the user sees. Policies compose
//! through [`CompositePolicy`], which feeds each policy the previous output.

use std::{collections::HashMap, fmt::Display, str::FromStr, sync::Arc};

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

use crate::{config::MissingPolicyConfig, error::Error, types::TranslationMap};

lazy_static! {
    /// Latin letter → accented look-alike used for pseudo-localization.
    static ref PSEUDO_TABLE: HashMap<char, char> = {
        let plain = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
        let accented = "ÅƁĊĐȄḞĠȞİĴǨĹṀÑÒƤꝖȒȘŤÜṼẂẌẎŽàƀċđêƒğȟıǰǩĺɱñøƥʠȓšťüṽẁẋÿź";
        plain.chars().zip(accented.chars()).collect()
    };
}

pub trait MissingPolicy: Send + Sync {
    /// Returns the text to show for `key` in `locale`, derived from `source`.
    fn resolve(&self, source: &str, key: &str, locale: &str) -> String;
}

/// Returns the source string unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceStringPolicy;

impl MissingPolicy for SourceStringPolicy {
    fn resolve(&self, source: &str, _key: &str, _locale: &str) -> String {
        source.to_string()
    }
}

/// Replaces Latin letters with accented look-alikes, e.g. `Hello` → `Ȟêĺĺø`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PseudoTranslationPolicy;

impl PseudoTranslationPolicy {
    pub fn transform(text: &str) -> String {
        text.chars()
            .map(|c| PSEUDO_TABLE.get(&c).copied().unwrap_or(c))
            .collect()
    }
}

impl MissingPolicy for PseudoTranslationPolicy {
    fn resolve(&self, source: &str, _key: &str, _locale: &str) -> String {
        Self::transform(source)
    }
}

/// Surrounds the string with start and end markers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrappedStringPolicy {
    start: String,
    end: String,
}

impl Default for WrappedStringPolicy {
    fn default() -> Self {
        Self::new("[", "]")
    }
}

impl WrappedStringPolicy {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }
}

impl MissingPolicy for WrappedStringPolicy {
    fn resolve(&self, source: &str, _key: &str, _locale: &str) -> String {
        format!("{}{}{}", self.start, source, self.end)
    }
}

type PlatformLookup = dyn Fn(&str, &str) -> Option<String> + Send + Sync;

/// Asks the host for a string bundled with the application, keyed by string
/// key and locale. Falls back to the input when the host has nothing.
#[derive(Clone)]
pub struct PlatformFallbackPolicy {
    lookup: Arc<PlatformLookup>,
}

impl PlatformFallbackPolicy {
    pub fn new<F>(lookup: F) -> Self
    where
        F: Fn(&str, &str) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            lookup: Arc::new(lookup),
        }
    }
}

impl std::fmt::Debug for PlatformFallbackPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformFallbackPolicy").finish_non_exhaustive()
    }
}

impl MissingPolicy for PlatformFallbackPolicy {
    fn resolve(&self, source: &str, key: &str, locale: &str) -> String {
        match (self.lookup)(key, locale) {
            Some(text) => text,
            None => {
                tracing::debug!(key, locale, "No platform string, keeping input");
                source.to_string()
            }
        }
    }
}

/// Looks strings up in a translation map shipped with the application.
#[derive(Debug, Clone, Default)]
pub struct BundledStringsPolicy {
    translations: TranslationMap,
}

impl BundledStringsPolicy {
    pub fn new(translations: TranslationMap) -> Self {
        Self { translations }
    }
}

impl MissingPolicy for BundledStringsPolicy {
    fn resolve(&self, source: &str, key: &str, locale: &str) -> String {
        match self.translations.get_string(locale, key) {
            Some(text) if !text.is_empty() => text.to_string(),
            _ => source.to_string(),
        }
    }
}

/// Runs every policy in order, each receiving the previous policy's output.
#[derive(Clone, Default)]
pub struct CompositePolicy {
    policies: Vec<Arc<dyn MissingPolicy>>,
}

impl CompositePolicy {
    pub fn new(policies: Vec<Arc<dyn MissingPolicy>>) -> Self {
        Self { policies }
    }

    pub fn push(mut self, policy: impl MissingPolicy + 'static) -> Self {
        self.policies.push(Arc::new(policy));
        self
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    /// Builds the configured chain. `platform` serves the `platform` entry and
    /// `bundled` the `bundled` entry; a missing one passes its input through.
    pub fn from_config(
        config: &MissingPolicyConfig,
        platform: Option<PlatformFallbackPolicy>,
        bundled: Option<BundledStringsPolicy>,
    ) -> Self {
        let policies = config
            .chain
            .iter()
            .map(|kind| -> Arc<dyn MissingPolicy> {
                match kind {
                    MissingPolicyKind::Source => Arc::new(SourceStringPolicy),
                    MissingPolicyKind::Pseudo => Arc::new(PseudoTranslationPolicy),
                    MissingPolicyKind::Wrapped => Arc::new(WrappedStringPolicy::new(
                        config.wrap_start.clone(),
                        config.wrap_end.clone(),
                    )),
                    MissingPolicyKind::Platform => match &platform {
                        Some(policy) => Arc::new(policy.clone()),
                        None => {
                            tracing::warn!("platform policy configured without a host lookup");
                            Arc::new(SourceStringPolicy)
                        }
                    },
                    MissingPolicyKind::Bundled => match &bundled {
                        Some(policy) => Arc::new(policy.clone()),
                        None => {
                            tracing::warn!("bundled policy configured without bundled translations");
                            Arc::new(SourceStringPolicy)
                        }
                    },
                }
            })
            .collect();
        Self { policies }
    }
}

impl std::fmt::Debug for CompositePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositePolicy")
            .field("policies", &self.policies.len())
            .finish()
    }
}

impl MissingPolicy for CompositePolicy {
    fn resolve(&self, source: &str, key: &str, locale: &str) -> String {
        self.policies
            .iter()
            .fold(source.to_string(), |text, policy| policy.resolve(&text, key, locale))
    }
}

/// Policy identifiers accepted in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingPolicyKind {
    Source,
    Pseudo,
    Wrapped,
    Platform,
    Bundled,
}

impl FromStr for MissingPolicyKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "source" => Ok(MissingPolicyKind::Source),
            "pseudo" => Ok(MissingPolicyKind::Pseudo),
            "wrapped" => Ok(MissingPolicyKind::Wrapped),
            "platform" => Ok(MissingPolicyKind::Platform),
            "bundled" => Ok(MissingPolicyKind::Bundled),
            _ => Err(Error::config_error(format!("unknown missing policy: {}", s))),
        }
    }
}

impl Display for MissingPolicyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let id = match self {
            MissingPolicyKind::Source => "source",
            MissingPolicyKind::Pseudo => "pseudo",
            MissingPolicyKind::Wrapped => "wrapped",
            MissingPolicyKind::Platform => "platform",
            MissingPolicyKind::Bundled => "bundled",
        };
        write!(f, "{}", id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LocaleStrings, StringInfo};

    #[test]
    fn test_source_policy() {
        assert_eq!(SourceStringPolicy.resolve("Hello", "k", "fr"), "Hello");
    }

    #[test]
    fn test_pseudo_policy() {
        assert_eq!(PseudoTranslationPolicy.resolve("Hello", "k", "fr"), "Ȟêĺĺø");
        assert_eq!(
            PseudoTranslationPolicy::transform("ABC xyz 123!"),
            "ÅƁĊ ẋÿź 123!"
        );
    }

    #[test]
    fn test_pseudo_table_covers_ascii_letters() {
        assert_eq!(PSEUDO_TABLE.len(), 52);
        for c in ('a'..='z').chain('A'..='Z') {
            assert_ne!(PSEUDO_TABLE[&c], c);
        }
    }

    #[test]
    fn test_wrapped_policy() {
        assert_eq!(WrappedStringPolicy::default().resolve("Hi", "k", "fr"), "[Hi]");
        assert_eq!(
            WrappedStringPolicy::new("<<", ">>").resolve("Hi", "k", "fr"),
            "<<Hi>>"
        );
    }

    #[test]
    fn test_composite_order_dependence() {
        let pseudo_then_wrap = CompositePolicy::default()
            .push(PseudoTranslationPolicy)
            .push(WrappedStringPolicy::new("[", "]"));
        let wrap_then_pseudo = CompositePolicy::default()
            .push(WrappedStringPolicy::new("[", "]"))
            .push(PseudoTranslationPolicy);

        assert_eq!(pseudo_then_wrap.resolve("Hello", "k", "de"), "[Ȟêĺĺø]");
        assert_eq!(wrap_then_pseudo.resolve("Hello", "k", "de"), "[Ȟêĺĺø]");

        let letters_wrap = CompositePolicy::default()
            .push(WrappedStringPolicy::new("x", "y"))
            .push(PseudoTranslationPolicy);
        let wrap_letters = CompositePolicy::default()
            .push(PseudoTranslationPolicy)
            .push(WrappedStringPolicy::new("x", "y"));
        assert_eq!(letters_wrap.resolve("Hi", "k", "de"), "ẋȞıÿ");
        assert_eq!(wrap_letters.resolve("Hi", "k", "de"), "xȞıy");
    }

    #[test]
    fn test_empty_composite_returns_source() {
        assert_eq!(CompositePolicy::default().resolve("Hi", "k", "de"), "Hi");
    }

    #[test]
    fn test_platform_fallback() {
        let policy = PlatformFallbackPolicy::new(|key, locale| {
            (key == "app_name" && locale == "fr").then(|| "Mon App".to_string())
        });
        assert_eq!(policy.resolve("My App", "app_name", "fr"), "Mon App");
        assert_eq!(policy.resolve("My App", "app_name", "de"), "My App");
    }

    #[test]
    fn test_bundled_strings_policy() {
        let mut strings = LocaleStrings::new();
        strings.insert("hello", StringInfo::new("Hallo"));
        strings.insert("empty", StringInfo::new(""));
        let mut bundled = TranslationMap::new();
        bundled.insert("de", strings);

        let policy = BundledStringsPolicy::new(bundled);
        assert_eq!(policy.resolve("Hello", "hello", "de"), "Hallo");
        assert_eq!(policy.resolve("Empty", "empty", "de"), "Empty");
        assert_eq!(policy.resolve("Hello", "hello", "fr"), "Hello");
    }

    #[test]
    fn test_from_config() {
        let config = MissingPolicyConfig {
            chain: vec![MissingPolicyKind::Pseudo, MissingPolicyKind::Wrapped],
            wrap_start: "{".to_string(),
            wrap_end: "}".to_string(),
        };
        let chain = CompositePolicy::from_config(&config, None, None);
        assert_eq!(chain.len(), 2);
        assert_eq!(chain.resolve("Hi", "k", "de"), "{Ȟı}");
    }

    #[test]
    fn test_from_config_platform_without_host_passes_through() {
        let config = MissingPolicyConfig {
            chain: vec![MissingPolicyKind::Platform],
            ..MissingPolicyConfig::default()
        };
        let chain = CompositePolicy::from_config(&config, None, None);
        assert_eq!(chain.resolve("Hi", "k", "de"), "Hi");
    }

    #[test]
    fn test_kind_from_str() {
        assert_eq!("Pseudo".parse::<MissingPolicyKind>().unwrap(), MissingPolicyKind::Pseudo);
        assert_eq!(MissingPolicyKind::Wrapped.to_string(), "wrapped");
        assert!("other".parse::<MissingPolicyKind>().is_err());
        assert_eq!("bundled".parse::<MissingPolicyKind>().unwrap(), MissingPolicyKind::Bundled);
        assert_eq!(MissingPolicyKind::Bundled.to_string(), "bundled");
    }

    #[test]
    fn test_from_config_bundled() {
        let mut strings = LocaleStrings::new();
        strings.insert("menu.close", StringInfo::new("Schließen"));
        let mut translations = TranslationMap::new();
        translations.insert("de", strings);

        let config = MissingPolicyConfig {
            chain: vec![MissingPolicyKind::Bundled, MissingPolicyKind::Wrapped],
            ..MissingPolicyConfig::default()
        };
        let chain =
            CompositePolicy::from_config(&config, None, Some(BundledStringsPolicy::new(translations)));
        assert_eq!(chain.resolve("Close", "menu.close", "de"), "[Schließen]");
        assert_eq!(chain.resolve("Open", "menu.open", "de"), "[Open]");

        let without = CompositePolicy::from_config(&config, None, None);
        assert_eq!(without.resolve("Close", "menu.close", "de"), "[Close]");
    }
}
