//! Core data model for txnative.
//! Network payloads and disk documents decode into these; caches hold them as
//! immutable snapshots.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::Display,
    str::FromStr,
};

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{error::Error, traits::Parser};

lazy_static! {
    static ref ICU_PLURAL_REGEX: Regex =
        Regex::new(r"(?s)^\{\s*\w+\s*,\s*plural\s*,(.*)\}$").unwrap();
    static ref ICU_FORM_REGEX: Regex = Regex::new(r"([A-Za-z_]+)\s*\{([^}]*)\}").unwrap();
}

/// Metadata attached to a string.
///
/// A meta with every field at its default is omitted when serialized, so
/// documents round-trip losslessly whether or not they carried a `meta` object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Meta {
    /// Instructions for translators.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub developer_comment: Option<String>,

    /// Maximum number of characters a translation should use.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub character_limit: Option<u32>,

    #[serde(skip_serializing_if = "BTreeSet::is_empty", default)]
    pub tags: BTreeSet<String>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub context: Option<String>,

    /// Marks the text as an ICU plural string.
    #[serde(skip_serializing_if = "std::ops::Not::not", default)]
    pub plural: bool,
}

impl Meta {
    pub fn is_empty(&self) -> bool {
        self == &Meta::default()
    }
}

/// A single string: its text plus metadata.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct StringInfo {
    /// The text. Never absent, may be empty.
    pub string: String,

    #[serde(skip_serializing_if = "Meta::is_empty", default)]
    pub meta: Meta,
}

impl StringInfo {
    pub fn new(string: impl Into<String>) -> Self {
        Self {
            string: string.into(),
            meta: Meta::default(),
        }
    }

    pub fn with_meta(string: impl Into<String>, meta: Meta) -> Self {
        Self {
            string: string.into(),
            meta,
        }
    }

    /// Adds tags to the existing ones.
    pub fn append_tags<I, S>(&mut self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.meta.tags.extend(tags.into_iter().map(Into::into));
    }

    /// True when the string is flagged as plural or is written as an ICU plural.
    pub fn is_plural(&self) -> bool {
        self.meta.plural || ICU_PLURAL_REGEX.is_match(self.string.trim())
    }
}

impl Display for StringInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.meta.is_empty() {
            write!(f, "{{string: {:?}}}", self.string)
        } else {
            write!(f, "{{string: {:?}, meta: {:?}}}", self.string, self.meta)
        }
    }
}

/// All strings of one locale, keyed by string key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct LocaleStrings(BTreeMap<String, StringInfo>);

impl LocaleStrings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, info: StringInfo) -> Option<StringInfo> {
        self.0.insert(key.into(), info)
    }

    /// Returns the text for `key`, if present.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(|info| info.string.as_str())
    }

    pub fn get_info(&self, key: &str) -> Option<&StringInfo> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<StringInfo> {
        self.0.remove(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &StringInfo)> {
        self.0.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&String, &mut StringInfo)> {
        self.0.iter_mut()
    }

    pub fn retain(&mut self, f: impl FnMut(&String, &mut StringInfo) -> bool) {
        self.0.retain(f);
    }
}

impl FromIterator<(String, StringInfo)> for LocaleStrings {
    fn from_iter<T: IntoIterator<Item = (String, StringInfo)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for LocaleStrings {
    type Item = (String, StringInfo);
    type IntoIter = std::collections::btree_map::IntoIter<String, StringInfo>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// How an incoming map is combined with the existing one.
///
/// The policy is evaluated per key: locales absent from the incoming map are
/// never touched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdatePolicy {
    /// Incoming strings fully replace the existing strings of touched locales.
    #[default]
    Replace,
    /// Incoming strings are only added for keys not present yet.
    MergeKeepExisting,
    /// Incoming strings always win, other keys are kept.
    MergeOverwrite,
}

impl FromStr for UpdatePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "REPLACE" | "REPLACE_ALL" => Ok(UpdatePolicy::Replace),
            "MERGE_KEEP_EXISTING" => Ok(UpdatePolicy::MergeKeepExisting),
            "MERGE_OVERWRITE" | "UPDATE_USING_TRANSLATED" => Ok(UpdatePolicy::MergeOverwrite),
            _ => Err(Error::config_error(format!("unknown update policy: {}", s))),
        }
    }
}

impl Display for UpdatePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpdatePolicy::Replace => write!(f, "replace"),
            UpdatePolicy::MergeKeepExisting => write!(f, "merge_keep_existing"),
            UpdatePolicy::MergeOverwrite => write!(f, "merge_overwrite"),
        }
    }
}

/// Translations for several locales, keyed by locale code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct TranslationMap(BTreeMap<String, LocaleStrings>);

impl TranslationMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        locale: impl Into<String>,
        strings: LocaleStrings,
    ) -> Option<LocaleStrings> {
        self.0.insert(locale.into(), strings)
    }

    pub fn get(&self, locale: &str) -> Option<&LocaleStrings> {
        self.0.get(locale)
    }

    /// Returns the text stored for `key` in `locale`.
    pub fn get_string(&self, locale: &str, key: &str) -> Option<&str> {
        self.0.get(locale).and_then(|strings| strings.get(key))
    }

    pub fn contains_locale(&self, locale: &str) -> bool {
        self.0.contains_key(locale)
    }

    pub fn remove(&mut self, locale: &str) -> Option<LocaleStrings> {
        self.0.remove(locale)
    }

    pub fn locales(&self) -> BTreeSet<String> {
        self.0.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &LocaleStrings)> {
        self.0.iter()
    }

    /// Builds a new map combining `self` with `incoming` under `policy`.
    ///
    /// `self` is left untouched, so callers holding the previous snapshot never
    /// observe a partially applied update.
    pub fn merged(&self, incoming: &TranslationMap, policy: UpdatePolicy) -> TranslationMap {
        let mut result = self.clone();
        for (locale, strings) in incoming.iter() {
            match policy {
                UpdatePolicy::Replace => {
                    result.0.insert(locale.clone(), strings.clone());
                }
                UpdatePolicy::MergeKeepExisting => {
                    let target = result.0.entry(locale.clone()).or_default();
                    for (key, info) in strings.iter() {
                        if !target.contains_key(key) {
                            target.insert(key.clone(), info.clone());
                        }
                    }
                }
                UpdatePolicy::MergeOverwrite => {
                    let target = result.0.entry(locale.clone()).or_default();
                    for (key, info) in strings.iter() {
                        target.insert(key.clone(), info.clone());
                    }
                }
            }
        }
        result
    }

    /// Drops entries whose text is empty; locales left without strings are removed.
    pub fn without_empty_strings(&self) -> TranslationMap {
        self.0
            .iter()
            .filter_map(|(locale, strings)| {
                let kept: LocaleStrings = strings
                    .iter()
                    .filter(|(_, info)| !info.string.is_empty())
                    .map(|(key, info)| (key.clone(), info.clone()))
                    .collect();
                (!kept.is_empty()).then(|| (locale.clone(), kept))
            })
            .collect()
    }
}

impl FromIterator<(String, LocaleStrings)> for TranslationMap {
    fn from_iter<T: IntoIterator<Item = (String, LocaleStrings)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Standard CLDR plural forms.
#[derive(Ord, PartialOrd, Eq, PartialEq, Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
#[derive(Hash)]
pub enum PluralCategory {
    Zero,
    One,
    Two,
    Few,
    Many,
    Other,
}

impl PluralCategory {
    pub const ALL: [PluralCategory; 6] = [
        PluralCategory::Zero,
        PluralCategory::One,
        PluralCategory::Two,
        PluralCategory::Few,
        PluralCategory::Many,
        PluralCategory::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PluralCategory::Zero => "zero",
            PluralCategory::One => "one",
            PluralCategory::Two => "two",
            PluralCategory::Few => "few",
            PluralCategory::Many => "many",
            PluralCategory::Other => "other",
        }
    }
}

impl Display for PluralCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PluralCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "ZERO" => Ok(PluralCategory::Zero),
            "ONE" => Ok(PluralCategory::One),
            "TWO" => Ok(PluralCategory::Two),
            "FEW" => Ok(PluralCategory::Few),
            "MANY" => Ok(PluralCategory::Many),
            "OTHER" => Ok(PluralCategory::Other),
            _ => Err(Error::NonSupportedPluralType(s.to_string())),
        }
    }
}

/// Plural forms of one string, as carried by ICU strings such as
/// `{cnt, plural, one {# apple} other {# apples}}`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PluralForms {
    pub forms: BTreeMap<PluralCategory, String>,
}

impl PluralForms {
    pub fn new(forms: impl IntoIterator<Item = (PluralCategory, String)>) -> Self {
        Self {
            forms: forms.into_iter().collect(),
        }
    }

    /// Parses an ICU plural string.
    ///
    /// Returns `InvalidPlurals` when the text is not an ICU plural or has no
    /// forms, and `NonSupportedPluralType` when a form uses an unknown category.
    pub fn from_icu(icu: &str) -> Result<Self, Error> {
        let captures = ICU_PLURAL_REGEX
            .captures(icu.trim())
            .ok_or_else(|| Error::InvalidPlurals(format!("not an ICU plural string: {}", icu)))?;
        let body = captures.get(1).map_or("", |m| m.as_str());

        let mut forms = BTreeMap::new();
        for form in ICU_FORM_REGEX.captures_iter(body) {
            let category: PluralCategory = form[1].parse()?;
            forms.insert(category, form[2].to_string());
        }

        if forms.is_empty() {
            return Err(Error::InvalidPlurals(format!(
                "no plural forms found in: {}",
                icu
            )));
        }
        Ok(Self { forms })
    }

    /// Serializes back to `{cnt, plural, …}` with categories in CLDR order.
    pub fn to_icu(&self) -> String {
        let mut out = String::from("{cnt, plural,");
        for (category, text) in &self.forms {
            out.push_str(&format!(" {} {{{}}}", category, text));
        }
        out.push('}');
        out
    }

    pub fn get(&self, category: PluralCategory) -> Option<&str> {
        self.forms.get(&category).map(String::as_str)
    }

    pub fn categories(&self) -> BTreeSet<PluralCategory> {
        self.forms.keys().copied().collect()
    }
}

/// Server-side state of a push job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Completed,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobState::Pending)
    }

    /// Only a pending job may change state.
    pub fn can_transition_to(&self, next: JobState) -> bool {
        matches!(self, JobState::Pending) || *self == next
    }
}

impl FromStr for JobState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" | "processing" => Ok(JobState::Pending),
            "completed" => Ok(JobState::Completed),
            "failed" => Ok(JobState::Failed),
            other => Err(Error::Parse(serde::de::Error::custom(format!(
                "unknown job status: {}",
                other
            )))),
        }
    }
}

impl<'de> Deserialize<'de> for JobState {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Counters reported by the server for a push job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct JobDetails {
    #[serde(default)]
    pub created: u32,
    #[serde(default)]
    pub updated: u32,
    #[serde(default)]
    pub skipped: u32,
    #[serde(default)]
    pub deleted: u32,
    #[serde(default)]
    pub failed: u32,
}

impl JobDetails {
    /// Strings the server handled successfully.
    pub fn processed(&self) -> u32 {
        self.created + self.updated + self.skipped + self.deleted
    }

    /// Every string the server saw, failures included.
    pub fn total(&self) -> u32 {
        self.processed() + self.failed
    }
}

/// One server-reported error of a job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct JobError {
    #[serde(default)]
    pub status: u16,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub detail: String,
}

impl Display for JobError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.code, self.title, self.detail)
    }
}

/// Status of a push job as returned by one poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxJobStatus {
    pub job_id: String,
    pub state: JobState,
    pub details: JobDetails,
    pub errors: Vec<JobError>,
}

/// Flags sent along with pushed source strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct PushMeta {
    /// Replace the whole remote resource instead of appending/updating.
    #[serde(default)]
    pub purge: bool,

    /// Replace remote tags instead of merging them with the pushed ones.
    #[serde(default)]
    pub override_tags: bool,
}

/// Source strings to upload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct PushPayload {
    pub data: LocaleStrings,
    pub meta: PushMeta,
}

impl PushPayload {
    pub fn new(data: LocaleStrings, meta: PushMeta) -> Self {
        Self { data, meta }
    }

    /// Payload that clears every remote source string.
    pub fn purge_all() -> Self {
        Self {
            data: LocaleStrings::new(),
            meta: PushMeta {
                purge: true,
                override_tags: false,
            },
        }
    }
}

/// Reference to the job created by a push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushResponse {
    pub job_id: String,
    /// Path (or absolute URL) to poll for the job status.
    pub job_link: String,
}

/// Strings of one locale as served by a pull, plus the validation token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullResponse {
    pub locale: String,
    pub strings: LocaleStrings,
    pub token: Option<String>,
}

/// Result of pulling one locale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullOutcome {
    Updated(PullResponse),
    /// The server still holds what the caller's token describes.
    NotModified,
}

/// On-disk and on-wire document holding one locale's strings:
/// `{"data": {key: {"string": …, "meta": {…}}}}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LocaleDocument {
    pub data: LocaleStrings,
}

#[derive(Deserialize)]
struct RawLocaleDocument {
    data: serde_json::Map<String, serde_json::Value>,
}

impl LocaleDocument {
    pub fn new(data: LocaleStrings) -> Self {
        Self { data }
    }

    fn from_raw(raw: RawLocaleDocument) -> Self {
        let mut data = LocaleStrings::new();
        for (key, value) in raw.data {
            match serde_json::from_value::<StringInfo>(value) {
                Ok(info) => {
                    data.insert(key, info);
                }
                Err(e) => tracing::warn!(%key, "Skipping malformed string entry: {}", e),
            }
        }
        Self { data }
    }
}

impl Parser for LocaleDocument {
    /// Parses a document, skipping entries that do not decode to a string.
    fn from_reader<R: std::io::BufRead>(reader: R) -> Result<Self, Error> {
        let raw: RawLocaleDocument = serde_json::from_reader(reader).map_err(Error::Parse)?;
        Ok(Self::from_raw(raw))
    }

    fn to_writer<W: std::io::Write>(&self, mut writer: W) -> Result<(), Error> {
        serde_json::to_writer(&mut writer, self).map_err(Error::Parse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(pairs: &[(&str, &str)]) -> LocaleStrings {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), StringInfo::new(*v)))
            .collect()
    }

    fn map(locales: &[(&str, &[(&str, &str)])]) -> TranslationMap {
        locales
            .iter()
            .map(|(locale, pairs)| (locale.to_string(), strings(pairs)))
            .collect()
    }

    #[test]
    fn test_translation_map_get_string() {
        let m = map(&[("fr", &[("hello", "Bonjour")])]);
        assert_eq!(m.get_string("fr", "hello"), Some("Bonjour"));
        assert_eq!(m.get_string("fr", "bye"), None);
        assert_eq!(m.get_string("de", "hello"), None);
        assert!(m.locales().contains("fr"));
    }

    #[test]
    fn test_merged_replace_drops_untouched_keys_of_touched_locale() {
        let existing = map(&[("fr", &[("a", "A"), ("b", "B")]), ("de", &[("a", "DA")])]);
        let incoming = map(&[("fr", &[("a", "A2")])]);

        let result = existing.merged(&incoming, UpdatePolicy::Replace);
        assert_eq!(result.get_string("fr", "a"), Some("A2"));
        assert_eq!(result.get_string("fr", "b"), None);
        assert_eq!(result.get_string("de", "a"), Some("DA"));
    }

    #[test]
    fn test_merged_keep_existing() {
        let existing = map(&[("fr", &[("a", "A")])]);
        let incoming = map(&[("fr", &[("a", "A2"), ("b", "B2")]), ("es", &[("a", "EA")])]);

        let result = existing.merged(&incoming, UpdatePolicy::MergeKeepExisting);
        assert_eq!(result.get_string("fr", "a"), Some("A"));
        assert_eq!(result.get_string("fr", "b"), Some("B2"));
        assert_eq!(result.get_string("es", "a"), Some("EA"));
    }

    #[test]
    fn test_merged_overwrite() {
        let existing = map(&[("fr", &[("a", "A"), ("c", "C")])]);
        let incoming = map(&[("fr", &[("a", "A2"), ("b", "B2")])]);

        let result = existing.merged(&incoming, UpdatePolicy::MergeOverwrite);
        assert_eq!(result.get_string("fr", "a"), Some("A2"));
        assert_eq!(result.get_string("fr", "b"), Some("B2"));
        assert_eq!(result.get_string("fr", "c"), Some("C"));
    }

    #[test]
    fn test_merged_leaves_source_untouched() {
        let existing = map(&[("fr", &[("a", "A")])]);
        let incoming = map(&[("fr", &[("a", "A2")])]);
        let _ = existing.merged(&incoming, UpdatePolicy::MergeOverwrite);
        assert_eq!(existing.get_string("fr", "a"), Some("A"));
    }

    #[test]
    fn test_without_empty_strings() {
        let m = map(&[("fr", &[("a", ""), ("b", "B")]), ("de", &[("a", "")])]);
        let filtered = m.without_empty_strings();
        assert_eq!(filtered.get_string("fr", "b"), Some("B"));
        assert!(!filtered.get("fr").unwrap().contains_key("a"));
        assert!(!filtered.contains_locale("de"));
    }

    #[test]
    fn test_update_policy_from_str() {
        assert_eq!("REPLACE".parse::<UpdatePolicy>().unwrap(), UpdatePolicy::Replace);
        assert_eq!(
            "merge_keep_existing".parse::<UpdatePolicy>().unwrap(),
            UpdatePolicy::MergeKeepExisting
        );
        assert_eq!(
            "merge-overwrite".parse::<UpdatePolicy>().unwrap(),
            UpdatePolicy::MergeOverwrite
        );
        assert!("sometimes".parse::<UpdatePolicy>().is_err());
    }

    #[test]
    fn test_plural_category_from_str() {
        assert_eq!(PluralCategory::from_str("zero").unwrap(), PluralCategory::Zero);
        assert_eq!(PluralCategory::from_str("ONE").unwrap(), PluralCategory::One);
        assert_eq!(PluralCategory::from_str("other").unwrap(), PluralCategory::Other);
        assert!(matches!(
            PluralCategory::from_str("several"),
            Err(Error::NonSupportedPluralType(_))
        ));
    }

    #[test]
    fn test_plural_forms_from_icu() {
        let forms = PluralForms::from_icu("{cnt, plural, one {# apple} other {# apples}}").unwrap();
        assert_eq!(forms.get(PluralCategory::One), Some("# apple"));
        assert_eq!(forms.get(PluralCategory::Other), Some("# apples"));
        assert_eq!(forms.forms.len(), 2);
    }

    #[test]
    fn test_plural_forms_to_icu_orders_categories() {
        let forms = PluralForms::new([
            (PluralCategory::Other, "many".to_string()),
            (PluralCategory::One, "one".to_string()),
        ]);
        assert_eq!(forms.to_icu(), "{cnt, plural, one {one} other {many}}");
        assert_eq!(PluralForms::from_icu(&forms.to_icu()).unwrap(), forms);
    }

    #[test]
    fn test_plural_forms_rejects_unknown_category() {
        let result = PluralForms::from_icu("{cnt, plural, one {a} several {b}}");
        assert!(matches!(result, Err(Error::NonSupportedPluralType(t)) if t == "several"));
    }

    #[test]
    fn test_plural_forms_rejects_plain_text() {
        assert!(matches!(
            PluralForms::from_icu("Hello"),
            Err(Error::InvalidPlurals(_))
        ));
    }

    #[test]
    fn test_string_info_is_plural() {
        assert!(StringInfo::new("{cnt, plural, other {x}}").is_plural());
        assert!(!StringInfo::new("Hello {name}").is_plural());
        let flagged = StringInfo::with_meta(
            "x",
            Meta {
                plural: true,
                ..Meta::default()
            },
        );
        assert!(flagged.is_plural());
    }

    #[test]
    fn test_string_info_append_tags() {
        let mut info = StringInfo::new("Hello");
        info.append_tags(["a", "b"]);
        info.append_tags(vec!["b".to_string(), "c".to_string()]);
        assert_eq!(info.meta.tags.len(), 3);
    }

    #[test]
    fn test_string_info_serialization_omits_default_meta() {
        let json = serde_json::to_string(&StringInfo::new("Hi")).unwrap();
        assert_eq!(json, r#"{"string":"Hi"}"#);
    }

    #[test]
    fn test_job_state_from_wire() {
        assert_eq!("processing".parse::<JobState>().unwrap(), JobState::Pending);
        assert_eq!("completed".parse::<JobState>().unwrap(), JobState::Completed);
        assert_eq!("failed".parse::<JobState>().unwrap(), JobState::Failed);
        match "lost".parse::<JobState>() {
            Err(Error::Parse(e)) => assert!(e.to_string().contains("unknown job status: lost")),
            other => panic!("expected a parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_job_state_transitions() {
        assert!(JobState::Pending.can_transition_to(JobState::Completed));
        assert!(JobState::Pending.can_transition_to(JobState::Pending));
        assert!(!JobState::Completed.can_transition_to(JobState::Pending));
        assert!(!JobState::Failed.can_transition_to(JobState::Completed));
        assert!(JobState::Failed.is_terminal());
    }

    #[test]
    fn test_job_details_counts() {
        let details = JobDetails {
            created: 2,
            updated: 1,
            skipped: 1,
            deleted: 0,
            failed: 1,
        };
        assert_eq!(details.processed(), 4);
        assert_eq!(details.total(), 5);
    }

    #[test]
    fn test_locale_document_skips_malformed_entries() {
        let json = r#"{"data": {"ok": {"string": "Fine"}, "bad": {"text": 3}, "nul": {"string": null}}}"#;
        let document = LocaleDocument::from_str(json).unwrap();
        assert_eq!(document.data.len(), 1);
        assert_eq!(document.data.get("ok"), Some("Fine"));
    }

    #[test]
    fn test_locale_document_requires_data() {
        assert!(matches!(
            LocaleDocument::from_str(r#"{"strings": {}}"#),
            Err(Error::Parse(_))
        ));
    }
}
