use std::collections::{BTreeMap, BTreeSet};

use unic_langid::LanguageIdentifier;

use crate::{
    error::Error,
    types::{LocaleStrings, PluralCategory, PluralForms},
};

use lazy_static::lazy_static;
use serde::Serialize;

/// CLDR cardinal rule families, evaluated on integer quantities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PluralRule {
    OtherOnly,
    /// one: n = 1
    OneIsOne,
    /// one: i = 0,1
    OneIsZeroOrOne,
    EastSlavic,
    SouthSlavic,
    Polish,
    CzechSlovak,
    Slovenian,
    Lithuanian,
    Latvian,
    Irish,
    Romanian,
    Arabic,
    Hebrew,
}

impl PluralRule {
    fn categories(self) -> BTreeSet<PluralCategory> {
        use PluralCategory::*;
        let items: &[PluralCategory] = match self {
            PluralRule::OtherOnly => &[Other],
            PluralRule::OneIsOne | PluralRule::OneIsZeroOrOne => &[One, Other],
            PluralRule::EastSlavic | PluralRule::Polish => &[One, Few, Many, Other],
            PluralRule::SouthSlavic
            | PluralRule::CzechSlovak
            | PluralRule::Lithuanian
            | PluralRule::Romanian => &[One, Few, Other],
            PluralRule::Slovenian => &[One, Two, Few, Other],
            PluralRule::Latvian => &[Zero, One, Other],
            PluralRule::Irish => &[One, Two, Few, Many, Other],
            PluralRule::Arabic => &[Zero, One, Two, Few, Many, Other],
            PluralRule::Hebrew => &[One, Two, Many, Other],
        };
        items.iter().copied().collect()
    }

    fn category(self, n: u64) -> PluralCategory {
        use PluralCategory::*;
        let n10 = n % 10;
        let n100 = n % 100;
        match self {
            PluralRule::OtherOnly => Other,
            PluralRule::OneIsOne => {
                if n == 1 {
                    One
                } else {
                    Other
                }
            }
            PluralRule::OneIsZeroOrOne => {
                if n <= 1 {
                    One
                } else {
                    Other
                }
            }
            PluralRule::EastSlavic => {
                if n10 == 1 && n100 != 11 {
                    One
                } else if (2..=4).contains(&n10) && !(12..=14).contains(&n100) {
                    Few
                } else {
                    Many
                }
            }
            PluralRule::SouthSlavic => {
                if n10 == 1 && n100 != 11 {
                    One
                } else if (2..=4).contains(&n10) && !(12..=14).contains(&n100) {
                    Few
                } else {
                    Other
                }
            }
            PluralRule::Polish => {
                if n == 1 {
                    One
                } else if (2..=4).contains(&n10) && !(12..=14).contains(&n100) {
                    Few
                } else {
                    Many
                }
            }
            PluralRule::CzechSlovak => match n {
                1 => One,
                2..=4 => Few,
                _ => Other,
            },
            PluralRule::Slovenian => match n100 {
                1 => One,
                2 => Two,
                3 | 4 => Few,
                _ => Other,
            },
            PluralRule::Lithuanian => {
                if (11..=19).contains(&n100) {
                    Other
                } else if n10 == 1 {
                    One
                } else if n10 >= 2 {
                    Few
                } else {
                    Other
                }
            }
            PluralRule::Latvian => {
                if n10 == 0 || (11..=19).contains(&n100) {
                    Zero
                } else if n10 == 1 {
                    One
                } else {
                    Other
                }
            }
            PluralRule::Irish => match n {
                1 => One,
                2 => Two,
                3..=6 => Few,
                7..=10 => Many,
                _ => Other,
            },
            PluralRule::Romanian => {
                if n == 1 {
                    One
                } else if n == 0 || (2..=19).contains(&n100) {
                    Few
                } else {
                    Other
                }
            }
            PluralRule::Arabic => match (n, n100) {
                (0, _) => Zero,
                (1, _) => One,
                (2, _) => Two,
                (_, 3..=10) => Few,
                (_, 11..=99) => Many,
                _ => Other,
            },
            PluralRule::Hebrew => match n {
                1 => One,
                2 => Two,
                n if n > 10 && n10 == 0 => Many,
                _ => Other,
            },
        }
    }
}

lazy_static! {
    /// Base language subtag → cardinal rule family.
    static ref RULE_TABLE: BTreeMap<&'static str, PluralRule> = {
        let mut m = BTreeMap::new();

        for code in [
            "en", "de", "nl", "sv", "da", "nb", "nn", "no", "is", "fi", "et", "it", "es",
            "el", "eu", "gl", "af", "sw", "ur", "tr", "ca", "bg", "hu", "sq", "az", "ka",
            "kk", "mn", "ne", "ta", "te", "ml", "mr", "or",
        ] {
            m.insert(code, PluralRule::OneIsOne);
        }

        for code in ["fr", "pt", "hi", "fa", "bn", "gu", "kn", "hy", "kab", "zu", "am"] {
            m.insert(code, PluralRule::OneIsZeroOrOne);
        }

        for code in ["ja", "zh", "ko", "th", "vi", "km", "lo", "my", "yue", "id", "ms"] {
            m.insert(code, PluralRule::OtherOnly);
        }

        for code in ["ru", "uk", "be"] {
            m.insert(code, PluralRule::EastSlavic);
        }

        for code in ["hr", "sr", "bs", "sh"] {
            m.insert(code, PluralRule::SouthSlavic);
        }

        m.insert("pl", PluralRule::Polish);
        for code in ["cs", "sk"] {
            m.insert(code, PluralRule::CzechSlovak);
        }
        m.insert("sl", PluralRule::Slovenian);
        m.insert("lt", PluralRule::Lithuanian);
        m.insert("lv", PluralRule::Latvian);
        m.insert("ga", PluralRule::Irish);
        m.insert("ro", PluralRule::Romanian);
        m.insert("ar", PluralRule::Arabic);

        // iw is the legacy code for Hebrew
        for code in ["he", "iw"] {
            m.insert(code, PluralRule::Hebrew);
        }

        m
    };
}

/// Non-fatal report describing a plural string rejected for a locale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluralValidationReport {
    pub language: String,
    pub key: String,
    pub missing: BTreeSet<PluralCategory>,
    pub have: BTreeSet<PluralCategory>,
    /// Set when the string could not be parsed as an ICU plural at all.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_error: Option<String>,
}

/// Parses a locale code, accepting underscores as separators.
pub fn parse_locale(locale: &str) -> Option<LanguageIdentifier> {
    locale.replace('_', "-").parse().ok()
}

fn rule_for(locale: &str) -> Option<PluralRule> {
    let language = match parse_locale(locale) {
        Some(id) => id.language.as_str().to_string(),
        None => locale
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase(),
    };
    RULE_TABLE.get(language.as_str()).copied()
}

/// Returns the CLDR plural category `quantity` falls into for `locale`.
///
/// Unknown languages always yield `Other`.
pub fn category_for(locale: &str, quantity: u64) -> PluralCategory {
    rule_for(locale).map_or(PluralCategory::Other, |rule| rule.category(quantity))
}

/// Returns the required CLDR plural categories for a given language identifier.
///
/// For unknown or unsupported locales, falls back to {Other} to avoid false positives.
pub fn required_categories_for(lang: &LanguageIdentifier) -> BTreeSet<PluralCategory> {
    RULE_TABLE
        .get(lang.language.as_str())
        .map(|rule| rule.categories())
        .unwrap_or_else(|| [PluralCategory::Other].into_iter().collect())
}

/// Helper for string language codes (accepts underscores, normalizes to hyphen).
pub fn required_categories_for_str(locale: &str) -> BTreeSet<PluralCategory> {
    rule_for(locale)
        .map(|rule| rule.categories())
        .unwrap_or_else(|| [PluralCategory::Other].into_iter().collect())
}

/// Checks that `forms` carries every category `locale` requires. Extras are allowed.
pub fn validate_plural_forms(forms: &PluralForms, locale: &str) -> Result<(), Error> {
    let have = forms.categories();
    let missing = &required_categories_for_str(locale) - &have;
    if missing.is_empty() {
        return Ok(());
    }
    let miss: Vec<&str> = missing.iter().map(|c| c.as_str()).collect();
    Err(Error::InvalidPlurals(format!(
        "lang='{}': missing plural categories: [{}]",
        locale,
        miss.join(", ")
    )))
}

/// Collects plural strings of `strings` that are malformed or incomplete for `locale`.
pub fn collect_plural_issues(locale: &str, strings: &LocaleStrings) -> Vec<PluralValidationReport> {
    let required = required_categories_for_str(locale);
    let mut reports = Vec::new();
    for (key, info) in strings.iter() {
        if !info.is_plural() {
            continue;
        }
        match PluralForms::from_icu(&info.string) {
            Ok(forms) => {
                let have = forms.categories();
                let missing = &required - &have;
                if !missing.is_empty() {
                    reports.push(PluralValidationReport {
                        language: locale.to_string(),
                        key: key.clone(),
                        missing,
                        have,
                        parse_error: None,
                    });
                }
            }
            Err(e) => reports.push(PluralValidationReport {
                language: locale.to_string(),
                key: key.clone(),
                missing: required.clone(),
                have: BTreeSet::new(),
                parse_error: Some(e.to_string()),
            }),
        }
    }
    reports
}

/// Removes invalid plural strings from `strings`, logging each one.
///
/// Returns the reports of the removed entries.
pub fn retain_valid_plurals(locale: &str, strings: &mut LocaleStrings) -> Vec<PluralValidationReport> {
    let reports = collect_plural_issues(locale, strings);
    for report in &reports {
        tracing::warn!(
            locale,
            key = %report.key,
            missing = ?report.missing,
            parse_error = ?report.parse_error,
            "Skipping invalid plural string"
        );
        strings.remove(&report.key);
    }
    reports
}
