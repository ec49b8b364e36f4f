//! Locale negotiation and the active-locale state.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::plural_rules::parse_locale;

fn normalize(code: &str) -> String {
    code.trim().replace('_', "-").to_ascii_lowercase()
}

fn language_of(code: &str) -> String {
    match parse_locale(code) {
        Some(id) => id.language.as_str().to_string(),
        None => normalize(code)
            .split('-')
            .next()
            .unwrap_or_default()
            .to_string(),
    }
}

/// Picks the best entry of `available` for `requested`.
///
/// An exact match wins (case-insensitive, `_` and `-` equivalent), then an
/// entry with the same language, preferring the bare language code over other
/// regions. Without any match, `fallback` is returned.
pub fn negotiate(requested: &str, available: &[String], fallback: &str) -> String {
    let wanted = normalize(requested);
    if let Some(exact) = available.iter().find(|code| normalize(code) == wanted) {
        return exact.clone();
    }

    let language = language_of(requested);
    let same_language: Vec<&String> = available
        .iter()
        .filter(|code| language_of(code) == language)
        .collect();
    if let Some(bare) = same_language.iter().find(|code| normalize(code) == language) {
        return (*bare).clone();
    }
    if let Some(first) = same_language.first() {
        return (*first).clone();
    }
    fallback.to_string()
}

type LocaleObserver = dyn Fn(&str, &str) + Send + Sync;

#[derive(Debug, Clone)]
struct Selection {
    /// Locale reported by the host system.
    system: String,
    /// Locale chosen by the application, overriding the system one.
    pinned: Option<String>,
    resolved: String,
}

impl Selection {
    fn current(&self) -> &str {
        self.pinned.as_deref().unwrap_or(&self.system)
    }
}

/// Source, supported and active locales of the application.
///
/// Observers run synchronously, on the caller's thread, only when the active
/// locale actually changes. They receive the active and the resolved locale.
pub struct LocaleState {
    source_locale: String,
    app_locales: Vec<String>,
    translated_locales: Vec<String>,
    selection: RwLock<Selection>,
    observers: RwLock<Vec<Arc<LocaleObserver>>>,
}

impl std::fmt::Debug for LocaleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocaleState")
            .field("source_locale", &self.source_locale)
            .field("app_locales", &self.app_locales)
            .field("selection", &*self.selection.read())
            .finish_non_exhaustive()
    }
}

impl LocaleState {
    /// `source_locale` defaults to `en`; it is prepended to `app_locales` when missing.
    /// The state starts out following `system_locale`.
    pub fn new(source_locale: Option<&str>, app_locales: &[String], system_locale: &str) -> Self {
        let source_locale = source_locale
            .filter(|code| !code.trim().is_empty())
            .unwrap_or("en")
            .to_string();

        let mut locales = Vec::with_capacity(app_locales.len() + 1);
        locales.push(source_locale.clone());
        for code in app_locales {
            if !locales.iter().any(|known| normalize(known) == normalize(code)) {
                locales.push(code.clone());
            }
        }
        let translated_locales = locales
            .iter()
            .filter(|code| normalize(code) != normalize(&source_locale))
            .cloned()
            .collect();
        let resolved = negotiate(system_locale, &locales, &source_locale);

        Self {
            source_locale,
            app_locales: locales,
            translated_locales,
            selection: RwLock::new(Selection {
                system: system_locale.to_string(),
                pinned: None,
                resolved,
            }),
            observers: RwLock::new(Vec::new()),
        }
    }

    pub fn source_locale(&self) -> &str {
        &self.source_locale
    }

    /// Supported locales, source locale first.
    pub fn app_locales(&self) -> &[String] {
        &self.app_locales
    }

    /// Supported locales other than the source locale.
    pub fn translated_locales(&self) -> &[String] {
        &self.translated_locales
    }

    /// The active locale as requested, before negotiation.
    pub fn current_locale(&self) -> String {
        self.selection.read().current().to_string()
    }

    /// The active locale negotiated against the supported locales.
    pub fn resolved_locale(&self) -> String {
        self.selection.read().resolved.clone()
    }

    pub fn is_source_locale(&self) -> bool {
        normalize(&self.resolved_locale()) == normalize(&self.source_locale)
    }

    /// Negotiates any locale code against the supported locales.
    pub fn resolve(&self, locale: &str) -> String {
        negotiate(locale, &self.app_locales, &self.source_locale)
    }

    pub fn subscribe<F>(&self, observer: F)
    where
        F: Fn(&str, &str) + Send + Sync + 'static,
    {
        self.observers.write().push(Arc::new(observer));
    }

    /// Pins the active locale, or follows the system locale again with `None`.
    pub fn set_locale(&self, locale: Option<&str>) {
        self.apply(|selection| selection.pinned = locale.map(str::to_string));
    }

    /// Reports a change of the system locale. Has no visible effect while a
    /// locale is pinned.
    pub fn notify_locale_changed(&self, system_locale: &str) {
        self.apply(|selection| selection.system = system_locale.to_string());
    }

    fn apply(&self, change: impl FnOnce(&mut Selection)) {
        let notification = {
            let mut selection = self.selection.write();
            let before = selection.current().to_string();
            change(&mut selection);
            let after = selection.current().to_string();
            if normalize(&before) == normalize(&after) {
                None
            } else {
                selection.resolved = negotiate(&after, &self.app_locales, &self.source_locale);
                Some((after, selection.resolved.clone()))
            }
        };

        if let Some((current, resolved)) = notification {
            tracing::info!(locale = %current, resolved = %resolved, "Locale changed");
            let observers: Vec<Arc<LocaleObserver>> = self.observers.read().clone();
            for observer in observers {
                observer(&current, &resolved);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn locales(codes: &[&str]) -> Vec<String> {
        codes.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_negotiate_exact_match() {
        let available = locales(&["en", "fr_CA", "de"]);
        assert_eq!(negotiate("fr-ca", &available, "en"), "fr_CA");
        assert_eq!(negotiate("DE", &available, "en"), "de");
    }

    #[test]
    fn test_negotiate_prefers_bare_language() {
        let available = locales(&["en", "pt_PT", "pt", "pt_BR"]);
        assert_eq!(negotiate("pt_AO", &available, "en"), "pt");
    }

    #[test]
    fn test_negotiate_other_region() {
        let available = locales(&["en", "es_ES", "es_MX"]);
        assert_eq!(negotiate("es_AR", &available, "en"), "es_ES");
        assert_eq!(negotiate("es", &available, "en"), "es_ES");
    }

    #[test]
    fn test_negotiate_fallback() {
        let available = locales(&["en", "fr"]);
        assert_eq!(negotiate("ja_JP", &available, "en"), "en");
        assert_eq!(negotiate("", &available, "en"), "en");
    }

    #[test]
    fn test_source_locale_is_always_an_app_locale() {
        let state = LocaleState::new(None, &locales(&["fr", "de"]), "fr");
        assert_eq!(state.source_locale(), "en");
        assert_eq!(state.app_locales(), &locales(&["en", "fr", "de"])[..]);
        assert_eq!(state.translated_locales(), &locales(&["fr", "de"])[..]);

        let state = LocaleState::new(Some("de"), &locales(&["fr", "de"]), "fr");
        assert_eq!(state.app_locales(), &locales(&["de", "fr"])[..]);
        assert_eq!(state.translated_locales(), &locales(&["fr"])[..]);
    }

    #[test]
    fn test_initial_locale_follows_system() {
        let state = LocaleState::new(None, &locales(&["fr"]), "fr_FR");
        assert_eq!(state.current_locale(), "fr_FR");
        assert_eq!(state.resolved_locale(), "fr");
        assert!(!state.is_source_locale());
    }

    #[test]
    fn test_observers_run_only_on_change() {
        let state = LocaleState::new(None, &locales(&["fr", "de"]), "en");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        state.subscribe(move |current, resolved| {
            sink.lock().push((current.to_string(), resolved.to_string()));
        });

        state.set_locale(Some("fr"));
        state.set_locale(Some("fr"));
        state.notify_locale_changed("de");
        state.set_locale(None);

        assert_eq!(
            *seen.lock(),
            vec![
                ("fr".to_string(), "fr".to_string()),
                ("de".to_string(), "de".to_string()),
            ]
        );
        assert_eq!(state.current_locale(), "de");
    }

    #[test]
    fn test_system_changes_follow_when_not_pinned() {
        let state = LocaleState::new(None, &locales(&["fr", "de"]), "en");
        assert!(state.is_source_locale());
        state.notify_locale_changed("de_AT");
        assert_eq!(state.resolved_locale(), "de");
        assert_eq!(state.resolve("fr_BE"), "fr");
    }
}
