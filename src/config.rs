//! Runtime configuration
//!
//! Settings come from the environment:
//!
//! | Variable                  | Default            |
//! |---------------------------|--------------------|
//! | `I18N_DEFAULT_LANGUAGE`   | `en`               |
//! | `I18N_LOCALES`            | `.`                |
//! | `I18N_PREFERENCES`        | `preferences.json` |
//! | `I18N_FETCH_TIMEOUT_SECS` | `30`               |
//!
//! `I18N_LOCALES` is either an `http(s)://` base URL or a directory; in both
//! cases it is the root that contains `_locales/`.

use crate::error::{I18nError, I18nResult};
use crate::loader::{FileTranslationSource, HttpTranslationSource, TranslationSource};
use crate::manager::{DEFAULT_LANGUAGE, I18nManagerBuilder};
use crate::persistence::JsonFileStore;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct I18nConfig {
    pub default_language: String,
    pub locales: String,
    pub preferences: PathBuf,
    pub fetch_timeout_secs: u64,
}

impl Default for I18nConfig {
    fn default() -> Self {
        Self {
            default_language: DEFAULT_LANGUAGE.to_string(),
            locales: ".".to_string(),
            preferences: PathBuf::from("preferences.json"),
            fetch_timeout_secs: 30,
        }
    }
}

impl I18nConfig {
    /// Load settings from the process environment
    pub fn from_env() -> I18nResult<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Load settings through `lookup`, falling back to defaults
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> I18nResult<Self> {
        let mut config = Self::default();

        if let Some(language) = lookup("I18N_DEFAULT_LANGUAGE") {
            config.default_language = language;
        }
        if let Some(locales) = lookup("I18N_LOCALES") {
            config.locales = locales;
        }
        if let Some(preferences) = lookup("I18N_PREFERENCES") {
            config.preferences = PathBuf::from(preferences);
        }
        if let Some(timeout) = lookup("I18N_FETCH_TIMEOUT_SECS") {
            config.fetch_timeout_secs = timeout.trim().parse().map_err(|_| {
                I18nError::Config(format!(
                    "I18N_FETCH_TIMEOUT_SECS must be a whole number of seconds, got '{}'",
                    timeout
                ))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> I18nResult<()> {
        if self.default_language.trim().is_empty() {
            return Err(I18nError::Config(
                "Default language cannot be empty".to_string(),
            ));
        }
        if self.locales.trim().is_empty() {
            return Err(I18nError::Config(
                "Locales location cannot be empty".to_string(),
            ));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(I18nError::Config(
                "Fetch timeout must be at least one second".to_string(),
            ));
        }
        Ok(())
    }

    pub fn is_remote(&self) -> bool {
        self.locales.starts_with("http://") || self.locales.starts_with("https://")
    }

    /// Translation source for the configured locales location
    pub fn translation_source(&self) -> I18nResult<Arc<dyn TranslationSource>> {
        if self.is_remote() {
            let source = HttpTranslationSource::with_timeout(
                self.locales.clone(),
                Duration::from_secs(self.fetch_timeout_secs),
            )?;
            Ok(Arc::new(source))
        } else {
            Ok(Arc::new(FileTranslationSource::new(&self.locales)))
        }
    }

    /// Manager builder wired with the configured source and preference file
    pub fn manager_builder(&self) -> I18nResult<I18nManagerBuilder> {
        self.validate()?;
        Ok(crate::I18nManager::builder()
            .with_store(Arc::new(JsonFileStore::new(&self.preferences)))
            .with_source(self.translation_source()?)
            .with_default_language(self.default_language.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = I18nConfig::from_vars(vars(&[])).unwrap();
        assert_eq!(config, I18nConfig::default());
        assert!(!config.is_remote());
    }

    #[test]
    fn test_overrides() {
        let config = I18nConfig::from_vars(vars(&[
            ("I18N_DEFAULT_LANGUAGE", "zh_CN"),
            ("I18N_LOCALES", "https://example.org/ext"),
            ("I18N_PREFERENCES", "/tmp/prefs.json"),
            ("I18N_FETCH_TIMEOUT_SECS", " 5 "),
        ]))
        .unwrap();

        assert_eq!(config.default_language, "zh_CN");
        assert!(config.is_remote());
        assert_eq!(config.preferences, PathBuf::from("/tmp/prefs.json"));
        assert_eq!(config.fetch_timeout_secs, 5);
        assert_eq!(config.translation_source().unwrap().source_name(), "HTTP");
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            I18nConfig::from_vars(vars(&[("I18N_FETCH_TIMEOUT_SECS", "soon")])),
            Err(I18nError::Config(_))
        ));
        assert!(matches!(
            I18nConfig::from_vars(vars(&[("I18N_FETCH_TIMEOUT_SECS", "0")])),
            Err(I18nError::Config(_))
        ));
        assert!(matches!(
            I18nConfig::from_vars(vars(&[("I18N_DEFAULT_LANGUAGE", " ")])),
            Err(I18nError::Config(_))
        ));
    }

    #[test]
    fn test_deserialize_partial() {
        let config: I18nConfig = serde_json::from_str(r#"{"default_language": "zh_CN"}"#).unwrap();
        assert_eq!(config.default_language, "zh_CN");
        assert_eq!(config.fetch_timeout_secs, 30);
        assert_eq!(
            config.translation_source().unwrap().source_name(),
            "file"
        );
    }
}
