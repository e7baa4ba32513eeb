//! Language codes and the catalog of languages offered to the user.

use crate::error::{I18nError, I18nResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque language identifier such as `en` or `zh_CN`.
///
/// Any string is accepted; codes that are not in [`available_languages`]
/// are allowed and may simply fail to load.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LanguageCode(String);

impl LanguageCode {
    pub fn new(code: impl Into<String>) -> Self {
        LanguageCode(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check that the code is safe to use as a path or URL segment
    ///
    /// Accepts ASCII alphanumerics, hyphens and underscores.
    ///
    /// # Example
    ///
    /// ```
    /// use page_i18n::LanguageCode;
    ///
    /// assert!(LanguageCode::new("zh_CN").validate().is_ok());
    /// assert!(LanguageCode::new("../en").validate().is_err());
    /// ```
    pub fn validate(&self) -> I18nResult<()> {
        if self.0.is_empty() {
            return Err(I18nError::InvalidLanguage(
                "Language code is empty".to_string(),
            ));
        }

        if !self
            .0
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(I18nError::InvalidLanguage(format!(
                "Invalid characters in language code: {}",
                self.0
            )));
        }

        Ok(())
    }
}

impl fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LanguageCode {
    fn from(code: &str) -> Self {
        LanguageCode::new(code)
    }
}

impl From<String> for LanguageCode {
    fn from(code: String) -> Self {
        LanguageCode(code)
    }
}

impl PartialEq<str> for LanguageCode {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for LanguageCode {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// An entry of the language picker
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AvailableLanguage {
    pub code: &'static str,
    /// Name of the language in that language
    pub name: &'static str,
}

/// Hard-coded catalog of languages shown in the UI.
///
/// Not derived from the translation files that actually exist.
pub fn available_languages() -> Vec<AvailableLanguage> {
    vec![
        AvailableLanguage {
            code: "en",
            name: "English",
        },
        AvailableLanguage {
            code: "zh_CN",
            name: "简体中文",
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_common_codes() {
        for code in ["en", "zh_CN", "pt-BR", "sr-Latn"] {
            assert!(LanguageCode::new(code).validate().is_ok(), "{code}");
        }
    }

    #[test]
    fn test_validate_rejects_path_segments() {
        assert!(LanguageCode::new("").validate().is_err());
        assert!(LanguageCode::new("../etc").validate().is_err());
        assert!(LanguageCode::new("en/US").validate().is_err());
        assert!(LanguageCode::new("en?x=1").validate().is_err());
    }

    #[test]
    fn test_validate_error_message() {
        match LanguageCode::new("en@US").validate() {
            Err(I18nError::InvalidLanguage(msg)) => {
                assert!(msg.contains("Invalid characters"));
            }
            other => panic!("Expected InvalidLanguage error, got {:?}", other),
        }
    }

    #[test]
    fn test_catalog() {
        let codes: Vec<&str> = available_languages().iter().map(|l| l.code).collect();
        assert_eq!(codes, vec!["en", "zh_CN"]);
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let json = serde_json::to_string(&LanguageCode::new("zh_CN")).unwrap();
        assert_eq!(json, "\"zh_CN\"");
    }
}
