/// Error types for the i18n runtime
#[derive(Debug, thiserror::Error)]
pub enum I18nError {
    /// Reading the persisted preference failed
    #[error("Persistence read error: {0}")]
    PersistenceRead(String),
    /// Writing the persisted preference failed
    #[error("Persistence write error: {0}")]
    PersistenceWrite(String),
    /// The translation resource could not be fetched (network, I/O or HTTP status)
    #[error("Translation fetch error: {0}")]
    TranslationFetch(String),
    /// The translation resource was fetched but is malformed
    #[error("Translation parse error: {0}")]
    TranslationParse(String),
    /// Language code contains characters that cannot address a resource
    #[error("Invalid language code: {0}")]
    InvalidLanguage(String),
    /// A DOM operation failed
    #[error("DOM error: {0}")]
    Dom(String),
    /// A newer language change completed first; this one was discarded
    #[error("Language change to '{0}' was superseded by a newer request")]
    Superseded(String),
    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for I18nError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            I18nError::TranslationParse(err.to_string())
        } else {
            I18nError::TranslationFetch(err.to_string())
        }
    }
}

impl From<serde_json::Error> for I18nError {
    fn from(err: serde_json::Error) -> Self {
        I18nError::TranslationParse(err.to_string())
    }
}

/// Result type for i18n operations
pub type I18nResult<T> = Result<T, I18nError>;
