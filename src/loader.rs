//! Translation loading
//!
//! A [`TranslationSource`] produces the [`TranslationTable`] of one language.
//! Resources follow the extension layout `_locales/<code>/messages.json`
//! and may be fetched over HTTP, read from disk, or served from memory.

use crate::error::{I18nError, I18nResult};
use crate::language::LanguageCode;
use crate::table::{TranslationEntry, TranslationTable};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

/// Directory that holds one sub-directory per language
pub const LOCALES_DIR: &str = "_locales";

/// File name of a language's translation resource
pub const MESSAGES_FILE: &str = "messages.json";

/// Generic trait for translation table providers
///
/// All methods are async to support network and disk I/O.
#[async_trait]
pub trait TranslationSource: Send + Sync {
    /// Fetch and parse the translation table of `language`
    ///
    /// # Returns
    ///
    /// * `Ok(TranslationTable)` - The parsed table
    /// * `Err(I18nError::TranslationFetch)` - The resource could not be retrieved
    /// * `Err(I18nError::TranslationParse)` - The resource is malformed
    /// * `Err(I18nError::InvalidLanguage)` - The code cannot address a resource
    async fn fetch(&self, language: &LanguageCode) -> I18nResult<TranslationTable>;

    /// Name of this source, for logging
    fn source_name(&self) -> &str;
}

/// Parse the content of a `messages.json` resource
///
/// The JSON should have the following structure:
/// ```json
/// {
///     "@metadata": { ... },
///     "plain-key": "message text",
///     "rich-key": { "message": "Hello $name$", "description": "..." }
/// }
/// ```
///
/// Keys starting with `@` are ignored. Values that are neither a string nor
/// an object with a string `message` are skipped with a warning.
///
/// # Errors
/// - Invalid JSON
/// - Root is not an object
pub fn parse_table(content: &str) -> I18nResult<TranslationTable> {
    let json: Value = serde_json::from_str(content)?;

    let Value::Object(obj) = json else {
        return Err(I18nError::TranslationParse(
            "root must be an object".to_string(),
        ));
    };

    let mut table = TranslationTable::new();
    for (key, value) in obj {
        if key.starts_with('@') {
            continue;
        }

        match serde_json::from_value::<TranslationEntry>(value) {
            Ok(entry) => table.insert(&key, entry),
            Err(_) => warn!("Translation '{}' has no string message, skipping", key),
        }
    }

    Ok(table)
}

/// Fetches `<base>/_locales/<code>/messages.json` over HTTP
#[derive(Clone)]
pub struct HttpTranslationSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTranslationSource {
    const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(base_url: impl Into<String>) -> I18nResult<Self> {
        Self::with_timeout(base_url, Self::DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> I18nResult<Self> {
        let base_url = base_url.into();
        if base_url.trim().is_empty() {
            return Err(I18nError::Config("Base URL cannot be empty".to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| I18nError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// URL of the resource for `language`
    pub fn resource_url(&self, language: &LanguageCode) -> String {
        format!(
            "{}/{}/{}/{}",
            self.base_url, LOCALES_DIR, language, MESSAGES_FILE
        )
    }
}

#[async_trait]
impl TranslationSource for HttpTranslationSource {
    async fn fetch(&self, language: &LanguageCode) -> I18nResult<TranslationTable> {
        language.validate()?;

        let url = self.resource_url(language);
        debug!("Fetching translations from {}", url);

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(I18nError::TranslationFetch(format!(
                "Failed to load translations for {} ({})",
                language,
                response.status()
            )));
        }

        let body = response.text().await?;
        parse_table(&body)
    }

    fn source_name(&self) -> &str {
        "HTTP"
    }
}

/// Reads `<root>/_locales/<code>/messages.json` from disk
///
/// `root` is the directory of an unpacked extension.
#[derive(Debug, Clone)]
pub struct FileTranslationSource {
    root: PathBuf,
}

impl FileTranslationSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn resource_path(&self, language: &LanguageCode) -> PathBuf {
        self.root
            .join(LOCALES_DIR)
            .join(language.as_str())
            .join(MESSAGES_FILE)
    }
}

#[async_trait]
impl TranslationSource for FileTranslationSource {
    async fn fetch(&self, language: &LanguageCode) -> I18nResult<TranslationTable> {
        language.validate()?;

        let path = self.resource_path(language);
        let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
            I18nError::TranslationFetch(format!("Failed to read file '{}': {}", path.display(), e))
        })?;

        parse_table(&content).map_err(|e| match e {
            I18nError::TranslationParse(msg) => {
                I18nError::TranslationParse(format!("'{}': {}", path.display(), msg))
            }
            other => other,
        })
    }

    fn source_name(&self) -> &str {
        "file"
    }
}

/// In-memory source for tests and embedding
///
/// Languages without a table fail like a missing resource would.
/// Failures and latency can be simulated per language.
#[derive(Debug, Default)]
pub struct StaticTranslationSource {
    tables: HashMap<LanguageCode, TranslationTable>,
    failures: HashMap<LanguageCode, FailureKind>,
    delays: HashMap<LanguageCode, Duration>,
    fetches: AtomicUsize,
}

/// Failure a [`StaticTranslationSource`] simulates for a language
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Fetch,
    Parse,
}

impl StaticTranslationSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, language: &str, table: TranslationTable) -> Self {
        self.tables.insert(LanguageCode::new(language), table);
        self
    }

    pub fn with_failure(mut self, language: &str, kind: FailureKind) -> Self {
        self.failures.insert(LanguageCode::new(language), kind);
        self
    }

    pub fn with_delay(mut self, language: &str, delay: Duration) -> Self {
        self.delays.insert(LanguageCode::new(language), delay);
        self
    }

    /// Number of fetches attempted so far
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TranslationSource for StaticTranslationSource {
    async fn fetch(&self, language: &LanguageCode) -> I18nResult<TranslationTable> {
        self.fetches.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delays.get(language) {
            tokio::time::sleep(*delay).await;
        }

        match self.failures.get(language) {
            Some(FailureKind::Fetch) => {
                return Err(I18nError::TranslationFetch(format!(
                    "Simulated fetch failure for {}",
                    language
                )));
            }
            Some(FailureKind::Parse) => {
                return Err(I18nError::TranslationParse(format!(
                    "Simulated parse failure for {}",
                    language
                )));
            }
            None => {}
        }

        self.tables.get(language).cloned().ok_or_else(|| {
            I18nError::TranslationFetch(format!("Failed to load translations for {}", language))
        })
    }

    fn source_name(&self) -> &str {
        "static"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_and_structured() {
        let table = parse_table(
            r#"{
                "@metadata": { "authors": ["someone"] },
                "title": "Dog gallery",
                "greet": { "message": "Hello $name$", "description": "Greeting" }
            }"#,
        )
        .unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.lookup("title"), "Dog gallery");
        assert_eq!(table.lookup("greet"), "Hello $name$");
        assert!(table.get("@metadata").is_none());
    }

    #[test]
    fn test_parse_skips_unusable_entries() {
        let table = parse_table(r#"{"ok": "yes", "num": 3, "obj": {"text": "no"}}"#).unwrap();
        assert_eq!(table.keys().collect::<Vec<_>>(), vec!["ok"]);
    }

    #[test]
    fn test_parse_keeps_message_with_any_metadata() {
        let table = parse_table(
            r#"{
                "title": { "message": "Dog gallery", "description": ["Page", "title"] },
                "count": { "message": "$n$ dogs", "description": 3, "placeholders": { "n": { "content": "$1" } } },
                "note": { "message": "Saved", "description": null, "hint": { "x": 1 } }
            }"#,
        )
        .unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(table.lookup("title"), "Dog gallery");
        assert_eq!(table.lookup("count"), "$n$ dogs");
        assert_eq!(table.lookup("note"), "Saved");
    }

    #[test]
    fn test_parse_rejects_non_object_root() {
        assert!(matches!(
            parse_table("[1, 2]"),
            Err(I18nError::TranslationParse(_))
        ));
        assert!(matches!(
            parse_table("not json"),
            Err(I18nError::TranslationParse(_))
        ));
    }

    #[test]
    fn test_resource_url() {
        let source = HttpTranslationSource::new("http://localhost:8080/ext/").unwrap();
        assert_eq!(
            source.resource_url(&LanguageCode::new("zh_CN")),
            "http://localhost:8080/ext/_locales/zh_CN/messages.json"
        );
    }

    #[test]
    fn test_empty_base_url_is_rejected() {
        assert!(matches!(
            HttpTranslationSource::new("  "),
            Err(I18nError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_http_rejects_invalid_code_before_request() {
        let source = HttpTranslationSource::new("http://127.0.0.1:9").unwrap();
        let result = source.fetch(&LanguageCode::new("../secret")).await;
        assert!(matches!(result, Err(I18nError::InvalidLanguage(_))));
    }

    #[tokio::test]
    async fn test_static_source() {
        let source = StaticTranslationSource::new()
            .with_table("en", TranslationTable::new().with_entry("a", "A"))
            .with_failure("de", FailureKind::Parse);

        let table = source.fetch(&LanguageCode::new("en")).await.unwrap();
        assert_eq!(table.lookup("a"), "A");

        assert!(matches!(
            source.fetch(&LanguageCode::new("de")).await,
            Err(I18nError::TranslationParse(_))
        ));
        assert!(matches!(
            source.fetch(&LanguageCode::new("fr")).await,
            Err(I18nError::TranslationFetch(_))
        ));
        assert_eq!(source.fetch_count(), 3);
    }
}
