//! Translation tables and key lookup with `$name$` substitution.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;

/// Placeholder name to replacement value, used only at lookup time
pub type Substitutions = HashMap<String, String>;

/// A single translation as found in a `messages.json` resource.
///
/// Either a bare string, or the richer extension format:
/// ```json
/// { "message": "Hello $name$", "description": "Greeting", "placeholders": { ... } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TranslationEntry {
    Plain(String),
    Structured {
        message: String,
        // Translator notes; only `message` is ever read
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<serde_json::Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        placeholders: Option<serde_json::Value>,
    },
}

impl TranslationEntry {
    pub fn message(&self) -> &str {
        match self {
            TranslationEntry::Plain(text) => text,
            TranslationEntry::Structured { message, .. } => message,
        }
    }
}

impl From<&str> for TranslationEntry {
    fn from(text: &str) -> Self {
        TranslationEntry::Plain(text.to_owned())
    }
}

/// Translations of one language, keyed by translation key
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TranslationTable(HashMap<String, TranslationEntry>);

impl TranslationTable {
    pub fn new() -> Self {
        TranslationTable(HashMap::new())
    }

    pub fn with_entry(mut self, key: &str, entry: impl Into<TranslationEntry>) -> Self {
        self.insert(key, entry);
        self
    }

    pub fn insert(&mut self, key: &str, entry: impl Into<TranslationEntry>) {
        self.0.insert(key.to_owned(), entry.into());
    }

    pub fn get(&self, key: &str) -> Option<&TranslationEntry> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Resolve `key` to its message, or to the key itself when there is none.
    ///
    /// An empty message counts as missing so that elements never render blank.
    pub fn lookup<'a>(&'a self, key: &'a str) -> &'a str {
        match self.0.get(key).map(TranslationEntry::message) {
            Some(message) if !message.is_empty() => message,
            _ => key,
        }
    }

    /// Translate `key` and fill in `$name$` placeholders.
    ///
    /// Every occurrence of `$name$` is replaced for each provided name.
    /// Placeholders without a substitution are left as they are.
    ///
    /// # Example
    ///
    /// ```
    /// use page_i18n::{Substitutions, TranslationTable};
    ///
    /// let table = TranslationTable::new().with_entry("greet", "Hello $name$");
    /// let subs = Substitutions::from([("name".to_string(), "Ana".to_string())]);
    /// assert_eq!(table.t("greet", &subs), "Hello Ana");
    /// assert_eq!(table.t("missing", &Substitutions::new()), "missing");
    /// ```
    pub fn t(&self, key: &str, substitutions: &Substitutions) -> String {
        let mut message = self.lookup(key).to_string();
        for (name, value) in substitutions {
            let placeholder = format!("${}$", name);
            if message.contains(&placeholder) {
                message = message.replace(&placeholder, value);
            }
        }
        message
    }
}

impl FromIterator<(String, TranslationEntry)> for TranslationTable {
    fn from_iter<I: IntoIterator<Item = (String, TranslationEntry)>>(iter: I) -> Self {
        TranslationTable(iter.into_iter().collect())
    }
}

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$([A-Za-z0-9_]+)\$").expect("valid placeholder regex"))
}

/// Names of the `$name$` placeholders in `message`, in order of first appearance
pub fn placeholder_names(message: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for capture in placeholder_pattern().captures_iter(message) {
        let name = &capture[1];
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}
