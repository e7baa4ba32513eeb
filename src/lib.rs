//! Language-switching runtime for extension pages.
//!
//! Loads `_locales/<code>/messages.json` tables, keeps `data-i18n` tagged
//! elements translated as the document changes, persists the selected
//! language and tells interested parties when it changes.

pub mod config;
pub mod dom;
pub mod error;
pub mod language;
pub mod loader;
pub mod manager;
pub mod notifier;
pub mod persistence;
pub mod store;
pub mod table;

pub use config::I18nConfig;
pub use dom::{
    BatchHandler, Document, DomSynchronizer, DomTree, I18N_ATTR, I18N_TARGET_ATTR,
    MutationWatcher, NodeId, SharedDocument, translate_subtree,
};
pub use error::{I18nError, I18nResult};
pub use language::{AvailableLanguage, LanguageCode, available_languages};
pub use loader::{
    FailureKind, FileTranslationSource, HttpTranslationSource, StaticTranslationSource,
    TranslationSource, parse_table,
};
pub use manager::{DEFAULT_LANGUAGE, I18nManager, I18nManagerBuilder, RuntimeStatus};
pub use notifier::{
    EventBus, LANGUAGE_CHANGED_EVENT, LanguageChanged, LanguageObserver, ObserverRegistry,
    ObserverResult,
};
pub use persistence::{JsonFileStore, KeyValueStore, LANGUAGE_KEY, LanguagePreference, MemoryStore};
pub use store::TranslationStore;
pub use table::{Substitutions, TranslationEntry, TranslationTable, placeholder_names};
