//! The i18n runtime facade
//!
//! [`I18nManager`] ties the pieces together:
//!
//! 1. **Preference** - the persisted `language` value
//! 2. **Source** - where translation tables are fetched from
//! 3. **Store** - the active `(language, table)` pair read by lookups
//! 4. **Synchronizer** - keeps tagged DOM elements translated
//! 5. **Notifier** - observers and the `languageChanged` broadcast
//!
//! One manager is built per page at the composition root and shared by
//! reference (usually in an `Arc`) with everything that needs it.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use page_i18n::{
//!     I18nManager, MemoryStore, StaticTranslationSource, Substitutions, TranslationTable,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let source = StaticTranslationSource::new()
//!         .with_table("en", TranslationTable::new().with_entry("greet", "Hello $name$"));
//!     let i18n = I18nManager::builder()
//!         .with_store(Arc::new(MemoryStore::new()))
//!         .with_source(Arc::new(source))
//!         .build()?;
//!
//!     let language = i18n.init("en").await;
//!     assert_eq!(language, "en");
//!
//!     let subs = Substitutions::from([("name".to_string(), "Ana".to_string())]);
//!     assert_eq!(i18n.t("greet", &subs), "Hello Ana");
//!     Ok(())
//! }
//! ```

use crate::dom::{DomSynchronizer, MutationWatcher};
use crate::error::{I18nError, I18nResult};
use crate::language::{AvailableLanguage, LanguageCode, available_languages};
use crate::loader::TranslationSource;
use crate::notifier::{EventBus, LanguageChanged, LanguageObserver, ObserverRegistry};
use crate::persistence::{KeyValueStore, LanguagePreference};
use crate::store::TranslationStore;
use crate::table::{Substitutions, TranslationTable};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Language used when nothing else is configured
pub const DEFAULT_LANGUAGE: &str = "en";

/// Lifecycle of the runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeStatus {
    Uninitialized,
    Ready,
}

/// Composition root for an [`I18nManager`]
pub struct I18nManagerBuilder {
    store: Option<Arc<dyn KeyValueStore>>,
    source: Option<Arc<dyn TranslationSource>>,
    watcher: Option<Arc<dyn MutationWatcher>>,
    default_language: LanguageCode,
    event_capacity: usize,
}

impl Default for I18nManagerBuilder {
    fn default() -> Self {
        Self {
            store: None,
            source: None,
            watcher: None,
            default_language: LanguageCode::new(DEFAULT_LANGUAGE),
            event_capacity: EventBus::DEFAULT_CAPACITY,
        }
    }
}

impl I18nManagerBuilder {
    pub fn with_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_source(mut self, source: Arc<dyn TranslationSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Document to keep translated; without one only `t` is available
    pub fn with_watcher(mut self, watcher: Arc<dyn MutationWatcher>) -> Self {
        self.watcher = Some(watcher);
        self
    }

    /// Language active before `init` completes
    pub fn with_default_language(mut self, language: impl Into<LanguageCode>) -> Self {
        self.default_language = language.into();
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    pub fn build(self) -> I18nResult<I18nManager> {
        let store = self
            .store
            .ok_or_else(|| I18nError::Config("A key-value store is required".to_string()))?;
        let source = self
            .source
            .ok_or_else(|| I18nError::Config("A translation source is required".to_string()))?;

        let translations = TranslationStore::new(self.default_language);
        Ok(I18nManager {
            preference: LanguagePreference::new(store),
            source,
            synchronizer: DomSynchronizer::new(translations.clone()),
            translations,
            watcher: self.watcher,
            observers: Mutex::new(ObserverRegistry::new()),
            events: EventBus::new(self.event_capacity),
            ready: AtomicBool::new(false),
            observing: AtomicBool::new(false),
            latest_request: AtomicU64::new(0),
        })
    }
}

/// Language state, translation lookup and change notification for one page
pub struct I18nManager {
    preference: LanguagePreference,
    source: Arc<dyn TranslationSource>,
    translations: TranslationStore,
    synchronizer: DomSynchronizer,
    watcher: Option<Arc<dyn MutationWatcher>>,
    observers: Mutex<ObserverRegistry>,
    events: EventBus,
    ready: AtomicBool,
    observing: AtomicBool,
    // Sequence number of the newest load; older completions are discarded
    latest_request: AtomicU64,
}

impl I18nManager {
    pub fn builder() -> I18nManagerBuilder {
        I18nManagerBuilder::default()
    }

    /// Bring the runtime up and return the active language
    ///
    /// Resolves the persisted language (or `default_language` when there is
    /// none or it cannot be read), loads its table, starts watching the
    /// document and translates it once.
    ///
    /// Never fails: if the table cannot be loaded, `default_language` becomes
    /// active with an empty table, so every lookup returns its key.
    pub async fn init(&self, default_language: impl Into<LanguageCode>) -> LanguageCode {
        let default_language = default_language.into();
        let request = self.begin_request();

        let language = self.preference.get_or(&default_language).await;
        let fetched = self.source.fetch(&language).await;
        let (language, table) = match fetched {
            Ok(table) => (language, table),
            Err(e) => {
                warn!("Error initializing i18n with '{}': {}", language, e);
                (default_language, TranslationTable::new())
            }
        };

        if self.is_latest(request) {
            self.translations.replace(language, table);
        } else {
            debug!("A language change landed during init; keeping it");
        }

        self.observe_document();
        self.init_translations();
        self.ready.store(true, Ordering::SeqCst);

        let active = self.translations.language();
        info!("i18n ready with language '{}'", active);
        active
    }

    /// Switch to `language`
    ///
    /// The choice is persisted before the table is loaded. On success the
    /// new table replaces the active one, every observer is called once with
    /// the new language, and one `languageChanged` event is broadcast.
    ///
    /// Calls are ordered by when they start: only the most recently started
    /// call may install its table. This holds even when that call fails, so
    /// an earlier call still in flight ends with `Superseded` and the previous
    /// language stays active.
    ///
    /// # Errors
    ///
    /// - `InvalidLanguage` - the code cannot address a resource; nothing is saved
    /// - `PersistenceWrite` - the preference could not be saved
    /// - `TranslationFetch` / `TranslationParse` - the table could not be
    ///   loaded; the previous language stays active
    /// - `Superseded` - a later call started after this one
    pub async fn change_language(&self, language: impl Into<LanguageCode>) -> I18nResult<LanguageCode> {
        let language = language.into();
        language.validate()?;
        let request = self.begin_request();

        self.preference.set(&language).await?;
        let table = self.source.fetch(&language).await?;

        if !self.is_latest(request) {
            warn!("Discarding stale translations for '{}'", language);
            return Err(I18nError::Superseded(language.to_string()));
        }

        debug!("Loaded {} translations for '{}'", table.len(), language);
        self.translations.replace(language.clone(), table);

        self.notify_observers(&language);
        self.events.dispatch(LanguageChanged {
            language: language.clone(),
        });

        info!("Language changed to '{}'", language);
        Ok(language)
    }

    /// Translate `key` with the active table, filling `$name$` placeholders
    ///
    /// Returns the key itself when it has no translation.
    pub fn t(&self, key: &str, substitutions: &Substitutions) -> String {
        self.translations.table().t(key, substitutions)
    }

    pub fn current_language(&self) -> LanguageCode {
        self.translations.language()
    }

    pub fn status(&self) -> RuntimeStatus {
        if self.ready.load(Ordering::SeqCst) {
            RuntimeStatus::Ready
        } else {
            RuntimeStatus::Uninitialized
        }
    }

    pub fn add_observer(&self, observer: LanguageObserver) {
        self.registry().add(observer);
    }

    /// Remove every registration of `observer`
    pub fn remove_observer(&self, observer: &LanguageObserver) {
        self.registry().remove(observer);
    }

    pub fn observer_count(&self) -> usize {
        self.registry().len()
    }

    /// Receiver of `languageChanged` events
    pub fn subscribe(&self) -> broadcast::Receiver<LanguageChanged> {
        self.events.subscribe()
    }

    /// Translate every tagged element of the document
    ///
    /// Not run automatically on language change; call it after
    /// `change_language` to refresh existing content. Returns the number of
    /// elements updated (0 without a document).
    pub fn init_translations(&self) -> usize {
        match &self.watcher {
            Some(watcher) => self.synchronizer.translate_document(watcher.as_ref()),
            None => 0,
        }
    }

    /// Languages offered in the picker
    pub fn available_languages(&self) -> Vec<AvailableLanguage> {
        available_languages()
    }

    /// Synchronizer bound to the active table, for hosts with their own `DomTree`
    pub fn synchronizer(&self) -> &DomSynchronizer {
        &self.synchronizer
    }

    fn registry(&self) -> std::sync::MutexGuard<'_, ObserverRegistry> {
        self.observers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify_observers(&self, language: &LanguageCode) {
        // Observers may add or remove observers; call them without the lock
        let registry = self.registry().clone();
        let succeeded = registry.notify(language);
        debug!("Notified {}/{} observers", succeeded, registry.len());
    }

    fn observe_document(&self) {
        if let Some(watcher) = &self.watcher {
            if !self.observing.swap(true, Ordering::SeqCst) {
                self.synchronizer.attach(watcher.as_ref());
            }
        }
    }

    fn begin_request(&self) -> u64 {
        self.latest_request.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_latest(&self, request: u64) -> bool {
        self.latest_request.load(Ordering::SeqCst) == request
    }
}
