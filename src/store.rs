//! The active language and its translation table.

use crate::language::LanguageCode;
use crate::table::TranslationTable;
use std::sync::{Arc, PoisonError, RwLock};

struct RuntimeState {
    language: LanguageCode,
    table: Arc<TranslationTable>,
}

/// Shared handle to the active `(language, table)` pair
///
/// The pair is replaced as a whole, so a reader sees either the previous
/// table or the new one, never a mix. Tables are handed out as `Arc`
/// snapshots; a lookup pass keeps using its snapshot even if a load
/// lands in the meantime.
#[derive(Clone)]
pub struct TranslationStore {
    state: Arc<RwLock<RuntimeState>>,
}

impl TranslationStore {
    pub fn new(language: LanguageCode) -> Self {
        Self::with_table(language, TranslationTable::new())
    }

    pub fn with_table(language: LanguageCode, table: TranslationTable) -> Self {
        Self {
            state: Arc::new(RwLock::new(RuntimeState {
                language,
                table: Arc::new(table),
            })),
        }
    }

    pub fn language(&self) -> LanguageCode {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .language
            .clone()
    }

    pub fn table(&self) -> Arc<TranslationTable> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .table
            .clone()
    }

    /// Make `table` the active table of `language`
    pub fn replace(&self, language: LanguageCode, table: TranslationTable) {
        let table = Arc::new(table);
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.language = language;
        state.table = table;
    }
}
