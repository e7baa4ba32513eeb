//! Language change notification: registered observers plus a broadcast event.

use crate::language::LanguageCode;
use serde::Serialize;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error};

/// Name of the broadcast event fired after every successful change
pub const LANGUAGE_CHANGED_EVENT: &str = "languageChanged";

pub type ObserverResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Callback invoked with the new active language
pub type LanguageObserver = Arc<dyn Fn(&LanguageCode) -> ObserverResult + Send + Sync>;

/// Ordered list of language observers
///
/// The same callback may be registered more than once; each registration
/// is notified separately.
#[derive(Clone, Default)]
pub struct ObserverRegistry {
    observers: Vec<LanguageObserver>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, observer: LanguageObserver) {
        self.observers.push(observer);
    }

    /// Remove every registration of `observer` (compared by pointer)
    pub fn remove(&mut self, observer: &LanguageObserver) {
        self.observers.retain(|o| !Arc::ptr_eq(o, observer));
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Call every observer in registration order
    ///
    /// A failing or panicking observer is logged and does not prevent the
    /// others from running. Returns the number of observers that succeeded.
    pub fn notify(&self, language: &LanguageCode) -> usize {
        let mut succeeded = 0;
        for observer in &self.observers {
            match catch_unwind(AssertUnwindSafe(|| observer(language))) {
                Ok(Ok(())) => succeeded += 1,
                Ok(Err(e)) => error!("Error in i18n observer: {}", e),
                Err(_) => error!("i18n observer panicked"),
            }
        }
        succeeded
    }
}

/// Payload of the `languageChanged` event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LanguageChanged {
    pub language: LanguageCode,
}

/// Process-wide `languageChanged` broadcast for listeners outside the registry
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<LanguageChanged>,
}

impl EventBus {
    pub const DEFAULT_CAPACITY: usize = 16;

    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LanguageChanged> {
        self.sender.subscribe()
    }

    /// Dispatch `event` to current subscribers; returns how many received it
    pub fn dispatch(&self, event: LanguageChanged) -> usize {
        match self.sender.send(event) {
            Ok(receivers) => receivers,
            Err(broadcast::error::SendError(event)) => {
                debug!(
                    "No listeners for {} ({})",
                    LANGUAGE_CHANGED_EVENT, event.language
                );
                0
            }
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recorder(log: Arc<Mutex<Vec<String>>>, tag: &'static str) -> LanguageObserver {
        Arc::new(move |language: &LanguageCode| -> ObserverResult {
            log.lock().unwrap().push(format!("{}:{}", tag, language));
            Ok(())
        })
    }

    #[test]
    fn test_notify_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ObserverRegistry::new();
        registry.add(recorder(log.clone(), "a"));
        registry.add(recorder(log.clone(), "b"));

        assert_eq!(registry.notify(&LanguageCode::new("zh_CN")), 2);
        assert_eq!(*log.lock().unwrap(), vec!["a:zh_CN", "b:zh_CN"]);
    }

    #[test]
    fn test_remove_drops_every_registration_of_that_callback() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let f = recorder(log.clone(), "f");
        let g = recorder(log.clone(), "g");

        let mut registry = ObserverRegistry::new();
        registry.add(f.clone());
        registry.add(g.clone());
        registry.add(f.clone());
        assert_eq!(registry.len(), 3);

        registry.remove(&f);
        assert_eq!(registry.len(), 1);
        registry.notify(&LanguageCode::new("en"));
        assert_eq!(*log.lock().unwrap(), vec!["g:en"]);
    }

    #[test]
    fn test_failing_observers_are_isolated() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ObserverRegistry::new();
        registry.add(Arc::new(|_: &LanguageCode| -> ObserverResult {
            Err("observer failed".into())
        }));
        registry.add(Arc::new(|_: &LanguageCode| -> ObserverResult {
            panic!("observer panicked")
        }));
        registry.add(recorder(log.clone(), "ok"));

        assert_eq!(registry.notify(&LanguageCode::new("en")), 1);
        assert_eq!(*log.lock().unwrap(), vec!["ok:en"]);
    }

    #[tokio::test]
    async fn test_event_bus_dispatch() {
        let bus = EventBus::default();
        assert_eq!(
            bus.dispatch(LanguageChanged {
                language: LanguageCode::new("en")
            }),
            0
        );

        let mut rx = bus.subscribe();
        assert_eq!(
            bus.dispatch(LanguageChanged {
                language: LanguageCode::new("zh_CN")
            }),
            1
        );
        let event = rx.recv().await.unwrap();
        assert_eq!(event.language, "zh_CN");
    }

    #[test]
    fn test_event_payload_shape() {
        let json = serde_json::to_value(LanguageChanged {
            language: LanguageCode::new("zh_CN"),
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({ "language": "zh_CN" }));
    }
}
