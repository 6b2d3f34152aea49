//! Typed client lifecycle notifications.
//!
//! Observers are registered on the client and called synchronously, in registration
//! order, after the state change they describe has happened. Observers must not block.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// Something that happened inside the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    Connected {
        healthy_nodes: usize,
        pool_size: usize,
    },
    Disconnected,
    /// An attempt against `node` failed and the node was demoted
    NodeUnhealthy {
        node: String,
        attempt: u32,
        reason: String,
    },
    TableCreated {
        table: String,
    },
    TableDropped {
        table: String,
    },
    TransactionStarted {
        transaction_id: String,
    },
    TransactionCommitted {
        transaction_id: String,
    },
    TransactionRolledBack {
        transaction_id: String,
    },
}

impl ClientEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::Connected { .. } => "Connected",
            ClientEvent::Disconnected => "Disconnected",
            ClientEvent::NodeUnhealthy { .. } => "NodeUnhealthy",
            ClientEvent::TableCreated { .. } => "TableCreated",
            ClientEvent::TableDropped { .. } => "TableDropped",
            ClientEvent::TransactionStarted { .. } => "TransactionStarted",
            ClientEvent::TransactionCommitted { .. } => "TransactionCommitted",
            ClientEvent::TransactionRolledBack { .. } => "TransactionRolledBack",
        }
    }
}

/// Receiver of client events
pub trait ClientObserver: Send + Sync {
    fn on_event(&self, event: &ClientEvent);
}

impl<F> ClientObserver for F
where
    F: Fn(&ClientEvent) + Send + Sync,
{
    fn on_event(&self, event: &ClientEvent) {
        self(event)
    }
}

/// Handle returned by [`EventObservers::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// Registry of observers owned by one client
#[derive(Default)]
pub struct EventObservers {
    observers: RwLock<Vec<(ObserverId, Arc<dyn ClientObserver>)>>,
    next_id: AtomicU64,
}

impl EventObservers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, observer: Arc<dyn ClientObserver>) -> ObserverId {
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.observers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((id, observer));
        id
    }

    /// Returns false if the id was not registered
    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        let mut observers = self
            .observers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let before = observers.len();
        observers.retain(|(existing, _)| *existing != id);
        observers.len() != before
    }

    pub fn emit(&self, event: ClientEvent) {
        // Snapshot so observers may (un)subscribe from inside a callback
        let observers: Vec<Arc<dyn ClientObserver>> = self
            .observers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .map(|(_, observer)| observer.clone())
            .collect();
        for observer in observers {
            observer.on_event(&event);
        }
    }

    pub fn len(&self) -> usize {
        self.observers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for EventObservers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventObservers")
            .field("observers", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_emit_reaches_observers_in_order() {
        let observers = EventObservers::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second"] {
            let seen = seen.clone();
            observers.subscribe(Arc::new(move |event: &ClientEvent| {
                seen.lock().unwrap().push(format!("{}:{}", tag, event.name()));
            }));
        }
        observers.emit(ClientEvent::Disconnected);

        assert_eq!(
            *seen.lock().unwrap(),
            vec!["first:Disconnected", "second:Disconnected"]
        );
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let observers = EventObservers::new();
        let count = Arc::new(AtomicU64::new(0));
        let counter = count.clone();
        let id = observers.subscribe(Arc::new(move |_: &ClientEvent| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        observers.emit(ClientEvent::TableCreated { table: "users".to_string() });
        assert!(observers.unsubscribe(id));
        assert!(!observers.unsubscribe(id));
        observers.emit(ClientEvent::TableDropped { table: "users".to_string() });

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(observers.is_empty());
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = ClientEvent::TransactionStarted {
            transaction_id: "tx-1-a".to_string(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "TransactionStarted");
        assert_eq!(value["transaction_id"], "tx-1-a");
    }
}
