//! Ledger change notifications
//!
//! Lifecycle operations publish one event per successful mutation and the
//! sync orchestrator publishes one per cycle. Subscribers (the sync
//! scheduler, a presentation layer) only refresh state from these; nothing
//! in the ledger waits on them.

use tokio::sync::broadcast;

use crate::models::EntityKind;

/// Buffered events per subscriber before the slowest one starts lagging
const EVENT_CAPACITY: usize = 256;

/// Summary of how a sync cycle ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleResult {
    Disabled,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerEvent {
    Saved { kind: EntityKind, id: String },
    Hidden { kind: EntityKind, id: String },
    Unhidden { kind: EntityKind, id: String },
    Deleted { kind: EntityKind, id: String },
    SyncCompleted { outcome: CycleResult },
}

impl LedgerEvent {
    /// True for edits that should (re)start the sync debounce timer
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Self::SyncCompleted { .. })
    }
}

/// Broadcast channel owned by `Storage`
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<LedgerEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.sender.subscribe()
    }

    /// Publish an event; having no subscribers is not an error
    pub fn publish(&self, event: LedgerEvent) {
        tracing::trace!(?event, "publishing ledger event");
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new();
        bus.publish(LedgerEvent::SyncCompleted {
            outcome: CycleResult::Disabled,
        });
    }

    #[test]
    fn test_subscriber_receives_events() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.publish(LedgerEvent::Hidden {
            kind: EntityKind::Account,
            id: "acc-1".into(),
        });

        let event = rx.try_recv().unwrap();
        assert!(event.is_mutation());
        assert_eq!(
            event,
            LedgerEvent::Hidden {
                kind: EntityKind::Account,
                id: "acc-1".into()
            }
        );
    }

    #[test]
    fn test_sync_completed_is_not_a_mutation() {
        let event = LedgerEvent::SyncCompleted {
            outcome: CycleResult::Succeeded,
        };
        assert!(!event.is_mutation());
    }
}
