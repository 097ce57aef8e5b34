// src/store.rs

//! Holds the current authoritative snapshot and fans out change events.
//!
//! All mutation goes through [`SnapshotStore::commit`] on the single
//! writer path; readers grab an `Arc` to a sealed snapshot and never see
//! a half-built index. Subscribers receive events from the commit that
//! follows their subscription ("restartable from now"); a lagging
//! subscriber must re-list instead of replaying history.

use std::sync::{Arc, RwLock};

use tokio::sync::broadcast;

use crate::models::{ChangeEvent, Snapshot};

const EVENT_CHANNEL_CAPACITY: usize = 1024;

pub struct SnapshotStore {
    current: RwLock<Arc<Snapshot>>,
    events: broadcast::Sender<ChangeEvent>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            current: RwLock::new(Arc::new(Snapshot::empty())),
            events,
        }
    }

    /// The current sealed snapshot.
    pub fn current(&self) -> Arc<Snapshot> {
        self.current
            .read()
            .expect("snapshot lock poisoned")
            .clone()
    }

    /// Subscribe to change events of future commits.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.events.subscribe()
    }

    /// Publish a reconciled snapshot.
    ///
    /// Events are emitted before the snapshot swap so a subscriber
    /// handling an event can still read the pre-change snapshot.
    pub fn commit(&self, next: Snapshot, events: Vec<ChangeEvent>) {
        for event in events {
            log::debug!("change: {} {}", event.kind(), event.id());
            // No receivers is fine; events are fan-out only.
            let _ = self.events.send(event);
        }
        *self.current.write().expect("snapshot lock poisoned") = Arc::new(next);
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Entity, EntityId, Folder, SnapshotBuilder};

    fn one_folder_snapshot() -> Snapshot {
        let mut builder = SnapshotBuilder::new();
        builder.insert(Entity::Folder(Folder {
            id: "f1".into(),
            course: "c1".into(),
            parent: None,
            name: "Hauptordner".into(),
            children: Vec::new(),
            changed: None,
        }));
        builder.seal()
    }

    #[tokio::test]
    async fn test_commit_swaps_snapshot_after_events() {
        let store = SnapshotStore::new();
        assert!(store.current().is_empty());

        let snapshot = one_folder_snapshot();
        let mut rx = store.subscribe();
        let entity = snapshot.get(&"f1".into()).unwrap().clone();
        store.commit(
            snapshot,
            vec![ChangeEvent::Added {
                id: EntityId::from("f1"),
                entity,
            }],
        );

        let event = rx.recv().await.unwrap();
        assert_eq!(event.id().as_str(), "f1");
        assert_eq!(store.current().len(), 1);
    }

    #[tokio::test]
    async fn test_subscription_starts_now() {
        let store = SnapshotStore::new();
        store.commit(one_folder_snapshot(), vec![]);

        // subscribing after a commit sees nothing from the past
        let mut rx = store.subscribe();
        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }
}
