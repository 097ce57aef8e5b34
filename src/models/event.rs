// src/models/event.rs

//! Change events emitted by the reconcile pass.

use serde::{Deserialize, Serialize};

use super::{Entity, EntityId};

/// One observed difference between two snapshots.
///
/// Events are produced only by the sync engine and never mutated after
/// emission. Subscribers receive them in the engine's guaranteed order:
/// parents before children for additions, children before parents for
/// removals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum ChangeEvent {
    /// The identifier appeared for the first time.
    Added { id: EntityId, entity: Entity },

    /// The identifier exists in both snapshots with a differing marker.
    Updated {
        id: EntityId,
        old: Box<Entity>,
        new: Box<Entity>,
    },

    /// The identifier disappeared from a fully crawled subtree.
    Removed { id: EntityId, entity: Entity },
}

impl ChangeEvent {
    /// The affected entity identifier.
    pub fn id(&self) -> &EntityId {
        match self {
            ChangeEvent::Added { id, .. }
            | ChangeEvent::Updated { id, .. }
            | ChangeEvent::Removed { id, .. } => id,
        }
    }

    /// Short tag for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            ChangeEvent::Added { .. } => "added",
            ChangeEvent::Updated { .. } => "updated",
            ChangeEvent::Removed { .. } => "removed",
        }
    }
}
