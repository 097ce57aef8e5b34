// src/models/snapshot.rs

//! Point-in-time index of all known entities.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Course, Entity, EntityId};

/// A subtree that could not be refreshed during a crawl.
///
/// The reconcile pass uses these to suppress removal events for content
/// that merely failed to re-crawl.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedSubtree {
    /// Root of the failed subtree (folder or course id)
    pub root: EntityId,
    /// What was being fetched when the failure occurred
    pub context: String,
    /// Rendered error
    pub error: String,
}

/// Sealed crawl result: a mapping from identifier to entity.
///
/// Snapshots are immutable once sealed; the store swaps whole snapshots
/// atomically so readers never observe a half-built index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// When the crawl producing this snapshot finished
    pub taken_at: DateTime<Utc>,

    entities: HashMap<EntityId, Entity>,

    /// Course ids in listing order
    course_order: Vec<EntityId>,

    /// Subtrees that failed to refresh; non-empty marks the snapshot partial
    pub failed_subtrees: Vec<FailedSubtree>,
}

impl Snapshot {
    /// An empty snapshot, used before the first crawl.
    pub fn empty() -> Self {
        Self {
            taken_at: Utc::now(),
            entities: HashMap::new(),
            course_order: Vec::new(),
            failed_subtrees: Vec::new(),
        }
    }

    pub fn get(&self, id: &EntityId) -> Option<&Entity> {
        self.entities.get(id)
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.entities.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Whether any subtree failed to refresh during the producing crawl.
    pub fn is_partial(&self) -> bool {
        !self.failed_subtrees.is_empty()
    }

    /// Course ids in listing order.
    pub fn course_ids(&self) -> &[EntityId] {
        &self.course_order
    }

    /// Courses in listing order.
    pub fn courses(&self) -> impl Iterator<Item = &Course> {
        self.course_order.iter().filter_map(|id| {
            match self.entities.get(id) {
                Some(Entity::Course(c)) => Some(c),
                _ => None,
            }
        })
    }

    pub fn ids(&self) -> impl Iterator<Item = &EntityId> {
        self.entities.keys()
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// Structural children of an entity, empty for unknown ids.
    pub fn children_of(&self, id: &EntityId) -> &[EntityId] {
        self.entities.get(id).map_or(&[], |e| e.child_ids())
    }

    /// Carry a subtree forward from a previous snapshot.
    ///
    /// Called for each failed subtree before diffing: previously known
    /// entities stay listable even though they could not be re-crawled.
    /// The failed root keeps its fresh stub but gets its previous child
    /// list back; a course whose root listing failed gets its previous
    /// root folder back.
    pub fn adopt_subtree(&mut self, previous: &Snapshot, root: &EntityId) {
        for id in previous.subtree_ids(root) {
            let Some(known) = previous.get(&id) else { continue };
            match self.entities.entry(id.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(known.clone());
                }
                Entry::Occupied(mut current) => match (current.get_mut(), known) {
                    (Entity::Course(course), Entity::Course(prev))
                        if course.root_folder.is_none() =>
                    {
                        course.root_folder = prev.root_folder.clone();
                    }
                    (Entity::Folder(folder), Entity::Folder(prev))
                        if id == *root && folder.children.is_empty() =>
                    {
                        folder.children = prev.children.clone();
                    }
                    _ => {}
                },
            }
        }
    }

    /// The id set of a subtree: the root plus all transitive children.
    pub fn subtree_ids(&self, root: &EntityId) -> HashSet<EntityId> {
        let mut seen = HashSet::new();
        let mut stack = vec![root.clone()];
        while let Some(id) = stack.pop() {
            if !seen.insert(id.clone()) {
                continue;
            }
            for child in self.children_of(&id) {
                stack.push(child.clone());
            }
        }
        seen
    }
}

/// Accumulates crawl results and seals them into a [`Snapshot`].
#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    entities: HashMap<EntityId, Entity>,
    course_order: Vec<EntityId>,
    failed_subtrees: Vec<FailedSubtree>,
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a course, keeping listing order.
    pub fn add_course(&mut self, course: Course) {
        if !self.entities.contains_key(&course.id) {
            self.course_order.push(course.id.clone());
        }
        self.entities
            .insert(course.id.clone(), Entity::Course(course));
    }

    /// Insert an entity. Duplicate discovery is last-writer-wins by id.
    pub fn insert(&mut self, entity: Entity) {
        self.entities.insert(entity.id().clone(), entity);
    }

    /// Attach the root folder id to an already registered course.
    pub fn set_course_root(&mut self, course_id: &EntityId, root: EntityId) {
        if let Some(Entity::Course(course)) = self.entities.get_mut(course_id) {
            course.root_folder = Some(root);
        }
    }

    /// Record a subtree that could not be crawled.
    pub fn record_failure(
        &mut self,
        root: EntityId,
        context: impl Into<String>,
        error: impl std::fmt::Display,
    ) {
        self.failed_subtrees.push(FailedSubtree {
            root,
            context: context.into(),
            error: error.to_string(),
        });
    }

    pub fn failure_count(&self) -> usize {
        self.failed_subtrees.len()
    }

    /// Seal the accumulated state into an immutable snapshot.
    pub fn seal(self) -> Snapshot {
        Snapshot {
            taken_at: Utc::now(),
            entities: self.entities,
            course_order: self.course_order,
            failed_subtrees: self.failed_subtrees,
        }
    }
}
