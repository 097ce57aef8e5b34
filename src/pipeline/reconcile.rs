// src/pipeline/reconcile.rs

//! Identifier-keyed diff between two snapshots.
//!
//! Emits `Added` in parent-before-child order, `Removed` in
//! child-before-parent order, and `Updated` for identifiers present in
//! both snapshots with differing modification markers. Subtrees the new
//! snapshot marked as failed are carried forward from the previous one
//! before diffing: their content stays listable and is never reported
//! removed; it simply could not be re-crawled this pass.

use std::collections::{HashSet, VecDeque};

use crate::models::{ChangeEvent, EntityId, Snapshot};

/// Diff `next` against `previous` and return it with the ordered change
/// events describing the transition.
///
/// The caller publishes the returned snapshot only after handing the
/// events to subscribers, so readers can observe a consistent
/// before/after pair.
pub fn reconcile(previous: &Snapshot, mut next: Snapshot) -> (Snapshot, Vec<ChangeEvent>) {
    let mut events = Vec::new();

    // Failed subtrees keep their previously known content, so listings
    // stay serveable and no removal can be derived from them.
    let failed_roots: Vec<EntityId> = next
        .failed_subtrees
        .iter()
        .map(|failed| failed.root.clone())
        .collect();
    for root in &failed_roots {
        next.adopt_subtree(previous, root);
    }

    // Added/Updated: breadth-first from the course roots guarantees a
    // parent is announced before any of its children.
    let mut visited: HashSet<EntityId> = HashSet::new();
    let mut queue: VecDeque<EntityId> = next.course_ids().iter().cloned().collect();
    while let Some(id) = queue.pop_front() {
        if !visited.insert(id.clone()) {
            continue;
        }
        let Some(entity) = next.get(&id) else { continue };
        match previous.get(&id) {
            None => events.push(ChangeEvent::Added {
                id: id.clone(),
                entity: entity.clone(),
            }),
            Some(old) if !old.same_version(entity) => events.push(ChangeEvent::Updated {
                id: id.clone(),
                old: Box::new(old.clone()),
                new: Box::new(entity.clone()),
            }),
            Some(_) => {}
        }
        for child in entity.child_ids() {
            queue.push_back(child.clone());
        }
    }

    // Entities not reachable from any course root (should not occur in a
    // well-formed crawl); diff them in stable order for determinism.
    let mut stragglers: Vec<EntityId> = next
        .ids()
        .filter(|id| !visited.contains(id))
        .cloned()
        .collect();
    stragglers.sort();
    for id in stragglers {
        let Some(entity) = next.get(&id) else { continue };
        match previous.get(&id) {
            None => events.push(ChangeEvent::Added {
                id: id.clone(),
                entity: entity.clone(),
            }),
            Some(old) if !old.same_version(entity) => events.push(ChangeEvent::Updated {
                id: id.clone(),
                old: Box::new(old.clone()),
                new: Box::new(entity.clone()),
            }),
            Some(_) => {}
        }
    }

    // Removed: identifiers gone from `next`. Failed subtrees were
    // adopted above, so their identifiers are all still present.
    let mut emitted: HashSet<EntityId> = HashSet::new();
    for id in post_order(previous, previous.course_ids()) {
        emit_removed(previous, &next, id, &mut emitted, &mut events);
    }
    let mut prev_stragglers: Vec<EntityId> = previous
        .ids()
        .filter(|id| !emitted.contains(id))
        .cloned()
        .collect();
    prev_stragglers.sort();
    for id in prev_stragglers {
        emit_removed(previous, &next, id, &mut emitted, &mut events);
    }

    (next, events)
}

fn emit_removed(
    previous: &Snapshot,
    next: &Snapshot,
    id: EntityId,
    emitted: &mut HashSet<EntityId>,
    events: &mut Vec<ChangeEvent>,
) {
    if !emitted.insert(id.clone()) {
        return;
    }
    if next.contains(&id) {
        return;
    }
    if let Some(entity) = previous.get(&id) {
        events.push(ChangeEvent::Removed {
            id,
            entity: entity.clone(),
        });
    }
}

/// Children-before-parent traversal order over a snapshot's trees.
fn post_order(snapshot: &Snapshot, roots: &[EntityId]) -> Vec<EntityId> {
    let mut order = Vec::new();
    let mut visited: HashSet<EntityId> = HashSet::new();
    let mut stack: Vec<(EntityId, bool)> =
        roots.iter().rev().map(|id| (id.clone(), false)).collect();

    while let Some((id, expanded)) = stack.pop() {
        if expanded {
            order.push(id);
            continue;
        }
        if !visited.insert(id.clone()) {
            continue;
        }
        stack.push((id.clone(), true));
        for child in snapshot.children_of(&id).iter().rev() {
            stack.push((child.clone(), false));
        }
    }
    order
}
