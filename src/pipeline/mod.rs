//! Snapshot reconciliation.

mod reconcile;

pub use reconcile::reconcile;
