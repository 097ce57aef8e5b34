//! Snapshot persistence for cross-run diffing.
//!
//! The engine itself holds snapshots in memory only; the CLI persists
//! the last published snapshot so the next run can reconcile against it.

pub mod local;

pub use local::SnapshotFile;
