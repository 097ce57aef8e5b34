// src/models/mod.rs

//! Domain models for the sync engine.
//!
//! Entities mirror the portal's course/folder/file hierarchy; snapshots
//! are sealed indexes over them; change events describe the difference
//! between two snapshots.

mod config;
mod entity;
mod event;
mod snapshot;

pub use config::{Config, CrawlerConfig, PortalConfig};
pub use entity::{Course, DownloadInfo, Entity, EntityId, FileEntry, Folder};
pub use event::ChangeEvent;
pub use snapshot::{FailedSubtree, Snapshot, SnapshotBuilder};
