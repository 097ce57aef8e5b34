// src/lib.rs

//! studsync: crawls a Stud.IP course portal into a read-only snapshot
//! that a file-system driver can mount.

pub mod api;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod store;
pub mod utils;

pub use api::{RefreshOutcome, StudIp};
pub use error::{AppError, Result};
