//! Utility functions and helpers.

pub mod log;
pub mod url;

pub use url::resolve_url;
