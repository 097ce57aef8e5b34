//! Service layer for the sync engine.
//!
//! - Session lifecycle (`Authenticator`)
//! - Bounded, retried page fetching (`PageFetcher`)
//! - Page interpretation (`parse`)
//! - Hierarchy traversal (`Crawler`)

pub mod auth;
pub mod crawl;
pub mod fetch;
pub mod parse;

pub use auth::{Authenticator, Session};
pub use crawl::{Crawler, LivePortal, PortalAccess};
pub use fetch::{PageFetcher, create_client};
pub use parse::{PageContent, PageKind, ParsedPage};
