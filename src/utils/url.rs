// src/utils/url.rs

//! URL manipulation helpers for Stud.IP dispatch links.

use std::sync::OnceLock;

use regex::Regex;
use sha2::{Digest, Sha256};
use url::Url;

/// Resolve a potentially relative URL against a base URL.
pub fn resolve_url(base: &Url, href: &str) -> String {
    base.join(href)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// Read a query field from a URL string.
pub fn query_field(url: &str, field: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    parsed
        .query_pairs()
        .find(|(k, _)| k == field)
        .map(|(_, v)| v.into_owned())
}

fn folder_index_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"/studip/dispatch\.php/course/files/index/([0-9a-z]+)").expect("static regex")
    })
}

fn file_details_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"/studip/dispatch\.php/file/details/([0-9a-f]+)").expect("static regex")
    })
}

/// Extract the folder id from a files-index breadcrumb or listing link.
pub fn extract_folder_id(url: &str) -> Option<String> {
    folder_index_re()
        .captures(url)
        .map(|caps| caps[1].to_string())
}

/// Extract the file id from a file-details link.
pub fn extract_file_id(url: &str) -> Option<String> {
    file_details_re()
        .captures(url)
        .map(|caps| caps[1].to_string())
}

/// Derive a stable fallback identifier from a URL.
///
/// Used when a page omits the portal id of an object; hashing the link
/// keeps the identifier stable across crawls of the same object.
pub fn derived_id(url: &str) -> String {
    let digest = Sha256::digest(url.as_bytes());
    hex::encode(&digest[..16])
}
