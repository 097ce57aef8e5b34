// src/utils/log.rs

//! Console output helpers for the CLI.
//!
//! Library code logs through the `log` macros; these helpers only shape
//! the CLI's human-facing progress output.

use chrono::Local;

fn stamp(message: &str) -> String {
    format!("[{}] {}", Local::now().format("%Y-%m-%d %H:%M:%S"), message)
}

/// Print a section header.
pub fn header(title: &str) {
    let border = "═".repeat(60);
    println!("{}", stamp(&border));
    println!("{}", stamp(&format!("  {title}")));
    println!("{}", stamp(&border));
}

/// Print a success line.
pub fn success(message: &str) {
    println!("{}", stamp(message));
}

/// Print an indented sub-item.
pub fn sub_item(message: &str) {
    println!("{}", stamp(&format!("    {message}")));
}

/// Print a summary section.
pub fn summary(title: &str, items: &[(&str, String)]) {
    println!();
    println!("{}", stamp(&format!("[SUMMARY] {title}")));
    for (key, value) in items {
        println!("{}", stamp(&format!("    {key}: {value}")));
    }
}
