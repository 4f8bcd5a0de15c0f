//! ytharvest - YouTube channel metadata harvesting into `SQLite`
//!
//! This library fetches channel profiles and recent uploads from the YouTube
//! Data API, stores them with full-replace semantics, and runs a catalogue of
//! fixed analytical reports over the stored rows.
//!
//! # Modules
//!
//! - [`api`] - HTTP transport seam and API payload types
//! - [`fetch`] - Channel and paginated video fetchers
//! - [`pipeline`] - Ingestion orchestration (fetch, replace, insert)
//! - [`storage`] - `SQLite` storage layer
//! - [`reports`] - Named reports and search
//! - [`duration`] - ISO-8601 duration parsing
//! - [`error`] - Custom error types with rich context

pub mod api;
pub mod cli;
pub mod config;
pub mod duration;
pub mod error;
pub mod fetch;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod reports;
pub mod storage;

pub use api::{HttpTransport, Transport};
pub use cli::*;
pub use config::Config;
pub use error::{
    HarvestError, Result, ResultExt, find_closest_match, format_did_you_mean, format_error,
    format_unknown_value_error,
};
pub use model::*;
pub use pipeline::IngestionPipeline;
pub use storage::{Storage, Store};

use chrono::{DateTime, Datelike, Utc};

/// Default database filename
pub const DEFAULT_DB_NAME: &str = "ytharvest.db";

/// Standard width for header dividers in CLI output
pub const HEADER_DIVIDER_WIDTH: usize = 60;

/// Get the default data directory for ytharvest
#[must_use]
pub fn default_data_dir() -> std::path::PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("ytharvest")
}

/// Get the default database path
#[must_use]
pub fn default_db_path() -> std::path::PathBuf {
    default_data_dir().join(DEFAULT_DB_NAME)
}

/// Format an unsigned integer with thousands separators.
#[must_use]
pub fn format_number(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);

    for (idx, ch) in digits.chars().rev().enumerate() {
        if idx > 0 && idx % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }

    out.chars().rev().collect()
}

/// Format an API timestamp (`2023-04-01T10:00:00Z`) as a short calendar date.
///
/// Falls back to the raw text when it does not parse.
#[must_use]
pub fn format_published(published_at: &str) -> String {
    format_published_with_base(published_at, Utc::now())
}

/// Like [`format_published`] with a fixed "now" (useful for tests).
#[must_use]
pub fn format_published_with_base(published_at: &str, now: DateTime<Utc>) -> String {
    let Ok(parsed) = DateTime::parse_from_rfc3339(published_at) else {
        return published_at.to_string();
    };
    let dt = parsed.with_timezone(&Utc);
    if dt.year() == now.year() {
        dt.format("%b %d").to_string()
    } else {
        dt.format("%b %d, %Y").to_string()
    }
}

/// Escape text for CSV by sanitizing newlines and quotes.
#[must_use]
pub fn csv_escape_text(text: &str) -> String {
    text.replace('"', "\"\"").replace(['\n', '\r'], " ")
}

/// Shorten `s` to at most `max_len` bytes, ending on a char boundary.
#[must_use]
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len.saturating_sub(3);
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn format_number_adds_separators() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(12_345_678), "12,345,678");
    }

    #[test]
    fn format_published_drops_year_when_current() {
        let base = Utc
            .with_ymd_and_hms(2023, 6, 1, 0, 0, 0)
            .single()
            .unwrap();
        assert_eq!(
            format_published_with_base("2023-04-01T10:00:00Z", base),
            "Apr 01"
        );
        assert_eq!(
            format_published_with_base("2021-12-11T00:00:00Z", base),
            "Dec 11, 2021"
        );
        assert_eq!(format_published_with_base("not a date", base), "not a date");
    }

    #[test]
    fn csv_escape_text_sanitizes_newlines_and_quotes() {
        let input = "Hello\r\n\"world\", ok";
        assert_eq!(csv_escape_text(input), "Hello  \"\"world\"\", ok");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghijkl", 8), "abcde...");
        assert_eq!(truncate("ééééé", 6), "é...");
    }

    #[test]
    fn default_db_path_uses_crate_dir() {
        let path = default_db_path();
        assert!(path.ends_with("ytharvest/ytharvest.db"));
    }
}
