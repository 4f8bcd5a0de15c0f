//! Compact duration notation used by the video details endpoint.
//!
//! [`parse`] is for ingestion and [`format`] is for display. They are not
//! inverses: `format` emits `H:MM:SS`, which `parse` does not understand.

use once_cell::sync::Lazy;
use regex::Regex;

static HOURS: Lazy<Regex> = Lazy::new(|| Regex::new(r"([0-9]+)H").expect("valid hours regex"));
static MINUTES: Lazy<Regex> = Lazy::new(|| Regex::new(r"([0-9]+)M").expect("valid minutes regex"));
static SECONDS: Lazy<Regex> = Lazy::new(|| Regex::new(r"([0-9]+)S").expect("valid seconds regex"));

/// Parse `[nH][nM][nS]` into total seconds.
///
/// Each group is optional and contributes zero when absent. Anything else in
/// the input (such as the `PT` prefix) is ignored, so malformed input yields
/// `0` rather than an error.
#[must_use]
pub fn parse(text: &str) -> u64 {
    let hours = group_value(&HOURS, text);
    let minutes = group_value(&MINUTES, text);
    let seconds = group_value(&SECONDS, text);

    hours
        .saturating_mul(3600)
        .saturating_add(minutes.saturating_mul(60))
        .saturating_add(seconds)
}

fn group_value(pattern: &Regex, text: &str) -> u64 {
    pattern
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|digits| digits.as_str().parse().ok())
        .unwrap_or(0)
}

/// Render seconds as `H:MM:SS`. Hours are unbounded.
#[must_use]
pub fn format(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    format!("{hours}:{minutes:02}:{secs:02}")
}
