//! Data models for harvested channel and video rows.
//!
//! These structures are the flattened, tabular form of the API payloads and
//! map one-to-one onto the `channels` and `videos` tables.

use serde::{Deserialize, Serialize};

/// A channel row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub channel_id: String,
    pub channel_name: String,
    pub subscribers: u64,
    pub total_videos: u64,
    pub view_count: u64,
    /// Upload playlist; drives video enumeration and is not displayed.
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub playlist_id: String,
}

/// A video row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Video {
    pub video_id: String,
    /// Owning channel. Empty until the pipeline stamps it before insertion.
    pub channel_id: String,
    pub title: String,
    /// ISO 8601 timestamp as delivered by the API (may be empty).
    pub published_at: String,
    /// First four characters of `published_at`, empty when it is missing.
    pub published_year: String,
    pub view_count: u64,
    pub likes: u64,
    /// Legacy column; the API no longer supplies it.
    pub dislikes: u64,
    pub comments: u64,
    /// Duration in seconds.
    pub duration: u64,
}

impl Video {
    /// Derive the publish year from an ISO 8601 timestamp.
    #[must_use]
    pub fn year_of(published_at: &str) -> String {
        published_at.chars().take(4).collect()
    }
}

/// Outcome of a successful ingestion run.
#[derive(Debug, Clone, Serialize)]
pub struct IngestionResult {
    pub channel: Channel,
    pub videos: Vec<Video>,
    /// True when a previously stored copy of the channel was replaced.
    pub replaced: bool,
}

/// A single cell in a report result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl std::fmt::Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Real(v) => write!(f, "{v:.2}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

/// Tabular query output.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReportTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl ReportTable {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.rows.len()
    }

    /// Index of a column by name.
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Convert rows into JSON objects keyed by column name.
    #[must_use]
    pub fn to_records(&self) -> Vec<serde_json::Map<String, serde_json::Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .cloned()
                    .zip(row.iter().map(|cell| {
                        serde_json::to_value(cell).unwrap_or(serde_json::Value::Null)
                    }))
                    .collect()
            })
            .collect()
    }
}
