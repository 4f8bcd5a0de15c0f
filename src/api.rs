//! Remote API surface: the transport seam and the response payloads.
//!
//! The fetchers only see [`Transport`], a "GET a JSON document" capability.
//! [`HttpTransport`] implements it over a blocking `reqwest` client; tests
//! substitute an in-process stub.

use crate::error::{HarvestError, Result};
use reqwest::blocking::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Default base URL of the YouTube Data API v3.
pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/youtube/v3";

/// Default request timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub const CHANNELS_ENDPOINT: &str = "channels";
pub const PLAYLIST_ITEMS_ENDPOINT: &str = "playlistItems";
pub const VIDEOS_ENDPOINT: &str = "videos";

/// Capability to fetch one JSON document from a named API endpoint.
pub trait Transport {
    /// Issue one GET against `endpoint` with the given query parameters.
    ///
    /// # Errors
    ///
    /// Returns a fetch-class [`HarvestError`] on transport, status or decode
    /// failure.
    fn get(&self, endpoint: &str, query: &[(&str, String)]) -> Result<serde_json::Value>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn get(&self, endpoint: &str, query: &[(&str, String)]) -> Result<serde_json::Value> {
        (**self).get(endpoint, query)
    }
}

/// Blocking HTTP transport.
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    /// Build a transport against `base_url` with a request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("ytharvest/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| HarvestError::fetch("client", e))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl Transport for HttpTransport {
    fn get(&self, endpoint: &str, query: &[(&str, String)]) -> Result<serde_json::Value> {
        let url = format!("{}/{endpoint}", self.base_url);
        debug!(endpoint, params = query.len(), "GET");

        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .map_err(|e| HarvestError::fetch(endpoint, e.without_url()))?;

        let status = response.status();
        let text = response
            .text()
            .map_err(|e| HarvestError::fetch(endpoint, e.without_url()))?;

        if !status.is_success() {
            let message = api_error_message(&text).unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            });
            warn!(endpoint, status = status.as_u16(), %message, "API request rejected");
            return Err(HarvestError::Api {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&text).map_err(|e| HarvestError::decode(endpoint, e))
    }
}

/// Extract `error.message` from an API error body.
fn api_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("error")?
        .get("message")?
        .as_str()
        .map(str::to_string)
}

/// Decode a JSON document into a payload type, tagging failures with the endpoint.
///
/// # Errors
///
/// Returns [`HarvestError::Decode`] if the document does not match `T`.
pub fn decode<T: serde::de::DeserializeOwned>(
    endpoint: &str,
    value: serde_json::Value,
) -> Result<T> {
    serde_json::from_value(value).map_err(|e| HarvestError::decode(endpoint, e))
}

/// Coerce an API count (delivered as a decimal string) to an integer.
#[must_use]
pub fn count(value: Option<&String>) -> u64 {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(0)
}

// --- Channel payloads ---

#[derive(Debug, Deserialize)]
pub struct ChannelListResponse {
    pub items: Option<Vec<ChannelResource>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelResource {
    pub id: String,
    pub snippet: ChannelSnippet,
    pub statistics: Option<ChannelStatistics>,
    pub content_details: Option<ChannelContentDetails>,
}

#[derive(Debug, Deserialize)]
pub struct ChannelSnippet {
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelStatistics {
    pub view_count: Option<String>,
    pub subscriber_count: Option<String>,
    pub video_count: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelContentDetails {
    pub related_playlists: RelatedPlaylists,
}

#[derive(Debug, Deserialize)]
pub struct RelatedPlaylists {
    #[serde(default)]
    pub uploads: String,
}

// --- Playlist item payloads ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistItemListResponse {
    pub items: Option<Vec<PlaylistItemResource>>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistItemResource {
    pub content_details: Option<PlaylistItemContentDetails>,
    pub snippet: Option<PlaylistItemSnippet>,
}

impl PlaylistItemResource {
    /// The referenced video, from content details or the snippet's resource id.
    #[must_use]
    pub fn video_id(&self) -> Option<&str> {
        self.content_details
            .as_ref()
            .and_then(|details| details.video_id.as_deref())
            .or_else(|| {
                self.snippet
                    .as_ref()
                    .and_then(|snippet| snippet.resource_id.as_ref())
                    .and_then(|rid| rid.video_id.as_deref())
            })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistItemContentDetails {
    pub video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistItemSnippet {
    pub resource_id: Option<ResourceId>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceId {
    pub video_id: Option<String>,
}

// --- Video payloads ---

#[derive(Debug, Deserialize)]
pub struct VideoListResponse {
    pub items: Option<Vec<VideoResource>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoResource {
    pub id: String,
    pub snippet: Option<VideoSnippet>,
    pub statistics: Option<VideoStatistics>,
    pub content_details: Option<VideoContentDetails>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSnippet {
    #[serde(default)]
    pub title: String,
    pub published_at: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoStatistics {
    pub view_count: Option<String>,
    pub like_count: Option<String>,
    pub dislike_count: Option<String>,
    pub comment_count: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct VideoContentDetails {
    pub duration: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn count_coerces_strings() {
        assert_eq!(count(Some(&"1200".to_string())), 1200);
        assert_eq!(count(Some(&" 7 ".to_string())), 7);
        assert_eq!(count(Some(&"n/a".to_string())), 0);
        assert_eq!(count(None), 0);
    }

    #[test]
    fn api_error_message_reads_nested_message() {
        let body = r#"{"error": {"code": 403, "message": "quotaExceeded"}}"#;
        assert_eq!(api_error_message(body).as_deref(), Some("quotaExceeded"));
        assert_eq!(api_error_message("<html>"), None);
    }

    #[test]
    fn playlist_item_video_id_falls_back_to_snippet() {
        let item: PlaylistItemResource = decode(
            PLAYLIST_ITEMS_ENDPOINT,
            json!({"snippet": {"resourceId": {"videoId": "v9"}}}),
        )
        .unwrap();
        assert_eq!(item.video_id(), Some("v9"));

        let item: PlaylistItemResource = decode(
            PLAYLIST_ITEMS_ENDPOINT,
            json!({"contentDetails": {"videoId": "v1"}, "snippet": {"resourceId": {"videoId": "v2"}}}),
        )
        .unwrap();
        assert_eq!(item.video_id(), Some("v1"));
    }

    #[test]
    fn decode_reports_endpoint() {
        let err = decode::<ChannelListResponse>(CHANNELS_ENDPOINT, json!({"items": 5})).unwrap_err();
        assert!(matches!(err, HarvestError::Decode { ref endpoint, .. } if endpoint == "channels"));
    }

    #[test]
    fn http_transport_trims_base_url() {
        let transport =
            HttpTransport::new("http://localhost:9/v3/", Duration::from_secs(1)).unwrap();
        assert_eq!(transport.base_url(), "http://localhost:9/v3");
    }

    #[test]
    fn http_transport_failure_does_not_echo_key() {
        let transport =
            HttpTransport::new("http://127.0.0.1:9/v3", Duration::from_secs(2)).unwrap();
        let err = transport
            .get(
                CHANNELS_ENDPOINT,
                &[("id", "C1".to_string()), ("key", "SECRETKEY123".to_string())],
            )
            .unwrap_err();

        assert!(err.is_fetch_error());
        let message = err.to_string();
        assert!(!message.contains("SECRETKEY123"), "{message}");
        assert!(!message.contains("key="), "{message}");
    }
}
