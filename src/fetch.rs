//! Channel and video fetchers.
//!
//! Both fetchers are thin mappings from API payloads to [`Channel`] and
//! [`Video`] rows. Neither retries; the caller decides whether to re-invoke.

use crate::api::{
    self, CHANNELS_ENDPOINT, ChannelListResponse, PLAYLIST_ITEMS_ENDPOINT,
    PlaylistItemListResponse, Transport, VIDEOS_ENDPOINT, VideoListResponse, VideoResource,
};
use crate::duration;
use crate::error::{HarvestError, Result};
use crate::model::{Channel, Video};
use tracing::{debug, info};

/// Default number of playlist pages walked per fetch.
pub const DEFAULT_PAGE_LIMIT: usize = 5;

/// Default number of playlist entries requested per page.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Largest page the API accepts.
pub const MAX_PAGE_SIZE: usize = 50;

/// Retrieves one channel's profile.
pub struct ChannelFetcher<T> {
    transport: T,
}

impl<T: Transport> ChannelFetcher<T> {
    pub const fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Fetch the channel's snippet, statistics and content details in one call.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError::NotFound`] if the identifier matches no channel,
    /// or a fetch-class error if the request fails.
    pub fn fetch(&self, token: &str, channel_id: &str) -> Result<Channel> {
        let query = [
            ("part", "snippet,statistics,contentDetails".to_string()),
            ("id", channel_id.to_string()),
            ("key", token.to_string()),
        ];
        let response: ChannelListResponse =
            api::decode(CHANNELS_ENDPOINT, self.transport.get(CHANNELS_ENDPOINT, &query)?)?;

        let resource = response
            .items
            .unwrap_or_default()
            .into_iter()
            .next()
            .ok_or_else(|| HarvestError::not_found("Channel", channel_id))?;

        let stats = resource.statistics.unwrap_or_default();
        let playlist_id = resource
            .content_details
            .map(|details| details.related_playlists.uploads)
            .unwrap_or_default();

        let channel = Channel {
            channel_id: resource.id,
            channel_name: resource.snippet.title,
            subscribers: api::count(stats.subscriber_count.as_ref()),
            total_videos: api::count(stats.video_count.as_ref()),
            view_count: api::count(stats.view_count.as_ref()),
            playlist_id,
        };
        debug!(channel_id = %channel.channel_id, name = %channel.channel_name, "Fetched channel");
        Ok(channel)
    }
}

/// Walks an upload playlist page by page, one batched detail request per page.
pub struct VideoFetcher<T> {
    transport: T,
    page_limit: usize,
    page_size: usize,
}

impl<T: Transport> VideoFetcher<T> {
    pub const fn new(transport: T) -> Self {
        Self {
            transport,
            page_limit: DEFAULT_PAGE_LIMIT,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Override the page bounds. `page_size` is clamped to `1..=50`.
    #[must_use]
    pub fn with_pages(mut self, page_limit: usize, page_size: usize) -> Self {
        self.page_limit = page_limit;
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    #[must_use]
    pub const fn page_limit(&self) -> usize {
        self.page_limit
    }

    #[must_use]
    pub const fn page_size(&self) -> usize {
        self.page_size
    }

    /// Fetch up to `page_limit * page_size` videos from the head of the playlist.
    ///
    /// Issues at most two requests per page. Any failure discards everything
    /// collected so far.
    ///
    /// # Errors
    ///
    /// Returns a fetch-class error if any request fails.
    pub fn fetch(&self, token: &str, playlist_id: &str) -> Result<Vec<Video>> {
        let mut videos = Vec::new();
        let mut cursor: Option<String> = None;

        for page in 0..self.page_limit {
            let mut query = vec![
                ("part", "snippet,contentDetails".to_string()),
                ("playlistId", playlist_id.to_string()),
                ("maxResults", self.page_size.to_string()),
                ("key", token.to_string()),
            ];
            if let Some(page_token) = &cursor {
                query.push(("pageToken", page_token.clone()));
            }

            let listing: PlaylistItemListResponse = api::decode(
                PLAYLIST_ITEMS_ENDPOINT,
                self.transport.get(PLAYLIST_ITEMS_ENDPOINT, &query)?,
            )?;

            let ids: Vec<String> = listing
                .items
                .unwrap_or_default()
                .iter()
                .filter_map(|item| item.video_id().map(str::to_string))
                .collect();
            if ids.is_empty() {
                debug!(page, "Empty playlist page, stopping");
                break;
            }

            let batch = self.fetch_details(token, &ids)?;
            debug!(page, requested = ids.len(), received = batch.len(), "Fetched page");
            videos.extend(batch);

            match listing.next_page_token {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        info!(playlist_id, count = videos.len(), "Fetched videos");
        Ok(videos)
    }

    fn fetch_details(&self, token: &str, ids: &[String]) -> Result<Vec<Video>> {
        let query = [
            ("part", "snippet,contentDetails,statistics".to_string()),
            ("id", ids.join(",")),
            ("key", token.to_string()),
        ];
        let details: VideoListResponse =
            api::decode(VIDEOS_ENDPOINT, self.transport.get(VIDEOS_ENDPOINT, &query)?)?;

        Ok(details
            .items
            .unwrap_or_default()
            .into_iter()
            .map(video_from_resource)
            .collect())
    }
}

fn video_from_resource(resource: VideoResource) -> Video {
    let snippet = resource.snippet.unwrap_or_default();
    let stats = resource.statistics.unwrap_or_default();
    let published_at = snippet.published_at.unwrap_or_default();

    Video {
        video_id: resource.id,
        channel_id: String::new(),
        title: snippet.title,
        published_year: Video::year_of(&published_at),
        published_at,
        view_count: api::count(stats.view_count.as_ref()),
        likes: api::count(stats.like_count.as_ref()),
        dislikes: api::count(stats.dislike_count.as_ref()),
        comments: api::count(stats.comment_count.as_ref()),
        duration: resource
            .content_details
            .and_then(|details| details.duration)
            .map_or(0, |text| duration::parse(&text)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};
    use std::cell::RefCell;
    use std::collections::VecDeque;

    /// Replays canned responses in order and records every request.
    struct Replay {
        responses: RefCell<VecDeque<Result<Value>>>,
        calls: RefCell<Vec<(String, Vec<(String, String)>)>>,
    }

    impl Replay {
        fn new(responses: Vec<Result<Value>>) -> Self {
            Self {
                responses: RefCell::new(responses.into()),
                calls: RefCell::new(Vec::new()),
            }
        }

        fn param(&self, call: usize, key: &str) -> Option<String> {
            self.calls.borrow()[call]
                .1
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
        }
    }

    impl Transport for Replay {
        fn get(&self, endpoint: &str, query: &[(&str, String)]) -> Result<Value> {
            self.calls.borrow_mut().push((
                endpoint.to_string(),
                query.iter().map(|(k, v)| ((*k).to_string(), v.clone())).collect(),
            ));
            self.responses
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Ok(json!({})))
        }
    }

    fn page(ids: &[&str], next: Option<&str>) -> Result<Value> {
        let items: Vec<Value> = ids
            .iter()
            .map(|id| json!({"contentDetails": {"videoId": id}}))
            .collect();
        Ok(match next {
            Some(token) => json!({"items": items, "nextPageToken": token}),
            None => json!({"items": items}),
        })
    }

    fn details(ids: &[&str]) -> Result<Value> {
        let items: Vec<Value> = ids
            .iter()
            .map(|id| {
                json!({
                    "id": id,
                    "snippet": {"title": format!("Video {id}"), "publishedAt": "2023-05-01T00:00:00Z"},
                    "statistics": {"viewCount": "10", "likeCount": "2"},
                    "contentDetails": {"duration": "PT1M5S"}
                })
            })
            .collect();
        Ok(json!({ "items": items }))
    }

    #[test]
    fn channel_fetch_maps_fields() {
        let replay = Replay::new(vec![Ok(json!({
            "items": [{
                "id": "UC1",
                "snippet": {"title": "Acme"},
                "statistics": {"subscriberCount": "100", "videoCount": "3"},
                "contentDetails": {"relatedPlaylists": {"uploads": "UU1"}}
            }]
        }))]);

        let channel = ChannelFetcher::new(&replay).fetch("tok", "UC1").unwrap();
        assert_eq!(channel.channel_name, "Acme");
        assert_eq!(channel.subscribers, 100);
        assert_eq!(channel.total_videos, 3);
        assert_eq!(channel.view_count, 0);
        assert_eq!(channel.playlist_id, "UU1");

        assert_eq!(replay.calls.borrow()[0].0, CHANNELS_ENDPOINT);
        assert_eq!(
            replay.param(0, "part").as_deref(),
            Some("snippet,statistics,contentDetails")
        );
        assert_eq!(replay.param(0, "key").as_deref(), Some("tok"));
    }

    #[test]
    fn channel_fetch_empty_items_is_not_found() {
        let replay = Replay::new(vec![Ok(json!({"items": []}))]);
        let err = ChannelFetcher::new(&replay).fetch("tok", "UCx").unwrap_err();
        assert!(matches!(err, HarvestError::NotFound { .. }));

        let replay = Replay::new(vec![Ok(json!({"kind": "youtube#channelListResponse"}))]);
        let err = ChannelFetcher::new(&replay).fetch("tok", "UCx").unwrap_err();
        assert!(matches!(err, HarvestError::NotFound { .. }));
    }

    #[test]
    fn channel_fetch_propagates_transport_failure() {
        let replay = Replay::new(vec![Err(HarvestError::fetch("channels", "refused"))]);
        let err = ChannelFetcher::new(&replay).fetch("tok", "UC1").unwrap_err();
        assert!(err.is_fetch_error());
    }

    #[test]
    fn video_fetch_follows_cursor_and_batches_details() {
        let replay = Replay::new(vec![
            page(&["a", "b"], Some("p2")),
            details(&["a", "b"]),
            page(&["c"], None),
            details(&["c"]),
        ]);

        let videos = VideoFetcher::new(&replay).fetch("tok", "UU1").unwrap();
        assert_eq!(videos.len(), 3);
        assert_eq!(videos[0].duration, 65);
        assert_eq!(videos[0].published_year, "2023");
        assert_eq!(videos[0].likes, 2);
        assert_eq!(videos[0].comments, 0);
        assert_eq!(videos[0].dislikes, 0);

        assert_eq!(replay.calls.borrow().len(), 4);
        assert_eq!(replay.param(0, "pageToken"), None);
        assert_eq!(replay.param(1, "id").as_deref(), Some("a,b"));
        assert_eq!(replay.param(2, "pageToken").as_deref(), Some("p2"));
        assert_eq!(replay.param(0, "maxResults").as_deref(), Some("10"));
    }

    #[test]
    fn video_fetch_stops_on_empty_page() {
        let replay = Replay::new(vec![page(&[], Some("p2"))]);
        let videos = VideoFetcher::new(&replay).fetch("tok", "UU1").unwrap();
        assert!(videos.is_empty());
        assert_eq!(replay.calls.borrow().len(), 1);
    }

    #[test]
    fn video_fetch_respects_page_limit() {
        let replay = Replay::new(vec![
            page(&["a"], Some("p2")),
            details(&["a"]),
            page(&["b"], Some("p3")),
            details(&["b"]),
        ]);
        let videos = VideoFetcher::new(&replay)
            .with_pages(2, 1)
            .fetch("tok", "UU1")
            .unwrap();
        assert_eq!(videos.len(), 2);
        assert_eq!(replay.calls.borrow().len(), 4);
    }

    #[test]
    fn video_fetch_failure_discards_partial_pages() {
        let replay = Replay::new(vec![
            page(&["a"], Some("p2")),
            details(&["a"]),
            Err(HarvestError::fetch("playlistItems", "timeout")),
        ]);
        let result = VideoFetcher::new(&replay).fetch("tok", "UU1");
        assert!(result.unwrap_err().is_fetch_error());
    }

    #[test]
    fn zero_page_limit_makes_no_calls() {
        let replay = Replay::new(vec![]);
        let videos = VideoFetcher::new(&replay)
            .with_pages(0, 10)
            .fetch("tok", "UU1")
            .unwrap();
        assert!(videos.is_empty());
        assert!(replay.calls.borrow().is_empty());
    }

    #[test]
    fn page_size_is_clamped() {
        let replay = Replay::new(vec![]);
        let fetcher = VideoFetcher::new(&replay).with_pages(1, 500);
        assert_eq!(fetcher.page_size(), MAX_PAGE_SIZE);
        let fetcher = VideoFetcher::new(&replay).with_pages(1, 0);
        assert_eq!(fetcher.page_size(), 1);
    }

    #[test]
    fn video_mapping_defaults_missing_fields() {
        let video = video_from_resource(VideoResource {
            id: "v".to_string(),
            snippet: None,
            statistics: None,
            content_details: None,
        });
        assert_eq!(video.title, "");
        assert_eq!(video.published_year, "");
        assert_eq!(video.duration, 0);
        assert_eq!(video.view_count, 0);
    }
}
