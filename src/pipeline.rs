//! Channel ingestion: fetch, full-replace upsert, and bounded video sync.
//!
//! Order of operations for one channel:
//!
//! 1. fetch the channel profile (fatal on failure)
//! 2. if the channel is already stored, delete its videos and then the channel
//! 3. insert the fresh channel row
//! 4. fetch videos from the upload playlist
//! 5. delete any fetched video that is already stored
//! 6. bulk-insert the fetched videos stamped with the channel id
//!
//! There is no transaction around the whole sequence. A failure part way
//! through leaves a partially replaced channel; running [`IngestionPipeline::ingest`]
//! again for the same identifier always performs a full replace.

use crate::api::Transport;
use crate::error::{HarvestError, Result};
use crate::fetch::{ChannelFetcher, DEFAULT_PAGE_LIMIT, DEFAULT_PAGE_SIZE, VideoFetcher};
use crate::logging::OperationGuard;
use crate::model::{IngestionResult, Video};
use crate::storage::Store;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Serializes work per channel identifier.
#[derive(Default)]
struct KeyedLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    fn handle(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock();
        // Drop handles nobody else is holding so the map stays bounded.
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        Arc::clone(locks.entry(key.to_string()).or_default())
    }
}

/// Orchestrates channel and video ingestion into a [`Store`].
pub struct IngestionPipeline<T, S> {
    transport: T,
    store: S,
    page_limit: usize,
    page_size: usize,
    in_flight: KeyedLocks,
}

impl<T: Transport, S: Store> IngestionPipeline<T, S> {
    pub fn new(transport: T, store: S) -> Self {
        Self {
            transport,
            store,
            page_limit: DEFAULT_PAGE_LIMIT,
            page_size: DEFAULT_PAGE_SIZE,
            in_flight: KeyedLocks::default(),
        }
    }

    /// Override how many playlist pages of what size are fetched per run.
    #[must_use]
    pub fn with_pages(mut self, page_limit: usize, page_size: usize) -> Self {
        self.page_limit = page_limit;
        self.page_size = page_size;
        self
    }

    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Ingest one channel and up to `page_limit * page_size` of its videos.
    ///
    /// Concurrent calls for the same identifier run one after the other.
    ///
    /// # Errors
    ///
    /// - [`HarvestError::ChannelNotFound`] if the identifier matches nothing.
    /// - A fetch-class error if the remote API fails.
    /// - A store error if persistence fails; the store may then be partially
    ///   replaced until the next successful run.
    pub fn ingest(&self, token: &str, channel_id: &str) -> Result<IngestionResult> {
        let channel_id = channel_id.trim();
        if channel_id.is_empty() {
            return Err(HarvestError::invalid_argument("channel ID must not be empty"));
        }

        let lock = self.in_flight.handle(channel_id);
        let _guard = lock.lock();

        let op = OperationGuard::new(format!("ingest {channel_id}"));
        match self.run(token, channel_id) {
            Ok(result) => {
                op.complete();
                Ok(result)
            }
            Err(err) => {
                op.fail(&err);
                Err(err)
            }
        }
    }

    fn run(&self, token: &str, channel_id: &str) -> Result<IngestionResult> {
        let channel = ChannelFetcher::new(&self.transport)
            .fetch(token, channel_id)
            .map_err(|err| match err {
                HarvestError::NotFound { .. } => HarvestError::channel_not_found(channel_id),
                other => other,
            })?;

        let replaced = self.store.channel_exists(&channel.channel_id)?;
        if replaced {
            let removed = self.store.delete_channel_videos(&channel.channel_id)?;
            self.store.delete_channel(&channel.channel_id)?;
            info!(channel_id = %channel.channel_id, removed, "Replacing stored channel");
        }

        self.store.insert_channel(&channel)?;
        debug!(channel_id = %channel.channel_id, "Stored channel");

        if channel.playlist_id.is_empty() {
            warn!(channel_id = %channel.channel_id, "Channel has no upload playlist");
            return Ok(IngestionResult {
                channel,
                videos: Vec::new(),
                replaced,
            });
        }

        let fetched = VideoFetcher::new(&self.transport)
            .with_pages(self.page_limit, self.page_size)
            .fetch(token, &channel.playlist_id)?;

        let videos = stamp_and_dedup(fetched, &channel.channel_id);

        for video in &videos {
            if self.store.video_exists(&video.video_id)? {
                self.store.delete_video(&video.video_id)?;
                debug!(video_id = %video.video_id, "Removed stale video row");
            }
        }

        if videos.is_empty() {
            info!(channel_id = %channel.channel_id, "No videos fetched");
        } else {
            let written = self.store.insert_videos(&videos)?;
            info!(channel_id = %channel.channel_id, written, "Stored videos");
        }

        Ok(IngestionResult {
            channel,
            videos,
            replaced,
        })
    }
}

/// Stamp the owning channel and keep the first occurrence of each video id.
fn stamp_and_dedup(videos: Vec<Video>, channel_id: &str) -> Vec<Video> {
    let mut seen = HashSet::new();
    videos
        .into_iter()
        .filter(|video| seen.insert(video.video_id.clone()))
        .map(|mut video| {
            video.channel_id = channel_id.to_string();
            video
        })
        .collect()
}
