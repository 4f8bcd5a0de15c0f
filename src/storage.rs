//! `SQLite` storage for harvested channels and videos.
//!
//! The ingestion pipeline only depends on the [`Store`] trait. [`Storage`] is
//! the `SQLite` implementation and also carries the read-side queries used by
//! the CLI and the report catalogue.

use crate::error::{HarvestError, Result};
use crate::model::{Channel, Video};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use tracing::{debug, info};

const SCHEMA_VERSION: i32 = 1;

/// Table-writer capability the ingestion pipeline depends on.
///
/// Each method is a discrete unit of work; nothing spans calls.
pub trait Store {
    /// Whether a channel row with this identifier exists.
    ///
    /// # Errors
    ///
    /// Returns a store error if the lookup fails.
    fn channel_exists(&self, channel_id: &str) -> Result<bool>;

    /// Delete every video row referencing the channel. Returns rows removed.
    ///
    /// # Errors
    ///
    /// Returns a store error if the delete fails.
    fn delete_channel_videos(&self, channel_id: &str) -> Result<usize>;

    /// Delete the channel row itself. Videos must already be gone.
    ///
    /// # Errors
    ///
    /// Returns a store error if the delete fails (e.g. a foreign key violation).
    fn delete_channel(&self, channel_id: &str) -> Result<usize>;

    /// Insert a channel row.
    ///
    /// # Errors
    ///
    /// Returns a store error on constraint violation or I/O failure.
    fn insert_channel(&self, channel: &Channel) -> Result<()>;

    /// Whether a video row with this identifier exists.
    ///
    /// # Errors
    ///
    /// Returns a store error if the lookup fails.
    fn video_exists(&self, video_id: &str) -> Result<bool>;

    /// Delete one video row. Returns rows removed.
    ///
    /// # Errors
    ///
    /// Returns a store error if the delete fails.
    fn delete_video(&self, video_id: &str) -> Result<usize>;

    /// Bulk-insert video rows. Returns rows written.
    ///
    /// # Errors
    ///
    /// Returns a store error on constraint violation or I/O failure.
    fn insert_videos(&self, videos: &[Video]) -> Result<usize>;
}

impl<S: Store + ?Sized> Store for &S {
    fn channel_exists(&self, channel_id: &str) -> Result<bool> {
        (**self).channel_exists(channel_id)
    }

    fn delete_channel_videos(&self, channel_id: &str) -> Result<usize> {
        (**self).delete_channel_videos(channel_id)
    }

    fn delete_channel(&self, channel_id: &str) -> Result<usize> {
        (**self).delete_channel(channel_id)
    }

    fn insert_channel(&self, channel: &Channel) -> Result<()> {
        (**self).insert_channel(channel)
    }

    fn video_exists(&self, video_id: &str) -> Result<bool> {
        (**self).video_exists(video_id)
    }

    fn delete_video(&self, video_id: &str) -> Result<usize> {
        (**self).delete_video(video_id)
    }

    fn insert_videos(&self, videos: &[Video]) -> Result<usize> {
        (**self).insert_videos(videos)
    }
}

/// `SQLite` storage manager.
pub struct Storage {
    conn: Mutex<Connection>,
}

impl Storage {
    /// Open or create the database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(db_path.as_ref())?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
            ",
        )?;

        let storage = Self {
            conn: Mutex::new(conn),
        };
        storage.migrate()?;
        debug!(path = %db_path.as_ref().display(), "Opened database");
        Ok(storage)
    }

    /// Open an in-memory database (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be initialized.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
            ",
        )?;
        let storage = Self {
            conn: Mutex::new(conn),
        };
        storage.migrate()?;
        Ok(storage)
    }

    /// Run a closure against the underlying connection.
    ///
    /// The connection lock is held for the duration of the closure.
    pub fn with_connection<R>(&self, f: impl FnOnce(&Connection) -> Result<R>) -> Result<R> {
        let conn = self.conn.lock();
        f(&conn)
    }

    fn migrate(&self) -> Result<()> {
        let current_version = self.schema_version();

        if current_version > SCHEMA_VERSION {
            return Err(HarvestError::SchemaMismatch {
                expected: SCHEMA_VERSION,
                found: current_version,
            });
        }

        if current_version < SCHEMA_VERSION {
            info!(
                "Migrating database from version {} to {}",
                current_version, SCHEMA_VERSION
            );
            self.create_schema()?;
            self.set_schema_version(SCHEMA_VERSION)?;
        }

        Ok(())
    }

    /// Stored schema version; a database without a `meta` table is version 0.
    #[must_use]
    pub fn schema_version(&self) -> i32 {
        let conn = self.conn.lock();
        let result: std::result::Result<i32, _> = conn.query_row(
            "SELECT value FROM meta WHERE key = 'schema_version'",
            [],
            |row| {
                let value: String = row.get(0)?;
                Ok(value.parse().unwrap_or(0))
            },
        );
        result.unwrap_or_default()
    }

    fn set_schema_version(&self, version: i32) -> Result<()> {
        self.conn.lock().execute(
            "INSERT OR REPLACE INTO meta (key, value) VALUES ('schema_version', ?)",
            params![version.to_string()],
        )?;
        Ok(())
    }

    fn create_schema(&self) -> Result<()> {
        self.conn.lock().execute_batch(
            r"
            CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS channels (
                channel_id TEXT PRIMARY KEY,
                channel_name TEXT NOT NULL,
                subscribers INTEGER NOT NULL DEFAULT 0,
                total_videos INTEGER NOT NULL DEFAULT 0,
                view_count INTEGER NOT NULL DEFAULT 0,
                playlist_id TEXT NOT NULL DEFAULT ''
            );

            CREATE TABLE IF NOT EXISTS videos (
                video_id TEXT PRIMARY KEY,
                channel_id TEXT NOT NULL,
                title TEXT NOT NULL,
                published_at TEXT NOT NULL DEFAULT '',
                published_year TEXT NOT NULL DEFAULT '',
                view_count INTEGER NOT NULL DEFAULT 0,
                likes INTEGER NOT NULL DEFAULT 0,
                dislikes INTEGER NOT NULL DEFAULT 0,
                comments INTEGER NOT NULL DEFAULT 0,
                duration INTEGER NOT NULL DEFAULT 0,
                FOREIGN KEY (channel_id) REFERENCES channels(channel_id)
            );
            CREATE INDEX IF NOT EXISTS idx_videos_channel ON videos(channel_id);
            CREATE INDEX IF NOT EXISTS idx_videos_published_year ON videos(published_year);
            ",
        )?;
        Ok(())
    }

    /// Fetch one stored channel.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_channel(&self, channel_id: &str) -> Result<Option<Channel>> {
        let conn = self.conn.lock();
        let channel = conn
            .query_row(
                "SELECT channel_id, channel_name, subscribers, total_videos, view_count, playlist_id
                 FROM channels WHERE channel_id = ?",
                params![channel_id],
                channel_from_row,
            )
            .optional()?;
        Ok(channel)
    }

    /// All stored channels, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_channels(&self) -> Result<Vec<Channel>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT channel_id, channel_name, subscribers, total_videos, view_count, playlist_id
             FROM channels ORDER BY channel_name COLLATE NOCASE, channel_id",
        )?;
        let channels = stmt
            .query_map([], channel_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(channels)
    }

    /// Stored videos for a channel, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn videos_for_channel(&self, channel_id: &str) -> Result<Vec<Video>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT video_id, channel_id, title, published_at, published_year,
                    view_count, likes, dislikes, comments, duration
             FROM videos WHERE channel_id = ?
             ORDER BY published_at DESC, video_id",
        )?;
        let videos = stmt
            .query_map(params![channel_id], video_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(videos)
    }

    /// Number of stored channels.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn channel_count(&self) -> Result<u64> {
        self.count("SELECT COUNT(*) FROM channels", &[])
    }

    /// Number of stored videos, optionally restricted to one channel.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn video_count(&self, channel_id: Option<&str>) -> Result<u64> {
        match channel_id {
            Some(id) => self.count("SELECT COUNT(*) FROM videos WHERE channel_id = ?", &[id]),
            None => self.count("SELECT COUNT(*) FROM videos", &[]),
        }
    }

    /// Videos whose channel does not exist. Always zero while foreign keys hold.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn orphaned_video_count(&self) -> Result<u64> {
        self.count(
            "SELECT COUNT(*) FROM videos v
             LEFT JOIN channels c ON v.channel_id = c.channel_id
             WHERE c.channel_id IS NULL",
            &[],
        )
    }

    fn count(&self, sql: &str, args: &[&str]) -> Result<u64> {
        let conn = self.conn.lock();
        let n: i64 = conn.query_row(sql, rusqlite::params_from_iter(args), |row| row.get(0))?;
        Ok(from_sql_int(n))
    }

    fn exists(&self, sql: &str, id: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let found = conn
            .query_row(sql, params![id], |_| Ok(()))
            .optional()?
            .is_some();
        Ok(found)
    }
}

impl Store for Storage {
    fn channel_exists(&self, channel_id: &str) -> Result<bool> {
        self.exists("SELECT 1 FROM channels WHERE channel_id = ?", channel_id)
    }

    fn delete_channel_videos(&self, channel_id: &str) -> Result<usize> {
        let removed = self
            .conn
            .lock()
            .execute("DELETE FROM videos WHERE channel_id = ?", params![channel_id])?;
        Ok(removed)
    }

    fn delete_channel(&self, channel_id: &str) -> Result<usize> {
        let removed = self
            .conn
            .lock()
            .execute("DELETE FROM channels WHERE channel_id = ?", params![channel_id])?;
        Ok(removed)
    }

    fn insert_channel(&self, channel: &Channel) -> Result<()> {
        self.conn.lock().execute(
            r"
            INSERT INTO channels
            (channel_id, channel_name, subscribers, total_videos, view_count, playlist_id)
            VALUES (?, ?, ?, ?, ?, ?)
            ",
            params![
                channel.channel_id,
                channel.channel_name,
                to_sql_int(channel.subscribers),
                to_sql_int(channel.total_videos),
                to_sql_int(channel.view_count),
                channel.playlist_id,
            ],
        )?;
        Ok(())
    }

    fn video_exists(&self, video_id: &str) -> Result<bool> {
        self.exists("SELECT 1 FROM videos WHERE video_id = ?", video_id)
    }

    fn delete_video(&self, video_id: &str) -> Result<usize> {
        let removed = self
            .conn
            .lock()
            .execute("DELETE FROM videos WHERE video_id = ?", params![video_id])?;
        Ok(removed)
    }

    fn insert_videos(&self, videos: &[Video]) -> Result<usize> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let mut count = 0;

        {
            let mut stmt = tx.prepare_cached(
                r"
                INSERT INTO videos
                (video_id, channel_id, title, published_at, published_year,
                 view_count, likes, dislikes, comments, duration)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ",
            )?;

            for video in videos {
                stmt.execute(params![
                    video.video_id,
                    video.channel_id,
                    video.title,
                    video.published_at,
                    video.published_year,
                    to_sql_int(video.view_count),
                    to_sql_int(video.likes),
                    to_sql_int(video.dislikes),
                    to_sql_int(video.comments),
                    to_sql_int(video.duration),
                ])?;
                count += 1;
            }
        }

        tx.commit()?;
        Ok(count)
    }
}

fn channel_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Channel> {
    Ok(Channel {
        channel_id: row.get(0)?,
        channel_name: row.get(1)?,
        subscribers: from_sql_int(row.get(2)?),
        total_videos: from_sql_int(row.get(3)?),
        view_count: from_sql_int(row.get(4)?),
        playlist_id: row.get(5)?,
    })
}

fn video_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Video> {
    Ok(Video {
        video_id: row.get(0)?,
        channel_id: row.get(1)?,
        title: row.get(2)?,
        published_at: row.get(3)?,
        published_year: row.get(4)?,
        view_count: from_sql_int(row.get(5)?),
        likes: from_sql_int(row.get(6)?),
        dislikes: from_sql_int(row.get(7)?),
        comments: from_sql_int(row.get(8)?),
        duration: from_sql_int(row.get(9)?),
    })
}

fn to_sql_int(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn from_sql_int(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_channel(id: &str, subscribers: u64) -> Channel {
        Channel {
            channel_id: id.to_string(),
            channel_name: format!("Channel {id}"),
            subscribers,
            total_videos: 2,
            view_count: 1000,
            playlist_id: format!("UU{id}"),
        }
    }

    fn create_test_video(id: &str, channel_id: &str) -> Video {
        Video {
            video_id: id.to_string(),
            channel_id: channel_id.to_string(),
            title: format!("Video {id}"),
            published_at: "2022-06-01T12:00:00Z".to_string(),
            published_year: "2022".to_string(),
            view_count: 50,
            likes: 5,
            dislikes: 0,
            comments: 1,
            duration: 120,
        }
    }

    #[test]
    fn test_create_database() {
        let storage = Storage::open_memory().unwrap();
        assert_eq!(storage.schema_version(), SCHEMA_VERSION);
        assert_eq!(storage.channel_count().unwrap(), 0);
        assert_eq!(storage.video_count(None).unwrap(), 0);
    }

    #[test]
    fn test_open_file_database_twice() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("harvest.db");
        {
            let storage = Storage::open(&path).unwrap();
            storage.insert_channel(&create_test_channel("C1", 10)).unwrap();
        }
        let storage = Storage::open(&path).unwrap();
        assert_eq!(storage.channel_count().unwrap(), 1);
    }

    #[test]
    fn test_newer_schema_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("future.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(
                "CREATE TABLE meta (key TEXT PRIMARY KEY, value TEXT NOT NULL);
                 INSERT INTO meta VALUES ('schema_version', '99');",
            )
            .unwrap();
        }
        let err = Storage::open(&path).err().unwrap();
        assert!(matches!(
            err,
            HarvestError::SchemaMismatch { found: 99, .. }
        ));
    }

    #[test]
    fn test_store_and_retrieve_channel() {
        let storage = Storage::open_memory().unwrap();
        let channel = create_test_channel("C1", 100);
        storage.insert_channel(&channel).unwrap();

        assert!(storage.channel_exists("C1").unwrap());
        assert!(!storage.channel_exists("C2").unwrap());
        assert_eq!(storage.get_channel("C1").unwrap(), Some(channel));
        assert_eq!(storage.get_channel("C2").unwrap(), None);
    }

    #[test]
    fn test_duplicate_channel_insert_fails() {
        let storage = Storage::open_memory().unwrap();
        storage.insert_channel(&create_test_channel("C1", 1)).unwrap();
        let err = storage
            .insert_channel(&create_test_channel("C1", 2))
            .unwrap_err();
        assert!(err.is_store_error());
    }

    #[test]
    fn test_video_requires_existing_channel() {
        let storage = Storage::open_memory().unwrap();
        let err = storage
            .insert_videos(&[create_test_video("v1", "missing")])
            .unwrap_err();
        assert!(err.is_store_error());
        assert_eq!(storage.video_count(None).unwrap(), 0);
    }

    #[test]
    fn test_channel_delete_blocked_by_videos() {
        let storage = Storage::open_memory().unwrap();
        storage.insert_channel(&create_test_channel("C1", 1)).unwrap();
        storage
            .insert_videos(&[create_test_video("v1", "C1")])
            .unwrap();

        assert!(storage.delete_channel("C1").is_err());

        assert_eq!(storage.delete_channel_videos("C1").unwrap(), 1);
        assert_eq!(storage.delete_channel("C1").unwrap(), 1);
        assert_eq!(storage.channel_count().unwrap(), 0);
    }

    #[test]
    fn test_store_videos_and_read_back() {
        let storage = Storage::open_memory().unwrap();
        storage.insert_channel(&create_test_channel("C1", 1)).unwrap();

        let mut newer = create_test_video("v2", "C1");
        newer.published_at = "2023-01-01T00:00:00Z".to_string();
        newer.published_year = "2023".to_string();
        let written = storage
            .insert_videos(&[create_test_video("v1", "C1"), newer])
            .unwrap();
        assert_eq!(written, 2);

        let videos = storage.videos_for_channel("C1").unwrap();
        assert_eq!(videos.len(), 2);
        assert_eq!(videos[0].video_id, "v2");
        assert_eq!(videos[1].duration, 120);
        assert!(storage.video_exists("v1").unwrap());
        assert_eq!(storage.delete_video("v1").unwrap(), 1);
        assert!(!storage.video_exists("v1").unwrap());
        assert_eq!(storage.video_count(Some("C1")).unwrap(), 1);
        assert_eq!(storage.orphaned_video_count().unwrap(), 0);
    }

    #[test]
    fn test_list_channels_ordered_by_name() {
        let storage = Storage::open_memory().unwrap();
        let mut zed = create_test_channel("C1", 1);
        zed.channel_name = "zed".to_string();
        let mut abc = create_test_channel("C2", 1);
        abc.channel_name = "Abc".to_string();
        storage.insert_channel(&zed).unwrap();
        storage.insert_channel(&abc).unwrap();

        let names: Vec<String> = storage
            .list_channels()
            .unwrap()
            .into_iter()
            .map(|c| c.channel_name)
            .collect();
        assert_eq!(names, vec!["Abc", "zed"]);
    }

    #[test]
    fn test_counts_survive_large_values() {
        let storage = Storage::open_memory().unwrap();
        let mut channel = create_test_channel("C1", u64::MAX);
        channel.view_count = 12_345_678_901;
        storage.insert_channel(&channel).unwrap();
        let stored = storage.get_channel("C1").unwrap().unwrap();
        assert_eq!(stored.subscribers, i64::MAX as u64);
        assert_eq!(stored.view_count, 12_345_678_901);
    }
}
