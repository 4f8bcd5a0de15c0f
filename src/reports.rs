//! Canned analytical reports and free-text search over stored rows.
//!
//! Reports are fixed, parameterless SQL texts selected by name. Search is the
//! only query that takes user input, and that input is always bound.

use crate::error::{HarvestError, Result};
use crate::model::{Cell, ReportTable};
use crate::storage::Storage;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, Params};
use tracing::debug;

/// A named report in the catalogue.
#[derive(Debug, Clone, Copy)]
pub struct Report {
    pub name: &'static str,
    pub title: &'static str,
    pub sql: &'static str,
}

/// The report catalogue, in display order.
pub const CATALOGUE: &[Report] = &[
    Report {
        name: "video-channels",
        title: "All videos and their channels",
        sql: r"
            SELECT v.title AS video_title, c.channel_name
            FROM videos v
            JOIN channels c ON v.channel_id = c.channel_id
            ORDER BY c.channel_name, v.title
        ",
    },
    Report {
        name: "most-videos",
        title: "Channels by number of stored videos",
        sql: r"
            SELECT c.channel_name, COUNT(v.video_id) AS video_count
            FROM channels c
            LEFT JOIN videos v ON c.channel_id = v.channel_id
            GROUP BY c.channel_id, c.channel_name
            ORDER BY video_count DESC, c.channel_name
        ",
    },
    Report {
        name: "top-viewed",
        title: "Ten most viewed videos",
        sql: r"
            SELECT v.title AS video_title, c.channel_name, v.view_count
            FROM videos v
            JOIN channels c ON v.channel_id = c.channel_id
            ORDER BY v.view_count DESC, v.title
            LIMIT 10
        ",
    },
    Report {
        name: "comments-per-video",
        title: "Comment count for each video",
        sql: r"
            SELECT v.title AS video_title, v.comments
            FROM videos v
            ORDER BY v.comments DESC, v.title
        ",
    },
    Report {
        name: "most-liked",
        title: "Videos by likes",
        sql: r"
            SELECT v.title AS video_title, c.channel_name, v.likes
            FROM videos v
            JOIN channels c ON v.channel_id = c.channel_id
            ORDER BY v.likes DESC, v.title
        ",
    },
    Report {
        name: "likes-per-video",
        title: "Likes and dislikes for each video",
        sql: r"
            SELECT v.title AS video_title, v.likes, v.dislikes
            FROM videos v
            ORDER BY v.title
        ",
    },
    Report {
        name: "channel-views",
        title: "Total views per channel",
        sql: r"
            SELECT c.channel_name, c.view_count
            FROM channels c
            ORDER BY c.view_count DESC, c.channel_name
        ",
    },
    Report {
        name: "published-2022",
        title: "Channels that published videos in 2022",
        sql: r"
            SELECT DISTINCT c.channel_name
            FROM channels c
            JOIN videos v ON c.channel_id = v.channel_id
            WHERE v.published_year = '2022'
            ORDER BY c.channel_name
        ",
    },
    Report {
        name: "avg-duration",
        title: "Average video duration per channel",
        sql: r"
            SELECT c.channel_name, ROUND(AVG(v.duration), 2) AS avg_duration_seconds
            FROM channels c
            JOIN videos v ON c.channel_id = v.channel_id
            GROUP BY c.channel_id, c.channel_name
            ORDER BY avg_duration_seconds DESC, c.channel_name
        ",
    },
    Report {
        name: "most-commented",
        title: "Videos by comment count",
        sql: r"
            SELECT v.title AS video_title, c.channel_name, v.comments
            FROM videos v
            JOIN channels c ON v.channel_id = c.channel_id
            ORDER BY v.comments DESC, v.title
        ",
    },
];

const SEARCH_SQL: &str = r"
    SELECT c.channel_name, c.subscribers, c.total_videos,
           v.title AS video_title, v.likes, v.dislikes, v.comments
    FROM channels c
    LEFT JOIN videos v ON c.channel_id = v.channel_id
    WHERE c.channel_name LIKE '%' || ?1 || '%' ESCAPE '\'
       OR v.title LIKE '%' || ?1 || '%' ESCAPE '\'
    ORDER BY c.channel_name, v.title
";

/// Names of every report, in catalogue order.
#[must_use]
pub fn report_names() -> Vec<&'static str> {
    CATALOGUE.iter().map(|r| r.name).collect()
}

/// Look up a report by name (case-insensitive).
///
/// # Errors
///
/// Returns [`HarvestError::UnknownReport`] if no report has that name.
pub fn find(name: &str) -> Result<&'static Report> {
    CATALOGUE
        .iter()
        .find(|r| r.name.eq_ignore_ascii_case(name.trim()))
        .ok_or_else(|| HarvestError::unknown_report(name))
}

/// Run a named report.
///
/// # Errors
///
/// Returns an error if the report is unknown or the query fails.
pub fn run_report(storage: &Storage, name: &str) -> Result<ReportTable> {
    let report = find(name)?;
    debug!(report = report.name, "Running report");
    storage.with_connection(|conn| query_table(conn, report.sql, []))
}

/// Channels and videos whose channel name or video title contains `text`.
///
/// # Errors
///
/// Returns an error if the query is blank or fails.
pub fn search(storage: &Storage, text: &str) -> Result<ReportTable> {
    let text = text.trim();
    if text.is_empty() {
        return Err(HarvestError::invalid_argument("search query must not be empty"));
    }
    let pattern = escape_like(text);
    debug!(query = text, "Searching");
    storage.with_connection(|conn| query_table(conn, SEARCH_SQL, [pattern]))
}

/// Escape `LIKE` wildcards so the text matches literally.
fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn query_table(conn: &Connection, sql: &str, params: impl Params) -> Result<ReportTable> {
    let mut stmt = conn.prepare(sql)?;
    let columns: Vec<String> = stmt.column_names().iter().map(|c| (*c).to_string()).collect();
    let width = columns.len();

    let mut rows = Vec::new();
    let mut cursor = stmt.query(params)?;
    while let Some(row) = cursor.next()? {
        let mut cells = Vec::with_capacity(width);
        for idx in 0..width {
            cells.push(cell_from(row.get_ref(idx)?));
        }
        rows.push(cells);
    }

    Ok(ReportTable { columns, rows })
}

fn cell_from(value: ValueRef<'_>) -> Cell {
    match value {
        ValueRef::Null => Cell::Null,
        ValueRef::Integer(v) => Cell::Integer(v),
        ValueRef::Real(v) => Cell::Real(v),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Cell::Text(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Channel, Video};
    use crate::storage::Store;

    fn populated() -> Storage {
        let storage = Storage::open_memory().unwrap();
        for (id, name, views) in [("C1", "Acme Labs", 1000), ("C2", "Bolt_Works", 5000)] {
            storage
                .insert_channel(&Channel {
                    channel_id: id.to_string(),
                    channel_name: name.to_string(),
                    subscribers: 10,
                    total_videos: 2,
                    view_count: views,
                    playlist_id: String::new(),
                })
                .unwrap();
        }
        let video = |id: &str, channel: &str, year: &str, likes: u64, duration: u64| Video {
            video_id: id.to_string(),
            channel_id: channel.to_string(),
            title: format!("Title {id}"),
            published_at: format!("{year}-01-01T00:00:00Z"),
            published_year: year.to_string(),
            view_count: likes * 10,
            likes,
            dislikes: 0,
            comments: likes / 2,
            duration,
        };
        storage
            .insert_videos(&[
                video("a", "C1", "2022", 10, 60),
                video("b", "C1", "2023", 30, 120),
                video("c", "C2", "2021", 20, 300),
            ])
            .unwrap();
        storage
    }

    #[test]
    fn catalogue_has_ten_unique_names() {
        let mut names = report_names();
        assert_eq!(names.len(), 10);
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), 10);
    }

    #[test]
    fn every_report_runs_on_empty_store() {
        let storage = Storage::open_memory().unwrap();
        for report in CATALOGUE {
            let table = run_report(&storage, report.name).unwrap();
            assert!(!table.columns.is_empty(), "{} has no columns", report.name);
            if report.name != "most-videos" && report.name != "channel-views" {
                assert!(table.is_empty(), "{} returned rows", report.name);
            }
        }
    }

    #[test]
    fn every_report_runs_on_populated_store() {
        let storage = populated();
        for report in CATALOGUE {
            let table = run_report(&storage, report.name).unwrap();
            assert!(!table.is_empty(), "{} returned no rows", report.name);
        }
    }

    #[test]
    fn report_contents() {
        let storage = populated();

        let most = run_report(&storage, "most-videos").unwrap();
        assert_eq!(most.rows[0][0], Cell::Text("Acme Labs".into()));
        assert_eq!(most.rows[0][1], Cell::Integer(2));

        let liked = run_report(&storage, "most-liked").unwrap();
        assert_eq!(liked.rows[0][0], Cell::Text("Title b".into()));

        let in_2022 = run_report(&storage, "published-2022").unwrap();
        assert_eq!(in_2022.len(), 1);
        assert_eq!(in_2022.rows[0][0], Cell::Text("Acme Labs".into()));

        let avg = run_report(&storage, "avg-duration").unwrap();
        assert_eq!(avg.rows[0][0], Cell::Text("Bolt_Works".into()));
        assert_eq!(avg.rows[1][1], Cell::Real(90.0));

        let views = run_report(&storage, "channel-views").unwrap();
        assert_eq!(views.rows[0][1], Cell::Integer(5000));
    }

    #[test]
    fn only_top_viewed_is_capped_at_ten() {
        let storage = populated();
        let extra: Vec<Video> = (0..12)
            .map(|i| Video {
                video_id: format!("x{i}"),
                channel_id: "C2".to_string(),
                title: format!("Extra {i:02}"),
                published_at: "2020-01-01T00:00:00Z".to_string(),
                published_year: "2020".to_string(),
                view_count: i,
                likes: i,
                dislikes: 0,
                comments: i,
                duration: 10,
            })
            .collect();
        storage.insert_videos(&extra).unwrap();

        assert_eq!(run_report(&storage, "top-viewed").unwrap().len(), 10);
        assert_eq!(run_report(&storage, "most-liked").unwrap().len(), 15);
        assert_eq!(run_report(&storage, "most-commented").unwrap().len(), 15);
    }

    #[test]
    fn find_is_case_insensitive_and_reports_unknown() {
        assert_eq!(find("TOP-VIEWED").unwrap().name, "top-viewed");
        let err = find("nope").unwrap_err();
        assert!(matches!(err, HarvestError::UnknownReport { .. }));
    }

    #[test]
    fn search_matches_channel_or_title() {
        let storage = populated();

        let by_channel = search(&storage, "acme").unwrap();
        assert_eq!(by_channel.len(), 2);

        let by_title = search(&storage, "Title c").unwrap();
        assert_eq!(by_title.len(), 1);
        let idx = by_title.column_index("channel_name").unwrap();
        assert_eq!(by_title.rows[0][idx], Cell::Text("Bolt_Works".into()));
    }

    #[test]
    fn search_treats_wildcards_and_quotes_literally() {
        let storage = populated();
        assert_eq!(search(&storage, "_").unwrap().len(), 1);
        assert!(search(&storage, "%").unwrap().is_empty());
        assert!(search(&storage, "x' OR '1'='1").unwrap().is_empty());
    }

    #[test]
    fn search_rejects_blank_query() {
        let storage = populated();
        assert!(search(&storage, "  ").is_err());
    }

    #[test]
    fn escape_like_escapes_wildcards() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
    }
}
