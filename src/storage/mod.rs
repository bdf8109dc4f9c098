//! Storage layer for sites, the crawl queue, pages, and page links

mod schema;
mod sqlite;
mod traits;

pub use schema::{initialize_schema, SCHEMA_SQL};
pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use chrono::{SecondsFormat, Utc};

/// Lifecycle status of a crawl queue item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueStatus {
    /// Waiting to be claimed by a worker
    Queued,

    /// Claimed by exactly one worker
    Processing,

    /// Fetched, extracted, and stored
    Done,

    /// Failed; eligible again only through a fresh insert once
    /// `next_try_at` has elapsed
    Error,
}

impl QueueStatus {
    /// Converts the status to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Done => "done",
            Self::Error => "error",
        }
    }

    /// Parses a status from its database string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(Self::Queued),
            "processing" => Some(Self::Processing),
            "done" => Some(Self::Done),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

/// A claimed unit of work handed to a worker
#[derive(Debug, Clone)]
pub struct QueueItem {
    pub id: i64,
    pub site_id: i64,
    pub url: String,
    pub url_hash: String,
    /// Attempt count after this claim
    pub attempts: u32,
}

/// Full crawl queue row, used for inspection and tests
#[derive(Debug, Clone)]
pub struct QueueRow {
    pub id: i64,
    pub site_id: i64,
    pub url: String,
    pub url_hash: String,
    pub priority: i64,
    pub status: QueueStatus,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub next_try_at: Option<String>,
}

/// A stored page record
#[derive(Debug, Clone)]
pub struct PageRecord {
    pub id: i64,
    pub site_id: i64,
    pub url: String,
    pub url_hash: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub lang: Option<String>,
    pub http_status: Option<u16>,
    pub content_type: Option<String>,
    pub html_hash: Option<String>,
    pub text: Option<String>,
    pub fetched_at: Option<String>,
}

/// Current UTC time as a fixed-width, lexicographically sortable RFC 3339
/// string; all timestamp columns use this format so string comparison in SQL
/// matches chronological order.
pub(crate) fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}
