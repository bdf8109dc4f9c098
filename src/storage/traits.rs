//! Storage trait and error types

use crate::storage::{PageRecord, QueueItem, QueueRow, QueueStatus};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Site not found: {0}")]
    SiteNotFound(i64),

    #[error("Queue item not found: {0}")]
    QueueItemNotFound(i64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Covers every database operation the crawl pipeline and the enqueue API
/// need. The claim operation is the only one with cross-worker coordination
/// requirements; everything else is an independent keyed write.
pub trait Storage {
    // ===== Sites =====

    /// Creates the site for a normalized domain, or touches `updated_at`
    /// when it already exists. Returns the site id either way.
    fn ensure_site(
        &mut self,
        domain: &str,
        rps_limit: u32,
        rps_burst: u32,
        depth_limit: u32,
    ) -> StorageResult<i64>;

    /// Gets the normalized domain that owns a site id
    fn get_site_domain(&self, site_id: i64) -> StorageResult<String>;

    // ===== Crawl queue =====

    /// Conditionally inserts a queue row
    ///
    /// Returns false without inserting when an active (queued/processing)
    /// row already exists for the same (site_id, url_hash). This is the
    /// queue's sole deduplication mechanism.
    fn enqueue(
        &mut self,
        site_id: i64,
        url: &str,
        url_hash: &str,
        priority: i64,
    ) -> StorageResult<bool>;

    /// Claims the next eligible queue item
    ///
    /// Selects the single queued row whose `next_try_at` is null or past,
    /// ordered by priority descending then id ascending, flips it to
    /// processing and increments its attempt count in one transaction.
    /// Returns None when no row is eligible.
    fn claim_next(&mut self) -> StorageResult<Option<QueueItem>>;

    /// Marks a queue item done
    fn mark_done(&mut self, id: i64) -> StorageResult<()>;

    /// Marks a queue item errored with a retry window
    ///
    /// Sets `last_error` and `next_try_at` = now + `retry_after`.
    fn mark_error(&mut self, id: i64, message: &str, retry_after: Duration) -> StorageResult<()>;

    /// Gets a full queue row by id
    fn get_queue_row(&self, id: i64) -> StorageResult<QueueRow>;

    /// Gets the active (queued/processing) row for a (site, url hash), if any
    fn get_active_queue_row(
        &self,
        site_id: i64,
        url_hash: &str,
    ) -> StorageResult<Option<QueueRow>>;

    /// Counts queue rows in a given status
    fn count_queue_by_status(&self, status: QueueStatus) -> StorageResult<u64>;

    // ===== Pages =====

    /// Inserts or updates the page record for (site_id, url)
    ///
    /// Last write wins for html/text/status/content-type, but empty title,
    /// description, and lang never overwrite previously non-empty values.
    /// Returns the page id.
    #[allow(clippy::too_many_arguments)]
    fn upsert_page(
        &mut self,
        site_id: i64,
        url: &str,
        title: &str,
        description: &str,
        lang: &str,
        http_status: u16,
        content_type: &str,
        html: &str,
        text: &str,
    ) -> StorageResult<i64>;

    /// Gets a page by its (site, url hash) key
    fn get_page_by_hash(&self, site_id: i64, url_hash: &str) -> StorageResult<Option<PageRecord>>;

    // ===== Page links =====

    /// Records a link edge from a page; duplicate edges are ignored
    fn insert_page_link(
        &mut self,
        from_page_id: i64,
        to_url: &str,
        to_url_hash: &str,
    ) -> StorageResult<()>;

    /// Counts outgoing link edges from a page
    fn count_page_links(&self, from_page_id: i64) -> StorageResult<u64>;

    // ===== Diagnostics =====

    /// Cheap reachability probe used by the health endpoint
    fn ping(&self) -> StorageResult<()>;
}
