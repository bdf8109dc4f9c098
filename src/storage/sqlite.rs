//! SQLite storage implementation

use crate::storage::{
    initialize_schema, now_rfc3339, PageRecord, QueueItem, QueueRow, QueueStatus, Storage,
    StorageError, StorageResult,
};
use crate::url::url_hash;
use chrono::{Duration as ChronoDuration, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::path::Path;
use std::time::Duration;

/// SQLite storage backend
///
/// A single connection shared behind a mutex by the workers and the enqueue
/// API. The claim transaction runs with immediate locking, so even without
/// the mutex at most one claimer can flip a given row to processing.
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens (or creates) the database at the given path
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Creates an in-memory database (tests)
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn queue_row_from(row: &rusqlite::Row<'_>) -> rusqlite::Result<QueueRow> {
        Ok(QueueRow {
            id: row.get(0)?,
            site_id: row.get(1)?,
            url: row.get(2)?,
            url_hash: row.get(3)?,
            priority: row.get(4)?,
            status: QueueStatus::from_db_string(&row.get::<_, String>(5)?)
                .unwrap_or(QueueStatus::Error),
            attempts: row.get(6)?,
            last_error: row.get(7)?,
            next_try_at: row.get(8)?,
        })
    }
}

const QUEUE_ROW_COLS: &str =
    "id, site_id, url, url_hash, priority, status, attempts, last_error, next_try_at";

impl Storage for SqliteStorage {
    // ===== Sites =====

    fn ensure_site(
        &mut self,
        domain: &str,
        rps_limit: u32,
        rps_burst: u32,
        depth_limit: u32,
    ) -> StorageResult<i64> {
        let now = now_rfc3339();
        let id = self.conn.query_row(
            "INSERT INTO sites (domain, enabled, rps_limit, rps_burst, depth_limit, created_at, updated_at)
             VALUES (?1, 1, ?2, ?3, ?4, ?5, ?5)
             ON CONFLICT(domain) DO UPDATE SET updated_at = excluded.updated_at
             RETURNING id",
            params![domain, rps_limit, rps_burst, depth_limit, now],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    fn get_site_domain(&self, site_id: i64) -> StorageResult<String> {
        self.conn
            .query_row(
                "SELECT domain FROM sites WHERE id = ?1",
                params![site_id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or(StorageError::SiteNotFound(site_id))
    }

    // ===== Crawl queue =====

    fn enqueue(
        &mut self,
        site_id: i64,
        url: &str,
        url_hash: &str,
        priority: i64,
    ) -> StorageResult<bool> {
        let now = now_rfc3339();
        let inserted = self.conn.execute(
            "INSERT INTO crawl_queue (site_id, url, url_hash, priority, status, attempts, created_at, updated_at)
             SELECT ?1, ?2, ?3, ?4, 'queued', 0, ?5, ?5
             WHERE NOT EXISTS (
               SELECT 1 FROM crawl_queue
               WHERE site_id = ?1 AND url_hash = ?3 AND status IN ('queued', 'processing')
             )",
            params![site_id, url, url_hash, priority, now],
        )?;
        Ok(inserted > 0)
    }

    fn claim_next(&mut self) -> StorageResult<Option<QueueItem>> {
        let now = now_rfc3339();
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let claimed = tx
            .query_row(
                "SELECT id, site_id, url, url_hash, attempts FROM crawl_queue
                 WHERE status = 'queued' AND (next_try_at IS NULL OR next_try_at <= ?1)
                 ORDER BY priority DESC, id ASC
                 LIMIT 1",
                params![now],
                |row| {
                    Ok(QueueItem {
                        id: row.get(0)?,
                        site_id: row.get(1)?,
                        url: row.get(2)?,
                        url_hash: row.get(3)?,
                        attempts: row.get(4)?,
                    })
                },
            )
            .optional()?;

        match claimed {
            Some(mut item) => {
                tx.execute(
                    "UPDATE crawl_queue
                     SET status = 'processing', attempts = attempts + 1, updated_at = ?1
                     WHERE id = ?2",
                    params![now, item.id],
                )?;
                tx.commit()?;
                item.attempts += 1;
                Ok(Some(item))
            }
            None => Ok(None),
        }
    }

    fn mark_done(&mut self, id: i64) -> StorageResult<()> {
        let now = now_rfc3339();
        self.conn.execute(
            "UPDATE crawl_queue SET status = 'done', updated_at = ?1 WHERE id = ?2",
            params![now, id],
        )?;
        Ok(())
    }

    fn mark_error(&mut self, id: i64, message: &str, retry_after: Duration) -> StorageResult<()> {
        let now = now_rfc3339();
        let next_try = (Utc::now() + ChronoDuration::milliseconds(retry_after.as_millis() as i64))
            .to_rfc3339_opts(SecondsFormat::Micros, true);
        self.conn.execute(
            "UPDATE crawl_queue
             SET status = 'error', last_error = ?1, next_try_at = ?2, updated_at = ?3
             WHERE id = ?4",
            params![message, next_try, now, id],
        )?;
        Ok(())
    }

    fn get_queue_row(&self, id: i64) -> StorageResult<QueueRow> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM crawl_queue WHERE id = ?1", QUEUE_ROW_COLS),
                params![id],
                Self::queue_row_from,
            )
            .optional()?
            .ok_or(StorageError::QueueItemNotFound(id))
    }

    fn get_active_queue_row(
        &self,
        site_id: i64,
        url_hash: &str,
    ) -> StorageResult<Option<QueueRow>> {
        let row = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM crawl_queue
                     WHERE site_id = ?1 AND url_hash = ?2 AND status IN ('queued', 'processing')",
                    QUEUE_ROW_COLS
                ),
                params![site_id, url_hash],
                Self::queue_row_from,
            )
            .optional()?;
        Ok(row)
    }

    fn count_queue_by_status(&self, status: QueueStatus) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM crawl_queue WHERE status = ?1",
            params![status.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    // ===== Pages =====

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
    ) -> StorageResult<i64> {
        let now = now_rfc3339();
        let uhash = url_hash(url);
        let html_hash = url_hash(html);
        let id = self.conn.query_row(
            "INSERT INTO pages
               (site_id, url, url_hash, title, description, lang, http_status, content_type,
                html_hash, html, fetched_at, text, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, NULLIF(?6, ''), ?7, ?8, ?9, ?10, ?12, ?11, ?12, ?12)
             ON CONFLICT(site_id, url_hash) DO UPDATE SET
               title = COALESCE(NULLIF(excluded.title, ''), pages.title),
               description = COALESCE(NULLIF(excluded.description, ''), pages.description),
               lang = COALESCE(NULLIF(excluded.lang, ''), pages.lang),
               http_status = excluded.http_status,
               content_type = excluded.content_type,
               html_hash = excluded.html_hash,
               html = excluded.html,
               fetched_at = excluded.fetched_at,
               text = excluded.text,
               updated_at = excluded.updated_at
             RETURNING id",
            params![
                site_id,
                url,
                uhash,
                title,
                description,
                lang,
                http_status,
                content_type,
                html_hash,
                html,
                text,
                now
            ],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    fn get_page_by_hash(&self, site_id: i64, url_hash: &str) -> StorageResult<Option<PageRecord>> {
        let page = self
            .conn
            .query_row(
                "SELECT id, site_id, url, url_hash, title, description, lang, http_status,
                        content_type, html_hash, text, fetched_at
                 FROM pages WHERE site_id = ?1 AND url_hash = ?2",
                params![site_id, url_hash],
                |row| {
                    Ok(PageRecord {
                        id: row.get(0)?,
                        site_id: row.get(1)?,
                        url: row.get(2)?,
                        url_hash: row.get(3)?,
                        title: row.get(4)?,
                        description: row.get(5)?,
                        lang: row.get(6)?,
                        http_status: row.get(7)?,
                        content_type: row.get(8)?,
                        html_hash: row.get(9)?,
                        text: row.get(10)?,
                        fetched_at: row.get(11)?,
                    })
                },
            )
            .optional()?;
        Ok(page)
    }

    // ===== Page links =====

    fn insert_page_link(
        &mut self,
        from_page_id: i64,
        to_url: &str,
        to_url_hash: &str,
    ) -> StorageResult<()> {
        let now = now_rfc3339();
        self.conn.execute(
            "INSERT OR IGNORE INTO page_links (from_page_id, to_url, to_url_hash, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![from_page_id, to_url, to_url_hash, now],
        )?;
        Ok(())
    }

    fn count_page_links(&self, from_page_id: i64) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM page_links WHERE from_page_id = ?1",
            params![from_page_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    // ===== Diagnostics =====

    fn ping(&self) -> StorageResult<()> {
        self.conn.query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
    }
}
