//! Database schema definitions
//!
//! All SQL schema for the crawler database. The partial unique index on the
//! crawl queue is the deduplication contract: at most one active
//! (queued/processing) row per (site_id, url_hash).

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Crawl target domains
CREATE TABLE IF NOT EXISTS sites (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    domain TEXT NOT NULL UNIQUE,
    enabled INTEGER NOT NULL DEFAULT 1,
    rps_limit INTEGER NOT NULL DEFAULT 10,
    rps_burst INTEGER NOT NULL DEFAULT 20,
    depth_limit INTEGER NOT NULL DEFAULT 3,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Shared work queue all workers claim from
CREATE TABLE IF NOT EXISTS crawl_queue (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    site_id INTEGER NOT NULL REFERENCES sites(id),
    url TEXT NOT NULL,
    url_hash TEXT NOT NULL,
    priority INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL DEFAULT 'queued',
    attempts INTEGER NOT NULL DEFAULT 0,
    last_error TEXT,
    next_try_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- At most one active row per (site, url); done/error rows do not block
CREATE UNIQUE INDEX IF NOT EXISTS idx_queue_active
    ON crawl_queue(site_id, url_hash)
    WHERE status IN ('queued', 'processing');

-- Supports the claim query's ordering
CREATE INDEX IF NOT EXISTS idx_queue_claim
    ON crawl_queue(status, priority DESC, id);

-- Durable artifact of a successful fetch
CREATE TABLE IF NOT EXISTS pages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    site_id INTEGER NOT NULL REFERENCES sites(id),
    url TEXT NOT NULL,
    url_hash TEXT NOT NULL,
    title TEXT,
    description TEXT,
    lang TEXT,
    http_status INTEGER,
    content_type TEXT,
    html_hash TEXT,
    html TEXT,
    fetched_at TEXT,
    text TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE(site_id, url_hash)
);

CREATE INDEX IF NOT EXISTS idx_pages_site ON pages(site_id);

-- Discovered link edges, deduplicated per source page
CREATE TABLE IF NOT EXISTS page_links (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    from_page_id INTEGER NOT NULL REFERENCES pages(id),
    to_url TEXT NOT NULL,
    to_url_hash TEXT NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE(from_page_id, to_url_hash)
);

CREATE INDEX IF NOT EXISTS idx_page_links_from ON page_links(from_page_id);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_initializes() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(initialize_schema(&conn).is_ok());
    }

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();
        assert!(initialize_schema(&conn).is_ok());
    }

    #[test]
    fn test_tables_exist_after_init() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        for table in ["sites", "crawl_queue", "pages", "page_links"] {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "Table {} should exist", table);
        }
    }

    #[test]
    fn test_active_dedup_index_blocks_duplicate_queued_rows() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        conn.execute(
            "INSERT INTO sites (domain, created_at, updated_at) VALUES ('example.com', 't', 't')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO crawl_queue (site_id, url, url_hash, created_at, updated_at)
             VALUES (1, 'https://example.com/', 'abc', 't', 't')",
            [],
        )
        .unwrap();

        let dup = conn.execute(
            "INSERT INTO crawl_queue (site_id, url, url_hash, created_at, updated_at)
             VALUES (1, 'https://example.com/', 'abc', 't', 't')",
            [],
        );
        assert!(dup.is_err());

        // a done row does not block re-insertion
        conn.execute("UPDATE crawl_queue SET status = 'done' WHERE id = 1", [])
            .unwrap();
        conn.execute(
            "INSERT INTO crawl_queue (site_id, url, url_hash, created_at, updated_at)
             VALUES (1, 'https://example.com/', 'abc', 't', 't')",
            [],
        )
        .unwrap();
    }
}
