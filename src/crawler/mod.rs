//! Crawl pipeline: fetching, extraction, and the worker pool

mod fetcher;
mod parser;
mod worker;

pub use fetcher::{build_http_client, fetch_html, is_allowed_content_type, FetchResult};
pub use parser::{
    extract_hrefs, extract_lang, extract_meta_description, extract_title, extract_visible_text,
};
pub use worker::{effective_worker_count, process_next, spawn_workers, CrawlContext};
