//! Worker pool and crawl pipeline
//!
//! Workers are symmetric: each loops claim → rate limit → fetch → extract →
//! store → re-enqueue links → done. Failures at any stage mark the item
//! errored with a stage-specific retry window and the worker moves on.

use crate::config::Config;
use crate::crawler::fetcher::{build_http_client, fetch_html, is_allowed_content_type};
use crate::crawler::parser::{
    extract_hrefs, extract_lang, extract_meta_description, extract_title, extract_visible_text,
};
use crate::limiter::HostLimiters;
use crate::proxy::ProxyPool;
use crate::storage::{QueueItem, SqliteStorage, Storage};
use crate::url::{is_in_domain, normalize_host, url_hash};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

/// Retry window after a failed fetch
const FETCH_RETRY: Duration = Duration::from_secs(5 * 60);
/// Retry window after a disallowed content type
const CONTENT_TYPE_RETRY: Duration = Duration::from_secs(30 * 60);
/// Retry window after a failed page store
const STORE_RETRY: Duration = Duration::from_secs(10 * 60);

/// Sleep between polls when the queue is empty
const IDLE_SLEEP: Duration = Duration::from_millis(500);
/// Pause after an unexpected worker error
const ERROR_PAUSE: Duration = Duration::from_secs(1);

/// Shared state every worker operates on
#[derive(Clone)]
pub struct CrawlContext {
    pub storage: Arc<Mutex<SqliteStorage>>,
    pub config: Arc<Config>,
    pub proxies: Arc<ProxyPool>,
    pub limiters: Arc<HostLimiters>,
    pub shutdown: watch::Receiver<bool>,
}

/// Resolves the configured worker count
///
/// Zero means auto: four workers per available core, capped at 64, and
/// never fewer than one.
pub fn effective_worker_count(configured: usize) -> usize {
    if configured > 0 {
        return configured;
    }
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    (cores * 4).min(64).max(1)
}

/// Spawns the worker pool; each worker runs until the shutdown signal flips
pub fn spawn_workers(ctx: CrawlContext) -> Vec<JoinHandle<()>> {
    let count = effective_worker_count(ctx.config.crawler.workers);
    info!(workers = count, "starting worker pool");
    (0..count)
        .map(|id| {
            let ctx = ctx.clone();
            tokio::spawn(worker_loop(id, ctx))
        })
        .collect()
}

/// Resolves when the shutdown flag flips; a closed channel never resolves
async fn shutdown_signal(rx: &mut watch::Receiver<bool>) {
    if rx.changed().await.is_err() {
        std::future::pending::<()>().await;
    }
}

async fn worker_loop(id: usize, ctx: CrawlContext) {
    let mut shutdown = ctx.shutdown.clone();
    debug!(worker = id, "worker started");
    loop {
        if *shutdown.borrow() {
            break;
        }
        match process_next(&ctx).await {
            Ok(true) => {}
            Ok(false) => {
                tokio::select! {
                    _ = tokio::time::sleep(IDLE_SLEEP) => {}
                    _ = shutdown_signal(&mut shutdown) => {}
                }
            }
            Err(err) => {
                warn!(worker = id, error = %err, "worker iteration failed");
                tokio::select! {
                    _ = tokio::time::sleep(ERROR_PAUSE) => {}
                    _ = shutdown_signal(&mut shutdown) => {}
                }
            }
        }
    }
    debug!(worker = id, "worker stopped");
}

/// Claims and fully processes one queue item
///
/// Returns Ok(false) when no item was eligible. Fetch, content-type, and
/// store failures are recorded on the item and do not surface as errors
/// here; only storage-level failures do.
pub async fn process_next(ctx: &CrawlContext) -> crate::Result<bool> {
    let item = { ctx.storage.lock().unwrap().claim_next()? };
    let Some(item) = item else {
        return Ok(false);
    };
    process_item(ctx, &item).await?;
    Ok(true)
}

async fn process_item(ctx: &CrawlContext, item: &QueueItem) -> crate::Result<()> {
    debug!(id = item.id, url = %item.url, attempt = item.attempts, "processing");

    // per-host politeness, keyed on the normalized host; the shutdown
    // signal cuts the wait short and the claimed item runs to completion
    if let Ok(parsed) = Url::parse(&item.url) {
        let host = normalize_host(parsed.host_str().unwrap_or(""));
        if let Some(bucket) = ctx.limiters.limiter_for(&host) {
            let mut shutdown = ctx.shutdown.clone();
            if !*shutdown.borrow() {
                tokio::select! {
                    _ = bucket.acquire() => {}
                    _ = shutdown_signal(&mut shutdown) => {}
                }
            }
        }
    }

    let cfg = &ctx.config.crawler;
    let fetched = {
        let proxy = ctx.proxies.next();
        match build_http_client(
            proxy.as_ref(),
            Duration::from_secs(cfg.fetch_timeout_secs),
            &cfg.user_agent,
        ) {
            Ok(client) => fetch_html(&client, &item.url, cfg.max_html_bytes).await,
            Err(err) => Err(err),
        }
    };

    let result = match fetched {
        Ok(result) => result,
        Err(err) => {
            warn!(id = item.id, url = %item.url, error = %err, "fetch failed");
            ctx.storage
                .lock()
                .unwrap()
                .mark_error(item.id, &format!("fetch: {}", err), FETCH_RETRY)?;
            return Ok(());
        }
    };

    if !is_allowed_content_type(&result.content_type, &cfg.content_types) {
        debug!(id = item.id, content_type = %result.content_type, "content type not allowed");
        ctx.storage.lock().unwrap().mark_error(
            item.id,
            &format!("content-type not allowed: {}", result.content_type),
            CONTENT_TYPE_RETRY,
        )?;
        return Ok(());
    }

    if result.truncated {
        debug!(id = item.id, url = %item.url, "body truncated at byte cap");
    }

    let title = extract_title(&result.body);
    let description = extract_meta_description(&result.body);
    let lang = extract_lang(&result.body);
    let text = extract_visible_text(&result.body);

    let page_id = {
        let mut storage = ctx.storage.lock().unwrap();
        match storage.upsert_page(
            item.site_id,
            &item.url,
            &title,
            &description,
            &lang,
            result.status,
            &result.content_type,
            &result.body,
            &text,
        ) {
            Ok(id) => id,
            Err(err) => {
                warn!(id = item.id, url = %item.url, error = %err, "page store failed");
                storage.mark_error(item.id, &format!("store: {}", err), STORE_RETRY)?;
                return Ok(());
            }
        }
    };

    // the page is stored at this point; nothing past here may strand the
    // row in processing
    let domain = { ctx.storage.lock().unwrap().get_site_domain(item.site_id) };
    let (enqueued, accepted) = match domain {
        Ok(domain) => enqueue_links(ctx, item, page_id, &domain, &result.body),
        Err(err) => {
            warn!(id = item.id, error = %err, "site lookup failed, skipping link enqueue");
            (0, 0)
        }
    };

    if let Err(err) = ctx.storage.lock().unwrap().mark_done(item.id) {
        warn!(id = item.id, error = %err, "mark done failed");
    }
    info!(
        id = item.id,
        url = %item.url,
        status = result.status,
        accepted,
        enqueued,
        "page crawled"
    );
    Ok(())
}

/// Resolves, filters, and re-enqueues the links found on a page
///
/// Keeps only http(s) links whose normalized host is in the site's domain,
/// drops fragments, and deduplicates by URL hash within the page. Returns
/// (newly enqueued, distinct accepted).
pub(crate) fn enqueue_links(
    ctx: &CrawlContext,
    item: &QueueItem,
    page_id: i64,
    site_domain: &str,
    html: &str,
) -> (usize, usize) {
    let Ok(base) = Url::parse(&item.url) else {
        warn!(url = %item.url, "unparseable base url, skipping links");
        return (0, 0);
    };

    let mut seen: HashSet<String> = HashSet::new();
    let mut enqueued = 0;
    for href in extract_hrefs(html) {
        let href = href.trim();
        if href.is_empty() || href.starts_with('#') {
            continue;
        }
        let lower = href.to_lowercase();
        if lower.starts_with("javascript:")
            || lower.starts_with("mailto:")
            || lower.starts_with("tel:")
        {
            continue;
        }

        let Ok(mut resolved) = base.join(href) else {
            debug!(href, "unresolvable link");
            continue;
        };
        resolved.set_fragment(None);
        if resolved.scheme() != "http" && resolved.scheme() != "https" {
            continue;
        }
        let Some(host) = resolved.host_str().map(str::to_string) else {
            continue;
        };
        let norm = normalize_host(&host);
        if !is_in_domain(&norm, site_domain) {
            continue;
        }
        if resolved.set_host(Some(&norm)).is_err() {
            continue;
        }

        let link_url = resolved.to_string();
        let hash = url_hash(&link_url);
        if !seen.insert(hash.clone()) {
            continue;
        }

        let mut storage = ctx.storage.lock().unwrap();
        // link edges are best-effort; a failed edge never blocks the enqueue
        if let Err(err) = storage.insert_page_link(page_id, &link_url, &hash) {
            debug!(url = %link_url, error = %err, "link edge insert failed");
        }
        match storage.enqueue(item.site_id, &link_url, &hash, 0) {
            Ok(true) => enqueued += 1,
            Ok(false) => {}
            Err(err) => warn!(url = %link_url, error = %err, "link enqueue failed"),
        }
    }
    (enqueued, seen.len())
}
