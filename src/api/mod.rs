//! HTTP enqueue API and health endpoint

use crate::config::Config;
use crate::storage::{SqliteStorage, Storage};
use crate::url::{is_host_allowed, normalize_host, url_hash};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{error, info};
use url::Url;

const DUPLICATE_MESSAGE: &str = "duplicate (already queued or processing)";

/// Shared state handed to every request handler
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<Mutex<SqliteStorage>>,
    pub config: Arc<Config>,
    pub proxy_count: usize,
    pub started_at: Instant,
}

/// Builds the API router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/enqueue", post(enqueue))
        .route("/healthz", get(healthz))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct EnqueueRequest {
    pub url: String,
    #[serde(default)]
    pub priority: i64,
}

#[derive(Debug, Serialize)]
pub struct EnqueueResponse {
    pub enqueued: bool,
    pub site_id: i64,
    pub url: String,
    pub url_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<ErrorBody>) {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
}

/// Validates a submitted URL and normalizes its host in place
///
/// Returns the cleaned URL (fragment dropped, host normalized) and the
/// normalized host, or a message suitable for a 400 response.
pub(crate) fn validate_and_normalize(raw: &str) -> Result<(Url, String), String> {
    let raw = raw.trim();
    // the parser collapses an empty authority ("https:///path") into a host
    // taken from the path, so the raw authority is checked first
    if let Some((_, rest)) = raw.split_once("://") {
        let authority = rest.split(['/', '?', '#']).next().unwrap_or("");
        if authority.is_empty() {
            return Err("url has no host".to_string());
        }
    }
    let mut parsed = Url::parse(raw).map_err(|e| format!("invalid url: {}", e))?;
    match parsed.scheme() {
        "http" | "https" => {}
        other => return Err(format!("unsupported scheme: {}", other)),
    }
    let Some(host) = parsed.host_str().map(str::to_string) else {
        return Err("url has no host".to_string());
    };
    parsed.set_fragment(None);
    let norm = normalize_host(&host);
    if norm.is_empty() {
        return Err("url has no host".to_string());
    }
    if parsed.set_host(Some(&norm)).is_err() {
        return Err("url host could not be normalized".to_string());
    }
    Ok((parsed, norm))
}

async fn enqueue(
    State(state): State<AppState>,
    Json(req): Json<EnqueueRequest>,
) -> Result<Json<EnqueueResponse>, (StatusCode, Json<ErrorBody>)> {
    let (parsed, host) = validate_and_normalize(&req.url)
        .map_err(|msg| error_response(StatusCode::BAD_REQUEST, msg))?;

    let cfg = &state.config.crawler;
    if !cfg.whitelist_domains.is_empty() && !is_host_allowed(&host, &cfg.whitelist_domains) {
        return Err(error_response(
            StatusCode::FORBIDDEN,
            format!("domain not allowed: {}", host),
        ));
    }

    let final_url = parsed.to_string();
    let hash = url_hash(&final_url);

    let (site_id, enqueued) = {
        let mut storage = state.storage.lock().unwrap();
        let site_id = storage
            .ensure_site(&host, cfg.rps_per_host, cfg.rps_burst, cfg.depth_limit)
            .map_err(|e| {
                error!(error = %e, "ensure_site failed");
                error_response(StatusCode::INTERNAL_SERVER_ERROR, "storage error")
            })?;
        let enqueued = storage
            .enqueue(site_id, &final_url, &hash, req.priority)
            .map_err(|e| {
                error!(error = %e, "enqueue failed");
                error_response(StatusCode::INTERNAL_SERVER_ERROR, "storage error")
            })?;
        (site_id, enqueued)
    };

    info!(url = %final_url, site_id, enqueued, "enqueue request");
    Ok(Json(EnqueueResponse {
        enqueued,
        site_id,
        url: final_url,
        url_hash: hash,
        message: (!enqueued).then(|| DUPLICATE_MESSAGE.to_string()),
    }))
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    now: String,
    uptime_secs: u64,
    database: bool,
    proxies: usize,
    addr: String,
    whitelist_domains: Vec<String>,
    depth_limit: u32,
    rps_per_host: u32,
    rps_burst: u32,
    workers: usize,
}

async fn healthz(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let database = state.storage.lock().unwrap().ping().is_ok();
    let cfg = &state.config.crawler;
    let body = HealthResponse {
        status: if database { "ok" } else { "degraded" },
        now: chrono::Utc::now().to_rfc3339(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        database,
        proxies: state.proxy_count,
        addr: state.config.http.addr.clone(),
        whitelist_domains: cfg.whitelist_domains.clone(),
        depth_limit: cfg.depth_limit,
        rps_per_host: cfg.rps_per_host,
        rps_burst: cfg.rps_burst,
        workers: crate::crawler::effective_worker_count(cfg.workers),
    };
    let status = if database {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_http_and_https() {
        assert!(validate_and_normalize("https://example.com/page").is_ok());
        assert!(validate_and_normalize("http://example.com/").is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_input() {
        assert!(validate_and_normalize("not a url").is_err());
        assert!(validate_and_normalize("ftp://example.com/f").is_err());
        assert!(validate_and_normalize("mailto:a@example.com").is_err());
    }

    #[test]
    fn test_validate_rejects_empty_authority() {
        // would otherwise parse with host "nohost" taken from the path
        assert!(validate_and_normalize("https:///nohost").is_err());
        assert!(validate_and_normalize("http://#frag").is_err());
    }

    #[test]
    fn test_validate_drops_fragment_and_normalizes_host() {
        let (url, host) =
            validate_and_normalize("https://WWW.Example.com/page#section").unwrap();
        assert_eq!(host, "example.com");
        assert_eq!(url.as_str(), "https://example.com/page");
    }

    #[test]
    fn test_validate_keeps_explicit_port_in_url() {
        let (url, host) = validate_and_normalize("http://127.0.0.1:8081/x").unwrap();
        // site identity ignores the port, the stored URL keeps it
        assert_eq!(host, "127.0.0.1");
        assert_eq!(url.as_str(), "http://127.0.0.1:8081/x");
    }
}
