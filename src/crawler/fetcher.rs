//! HTTP fetching
//!
//! Each fetch builds on a shared reqwest client per proxy choice. Response
//! bodies are read incrementally and truncated at the configured byte cap,
//! so a hostile or misconfigured server cannot balloon memory.

use crate::{CrawlError, Result};
use std::time::Duration;
use tracing::warn;
use url::Url;

/// Outcome of a successful fetch
#[derive(Debug)]
pub struct FetchResult {
    pub status: u16,
    pub content_type: String,
    pub body: String,
    /// True when the body was cut at the byte cap
    pub truncated: bool,
}

/// Builds an HTTP client, optionally routed through a proxy
///
/// Only `http` and `https` proxies are dispatched; a `socks5` proxy is
/// accepted in configuration but fetches go direct with a warning.
pub fn build_http_client(
    proxy: Option<&Url>,
    timeout: Duration,
    user_agent: &str,
) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(user_agent.to_string())
        .redirect(reqwest::redirect::Policy::limited(5));

    if let Some(proxy_url) = proxy {
        match proxy_url.scheme() {
            "http" | "https" => {
                builder = builder.proxy(reqwest::Proxy::all(proxy_url.as_str())?);
            }
            other => {
                warn!(scheme = other, proxy = %proxy_url, "proxy scheme not dispatchable, fetching direct");
            }
        }
    }

    Ok(builder.build()?)
}

/// Fetches a URL and returns its status, content type, and (capped) body
///
/// Statuses outside [200, 400) are errors; redirects inside that window
/// were already followed by the client.
pub async fn fetch_html(client: &reqwest::Client, url: &str, max_bytes: usize) -> Result<FetchResult> {
    let mut response = client.get(url).send().await.map_err(|source| CrawlError::Http {
        url: url.to_string(),
        source,
    })?;

    let status = response.status().as_u16();
    if !(200..400).contains(&status) {
        return Err(CrawlError::HttpStatus {
            url: url.to_string(),
            status,
        });
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    let mut body = Vec::with_capacity(8 * 1024);
    let mut truncated = false;
    while let Some(chunk) = response.chunk().await.map_err(|source| CrawlError::Http {
        url: url.to_string(),
        source,
    })? {
        let remaining = max_bytes.saturating_sub(body.len());
        // a body that exactly fills the cap is not truncated
        if chunk.len() > remaining {
            body.extend_from_slice(&chunk[..remaining]);
            truncated = true;
            break;
        }
        body.extend_from_slice(&chunk);
    }

    Ok(FetchResult {
        status,
        content_type,
        body: String::from_utf8_lossy(&body).into_owned(),
        truncated,
    })
}

/// Checks a Content-Type header against the admitted prefixes
///
/// Parameters after `;` are ignored and matching is case-insensitive.
/// An empty prefix list admits everything.
pub fn is_allowed_content_type(content_type: &str, allowed: &[String]) -> bool {
    if allowed.is_empty() {
        return true;
    }
    let ct = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_lowercase();
    allowed
        .iter()
        .any(|prefix| ct.starts_with(&prefix.trim().to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allowed(types: &[&str]) -> Vec<String> {
        types.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_content_type_prefix_match() {
        let types = allowed(&["text/html"]);
        assert!(is_allowed_content_type("text/html", &types));
        assert!(is_allowed_content_type("text/html; charset=utf-8", &types));
        assert!(!is_allowed_content_type("application/pdf", &types));
    }

    #[test]
    fn test_content_type_case_insensitive() {
        let types = allowed(&["text/html"]);
        assert!(is_allowed_content_type("Text/HTML; Charset=UTF-8", &types));
    }

    #[test]
    fn test_empty_allow_list_admits_everything() {
        assert!(is_allowed_content_type("application/octet-stream", &[]));
        assert!(is_allowed_content_type("", &[]));
    }

    #[test]
    fn test_missing_header_rejected_when_list_nonempty() {
        assert!(!is_allowed_content_type("", &allowed(&["text/html"])));
    }

    #[test]
    fn test_build_client_direct_and_proxied() {
        assert!(build_http_client(None, Duration::from_secs(5), "test/1").is_ok());

        let proxy = Url::parse("http://proxy.example:8080").unwrap();
        assert!(build_http_client(Some(&proxy), Duration::from_secs(5), "test/1").is_ok());

        // socks5 is tolerated but the client is built without the proxy
        let socks = Url::parse("socks5://proxy.example:1080").unwrap();
        assert!(build_http_client(Some(&socks), Duration::from_secs(5), "test/1").is_ok());
    }
}
