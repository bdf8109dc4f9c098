//! Rotating egress proxy pool
//!
//! Proxies are handed out round-robin with a single atomic counter, so
//! `next` needs no lock and can be called from every worker concurrently.

use crate::config::ProxiesConfig;
use crate::{CrawlError, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::warn;
use url::Url;

/// Round-robin pool of egress proxy URLs
pub struct ProxyPool {
    proxies: Vec<Url>,
    cursor: AtomicUsize,
}

impl ProxyPool {
    /// Builds a pool from configuration, validating every proxy URL
    ///
    /// Accepts `http`, `https`, and `socks5` schemes; anything else is a
    /// configuration error.
    pub fn new(config: &ProxiesConfig) -> Result<Self> {
        let mut proxies = Vec::with_capacity(config.proxies.len());
        for raw in &config.proxies {
            let url = Url::parse(raw)?;
            match url.scheme() {
                "http" | "https" | "socks5" => proxies.push(url),
                other => return Err(CrawlError::ProxyScheme(other.to_string())),
            }
        }
        if config.rotation != "round_robin" {
            warn!(rotation = %config.rotation, "unknown proxy rotation policy, using round_robin");
        }
        Ok(Self {
            proxies,
            cursor: AtomicUsize::new(0),
        })
    }

    /// Returns the next proxy in rotation, or None when the pool is empty
    pub fn next(&self) -> Option<Url> {
        if self.proxies.is_empty() {
            return None;
        }
        let idx = self.cursor.fetch_add(1, Ordering::Relaxed) % self.proxies.len();
        Some(self.proxies[idx].clone())
    }

    /// Number of configured proxies
    pub fn len(&self) -> usize {
        self.proxies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }
}
