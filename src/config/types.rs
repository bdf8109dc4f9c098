use serde::Deserialize;

/// Main configuration structure for the crawler service
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub http: HttpConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub proxies: ProxiesConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Address the enqueue API binds to
    #[serde(default = "default_addr")]
    pub addr: String,
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Domains the enqueue API accepts; empty list accepts any domain
    #[serde(rename = "whitelist-domains", default)]
    pub whitelist_domains: Vec<String>,

    /// Crawl depth recorded on newly created sites
    #[serde(rename = "depth-limit", default = "default_depth_limit")]
    pub depth_limit: u32,

    /// Steady-state requests per second allowed against a single host
    #[serde(rename = "rps-per-host", default = "default_rps")]
    pub rps_per_host: u32,

    /// Token-bucket burst size per host
    #[serde(rename = "rps-burst", default = "default_burst")]
    pub rps_burst: u32,

    /// Worker count; 0 means min(available parallelism x 4, 64)
    #[serde(default)]
    pub workers: usize,

    /// Per-fetch timeout in seconds
    #[serde(rename = "fetch-timeout-secs", default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,

    /// Maximum bytes read from a response body; the rest is discarded
    #[serde(rename = "max-html-bytes", default = "default_max_html_bytes")]
    pub max_html_bytes: usize,

    /// User agent sent with every fetch
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    /// Content-type prefixes admitted for extraction; empty permits everything
    #[serde(rename = "content-types", default = "default_content_types")]
    pub content_types: Vec<String>,
}

/// Egress proxy configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ProxiesConfig {
    /// Rotation policy name; only round_robin is dispatched
    #[serde(default = "default_rotation")]
    pub rotation: String,

    /// Proxy URLs (http/https/socks5); empty means direct fetches
    #[serde(default)]
    pub proxies: Vec<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            addr: default_addr(),
        }
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            whitelist_domains: Vec::new(),
            depth_limit: default_depth_limit(),
            rps_per_host: default_rps(),
            rps_burst: default_burst(),
            workers: 0,
            fetch_timeout_secs: default_fetch_timeout(),
            max_html_bytes: default_max_html_bytes(),
            user_agent: default_user_agent(),
            content_types: default_content_types(),
        }
    }
}

impl Default for ProxiesConfig {
    fn default() -> Self {
        Self {
            rotation: default_rotation(),
            proxies: Vec::new(),
        }
    }
}

fn default_addr() -> String {
    "127.0.0.1:8082".to_string()
}

fn default_depth_limit() -> u32 {
    3
}

fn default_rps() -> u32 {
    10
}

fn default_burst() -> u32 {
    20
}

fn default_fetch_timeout() -> u64 {
    15
}

fn default_max_html_bytes() -> usize {
    2 * 1024 * 1024
}

fn default_user_agent() -> String {
    "driftnet/0.1 (+https://github.com/driftnet)".to_string()
}

fn default_content_types() -> Vec<String> {
    vec!["text/html".to_string()]
}

fn default_rotation() -> String {
    "round_robin".to_string()
}
