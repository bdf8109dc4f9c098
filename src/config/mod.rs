//! Configuration loading and validation

mod parser;
mod types;

pub use parser::{compute_config_hash, load_config, load_config_with_hash};
pub use types::{Config, CrawlerConfig, HttpConfig, ProxiesConfig, StorageConfig};
