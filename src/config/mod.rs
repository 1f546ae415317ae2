//! Configuration module for the standards backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Stores the network is made of, used by the "all stores" fan-out and the store filter.
pub const DEFAULT_STORES: [&str; 7] = [
    "Vogue Le Port",
    "Vogue Saint-Benoît",
    "Vogue Saint-Denis",
    "Vogue Saint-André",
    "Vogue Tampon",
    "Vogue Tampon-400",
    "Vogue Duparc",
];

pub const DEFAULT_IMAGE_HOST_URL: &str = "https://api.imgbb.com/1/upload";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to SQLite database file backing the task collection
    pub db_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Emit logs as JSON lines instead of the human-readable format
    pub log_json: bool,
    /// Upload endpoint of the image host
    pub image_host_url: String,
    /// API key sent with every image upload
    pub image_host_key: Option<String>,
    /// Configured store list, in display order
    pub stores: Vec<String>,
    /// Longest side, in pixels, of a recompressed photo
    pub photo_max_dimension: u32,
    /// Size bound, in bytes, of a recompressed photo
    pub photo_max_bytes: usize,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let db_path = env::var("STANDARDS_DB_PATH")
            .unwrap_or_else(|_| "./data/standards.sqlite".to_string())
            .into();

        let bind_addr = env::var("STANDARDS_BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
            .parse()
            .expect("Invalid STANDARDS_BIND_ADDR format");

        let log_level = env::var("STANDARDS_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let log_json = env::var("STANDARDS_LOG_JSON")
            .map(|v| matches!(v.trim(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let image_host_url = env::var("STANDARDS_IMAGE_HOST_URL")
            .unwrap_or_else(|_| DEFAULT_IMAGE_HOST_URL.to_string());

        let image_host_key = env::var("STANDARDS_IMAGE_HOST_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty());

        let stores = env::var("STANDARDS_STORES")
            .ok()
            .map(|raw| parse_store_list(&raw))
            .filter(|list| !list.is_empty())
            .unwrap_or_else(default_stores);

        let photo_max_dimension = env::var("STANDARDS_PHOTO_MAX_DIMENSION")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(1600);

        let photo_max_bytes = env::var("STANDARDS_PHOTO_MAX_BYTES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(1024 * 1024);

        Self {
            db_path,
            bind_addr,
            log_level,
            log_json,
            image_host_url,
            image_host_key,
            stores,
            photo_max_dimension,
            photo_max_bytes,
        }
    }
}

pub fn default_stores() -> Vec<String> {
    DEFAULT_STORES.iter().map(|s| s.to_string()).collect()
}

fn parse_store_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
