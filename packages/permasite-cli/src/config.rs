use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;

use permasite::types::config::DEFAULT_GATEWAY;

const DEFAULT_UPLOAD_URL: &str = "https://upload.ardrive.io/v1/tx";

/// CLI configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory snapshots are written to and read from
    pub data_dir: PathBuf,
    /// Upload endpoint of the storage network
    pub upload_url: String,
    /// Gateway that serves stored objects
    pub gateway: String,
    /// Default wallet keyfile, overridden by `--wallet`
    pub wallet_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let data_dir = match env::var("PERMASITE_DATA_DIR") {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => env::current_dir()
                .context("Failed to resolve working directory")?
                .join("data"),
        };

        let gateway = env::var("PERMASITE_GATEWAY").unwrap_or_else(|_| DEFAULT_GATEWAY.to_string());
        if !gateway.starts_with("http://") && !gateway.starts_with("https://") {
            anyhow::bail!("PERMASITE_GATEWAY must be an http(s) URL, got {gateway}");
        }

        Ok(Self {
            data_dir,
            upload_url: env::var("PERMASITE_UPLOAD_URL")
                .unwrap_or_else(|_| DEFAULT_UPLOAD_URL.to_string()),
            gateway,
            wallet_path: env::var("PERMASITE_WALLET").ok().map(PathBuf::from),
        })
    }
}
