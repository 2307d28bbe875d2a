use anyhow::{Context, Result, bail};
use std::env;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub api_base: String,
    pub device_tag: String,
    pub http_timeout_secs: u64,
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// # Environment Variables
    /// - `API_BASE`: Optional - Promotions API base address (default: "https://surtekbb.com")
    /// - `DEVICE_TAG`: Optional - Device tag sent in the claim body (default: "scanner-<os>")
    /// - `HTTP_TIMEOUT_SECS`: Optional - HTTP request timeout in seconds (default: 30)
    pub fn from_env() -> Result<Self> {
        // Parse API base address (optional, has default)
        let api_base = env::var("API_BASE")
            .unwrap_or_else(|_| "https://surtekbb.com".to_string());

        if api_base.trim().is_empty() {
            bail!("API_BASE cannot be empty");
        }

        let api_base = api_base.trim().trim_end_matches('/').to_string();

        // Parse device tag (optional, has default)
        let device_tag = env::var("DEVICE_TAG")
            .unwrap_or_else(|_| format!("scanner-{}", env::consts::OS));

        if device_tag.trim().is_empty() {
            bail!("DEVICE_TAG cannot be empty");
        }

        // Parse HTTP timeout (optional, has default)
        let http_timeout_secs = env::var("HTTP_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse::<u64>()
            .context("HTTP_TIMEOUT_SECS must be an integer number of seconds")?;

        if http_timeout_secs == 0 {
            bail!("HTTP_TIMEOUT_SECS cannot be zero");
        }

        Ok(Config {
            api_base,
            device_tag,
            http_timeout_secs,
        })
    }
}
