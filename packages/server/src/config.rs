use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::domains::cleanse::RunnerSettings;
use crate::kernel::RetryPolicy;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub upload_dir: PathBuf,
    pub allowed_origins: Vec<String>,
    pub browser_user_agent: Option<String>,
    pub provider_attempts: u32,
    pub provider_retry_delay: Duration,
    pub navigation_timeout: Duration,
    pub ready_timeout: Duration,
    pub row_delay_min: Duration,
    pub row_delay_max: Duration,
    pub checkpoint_every: usize,
    pub stream_poll_interval: Duration,
}

/// Parse `key` if set, otherwise use `default`.
fn var_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} must be a valid number", key)),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let config = Self {
            port: var_or("PORT", 8800)?,
            upload_dir: env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./uploads")),
            allowed_origins: env::var("ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:3000".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            browser_user_agent: env::var("BROWSER_USER_AGENT").ok(),
            provider_attempts: var_or("PROVIDER_ATTEMPTS", 2)?,
            provider_retry_delay: Duration::from_secs(var_or("PROVIDER_RETRY_DELAY_SECS", 5)?),
            navigation_timeout: Duration::from_secs(var_or("NAVIGATION_TIMEOUT_SECS", 60)?),
            ready_timeout: Duration::from_secs(var_or("READY_TIMEOUT_SECS", 15)?),
            row_delay_min: Duration::from_millis(var_or("ROW_DELAY_MIN_MS", 1000)?),
            row_delay_max: Duration::from_millis(var_or("ROW_DELAY_MAX_MS", 2000)?),
            checkpoint_every: var_or("CHECKPOINT_EVERY", 10)?,
            stream_poll_interval: Duration::from_millis(var_or("STREAM_POLL_MS", 1000)?),
        };

        anyhow::ensure!(
            config.row_delay_min <= config.row_delay_max,
            "ROW_DELAY_MIN_MS must not exceed ROW_DELAY_MAX_MS"
        );
        anyhow::ensure!(config.checkpoint_every > 0, "CHECKPOINT_EVERY must be at least 1");

        Ok(config)
    }

    /// Runner knobs derived from this configuration.
    pub fn runner_settings(&self) -> RunnerSettings {
        RunnerSettings {
            provider_retry: RetryPolicy::fixed(self.provider_attempts, self.provider_retry_delay),
            navigation_timeout: self.navigation_timeout,
            ready_timeout: self.ready_timeout,
            row_delay_min: self.row_delay_min,
            row_delay_max: self.row_delay_max,
            checkpoint_every: self.checkpoint_every,
            ..RunnerSettings::default()
        }
    }
}
