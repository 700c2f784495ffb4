use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::interview::aggregator::RecommendationThresholds;

const DEFAULT_MODEL: &str = "gemini-2.0-flash";
const DEFAULT_MAX_MEDIA_BYTES: usize = 20 * 1024 * 1024;

/// Application configuration loaded from environment variables.
/// Startup fails if a variable is present but cannot be parsed.
#[derive(Debug, Clone)]
pub struct Config {
    /// Missing key is tolerated at startup; every gateway call then fails.
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub port: u16,
    pub rust_log: String,
    pub gateway_timeout: Duration,
    pub max_media_bytes: usize,
    /// `None` disables session expiry.
    pub session_ttl: Option<Duration>,
    pub session_sweep_interval: Duration,
    pub upload_dir: Option<PathBuf>,
    pub thresholds: RecommendationThresholds,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let defaults = RecommendationThresholds::default();
        let thresholds = RecommendationThresholds {
            strong_hire: parse_env("STRONG_HIRE_THRESHOLD", defaults.strong_hire)?,
            hire: parse_env("HIRE_THRESHOLD", defaults.hire)?,
            lean_no_hire: parse_env("LEAN_NO_HIRE_THRESHOLD", defaults.lean_no_hire)?,
        };
        if let Err(reason) = thresholds.validate() {
            bail!("Invalid recommendation thresholds: {reason}");
        }

        let ttl_secs: u64 = parse_env("SESSION_TTL_SECS", 86_400)?;
        let sweep_secs: u64 = parse_env("SESSION_SWEEP_SECS", 60)?;
        if sweep_secs == 0 {
            bail!("SESSION_SWEEP_SECS must be greater than zero");
        }

        Ok(Config {
            gemini_api_key: optional_env("GEMINI_API_KEY"),
            gemini_model: optional_env("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            port: parse_env("PORT", 8000)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            gateway_timeout: Duration::from_secs(parse_env("GATEWAY_TIMEOUT_SECS", 120)?),
            max_media_bytes: parse_env("MAX_MEDIA_BYTES", DEFAULT_MAX_MEDIA_BYTES)?,
            session_ttl: (ttl_secs > 0).then(|| Duration::from_secs(ttl_secs)),
            session_sweep_interval: Duration::from_secs(sweep_secs),
            upload_dir: optional_env("UPLOAD_DIR").map(PathBuf::from),
            thresholds,
        })
    }
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value: {raw}")),
        None => Ok(default),
    }
}
