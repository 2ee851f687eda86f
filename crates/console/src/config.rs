//! Console configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Optional
//! - `MINDWATCH_API_BASE` - Backend base URL (default: `http://localhost:5000/api`)
//! - `MINDWATCH_PATIENT_POLL_MS` - Patient list / admin overview poll interval (default: 5000)
//! - `MINDWATCH_CASE_POLL_MS` - Psychiatrist case, notification and analytics poll interval (default: 30000)
//! - `MINDWATCH_REQUEST_TIMEOUT_SECS` - HTTP request timeout (default: 30)
//! - `MINDWATCH_SESSION_FILE` - Where the session is persisted (default: `$HOME/.mindwatch/session.json`)
//! - `MINDWATCH_PAGE_SIZE` - Rows shown per list window (default: 10)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Sentry error sample rate (default: 1.0)

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::sync::SyncIntervals;

const DEFAULT_API_BASE: &str = "http://localhost:5000/api";
const DEFAULT_PATIENT_POLL_MS: &str = "5000";
const DEFAULT_CASE_POLL_MS: &str = "30000";
const DEFAULT_REQUEST_TIMEOUT_SECS: &str = "30";
const DEFAULT_PAGE_SIZE: &str = "10";
const SESSION_DIR: &str = ".mindwatch";
const SESSION_FILE: &str = "session.json";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Console configuration.
#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    /// Backend base URL, always ending without a trailing slash
    pub api_base: Url,
    /// Poll cadences for the dashboards' sync groups
    pub intervals: SyncIntervals,
    /// Per-request HTTP timeout
    pub request_timeout: Duration,
    /// Location of the persisted session
    pub session_file: PathBuf,
    /// Rows shown per list window
    pub page_size: usize,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
}

impl ConsoleConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set but cannot be parsed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_base = parse_api_base(&get_or_default(
            &lookup,
            "MINDWATCH_API_BASE",
            DEFAULT_API_BASE,
        ))?;

        let patient_ms: u64 = parse_var(&lookup, "MINDWATCH_PATIENT_POLL_MS", DEFAULT_PATIENT_POLL_MS)?;
        let case_ms: u64 = parse_var(&lookup, "MINDWATCH_CASE_POLL_MS", DEFAULT_CASE_POLL_MS)?;
        let intervals = SyncIntervals {
            patients: positive_millis("MINDWATCH_PATIENT_POLL_MS", patient_ms)?,
            cases: positive_millis("MINDWATCH_CASE_POLL_MS", case_ms)?,
        };

        let timeout_secs: u64 = parse_var(
            &lookup,
            "MINDWATCH_REQUEST_TIMEOUT_SECS",
            DEFAULT_REQUEST_TIMEOUT_SECS,
        )?;
        let page_size: usize = parse_var(&lookup, "MINDWATCH_PAGE_SIZE", DEFAULT_PAGE_SIZE)?;

        let session_file = lookup("MINDWATCH_SESSION_FILE").map_or_else(
            || default_session_file(lookup("HOME")),
            PathBuf::from,
        );

        let sentry_sample_rate = lookup("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);

        Ok(Self {
            api_base,
            intervals,
            request_timeout: Duration::from_secs(timeout_secs),
            session_file,
            page_size,
            sentry_dsn: lookup("SENTRY_DSN"),
            sentry_environment: lookup("SENTRY_ENVIRONMENT"),
            sentry_sample_rate,
        })
    }

    /// Defaults for a given backend, with the session file under `dir`.
    #[must_use]
    pub fn local(api_base: Url, dir: &std::path::Path) -> Self {
        Self {
            api_base,
            intervals: SyncIntervals::default(),
            request_timeout: Duration::from_secs(30),
            session_file: dir.join(SESSION_FILE),
            page_size: mindwatch_core::stats::DEFAULT_PAGE_SIZE,
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a variable with a default value.
fn get_or_default(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> String {
    lookup(key).unwrap_or_else(|| default.to_string())
}

/// Get and parse a variable, falling back to `default` when unset.
fn parse_var<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: &str,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_or_default(lookup, key, default)
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

fn positive_millis(key: &str, ms: u64) -> Result<Duration, ConfigError> {
    if ms == 0 {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "poll interval must be greater than zero".to_string(),
        ));
    }
    Ok(Duration::from_millis(ms))
}

/// Parse the base URL and strip any trailing slash so paths can be appended.
fn parse_api_base(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim_end_matches('/'))
        .map_err(|e| ConfigError::InvalidEnvVar("MINDWATCH_API_BASE".to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            "MINDWATCH_API_BASE".to_string(),
            format!("unsupported scheme: {}", url.scheme()),
        ));
    }
    Ok(url)
}

fn default_session_file(home: Option<String>) -> PathBuf {
    home.map_or_else(PathBuf::new, PathBuf::from)
        .join(SESSION_DIR)
        .join(SESSION_FILE)
}
