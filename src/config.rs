// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! A `.env` file in the working directory is honored for local development.

use std::env;
use std::time::Duration;

/// Default Strava API base URL. The token endpoint lives under it as well.
pub const DEFAULT_STRAVA_API_URL: &str = "https://www.strava.com/api/v3";

/// Strava's published short-term quota: 100 requests per 15 minutes.
const DEFAULT_RATE_LIMIT_REQUESTS: u32 = 100;
const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 15 * 60;
const DEFAULT_RATE_LIMIT_BURST: u32 = 10;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Strava OAuth client ID (public)
    pub strava_client_id: String,
    /// Strava OAuth client secret
    pub strava_client_secret: String,
    /// Refresh token from out-of-band provisioning, used only to seed an
    /// empty session store
    pub strava_refresh_token: Option<String>,
    /// Strava API base URL
    pub strava_api_url: String,
    /// GCP project ID
    pub gcp_project_id: String,
    /// Provider quota and burst capacity
    pub rate_limit: RateLimitConfig,
    /// Timeout applied to every HTTP request
    pub http_timeout: Duration,
    /// Deadline for a whole sync run
    pub sync_timeout: Option<Duration>,
}

/// Request quota enforced against the Strava API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Maximum requests in any `window`
    pub requests: u32,
    pub window: Duration,
    /// Requests that may be issued back to back from a full bucket
    pub burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests: DEFAULT_RATE_LIMIT_REQUESTS,
            window: Duration::from_secs(DEFAULT_RATE_LIMIT_WINDOW_SECS),
            burst: DEFAULT_RATE_LIMIT_BURST,
        }
    }
}

impl RateLimitConfig {
    /// Check the invariants the token bucket relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window.is_zero() {
            return Err(ConfigError::Invalid(
                "rate limit window must be greater than zero".to_string(),
            ));
        }
        if self.burst == 0 || self.burst >= self.requests {
            return Err(ConfigError::Invalid(format!(
                "rate limit burst must be between 1 and {} (got {})",
                self.requests.saturating_sub(1),
                self.burst
            )));
        }
        Ok(())
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let rate_limit = RateLimitConfig {
            requests: parse_var("STRAVA_RATE_LIMIT_REQUESTS", DEFAULT_RATE_LIMIT_REQUESTS)?,
            window: Duration::from_secs(parse_var(
                "STRAVA_RATE_LIMIT_WINDOW_SECS",
                DEFAULT_RATE_LIMIT_WINDOW_SECS,
            )?),
            burst: parse_var("STRAVA_RATE_LIMIT_BURST", DEFAULT_RATE_LIMIT_BURST)?,
        };
        rate_limit.validate()?;

        let sync_timeout = match env::var("SYNC_TIMEOUT_SECS") {
            Ok(v) => Some(Duration::from_secs(v.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!("SYNC_TIMEOUT_SECS is not a number: {}", v))
            })?)),
            Err(_) => None,
        };

        Ok(Self {
            strava_client_id: env::var("STRAVA_CLIENT_ID")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("STRAVA_CLIENT_ID"))?,
            strava_client_secret: env::var("STRAVA_CLIENT_SECRET")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("STRAVA_CLIENT_SECRET"))?,
            strava_refresh_token: env::var("STRAVA_REFRESH_TOKEN")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            strava_api_url: env::var("STRAVA_API_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| DEFAULT_STRAVA_API_URL.to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            rate_limit,
            http_timeout: Duration::from_secs(parse_var(
                "HTTP_TIMEOUT_SECS",
                DEFAULT_HTTP_TIMEOUT_SECS,
            )?),
            sync_timeout,
        })
    }

    /// Deterministic config for tests.
    pub fn test_default() -> Self {
        Self {
            strava_client_id: "test_client_id".to_string(),
            strava_client_secret: "test_secret".to_string(),
            strava_refresh_token: None,
            strava_api_url: "http://127.0.0.1:9".to_string(),
            gcp_project_id: "test-project".to_string(),
            rate_limit: RateLimitConfig::default(),
            http_timeout: Duration::from_secs(5),
            sync_timeout: None,
        }
    }
}

/// Read an optional numeric variable, falling back to `default` when unset.
fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(v) => v
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("{} is not a number: {}", name, v))),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
