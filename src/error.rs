// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Error types shared by the sync engine and its collaborators.

/// Maximum number of characters of a provider response body kept in errors.
const MAX_ERROR_BODY_CHARS: usize = 512;

/// Application error type.
///
/// Every variant aborts a sync run. Nothing is retried inside the crate;
/// the scheduler that invoked the run decides whether to try again.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Token refresh failed or no credential has been provisioned.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The caller cancelled the run while it was waiting for request quota.
    #[error("Cancelled while waiting for Strava rate limit")]
    RateLimitCancelled,

    /// Unexpected status, transport failure or undecodable body from Strava.
    #[error("Strava API error on {endpoint}{}: {body}", http_status_suffix(.status))]
    StravaApi {
        endpoint: String,
        status: Option<u16>,
        body: String,
    },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Build a provider error, truncating the response body.
    pub fn strava(endpoint: impl Into<String>, status: Option<u16>, body: &str) -> Self {
        AppError::StravaApi {
            endpoint: endpoint.into(),
            status,
            body: truncate_body(body),
        }
    }

    /// Whether Strava rejected the access token (HTTP 401).
    pub fn is_strava_token_error(&self) -> bool {
        matches!(self, AppError::StravaApi { status: Some(401), .. })
    }

    /// Whether Strava reported its own rate limit as exceeded (HTTP 429).
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, AppError::StravaApi { status: Some(429), .. })
    }

    /// Whether simply re-running the sync can succeed.
    ///
    /// Auth failures need a new refresh token and bad requests need a code
    /// or configuration fix; everything else is transient and safe to retry
    /// because persistence is idempotent.
    pub fn is_resumable(&self) -> bool {
        !matches!(self, AppError::Auth(_) | AppError::BadRequest(_))
    }
}

fn http_status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

fn truncate_body(body: &str) -> String {
    match body.char_indices().nth(MAX_ERROR_BODY_CHARS) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, AppError>;
