// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava API client.
//!
//! Handles:
//! - Activity listing (paginated, with an `after` cursor)
//! - Per-activity lap fetching
//! - Athlete profile
//! - OAuth token refresh and authorization-code exchange
//!
//! API calls wait on the shared [`RateLimiter`] before they are issued, and
//! only then ask the [`SessionManager`] for an access token, so a token that
//! expired during the wait is refreshed before the request goes out.
//! Response bodies are read fully before decoding.

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::{Activity, Athlete, Credential, Lap, TokenResponse};
use crate::services::{RateLimiter, SessionManager};
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Page size requested from `GET /athlete/activities` (Strava's maximum).
pub const ACTIVITIES_PER_PAGE: u32 = 200;

const TOKEN_PATH: &str = "/oauth/token";

/// Strava API client.
#[derive(Clone)]
pub struct StravaClient {
    http: reqwest::Client,
    base_url: String,
    limiter: Arc<RateLimiter>,
}

/// Body of `POST /oauth/token`.
#[derive(Serialize)]
struct TokenRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    grant_type: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    refresh_token: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'a str>,
}

impl StravaClient {
    /// Create a client against `base_url` (e.g. `https://www.strava.com/api/v3`).
    pub fn new(base_url: &str, limiter: Arc<RateLimiter>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                AppError::Internal(anyhow::anyhow!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            limiter,
        })
    }

    /// Create a client with its own limiter from application config.
    pub fn from_config(config: &Config) -> Result<Self> {
        let limiter = Arc::new(RateLimiter::new(config.rate_limit)?);
        Self::new(&config.strava_api_url, limiter, config.http_timeout)
    }

    /// The limiter every API call goes through.
    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// List one page of the athlete's activities, restricted to those that
    /// started after `after` when given. An empty page means there are no more.
    pub async fn list_activities(
        &self,
        session: &mut SessionManager,
        page: u32,
        after: Option<DateTime<Utc>>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Activity>> {
        let mut query = vec![
            ("page", page.to_string()),
            ("per_page", ACTIVITIES_PER_PAGE.to_string()),
        ];
        if let Some(after) = after {
            query.push(("after", after.timestamp().to_string()));
        }

        self.get_json("/athlete/activities", &query, session, cancel)
            .await
    }

    /// List the laps of an activity.
    pub async fn list_laps(
        &self,
        session: &mut SessionManager,
        activity_id: u64,
        cancel: &CancellationToken,
    ) -> Result<Vec<Lap>> {
        let path = format!("/activities/{}/laps", activity_id);
        self.get_json(&path, &[], session, cancel).await
    }

    /// Get authenticated athlete profile.
    pub async fn get_athlete(
        &self,
        session: &mut SessionManager,
        cancel: &CancellationToken,
    ) -> Result<Athlete> {
        self.get_json("/athlete", &[], session, cancel).await
    }

    /// Refresh an expired credential.
    ///
    /// Returns a new credential; the one passed in is never modified.
    pub async fn refresh_token(&self, credential: &Credential) -> Result<Credential> {
        let request = TokenRequest {
            client_id: &credential.client_id,
            client_secret: &credential.client_secret,
            grant_type: "refresh_token",
            refresh_token: Some(&credential.refresh_token),
            code: None,
        };

        let response = self.post_token(&request).await?;
        Ok(Credential::from_token_response(
            &credential.client_id,
            &credential.client_secret,
            response,
        ))
    }

    /// Exchange an authorization code (obtained out of band) for a credential.
    pub async fn exchange_code(
        &self,
        client_id: &str,
        client_secret: &str,
        code: &str,
    ) -> Result<Credential> {
        let request = TokenRequest {
            client_id,
            client_secret,
            grant_type: "authorization_code",
            refresh_token: None,
            code: Some(code),
        };

        let response = self.post_token(&request).await?;
        Ok(Credential::from_token_response(client_id, client_secret, response))
    }

    /// POST to the token endpoint. Any failure is an authentication error.
    async fn post_token(&self, request: &TokenRequest<'_>) -> Result<TokenResponse> {
        let url = format!("{}{}", self.base_url, TOKEN_PATH);

        let response = self
            .http
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| AppError::Auth(format!("Token request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| AppError::Auth(format!("Failed to read token response: {}", e)))?;

        if !status.is_success() {
            let err = AppError::strava(
                TOKEN_PATH,
                Some(status.as_u16()),
                &String::from_utf8_lossy(&body),
            );
            tracing::error!(
                status = status.as_u16(),
                grant_type = request.grant_type,
                "Strava token request rejected"
            );
            return Err(AppError::Auth(err.to_string()));
        }

        serde_json::from_slice(&body)
            .map_err(|e| AppError::Auth(format!("Failed to parse token response: {}", e)))
    }

    /// Rate-limited, bearer-authenticated GET with a JSON response.
    ///
    /// The token is taken after the limiter wait, never before it.
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        session: &mut SessionManager,
        cancel: &CancellationToken,
    ) -> Result<T> {
        self.limiter.acquire(cancel).await?;
        let access_token = session.access_token().await?;

        let url = format!("{}{}", self.base_url, path);
        let start = Instant::now();

        let response = self
            .http
            .get(&url)
            .bearer_auth(&access_token)
            .query(query)
            .send()
            .await
            .map_err(|e| AppError::strava(path, None, &e.to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| AppError::strava(path, Some(status.as_u16()), &e.to_string()))?;

        tracing::debug!(
            method = "GET",
            endpoint = path,
            status = status.as_u16(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            bytes = body.len(),
            "Strava API request"
        );

        if status == StatusCode::TOO_MANY_REQUESTS {
            tracing::warn!(endpoint = path, "Strava rate limit hit (429)");
        }

        if !status.is_success() {
            return Err(AppError::strava(
                path,
                Some(status.as_u16()),
                &String::from_utf8_lossy(&body),
            ));
        }

        serde_json::from_slice(&body).map_err(|e| {
            AppError::strava(path, Some(status.as_u16()), &format!("JSON parse error: {}", e))
        })
    }
}
