// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared test helpers: a fake Strava API and ready-made fixtures.

use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, TimeZone, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use strava_sync::config::RateLimitConfig;
use strava_sync::db::{ActivityFilter, FirestoreDb, MemoryStore, Store};
use strava_sync::error::{AppError, Result};
use strava_sync::models::{Activity, ActivityMap, Credential, Lap};
use strava_sync::services::{RateLimiter, SessionManager, StravaClient, SyncEngine};

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Create a mock database connection (offline).
#[allow(dead_code)]
pub fn test_db_offline() -> FirestoreDb {
    FirestoreDb::new_mock()
}

// ═══════════════════════════════════════════════════════════════════════════
// FIXTURES
// ═══════════════════════════════════════════════════════════════════════════

/// 2024-03-{day} at 07:00 UTC.
#[allow(dead_code)]
pub fn day(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, day, 7, 0, 0).unwrap()
}

#[allow(dead_code)]
pub fn activity(id: u64, start: DateTime<Utc>) -> Activity {
    Activity {
        id,
        name: format!("Run {}", id),
        start_date_local: start,
        distance: 10_000.0,
        moving_time: 3000.0,
        workout_type: None,
        activity_type: "Run".to_string(),
        map: ActivityMap::default(),
        laps: Vec::new(),
    }
}

#[allow(dead_code)]
pub fn lap(id: u64, lap_index: u32) -> Lap {
    Lap {
        id,
        name: format!("Lap {}", lap_index),
        elapsed_time: 300,
        moving_time: 295,
        start_date_local: None,
        distance: 1000.0,
        total_elevation_gain: 4.0,
        average_speed: 3.4,
        max_speed: 4.1,
        average_cadence: Some(88.0),
        average_watts: None,
        lap_index,
        split: lap_index,
    }
}

/// Credential whose access token is good for another hour.
#[allow(dead_code)]
pub fn valid_credential() -> Credential {
    Credential {
        client_id: "test_client_id".to_string(),
        client_secret: "test_secret".to_string(),
        access_token: "valid-access".to_string(),
        refresh_token: "valid-refresh".to_string(),
        expires_at: Utc::now().timestamp() + 3600,
        token_type: "Bearer".to_string(),
    }
}

/// Credential whose access token expired a minute ago.
#[allow(dead_code)]
pub fn expired_credential() -> Credential {
    Credential {
        access_token: "stale-access".to_string(),
        refresh_token: "stale-refresh".to_string(),
        expires_at: Utc::now().timestamp() - 60,
        ..valid_credential()
    }
}

/// Quota large enough that no test ever waits.
#[allow(dead_code)]
pub fn generous_limit() -> RateLimitConfig {
    RateLimitConfig {
        requests: 10_000,
        window: Duration::from_secs(60),
        burst: 1_000,
    }
}

#[allow(dead_code)]
pub fn client_for(server: &FakeStrava, limit: RateLimitConfig) -> StravaClient {
    let limiter = Arc::new(RateLimiter::new(limit).expect("valid rate limit"));
    StravaClient::new(&server.base_url, limiter, Duration::from_secs(5))
        .expect("Failed to build client")
}

/// Session over an in-memory store, for calling the client directly.
#[allow(dead_code)]
pub fn session_for(client: &StravaClient, credential: Credential) -> SessionManager {
    SessionManager::new(client.clone(), Arc::new(MemoryStore::new()), credential)
}

/// Engine wired to the fake server and the given store.
#[allow(dead_code)]
pub fn engine_for(
    server: &FakeStrava,
    store: Arc<dyn Store>,
    credential: Credential,
    limit: RateLimitConfig,
) -> SyncEngine {
    let client = client_for(server, limit);
    let session = SessionManager::new(client.clone(), store.clone(), credential);
    SyncEngine::new(client, session, store)
}

// ═══════════════════════════════════════════════════════════════════════════
// FAKE STRAVA API
// ═══════════════════════════════════════════════════════════════════════════

/// One request received by the fake server.
#[derive(Debug, Clone)]
#[allow(dead_code)]
pub struct RecordedRequest {
    pub method: &'static str,
    pub path: String,
    pub query: HashMap<String, String>,
    pub authorization: Option<String>,
    pub body: Option<serde_json::Value>,
}

/// Scripted behavior and request log of the fake server.
#[derive(Default)]
pub struct FakeState {
    /// Activity pages served for `page=1..`; later pages are empty
    pub pages: Mutex<Vec<Vec<Activity>>>,
    pub laps: Mutex<HashMap<u64, Vec<Lap>>>,
    pub requests: Mutex<Vec<RecordedRequest>>,
    /// Status and body returned for `/athlete/activities` instead of data
    pub activities_error: Mutex<Option<(u16, String)>>,
    /// Status returned by the token endpoint instead of a token
    pub token_error: Mutex<Option<u16>>,
    /// Raw body served for lap requests instead of data
    pub laps_body_override: Mutex<Option<String>>,
    token_grants: Mutex<u32>,
}

/// A Strava look-alike bound to an ephemeral localhost port.
pub struct FakeStrava {
    pub base_url: String,
    pub state: Arc<FakeState>,
}

#[allow(dead_code)]
impl FakeStrava {
    pub async fn start() -> Self {
        let state = Arc::new(FakeState::default());

        let app = Router::new()
            .route("/athlete/activities", get(list_activities))
            .route("/activities/{id}/laps", get(list_laps))
            .route("/athlete", get(get_athlete))
            .route("/oauth/token", post(token))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fake Strava");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Self {
            base_url: format!("http://{}", addr),
            state,
        }
    }

    pub fn set_pages(&self, pages: Vec<Vec<Activity>>) {
        *self.state.pages.lock().unwrap() = pages;
    }

    pub fn set_laps(&self, activity_id: u64, laps: Vec<Lap>) {
        self.state.laps.lock().unwrap().insert(activity_id, laps);
    }

    pub fn fail_activities(&self, status: u16, body: &str) {
        *self.state.activities_error.lock().unwrap() = Some((status, body.to_string()));
    }

    pub fn fail_token(&self, status: u16) {
        *self.state.token_error.lock().unwrap() = Some(status);
    }

    pub fn serve_laps_body(&self, body: &str) {
        *self.state.laps_body_override.lock().unwrap() = Some(body.to_string());
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.path == path)
            .collect()
    }

    /// Activity list requests, in order.
    pub fn activity_requests(&self) -> Vec<RecordedRequest> {
        self.requests_to("/athlete/activities")
    }

    pub fn token_requests(&self) -> Vec<RecordedRequest> {
        self.requests_to("/oauth/token")
    }
}

fn record(
    state: &FakeState,
    method: &'static str,
    path: String,
    query: HashMap<String, String>,
    headers: &HeaderMap,
    body: Option<serde_json::Value>,
) {
    let authorization = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string());

    state.requests.lock().unwrap().push(RecordedRequest {
        method,
        path,
        query,
        authorization,
        body,
    });
}

async fn list_activities(
    State(state): State<Arc<FakeState>>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    record(
        &state,
        "GET",
        "/athlete/activities".to_string(),
        query.clone(),
        &headers,
        None,
    );

    if let Some((status, body)) = state.activities_error.lock().unwrap().clone() {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return (status, body).into_response();
    }

    let page: usize = query.get("page").and_then(|p| p.parse().ok()).unwrap_or(1);
    let after: Option<i64> = query.get("after").and_then(|a| a.parse().ok());

    // Strava filters on `after` server-side; mimic that.
    let activities: Vec<Activity> = state
        .pages
        .lock()
        .unwrap()
        .get(page.saturating_sub(1))
        .cloned()
        .unwrap_or_default()
        .into_iter()
        .filter(|a| after.map_or(true, |after| a.start_date_local.timestamp() > after))
        .collect();

    Json(activities).into_response()
}

async fn list_laps(
    State(state): State<Arc<FakeState>>,
    Path(id): Path<u64>,
    headers: HeaderMap,
) -> Response {
    record(
        &state,
        "GET",
        format!("/activities/{}/laps", id),
        HashMap::new(),
        &headers,
        None,
    );

    if let Some(body) = state.laps_body_override.lock().unwrap().clone() {
        return (StatusCode::OK, body).into_response();
    }

    let laps = state
        .laps
        .lock()
        .unwrap()
        .get(&id)
        .cloned()
        .unwrap_or_default();
    Json(laps).into_response()
}

async fn get_athlete(State(state): State<Arc<FakeState>>, headers: HeaderMap) -> Response {
    record(
        &state,
        "GET",
        "/athlete".to_string(),
        HashMap::new(),
        &headers,
        None,
    );

    Json(serde_json::json!({
        "id": 12345,
        "username": "runner",
        "firstname": "Test",
        "lastname": "Runner",
        "city": "Palo Alto",
        "state": "CA",
        "country": "United States",
        "premium": true
    }))
    .into_response()
}

async fn token(State(state): State<Arc<FakeState>>, headers: HeaderMap, body: Bytes) -> Response {
    let json: Option<serde_json::Value> = serde_json::from_slice(&body).ok();
    record(
        &state,
        "POST",
        "/oauth/token".to_string(),
        HashMap::new(),
        &headers,
        json,
    );

    if let Some(status) = *state.token_error.lock().unwrap() {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_REQUEST);
        return (status, r#"{"message":"Bad Request"}"#).into_response();
    }

    let grant = {
        let mut grants = state.token_grants.lock().unwrap();
        *grants += 1;
        *grants
    };

    Json(serde_json::json!({
        "token_type": "Bearer",
        "access_token": format!("fresh-access-{}", grant),
        "refresh_token": format!("fresh-refresh-{}", grant),
        "expires_at": Utc::now().timestamp() + 21600,
        "expires_in": 21600
    }))
    .into_response()
}

// ═══════════════════════════════════════════════════════════════════════════
// FAULTY STORE
// ═══════════════════════════════════════════════════════════════════════════

/// [`MemoryStore`] whose activity writes always fail.
#[derive(Default)]
#[allow(dead_code)]
pub struct FailingActivityStore {
    pub inner: MemoryStore,
}

#[async_trait]
impl Store for FailingActivityStore {
    async fn save_activities(&self, _activities: &[Activity]) -> Result<()> {
        Err(AppError::Database("write rejected".to_string()))
    }

    async fn save_laps(&self, activity_id: u64, laps: &[Lap]) -> Result<()> {
        self.inner.save_laps(activity_id, laps).await
    }

    async fn most_recent_activity_timestamp(&self) -> Result<DateTime<Utc>> {
        self.inner.most_recent_activity_timestamp().await
    }

    async fn load_page(&self, page: u32, per_page: u32) -> Result<Vec<Activity>> {
        self.inner.load_page(page, per_page).await
    }

    async fn load_filtered(&self, filter: ActivityFilter) -> Result<Vec<Activity>> {
        self.inner.load_filtered(filter).await
    }

    async fn load_laps(&self, activity_id: u64) -> Result<Vec<Lap>> {
        self.inner.load_laps(activity_id).await
    }

    async fn save_session(&self, credential: &Credential) -> Result<()> {
        self.inner.save_session(credential).await
    }

    async fn get_session(&self) -> Result<Option<Credential>> {
        self.inner.get_session().await
    }
}
