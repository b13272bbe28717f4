// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session lifecycle tests: refresh on expiry, persistence, seeding.

use chrono::Utc;
use std::sync::Arc;
use strava_sync::db::{MemoryStore, Store};
use strava_sync::error::AppError;
use strava_sync::models::Credential;
use strava_sync::services::SessionManager;

mod common;
use common::{client_for, expired_credential, generous_limit, valid_credential, FakeStrava};

#[tokio::test]
async fn test_valid_credential_makes_no_network_call() {
    let server = FakeStrava::start().await;
    let store = Arc::new(MemoryStore::new());
    let credential = valid_credential();

    let mut session = SessionManager::new(
        client_for(&server, generous_limit()),
        store.clone(),
        credential.clone(),
    );

    assert_eq!(session.ensure_valid().await.unwrap(), &credential);
    assert_eq!(session.access_token().await.unwrap(), "valid-access");
    assert!(server.requests().is_empty());
    assert!(store.get_session().await.unwrap().is_none());
}

#[tokio::test]
async fn test_expired_credential_refreshed_once_and_persisted() {
    let server = FakeStrava::start().await;
    let store = Arc::new(MemoryStore::new());

    let mut session = SessionManager::new(
        client_for(&server, generous_limit()),
        store.clone(),
        expired_credential(),
    );

    let refreshed = session.ensure_valid().await.unwrap().clone();
    assert!(refreshed.expires_at > Utc::now().timestamp());
    assert_eq!(refreshed.access_token, "fresh-access-1");
    assert_eq!(refreshed.client_id, "test_client_id");
    assert_eq!(refreshed.client_secret, "test_secret");

    // Second call sees a valid token and stays offline
    session.ensure_valid().await.unwrap();
    let token_requests = server.token_requests();
    assert_eq!(token_requests.len(), 1);

    let body = token_requests[0].body.as_ref().unwrap();
    assert_eq!(body["grant_type"], "refresh_token");
    assert_eq!(body["refresh_token"], "stale-refresh");
    assert_eq!(body["client_id"], "test_client_id");

    assert_eq!(store.get_session().await.unwrap(), Some(refreshed));
}

#[tokio::test]
async fn test_failed_refresh_leaves_credential_unchanged() {
    let server = FakeStrava::start().await;
    server.fail_token(401);
    let store = Arc::new(MemoryStore::new());
    let expired = expired_credential();

    let mut session = SessionManager::new(
        client_for(&server, generous_limit()),
        store.clone(),
        expired.clone(),
    );

    let err = session.ensure_valid().await.unwrap_err();
    assert!(matches!(err, AppError::Auth(_)), "got {err:?}");
    assert_eq!(session.credential(), &expired);
    assert!(store.get_session().await.unwrap().is_none());
}

#[test]
fn test_token_expiring_exactly_now_is_expired() {
    let credential = Credential {
        expires_at: 1_700_000_000,
        ..valid_credential()
    };
    let at = chrono::DateTime::from_timestamp(1_700_000_000, 0).unwrap();

    assert!(credential.is_expired_at(at));
    assert!(!credential.is_expired_at(at - chrono::Duration::seconds(1)));
}

#[tokio::test]
async fn test_load_prefers_stored_session() {
    let server = FakeStrava::start().await;
    let store = Arc::new(MemoryStore::new());
    let stored = valid_credential();
    store.save_session(&stored).await.unwrap();

    let seed = Credential::from_refresh_token("test_client_id", "test_secret", "seed-refresh");
    let session = SessionManager::load(
        client_for(&server, generous_limit()),
        store.clone(),
        Some(seed),
    )
    .await
    .unwrap();

    assert_eq!(session.credential(), &stored);
}

#[tokio::test]
async fn test_load_seeds_empty_store() {
    let server = FakeStrava::start().await;
    let store = Arc::new(MemoryStore::new());
    let seed = Credential::from_refresh_token("test_client_id", "test_secret", "seed-refresh");

    let mut session = SessionManager::load(
        client_for(&server, generous_limit()),
        store.clone(),
        Some(seed.clone()),
    )
    .await
    .unwrap();
    assert_eq!(store.get_session().await.unwrap(), Some(seed));

    // A seed carries no access token, so first use refreshes with it
    assert_eq!(session.access_token().await.unwrap(), "fresh-access-1");
    let body = server.token_requests()[0].body.clone().unwrap();
    assert_eq!(body["refresh_token"], "seed-refresh");
}

#[tokio::test]
async fn test_load_without_session_or_seed_fails() {
    let server = FakeStrava::start().await;
    let store = Arc::new(MemoryStore::new());

    let result = SessionManager::load(client_for(&server, generous_limit()), store, None).await;

    assert!(matches!(result, Err(AppError::Auth(_))));
}

#[tokio::test]
async fn test_provision_replaces_stored_session() {
    let server = FakeStrava::start().await;
    let store = Arc::new(MemoryStore::new());
    store.save_session(&expired_credential()).await.unwrap();

    let client = client_for(&server, generous_limit());
    let seed = Credential::from_refresh_token("test_client_id", "test_secret", "new-refresh");
    let fresh = client.refresh_token(&seed).await.unwrap();

    let session = SessionManager::provision(client, store.clone(), fresh.clone())
        .await
        .unwrap();

    assert_eq!(session.credential(), &fresh);
    assert_eq!(store.get_session().await.unwrap(), Some(fresh));

    // A later load picks up the new session, not the revoked one
    let reloaded = SessionManager::load(client_for(&server, generous_limit()), store, None)
        .await
        .unwrap();
    assert_eq!(reloaded.credential().access_token, "fresh-access-1");
}
