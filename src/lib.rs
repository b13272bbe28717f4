// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Strava-Sync: mirror a Strava account's activities into Firestore
//!
//! This crate incrementally fetches new activities and their laps from the
//! Strava API, within Strava's request quota, and stores them idempotently
//! keyed by Strava ID.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod time_utils;

use config::Config;
use db::Store;
use error::Result;
use models::Credential;
use services::{SessionManager, StravaClient, SyncEngine};
use std::sync::Arc;

/// Credential built from the provisioned refresh token, if one is configured.
pub fn seed_credential(config: &Config) -> Option<Credential> {
    config.strava_refresh_token.as_ref().map(|token| {
        Credential::from_refresh_token(
            &config.strava_client_id,
            &config.strava_client_secret,
            token,
        )
    })
}

/// Wire a [`SyncEngine`] from config and a store.
///
/// The stored credential is used if present; otherwise the configured
/// refresh token seeds the store.
pub async fn build_engine(config: &Config, store: Arc<dyn Store>) -> Result<SyncEngine> {
    let client = StravaClient::from_config(config)?;
    let session =
        SessionManager::load(client.clone(), store.clone(), seed_credential(config)).await?;
    Ok(SyncEngine::new(client, session, store))
}
