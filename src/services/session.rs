// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! OAuth session lifecycle.
//!
//! The [`SessionManager`] owns the one live [`Credential`]. It refreshes
//! the access token when it has expired and writes every refreshed
//! credential back to the store.

use crate::db::Store;
use crate::error::{AppError, Result};
use crate::models::Credential;
use crate::services::StravaClient;
use crate::time_utils::format_utc_rfc3339;
use std::sync::Arc;

/// Owner of the live credential.
pub struct SessionManager {
    client: StravaClient,
    store: Arc<dyn Store>,
    credential: Credential,
}

impl SessionManager {
    pub fn new(client: StravaClient, store: Arc<dyn Store>, credential: Credential) -> Self {
        Self {
            client,
            store,
            credential,
        }
    }

    /// Load the stored credential.
    ///
    /// When the store holds none, `seed` (a provisioned refresh token) is
    /// stored and used instead. Without either there is nothing to refresh
    /// from, and acquiring a first refresh token happens outside this crate.
    ///
    /// A stored credential always wins over `seed`. Replacing a revoked
    /// refresh token goes through [`SessionManager::provision`].
    pub async fn load(
        client: StravaClient,
        store: Arc<dyn Store>,
        seed: Option<Credential>,
    ) -> Result<Self> {
        let credential = match store.get_session().await? {
            Some(credential) => credential,
            None => {
                let credential = seed.ok_or_else(|| {
                    AppError::Auth(
                        "No Strava session stored; provision a refresh token first".to_string(),
                    )
                })?;
                tracing::info!("Seeding Strava session from provisioned refresh token");
                store.save_session(&credential).await?;
                credential
            }
        };

        Ok(Self::new(client, store, credential))
    }

    /// Store `credential` unconditionally, replacing any existing session.
    pub async fn provision(
        client: StravaClient,
        store: Arc<dyn Store>,
        credential: Credential,
    ) -> Result<Self> {
        store.save_session(&credential).await?;
        tracing::info!(
            expires_at = %format_utc_rfc3339(credential.expires_at_utc()),
            "Strava session provisioned"
        );
        Ok(Self::new(client, store, credential))
    }

    /// The current credential, which may be expired.
    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Return a credential whose access token is usable now.
    ///
    /// An unexpired credential is returned as is, without any network call.
    /// Otherwise the token is refreshed. If the refresh fails the expired
    /// credential stays in place unchanged. A refreshed credential replaces
    /// the old one before it is persisted, so a store failure cannot lose
    /// a rotated refresh token from memory.
    pub async fn ensure_valid(&mut self) -> Result<&Credential> {
        if !self.credential.is_expired() {
            return Ok(&self.credential);
        }

        tracing::info!(
            expired_at = %format_utc_rfc3339(self.credential.expires_at_utc()),
            "Access token expired, refreshing"
        );

        let refreshed = self.client.refresh_token(&self.credential).await?;
        self.credential = refreshed;
        self.store.save_session(&self.credential).await?;

        tracing::info!(
            expires_at = %format_utc_rfc3339(self.credential.expires_at_utc()),
            "Token refreshed and stored"
        );
        Ok(&self.credential)
    }

    /// Valid access token for an API call.
    pub async fn access_token(&mut self) -> Result<String> {
        Ok(self.ensure_valid().await?.access_token.clone())
    }
}
