// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Activities (write-once, keyed by Strava activity ID)
//! - Laps (write-once, keyed by Strava lap ID)
//! - Session (the single OAuth credential document)

use crate::db::collections;
use crate::db::{
    page_offset, ActivityDocument, ActivityFilter, LapDocument, Store, SESSION_DOCUMENT_ID,
};
use crate::error::{AppError, Result};
use crate::models::{Activity, Credential, Lap};
use crate::time_utils::{epoch, format_utc_rfc3339, parse_utc_rfc3339};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use firestore::errors::FirestoreError;
use futures_util::{stream, StreamExt};

const MAX_CONCURRENT_DB_OPS: usize = 50;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    /// Create a document unless one with the same ID exists.
    ///
    /// Returns `true` if the document was written.
    async fn insert_once<T>(
        &self,
        collection: &str,
        document_id: String,
        document: &T,
    ) -> Result<bool>
    where
        T: serde::Serialize + serde::de::DeserializeOwned + Send + Sync,
    {
        let result: std::result::Result<T, FirestoreError> = self
            .get_client()?
            .fluent()
            .insert()
            .into(collection)
            .document_id(&document_id)
            .object(document)
            .execute()
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(FirestoreError::DataConflictError(_)) => {
                tracing::debug!(
                    collection,
                    document_id = %document_id,
                    "Document exists (idempotent skip)"
                );
                Ok(false)
            }
            Err(e) => Err(AppError::Database(e.to_string())),
        }
    }

    /// Decode stored activity payloads.
    fn decode_activities(documents: Vec<ActivityDocument>) -> Result<Vec<Activity>> {
        documents.iter().map(ActivityDocument::decode).collect()
    }
}

#[async_trait]
impl Store for FirestoreDb {
    // ─── Activity Operations ─────────────────────────────────────

    async fn save_activities(&self, activities: &[Activity]) -> Result<()> {
        let documents = activities
            .iter()
            .map(ActivityDocument::from_activity)
            .collect::<Result<Vec<_>>>()?;

        let inserted = stream::iter(documents)
            .map(|document| async move {
                self.insert_once(
                    collections::ACTIVITIES,
                    document.activity_id.to_string(),
                    &document,
                )
                .await
            })
            .buffer_unordered(MAX_CONCURRENT_DB_OPS)
            .collect::<Vec<Result<bool>>>()
            .await
            .into_iter()
            .collect::<Result<Vec<bool>>>()?;

        tracing::debug!(
            count = activities.len(),
            inserted = inserted.iter().filter(|i| **i).count(),
            "Saved activities"
        );
        Ok(())
    }

    async fn most_recent_activity_timestamp(&self) -> Result<DateTime<Utc>> {
        let latest: Vec<ActivityDocument> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::ACTIVITIES)
            .order_by([("start_date", firestore::FirestoreQueryDirection::Descending)])
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        match latest.first() {
            Some(document) => parse_utc_rfc3339(&document.start_date).ok_or_else(|| {
                AppError::Database(format!(
                    "Invalid start_date {:?} on activity {}",
                    document.start_date, document.activity_id
                ))
            }),
            None => Ok(epoch()),
        }
    }

    async fn load_page(&self, page: u32, per_page: u32) -> Result<Vec<Activity>> {
        let offset = page_offset(page, per_page)?;

        let documents: Vec<ActivityDocument> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::ACTIVITIES)
            .order_by([("start_date", firestore::FirestoreQueryDirection::Descending)])
            .limit(per_page)
            .offset(offset)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Self::decode_activities(documents)
    }

    async fn load_filtered(&self, filter: ActivityFilter) -> Result<Vec<Activity>> {
        let start = filter.start.map(format_utc_rfc3339);
        let end = filter.end.map(format_utc_rfc3339);

        let documents: Vec<ActivityDocument> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::ACTIVITIES)
            .filter(move |q| {
                q.for_all([
                    start
                        .clone()
                        .and_then(|start| q.field("start_date").greater_than_or_equal(start)),
                    end.clone()
                        .and_then(|end| q.field("start_date").less_than(end)),
                ])
            })
            .order_by([("start_date", firestore::FirestoreQueryDirection::Descending)])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Self::decode_activities(documents)
    }

    // ─── Lap Operations ──────────────────────────────────────────

    async fn save_laps(&self, activity_id: u64, laps: &[Lap]) -> Result<()> {
        let documents = laps
            .iter()
            .map(|lap| LapDocument::from_lap(activity_id, lap))
            .collect::<Result<Vec<_>>>()?;

        stream::iter(documents)
            .map(|document| async move {
                self.insert_once(collections::LAPS, document.lap_id.to_string(), &document)
                    .await
            })
            .buffer_unordered(MAX_CONCURRENT_DB_OPS)
            .collect::<Vec<Result<bool>>>()
            .await
            .into_iter()
            .collect::<Result<Vec<bool>>>()?;

        tracing::debug!(activity_id, count = laps.len(), "Saved laps");
        Ok(())
    }

    async fn load_laps(&self, activity_id: u64) -> Result<Vec<Lap>> {
        let mut documents: Vec<LapDocument> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::LAPS)
            .filter(move |q| q.for_all([q.field("activity_id").eq(activity_id)]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        // Sorted here rather than in the query to avoid a composite index.
        documents.sort_by_key(|d| (d.lap_index, d.lap_id));
        documents.iter().map(LapDocument::decode).collect()
    }

    // ─── Session Operations ──────────────────────────────────────

    async fn save_session(&self, credential: &Credential) -> Result<()> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::SESSION)
            .document_id(SESSION_DOCUMENT_ID)
            .object(credential)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn get_session(&self) -> Result<Option<Credential>> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::SESSION)
            .obj()
            .one(SESSION_DOCUMENT_ID)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
