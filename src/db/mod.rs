// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Database layer.
//!
//! [`Store`] is the persistence contract the sync engine writes through.
//! [`FirestoreDb`] backs it in production; [`MemoryStore`] keeps everything
//! in process.

pub mod documents;
pub mod firestore;
pub mod memory;

pub use documents::{ActivityDocument, LapDocument};
pub use firestore::FirestoreDb;
pub use memory::MemoryStore;

use crate::error::{AppError, Result};
use crate::models::{Activity, Credential, Lap};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Collection names as constants.
pub mod collections {
    pub const ACTIVITIES: &str = "strava_activities";
    pub const LAPS: &str = "strava_laps";
    pub const SESSION: &str = "strava_session";
}

/// Fixed document ID of the single stored credential.
pub const SESSION_DOCUMENT_ID: &str = "strava";

/// Optional time range for [`Store::load_filtered`]: start inclusive,
/// end exclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActivityFilter {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl ActivityFilter {
    /// Whether a start time falls inside the range.
    pub fn contains(&self, start_date: DateTime<Utc>) -> bool {
        self.start.map_or(true, |start| start_date >= start)
            && self.end.map_or(true, |end| start_date < end)
    }
}

/// Document store for synced Strava data.
///
/// Activity and lap writes are idempotent inserts keyed by Strava ID: a
/// document that already exists is left untouched and no error is raised.
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert activities that are not stored yet.
    async fn save_activities(&self, activities: &[Activity]) -> Result<()>;

    /// Insert laps of `activity_id` that are not stored yet.
    async fn save_laps(&self, activity_id: u64, laps: &[Lap]) -> Result<()>;

    /// Latest `start_date_local` over all stored activities, or the Unix
    /// epoch when there are none.
    async fn most_recent_activity_timestamp(&self) -> Result<DateTime<Utc>>;

    /// One page of activities, newest first. `page` is 1-based.
    async fn load_page(&self, page: u32, per_page: u32) -> Result<Vec<Activity>>;

    /// All activities inside `filter`, newest first.
    async fn load_filtered(&self, filter: ActivityFilter) -> Result<Vec<Activity>>;

    /// Stored laps of an activity ordered by lap index.
    async fn load_laps(&self, activity_id: u64) -> Result<Vec<Lap>>;

    /// Create or replace the stored credential.
    async fn save_session(&self, credential: &Credential) -> Result<()>;

    async fn get_session(&self) -> Result<Option<Credential>>;
}

/// Validate pagination parameters and return the row offset.
pub fn page_offset(page: u32, per_page: u32) -> Result<u32> {
    if page == 0 {
        return Err(AppError::BadRequest("page must be at least 1".to_string()));
    }
    if per_page == 0 {
        return Err(AppError::BadRequest(
            "per_page must be greater than 0".to_string(),
        ));
    }
    (page - 1)
        .checked_mul(per_page)
        .ok_or_else(|| AppError::BadRequest("page offset out of range".to_string()))
}
