// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process [`Store`] backed by concurrent maps.
//!
//! Same idempotent-insert semantics as Firestore. Used by tests and by
//! anything that wants the engine without a database.

use crate::db::{page_offset, ActivityFilter, Store};
use crate::error::Result;
use crate::models::{Activity, Credential, Lap};
use crate::time_utils::epoch;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct StoredLap {
    activity_id: u64,
    lap: Lap,
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    activities: DashMap<u64, Activity>,
    laps: DashMap<u64, StoredLap>,
    session: RwLock<Option<Credential>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn activity_count(&self) -> usize {
        self.activities.len()
    }

    pub fn lap_count(&self) -> usize {
        self.laps.len()
    }

    /// Activities sorted newest first (ties broken by ID, descending).
    fn sorted_activities(&self) -> Vec<Activity> {
        let mut activities: Vec<Activity> = self
            .activities
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        activities.sort_by(|a, b| {
            b.start_date_local
                .cmp(&a.start_date_local)
                .then(b.id.cmp(&a.id))
        });
        activities
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn save_activities(&self, activities: &[Activity]) -> Result<()> {
        for activity in activities {
            self.activities
                .entry(activity.id)
                .or_insert_with(|| activity.clone());
        }
        Ok(())
    }

    async fn save_laps(&self, activity_id: u64, laps: &[Lap]) -> Result<()> {
        for lap in laps {
            self.laps.entry(lap.id).or_insert_with(|| StoredLap {
                activity_id,
                lap: lap.clone(),
            });
        }
        Ok(())
    }

    async fn most_recent_activity_timestamp(&self) -> Result<DateTime<Utc>> {
        Ok(self
            .activities
            .iter()
            .map(|entry| entry.value().start_date_local)
            .max()
            .unwrap_or_else(epoch))
    }

    async fn load_page(&self, page: u32, per_page: u32) -> Result<Vec<Activity>> {
        let offset = page_offset(page, per_page)? as usize;
        Ok(self
            .sorted_activities()
            .into_iter()
            .skip(offset)
            .take(per_page as usize)
            .collect())
    }

    async fn load_filtered(&self, filter: ActivityFilter) -> Result<Vec<Activity>> {
        Ok(self
            .sorted_activities()
            .into_iter()
            .filter(|activity| filter.contains(activity.start_date_local))
            .collect())
    }

    async fn load_laps(&self, activity_id: u64) -> Result<Vec<Lap>> {
        let mut laps: Vec<Lap> = self
            .laps
            .iter()
            .filter(|entry| entry.value().activity_id == activity_id)
            .map(|entry| entry.value().lap.clone())
            .collect();
        laps.sort_by_key(|lap| (lap.lap_index, lap.id));
        Ok(laps)
    }

    async fn save_session(&self, credential: &Credential) -> Result<()> {
        *self.session.write().await = Some(credential.clone());
        Ok(())
    }

    async fn get_session(&self) -> Result<Option<Credential>> {
        Ok(self.session.read().await.clone())
    }
}
