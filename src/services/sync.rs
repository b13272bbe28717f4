// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Incremental activity sync.
//!
//! Handles the core workflow:
//! 1. Read the checkpoint (latest stored activity start time)
//! 2. Fetch pages of newer activities until Strava returns an empty page
//! 3. For each activity, fetch and store its laps
//! 4. Store the whole page of activities
//!
//! Laps are written before their activity. A crash mid-page can leave laps
//! without a parent row; the next run re-fetches the page and the
//! idempotent inserts fill in the rest.
//!
//! Runs are sequential and must not overlap: [`SyncEngine::run`] takes
//! `&mut self`, and callers must not point two engines at the same store.

use crate::db::Store;
use crate::error::Result;
use crate::services::{SessionManager, StravaClient};
use crate::time_utils::{epoch, format_utc_rfc3339};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Where a sync run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SyncState {
    Idle,
    FetchingActivities { page: u32 },
    FetchingLaps { page: u32, activity_id: u64 },
    Persisting { page: u32 },
    /// Terminal: Strava returned an empty page.
    Done,
}

/// Summary of a successful run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncReport {
    /// Non-empty pages processed
    pub pages: u32,
    pub activities: usize,
    pub laps: usize,
    pub checkpoint_before: DateTime<Utc>,
    pub checkpoint_after: DateTime<Utc>,
}

/// Coordinates the Strava client, session and store. Holds no persistent
/// state of its own.
pub struct SyncEngine {
    client: StravaClient,
    session: SessionManager,
    store: Arc<dyn Store>,
    state: SyncState,
}

impl SyncEngine {
    pub fn new(client: StravaClient, session: SessionManager, store: Arc<dyn Store>) -> Self {
        Self {
            client,
            session,
            store,
            state: SyncState::Idle,
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    /// Run one sync.
    ///
    /// Any error aborts the run and is returned as is; nothing is retried.
    /// Re-running is safe because the checkpoint is recomputed from the
    /// store and every write is idempotent.
    pub async fn run(&mut self, cancel: &CancellationToken) -> Result<SyncReport> {
        match self.run_pages(cancel).await {
            Ok(report) => {
                tracing::info!(
                    pages = report.pages,
                    activities = report.activities,
                    laps = report.laps,
                    checkpoint = %format_utc_rfc3339(report.checkpoint_after),
                    "Sync complete"
                );
                Ok(report)
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    state = ?self.state,
                    resumable = e.is_resumable(),
                    "Sync aborted"
                );
                self.state = SyncState::Idle;
                Err(e)
            }
        }
    }

    async fn run_pages(&mut self, cancel: &CancellationToken) -> Result<SyncReport> {
        let checkpoint = self.store.most_recent_activity_timestamp().await?;
        // Nothing stored yet: fetch the full history.
        let after = (checkpoint > epoch()).then_some(checkpoint);

        tracing::info!(checkpoint = %format_utc_rfc3339(checkpoint), "Starting sync");

        let mut report = SyncReport {
            pages: 0,
            activities: 0,
            laps: 0,
            checkpoint_before: checkpoint,
            checkpoint_after: checkpoint,
        };

        let mut page = 1;
        loop {
            self.transition(SyncState::FetchingActivities { page });
            let activities = self
                .client
                .list_activities(&mut self.session, page, after, cancel)
                .await?;

            if activities.is_empty() {
                self.transition(SyncState::Done);
                break;
            }

            tracing::info!(page, count = activities.len(), "Fetched activity page");

            for activity in &activities {
                self.transition(SyncState::FetchingLaps {
                    page,
                    activity_id: activity.id,
                });
                let laps = self
                    .client
                    .list_laps(&mut self.session, activity.id, cancel)
                    .await?;

                self.store.save_laps(activity.id, &laps).await?;
                report.laps += laps.len();
            }

            self.transition(SyncState::Persisting { page });
            self.store.save_activities(&activities).await?;

            report.pages += 1;
            report.activities += activities.len();
            page += 1;
        }

        report.checkpoint_after = self.store.most_recent_activity_timestamp().await?;
        Ok(report)
    }

    fn transition(&mut self, next: SyncState) {
        tracing::debug!(from = ?self.state, to = ?next, "Sync state transition");
        self.state = next;
    }
}
