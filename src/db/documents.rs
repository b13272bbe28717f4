// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Stored document shapes.
//!
//! Each document keeps the provider payload as JSON next to the fields
//! queries need (`start_date` for ordering and the checkpoint, `activity_id`
//! for lap lookups).

use crate::error::{AppError, Result};
use crate::models::{Activity, Lap};
use crate::time_utils::format_utc_rfc3339;
use serde::{Deserialize, Serialize};

/// Activity row in the `strava_activities` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityDocument {
    /// Strava activity ID (also used as document ID)
    pub activity_id: u64,
    /// `start_date_local` as RFC3339 with a `Z` suffix
    pub start_date: String,
    /// JSON-encoded [`Activity`]
    pub payload: String,
}

impl ActivityDocument {
    pub fn from_activity(activity: &Activity) -> Result<Self> {
        Ok(Self {
            activity_id: activity.id,
            start_date: format_utc_rfc3339(activity.start_date_local),
            payload: serde_json::to_string(activity).map_err(|e| {
                AppError::Internal(anyhow::anyhow!(
                    "Failed to encode activity {}: {}",
                    activity.id,
                    e
                ))
            })?,
        })
    }

    pub fn decode(&self) -> Result<Activity> {
        serde_json::from_str(&self.payload).map_err(|e| {
            AppError::Database(format!(
                "Corrupt payload for activity {}: {}",
                self.activity_id, e
            ))
        })
    }
}

/// Lap row in the `strava_laps` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LapDocument {
    /// Strava lap ID (also used as document ID)
    pub lap_id: u64,
    /// Activity the lap belongs to (reference only, no ownership)
    pub activity_id: u64,
    pub lap_index: u32,
    /// JSON-encoded [`Lap`]
    pub payload: String,
}

impl LapDocument {
    pub fn from_lap(activity_id: u64, lap: &Lap) -> Result<Self> {
        Ok(Self {
            lap_id: lap.id,
            activity_id,
            lap_index: lap.lap_index,
            payload: serde_json::to_string(lap).map_err(|e| {
                AppError::Internal(anyhow::anyhow!("Failed to encode lap {}: {}", lap.id, e))
            })?,
        })
    }

    pub fn decode(&self) -> Result<Lap> {
        serde_json::from_str(&self.payload).map_err(|e| {
            AppError::Database(format!("Corrupt payload for lap {}: {}", self.lap_id, e))
        })
    }
}
