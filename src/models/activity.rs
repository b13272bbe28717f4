// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Strava activity and lap models.
//!
//! These mirror the JSON Strava returns from the activity list and lap
//! endpoints. They are written to the store as received and never
//! modified afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Strava `workout_type` value for a run flagged as a race.
const WORKOUT_TYPE_RACE: u32 = 1;

/// Summary activity as returned by `GET /athlete/activities`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    /// Strava activity ID (also used as document ID)
    pub id: u64,
    /// Activity name/title
    #[serde(default)]
    pub name: String,
    /// Local start time; orders activities and drives the sync checkpoint
    pub start_date_local: DateTime<Utc>,
    /// Distance in meters
    #[serde(default)]
    pub distance: f64,
    /// Moving time in seconds
    #[serde(default)]
    pub moving_time: f64,
    /// Workout type (race, long run, workout...), absent for most activities
    #[serde(default)]
    pub workout_type: Option<u32>,
    /// Activity type (Run, Ride, Hike, etc.)
    #[serde(rename = "type", default)]
    pub activity_type: String,
    /// Map summary with the low-resolution polyline
    #[serde(default)]
    pub map: ActivityMap,
    /// Laps embedded in detailed responses. Laps are stored separately.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub laps: Vec<Lap>,
}

impl Activity {
    /// Whether the athlete flagged this activity as a race.
    pub fn is_race(&self) -> bool {
        self.workout_type == Some(WORKOUT_TYPE_RACE)
    }

    /// Summary polyline of the route, if the activity has GPS data.
    pub fn summary_polyline(&self) -> Option<&str> {
        self.map
            .summary_polyline
            .as_deref()
            .filter(|polyline| !polyline.is_empty())
    }
}

/// Activity map data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityMap {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub summary_polyline: Option<String>,
}

/// Lap split as returned by `GET /activities/{id}/laps`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lap {
    /// Strava lap ID (also used as document ID)
    pub id: u64,
    #[serde(default)]
    pub name: String,
    /// Elapsed time in seconds
    #[serde(default)]
    pub elapsed_time: u32,
    /// Moving time in seconds
    #[serde(default)]
    pub moving_time: u32,
    #[serde(default)]
    pub start_date_local: Option<DateTime<Utc>>,
    /// Distance in meters
    #[serde(default)]
    pub distance: f64,
    #[serde(default)]
    pub total_elevation_gain: f64,
    /// Average speed in meters per second
    #[serde(default)]
    pub average_speed: f64,
    #[serde(default)]
    pub max_speed: f64,
    #[serde(default)]
    pub average_cadence: Option<f64>,
    #[serde(default)]
    pub average_watts: Option<f64>,
    /// Position of the lap within its activity (1-based)
    #[serde(default)]
    pub lap_index: u32,
    #[serde(default)]
    pub split: u32,
}
