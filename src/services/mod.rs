// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - sync logic and Strava access.

pub mod rate_limit;
pub mod session;
pub mod strava;
pub mod sync;

pub use rate_limit::RateLimiter;
pub use session::SessionManager;
pub use strava::{StravaClient, ACTIVITIES_PER_PAGE};
pub use sync::{SyncEngine, SyncReport, SyncState};
