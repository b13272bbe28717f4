// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Token-bucket rate limiter for outbound Strava API calls.
//!
//! Every API request acquires one token first. Waiting for a token is the
//! only place a sync run suspends, and the wait can be cancelled.

use crate::config::RateLimitConfig;
use crate::error::{AppError, Result};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Token-bucket limiter shared by every Strava API call.
///
/// The burst is carved out of the quota: the bucket refills at
/// `(requests - burst) / window`, so a full bucket plus one window of
/// refill never admits more than `requests` calls in any window.
#[derive(Debug)]
pub struct RateLimiter {
    capacity: f64,
    /// Tokens added per second
    refill_rate: f64,
    bucket: Mutex<Bucket>,
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

impl RateLimiter {
    /// Create a limiter that starts with a full bucket.
    pub fn new(config: RateLimitConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| AppError::BadRequest(e.to_string()))?;

        let capacity = f64::from(config.burst);
        let refill_rate = f64::from(config.requests - config.burst) / config.window.as_secs_f64();

        Ok(Self {
            capacity,
            refill_rate,
            bucket: Mutex::new(Bucket {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        })
    }

    /// Wait for one token.
    ///
    /// Returns `RateLimitCancelled` as soon as `cancel` fires, including when
    /// it has already fired on entry.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<()> {
        loop {
            if cancel.is_cancelled() {
                return Err(AppError::RateLimitCancelled);
            }

            let wait = {
                let mut bucket = self.bucket.lock().await;
                self.refill(&mut bucket);
                if bucket.tokens >= 1.0 {
                    bucket.tokens -= 1.0;
                    return Ok(());
                }
                Duration::from_secs_f64((1.0 - bucket.tokens) / self.refill_rate)
            };

            tracing::debug!(
                wait_ms = wait.as_millis() as u64,
                "Waiting for Strava rate limit token"
            );

            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Rate limit wait cancelled");
                    return Err(AppError::RateLimitCancelled);
                }
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }

    /// Tokens currently available, after refilling.
    pub async fn available(&self) -> f64 {
        let mut bucket = self.bucket.lock().await;
        self.refill(&mut bucket);
        bucket.tokens
    }

    fn refill(&self, bucket: &mut Bucket) {
        let now = Instant::now();
        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.refill_rate).min(self.capacity);
        bucket.last_refill = now;
    }
}
