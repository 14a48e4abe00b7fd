//! Per-IP sliding-window limiter for USER_CHANGES commits.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::warn;

use crate::shared::config::RateLimitConfig;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("rate limit exceeded")]
pub struct RateLimitExceeded;

pub struct RateLimiter {
    window: Duration,
    points: usize,
    load_test: bool,
    events: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            window: Duration::from_secs(config.duration),
            points: config.points,
            load_test: config.load_test,
            events: Mutex::new(HashMap::new()),
        }
    }

    pub async fn check(&self, ip: &str) -> Result<(), RateLimitExceeded> {
        self.check_at(ip, Instant::now()).await
    }

    /// Records one event for `ip` at `now` and fails once more than
    /// `points` events fall inside the window.
    pub async fn check_at(&self, ip: &str, now: Instant) -> Result<(), RateLimitExceeded> {
        if self.load_test {
            return Ok(());
        }
        let mut events = self.events.lock().await;
        let window = events.entry(ip.to_string()).or_default();
        while let Some(oldest) = window.front() {
            if now.saturating_duration_since(*oldest) > self.window {
                window.pop_front();
            } else {
                break;
            }
        }
        window.push_back(now);
        if window.len() > self.points {
            warn!("[RateLimit] Commit rate exceeded ({} in {:?})", window.len(), self.window);
            return Err(RateLimitExceeded);
        }
        Ok(())
    }

    /// Drops IPs with no events inside the window.
    pub async fn purge_idle(&self) -> usize {
        let now = Instant::now();
        let mut events = self.events.lock().await;
        let before = events.len();
        events.retain(|_, window| {
            window
                .back()
                .is_some_and(|last| now.saturating_duration_since(*last) <= self.window)
        });
        before - events.len()
    }

    pub async fn tracked_ips(&self) -> usize {
        self.events.lock().await.len()
    }
}
