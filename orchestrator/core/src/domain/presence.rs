// Copyright (c) 2026 Rigwatch Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Presence Value Objects
//!
//! Immutable roster snapshots handed out by the presence tracker, and the
//! clock abstraction the tracker reads time through.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Snapshot types and time source for liveness tracking

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Snapshot of one tracked agent at the time the roster was taken.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub actor: String,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub last_event: String,
    pub tool_name: Option<String>,
    pub session_id: Option<String>,
    pub cwd: Option<String>,
    pub event_count: u64,
    pub reaped: bool,
    pub reaped_at: Option<DateTime<Utc>>,
    /// Seconds since `last_seen`.
    pub idle_secs: i64,
    /// Seconds since `first_seen`.
    pub session_secs: i64,
}

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: std::time::Duration) {
        let delta = chrono::Duration::from_std(by).unwrap_or(chrono::Duration::zero());
        *self.now.lock() += delta;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}
