// Copyright (c) 2026 Rigwatch Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Presence Tracker - in-memory liveness roster with a background reaper
//!
//! Every hook-activity notification the host receives is fed into
//! [`PresenceTracker::record_event`]. A periodic sweep marks idle actors as
//! reaped and later evicts them; activity before eviction resurrects them.
//!
//! # Lifecycle
//!
//! `new` → `start_reaper` (optional) → … → `stop`
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Owns per-actor state; hands out immutable [`Entry`] snapshots

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::domain::events::PresenceEvent;
use crate::domain::node_config::PresenceConfig;
use crate::domain::presence::{Clock, Entry, SystemClock};

/// Actors with fewer recorded events than this are evicted on the short timer.
pub const LOW_SIGNAL_EVENT_COUNT: u64 = 10;

/// Eviction delay for low-signal actors.
pub const LOW_SIGNAL_EVICT_AFTER: Duration = Duration::from_secs(5 * 60);

/// Called once per actor newly marked dead: `(actor, last session id)`.
pub type OnDeadCallback = Arc<dyn Fn(&str, Option<&str>) + Send + Sync>;

/// Configuration for the reaper
#[derive(Clone)]
pub struct ReaperConfig {
    /// Idle time after which a live actor is marked reaped
    pub dead_threshold: Duration,

    /// Time after `reaped_at` after which a reaped actor is deleted
    pub evict_after: Duration,

    /// How often the reaper sweeps
    pub sweep_interval: Duration,

    /// Invoked outside the roster lock for each newly reaped actor
    pub on_dead: Option<OnDeadCallback>,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        PresenceConfig::default().into()
    }
}

impl From<PresenceConfig> for ReaperConfig {
    fn from(config: PresenceConfig) -> Self {
        Self {
            dead_threshold: config.dead_threshold,
            evict_after: config.evict_after,
            sweep_interval: config.sweep_interval,
            on_dead: None,
        }
    }
}

impl ReaperConfig {
    pub fn with_on_dead(
        mut self,
        on_dead: impl Fn(&str, Option<&str>) + Send + Sync + 'static,
    ) -> Self {
        self.on_dead = Some(Arc::new(on_dead));
        self
    }

    /// Eviction delay for a reaped actor with `event_count` recorded events.
    fn evict_after_for(&self, event_count: u64) -> Duration {
        if event_count < LOW_SIGNAL_EVENT_COUNT {
            self.evict_after.min(LOW_SIGNAL_EVICT_AFTER)
        } else {
            self.evict_after
        }
    }
}

impl fmt::Debug for ReaperConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReaperConfig")
            .field("dead_threshold", &self.dead_threshold)
            .field("evict_after", &self.evict_after)
            .field("sweep_interval", &self.sweep_interval)
            .field("on_dead", &self.on_dead.is_some())
            .finish()
    }
}

/// Mutable per-actor record. Never leaves the tracker.
///
/// `reaped_at` being set is what "reaped" means, so the two can't disagree.
#[derive(Debug, Clone)]
struct ActorState {
    first_seen: DateTime<Utc>,
    last_seen: DateTime<Utc>,
    last_event: String,
    tool_name: Option<String>,
    session_id: Option<String>,
    cwd: Option<String>,
    event_count: u64,
    reaped_at: Option<DateTime<Utc>>,
}

impl ActorState {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            first_seen: now,
            last_seen: now,
            last_event: String::new(),
            tool_name: None,
            session_id: None,
            cwd: None,
            event_count: 0,
            reaped_at: None,
        }
    }

    fn is_reaped(&self) -> bool {
        self.reaped_at.is_some()
    }

    fn idle(&self, now: DateTime<Utc>) -> Duration {
        elapsed(self.last_seen, now)
    }

    fn snapshot(&self, actor: &str, now: DateTime<Utc>) -> Entry {
        Entry {
            actor: actor.to_string(),
            first_seen: self.first_seen,
            last_seen: self.last_seen,
            last_event: self.last_event.clone(),
            tool_name: self.tool_name.clone(),
            session_id: self.session_id.clone(),
            cwd: self.cwd.clone(),
            event_count: self.event_count,
            reaped: self.is_reaped(),
            reaped_at: self.reaped_at,
            idle_secs: (now - self.last_seen).num_seconds().max(0),
            session_secs: (now - self.first_seen).num_seconds().max(0),
        }
    }
}

/// Time from `since` to `now`, clamped at zero.
fn elapsed(since: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (now - since).to_std().unwrap_or(Duration::ZERO)
}

/// Overwrite `slot` only when `incoming` carries a non-empty value.
fn set_sticky(slot: &mut Option<String>, incoming: &Option<String>) {
    if let Some(value) = incoming.as_deref().filter(|v| !v.is_empty()) {
        *slot = Some(value.to_string());
    }
}

/// What a single sweep changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Actors newly marked reaped, with their last session id
    pub reaped: Vec<(String, Option<String>)>,
    /// Actors deleted from the roster
    pub evicted: Vec<String>,
}

struct ReaperHandle {
    shutdown_token: CancellationToken,
    join: JoinHandle<()>,
}

struct Roster {
    actors: RwLock<HashMap<String, ActorState>>,
    clock: Arc<dyn Clock>,
}

impl Roster {
    fn sweep(&self, config: &ReaperConfig) -> SweepReport {
        let now = self.clock.now();
        let mut report = SweepReport::default();

        {
            let mut actors = self.actors.write();
            actors.retain(|actor, state| {
                if let Some(reaped_at) = state.reaped_at {
                    if elapsed(reaped_at, now) > config.evict_after_for(state.event_count) {
                        report.evicted.push(actor.clone());
                        return false;
                    }
                } else if state.idle(now) > config.dead_threshold {
                    state.reaped_at = Some(now);
                    report.reaped.push((actor.clone(), state.session_id.clone()));
                }
                true
            });
        }

        for actor in &report.reaped {
            info!(actor = %actor.0, "Actor idle past dead threshold, marked reaped");
        }
        for actor in &report.evicted {
            debug!(actor = %actor, "Evicted reaped actor");
        }

        if let Some(on_dead) = &config.on_dead {
            for (actor, session_id) in &report.reaped {
                let outcome = catch_unwind(AssertUnwindSafe(|| {
                    on_dead(actor.as_str(), session_id.as_deref())
                }));
                if outcome.is_err() {
                    error!(actor = %actor, "on_dead callback panicked");
                }
            }
        }

        report
    }
}

/// Concurrent liveness roster keyed by agent identity
pub struct PresenceTracker {
    roster: Arc<Roster>,
    reaper: Mutex<Option<ReaperHandle>>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            roster: Arc::new(Roster {
                actors: RwLock::new(HashMap::new()),
                clock,
            }),
            reaper: Mutex::new(None),
        }
    }

    /// Record one hook-activity event. Events without an actor are ignored.
    pub fn record_event(&self, event: &PresenceEvent) {
        if event.actor.is_empty() {
            return;
        }

        let now = self.roster.clock.now();
        let resurrected = {
            let mut actors = self.roster.actors.write();
            let state = actors
                .entry(event.actor.clone())
                .or_insert_with(|| ActorState::new(now));

            let resurrected = state.reaped_at.take().is_some();
            state.last_seen = now;
            state.last_event = event.hook_type.clone();
            state.event_count += 1;
            set_sticky(&mut state.tool_name, &event.tool_name);
            set_sticky(&mut state.session_id, &event.session_id);
            set_sticky(&mut state.cwd, &event.cwd);
            resurrected
        };

        if resurrected {
            info!(actor = %event.actor, hook_type = %event.hook_type, "Reaped actor resurrected");
        }
    }

    /// Snapshot of actors idle for at most `stale_threshold`, most recent first.
    ///
    /// A zero threshold returns every tracked actor, reaped ones included.
    pub fn roster(&self, stale_threshold: Duration) -> Vec<Entry> {
        let now = self.roster.clock.now();
        let mut entries: Vec<Entry> = {
            let actors = self.roster.actors.read();
            actors
                .iter()
                .filter(|(_, state)| {
                    stale_threshold.is_zero() || state.idle(now) <= stale_threshold
                })
                .map(|(actor, state)| state.snapshot(actor, now))
                .collect()
        };
        entries.sort_by(|a, b| b.last_seen.cmp(&a.last_seen).then_with(|| a.actor.cmp(&b.actor)));
        entries
    }

    /// Snapshot of a single actor.
    pub fn get(&self, actor: &str) -> Option<Entry> {
        let now = self.roster.clock.now();
        self.roster
            .actors
            .read()
            .get(actor)
            .map(|state| state.snapshot(actor, now))
    }

    pub fn len(&self) -> usize {
        self.roster.actors.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.roster.actors.read().is_empty()
    }

    /// Run one reap/evict pass now, independent of any background reaper.
    pub fn sweep(&self, config: &ReaperConfig) -> SweepReport {
        self.roster.sweep(config)
    }

    /// Start the background reaper. Has no effect if one is already running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start_reaper(&self, config: ReaperConfig) {
        let mut slot = self.reaper.lock();
        if slot.is_some() {
            warn!("Presence reaper already running, ignoring start request");
            return;
        }

        let shutdown_token = CancellationToken::new();
        let stop = shutdown_token.clone();
        let roster = self.roster.clone();

        info!(
            dead_threshold = ?config.dead_threshold,
            evict_after = ?config.evict_after,
            sweep_interval = ?config.sweep_interval,
            "Starting presence reaper background task"
        );

        let join = tokio::spawn(async move {
            let mut tick = interval(config.sweep_interval.max(Duration::from_millis(1)));
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; skip it so the first sweep waits one interval.
            tick.tick().await;

            loop {
                tokio::select! {
                    _ = stop.cancelled() => {
                        info!("Shutdown signal received, stopping presence reaper");
                        break;
                    }
                    _ = tick.tick() => {
                        let report = roster.sweep(&config);
                        if !report.reaped.is_empty() || !report.evicted.is_empty() {
                            debug!(
                                reaped = report.reaped.len(),
                                evicted = report.evicted.len(),
                                "Presence sweep completed"
                            );
                        }
                    }
                }
            }

            info!("Presence reaper background task stopped");
        });

        *slot = Some(ReaperHandle { shutdown_token, join });
    }

    /// Whether a background reaper is currently running.
    pub fn is_reaper_running(&self) -> bool {
        self.reaper.lock().is_some()
    }

    /// Stop the background reaper and wait for it to exit.
    ///
    /// Safe to call repeatedly and when no reaper was started.
    pub async fn stop(&self) {
        let handle = self.reaper.lock().take();
        let Some(handle) = handle else {
            return;
        };

        handle.shutdown_token.cancel();
        if let Err(e) = handle.join.await {
            error!(error = %e, "Presence reaper task ended abnormally");
        }
    }
}

impl Default for PresenceTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PresenceTracker {
    fn drop(&mut self) {
        if let Some(handle) = self.reaper.get_mut().take() {
            handle.shutdown_token.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::presence::ManualClock;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const MINUTE: Duration = Duration::from_secs(60);

    fn tracker() -> (PresenceTracker, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        (PresenceTracker::with_clock(clock.clone()), clock)
    }

    fn event(actor: &str) -> PresenceEvent {
        PresenceEvent::new(actor, "PostToolUse")
    }

    fn record_n(tracker: &PresenceTracker, actor: &str, n: usize) {
        for _ in 0..n {
            tracker.record_event(&event(actor));
        }
    }

    #[test]
    fn test_empty_actor_is_ignored() {
        let (tracker, _) = tracker();
        tracker.record_event(&PresenceEvent::new("", "PostToolUse"));
        assert!(tracker.roster(Duration::ZERO).is_empty());
    }

    #[test]
    fn test_sticky_fields_and_count() {
        let (tracker, clock) = tracker();
        tracker.record_event(
            &event("gastown/polecats/nux")
                .with_tool("Bash")
                .with_cwd("/work/a")
                .with_session("s1"),
        );
        clock.advance(Duration::from_secs(5));
        tracker.record_event(&event("gastown/polecats/nux").with_tool("Edit"));
        clock.advance(Duration::from_secs(5));
        tracker.record_event(
            &PresenceEvent::new("gastown/polecats/nux", "Stop")
                .with_tool("")
                .with_cwd("/work/b"),
        );
        clock.advance(Duration::from_secs(20));

        let roster = tracker.roster(Duration::ZERO);
        assert_eq!(roster.len(), 1);
        let entry = &roster[0];
        assert_eq!(entry.event_count, 3);
        assert_eq!(entry.tool_name.as_deref(), Some("Edit"));
        assert_eq!(entry.cwd.as_deref(), Some("/work/b"));
        assert_eq!(entry.session_id.as_deref(), Some("s1"));
        assert_eq!(entry.last_event, "Stop");
        assert_eq!(entry.session_secs, 30);
        assert_eq!(entry.idle_secs, 20);
        assert!(!entry.reaped);
    }

    #[test]
    fn test_durations_are_measured_at_snapshot_time() {
        let (tracker, clock) = tracker();
        tracker.record_event(&event("nux"));
        clock.advance(Duration::from_secs(600));

        let entry = tracker.get("nux").unwrap();
        assert_eq!(entry.idle_secs, 600);
        assert_eq!(entry.session_secs, 600);

        tracker.record_event(&event("nux"));
        clock.advance(Duration::from_secs(30));
        let entry = tracker.get("nux").unwrap();
        assert_eq!(entry.idle_secs, 30);
        assert_eq!(entry.session_secs, 630);
    }

    #[test]
    fn test_roster_filters_stale_and_sorts_recent_first() {
        let (tracker, clock) = tracker();
        tracker.record_event(&event("old"));
        clock.advance(2 * MINUTE);
        tracker.record_event(&event("new"));
        clock.advance(MINUTE);

        let all: Vec<String> = tracker
            .roster(Duration::ZERO)
            .into_iter()
            .map(|e| e.actor)
            .collect();
        assert_eq!(all, vec!["new", "old"]);

        let fresh: Vec<String> = tracker
            .roster(2 * MINUTE)
            .into_iter()
            .map(|e| e.actor)
            .collect();
        assert_eq!(fresh, vec!["new"]);
    }

    #[test]
    fn test_idle_actor_is_reaped_but_still_listed() {
        let (tracker, clock) = tracker();
        let config = ReaperConfig::default();
        tracker.record_event(&event("nux").with_session("s-9"));

        clock.advance(config.dead_threshold + MINUTE);
        let report = tracker.sweep(&config);
        assert_eq!(report.reaped, vec![("nux".to_string(), Some("s-9".to_string()))]);

        assert!(tracker.roster(config.dead_threshold).is_empty());
        let all = tracker.roster(Duration::ZERO);
        assert_eq!(all.len(), 1);
        assert!(all[0].reaped);
        assert!(all[0].reaped_at.is_some());

        // Already reaped: not reported again.
        assert!(tracker.sweep(&config).reaped.is_empty());
    }

    #[test]
    fn test_resurrection_keeps_count() {
        let (tracker, clock) = tracker();
        let config = ReaperConfig::default();
        record_n(&tracker, "nux", 4);

        clock.advance(config.dead_threshold + MINUTE);
        tracker.sweep(&config);
        assert!(tracker.get("nux").unwrap().reaped);

        tracker.record_event(&event("nux"));
        let entry = tracker.get("nux").unwrap();
        assert!(!entry.reaped);
        assert_eq!(entry.reaped_at, None);
        assert_eq!(entry.event_count, 5);
    }

    #[test]
    fn test_low_signal_actor_evicted_sooner() {
        let (tracker, clock) = tracker();
        let config = ReaperConfig::default();
        record_n(&tracker, "ephemeral", 3);
        record_n(&tracker, "steady", 10);

        clock.advance(config.dead_threshold + MINUTE);
        let report = tracker.sweep(&config);
        assert_eq!(report.reaped.len(), 2);

        clock.advance(LOW_SIGNAL_EVICT_AFTER + MINUTE);
        let report = tracker.sweep(&config);
        assert_eq!(report.evicted, vec!["ephemeral".to_string()]);
        assert!(tracker.get("ephemeral").is_none());
        assert!(tracker.get("steady").is_some());

        clock.advance(config.evict_after);
        let report = tracker.sweep(&config);
        assert_eq!(report.evicted, vec!["steady".to_string()]);
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_on_dead_runs_outside_lock() {
        let clock = Arc::new(ManualClock::default());
        let tracker = Arc::new(PresenceTracker::with_clock(clock.clone()));
        let seen = Arc::new(AtomicUsize::new(0));

        let inner = tracker.clone();
        let counter = seen.clone();
        let config = ReaperConfig::default().with_on_dead(move |actor, _session| {
            // Re-entering the tracker would deadlock if the lock were still held.
            assert!(inner.get(actor).unwrap().reaped);
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tracker.record_event(&event("a"));
        tracker.record_event(&event("b"));
        clock.advance(config.dead_threshold + MINUTE);
        tracker.sweep(&config);
        tracker.sweep(&config);

        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_panicking_callback_does_not_corrupt_roster() {
        let (tracker, clock) = tracker();
        let config = ReaperConfig::default().with_on_dead(|_, _| panic!("callback failure"));
        tracker.record_event(&event("a"));
        clock.advance(config.dead_threshold + MINUTE);

        let report = tracker.sweep(&config);
        assert_eq!(report.reaped.len(), 1);
        assert!(tracker.get("a").unwrap().reaped);
        tracker.record_event(&event("a"));
        assert!(!tracker.get("a").unwrap().reaped);
    }

    #[tokio::test]
    async fn test_stop_without_start_and_twice() {
        let tracker = PresenceTracker::new();
        tracker.stop().await;

        tracker.start_reaper(ReaperConfig::default());
        assert!(tracker.is_reaper_running());
        tracker.stop().await;
        tracker.stop().await;
        assert!(!tracker.is_reaper_running());
    }

    #[tokio::test]
    async fn test_background_reaper_sweeps() {
        let clock = Arc::new(ManualClock::default());
        let tracker = PresenceTracker::with_clock(clock.clone());
        tracker.record_event(&event("nux"));
        clock.advance(Duration::from_secs(3600));

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let config = ReaperConfig {
            sweep_interval: Duration::from_millis(20),
            ..ReaperConfig::default()
        }
        .with_on_dead(move |actor, _| {
            let _ = tx.send(actor.to_string());
        });
        tracker.start_reaper(config);

        let dead = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await.unwrap();
        assert_eq!(dead.as_deref(), Some("nux"));
        tracker.stop().await;
        assert!(tracker.get("nux").unwrap().reaped);
    }
}
