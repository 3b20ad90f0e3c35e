// Copyright (c) 2026 Rigwatch Contributors
// SPDX-License-Identifier: AGPL-3.0

use rigwatch_core::application::presence::{PresenceTracker, ReaperConfig};
use rigwatch_core::domain::events::PresenceEvent;
use rigwatch_core::domain::presence::ManualClock;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

#[tokio::test]
async fn test_concurrent_recording_counts_every_event() {
    let tracker = Arc::new(PresenceTracker::new());

    let mut handles = Vec::new();
    for worker in 0..8 {
        let tracker = tracker.clone();
        handles.push(tokio::spawn(async move {
            for i in 0..50 {
                let actor = format!("gastown/polecats/p{}", i % 4);
                tracker.record_event(
                    &PresenceEvent::new(actor, "PostToolUse").with_session(format!("s-{worker}")),
                );
                if i % 10 == 0 {
                    let _ = tracker.roster(Duration::ZERO);
                }
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let roster = tracker.roster(Duration::ZERO);
    assert_eq!(roster.len(), 4);
    assert_eq!(roster.iter().map(|e| e.event_count).sum::<u64>(), 400);
}

#[tokio::test]
async fn test_on_dead_callback_can_reenter_tracker() {
    let clock = Arc::new(ManualClock::default());
    let tracker = Arc::new(PresenceTracker::with_clock(clock.clone()));
    tracker.record_event(&PresenceEvent::new("gastown/witnesses/w1", "Stop").with_session("s-1"));
    clock.advance(Duration::from_secs(20 * 60));

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let reentrant = tracker.clone();
    let config = ReaperConfig {
        sweep_interval: Duration::from_millis(10),
        ..ReaperConfig::default()
    }
    .with_on_dead(move |actor, session_id| {
        // Reads and writes both take the roster lock.
        let entry = reentrant.get(actor);
        reentrant.record_event(&PresenceEvent::new("gastown/deacons/d1", "Notification"));
        let _ = tx.send((
            actor.to_string(),
            session_id.map(str::to_string),
            entry.map(|e| e.reaped),
        ));
    });

    tracker.start_reaper(config);
    let (actor, session, reaped) = timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap()
        .unwrap();
    tracker.stop().await;

    assert_eq!(actor, "gastown/witnesses/w1");
    assert_eq!(session.as_deref(), Some("s-1"));
    assert_eq!(reaped, Some(true));
    assert!(tracker.get("gastown/deacons/d1").is_some());
}

#[tokio::test]
async fn test_stop_guarantees_no_sweep_after_return() {
    let clock = Arc::new(ManualClock::default());
    let tracker = PresenceTracker::with_clock(clock.clone());
    tracker.start_reaper(ReaperConfig {
        sweep_interval: Duration::from_millis(5),
        ..ReaperConfig::default()
    });
    tracker.stop().await;

    tracker.record_event(&PresenceEvent::new("nux", "Stop"));
    clock.advance(Duration::from_secs(3600));
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(!tracker.get("nux").unwrap().reaped);
}
