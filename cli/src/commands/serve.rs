// Copyright (c) 2026 Rigwatch Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Long-running host for the advice subscriber loop and presence tracker
//!
//! Session events arrive on the in-process event bus. With `--stdin`, each
//! line of standard input is parsed as a JSON `SessionEvent`, recorded as
//! presence activity and published on `hooks.session.<trigger>`.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use rigwatch_core::application::{AdviceHookService, PresenceTracker, ReaperConfig};
use rigwatch_core::domain::events::{PresenceEvent, SessionEvent};
use rigwatch_core::domain::node_config::NodeConfig;
use rigwatch_core::infrastructure::{InMemoryEventBus, ShellHookExecutor};

use super::load_advice_store;

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Advice file (overrides advice.advice_file from config)
    #[arg(long, value_name = "FILE")]
    advice_file: Option<PathBuf>,

    /// Seconds between presence roster log lines
    #[arg(long, default_value_t = 300, value_name = "SECONDS")]
    roster_interval: u64,

    /// Read JSON session events from stdin, one per line
    #[arg(long)]
    stdin: bool,
}

pub async fn execute(args: ServeArgs, config_override: Option<PathBuf>) -> Result<ExitCode> {
    let config =
        NodeConfig::load_or_default(config_override).context("Failed to load configuration")?;

    let advice_file = args.advice_file.or_else(|| config.advice.advice_file.clone());
    let store = load_advice_store(advice_file.as_deref())?;
    let service = Arc::new(AdviceHookService::new(
        Arc::new(store),
        Arc::new(ShellHookExecutor::new()),
    ));
    let bus = InMemoryEventBus::new(config.event_bus.capacity);

    let presence = Arc::new(PresenceTracker::new());
    let reaper_config =
        ReaperConfig::from(config.presence.clone()).with_on_dead(|actor, session_id| {
            info!(actor = %actor, session_id = session_id.unwrap_or("-"), "Agent marked dead");
        });
    presence.start_reaper(reaper_config);

    let cancel = CancellationToken::new();
    let mut subscriber = {
        let service = service.clone();
        let bus = bus.clone();
        let cancel = cancel.clone();
        let subject = config.advice.subject.clone();
        tokio::spawn(async move { service.run_subscriber_loop(cancel, &bus, &subject).await })
    };

    let feeder = args
        .stdin
        .then(|| tokio::spawn(feed_stdin(bus.clone(), presence.clone())));

    info!(
        subject = %config.advice.subject,
        stdin = args.stdin,
        "rigwatch serving, press Ctrl-C to stop"
    );

    let mut roster_tick = interval(Duration::from_secs(args.roster_interval.max(1)));
    roster_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    roster_tick.tick().await;

    let finished_early = loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    error!(error = %e, "Failed to listen for Ctrl-C");
                }
                info!("Shutdown signal received");
                break None;
            }
            result = &mut subscriber => {
                warn!("Subscriber loop ended before shutdown");
                break Some(result);
            }
            _ = roster_tick.tick() => log_roster(&presence),
        }
    };

    cancel.cancel();
    let subscriber_result = match finished_early {
        Some(result) => result,
        None => subscriber.await,
    };
    if let Some(feeder) = feeder {
        feeder.abort();
    }
    presence.stop().await;
    log_roster(&presence);

    subscriber_result
        .context("Subscriber task ended abnormally")?
        .context("Subscriber loop failed")?;

    info!("rigwatch stopped");
    Ok(ExitCode::SUCCESS)
}

/// Forward stdin session events to the bus until EOF.
async fn feed_stdin(bus: InMemoryEventBus, presence: Arc<PresenceTracker>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                info!("stdin closed, no further events will be read");
                return;
            }
            Err(e) => {
                warn!(error = %e, "Failed to read stdin");
                return;
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let event: SessionEvent = match serde_json::from_str(line) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "Ignoring malformed session event on stdin");
                continue;
            }
        };

        presence.record_event(&presence_event_for(&event));
        match bus.publish_session_event(&event) {
            Ok(receivers) => debug!(
                agent_id = %event.agent_id,
                trigger = %event.trigger,
                receivers,
                "Published session event"
            ),
            Err(e) => warn!(error = %e, "Failed to publish session event"),
        }
    }
}

fn presence_event_for(event: &SessionEvent) -> PresenceEvent {
    let presence = PresenceEvent::new(event.agent_id.as_str(), event.trigger.as_str());
    match &event.cwd {
        Some(cwd) => presence.with_cwd(cwd.as_str()),
        None => presence,
    }
}

fn log_roster(presence: &PresenceTracker) {
    let roster = presence.roster(Duration::ZERO);
    let reaped = roster.iter().filter(|entry| entry.reaped).count();
    info!(tracked = roster.len(), live = roster.len() - reaped, reaped, "Presence roster");

    for entry in &roster {
        debug!(
            actor = %entry.actor,
            last_event = %entry.last_event,
            idle_secs = entry.idle_secs,
            event_count = entry.event_count,
            reaped = entry.reaped,
            "Roster entry"
        );
    }
}
