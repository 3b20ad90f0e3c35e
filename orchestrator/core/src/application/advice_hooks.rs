// Copyright (c) 2026 Rigwatch Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Advice Hook Application Service
//!
//! Resolves which advice applies to an agent at a session lifecycle point,
//! runs the matching hook commands, and folds their results into a single
//! [`HookResponse`].
//!
//! - Coordinates domain (subscriptions, advice records) and infrastructure
//!   (advice store, hook executor, event stream)
//! - Fails open: a store outage or malformed record never blocks a session
//! - The first blocking failure stops evaluation of later advice
//!
//! Two entry points share the same evaluation path:
//! - [`AdviceHookService::handle_session_event`] for synchronous callers
//! - [`AdviceHookService::run_subscriber_loop`] for bus-delivered events

use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::advice::{AdviceRecord, OnFailurePolicy, ADVICE_CATEGORY, OPEN_STATUS};
use crate::domain::event_stream::{EventStream, EventStreamError};
use crate::domain::events::SessionEvent;
use crate::domain::hook::{HookResponse, HookResult};
use crate::domain::repository::AdviceStore;
use crate::domain::subscription::{build_subscriptions, matches, SubscriptionSet};
use crate::infrastructure::hook_executor::HookExecutor;

/// Environment variable carrying the agent identity into hook commands.
pub const AGENT_ID_ENV: &str = "AGENT_ID";

/// What one executed advice hook contributes to the response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateOutcome {
    None,
    Warn(String),
    Block(String),
}

/// Whether `record` should run for this trigger and agent.
pub fn applies_to(record: &AdviceRecord, trigger: &str, subscriptions: &SubscriptionSet) -> bool {
    record.fires_on(trigger) && matches(&record.labels, subscriptions)
}

/// Apply the record's failure policy to a hook result.
pub fn evaluate_candidate(record: &AdviceRecord, result: &HookResult) -> CandidateOutcome {
    let Some(error) = &result.error else {
        return CandidateOutcome::None;
    };

    match record.on_failure {
        OnFailurePolicy::Block => {
            let mut reason = format!(
                "Advice \"{}\" blocked: command `{}` failed: {}",
                record.title, record.command, error
            );
            if !result.output.is_empty() {
                reason.push_str("\nOutput: ");
                reason.push_str(&result.output);
            }
            CandidateOutcome::Block(reason)
        }
        OnFailurePolicy::Warn => {
            let mut warning = format!("Advice \"{}\" hook failed: {}", record.title, error);
            if !result.output.is_empty() {
                warning.push_str("\nOutput: ");
                warning.push_str(&result.output);
            }
            CandidateOutcome::Warn(warning)
        }
        OnFailurePolicy::Ignore => CandidateOutcome::None,
    }
}

/// Application service evaluating advice hooks for session events
pub struct AdviceHookService {
    store: Arc<dyn AdviceStore>,
    executor: Arc<dyn HookExecutor>,
}

impl AdviceHookService {
    pub fn new(store: Arc<dyn AdviceStore>, executor: Arc<dyn HookExecutor>) -> Self {
        Self { store, executor }
    }

    /// Evaluate all applicable advice for one session event.
    ///
    /// Cancelling `cancel` aborts the hook currently running; that hook is
    /// then handled by its failure policy like any other failure.
    pub async fn handle_session_event(
        &self,
        cancel: &CancellationToken,
        event: &SessionEvent,
    ) -> HookResponse {
        let mut response = HookResponse::default();
        if !event.is_complete() {
            return response;
        }

        let candidates = match self.store.list_candidates(ADVICE_CATEGORY, OPEN_STATUS).await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(
                    agent_id = %event.agent_id,
                    trigger = %event.trigger,
                    error = %e,
                    "Failed to list advice candidates, allowing session"
                );
                return response;
            }
        };

        // TODO: merge the agent record's advice_subscriptions overrides once
        // the agent lookup exists.
        let subscriptions = build_subscriptions(&event.agent_id, None);
        let env = HashMap::from([(AGENT_ID_ENV.to_string(), event.agent_id.clone())]);

        for bead in &candidates {
            let record = match AdviceRecord::from_bead(bead) {
                Ok(record) => record,
                Err(e) => {
                    warn!(
                        advice_id = %bead.id,
                        error = %e,
                        "Skipping advice with malformed hook fields"
                    );
                    continue;
                }
            };

            if !applies_to(&record, &event.trigger, &subscriptions) {
                continue;
            }

            debug!(
                advice_id = %record.id,
                agent_id = %event.agent_id,
                trigger = %event.trigger,
                "Running advice hook"
            );
            let result = self
                .executor
                .execute(
                    cancel,
                    &record.command,
                    record.timeout_seconds,
                    event.cwd.as_deref(),
                    &env,
                )
                .await;

            if let Some(error) = &result.error {
                warn!(
                    advice_id = %record.id,
                    agent_id = %event.agent_id,
                    policy = ?record.on_failure,
                    error = %error,
                    "Advice hook failed"
                );
            }

            match evaluate_candidate(&record, &result) {
                CandidateOutcome::Block(reason) => {
                    response.block = true;
                    response.reason = Some(reason);
                    break;
                }
                CandidateOutcome::Warn(warning) => response.warnings.push(warning),
                CandidateOutcome::None => {}
            }
        }

        response
    }

    /// Consume session events from `events` until `cancel` fires or the
    /// stream closes. Events are handled one at a time.
    pub async fn run_subscriber_loop(
        &self,
        cancel: CancellationToken,
        events: &dyn EventStream,
        subject: &str,
    ) -> Result<(), EventStreamError> {
        let mut subscription = events.subscribe(subject).await?;
        info!(subject = %subject, "Advice hook subscriber started");

        let mut handled = 0u64;
        loop {
            let payload = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Shutdown signal received, stopping advice hook subscriber");
                    break;
                }
                payload = subscription.recv() => match payload {
                    Some(payload) => payload,
                    None => {
                        info!("Event stream closed, stopping advice hook subscriber");
                        break;
                    }
                },
            };

            let event: SessionEvent = match serde_json::from_slice(&payload) {
                Ok(event) => event,
                Err(e) => {
                    warn!(error = %e, bytes = payload.len(), "Dropping malformed session event");
                    continue;
                }
            };

            let response = self.handle_session_event(&cancel, &event).await;
            handled += 1;

            if response.block {
                warn!(
                    agent_id = %event.agent_id,
                    trigger = %event.trigger,
                    reason = response.reason.as_deref().unwrap_or_default(),
                    "Advice blocked session"
                );
            }
            for warning in &response.warnings {
                warn!(
                    agent_id = %event.agent_id,
                    trigger = %event.trigger,
                    "Advice warning: {}",
                    warning
                );
            }
        }

        subscription.cancel();
        info!(handled, "Advice hook subscriber stopped");
        Ok(())
    }
}
