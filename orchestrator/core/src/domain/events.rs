// Copyright (c) 2026 Rigwatch Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Inbound Events
//!
//! Transient events delivered to the core by the hosting server or the
//! message bus. Nothing here is persisted.
//!
//! | Event | Consumer |
//! |-------|----------|
//! | [`SessionEvent`] | `AdviceHookService` (direct call or bus subscription) |
//! | [`PresenceEvent`] | `PresenceTracker::record_event` |

use serde::{Deserialize, Serialize};

/// Subject prefix session events are published under (`hooks.session.<trigger>`).
pub const SESSION_SUBJECT_PREFIX: &str = "hooks.session";

/// Wildcard subject the subscriber loop listens on.
pub const SESSION_SUBJECT_WILDCARD: &str = "hooks.session.>";

/// A session lifecycle point reached by an agent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEvent {
    #[serde(default)]
    pub agent_id: String,
    #[serde(default)]
    pub trigger: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
}

impl SessionEvent {
    pub fn new(agent_id: impl Into<String>, trigger: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            trigger: trigger.into(),
            cwd: None,
        }
    }

    pub fn with_cwd(mut self, cwd: impl Into<String>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Both agent and trigger are required for any advice to apply.
    pub fn is_complete(&self) -> bool {
        !self.agent_id.is_empty() && !self.trigger.is_empty()
    }

    pub fn subject(&self) -> String {
        format!("{}.{}", SESSION_SUBJECT_PREFIX, self.trigger)
    }
}

/// Hook activity reported by an agent, used for liveness tracking.
///
/// Optional fields that are absent or empty leave the previously recorded
/// value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceEvent {
    #[serde(default)]
    pub actor: String,
    #[serde(default)]
    pub hook_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
}

impl PresenceEvent {
    pub fn new(actor: impl Into<String>, hook_type: impl Into<String>) -> Self {
        Self {
            actor: actor.into(),
            hook_type: hook_type.into(),
            ..Default::default()
        }
    }

    pub fn with_tool(mut self, tool_name: impl Into<String>) -> Self {
        self.tool_name = Some(tool_name.into());
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_cwd(mut self, cwd: impl Into<String>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }
}
