// Copyright (c) 2026 Rigwatch Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Advice Records
//!
//! An advice record is a bead of category `advice` that pairs a session
//! trigger and a shell command with subscription labels and a failure policy.
//!
//! The hook-specific fields live in a free-form structured blob on the bead.
//! [`HookFields`] is the schema used to decode that blob; every field is
//! optional so partially-filled records decode cleanly.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Advice value objects and payload decoding

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Bead category holding advice rules.
pub const ADVICE_CATEGORY: &str = "advice";

/// Only beads in this status are candidates.
pub const OPEN_STATUS: &str = "open";

/// Timeout applied when a record does not carry a positive one.
pub const DEFAULT_HOOK_TIMEOUT_SECS: u64 = 30;

/// Hard upper bound for any hook command.
pub const MAX_HOOK_TIMEOUT_SECS: u64 = 300;

/// A work item as returned by the advice store.
///
/// `fields` is opaque to the store; advice-specific data is decoded from it
/// with [`AdviceRecord::from_bead`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bead {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub fields: serde_json::Value,
}

fn default_category() -> String {
    ADVICE_CATEGORY.to_string()
}

fn default_status() -> String {
    OPEN_STATUS.to_string()
}

/// Session lifecycle point an advice hook fires on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HookTrigger {
    SessionEnd,
    BeforeCommit,
    BeforePush,
    BeforeHandoff,
}

impl HookTrigger {
    pub const ALL: [HookTrigger; 4] = [
        HookTrigger::SessionEnd,
        HookTrigger::BeforeCommit,
        HookTrigger::BeforePush,
        HookTrigger::BeforeHandoff,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HookTrigger::SessionEnd => "session-end",
            HookTrigger::BeforeCommit => "before-commit",
            HookTrigger::BeforePush => "before-push",
            HookTrigger::BeforeHandoff => "before-handoff",
        }
    }
}

impl fmt::Display for HookTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HookTrigger {
    type Err = AdviceFieldsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HookTrigger::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| AdviceFieldsError::UnknownTrigger(s.to_string()))
    }
}

/// What a failing hook does to the session.
///
/// Any value other than `block` or `warn` is treated as `ignore`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OnFailurePolicy {
    Block,
    Warn,
    #[default]
    Ignore,
}

impl From<String> for OnFailurePolicy {
    fn from(value: String) -> Self {
        match value.as_str() {
            "block" => OnFailurePolicy::Block,
            "warn" => OnFailurePolicy::Warn,
            _ => OnFailurePolicy::Ignore,
        }
    }
}

impl From<OnFailurePolicy> for String {
    fn from(value: OnFailurePolicy) -> Self {
        match value {
            OnFailurePolicy::Block => "block",
            OnFailurePolicy::Warn => "warn",
            OnFailurePolicy::Ignore => "ignore",
        }
        .to_string()
    }
}

/// Schema of the hook-related entries in a bead's `fields` blob.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HookFields {
    #[serde(default)]
    pub hook_command: Option<String>,
    #[serde(default)]
    pub hook_trigger: Option<HookTrigger>,
    /// Seconds; zero or negative selects the default.
    #[serde(default)]
    pub hook_timeout: Option<i64>,
    #[serde(default)]
    pub hook_on_failure: Option<OnFailurePolicy>,
}

impl HookFields {
    /// Decode from a bead's structured fields. `null` decodes to all defaults.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, AdviceFieldsError> {
        if value.is_null() {
            return Ok(Self::default());
        }
        HookFields::deserialize(value).map_err(AdviceFieldsError::Malformed)
    }
}

/// An advice rule decoded from a [`Bead`].
#[derive(Debug, Clone, PartialEq)]
pub struct AdviceRecord {
    pub id: String,
    pub title: String,
    pub labels: Vec<String>,
    pub command: String,
    pub trigger: Option<HookTrigger>,
    pub timeout_seconds: i64,
    pub on_failure: OnFailurePolicy,
}

impl AdviceRecord {
    pub fn from_bead(bead: &Bead) -> Result<Self, AdviceFieldsError> {
        let fields = HookFields::from_value(&bead.fields)?;
        Ok(Self {
            id: bead.id.clone(),
            title: bead.title.clone(),
            labels: bead.labels.clone(),
            command: fields.hook_command.unwrap_or_default(),
            trigger: fields.hook_trigger,
            timeout_seconds: fields.hook_timeout.unwrap_or(0),
            on_failure: fields.hook_on_failure.unwrap_or_default(),
        })
    }

    /// True when the record carries a command and fires on `trigger`.
    pub fn fires_on(&self, trigger: &str) -> bool {
        !self.command.trim().is_empty()
            && self.trigger.map(|t| t.as_str() == trigger).unwrap_or(false)
    }
}

/// Errors decoding the advice-specific fields of a bead.
#[derive(Debug, thiserror::Error)]
pub enum AdviceFieldsError {
    #[error("Malformed advice fields: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("Unknown hook trigger: {0}")]
    UnknownTrigger(String),
}
