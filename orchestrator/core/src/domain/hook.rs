// Copyright (c) 2026 Rigwatch Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Hook execution results and the per-session decision built from them.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::domain::advice::{DEFAULT_HOOK_TIMEOUT_SECS, MAX_HOOK_TIMEOUT_SECS};

/// Clamp a requested hook timeout into `(0, 300s]`.
///
/// Zero or negative requests get the 30s default.
pub fn effective_timeout(timeout_seconds: i64) -> Duration {
    let secs = match u64::try_from(timeout_seconds) {
        Ok(0) | Err(_) => DEFAULT_HOOK_TIMEOUT_SECS,
        Ok(secs) => secs.min(MAX_HOOK_TIMEOUT_SECS),
    };
    Duration::from_secs(secs)
}

/// Why a hook command did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HookError {
    #[error("failed to start hook command: {0}")]
    Spawn(String),

    #[error("hook command exited with {status}")]
    Exit { status: String, code: Option<i32> },

    #[error("hook command timed out after {0:?}")]
    TimedOut(Duration),

    #[error("hook command cancelled")]
    Cancelled,
}

/// Outcome of running one hook command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HookResult {
    /// Trimmed stdout, or trimmed stderr when stdout is empty.
    pub output: String,
    pub error: Option<HookError>,
}

impl HookResult {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            error: None,
        }
    }

    pub fn failure(output: impl Into<String>, error: HookError) -> Self {
        Self {
            output: output.into(),
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregate advice decision for one session event.
///
/// The default value (no block, no warnings) is returned whenever nothing
/// applies or the event is incomplete.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookResponse {
    pub block: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_timeout_clamps() {
        assert_eq!(effective_timeout(0), Duration::from_secs(30));
        assert_eq!(effective_timeout(-5), Duration::from_secs(30));
        assert_eq!(effective_timeout(1), Duration::from_secs(1));
        assert_eq!(effective_timeout(300), Duration::from_secs(300));
        assert_eq!(effective_timeout(301), Duration::from_secs(300));
        assert_eq!(effective_timeout(i64::MAX), Duration::from_secs(300));
    }

    #[test]
    fn test_default_response_is_zero_value() {
        let response = HookResponse::default();
        assert!(!response.block);
        assert!(response.reason.is_none());
        assert!(response.warnings.is_empty());
        assert_eq!(serde_json::to_string(&response).unwrap(), r#"{"block":false}"#);
    }
}
