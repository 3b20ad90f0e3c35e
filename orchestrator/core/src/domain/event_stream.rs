// Copyright (c) 2026 Rigwatch Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Event Stream Contract
//!
//! Subscription side of the message bus that fans session events out between
//! processes. Payloads are raw bytes; decoding is the subscriber's job.
//!
//! Subjects are dot-separated tokens. Patterns use NATS-style wildcards:
//! `*` matches exactly one token and `>` (last token only) matches one or
//! more trailing tokens.

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Message bus subscription contract.
#[async_trait]
pub trait EventStream: Send + Sync {
    /// Subscribe to every subject matching `pattern`.
    async fn subscribe(&self, pattern: &str) -> Result<EventSubscription, EventStreamError>;
}

/// Live subscription: a payload channel plus a cancel handle.
///
/// Dropping the subscription cancels it.
pub struct EventSubscription {
    receiver: mpsc::Receiver<Bytes>,
    cancel: CancellationToken,
}

impl EventSubscription {
    pub fn new(receiver: mpsc::Receiver<Bytes>, cancel: CancellationToken) -> Self {
        Self { receiver, cancel }
    }

    /// Next payload, or `None` once the publisher side has closed.
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.receiver.recv().await
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Drop for EventSubscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Errors that can occur when subscribing or receiving
#[derive(Debug, thiserror::Error)]
pub enum EventStreamError {
    #[error("Invalid subject pattern: {0}")]
    InvalidPattern(String),

    #[error("Event stream is closed")]
    Closed,
}

/// Check a subject pattern for empty tokens and misplaced `>`.
pub fn validate_pattern(pattern: &str) -> Result<(), EventStreamError> {
    let tokens: Vec<&str> = pattern.split('.').collect();
    let last = tokens.len() - 1;
    for (i, token) in tokens.iter().enumerate() {
        if token.is_empty() || (*token == ">" && i != last) {
            return Err(EventStreamError::InvalidPattern(pattern.to_string()));
        }
    }
    Ok(())
}

/// Whether `subject` is selected by `pattern`.
pub fn subject_matches(pattern: &str, subject: &str) -> bool {
    let mut pattern_tokens = pattern.split('.');
    let mut subject_tokens = subject.split('.');

    loop {
        match (pattern_tokens.next(), subject_tokens.next()) {
            (Some(">"), Some(_)) => return true,
            (Some("*"), Some(_)) => continue,
            (Some(p), Some(s)) if p == s => continue,
            (None, None) => return true,
            _ => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_matching() {
        assert!(subject_matches("hooks.session.>", "hooks.session.session-end"));
        assert!(subject_matches("hooks.session.>", "hooks.session.a.b"));
        assert!(!subject_matches("hooks.session.>", "hooks.session"));
        assert!(subject_matches("hooks.*.before-push", "hooks.session.before-push"));
        assert!(!subject_matches("hooks.*", "hooks.session.before-push"));
        assert!(subject_matches("hooks.session", "hooks.session"));
        assert!(!subject_matches("hooks.session", "hooks.presence"));
    }

    #[test]
    fn test_validate_pattern() {
        assert!(validate_pattern("hooks.session.>").is_ok());
        assert!(validate_pattern("hooks.*.x").is_ok());
        assert!(validate_pattern("hooks.>.x").is_err());
        assert!(validate_pattern("hooks..x").is_err());
        assert!(validate_pattern("").is_err());
    }
}
