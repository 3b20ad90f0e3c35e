// Copyright (c) 2026 Rigwatch Contributors
// SPDX-License-Identifier: AGPL-3.0

// Event Bus Implementation - Subject-based Pub/Sub
//
// Provides in-memory message streaming using tokio broadcast channels.
// Stands in for the external message bus when running single-process and
// in tests. Messages are lost on restart.

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::domain::event_stream::{
    subject_matches, validate_pattern, EventStream, EventStreamError, EventSubscription,
};
use crate::domain::events::SessionEvent;

/// A published message: subject plus raw payload
#[derive(Debug, Clone)]
pub struct BusMessage {
    pub subject: String,
    pub payload: Bytes,
}

/// Event bus for publishing and subscribing to subject-addressed payloads
#[derive(Clone)]
pub struct InMemoryEventBus {
    sender: Arc<broadcast::Sender<BusMessage>>,
    capacity: usize,
}

impl InMemoryEventBus {
    /// Create a new event bus with specified channel capacity
    /// Capacity determines how many messages can be buffered before the
    /// slowest subscriber starts losing old ones
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
            capacity,
        }
    }

    /// Create event bus with default capacity (1000)
    pub fn with_default_capacity() -> Self {
        Self::new(1000)
    }

    /// Publish a raw payload; returns how many subscriptions saw it
    pub fn publish(&self, subject: impl Into<String>, payload: impl Into<Bytes>) -> usize {
        let message = BusMessage {
            subject: subject.into(),
            payload: payload.into(),
        };
        debug!(subject = %message.subject, bytes = message.payload.len(), "Publishing message");

        let receiver_count = self.sender.send(message).unwrap_or(0);
        if receiver_count == 0 {
            debug!("No subscribers listening to message");
        }
        receiver_count
    }

    /// Publish a session event as JSON on `hooks.session.<trigger>`
    pub fn publish_session_event(&self, event: &SessionEvent) -> Result<usize, serde_json::Error> {
        let payload = serde_json::to_vec(event)?;
        Ok(self.publish(event.subject(), payload))
    }

    /// Get the number of active subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

#[async_trait]
impl EventStream for InMemoryEventBus {
    async fn subscribe(&self, pattern: &str) -> Result<EventSubscription, EventStreamError> {
        validate_pattern(pattern)?;

        // Subscribe before returning so nothing published afterwards is missed.
        let mut receiver = self.sender.subscribe();
        let (tx, rx) = mpsc::channel(self.capacity);
        let cancel = CancellationToken::new();
        let pattern = pattern.to_string();
        let stop = cancel.clone();

        tokio::spawn(async move {
            loop {
                let message = tokio::select! {
                    _ = stop.cancelled() => break,
                    received = receiver.recv() => received,
                };

                match message {
                    Ok(message) => {
                        if !subject_matches(&pattern, &message.subject) {
                            continue;
                        }
                        if tx.send(message.payload).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(pattern = %pattern, "Subscription lagged by {} messages", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            debug!(pattern = %pattern, "Subscription forwarder stopped");
        });

        Ok(EventSubscription::new(rx, cancel))
    }
}
