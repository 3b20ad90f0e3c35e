// Copyright (c) 2026 Rigwatch Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Domain Layer
//!
//! Pure types and functions. No process spawning, no background tasks.
//!
//! | Module | Key Types |
//! |--------|-----------|
//! | [`subscription`] | `SubscriptionSet`, `build_subscriptions`, `matches` |
//! | [`advice`] | `Bead`, `AdviceRecord`, `HookTrigger`, `OnFailurePolicy` |
//! | [`hook`] | `HookResult`, `HookResponse`, `HookError` |
//! | [`events`] | `SessionEvent`, `PresenceEvent` |
//! | [`presence`] | `Entry`, `Clock` |
//! | [`repository`] | `AdviceStore` |
//! | [`event_stream`] | `EventStream`, `EventSubscription` |
//! | [`node_config`] | `NodeConfig` |

pub mod subscription;
pub mod advice;
pub mod hook;
pub mod events;
pub mod presence;
pub mod repository;
pub mod event_stream;
pub mod node_config;
