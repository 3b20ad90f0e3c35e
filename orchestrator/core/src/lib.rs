// Copyright (c) 2026 Rigwatch Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # `rigwatch-core`: Advice Hooks and Agent Presence
//!
//! Coordinates autonomous agents working against a shared bead store:
//!
//! - decides, per session lifecycle event, which advice hooks apply to an
//!   agent and whether any of them blocks or warns the session;
//! - keeps a self-cleaning liveness roster of agents fed by hook activity.
//!
//! ## Crate Layout
//!
//! | Module | Layer | Contents |
//! |--------|-------|----------|
//! | [`domain`] | Domain | Subscriptions, advice records, events, collaborator traits, config |
//! | [`application`] | Application | `AdviceHookService`, `PresenceTracker` |
//! | [`infrastructure`] | Infrastructure | Shell hook executor, in-memory bus and store |
//!
//! Everything is single-process and in memory; the bead store and message
//! bus are reached only through [`domain::repository::AdviceStore`] and
//! [`domain::event_stream::EventStream`].

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
