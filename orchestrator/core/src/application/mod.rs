// Copyright (c) 2026 Rigwatch Contributors
// SPDX-License-Identifier: AGPL-3.0

pub mod advice_hooks;
pub mod presence;

// Re-export services for convenience
pub use advice_hooks::{AdviceHookService, CandidateOutcome};
pub use presence::{PresenceTracker, ReaperConfig, SweepReport};
