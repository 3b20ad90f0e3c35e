// Copyright (c) 2026 Rigwatch Contributors
// SPDX-License-Identifier: AGPL-3.0

pub mod repositories;
pub mod event_bus;
pub mod hook_executor;

pub use event_bus::InMemoryEventBus;
pub use hook_executor::{HookExecutor, ShellHookExecutor};
pub use repositories::InMemoryAdviceStore;
