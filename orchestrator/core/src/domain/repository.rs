// Copyright (c) 2026 Rigwatch Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Domain Repository Interfaces
//!
//! Read-only lookup contract for the bead store that holds advice records.
//! The relational persistence layer lives outside this crate; it is reached
//! only through [`AdviceStore`].
//!
//! | Trait | Aggregate | Implementations |
//! |-------|-----------|----------------|
//! | `AdviceStore` | `Bead` (category `advice`) | `InMemoryAdviceStore` |

use async_trait::async_trait;

use crate::domain::advice::Bead;

/// Read-only lookup of candidate advice beads.
#[async_trait]
pub trait AdviceStore: Send + Sync {
    /// List beads of `category` in `status`, in store order.
    async fn list_candidates(
        &self,
        category: &str,
        status: &str,
    ) -> Result<Vec<Bead>, RepositoryError>;
}

/// Repository errors
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}
