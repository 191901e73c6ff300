//! Single-slot run locking.
//!
//! The [`RunLock`] trait guards the one contended resource in the system:
//! "a pipeline execution is currently active". Callers may live in separate
//! processes or sessions, so an in-process mutex is never sufficient —
//! implementations must push the claim into a transactional backing store
//! as a single conditional update (`UPDATE ... WHERE holder IS NULL`), not
//! a read-then-write.
//!
//! ## Crash Safety
//!
//! The lock is deliberately **not** reset at process start. A held slot
//! after a restart means a run may genuinely still be executing externally,
//! and clearing it would allow a second concurrent trigger. Recovery from a
//! truly abandoned holder goes through [`RunLock::force_release`], the one
//! sanctioned administrative break of the exclusion invariant.
//!
//! ## Failure Semantics
//!
//! "Lock already held" is an expected outcome and is reported in-band via
//! [`AcquireResult::Held`]. Backing-store unavailability surfaces as
//! [`crate::error::Error::StoreUnavailable`]; the two are never conflated.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use lakerun_core::RunId;

use crate::error::Result;

/// The constant slot name keying the single lock row.
pub const LOCK_SLOT: &str = "ACTIVE_PIPELINE_RUN";

/// Who holds the lock, and since when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockHolder {
    /// The run holding the slot.
    pub run_id: RunId,
    /// Identity that acquired the lock.
    pub locked_by: String,
    /// Acquisition timestamp; the staleness signal for operators deciding
    /// whether a holder is abandoned.
    pub locked_at: DateTime<Utc>,
}

/// Result of a lock acquisition attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquireResult {
    /// The slot was free and is now claimed by the caller's run.
    Acquired {
        /// When the claim was written.
        locked_at: DateTime<Utc>,
    },
    /// The slot is held by another run; nothing was mutated.
    Held {
        /// The current holder, if readable.
        holder: Option<LockHolder>,
    },
}

impl AcquireResult {
    /// Returns true if the lock was acquired.
    #[must_use]
    pub const fn is_acquired(&self) -> bool {
        matches!(self, Self::Acquired { .. })
    }

    /// Returns the blocking holder, if acquisition failed and it was readable.
    #[must_use]
    pub fn holder(&self) -> Option<&LockHolder> {
        match self {
            Self::Acquired { .. } => None,
            Self::Held { holder } => holder.as_ref(),
        }
    }
}

/// Exclusive lock over the single active-run slot.
///
/// Implementations back the slot with one fixed row in a transactional
/// store. The in-memory implementation exists for tests; production uses a
/// conditional SQL UPDATE against the `run_lock` table.
#[async_trait]
pub trait RunLock: Send + Sync {
    /// Atomically claims the slot for `run_id`.
    ///
    /// The null-check and the claim must be one atomic operation against
    /// the backing store, so that under concurrent calls exactly one caller
    /// observes [`AcquireResult::Acquired`] and all others observe
    /// [`AcquireResult::Held`] with zero side effects.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::StoreUnavailable`] if the backing
    /// store cannot be reached — distinct from contention.
    async fn try_acquire(&self, run_id: RunId, locked_by: &str) -> Result<AcquireResult>;

    /// Clears the slot only if it is currently held by `run_id`.
    ///
    /// Returns `false` without mutating anything when the slot is free or
    /// held by a different run, so a stale or duplicate release can never
    /// clear a lock acquired by someone else afterward.
    async fn release(&self, run_id: RunId) -> Result<bool>;

    /// Unconditionally clears the slot regardless of holder.
    ///
    /// Administrative recovery for abandoned holders only; never invoked by
    /// the normal lifecycle.
    async fn force_release(&self) -> Result<()>;

    /// Returns the current holder, or `None` if the slot is free.
    async fn holder(&self) -> Result<Option<LockHolder>>;

    /// Read-only check whether the slot is held.
    async fn is_locked(&self) -> Result<bool> {
        Ok(self.holder().await?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_result_is_acquired() {
        let acquired = AcquireResult::Acquired {
            locked_at: Utc::now(),
        };
        assert!(acquired.is_acquired());
        assert!(acquired.holder().is_none());

        let held = AcquireResult::Held { holder: None };
        assert!(!held.is_acquired());
    }

    #[test]
    fn held_exposes_holder_info() {
        let holder = LockHolder {
            run_id: RunId::generate(),
            locked_by: "alice".to_string(),
            locked_at: Utc::now(),
        };
        let held = AcquireResult::Held {
            holder: Some(holder.clone()),
        };
        assert_eq!(held.holder(), Some(&holder));
    }
}
