//! In-memory run lock implementation for testing.
//!
//! This module provides [`InMemoryRunLock`], a simple in-memory
//! implementation of the [`RunLock`] trait suitable for testing and
//! development.
//!
//! ## Limitations
//!
//! - **NOT suitable for production**: No cross-process coordination
//! - **Single-process only**: The slot is not shared across process boundaries
//! - **No persistence**: The slot is lost when the process exits, which
//!   also means the crash-survival property of the real lock does not hold

use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use chrono::Utc;

use lakerun_core::RunId;

use super::{AcquireResult, LockHolder, RunLock};
use crate::error::{Error, Result};

/// In-memory run lock for testing.
///
/// The write lock around the slot makes the null-check and the claim a
/// single atomic step, mirroring the conditional UPDATE a SQL
/// implementation performs.
///
/// ## Example
///
/// ```rust
/// use lakerun_flow::lock::memory::InMemoryRunLock;
///
/// let lock = InMemoryRunLock::new();
/// // Use lock in tests...
/// ```
#[derive(Debug, Default)]
pub struct InMemoryRunLock {
    slot: RwLock<Option<LockHolder>>,
}

/// Converts a lock poison error to a store error.
fn poison_err<T>(_: PoisonError<T>) -> Error {
    Error::store("lock poisoned")
}

impl InMemoryRunLock {
    /// Creates a new lock with a free slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a lock whose slot is pre-claimed, as after a process restart
    /// with an in-flight run.
    #[must_use]
    pub fn with_holder(holder: LockHolder) -> Self {
        Self {
            slot: RwLock::new(Some(holder)),
        }
    }
}

#[async_trait]
impl RunLock for InMemoryRunLock {
    async fn try_acquire(&self, run_id: RunId, locked_by: &str) -> Result<AcquireResult> {
        let mut slot = self.slot.write().map_err(poison_err)?;

        if let Some(holder) = slot.as_ref() {
            let holder = holder.clone();
            drop(slot);
            return Ok(AcquireResult::Held {
                holder: Some(holder),
            });
        }

        let locked_at = Utc::now();
        *slot = Some(LockHolder {
            run_id,
            locked_by: locked_by.to_string(),
            locked_at,
        });
        drop(slot);

        Ok(AcquireResult::Acquired { locked_at })
    }

    async fn release(&self, run_id: RunId) -> Result<bool> {
        let mut slot = self.slot.write().map_err(poison_err)?;

        let released = match slot.as_ref() {
            Some(holder) if holder.run_id == run_id => {
                *slot = None;
                true
            }
            _ => false,
        };
        drop(slot);

        Ok(released)
    }

    async fn force_release(&self) -> Result<()> {
        let mut slot = self.slot.write().map_err(poison_err)?;
        *slot = None;
        drop(slot);
        Ok(())
    }

    async fn holder(&self) -> Result<Option<LockHolder>> {
        let result = {
            let slot = self.slot.read().map_err(poison_err)?;
            slot.clone()
        };
        Ok(result)
    }
}
