//! In-memory run registry implementation for testing.
//!
//! This module provides [`InMemoryRunRegistry`], a simple in-memory
//! implementation of the [`RunRegistry`] trait suitable for testing and
//! development.
//!
//! ## Limitations
//!
//! - **NOT suitable for production**: No durability, no cross-process reads
//! - **Single-process only**: Rows are not shared across process boundaries

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use lakerun_core::RunId;

use super::{RunRegistry, StateUpdate};
use crate::error::{Error, Result};
use crate::run::{Run, RunState};

/// In-memory run registry for testing.
///
/// ## Example
///
/// ```rust
/// use lakerun_flow::registry::memory::InMemoryRunRegistry;
///
/// let registry = InMemoryRunRegistry::new();
/// // Use registry in tests...
/// ```
#[derive(Debug, Default)]
pub struct InMemoryRunRegistry {
    runs: RwLock<HashMap<RunId, Run>>,
}

/// Converts a lock poison error to a store error.
fn poison_err<T>(_: PoisonError<T>) -> Error {
    Error::store("lock poisoned")
}

impl InMemoryRunRegistry {
    /// Creates a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of runs currently stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn run_count(&self) -> Result<usize> {
        let count = {
            let runs = self.runs.read().map_err(poison_err)?;
            runs.len()
        };
        Ok(count)
    }

    /// Snapshot of all rows, newest-first.
    fn sorted_snapshot(&self) -> Result<Vec<Run>> {
        let mut rows: Vec<Run> = {
            let runs = self.runs.read().map_err(poison_err)?;
            runs.values().cloned().collect()
        };
        rows.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(rows)
    }
}

#[async_trait]
impl RunRegistry for InMemoryRunRegistry {
    async fn create(&self, run: &Run) -> Result<()> {
        let mut runs = self.runs.write().map_err(poison_err)?;
        if runs.contains_key(&run.id) {
            drop(runs);
            return Err(Error::DuplicateRun { run_id: run.id });
        }
        runs.insert(run.id, run.clone());
        drop(runs);
        Ok(())
    }

    async fn update_state(
        &self,
        run_id: RunId,
        new_state: RunState,
        update: StateUpdate,
    ) -> Result<Run> {
        let mut runs = self.runs.write().map_err(poison_err)?;

        let Some(run) = runs.get_mut(&run_id) else {
            drop(runs);
            return Err(Error::RunNotFound { run_id });
        };

        run.advance_to(new_state, update)?;
        let updated = run.clone();
        drop(runs);

        Ok(updated)
    }

    async fn get(&self, run_id: RunId) -> Result<Option<Run>> {
        let result = {
            let runs = self.runs.read().map_err(poison_err)?;
            runs.get(&run_id).cloned()
        };
        Ok(result)
    }

    async fn get_active(&self) -> Result<Option<Run>> {
        Ok(self
            .sorted_snapshot()?
            .into_iter()
            .find(|run| !run.is_terminal()))
    }

    async fn latest_succeeded(&self) -> Result<Option<Run>> {
        let mut succeeded: Vec<Run> = self
            .sorted_snapshot()?
            .into_iter()
            .filter(|run| run.state == RunState::Succeeded)
            .collect();
        succeeded.sort_by(|a, b| b.finished_at.cmp(&a.finished_at));
        Ok(succeeded.into_iter().next())
    }

    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<Run>> {
        Ok(self
            .sorted_snapshot()?
            .into_iter()
            .skip(offset)
            .take(limit)
            .collect())
    }
}
