//! In-memory artifact store for testing.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use super::{ArtifactStore, KpiSlot};
use crate::error::{Error, Result};

/// In-memory artifact store for testing.
///
/// Slots are keyed by their artifact path. Reads can be failed wholesale to
/// exercise the graceful-degradation paths in the orchestrator.
#[derive(Debug, Default)]
pub struct InMemoryArtifactStore {
    slots: RwLock<HashMap<String, serde_json::Value>>,
    fail_reads: RwLock<bool>,
}

/// Converts a lock poison error to a store error.
fn poison_err<T>(_: PoisonError<T>) -> Error {
    Error::store("lock poisoned")
}

impl InMemoryArtifactStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Places a KPI document in a slot.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned (test-only type).
    pub fn put_kpis(&self, slot: &KpiSlot, document: serde_json::Value) {
        self.slots
            .write()
            .expect("artifact store lock")
            .insert(slot.path(), document);
    }

    /// Makes every read fail, simulating an unreachable store.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned (test-only type).
    pub fn set_fail_reads(&self, fail: bool) {
        *self.fail_reads.write().expect("artifact store lock") = fail;
    }
}

#[async_trait]
impl ArtifactStore for InMemoryArtifactStore {
    async fn read_kpis(&self, slot: &KpiSlot) -> Result<Option<serde_json::Value>> {
        if *self.fail_reads.read().map_err(poison_err)? {
            return Err(Error::store("artifact store unreachable"));
        }
        let result = {
            let slots = self.slots.read().map_err(poison_err)?;
            slots.get(&slot.path()).cloned()
        };
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lakerun_core::RunId;

    #[tokio::test]
    async fn read_hits_and_misses() -> Result<()> {
        let store = InMemoryArtifactStore::new();
        let run_id = RunId::generate();
        let doc = serde_json::json!({"total_revenue": 1250.5, "orders": 42});

        store.put_kpis(&KpiSlot::Run(run_id), doc.clone());

        assert_eq!(store.read_kpis(&KpiSlot::Run(run_id)).await?, Some(doc));
        assert_eq!(store.read_kpis(&KpiSlot::Current).await?, None);

        Ok(())
    }

    #[tokio::test]
    async fn failed_reads_surface_as_store_errors() -> Result<()> {
        let store = InMemoryArtifactStore::new();
        store.set_fail_reads(true);

        let result = store.read_kpis(&KpiSlot::Current).await;
        assert!(matches!(result, Err(Error::StoreUnavailable { .. })));

        Ok(())
    }
}
