//! Remote artifact store access for KPI documents.
//!
//! The artifact store and the run registry are two independently-writable
//! records of a run's outcome: the external job writes KPI documents to the
//! lakehouse on its own schedule, and the orchestrator copies them into the
//! registry row when it observes success. Readers therefore need
//! deterministic fallback between the two, with a priority that depends on
//! the use case — the live view trusts the freshest artifact slot first,
//! the archive view trusts the authoritative registry row first.
//!
//! The fallback itself lives in one place
//! ([`crate::orchestrator::RunOrchestrator::read_kpis_first`]), driven by an
//! ordered list of [`KpiSource`] strategies, so callers differ only in the
//! order they pass.

pub mod memory;

#[cfg(feature = "http")]
pub mod http;

use async_trait::async_trait;

use lakerun_core::RunId;

use crate::error::Result;

/// Addressable KPI artifact slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KpiSlot {
    /// Per-run results folder.
    Run(RunId),
    /// The "current" results folder, overwritten by the latest job.
    Current,
}

impl KpiSlot {
    /// Relative artifact path for this slot.
    #[must_use]
    pub fn path(&self) -> String {
        match self {
            Self::Run(run_id) => format!("Files/results/runs/{run_id}/kpis.json"),
            Self::Current => "Files/results/current/kpis.json".to_string(),
        }
    }
}

/// One step in a dual-source KPI read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KpiSource {
    /// The per-run artifact slot.
    RunArtifact(RunId),
    /// The "current" artifact slot.
    CurrentArtifact,
    /// The KPI snapshot on a specific registry row.
    RegistryRow(RunId),
    /// The KPI snapshot on the most recently succeeded registry row.
    LatestSucceededRow,
}

/// Read access to small JSON artifacts in the remote store.
///
/// Consumed, not implemented, by the coordination core. Absence is a
/// designed graceful-degradation contract: implementations should answer
/// `Ok(None)` for any retrieval problem they can classify (missing file,
/// permission hiccup) rather than surfacing it, and callers additionally
/// absorb hard errors into `None` — a run is never failed for lacking KPIs.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Reads the KPI document for a slot, or `None` if unavailable.
    async fn read_kpis(&self, slot: &KpiSlot) -> Result<Option<serde_json::Value>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_paths() {
        let run_id = RunId::generate();
        assert_eq!(
            KpiSlot::Run(run_id).path(),
            format!("Files/results/runs/{run_id}/kpis.json")
        );
        assert_eq!(KpiSlot::Current.path(), "Files/results/current/kpis.json");
    }
}
