//! # lakerun-flow
//!
//! Run lifecycle coordination for the lakerun pipeline portal.
//!
//! This crate coordinates exclusive execution of a single long-running,
//! externally-executed pipeline job that may be requested concurrently by
//! many independent callers. It provides:
//!
//! - **Run Locking**: A single contended lock slot with compare-and-set
//!   acquisition, so exactly one run can be active across processes
//! - **State Machine**: A monotonic run lifecycle driven by best-effort
//!   polling of the external job's status channel
//! - **Outcome Reconciliation**: Dual-source KPI reads that fall back
//!   deterministically between the metadata registry and the artifact store
//! - **Audit Trail**: An append-only event log per run, plus durable restore
//!   provenance records
//!
//! ## Core Concepts
//!
//! - **Run**: One end-to-end execution of the external job, tracked by a
//!   caller-generated identifier from trigger to terminal outcome
//! - **Lock slot**: The single row representing "an execution is currently
//!   active"; cleared only by settling the run that holds it, or by an
//!   explicit administrative override
//! - **Tracking handle**: Opaque URL returned by the external trigger call,
//!   polled one-shot per [`RunOrchestrator::advance`] invocation
//!
//! ## Guarantees
//!
//! - At most one caller acquires the lock for a free slot, with zero side
//!   effects for the losers
//! - Run states only move forward; terminal states are absorbing
//! - Repeated polls reporting the same external status persist nothing and
//!   append no duplicate events
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use lakerun_flow::artifacts::memory::InMemoryArtifactStore;
//! use lakerun_flow::client::memory::InMemoryPipelineClient;
//! use lakerun_flow::error::Result;
//! use lakerun_flow::events::InMemoryEventLog;
//! use lakerun_flow::lock::memory::InMemoryRunLock;
//! use lakerun_flow::orchestrator::RunOrchestrator;
//! use lakerun_flow::registry::memory::InMemoryRunRegistry;
//!
//! # async fn demo() -> Result<()> {
//! let orchestrator = RunOrchestrator::new(
//!     Arc::new(InMemoryRunLock::new()),
//!     Arc::new(InMemoryRunRegistry::new()),
//!     Arc::new(InMemoryEventLog::new()),
//!     Arc::new(InMemoryPipelineClient::new()),
//!     Arc::new(InMemoryArtifactStore::new()),
//! );
//!
//! let run = orchestrator.start("import/sales_2026q2.csv", "alice").await?;
//! let outcome = orchestrator.advance(run.id).await?;
//! # let _ = outcome;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod artifacts;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod lock;
pub mod metrics;
pub mod orchestrator;
pub mod registry;
pub mod restore;
pub mod run;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::artifacts::{ArtifactStore, KpiSlot, KpiSource};
    pub use crate::client::{map_job_status, PipelineClient, PollResponse, TriggerRequest};
    pub use crate::error::{Error, Result};
    pub use crate::events::{Event, EventKind, EventLog};
    pub use crate::lock::{AcquireResult, LockHolder, RunLock};
    pub use crate::orchestrator::{Advance, RunOrchestrator};
    pub use crate::registry::{RunRegistry, StateUpdate};
    pub use crate::restore::{RestoreCoordinator, RestoreLog, RestoreRecord};
    pub use crate::run::{Run, RunState};
    pub use lakerun_core::{EventId, RestoreId, RunId};
}
