//! Run orchestration: trigger, poll, transition, settle.
//!
//! [`RunOrchestrator`] drives the whole lifecycle of a run against five
//! pluggable seams: the run lock, the run registry, the event log, the
//! external pipeline client, and the artifact store.
//!
//! ## Flows
//!
//! - **Start** ([`RunOrchestrator::start`]): acquire the lock, trigger the
//!   external job, persist the run row, append the submitted event. The
//!   lock is acquired *before* the trigger call; any failure after
//!   acquisition releases it on the same path — an unreleased lock from a
//!   failed start is a correctness bug, not a degraded state.
//! - **Advance** ([`RunOrchestrator::advance`]): one status poll, at most
//!   one transition. Caller-driven; repetition and watch timeouts belong to
//!   an external scheduler. Repeated polls reporting the same external
//!   status persist nothing and append no events.
//! - **Read** ([`RunOrchestrator::current_kpis`],
//!   [`RunOrchestrator::kpis_for_run`]): dual-source KPI reads through one
//!   shared fallback routine, differing only in source order.
//!
//! ## Cancellation
//!
//! There is no cooperative cancellation of an in-flight external job.
//! "Cancelling" in practice means an operator calling
//! [`RunOrchestrator::force_release_lock`] and accepting that the job may
//! still run unobserved. This is a documented limitation.

use std::sync::Arc;

use lakerun_core::RunId;

use crate::artifacts::{ArtifactStore, KpiSlot, KpiSource};
use crate::client::{map_job_status, PipelineClient, TriggerRequest};
use crate::error::{Error, Result};
use crate::events::{EventKind, EventLog};
use crate::lock::{AcquireResult, RunLock};
use crate::metrics::FlowMetrics;
use crate::registry::{RunRegistry, StateUpdate};
use crate::run::{Run, RunState};

/// Outcome of one [`RunOrchestrator::advance`] invocation.
#[derive(Debug, Clone)]
pub enum Advance {
    /// A transition was persisted.
    Transitioned {
        /// The run after the transition.
        run: Run,
        /// The state it moved from.
        from: RunState,
    },
    /// The poll reported nothing new; nothing was persisted.
    Unchanged {
        /// The run's unchanged state.
        state: RunState,
        /// The raw external status observed.
        external_status: String,
    },
    /// The run was already terminal; no poll was made.
    AlreadyTerminal {
        /// The terminal state.
        state: RunState,
    },
}

impl Advance {
    /// The run state after this invocation.
    #[must_use]
    pub fn state(&self) -> RunState {
        match self {
            Self::Transitioned { run, .. } => run.state,
            Self::Unchanged { state, .. } | Self::AlreadyTerminal { state } => *state,
        }
    }
}

/// Coordinates exclusive execution of the external pipeline job.
pub struct RunOrchestrator {
    pub(crate) lock: Arc<dyn RunLock>,
    pub(crate) registry: Arc<dyn RunRegistry>,
    pub(crate) events: Arc<dyn EventLog>,
    pub(crate) client: Arc<dyn PipelineClient>,
    pub(crate) artifacts: Arc<dyn ArtifactStore>,
    metrics: FlowMetrics,
}

impl RunOrchestrator {
    /// Creates a new orchestrator over the five seams.
    #[must_use]
    pub fn new(
        lock: Arc<dyn RunLock>,
        registry: Arc<dyn RunRegistry>,
        events: Arc<dyn EventLog>,
        client: Arc<dyn PipelineClient>,
        artifacts: Arc<dyn ArtifactStore>,
    ) -> Self {
        Self {
            lock,
            registry,
            events,
            client,
            artifacts,
            metrics: FlowMetrics::new(),
        }
    }

    /// Starts a new run: lock, trigger, persist, record.
    ///
    /// # Errors
    ///
    /// - [`Error::Validation`] for an empty input reference or requester
    /// - [`Error::LockHeld`] when another run is active; never retried here,
    ///   backoff policy belongs to the caller
    /// - [`Error::TriggerRejected`] when the external system refuses; the
    ///   lock has already been released when this surfaces
    /// - [`Error::DuplicateRun`] / [`Error::StoreUnavailable`] from the
    ///   registry, likewise after lock release
    #[tracing::instrument(skip(self))]
    pub async fn start(&self, input_ref: &str, requested_by: &str) -> Result<Run> {
        if input_ref.trim().is_empty() {
            return Err(Error::validation("input reference must not be empty"));
        }
        if requested_by.trim().is_empty() {
            return Err(Error::validation("requester identity must not be empty"));
        }

        let run_id = RunId::generate();

        match self.lock.try_acquire(run_id, requested_by).await? {
            AcquireResult::Acquired { .. } => {
                self.metrics.record_lock_acquire("acquired");
                self.metrics.set_lock_held(true);
            }
            AcquireResult::Held { holder } => {
                self.metrics.record_lock_acquire("held");
                return Err(Error::LockHeld {
                    holder: holder.map_or_else(|| "unknown".to_string(), |h| h.locked_by),
                });
            }
        }

        let request = TriggerRequest {
            run_id,
            input_ref: input_ref.to_string(),
            requested_by: requested_by.to_string(),
        };
        let receipt = match self.client.trigger(&request).await {
            Ok(receipt) => receipt,
            Err(err) => {
                self.abort_start(run_id, &err).await;
                return Err(err);
            }
        };

        let run = Run::submitted(run_id, input_ref, requested_by)
            .with_tracking_url(receipt.tracking_url);
        if let Err(err) = self.registry.create(&run).await {
            self.abort_start(run_id, &err).await;
            return Err(err);
        }

        if let Err(err) = self
            .events
            .append(
                run_id,
                EventKind::StatusChange,
                &format!("run submitted: {input_ref} (requested by {requested_by})"),
            )
            .await
        {
            // The external job is genuinely running; unwinding the lock here
            // would allow a second concurrent trigger.
            tracing::warn!(%run_id, error = %err, "run started but event append failed");
        }

        tracing::info!(%run_id, "run started");
        Ok(run)
    }

    /// Polls the external job once and applies at most one transition.
    ///
    /// # Errors
    ///
    /// - [`Error::RunNotFound`] for an unknown run
    /// - [`Error::MissingTrackingHandle`] when the run has no handle to poll
    /// - [`Error::PollUnavailable`] when the status check fails; the run
    ///   stays in its last known state and no event is appended
    /// - [`Error::StoreUnavailable`] from the registry; retryable
    #[tracing::instrument(skip(self), fields(run_id = %run_id))]
    pub async fn advance(&self, run_id: RunId) -> Result<Advance> {
        let Some(run) = self.registry.get(run_id).await? else {
            return Err(Error::RunNotFound { run_id });
        };

        if run.is_terminal() {
            self.metrics.record_poll("already_terminal");
            return Ok(Advance::AlreadyTerminal { state: run.state });
        }

        let tracking_url = run
            .tracking_url
            .as_deref()
            .ok_or(Error::MissingTrackingHandle { run_id })?;

        let poll = self.client.poll(tracking_url).await?;
        let target = map_job_status(&poll.status);

        if target == run.state {
            self.metrics.record_poll("unchanged");
            return Ok(Advance::Unchanged {
                state: run.state,
                external_status: poll.status,
            });
        }

        if !run.state.can_advance_to(target) {
            // The external side reported something earlier than what we have
            // already observed; keep the later state.
            tracing::warn!(
                %run_id,
                current = %run.state,
                reported = %target,
                external = %poll.status,
                "ignoring backward status report"
            );
            self.metrics.record_poll("stale");
            return Ok(Advance::Unchanged {
                state: run.state,
                external_status: poll.status,
            });
        }

        let mut update = StateUpdate::default();
        if run.external_job_id.is_none() {
            if let Some(job_id) = poll.external_job_id() {
                update = update.with_external_job_id(job_id);
            }
        }
        match target {
            RunState::Succeeded => {
                // Keyed by the transition: an unchanged poll never gets here
                // again, so the fetch happens once per run.
                if let Some(kpis) = self.fetch_success_kpis(run_id).await {
                    update = update.with_kpis(kpis);
                }
            }
            RunState::Failed => {
                let reason = poll
                    .failure_reason()
                    .unwrap_or_else(|| format!("external job reported {}", poll.status));
                update = update.with_error_message(reason);
            }
            _ => {}
        }

        let updated = self.registry.update_state(run_id, target, update).await?;
        self.metrics.record_transition(run.state.as_str(), target.as_str());
        self.metrics.record_poll("transitioned");

        if let Err(err) = self
            .events
            .append(
                run_id,
                EventKind::StatusChange,
                &format!(
                    "status changed: {} -> {} (external: {})",
                    run.state, target, poll.status
                ),
            )
            .await
        {
            tracing::warn!(%run_id, error = %err, "transition persisted but event append failed");
        }

        if target.is_terminal() {
            self.settle(run_id, target).await;
        }

        Ok(Advance::Transitioned {
            run: updated,
            from: run.state,
        })
    }

    /// KPIs for the live view: freshest artifact slot first, then the
    /// latest succeeded registry row.
    ///
    /// # Errors
    ///
    /// Returns registry errors; artifact failures degrade to the next source.
    pub async fn current_kpis(&self) -> Result<Option<serde_json::Value>> {
        self.read_kpis_first(&[KpiSource::CurrentArtifact, KpiSource::LatestSucceededRow])
            .await
    }

    /// KPIs for the archive view of one run: the authoritative registry row
    /// first, then that run's artifact slot.
    ///
    /// # Errors
    ///
    /// Returns registry errors; artifact failures degrade to the next source.
    pub async fn kpis_for_run(&self, run_id: RunId) -> Result<Option<serde_json::Value>> {
        self.read_kpis_first(&[
            KpiSource::RegistryRow(run_id),
            KpiSource::RunArtifact(run_id),
        ])
        .await
    }

    /// Reads KPI sources in order, returning the first document found.
    ///
    /// The shared fallback routine behind both read views: callers express
    /// their priority as the order of `sources` instead of duplicating
    /// fallback logic.
    ///
    /// # Errors
    ///
    /// Registry failures propagate (they are retryable); artifact store
    /// failures are absorbed as a missing source.
    pub async fn read_kpis_first(
        &self,
        sources: &[KpiSource],
    ) -> Result<Option<serde_json::Value>> {
        for source in sources {
            let found = match *source {
                KpiSource::RunArtifact(id) => self.read_artifact(KpiSlot::Run(id)).await,
                KpiSource::CurrentArtifact => self.read_artifact(KpiSlot::Current).await,
                KpiSource::RegistryRow(id) => {
                    self.registry.get(id).await?.and_then(|run| run.kpis)
                }
                KpiSource::LatestSucceededRow => {
                    self.registry.latest_succeeded().await?.and_then(|run| run.kpis)
                }
            };
            if found.is_some() {
                return Ok(found);
            }
        }
        Ok(None)
    }

    /// Unconditionally clears the run lock.
    ///
    /// Operator recovery for a run whose owner will never settle it (e.g.
    /// the owning process crashed). The external job, if still alive, keeps
    /// running unobserved.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StoreUnavailable`] if the lock store is unreachable.
    pub async fn force_release_lock(&self) -> Result<()> {
        self.lock.force_release().await?;
        self.metrics.set_lock_held(false);
        tracing::warn!("run lock force-released by operator");
        Ok(())
    }

    /// Unwinds a failed start: release the lock, record the failure.
    async fn abort_start(&self, run_id: RunId, cause: &Error) {
        match self.lock.release(run_id).await {
            Ok(true) => self.metrics.set_lock_held(false),
            Ok(false) => {}
            Err(release_err) => {
                tracing::error!(%run_id, error = %release_err, "failed to release lock after aborted start");
            }
        }
        if let Err(append_err) = self
            .events
            .append(run_id, EventKind::Error, &format!("run start aborted: {cause}"))
            .await
        {
            tracing::warn!(%run_id, error = %append_err, "failed to record aborted start");
        }
    }

    /// Terminal side effects: release the lock if held by this run, then
    /// record the release.
    async fn settle(&self, run_id: RunId, final_state: RunState) {
        match self.lock.release(run_id).await {
            Ok(true) => {
                self.metrics.set_lock_held(false);
                if let Err(err) = self
                    .events
                    .append(
                        run_id,
                        EventKind::Log,
                        &format!("pipeline lock released. final status: {final_state}"),
                    )
                    .await
                {
                    tracing::warn!(%run_id, error = %err, "lock released but event append failed");
                }
            }
            Ok(false) => {
                tracing::debug!(%run_id, "lock not held by this run at settle");
            }
            Err(err) => {
                // The run is terminal either way; the slot stays claimed
                // until a retry or an operator force-release clears it.
                tracing::error!(%run_id, error = %err, "failed to release lock at settle");
            }
        }
    }

    /// Fetches KPIs for a freshly-succeeded run: the run slot first, the
    /// "current" slot as fallback. Both missing is not a failure.
    async fn fetch_success_kpis(&self, run_id: RunId) -> Option<serde_json::Value> {
        for slot in [KpiSlot::Run(run_id), KpiSlot::Current] {
            match self.artifacts.read_kpis(&slot).await {
                Ok(Some(document)) => return Some(document),
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(%run_id, ?slot, error = %err, "KPI fetch failed");
                }
            }
        }
        None
    }

    /// Artifact read with store failures absorbed as absence.
    async fn read_artifact(&self, slot: KpiSlot) -> Option<serde_json::Value> {
        match self.artifacts.read_kpis(&slot).await {
            Ok(document) => document,
            Err(err) => {
                tracing::warn!(?slot, error = %err, "artifact read failed, falling through");
                None
            }
        }
    }
}
