//! Observability metrics for run coordination.
//!
//! Metrics are exposed via the `metrics` crate facade; hosts install the
//! exporter of their choice (e.g. `metrics-exporter-prometheus`).
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `lakerun_run_transitions_total` | Counter | `from_state`, `to_state` | Persisted run state transitions |
//! | `lakerun_lock_acquires_total` | Counter | `outcome` | Lock acquisition attempts |
//! | `lakerun_polls_total` | Counter | `outcome` | Poll invocations by outcome |
//! | `lakerun_restores_total` | Counter | `outcome` | Restore attempts by outcome |
//! | `lakerun_lock_held` | Gauge | - | 1 while the active-run slot is held |

use metrics::{counter, gauge};

/// Metric names as constants for consistency.
pub mod names {
    /// Counter: Persisted run state transitions.
    pub const RUN_TRANSITIONS_TOTAL: &str = "lakerun_run_transitions_total";
    /// Counter: Lock acquisition attempts by outcome.
    pub const LOCK_ACQUIRES_TOTAL: &str = "lakerun_lock_acquires_total";
    /// Counter: Poll invocations by outcome.
    pub const POLLS_TOTAL: &str = "lakerun_polls_total";
    /// Counter: Restore attempts by outcome.
    pub const RESTORES_TOTAL: &str = "lakerun_restores_total";
    /// Gauge: Whether the active-run slot is held.
    pub const LOCK_HELD: &str = "lakerun_lock_held";
}

/// Label keys used across metrics.
pub mod labels {
    /// Previous run state (for transitions).
    pub const FROM_STATE: &str = "from_state";
    /// Target run state (for transitions).
    pub const TO_STATE: &str = "to_state";
    /// Outcome status (acquired, held, transitioned, unchanged, failed...).
    pub const OUTCOME: &str = "outcome";
}

/// High-level interface for recording coordination metrics.
///
/// Cheap to clone and share.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlowMetrics;

impl FlowMetrics {
    /// Creates a new metrics recorder.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Records a persisted run state transition.
    pub fn record_transition(&self, from_state: &str, to_state: &str) {
        counter!(
            names::RUN_TRANSITIONS_TOTAL,
            labels::FROM_STATE => from_state.to_string(),
            labels::TO_STATE => to_state.to_string(),
        )
        .increment(1);
    }

    /// Records a lock acquisition attempt.
    pub fn record_lock_acquire(&self, outcome: &str) {
        counter!(
            names::LOCK_ACQUIRES_TOTAL,
            labels::OUTCOME => outcome.to_string(),
        )
        .increment(1);
    }

    /// Records a poll invocation outcome.
    pub fn record_poll(&self, outcome: &str) {
        counter!(
            names::POLLS_TOTAL,
            labels::OUTCOME => outcome.to_string(),
        )
        .increment(1);
    }

    /// Records a restore attempt outcome.
    pub fn record_restore(&self, outcome: &str) {
        counter!(
            names::RESTORES_TOTAL,
            labels::OUTCOME => outcome.to_string(),
        )
        .increment(1);
    }

    /// Updates the lock-held gauge.
    pub fn set_lock_held(&self, held: bool) {
        gauge!(names::LOCK_HELD).set(if held { 1.0 } else { 0.0 });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_without_an_exporter_is_a_noop() {
        let metrics = FlowMetrics::new();
        metrics.record_transition("SUBMITTED", "RUNNING");
        metrics.record_lock_acquire("acquired");
        metrics.record_poll("unchanged");
        metrics.record_restore("triggered");
        metrics.set_lock_held(true);
    }
}
