use crate::thresholds::ThresholdConfig;
use chrono::{DateTime, Duration, Utc};
use fleetmon_common::types::{Incident, Machine, MetricKind, MetricRecord};
use fleetmon_storage::error::StorageError;
use fleetmon_storage::MetricStore;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("machine {machine_id} not found for metric {metric_id}")]
    MachineMissing {
        metric_id: String,
        machine_id: String,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// An incident transition produced by evaluating one metric sample.
#[derive(Debug, Clone)]
pub enum IncidentChange {
    Opened(Incident),
    Closed(Incident),
}

/// Compares metric samples against thresholds and opens/closes incidents
/// in the store.
///
/// Creation is guarded by the store's atomic conditional insert, so
/// concurrent evaluations for the same (machine, kind) cannot open
/// duplicate incidents; resolution targets the single open row.
pub struct IncidentEvaluator {
    store: Arc<dyn MetricStore>,
    thresholds: ThresholdConfig,
}

impl IncidentEvaluator {
    pub fn new(store: Arc<dyn MetricStore>, thresholds: ThresholdConfig) -> Self {
        Self { store, thresholds }
    }

    /// Evaluates one sample against all metric kinds.
    pub fn evaluate(&self, metric: &MetricRecord) -> Result<Vec<IncidentChange>, EvalError> {
        self.evaluate_at(metric, Utc::now())
    }

    /// Like [`evaluate`](Self::evaluate), with an explicit clock for the
    /// cooldown-window and close timestamps.
    pub fn evaluate_at(
        &self,
        metric: &MetricRecord,
        now: DateTime<Utc>,
    ) -> Result<Vec<IncidentChange>, EvalError> {
        let machine = self.store.get_machine(&metric.machine_id)?.ok_or_else(|| {
            EvalError::MachineMissing {
                metric_id: metric.id.clone(),
                machine_id: metric.machine_id.clone(),
            }
        })?;

        let mut changes = Vec::new();
        for kind in MetricKind::ALL {
            let value = match kind {
                MetricKind::Cpu => metric.cpu,
                MetricKind::Mem => metric.mem,
                MetricKind::Disk => metric.disk,
            };
            if let Some(change) = self.check(&machine, kind, value, now)? {
                changes.push(change);
            }
        }
        Ok(changes)
    }

    fn check(
        &self,
        machine: &Machine,
        kind: MetricKind,
        value: f64,
        now: DateTime<Utc>,
    ) -> Result<Option<IncidentChange>, EvalError> {
        let threshold = self.thresholds.for_kind(kind);

        if value > threshold.value {
            if threshold.cooldown_mins > 0 {
                // Sustained policy: suppress a new incident while one of
                // this kind started within the cooldown window, open or
                // closed. Only creation is gated, never resolution.
                let since = now - Duration::minutes(threshold.cooldown_mins);
                if self
                    .store
                    .find_incident_started_since(&machine.id, kind, since)?
                    .is_some()
                {
                    return Ok(None);
                }
            }

            match self.store.create_incident(&machine.id, kind, value)? {
                Some(incident) => {
                    tracing::info!(
                        machine = %machine.name,
                        kind = %kind,
                        value,
                        threshold = threshold.value,
                        "Incident opened"
                    );
                    Ok(Some(IncidentChange::Opened(incident)))
                }
                // Already open: keep the original incident, no duplicate.
                None => Ok(None),
            }
        } else if let Some(open) = self.store.find_open_incident(&machine.id, kind)? {
            if self.store.close_incident(&open.id, now)? {
                tracing::info!(
                    machine = %machine.name,
                    kind = %kind,
                    value,
                    "Incident resolved"
                );
                let closed = Incident {
                    end_time: Some(now),
                    ..open
                };
                Ok(Some(IncidentChange::Closed(closed)))
            } else {
                // Lost a race with another close; nothing left to do.
                Ok(None)
            }
        } else {
            Ok(None)
        }
    }
}
