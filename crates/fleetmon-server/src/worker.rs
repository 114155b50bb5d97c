use fleetmon_incident::IncidentEvaluator;
use fleetmon_storage::MetricStore;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};

/// Fire-and-forget handle for scheduling incident evaluation of a
/// persisted metric. Cloneable; the channel is unbounded so `schedule`
/// never blocks a poll task.
#[derive(Clone)]
pub struct EvalQueue {
    tx: mpsc::UnboundedSender<String>,
}

impl EvalQueue {
    pub fn schedule(&self, metric_id: &str) {
        if self.tx.send(metric_id.to_string()).is_err() {
            tracing::warn!(metric_id, "Evaluation queue closed, dropping evaluation");
        }
    }
}

/// Create the queue and the receiving end consumed by [`EvalWorkerPool`].
pub fn eval_queue() -> (EvalQueue, mpsc::UnboundedReceiver<String>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EvalQueue { tx }, rx)
}

/// Consumes the evaluation queue, dispatching each metric to the
/// evaluator as its own task, bounded by a semaphore.
pub struct EvalWorkerPool {
    store: Arc<dyn MetricStore>,
    evaluator: Arc<IncidentEvaluator>,
    max_concurrent: usize,
}

impl EvalWorkerPool {
    pub fn new(
        store: Arc<dyn MetricStore>,
        evaluator: Arc<IncidentEvaluator>,
        max_concurrent: usize,
    ) -> Self {
        Self {
            store,
            evaluator,
            max_concurrent,
        }
    }

    /// Runs until every sender side of the queue has been dropped.
    pub async fn run(&self, mut rx: mpsc::UnboundedReceiver<String>) {
        tracing::info!(
            max_concurrent = self.max_concurrent,
            "Evaluation worker pool started"
        );

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut handles = Vec::new();

        while let Some(metric_id) = rx.recv().await {
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            let store = self.store.clone();
            let evaluator = self.evaluator.clone();

            handles.push(tokio::spawn(async move {
                evaluate_one(&*store, &evaluator, &metric_id);
                drop(permit);
            }));
            handles.retain(|h| !h.is_finished());
        }

        for handle in handles {
            let _ = handle.await;
        }
        tracing::info!("Evaluation queue closed, worker pool stopping");
    }
}

/// One unit of evaluation work. Errors are logged with the metric and
/// machine identity and never propagate: a failed unit must not take the
/// pool or sibling evaluations down with it.
fn evaluate_one(store: &dyn MetricStore, evaluator: &IncidentEvaluator, metric_id: &str) {
    let metric = match store.get_metric(metric_id) {
        Ok(Some(metric)) => metric,
        Ok(None) => {
            tracing::warn!(metric_id, "Metric not found, skipping evaluation");
            return;
        }
        Err(e) => {
            tracing::error!(metric_id, error = %e, "Failed to load metric for evaluation");
            return;
        }
    };

    if let Err(e) = evaluator.evaluate(&metric) {
        tracing::error!(
            metric_id,
            machine_id = %metric.machine_id,
            error = %e,
            "Incident evaluation failed"
        );
    }
}
