use anyhow::Result;
use fleetmon_storage::MetricStore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::time::{interval, Duration, MissedTickBehavior};

use super::fetcher::fetch_metrics;
use crate::config::PollConfig;
use crate::worker::EvalQueue;

/// Polls every registered machine on a fixed cadence and hands each
/// persisted metric to the evaluation queue.
pub struct PollScheduler {
    store: Arc<dyn MetricStore>,
    queue: EvalQueue,
    client: reqwest::Client,
    interval_secs: u64,
    fetch_timeout: Duration,
    max_concurrent: usize,
    in_flight: AtomicBool,
}

impl PollScheduler {
    pub fn new(store: Arc<dyn MetricStore>, queue: EvalQueue, config: &PollConfig) -> Self {
        Self {
            store,
            queue,
            client: reqwest::Client::new(),
            interval_secs: config.interval_secs,
            fetch_timeout: Duration::from_secs(config.fetch_timeout_secs),
            max_concurrent: config.max_concurrent,
            in_flight: AtomicBool::new(false),
        }
    }

    pub async fn run(&self) {
        tracing::info!(
            interval_secs = self.interval_secs,
            fetch_timeout_secs = self.fetch_timeout.as_secs(),
            max_concurrent = self.max_concurrent,
            "Poll scheduler started"
        );

        let mut tick = interval(Duration::from_secs(self.interval_secs));
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tick.tick().await;
            if let Err(e) = self.poll_cycle().await {
                tracing::error!(error = %e, "Poll cycle failed");
            }
        }
    }

    /// Run one cycle, unless the previous one is still in flight.
    pub async fn poll_cycle(&self) -> Result<()> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            tracing::warn!("Previous poll cycle still running, skipping this tick");
            return Ok(());
        }
        let result = self.run_cycle().await;
        self.in_flight.store(false, Ordering::SeqCst);
        result
    }

    async fn run_cycle(&self) -> Result<()> {
        let machines = self.store.list_machines()?;
        if machines.is_empty() {
            tracing::debug!("No machines registered, nothing to poll");
            return Ok(());
        }

        tracing::info!(count = machines.len(), "Polling machines for metrics");

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut handles = Vec::new();

        for machine in machines {
            let permit = semaphore.clone().acquire_owned().await?;
            let store = self.store.clone();
            let queue = self.queue.clone();
            let client = self.client.clone();
            let timeout = self.fetch_timeout;

            let handle = tokio::spawn(async move {
                let ok = match fetch_metrics(&client, &machine, timeout).await {
                    Ok(metrics) => {
                        match store.create_metric(
                            &machine.id,
                            metrics.cpu,
                            metrics.mem,
                            metrics.disk,
                            &metrics.uptime,
                        ) {
                            Ok(metric) => {
                                tracing::debug!(
                                    machine = %machine.name,
                                    metric_id = %metric.id,
                                    "Metric stored"
                                );
                                // Evaluation is dispatched as soon as the
                                // metric lands, not after the whole cycle.
                                queue.schedule(&metric.id);
                                true
                            }
                            Err(e) => {
                                tracing::error!(
                                    machine = %machine.name,
                                    error = %e,
                                    "Failed to store metric"
                                );
                                false
                            }
                        }
                    }
                    Err(e) => {
                        tracing::error!(
                            machine = %machine.name,
                            url = %machine.url,
                            error = %e,
                            "Failed to fetch metrics"
                        );
                        false
                    }
                };
                drop(permit);
                ok
            });

            handles.push(handle);
        }

        let mut succeeded = 0u32;
        let mut failed = 0u32;
        for handle in handles {
            match handle.await {
                Ok(true) => succeeded += 1,
                Ok(false) => failed += 1,
                Err(e) => {
                    failed += 1;
                    tracing::error!(error = %e, "Fetch task panicked");
                }
            }
        }

        tracing::info!(
            polled = succeeded + failed,
            succeeded,
            failed,
            "Poll cycle complete"
        );
        Ok(())
    }
}
