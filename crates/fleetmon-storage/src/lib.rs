//! Persistence layer for machine registrations, metric samples, and
//! incidents.
//!
//! The default implementation ([`engine::SqliteMetricStore`]) uses a single
//! SQLite database in WAL mode. The at-most-one-open-incident invariant is
//! enforced in the schema itself (a partial unique index over open rows),
//! so [`MetricStore::create_incident`] is atomic rather than
//! check-then-act.

pub mod engine;
pub mod error;

#[cfg(test)]
mod tests;

use chrono::{DateTime, Utc};
use error::Result;
use fleetmon_common::types::{Incident, Machine, MetricKind, MetricRecord};

/// Persistence backend for machines, metrics, and incidents.
///
/// Implementations must be safe to share across threads (`Send + Sync`)
/// because the store is accessed from the poll scheduler, the evaluation
/// workers, and the REST API concurrently.
pub trait MetricStore: Send + Sync {
    /// Registers a new machine. Fails if `url` is already registered.
    fn insert_machine(&self, name: &str, url: &str) -> Result<Machine>;

    /// Returns all registered machines.
    fn list_machines(&self) -> Result<Vec<Machine>>;

    fn get_machine(&self, id: &str) -> Result<Option<Machine>>;

    /// Deletes a machine and, by cascade, its metrics and incidents.
    /// Returns true if the machine existed.
    fn delete_machine(&self, id: &str) -> Result<bool>;

    /// Persists one metric reading. The record's timestamp is assigned
    /// here, at insert time.
    fn create_metric(
        &self,
        machine_id: &str,
        cpu: f64,
        mem: f64,
        disk: f64,
        uptime: &str,
    ) -> Result<MetricRecord>;

    fn get_metric(&self, id: &str) -> Result<Option<MetricRecord>>;

    fn count_metrics_for_machine(&self, machine_id: &str) -> Result<u64>;

    /// Returns the open incident for this (machine, kind), if any.
    fn find_open_incident(&self, machine_id: &str, kind: MetricKind) -> Result<Option<Incident>>;

    /// Returns the most recent incident of this kind whose `start_time`
    /// is at or after `since`, open or closed.
    fn find_incident_started_since(
        &self,
        machine_id: &str,
        kind: MetricKind,
        since: DateTime<Utc>,
    ) -> Result<Option<Incident>>;

    /// Opens an incident unless one is already open for this
    /// (machine, kind). Returns `None` in that case. The guard is a
    /// single atomic insert, so two racing callers cannot both open one.
    fn create_incident(
        &self,
        machine_id: &str,
        kind: MetricKind,
        value: f64,
    ) -> Result<Option<Incident>>;

    /// Closes an incident by setting its `end_time`. Returns true if the
    /// incident existed and was still open.
    fn close_incident(&self, incident_id: &str, end_time: DateTime<Utc>) -> Result<bool>;

    /// Returns all incidents, newest `start_time` first.
    fn list_incidents(&self) -> Result<Vec<Incident>>;
}
