use crate::error::{Result, StorageError};
use crate::MetricStore;
use chrono::{DateTime, Utc};
use fleetmon_common::id;
use fleetmon_common::types::{Incident, Machine, MetricKind, MetricRecord};
use rusqlite::{Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS machines (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    url TEXT NOT NULL UNIQUE
);
CREATE TABLE IF NOT EXISTS metrics (
    id TEXT PRIMARY KEY,
    machine_id TEXT NOT NULL REFERENCES machines(id) ON DELETE CASCADE,
    cpu REAL NOT NULL,
    mem REAL NOT NULL,
    disk REAL NOT NULL,
    uptime TEXT NOT NULL,
    timestamp INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_metrics_machine_time
    ON metrics(machine_id, timestamp);
CREATE TABLE IF NOT EXISTS incidents (
    id TEXT PRIMARY KEY,
    machine_id TEXT NOT NULL REFERENCES machines(id) ON DELETE CASCADE,
    kind TEXT NOT NULL,
    value REAL NOT NULL,
    start_time INTEGER NOT NULL,
    end_time INTEGER
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_incidents_one_open
    ON incidents(machine_id, kind) WHERE end_time IS NULL;
CREATE INDEX IF NOT EXISTS idx_incidents_start ON incidents(start_time);
";

/// Machine uptime is free-form text from the polled endpoint; longer
/// values are truncated rather than rejected.
const MAX_UPTIME_CHARS: usize = 50;

pub struct SqliteMetricStore {
    conn: Mutex<Connection>,
}

impl SqliteMetricStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| StorageError::Other(format!("create data dir: {e}")))?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        conn.execute_batch(SCHEMA)?;
        tracing::info!(path = %path.display(), "Opened metric store");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Lock the connection, recovering from a poisoned Mutex if necessary.
    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn map_machine(row: &Row<'_>) -> rusqlite::Result<Machine> {
    Ok(Machine {
        id: row.get(0)?,
        name: row.get(1)?,
        url: row.get(2)?,
    })
}

fn map_metric(row: &Row<'_>) -> rusqlite::Result<MetricRecord> {
    let ts_ms: i64 = row.get(6)?;
    Ok(MetricRecord {
        id: row.get(0)?,
        machine_id: row.get(1)?,
        cpu: row.get(2)?,
        mem: row.get(3)?,
        disk: row.get(4)?,
        uptime: row.get(5)?,
        timestamp: DateTime::from_timestamp_millis(ts_ms).unwrap_or_default(),
    })
}

impl MetricStore for SqliteMetricStore {
    fn insert_machine(&self, name: &str, url: &str) -> Result<Machine> {
        let machine = Machine {
            id: id::next_id(),
            name: name.to_string(),
            url: url.to_string(),
        };
        let conn = self.lock();
        conn.execute(
            "INSERT INTO machines (id, name, url) VALUES (?1, ?2, ?3)",
            rusqlite::params![&machine.id, &machine.name, &machine.url],
        )?;
        Ok(machine)
    }

    fn list_machines(&self) -> Result<Vec<Machine>> {
        let conn = self.lock();
        let mut stmt = conn.prepare_cached("SELECT id, name, url FROM machines ORDER BY name")?;
        let rows = stmt.query_map([], map_machine)?;
        let mut machines = Vec::new();
        for row in rows {
            machines.push(row?);
        }
        Ok(machines)
    }

    fn get_machine(&self, id: &str) -> Result<Option<Machine>> {
        let conn = self.lock();
        let machine = conn
            .query_row(
                "SELECT id, name, url FROM machines WHERE id = ?1",
                [id],
                map_machine,
            )
            .optional()?;
        Ok(machine)
    }

    fn delete_machine(&self, id: &str) -> Result<bool> {
        let conn = self.lock();
        let deleted = conn.execute("DELETE FROM machines WHERE id = ?1", [id])?;
        Ok(deleted > 0)
    }

    fn create_metric(
        &self,
        machine_id: &str,
        cpu: f64,
        mem: f64,
        disk: f64,
        uptime: &str,
    ) -> Result<MetricRecord> {
        let uptime: String = uptime.chars().take(MAX_UPTIME_CHARS).collect();
        let metric = MetricRecord {
            id: id::next_id(),
            machine_id: machine_id.to_string(),
            cpu,
            mem,
            disk,
            uptime,
            timestamp: Utc::now(),
        };
        let conn = self.lock();
        let mut stmt = conn.prepare_cached(
            "INSERT INTO metrics (id, machine_id, cpu, mem, disk, uptime, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )?;
        stmt.execute(rusqlite::params![
            &metric.id,
            &metric.machine_id,
            metric.cpu,
            metric.mem,
            metric.disk,
            &metric.uptime,
            metric.timestamp.timestamp_millis(),
        ])?;
        Ok(metric)
    }

    fn get_metric(&self, id: &str) -> Result<Option<MetricRecord>> {
        let conn = self.lock();
        let metric = conn
            .query_row(
                "SELECT id, machine_id, cpu, mem, disk, uptime, timestamp
                 FROM metrics WHERE id = ?1",
                [id],
                map_metric,
            )
            .optional()?;
        Ok(metric)
    }

    fn count_metrics_for_machine(&self, machine_id: &str) -> Result<u64> {
        let conn = self.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM metrics WHERE machine_id = ?1",
            [machine_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn find_open_incident(&self, machine_id: &str, kind: MetricKind) -> Result<Option<Incident>> {
        let conn = self.lock();
        let row = conn
            .query_row(
                "SELECT id, machine_id, kind, value, start_time, end_time
                 FROM incidents
                 WHERE machine_id = ?1 AND kind = ?2 AND end_time IS NULL",
                rusqlite::params![machine_id, kind.to_string()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, f64>(3)?,
                        row.get::<_, i64>(4)?,
                        row.get::<_, Option<i64>>(5)?,
                    ))
                },
            )
            .optional()?;
        row.map(incident_from_tuple).transpose()
    }

    fn find_incident_started_since(
        &self,
        machine_id: &str,
        kind: MetricKind,
        since: DateTime<Utc>,
    ) -> Result<Option<Incident>> {
        let conn = self.lock();
        let row = conn
            .query_row(
                "SELECT id, machine_id, kind, value, start_time, end_time
                 FROM incidents
                 WHERE machine_id = ?1 AND kind = ?2 AND start_time >= ?3
                 ORDER BY start_time DESC LIMIT 1",
                rusqlite::params![machine_id, kind.to_string(), since.timestamp_millis()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, f64>(3)?,
                        row.get::<_, i64>(4)?,
                        row.get::<_, Option<i64>>(5)?,
                    ))
                },
            )
            .optional()?;
        row.map(incident_from_tuple).transpose()
    }

    fn create_incident(
        &self,
        machine_id: &str,
        kind: MetricKind,
        value: f64,
    ) -> Result<Option<Incident>> {
        let incident = Incident {
            id: id::next_id(),
            machine_id: machine_id.to_string(),
            kind,
            value,
            start_time: Utc::now(),
            end_time: None,
        };
        let conn = self.lock();
        // The partial unique index over open rows turns this into an
        // atomic conditional insert: if an open incident already exists
        // for this (machine, kind), the insert is ignored.
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO incidents (id, machine_id, kind, value, start_time, end_time)
             VALUES (?1, ?2, ?3, ?4, ?5, NULL)",
            rusqlite::params![
                &incident.id,
                &incident.machine_id,
                incident.kind.to_string(),
                incident.value,
                incident.start_time.timestamp_millis(),
            ],
        )?;
        if inserted == 0 {
            return Ok(None);
        }
        Ok(Some(incident))
    }

    fn close_incident(&self, incident_id: &str, end_time: DateTime<Utc>) -> Result<bool> {
        let conn = self.lock();
        let updated = conn.execute(
            "UPDATE incidents SET end_time = ?1 WHERE id = ?2 AND end_time IS NULL",
            rusqlite::params![end_time.timestamp_millis(), incident_id],
        )?;
        Ok(updated > 0)
    }

    fn list_incidents(&self) -> Result<Vec<Incident>> {
        let conn = self.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT id, machine_id, kind, value, start_time, end_time
             FROM incidents ORDER BY start_time DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, f64>(3)?,
                row.get::<_, i64>(4)?,
                row.get::<_, Option<i64>>(5)?,
            ))
        })?;
        let mut incidents = Vec::new();
        for row in rows {
            incidents.push(incident_from_tuple(row?)?);
        }
        Ok(incidents)
    }
}

fn incident_from_tuple(
    (id, machine_id, kind_str, value, start_ms, end_ms): (
        String,
        String,
        String,
        f64,
        i64,
        Option<i64>,
    ),
) -> Result<Incident> {
    let kind: MetricKind =
        kind_str
            .parse()
            .map_err(|_| StorageError::UnexpectedColumnType {
                column: "kind",
                expected: "CPU | MEM | DISK",
            })?;
    Ok(Incident {
        id,
        machine_id,
        kind,
        value,
        start_time: DateTime::from_timestamp_millis(start_ms).unwrap_or_default(),
        end_time: end_ms.and_then(DateTime::from_timestamp_millis),
    })
}
