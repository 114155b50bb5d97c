use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered machine to poll for resource metrics.
///
/// Machines are created by the `init-machines` seed command and are
/// immutable afterwards. Deleting a machine cascades to its metrics
/// and incidents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Machine {
    pub id: String,
    pub name: String,
    /// Metrics endpoint, unique across the fleet.
    pub url: String,
}

/// One successful metrics reading from a machine.
///
/// `timestamp` is assigned by the store at insert time, never taken from
/// the polled machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricRecord {
    pub id: String,
    pub machine_id: String,
    pub cpu: f64,
    pub mem: f64,
    pub disk: f64,
    pub uptime: String,
    pub timestamp: DateTime<Utc>,
}

/// The resource dimension an incident is about.
///
/// # Examples
///
/// ```
/// use fleetmon_common::types::MetricKind;
///
/// let kind: MetricKind = "CPU".parse().unwrap();
/// assert_eq!(kind, MetricKind::Cpu);
/// assert_eq!(kind.to_string(), "CPU");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MetricKind {
    Cpu,
    Mem,
    Disk,
}

impl MetricKind {
    pub const ALL: [MetricKind; 3] = [MetricKind::Cpu, MetricKind::Mem, MetricKind::Disk];
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricKind::Cpu => write!(f, "CPU"),
            MetricKind::Mem => write!(f, "MEM"),
            MetricKind::Disk => write!(f, "DISK"),
        }
    }
}

impl std::str::FromStr for MetricKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "CPU" => Ok(MetricKind::Cpu),
            "MEM" => Ok(MetricKind::Mem),
            "DISK" => Ok(MetricKind::Disk),
            _ => Err(format!("unknown metric kind: {s}")),
        }
    }
}

/// A threshold breach for one (machine, kind) pair.
///
/// Open while `end_time` is `None`. The store guarantees at most one
/// open incident per (machine, kind) at any time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Incident {
    pub id: String,
    pub machine_id: String,
    pub kind: MetricKind,
    /// The sample value that triggered the incident.
    pub value: f64,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

impl Incident {
    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }
}
