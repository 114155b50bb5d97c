use fleetmon_incident::{Threshold, ThresholdConfig};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default = "default_db_path")]
    pub db_path: String,

    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub thresholds: ThresholdsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    /// Seconds between poll cycles.
    #[serde(default = "default_poll_interval_secs")]
    pub interval_secs: u64,
    /// Per-machine fetch timeout in seconds.
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    /// Maximum concurrent fetches within one cycle.
    #[serde(default = "default_poll_max_concurrent")]
    pub max_concurrent: usize,
    /// Maximum concurrent incident evaluations.
    #[serde(default = "default_eval_workers")]
    pub eval_workers: usize,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_poll_interval_secs(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            max_concurrent: default_poll_max_concurrent(),
            eval_workers: default_eval_workers(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdsConfig {
    #[serde(default = "default_cpu_percent")]
    pub cpu_percent: f64,
    #[serde(default = "default_cpu_cooldown_mins")]
    pub cpu_cooldown_mins: i64,
    #[serde(default = "default_mem_percent")]
    pub mem_percent: f64,
    #[serde(default = "default_mem_cooldown_mins")]
    pub mem_cooldown_mins: i64,
    #[serde(default = "default_disk_percent")]
    pub disk_percent: f64,
    #[serde(default = "default_disk_cooldown_mins")]
    pub disk_cooldown_mins: i64,
}

impl Default for ThresholdsConfig {
    fn default() -> Self {
        Self {
            cpu_percent: default_cpu_percent(),
            cpu_cooldown_mins: default_cpu_cooldown_mins(),
            mem_percent: default_mem_percent(),
            mem_cooldown_mins: default_mem_cooldown_mins(),
            disk_percent: default_disk_percent(),
            disk_cooldown_mins: default_disk_cooldown_mins(),
        }
    }
}

impl ThresholdsConfig {
    pub fn to_threshold_config(&self) -> ThresholdConfig {
        ThresholdConfig {
            cpu: Threshold {
                value: self.cpu_percent,
                cooldown_mins: self.cpu_cooldown_mins,
            },
            mem: Threshold {
                value: self.mem_percent,
                cooldown_mins: self.mem_cooldown_mins,
            },
            disk: Threshold {
                value: self.disk_percent,
                cooldown_mins: self.disk_cooldown_mins,
            },
        }
    }
}

// ---- Seed file types (used by the `init-machines` CLI subcommand) ----

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineSeedFile {
    #[serde(default)]
    pub machines: Vec<SeedMachine>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedMachine {
    pub name: String,
    pub url: String,
}

fn default_http_port() -> u16 {
    8080
}

fn default_db_path() -> String {
    "data/fleetmon.db".to_string()
}

fn default_poll_interval_secs() -> u64 {
    900 // Poll the fleet every 15 minutes
}

fn default_fetch_timeout_secs() -> u64 {
    5
}

fn default_poll_max_concurrent() -> usize {
    10
}

fn default_eval_workers() -> usize {
    4
}

fn default_cpu_percent() -> f64 {
    85.0
}

fn default_cpu_cooldown_mins() -> i64 {
    0
}

fn default_mem_percent() -> f64 {
    90.0
}

fn default_mem_cooldown_mins() -> i64 {
    30
}

fn default_disk_percent() -> f64 {
    95.0
}

fn default_disk_cooldown_mins() -> i64 {
    120
}

impl ServerConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }
}
