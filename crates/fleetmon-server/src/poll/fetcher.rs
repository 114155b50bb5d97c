use fleetmon_common::types::Machine;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

/// Canonical metrics reading parsed from a machine's endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct MachineMetrics {
    pub cpu: f64,
    pub mem: f64,
    pub disk: f64,
    pub uptime: String,
}

/// Why a fetch produced no metric. None of these escapes the poll cycle;
/// the scheduler logs them per machine and moves on.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Connection failure, timeout, or other transport error.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The endpoint answered with a non-2xx status.
    #[error("unexpected status {0}")]
    Status(reqwest::StatusCode),

    /// The body was not the expected JSON shape.
    #[error("malformed payload: {0}")]
    Malformed(String),
}

/// Expected body: `{"cpu": <number|string>, "mem": "<n>%", "disk": "<n>%",
/// "uptime": "<text>"}`.
#[derive(Deserialize)]
struct RawPayload {
    cpu: Value,
    mem: String,
    disk: String,
    uptime: String,
}

/// Fetch and parse one machine's metrics. Every failure mode comes back
/// as a [`FetchError`]; this function never panics on remote input.
pub async fn fetch_metrics(
    client: &reqwest::Client,
    machine: &Machine,
    timeout: Duration,
) -> Result<MachineMetrics, FetchError> {
    tracing::debug!(machine = %machine.name, url = %machine.url, "Fetching metrics");

    let response = client.get(&machine.url).timeout(timeout).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status(status));
    }

    let body = response.bytes().await?;
    parse_payload(&body)
}

pub fn parse_payload(body: &[u8]) -> Result<MachineMetrics, FetchError> {
    let raw: RawPayload =
        serde_json::from_slice(body).map_err(|e| FetchError::Malformed(e.to_string()))?;

    let cpu = match &raw.cpu {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| FetchError::Malformed(format!("cpu: not a finite number: {n}")))?,
        Value::String(s) => parse_float(s, "cpu")?,
        other => {
            return Err(FetchError::Malformed(format!(
                "cpu: expected number or string, got {other}"
            )))
        }
    };
    let mem = parse_percent(&raw.mem, "mem")?;
    let disk = parse_percent(&raw.disk, "disk")?;

    Ok(MachineMetrics {
        cpu,
        mem,
        disk,
        uptime: raw.uptime,
    })
}

/// Strip an optional trailing `%` before the float conversion, so both
/// `"67.8%"` and `"45.2"` parse.
fn parse_percent(s: &str, field: &'static str) -> Result<f64, FetchError> {
    parse_float(s.trim().trim_end_matches('%'), field)
}

fn parse_float(s: &str, field: &'static str) -> Result<f64, FetchError> {
    s.trim()
        .parse()
        .map_err(|_| FetchError::Malformed(format!("{field}: not a number: {s:?}")))
}
