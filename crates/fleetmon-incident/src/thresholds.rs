use fleetmon_common::types::MetricKind;

/// Trigger sensitivity for one metric kind.
///
/// `cooldown_mins == 0` selects the immediate policy: a single sample over
/// `value` opens an incident. A positive cooldown selects the sustained
/// policy: a new incident is only opened if none of this kind started
/// within the last `cooldown_mins` minutes, which debounces flapping
/// metrics. The cooldown never delays closing.
#[derive(Debug, Clone, Copy)]
pub struct Threshold {
    pub value: f64,
    pub cooldown_mins: i64,
}

/// Per-kind thresholds, fixed for the lifetime of the evaluator.
#[derive(Debug, Clone, Copy)]
pub struct ThresholdConfig {
    pub cpu: Threshold,
    pub mem: Threshold,
    pub disk: Threshold,
}

impl ThresholdConfig {
    pub fn for_kind(&self, kind: MetricKind) -> Threshold {
        match kind {
            MetricKind::Cpu => self.cpu,
            MetricKind::Mem => self.mem,
            MetricKind::Disk => self.disk,
        }
    }
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            cpu: Threshold {
                value: 85.0,
                cooldown_mins: 0,
            },
            mem: Threshold {
                value: 90.0,
                cooldown_mins: 30,
            },
            disk: Threshold {
                value: 95.0,
                cooldown_mins: 120,
            },
        }
    }
}
