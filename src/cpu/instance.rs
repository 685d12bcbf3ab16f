// One processor (or the "_Total" row): tick samplers fed from /proc/stat and
// the time percentages derived from their deltas.

use crate::entity::{EntityInstance, TOTAL_ID};
use crate::sampler::{DataSampler, SamplingPolicy};
use serde::Serialize;

/// Cumulative ticks from one `cpu`/`cpuN` row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuTicks {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
}

impl CpuTicks {
    pub fn total(&self) -> u64 {
        self.user
            .saturating_add(self.nice)
            .saturating_add(self.system)
            .saturating_add(self.iowait)
            .saturating_add(self.irq)
            .saturating_add(self.softirq)
            .saturating_add(self.idle)
    }
}

/// Parse one /proc/stat row. `cpu` maps to `None` (the total), `cpuN` to
/// `Some(N)`. Rows with fewer than four tick columns are rejected; kernels
/// without the iowait/irq/softirq columns report them as zero.
pub fn parse_stat_row(line: &str) -> Option<(Option<u32>, CpuTicks)> {
    let mut tokens = line.split_whitespace();
    let label = tokens.next()?;
    let suffix = label.strip_prefix("cpu")?;
    let number = if suffix.is_empty() {
        None
    } else {
        Some(suffix.parse::<u32>().ok()?)
    };

    let values: Vec<u64> = tokens.map_while(|t| t.parse().ok()).collect();
    if values.len() < 4 {
        tracing::error!(label = %label, columns = values.len() + 1, "too few columns in /proc/stat row");
        return None;
    }
    let mut ticks = CpuTicks {
        user: values[0],
        nice: values[1],
        system: values[2],
        idle: values[3],
        ..CpuTicks::default()
    };
    if values.len() >= 7 {
        ticks.iowait = values[4];
        ticks.irq = values[5];
        ticks.softirq = values[6];
    }
    Some((number, ticks))
}

/// `tic / total` as a rounded percentage capped at 100; with `inverse` the
/// share of the other ticks. Zero when no ticks elapsed.
pub fn percentage(tic_delta: u64, total_delta: u64, inverse: bool) -> u64 {
    if total_delta == 0 {
        return 0;
    }
    let tic = if inverse {
        total_delta.saturating_sub(tic_delta)
    } else {
        tic_delta
    };
    let pct = (tic as f64 / total_delta as f64) * 100.0 + 0.5;
    (pct as u64).min(100)
}

/// Time percentages over the sampling window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CpuTimes {
    pub processor_time: u64,
    pub idle_time: u64,
    pub user_time: u64,
    pub nice_time: u64,
    pub privileged_time: u64,
    pub iowait_time: u64,
    pub interrupt_time: u64,
    pub dpc_time: u64,
}

#[derive(Debug, Clone)]
struct TickSamplers {
    user: DataSampler<u64>,
    nice: DataSampler<u64>,
    system: DataSampler<u64>,
    idle: DataSampler<u64>,
    iowait: DataSampler<u64>,
    irq: DataSampler<u64>,
    softirq: DataSampler<u64>,
    total: DataSampler<u64>,
}

impl TickSamplers {
    fn new(capacity: usize) -> Self {
        Self {
            user: DataSampler::new(capacity),
            nice: DataSampler::new(capacity),
            system: DataSampler::new(capacity),
            idle: DataSampler::new(capacity),
            iowait: DataSampler::new(capacity),
            irq: DataSampler::new(capacity),
            softirq: DataSampler::new(capacity),
            total: DataSampler::new(capacity),
        }
    }

    fn all(&self) -> [&DataSampler<u64>; 8] {
        [
            &self.user,
            &self.nice,
            &self.system,
            &self.idle,
            &self.iowait,
            &self.irq,
            &self.softirq,
            &self.total,
        ]
    }
}

#[derive(Debug, Clone)]
pub struct CpuInstance {
    id: String,
    number: Option<u32>,
    policy: SamplingPolicy,
    samplers: TickSamplers,
    times: CpuTimes,
}

impl CpuInstance {
    pub fn new(number: u32, policy: SamplingPolicy) -> Self {
        Self {
            id: number.to_string(),
            number: Some(number),
            policy,
            samplers: TickSamplers::new(policy.samples),
            times: CpuTimes::default(),
        }
    }

    pub fn total(policy: SamplingPolicy) -> Self {
        Self {
            id: TOTAL_ID.to_string(),
            number: None,
            policy,
            samplers: TickSamplers::new(policy.samples),
            times: CpuTimes::default(),
        }
    }

    /// Processor number; `None` for the total.
    pub fn number(&self) -> Option<u32> {
        self.number
    }

    pub fn add_sample(&mut self, ticks: &CpuTicks) {
        let s = &mut self.samplers;
        s.user.push(ticks.user);
        s.nice.push(ticks.nice);
        s.system.push(ticks.system);
        s.idle.push(ticks.idle);
        s.iowait.push(ticks.iowait);
        s.irq.push(ticks.irq);
        s.softirq.push(ticks.softirq);
        s.total.push(ticks.total());
    }

    /// Recompute percentages from the tick deltas over the window.
    pub fn update(&mut self) {
        let n = self.policy.samples;
        // A counter reset (hotplug, suspend) makes every delta meaningless.
        if self.samplers.all().iter().any(|s| s.has_wrapped(n)) {
            tracing::debug!(cpu = %self.id, "tick counter went backwards, percentages reset");
            self.times = CpuTimes::default();
            return;
        }
        let s = &self.samplers;
        let total = s.total.delta(n);
        let idle = s.idle.delta(n);
        tracing::trace!(cpu = %self.id, total_ticks = total, samples = s.total.len(), "cpu update");
        self.times = CpuTimes {
            processor_time: percentage(idle, total, true),
            idle_time: percentage(idle, total, false),
            user_time: percentage(s.user.delta(n), total, false),
            nice_time: percentage(s.nice.delta(n), total, false),
            privileged_time: percentage(s.system.delta(n), total, false),
            iowait_time: percentage(s.iowait.delta(n), total, false),
            interrupt_time: percentage(s.irq.delta(n), total, false),
            dpc_time: percentage(s.softirq.delta(n), total, false),
        };
    }

    pub fn times(&self) -> CpuTimes {
        self.times
    }

    pub fn processor_time(&self) -> u64 {
        self.times.processor_time
    }

    pub fn idle_time(&self) -> u64 {
        self.times.idle_time
    }

    pub fn user_time(&self) -> u64 {
        self.times.user_time
    }

    pub fn privileged_time(&self) -> u64 {
        self.times.privileged_time
    }

    pub fn iowait_time(&self) -> u64 {
        self.times.iowait_time
    }

    /// Newest cumulative total ticks, 0 before the first sample.
    pub fn total_last_tick(&self) -> u64 {
        self.samplers.total.latest().unwrap_or(0)
    }
}

impl EntityInstance for CpuInstance {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_total(&self) -> bool {
        self.number.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_stat_row_reads_total_and_numbered_rows() {
        let (n, t) = parse_stat_row("cpu  10 20 30 40 50 60 70 0 0 0").unwrap();
        assert_eq!(n, None);
        assert_eq!(t.total(), 280);
        let (n, t) = parse_stat_row("cpu3 1 2 3 4").unwrap();
        assert_eq!(n, Some(3));
        assert_eq!(t.iowait, 0);
        assert_eq!(t.total(), 10);
    }

    #[test]
    fn parse_stat_row_rejects_other_rows() {
        assert!(parse_stat_row("intr 12345 0 0").is_none());
        assert!(parse_stat_row("cpu 1 2").is_none());
        assert!(parse_stat_row("cpux 1 2 3 4").is_none());
    }

    #[test]
    fn percentage_rounds_and_caps() {
        assert_eq!(percentage(1, 3, false), 33);
        assert_eq!(percentage(2, 3, false), 67);
        assert_eq!(percentage(25, 100, true), 75);
        assert_eq!(percentage(200, 100, false), 100);
        assert_eq!(percentage(0, 0, true), 0);
    }
}
