// One process (or the "_Total" row): identity and memory read from
// /proc/<pid>/stat and status, plus cpu-time and hard-fault samplers.

use crate::entity::{EntityInstance, TOTAL_ID};
use crate::error::PalError;
use crate::sampler::{DataSampler, SamplingPolicy};
use serde::Serialize;
use std::str::FromStr;

/// USER_HZ, the unit of every tick count in /proc.
pub const CLOCK_TICKS_PER_SECOND: u64 = 100;

// Fields after the command in /proc/<pid>/stat, up to and including rss.
const STAT_FIELDS_AFTER_COMMAND: usize = 22;

/// The parts of /proc/<pid>/stat the agent reports.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcStat {
    pub pid: u32,
    pub command: String,
    pub state: char,
    pub parent_pid: u32,
    pub process_group: i64,
    pub session: i64,
    pub major_faults: u64,
    pub user_ticks: u64,
    pub system_ticks: u64,
    pub priority: i64,
    pub nice: i64,
    pub threads: u64,
    pub start_ticks: u64,
    pub virtual_bytes: u64,
}

fn field<T: FromStr>(fields: &[&str], index: usize, name: &str) -> Result<T, PalError> {
    fields
        .get(index)
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| PalError::InternalError(format!("unparsable {} in /proc/<pid>/stat", name)))
}

/// Parse one /proc/<pid>/stat line. The command sits between the first '('
/// and the last ')', so names holding parentheses or spaces survive.
pub fn parse_stat(content: &str) -> Result<ProcStat, PalError> {
    let (Some(open), Some(close)) = (content.find('('), content.rfind(')')) else {
        return Err(PalError::InternalError("no command in /proc/<pid>/stat".into()));
    };
    if close < open {
        return Err(PalError::InternalError("no command in /proc/<pid>/stat".into()));
    }
    let pid = content[..open]
        .trim()
        .parse()
        .map_err(|_| PalError::InternalError("unparsable pid in /proc/<pid>/stat".into()))?;
    let fields: Vec<&str> = content[close + 1..].split_whitespace().collect();
    if fields.len() < STAT_FIELDS_AFTER_COMMAND {
        return Err(PalError::InternalError(format!(
            "expected at least {} fields after the command in /proc/{}/stat, got {}",
            STAT_FIELDS_AFTER_COMMAND,
            pid,
            fields.len()
        )));
    }
    Ok(ProcStat {
        pid,
        command: content[open + 1..close].to_string(),
        state: fields[0].chars().next().unwrap_or('?'),
        parent_pid: field(&fields, 1, "ppid")?,
        process_group: field(&fields, 2, "pgrp")?,
        session: field(&fields, 3, "session")?,
        major_faults: field(&fields, 9, "majflt")?,
        user_ticks: field(&fields, 11, "utime")?,
        system_ticks: field(&fields, 12, "stime")?,
        priority: field(&fields, 15, "priority")?,
        nice: field(&fields, 16, "nice")?,
        threads: field(&fields, 17, "num_threads")?,
        start_ticks: field(&fields, 19, "starttime")?,
        virtual_bytes: field(&fields, 20, "vsize")?,
    })
}

/// The parts of /proc/<pid>/status the agent reports. Kernel threads and
/// zombies have no Vm* lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcStatus {
    pub name: Option<String>,
    pub real_uid: Option<u32>,
    pub real_gid: Option<u32>,
    pub vm_size_kb: Option<u64>,
    pub vm_rss_kb: Option<u64>,
}

pub fn parse_status(content: &str) -> ProcStatus {
    let mut status = ProcStatus::default();
    for line in content.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let first = value.split_whitespace().next();
        match key {
            "Name" => status.name = Some(value.trim().to_string()),
            "Uid" => status.real_uid = first.and_then(|v| v.parse().ok()),
            "Gid" => status.real_gid = first.and_then(|v| v.parse().ok()),
            "VmSize" => status.vm_size_kb = first.and_then(|v| v.parse().ok()),
            "VmRSS" => status.vm_rss_kb = first.and_then(|v| v.parse().ok()),
            _ => {}
        }
    }
    status
}

/// Map a Linux scheduling priority onto the agent's 0..=31 scale, higher
/// meaning more urgent. Realtime priorities (-2..=-100) land in 16..=31.
pub fn scx_priority(linux: i64) -> Option<u32> {
    if !(-100..=39).contains(&linux) || linux == -1 {
        return None;
    }
    let mapped = if linux < -1 {
        16 + ((-linux - 2) * 15) / 98
    } else {
        ((39 - linux) * 15) / 39
    };
    u32::try_from(mapped).ok()
}

/// Rates over the sampling window. On the total they are sums over every process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessTimes {
    pub percent_user_time: u64,
    pub percent_privileged_time: u64,
    pub hard_faults_per_second: u64,
}

#[derive(Debug, Clone)]
pub struct ProcessInstance {
    id: String,
    pid: Option<u32>,
    policy: SamplingPolicy,
    stat: ProcStat,
    status: ProcStatus,
    user_ticks: DataSampler<u64>,
    system_ticks: DataSampler<u64>,
    major_faults: DataSampler<u64>,
    times: ProcessTimes,
    process_count: usize,
    resident_bytes_sum: u64,
}

impl ProcessInstance {
    pub fn new(pid: u32, policy: SamplingPolicy) -> Self {
        Self::with_id(pid.to_string(), Some(pid), policy)
    }

    pub fn total(policy: SamplingPolicy) -> Self {
        Self::with_id(TOTAL_ID.to_string(), None, policy)
    }

    fn with_id(id: String, pid: Option<u32>, policy: SamplingPolicy) -> Self {
        Self {
            id,
            pid,
            policy,
            stat: ProcStat::default(),
            status: ProcStatus::default(),
            user_ticks: DataSampler::new(policy.samples),
            system_ticks: DataSampler::new(policy.samples),
            major_faults: DataSampler::new(policy.samples),
            times: ProcessTimes::default(),
            process_count: 0,
            resident_bytes_sum: 0,
        }
    }

    /// `None` for the total.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Replace the identity and memory fields with a fresh read.
    pub fn record(&mut self, stat: ProcStat, status: ProcStatus) {
        self.stat = stat;
        self.status = status;
    }

    /// Push the counters of the last read into the samplers.
    pub fn add_sample(&mut self) {
        self.user_ticks.push(self.stat.user_ticks);
        self.system_ticks.push(self.stat.system_ticks);
        self.major_faults.push(self.stat.major_faults);
    }

    // Share of one cpu spent in ticks counted by `sampler`, over the window.
    fn percent_of_cpu(&self, sampler: &DataSampler<u64>) -> u64 {
        let n = self.policy.samples;
        if sampler.has_wrapped(n) {
            return 0;
        }
        let per_second = CLOCK_TICKS_PER_SECOND.saturating_mul(self.policy.seconds_per_sample.max(1));
        sampler.average_delta_factored(n, 100) / per_second
    }

    /// Recompute rates from the samplers.
    pub fn update(&mut self) {
        self.times = ProcessTimes {
            percent_user_time: self.percent_of_cpu(&self.user_ticks),
            percent_privileged_time: self.percent_of_cpu(&self.system_ticks),
            hard_faults_per_second: self.policy.rate(&self.major_faults),
        };
    }

    /// Total only: set the sums over the current processes.
    pub fn aggregate(&mut self, times: ProcessTimes, process_count: usize, resident_bytes: u64) {
        self.times = times;
        self.process_count = process_count;
        self.resident_bytes_sum = resident_bytes;
    }

    pub fn times(&self) -> ProcessTimes {
        self.times
    }

    /// Processes summed into the total; 0 on a single process.
    pub fn process_count(&self) -> usize {
        self.process_count
    }

    /// Name from status, falling back to the (possibly truncated) stat command.
    pub fn name(&self) -> &str {
        self.status.name.as_deref().unwrap_or(&self.stat.command)
    }

    pub fn state(&self) -> char {
        self.stat.state
    }

    pub fn parent_pid(&self) -> u32 {
        self.stat.parent_pid
    }

    pub fn process_group(&self) -> i64 {
        self.stat.process_group
    }

    pub fn session(&self) -> i64 {
        self.stat.session
    }

    pub fn real_uid(&self) -> Option<u32> {
        self.status.real_uid
    }

    pub fn real_gid(&self) -> Option<u32> {
        self.status.real_gid
    }

    pub fn priority(&self) -> Option<u32> {
        scx_priority(self.stat.priority)
    }

    pub fn nice(&self) -> i64 {
        self.stat.nice
    }

    pub fn threads(&self) -> u64 {
        self.stat.threads
    }

    /// Seconds after boot the process started.
    pub fn start_seconds(&self) -> u64 {
        self.stat.start_ticks / CLOCK_TICKS_PER_SECOND
    }

    pub fn user_seconds(&self) -> u64 {
        self.stat.user_ticks / CLOCK_TICKS_PER_SECOND
    }

    pub fn system_seconds(&self) -> u64 {
        self.stat.system_ticks / CLOCK_TICKS_PER_SECOND
    }

    pub fn virtual_bytes(&self) -> u64 {
        self.stat.virtual_bytes
    }

    /// Resident set; on the total the sum over every process.
    pub fn resident_bytes(&self) -> Option<u64> {
        if self.pid.is_none() {
            return Some(self.resident_bytes_sum);
        }
        self.status.vm_rss_kb.map(|kb| kb.saturating_mul(1024))
    }
}

impl EntityInstance for ProcessInstance {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_total(&self) -> bool {
        self.pid.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STAT: &str = "1234 (tmux: server) S 1 1234 1234 0 -1 4194624 3151 0 12 0 \
                        450 120 0 0 20 0 1 0 98765 25128960 1080 18446744073709551615";

    #[test]
    fn parse_stat_keeps_spaces_in_command() {
        let stat = parse_stat(STAT).unwrap();
        assert_eq!(stat.pid, 1234);
        assert_eq!(stat.command, "tmux: server");
        assert_eq!(stat.state, 'S');
        assert_eq!(stat.parent_pid, 1);
        assert_eq!(stat.major_faults, 12);
        assert_eq!(stat.user_ticks, 450);
        assert_eq!(stat.system_ticks, 120);
        assert_eq!(stat.priority, 20);
        assert_eq!(stat.threads, 1);
        assert_eq!(stat.start_ticks, 98765);
        assert_eq!(stat.virtual_bytes, 25128960);
    }

    #[test]
    fn parse_stat_uses_last_closing_parenthesis() {
        let line = "77 (a) b(c)) R 2 77 77 0 -1 0 0 0 0 0 5 6 0 0 -51 0 3 0 10 4096 1";
        let stat = parse_stat(line).unwrap();
        assert_eq!(stat.command, "a) b(c)");
        assert_eq!(stat.state, 'R');
        assert_eq!(stat.priority, -51);
        assert_eq!(stat.threads, 3);
    }

    #[test]
    fn parse_stat_rejects_short_or_unnamed_lines() {
        assert!(matches!(parse_stat("12 (x) S 1 2"), Err(PalError::InternalError(_))));
        assert!(matches!(parse_stat("12 x S 1 2"), Err(PalError::InternalError(_))));
        assert!(matches!(parse_stat(""), Err(PalError::InternalError(_))));
    }

    #[test]
    fn parse_status_reads_real_ids_and_memory() {
        let status = parse_status(
            "Name:\tsshd\nState:\tS (sleeping)\nUid:\t1000\t0\t0\t0\nGid:\t100\t100\t100\t100\n\
             VmSize:\t   14532 kB\nVmRSS:\t    6012 kB\nThreads:\t1\n",
        );
        assert_eq!(status.name.as_deref(), Some("sshd"));
        assert_eq!(status.real_uid, Some(1000));
        assert_eq!(status.real_gid, Some(100));
        assert_eq!(status.vm_size_kb, Some(14532));
        assert_eq!(status.vm_rss_kb, Some(6012));

        let kernel_thread = parse_status("Name:\tkworker/0:1\nUid:\t0\t0\t0\t0\n");
        assert_eq!(kernel_thread.vm_rss_kb, None);
    }

    #[test]
    fn priority_mapping() {
        assert_eq!(scx_priority(39), Some(0));
        assert_eq!(scx_priority(20), Some(7));
        assert_eq!(scx_priority(0), Some(15));
        assert_eq!(scx_priority(-2), Some(16));
        assert_eq!(scx_priority(-100), Some(31));
        assert_eq!(scx_priority(-1), None);
        assert_eq!(scx_priority(40), None);
        assert_eq!(scx_priority(-101), None);
    }

    #[test]
    fn percentages_come_from_tick_deltas() {
        let mut p = ProcessInstance::new(5, SamplingPolicy::new(3, 10));
        for (user, system, faults) in [(0, 0, 0), (500, 100, 20), (1000, 200, 40)] {
            p.record(
                ProcStat {
                    user_ticks: user,
                    system_ticks: system,
                    major_faults: faults,
                    ..ProcStat::default()
                },
                ProcStatus::default(),
            );
            p.add_sample();
        }
        p.update();
        // 500 ticks per 10 s sample is half a cpu.
        assert_eq!(p.times().percent_user_time, 50);
        assert_eq!(p.times().percent_privileged_time, 10);
        assert_eq!(p.times().hard_faults_per_second, 2);
        assert_eq!(p.user_seconds(), 10);
    }

    #[test]
    fn wrapped_ticks_report_zero() {
        let mut p = ProcessInstance::new(5, SamplingPolicy::new(3, 10));
        for user in [1000, 10] {
            p.record(
                ProcStat {
                    user_ticks: user,
                    ..ProcStat::default()
                },
                ProcStatus::default(),
            );
            p.add_sample();
        }
        p.update();
        assert_eq!(p.times().percent_user_time, 0);
    }
}
