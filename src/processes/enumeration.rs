use super::depend::{ProcessDepend, process_vanished};
use super::instance::{ProcStat, ProcStatus, ProcessInstance, ProcessTimes, parse_stat, parse_status};
use crate::entity::{EntityEnumeration, EntityInstance, Handle, SampleSource, lock};
use crate::error::PalError;
use crate::log_suppressor::LogSuppressor;
use crate::sampler::SamplingPolicy;
use std::collections::BTreeSet;
use std::sync::{Arc, LazyLock};
use tracing::{Level, instrument};

static LIST_SUPPRESSOR: LazyLock<LogSuppressor> =
    LazyLock::new(|| LogSuppressor::new(Level::WARN, Level::TRACE));
static READ_SUPPRESSOR: LazyLock<LogSuppressor> =
    LazyLock::new(|| LogSuppressor::new(Level::WARN, Level::TRACE));

pub struct ProcessEnumeration {
    deps: Arc<dyn ProcessDepend>,
    policy: SamplingPolicy,
    processes: EntityEnumeration<ProcessInstance>,
}

impl ProcessEnumeration {
    pub fn new(deps: Arc<dyn ProcessDepend>, policy: SamplingPolicy) -> Self {
        Self {
            deps,
            policy,
            processes: EntityEnumeration::new(),
        }
    }

    pub fn init(&mut self) {
        self.processes.set_total(ProcessInstance::total(self.policy));
        self.update(false);
    }

    /// `Ok(None)` when the process exited before its files could be read.
    /// A missing status file degrades to empty status fields.
    fn read(&self, pid: u32) -> Result<Option<(ProcStat, ProcStatus)>, PalError> {
        let stat = match self.deps.read_proc_file(pid, "stat") {
            Ok(content) => parse_stat(&content)?,
            Err(e) if process_vanished(&e) => return Ok(None),
            Err(e) => return Err(e),
        };
        let status = match self.deps.read_proc_file(pid, "status") {
            Ok(content) => parse_status(&content),
            Err(e) if process_vanished(&e) => return Ok(None),
            Err(e) => {
                READ_SUPPRESSOR.log(
                    "StatusUnreadable",
                    &format!("unable to read status of process {}: {}", pid, e),
                );
                ProcStatus::default()
            }
        };
        Ok(Some((stat, status)))
    }

    // Re-read every listed process; with `sample`, also push its counters.
    // Processes that exited are dropped.
    fn refresh(&mut self, sample: bool) {
        let mut vanished = Vec::new();
        for handle in self.processes.iter() {
            let mut process = lock(handle);
            let Some(pid) = process.pid() else {
                continue;
            };
            match self.read(pid) {
                Ok(Some((stat, status))) => {
                    process.record(stat, status);
                    if sample {
                        process.add_sample();
                    }
                }
                Ok(None) => vanished.push(process.id().to_string()),
                Err(e) => READ_SUPPRESSOR.log(
                    "StatUnreadable",
                    &format!("unable to read statistics of process {}: {}", pid, e),
                ),
            }
        }
        for id in vanished {
            tracing::debug!(pid = %id, "process exited");
            self.processes.remove(&id);
        }
    }

    /// Without `update_instances`, add processes that started and drop those
    /// that exited. With it, re-read every process and recompute the rates
    /// and the total.
    #[instrument(skip(self), fields(subsystem = "processes", operation = "update"))]
    pub fn update(&mut self, update_instances: bool) {
        if update_instances {
            self.refresh(false);
            for handle in self.processes.iter() {
                lock(handle).update();
            }
            self.update_total();
            return;
        }

        let pids: BTreeSet<u32> = match self.deps.list_pids() {
            Ok(pids) => pids.into_iter().collect(),
            Err(e) => {
                LIST_SUPPRESSOR.log("ListFailed", &format!("unable to list processes: {}", e));
                return;
            }
        };
        self.processes
            .retain(|p| p.pid().is_some_and(|pid| pids.contains(&pid)));
        let known: BTreeSet<u32> = self.processes.iter().filter_map(|h| lock(h).pid()).collect();
        for pid in pids.difference(&known).copied() {
            match self.read(pid) {
                Ok(Some((stat, status))) => {
                    let mut process = ProcessInstance::new(pid, self.policy);
                    process.record(stat, status);
                    process.add_sample();
                    tracing::trace!(pid, name = %process.name(), "adding process");
                    self.processes.add(process);
                }
                Ok(None) => {}
                Err(e) => READ_SUPPRESSOR.log(
                    "StatUnreadable",
                    &format!("unable to read statistics of process {}: {}", pid, e),
                ),
            }
        }
        self.update_total();
    }

    fn update_total(&self) {
        let Some(total) = self.processes.total() else {
            return;
        };
        let mut times = ProcessTimes::default();
        let mut resident = 0u64;
        for handle in self.processes.iter() {
            let process = lock(handle);
            let t = process.times();
            times.percent_user_time = times.percent_user_time.saturating_add(t.percent_user_time);
            times.percent_privileged_time = times
                .percent_privileged_time
                .saturating_add(t.percent_privileged_time);
            times.hard_faults_per_second = times
                .hard_faults_per_second
                .saturating_add(t.hard_faults_per_second);
            resident = resident.saturating_add(process.resident_bytes().unwrap_or(0));
        }
        lock(&total).aggregate(times, self.processes.len(), resident);
    }

    /// Read every process and push its counters.
    pub fn sample_data(&mut self) {
        self.refresh(true);
    }

    pub fn total(&self) -> Option<Handle<ProcessInstance>> {
        self.processes.total()
    }

    pub fn get(&self, id: &str) -> Option<Handle<ProcessInstance>> {
        self.processes.get(id)
    }

    pub fn instances(&self) -> Vec<Handle<ProcessInstance>> {
        self.processes.instances()
    }

    pub fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }
}

impl SampleSource for ProcessEnumeration {
    fn name(&self) -> &'static str {
        "processes"
    }

    fn sample(&mut self) {
        self.sample_data();
    }
}
