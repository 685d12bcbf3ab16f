use super::depend::CpuDepend;
use super::instance::{CpuInstance, CpuTicks, parse_stat_row};
use crate::entity::{EntityEnumeration, Handle, SampleSource, lock};
use crate::log_suppressor::LogSuppressor;
use crate::sampler::SamplingPolicy;
use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock};
use tracing::{Level, instrument};

static STAT_SUPPRESSOR: LazyLock<LogSuppressor> =
    LazyLock::new(|| LogSuppressor::new(Level::WARN, Level::TRACE));

pub struct CpuEnumeration {
    deps: Arc<dyn CpuDepend>,
    policy: SamplingPolicy,
    cpus: EntityEnumeration<CpuInstance>,
}

impl CpuEnumeration {
    pub fn new(deps: Arc<dyn CpuDepend>, policy: SamplingPolicy) -> Self {
        Self {
            deps,
            policy,
            cpus: EntityEnumeration::new(),
        }
    }

    pub fn init(&mut self) {
        self.cpus.set_total(CpuInstance::total(self.policy));
        self.update(false);
    }

    fn read_rows(&self) -> Option<(Option<CpuTicks>, BTreeMap<u32, CpuTicks>)> {
        let lines = match self.deps.get_stat_lines() {
            Ok(lines) => lines,
            Err(e) => {
                STAT_SUPPRESSOR.log("StatUnavailable", &format!("unable to read cpu statistics: {}", e));
                return None;
            }
        };
        let mut total = None;
        let mut cpus = BTreeMap::new();
        for line in lines.iter().filter(|l| l.starts_with("cpu")) {
            match parse_stat_row(line) {
                Some((None, ticks)) => total = Some(ticks),
                Some((Some(n), ticks)) => {
                    cpus.insert(n, ticks);
                }
                None => {}
            }
        }
        Some((total, cpus))
    }

    /// Without `update_instances`, add processors that appeared and drop
    /// those that went offline. With it, recompute every percentage.
    #[instrument(skip(self), fields(subsystem = "cpu", operation = "update"))]
    pub fn update(&mut self, update_instances: bool) {
        if update_instances {
            for handle in self.cpus.iter() {
                lock(handle).update();
            }
            if let Some(total) = self.cpus.total() {
                lock(&total).update();
            }
            return;
        }

        let Some((_, rows)) = self.read_rows() else {
            return;
        };
        self.cpus
            .retain(|cpu| cpu.number().is_some_and(|n| rows.contains_key(&n)));
        for n in rows.keys() {
            if self.cpus.get(&n.to_string()).is_none() {
                tracing::debug!(cpu = n, "adding processor");
                self.cpus.add(CpuInstance::new(*n, self.policy));
            }
        }
    }

    /// Push the current tick counters into every instance.
    pub fn sample_data(&mut self) {
        let Some((total_ticks, rows)) = self.read_rows() else {
            return;
        };
        if let (Some(total), Some(ticks)) = (self.cpus.total(), total_ticks) {
            lock(&total).add_sample(&ticks);
        }
        for handle in self.cpus.iter() {
            let mut cpu = lock(handle);
            let Some(n) = cpu.number() else {
                continue;
            };
            match rows.get(&n) {
                Some(ticks) => cpu.add_sample(ticks),
                None => tracing::error!(cpu = n, "no /proc/stat row for processor"),
            }
        }
    }

    pub fn total(&self) -> Option<Handle<CpuInstance>> {
        self.cpus.total()
    }

    pub fn get(&self, id: &str) -> Option<Handle<CpuInstance>> {
        self.cpus.get(id)
    }

    pub fn instances(&self) -> Vec<Handle<CpuInstance>> {
        self.cpus.instances()
    }

    pub fn len(&self) -> usize {
        self.cpus.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cpus.is_empty()
    }
}

impl SampleSource for CpuEnumeration {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn sample(&mut self) {
        self.sample_data();
    }
}
