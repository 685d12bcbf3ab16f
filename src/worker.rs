// Background samplers (one per enumeration) and the collector that updates
// every enumeration and publishes a snapshot per cycle.

use crate::config::AppConfig;
use crate::cpu::{CpuDependDefault, CpuEnumeration};
use crate::disk::{DiskDepend, DiskDependDefault, StaticDiskPartitionEnumeration, StatisticalDiskEnumeration};
use crate::entity::{Handle, SampleSource, lock};
use crate::memory::{MemoryDependDefault, MemoryEnumeration};
use crate::models::{
    CpuSnapshot, DiskSnapshot, MemorySnapshot, NetworkInterfaceSnapshot, PalSnapshot, PartitionSnapshot, ProcessSnapshot,
};
use crate::network::{NetworkInterfaceDependDefault, NetworkInterfaceEnumeration};
use crate::platform::Platform;
use crate::processes::{ProcessDependDefault, ProcessEnumeration};
use crate::system::SystemIdentity;
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, MissedTickBehavior, interval};

/// Rate limit for the "no receivers" message.
const NO_RECEIVERS_WARN_INTERVAL: Duration = Duration::from_secs(60);

/// Every enumeration the agent drives. Disabled disk kinds and processes are `None`.
pub struct Collectors {
    pub platform: Platform,
    pub system: Option<SystemIdentity>,
    pub logical_disks: Option<Handle<StatisticalDiskEnumeration>>,
    pub physical_disks: Option<Handle<StatisticalDiskEnumeration>>,
    pub partitions: Option<Handle<StaticDiskPartitionEnumeration>>,
    pub memory: Handle<MemoryEnumeration>,
    pub network: Handle<NetworkInterfaceEnumeration>,
    pub cpu: Handle<CpuEnumeration>,
    pub processes: Option<Handle<ProcessEnumeration>>,
}

fn handle<T>(value: T) -> Handle<T> {
    Arc::new(Mutex::new(value))
}

impl Collectors {
    /// Build the production enumerations from config and run their first discovery.
    pub fn from_config(config: &AppConfig, system: Option<SystemIdentity>) -> Self {
        let disk_deps: Arc<dyn DiskDepend> = Arc::new(DiskDependDefault::new(&config.disk));
        let disk_policy = config.disk.policy();

        let logical_disks = config.disk.include_logical.then(|| {
            let mut e = StatisticalDiskEnumeration::logical(disk_deps.clone(), disk_policy);
            e.init();
            handle(e)
        });
        let physical_disks = config.disk.include_physical.then(|| {
            let mut e = StatisticalDiskEnumeration::physical(disk_deps.clone(), disk_policy);
            e.init();
            handle(e)
        });
        let partitions = config.disk.include_partitions.then(|| {
            let mut e = StaticDiskPartitionEnumeration::new(disk_deps.clone(), config.process.timeout());
            e.init();
            handle(e)
        });

        let mut memory = MemoryEnumeration::new(
            Arc::new(MemoryDependDefault::new(&config.memory.meminfo, &config.memory.vmstat)),
            config.memory.policy(),
        );
        memory.init();

        let mut network = NetworkInterfaceEnumeration::new(
            Arc::new(NetworkInterfaceDependDefault::new(&config.network.proc_net_dev)),
            config.network.policy(),
            config.network.include_non_running,
        );
        network.init();

        let mut cpu = CpuEnumeration::new(Arc::new(CpuDependDefault::new(&config.cpu.proc_stat)), config.cpu.policy());
        cpu.init();

        let processes = config.processes.enabled.then(|| {
            let mut e = ProcessEnumeration::new(
                Arc::new(ProcessDependDefault::new(&config.processes.proc_root)),
                config.processes.policy(),
            );
            e.init();
            handle(e)
        });

        Self {
            platform: disk_deps.platform(),
            system,
            logical_disks,
            physical_disks,
            partitions,
            memory: handle(memory),
            network: handle(network),
            cpu: handle(cpu),
            processes,
        }
    }

    /// Rediscover resources and recompute every derived value.
    pub fn update_all(&self) {
        for disks in [&self.logical_disks, &self.physical_disks].into_iter().flatten() {
            lock(disks).update(true);
        }
        if let Some(partitions) = &self.partitions {
            lock(partitions).update(true);
        }
        lock(&self.memory).update(true);
        lock(&self.network).update(false);
        {
            let mut cpu = lock(&self.cpu);
            cpu.update(false);
            cpu.update(true);
        }
        if let Some(processes) = &self.processes {
            let mut processes = lock(processes);
            processes.update(false);
            processes.update(true);
        }
    }

    pub fn snapshot(&self) -> PalSnapshot {
        let mut snapshot = PalSnapshot::new(self.platform);
        snapshot.system = self.system.clone();
        if let Some(disks) = &self.logical_disks {
            snapshot.logical_disks = disk_snapshots(&lock(disks));
        }
        if let Some(disks) = &self.physical_disks {
            snapshot.physical_disks = disk_snapshots(&lock(disks));
        }
        if let Some(partitions) = &self.partitions {
            snapshot.partitions = lock(partitions)
                .instances()
                .iter()
                .map(|p| PartitionSnapshot::from_instance(&lock(p)))
                .collect();
        }
        snapshot.memory = lock(&self.memory)
            .total()
            .map(|m| MemorySnapshot::from_instance(&lock(&m)));

        let network = lock(&self.network);
        snapshot.network_interfaces = network
            .total()
            .into_iter()
            .chain(network.instances())
            .map(|i| NetworkInterfaceSnapshot::from_instance(&lock(&i)))
            .collect();
        drop(network);

        let cpu = lock(&self.cpu);
        snapshot.processors = cpu
            .total()
            .into_iter()
            .chain(cpu.instances())
            .map(|c| CpuSnapshot::from_instance(&lock(&c)))
            .collect();
        drop(cpu);

        if let Some(processes) = &self.processes {
            let processes = lock(processes);
            snapshot.processes = processes
                .total()
                .into_iter()
                .chain(processes.instances())
                .map(|p| ProcessSnapshot::from_instance(&lock(&p)))
                .collect();
        }
        snapshot
    }
}

fn disk_snapshots(disks: &StatisticalDiskEnumeration) -> Vec<DiskSnapshot> {
    disks
        .total()
        .into_iter()
        .chain(disks.instances())
        .map(|d| DiskSnapshot::from_instance(&lock(&d)))
        .collect()
}

/// Call `sample()` on `target` every `period`, starting immediately, until
/// `shutdown` fires. Sampling touches the filesystem, so it runs on the
/// blocking pool.
pub fn spawn_sampler<S>(period: Duration, target: Handle<S>, mut shutdown: oneshot::Receiver<()>) -> JoinHandle<()>
where
    S: SampleSource + 'static,
{
    tokio::spawn(async move {
        let name = lock(&target).name();
        let mut tick = interval(period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    let target = target.clone();
                    if let Err(e) = tokio::task::spawn_blocking(move || lock(&target).sample()).await {
                        tracing::warn!(error = %e, sampler = name, operation = "sample", "sampler task failed");
                    }
                }
                _ = &mut shutdown => {
                    tracing::debug!(sampler = name, "sampler shutting down");
                    break;
                }
            }
        }
    })
}

/// Update every enumeration each `period` and broadcast the resulting snapshot.
pub fn spawn_collector(
    collectors: Arc<Collectors>,
    period: Duration,
    tx: broadcast::Sender<PalSnapshot>,
    mut shutdown: oneshot::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = interval(period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_no_receivers_warn: Option<Instant> = None;

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    let c = collectors.clone();
                    let snapshot = match tokio::task::spawn_blocking(move || {
                        c.update_all();
                        c.snapshot()
                    })
                    .await
                    {
                        Ok(s) => s,
                        Err(e) => {
                            tracing::warn!(error = %e, operation = "collect", "collection task failed");
                            continue;
                        }
                    };

                    if tx.send(snapshot).is_err() {
                        let should_warn = last_no_receivers_warn
                            .is_none_or(|t| t.elapsed() >= NO_RECEIVERS_WARN_INTERVAL);
                        if should_warn {
                            tracing::debug!(
                                operation = "broadcast_snapshot",
                                "broadcast channel has no receivers"
                            );
                            last_no_receivers_warn = Some(Instant::now());
                        }
                    }
                }
                _ = &mut shutdown => {
                    tracing::debug!("collector shutting down");
                    break;
                }
            }
        }
    })
}
