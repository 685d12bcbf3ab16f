// Worker integration tests: samplers tick until shutdown, the collector
// publishes snapshots built from fake dependencies.

mod common;

use common::{
    FakeCpuDepend, FakeDiskDepend, FakeMemoryDepend, FakeNetworkDepend, FakeProcessDepend, diskstats_row, iface, mount,
    net_dev_row, proc_stat, proc_status,
};
use scxpal::cpu::{CpuDepend, CpuEnumeration};
use scxpal::disk::{DiskDepend, StatisticalDiskEnumeration};
use scxpal::entity::{Handle, SampleSource, TOTAL_ID, lock};
use scxpal::memory::{MemoryDepend, MemoryEnumeration};
use scxpal::network::{NetworkInterfaceDepend, NetworkInterfaceEnumeration};
use scxpal::platform::Platform;
use scxpal::processes::{ProcessDepend, ProcessEnumeration};
use scxpal::sampler::SamplingPolicy;
use scxpal::worker::{Collectors, spawn_collector, spawn_sampler};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, oneshot};

const POLICY: SamplingPolicy = SamplingPolicy::new(6, 60);

struct Counting {
    samples: usize,
}

impl SampleSource for Counting {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn sample(&mut self) {
        self.samples += 1;
    }
}

fn handle<T>(value: T) -> Handle<T> {
    Arc::new(Mutex::new(value))
}

fn fake_collectors() -> Collectors {
    let disk = FakeDiskDepend::new(Platform::Linux);
    disk.set_mnt_tab(vec![mount("/dev/sdz1", "/", "ext4")]);
    disk.set_physical("/dev/sdz1", &[("sdz", "/dev/sdz")]);
    disk.set_disk_stats("sdz", diskstats_row("sdz", 1, 1, 1, 1, 1, 1));
    let disk: Arc<dyn DiskDepend> = Arc::new(disk);
    let mut physical = StatisticalDiskEnumeration::physical(disk, POLICY);
    physical.init();

    let memory: Arc<dyn MemoryDepend> = Arc::new(FakeMemoryDepend::linux(
        "MemTotal: 524288kB\nMemFree: 131072kB\n",
        "pgpgin 0\npgpgout 0\n",
    ));
    let mut memory = MemoryEnumeration::new(memory, POLICY);
    memory.init();

    let network: Arc<dyn NetworkInterfaceDepend> = Arc::new(FakeNetworkDepend::new(
        &[net_dev_row("wk0", 100, 1, 100, 1)],
        vec![iface("wk0", Some([10, 9, 0, 1]), true, true)],
    ));
    let mut network = NetworkInterfaceEnumeration::new(network, POLICY, false);
    network.init();

    let cpu: Arc<dyn CpuDepend> = Arc::new(FakeCpuDepend::new("cpu 1 0 1 8\ncpu0 1 0 1 8\n"));
    let mut cpu = CpuEnumeration::new(cpu, POLICY);
    cpu.init();

    let procs = FakeProcessDepend::new();
    procs.set(31, proc_stat(31, "agent", 10, 5, 0), Some(proc_status("agent", 0, 2048)));
    let procs: Arc<dyn ProcessDepend> = Arc::new(procs);
    let mut processes = ProcessEnumeration::new(procs, POLICY);
    processes.init();

    Collectors {
        platform: Platform::Linux,
        system: None,
        logical_disks: None,
        physical_disks: Some(handle(physical)),
        partitions: None,
        memory: handle(memory),
        network: handle(network),
        cpu: handle(cpu),
        processes: Some(handle(processes)),
    }
}

#[tokio::test]
async fn sampler_ticks_until_shutdown() {
    let target = handle(Counting { samples: 0 });
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let task = spawn_sampler(Duration::from_millis(10), target.clone(), shutdown_rx);

    tokio::time::sleep(Duration::from_millis(100)).await;
    shutdown_tx.send(()).unwrap();
    task.await.unwrap();

    let after_shutdown = lock(&target).samples;
    assert!(after_shutdown >= 2, "sampled {} times", after_shutdown);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(lock(&target).samples, after_shutdown);
}

#[test]
fn collectors_snapshot_lists_totals_first() {
    let collectors = fake_collectors();
    collectors.update_all();
    let snapshot = collectors.snapshot();

    assert_eq!(snapshot.platform, Platform::Linux);
    assert!(snapshot.logical_disks.is_empty());
    assert_eq!(snapshot.physical_disks.len(), 2);
    assert_eq!(snapshot.physical_disks[0].name, TOTAL_ID);
    assert!(snapshot.physical_disks[0].is_total);
    assert_eq!(snapshot.physical_disks[1].name, "sdz");

    let memory = snapshot.memory.as_ref().expect("memory snapshot");
    assert_eq!(memory.total_physical, Some(512 * 1024 * 1024));

    assert_eq!(snapshot.network_interfaces.len(), 2);
    assert_eq!(snapshot.network_interfaces[0].name, TOTAL_ID);
    assert_eq!(snapshot.network_interfaces[1].name, "wk0");

    assert_eq!(snapshot.processors.len(), 2);
    assert!(snapshot.processors[0].is_total);
    assert_eq!(snapshot.processors[1].name, "0");

    assert_eq!(snapshot.processes.len(), 2);
    assert_eq!(snapshot.processes[0].process_count, Some(1));
    assert_eq!(snapshot.processes[1].command.as_deref(), Some("agent"));

    let json = serde_json::to_value(&snapshot).unwrap();
    assert_eq!(json["platform"], serde_json::json!("linux"));
    assert!(json["networkInterfaces"].is_array());
    assert!(json.get("system").is_none());
}

#[tokio::test]
async fn collector_broadcasts_and_shuts_down() {
    let collectors = Arc::new(fake_collectors());
    let (tx, mut rx) = broadcast::channel(4);
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let task = spawn_collector(collectors, Duration::from_millis(20), tx, shutdown_rx);

    let snapshot = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("snapshot within timeout")
        .expect("channel open");
    assert_eq!(snapshot.physical_disks[0].name, TOTAL_ID);

    shutdown_tx.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("collector stops")
        .unwrap();
}

#[tokio::test]
async fn collector_without_receivers_keeps_running() {
    let collectors = Arc::new(fake_collectors());
    let (tx, rx) = broadcast::channel(4);
    drop(rx);
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let task = spawn_collector(collectors, Duration::from_millis(10), tx, shutdown_rx);

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(!task.is_finished());
    shutdown_tx.send(()).unwrap();
    task.await.unwrap();
}
