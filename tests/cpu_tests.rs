// Processor time percentages from /proc/stat samples

mod common;

use common::FakeCpuDepend;
use scxpal::cpu::{CpuDepend, CpuEnumeration, CpuTimes};
use scxpal::entity::{EntityInstance, SampleSource, TOTAL_ID, lock};
use scxpal::sampler::SamplingPolicy;
use std::sync::Arc;

const POLICY: SamplingPolicy = SamplingPolicy::new(6, 60);

const STAT_BEFORE: &str = "\
cpu  1000 0 1000 8000 0 0 0 0 0 0
cpu0 500 0 500 4000 0 0 0 0 0 0
cpu1 500 0 500 4000 0 0 0 0 0 0
intr 123456 0 0
ctxt 987654
";

const STAT_AFTER: &str = "\
cpu  1200 0 1100 8700 0 0 0 0 0 0
cpu0 700 0 600 4200 0 0 0 0 0 0
cpu1 500 0 500 4500 0 0 0 0 0 0
intr 123999 0 0
ctxt 987999
";

fn enumeration(fake: &Arc<FakeCpuDepend>) -> CpuEnumeration {
    let deps: Arc<dyn CpuDepend> = fake.clone();
    let mut cpus = CpuEnumeration::new(deps, POLICY);
    cpus.init();
    cpus
}

#[test]
fn test_discovers_numbered_processors_and_total() {
    let fake = Arc::new(FakeCpuDepend::new(STAT_BEFORE));
    let cpus = enumeration(&fake);

    assert_eq!(cpus.len(), 2);
    assert!(cpus.get("0").is_some());
    assert!(cpus.get("1").is_some());
    let total = cpus.total().unwrap();
    assert_eq!(lock(&total).id(), TOTAL_ID);
    assert!(lock(&total).is_total());
    assert_eq!(lock(&total).number(), None);
}

#[test]
fn test_percentages_after_two_samples() {
    let fake = Arc::new(FakeCpuDepend::new(STAT_BEFORE));
    let mut cpus = enumeration(&fake);
    cpus.sample();
    fake.set_stat(STAT_AFTER);
    cpus.sample();
    cpus.update(true);

    let total = cpus.total().unwrap();
    let total = lock(&total);
    assert_eq!(total.user_time(), 20);
    assert_eq!(total.privileged_time(), 10);
    assert_eq!(total.idle_time(), 70);
    assert_eq!(total.processor_time(), 30);
    assert_eq!(total.total_last_tick(), 11_000);
    drop(total);

    let cpu0 = cpus.get("0").unwrap();
    let cpu0 = lock(&cpu0);
    assert_eq!(cpu0.user_time(), 40);
    assert_eq!(cpu0.privileged_time(), 20);
    assert_eq!(cpu0.idle_time(), 40);
    assert_eq!(cpu0.processor_time(), 60);
    drop(cpu0);

    let cpu1 = cpus.get("1").unwrap();
    assert_eq!(lock(&cpu1).idle_time(), 100);
    assert_eq!(lock(&cpu1).processor_time(), 0);
}

#[test]
fn test_single_sample_gives_zero_percentages() {
    let fake = Arc::new(FakeCpuDepend::new(STAT_BEFORE));
    let mut cpus = enumeration(&fake);
    cpus.sample();
    cpus.update(true);

    let total = cpus.total().unwrap();
    assert_eq!(lock(&total).times(), CpuTimes::default());
}

#[test]
fn test_counter_reset_clears_percentages() {
    let fake = Arc::new(FakeCpuDepend::new(STAT_AFTER));
    let mut cpus = enumeration(&fake);
    cpus.sample();
    fake.set_stat(STAT_BEFORE);
    cpus.sample();
    cpus.update(true);

    let cpu0 = cpus.get("0").unwrap();
    assert_eq!(lock(&cpu0).times(), CpuTimes::default());
}

#[test]
fn test_reconcile_follows_hotplug() {
    let fake = Arc::new(FakeCpuDepend::new(STAT_BEFORE));
    let mut cpus = enumeration(&fake);
    let cpu0 = cpus.get("0").unwrap();

    fake.set_stat("cpu  1 1 1 1 0 0 0\ncpu0 1 1 1 1 0 0 0\ncpu2 1 1 1 1 0 0 0\n");
    cpus.update(false);

    assert_eq!(cpus.len(), 2);
    assert!(cpus.get("1").is_none());
    assert!(cpus.get("2").is_some());
    assert!(Arc::ptr_eq(&cpu0, &cpus.get("0").unwrap()));
}

#[test]
fn test_old_kernel_rows_without_iowait() {
    let fake = Arc::new(FakeCpuDepend::new("cpu 100 0 100 800\ncpu0 100 0 100 800\n"));
    let mut cpus = enumeration(&fake);
    cpus.sample();
    fake.set_stat("cpu 150 0 150 900\ncpu0 150 0 150 900\n");
    cpus.sample();
    cpus.update(true);

    let total = cpus.total().unwrap();
    let total = lock(&total);
    assert_eq!(total.user_time(), 25);
    assert_eq!(total.idle_time(), 50);
    assert_eq!(total.iowait_time(), 0);
    assert_eq!(cpus.name(), "cpu");
}
