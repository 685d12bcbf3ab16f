use crate::sampler::SamplingPolicy;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub disk: DiskConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub cpu: CpuConfig,
    #[serde(default)]
    pub processes: ProcessesConfig,
    #[serde(default)]
    pub process: ProcessConfig,
    #[serde(default)]
    pub collection: CollectionConfig,
}

fn default_seconds_per_sample() -> u64 {
    60
}

fn default_samples() -> usize {
    6
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiskConfig {
    #[serde(default = "default_seconds_per_sample")]
    pub seconds_per_sample: u64,
    #[serde(default = "default_samples")]
    pub samples: usize,
    #[serde(default = "default_proc_disk_stats")]
    pub proc_disk_stats: String,
    #[serde(default = "default_proc_partitions")]
    pub proc_partitions: String,
    #[serde(default = "default_mount_tab")]
    pub mount_tab: String,
    #[serde(default = "default_true")]
    pub include_physical: bool,
    #[serde(default = "default_true")]
    pub include_logical: bool,
    #[serde(default = "default_true")]
    pub include_partitions: bool,
}

fn default_proc_disk_stats() -> String {
    "/proc/diskstats".into()
}

fn default_proc_partitions() -> String {
    "/proc/partitions".into()
}

fn default_mount_tab() -> String {
    "/etc/mtab".into()
}

impl Default for DiskConfig {
    fn default() -> Self {
        Self {
            seconds_per_sample: default_seconds_per_sample(),
            samples: default_samples(),
            proc_disk_stats: default_proc_disk_stats(),
            proc_partitions: default_proc_partitions(),
            mount_tab: default_mount_tab(),
            include_physical: true,
            include_logical: true,
            include_partitions: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MemoryConfig {
    #[serde(default = "default_seconds_per_sample")]
    pub seconds_per_sample: u64,
    #[serde(default = "default_samples")]
    pub samples: usize,
    #[serde(default = "default_meminfo")]
    pub meminfo: String,
    #[serde(default = "default_vmstat")]
    pub vmstat: String,
}

fn default_meminfo() -> String {
    "/proc/meminfo".into()
}

fn default_vmstat() -> String {
    "/proc/vmstat".into()
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            seconds_per_sample: default_seconds_per_sample(),
            samples: default_samples(),
            meminfo: default_meminfo(),
            vmstat: default_vmstat(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_seconds_per_sample")]
    pub seconds_per_sample: u64,
    #[serde(default = "default_samples")]
    pub samples: usize,
    #[serde(default = "default_proc_net_dev")]
    pub proc_net_dev: String,
    /// Report interfaces that are down or not running as well.
    #[serde(default)]
    pub include_non_running: bool,
}

fn default_proc_net_dev() -> String {
    "/proc/net/dev".into()
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            seconds_per_sample: default_seconds_per_sample(),
            samples: default_samples(),
            proc_net_dev: default_proc_net_dev(),
            include_non_running: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CpuConfig {
    #[serde(default = "default_seconds_per_sample")]
    pub seconds_per_sample: u64,
    #[serde(default = "default_samples")]
    pub samples: usize,
    #[serde(default = "default_proc_stat")]
    pub proc_stat: String,
}

fn default_proc_stat() -> String {
    "/proc/stat".into()
}

impl Default for CpuConfig {
    fn default() -> Self {
        Self {
            seconds_per_sample: default_seconds_per_sample(),
            samples: default_samples(),
            proc_stat: default_proc_stat(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProcessesConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_seconds_per_sample")]
    pub seconds_per_sample: u64,
    #[serde(default = "default_samples")]
    pub samples: usize,
    #[serde(default = "default_proc_root")]
    pub proc_root: String,
}

fn default_proc_root() -> String {
    "/proc".into()
}

impl Default for ProcessesConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            seconds_per_sample: default_seconds_per_sample(),
            samples: default_samples(),
            proc_root: default_proc_root(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProcessConfig {
    /// Upper bound for helper commands such as parted.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_timeout_ms() -> u64 {
    15000
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollectionConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Max number of snapshots kept in the broadcast channel (slow consumers may lag).
    #[serde(default = "default_broadcast_capacity")]
    pub broadcast_capacity: usize,
}

fn default_interval_secs() -> u64 {
    60
}

fn default_broadcast_capacity() -> usize {
    16
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            broadcast_capacity: default_broadcast_capacity(),
        }
    }
}

impl DiskConfig {
    pub fn policy(&self) -> SamplingPolicy {
        SamplingPolicy::new(self.samples, self.seconds_per_sample)
    }
}

impl MemoryConfig {
    pub fn policy(&self) -> SamplingPolicy {
        SamplingPolicy::new(self.samples, self.seconds_per_sample)
    }
}

impl NetworkConfig {
    pub fn policy(&self) -> SamplingPolicy {
        SamplingPolicy::new(self.samples, self.seconds_per_sample)
    }
}

impl CpuConfig {
    pub fn policy(&self) -> SamplingPolicy {
        SamplingPolicy::new(self.samples, self.seconds_per_sample)
    }
}

impl ProcessesConfig {
    pub fn policy(&self) -> SamplingPolicy {
        SamplingPolicy::new(self.samples, self.seconds_per_sample)
    }
}

impl ProcessConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl AppConfig {
    /// Load from `CONFIG_FILE` (default `config.toml`); defaults when the file is absent.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        if !Path::new(&path).exists() {
            tracing::info!(path = %path, "config file not found, using defaults");
            let config = AppConfig::default();
            config.validate()?;
            return Ok(config);
        }
        let s = std::fs::read_to_string(&path)?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        validate_sampling("disk", self.disk.seconds_per_sample, self.disk.samples)?;
        validate_sampling("memory", self.memory.seconds_per_sample, self.memory.samples)?;
        validate_sampling("network", self.network.seconds_per_sample, self.network.samples)?;
        validate_sampling("cpu", self.cpu.seconds_per_sample, self.cpu.samples)?;
        validate_sampling("processes", self.processes.seconds_per_sample, self.processes.samples)?;

        for (name, value) in [
            ("disk.proc_disk_stats", &self.disk.proc_disk_stats),
            ("disk.proc_partitions", &self.disk.proc_partitions),
            ("disk.mount_tab", &self.disk.mount_tab),
            ("memory.meminfo", &self.memory.meminfo),
            ("memory.vmstat", &self.memory.vmstat),
            ("network.proc_net_dev", &self.network.proc_net_dev),
            ("cpu.proc_stat", &self.cpu.proc_stat),
            ("processes.proc_root", &self.processes.proc_root),
        ] {
            anyhow::ensure!(!value.is_empty(), "{} must be non-empty", name);
        }

        anyhow::ensure!(
            self.process.timeout_ms > 0,
            "process.timeout_ms must be > 0, got {}",
            self.process.timeout_ms
        );
        anyhow::ensure!(
            self.collection.interval_secs > 0,
            "collection.interval_secs must be > 0, got {}",
            self.collection.interval_secs
        );
        anyhow::ensure!(
            self.collection.broadcast_capacity > 0,
            "collection.broadcast_capacity must be > 0, got {}",
            self.collection.broadcast_capacity
        );
        Ok(())
    }
}

fn validate_sampling(section: &str, seconds_per_sample: u64, samples: usize) -> anyhow::Result<()> {
    anyhow::ensure!(
        seconds_per_sample > 0,
        "{}.seconds_per_sample must be > 0, got {}",
        section,
        seconds_per_sample
    );
    anyhow::ensure!(
        samples >= 2,
        "{}.samples must be >= 2, got {}",
        section,
        samples
    );
    Ok(())
}
