// Statistical (performance) view of one logical or physical disk: raw counter
// samplers, per-platform sample collectors and the derived rates.

use super::depend::{DiskDepend, INVALID_INSTANCE, file_name, pstat_device_id};
use crate::entity::{EntityInstance, TOTAL_ID};
use crate::error::PalError;
use crate::log_suppressor::LogSuppressor;
use crate::platform::Platform;
use crate::sampler::{DataSampler, SamplingPolicy};
use nix::errno::Errno;
use serde::Serialize;
use std::num::ParseIntError;
use std::sync::{Arc, LazyLock};
use tracing::Level;

/// Assumed for every known system; not discoverable at run time.
const SECTOR_SIZE: u64 = 512;
const BYTES_PER_MB: f64 = 1024.0 * 1024.0;
/// HP-UX reports transferred data in 64-byte words.
const PSTAT_WORD_SIZE: u64 = 64;
/// Consecutive failed device-map lookups reported before going quiet.
const MAX_REPORTED_FAILED_FINDS: u32 = 10;

static COLUMN_SUPPRESSOR: LazyLock<LogSuppressor> =
    LazyLock::new(|| LogSuppressor::new(Level::WARN, Level::TRACE));
static PERFSTAT_SUPPRESSOR: LazyLock<LogSuppressor> =
    LazyLock::new(|| LogSuppressor::new(Level::ERROR, Level::INFO));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiskKind {
    Logical,
    Physical,
}

/// Values derived by `update()`; all zero after `reset()`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiskMetrics {
    pub reads_per_sec: u64,
    pub writes_per_sec: u64,
    pub transfers_per_sec: u64,
    pub r_bytes_per_sec: u64,
    pub w_bytes_per_sec: u64,
    pub t_bytes_per_sec: u64,
    pub r_percentage: u64,
    pub w_percentage: u64,
    pub t_percentage: u64,
    pub r_time: u64,
    pub w_time: u64,
    pub t_time: u64,
    pub run_time: u64,
    pub wait_time: u64,
    pub sec_per_read: f64,
    pub sec_per_write: f64,
    pub sec_per_transfer: f64,
    pub mb_used: u64,
    pub mb_free: u64,
    pub inodes_total: u64,
    pub inodes_free: u64,
    pub block_size: u64,
    pub q_length: f64,
}

/// Most recent raw counters of a disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LastMetrics {
    pub reads: u64,
    pub writes: u64,
    pub bytes_read: u64,
    pub bytes_written: u64,
    pub ms_read: u64,
    pub ms_written: u64,
}

/// Counter deltas over one sampling window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct IoDeltas {
    pub reads: u64,
    pub writes: u64,
    pub transfers: u64,
    pub r_time: u64,
    pub w_time: u64,
    pub t_time: u64,
}

#[derive(Debug, Clone)]
pub(crate) struct DiskSamplers {
    pub reads: DataSampler<u64>,
    pub writes: DataSampler<u64>,
    pub transfers: DataSampler<u64>,
    pub t_bytes: DataSampler<u64>,
    pub r_bytes: DataSampler<u64>,
    pub w_bytes: DataSampler<u64>,
    pub wait_times: DataSampler<u64>,
    pub t_times: DataSampler<u64>,
    pub r_times: DataSampler<u64>,
    pub w_times: DataSampler<u64>,
    pub run_times: DataSampler<u64>,
    pub time_stamp: DataSampler<u64>,
    pub q_lengths: DataSampler<u64>,
}

impl DiskSamplers {
    fn new(capacity: usize) -> Self {
        Self {
            reads: DataSampler::new(capacity),
            writes: DataSampler::new(capacity),
            transfers: DataSampler::new(capacity),
            t_bytes: DataSampler::new(capacity),
            r_bytes: DataSampler::new(capacity),
            w_bytes: DataSampler::new(capacity),
            wait_times: DataSampler::new(capacity),
            t_times: DataSampler::new(capacity),
            r_times: DataSampler::new(capacity),
            w_times: DataSampler::new(capacity),
            run_times: DataSampler::new(capacity),
            time_stamp: DataSampler::new(capacity),
            q_lengths: DataSampler::new(capacity),
        }
    }

    fn clear(&mut self) {
        for s in [
            &mut self.reads,
            &mut self.writes,
            &mut self.transfers,
            &mut self.t_bytes,
            &mut self.r_bytes,
            &mut self.w_bytes,
            &mut self.wait_times,
            &mut self.t_times,
            &mut self.r_times,
            &mut self.w_times,
            &mut self.run_times,
            &mut self.time_stamp,
            &mut self.q_lengths,
        ] {
            s.clear();
        }
    }

    fn push_io(&mut self, reads: u64, writes: u64, r_bytes: u64, w_bytes: u64) {
        self.reads.push(reads);
        self.writes.push(writes);
        self.transfers.push(reads.wrapping_add(writes));
        self.r_bytes.push(r_bytes);
        self.w_bytes.push(w_bytes);
        self.t_bytes.push(r_bytes.wrapping_add(w_bytes));
    }
}

fn now_secs() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

fn sum(a: Option<u64>, b: Option<u64>) -> Option<u64> {
    Some(a?.saturating_add(b?))
}

/// Elapsed time over operation count, scaled to seconds; 0 when either side is
/// unknown or no operation happened.
fn seconds_per_op(time: Option<u64>, ops: Option<u64>, per_second: f64) -> f64 {
    match (time, ops) {
        (Some(time), Some(ops)) if ops != 0 => time as f64 / ops as f64 / per_second,
        _ => 0.0,
    }
}

fn column(parts: &[String], index: usize) -> Result<u64, ParseIntError> {
    parts[index].parse::<u64>()
}

pub struct StatisticalDiskInstance {
    deps: Arc<dyn DiskDepend>,
    platform: Platform,
    kind: DiskKind,
    policy: SamplingPolicy,
    is_total: bool,
    id: String,
    pub(crate) device: String,
    pub(crate) mount_point: String,
    pub(crate) fs_type: String,
    pub(crate) sampler_devices: Vec<String>,
    pub(crate) online: bool,
    failed_finds: u32,
    pub(crate) metrics: DiskMetrics,
    pub(crate) samplers: DiskSamplers,
}

impl EntityInstance for StatisticalDiskInstance {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_total(&self) -> bool {
        self.is_total
    }
}

impl StatisticalDiskInstance {
    pub fn new(deps: Arc<dyn DiskDepend>, kind: DiskKind, policy: SamplingPolicy, is_total: bool) -> Self {
        let id = if is_total { TOTAL_ID } else { "?" };
        Self {
            platform: deps.platform(),
            deps,
            kind,
            policy,
            is_total,
            id: id.to_string(),
            device: id.to_string(),
            mount_point: String::new(),
            fs_type: String::new(),
            sampler_devices: Vec::new(),
            online: false,
            failed_finds: 0,
            metrics: DiskMetrics::default(),
            samplers: DiskSamplers::new(policy.samples),
        }
    }

    pub fn set_id(&mut self, id: &str) {
        self.id = id.to_string();
    }

    pub fn set_device(&mut self, device: &str) {
        self.device = device.to_string();
    }

    pub fn set_mount_point(&mut self, mount_point: &str) {
        self.mount_point = mount_point.to_string();
    }

    pub fn set_fs_type(&mut self, fs_type: &str) {
        self.fs_type = fs_type.to_string();
    }

    pub fn add_sampler_device(&mut self, device: &str) {
        self.sampler_devices.push(device.to_string());
    }

    pub fn set_online(&mut self, online: bool) {
        self.online = online;
    }

    pub fn kind(&self) -> DiskKind {
        self.kind
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn mount_point(&self) -> &str {
        &self.mount_point
    }

    pub fn sampler_devices(&self) -> &[String] {
        &self.sampler_devices
    }

    pub fn is_online(&self) -> bool {
        self.online
    }

    pub fn metrics(&self) -> &DiskMetrics {
        &self.metrics
    }

    /// Zero every derived value and drop all samples.
    pub fn reset(&mut self) {
        self.metrics = DiskMetrics::default();
        self.samplers.clear();
    }

    fn unwrapped_delta(&self, sampler: &DataSampler<u64>) -> Option<u64> {
        let lookback = self.policy.samples;
        (!sampler.has_wrapped(lookback)).then(|| sampler.delta(lookback))
    }

    /// Recompute derived values from the samplers and refresh space usage.
    /// The total instance is maintained by its enumeration instead.
    pub fn update(&mut self) {
        if self.is_total {
            return;
        }
        let policy = self.policy;
        let s = &self.samplers;
        let mut m = DiskMetrics {
            reads_per_sec: policy.rate(&s.reads),
            writes_per_sec: policy.rate(&s.writes),
            transfers_per_sec: policy.rate(&s.transfers),
            r_bytes_per_sec: policy.rate(&s.r_bytes),
            w_bytes_per_sec: policy.rate(&s.w_bytes),
            t_bytes_per_sec: policy.rate(&s.t_bytes),
            t_time: policy.rate(&s.t_times),
            r_time: policy.rate(&s.r_times),
            w_time: policy.rate(&s.w_times),
            run_time: policy.rate(&s.run_times),
            wait_time: policy.rate(&s.wait_times),
            q_length: s.q_lengths.average(),
            r_percentage: self.metrics.r_percentage,
            w_percentage: self.metrics.w_percentage,
            ..DiskMetrics::default()
        };

        m.t_percentage = match self.platform {
            Platform::Linux | Platform::HpUx => m.r_percentage.saturating_add(m.w_percentage),
            Platform::Solaris => self.busy_percentage(),
            Platform::Aix => self.metrics.t_percentage,
        };

        let reads = self.unwrapped_delta(&s.reads);
        let writes = self.unwrapped_delta(&s.writes);
        m.sec_per_read = seconds_per_op(self.unwrapped_delta(&s.r_times), reads, 1000.0);
        m.sec_per_write = seconds_per_op(self.unwrapped_delta(&s.w_times), writes, 1000.0);
        m.sec_per_transfer = self.sec_per_transfer();

        if !self.mount_point.is_empty() {
            match self.deps.statvfs(&self.mount_point) {
                Ok(vfs) => {
                    // Rounded up to match what df reports.
                    let frsize = vfs.fragment_size as f64;
                    m.mb_free = (vfs.blocks_available as f64 * frsize / BYTES_PER_MB).ceil() as u64;
                    m.mb_used = ((vfs.blocks as f64 - vfs.blocks_available as f64) * frsize / BYTES_PER_MB).ceil() as u64;
                    m.block_size = vfs.block_size;
                    m.inodes_total = vfs.files;
                    m.inodes_free = vfs.files_free;
                }
                Err(e) if e.errno() == Some(Errno::EOVERFLOW as i32) => {
                    // Disk too big for statvfs; stays online without space figures.
                    tracing::trace!(mount_point = %self.mount_point, "statvfs failed with EOVERFLOW");
                }
                Err(e) => {
                    tracing::error!(mount_point = %self.mount_point, error = %e, "statvfs failed");
                }
            }
        }

        self.metrics = m;
    }

    fn sec_per_transfer(&self) -> f64 {
        let s = &self.samplers;
        let d = |sampler: &DataSampler<u64>| self.unwrapped_delta(sampler);
        match self.platform {
            Platform::Aix => seconds_per_op(d(&s.t_times), d(&s.transfers), 1_000_000.0),
            Platform::HpUx => seconds_per_op(d(&s.t_times), d(&s.transfers), 1000.0),
            Platform::Linux => seconds_per_op(
                sum(d(&s.r_times), d(&s.w_times)),
                sum(d(&s.reads), d(&s.writes)),
                1000.0,
            ),
            Platform::Solaris => seconds_per_op(
                sum(d(&s.run_times), d(&s.wait_times)),
                sum(d(&s.reads), d(&s.writes)),
                1000.0,
            ),
        }
    }

    // Busy share of the kstat snapshot interval.
    fn busy_percentage(&self) -> u64 {
        let s = &self.samplers;
        let (Some(run), Some(wait), Some(elapsed)) = (
            self.unwrapped_delta(&s.r_times),
            self.unwrapped_delta(&s.w_times),
            self.unwrapped_delta(&s.time_stamp),
        ) else {
            return 0;
        };
        if elapsed == 0 {
            return 0;
        }
        run.saturating_add(wait).saturating_mul(100) / elapsed
    }

    /// Window deltas feeding the total's per-operation times; None when any
    /// counter involved was reset inside the window.
    pub(crate) fn io_deltas(&self) -> Option<IoDeltas> {
        let s = &self.samplers;
        let reads = self.unwrapped_delta(&s.reads)?;
        let writes = self.unwrapped_delta(&s.writes)?;
        let mut d = IoDeltas {
            reads,
            writes,
            ..IoDeltas::default()
        };
        match self.platform {
            Platform::HpUx => {
                d.transfers = self.unwrapped_delta(&s.transfers)?;
                d.t_time = self.unwrapped_delta(&s.t_times)?;
            }
            Platform::Linux => {
                d.transfers = reads.saturating_add(writes);
                d.r_time = self.unwrapped_delta(&s.r_times)?;
                d.w_time = self.unwrapped_delta(&s.w_times)?;
            }
            Platform::Solaris => {
                d.transfers = reads.saturating_add(writes);
                d.r_time = self.unwrapped_delta(&s.run_times)?;
                d.w_time = self.unwrapped_delta(&s.wait_times)?;
            }
            Platform::Aix => {}
        }
        Some(d)
    }

    /// Pull one set of raw counters from the platform source.
    pub fn sample(&mut self) {
        match (self.kind, self.platform) {
            (DiskKind::Physical, Platform::Linux) => self.sample_physical_linux(),
            (DiskKind::Physical, Platform::Aix) => self.sample_physical_aix(),
            (DiskKind::Physical, Platform::HpUx) => self.sample_physical_hpux(),
            (DiskKind::Physical, Platform::Solaris) => self.sample_physical_solaris(),
            (DiskKind::Logical, Platform::Linux) => self.sample_logical_linux(),
            (DiskKind::Logical, Platform::HpUx) => self.sample_logical_hpux(),
            (DiskKind::Logical, Platform::Solaris) => self.sample_logical_solaris(),
            (DiskKind::Logical, Platform::Aix) => {
                tracing::trace!(device = %self.device, "no logical disk statistics source on aix");
            }
        }
    }

    fn sample_physical_linux(&mut self) {
        let mut parts = self.deps.get_proc_disk_stats(&self.device);
        for dev in &self.sampler_devices {
            if !parts.is_empty() {
                break;
            }
            parts = self.deps.get_proc_disk_stats(dev);
        }
        self.samplers.time_stamp.push(now_secs());
        if parts.len() <= 11 {
            return;
        }
        let parsed = (|| -> Result<[u64; 7], ParseIntError> {
            Ok([
                column(&parts, 3)?,
                column(&parts, 7)?,
                column(&parts, 5)?,
                column(&parts, 9)?,
                column(&parts, 6)?,
                column(&parts, 10)?,
                column(&parts, 11)?,
            ])
        })();
        match parsed {
            Ok([reads, writes, r_sectors, w_sectors, r_ms, w_ms, queue]) => {
                self.samplers.push_io(
                    reads,
                    writes,
                    r_sectors.wrapping_mul(SECTOR_SIZE),
                    w_sectors.wrapping_mul(SECTOR_SIZE),
                );
                self.samplers.r_times.push(r_ms);
                self.samplers.w_times.push(w_ms);
                self.samplers.q_lengths.push(queue);
            }
            Err(e) => {
                tracing::warn!(device = %self.device, error = %e, "could not parse line from diskstats");
            }
        }
    }

    fn sample_logical_linux(&mut self) {
        // LVM volumes are sampled through their dm device.
        let device = self
            .sampler_devices
            .first()
            .cloned()
            .unwrap_or_else(|| self.device.clone());
        let parts = self.deps.get_proc_disk_stats(&device);
        self.samplers.time_stamp.push(now_secs());

        // Disk rows have 14 or more columns (newer kernels append discard and
        // flush counters); old-style partition rows have exactly 7.
        let indices = if parts.len() >= 14 {
            [3, 7, 5, 9]
        } else if parts.len() == 7 {
            [3, 5, 4, 6]
        } else {
            let msg = format!(
                "the diskstats map does not contain a key matching the device named \"{}\", or only {} columns were found",
                device,
                parts.len()
            );
            COLUMN_SUPPRESSOR.log(&device, &msg);
            return;
        };
        let parsed = (|| -> Result<[u64; 4], ParseIntError> {
            Ok([
                column(&parts, indices[0])?,
                column(&parts, indices[1])?,
                column(&parts, indices[2])?,
                column(&parts, indices[3])?,
            ])
        })();
        match parsed {
            Ok([reads, writes, r_sectors, w_sectors]) => {
                self.samplers.push_io(
                    reads,
                    writes,
                    r_sectors.wrapping_mul(SECTOR_SIZE),
                    w_sectors.wrapping_mul(SECTOR_SIZE),
                );
            }
            Err(e) => {
                tracing::warn!(device = %device, error = %e, "could not parse device line from diskstats");
            }
        }
    }

    fn sample_physical_aix(&mut self) {
        // perfstat names may contain subdirectories, e.g. asm/acfs_vol001-41.
        let Some(name) = self.device.strip_prefix("/dev/") else {
            let msg = format!("device path ({}) does not begin with /dev/", self.device);
            PERFSTAT_SUPPRESSOR.log(&self.device, &msg);
            return;
        };
        match self.deps.perfstat_disk(name) {
            Ok(data) => {
                let r_bytes = data.read_blocks.wrapping_mul(data.block_size);
                let w_bytes = data.write_blocks.wrapping_mul(data.block_size);
                let ticks_to_ms = |ticks: u64| (ticks as f64 * data.xint_frac / 1_000_000.0) as u64;
                let s = &mut self.samplers;
                s.transfers.push(data.transfers);
                s.r_bytes.push(r_bytes);
                s.w_bytes.push(w_bytes);
                s.t_bytes.push(r_bytes.wrapping_add(w_bytes));
                s.t_times.push(data.time.wrapping_mul(1000));
                s.r_times.push(ticks_to_ms(data.read_service_ticks));
                s.w_times.push(ticks_to_ms(data.write_service_ticks));
                s.q_lengths.push(data.queue_depth);
            }
            Err(e) => {
                let msg = format!("perfstat_disk failed for {}: {}", name, e);
                PERFSTAT_SUPPRESSOR.log(name, &msg);
            }
        }
    }

    fn sample_physical_hpux(&mut self) {
        let Some(di) = self
            .deps
            .find_device_instance(&self.device)
            .filter(|di| di.instance() != INVALID_INSTANCE)
        else {
            tracing::error!(device = %self.device, "unable to find disk in device map");
            return;
        };
        self.samplers.time_stamp.push(now_secs());
        let info = match self.deps.pstat_getdisk(di.instance()) {
            Ok(Some(info)) => info,
            Ok(None) | Err(_) => {
                tracing::error!(device = %self.device, "pstat_getdisk failed");
                return;
            }
        };
        if di.dev_id != pstat_device_id(info.dev_major, info.dev_minor) {
            tracing::warn!(device = %self.device, "disk instance changed");
            di.set_instance(self.find_disk_info_by_id(di.dev_id).unwrap_or(INVALID_INSTANCE));
            return;
        }
        let s = &mut self.samplers;
        s.transfers.push(info.transfers);
        s.t_bytes.push(info.words.wrapping_mul(PSTAT_WORD_SIZE));
        s.t_times.push(info.response_ms);
        s.wait_times.push(info.wait_ms);
        s.q_lengths.push(info.queue_length);
    }

    fn sample_logical_hpux(&mut self) {
        let Some(di) = self
            .deps
            .find_device_instance(&self.device)
            .filter(|di| di.instance() != INVALID_INSTANCE)
        else {
            if self.failed_finds < MAX_REPORTED_FAILED_FINDS {
                tracing::error!(device = %self.device, "unable to find disk in device map");
                self.failed_finds += 1;
            } else if self.failed_finds == MAX_REPORTED_FAILED_FINDS {
                tracing::error!(
                    device = %self.device,
                    "unable to find disk in device map; this has happened {} times in a row and will not be reported again",
                    MAX_REPORTED_FAILED_FINDS
                );
                self.failed_finds += 1;
            }
            return;
        };
        self.failed_finds = 0;
        self.samplers.time_stamp.push(now_secs());

        let lookup = |index: i64| -> Option<super::depend::PstLvInfo> {
            if index < 0 {
                return None;
            }
            self.deps.pstat_getlv(index).ok().flatten()
        };
        let info = match lookup(di.instance()) {
            Some(info) => info,
            None => {
                // The table may have been reordered.
                di.set_instance(self.find_lv_info_by_id(di.dev_id).unwrap_or(INVALID_INSTANCE));
                match lookup(di.instance()) {
                    Some(info) => info,
                    None => {
                        tracing::trace!(device = %self.device, "no lv instance");
                        return;
                    }
                }
            }
        };
        if di.dev_id != pstat_device_id(info.dev_major, info.dev_minor) {
            tracing::warn!(device = %self.device, "lv instance changed");
            di.set_instance(self.find_lv_info_by_id(di.dev_id).unwrap_or(INVALID_INSTANCE));
            return;
        }
        self.samplers
            .push_io(info.read_transfers, info.write_transfers, info.read_bytes, info.write_bytes);
    }

    fn sample_physical_solaris(&mut self) {
        match self.deps.read_kstat_disk(&self.device) {
            Ok(Some(k)) => {
                self.samplers.push_io(k.reads, k.writes, k.bytes_read, k.bytes_written);
                let s = &mut self.samplers;
                s.run_times.push(k.run_time_ms);
                s.wait_times.push(k.wait_time_ms);
                s.r_times.push(k.run_time_ms);
                s.w_times.push(k.wait_time_ms);
                s.time_stamp.push(k.snap_time_ms);
                tracing::trace!(device = %self.device, reads = k.reads, writes = k.writes, "kstat sample");
            }
            Ok(None) => {
                tracing::debug!(device = %self.device, "unable to determine kstat parameters");
            }
            Err(e) => {
                tracing::error!(device = %self.device, error = %e, "reading kstat failed");
            }
        }
    }

    fn sample_logical_solaris(&mut self) {
        match self.deps.read_kstat_fs(&self.device, &self.mount_point) {
            Ok(Some(k)) => {
                self.samplers
                    .push_io(k.read_ops, k.write_ops, k.bytes_read, k.bytes_written);
            }
            Ok(None) => {
                tracing::debug!(device = %self.device, "unable to determine kstat parameters");
            }
            Err(e) => {
                tracing::error!(device = %self.device, error = %e, "reading kstat failed");
            }
        }
    }

    /// Index of the pstat disk entry with the given encoded device id, -1 when
    /// absent. Only HP-UX has the table; elsewhere the answer is always -1.
    pub fn find_disk_info_by_id(&self, id: i64) -> Result<i64, PalError> {
        if self.platform == Platform::HpUx {
            let mut index = 0;
            while let Some(info) = self.deps.pstat_getdisk(index)? {
                if id == pstat_device_id(info.dev_major, info.dev_minor) {
                    return Ok(index);
                }
                index += 1;
            }
        }
        tracing::trace!(id, "find_disk_info_by_id found no match");
        Ok(INVALID_INSTANCE)
    }

    /// Index of the pstat logical volume entry with the given encoded device id.
    pub fn find_lv_info_by_id(&self, id: i64) -> Result<i64, PalError> {
        if self.platform != Platform::HpUx {
            return Err(PalError::NotSupported(format!("unable to find lv id: {}", id)));
        }
        let mut index = 0;
        while let Some(info) = self.deps.pstat_getlv(index)? {
            if id == pstat_device_id(info.dev_major, info.dev_minor) {
                return Ok(index);
            }
            index += 1;
        }
        Ok(INVALID_INSTANCE)
    }

    fn multi_device(&self) -> bool {
        self.sampler_devices.len() > 1
    }

    // Per-second rates are unknowable for volumes spanning several devices.
    fn single_device_rate(&self, value: u64) -> u64 {
        if self.multi_device() { 0 } else { value }
    }

    fn rates_unsupported(&self) -> bool {
        matches!(
            (self.kind, self.platform),
            (DiskKind::Logical, Platform::Aix) | (DiskKind::Physical, Platform::HpUx)
        )
    }

    pub fn disk_device_id(&self) -> String {
        file_name(&self.device).to_string()
    }

    pub fn disk_name(&self) -> String {
        self.id.clone()
    }

    pub fn reads_per_second(&self) -> Option<u64> {
        if self.rates_unsupported() {
            return None;
        }
        Some(self.single_device_rate(self.metrics.reads_per_sec))
    }

    pub fn writes_per_second(&self) -> Option<u64> {
        if self.rates_unsupported() {
            return None;
        }
        Some(self.single_device_rate(self.metrics.writes_per_sec))
    }

    pub fn transfers_per_second(&self) -> Option<u64> {
        if (self.kind, self.platform) == (DiskKind::Logical, Platform::Aix) {
            return None;
        }
        Some(self.single_device_rate(self.metrics.transfers_per_sec))
    }

    /// (read, write) bytes per second.
    pub fn bytes_per_second(&self) -> Option<(u64, u64)> {
        if self.rates_unsupported() {
            return None;
        }
        Some((
            self.single_device_rate(self.metrics.r_bytes_per_sec),
            self.single_device_rate(self.metrics.w_bytes_per_sec),
        ))
    }

    pub fn bytes_per_second_total(&self) -> Option<u64> {
        if (self.kind, self.platform) == (DiskKind::Logical, Platform::Aix) {
            return None;
        }
        Some(self.single_device_rate(self.metrics.t_bytes_per_sec))
    }

    /// Per-operation busy percentage is not exposed by any supported platform.
    pub fn io_percentage(&self) -> Option<(u64, u64)> {
        None
    }

    pub fn io_percentage_total(&self) -> Option<u64> {
        (self.platform == Platform::Solaris).then_some(self.metrics.t_percentage)
    }

    /// Seconds per (read, write) operation.
    pub fn io_times(&self) -> Option<(f64, f64)> {
        if self.kind == DiskKind::Logical && matches!(self.platform, Platform::Aix | Platform::Linux) {
            return None;
        }
        if self.multi_device() {
            return Some((0.0, 0.0));
        }
        match self.platform {
            Platform::Aix | Platform::Linux => Some((self.metrics.sec_per_read, self.metrics.sec_per_write)),
            Platform::Solaris | Platform::HpUx => None,
        }
    }

    pub fn io_times_total(&self) -> Option<f64> {
        if self.kind == DiskKind::Logical && matches!(self.platform, Platform::Aix | Platform::Linux) {
            return None;
        }
        Some(if self.multi_device() { 0.0 } else { self.metrics.sec_per_transfer })
    }

    pub fn disk_queue_length(&self) -> Option<f64> {
        if self.kind == DiskKind::Logical && self.platform != Platform::Solaris {
            return None;
        }
        Some(self.metrics.q_length)
    }

    /// (used, free) megabytes.
    pub fn disk_size(&self) -> Option<(u64, u64)> {
        match self.kind {
            DiskKind::Physical => None,
            DiskKind::Logical => Some((self.metrics.mb_used, self.metrics.mb_free)),
        }
    }

    /// (total, free) inodes; None for filesystems without inodes.
    pub fn inode_usage(&self) -> Option<(u64, u64)> {
        (self.metrics.inodes_total != 0).then_some((self.metrics.inodes_total, self.metrics.inodes_free))
    }

    pub fn block_size(&self) -> Option<u64> {
        match self.kind {
            DiskKind::Physical => None,
            DiskKind::Logical => Some(self.metrics.block_size),
        }
    }

    pub fn health_state(&self) -> Option<bool> {
        Some(self.online)
    }

    pub fn fs_type(&self) -> Option<String> {
        Some(self.fs_type.clone())
    }

    /// Latest raw counters; None until every counter involved has a sample.
    pub fn last_metrics(&self) -> Option<LastMetrics> {
        match self.kind {
            DiskKind::Logical => self.last_metrics_logical(),
            DiskKind::Physical => self.last_metrics_physical(),
        }
    }

    fn last_metrics_logical(&self) -> Option<LastMetrics> {
        if self.platform == Platform::Aix {
            return Some(LastMetrics::default());
        }
        let s = &self.samplers;
        Some(LastMetrics {
            reads: s.reads.latest()?,
            writes: s.writes.latest()?,
            bytes_read: s.r_bytes.latest()?,
            bytes_written: s.w_bytes.latest()?,
            ms_read: 0,
            ms_written: 0,
        })
    }

    fn last_metrics_physical(&self) -> Option<LastMetrics> {
        let s = &self.samplers;
        let mut last = LastMetrics::default();
        match self.platform {
            Platform::Aix => {
                last.reads = s.transfers.latest()?;
                last.bytes_read = s.r_bytes.latest()?;
                last.bytes_written = s.w_bytes.latest()?;
                last.ms_read = s.r_times.latest()?;
                last.ms_written = s.w_times.latest()?;
            }
            Platform::HpUx => {
                last.reads = s.transfers.latest()?;
                last.bytes_read = s.t_bytes.latest()?;
                let total = s.t_times.latest()?;
                last.ms_written = s.wait_times.latest()?;
                last.ms_read = total.wrapping_sub(last.ms_written);
            }
            Platform::Linux => {
                last.reads = s.reads.latest()?;
                last.writes = s.writes.latest()?;
                last.bytes_read = s.r_bytes.latest()?;
                last.bytes_written = s.w_bytes.latest()?;
                last.ms_read = s.r_times.latest()?;
                last.ms_written = s.w_times.latest()?;
            }
            Platform::Solaris => {
                last.reads = s.reads.latest()?;
                last.writes = s.writes.latest()?;
                last.bytes_read = s.r_bytes.latest()?;
                last.bytes_written = s.w_bytes.latest()?;
            }
        }
        Some(last)
    }
}
