// Discovery of logical (mounted) and physical disks, periodic sampling, and
// the "_Total" aggregate.

use super::depend::{DiskDepend, INVALID_INSTANCE, file_name};
use super::lvm;
use super::statistical::{DiskKind, IoDeltas, StatisticalDiskInstance};
use crate::entity::{EntityEnumeration, Handle, SampleSource, lock};
use crate::error::PalError;
use crate::log_suppressor::LogSuppressor;
use crate::platform::Platform;
use crate::sampler::SamplingPolicy;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, LazyLock};
use tracing::{Level, instrument};

static DM_SUPPRESSOR: LazyLock<LogSuppressor> =
    LazyLock::new(|| LogSuppressor::new(Level::ERROR, Level::TRACE));
static PHYSICAL_SUPPRESSOR: LazyLock<LogSuppressor> =
    LazyLock::new(|| LogSuppressor::new(Level::ERROR, Level::TRACE));

fn add(acc: &mut u64, value: u64) {
    *acc = acc.saturating_add(value);
}

pub struct StatisticalDiskEnumeration {
    deps: Arc<dyn DiskDepend>,
    kind: DiskKind,
    policy: SamplingPolicy,
    platform: Platform,
    disks: EntityEnumeration<StatisticalDiskInstance>,
    /// HP-UX device path -> st_rdev, filled one directory at a time.
    path_to_rdev: HashMap<String, i64>,
}

impl StatisticalDiskEnumeration {
    /// One instance per mounted filesystem.
    pub fn logical(deps: Arc<dyn DiskDepend>, policy: SamplingPolicy) -> Self {
        Self::new(deps, DiskKind::Logical, policy)
    }

    /// One instance per physical disk backing a mounted filesystem.
    pub fn physical(deps: Arc<dyn DiskDepend>, policy: SamplingPolicy) -> Self {
        Self::new(deps, DiskKind::Physical, policy)
    }

    fn new(deps: Arc<dyn DiskDepend>, kind: DiskKind, policy: SamplingPolicy) -> Self {
        Self {
            platform: deps.platform(),
            deps,
            kind,
            policy,
            disks: EntityEnumeration::new(),
            path_to_rdev: HashMap::new(),
        }
    }

    pub fn kind(&self) -> DiskKind {
        self.kind
    }

    /// Create the total instance and run the first discovery.
    pub fn init(&mut self) {
        let total = StatisticalDiskInstance::new(self.deps.clone(), self.kind, self.policy, true);
        self.disks.set_total(total);
        self.update(false);
    }

    /// Rediscover disks; optionally recompute every instance and the total.
    pub fn update(&mut self, update_instances: bool) {
        match self.kind {
            DiskKind::Logical => self.find_logical_disks(),
            DiskKind::Physical => self.find_physical_disks(),
        }
        if update_instances {
            self.update_instances();
        }
    }

    #[instrument(skip(self), fields(subsystem = "disk", operation = "update_instances"))]
    pub fn update_instances(&mut self) {
        let mut io = IoDeltas::default();
        let mut total_r_percent = 0u64;
        let mut total_w_percent = 0u64;
        let mut total_t_percent = 0u64;

        let total = self.disks.total();
        if let Some(total) = &total {
            let mut t = lock(total);
            t.reset();
            t.online = true;
        }

        let mut seen_devices = HashSet::new();
        for handle in self.disks.iter() {
            let mut disk = lock(handle);
            disk.update();

            // zfs datasets of one pool all report the pool's free space; only
            // the pool itself (no '/' in its name) counts toward the total.
            let exclude_free = self.platform == Platform::Solaris
                && disk.fs_type == "zfs"
                && disk.device.contains('/');

            // Several mount points may share a device (bind mounts).
            if self.kind == DiskKind::Logical && !seen_devices.insert(disk.device.clone()) {
                continue;
            }

            let Some(total) = &total else {
                continue;
            };
            let mut t = lock(total);
            let m = &disk.metrics;
            let tm = &mut t.metrics;
            add(&mut tm.reads_per_sec, m.reads_per_sec);
            add(&mut tm.writes_per_sec, m.writes_per_sec);
            add(&mut tm.transfers_per_sec, m.transfers_per_sec);
            add(&mut tm.r_bytes_per_sec, m.r_bytes_per_sec);
            add(&mut tm.w_bytes_per_sec, m.w_bytes_per_sec);
            add(&mut tm.t_bytes_per_sec, m.t_bytes_per_sec);
            add(&mut tm.r_time, m.r_time);
            add(&mut tm.w_time, m.w_time);
            add(&mut tm.t_time, m.t_time);
            add(&mut tm.run_time, m.run_time);
            add(&mut tm.wait_time, m.wait_time);
            add(&mut tm.mb_used, m.mb_used);
            if !exclude_free {
                add(&mut tm.mb_free, m.mb_free);
            }

            match disk.io_deltas() {
                Some(d) => {
                    add(&mut io.reads, d.reads);
                    add(&mut io.writes, d.writes);
                    add(&mut io.transfers, d.transfers);
                    add(&mut io.r_time, d.r_time);
                    add(&mut io.w_time, d.w_time);
                    add(&mut io.t_time, d.t_time);
                }
                None => {
                    tracing::debug!(disk = %disk.disk_name(), "counter reset inside the window; left out of total times");
                }
            }
            add(&mut total_r_percent, m.r_percentage);
            add(&mut total_w_percent, m.w_percentage);
            add(&mut total_t_percent, m.t_percentage);
        }

        let Some(total) = total else {
            return;
        };
        let mut t = lock(&total);
        let count = self.disks.len() as u64;
        if count > 0 {
            t.metrics.r_percentage = total_r_percent / count;
            t.metrics.w_percentage = total_w_percent / count;
            t.metrics.t_percentage = total_t_percent / count;
        }
        if io.reads != 0 {
            t.metrics.sec_per_read = io.r_time as f64 / io.reads as f64 / 1000.0;
        }
        if io.writes != 0 {
            t.metrics.sec_per_write = io.w_time as f64 / io.writes as f64 / 1000.0;
        }
        if io.transfers != 0 {
            t.metrics.sec_per_transfer = match self.platform {
                Platform::HpUx => io.t_time as f64 / io.transfers as f64 / 1000.0,
                Platform::Linux | Platform::Solaris => {
                    io.r_time.saturating_add(io.w_time) as f64 / io.transfers as f64 / 1000.0
                }
                Platform::Aix => 0.0,
            };
        }
    }

    /// Push one sample into every instance.
    pub fn sample_disks(&self) {
        if self.platform == Platform::Linux
            && let Err(e) = self.deps.refresh_proc_disk_stats()
        {
            tracing::warn!(error = %e, operation = "refresh_proc_disk_stats", "diskstats refresh failed");
        }
        for handle in self.disks.iter() {
            lock(handle).sample();
        }
    }

    /// Instance whose device (full path or file name) matches `device`,
    /// optionally also searching sampler devices.
    pub fn find_disk_by_device(
        &self,
        device: &str,
        include_sampler_devices: bool,
    ) -> Option<Handle<StatisticalDiskInstance>> {
        if let Some(total) = self.disks.total()
            && lock(&total).device == device
        {
            return Some(total);
        }
        let matches = |candidate: &str| candidate == device || file_name(candidate) == device;
        self.disks
            .iter()
            .find(|handle| {
                let disk = lock(handle);
                matches(&disk.device)
                    || (include_sampler_devices && disk.sampler_devices.iter().any(|d| matches(d)))
            })
            .cloned()
    }

    /// Physical disk for `device`, created when unknown. A known disk is marked
    /// online and returned as is so its samples carry forward.
    pub fn add_disk_instance(&mut self, name: &str, device: &str) -> Handle<StatisticalDiskInstance> {
        self.add_or_reuse(name, device).0
    }

    fn add_or_reuse(&mut self, name: &str, device: &str) -> (Handle<StatisticalDiskInstance>, bool) {
        if let Some(existing) = self.find_disk_by_device(device, false) {
            lock(&existing).online = true;
            return (existing, false);
        }
        let mut disk = StatisticalDiskInstance::new(self.deps.clone(), self.kind, self.policy, false);
        disk.set_id(name);
        disk.set_device(device);
        disk.set_online(true);
        (self.disks.add(disk), true)
    }

    pub fn remove_instance_by_id(&mut self, id: &str) -> bool {
        self.disks.remove(id).is_some()
    }

    pub fn total(&self) -> Option<Handle<StatisticalDiskInstance>> {
        self.disks.total()
    }

    pub fn instances(&self) -> Vec<Handle<StatisticalDiskInstance>> {
        self.disks.instances()
    }

    pub fn get(&self, id: &str) -> Option<Handle<StatisticalDiskInstance>> {
        self.disks.get(id)
    }

    pub fn len(&self) -> usize {
        self.disks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.disks.is_empty()
    }

    fn mark_all_offline(&self) {
        for handle in self.disks.iter() {
            lock(handle).online = false;
        }
    }

    #[instrument(skip(self), fields(subsystem = "disk", operation = "find_logical_disks"))]
    fn find_logical_disks(&mut self) {
        self.mark_all_offline();
        if let Err(e) = self.deps.refresh_mnt_tab(None) {
            tracing::error!(error = %e, "unable to read mount table");
            return;
        }

        for entry in self.deps.get_mnt_tab() {
            if self.deps.file_system_ignored(&entry.file_system) || self.deps.device_ignored(&entry.device) {
                continue;
            }
            let handle = match self.disks.get(&entry.mount_point) {
                Some(handle) => handle,
                None => {
                    let mut disk = StatisticalDiskInstance::new(self.deps.clone(), self.kind, self.policy, false);
                    disk.set_device(&entry.device);
                    disk.set_mount_point(&entry.mount_point);
                    disk.set_fs_type(&entry.file_system);
                    disk.set_id(&entry.mount_point);

                    if self.platform == Platform::Linux && lvm::is_dm_device(&entry.device) {
                        match lvm::get_dm_device(self.deps.as_ref(), &entry.device) {
                            Ok(Some(dm)) => disk.add_sampler_device(&dm),
                            Ok(None) => {}
                            Err(e) => {
                                let msg = format!("unable to resolve dm device for {}: {}", entry.device, e);
                                DM_SUPPRESSOR.log(&entry.device, &msg);
                            }
                        }
                    }

                    if self.platform == Platform::HpUx {
                        match self.path_to_rdev(&entry.device) {
                            Ok(rdev) => {
                                let index = disk.find_lv_info_by_id(rdev).unwrap_or(INVALID_INSTANCE);
                                self.deps.add_device_instance(&entry.device, "", index, rdev);
                            }
                            Err(e) => {
                                tracing::warn!(device = %entry.device, error = %e, "unable to resolve device id");
                            }
                        }
                    }
                    tracing::debug!(mount_point = %entry.mount_point, device = %entry.device, "new logical disk");
                    self.disks.add(disk)
                }
            };
            lock(&handle).online = true;
        }
    }

    #[instrument(skip(self), fields(subsystem = "disk", operation = "find_physical_disks"))]
    fn find_physical_disks(&mut self) {
        self.mark_all_offline();
        if let Err(e) = self.deps.refresh_mnt_tab(None) {
            tracing::error!(error = %e, "unable to read mount table");
            return;
        }

        for entry in self.deps.get_mnt_tab() {
            if self.deps.file_system_ignored(&entry.file_system)
                || self.deps.device_ignored(&entry.device)
                || !self
                    .deps
                    .link_to_physical_exists(&entry.file_system, &entry.device, &entry.mount_point)
            {
                continue;
            }
            let devices = self.deps.get_physical_devices(&entry.device);
            if devices.is_empty() {
                let msg = format!("unable to locate physical devices for: {}", entry.device);
                PHYSICAL_SUPPRESSOR.log(&entry.device, &msg);
                continue;
            }
            for (name, device) in devices {
                let (handle, created) = self.add_or_reuse(&name, &device);
                if created {
                    tracing::debug!(name = %name, device = %device, "new physical disk");
                    if self.platform == Platform::HpUx {
                        self.register_hpux_disk(&handle);
                    }
                }
            }
        }
    }

    fn register_hpux_disk(&mut self, handle: &Handle<StatisticalDiskInstance>) {
        let disk = lock(handle);
        match self.path_to_rdev(&disk.device) {
            Ok(rdev) => {
                let index = disk.find_disk_info_by_id(rdev).unwrap_or(INVALID_INSTANCE);
                self.deps.add_device_instance(&disk.device, "", index, rdev);
            }
            Err(e) => {
                tracing::warn!(device = %disk.device, error = %e, "unable to resolve device id");
            }
        }
    }

    /// `st_rdev` of a device path, caching every entry of its directory.
    pub fn path_to_rdev(&mut self, device: &str) -> Result<i64, PalError> {
        if let Some(rdev) = self.path_to_rdev.get(device) {
            return Ok(*rdev);
        }
        let dir = Path::new(device)
            .parent()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();
        for file in self.deps.get_files_in_directory(&dir)? {
            let path = file.to_string_lossy().into_owned();
            if let Ok(st) = self.deps.stat(&path) {
                self.path_to_rdev.insert(path, st.rdev as i64);
            }
        }
        self.path_to_rdev
            .get(device)
            .copied()
            .ok_or_else(|| PalError::InternalError(format!("no device id found for {}", device)))
    }
}

impl SampleSource for StatisticalDiskEnumeration {
    fn name(&self) -> &'static str {
        match self.kind {
            DiskKind::Logical => "logical_disk",
            DiskKind::Physical => "physical_disk",
        }
    }

    fn sample(&mut self) {
        self.sample_disks();
    }
}

impl std::fmt::Debug for StatisticalDiskEnumeration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatisticalDiskEnumeration")
            .field("kind", &self.kind)
            .field("platform", &self.platform)
            .field("disks", &self.disks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityInstance;

    #[test]
    fn total_instance_uses_reserved_id() {
        let deps: Arc<dyn DiskDepend> = Arc::new(crate::disk::linux::DiskDependDefault::with_paths(
            Platform::Linux,
            "/nonexistent/mtab",
            "/nonexistent/diskstats",
            "/nonexistent/partitions",
        ));
        let mut disks = StatisticalDiskEnumeration::logical(deps, SamplingPolicy::default());
        disks.init();
        let total = disks.total().map(|t| lock(&t).id().to_string());
        assert_eq!(total.as_deref(), Some(crate::entity::TOTAL_ID));
        assert!(disks.is_empty());
    }
}
