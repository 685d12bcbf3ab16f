// Boundary between disk statistics and the OS. Every method maps to one raw
// source (a file read, a syscall, a kernel statistics query) so collectors can
// be driven by canned data in tests.

use crate::error::PalError;
use crate::platform::Platform;
use crate::process::ProcessOutput;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Instance index marking a device that could not be resolved.
pub const INVALID_INSTANCE: i64 = -1;

/// One row of the mount table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MntTabEntry {
    pub device: String,
    pub mount_point: String,
    pub file_system: String,
    /// Hex `dev=` value from the options column, empty when absent.
    pub dev_attribute: String,
}

/// Restricts a mount table refresh to the first matching row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MntTabFilter {
    MountPoint(String),
    /// Matches rows whose device contains this text.
    Device(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum DiskInterfaceType {
    Unknown,
    Ide,
    Scsi,
    Virtual,
}

/// Cached mapping of a device path to its kernel statistics slot.
#[derive(Debug)]
pub struct DeviceInstance {
    pub name: String,
    pub instance: AtomicI64,
    pub dev_id: i64,
}

impl DeviceInstance {
    pub fn new(name: &str, instance: i64, dev_id: i64) -> Self {
        Self {
            name: name.to_string(),
            instance: AtomicI64::new(instance),
            dev_id,
        }
    }

    pub fn instance(&self) -> i64 {
        self.instance.load(Ordering::Relaxed)
    }

    pub fn set_instance(&self, instance: i64) {
        self.instance.store(instance, Ordering::Relaxed);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatVfs {
    pub block_size: u64,
    pub fragment_size: u64,
    pub blocks: u64,
    pub blocks_free: u64,
    pub blocks_available: u64,
    pub files: u64,
    pub files_free: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileStat {
    pub rdev: u64,
    pub rdev_major: u64,
    pub rdev_minor: u64,
}

impl FileStat {
    pub fn from_rdev(rdev: u64) -> Self {
        Self {
            rdev,
            rdev_major: ((rdev >> 32) & 0xffff_f000) | ((rdev >> 8) & 0x0fff),
            rdev_minor: ((rdev >> 12) & 0xffff_ff00) | (rdev & 0x00ff),
        }
    }
}

/// Device id as encoded by the pstat tables.
pub fn pstat_device_id(major: i64, minor: i64) -> i64 {
    (major << 24) | minor
}

/// `pst_diskinfo` fields used for physical disk statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PstDiskInfo {
    pub dev_major: i64,
    pub dev_minor: i64,
    pub transfers: u64,
    /// Transferred data in 64-byte words.
    pub words: u64,
    pub response_ms: u64,
    pub wait_ms: u64,
    pub queue_length: u64,
}

/// `pst_lvinfo` fields used for logical volume statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PstLvInfo {
    pub dev_major: i64,
    pub dev_minor: i64,
    pub read_transfers: u64,
    pub write_transfers: u64,
    pub read_bytes: u64,
    pub write_bytes: u64,
}

/// `perfstat_disk_t` fields used for physical disk statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PerfstatDisk {
    pub transfers: u64,
    pub read_blocks: u64,
    pub write_blocks: u64,
    pub block_size: u64,
    /// Busy time in seconds.
    pub time: u64,
    pub read_service_ticks: u64,
    pub write_service_ticks: u64,
    /// Hardware ticks to nanoseconds.
    pub xint_frac: f64,
    pub queue_depth: u64,
}

/// Solaris kstat I/O record for a disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KstatIo {
    pub reads: u64,
    pub writes: u64,
    pub bytes_read: u64,
    pub bytes_written: u64,
    pub run_time_ms: u64,
    pub wait_time_ms: u64,
    pub snap_time_ms: u64,
}

/// Solaris per-filesystem vopstat sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KstatFs {
    pub read_ops: u64,
    pub write_ops: u64,
    pub bytes_read: u64,
    pub bytes_written: u64,
}

pub trait DiskDepend: Send + Sync {
    /// OS family whose collection rules apply.
    fn platform(&self) -> Platform;

    fn locate_mount_tab(&self) -> PathBuf;
    fn locate_proc_disk_stats(&self) -> PathBuf;
    fn locate_proc_partitions(&self) -> PathBuf;

    /// Re-read the diskstats table. Never called implicitly.
    fn refresh_proc_disk_stats(&self) -> Result<(), PalError>;

    /// Tokens of the diskstats row for `device` (`/dev/` prefix or bare name),
    /// empty when the device is unknown.
    fn get_proc_disk_stats(&self, device: &str) -> Vec<String>;

    /// Entries of a directory; unreadable directories are errors, not empty.
    fn get_files_in_directory(&self, path: &str) -> Result<Vec<PathBuf>, PalError>;

    /// Re-read the mount table. Never called implicitly.
    fn refresh_mnt_tab(&self, filter: Option<&MntTabFilter>) -> Result<(), PalError>;
    fn get_mnt_tab(&self) -> Vec<MntTabEntry>;

    fn file_system_ignored(&self, fs: &str) -> bool;
    fn device_ignored(&self, device: &str) -> bool;
    fn link_to_physical_exists(&self, fs: &str, device: &str, mount_point: &str) -> bool;
    fn device_to_interface_type(&self, device: &str) -> DiskInterfaceType;

    /// Physical disks (name -> device path) backing a mounted device.
    fn get_physical_devices(&self, device: &str) -> BTreeMap<String, String>;

    fn add_device_instance(&self, device: &str, name: &str, instance: i64, dev_id: i64);
    fn find_device_instance(&self, device: &str) -> Option<Arc<DeviceInstance>>;

    fn statvfs(&self, path: &str) -> Result<StatVfs, PalError>;
    fn stat(&self, path: &str) -> Result<FileStat, PalError>;
    fn file_exists(&self, path: &str) -> bool;
    fn read_link(&self, path: &str) -> Result<PathBuf, PalError>;
    fn read_to_string(&self, path: &str) -> Result<String, PalError>;

    fn run(&self, command: &str, stdin: &str, timeout: Duration) -> Result<ProcessOutput, PalError>;

    /// `pstat_getdisk` for one index: `Ok(None)` past the last disk.
    fn pstat_getdisk(&self, index: i64) -> Result<Option<PstDiskInfo>, PalError> {
        let _ = index;
        Err(PalError::NotSupported("pstat_getdisk".into()))
    }

    /// `pstat_getlv` for one index: `Ok(None)` past the last volume.
    fn pstat_getlv(&self, index: i64) -> Result<Option<PstLvInfo>, PalError> {
        let _ = index;
        Err(PalError::NotSupported("pstat_getlv".into()))
    }

    /// Disk names in perfstat order, from FIRST_DISKPATH until the walk wraps.
    fn perfstat_disk_names(&self) -> Result<Vec<String>, PalError> {
        Err(PalError::NotSupported("perfstat_disk".into()))
    }

    fn perfstat_disk(&self, name: &str) -> Result<PerfstatDisk, PalError> {
        let _ = name;
        Err(PalError::NotSupported("perfstat_disk".into()))
    }

    /// `Ok(None)` when the kstat module for the device cannot be determined.
    fn read_kstat_disk(&self, device: &str) -> Result<Option<KstatIo>, PalError> {
        let _ = device;
        Err(PalError::NotSupported("kstat".into()))
    }

    fn read_kstat_fs(&self, device: &str, mount_point: &str) -> Result<Option<KstatFs>, PalError> {
        let _ = (device, mount_point);
        Err(PalError::NotSupported("kstat".into()))
    }
}

/// Strip trailing digits, or one trailing character when the name does not end in a digit.
pub fn remove_tail_number_or_other(s: &str) -> &str {
    if s.is_empty() {
        return s;
    }
    if s.ends_with(|c: char| c.is_ascii_digit()) {
        s.trim_end_matches(|c: char| c.is_ascii_digit())
    } else {
        let mut end = s.len() - 1;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        &s[..end]
    }
}

/// Final path component, or the whole string when there is none.
pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remove_tail_strips_all_digits() {
        assert_eq!(remove_tail_number_or_other("/dev/sda12"), "/dev/sda");
        assert_eq!(remove_tail_number_or_other("/dev/sda"), "/dev/sd");
        assert_eq!(remove_tail_number_or_other(""), "");
    }

    #[test]
    fn file_stat_splits_major_minor() {
        let st = FileStat::from_rdev((8 << 8) | 1);
        assert_eq!(st.rdev_major, 8);
        assert_eq!(st.rdev_minor, 1);
    }

    #[test]
    fn pstat_id_encodes_major_in_high_bits() {
        assert_eq!(pstat_device_id(31, 5), (31 << 24) | 5);
    }
}
