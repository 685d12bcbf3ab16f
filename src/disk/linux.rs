// Production DiskDepend: procfs and mount table parsing, statvfs/stat through
// nix, device-mapper and partition-name heuristics for physical disks, and the
// volume-group resolvers on AIX and HP-UX.

use super::depend::{
    DeviceInstance, DiskDepend, DiskInterfaceType, FileStat, MntTabEntry, MntTabFilter, StatVfs,
    file_name, remove_tail_number_or_other,
};
use super::{lvm, volume_group};
use crate::config::DiskConfig;
use crate::error::PalError;
use crate::log_suppressor::LogSuppressor;
use crate::platform::Platform;
use crate::process::{self, ProcessOutput};
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, Mutex};
use std::time::Duration;
use tracing::Level;

/// Device -> kernel statistics slot, shared by every dependency in the process.
static DEVICE_MAP: LazyLock<Mutex<HashMap<String, Arc<DeviceInstance>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

static SOLARIS_PARTITION_NAME: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"c[0-9]+(t[0-9])?d[0-9][ps][0-9]+").ok());

const IGNORED_FS: &[&str] = &[
    "autofs", "bdev", "binfmt_misc", "cachefs", "cdfs", "cdrfs", "cifs", "cgroup", "configfs",
    "ctfs", "debugfs", "devfs", "devpts", "eventpollfs", "fd", "ffs", "fifofs", "fusectl",
    "futexfs", "hugetlbfs", "hsfs", "inotifyfs", "iso9660", "lofs", "mntfs", "mqueue", "mvfs",
    "namefs", "none", "objfs", "pipefs", "proc", "procfs", "pstore", "ramfs", "rootfs",
    "rpc_pipefs", "securityfs", "selinuxfs", "sharefs", "sockfs", "specfs", "subfs", "sysfs",
    "tmpfs", "udfs", "usbfs", "vmblock", "vmhgfs", "vmware-hgfs",
];
const IGNORED_FS_LINUX: &[&str] = &["devtmpfs", "efivarfs", "fuse.lxcfs", "udev", "tracefs"];
const IGNORED_FS_PREFIX: &[&str] = &["nfs"];
const IGNORED_FS_CONTAINS: &[&str] = &["gvfs"];

/// Parse /proc/diskstats into rows keyed by device name (third column).
pub fn parse_disk_stats(content: &str) -> HashMap<String, Vec<String>> {
    let mut map = HashMap::new();
    for line in content.lines() {
        let parts: Vec<String> = line.split_whitespace().map(str::to_string).collect();
        if parts.len() < 3 {
            continue;
        }
        map.insert(parts[2].clone(), parts);
    }
    map
}

/// Parse a mount table. `resolve_uuid` maps a /dev/disk/by-uuid link to the
/// device it points at, or returns None to keep the link path.
pub fn parse_mount_tab(
    content: &str,
    platform: Platform,
    filter: Option<&MntTabFilter>,
    mut resolve_uuid: impl FnMut(&str) -> Option<String>,
) -> Vec<MntTabEntry> {
    let mut entries = Vec::new();
    for line in content.lines() {
        if platform == Platform::Linux && (line.contains("loop=") || line.contains("/dev/loop")) {
            continue;
        }
        let mut parts: Vec<String> = line.split_whitespace().map(str::to_string).collect();
        if parts.len() <= 3 || parts[0].contains('#') {
            continue;
        }
        if platform == Platform::Linux {
            // Pseudo filesystems have no block device path.
            if !parts[0].contains('/') {
                continue;
            }
            if parts[0].starts_with("/dev/disk/by-uuid/")
                && let Some(resolved) = resolve_uuid(&parts[0])
            {
                parts[0] = resolved;
            }
        }
        match filter {
            Some(MntTabFilter::MountPoint(mp)) if !mp.is_empty() && parts[1] != *mp => continue,
            Some(MntTabFilter::Device(dev)) if !dev.is_empty() && !parts[0].contains(dev.as_str()) => continue,
            _ => {}
        }

        let dev_attribute = parts[3]
            .find("dev=")
            .map(|pos| {
                parts[3][pos + 4..]
                    .chars()
                    .take_while(|c| c.is_ascii_digit() || ('a'..='f').contains(c))
                    .collect()
            })
            .unwrap_or_default();

        tracing::trace!(device = %parts[0], mount_point = %parts[1], fs = %parts[2], "mount table entry");
        entries.push(MntTabEntry {
            device: parts[0].clone(),
            mount_point: parts[1].clone(),
            file_system: parts[2].clone(),
            dev_attribute,
        });
        if filter.is_some() {
            break;
        }
    }
    entries
}

pub struct DiskDependDefault {
    platform: Platform,
    mount_tab: PathBuf,
    proc_disk_stats: PathBuf,
    proc_partitions: PathBuf,
    disk_stats: Mutex<HashMap<String, Vec<String>>>,
    mnt_tab: Mutex<Vec<MntTabEntry>>,
    stats_miss: LogSuppressor,
    mnt_errors: LogSuppressor,
    no_link: LogSuppressor,
    physical_errors: LogSuppressor,
}

impl DiskDependDefault {
    pub fn new(config: &DiskConfig) -> Self {
        Self::with_paths(
            Platform::current(),
            &config.mount_tab,
            &config.proc_disk_stats,
            &config.proc_partitions,
        )
    }

    pub fn with_paths(
        platform: Platform,
        mount_tab: impl AsRef<Path>,
        proc_disk_stats: impl AsRef<Path>,
        proc_partitions: impl AsRef<Path>,
    ) -> Self {
        Self {
            platform,
            mount_tab: mount_tab.as_ref().to_path_buf(),
            proc_disk_stats: proc_disk_stats.as_ref().to_path_buf(),
            proc_partitions: proc_partitions.as_ref().to_path_buf(),
            disk_stats: Mutex::new(HashMap::new()),
            mnt_tab: Mutex::new(Vec::new()),
            stats_miss: LogSuppressor::new(Level::WARN, Level::TRACE),
            mnt_errors: LogSuppressor::new(Level::WARN, Level::TRACE),
            no_link: LogSuppressor::new(Level::WARN, Level::TRACE),
            physical_errors: LogSuppressor::new(Level::ERROR, Level::TRACE),
        }
    }

    fn file_system_no_link_to_physical(&self, fs: &str) -> bool {
        let fs = fs.to_lowercase();
        (fs == "vxfs" && self.platform != Platform::HpUx) || fs == "zfs"
    }

    /// Walk a partition path back to the disk it lives on, e.g. /dev/sda5 -> /dev/sda
    /// or /dev/dsk/c0t0d0s3 -> /dev/dsk/c0t0d0.
    pub fn guess_physical_from_logical_device(&self, logical: &str) -> String {
        let Some(solaris) = SOLARIS_PARTITION_NAME.as_ref() else {
            tracing::error!("partition name pattern failed to compile");
            return String::new();
        };
        if solaris.is_match(file_name(logical)) {
            // Drop the slice number, then the 'p' or 's' marker.
            let stripped = remove_tail_number_or_other(logical);
            let physical = &stripped[..stripped.len().saturating_sub(1)];
            if self.file_exists(physical) {
                return physical.to_string();
            }
            return logical.to_string();
        }

        let mut physical = logical;
        while !file_name(physical).is_empty() {
            physical = remove_tail_number_or_other(physical);
            if self.file_exists(physical) && !file_name(physical).is_empty() {
                return physical.to_string();
            }
        }
        logical.to_string()
    }

    fn linux_physical_devices(&self, device: &str) -> Result<BTreeMap<String, String>, PalError> {
        let mut devices = BTreeMap::new();
        match lvm::get_dm_device(self, device)? {
            None => {
                let path = self.guess_physical_from_logical_device(device);
                devices.insert(file_name(&path).to_string(), path);
            }
            Some(dm_device) => {
                for slave in lvm::get_dm_slaves(self, &dm_device)? {
                    let path = if slave.ends_with(|c: char| c.is_ascii_digit()) {
                        self.guess_physical_from_logical_device(&slave)
                    } else {
                        slave
                    };
                    devices.insert(file_name(&path).to_string(), path);
                }
            }
        }
        Ok(devices)
    }

    fn solaris_physical_devices(&self, device: &str) -> BTreeMap<String, String> {
        let mut devices = BTreeMap::new();
        let name = file_name(device);
        let Some(cut) = name.rfind(|c: char| !c.is_ascii_digit()) else {
            return devices;
        };
        let disk = &name[..cut];
        let dev = format!("/dev/dsk/{}", disk);
        if matches!(self.read_kstat_disk(&dev), Ok(Some(_))) {
            devices.insert(disk.to_string(), dev);
        }
        devices
    }
}

impl DiskDepend for DiskDependDefault {
    fn platform(&self) -> Platform {
        self.platform
    }

    fn locate_mount_tab(&self) -> PathBuf {
        self.mount_tab.clone()
    }

    fn locate_proc_disk_stats(&self) -> PathBuf {
        self.proc_disk_stats.clone()
    }

    fn locate_proc_partitions(&self) -> PathBuf {
        self.proc_partitions.clone()
    }

    fn refresh_proc_disk_stats(&self) -> Result<(), PalError> {
        let content = std::fs::read_to_string(&self.proc_disk_stats)
            .map_err(|e| PalError::from_io(&self.proc_disk_stats, e))?;
        let parsed = parse_disk_stats(&content);
        *self.disk_stats.lock().unwrap_or_else(|e| e.into_inner()) = parsed;
        Ok(())
    }

    fn get_proc_disk_stats(&self, device: &str) -> Vec<String> {
        let key = device
            .strip_prefix("/dev/")
            .unwrap_or_else(|| file_name(device));
        let stats = self.disk_stats.lock().unwrap_or_else(|e| e.into_inner());
        match stats.get(key) {
            Some(row) => row.clone(),
            None => {
                let msg = format!(
                    "did not find key '{}' in diskstats map, device name was '{}'",
                    key, device
                );
                self.stats_miss.log(device, &msg);
                Vec::new()
            }
        }
    }

    fn get_files_in_directory(&self, path: &str) -> Result<Vec<PathBuf>, PalError> {
        let entries = std::fs::read_dir(path).map_err(|e| PalError::from_io(path, e))?;
        Ok(entries.filter_map(|e| e.ok()).map(|e| e.path()).collect())
    }

    fn refresh_mnt_tab(&self, filter: Option<&MntTabFilter>) -> Result<(), PalError> {
        let content = std::fs::read_to_string(&self.mount_tab)
            .map_err(|e| PalError::from_io(&self.mount_tab, e))?;
        let entries = parse_mount_tab(&content, self.platform, filter, |link| {
            match self.read_link(link) {
                Ok(target) => {
                    let target = target.to_string_lossy().into_owned();
                    match target.rfind('/') {
                        Some(pos) => Some(format!("/dev/{}", &target[pos + 1..])),
                        None => {
                            let msg = format!(
                                "unable to find physical device in link {} (resolved from {})",
                                target, link
                            );
                            self.mnt_errors.log(link, &msg);
                            None
                        }
                    }
                }
                Err(e) => {
                    let msg = format!("readlink({}) failed: {}", link, e);
                    self.mnt_errors.log(link, &msg);
                    None
                }
            }
        });
        *self.mnt_tab.lock().unwrap_or_else(|e| e.into_inner()) = entries;
        Ok(())
    }

    fn get_mnt_tab(&self) -> Vec<MntTabEntry> {
        self.mnt_tab.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn file_system_ignored(&self, fs: &str) -> bool {
        let fs = fs.to_lowercase();
        let fs = fs.as_str();
        IGNORED_FS.contains(&fs)
            || (self.platform == Platform::Linux && IGNORED_FS_LINUX.contains(&fs))
            || (self.platform == Platform::Solaris && fs == "dev")
            || (self.platform != Platform::Solaris && fs == "zfs")
            || IGNORED_FS_PREFIX.iter().any(|p| fs.starts_with(p))
            || IGNORED_FS_CONTAINS.iter().any(|p| fs.contains(p))
    }

    fn device_ignored(&self, device: &str) -> bool {
        // Solaris automounts optical media here.
        self.platform == Platform::Solaris && device.starts_with("/vol/dev/dsk/")
    }

    fn link_to_physical_exists(&self, fs: &str, device: &str, mount_point: &str) -> bool {
        if device == mount_point || self.file_system_no_link_to_physical(fs) {
            let msg = format!(
                "no link exists between the logical device \"{}\" at mount point \"{}\" with filesystem \"{}\"; some statistics will be unavailable",
                device, mount_point, fs
            );
            self.no_link.log(device, &msg);
            return false;
        }
        true
    }

    fn device_to_interface_type(&self, device: &str) -> DiskInterfaceType {
        if self.platform != Platform::Linux {
            return DiskInterfaceType::Unknown;
        }
        let name = file_name(device);
        if name.starts_with('h') {
            DiskInterfaceType::Ide
        } else if name.starts_with('s') {
            DiskInterfaceType::Scsi
        } else if name.starts_with("xvd") {
            DiskInterfaceType::Virtual
        } else {
            DiskInterfaceType::Unknown
        }
    }

    fn get_physical_devices(&self, device: &str) -> BTreeMap<String, String> {
        let resolved = match self.platform {
            Platform::Linux => self.linux_physical_devices(device),
            Platform::Solaris => Ok(self.solaris_physical_devices(device)),
            Platform::Aix => volume_group::aix_physical_devices(self),
            Platform::HpUx => volume_group::hpux_physical_devices(self, device),
        };
        resolved.unwrap_or_else(|e| {
            let msg = format!(
                "an error occurred resolving the physical devices that contain {}: {}",
                device, e
            );
            self.physical_errors.log(device, &msg);
            BTreeMap::new()
        })
    }

    fn add_device_instance(&self, device: &str, name: &str, instance: i64, dev_id: i64) {
        let mut map = DEVICE_MAP.lock().unwrap_or_else(|e| e.into_inner());
        map.insert(device.to_string(), Arc::new(DeviceInstance::new(name, instance, dev_id)));
    }

    fn find_device_instance(&self, device: &str) -> Option<Arc<DeviceInstance>> {
        DEVICE_MAP
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(device)
            .cloned()
    }

    fn statvfs(&self, path: &str) -> Result<StatVfs, PalError> {
        let st = nix::sys::statvfs::statvfs(path).map_err(|e| PalError::from_errno("statvfs", path, e))?;
        Ok(StatVfs {
            block_size: st.block_size() as u64,
            fragment_size: st.fragment_size() as u64,
            blocks: st.blocks() as u64,
            blocks_free: st.blocks_free() as u64,
            blocks_available: st.blocks_available() as u64,
            files: st.files() as u64,
            files_free: st.files_free() as u64,
        })
    }

    fn stat(&self, path: &str) -> Result<FileStat, PalError> {
        let st = nix::sys::stat::stat(path).map_err(|e| PalError::from_errno("stat", path, e))?;
        Ok(FileStat::from_rdev(st.st_rdev as u64))
    }

    fn file_exists(&self, path: &str) -> bool {
        Path::new(path).exists()
    }

    fn read_link(&self, path: &str) -> Result<PathBuf, PalError> {
        std::fs::read_link(path).map_err(|e| PalError::from_io(path, e))
    }

    fn read_to_string(&self, path: &str) -> Result<String, PalError> {
        std::fs::read_to_string(path).map_err(|e| PalError::from_io(path, e))
    }

    fn run(&self, command: &str, stdin: &str, timeout: Duration) -> Result<ProcessOutput, PalError> {
        process::run(command, stdin, timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DISKSTATS: &str = "   8       0 sda 3000 10 48000 2000 1500 20 24000 900 0 2500 2900 0 0 0 0 0 0
   8       1 sda1 120 0 960 60
 253       0 dm-0 2000 0 32000 1000 1000 0 16000 800 0 1800 1800 0 0 0 0
";

    #[test]
    fn diskstats_rows_keyed_by_device_name() {
        let map = parse_disk_stats(DISKSTATS);
        assert_eq!(map.len(), 3);
        assert_eq!(map["sda"][3], "3000");
        assert_eq!(map["sda1"].len(), 7);
        assert_eq!(map["dm-0"][9], "16000");
    }

    #[test]
    fn mount_tab_skips_loop_comments_and_pseudo_filesystems() {
        let content = "\
# comment line here x
/dev/sda1 / ext4 rw,relatime 0 0
proc /proc proc rw 0 0
/dev/loop0 /snap/core squashfs ro 0 0
/tmp/img /mnt/img ext4 rw,loop=/dev/loop1 0 0
/dev/sdb1 /data xfs rw,dev=80011 0 0
";
        let entries = parse_mount_tab(content, Platform::Linux, None, |_| None);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].device, "/dev/sda1");
        assert_eq!(entries[0].mount_point, "/");
        assert_eq!(entries[1].dev_attribute, "80011");
    }

    #[test]
    fn mount_tab_resolves_by_uuid_links() {
        let content = "/dev/disk/by-uuid/e62e95e9 / ext4 rw 0 0\n";
        let entries = parse_mount_tab(content, Platform::Linux, None, |_| Some("/dev/sda1".into()));
        assert_eq!(entries[0].device, "/dev/sda1");
    }

    #[test]
    fn mount_tab_filter_stops_at_first_match() {
        let content = "/dev/sda1 / ext4 rw 0 0\n/dev/sdb1 /data xfs rw 0 0\n/dev/sdb2 /data2 xfs rw 0 0\n";
        let filter = MntTabFilter::Device("sdb".into());
        let entries = parse_mount_tab(content, Platform::Linux, Some(&filter), |_| None);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].mount_point, "/data");

        let filter = MntTabFilter::MountPoint("/data2".into());
        let entries = parse_mount_tab(content, Platform::Linux, Some(&filter), |_| None);
        assert_eq!(entries[0].device, "/dev/sdb2");
    }

    #[test]
    fn ignored_filesystems_are_case_insensitive() {
        let deps = DiskDependDefault::with_paths(Platform::Linux, "/etc/mtab", "/proc/diskstats", "/proc/partitions");
        assert!(deps.file_system_ignored("TMPFS"));
        assert!(deps.file_system_ignored("nfs4"));
        assert!(deps.file_system_ignored("fuse.gvfsd-fuse"));
        assert!(deps.file_system_ignored("zfs"));
        assert!(!deps.file_system_ignored("ext4"));

        let solaris = DiskDependDefault::with_paths(Platform::Solaris, "/etc/mnttab", "", "");
        assert!(!solaris.file_system_ignored("zfs"));
        assert!(!solaris.file_system_ignored("devtmpfs"));
    }

    #[test]
    fn interface_type_from_device_name() {
        let deps = DiskDependDefault::with_paths(Platform::Linux, "", "", "");
        assert_eq!(deps.device_to_interface_type("/dev/hda"), DiskInterfaceType::Ide);
        assert_eq!(deps.device_to_interface_type("/dev/sda"), DiskInterfaceType::Scsi);
        assert_eq!(deps.device_to_interface_type("/dev/xvda"), DiskInterfaceType::Virtual);
        assert_eq!(deps.device_to_interface_type("/dev/xda"), DiskInterfaceType::Unknown);
        assert_eq!(deps.device_to_interface_type("/dev/vda"), DiskInterfaceType::Unknown);
    }

    #[test]
    fn missing_directory_is_an_error_not_an_empty_listing() {
        let deps = DiskDependDefault::with_paths(Platform::Linux, "", "", "");
        let err = deps.get_files_in_directory("/nonexistent/dev/dsk").unwrap_err();
        assert!(matches!(err, PalError::PathNotFound { .. }), "{:?}", err);
    }

    #[test]
    fn mount_tab_link_failures_are_suppressed_per_link() {
        use std::io::Write;
        let mut mtab = tempfile::NamedTempFile::new().unwrap();
        writeln!(mtab, "/dev/disk/by-uuid/0000-gone / ext4 rw 0 0").unwrap();
        let deps = DiskDependDefault::with_paths(Platform::Linux, mtab.path(), "", "");
        deps.refresh_mnt_tab(None).unwrap();
        deps.refresh_mnt_tab(None).unwrap();
        assert!(deps.mnt_errors.contains("/dev/disk/by-uuid/0000-gone"));
        assert_eq!(deps.get_mnt_tab()[0].device, "/dev/disk/by-uuid/0000-gone");
    }

    #[test]
    fn physical_resolution_failures_are_suppressed_per_device() {
        // No perfstat behind the production dependency on this host.
        let deps = DiskDependDefault::with_paths(Platform::Aix, "", "", "");
        assert!(deps.get_physical_devices("/dev/hd4").is_empty());
        assert!(deps.physical_errors.contains("/dev/hd4"));
    }

    #[test]
    fn no_link_to_physical_for_zfs_or_same_path() {
        let deps = DiskDependDefault::with_paths(Platform::Linux, "", "", "");
        assert!(!deps.link_to_physical_exists("zfs", "/dev/sda1", "/"));
        assert!(!deps.link_to_physical_exists("ext4", "/mnt", "/mnt"));
        assert!(deps.link_to_physical_exists("ext4", "/dev/sda1", "/"));
    }
}
