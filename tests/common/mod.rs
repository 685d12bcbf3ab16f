// Shared test helpers: fake dependencies returning canned OS data.
#![allow(dead_code)]

use scxpal::cpu::CpuDepend;
use scxpal::disk::depend::{DeviceInstance, FileStat, KstatIo, PerfstatDisk, PstDiskInfo, PstLvInfo, StatVfs};
use scxpal::disk::volume_group;
use scxpal::disk::{DiskDepend, DiskInterfaceType, MntTabEntry, MntTabFilter};
use scxpal::error::PalError;
use scxpal::memory::{AixMemoryPages, MemoryDepend, SwapPages};
use scxpal::network::{DlpiLanStats, InterfaceAddress, KstatNamed, NetworkInterfaceDepend, PerfstatNetInterface};
use scxpal::platform::Platform;
use scxpal::process::ProcessOutput;
use scxpal::processes::ProcessDepend;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn lines(s: &str) -> Vec<String> {
    s.lines().map(str::to_string).collect()
}

pub fn mount(device: &str, mount_point: &str, fs: &str) -> MntTabEntry {
    MntTabEntry {
        device: device.into(),
        mount_point: mount_point.into(),
        file_system: fs.into(),
        dev_attribute: String::new(),
    }
}

/// Linux diskstats row with the given read/write counters.
pub fn diskstats_row(name: &str, reads: u64, r_sectors: u64, r_ms: u64, writes: u64, w_sectors: u64, w_ms: u64) -> Vec<String> {
    format!("8 0 {name} {reads} 0 {r_sectors} {r_ms} {writes} 0 {w_sectors} {w_ms} 0 0 0")
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

pub struct FakeDiskDepend {
    pub platform: Platform,
    pub mnt_tab: Mutex<Vec<MntTabEntry>>,
    pub disk_stats: Mutex<HashMap<String, Vec<String>>>,
    pub physical: Mutex<HashMap<String, BTreeMap<String, String>>>,
    pub files: Mutex<HashSet<String>>,
    pub file_contents: Mutex<HashMap<String, String>>,
    pub statvfs: Mutex<Option<StatVfs>>,
    pub stats: Mutex<HashMap<String, FileStat>>,
    pub kstat_disk: Mutex<HashMap<String, KstatIo>>,
    /// pstat disk table; None means no pstat at all.
    pub pstat_disks: Mutex<Option<Vec<PstDiskInfo>>>,
    pub pstat_lvs: Mutex<Option<Vec<PstLvInfo>>>,
    /// perfstat disks in walk order.
    pub perfstat: Mutex<Vec<(String, PerfstatDisk)>>,
    /// Responses for `run`, consumed in order.
    pub run_outputs: Mutex<VecDeque<Result<ProcessOutput, PalError>>>,
    pub commands: Mutex<Vec<(String, String)>>,
    pub device_instances: Mutex<HashMap<String, Arc<DeviceInstance>>>,
    pub mnt_tab_refreshes: Mutex<usize>,
}

impl FakeDiskDepend {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            mnt_tab: Mutex::new(Vec::new()),
            disk_stats: Mutex::new(HashMap::new()),
            physical: Mutex::new(HashMap::new()),
            files: Mutex::new(HashSet::new()),
            file_contents: Mutex::new(HashMap::new()),
            statvfs: Mutex::new(None),
            stats: Mutex::new(HashMap::new()),
            kstat_disk: Mutex::new(HashMap::new()),
            pstat_disks: Mutex::new(None),
            pstat_lvs: Mutex::new(None),
            perfstat: Mutex::new(Vec::new()),
            run_outputs: Mutex::new(VecDeque::new()),
            commands: Mutex::new(Vec::new()),
            device_instances: Mutex::new(HashMap::new()),
            mnt_tab_refreshes: Mutex::new(0),
        }
    }

    pub fn set_mnt_tab(&self, entries: Vec<MntTabEntry>) {
        *self.mnt_tab.lock().unwrap() = entries;
    }

    pub fn set_disk_stats(&self, name: &str, row: Vec<String>) {
        self.disk_stats.lock().unwrap().insert(name.to_string(), row);
    }

    pub fn set_physical(&self, device: &str, disks: &[(&str, &str)]) {
        let map = disks.iter().map(|(n, d)| (n.to_string(), d.to_string())).collect();
        self.physical.lock().unwrap().insert(device.to_string(), map);
    }

    pub fn add_file(&self, path: &str) {
        self.files.lock().unwrap().insert(path.to_string());
    }

    pub fn set_file_content(&self, path: &str, content: &str) {
        self.file_contents
            .lock()
            .unwrap()
            .insert(path.to_string(), content.to_string());
    }

    pub fn set_rdev(&self, path: &str, rdev: u64) {
        self.stats
            .lock()
            .unwrap()
            .insert(path.to_string(), FileStat::from_rdev(rdev));
    }

    pub fn set_kstat_disk(&self, device: &str, io: KstatIo) {
        self.kstat_disk.lock().unwrap().insert(device.to_string(), io);
    }

    pub fn set_pstat_disks(&self, table: Vec<PstDiskInfo>) {
        *self.pstat_disks.lock().unwrap() = Some(table);
    }

    pub fn set_pstat_lvs(&self, table: Vec<PstLvInfo>) {
        *self.pstat_lvs.lock().unwrap() = Some(table);
    }

    /// Add or replace a perfstat disk, keeping walk order.
    pub fn set_perfstat(&self, name: &str, data: PerfstatDisk) {
        let mut disks = self.perfstat.lock().unwrap();
        match disks.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = data,
            None => disks.push((name.to_string(), data)),
        }
    }

    pub fn push_run_output(&self, status: i32, stdout: &str, stderr: &str) {
        self.run_outputs.lock().unwrap().push_back(Ok(ProcessOutput {
            status,
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        }));
    }
}

impl DiskDepend for FakeDiskDepend {
    fn platform(&self) -> Platform {
        self.platform
    }

    fn locate_mount_tab(&self) -> PathBuf {
        PathBuf::from("/etc/mtab")
    }

    fn locate_proc_disk_stats(&self) -> PathBuf {
        PathBuf::from("/proc/diskstats")
    }

    fn locate_proc_partitions(&self) -> PathBuf {
        PathBuf::from("/proc/partitions")
    }

    fn refresh_proc_disk_stats(&self) -> Result<(), PalError> {
        Ok(())
    }

    fn get_proc_disk_stats(&self, device: &str) -> Vec<String> {
        let name = device.strip_prefix("/dev/").unwrap_or(device);
        self.disk_stats
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    fn get_files_in_directory(&self, path: &str) -> Result<Vec<PathBuf>, PalError> {
        let prefix = format!("{}/", path.trim_end_matches('/'));
        let files: Vec<PathBuf> = self
            .files
            .lock()
            .unwrap()
            .iter()
            .filter(|f| f.starts_with(&prefix))
            .map(PathBuf::from)
            .collect();
        if files.is_empty() {
            return Err(PalError::PathNotFound { path: path.into() });
        }
        Ok(files)
    }

    fn refresh_mnt_tab(&self, _filter: Option<&MntTabFilter>) -> Result<(), PalError> {
        *self.mnt_tab_refreshes.lock().unwrap() += 1;
        Ok(())
    }

    fn get_mnt_tab(&self) -> Vec<MntTabEntry> {
        self.mnt_tab.lock().unwrap().clone()
    }

    fn file_system_ignored(&self, fs: &str) -> bool {
        matches!(fs, "proc" | "sysfs" | "tmpfs")
    }

    fn device_ignored(&self, _device: &str) -> bool {
        false
    }

    fn link_to_physical_exists(&self, fs: &str, device: &str, mount_point: &str) -> bool {
        device != mount_point && fs != "zfs"
    }

    fn device_to_interface_type(&self, _device: &str) -> DiskInterfaceType {
        DiskInterfaceType::Scsi
    }

    fn get_physical_devices(&self, device: &str) -> BTreeMap<String, String> {
        if let Some(canned) = self.physical.lock().unwrap().get(device).cloned() {
            return canned;
        }
        let resolved = match self.platform {
            Platform::Aix => volume_group::aix_physical_devices(self),
            Platform::HpUx => volume_group::hpux_physical_devices(self, device),
            _ => Ok(BTreeMap::new()),
        };
        resolved.unwrap_or_default()
    }

    fn add_device_instance(&self, device: &str, name: &str, instance: i64, dev_id: i64) {
        self.device_instances
            .lock()
            .unwrap()
            .insert(device.to_string(), Arc::new(DeviceInstance::new(name, instance, dev_id)));
    }

    fn find_device_instance(&self, device: &str) -> Option<Arc<DeviceInstance>> {
        self.device_instances.lock().unwrap().get(device).cloned()
    }

    fn statvfs(&self, path: &str) -> Result<StatVfs, PalError> {
        (*self.statvfs.lock().unwrap()).ok_or_else(|| PalError::PathNotFound { path: path.into() })
    }

    fn stat(&self, path: &str) -> Result<FileStat, PalError> {
        self.stats
            .lock()
            .unwrap()
            .get(path)
            .copied()
            .ok_or_else(|| PalError::PathNotFound { path: path.into() })
    }

    fn file_exists(&self, path: &str) -> bool {
        self.files.lock().unwrap().contains(path)
    }

    fn read_link(&self, path: &str) -> Result<PathBuf, PalError> {
        Err(PalError::PathNotFound { path: path.into() })
    }

    fn read_to_string(&self, path: &str) -> Result<String, PalError> {
        self.file_contents
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| PalError::PathNotFound { path: path.into() })
    }

    fn run(&self, command: &str, stdin: &str, _timeout: Duration) -> Result<ProcessOutput, PalError> {
        self.commands
            .lock()
            .unwrap()
            .push((command.to_string(), stdin.to_string()));
        self.run_outputs
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(PalError::InternalError("no canned output".into())))
    }

    fn read_kstat_disk(&self, device: &str) -> Result<Option<KstatIo>, PalError> {
        Ok(self.kstat_disk.lock().unwrap().get(device).copied())
    }

    fn pstat_getdisk(&self, index: i64) -> Result<Option<PstDiskInfo>, PalError> {
        let table = self.pstat_disks.lock().unwrap();
        let table = table
            .as_ref()
            .ok_or_else(|| PalError::NotSupported("pstat_getdisk".into()))?;
        Ok(usize::try_from(index).ok().and_then(|i| table.get(i)).copied())
    }

    fn pstat_getlv(&self, index: i64) -> Result<Option<PstLvInfo>, PalError> {
        let table = self.pstat_lvs.lock().unwrap();
        let table = table
            .as_ref()
            .ok_or_else(|| PalError::NotSupported("pstat_getlv".into()))?;
        Ok(usize::try_from(index).ok().and_then(|i| table.get(i)).copied())
    }

    fn perfstat_disk_names(&self) -> Result<Vec<String>, PalError> {
        Ok(self.perfstat.lock().unwrap().iter().map(|(n, _)| n.clone()).collect())
    }

    fn perfstat_disk(&self, name: &str) -> Result<PerfstatDisk, PalError> {
        self.perfstat
            .lock()
            .unwrap()
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, d)| *d)
            .ok_or_else(|| PalError::InternalError(format!("perfstat_disk: no disk {}", name)))
    }
}

/// pstat entry for a disk with the given major/minor numbers.
pub fn pst_disk(major: i64, minor: i64, transfers: u64, words: u64, response_ms: u64, wait_ms: u64, queue: u64) -> PstDiskInfo {
    PstDiskInfo {
        dev_major: major,
        dev_minor: minor,
        transfers,
        words,
        response_ms,
        wait_ms,
        queue_length: queue,
    }
}

pub fn pst_lv(major: i64, minor: i64, reads: u64, writes: u64, read_bytes: u64, write_bytes: u64) -> PstLvInfo {
    PstLvInfo {
        dev_major: major,
        dev_minor: minor,
        read_transfers: reads,
        write_transfers: writes,
        read_bytes,
        write_bytes,
    }
}

pub struct FakeMemoryDepend {
    pub platform: Platform,
    pub meminfo: Mutex<Vec<String>>,
    pub vmstat: Mutex<Vec<String>>,
    pub page_size: u64,
    pub physical_pages: u64,
    pub available_pages: u64,
    pub swap: SwapPages,
    pub arc_size: Option<u64>,
    /// HP-UX (page size, physical pages).
    pub static_info: Option<(u64, u64)>,
    /// HP-UX (real pages, free pages).
    pub dynamic_info: Option<(u64, u64)>,
    pub aix_pages: Option<AixMemoryPages>,
    pub paging: Mutex<Option<(u64, u64)>>,
}

impl FakeMemoryDepend {
    pub fn linux(meminfo: &str, vmstat: &str) -> Self {
        Self {
            platform: Platform::Linux,
            meminfo: Mutex::new(lines(meminfo)),
            vmstat: Mutex::new(lines(vmstat)),
            page_size: 4096,
            physical_pages: 0,
            available_pages: 0,
            swap: SwapPages::default(),
            arc_size: None,
            static_info: None,
            dynamic_info: None,
            aix_pages: None,
            paging: Mutex::new(Some((0, 0))),
        }
    }

    pub fn on(platform: Platform) -> Self {
        let mut fake = Self::linux("", "");
        fake.platform = platform;
        fake
    }

    pub fn set_paging(&self, paging: Option<(u64, u64)>) {
        *self.paging.lock().unwrap() = paging;
    }

    pub fn set_vmstat(&self, vmstat: &str) {
        *self.vmstat.lock().unwrap() = lines(vmstat);
    }
}

impl MemoryDepend for FakeMemoryDepend {
    fn platform(&self) -> Platform {
        self.platform
    }

    fn get_mem_info_lines(&self) -> Result<Vec<String>, PalError> {
        Ok(self.meminfo.lock().unwrap().clone())
    }

    fn get_vm_stat_lines(&self) -> Result<Vec<String>, PalError> {
        Ok(self.vmstat.lock().unwrap().clone())
    }

    fn page_size(&self) -> Result<u64, PalError> {
        Ok(self.page_size)
    }

    fn physical_pages(&self) -> Result<u64, PalError> {
        Ok(self.physical_pages)
    }

    fn available_physical_pages(&self) -> Result<u64, PalError> {
        Ok(self.available_pages)
    }

    fn swap_info(&self) -> Result<SwapPages, PalError> {
        Ok(self.swap)
    }

    fn zfs_arc_size(&self) -> Result<Option<u64>, PalError> {
        Ok(self.arc_size)
    }

    fn static_memory_info(&self) -> Result<(u64, u64), PalError> {
        self.static_info
            .ok_or_else(|| PalError::NotSupported("pstat_getstatic".into()))
    }

    fn dynamic_memory_info(&self) -> Result<(u64, u64), PalError> {
        self.dynamic_info
            .ok_or_else(|| PalError::NotSupported("pstat_getdynamic".into()))
    }

    fn aix_memory_pages(&self) -> Result<AixMemoryPages, PalError> {
        self.aix_pages
            .ok_or_else(|| PalError::NotSupported("perfstat_memory_total".into()))
    }

    fn paging_data(&self) -> Result<Option<(u64, u64)>, PalError> {
        Ok(*self.paging.lock().unwrap())
    }
}

pub const NET_DEV_HEADER: &str = "\
Inter-|   Receive                                                |  Transmit
 face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
";

/// /proc/net/dev row.
pub fn net_dev_row(name: &str, rx_bytes: u64, rx_packets: u64, tx_bytes: u64, tx_packets: u64) -> String {
    format!("{name}: {rx_bytes} {rx_packets} 0 0 0 0 0 0 {tx_bytes} {tx_packets} 0 0 0 0 0 0")
}

pub fn iface(name: &str, ip: Option<[u8; 4]>, up: bool, running: bool) -> InterfaceAddress {
    InterfaceAddress {
        name: name.to_string(),
        up,
        running,
        loopback: name == "lo",
        address: ip.map(|o| IpAddr::V4(Ipv4Addr::from(o))),
        netmask: ip.map(|_| IpAddr::V4(Ipv4Addr::new(255, 255, 255, 0))),
        broadcast: None,
        mac: None,
    }
}

pub struct FakeNetworkDepend {
    pub platform: Platform,
    pub net_dev: Mutex<Vec<String>>,
    pub addresses: Mutex<Vec<InterfaceAddress>>,
    pub attributes: Mutex<HashMap<(String, String), String>>,
    pub kstat: Mutex<Vec<KstatNamed>>,
    pub perfstat: Mutex<Vec<PerfstatNetInterface>>,
    pub dlpi: Mutex<Vec<DlpiLanStats>>,
}

impl FakeNetworkDepend {
    pub fn new(rows: &[String], addresses: Vec<InterfaceAddress>) -> Self {
        let fake = Self::on(Platform::Linux, addresses);
        fake.set_rows(rows);
        fake
    }

    /// No counters until the platform's source is filled in.
    pub fn on(platform: Platform, addresses: Vec<InterfaceAddress>) -> Self {
        Self {
            platform,
            net_dev: Mutex::new(Vec::new()),
            addresses: Mutex::new(addresses),
            attributes: Mutex::new(HashMap::new()),
            kstat: Mutex::new(Vec::new()),
            perfstat: Mutex::new(Vec::new()),
            dlpi: Mutex::new(Vec::new()),
        }
    }

    pub fn set_kstat(&self, kstats: Vec<KstatNamed>) {
        *self.kstat.lock().unwrap() = kstats;
    }

    pub fn set_perfstat(&self, interfaces: Vec<PerfstatNetInterface>) {
        *self.perfstat.lock().unwrap() = interfaces;
    }

    pub fn set_dlpi(&self, stats: Vec<DlpiLanStats>) {
        *self.dlpi.lock().unwrap() = stats;
    }

    pub fn set_rows(&self, rows: &[String]) {
        let mut all = lines(NET_DEV_HEADER);
        all.extend(rows.iter().cloned());
        *self.net_dev.lock().unwrap() = all;
    }

    pub fn set_addresses(&self, addresses: Vec<InterfaceAddress>) {
        *self.addresses.lock().unwrap() = addresses;
    }

    pub fn set_attribute(&self, interface: &str, attribute: &str, value: &str) {
        self.attributes
            .lock()
            .unwrap()
            .insert((interface.to_string(), attribute.to_string()), value.to_string());
    }
}

impl NetworkInterfaceDepend for FakeNetworkDepend {
    fn platform(&self) -> Platform {
        self.platform
    }

    fn get_dynamic_info_lines(&self) -> Result<Vec<String>, PalError> {
        Ok(self.net_dev.lock().unwrap().clone())
    }

    fn interface_addresses(&self) -> Result<Vec<InterfaceAddress>, PalError> {
        Ok(self.addresses.lock().unwrap().clone())
    }

    fn read_interface_attribute(&self, interface: &str, attribute: &str) -> Result<String, PalError> {
        self.attributes
            .lock()
            .unwrap()
            .get(&(interface.to_string(), attribute.to_string()))
            .cloned()
            .ok_or_else(|| PalError::PathNotFound {
                path: format!("/sys/class/net/{}/{}", interface, attribute),
            })
    }

    fn kstat_net_interfaces(&self) -> Result<Vec<KstatNamed>, PalError> {
        Ok(self.kstat.lock().unwrap().clone())
    }

    fn perfstat_net_interfaces(&self) -> Result<Vec<PerfstatNetInterface>, PalError> {
        Ok(self.perfstat.lock().unwrap().clone())
    }

    fn dlpi_lan_stats(&self) -> Result<Vec<DlpiLanStats>, PalError> {
        Ok(self.dlpi.lock().unwrap().clone())
    }
}

/// Named "net" kstat with the given counters.
pub fn kstat_net(name: &str, values: &[(&str, u64)]) -> KstatNamed {
    KstatNamed {
        name: name.to_string(),
        module: name.trim_end_matches(|c: char| c.is_ascii_digit()).to_string(),
        instance: 0,
        values: values.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
    }
}

pub struct FakeCpuDepend {
    pub stat: Mutex<Vec<String>>,
}

impl FakeCpuDepend {
    pub fn new(stat: &str) -> Self {
        Self {
            stat: Mutex::new(lines(stat)),
        }
    }

    pub fn set_stat(&self, stat: &str) {
        *self.stat.lock().unwrap() = lines(stat);
    }
}

impl CpuDepend for FakeCpuDepend {
    fn platform(&self) -> Platform {
        Platform::Linux
    }

    fn get_stat_lines(&self) -> Result<Vec<String>, PalError> {
        Ok(self.stat.lock().unwrap().clone())
    }
}

/// A /proc/<pid>/stat line with the counters the process enumeration samples.
pub fn proc_stat(pid: u32, command: &str, utime: u64, stime: u64, majflt: u64) -> String {
    format!(
        "{} ({}) S 1 {} {} 0 -1 4194560 100 0 {} 0 {} {} 0 0 20 0 2 0 5000 8392704 300",
        pid, command, pid, pid, majflt, utime, stime
    )
}

pub fn proc_status(name: &str, uid: u32, rss_kb: u64) -> String {
    format!(
        "Name:\t{}\nState:\tS (sleeping)\nUid:\t{}\t{}\t{}\t{}\nGid:\t0\t0\t0\t0\nVmSize:\t8196 kB\nVmRSS:\t{} kB\n",
        name, uid, uid, uid, uid, rss_kb
    )
}

/// Processes keyed by pid: (stat, status). A missing status reads as ENOENT.
pub struct FakeProcessDepend {
    pub processes: Mutex<BTreeMap<u32, (String, Option<String>)>>,
    /// Pids whose files fail with EACCES.
    pub denied: Mutex<HashSet<u32>>,
    /// Pids still listed but already gone when their files are read.
    pub exited: Mutex<HashSet<u32>>,
    pub list_fails: Mutex<bool>,
}

impl FakeProcessDepend {
    pub fn new() -> Self {
        Self {
            processes: Mutex::new(BTreeMap::new()),
            denied: Mutex::new(HashSet::new()),
            exited: Mutex::new(HashSet::new()),
            list_fails: Mutex::new(false),
        }
    }

    pub fn set(&self, pid: u32, stat: String, status: Option<String>) {
        self.processes.lock().unwrap().insert(pid, (stat, status));
    }

    pub fn kill(&self, pid: u32) {
        self.processes.lock().unwrap().remove(&pid);
    }
}

impl ProcessDepend for FakeProcessDepend {
    fn platform(&self) -> Platform {
        Platform::Linux
    }

    fn list_pids(&self) -> Result<Vec<u32>, PalError> {
        if *self.list_fails.lock().unwrap() {
            return Err(PalError::PermissionDenied { path: "/proc".into() });
        }
        let mut pids: Vec<u32> = self.processes.lock().unwrap().keys().copied().collect();
        pids.extend(self.exited.lock().unwrap().iter().copied());
        pids.sort_unstable();
        Ok(pids)
    }

    fn read_proc_file(&self, pid: u32, file: &str) -> Result<String, PalError> {
        let path = format!("/proc/{}/{}", pid, file);
        if self.denied.lock().unwrap().contains(&pid) {
            return Err(PalError::PermissionDenied { path });
        }
        let processes = self.processes.lock().unwrap();
        let found = processes.get(&pid).and_then(|(stat, status)| match file {
            "stat" => Some(stat.clone()),
            "status" => status.clone(),
            _ => None,
        });
        found.ok_or(PalError::PathNotFound { path })
    }
}
