// Static disk partition inventory (Linux): /proc/partitions cross-checked
// against parted's partition table listing.

use super::depend::DiskDepend;
use crate::entity::{EntityEnumeration, EntityInstance, Handle, lock};
use crate::log_suppressor::LogSuppressor;
use crate::platform::Platform;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tracing::{Level, instrument};

const PARTED_PATHS: [&str; 2] = ["/sbin/parted", "/usr/sbin/parted"];
/// Answers parted's interactive warnings, then prints the table.
const PARTED_INTERACTIVE_INPUT: &str = "ignore\nignore\nprint\nquit\n";
/// /proc/partitions counts 1 KiB blocks.
const PROC_PARTITIONS_BLOCK_SIZE: u64 = 1024;

// "/dev/sda" in "Disk /dev/sda: 112GB"
static PARTED_DISK: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"Disk[^/]+(/dev/[^ ]*):").ok());
// "1" in " 1      1049kB  525MB  524MB  primary  ext4         boot"
static PARTED_DETAIL: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"^[ ]?([0-9]+)").ok());

static PARTED_SUPPRESSOR: LazyLock<LogSuppressor> =
    LazyLock::new(|| LogSuppressor::new(Level::ERROR, Level::TRACE));

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticDiskPartitionInstance {
    id: String,
    pub device_id: String,
    pub index: u32,
    pub boot_partition: bool,
    pub size_bytes: u64,
    pub block_size: u64,
    pub number_of_blocks: u64,
}

impl StaticDiskPartitionInstance {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            ..Self::default()
        }
    }
}

impl EntityInstance for StaticDiskPartitionInstance {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_total(&self) -> bool {
        false
    }
}

/// Map every partition listed by parted (`/dev/sda1`) to its detail line.
pub fn parse_parted_output(output: &str) -> BTreeMap<String, String> {
    let mut partitions = BTreeMap::new();
    let (Some(disk_re), Some(detail_re)) = (PARTED_DISK.as_ref(), PARTED_DETAIL.as_ref()) else {
        tracing::error!("parted patterns failed to compile");
        return partitions;
    };

    let mut current_disk = String::new();
    for line in output.lines() {
        if let Some(caps) = disk_re.captures(line) {
            current_disk = caps[1].to_string();
        } else if let Some(caps) = detail_re.captures(line) {
            partitions.insert(format!("{}{}", current_disk, &caps[1]), line.to_string());
        }
    }
    for (device, detail) in &partitions {
        tracing::trace!(device = %device, detail = %detail, "parted partition");
    }
    partitions
}

/// Partition index: the digits from the first digit of the name on (`sda12` -> 12).
fn partition_index(name: &str) -> Option<u32> {
    let start = name.find(|c: char| c.is_ascii_digit())?;
    let digits: String = name[start..].chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

pub struct StaticDiskPartitionEnumeration {
    deps: Arc<dyn DiskDepend>,
    timeout: Duration,
    partitions: EntityEnumeration<StaticDiskPartitionInstance>,
}

impl StaticDiskPartitionEnumeration {
    pub fn new(deps: Arc<dyn DiskDepend>, timeout: Duration) -> Self {
        Self {
            deps,
            timeout,
            partitions: EntityEnumeration::new(),
        }
    }

    pub fn init(&mut self) {
        self.update(true);
    }

    #[instrument(skip(self), fields(subsystem = "disk", operation = "update_partitions"))]
    pub fn update(&mut self, update_instances: bool) {
        if !update_instances {
            return;
        }
        if self.deps.platform() != Platform::Linux {
            tracing::debug!(platform = %self.deps.platform(), "partition discovery only implemented for linux");
            return;
        }

        let Some(output) = self.parted_output() else {
            return;
        };
        let parted = parse_parted_output(&output);

        let path = self.deps.locate_proc_partitions();
        let content = match self.deps.read_to_string(&path.to_string_lossy()) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "unable to read partitions table");
                return;
            }
        };

        for line in content.lines() {
            let fields: Vec<&str> = line.split_whitespace().collect();
            let parsed = match fields.as_slice() {
                [major, minor, blocks, name, ..] => match (major.parse::<u64>(), minor.parse::<u64>(), blocks.parse::<u64>()) {
                    (Ok(_), Ok(_), Ok(blocks)) => Some((blocks, *name)),
                    _ => None,
                },
                _ => None,
            };
            let Some((blocks, name)) = parsed else {
                if !line.trim().is_empty() {
                    tracing::info!(line = %line, "line in partitions table has no block count and name");
                }
                continue;
            };

            let device_id = format!("/dev/{}", name);
            // dm-* entries are device-mapped volumes, not partitions.
            if !self.deps.file_exists(&device_id) || !name.ends_with(|c: char| c.is_ascii_digit()) || name.contains('-') {
                continue;
            }

            let Some(detail) = parted.get(&device_id) else {
                tracing::info!(name = %name, "partition listed in partitions table but not by parted");
                continue;
            };

            let handle = match self.partitions.get(name) {
                Some(handle) => handle,
                None => self.partitions.add(StaticDiskPartitionInstance::new(name)),
            };
            let mut partition = lock(&handle);
            partition.device_id = device_id;
            partition.index = partition_index(name).unwrap_or(0);
            partition.boot_partition = detail.contains("boot");
            partition.block_size = PROC_PARTITIONS_BLOCK_SIZE;
            partition.number_of_blocks = blocks;
            partition.size_bytes = blocks * PROC_PARTITIONS_BLOCK_SIZE;
        }
    }

    fn parted_path(&self) -> Option<&'static str> {
        PARTED_PATHS.into_iter().find(|p| self.deps.file_exists(p))
    }

    /// Partition listing from `parted -ls`, falling back to interactive mode
    /// for versions that refuse to list without confirmation.
    fn parted_output(&self) -> Option<String> {
        let Some(parted) = self.parted_path() else {
            PARTED_SUPPRESSOR.log("NoPartedFound", "could not find parted in /sbin or /usr/sbin");
            return None;
        };

        let mut output = String::new();
        let mut success = false;
        let command = format!("{} -ls", parted);
        tracing::debug!(command = %command, "invoking parted");
        match self.deps.run(&command, "", self.timeout) {
            Ok(out) => {
                if !out.stderr.is_empty() {
                    tracing::warn!(stderr = %out.stderr.trim_end(), "parted reported errors");
                }
                success = out.status == 0 && !out.stdout.is_empty();
                output = out.stdout;
            }
            Err(e) => {
                let msg = format!("running parted to retrieve partition information failed: {}", e);
                PARTED_SUPPRESSOR.log("InternalError", &msg);
            }
        }

        if !success {
            let command = format!("{} -i", parted);
            tracing::debug!(command = %command, "using fallback interactive parted command");
            match self.deps.run(&command, PARTED_INTERACTIVE_INPUT, self.timeout) {
                Ok(out) => {
                    if !out.stderr.is_empty() {
                        tracing::warn!(stderr = %out.stderr.trim_end(), "parted reported errors");
                    }
                    success = out.status == 0 && out.stderr.is_empty();
                    output = out.stdout;
                }
                Err(e) => {
                    let msg = format!("running parted to retrieve partition information failed: {}", e);
                    PARTED_SUPPRESSOR.log("InternalError", &msg);
                }
            }
        }

        if output.is_empty() {
            PARTED_SUPPRESSOR.log("EmptyOutput", "unable to retrieve partition information from the OS");
            return None;
        }
        success.then_some(output)
    }

    pub fn get(&self, id: &str) -> Option<Handle<StaticDiskPartitionInstance>> {
        self.partitions.get(id)
    }

    pub fn instances(&self) -> Vec<Handle<StaticDiskPartitionInstance>> {
        self.partitions.instances()
    }

    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARTED_LS: &str = "\
Model: ATA VBOX HARDDISK (scsi)
Disk /dev/sda: 21.5GB
Sector size (logical/physical): 512B/512B
Partition Table: msdos

Number  Start   End     Size    Type     File system  Flags
 1      1049kB  525MB   524MB   primary  ext4         boot
 2      525MB   21.5GB  21.0GB  primary               lvm

Model: Linux device-mapper (linear) (dm)
Disk /dev/mapper/vg-root: 18.8GB
Number  Start  End     Size    File system  Flags
 1      0.00B  18.8GB  18.8GB  xfs
";

    #[test]
    fn parse_parted_output_keys_partitions_by_disk() {
        let map = parse_parted_output(PARTED_LS);
        assert_eq!(map.len(), 3);
        assert!(map["/dev/sda1"].contains("boot"));
        assert!(map["/dev/sda2"].contains("lvm"));
        assert!(map.contains_key("/dev/mapper/vg-root1"));
    }

    #[test]
    fn parse_parted_output_ignores_unnumbered_lines() {
        let map = parse_parted_output("Number  Start   End\nError: something\n");
        assert!(map.is_empty());
    }

    #[test]
    fn partition_index_takes_digits_after_first_digit() {
        assert_eq!(partition_index("sda1"), Some(1));
        assert_eq!(partition_index("sdb12"), Some(12));
        assert_eq!(partition_index("sda"), None);
    }
}
