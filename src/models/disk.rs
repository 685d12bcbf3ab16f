// Disk and partition snapshot models

use crate::disk::{DiskKind, LastMetrics, StaticDiskPartitionInstance, StatisticalDiskInstance};
use crate::entity::EntityInstance;
use serde::Serialize;

/// One logical or physical disk; unsupported values are omitted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskSnapshot {
    pub name: String,
    pub kind: DiskKind,
    pub is_total: bool,
    pub device: String,
    pub mount_point: String,
    pub online: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fs_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reads_per_second: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub writes_per_second: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transfers_per_second: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_bytes_per_second: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub write_bytes_per_second: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes_per_second: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub io_percentage: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seconds_per_read: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seconds_per_write: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seconds_per_transfer: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_length: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mb_used: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mb_free: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inodes_total: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inodes_free: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_metrics: Option<LastMetrics>,
}

impl DiskSnapshot {
    pub fn from_instance(disk: &StatisticalDiskInstance) -> Self {
        let bytes = disk.bytes_per_second();
        let times = disk.io_times();
        let size = disk.disk_size();
        let inodes = disk.inode_usage();
        Self {
            name: disk.disk_name(),
            kind: disk.kind(),
            is_total: disk.is_total(),
            device: disk.device().to_string(),
            mount_point: disk.mount_point().to_string(),
            online: disk.is_online(),
            fs_type: disk.fs_type().filter(|f| !f.is_empty()),
            reads_per_second: disk.reads_per_second(),
            writes_per_second: disk.writes_per_second(),
            transfers_per_second: disk.transfers_per_second(),
            read_bytes_per_second: bytes.map(|b| b.0),
            write_bytes_per_second: bytes.map(|b| b.1),
            bytes_per_second: disk.bytes_per_second_total(),
            io_percentage: disk.io_percentage_total(),
            seconds_per_read: times.map(|t| t.0),
            seconds_per_write: times.map(|t| t.1),
            seconds_per_transfer: disk.io_times_total(),
            queue_length: disk.disk_queue_length(),
            mb_used: size.map(|s| s.0),
            mb_free: size.map(|s| s.1),
            inodes_total: inodes.map(|i| i.0),
            inodes_free: inodes.map(|i| i.1),
            block_size: disk.block_size(),
            last_metrics: disk.last_metrics(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionSnapshot {
    pub name: String,
    pub device_id: String,
    pub index: u32,
    pub boot_partition: bool,
    pub size_bytes: u64,
    pub block_size: u64,
    pub number_of_blocks: u64,
}

impl PartitionSnapshot {
    pub fn from_instance(p: &StaticDiskPartitionInstance) -> Self {
        Self {
            name: p.id().to_string(),
            device_id: p.device_id.clone(),
            index: p.index,
            boot_partition: p.boot_partition,
            size_bytes: p.size_bytes,
            block_size: p.block_size,
            number_of_blocks: p.number_of_blocks,
        }
    }
}
