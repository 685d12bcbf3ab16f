// Full collection-cycle snapshot, one JSON line per cycle on stdout.

use super::{CpuSnapshot, DiskSnapshot, MemorySnapshot, NetworkInterfaceSnapshot, PartitionSnapshot, ProcessSnapshot};
use crate::platform::Platform;
use crate::system::SystemIdentity;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PalSnapshot {
    pub timestamp: DateTime<Utc>,
    pub platform: Platform,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<SystemIdentity>,
    /// Totals come first in each list.
    pub logical_disks: Vec<DiskSnapshot>,
    pub physical_disks: Vec<DiskSnapshot>,
    pub partitions: Vec<PartitionSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<MemorySnapshot>,
    pub network_interfaces: Vec<NetworkInterfaceSnapshot>,
    pub processors: Vec<CpuSnapshot>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub processes: Vec<ProcessSnapshot>,
}

impl PalSnapshot {
    pub fn new(platform: Platform) -> Self {
        Self {
            timestamp: Utc::now(),
            platform,
            system: None,
            logical_disks: Vec::new(),
            physical_disks: Vec::new(),
            partitions: Vec::new(),
            memory: None,
            network_interfaces: Vec::new(),
            processors: Vec::new(),
            processes: Vec::new(),
        }
    }
}
