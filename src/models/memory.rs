use crate::memory::MemoryInstance;
use serde::Serialize;

/// Byte counts and paging rates; unsupported values are omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemorySnapshot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_physical: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reserved: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_swap: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_swap: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used_swap: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_reads_per_second: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_writes_per_second: Option<u64>,
}

impl MemorySnapshot {
    pub fn from_instance(m: &MemoryInstance) -> Self {
        Self {
            total_physical: m.total_physical_memory(),
            available: m.available_memory(),
            used: m.used_memory(),
            reserved: m.reserved_memory(),
            total_swap: m.total_swap(),
            available_swap: m.available_swap(),
            used_swap: m.used_swap(),
            cache_size: m.cache_size(),
            page_reads_per_second: m.page_reads(),
            page_writes_per_second: m.page_writes(),
        }
    }
}
