// Raw memory sources. Linux reads procfs text; the other families expose
// their kernel query results through the remaining methods.

use crate::error::PalError;
use crate::platform::Platform;
use std::path::{Path, PathBuf};

/// Swap space in pages, as reported by swapctl/pstat.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SwapPages {
    pub max_pages: u64,
    pub reserved_pages: u64,
}

/// perfstat_memory_total summary (4 KiB pages).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AixMemoryPages {
    pub total_pages: u64,
    pub free_pages: u64,
    pub max_swap_pages: u64,
    pub free_swap_pages: u64,
}

pub trait MemoryDepend: Send + Sync {
    fn platform(&self) -> Platform;

    /// Lines of /proc/meminfo.
    fn get_mem_info_lines(&self) -> Result<Vec<String>, PalError>;

    /// Lines of /proc/vmstat.
    fn get_vm_stat_lines(&self) -> Result<Vec<String>, PalError>;

    fn page_size(&self) -> Result<u64, PalError> {
        Err(PalError::NotSupported("page_size".into()))
    }

    fn physical_pages(&self) -> Result<u64, PalError> {
        Err(PalError::NotSupported("physical_pages".into()))
    }

    fn available_physical_pages(&self) -> Result<u64, PalError> {
        Err(PalError::NotSupported("available_physical_pages".into()))
    }

    fn swap_info(&self) -> Result<SwapPages, PalError> {
        Err(PalError::NotSupported("swap_info".into()))
    }

    /// ZFS ARC size in bytes; `Ok(None)` when there is no ARC statistic.
    fn zfs_arc_size(&self) -> Result<Option<u64>, PalError> {
        Err(PalError::NotSupported("zfs_arc_size".into()))
    }

    /// HP-UX (page size in bytes, physical memory in pages).
    fn static_memory_info(&self) -> Result<(u64, u64), PalError> {
        Err(PalError::NotSupported("pstat_getstatic".into()))
    }

    /// HP-UX (real pages in use, free pages).
    fn dynamic_memory_info(&self) -> Result<(u64, u64), PalError> {
        Err(PalError::NotSupported("pstat_getdynamic".into()))
    }

    fn aix_memory_pages(&self) -> Result<AixMemoryPages, PalError> {
        Err(PalError::NotSupported("perfstat_memory_total".into()))
    }

    /// Pages paged in and out since boot on platforms without /proc/vmstat.
    fn paging_data(&self) -> Result<Option<(u64, u64)>, PalError> {
        Err(PalError::NotSupported("paging_data".into()))
    }
}

pub struct MemoryDependDefault {
    platform: Platform,
    meminfo: PathBuf,
    vmstat: PathBuf,
}

impl MemoryDependDefault {
    pub fn new(meminfo: impl AsRef<Path>, vmstat: impl AsRef<Path>) -> Self {
        Self {
            platform: Platform::current(),
            meminfo: meminfo.as_ref().to_path_buf(),
            vmstat: vmstat.as_ref().to_path_buf(),
        }
    }
}

fn read_lines(path: &Path) -> Result<Vec<String>, PalError> {
    let content = std::fs::read_to_string(path).map_err(|e| PalError::from_io(path, e))?;
    Ok(content.lines().map(str::to_string).collect())
}

impl MemoryDepend for MemoryDependDefault {
    fn platform(&self) -> Platform {
        self.platform
    }

    fn get_mem_info_lines(&self) -> Result<Vec<String>, PalError> {
        read_lines(&self.meminfo)
    }

    fn get_vm_stat_lines(&self) -> Result<Vec<String>, PalError> {
        read_lines(&self.vmstat)
    }
}
