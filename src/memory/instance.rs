// System memory: sizes refreshed by update(), paging rates from a sampler
// driven by the background worker.

use super::depend::MemoryDepend;
use crate::entity::{EntityEnumeration, EntityInstance, Handle, SampleSource, TOTAL_ID, lock};
use crate::error::PalError;
use crate::platform::Platform;
use crate::sampler::{DataSampler, SamplingPolicy};
use std::sync::Arc;
use tracing::instrument;

const KIB: u64 = 1024;
/// AIX reports memory in 4 KiB pages.
const AIX_PAGE_SIZE: u64 = 4 * KIB;

/// Leading digits of a meminfo value; tolerates a glued unit (`524288kB`).
fn parse_kib(token: &str) -> Option<u64> {
    let end = token.find(|c: char| !c.is_ascii_digit()).unwrap_or(token.len());
    token[..end].parse().ok()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct MemInfo {
    total: Option<u64>,
    free: Option<u64>,
    available: Option<u64>,
    buffers: u64,
    cached: u64,
    swap_total: Option<u64>,
    swap_free: Option<u64>,
}

/// Values from /proc/meminfo in bytes.
fn parse_meminfo(lines: &[String]) -> MemInfo {
    let mut info = MemInfo::default();
    for line in lines {
        let mut tokens = line.split_whitespace();
        let (Some(key), Some(value)) = (tokens.next(), tokens.next()) else {
            continue;
        };
        let slot = match key {
            "MemTotal:" => &mut info.total,
            "MemFree:" => &mut info.free,
            "MemAvailable:" => &mut info.available,
            "SwapTotal:" => &mut info.swap_total,
            "SwapFree:" => &mut info.swap_free,
            "Buffers:" | "Cached:" => {
                match parse_kib(value) {
                    Some(kib) if key == "Buffers:" => info.buffers = kib * KIB,
                    Some(kib) => info.cached = kib * KIB,
                    None => tracing::warn!(line = %line, "could not parse meminfo value"),
                }
                continue;
            }
            _ => continue,
        };
        match parse_kib(value) {
            Some(kib) => *slot = Some(kib * KIB),
            None => tracing::warn!(line = %line, "could not parse meminfo value"),
        }
    }
    info
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct MemorySizes {
    total_physical: u64,
    reserved: u64,
    available: u64,
    used: u64,
    total_swap: u64,
    available_swap: u64,
    used_swap: u64,
}

pub struct MemoryInstance {
    deps: Arc<dyn MemoryDepend>,
    platform: Platform,
    policy: SamplingPolicy,
    sizes: MemorySizes,
    page_reads: DataSampler<u64>,
    page_writes: DataSampler<u64>,
}

impl EntityInstance for MemoryInstance {
    fn id(&self) -> &str {
        TOTAL_ID
    }

    fn is_total(&self) -> bool {
        true
    }
}

impl MemoryInstance {
    pub fn new(deps: Arc<dyn MemoryDepend>, policy: SamplingPolicy) -> Self {
        Self {
            platform: deps.platform(),
            deps,
            policy,
            sizes: MemorySizes::default(),
            page_reads: DataSampler::new(policy.samples),
            page_writes: DataSampler::new(policy.samples),
        }
    }

    /// Refresh every size that is not time dependent.
    #[instrument(skip(self), fields(subsystem = "memory", operation = "update"))]
    pub fn update(&mut self) -> Result<(), PalError> {
        self.sizes = match self.platform {
            Platform::Linux => self.sizes_linux()?,
            Platform::Solaris => self.sizes_solaris()?,
            Platform::HpUx => self.sizes_hpux()?,
            Platform::Aix => self.sizes_aix()?,
        };
        tracing::trace!(
            total = self.sizes.total_physical,
            available = self.sizes.available,
            used = self.sizes.used,
            "memory updated"
        );
        Ok(())
    }

    fn sizes_linux(&self) -> Result<MemorySizes, PalError> {
        let info = parse_meminfo(&self.deps.get_mem_info_lines()?);
        for (name, value) in [
            ("MemTotal", info.total),
            ("MemFree", info.free),
            ("SwapTotal", info.swap_total),
            ("SwapFree", info.swap_free),
        ] {
            if value.is_none() {
                tracing::warn!(field = name, "meminfo field not found");
            }
        }
        let total_physical = info.total.unwrap_or(0);
        // Kernels since 3.14 estimate available memory themselves.
        let available = match info.available {
            Some(available) if available != 0 => available,
            _ => info.free.unwrap_or(0) + info.buffers + info.cached,
        };
        let total_swap = info.swap_total.unwrap_or(0);
        let available_swap = info.swap_free.unwrap_or(0);
        Ok(MemorySizes {
            total_physical,
            reserved: 0,
            available,
            used: total_physical.saturating_sub(available),
            total_swap,
            available_swap,
            used_swap: total_swap.saturating_sub(available_swap),
        })
    }

    fn sizes_solaris(&self) -> Result<MemorySizes, PalError> {
        let page_size = self.deps.page_size()?;
        let total_physical = self.deps.physical_pages()? * page_size;
        // ARC is reclaimable, so it counts as available.
        let available = self.deps.available_physical_pages()? * page_size + self.cache_size().unwrap_or(0);
        let swap = self.deps.swap_info()?;
        Ok(MemorySizes {
            total_physical,
            reserved: 0,
            available,
            used: total_physical.saturating_sub(available),
            total_swap: swap.max_pages * page_size,
            available_swap: swap.max_pages.saturating_sub(swap.reserved_pages) * page_size,
            used_swap: swap.reserved_pages * page_size,
        })
    }

    fn sizes_hpux(&self) -> Result<MemorySizes, PalError> {
        let (page_size, physical_pages) = self.deps.static_memory_info()?;
        let (real_pages, free_pages) = self.deps.dynamic_memory_info()?;
        let total_physical = physical_pages * page_size;
        let used = real_pages * page_size;
        let available = free_pages * page_size;
        let swap = self.deps.swap_info()?;
        Ok(MemorySizes {
            total_physical,
            // Pseudo-swap reservations; recomputed each time so the parts add up.
            reserved: total_physical.saturating_sub(used).saturating_sub(available),
            available,
            used,
            total_swap: swap.max_pages * page_size,
            available_swap: swap.max_pages.saturating_sub(swap.reserved_pages) * page_size,
            used_swap: swap.reserved_pages * page_size,
        })
    }

    fn sizes_aix(&self) -> Result<MemorySizes, PalError> {
        let pages = self.deps.aix_memory_pages()?;
        let total_physical = pages.total_pages * AIX_PAGE_SIZE;
        let available = pages.free_pages * AIX_PAGE_SIZE;
        let total_swap = pages.max_swap_pages * AIX_PAGE_SIZE;
        let available_swap = pages.free_swap_pages * AIX_PAGE_SIZE;
        Ok(MemorySizes {
            total_physical,
            reserved: 0,
            available,
            used: total_physical.saturating_sub(available),
            total_swap,
            available_swap,
            used_swap: total_swap.saturating_sub(available_swap),
        })
    }

    /// Pages read and written since boot.
    pub fn paging_since_boot(&self) -> Result<(u64, u64), PalError> {
        if self.platform != Platform::Linux {
            return self
                .deps
                .paging_data()?
                .ok_or_else(|| PalError::InternalError("paging data unavailable".into()));
        }

        let mut page_reads = None;
        let mut page_writes = None;
        for line in self.deps.get_vm_stat_lines()? {
            let mut tokens = line.split_whitespace();
            let (Some(key), Some(value)) = (tokens.next(), tokens.next()) else {
                continue;
            };
            match key {
                "pgpgin" => page_reads = value.parse::<u64>().ok(),
                "pgpgout" => page_writes = value.parse::<u64>().ok(),
                _ => continue,
            }
            if page_reads.is_some() && page_writes.is_some() {
                break;
            }
        }
        match (page_reads, page_writes) {
            (Some(reads), Some(writes)) => Ok((reads, writes)),
            _ => Err(PalError::InternalError("pgpgin/pgpgout not found in vmstat".into())),
        }
    }

    /// Push one paging sample.
    pub fn sample(&mut self) {
        match self.paging_since_boot() {
            Ok((reads, writes)) => {
                self.page_reads.push(reads);
                self.page_writes.push(writes);
            }
            Err(e) => {
                tracing::error!(error = %e, operation = "paging_since_boot", "could not read paging counters");
            }
        }
    }

    pub fn total_physical_memory(&self) -> Option<u64> {
        Some(self.sizes.total_physical)
    }

    pub fn available_memory(&self) -> Option<u64> {
        Some(self.sizes.available)
    }

    /// Memory the system keeps for itself; only HP-UX separates it from used memory.
    pub fn reserved_memory(&self) -> Option<u64> {
        (self.platform == Platform::HpUx).then_some(self.sizes.reserved)
    }

    pub fn used_memory(&self) -> Option<u64> {
        Some(self.sizes.used)
    }

    /// Pages read per second to resolve hard faults.
    pub fn page_reads(&self) -> Option<u64> {
        Some(self.policy.rate(&self.page_reads))
    }

    pub fn page_writes(&self) -> Option<u64> {
        Some(self.policy.rate(&self.page_writes))
    }

    pub fn total_swap(&self) -> Option<u64> {
        Some(self.sizes.total_swap)
    }

    pub fn available_swap(&self) -> Option<u64> {
        Some(self.sizes.available_swap)
    }

    pub fn used_swap(&self) -> Option<u64> {
        Some(self.sizes.used_swap)
    }

    /// ZFS cache size; Solaris only.
    pub fn cache_size(&self) -> Option<u64> {
        if self.platform != Platform::Solaris {
            return None;
        }
        match self.deps.zfs_arc_size() {
            Ok(size) => size,
            Err(e) => {
                tracing::debug!(error = %e, "zfs arc size unavailable");
                None
            }
        }
    }
}

/// Memory has exactly one instance, the total.
pub struct MemoryEnumeration {
    deps: Arc<dyn MemoryDepend>,
    policy: SamplingPolicy,
    instances: EntityEnumeration<MemoryInstance>,
}

impl MemoryEnumeration {
    pub fn new(deps: Arc<dyn MemoryDepend>, policy: SamplingPolicy) -> Self {
        Self {
            deps,
            policy,
            instances: EntityEnumeration::new(),
        }
    }

    pub fn init(&mut self) {
        self.instances
            .set_total(MemoryInstance::new(self.deps.clone(), self.policy));
        self.update(true);
    }

    pub fn update(&mut self, update_instances: bool) {
        if !update_instances {
            return;
        }
        if let Some(total) = self.instances.total()
            && let Err(e) = lock(&total).update()
        {
            tracing::error!(error = %e, operation = "memory_update", "memory update failed");
        }
    }

    pub fn total(&self) -> Option<Handle<MemoryInstance>> {
        self.instances.total()
    }
}

impl SampleSource for MemoryEnumeration {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn sample(&mut self) {
        if let Some(total) = self.instances.total() {
            lock(&total).sample();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(s: &[&str]) -> Vec<String> {
        s.iter().map(|l| l.to_string()).collect()
    }

    #[test]
    fn parse_kib_accepts_glued_unit() {
        assert_eq!(parse_kib("524288kB"), Some(524288));
        assert_eq!(parse_kib("42"), Some(42));
        assert_eq!(parse_kib("kB"), None);
    }

    #[test]
    fn parse_meminfo_reads_known_fields_in_bytes() {
        let info = parse_meminfo(&lines(&[
            "MemTotal:       516400 kB",
            "MemFree:         91988 kB",
            "Buffers:         46148 kB",
            "Cached:         277860 kB",
            "SwapTotal:      514040 kB",
            "SwapFree:       402508 kB",
            "HugePages_Total:     0",
        ]));
        assert_eq!(info.total, Some(516400 * 1024));
        assert_eq!(info.free, Some(91988 * 1024));
        assert_eq!(info.buffers, 46148 * 1024);
        assert_eq!(info.cached, 277860 * 1024);
        assert_eq!(info.available, None);
        assert_eq!(info.swap_free, Some(402508 * 1024));
    }
}
