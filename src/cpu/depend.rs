// /proc/stat access for the cpu enumeration.

use crate::error::PalError;
use crate::platform::Platform;
use std::path::{Path, PathBuf};

pub trait CpuDepend: Send + Sync {
    fn platform(&self) -> Platform;

    /// Lines of /proc/stat.
    fn get_stat_lines(&self) -> Result<Vec<String>, PalError>;
}

pub struct CpuDependDefault {
    platform: Platform,
    proc_stat: PathBuf,
}

impl CpuDependDefault {
    pub fn new(proc_stat: impl AsRef<Path>) -> Self {
        Self {
            platform: Platform::current(),
            proc_stat: proc_stat.as_ref().to_path_buf(),
        }
    }
}

impl CpuDepend for CpuDependDefault {
    fn platform(&self) -> Platform {
        self.platform
    }

    fn get_stat_lines(&self) -> Result<Vec<String>, PalError> {
        if self.platform != Platform::Linux {
            return Err(PalError::NotSupported("/proc/stat".into()));
        }
        let content = std::fs::read_to_string(&self.proc_stat)
            .map_err(|e| PalError::from_io(&self.proc_stat, e))?;
        Ok(content.lines().map(str::to_string).collect())
    }
}
