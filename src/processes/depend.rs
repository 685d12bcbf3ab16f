// /proc/<pid> access for the process enumeration.

use crate::error::PalError;
use crate::platform::Platform;
use nix::errno::Errno;
use std::path::{Path, PathBuf};

pub trait ProcessDepend: Send + Sync {
    fn platform(&self) -> Platform;

    /// Numeric entries of the proc root, ascending.
    fn list_pids(&self) -> Result<Vec<u32>, PalError>;

    /// Contents of `<proc root>/<pid>/<file>`.
    fn read_proc_file(&self, pid: u32, file: &str) -> Result<String, PalError>;
}

/// A process that exits between listing and reading shows up as a missing
/// directory or ESRCH.
pub fn process_vanished(err: &PalError) -> bool {
    err.is_resource_vanished() || err.errno() == Some(Errno::ESRCH as i32)
}

pub struct ProcessDependDefault {
    platform: Platform,
    proc_root: PathBuf,
}

impl ProcessDependDefault {
    pub fn new(proc_root: impl AsRef<Path>) -> Self {
        Self {
            platform: Platform::current(),
            proc_root: proc_root.as_ref().to_path_buf(),
        }
    }
}

impl ProcessDepend for ProcessDependDefault {
    fn platform(&self) -> Platform {
        self.platform
    }

    fn list_pids(&self) -> Result<Vec<u32>, PalError> {
        if self.platform != Platform::Linux {
            return Err(PalError::NotSupported("/proc/<pid>".into()));
        }
        let entries = std::fs::read_dir(&self.proc_root).map_err(|e| PalError::from_io(&self.proc_root, e))?;
        let mut pids: Vec<u32> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().to_str().and_then(|n| n.parse().ok()))
            .collect();
        pids.sort_unstable();
        Ok(pids)
    }

    fn read_proc_file(&self, pid: u32, file: &str) -> Result<String, PalError> {
        if self.platform != Platform::Linux {
            return Err(PalError::NotSupported("/proc/<pid>".into()));
        }
        let path = self.proc_root.join(pid.to_string()).join(file);
        std::fs::read_to_string(&path).map_err(|e| PalError::from_io(&path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linux(root: &Path) -> ProcessDependDefault {
        ProcessDependDefault {
            platform: Platform::Linux,
            proc_root: root.to_path_buf(),
        }
    }

    #[test]
    fn lists_numeric_entries_only() {
        let root = tempfile::tempdir().unwrap();
        for name in ["42", "7", "self", "net", "1x"] {
            std::fs::create_dir(root.path().join(name)).unwrap();
        }
        std::fs::write(root.path().join("uptime"), "1.0 2.0\n").unwrap();
        assert_eq!(linux(root.path()).list_pids().unwrap(), vec![7, 42]);
    }

    #[test]
    fn reads_per_process_files() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir(root.path().join("9")).unwrap();
        std::fs::write(root.path().join("9").join("stat"), "9 (init) S 0\n").unwrap();
        let deps = linux(root.path());
        assert_eq!(deps.read_proc_file(9, "stat").unwrap(), "9 (init) S 0\n");

        let err = deps.read_proc_file(10, "stat").unwrap_err();
        assert!(process_vanished(&err));
    }

    #[test]
    fn other_platforms_have_no_proc_pids() {
        let deps = ProcessDependDefault {
            platform: Platform::Solaris,
            proc_root: PathBuf::from("/proc"),
        };
        assert!(matches!(deps.list_pids(), Err(PalError::NotSupported(_))));
        assert!(matches!(deps.read_proc_file(1, "stat"), Err(PalError::NotSupported(_))));
    }

    #[test]
    fn esrch_counts_as_vanished() {
        let err = PalError::from_errno("read", "/proc/5/stat", Errno::ESRCH);
        assert!(process_vanished(&err));
        assert!(!process_vanished(&PalError::InternalError("bad".into())));
    }
}
