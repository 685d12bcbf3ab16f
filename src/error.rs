// Error taxonomy for raw OS access. "Unsupported on this platform" is not an
// error here: getters return Option for that.

use nix::errno::Errno;
use std::io;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PalError {
    #[error("path not found: {path}")]
    PathNotFound { path: String },

    #[error("permission denied: {path}")]
    PermissionDenied { path: String },

    #[error("resource exhausted: {what}")]
    ResourceExhausted { what: String },

    #[error("{operation} failed with errno {errno}")]
    Errno { operation: String, errno: i32 },

    #[error("internal error: {0}")]
    InternalError(String),

    #[error("not supported on this platform: {0}")]
    NotSupported(String),

    #[error("index {index} out of range for {len} samples")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("command '{command}' timed out after {timeout_ms} ms")]
    ProcessTimeout { command: String, timeout_ms: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl PalError {
    /// Translate an errno from a syscall wrapper into the matching error kind.
    pub fn from_errno(operation: &str, path: &str, errno: Errno) -> Self {
        match errno {
            Errno::ENOENT | Errno::ENOTDIR | Errno::ENXIO | Errno::ENODEV => {
                PalError::PathNotFound { path: path.into() }
            }
            Errno::EACCES | Errno::EPERM => PalError::PermissionDenied { path: path.into() },
            Errno::ENOMEM | Errno::EMFILE | Errno::ENFILE | Errno::ENOSPC => {
                PalError::ResourceExhausted {
                    what: format!("{} ({})", operation, path),
                }
            }
            other => PalError::Errno {
                operation: format!("{}({})", operation, path),
                errno: other as i32,
            },
        }
    }

    /// Same translation for std I/O errors, keeping the path for diagnostics.
    pub fn from_io(path: impl AsRef<Path>, err: io::Error) -> Self {
        let path = path.as_ref().display().to_string();
        match err.kind() {
            io::ErrorKind::NotFound => PalError::PathNotFound { path },
            io::ErrorKind::PermissionDenied => PalError::PermissionDenied { path },
            _ => match err.raw_os_error() {
                Some(code) => PalError::from_errno("io", &path, Errno::from_raw(code)),
                None => PalError::Io(err),
            },
        }
    }

    /// Raw errno carried by this error, if any.
    pub fn errno(&self) -> Option<i32> {
        match self {
            PalError::Errno { errno, .. } => Some(*errno),
            PalError::Io(e) => e.raw_os_error(),
            _ => None,
        }
    }

    /// Device or file disappeared between discovery and read.
    pub fn is_resource_vanished(&self) -> bool {
        matches!(self, PalError::PathNotFound { .. })
    }
}
