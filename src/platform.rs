// OS family selector. Collectors branch on this value instead of on build
// target, so every family's code path runs (and is tested) on any host.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Linux,
    Solaris,
    Aix,
    HpUx,
}

impl Platform {
    /// Family of the host this binary was built for.
    pub const fn current() -> Self {
        if cfg!(any(target_os = "solaris", target_os = "illumos")) {
            Platform::Solaris
        } else if cfg!(target_os = "aix") {
            Platform::Aix
        } else {
            Platform::Linux
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Platform::Linux => "linux",
            Platform::Solaris => "solaris",
            Platform::Aix => "aix",
            Platform::HpUx => "hpux",
        }
    }
}

impl Default for Platform {
    fn default() -> Self {
        Self::current()
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
