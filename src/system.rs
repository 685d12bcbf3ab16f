// Computer-system identity via sysinfo, with os-release and DMI fallbacks.

use serde::Serialize;
use std::path::Path;
use sysinfo::System;
use tracing::instrument;

const OS_RELEASE: &str = "/etc/os-release";
const DMI_SYS_VENDOR: &str = "/sys/class/dmi/id/sys_vendor";
const DMI_PRODUCT_NAME: &str = "/sys/class/dmi/id/product_name";
const CPUINFO: &str = "/proc/cpuinfo";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemIdentity {
    pub host_name: String,
    pub os_family: String,
    pub os_name: String,
    pub os_version: String,
    pub kernel_version: String,
    /// Distribution pretty name ("Ubuntu 24.04.1 LTS").
    pub distribution: String,
    pub system_vendor: String,
    pub system_model: String,
    pub processor_name: String,
    pub uptime_secs: u64,
}

impl SystemIdentity {
    /// Blocking; call from a blocking context.
    pub fn collect() -> Self {
        let sys = System::new_all();
        let processor_name = read_cpu_model(Path::new(CPUINFO))
            .or_else(|| {
                sys.cpus()
                    .first()
                    .map(|c| c.brand().to_string())
                    .filter(|s| !s.is_empty() && s != "cpu0")
            })
            .unwrap_or_else(|| "Unknown".into());

        let os_name = System::name().unwrap_or_else(|| std::env::consts::OS.into());
        Self {
            host_name: System::host_name().unwrap_or_default(),
            os_family: std::env::consts::OS.to_string(),
            distribution: read_os_release(Path::new(OS_RELEASE)).unwrap_or_else(|| os_name.clone()),
            os_name,
            os_version: System::os_version().unwrap_or_default(),
            kernel_version: System::kernel_version().unwrap_or_default(),
            system_vendor: read_trimmed(Path::new(DMI_SYS_VENDOR)).unwrap_or_default(),
            system_model: read_trimmed(Path::new(DMI_PRODUCT_NAME)).unwrap_or_default(),
            processor_name,
            uptime_secs: System::uptime(),
        }
    }

    #[instrument(fields(subsystem = "system", operation = "gather"))]
    pub async fn gather() -> anyhow::Result<Self> {
        tokio::task::spawn_blocking(Self::collect)
            .await
            .map_err(|e| anyhow::anyhow!("system identity task join: {}", e))
    }
}

fn read_trimmed(path: &Path) -> Option<String> {
    let v = std::fs::read_to_string(path).ok()?;
    let v = v.trim();
    (!v.is_empty()).then(|| v.to_string())
}

/// PRETTY_NAME, else NAME, from an os-release file.
pub fn read_os_release(path: &Path) -> Option<String> {
    let content = std::fs::read_to_string(path).ok()?;
    parse_os_release(&content)
}

pub fn parse_os_release(content: &str) -> Option<String> {
    let value = |key: &str| {
        content
            .lines()
            .find_map(|line| line.strip_prefix(key))
            .map(|v| v.trim().trim_matches('"').to_string())
            .filter(|v| !v.is_empty())
    };
    value("PRETTY_NAME=").or_else(|| value("NAME="))
}

/// First "model name" in a cpuinfo file.
pub fn read_cpu_model(path: &Path) -> Option<String> {
    let content = std::fs::read_to_string(path).ok()?;
    content
        .lines()
        .filter(|line| line.starts_with("model name"))
        .find_map(|line| line.split_once(':').map(|(_, v)| v.trim().to_string()))
        .filter(|s| !s.is_empty() && s != "cpu0")
}
