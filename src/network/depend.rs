// Raw network sources: /proc/net/dev counters, the interface address table
// (getifaddrs) and per-interface sysfs attributes, plus the counter sources
// of the other unixes (kstat, perfstat, DLPI).

use crate::error::PalError;
use crate::platform::Platform;
use nix::ifaddrs::getifaddrs;
use nix::net::if_::InterfaceFlags;
use nix::sys::socket::SockaddrStorage;
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

/// One row of the interface address table. An interface with several
/// addresses appears once per address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterfaceAddress {
    pub name: String,
    pub up: bool,
    pub running: bool,
    pub loopback: bool,
    pub address: Option<IpAddr>,
    pub netmask: Option<IpAddr>,
    pub broadcast: Option<IpAddr>,
    pub mac: Option<[u8; 6]>,
}

/// A named kstat of class "net" (Solaris). Drivers differ in which counters
/// they publish, so values are kept by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KstatNamed {
    pub name: String,
    pub module: String,
    pub instance: i32,
    pub values: BTreeMap<String, u64>,
}

/// `perfstat_netinterface_t` fields used for interface counters (AIX).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PerfstatNetInterface {
    pub name: String,
    /// `type == IFT_ETHER`.
    pub ethernet: bool,
    pub ipackets: u64,
    pub opackets: u64,
    pub ibytes: u64,
    pub obytes: u64,
    pub ierrors: u64,
    pub oerrors: u64,
    pub collisions: u64,
}

/// MIB-II interface statistics of one LAN PPA, as the DLPI driver reports
/// them (HP-UX).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DlpiLanStats {
    /// Driver name without the PPA, e.g. "lan".
    pub name: String,
    pub ppa: u32,
    pub mac: [u8; 6],
    pub in_octets: u64,
    pub out_octets: u64,
    pub in_ucast_pkts: u64,
    pub in_nucast_pkts: u64,
    pub out_ucast_pkts: u64,
    pub out_nucast_pkts: u64,
    pub in_errors: u64,
    pub out_errors: u64,
    pub collisions: u64,
}

pub trait NetworkInterfaceDepend: Send + Sync {
    fn platform(&self) -> Platform;

    /// Lines of /proc/net/dev.
    fn get_dynamic_info_lines(&self) -> Result<Vec<String>, PalError>;

    fn interface_addresses(&self) -> Result<Vec<InterfaceAddress>, PalError>;

    /// Contents of /sys/class/net/<interface>/<attribute>, trimmed.
    fn read_interface_attribute(&self, interface: &str, attribute: &str) -> Result<String, PalError>;

    /// Every named kstat of class "net".
    fn kstat_net_interfaces(&self) -> Result<Vec<KstatNamed>, PalError> {
        Err(PalError::NotSupported("kstat".into()))
    }

    fn perfstat_net_interfaces(&self) -> Result<Vec<PerfstatNetInterface>, PalError> {
        Err(PalError::NotSupported("perfstat_netinterface".into()))
    }

    /// Statistics of every LAN PPA known to the DLPI driver.
    fn dlpi_lan_stats(&self) -> Result<Vec<DlpiLanStats>, PalError> {
        Err(PalError::NotSupported("dlpi".into()))
    }
}

pub struct NetworkInterfaceDependDefault {
    platform: Platform,
    proc_net_dev: PathBuf,
    sys_class_net: PathBuf,
}

impl NetworkInterfaceDependDefault {
    pub fn new(proc_net_dev: impl AsRef<Path>) -> Self {
        Self::with_paths(proc_net_dev, "/sys/class/net")
    }

    pub fn with_paths(proc_net_dev: impl AsRef<Path>, sys_class_net: impl AsRef<Path>) -> Self {
        Self {
            platform: Platform::current(),
            proc_net_dev: proc_net_dev.as_ref().to_path_buf(),
            sys_class_net: sys_class_net.as_ref().to_path_buf(),
        }
    }
}

fn ip_of(addr: Option<&SockaddrStorage>) -> Option<IpAddr> {
    let addr = addr?;
    if let Some(v4) = addr.as_sockaddr_in() {
        return Some(IpAddr::V4(v4.ip()));
    }
    addr.as_sockaddr_in6().map(|v6| IpAddr::V6(v6.ip()))
}

impl NetworkInterfaceDepend for NetworkInterfaceDependDefault {
    fn platform(&self) -> Platform {
        self.platform
    }

    fn get_dynamic_info_lines(&self) -> Result<Vec<String>, PalError> {
        let content = std::fs::read_to_string(&self.proc_net_dev)
            .map_err(|e| PalError::from_io(&self.proc_net_dev, e))?;
        Ok(content.lines().map(str::to_string).collect())
    }

    fn interface_addresses(&self) -> Result<Vec<InterfaceAddress>, PalError> {
        let addrs = getifaddrs().map_err(|e| PalError::from_errno("getifaddrs", "", e))?;
        Ok(addrs
            .map(|ifa| InterfaceAddress {
                up: ifa.flags.contains(InterfaceFlags::IFF_UP),
                running: ifa.flags.contains(InterfaceFlags::IFF_RUNNING),
                loopback: ifa.flags.contains(InterfaceFlags::IFF_LOOPBACK),
                address: ip_of(ifa.address.as_ref()),
                netmask: ip_of(ifa.netmask.as_ref()),
                broadcast: ip_of(ifa.broadcast.as_ref()),
                mac: ifa
                    .address
                    .as_ref()
                    .and_then(|a| a.as_link_addr())
                    .and_then(|l| l.addr()),
                name: ifa.interface_name,
            })
            .collect())
    }

    fn read_interface_attribute(&self, interface: &str, attribute: &str) -> Result<String, PalError> {
        let path = self.sys_class_net.join(interface).join(attribute);
        let content = std::fs::read_to_string(&path).map_err(|e| PalError::from_io(&path, e))?;
        Ok(content.trim().to_string())
    }
}
