// Snapshot of one network interface: counters from the platform's statistics
// source plus the attributes the address table and sysfs can supply.

use super::depend::{DlpiLanStats, InterfaceAddress, KstatNamed, NetworkInterfaceDepend, PerfstatNetInterface};
use crate::error::PalError;
use crate::platform::Platform;
use serde::Serialize;
use std::collections::BTreeSet;
use std::net::IpAddr;
use std::sync::{LazyLock, Mutex};
use tracing::instrument;

/// Interfaces that have been seen up or running at least once in this process.
static EVER_RUNNING: LazyLock<Mutex<BTreeSet<String>>> = LazyLock::new(|| Mutex::new(BTreeSet::new()));

/// Counter names whose presence marks a kstat as an interface.
const KSTAT_COUNTERS: [&str; 11] = [
    "ipackets",
    "opackets",
    "ipackets64",
    "opackets64",
    "rbytes",
    "obytes",
    "rbytes64",
    "obytes64",
    "ierrors",
    "oerrors",
    "collisions",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AdapterType {
    Ethernet,
    TokenRing,
    Fddi,
    Atm,
    Ieee1394,
    Wireless,
    Tunnel,
    Loopback,
    Other,
}

impl AdapterType {
    /// Map an ARPHRD_* value from /sys/class/net/<if>/type.
    pub fn from_arphrd(value: u32) -> Self {
        match value {
            1 => AdapterType::Ethernet,
            4 | 6 => AdapterType::TokenRing,
            19 => AdapterType::Atm,
            24 => AdapterType::Ieee1394,
            772 => AdapterType::Loopback,
            774 => AdapterType::Fddi,
            768..=778 => AdapterType::Tunnel,
            801..=804 => AdapterType::Wireless,
            _ => AdapterType::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Availability {
    RunningFullPower,
    Offline,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
    HardwareDisabled,
}

/// Raw cumulative counters for one interface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceCounters {
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub packets_sent: u64,
    pub packets_received: u64,
    pub errors_sending: u64,
    pub errors_receiving: u64,
    pub collisions: u64,
}

impl InterfaceCounters {
    pub fn saturating_add(self, other: Self) -> Self {
        Self {
            bytes_sent: self.bytes_sent.saturating_add(other.bytes_sent),
            bytes_received: self.bytes_received.saturating_add(other.bytes_received),
            packets_sent: self.packets_sent.saturating_add(other.packets_sent),
            packets_received: self.packets_received.saturating_add(other.packets_received),
            errors_sending: self.errors_sending.saturating_add(other.errors_sending),
            errors_receiving: self.errors_receiving.saturating_add(other.errors_receiving),
            collisions: self.collisions.saturating_add(other.collisions),
        }
    }
}

/// Unknown attributes are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkInterfaceInfo {
    pub name: String,
    pub counters: InterfaceCounters,
    pub ip_address: Option<String>,
    pub netmask: Option<String>,
    pub broadcast_address: Option<String>,
    pub ipv6_addresses: Vec<String>,
    pub mac_address: Option<String>,
    pub mtu: Option<u64>,
    /// Bits per second.
    pub speed: Option<u64>,
    pub up: Option<bool>,
    pub running: Option<bool>,
    pub adapter_type: Option<AdapterType>,
    pub physical_adapter: Option<bool>,
    pub availability: Option<Availability>,
    pub connection_status: Option<ConnectionStatus>,
}

impl NetworkInterfaceInfo {
    /// Both link flags are known.
    pub fn known_state(&self) -> bool {
        self.up.is_some() && self.running.is_some()
    }

    pub fn is_up_and_running(&self) -> bool {
        self.up == Some(true) && self.running == Some(true)
    }

    pub fn is_loopback_address(&self) -> bool {
        self.ip_address.as_deref().is_some_and(|ip| ip.starts_with("127.0.0."))
    }

    /// Every interface the platform's statistics source reports, except
    /// loopback. Unless `include_non_running` is set, only interfaces that
    /// are, or have once been, up or running are returned.
    #[instrument(skip(deps), fields(subsystem = "network", operation = "find_all"))]
    pub fn find_all(deps: &dyn NetworkInterfaceDepend, include_non_running: bool) -> Result<Vec<Self>, PalError> {
        let sources = read_counters(deps)?;
        let table = match deps.interface_addresses() {
            Ok(table) => table,
            Err(e) => {
                tracing::warn!(error = %e, "unable to read interface address table");
                Vec::new()
            }
        };

        let mut result = Vec::new();
        let mut ever_running = EVER_RUNNING.lock().unwrap_or_else(|e| e.into_inner());
        for source in sources {
            let name = source.name;
            let rows: Vec<&InterfaceAddress> = table.iter().filter(|a| a.name == name).collect();
            // Interfaces the address table does not know cannot be classified.
            let Some(first) = rows.first() else {
                tracing::debug!(interface = %name, "interface missing from address table, skipped");
                continue;
            };
            if first.loopback {
                continue;
            }

            let mut info = NetworkInterfaceInfo {
                name,
                counters: source.counters,
                speed: source.speed,
                mac_address: source.mac.as_ref().map(format_mac),
                ..Self::default()
            };
            info.fill_attributes(deps, &rows);

            if info.up == Some(true) || info.running == Some(true) {
                ever_running.insert(info.name.clone());
            }
            if include_non_running || ever_running.contains(&info.name) {
                result.push(info);
            }
        }
        Ok(result)
    }

    fn fill_attributes(&mut self, deps: &dyn NetworkInterfaceDepend, rows: &[&InterfaceAddress]) {
        if let Some(first) = rows.first() {
            self.up = Some(first.up);
            self.running = Some(first.running);
        }
        for row in rows {
            match row.address {
                Some(IpAddr::V4(ip)) if self.ip_address.is_none() => {
                    self.ip_address = Some(ip.to_string());
                    self.netmask = row.netmask.map(|m| m.to_string());
                    self.broadcast_address = row.broadcast.map(|b| b.to_string());
                }
                Some(IpAddr::V6(ip)) => self.ipv6_addresses.push(ip.to_string()),
                _ => {}
            }
            if self.mac_address.is_none()
                && let Some(mac) = row.mac
            {
                self.mac_address = Some(format_mac(&mac));
            }
        }

        if deps.platform() == Platform::Linux {
            self.fill_sysfs_attributes(deps);
        }

        if let (Some(up), Some(running)) = (self.up, self.running) {
            self.availability = Some(if up && running {
                Availability::RunningFullPower
            } else if !up {
                Availability::Offline
            } else {
                Availability::Unknown
            });
            self.connection_status = Some(if running {
                ConnectionStatus::Connected
            } else if up {
                ConnectionStatus::Disconnected
            } else {
                ConnectionStatus::HardwareDisabled
            });
        }
    }

    fn fill_sysfs_attributes(&mut self, deps: &dyn NetworkInterfaceDepend) {
        self.mtu = deps
            .read_interface_attribute(&self.name, "mtu")
            .ok()
            .and_then(|v| v.parse().ok());
        // sysfs reports Mbit/s, or -1 when the link is down.
        self.speed = deps
            .read_interface_attribute(&self.name, "speed")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|mbps| *mbps > 0)
            .map(|mbps| mbps as u64 * 1_000_000);
        if let Some(arphrd) = deps
            .read_interface_attribute(&self.name, "type")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
        {
            self.adapter_type = Some(AdapterType::from_arphrd(arphrd));
            // Hardware link types sit below the pseudo-device range.
            self.physical_adapter = Some(arphrd < 256);
        }
    }
}

/// Counters of one interface as its statistics source reports them.
#[derive(Debug, Default)]
struct CounterSource {
    name: String,
    counters: InterfaceCounters,
    /// Bits per second.
    speed: Option<u64>,
    mac: Option<[u8; 6]>,
}

fn read_counters(deps: &dyn NetworkInterfaceDepend) -> Result<Vec<CounterSource>, PalError> {
    Ok(match deps.platform() {
        Platform::Linux => parse_net_dev(&deps.get_dynamic_info_lines()?)
            .into_iter()
            .map(|(name, counters)| CounterSource {
                name,
                counters,
                ..CounterSource::default()
            })
            .collect(),
        Platform::Solaris => deps
            .kstat_net_interfaces()?
            .iter()
            .filter_map(from_kstat)
            .collect(),
        Platform::Aix => deps
            .perfstat_net_interfaces()?
            .iter()
            .filter(|p| p.ethernet)
            .map(from_perfstat)
            .collect(),
        Platform::HpUx => deps.dlpi_lan_stats()?.iter().map(from_dlpi).collect(),
    })
}

/// Interface counters from a "net" kstat, preferring the 64-bit variants.
/// Kstats with `lbufs` or without any counter are not interfaces.
fn from_kstat(k: &KstatNamed) -> Option<CounterSource> {
    let value = |name: &str| k.values.get(name).copied();
    if value("lbufs").is_some() || !KSTAT_COUNTERS.iter().any(|c| k.values.contains_key(*c)) {
        tracing::trace!(kstat = %k.name, module = %k.module, "kstat has no interface counters");
        return None;
    }
    let best = |wide: &str, narrow: &str| value(wide).or_else(|| value(narrow)).unwrap_or(0);
    Some(CounterSource {
        name: k.name.clone(),
        counters: InterfaceCounters {
            bytes_sent: best("obytes64", "obytes"),
            bytes_received: best("rbytes64", "rbytes"),
            packets_sent: best("opackets64", "opackets"),
            packets_received: best("ipackets64", "ipackets"),
            errors_sending: value("oerrors").unwrap_or(0),
            errors_receiving: value("ierrors").unwrap_or(0),
            collisions: value("collisions").unwrap_or(0),
        },
        speed: value("ifspeed"),
        mac: None,
    })
}

fn from_perfstat(p: &PerfstatNetInterface) -> CounterSource {
    CounterSource {
        name: p.name.clone(),
        counters: InterfaceCounters {
            bytes_sent: p.obytes,
            bytes_received: p.ibytes,
            packets_sent: p.opackets,
            packets_received: p.ipackets,
            errors_sending: p.oerrors,
            errors_receiving: p.ierrors,
            collisions: p.collisions,
        },
        ..CounterSource::default()
    }
}

fn from_dlpi(d: &DlpiLanStats) -> CounterSource {
    CounterSource {
        name: format!("{}{}", d.name, d.ppa),
        counters: InterfaceCounters {
            bytes_sent: d.out_octets,
            bytes_received: d.in_octets,
            packets_sent: d.out_ucast_pkts.saturating_add(d.out_nucast_pkts),
            packets_received: d.in_ucast_pkts.saturating_add(d.in_nucast_pkts),
            errors_sending: d.out_errors,
            errors_receiving: d.in_errors,
            collisions: d.collisions,
        },
        speed: None,
        mac: Some(d.mac),
    }
}

fn format_mac(mac: &[u8; 6]) -> String {
    mac.iter().map(|b| format!("{:02x}", b)).collect::<Vec<_>>().join(":")
}

/// Parse /proc/net/dev into (interface, counters). The two header lines are
/// skipped; the interface name may be glued to the first counter ("eth0:123").
pub fn parse_net_dev(lines: &[String]) -> Vec<(String, InterfaceCounters)> {
    let mut result = Vec::new();
    for line in lines.iter().skip(2) {
        let Some((name, rest)) = line.split_once(':') else {
            continue;
        };
        let name = name.trim();
        let fields: Vec<u64> = rest
            .split_whitespace()
            .map_while(|f| f.parse::<u64>().ok())
            .collect();
        if name.is_empty() || fields.len() < 14 {
            tracing::debug!(line = %line, "short line in /proc/net/dev");
            continue;
        }
        result.push((
            name.to_string(),
            InterfaceCounters {
                bytes_received: fields[0],
                packets_received: fields[1],
                errors_receiving: fields[2],
                bytes_sent: fields[8],
                packets_sent: fields[9],
                errors_sending: fields[10],
                collisions: fields[13],
            },
        ));
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(s: &str) -> Vec<String> {
        s.lines().map(str::to_string).collect()
    }

    const NET_DEV: &str = "\
Inter-|   Receive                                                |  Transmit
 face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
    lo:  123456     100    0    0    0     0          0         0   123456     100    0    0    0     0       0          0
  eth0:1000 10 1 0 0 0 0 0 2000 20 2 0 0 3 0 0
";

    #[test]
    fn parse_net_dev_maps_receive_and_transmit_columns() {
        let parsed = parse_net_dev(&lines(NET_DEV));
        assert_eq!(parsed.len(), 2);
        let (name, c) = &parsed[1];
        assert_eq!(name, "eth0");
        assert_eq!(c.bytes_received, 1000);
        assert_eq!(c.packets_received, 10);
        assert_eq!(c.errors_receiving, 1);
        assert_eq!(c.bytes_sent, 2000);
        assert_eq!(c.packets_sent, 20);
        assert_eq!(c.errors_sending, 2);
        assert_eq!(c.collisions, 3);
    }

    #[test]
    fn parse_net_dev_skips_short_rows() {
        let parsed = parse_net_dev(&lines("h1\nh2\n eth1: 1 2 3\n"));
        assert!(parsed.is_empty());
    }

    #[test]
    fn adapter_type_maps_common_arphrd_values() {
        assert_eq!(AdapterType::from_arphrd(1), AdapterType::Ethernet);
        assert_eq!(AdapterType::from_arphrd(772), AdapterType::Loopback);
        assert_eq!(AdapterType::from_arphrd(776), AdapterType::Tunnel);
        assert_eq!(AdapterType::from_arphrd(801), AdapterType::Wireless);
        assert_eq!(AdapterType::from_arphrd(9999), AdapterType::Other);
    }

    #[test]
    fn format_mac_uses_lowercase_hex_pairs() {
        assert_eq!(format_mac(&[0, 0x1b, 0x21, 0xaa, 0x0f, 0xff]), "00:1b:21:aa:0f:ff");
    }
}
