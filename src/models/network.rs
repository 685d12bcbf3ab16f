// Network interface snapshot model

use crate::entity::EntityInstance;
use crate::network::{AdapterType, InterfaceCounters, InterfaceRates, NetworkInterfaceInstance};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInterfaceSnapshot {
    pub name: String,
    pub is_total: bool,
    pub counters: InterfaceCounters,
    pub bytes_sent_per_second: u64,
    pub bytes_received_per_second: u64,
    pub packets_sent_per_second: u64,
    pub packets_received_per_second: u64,
    pub errors_per_second: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub netmask: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ipv6_addresses: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mac_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mtu: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub up: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub running: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adapter_type: Option<AdapterType>,
}

impl NetworkInterfaceSnapshot {
    pub fn from_instance(i: &NetworkInterfaceInstance) -> Self {
        let InterfaceRates {
            bytes_sent,
            bytes_received,
            packets_sent,
            packets_received,
            errors_sending,
            errors_receiving,
            ..
        } = i.rates();
        let info = i.info();
        Self {
            name: i.name().to_string(),
            is_total: i.is_total(),
            counters: i.counters(),
            bytes_sent_per_second: bytes_sent,
            bytes_received_per_second: bytes_received,
            packets_sent_per_second: packets_sent,
            packets_received_per_second: packets_received,
            errors_per_second: errors_sending.saturating_add(errors_receiving),
            ip_address: info.ip_address.clone(),
            netmask: info.netmask.clone(),
            ipv6_addresses: info.ipv6_addresses.clone(),
            mac_address: info.mac_address.clone(),
            mtu: info.mtu,
            speed: info.speed,
            up: info.up,
            running: info.running,
            adapter_type: info.adapter_type,
        }
    }
}
