pub mod depend;
pub mod enumeration;
pub mod info;
pub mod instance;

pub use depend::{
    DlpiLanStats, InterfaceAddress, KstatNamed, NetworkInterfaceDepend, NetworkInterfaceDependDefault,
    PerfstatNetInterface,
};
pub use enumeration::NetworkInterfaceEnumeration;
pub use info::{AdapterType, Availability, ConnectionStatus, InterfaceCounters, NetworkInterfaceInfo};
pub use instance::{InterfaceRates, NetworkInterfaceInstance};
