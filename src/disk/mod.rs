pub mod depend;
pub mod enumeration;
pub mod linux;
pub mod lvm;
pub mod partition;
pub mod statistical;
pub mod volume_group;

pub use depend::{DiskDepend, DiskInterfaceType, MntTabEntry, MntTabFilter};
pub use enumeration::StatisticalDiskEnumeration;
pub use linux::DiskDependDefault;
pub use partition::{StaticDiskPartitionEnumeration, StaticDiskPartitionInstance};
pub use statistical::{DiskKind, DiskMetrics, LastMetrics, StatisticalDiskInstance};
