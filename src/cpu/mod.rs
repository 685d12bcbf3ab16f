pub mod depend;
pub mod enumeration;
pub mod instance;

pub use depend::{CpuDepend, CpuDependDefault};
pub use enumeration::CpuEnumeration;
pub use instance::{CpuInstance, CpuTicks, CpuTimes, percentage};
