pub mod depend;
pub mod enumeration;
pub mod instance;

pub use depend::{ProcessDepend, ProcessDependDefault};
pub use enumeration::ProcessEnumeration;
pub use instance::{
    CLOCK_TICKS_PER_SECOND, ProcStat, ProcStatus, ProcessInstance, ProcessTimes, parse_stat, parse_status,
    scx_priority,
};
