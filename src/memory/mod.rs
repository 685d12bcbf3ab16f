pub mod depend;
pub mod instance;

pub use depend::{AixMemoryPages, MemoryDepend, MemoryDependDefault, SwapPages};
pub use instance::{MemoryEnumeration, MemoryInstance};
