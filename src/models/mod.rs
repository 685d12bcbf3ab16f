// Serializable views of the enumerations, published once per collection cycle.

mod cpu;
mod disk;
mod memory;
mod network;
mod process;
mod snapshot;

pub use cpu::CpuSnapshot;
pub use disk::{DiskSnapshot, PartitionSnapshot};
pub use memory::MemorySnapshot;
pub use network::NetworkInterfaceSnapshot;
pub use process::ProcessSnapshot;
pub use snapshot::PalSnapshot;
