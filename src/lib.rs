// Library for tests to access modules

pub mod config;
pub mod cpu;
pub mod disk;
pub mod entity;
pub mod error;
pub mod log_suppressor;
pub mod memory;
pub mod models;
pub mod network;
pub mod platform;
pub mod process;
pub mod processes;
pub mod sampler;
pub mod system;
pub mod version;
pub mod worker;
