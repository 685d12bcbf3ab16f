use crate::cpu::{CpuInstance, CpuTimes};
use crate::entity::EntityInstance;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CpuSnapshot {
    pub name: String,
    pub is_total: bool,
    #[serde(flatten)]
    pub times: CpuTimes,
}

impl CpuSnapshot {
    pub fn from_instance(cpu: &CpuInstance) -> Self {
        Self {
            name: cpu.id().to_string(),
            is_total: cpu.is_total(),
            times: cpu.times(),
        }
    }
}
