use crate::entity::EntityInstance;
use crate::processes::{ProcessInstance, ProcessTimes};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessSnapshot {
    pub name: String,
    pub is_total: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<char>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_pid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub real_uid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threads: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub virtual_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resident_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process_count: Option<usize>,
    #[serde(flatten)]
    pub times: ProcessTimes,
}

impl ProcessSnapshot {
    pub fn from_instance(p: &ProcessInstance) -> Self {
        let single = !p.is_total();
        Self {
            name: p.id().to_string(),
            is_total: p.is_total(),
            pid: p.pid(),
            command: single.then(|| p.name().to_string()),
            state: single.then(|| p.state()),
            parent_pid: single.then(|| p.parent_pid()),
            real_uid: p.real_uid(),
            priority: p.priority().filter(|_| single),
            threads: single.then(|| p.threads()),
            virtual_bytes: single.then(|| p.virtual_bytes()),
            resident_bytes: p.resident_bytes(),
            process_count: p.is_total().then(|| p.process_count()),
            times: p.times(),
        }
    }
}
