// Set of network interface instances reconciled by name against each
// discovery pass, plus the "_Total" aggregate.

use super::depend::NetworkInterfaceDepend;
use super::info::NetworkInterfaceInfo;
use super::instance::NetworkInterfaceInstance;
use crate::entity::{EntityEnumeration, EntityInstance, Handle, SampleSource, lock};
use crate::sampler::SamplingPolicy;
use std::sync::Arc;
use tracing::instrument;

pub struct NetworkInterfaceEnumeration {
    deps: Arc<dyn NetworkInterfaceDepend>,
    policy: SamplingPolicy,
    include_non_running: bool,
    interfaces: EntityEnumeration<NetworkInterfaceInstance>,
}

impl NetworkInterfaceEnumeration {
    pub fn new(deps: Arc<dyn NetworkInterfaceDepend>, policy: SamplingPolicy, include_non_running: bool) -> Self {
        Self {
            deps,
            policy,
            include_non_running,
            interfaces: EntityEnumeration::new(),
        }
    }

    pub fn init(&mut self) {
        self.interfaces.set_total(NetworkInterfaceInstance::total(self.policy));
        self.update(false);
    }

    /// With `update_instances` only the known interfaces are refreshed;
    /// otherwise the set itself is reconciled: vanished interfaces are
    /// dropped and new up-and-running ones added.
    #[instrument(skip(self), fields(subsystem = "network", operation = "update"))]
    pub fn update(&mut self, update_instances: bool) {
        let Some(found) = self.discover() else {
            return;
        };

        if update_instances {
            self.refresh(found, false);
        } else {
            self.interfaces
                .retain(|i| found.iter().any(|f| f.name == i.id()));
            for info in found {
                if let Some(handle) = self.interfaces.get(&info.name) {
                    lock(&handle).update(info);
                } else if info.known_state() && info.is_up_and_running() && !info.is_loopback_address() {
                    tracing::debug!(interface = %info.name, "adding network interface");
                    self.interfaces
                        .add(NetworkInterfaceInstance::new(info, self.policy));
                }
            }
        }
        self.update_total();
    }

    /// Read the counters again and push them into every instance's samplers.
    pub fn sample_interfaces(&mut self) {
        if let Some(found) = self.discover() {
            self.refresh(found, true);
        }
        self.update_total();
    }

    fn discover(&self) -> Option<Vec<NetworkInterfaceInfo>> {
        match NetworkInterfaceInfo::find_all(self.deps.as_ref(), self.include_non_running) {
            Ok(found) => Some(found),
            Err(e) => {
                tracing::warn!(error = %e, operation = "find_all", "network interface discovery failed");
                None
            }
        }
    }

    fn refresh(&mut self, found: Vec<NetworkInterfaceInfo>, sample: bool) {
        for info in found {
            if let Some(handle) = self.interfaces.get(&info.name) {
                let mut instance = lock(&handle);
                instance.update(info);
                if sample {
                    instance.sample();
                }
            }
        }
    }

    fn update_total(&mut self) {
        let Some(total) = self.interfaces.total() else {
            return;
        };
        let parts: Vec<_> = self
            .interfaces
            .iter()
            .map(|h| {
                let i = lock(h);
                (i.counters(), i.rates())
            })
            .collect();
        lock(&total).aggregate(&parts);
    }

    pub fn total(&self) -> Option<Handle<NetworkInterfaceInstance>> {
        self.interfaces.total()
    }

    pub fn get(&self, name: &str) -> Option<Handle<NetworkInterfaceInstance>> {
        self.interfaces.get(name)
    }

    pub fn instances(&self) -> Vec<Handle<NetworkInterfaceInstance>> {
        self.interfaces.instances()
    }

    pub fn len(&self) -> usize {
        self.interfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interfaces.is_empty()
    }
}

impl SampleSource for NetworkInterfaceEnumeration {
    fn name(&self) -> &'static str {
        "network"
    }

    fn sample(&mut self) {
        self.sample_interfaces();
    }
}
