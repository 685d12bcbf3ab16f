use super::info::{InterfaceCounters, NetworkInterfaceInfo};
use crate::entity::{EntityInstance, TOTAL_ID};
use crate::sampler::{DataSampler, SamplingPolicy};

#[derive(Debug, Clone)]
struct CounterSamplers {
    bytes_sent: DataSampler<u64>,
    bytes_received: DataSampler<u64>,
    packets_sent: DataSampler<u64>,
    packets_received: DataSampler<u64>,
    errors_sending: DataSampler<u64>,
    errors_receiving: DataSampler<u64>,
    collisions: DataSampler<u64>,
}

impl CounterSamplers {
    fn new(capacity: usize) -> Self {
        Self {
            bytes_sent: DataSampler::new(capacity),
            bytes_received: DataSampler::new(capacity),
            packets_sent: DataSampler::new(capacity),
            packets_received: DataSampler::new(capacity),
            errors_sending: DataSampler::new(capacity),
            errors_receiving: DataSampler::new(capacity),
            collisions: DataSampler::new(capacity),
        }
    }

    fn push(&mut self, c: &InterfaceCounters) {
        self.bytes_sent.push(c.bytes_sent);
        self.bytes_received.push(c.bytes_received);
        self.packets_sent.push(c.packets_sent);
        self.packets_received.push(c.packets_received);
        self.errors_sending.push(c.errors_sending);
        self.errors_receiving.push(c.errors_receiving);
        self.collisions.push(c.collisions);
    }
}

/// Per-second rates over the sampling window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InterfaceRates {
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub packets_sent: u64,
    pub packets_received: u64,
    pub errors_sending: u64,
    pub errors_receiving: u64,
    pub collisions: u64,
}

impl InterfaceRates {
    fn saturating_add(self, o: Self) -> Self {
        Self {
            bytes_sent: self.bytes_sent.saturating_add(o.bytes_sent),
            bytes_received: self.bytes_received.saturating_add(o.bytes_received),
            packets_sent: self.packets_sent.saturating_add(o.packets_sent),
            packets_received: self.packets_received.saturating_add(o.packets_received),
            errors_sending: self.errors_sending.saturating_add(o.errors_sending),
            errors_receiving: self.errors_receiving.saturating_add(o.errors_receiving),
            collisions: self.collisions.saturating_add(o.collisions),
        }
    }
}

/// One network interface, or the `_Total` aggregate over all of them.
#[derive(Debug, Clone)]
pub struct NetworkInterfaceInstance {
    info: NetworkInterfaceInfo,
    is_total: bool,
    policy: SamplingPolicy,
    samplers: CounterSamplers,
    /// Aggregated rates; only meaningful on the total.
    total_rates: InterfaceRates,
}

impl NetworkInterfaceInstance {
    pub fn new(info: NetworkInterfaceInfo, policy: SamplingPolicy) -> Self {
        let mut instance = Self {
            info,
            is_total: false,
            policy,
            samplers: CounterSamplers::new(policy.samples),
            total_rates: InterfaceRates::default(),
        };
        instance.sample();
        instance
    }

    pub fn total(policy: SamplingPolicy) -> Self {
        Self {
            info: NetworkInterfaceInfo {
                name: TOTAL_ID.to_string(),
                ..NetworkInterfaceInfo::default()
            },
            is_total: true,
            policy,
            samplers: CounterSamplers::new(policy.samples),
            total_rates: InterfaceRates::default(),
        }
    }

    /// Replace the attribute snapshot. Counters are only pushed by `sample`.
    pub fn update(&mut self, info: NetworkInterfaceInfo) {
        self.info = info;
    }

    /// Record the current counters in the samplers.
    pub fn sample(&mut self) {
        if !self.is_total {
            self.samplers.push(&self.info.counters);
        }
    }

    /// Refresh the aggregate from the per-interface instances.
    pub(crate) fn aggregate(&mut self, parts: &[(InterfaceCounters, InterfaceRates)]) {
        let (counters, rates) = parts.iter().fold(
            (InterfaceCounters::default(), InterfaceRates::default()),
            |(c, r), (pc, pr)| (c.saturating_add(*pc), r.saturating_add(*pr)),
        );
        self.info.counters = counters;
        self.total_rates = rates;
    }

    pub fn info(&self) -> &NetworkInterfaceInfo {
        &self.info
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn counters(&self) -> InterfaceCounters {
        self.info.counters
    }

    pub fn rates(&self) -> InterfaceRates {
        if self.is_total {
            return self.total_rates;
        }
        let s = &self.samplers;
        let p = &self.policy;
        InterfaceRates {
            bytes_sent: p.rate(&s.bytes_sent),
            bytes_received: p.rate(&s.bytes_received),
            packets_sent: p.rate(&s.packets_sent),
            packets_received: p.rate(&s.packets_received),
            errors_sending: p.rate(&s.errors_sending),
            errors_receiving: p.rate(&s.errors_receiving),
            collisions: p.rate(&s.collisions),
        }
    }

    pub fn bytes_sent_per_second(&self) -> u64 {
        self.rates().bytes_sent
    }

    pub fn bytes_received_per_second(&self) -> u64 {
        self.rates().bytes_received
    }

    pub fn bytes_total_per_second(&self) -> u64 {
        let r = self.rates();
        r.bytes_sent.saturating_add(r.bytes_received)
    }

    pub fn packets_sent_per_second(&self) -> u64 {
        self.rates().packets_sent
    }

    pub fn packets_received_per_second(&self) -> u64 {
        self.rates().packets_received
    }

    pub fn ip_address(&self) -> Option<&str> {
        self.info.ip_address.as_deref()
    }

    pub fn mtu(&self) -> Option<u64> {
        self.info.mtu
    }

    pub fn speed(&self) -> Option<u64> {
        self.info.speed
    }

    pub fn up(&self) -> Option<bool> {
        self.info.up
    }

    pub fn running(&self) -> Option<bool> {
        self.info.running
    }
}

impl EntityInstance for NetworkInterfaceInstance {
    fn id(&self) -> &str {
        &self.info.name
    }

    fn is_total(&self) -> bool {
        self.is_total
    }
}
