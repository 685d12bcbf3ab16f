// Ring buffer of raw counter samples (newest first) with delta, average-delta
// and wraparound queries. Not synchronised: the owning instance locks.

use crate::error::PalError;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Numeric counter that can be stored in a DataSampler.
pub trait Counter: Copy + Default + PartialOrd + std::fmt::Debug + Send + 'static {
    /// `self - older`. Unsigned counters wrap like the kernel counters they mirror.
    fn diff(self, older: Self) -> Self;
    /// `self * factor / divisor`.
    fn scale(self, factor: u64, divisor: usize) -> Self;
    fn as_f64(self) -> f64;
}

impl Counter for u64 {
    fn diff(self, older: Self) -> Self {
        self.wrapping_sub(older)
    }

    fn scale(self, factor: u64, divisor: usize) -> Self {
        ((self as u128 * factor as u128) / divisor.max(1) as u128) as u64
    }

    fn as_f64(self) -> f64 {
        self as f64
    }
}

impl Counter for i64 {
    fn diff(self, older: Self) -> Self {
        self.wrapping_sub(older)
    }

    fn scale(self, factor: u64, divisor: usize) -> Self {
        ((self as i128 * factor as i128) / divisor.max(1) as i128) as i64
    }

    fn as_f64(self) -> f64 {
        self as f64
    }
}

impl Counter for f64 {
    fn diff(self, older: Self) -> Self {
        self - older
    }

    fn scale(self, factor: u64, divisor: usize) -> Self {
        self * factor as f64 / divisor.max(1) as f64
    }

    fn as_f64(self) -> f64 {
        self
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Sample<T> {
    pub value: T,
    pub at: Instant,
}

/// Window size and nominal period shared by every sampler of one subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplingPolicy {
    pub samples: usize,
    pub seconds_per_sample: u64,
}

impl SamplingPolicy {
    pub const fn new(samples: usize, seconds_per_sample: u64) -> Self {
        Self {
            samples,
            seconds_per_sample,
        }
    }

    /// Per-second rate from a sampler: average delta per sample divided by the
    /// nominal period, or 0 when the counter wrapped inside the window.
    pub fn rate(&self, sampler: &DataSampler<u64>) -> u64 {
        if sampler.has_wrapped(self.samples) {
            return 0;
        }
        sampler.average_delta(self.samples) / self.seconds_per_sample.max(1)
    }
}

impl Default for SamplingPolicy {
    fn default() -> Self {
        Self::new(6, 60)
    }
}

#[derive(Debug, Clone)]
pub struct DataSampler<T> {
    capacity: usize,
    samples: VecDeque<Sample<T>>,
}

impl<T: Counter> DataSampler<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn push(&mut self, value: T) {
        self.push_at(value, Instant::now());
    }

    /// Add a sample; the oldest one is dropped once the buffer is full.
    pub fn push_at(&mut self, value: T, at: Instant) {
        if self.samples.len() == self.capacity {
            self.samples.pop_back();
        }
        self.samples.push_front(Sample { value, at });
    }

    /// Sample `index` steps back from the newest (0 = newest).
    pub fn get(&self, index: usize) -> Result<T, PalError> {
        self.samples
            .get(index)
            .map(|s| s.value)
            .ok_or(PalError::IndexOutOfRange {
                index,
                len: self.samples.len(),
            })
    }

    pub fn latest(&self) -> Option<T> {
        self.samples.front().map(|s| s.value)
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Newest first.
    pub fn iter(&self) -> impl Iterator<Item = &Sample<T>> {
        self.samples.iter()
    }

    // Index of the sample `lookback` steps back, clamped to the oldest one.
    fn window(&self, lookback: usize) -> Option<usize> {
        if self.samples.len() < 2 || lookback == 0 {
            return None;
        }
        Some(lookback.min(self.samples.len() - 1))
    }

    /// Newest value minus the value `lookback` samples back (clamped to the
    /// oldest sample). Zero with fewer than two samples.
    pub fn delta(&self, lookback: usize) -> T {
        match self.window(lookback) {
            Some(i) => self.samples[0].value.diff(self.samples[i].value),
            None => T::default(),
        }
    }

    /// Delta divided by the number of sample steps it spans.
    pub fn average_delta(&self, lookback: usize) -> T {
        self.average_delta_factored(lookback, 1)
    }

    /// Delta times `factor`, divided by the number of sample steps it spans.
    pub fn average_delta_factored(&self, lookback: usize, factor: u64) -> T {
        if factor == 0 {
            return T::default();
        }
        match self.window(lookback) {
            Some(i) => self.samples[0]
                .value
                .diff(self.samples[i].value)
                .scale(factor, i),
            None => T::default(),
        }
    }

    /// True if any adjacent pair inside the window decreased (counter reset or overflow).
    pub fn has_wrapped(&self, lookback: usize) -> bool {
        match self.window(lookback) {
            Some(i) => (0..i).any(|k| self.samples[k].value < self.samples[k + 1].value),
            None => false,
        }
    }

    /// Measured wall-clock span of the window.
    pub fn elapsed(&self, lookback: usize) -> Option<Duration> {
        self.window(lookback)
            .map(|i| self.samples[0].at.saturating_duration_since(self.samples[i].at))
    }

    /// Mean of all stored samples, 0 when empty.
    pub fn average(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.samples.iter().map(|s| s.value.as_f64()).sum();
        sum / self.samples.len() as f64
    }
}
