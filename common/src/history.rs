use std::collections::VecDeque;

use crate::telemetry::TelemetrySample;

/// Time-gated ring buffer of telemetry samples, oldest first.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    samples: VecDeque<TelemetrySample>,
    capacity: usize,
    min_interval_ms: u64,
    last_insert_ms: Option<u64>,
}

impl HistoryStore {
    pub fn new(capacity: usize, min_interval_ms: u64) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            min_interval_ms,
            last_insert_ms: None,
        }
    }

    /// Inserts `sample` when at least `min_interval_ms` has passed since the
    /// last admitted sample. Returns whether the sample was stored.
    pub fn admit(&mut self, sample: TelemetrySample) -> bool {
        if let Some(last) = self.last_insert_ms {
            if sample.timestamp_ms.saturating_sub(last) < self.min_interval_ms {
                return false;
            }
        }

        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
        self.last_insert_ms = Some(sample.timestamp_ms);
        true
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn latest(&self) -> Option<&TelemetrySample> {
        self.samples.back()
    }

    pub fn iter_oldest_first(&self) -> impl Iterator<Item = &TelemetrySample> {
        self.samples.iter()
    }

    pub fn iter_recent_first(&self) -> impl Iterator<Item = &TelemetrySample> {
        self.samples.iter().rev()
    }
}
