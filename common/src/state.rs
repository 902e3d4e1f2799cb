use crate::{
    config::StationConfig, history::HistoryStore, predictor::ComfortPredictor,
    telemetry::TelemetrySample,
};

/// Process-lifetime station state, owned by the driver loop and lent to the
/// HTTP server on every iteration.
#[derive(Debug, Clone)]
pub struct StationState {
    pub history: HistoryStore,
    pub predictor: ComfortPredictor,
    started_at_ms: u64,
}

impl StationState {
    pub fn new(config: &StationConfig, started_at_ms: u64) -> Self {
        Self {
            history: HistoryStore::new(config.history_capacity, config.history_interval_ms),
            predictor: ComfortPredictor::new(),
            started_at_ms,
        }
    }

    pub fn record_sample(&mut self, sample: TelemetrySample) -> bool {
        self.history.admit(sample)
    }

    pub fn uptime_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.started_at_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uptime_is_relative_to_start() {
        let state = StationState::new(&StationConfig::default(), 5_000);
        assert_eq!(state.uptime_ms(65_000), 60_000);
        assert_eq!(state.uptime_ms(1_000), 0);
    }

    #[test]
    fn record_sample_uses_configured_gate() {
        let config = StationConfig {
            history_capacity: 2,
            history_interval_ms: 1_000,
            ..StationConfig::default()
        };
        let mut state = StationState::new(&config, 0);

        assert!(state.record_sample(TelemetrySample::new(0, 20.0, 40.0, -55)));
        assert!(!state.record_sample(TelemetrySample::new(500, 20.0, 40.0, -55)));
        assert!(state.record_sample(TelemetrySample::new(1_000, 20.0, 40.0, -55)));
        assert!(state.record_sample(TelemetrySample::new(2_000, 20.0, 40.0, -55)));
        assert_eq!(state.history.len(), 2);
    }
}
