use serde::{Deserialize, Serialize};

/// Upper bound for a single client read and for one send chunk.
pub const MAX_IO_BUFFER_BYTES: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StationConfig {
    pub http_port: u16,
    pub poll_timeout_ms: u64,
    pub read_buffer_bytes: usize,
    pub send_chunk_bytes: usize,
    pub send_timeout_ms: u64,
    pub max_events: usize,
    pub history_capacity: usize,
    pub history_interval_ms: u64,
    pub sensor_interval_ms: u64,
    pub loop_interval_ms: u64,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            http_port: 80,
            poll_timeout_ms: 10,
            read_buffer_bytes: 1024,
            send_chunk_bytes: 512,
            send_timeout_ms: 1_000,
            max_events: 16,
            history_capacity: 24,
            history_interval_ms: 60_000,
            sensor_interval_ms: 5_000,
            loop_interval_ms: 100,
        }
    }
}

impl StationConfig {
    pub fn sanitize(&mut self) {
        self.poll_timeout_ms = self.poll_timeout_ms.clamp(1, 100);
        self.read_buffer_bytes = self.read_buffer_bytes.clamp(64, MAX_IO_BUFFER_BYTES);
        self.send_chunk_bytes = self.send_chunk_bytes.clamp(16, MAX_IO_BUFFER_BYTES);
        self.send_timeout_ms = self.send_timeout_ms.clamp(10, 30_000);
        self.max_events = self.max_events.clamp(2, 256);
        self.history_capacity = self.history_capacity.clamp(1, 1_440);
        self.sensor_interval_ms = self.sensor_interval_ms.max(1_000);
        self.loop_interval_ms = self.loop_interval_ms.clamp(10, 1_000);
    }

    pub fn from_json(raw: &[u8]) -> Result<Self, serde_json::Error> {
        let mut config: Self = serde_json::from_slice(raw)?;
        config.sanitize();
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = StationConfig::from_json(br#"{"http_port": 8080}"#).unwrap();

        assert_eq!(
            config,
            StationConfig {
                http_port: 8080,
                ..StationConfig::default()
            }
        );
    }

    #[test]
    fn sanitize_clamps_out_of_range_values() {
        let mut config = StationConfig {
            poll_timeout_ms: 0,
            read_buffer_bytes: 0,
            send_chunk_bytes: 1 << 20,
            max_events: 0,
            history_capacity: 0,
            sensor_interval_ms: 10,
            ..StationConfig::default()
        };
        config.sanitize();

        assert_eq!(config.poll_timeout_ms, 1);
        assert_eq!(config.read_buffer_bytes, 64);
        assert_eq!(config.send_chunk_bytes, MAX_IO_BUFFER_BYTES);
        assert_eq!(config.max_events, 2);
        assert_eq!(config.history_capacity, 1);
        assert_eq!(config.sensor_interval_ms, 1_000);
    }

    #[test]
    fn defaults_survive_sanitize() {
        let mut config = StationConfig::default();
        config.sanitize();
        assert_eq!(config, StationConfig::default());
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(StationConfig::from_json(b"{http_port").is_err());
    }
}
