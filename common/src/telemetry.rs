use crate::types::SignalQuality;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetrySample {
    pub timestamp_ms: u64,
    pub temperature: f32,
    pub humidity: f32,
    pub signal_strength: i32,
}

impl TelemetrySample {
    pub fn new(timestamp_ms: u64, temperature: f32, humidity: f32, signal_strength: i32) -> Self {
        Self {
            timestamp_ms,
            temperature,
            humidity,
            signal_strength,
        }
    }

    pub fn signal_quality(&self) -> SignalQuality {
        SignalQuality::from_dbm(self.signal_strength)
    }
}
