use std::{
    net::Ipv4Addr,
    sync::OnceLock,
    time::Instant,
};

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub temperature: f32,
    pub humidity: f32,
}

impl Reading {
    pub fn validate(self) -> Result<Self, SensorError> {
        let plausible = self.temperature.is_finite()
            && self.humidity.is_finite()
            && (-40.0..=85.0).contains(&self.temperature)
            && (0.0..=100.0).contains(&self.humidity);

        if plausible {
            Ok(self)
        } else {
            Err(SensorError::OutOfRange {
                temperature: self.temperature,
                humidity: self.humidity,
            })
        }
    }
}

#[derive(Debug, Error)]
pub enum SensorError {
    #[cfg_attr(not(feature = "esp32"), allow(dead_code))]
    #[error("sensor did not respond: {0}")]
    Read(String),
    #[error("implausible reading {temperature} °C / {humidity} %")]
    OutOfRange { temperature: f32, humidity: f32 },
}

pub trait Sensor {
    fn sample(&mut self) -> Result<Reading, SensorError>;
}

pub trait Network {
    fn is_connected(&self) -> bool;
    /// RSSI in dBm; -100 when not associated.
    fn signal_strength(&self) -> i32;
    fn ip_address(&self) -> Option<Ipv4Addr>;
}

/// Drifting readings for running the station without hardware.
#[derive(Debug, Default)]
pub struct SimulatedSensor {
    tick: u64,
}

impl Sensor for SimulatedSensor {
    fn sample(&mut self) -> Result<Reading, SensorError> {
        self.tick = self.tick.saturating_add(1);
        Reading {
            temperature: 21.0 + ((self.tick % 8) as f32 * 0.2),
            humidity: 42.0 + ((self.tick % 6) as f32 * 0.5),
        }
        .validate()
    }
}

#[derive(Debug, Clone)]
pub struct LoopbackNetwork {
    pub rssi_dbm: i32,
}

impl Default for LoopbackNetwork {
    fn default() -> Self {
        Self { rssi_dbm: -55 }
    }
}

impl Network for LoopbackNetwork {
    fn is_connected(&self) -> bool {
        true
    }

    fn signal_strength(&self) -> i32 {
        self.rssi_dbm
    }

    fn ip_address(&self) -> Option<Ipv4Addr> {
        Some(Ipv4Addr::LOCALHOST)
    }
}

pub fn monotonic_ms() -> u64 {
    static START: OnceLock<Instant> = OnceLock::new();
    START
        .get_or_init(Instant::now)
        .elapsed()
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}
