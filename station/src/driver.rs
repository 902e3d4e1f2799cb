use std::net::SocketAddr;

use log::{info, warn};

use weather_common::{StationConfig, StationState, TelemetrySample};

use crate::{
    hardware::{Network, Reading, Sensor},
    server::{StartError, WeatherServer},
};

/// One station: sensor cadence, history admission and the HTTP server, all
/// advanced from a single caller-owned loop.
pub struct Driver<S, N> {
    config: StationConfig,
    sensor: S,
    network: N,
    state: StationState,
    server: WeatherServer,
    reading: Option<Reading>,
    last_sample_ms: Option<u64>,
}

impl<S: Sensor, N: Network> Driver<S, N> {
    pub fn new(mut config: StationConfig, sensor: S, network: N, now_ms: u64) -> Self {
        config.sanitize();
        let state = StationState::new(&config, now_ms);
        let server = WeatherServer::new(config.clone());
        Self {
            config,
            sensor,
            network,
            state,
            server,
            reading: None,
            last_sample_ms: None,
        }
    }

    #[cfg(test)]
    pub fn with_server(mut self, server: WeatherServer) -> Self {
        self.server = server;
        self
    }

    pub fn start(&mut self) -> Result<SocketAddr, StartError> {
        self.server.start(&self.network)
    }

    pub fn stop(&mut self) {
        self.server.stop();
    }

    pub fn state(&self) -> &StationState {
        &self.state
    }

    pub fn server(&self) -> &WeatherServer {
        &self.server
    }

    /// One loop iteration at `now_ms`.
    pub fn step(&mut self, now_ms: u64) {
        if self.sample_due(now_ms) {
            self.last_sample_ms = Some(now_ms);
            self.refresh_reading();
        }

        let snapshot = self.snapshot(now_ms);
        if self.reading.is_some() && self.state.record_sample(snapshot) {
            info!(
                "history sample {:.1} °C / {:.1} % ({} of {})",
                snapshot.temperature,
                snapshot.humidity,
                self.state.history.len(),
                self.state.history.capacity()
            );
        }

        self.server.handle_request(&mut self.state, &snapshot);
    }

    pub fn snapshot(&self, now_ms: u64) -> TelemetrySample {
        let (temperature, humidity) = self
            .reading
            .map_or((0.0, 0.0), |reading| (reading.temperature, reading.humidity));
        TelemetrySample::new(
            now_ms,
            temperature,
            humidity,
            self.network.signal_strength(),
        )
    }

    fn sample_due(&self, now_ms: u64) -> bool {
        self.last_sample_ms.map_or(true, |last| {
            now_ms.saturating_sub(last) >= self.config.sensor_interval_ms
        })
    }

    fn refresh_reading(&mut self) {
        match self.sensor.sample() {
            Ok(reading) => {
                if self.reading != Some(reading) {
                    info!(
                        "Temp: {:.1} °C  Humidity: {:.1} %",
                        reading.temperature, reading.humidity
                    );
                }
                self.reading = Some(reading);
            }
            Err(err) => warn!("sensor read failed: {err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        net::{IpAddr, Ipv4Addr},
    };

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::hardware::{LoopbackNetwork, SensorError};

    struct ScriptedSensor {
        results: VecDeque<Result<Reading, SensorError>>,
        calls: usize,
    }

    impl ScriptedSensor {
        fn new(results: Vec<Result<Reading, SensorError>>) -> Self {
            Self {
                results: results.into(),
                calls: 0,
            }
        }
    }

    impl Sensor for ScriptedSensor {
        fn sample(&mut self) -> Result<Reading, SensorError> {
            self.calls += 1;
            self.results
                .pop_front()
                .unwrap_or_else(|| Err(SensorError::Read("script exhausted".to_string())))
        }
    }

    fn reading(temperature: f32, humidity: f32) -> Reading {
        Reading {
            temperature,
            humidity,
        }
    }

    fn driver(sensor: ScriptedSensor) -> Driver<ScriptedSensor, LoopbackNetwork> {
        let config = StationConfig {
            http_port: 0,
            sensor_interval_ms: 5_000,
            ..StationConfig::default()
        };
        let server = WeatherServer::new(config.clone()).with_bind_ip(IpAddr::V4(Ipv4Addr::LOCALHOST));
        Driver::new(config, sensor, LoopbackNetwork { rssi_dbm: -67 }, 0).with_server(server)
    }

    #[test]
    fn samples_sensor_on_its_own_cadence() {
        let mut driver = driver(ScriptedSensor::new(vec![
            Ok(reading(20.0, 40.0)),
            Ok(reading(21.0, 41.0)),
        ]));

        for now_ms in (0..5_000).step_by(100) {
            driver.step(now_ms);
        }
        assert_eq!(driver.sensor.calls, 1);

        driver.step(5_000);
        assert_eq!(driver.sensor.calls, 2);
        assert_eq!(driver.snapshot(5_000).temperature, 21.0);
    }

    #[test]
    fn no_history_until_first_valid_reading() {
        let mut driver = driver(ScriptedSensor::new(vec![
            Err(SensorError::Read("timeout".to_string())),
            Ok(reading(22.0, 45.0)),
        ]));

        driver.step(0);
        assert!(driver.state().history.is_empty());
        assert_eq!(driver.snapshot(0).temperature, 0.0);

        driver.step(5_000);
        assert_eq!(driver.state().history.len(), 1);
        let latest = driver.state().history.latest().copied().unwrap();
        assert_eq!(latest, TelemetrySample::new(5_000, 22.0, 45.0, -67));
    }

    #[test]
    fn failed_read_keeps_last_good_reading() {
        let mut driver = driver(ScriptedSensor::new(vec![
            Ok(reading(19.5, 50.0)),
            Err(SensorError::Read("checksum".to_string())),
        ]));

        driver.step(0);
        driver.step(5_000);

        let snapshot = driver.snapshot(5_000);
        assert_eq!((snapshot.temperature, snapshot.humidity), (19.5, 50.0));
    }

    #[test]
    fn history_admits_once_per_minute() {
        let readings = (0..40).map(|i| Ok(reading(20.0 + i as f32 * 0.1, 40.0))).collect();
        let mut driver = driver(ScriptedSensor::new(readings));

        for now_ms in (0..=180_000).step_by(5_000) {
            driver.step(now_ms);
        }

        assert_eq!(driver.state().history.len(), 4);
        let timestamps: Vec<u64> = driver
            .state()
            .history
            .iter_oldest_first()
            .map(|sample| sample.timestamp_ms)
            .collect();
        assert_eq!(timestamps, vec![0, 60_000, 120_000, 180_000]);
    }

    #[test]
    fn step_before_start_skips_the_server() {
        let mut driver = driver(ScriptedSensor::new(vec![Ok(reading(20.0, 40.0))]));
        driver.step(0);

        assert!(!driver.server().is_running());
        assert_eq!(driver.state().history.len(), 1);
    }

    #[test]
    fn start_and_stop_control_the_server() {
        let mut driver = driver(ScriptedSensor::new(Vec::new()));

        let addr = driver.start().unwrap();
        assert_eq!(driver.server().local_addr(), Some(addr));

        driver.stop();
        assert!(!driver.server().is_running());
    }
}
