use std::{io::ErrorKind, path::Path, time::Duration};

use anyhow::Context;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use weather_common::StationConfig;

use crate::{
    driver::Driver,
    hardware::{monotonic_ms, LoopbackNetwork, SimulatedSensor},
};

const HOST_DEFAULT_PORT: u16 = 8080;

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = load_config();
    let loop_interval = Duration::from_millis(config.loop_interval_ms);

    let mut driver = Driver::new(
        config,
        SimulatedSensor::default(),
        LoopbackNetwork::default(),
        monotonic_ms(),
    );
    let addr = driver
        .start()
        .context("failed to start weather station HTTP server")?;
    info!("weather station running on http://{addr}");

    let mut interval = tokio::time::interval(loop_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = interval.tick() => driver.step(monotonic_ms()),
            result = &mut shutdown => {
                if let Err(err) = result {
                    warn!("failed to listen for shutdown signal: {err}");
                }
                break;
            }
        }
    }

    let counters = driver.server().counters();
    let stats = serde_json::to_string(&driver.state().predictor.stats())
        .context("failed to encode learning stats")?;
    info!(
        accepted = counters.accepted,
        served = counters.served,
        failed = counters.failed,
        closed_by_peer = counters.closed_by_peer,
        %stats,
        "shutting down"
    );
    driver.stop();
    Ok(())
}

fn load_config() -> StationConfig {
    let path = std::env::var("WEATHER_STATION_CONFIG").ok();
    let port = std::env::var("STATION_HTTP_PORT").ok();
    config_from(path.as_deref().map(Path::new), port.as_deref())
}

/// A missing file means host defaults; an unreadable or invalid one is
/// reported and also falls back to defaults.
fn config_from(path: Option<&Path>, port_override: Option<&str>) -> StationConfig {
    let mut config = match path {
        Some(path) => match std::fs::read(path) {
            Ok(raw) => match StationConfig::from_json(&raw) {
                Ok(config) => {
                    info!("loaded station config from {}", path.display());
                    config
                }
                Err(err) => {
                    warn!("invalid config {}: {err}; using defaults", path.display());
                    host_defaults()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => host_defaults(),
            Err(err) => {
                warn!("failed to read config {}: {err}; using defaults", path.display());
                host_defaults()
            }
        },
        None => host_defaults(),
    };

    if let Some(port) = port_override.and_then(|value| value.parse::<u16>().ok()) {
        config.http_port = port;
    }

    config
}

fn host_defaults() -> StationConfig {
    StationConfig {
        http_port: HOST_DEFAULT_PORT,
        ..StationConfig::default()
    }
}
