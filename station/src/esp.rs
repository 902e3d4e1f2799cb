use core::convert::TryInto;
use std::{
    net::Ipv4Addr,
    thread,
    time::Duration,
};

use anyhow::{anyhow, Context};
use dht_sensor::dht22;
use embedded_svc::wifi::{AuthMethod, ClientConfiguration, Configuration};
use esp_idf_hal::{
    delay::Ets,
    gpio::{AnyIOPin, IOPin, InputOutput, PinDriver, Pull},
};
use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    hal::{modem::Modem, prelude::Peripherals},
    log::EspLogger,
    nvs::EspDefaultNvsPartition,
    wifi::{BlockingWifi, EspWifi},
};
use log::{info, warn};

use weather_common::StationConfig;

use crate::{
    driver::Driver,
    hardware::{monotonic_ms, Network, Reading, Sensor, SensorError},
};

const DHT22_PIN: i32 = 2;
const WIFI_CONNECT_ATTEMPTS: u32 = 5;
const WIFI_RETRY_DELAY_MS: u64 = 3_000;
const SERVER_RETRY_DELAY_MS: u64 = 5_000;
const DISCONNECTED_RSSI: i32 = -100;

struct Dht22Sensor {
    pin: PinDriver<'static, AnyIOPin, InputOutput>,
    delay: Ets,
}

impl Dht22Sensor {
    fn new(pin: AnyIOPin) -> anyhow::Result<Self> {
        let mut pin = PinDriver::input_output_od(pin)?;
        pin.set_pull(Pull::Up)?;
        pin.set_high()?;
        Ok(Self { pin, delay: Ets })
    }
}

impl Sensor for Dht22Sensor {
    fn sample(&mut self) -> Result<Reading, SensorError> {
        self.pin
            .set_high()
            .map_err(|err| SensorError::Read(format!("GPIO{DHT22_PIN} idle level: {err:?}")))?;

        let reading = dht22::blocking::read(&mut self.delay, &mut self.pin)
            .map_err(|err| SensorError::Read(format!("DHT22 on GPIO{DHT22_PIN}: {err:?}")))?;

        Reading {
            temperature: reading.temperature,
            humidity: reading.relative_humidity,
        }
        .validate()
    }
}

struct EspNetwork {
    wifi: EspWifi<'static>,
}

impl Network for EspNetwork {
    fn is_connected(&self) -> bool {
        self.wifi.is_connected().unwrap_or(false)
    }

    fn signal_strength(&self) -> i32 {
        let mut ap_info = esp_idf_svc::sys::wifi_ap_record_t::default();
        let rc = unsafe { esp_idf_svc::sys::esp_wifi_sta_get_ap_info(&mut ap_info) };
        if rc == esp_idf_svc::sys::ESP_OK {
            i32::from(ap_info.rssi)
        } else {
            DISCONNECTED_RSSI
        }
    }

    fn ip_address(&self) -> Option<Ipv4Addr> {
        self.wifi
            .sta_netif()
            .get_ip_info()
            .ok()
            .map(|info| info.ip)
            .filter(|ip| !ip.is_unspecified())
    }
}

pub fn run() -> anyhow::Result<()> {
    esp_idf_svc::sys::link_patches();
    EspLogger::initialize_default();

    let sys_loop = EspSystemEventLoop::take()?;
    let nvs_partition = EspDefaultNvsPartition::take()?;
    let Peripherals { modem, pins, .. } = Peripherals::take()?;

    let sensor =
        Dht22Sensor::new(pins.gpio2.downgrade()).context("failed to initialize DHT22")?;
    let wifi = connect_wifi(modem, sys_loop, nvs_partition).context("wifi startup failed")?;

    let config = StationConfig::default();
    let loop_interval = Duration::from_millis(config.loop_interval_ms);
    let mut driver = Driver::new(config, sensor, EspNetwork { wifi }, monotonic_ms());

    loop {
        match driver.start() {
            Ok(addr) => {
                info!("weather station listening on {addr}");
                break;
            }
            Err(err) => {
                warn!("HTTP server start failed: {err}; retrying");
                thread::sleep(Duration::from_millis(SERVER_RETRY_DELAY_MS));
            }
        }
    }

    loop {
        driver.step(monotonic_ms());
        thread::sleep(loop_interval);
    }
}

fn connect_wifi(
    modem: Modem,
    sys_loop: EspSystemEventLoop,
    nvs_partition: EspDefaultNvsPartition,
) -> anyhow::Result<EspWifi<'static>> {
    let ssid = option_env!("WIFI_SSID").unwrap_or_default();
    let password = option_env!("WIFI_PASS").unwrap_or_default();
    if ssid.is_empty() {
        return Err(anyhow!("WIFI_SSID was not set at build time"));
    }

    let mut esp_wifi = EspWifi::new(modem, sys_loop.clone(), Some(nvs_partition))?;
    let mut wifi = BlockingWifi::wrap(&mut esp_wifi, sys_loop)?;

    let auth_method = if password.is_empty() {
        AuthMethod::None
    } else {
        AuthMethod::WPAWPA2Personal
    };

    wifi.set_configuration(&Configuration::Client(ClientConfiguration {
        ssid: ssid.try_into().map_err(|_| anyhow!("wifi ssid too long"))?,
        password: password
            .try_into()
            .map_err(|_| anyhow!("wifi password too long"))?,
        auth_method,
        ..Default::default()
    }))?;

    wifi.start()?;
    info!("wifi started, connecting to `{ssid}`");

    let mut last_err = None;
    for attempt in 1..=WIFI_CONNECT_ATTEMPTS {
        match wifi.connect().and_then(|()| wifi.wait_netif_up()) {
            Ok(()) => {
                info!("wifi connected on attempt {attempt}");
                last_err = None;
                break;
            }
            Err(err) => {
                warn!("wifi connect attempt {attempt}/{WIFI_CONNECT_ATTEMPTS} failed: {err:#}");
                last_err = Some(err);
            }
        }

        if attempt < WIFI_CONNECT_ATTEMPTS {
            let _ = wifi.disconnect();
            thread::sleep(Duration::from_millis(WIFI_RETRY_DELAY_MS));
        }
    }

    if let Some(err) = last_err {
        return Err(anyhow::Error::from(err).context("all wifi connect attempts failed"));
    }

    Ok(esp_wifi)
}
