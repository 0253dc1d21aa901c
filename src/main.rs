//! Chamber heater firmware — main entry point.
//!
//! Hexagonal architecture with a single-owner control loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HardwareAdapter   LogEventSink   NvsAdapter   Esp32Time       │
//! │  (Sensor+Relay)    (EventSink)    (Config+NVS) (ClockPort)     │
//! │  WifiAdapter       MqttAdapter ──▶ THRESHOLD_CHANNEL           │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              AppService (pure logic)                   │    │
//! │  │  Fail-safe · Fusion · Hysteresis                       │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  Scheduler (delegate-driven) · Watchdog                        │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use heapless::Vec;
use log::{error, info, warn};

use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::gpio::{AnyOutputPin, PinDriver};
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::nvs::EspDefaultNvsPartition;

use chamberheat::adapters::hardware::HardwareAdapter;
use chamberheat::adapters::log_sink::LogEventSink;
use chamberheat::adapters::mqtt::{MqttAdapter, THRESHOLD_CHANNEL};
use chamberheat::adapters::nvs::NvsAdapter;
use chamberheat::adapters::time::Esp32TimeAdapter;
use chamberheat::adapters::wifi::WifiAdapter;
use chamberheat::app::commands::AppCommand;
use chamberheat::app::ports::{ClockPort, ConfigError, ConfigPort, SchedulerDelegate};
use chamberheat::app::service::AppService;
use chamberheat::config::{ControlConfig, NetworkConfig};
use chamberheat::drivers::hw_init;
use chamberheat::drivers::relay::RelayDriver;
use chamberheat::drivers::watchdog::Watchdog;
use chamberheat::pins;
use chamberheat::scheduler::{JobId, Scheduler};
use chamberheat::sensors::SensorBank;

/// Upper bound on one loop sleep, so queued thresholds and the watchdog
/// are serviced promptly.
const POLL_SLICE_MS: u64 = 100;

// ── Scheduler delegate ────────────────────────────────────────
//
// The scheduler knows nothing about the app service; fired jobs are
// collected here and dispatched right after `Scheduler::tick` returns.

#[derive(Default)]
struct FiredJobs {
    jobs: Vec<JobId, 4>,
}

impl SchedulerDelegate for FiredJobs {
    fn on_job_fired(&mut self, job: JobId) {
        if self.jobs.push(job).is_err() {
            warn!("Scheduler: dropped {:?} (dispatch backlog)", job);
        }
    }
}

// ── Network provisioning ──────────────────────────────────────

/// Stored network config, or one baked in at build time (then persisted).
fn network_config(nvs: &NvsAdapter) -> Option<NetworkConfig> {
    match nvs.load_network() {
        Ok(net) => return Some(net),
        Err(ConfigError::NotFound) => info!("Network: nothing stored, trying build-time values"),
        Err(e) => warn!("Network: stored config unusable ({}), trying build-time values", e),
    }

    let net = NetworkConfig {
        wifi_ssid: option_env!("CHAMBERHEAT_WIFI_SSID")?.try_into().ok()?,
        wifi_password: option_env!("CHAMBERHEAT_WIFI_PASSWORD")
            .unwrap_or("")
            .try_into()
            .ok()?,
        broker_url: option_env!("CHAMBERHEAT_MQTT_URL")?.try_into().ok()?,
        client_id: option_env!("CHAMBERHEAT_MQTT_CLIENT_ID")
            .unwrap_or("chamberheat")
            .try_into()
            .ok()?,
    };
    if let Err(e) = nvs.save_network(&net) {
        warn!("Network: build-time config rejected ({})", e);
        return None;
    }
    Some(net)
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  Chamberheat v{}                  ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs_partition = EspDefaultNvsPartition::take()?;

    // ── 2. Hardware ───────────────────────────────────────────
    // Without the ADC no probe can be read; reboot rather than run blind.
    // The relay GPIO is still unconfigured here, i.e. the heater is off.
    hw_init::init_peripherals()?;

    // SAFETY: RELAY_GPIO is claimed by nothing else on this board.
    let relay_pin = PinDriver::output(unsafe { AnyOutputPin::new(pins::RELAY_GPIO) })?;
    let relay = RelayDriver::new(relay_pin, pins::RELAY_ACTIVE_LOW)
        .map_err(|e| anyhow::anyhow!("relay init: {e}"))?;

    // ── 3. Configuration ──────────────────────────────────────
    let nvs = match NvsAdapter::new() {
        Ok(n) => Some(n),
        Err(e) => {
            warn!("NVS init failed ({}), running with defaults and no persistence", e);
            None
        }
    };
    let config = match nvs.as_ref().map(ConfigPort::load) {
        Some(Ok(cfg)) => cfg,
        Some(Err(e)) => {
            warn!("Stored config rejected ({}), using defaults", e);
            ControlConfig::default()
        }
        None => ControlConfig::default(),
    };
    info!(
        "Config: topic '{}', {} probes, tick {} ms, fail-safe {} s",
        config.threshold_topic,
        config.sensor_ids.len(),
        config.timer_interval_ms,
        config.fail_safe_timeout_secs
    );

    let watchdog = Watchdog::new(config.watchdog_timeout_ms);
    let clock = Esp32TimeAdapter::new();

    // ── 4. Construct adapters + app service ───────────────────
    let mut hw = HardwareAdapter::new(SensorBank::new(&config.sensor_ids), relay);
    let mut log_sink = LogEventSink::new();

    let mut app = AppService::new(config.clone(), clock.now_ms());
    app.start(&mut log_sink);

    // ── 5. Network ────────────────────────────────────────────
    // Without a network the heater simply stays disabled: no threshold
    // ever arrives, so the fail-safe keeps the relay off.
    let net = nvs.as_ref().and_then(network_config);
    let mut wifi = None;
    let mut mqtt = None;
    match &net {
        Some(net) => {
            match WifiAdapter::start(peripherals.modem, sysloop, nvs_partition, net) {
                Ok(w) => wifi = Some(w),
                Err(e) => error!("WiFi: {}", e),
            }
            match MqttAdapter::start(net, config.threshold_topic.as_str()) {
                Ok(m) => mqtt = Some(m),
                Err(e) => error!("MQTT: {}", e),
            }
        }
        None => error!("Network: no configuration, heater stays disabled"),
    }

    let mut sched = Scheduler::from_config(&config, clock.now_ms());
    let mut fired = FiredJobs::default();

    info!("System ready. Entering control loop.");

    // ── 6. Control loop ───────────────────────────────────────
    loop {
        let now_ms = clock.now_ms();

        while let Some(msg) = THRESHOLD_CHANNEL.try_next() {
            app.handle_command(AppCommand::SetThreshold(msg), &mut log_sink);
        }

        sched.tick(now_ms, &mut fired);
        for job in core::mem::take(&mut fired.jobs) {
            match job {
                JobId::ControlTick => {
                    app.tick(now_ms, &mut hw, &mut log_sink);
                }
                JobId::Telemetry => {
                    app.handle_command(AppCommand::ReportTelemetry { now_ms }, &mut log_sink);
                }
            }
        }

        if let Some(w) = wifi.as_mut() {
            w.poll(now_ms);
        }
        if let Some(m) = mqtt.as_mut() {
            // Failure keeps the resubscribe pending for the next pass.
            let _ = m.poll_subscription();
        }

        // Feed watchdog on every iteration.
        watchdog.feed();

        let sleep_ms = sched
            .ms_until_next(clock.now_ms())
            .unwrap_or(POLL_SLICE_MS)
            .min(POLL_SLICE_MS);
        std::thread::sleep(std::time::Duration::from_millis(sleep_ms));
    }
}
