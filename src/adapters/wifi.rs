//! WiFi station-mode adapter.
//!
//! Brings the station interface up at boot and keeps it up afterwards.
//! All calls are non-blocking: [`WifiAdapter::poll`] runs from the
//! control loop and must never stall a tick while the heater may be on.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: real ESP-IDF WiFi driver via `esp_idf_svc::wifi`.
//! - **all other targets**: a simulated link for host-side tests.
//!
//! ## Reconnection policy
//!
//! On link loss the adapter waits an exponential backoff (2 s → 4 s →
//! 8 s … capped at 60 s) between connect attempts.

use log::{info, warn};

use crate::config::NetworkConfig;
use crate::error::CommsError;

#[cfg(target_os = "espidf")]
use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    hal::modem::Modem,
    nvs::EspDefaultNvsPartition,
    wifi::{AuthMethod, ClientConfiguration, Configuration, EspWifi},
};

// ───────────────────────────────────────────────────────────────
// Connection state
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiState {
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
}

const INITIAL_BACKOFF_SECS: u32 = 2;
const MAX_BACKOFF_SECS: u32 = 60;

// ───────────────────────────────────────────────────────────────
// WiFi adapter
// ───────────────────────────────────────────────────────────────

pub struct WifiAdapter {
    state: WifiState,
    backoff_secs: u32,
    next_attempt_ms: u64,
    #[cfg(target_os = "espidf")]
    wifi: EspWifi<'static>,
    #[cfg(not(target_os = "espidf"))]
    sim_link_up: bool,
    #[cfg(not(target_os = "espidf"))]
    sim_connect_calls: u32,
}

impl WifiAdapter {
    /// Configure the station interface and start the first connect.
    #[cfg(target_os = "espidf")]
    pub fn start(
        modem: Modem,
        sysloop: EspSystemEventLoop,
        nvs: EspDefaultNvsPartition,
        net: &NetworkConfig,
    ) -> Result<Self, CommsError> {
        net.validate().map_err(|_| CommsError::WifiConnectFailed)?;

        let mut wifi = EspWifi::new(modem, sysloop, Some(nvs)).map_err(|e| {
            warn!("WiFi: driver init failed: {}", e);
            CommsError::WifiConnectFailed
        })?;

        let auth_method = if net.wifi_password.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };
        let client = ClientConfiguration {
            ssid: net
                .wifi_ssid
                .as_str()
                .try_into()
                .map_err(|_| CommsError::WifiConnectFailed)?,
            password: net
                .wifi_password
                .as_str()
                .try_into()
                .map_err(|_| CommsError::WifiConnectFailed)?,
            auth_method,
            ..Default::default()
        };
        wifi.set_configuration(&Configuration::Client(client))
            .and_then(|()| wifi.start())
            .map_err(|e| {
                warn!("WiFi: start failed: {}", e);
                CommsError::WifiConnectFailed
            })?;

        let mut adapter = Self {
            state: WifiState::Connecting,
            backoff_secs: INITIAL_BACKOFF_SECS,
            next_attempt_ms: 0,
            wifi,
        };
        info!("WiFi: connecting to '{}'", net.wifi_ssid);
        adapter.platform_connect()?;
        Ok(adapter)
    }

    /// Simulated adapter; the link starts down.
    #[cfg(not(target_os = "espidf"))]
    pub fn simulated(net: &NetworkConfig) -> Result<Self, CommsError> {
        net.validate().map_err(|_| CommsError::WifiConnectFailed)?;
        info!("WiFi(sim): connecting to '{}'", net.wifi_ssid);
        Ok(Self {
            state: WifiState::Connecting,
            backoff_secs: INITIAL_BACKOFF_SECS,
            next_attempt_ms: 0,
            sim_link_up: false,
            sim_connect_calls: 0,
        })
    }

    pub fn state(&self) -> WifiState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == WifiState::Connected
    }

    /// Advance the connection state machine.  Non-blocking.
    pub fn poll(&mut self, now_ms: u64) {
        let link_up = self.platform_link_up();
        match self.state {
            WifiState::Connecting | WifiState::Reconnecting { .. } if link_up => {
                self.state = WifiState::Connected;
                self.backoff_secs = INITIAL_BACKOFF_SECS;
                info!("WiFi: connected");
            }
            WifiState::Connected if !link_up => {
                warn!("WiFi: connection lost, entering reconnect");
                self.state = WifiState::Reconnecting { attempt: 0 };
                self.next_attempt_ms = now_ms;
            }
            WifiState::Reconnecting { attempt } if now_ms >= self.next_attempt_ms => {
                info!(
                    "WiFi: reconnect attempt {} (backoff {}s)",
                    attempt, self.backoff_secs
                );
                if self.platform_connect().is_err() {
                    warn!("WiFi: connect request rejected");
                }
                self.next_attempt_ms = now_ms + u64::from(self.backoff_secs) * 1000;
                self.backoff_secs = (self.backoff_secs * 2).min(MAX_BACKOFF_SECS);
                self.state = WifiState::Reconnecting {
                    attempt: attempt + 1,
                };
            }
            _ => {}
        }
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_connect(&mut self) -> Result<(), CommsError> {
        // Non-blocking: completion is observed in `poll`.
        self.wifi.connect().map_err(|e| {
            warn!("WiFi: connect failed: {}", e);
            CommsError::WifiConnectFailed
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_connect(&mut self) -> Result<(), CommsError> {
        self.sim_connect_calls += 1;
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_link_up(&self) -> bool {
        self.wifi.is_up().unwrap_or(false)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_link_up(&self) -> bool {
        self.sim_link_up
    }

    /// Raise or drop the simulated link (host only).
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_set_link(&mut self, up: bool) {
        self.sim_link_up = up;
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim_connect_calls(&self) -> u32 {
        self.sim_connect_calls
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
