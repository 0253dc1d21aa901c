//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements [`ConfigPort`] for the controller and persists the network
//! credentials next to it.
//!
//! - Config validation: every field is range-checked before persistence,
//!   and again after loading so a blob written by an older build cannot
//!   sneak an invalid timeout past the fail-safe.
//! - Namespace isolation: control parameters and network credentials live
//!   in separate namespaces.
//! - Atomic writes: ESP-IDF NVS commits are atomic per nvs_commit().
//!
//! Only configuration is stored here.  The live threshold and the
//! fail-safe clock are never persisted.

use crate::app::ports::{ConfigError, ConfigPort, StorageError};
use crate::config::{ControlConfig, NetworkConfig};
use log::{info, warn};

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

const CONFIG_NAMESPACE: &str = "chamberheat";
const CONFIG_KEY: &str = "ctlcfg";
const NET_NAMESPACE: &str = "net";
const NET_KEY: &str = "netcfg";

/// NVS key and namespace names are limited to 15 bytes plus NUL.
#[cfg(target_os = "espidf")]
const NVS_NAME_LEN: usize = 16;
const MAX_BLOB_SIZE: usize = 1024;

pub struct NvsAdapter {
    #[cfg(not(target_os = "espidf"))]
    store: std::cell::RefCell<HashMap<String, Vec<u8>>>,
}

impl NvsAdapter {
    /// Create a new NvsAdapter and initialise NVS flash.
    ///
    /// Returns `Err(ConfigError::IoError)` if flash initialisation fails
    /// unrecoverably. On first boot or after a version mismatch the NVS
    /// partition is erased and re-initialised automatically.
    pub fn new() -> Result<Self, ConfigError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: nvs_flash_init / nvs_flash_erase are called from the
            // single main-task context before any concurrent NVS access.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES as esp_err_t
                || ret == ESP_ERR_NVS_NEW_VERSION_FOUND as esp_err_t
            {
                warn!("NVS: erasing and re-initialising flash partition");
                if unsafe { nvs_flash_erase() } != ESP_OK {
                    return Err(ConfigError::IoError);
                }
                if unsafe { nvs_flash_init() } != ESP_OK {
                    return Err(ConfigError::IoError);
                }
            } else if ret != ESP_OK {
                return Err(ConfigError::IoError);
            }
            info!("NvsAdapter: ESP-IDF NVS initialised");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NvsAdapter: simulation backend");

        Ok(Self {
            #[cfg(not(target_os = "espidf"))]
            store: std::cell::RefCell::new(HashMap::new()),
        })
    }

    // ── Network credentials ───────────────────────────────────

    /// Load the network configuration.  `NotFound` on first boot.
    pub fn load_network(&self) -> Result<NetworkConfig, ConfigError> {
        let bytes = self.load_blob(NET_NAMESPACE, NET_KEY)?;
        let net: NetworkConfig = postcard::from_bytes(&bytes).map_err(|_| ConfigError::Corrupted)?;
        net.validate()?;
        Ok(net)
    }

    /// Validate and persist the network configuration.
    pub fn save_network(&self, net: &NetworkConfig) -> Result<(), ConfigError> {
        net.validate()?;
        let bytes = postcard::to_allocvec(net).map_err(|_| ConfigError::IoError)?;
        self.store_blob(NET_NAMESPACE, NET_KEY, &bytes)?;
        info!("NvsAdapter: network config saved ({} bytes)", bytes.len());
        Ok(())
    }

    // ── Blob helpers (simulation) ─────────────────────────────

    #[cfg(not(target_os = "espidf"))]
    fn composite_key(namespace: &str, key: &str) -> String {
        format!("{}::{}", namespace, key)
    }

    #[cfg(not(target_os = "espidf"))]
    fn load_blob(&self, namespace: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        self.store
            .borrow()
            .get(&Self::composite_key(namespace, key))
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    #[cfg(not(target_os = "espidf"))]
    fn store_blob(&self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        if data.len() > MAX_BLOB_SIZE {
            return Err(StorageError::Full);
        }
        self.store
            .borrow_mut()
            .insert(Self::composite_key(namespace, key), data.to_vec());
        Ok(())
    }

    // ── Blob helpers (ESP-IDF) ────────────────────────────────

    /// NUL-terminated copy of an NVS name, truncated to 15 bytes.
    #[cfg(target_os = "espidf")]
    fn c_name(name: &str) -> [u8; NVS_NAME_LEN] {
        let mut buf = [0u8; NVS_NAME_LEN];
        let bytes = name.as_bytes();
        let len = bytes.len().min(NVS_NAME_LEN - 1);
        buf[..len].copy_from_slice(&bytes[..len]);
        buf
    }

    /// Open an NVS namespace, execute a closure with the handle, then close.
    #[cfg(target_os = "espidf")]
    fn with_nvs_handle<F, T>(namespace: &str, write: bool, f: F) -> Result<T, i32>
    where
        F: FnOnce(nvs_handle_t) -> Result<T, i32>,
    {
        let ns = Self::c_name(namespace);
        let mut handle: nvs_handle_t = 0;
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };

        let ret = unsafe { nvs_open(ns.as_ptr() as *const _, mode, &mut handle) };
        if ret != ESP_OK {
            return Err(ret);
        }

        let result = f(handle);
        unsafe {
            nvs_close(handle);
        }
        result
    }

    #[cfg(target_os = "espidf")]
    fn map_esp_err(ret: i32) -> StorageError {
        match ret {
            r if r == ESP_ERR_NVS_NOT_FOUND as esp_err_t => StorageError::NotFound,
            r if r == ESP_ERR_NVS_NOT_ENOUGH_SPACE as esp_err_t => StorageError::Full,
            r if r == ESP_ERR_NVS_INVALID_LENGTH as esp_err_t => StorageError::BufferTooSmall,
            _ => StorageError::IoError,
        }
    }

    #[cfg(target_os = "espidf")]
    fn load_blob(&self, namespace: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        let key = Self::c_name(key);
        Self::with_nvs_handle(namespace, false, |handle| {
            let mut size: usize = 0;

            // First call: get size
            let ret = unsafe {
                nvs_get_blob(
                    handle,
                    key.as_ptr() as *const _,
                    core::ptr::null_mut(),
                    &mut size,
                )
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            if size == 0 || size > MAX_BLOB_SIZE {
                return Err(ESP_ERR_NVS_INVALID_LENGTH as esp_err_t);
            }

            let mut buf = vec![0u8; size];
            let ret = unsafe {
                nvs_get_blob(
                    handle,
                    key.as_ptr() as *const _,
                    buf.as_mut_ptr() as *mut _,
                    &mut size,
                )
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            buf.truncate(size);
            Ok(buf)
        })
        .map_err(Self::map_esp_err)
    }

    #[cfg(target_os = "espidf")]
    fn store_blob(&self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        if data.len() > MAX_BLOB_SIZE {
            return Err(StorageError::Full);
        }
        let key = Self::c_name(key);
        Self::with_nvs_handle(namespace, true, |handle| {
            let ret = unsafe {
                nvs_set_blob(
                    handle,
                    key.as_ptr() as *const _,
                    data.as_ptr() as *const _,
                    data.len(),
                )
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            let ret = unsafe { nvs_commit(handle) };
            if ret != ESP_OK {
                return Err(ret);
            }
            Ok(())
        })
        .map_err(|e| {
            warn!("NvsAdapter: NVS write error {}", e);
            Self::map_esp_err(e)
        })
    }
}

impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<ControlConfig, ConfigError> {
        match self.load_blob(CONFIG_NAMESPACE, CONFIG_KEY) {
            Ok(bytes) => {
                let cfg: ControlConfig =
                    postcard::from_bytes(&bytes).map_err(|_| ConfigError::Corrupted)?;
                cfg.validate()?;
                info!("NvsAdapter: loaded config ({} bytes)", bytes.len());
                Ok(cfg)
            }
            Err(StorageError::NotFound) => {
                info!("NvsAdapter: no stored config, using defaults");
                Ok(ControlConfig::default())
            }
            Err(e) => {
                warn!("NvsAdapter: config read error ({}), using defaults", e);
                Ok(ControlConfig::default())
            }
        }
    }

    fn save(&self, config: &ControlConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;
        self.store_blob(CONFIG_NAMESPACE, CONFIG_KEY, &bytes)?;
        info!("NvsAdapter: config saved ({} bytes)", bytes.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use heapless::String;

    #[test]
    fn missing_config_falls_back_to_defaults() {
        let nvs = NvsAdapter::new().unwrap();
        assert_eq!(nvs.load().unwrap(), ControlConfig::default());
    }

    #[test]
    fn config_round_trip() {
        let nvs = NvsAdapter::new().unwrap();
        let cfg = ControlConfig {
            hysteresis_c: 0.5,
            fail_safe_timeout_secs: 300,
            ..Default::default()
        };
        nvs.save(&cfg).unwrap();
        assert_eq!(nvs.load().unwrap(), cfg);
    }

    #[test]
    fn invalid_config_is_not_persisted() {
        let nvs = NvsAdapter::new().unwrap();
        let cfg = ControlConfig {
            fail_safe_timeout_secs: 0,
            ..Default::default()
        };
        assert!(matches!(nvs.save(&cfg), Err(ConfigError::ValidationFailed(_))));
        assert_eq!(
            nvs.load_blob(CONFIG_NAMESPACE, CONFIG_KEY),
            Err(StorageError::NotFound)
        );
    }

    #[test]
    fn corrupted_blob_is_reported() {
        let nvs = NvsAdapter::new().unwrap();
        nvs.store_blob(CONFIG_NAMESPACE, CONFIG_KEY, &[0xFF; 3]).unwrap();
        assert_eq!(nvs.load(), Err(ConfigError::Corrupted));
    }

    #[test]
    fn network_round_trip() {
        let nvs = NvsAdapter::new().unwrap();
        assert_eq!(nvs.load_network(), Err(ConfigError::NotFound));

        let net = NetworkConfig {
            wifi_ssid: String::try_from("Workshop").unwrap(),
            wifi_password: String::try_from("correct-horse").unwrap(),
            broker_url: String::try_from("mqtt://10.0.0.2:1883").unwrap(),
            client_id: String::try_from("chamberheat-01").unwrap(),
        };
        nvs.save_network(&net).unwrap();
        assert_eq!(nvs.load_network().unwrap(), net);
        assert!(nvs.save_network(&NetworkConfig::default()).is_err());
    }

    #[test]
    fn namespaces_are_isolated() {
        let nvs = NvsAdapter::new().unwrap();
        nvs.store_blob("ns_a", "key", b"alpha").unwrap();
        nvs.store_blob("ns_b", "key", b"bravo").unwrap();

        assert_eq!(nvs.load_blob("ns_a", "key").unwrap(), b"alpha");
        assert_eq!(nvs.load_blob("ns_b", "key").unwrap(), b"bravo");
        assert_eq!(nvs.load_blob("ns_c", "key"), Err(StorageError::NotFound));
    }

    #[test]
    fn oversized_blob_is_refused() {
        let nvs = NvsAdapter::new().unwrap();
        let big = vec![0u8; MAX_BLOB_SIZE + 1];
        assert_eq!(nvs.store_blob("ns", "big", &big), Err(StorageError::Full));
        assert_eq!(
            ConfigError::from(StorageError::Full),
            ConfigError::StorageFull
        );
    }
}
