//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements [`ConfigPort`] for the NetRelay node. Only configuration is
//! persisted; the relay state itself is volatile and always boots OFF.
//!
//! The whole [`SystemConfig`] is stored as a single postcard blob under
//! `netrelay::syscfg`. On the host the "flash" is an in-memory map.

use crate::app::ports::{ConfigError, ConfigPort};
use crate::config::SystemConfig;
use log::info;

#[cfg(target_os = "espidf")]
use log::warn;

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

const CONFIG_NAMESPACE: &[u8] = b"netrelay\0";
const CONFIG_KEY: &[u8] = b"syscfg\0";

/// Upper bound on the stored blob; anything larger is treated as corrupt.
#[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
const MAX_BLOB_SIZE: usize = 512;

pub struct NvsAdapter {
    #[cfg(not(target_os = "espidf"))]
    store: std::cell::RefCell<HashMap<&'static [u8], Vec<u8>>>,
}

impl NvsAdapter {
    /// Initialise NVS flash.
    ///
    /// A partition that is full or was written by a newer IDF is erased and
    /// re-initialised; any other failure is `ConfigError::IoError`.
    pub fn new() -> Result<Self, ConfigError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: called once from the main task before any other NVS use.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
                warn!("NVS: erasing and re-initialising flash partition");
                if unsafe { nvs_flash_erase() } != ESP_OK || unsafe { nvs_flash_init() } != ESP_OK
                {
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

    /// Remove the stored configuration; the next `load` returns defaults.
    pub fn reset(&self) -> Result<(), ConfigError> {
        #[cfg(not(target_os = "espidf"))]
        {
            self.store.borrow_mut().remove(CONFIG_KEY);
            info!("NvsAdapter: stored config erased (simulation)");
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let result = with_nvs_handle(true, |handle| {
                let ret = unsafe { nvs_erase_key(handle, CONFIG_KEY.as_ptr() as *const _) };
                if ret != ESP_OK && ret != ESP_ERR_NVS_NOT_FOUND {
                    return Err(ret);
                }
                match unsafe { nvs_commit(handle) } {
                    ESP_OK => Ok(()),
                    e => Err(e),
                }
            });
            result.map_err(|e| {
                warn!("NvsAdapter: erase failed ({})", e);
                ConfigError::IoError
            })?;
            info!("NvsAdapter: stored config erased");
            Ok(())
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_blob(&self) -> Result<Option<Vec<u8>>, ConfigError> {
        Ok(self.store.borrow().get(CONFIG_KEY).cloned())
    }

    #[cfg(target_os = "espidf")]
    fn read_blob(&self) -> Result<Option<Vec<u8>>, ConfigError> {
        let result = with_nvs_handle(false, |handle| {
            let mut size: usize = 0;
            // First call: blob size only
            let ret = unsafe {
                nvs_get_blob(
                    handle,
                    CONFIG_KEY.as_ptr() as *const _,
                    core::ptr::null_mut(),
                    &mut size,
                )
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            if size == 0 || size > MAX_BLOB_SIZE {
                return Err(ESP_ERR_NVS_INVALID_LENGTH);
            }
            let mut buf = vec![0u8; size];
            let ret = unsafe {
                nvs_get_blob(
                    handle,
                    CONFIG_KEY.as_ptr() as *const _,
                    buf.as_mut_ptr() as *mut _,
                    &mut size,
                )
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            buf.truncate(size);
            Ok(buf)
        });

        match result {
            Ok(bytes) => Ok(Some(bytes)),
            // A namespace that was never written cannot be opened read-only.
            Err(e) if e == ESP_ERR_NVS_NOT_FOUND => Ok(None),
            Err(e) if e == ESP_ERR_NVS_INVALID_LENGTH => Err(ConfigError::Corrupted),
            Err(e) => {
                warn!("NvsAdapter: NVS read error {}", e);
                Err(ConfigError::IoError)
            }
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn write_blob(&self, bytes: Vec<u8>) -> Result<(), ConfigError> {
        self.store.borrow_mut().insert(CONFIG_KEY, bytes);
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn write_blob(&self, bytes: Vec<u8>) -> Result<(), ConfigError> {
        with_nvs_handle(true, |handle| {
            let ret = unsafe {
                nvs_set_blob(
                    handle,
                    CONFIG_KEY.as_ptr() as *const _,
                    bytes.as_ptr() as *const _,
                    bytes.len(),
                )
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            match unsafe { nvs_commit(handle) } {
                ESP_OK => Ok(()),
                e => Err(e),
            }
        })
        .map_err(|e| {
            warn!("NvsAdapter: NVS write error {}", e);
            ConfigError::IoError
        })
    }
}

/// Open the config namespace, run `f` with the handle, then close it.
#[cfg(target_os = "espidf")]
fn with_nvs_handle<F, T>(write: bool, f: F) -> Result<T, esp_err_t>
where
    F: FnOnce(nvs_handle_t) -> Result<T, esp_err_t>,
{
    let mode = if write {
        nvs_open_mode_t_NVS_READWRITE
    } else {
        nvs_open_mode_t_NVS_READONLY
    };
    let mut handle: nvs_handle_t = 0;
    let ret = unsafe { nvs_open(CONFIG_NAMESPACE.as_ptr() as *const _, mode, &mut handle) };
    if ret != ESP_OK {
        return Err(ret);
    }
    let result = f(handle);
    unsafe { nvs_close(handle) };
    result
}

impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<SystemConfig, ConfigError> {
        let Some(bytes) = self.read_blob()? else {
            info!("NvsAdapter: no stored config, using defaults");
            return Ok(SystemConfig::default());
        };
        let cfg: SystemConfig = postcard::from_bytes(&bytes).map_err(|_| ConfigError::Corrupted)?;
        info!("NvsAdapter: loaded config ({} bytes)", bytes.len());
        Ok(cfg)
    }

    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;
        let len = bytes.len();
        self.write_blob(bytes)?;
        info!("NvsAdapter: config saved ({} bytes)", len);
        Ok(())
    }
}
