//! Task Watchdog Timer (TWDT) driver.
//!
//! Wraps the ESP-IDF TWDT API to reset the device if the control loop
//! stalls. The timeout is derived from the configured worst-case cycle
//! time, so a slow Master poll never trips it on its own.
//!
//! The main loop must call `feed()` once per control cycle.

use std::time::Duration;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use log::info;

/// Lower bound on the watchdog period.
pub const MIN_TIMEOUT: Duration = Duration::from_secs(5);

pub struct Watchdog {
    #[cfg(target_os = "espidf")]
    subscribed: bool,
    timeout: Duration,
}

impl Watchdog {
    /// Initialise and subscribe the current task to the TWDT.
    pub fn new(timeout: Duration) -> Self {
        let timeout = timeout.max(MIN_TIMEOUT);

        #[cfg(target_os = "espidf")]
        {
            // SAFETY: plain FFI calls with a stack-allocated config; the
            // current task handle (null) is always valid.
            unsafe {
                let cfg = esp_task_wdt_config_t {
                    timeout_ms: timeout.as_millis() as u32,
                    idle_core_mask: 0,
                    trigger_panic: true,
                };
                let ret = esp_task_wdt_reconfigure(&cfg);
                if ret != ESP_OK {
                    log::warn!(
                        "TWDT reconfigure returned {} (may already be configured)",
                        ret
                    );
                }

                let ret = esp_task_wdt_add(core::ptr::null_mut());
                let subscribed = ret == ESP_OK;
                if subscribed {
                    info!(
                        "Watchdog: subscribed ({} ms timeout, panic on trigger)",
                        timeout.as_millis()
                    );
                } else {
                    log::warn!("Watchdog: failed to subscribe ({})", ret);
                }

                Self { subscribed, timeout }
            }
        }

        #[cfg(not(target_os = "espidf"))]
        {
            log::info!("Watchdog(sim): no-op ({} ms)", timeout.as_millis());
            Self { timeout }
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Feed the watchdog. Must be called at least once per `timeout()`.
    pub fn feed(&self) {
        #[cfg(target_os = "espidf")]
        {
            if self.subscribed {
                unsafe {
                    esp_task_wdt_reset();
                }
            }
        }
    }
}
