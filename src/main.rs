//! NetRelay Firmware: Main Entry Point
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HttpListener    EspStatusClient    RelayDriver   LogEventSink │
//! │  (RequestPort)   (StatusClient)     (RelayPort)   (EventSink)  │
//! │  WifiAdapter     NvsAdapter                                    │
//! │  (Connectivity)  (ConfigPort)                                  │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │            ControlLoop (pure logic)                    │    │
//! │  │  Endpoints · SyncRole · StateStore                     │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  DeferredOffTimer (worker thread) · Watchdog                   │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::gpio::{AnyOutputPin, PinDriver};
use esp_idf_svc::hal::peripherals::Peripherals;
use log::{debug, error, info, warn};

use netrelay::adapters::log_sink::LogEventSink;
use netrelay::adapters::nvs::NvsAdapter;
use netrelay::adapters::wifi::{ConnectivityPort, StaticIp, WifiAdapter};
use netrelay::app::control_loop::ControlLoop;
use netrelay::app::endpoints::Endpoints;
use netrelay::app::ports::{ConfigPort, RelayPort};
use netrelay::app::role::{MasterRole, RemoteMirror, SyncRole};
use netrelay::app::state::{RelayState, StateStore};
use netrelay::config::{NodeRole, SystemConfig};
use netrelay::drivers::relay::RelayDriver;
use netrelay::drivers::watchdog::Watchdog;
use netrelay::error::Error;
use netrelay::http::{EspStatusClient, HttpListener};
use netrelay::scheduler::DeferredOffTimer;

/// Cycles between periodic stats lines (about a minute at 100 ms).
const STATS_EVERY_CYCLES: u64 = 600;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  NetRelay v{}                        ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Load config from NVS (or defaults) ─────────────────
    let config = load_config();
    info!(
        "Config: role={:?} ip={} port={} relay=GPIO{} ({:?})",
        config.role, config.local_ip, config.http_port, config.relay_gpio, config.relay_polarity
    );

    // ── 3. Relay output, forced OFF before anything else ──────
    let peripherals = Peripherals::take()?;
    // SAFETY: `relay_gpio` was validated against the board's output
    // pins and nothing else in the firmware claims it.
    let pin = PinDriver::output(unsafe { AnyOutputPin::new(config.relay_gpio) })
        .map_err(|_| Error::Init("relay GPIO"))?;
    let mut relay = RelayDriver::new(pin, config.relay_polarity);
    relay.commit(RelayState::Off);

    // ── 4. WiFi station with static IP ────────────────────────
    let sysloop = EspSystemEventLoop::take()?;
    let restart_delay = Duration::from_millis(u64::from(config.provisioning_restart_delay_ms));
    let mut wifi = match WifiAdapter::new(
        peripherals.modem,
        sysloop,
        StaticIp::from_config(&config),
    ) {
        Ok(w) => w,
        Err(e) => restart_after(restart_delay, &e),
    };
    if let Err(e) = wifi
        .set_credentials(&config.wifi_ssid, &config.wifi_password)
        .and_then(|()| wifi.connect())
    {
        restart_after(restart_delay, &e);
    }
    let local_ip = wifi.local_ip().unwrap_or(config.local_ip);
    info!("Network up at {}", local_ip);

    // ── 5. HTTP listener ──────────────────────────────────────
    let mut listener = HttpListener::bind(config.http_port, config.request_timeout())?;

    // ── 6. Role strategy ──────────────────────────────────────
    let role: Box<dyn SyncRole> = match config.role {
        NodeRole::Master => Box::new(MasterRole),
        NodeRole::Slave => {
            info!("Mirroring master at {}", config.master_addr());
            Box::new(RemoteMirror::new(EspStatusClient::new(
                config.master_addr(),
                config.mirror_timeout(),
            )))
        }
    };

    // ── 7. State, timer, control loop ─────────────────────────
    let store = Arc::new(StateStore::new());
    let timer = DeferredOffTimer::start(Arc::clone(&store))?;
    let endpoints = Endpoints::new(store, timer, local_ip, config.command_policy);
    let mut control = ControlLoop::new(
        endpoints,
        role,
        usize::from(config.max_requests_per_cycle),
    );
    let mut sink = LogEventSink::new();
    control.start(&mut relay, &mut sink);

    let watchdog = Watchdog::new(config.worst_case_cycle() * 2);
    let interval = config.control_loop_interval();
    info!("System ready. Entering control loop.");

    // ── 8. Control loop ───────────────────────────────────────
    loop {
        control.cycle(&mut listener, &mut relay, &mut sink);
        watchdog.feed();
        if control.cycle_count() % STATS_EVERY_CYCLES == 0 {
            debug!(
                "Stats: {} cycles, {} requests served, {} events",
                control.cycle_count(),
                listener.served(),
                sink.emitted()
            );
        }
        thread::sleep(interval);
    }
}

/// Stored config, or defaults if NVS is unavailable, unreadable or holds
/// an invalid config.
fn load_config() -> SystemConfig {
    let loaded = NvsAdapter::new()
        .and_then(|nvs| nvs.load())
        .and_then(|cfg| cfg.validate().map(|()| cfg))
        .map_err(Error::from);
    match loaded {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!("{}; using defaults", e);
            SystemConfig::default()
        }
    }
}

/// Provisioning failed: wait, then restart the chip. Relay state is
/// volatile, so the node comes back OFF.
fn restart_after(delay: Duration, cause: &dyn std::error::Error) -> ! {
    error!("Network provisioning failed ({}). Restarting in {} ms", cause, delay.as_millis());
    thread::sleep(delay);
    esp_idf_svc::hal::reset::restart()
}
