//! WiFi station-mode adapter with a static IPv4 address.
//!
//! Implements [`ConnectivityPort`], the boundary for network provisioning.
//! The node must come up on a fixed address (its peers and users address
//! it by IP), so DHCP is never used.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `BlockingWifi<EspWifi>` with a client netif
//!   configured for the static address.
//! - **all other targets**: simulation stub for host-side tests.
//!
//! ## Failure policy
//!
//! There is no reconnect loop here. A failed `connect()` is reported to the
//! caller, and the firmware entry point restarts the chip after a delay.

use core::fmt;
use std::net::Ipv4Addr;

use log::{error, info};

use super::utils::is_printable_ascii;
use crate::config::SystemConfig;

#[cfg(target_os = "espidf")]
use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    hal::modem::Modem,
    ipv4,
    netif::{EspNetif, NetifConfiguration, NetifStack},
    wifi::{AuthMethod, BlockingWifi, ClientConfiguration, Configuration, EspWifi, WifiDriver},
};

// ───────────────────────────────────────────────────────────────
// Port trait
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityError {
    NoCredentials,
    InvalidSsid,
    InvalidPassword,
    /// Driver or netif initialisation failed.
    DriverInit,
    ConnectionFailed,
    AlreadyConnected,
}

impl fmt::Display for ConnectivityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCredentials => write!(f, "no WiFi credentials configured"),
            Self::InvalidSsid => write!(f, "SSID invalid (must be 1-32 printable ASCII bytes)"),
            Self::InvalidPassword => {
                write!(f, "password invalid (must be 8-64 bytes for WPA2, or empty for open)")
            }
            Self::DriverInit => write!(f, "WiFi driver initialisation failed"),
            Self::ConnectionFailed => write!(f, "WiFi connection failed"),
            Self::AlreadyConnected => write!(f, "already connected to AP"),
        }
    }
}

impl std::error::Error for ConnectivityError {}

pub trait ConnectivityPort {
    fn connect(&mut self) -> Result<(), ConnectivityError>;
    fn disconnect(&mut self);
    fn is_connected(&self) -> bool;
    fn set_credentials(&mut self, ssid: &str, password: &str) -> Result<(), ConnectivityError>;
    /// Address actually assigned to the interface, once connected.
    fn local_ip(&self) -> Option<Ipv4Addr>;
}

// ───────────────────────────────────────────────────────────────
// Static addressing
// ───────────────────────────────────────────────────────────────

/// Fixed IPv4 settings applied to the station interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticIp {
    pub ip: Ipv4Addr,
    pub gateway: Ipv4Addr,
    pub prefix_len: u8,
    pub dns_primary: Ipv4Addr,
    pub dns_secondary: Ipv4Addr,
}

impl StaticIp {
    pub fn from_config(cfg: &SystemConfig) -> Self {
        Self {
            ip: cfg.local_ip,
            gateway: cfg.gateway,
            prefix_len: cfg.subnet_prefix_len(),
            dns_primary: cfg.dns_primary,
            dns_secondary: cfg.dns_secondary,
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Connection state
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiState {
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

// ───────────────────────────────────────────────────────────────
// Validation
// ───────────────────────────────────────────────────────────────

fn validate_ssid(ssid: &str) -> Result<(), ConnectivityError> {
    if ssid.is_empty() || ssid.len() > 32 || !is_printable_ascii(ssid) {
        return Err(ConnectivityError::InvalidSsid);
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), ConnectivityError> {
    if password.is_empty() {
        return Ok(());
    }
    if password.len() < 8 || password.len() > 64 {
        return Err(ConnectivityError::InvalidPassword);
    }
    Ok(())
}

// ───────────────────────────────────────────────────────────────
// WiFi adapter
// ───────────────────────────────────────────────────────────────

pub struct WifiAdapter {
    state: WifiState,
    ssid: heapless::String<32>,
    password: heapless::String<64>,
    static_ip: StaticIp,
    #[cfg(target_os = "espidf")]
    wifi: BlockingWifi<EspWifi<'static>>,
    /// Simulation: make the next `connect()` fail.
    #[cfg(not(target_os = "espidf"))]
    sim_fail_next: bool,
}

impl WifiAdapter {
    /// Bring up the WiFi driver with a station netif pinned to `static_ip`.
    #[cfg(target_os = "espidf")]
    pub fn new(
        modem: Modem,
        sysloop: EspSystemEventLoop,
        static_ip: StaticIp,
    ) -> Result<Self, ConnectivityError> {
        let driver = WifiDriver::new(modem, sysloop.clone(), None).map_err(init_error)?;
        let sta_netif = EspNetif::new_with_conf(&NetifConfiguration {
            ip_configuration: Some(ipv4::Configuration::Client(
                ipv4::ClientConfiguration::Fixed(ipv4::ClientSettings {
                    ip: static_ip.ip,
                    subnet: ipv4::Subnet {
                        gateway: static_ip.gateway,
                        mask: ipv4::Mask(static_ip.prefix_len),
                    },
                    dns: Some(static_ip.dns_primary),
                    secondary_dns: Some(static_ip.dns_secondary),
                }),
            )),
            ..NetifConfiguration::wifi_default_client()
        })
        .map_err(init_error)?;
        let ap_netif = EspNetif::new(NetifStack::Ap).map_err(init_error)?;
        let wifi = EspWifi::wrap_all(driver, sta_netif, ap_netif).map_err(init_error)?;
        let wifi = BlockingWifi::wrap(wifi, sysloop).map_err(init_error)?;

        info!(
            "WiFi: driver ready, static {}/{} via {}",
            static_ip.ip, static_ip.prefix_len, static_ip.gateway
        );
        Ok(Self {
            state: WifiState::Disconnected,
            ssid: heapless::String::new(),
            password: heapless::String::new(),
            static_ip,
            wifi,
        })
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new(static_ip: StaticIp) -> Result<Self, ConnectivityError> {
        info!("WiFi(sim): static {}/{}", static_ip.ip, static_ip.prefix_len);
        Ok(Self {
            state: WifiState::Disconnected,
            ssid: heapless::String::new(),
            password: heapless::String::new(),
            static_ip,
            sim_fail_next: false,
        })
    }

    pub fn state(&self) -> WifiState {
        self.state
    }

    pub fn static_ip(&self) -> StaticIp {
        self.static_ip
    }

    /// Simulation only: the next `connect()` fails with `ConnectionFailed`.
    #[cfg(not(target_os = "espidf"))]
    pub fn fail_next_connect(&mut self) {
        self.sim_fail_next = true;
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_connect(&mut self) -> Result<(), ConnectivityError> {
        let auth_method = if self.password.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };
        let config = Configuration::Client(ClientConfiguration {
            ssid: self
                .ssid
                .as_str()
                .try_into()
                .map_err(|_| ConnectivityError::InvalidSsid)?,
            password: self
                .password
                .as_str()
                .try_into()
                .map_err(|_| ConnectivityError::InvalidPassword)?,
            auth_method,
            ..Default::default()
        });
        self.wifi.set_configuration(&config).map_err(connect_error)?;
        if !self.wifi.is_started().unwrap_or(false) {
            self.wifi.start().map_err(connect_error)?;
        }
        self.wifi.connect().map_err(connect_error)?;
        self.wifi.wait_netif_up().map_err(connect_error)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_connect(&mut self) -> Result<(), ConnectivityError> {
        if core::mem::take(&mut self.sim_fail_next) {
            return Err(ConnectivityError::ConnectionFailed);
        }
        info!("WiFi(sim): associated with '{}'", self.ssid);
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_disconnect(&mut self) {
        let _ = self.wifi.disconnect();
        let _ = self.wifi.stop();
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_disconnect(&mut self) {}

    #[cfg(target_os = "espidf")]
    fn platform_ip(&self) -> Option<Ipv4Addr> {
        self.wifi.wifi().sta_netif().get_ip_info().ok().map(|info| info.ip)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_ip(&self) -> Option<Ipv4Addr> {
        Some(self.static_ip.ip)
    }
}

#[cfg(target_os = "espidf")]
fn init_error(e: esp_idf_svc::sys::EspError) -> ConnectivityError {
    error!("WiFi: driver init failed: {}", e);
    ConnectivityError::DriverInit
}

#[cfg(target_os = "espidf")]
fn connect_error(e: esp_idf_svc::sys::EspError) -> ConnectivityError {
    error!("WiFi: {}", e);
    ConnectivityError::ConnectionFailed
}

// ───────────────────────────────────────────────────────────────
// ConnectivityPort
// ───────────────────────────────────────────────────────────────

impl ConnectivityPort for WifiAdapter {
    fn connect(&mut self) -> Result<(), ConnectivityError> {
        if self.ssid.is_empty() {
            return Err(ConnectivityError::NoCredentials);
        }
        if self.state == WifiState::Connected {
            return Err(ConnectivityError::AlreadyConnected);
        }

        info!("WiFi: connecting to '{}'", self.ssid);
        self.state = WifiState::Connecting;

        match self.platform_connect() {
            Ok(()) => {
                self.state = WifiState::Connected;
                info!("WiFi: connected, IP {:?}", self.platform_ip());
                Ok(())
            }
            Err(e) => {
                error!("WiFi: connection failed: {}", e);
                self.state = WifiState::Failed;
                Err(e)
            }
        }
    }

    fn disconnect(&mut self) {
        self.platform_disconnect();
        self.state = WifiState::Disconnected;
        info!("WiFi: disconnected");
    }

    fn is_connected(&self) -> bool {
        self.state == WifiState::Connected
    }

    fn set_credentials(&mut self, ssid: &str, password: &str) -> Result<(), ConnectivityError> {
        validate_ssid(ssid)?;
        validate_password(password)?;
        self.ssid.clear();
        self.ssid
            .push_str(ssid)
            .map_err(|_| ConnectivityError::InvalidSsid)?;
        self.password.clear();
        self.password
            .push_str(password)
            .map_err(|_| ConnectivityError::InvalidPassword)?;
        info!("WiFi: credentials updated (SSID='{}')", self.ssid);
        Ok(())
    }

    fn local_ip(&self) -> Option<Ipv4Addr> {
        if self.is_connected() {
            self.platform_ip()
        } else {
            None
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
