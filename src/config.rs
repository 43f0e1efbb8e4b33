//! System configuration parameters
//!
//! All tunable parameters for the NetRelay node. The defaults reproduce the
//! factory constants of the first relay boards; values can be overridden
//! through NVS (see [`crate::adapters::nvs`]).

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::http::transport::DRAIN_TIMEOUT;

use crate::app::ports::ConfigError;
use crate::pins;

/// Which side of the replication pair this node plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeRole {
    /// Owns the authoritative relay state and serves it to slaves.
    Master,
    /// Mirrors the Master's relay state every control cycle.
    Slave,
}

/// Electrical level that energises the relay coil.
///
/// Relay modules differ: bare transistor drivers are usually active-high,
/// most opto-isolated "Arduino" relay boards are active-low. Getting this
/// wrong inverts every command, so it is a configuration value and never
/// inferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelayPolarity {
    /// GPIO HIGH closes the relay.
    ActiveHigh,
    /// GPIO LOW closes the relay.
    ActiveLow,
}

impl RelayPolarity {
    /// GPIO level (`true` = HIGH) that puts the relay in the on position.
    pub const fn on_level(self) -> bool {
        matches!(self, Self::ActiveHigh)
    }
}

/// How `/relay?do=<value>` treats values other than `on`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandPolicy {
    /// Anything that is not `on` (including a missing parameter) means off.
    Permissive,
    /// Only `on` and `off` are accepted; anything else is answered with 400.
    Strict,
}

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemConfig {
    // --- Role ---
    /// Master or Slave; fixed for the lifetime of the process.
    pub role: NodeRole,
    /// Address of the Master (used only when `role == Slave`).
    pub master_ip: Ipv4Addr,
    /// HTTP port of the Master's status endpoint.
    pub master_port: u16,

    // --- Network (static IP) ---
    pub local_ip: Ipv4Addr,
    pub gateway: Ipv4Addr,
    pub subnet_mask: Ipv4Addr,
    pub dns_primary: Ipv4Addr,
    pub dns_secondary: Ipv4Addr,
    /// Port the HTTP API listens on.
    pub http_port: u16,
    /// Station credentials (fallback until re-provisioned).
    pub wifi_ssid: heapless::String<32>,
    pub wifi_password: heapless::String<64>,

    // --- Relay ---
    /// GPIO driving the relay module.
    pub relay_gpio: i32,
    /// Active level of the relay module.
    pub relay_polarity: RelayPolarity,

    // --- API ---
    /// Interpretation of unexpected `do` values on `/relay`.
    pub command_policy: CommandPolicy,
    /// Upper bound on requests serviced in one control cycle.
    pub max_requests_per_cycle: u8,

    // --- Timing ---
    /// Delay between control loop iterations (milliseconds)
    pub control_loop_interval_ms: u32,
    /// Connect + read timeout for polling the Master (milliseconds)
    pub mirror_timeout_ms: u32,
    /// Read timeout for a single inbound request (milliseconds)
    pub request_timeout_ms: u32,
    /// Wait before restarting after a provisioning failure (milliseconds)
    pub provisioning_restart_delay_ms: u32,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            // Role
            role: NodeRole::Master,
            master_ip: Ipv4Addr::new(192, 168, 0, 101),
            master_port: 80,

            // Network
            local_ip: Ipv4Addr::new(192, 168, 0, 100),
            gateway: Ipv4Addr::new(192, 168, 0, 1),
            subnet_mask: Ipv4Addr::new(255, 255, 255, 0),
            dns_primary: Ipv4Addr::new(8, 8, 8, 8),
            dns_secondary: Ipv4Addr::new(8, 8, 4, 4),
            http_port: 80,
            wifi_ssid: heapless_str("relay-net"),
            wifi_password: heapless_str("change-me-please"),

            // Relay
            relay_gpio: pins::RELAY_GPIO,
            relay_polarity: RelayPolarity::ActiveHigh,

            // API
            command_policy: CommandPolicy::Permissive,
            max_requests_per_cycle: 4,

            // Timing
            control_loop_interval_ms: 100,       // 10 Hz
            mirror_timeout_ms: 2_000,
            request_timeout_ms: 500,
            provisioning_restart_delay_ms: 3_000,
        }
    }
}

impl SystemConfig {
    /// Range-check every field. Called before persisting and after loading.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.http_port == 0 {
            return Err(ConfigError::ValidationFailed("http_port must be non-zero"));
        }
        if self.role == NodeRole::Slave {
            if self.master_ip.is_unspecified() || self.master_ip.is_broadcast() {
                return Err(ConfigError::ValidationFailed(
                    "master_ip must be a unicast address",
                ));
            }
            if self.master_ip == self.local_ip && self.master_port == self.http_port {
                return Err(ConfigError::ValidationFailed(
                    "a slave cannot mirror itself",
                ));
            }
            if self.master_port == 0 {
                return Err(ConfigError::ValidationFailed("master_port must be non-zero"));
            }
        }
        if !is_contiguous_mask(self.subnet_mask) {
            return Err(ConfigError::ValidationFailed(
                "subnet_mask must be a contiguous prefix",
            ));
        }
        if !pins::is_valid_relay_gpio(self.relay_gpio) {
            return Err(ConfigError::ValidationFailed("relay_gpio out of range"));
        }
        if self.max_requests_per_cycle == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_requests_per_cycle must be at least 1",
            ));
        }
        if !(10..=5_000).contains(&self.control_loop_interval_ms) {
            return Err(ConfigError::ValidationFailed(
                "control_loop_interval_ms must be 10–5000",
            ));
        }
        if !(100..=10_000).contains(&self.mirror_timeout_ms) {
            return Err(ConfigError::ValidationFailed(
                "mirror_timeout_ms must be 100–10000",
            ));
        }
        if !(50..=5_000).contains(&self.request_timeout_ms) {
            return Err(ConfigError::ValidationFailed(
                "request_timeout_ms must be 50–5000",
            ));
        }
        Ok(())
    }

    /// Socket address of the Master's HTTP server.
    pub fn master_addr(&self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(self.master_ip, self.master_port))
    }

    pub fn control_loop_interval(&self) -> Duration {
        Duration::from_millis(u64::from(self.control_loop_interval_ms))
    }

    pub fn mirror_timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.mirror_timeout_ms))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.request_timeout_ms))
    }

    /// Longest a single control cycle can take: every request slot using
    /// up its read and write deadlines plus the drain, the mirror poll, and
    /// the loop delay.
    pub fn worst_case_cycle(&self) -> Duration {
        let per_request = self.request_timeout() * 2 + DRAIN_TIMEOUT;
        let requests = per_request * u32::from(self.max_requests_per_cycle);
        let mirror = match self.role {
            NodeRole::Master => Duration::ZERO,
            // the last blocking call may start just before the poll deadline
            NodeRole::Slave => self.mirror_timeout() * 2,
        };
        requests + mirror + self.control_loop_interval()
    }

    /// Prefix length of `subnet_mask` (e.g. 24 for 255.255.255.0).
    pub fn subnet_prefix_len(&self) -> u8 {
        u32::from(self.subnet_mask).count_ones() as u8
    }
}

fn is_contiguous_mask(mask: Ipv4Addr) -> bool {
    let bits = u32::from(mask);
    bits.leading_ones() + bits.trailing_zeros() == 32
}

fn heapless_str<const N: usize>(s: &str) -> heapless::String<N> {
    let mut out = heapless::String::new();
    // Defaults are compile-time literals well below capacity.
    let _ = out.push_str(s);
    out
}
