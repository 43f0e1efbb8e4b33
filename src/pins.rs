//! GPIO pin assignments for the NetRelay board.
//!
//! Single source of truth: the relay driver and the default config
//! reference this module rather than hard-coding pin numbers.

// ---------------------------------------------------------------------------
// Relay module
// ---------------------------------------------------------------------------

/// Digital output driving the relay module coil transistor.
/// GPIO 12 is the pin silk-screened `D6` on Wemos-style D1 boards.
pub const RELAY_GPIO: i32 = 12;

/// Highest GPIO number that can be configured as an output on the
/// supported chips (ESP32-S3 exposes 0–48).
pub const MAX_OUTPUT_GPIO: i32 = 48;

// ---------------------------------------------------------------------------
// UART debug
// ---------------------------------------------------------------------------

pub const UART_TX_GPIO: i32 = 43;
pub const UART_RX_GPIO: i32 = 44;

/// `true` if `gpio` can drive the relay (not a UART debug pin, in range).
pub const fn is_valid_relay_gpio(gpio: i32) -> bool {
    gpio >= 0 && gpio <= MAX_OUTPUT_GPIO && gpio != UART_TX_GPIO && gpio != UART_RX_GPIO
}
