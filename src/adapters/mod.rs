//! Adapters: concrete implementations of the port traits.
//!
//! | Adapter    | Implements        | Connects to              |
//! |------------|-------------------|--------------------------|
//! | `log_sink` | EventSink         | Serial log output        |
//! | `nvs`      | ConfigPort        | NVS / in-memory store    |
//! | `wifi`     | ConnectivityPort  | ESP-IDF WiFi STA         |
//!
//! The HTTP listener and status client live in [`crate::http`].

pub mod log_sink;
pub mod nvs;
pub(super) mod utils;
pub mod wifi;
