//! Relay output, task watchdog and worker-thread helpers.

pub mod relay;
pub mod task_pin;
pub mod watchdog;
