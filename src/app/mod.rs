//! Application core: relay state, API semantics and the control loop.
//!
//! Nothing in here opens a socket or touches a GPIO. All interaction with
//! the outside world goes through the **port traits** in [`ports`], so the
//! whole cycle can be driven from tests with mock adapters.

pub mod control_loop;
pub mod endpoints;
pub mod events;
pub mod ports;
pub mod role;
pub mod state;
