//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that drives the control loop against
//! mock adapters. All tests run on the host with no real hardware or
//! network required.

mod control_loop_tests;
mod endpoint_tests;
mod mock_hw;
