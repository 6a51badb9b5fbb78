//! Device drivers.
//!
//! Real drivers live in their own crates and plug in through
//! [`DeviceDriver`](crate::device::DeviceDriver). This module only carries
//! the simulated drivers used for testing and demos.

pub mod mock;

pub use mock::MockDetector;
