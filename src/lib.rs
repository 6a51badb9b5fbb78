//! Runnable device core for the rust_daq instrument stack.
//!
//! This library models a controllable instrument (detector, motor stage or
//! composite scan device) as a lifecycle state machine:
//!
//! - [`device::DeviceCore`] owns the model, flags and scan status, and is the
//!   single place lifecycle state changes.
//! - [`device::RunnableDevice`] pairs a core with a [`device::DeviceDriver`]
//!   that implements the hardware-specific hooks.
//! - Run and position listeners receive in-process events; a shared
//!   [`publisher::Publisher`] carries status out of the process.
//! - [`device::DeviceSnapshot`] describes a device for UIs and monitors, and
//!   degrades to `OFFLINE` instead of failing when hardware is unreachable.
//!
//! Wire transports and scan-point generation are out of scope; they plug in
//! through the `Publisher` and `DeviceDriver` traits.

pub mod config;
pub mod device;
pub mod error;
pub mod hardware;
pub mod logging;
pub mod publisher;

pub use config::{DeviceConfig, DeviceSettings};
pub use device::{
    DetectorModel, DeviceCore, DeviceDriver, DeviceModel, DeviceRegistry, DeviceSnapshot,
    DeviceState, Position, RunnableDevice, ScanStatus, CancellationToken,
};
pub use error::{DeviceError, DeviceResult, TransportError};
pub use publisher::{ChannelPublisher, Publisher};
