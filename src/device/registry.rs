//! Device registration.
//!
//! Devices register themselves with a [`DeviceService`] injected at
//! construction. [`DeviceRegistry`] is the in-process implementation: a
//! name-keyed map of type-erased [`DeviceHandle`]s that can list and
//! snapshot every registered device.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::info;

use super::snapshot::DeviceSnapshot;
use super::state::DeviceState;
use super::status::ScanStatus;
use crate::error::{DeviceError, DeviceResult};

/// Model-independent view of a registered device.
pub trait DeviceHandle: Send + Sync {
    /// Device name.
    fn name(&self) -> Option<String>;
    /// Ordering level.
    fn level(&self) -> i32;
    /// Current lifecycle state.
    fn device_state(&self) -> Option<DeviceState>;
    /// Used by the scan orchestrator to mark the device busy.
    fn set_busy(&self, busy: bool);
    /// Copy of the current status.
    fn status(&self) -> Option<ScanStatus>;
    /// Snapshot with the model rendered as JSON.
    fn snapshot_json(&self, include_non_alive: bool) -> DeviceSnapshot<serde_json::Value>;
}

/// Somewhere devices can be registered.
pub trait DeviceService: Send + Sync {
    /// Add `device`. Fails if the name is missing or already taken.
    fn register(&self, device: Arc<dyn DeviceHandle>) -> DeviceResult<()>;
}

/// Thread-safe registry of named devices.
#[derive(Default)]
pub struct DeviceRegistry {
    devices: RwLock<BTreeMap<String, Arc<dyn DeviceHandle>>>,
}

impl fmt::Debug for DeviceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceRegistry")
            .field("devices", &self.names())
            .finish()
    }
}

impl DeviceRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle registered under `name`.
    pub fn get(&self, name: &str) -> Option<Arc<dyn DeviceHandle>> {
        self.devices.read().get(name).cloned()
    }

    /// Remove and return the handle registered under `name`.
    pub fn unregister(&self, name: &str) -> Option<Arc<dyn DeviceHandle>> {
        self.devices.write().remove(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.devices.read().keys().cloned().collect()
    }

    /// Number of registered devices.
    pub fn len(&self) -> usize {
        self.devices.read().len()
    }

    /// True when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.devices.read().is_empty()
    }

    /// Snapshot every device, ordered by level and then name.
    ///
    /// Handles are copied out first so slow hardware reads never hold the
    /// registry lock.
    pub fn device_snapshots(&self, include_non_alive: bool) -> Vec<DeviceSnapshot<serde_json::Value>> {
        let handles: Vec<Arc<dyn DeviceHandle>> = self.devices.read().values().cloned().collect();
        let mut snapshots: Vec<_> = handles
            .iter()
            .map(|device| device.snapshot_json(include_non_alive))
            .collect();
        snapshots.sort_by(|a, b| (a.level, &a.name).cmp(&(b.level, &b.name)));
        snapshots
    }
}

impl DeviceService for DeviceRegistry {
    fn register(&self, device: Arc<dyn DeviceHandle>) -> DeviceResult<()> {
        let name = device.name().filter(|n| !n.is_empty()).ok_or_else(|| {
            DeviceError::Configuration("Cannot register a device without a name".to_string())
        })?;

        let mut devices = self.devices.write();
        if devices.contains_key(&name) {
            return Err(DeviceError::Configuration(format!(
                "Device '{name}' is already registered"
            )));
        }
        info!(device = %name, level = device.level(), "device registered");
        devices.insert(name, device);
        Ok(())
    }
}
