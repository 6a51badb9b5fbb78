//! Point-in-time introspection of a device.
//!
//! A [`DeviceSnapshot`] is rebuilt for every query and never cached. Fields
//! the device holds locally are always filled in. Fields that need the
//! hardware (state, health, busy) are only read when the device is believed
//! alive or the caller asks for them anyway, and any failure while reading
//! them marks the snapshot offline instead of failing the query.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::warn;

use super::core::DeviceCore;
use super::model::DeviceModel;
use super::state::{DeviceRole, DeviceState, ScanMode};

/// Appended to the label of a device that is not alive.
pub const NOT_ALIVE_MARKER: &str = " [*]";

/// Hardware-backed queries used by the snapshot builder.
pub trait HardwareReadout {
    /// Lifecycle state as the hardware reports it.
    fn read_state(&self) -> Result<Option<DeviceState>>;
    /// Free-form health text.
    fn read_health(&self) -> Result<Option<String>>;
    /// Whether the hardware is mid-operation.
    fn read_busy(&self) -> Result<bool>;
    /// Whether the hardware answers at all.
    fn read_alive(&self) -> Result<bool>;
}

/// The base device answers every read from its own flags.
impl<M: DeviceModel> HardwareReadout for DeviceCore<M> {
    fn read_state(&self) -> Result<Option<DeviceState>> {
        Ok(self.device_state())
    }

    fn read_health(&self) -> Result<Option<String>> {
        Ok(None)
    }

    fn read_busy(&self) -> Result<bool> {
        Ok(self.is_busy())
    }

    fn read_alive(&self) -> Result<bool> {
        Ok(self.is_alive())
    }
}

/// Render-ready description of a device.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeviceSnapshot<M> {
    /// Device name.
    pub name: Option<String>,
    /// Label, falling back to the name; marked when not alive.
    pub label: Option<String>,
    /// Ordering level.
    pub level: i32,
    /// Applied model, if configured.
    pub model: Option<M>,
    /// Role within a scan.
    pub role: DeviceRole,
    /// Scan modes the device accepts.
    pub supported_scan_modes: BTreeSet<ScanMode>,
    /// Selected for the next scan.
    pub activated: bool,
    /// False when a hardware read failed or the device reported itself down.
    pub alive: bool,
    /// `OFFLINE` whenever `alive` is false.
    pub state: Option<DeviceState>,
    /// Health text, if the hardware reports any.
    pub health: Option<String>,
    /// Busy flag.
    pub busy: bool,
}

impl<M> DeviceSnapshot<M> {
    /// Convert the model, keeping every other field.
    pub fn map_model<N>(self, convert: impl FnOnce(M) -> Option<N>) -> DeviceSnapshot<N> {
        DeviceSnapshot {
            name: self.name,
            label: self.label,
            level: self.level,
            model: self.model.and_then(convert),
            role: self.role,
            supported_scan_modes: self.supported_scan_modes,
            activated: self.activated,
            alive: self.alive,
            state: self.state,
            health: self.health,
            busy: self.busy,
        }
    }

    /// Label with any not-alive marker removed.
    pub fn plain_label(&self) -> Option<String> {
        self.label
            .as_ref()
            .map(|label| label.replace(NOT_ALIVE_MARKER, ""))
    }
}

struct HardwareFields {
    state: Option<DeviceState>,
    health: Option<String>,
    busy: bool,
    alive: bool,
}

fn read_hardware(readout: &dyn HardwareReadout) -> Result<HardwareFields> {
    Ok(HardwareFields {
        state: readout.read_state()?,
        health: readout.read_health()?,
        busy: readout.read_busy()?,
        alive: readout.read_alive()?,
    })
}

/// Build a snapshot of `core`, reading hardware fields through `readout`.
///
/// Never fails. The only device flag consulted is `alive`, and nothing on
/// the device is changed.
pub fn build_snapshot<M: DeviceModel>(
    core: &DeviceCore<M>,
    readout: &dyn HardwareReadout,
    include_non_alive: bool,
) -> DeviceSnapshot<M> {
    let name = core.name();
    let mut snapshot = DeviceSnapshot {
        label: core.label().or_else(|| name.clone()),
        name,
        level: core.level(),
        model: core.model(),
        role: core.role(),
        supported_scan_modes: core.supported_scan_modes(),
        activated: core.is_activated(),
        alive: core.is_alive(),
        state: None,
        health: None,
        busy: false,
    };

    if include_non_alive || snapshot.alive {
        match read_hardware(readout) {
            Ok(fields) => {
                snapshot.state = fields.state;
                snapshot.health = fields.health;
                snapshot.busy = fields.busy;
                snapshot.alive = fields.alive;
            }
            Err(err) => {
                warn!(device = %core.display_name(), error = %err, "hardware read failed, reporting offline");
                snapshot.alive = false;
            }
        }
    }

    snapshot.label = snapshot.plain_label();
    if !snapshot.alive {
        if let Some(label) = snapshot.label.as_mut() {
            label.push_str(NOT_ALIVE_MARKER);
        }
        snapshot.state = Some(DeviceState::Offline);
    }
    snapshot
}

impl<M: DeviceModel> DeviceCore<M> {
    /// Snapshot using only what the core itself knows.
    pub fn snapshot(&self, include_non_alive: bool) -> DeviceSnapshot<M> {
        build_snapshot(self, self, include_non_alive)
    }
}
