//! Device lifecycle states and the small enums describing a device's place in a scan.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle state of a runnable device.
///
/// The base device does not restrict which transitions are legal; drivers
/// check their own domain rules. `Offline` is never set by hardware, only by
/// the snapshot builder when a device fails its liveness check.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceState {
    /// Returning to `Ready`.
    Resetting,
    /// Idle, no model applied.
    Ready,
    /// Configured and waiting to run.
    Armed,
    /// Applying a model.
    Configuring,
    /// Acquiring points.
    Running,
    /// Finishing after the last point.
    PostRun,
    /// Run suspended, resumable.
    Paused,
    /// Seeking to an earlier point.
    Rewinding,
    /// Stopping a run.
    Aborting,
    /// Run stopped before completion.
    Aborted,
    /// Hardware reported an error.
    Fault,
    /// Shutting down.
    Disabling,
    /// Shut down until reset.
    Disabled,
    /// Unreachable, reported by snapshots only.
    Offline,
}

impl DeviceState {
    /// Every state, in declaration order.
    pub const ALL: [DeviceState; 14] = [
        DeviceState::Resetting,
        DeviceState::Ready,
        DeviceState::Armed,
        DeviceState::Configuring,
        DeviceState::Running,
        DeviceState::PostRun,
        DeviceState::Paused,
        DeviceState::Rewinding,
        DeviceState::Aborting,
        DeviceState::Aborted,
        DeviceState::Fault,
        DeviceState::Disabling,
        DeviceState::Disabled,
        DeviceState::Offline,
    ];

    /// Upper-case wire name, e.g. `POST_RUN`.
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceState::Resetting => "RESETTING",
            DeviceState::Ready => "READY",
            DeviceState::Armed => "ARMED",
            DeviceState::Configuring => "CONFIGURING",
            DeviceState::Running => "RUNNING",
            DeviceState::PostRun => "POST_RUN",
            DeviceState::Paused => "PAUSED",
            DeviceState::Rewinding => "REWINDING",
            DeviceState::Aborting => "ABORTING",
            DeviceState::Aborted => "ABORTED",
            DeviceState::Fault => "FAULT",
            DeviceState::Disabling => "DISABLING",
            DeviceState::Disabled => "DISABLED",
            DeviceState::Offline => "OFFLINE",
        }
    }

    /// Human-readable label for display.
    pub fn label(&self) -> &'static str {
        match self {
            DeviceState::Resetting => "Resetting",
            DeviceState::Ready => "Ready",
            DeviceState::Armed => "Armed",
            DeviceState::Configuring => "Configuring",
            DeviceState::Running => "Running",
            DeviceState::PostRun => "Post Run",
            DeviceState::Paused => "Paused",
            DeviceState::Rewinding => "Rewinding",
            DeviceState::Aborting => "Aborting",
            DeviceState::Aborted => "Aborted",
            DeviceState::Fault => "Fault",
            DeviceState::Disabling => "Disabling",
            DeviceState::Disabled => "Disabled",
            DeviceState::Offline => "Offline",
        }
    }

    /// A run is in progress, possibly paused.
    pub fn is_running(&self) -> bool {
        matches!(
            self,
            DeviceState::Running | DeviceState::Paused | DeviceState::Rewinding
        )
    }

    /// States in which a device waits for a command rather than doing work.
    pub fn is_rest_state(&self) -> bool {
        matches!(
            self,
            DeviceState::Ready
                | DeviceState::Armed
                | DeviceState::Aborted
                | DeviceState::Fault
                | DeviceState::Disabled
        )
    }

    /// States a device may be in before a run starts.
    pub fn is_before_run(&self) -> bool {
        matches!(
            self,
            DeviceState::Resetting
                | DeviceState::Ready
                | DeviceState::Configuring
                | DeviceState::Armed
        )
    }

    /// Abort, fault or disable has been requested or completed.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DeviceState::Aborting
                | DeviceState::Aborted
                | DeviceState::Fault
                | DeviceState::Disabling
                | DeviceState::Disabled
                | DeviceState::Offline
        )
    }
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceState {
    type Err = String;

    /// Accepts wire names in any case; `-` and space are read as `_`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        DeviceState::ALL
            .iter()
            .copied()
            .find(|state| state.as_str() == normalized)
            .ok_or_else(|| format!("Unknown device state '{s}'"))
    }
}

/// What kind of thing a device is within a scan.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceRole {
    /// A real detector or motor.
    #[default]
    Hardware,
    /// A processing step that runs on CPU only.
    Software,
    /// A composite middleware device driving its own sub-scan.
    Malcolm,
    /// Something that only contributes processing to another device's output.
    Processing,
    /// Any device running as part of a nested scan.
    Virtual,
}

/// How a device's acquisition is triggered during a scan.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanMode {
    /// Each point is triggered by software.
    Software,
    /// The device is triggered by hardware, driven by a master device.
    Hardware,
    /// The device drives the hardware triggers itself.
    Master,
}
