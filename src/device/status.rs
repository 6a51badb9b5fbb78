//! Publishable run status of a single device.
//!
//! A [`ScanStatus`] is owned by exactly one [`DeviceCore`](super::DeviceCore)
//! and only ever mutated under that device's transition lock. Publishers,
//! listeners and snapshot consumers get clones.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::state::DeviceState;

/// A point in a scan: named axis values plus the step index of the point.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Axis name to demand value.
    pub values: BTreeMap<String, f64>,
    /// 0-based index of this point within the scan.
    pub step_index: usize,
}

impl Position {
    /// Create an empty position at `step_index`.
    pub fn new(step_index: usize) -> Self {
        Self {
            values: BTreeMap::new(),
            step_index,
        }
    }

    /// Add an axis value.
    pub fn with_axis(mut self, name: impl Into<String>, value: f64) -> Self {
        self.values.insert(name.into(), value);
        self
    }

    /// Value of one axis.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    /// Axis names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, (name, value)) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name}={value}")?;
        }
        write!(f, "] (step {})", self.step_index)
    }
}

/// Mutable, publishable snapshot of one device's run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanStatus {
    /// Name of the owning device.
    pub device_name: Option<String>,
    /// Scan this status belongs to, if any.
    pub scan_id: Option<String>,
    /// Current lifecycle state.
    pub state: Option<DeviceState>,
    /// State before the last transition or point.
    pub previous_state: Option<DeviceState>,
    /// Host the device runs on.
    pub host_name: Option<String>,
    /// 0-based index of the last completed point.
    pub point_index: usize,
    /// Position of the last completed point.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    /// 0 to 100; unset until the scan size is known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percent_complete: Option<f64>,
    /// Progress or reason text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ScanStatus {
    /// Fresh status for `device_name`, stamped with the local host name.
    pub fn new(device_name: Option<String>) -> Self {
        Self {
            device_name,
            host_name: local_host_name(),
            ..Self::default()
        }
    }

    /// Record a lifecycle transition. `previous_state` takes the old `state`.
    pub fn transition(&mut self, state: DeviceState) -> Option<DeviceState> {
        self.previous_state = self.state;
        self.state = Some(state);
        self.previous_state
    }

    /// Record a completed point.
    ///
    /// The progress message is only rewritten while `RUNNING`; a paused or
    /// aborting device keeps whatever message explains why it stopped.
    pub fn record_point(
        &mut self,
        position: &Position,
        point_index: usize,
        total_size: Option<usize>,
    ) {
        self.point_index = point_index;
        self.position = Some(position.clone());
        self.previous_state = self.state;
        if let Some(size) = total_size.filter(|size| *size > 0) {
            self.percent_complete = Some(percent_complete(point_index, size));
        }
        if self.state == Some(DeviceState::Running) {
            self.message = Some(progress_message(point_index, total_size));
        }
    }
}

/// Percentage of the scan done once point `point_index` (0-based) completes.
///
/// Capped at 100 when a driver reports points past the declared size.
pub fn percent_complete(point_index: usize, total_size: usize) -> f64 {
    (((point_index + 1) as f64 / total_size as f64) * 100.0).min(100.0)
}

fn progress_message(point_index: usize, total_size: Option<usize>) -> String {
    match total_size {
        Some(size) => format!("Point {} of {}", point_index + 1, size),
        None => format!("Point {}", point_index + 1),
    }
}

fn local_host_name() -> Option<String> {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_tracks_previous_state() {
        let mut status = ScanStatus::new(Some("det1".into()));
        assert_eq!(status.transition(DeviceState::Ready), None);
        assert_eq!(status.transition(DeviceState::Armed), Some(DeviceState::Ready));
        assert_eq!(status.state, Some(DeviceState::Armed));
        assert_eq!(status.previous_state, Some(DeviceState::Ready));
    }

    #[test]
    fn test_record_point_while_running() {
        let mut status = ScanStatus::new(Some("det1".into()));
        status.transition(DeviceState::Running);
        status.record_point(&Position::new(4).with_axis("x", 1.5), 4, Some(10));

        assert_eq!(status.percent_complete, Some(50.0));
        assert_eq!(status.message.as_deref(), Some("Point 5 of 10"));
        assert_eq!(status.point_index, 4);
        assert_eq!(status.previous_state, Some(DeviceState::Running));
    }

    #[test]
    fn test_record_point_keeps_message_when_paused() {
        let mut status = ScanStatus::new(None);
        status.transition(DeviceState::Paused);
        status.message = Some("Paused by user".into());
        status.record_point(&Position::new(2), 2, Some(4));

        assert_eq!(status.message.as_deref(), Some("Paused by user"));
        assert_eq!(status.percent_complete, Some(75.0));
    }

    #[test]
    fn test_unknown_size_leaves_percent_unset() {
        let mut status = ScanStatus::new(None);
        status.transition(DeviceState::Running);
        status.record_point(&Position::new(0), 0, None);
        assert_eq!(status.percent_complete, None);
        assert_eq!(status.message.as_deref(), Some("Point 1"));

        status.record_point(&Position::new(1), 1, Some(0));
        assert_eq!(status.percent_complete, None);
    }

    #[test]
    fn test_percent_never_exceeds_hundred() {
        let mut status = ScanStatus::new(None);
        status.transition(DeviceState::Running);
        status.record_point(&Position::new(9), 9, Some(10));
        assert_eq!(status.percent_complete, Some(100.0));

        status.record_point(&Position::new(10), 10, Some(10));
        assert_eq!(status.percent_complete, Some(100.0));
        assert_eq!(percent_complete(25, 10), 100.0);
        assert_eq!(percent_complete(0, 4), 25.0);
    }

    #[test]
    fn test_position_display() {
        let pos = Position::new(3).with_axis("y", 2.0).with_axis("x", 1.0);
        assert_eq!(pos.to_string(), "[x=1, y=2] (step 3)");
        assert_eq!(pos.names().collect::<Vec<_>>(), vec!["x", "y"]);
    }
}
