//! The device aggregate root.
//!
//! [`DeviceCore`] owns everything a runnable device knows about itself: its
//! model, attributes, flags, scan attributes, listeners and [`ScanStatus`].
//! Drivers never touch the status directly. All lifecycle changes go through
//! [`DeviceCore::set_device_state`] and per-point progress through
//! [`DeviceCore::position_complete`]; both run under one per-device
//! transition lock, so `previous_state` always trails `state` by exactly one
//! mutation.
//!
//! # Locking
//!
//! ```text
//! transition (ReentrantMutex)   held for the whole mutate -> fire -> broadcast sequence
//!   └── status (Mutex)          held only while mutating or cloning the status
//! ```
//!
//! The transition lock is reentrant so a listener may drive the same device
//! from inside its callback. Snapshot queries only take the status mutex
//! briefly and never wait for listeners or the publisher.

use parking_lot::{Mutex, ReentrantMutex, RwLock};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::listeners::{
    ListenerRegistry, PositionEvent, PositionListener, RunEvent, RunListener,
};
use super::model::{validate_model, DeviceModel};
use super::state::{DeviceRole, DeviceState, ScanMode};
use super::status::{Position, ScanStatus};
use crate::config::DeviceConfig;
use crate::error::{DeviceError, DeviceResult};
use crate::publisher::Publisher;

/// Descriptive attributes of a device. Changed rarely, read often.
#[derive(Clone, Debug)]
struct DeviceAttributes {
    name: Option<String>,
    label: Option<String>,
    level: i32,
    role: DeviceRole,
    supported_scan_modes: BTreeSet<ScanMode>,
    scan_id: String,
    configure_time: Option<Duration>,
}

impl Default for DeviceAttributes {
    fn default() -> Self {
        Self {
            name: None,
            label: None,
            level: 1,
            role: DeviceRole::Hardware,
            supported_scan_modes: BTreeSet::from([ScanMode::Software]),
            scan_id: Uuid::new_v4().to_string(),
            configure_time: None,
        }
    }
}

/// Point timing collected while metrics are enabled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunMetrics {
    /// Number of point-to-point intervals measured.
    pub points_timed: u64,
    /// Sum of all measured intervals.
    pub total_point_time: Duration,
}

impl RunMetrics {
    /// Mean interval between points, once any were timed.
    pub fn average_point_time(&self) -> Option<Duration> {
        u32::try_from(self.points_timed)
            .ok()
            .filter(|n| *n > 0)
            .map(|n| self.total_point_time / n)
    }
}

#[derive(Debug, Default)]
struct MetricsState {
    run_started: Option<Instant>,
    last_point: Option<Instant>,
    metrics: RunMetrics,
}

/// Shared state and behaviour of every runnable device.
pub struct DeviceCore<M: DeviceModel> {
    attributes: RwLock<DeviceAttributes>,
    model: RwLock<Option<M>>,
    status: Mutex<Option<ScanStatus>>,
    /// Bumped on every status mutation.
    revision: AtomicU64,
    transition: ReentrantMutex<()>,
    metrics: Mutex<MetricsState>,
    run_listeners: ListenerRegistry<dyn RunListener>,
    position_listeners: ListenerRegistry<dyn PositionListener>,
    publisher: RwLock<Option<Arc<dyn Publisher>>>,
    scan_attributes: RwLock<HashMap<String, Value>>,
    busy: AtomicBool,
    alive: AtomicBool,
    activated: AtomicBool,
    primary_scan_device: AtomicBool,
    require_metrics: AtomicBool,
}

impl<M: DeviceModel> Default for DeviceCore<M> {
    fn default() -> Self {
        Self {
            attributes: RwLock::new(DeviceAttributes::default()),
            model: RwLock::new(None),
            status: Mutex::new(None),
            revision: AtomicU64::new(0),
            transition: ReentrantMutex::new(()),
            metrics: Mutex::new(MetricsState::default()),
            run_listeners: ListenerRegistry::new(),
            position_listeners: ListenerRegistry::new(),
            publisher: RwLock::new(None),
            scan_attributes: RwLock::new(HashMap::new()),
            busy: AtomicBool::new(false),
            alive: AtomicBool::new(true),
            activated: AtomicBool::new(false),
            primary_scan_device: AtomicBool::new(true),
            require_metrics: AtomicBool::new(false),
        }
    }
}

impl<M: DeviceModel> fmt::Debug for DeviceCore<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceCore")
            .field("name", &self.name())
            .field("state", &self.device_state())
            .field("busy", &self.is_busy())
            .field("alive", &self.is_alive())
            .field("has_publisher", &self.publisher.read().is_some())
            .finish()
    }
}

impl<M: DeviceModel> DeviceCore<M> {
    /// Create a device core with default attributes.
    pub fn new(name: impl Into<String>) -> Self {
        let core = Self::default();
        core.set_name(name);
        core
    }

    /// Create a device core from its configuration entry.
    pub fn from_config(config: &DeviceConfig) -> Self {
        let core = Self::new(config.name.clone());
        {
            let mut attrs = core.attributes.write();
            attrs.label = config.label.clone();
            attrs.level = config.level;
            attrs.role = config.role;
            attrs.supported_scan_modes = config.supported_scan_modes.clone();
        }
        core.set_primary_scan_device(config.primary_scan_device);
        core.set_require_metrics(config.require_metrics);
        core.activated.store(config.activated, Ordering::Release);
        core
    }

    // -------------------------------------------------------------------------
    // Attributes
    // -------------------------------------------------------------------------

    /// Device name.
    pub fn name(&self) -> Option<String> {
        self.attributes.read().name.clone()
    }

    /// Rename the device.
    pub fn set_name(&self, name: impl Into<String>) {
        self.attributes.write().name = Some(name.into());
    }

    /// Name used to attribute errors and log lines.
    pub fn display_name(&self) -> String {
        self.name().unwrap_or_else(|| "<unnamed>".to_string())
    }

    /// Display label, if set.
    pub fn label(&self) -> Option<String> {
        self.attributes.read().label.clone()
    }

    /// Set the display label.
    pub fn set_label(&self, label: impl Into<String>) {
        self.attributes.write().label = Some(label.into());
    }

    /// Ordering priority; lower levels run first.
    pub fn level(&self) -> i32 {
        self.attributes.read().level
    }

    /// Set the ordering level.
    pub fn set_level(&self, level: i32) {
        self.attributes.write().level = level;
    }

    /// Role within a scan.
    pub fn role(&self) -> DeviceRole {
        self.attributes.read().role
    }

    /// Set the role.
    pub fn set_role(&self, role: DeviceRole) {
        self.attributes.write().role = role;
    }

    /// Scan modes the device accepts.
    pub fn supported_scan_modes(&self) -> BTreeSet<ScanMode> {
        self.attributes.read().supported_scan_modes.clone()
    }

    /// Replace the accepted scan modes.
    pub fn set_supported_scan_modes(&self, modes: impl IntoIterator<Item = ScanMode>) {
        self.attributes.write().supported_scan_modes = modes.into_iter().collect();
    }

    /// Accept exactly one scan mode.
    pub fn set_supported_scan_mode(&self, mode: ScanMode) {
        self.set_supported_scan_modes([mode]);
    }

    /// Identifier of the current scan; a fresh UUID until set.
    pub fn scan_id(&self) -> String {
        self.attributes.read().scan_id.clone()
    }

    /// Set the scan identifier.
    pub fn set_scan_id(&self, scan_id: impl Into<String>) {
        self.attributes.write().scan_id = scan_id.into();
    }

    /// Time the last `configure` took, if recorded.
    pub fn configure_time(&self) -> Option<Duration> {
        self.attributes.read().configure_time
    }

    /// Record how long `configure` took.
    pub fn set_configure_time(&self, time: Duration) {
        self.attributes.write().configure_time = Some(time);
    }

    // -------------------------------------------------------------------------
    // Flags
    // -------------------------------------------------------------------------

    /// Busy flag.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Set by whoever drives the scan; devices need not manage it themselves.
    pub fn set_busy(&self, busy: bool) {
        self.busy.store(busy, Ordering::Release);
    }

    /// Whether the device is on and responding.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Mark the device alive or dead.
    pub fn set_alive(&self, alive: bool) {
        self.alive.store(alive, Ordering::Release);
    }

    /// Whether the device is selected for the next scan.
    pub fn is_activated(&self) -> bool {
        self.activated.load(Ordering::Acquire)
    }

    /// Returns the previous activation value.
    pub fn set_activated(&self, activated: bool) -> bool {
        let was = self.activated.swap(activated, Ordering::AcqRel);
        info!(
            device = %self.display_name(),
            "set_activated({}) was {}",
            activated,
            was
        );
        was
    }

    /// Whether this device owns its scan status.
    pub fn is_primary_scan_device(&self) -> bool {
        self.primary_scan_device.load(Ordering::Acquire)
    }

    /// Nested devices are not primary; their state stays out of the scan status.
    pub fn set_primary_scan_device(&self, primary: bool) {
        self.primary_scan_device.store(primary, Ordering::Release);
    }

    /// Whether points are timed and run totals logged.
    pub fn is_require_metrics(&self) -> bool {
        self.require_metrics.load(Ordering::Acquire)
    }

    /// Turn point timing on or off.
    pub fn set_require_metrics(&self, require: bool) {
        self.require_metrics.store(require, Ordering::Release);
    }

    // -------------------------------------------------------------------------
    // Model
    // -------------------------------------------------------------------------

    /// Copy of the applied model.
    pub fn model(&self) -> Option<M> {
        self.model.read().clone()
    }

    /// Replace the model without touching state.
    pub fn set_model(&self, model: M) {
        *self.model.write() = Some(model);
    }

    /// Checks every capability the model declares.
    pub fn validate(&self, model: &M) -> DeviceResult<()> {
        validate_model(self.name().as_deref(), model)
    }

    /// Store an already validated model and move to `ARMED`.
    pub fn arm_with(&self, model: M) -> DeviceResult<()> {
        self.set_model(model);
        self.set_device_state(DeviceState::Armed)
    }

    /// Move to `READY`.
    pub fn reset(&self) -> DeviceResult<()> {
        self.set_device_state(DeviceState::Ready)
    }

    // -------------------------------------------------------------------------
    // Publisher
    // -------------------------------------------------------------------------

    /// The shared status publisher, if any.
    pub fn publisher(&self) -> Option<Arc<dyn Publisher>> {
        self.publisher.read().clone()
    }

    /// Attach or detach a publisher. Statuses are only tracked locally without one.
    pub fn set_publisher(&self, publisher: Option<Arc<dyn Publisher>>) {
        *self.publisher.write() = publisher;
    }

    fn publish(&self, status: &ScanStatus) -> DeviceResult<()> {
        let Some(publisher) = self.publisher() else {
            return Ok(());
        };
        publisher.broadcast(status).map_err(|err| {
            warn!(device = %self.display_name(), error = %err, "status broadcast failed");
            DeviceError::Transport(err)
        })
    }

    // -------------------------------------------------------------------------
    // State and progress
    // -------------------------------------------------------------------------

    /// Current lifecycle state, `None` until the first transition.
    pub fn device_state(&self) -> Option<DeviceState> {
        self.status.lock().as_ref().and_then(|s| s.state)
    }

    /// Copy of the current status, `None` until the first transition.
    pub fn status(&self) -> Option<ScanStatus> {
        self.status.lock().clone()
    }

    fn with_status<R>(&self, mutate: impl FnOnce(&mut ScanStatus) -> R) -> (R, ScanStatus, u64) {
        let name = self.name();
        let scan_id = self.scan_id();
        let mut slot = self.status.lock();
        let status = slot.get_or_insert_with(|| ScanStatus::new(name.clone()));
        status.device_name = name;
        status.scan_id = Some(scan_id);
        let out = mutate(status);
        let revision = self.revision.fetch_add(1, Ordering::AcqRel) + 1;
        (out, status.clone(), revision)
    }

    /// The single mutation point for lifecycle state.
    ///
    /// No-op for non-primary devices. Otherwise records the transition, fires
    /// `state_changed` to run listeners and broadcasts the status when a
    /// publisher is attached. The transition is committed before listeners
    /// or the publisher run, so their failures never roll it back.
    ///
    /// A listener that changes this device's status from inside its callback
    /// has already broadcast the newer status, so the outer broadcast is
    /// skipped and subscribers always end on the live state.
    pub fn set_device_state(&self, state: DeviceState) -> DeviceResult<()> {
        if !self.is_primary_scan_device() {
            debug!(device = %self.display_name(), %state, "ignoring state on non-primary device");
            return Ok(());
        }

        let _transition = self.transition.lock();
        let (old, status, revision) = self.with_status(|status| status.transition(state));
        debug!(
            device = %self.display_name(),
            old = ?old,
            new = %state,
            "device state changed"
        );

        self.fire_state_changed(old, state)?;
        if self.revision.load(Ordering::Acquire) != revision {
            debug!(device = %self.display_name(), %state, "status superseded during fan-out");
            return Ok(());
        }
        self.publish(&status)
    }

    /// Record that one scan point finished.
    ///
    /// `point_index` is 0-based; `total_size` is `None` when the scan size is
    /// unknown. Position listeners are told first, then the status is
    /// updated and broadcast.
    pub fn position_complete(
        &self,
        position: &Position,
        point_index: usize,
        total_size: Option<usize>,
    ) -> DeviceResult<()> {
        let _transition = self.transition.lock();

        if self.is_require_metrics() {
            self.time_point(point_index);
        }
        self.fire_position_complete(position)?;

        let ((), status, _) =
            self.with_status(|status| status.record_point(position, point_index, total_size));
        self.publish(&status)
    }

    fn time_point(&self, point_index: usize) {
        let now = Instant::now();
        let mut state = self.metrics.lock();
        if let Some(last) = state.last_point {
            let elapsed = now.duration_since(last);
            info!(
                device = %self.display_name(),
                "Point {} timed at {} ms",
                point_index,
                elapsed.as_millis()
            );
            state.metrics.points_timed += 1;
            state.metrics.total_point_time += elapsed;
        }
        state.last_point = Some(now);
    }

    /// Point timing of the current run.
    pub fn run_metrics(&self) -> RunMetrics {
        self.metrics.lock().metrics
    }

    // -------------------------------------------------------------------------
    // Listeners
    // -------------------------------------------------------------------------

    /// Returns false if `listener` was already added.
    pub fn add_run_listener(&self, listener: Arc<dyn RunListener>) -> bool {
        self.run_listeners.add(listener)
    }

    /// Returns false if `listener` was not registered.
    pub fn remove_run_listener(&self, listener: &Arc<dyn RunListener>) -> bool {
        self.run_listeners.remove(listener)
    }

    /// Returns false if `listener` was already added.
    pub fn add_position_listener(&self, listener: Arc<dyn PositionListener>) -> bool {
        self.position_listeners.add(listener)
    }

    /// Returns false if `listener` was not registered.
    pub fn remove_position_listener(&self, listener: &Arc<dyn PositionListener>) -> bool {
        self.position_listeners.remove(listener)
    }

    fn run_event(
        &self,
        position: Option<&Position>,
        old_state: Option<DeviceState>,
        state: Option<DeviceState>,
    ) -> RunEvent {
        RunEvent {
            device_name: self.name(),
            position: position.cloned(),
            old_state,
            state,
        }
    }

    fn position_event(&self, position: &Position) -> PositionEvent {
        PositionEvent {
            device_name: self.name(),
            position: position.clone(),
        }
    }

    fn attribute(&self, err: anyhow::Error) -> DeviceError {
        DeviceError::fault(self.display_name(), err)
    }

    fn fire_state_changed(&self, old: Option<DeviceState>, new: DeviceState) -> DeviceResult<()> {
        if self.run_listeners.is_empty() {
            return Ok(());
        }
        let event = self.run_event(None, old, Some(new));
        self.run_listeners
            .fire(|l| l.state_changed(&event))
            .map_err(|e| self.attribute(e))
    }

    fn fire_position_complete(&self, position: &Position) -> DeviceResult<()> {
        if self.position_listeners.is_empty() {
            return Ok(());
        }
        let event = self.position_event(position);
        self.position_listeners
            .fire(|l| l.position_performed(&event))
            .map_err(|e| self.attribute(e))
    }

    /// Tell position listeners a move to `position` finished.
    pub fn fire_position_move_complete(&self, position: &Position) -> DeviceResult<()> {
        let event = self.position_event(position);
        self.position_listeners
            .fire(|l| l.position_move_performed(&event))
            .map_err(|e| self.attribute(e))
    }

    /// Start of a run. Resets point timing when metrics are enabled.
    pub fn fire_run_will_perform(&self, position: Option<&Position>) -> DeviceResult<()> {
        if self.is_require_metrics() {
            *self.metrics.lock() = MetricsState {
                run_started: Some(Instant::now()),
                ..MetricsState::default()
            };
        }
        let event = self.run_event(position, None, self.device_state());
        self.run_listeners
            .fire(|l| l.run_will_perform(&event))
            .map_err(|e| self.attribute(e))
    }

    /// End of a run. Logs total and average point time when metrics are enabled.
    pub fn fire_run_performed(&self, position: Option<&Position>) -> DeviceResult<()> {
        if self.is_require_metrics() {
            self.log_run_metrics(position);
        }
        let event = self.run_event(position, None, self.device_state());
        self.run_listeners
            .fire(|l| l.run_performed(&event))
            .map_err(|e| self.attribute(e))
    }

    fn log_run_metrics(&self, position: Option<&Position>) {
        let state = self.metrics.lock();
        let points = position.map_or(0, |p| p.step_index + 1);
        if let Some(started) = state.run_started {
            info!(
                device = %self.display_name(),
                "Ran {} points in total time of {} ms",
                points,
                started.elapsed().as_millis()
            );
        }
        if let Some(average) = state.metrics.average_point_time() {
            info!(
                device = %self.display_name(),
                "Average point time of {} ms/pnt",
                average.as_millis()
            );
        }
    }

    /// Tell run listeners a write is starting.
    pub fn fire_write_will_perform(&self, position: Option<&Position>) -> DeviceResult<()> {
        let event = self.run_event(position, None, self.device_state());
        self.run_listeners
            .fire(|l| l.write_will_perform(&event))
            .map_err(|e| self.attribute(e))
    }

    /// Tell run listeners a write finished.
    pub fn fire_write_performed(&self, position: Option<&Position>) -> DeviceResult<()> {
        let event = self.run_event(position, None, self.device_state());
        self.run_listeners
            .fire(|l| l.write_performed(&event))
            .map_err(|e| self.attribute(e))
    }

    // -------------------------------------------------------------------------
    // Scan attributes
    // -------------------------------------------------------------------------

    /// Store `value` as JSON under `name`, replacing any previous value.
    pub fn set_scan_attribute<T: Serialize>(&self, name: &str, value: T) -> DeviceResult<()> {
        let value = serde_json::to_value(value).map_err(|source| DeviceError::Attribute {
            name: name.to_string(),
            source,
        })?;
        self.scan_attributes.write().insert(name.to_string(), value);
        Ok(())
    }

    /// Raw JSON value of a scan attribute.
    pub fn scan_attribute(&self, name: &str) -> Option<Value> {
        self.scan_attributes.read().get(name).cloned()
    }

    /// Read a scan attribute as `T`. `Ok(None)` if it is not set.
    pub fn scan_attribute_as<T: DeserializeOwned>(&self, name: &str) -> DeviceResult<Option<T>> {
        self.scan_attribute(name)
            .map(|value| {
                serde_json::from_value(value).map_err(|source| DeviceError::Attribute {
                    name: name.to_string(),
                    source,
                })
            })
            .transpose()
    }

    /// Remove a scan attribute, returning its value.
    pub fn remove_scan_attribute(&self, name: &str) -> Option<Value> {
        self.scan_attributes.write().remove(name)
    }

    /// Names of all scan attributes, in no particular order.
    pub fn scan_attribute_names(&self) -> HashSet<String> {
        self.scan_attributes.read().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::model::DetectorModel;
    use crate::error::TransportError;

    struct FailingPublisher;

    impl Publisher for FailingPublisher {
        fn broadcast(&self, _status: &ScanStatus) -> Result<(), TransportError> {
            Err(TransportError::Send("socket closed".into()))
        }
    }

    #[test]
    fn test_state_absent_until_first_transition() {
        let core: DeviceCore<DetectorModel> = DeviceCore::new("det1");
        assert_eq!(core.device_state(), None);
        assert!(core.status().is_none());

        core.reset().unwrap();
        assert_eq!(core.device_state(), Some(DeviceState::Ready));
        let status = core.status().unwrap();
        assert_eq!(status.device_name.as_deref(), Some("det1"));
        assert_eq!(status.scan_id, Some(core.scan_id()));
    }

    #[test]
    fn test_defaults() {
        let core: DeviceCore<()> = DeviceCore::default();
        assert_eq!(core.level(), 1);
        assert_eq!(core.role(), DeviceRole::Hardware);
        assert_eq!(core.supported_scan_modes(), BTreeSet::from([ScanMode::Software]));
        assert!(core.is_primary_scan_device());
        assert!(core.is_alive());
        assert!(!core.is_activated());
        assert!(!core.is_busy());
        assert!(!core.is_require_metrics());
        assert!(Uuid::parse_str(&core.scan_id()).is_ok());
    }

    #[test]
    fn test_broadcast_failure_keeps_committed_state() {
        let core: DeviceCore<()> = DeviceCore::new("det1");
        core.set_publisher(Some(Arc::new(FailingPublisher)));

        let err = core.set_device_state(DeviceState::Running).unwrap_err();
        assert!(matches!(err, DeviceError::Transport(_)));
        assert_eq!(core.device_state(), Some(DeviceState::Running));

        let err = core
            .position_complete(&Position::new(0), 0, Some(2))
            .unwrap_err();
        assert!(matches!(err, DeviceError::Transport(_)));
        assert_eq!(core.status().unwrap().percent_complete, Some(50.0));
    }

    #[test]
    fn test_set_activated_returns_previous() {
        let core: DeviceCore<()> = DeviceCore::new("det1");
        assert!(!core.set_activated(true));
        assert!(core.set_activated(false));
        assert!(!core.is_activated());
    }

    #[test]
    fn test_scan_attributes() {
        let core: DeviceCore<()> = DeviceCore::new("det1");
        core.set_scan_attribute("gain", 2.5).unwrap();
        core.set_scan_attribute("sample", "silicon").unwrap();

        assert_eq!(core.scan_attribute_as::<f64>("gain").unwrap(), Some(2.5));
        assert_eq!(core.scan_attribute("sample"), Some(Value::from("silicon")));
        assert_eq!(core.scan_attribute_as::<f64>("missing").unwrap(), None);
        assert!(core.scan_attribute_as::<f64>("sample").is_err());

        let names = core.scan_attribute_names();
        assert_eq!(names.len(), 2);
        assert!(names.contains("gain") && names.contains("sample"));

        assert!(core.remove_scan_attribute("gain").is_some());
        assert_eq!(core.scan_attribute_names().len(), 1);
    }

    #[test]
    fn test_metrics_accumulate_point_times() {
        let core: DeviceCore<()> = DeviceCore::new("det1");
        core.set_require_metrics(true);
        core.fire_run_will_perform(None).unwrap();

        for i in 0..3 {
            std::thread::sleep(Duration::from_millis(2));
            core.position_complete(&Position::new(i), i, Some(3)).unwrap();
        }

        let metrics = core.run_metrics();
        assert_eq!(metrics.points_timed, 2);
        assert!(metrics.total_point_time >= Duration::from_millis(4));
        assert!(metrics.average_point_time().is_some());

        core.fire_run_will_perform(None).unwrap();
        assert_eq!(core.run_metrics(), RunMetrics::default());
    }

    #[test]
    fn test_metrics_off_by_default() {
        let core: DeviceCore<()> = DeviceCore::new("det1");
        core.position_complete(&Position::new(0), 0, None).unwrap();
        core.position_complete(&Position::new(1), 1, None).unwrap();
        assert_eq!(core.run_metrics().points_timed, 0);
    }

    #[test]
    fn test_from_config() {
        let config = DeviceConfig {
            name: "malcolm".into(),
            label: Some("Malcolm Device".into()),
            level: 5,
            role: DeviceRole::Malcolm,
            supported_scan_modes: BTreeSet::from([ScanMode::Hardware, ScanMode::Master]),
            primary_scan_device: false,
            require_metrics: true,
            activated: true,
        };
        let core: DeviceCore<DetectorModel> = DeviceCore::from_config(&config);

        assert_eq!(core.name().as_deref(), Some("malcolm"));
        assert_eq!(core.label().as_deref(), Some("Malcolm Device"));
        assert_eq!(core.level(), 5);
        assert_eq!(core.role(), DeviceRole::Malcolm);
        assert!(core.supported_scan_modes().contains(&ScanMode::Master));
        assert!(!core.is_primary_scan_device());
        assert!(core.is_require_metrics());
        assert!(core.is_activated());
    }
}
