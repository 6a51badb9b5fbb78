//! Runnable devices.
//!
//! A runnable device is split in two:
//!
//! - [`DeviceCore`] holds everything common to all devices: model, flags,
//!   scan status, listeners and publisher. It is the only place state changes.
//! - A [`DeviceDriver`] supplies the device-specific parts: extra validation,
//!   hardware configuration, and the `run`/`abort`/`pause`/`resume`/`seek`
//!   hooks. Every hook has a no-op default.
//!
//! [`RunnableDevice`] glues the two together and is what callers use. It
//! enforces the rules a driver could otherwise get wrong:
//!
//! - base validation always runs before the driver's own checks;
//! - long-running hooks race the caller's [`CancellationToken`] and report
//!   [`DeviceError::Cancelled`] when it fires;
//! - any other hook failure is returned as [`DeviceError::Fault`] naming
//!   the device.
//!
//! # Example
//!
//! ```rust,ignore
//! let device = RunnableDevice::new("det1", MockDetector::new(10));
//! device.configure(DetectorModel::new("det1", 0.1)).await?;
//! device.run(None, &CancellationToken::new()).await?;
//! ```

pub mod core;
pub mod listeners;
pub mod model;
pub mod registry;
pub mod snapshot;
pub mod state;
pub mod status;

pub use self::core::{DeviceCore, RunMetrics};
pub use listeners::{
    ListenerRegistry, PositionEvent, PositionListener, RunEvent, RunListener,
};
pub use model::{validate_model, DetectorModel, DeviceModel, ExposureModel, Nameable, ScannableModel};
pub use registry::{DeviceHandle, DeviceRegistry, DeviceService};
pub use snapshot::{build_snapshot, HardwareReadout, DeviceSnapshot, NOT_ALIVE_MARKER};
pub use state::{DeviceRole, DeviceState, ScanMode};
pub use status::{Position, ScanStatus};

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::future::Future;
use std::ops::Deref;
use std::sync::Arc;
use std::time::Instant;
pub use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::DeviceConfig;
use crate::error::{DeviceError, DeviceResult};

/// Device-specific behaviour plugged into a [`RunnableDevice`].
///
/// Hooks receive the device core so they can drive state through
/// [`DeviceCore::set_device_state`] and report progress through
/// [`DeviceCore::position_complete`]. Long-running hooks should also watch
/// `cancel`, although the device stops awaiting them as soon as it fires.
#[async_trait]
pub trait DeviceDriver: Send + Sync + 'static {
    /// Configuration the driver accepts.
    type Model: DeviceModel;

    /// Extra validation, run after the base capability checks pass.
    fn validate(&self, _core: &DeviceCore<Self::Model>, _model: &Self::Model) -> DeviceResult<()> {
        Ok(())
    }

    /// Push a validated model to the hardware before the device is armed.
    async fn configure(&self, _core: &DeviceCore<Self::Model>, _model: &Self::Model) -> Result<()> {
        Ok(())
    }

    /// Acquire the scan. Return once the last point is reported.
    async fn run(
        &self,
        _core: &DeviceCore<Self::Model>,
        _position: Option<&Position>,
        _cancel: &CancellationToken,
    ) -> Result<()> {
        Ok(())
    }

    /// Stop a run in progress.
    async fn abort(&self, _core: &DeviceCore<Self::Model>, _cancel: &CancellationToken) -> Result<()> {
        Ok(())
    }

    /// Shut the hardware down.
    async fn disable(&self, _core: &DeviceCore<Self::Model>) -> Result<()> {
        Ok(())
    }

    /// Suspend a run between points.
    async fn pause(&self, _core: &DeviceCore<Self::Model>, _cancel: &CancellationToken) -> Result<()> {
        Ok(())
    }

    /// Continue a paused run.
    async fn resume(&self, _core: &DeviceCore<Self::Model>, _cancel: &CancellationToken) -> Result<()> {
        Ok(())
    }

    /// Move a paused run to `step`.
    async fn seek(
        &self,
        _core: &DeviceCore<Self::Model>,
        _step: usize,
        _cancel: &CancellationToken,
    ) -> Result<()> {
        Ok(())
    }

    /// State as reported by the hardware.
    fn device_state(&self, core: &DeviceCore<Self::Model>) -> Result<Option<DeviceState>> {
        Ok(core.device_state())
    }

    /// Health string, for devices that report one.
    fn device_health(&self, _core: &DeviceCore<Self::Model>) -> Result<Option<String>> {
        Ok(None)
    }

    /// Busy flag as reported by the hardware.
    fn is_device_busy(&self, core: &DeviceCore<Self::Model>) -> Result<bool> {
        Ok(core.is_busy())
    }

    /// Liveness check; failing counts as not alive.
    fn is_alive(&self, core: &DeviceCore<Self::Model>) -> Result<bool> {
        Ok(core.is_alive())
    }
}

/// Await `future` unless `cancel` fires first.
///
/// Cancellation wins ties, and errors the future itself raises keep their
/// own classification via [`DeviceError::fault`].
pub async fn cancellable<T, F>(
    device: &str,
    operation: &str,
    cancel: &CancellationToken,
    future: F,
) -> DeviceResult<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(DeviceError::Cancelled {
            device: device.to_string(),
            operation: operation.to_string(),
        }),
        result = future => result.map_err(|e| DeviceError::fault(device, e)),
    }
}

struct DriverReadout<'a, D: DeviceDriver> {
    core: &'a DeviceCore<D::Model>,
    driver: &'a D,
}

impl<D: DeviceDriver> HardwareReadout for DriverReadout<'_, D> {
    fn read_state(&self) -> Result<Option<DeviceState>> {
        self.driver.device_state(self.core)
    }

    fn read_health(&self) -> Result<Option<String>> {
        self.driver.device_health(self.core)
    }

    fn read_busy(&self) -> Result<bool> {
        self.driver.is_device_busy(self.core)
    }

    fn read_alive(&self) -> Result<bool> {
        self.driver.is_alive(self.core)
    }
}

/// A device core paired with its driver.
///
/// Dereferences to [`DeviceCore`] for attributes, flags, listeners and
/// state queries.
pub struct RunnableDevice<D: DeviceDriver> {
    core: DeviceCore<D::Model>,
    driver: D,
    service: RwLock<Option<Arc<dyn DeviceService>>>,
}

impl<D: DeviceDriver> Deref for RunnableDevice<D> {
    type Target = DeviceCore<D::Model>;

    fn deref(&self) -> &Self::Target {
        &self.core
    }
}

impl<D: DeviceDriver> std::fmt::Debug for RunnableDevice<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunnableDevice")
            .field("core", &self.core)
            .field("driver", &std::any::type_name::<D>())
            .finish()
    }
}

impl<D: DeviceDriver> RunnableDevice<D> {
    /// Device called `name` with default flags.
    pub fn new(name: impl Into<String>, driver: D) -> Self {
        Self::with_core(DeviceCore::new(name), driver)
    }

    /// Device built from a settings entry.
    pub fn from_config(config: &DeviceConfig, driver: D) -> Self {
        Self::with_core(DeviceCore::from_config(config), driver)
    }

    /// Wrap an existing core.
    pub fn with_core(core: DeviceCore<D::Model>, driver: D) -> Self {
        Self {
            core,
            driver,
            service: RwLock::new(None),
        }
    }

    /// The shared device state.
    pub fn core(&self) -> &DeviceCore<D::Model> {
        &self.core
    }

    /// The device-specific driver.
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Base validation, then the driver's own checks.
    pub fn validate(&self, model: &D::Model) -> DeviceResult<()> {
        self.core.validate(model)?;
        self.driver.validate(&self.core, model)
    }

    /// Validate `model`, hand it to the driver, store it and arm.
    ///
    /// A rejected model leaves state and the stored model untouched.
    pub async fn configure(&self, model: D::Model) -> DeviceResult<()> {
        self.validate(&model)?;

        let started = Instant::now();
        self.driver
            .configure(&self.core, &model)
            .await
            .map_err(|e| DeviceError::fault(self.core.display_name(), e))?;
        self.core.arm_with(model)?;
        self.core.set_configure_time(started.elapsed());
        debug!(device = %self.core.display_name(), elapsed = ?started.elapsed(), "configured");
        Ok(())
    }

    /// Return to `READY`. See [`DeviceCore::reset`].
    pub fn reset(&self) -> DeviceResult<()> {
        self.core.reset()
    }

    /// Run the driver, bracketed by `run_will_perform` / `run_performed`.
    ///
    /// The busy flag is held for the duration and cleared even on failure.
    pub async fn run(
        &self,
        position: Option<&Position>,
        cancel: &CancellationToken,
    ) -> DeviceResult<()> {
        let name = self.core.display_name();
        self.core.set_busy(true);
        let result = async {
            self.core.fire_run_will_perform(position)?;
            cancellable(&name, "run", cancel, self.driver.run(&self.core, position, cancel)).await?;
            self.core.fire_run_performed(position)
        }
        .await;
        self.core.set_busy(false);
        result
    }

    /// Abort through the driver, racing `cancel`.
    pub async fn abort(&self, cancel: &CancellationToken) -> DeviceResult<()> {
        let name = self.core.display_name();
        cancellable(&name, "abort", cancel, self.driver.abort(&self.core, cancel)).await
    }

    /// Disable through the driver. Not cancellable.
    pub async fn disable(&self) -> DeviceResult<()> {
        self.driver
            .disable(&self.core)
            .await
            .map_err(|e| DeviceError::fault(self.core.display_name(), e))
    }

    /// Pause through the driver, racing `cancel`.
    pub async fn pause(&self, cancel: &CancellationToken) -> DeviceResult<()> {
        let name = self.core.display_name();
        cancellable(&name, "pause", cancel, self.driver.pause(&self.core, cancel)).await
    }

    /// Resume through the driver, racing `cancel`.
    pub async fn resume(&self, cancel: &CancellationToken) -> DeviceResult<()> {
        let name = self.core.display_name();
        cancellable(&name, "resume", cancel, self.driver.resume(&self.core, cancel)).await
    }

    /// Seek to `step` through the driver, racing `cancel`.
    pub async fn seek(&self, step: usize, cancel: &CancellationToken) -> DeviceResult<()> {
        let name = self.core.display_name();
        cancellable(&name, "seek", cancel, self.driver.seek(&self.core, step, cancel)).await
    }

    /// Introspection snapshot; hardware fields come from the driver.
    pub fn device_snapshot(&self, include_non_alive: bool) -> DeviceSnapshot<D::Model> {
        let readout = DriverReadout {
            core: &self.core,
            driver: &self.driver,
        };
        build_snapshot(&self.core, &readout, include_non_alive)
    }

    /// Snapshot without forcing hardware reads on a device believed dead.
    pub fn device_information(&self) -> DeviceSnapshot<D::Model> {
        self.device_snapshot(false)
    }

    /// Inject the service `register` uses.
    pub fn set_service(&self, service: Option<Arc<dyn DeviceService>>) {
        *self.service.write() = service;
    }

    /// The injected device service.
    pub fn service(&self) -> Option<Arc<dyn DeviceService>> {
        self.service.read().clone()
    }

    /// Register with the injected device service.
    ///
    /// Fails with [`DeviceError::Configuration`] if no service was injected.
    pub fn register(self: &Arc<Self>) -> DeviceResult<()> {
        let service = self.service().ok_or_else(|| {
            DeviceError::Configuration(format!(
                "Unable to register '{}' because no device service was injected",
                self.core.display_name()
            ))
        })?;
        service.register(self.clone())?;
        info!(device = %self.core.display_name(), "registered device");
        Ok(())
    }
}

impl<D: DeviceDriver> DeviceHandle for RunnableDevice<D> {
    fn name(&self) -> Option<String> {
        self.core.name()
    }

    fn level(&self) -> i32 {
        self.core.level()
    }

    fn device_state(&self) -> Option<DeviceState> {
        self.core.device_state()
    }

    fn set_busy(&self, busy: bool) {
        self.core.set_busy(busy);
    }

    fn status(&self) -> Option<ScanStatus> {
        self.core.status()
    }

    fn snapshot_json(&self, include_non_alive: bool) -> DeviceSnapshot<serde_json::Value> {
        self.device_snapshot(include_non_alive)
            .map_model(|model| serde_json::to_value(model).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::time::Duration;

    struct Picky;

    #[async_trait]
    impl DeviceDriver for Picky {
        type Model = DetectorModel;

        fn validate(&self, _core: &DeviceCore<DetectorModel>, model: &DetectorModel) -> DeviceResult<()> {
            if model.exposure_time > 10.0 {
                return Err(DeviceError::validation("exposure too long", model, "exposure_time"));
            }
            Ok(())
        }

        async fn disable(&self, _core: &DeviceCore<DetectorModel>) -> Result<()> {
            Err(anyhow!("shutter stuck"))
        }

        async fn pause(&self, _core: &DeviceCore<DetectorModel>, _cancel: &CancellationToken) -> Result<()> {
            // Ignores the token on purpose; the device must still give up.
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_validation_is_chained() {
        let device = RunnableDevice::new("det1", Picky);

        let err = device.configure(DetectorModel::new("", 20.0)).await.unwrap_err();
        assert_eq!(err.field(), Some("name"));

        let err = device.configure(DetectorModel::new("det1", 20.0)).await.unwrap_err();
        assert!(err.to_string().contains("exposure too long"));
        assert_eq!(device.device_state(), None);
        assert!(device.model().is_none());

        device.configure(DetectorModel::new("det1", 1.0)).await.unwrap();
        assert_eq!(device.device_state(), Some(DeviceState::Armed));
        assert!(device.configure_time().is_some());
    }

    #[tokio::test]
    async fn test_hook_errors_carry_device_identity() {
        let device = RunnableDevice::new("det1", Picky);
        match device.disable().await.unwrap_err() {
            DeviceError::Fault { device, source } => {
                assert_eq!(device, "det1");
                assert_eq!(source.to_string(), "shutter stuck");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cancellation_interrupts_uncooperative_hook() {
        let device = RunnableDevice::new("det1", Picky);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = tokio::time::timeout(Duration::from_secs(5), device.pause(&cancel))
            .await
            .expect("pause should give up once cancelled")
            .unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn test_base_hooks_are_noops() {
        let device = RunnableDevice::new("stage", Picky);
        let cancel = CancellationToken::new();
        device.abort(&cancel).await.unwrap();
        device.resume(&cancel).await.unwrap();
        device.seek(3, &cancel).await.unwrap();
        assert_eq!(device.device_state(), None);
    }

    #[tokio::test]
    async fn test_run_clears_busy() {
        let device = RunnableDevice::new("det1", Picky);
        device.run(None, &CancellationToken::new()).await.unwrap();
        assert!(!device.is_busy());

        let cancelled = CancellationToken::new();
        cancelled.cancel();
        assert!(device.run(None, &cancelled).await.unwrap_err().is_cancelled());
        assert!(!device.is_busy());
    }

    #[test]
    fn test_register_requires_service() {
        let device = Arc::new(RunnableDevice::new("det1", Picky));
        let err = device.register().unwrap_err();
        assert!(matches!(err, DeviceError::Configuration(_)));
        assert!(err.to_string().contains("no device service"));
    }
}
