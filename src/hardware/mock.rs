//! Mock Hardware Implementations
//!
//! Simulated devices for exercising the device core without physical
//! hardware. All waits use `tokio::time::sleep` and race the caller's
//! cancellation token.
//!
//! # Available Mocks
//!
//! - `MockDetector` - Detector that walks a fixed number of points, with
//!   pause/resume/seek/abort and a switchable liveness check.
//!
//! # Timing
//!
//! - Point time: the model's exposure time, capped at 50ms
//! - Pause/resume/seek/abort: 10ms simulated hardware round trip

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::device::{
    DetectorModel, DeviceCore, DeviceDriver, DeviceState, Position,
};
use crate::error::{DeviceError, DeviceResult};

const MAX_POINT_TIME: Duration = Duration::from_millis(50);
const PAUSE_POLL: Duration = Duration::from_millis(5);

// =============================================================================
// MockDetector - Simulated Detector
// =============================================================================

/// Mock detector with a scripted run
///
/// Simulates a detector that:
/// - Goes CONFIGURING -> ARMED on configure
/// - Walks `points` points on run, reporting each through `position_complete`
/// - Honors pause/resume/seek/abort between points
/// - Can be made unreachable to test liveness gating
///
/// # Example
///
/// ```rust,ignore
/// let device = RunnableDevice::new("det1", MockDetector::new(10));
/// device.configure(DetectorModel::new("det1", 0.001)).await?;
/// device.run(None, &CancellationToken::new()).await?;
/// assert_eq!(device.device_state(), Some(DeviceState::Armed));
/// ```
pub struct MockDetector {
    points: usize,
    hardware_delay: Duration,
    next_step: AtomicUsize,
    paused: AtomicBool,
    aborted: AtomicBool,
    reachable: AtomicBool,
    health: RwLock<String>,
}

impl MockDetector {
    /// Create a mock detector scanning `points` points.
    pub fn new(points: usize) -> Self {
        Self::with_hardware_delay(points, Duration::from_millis(10))
    }

    /// Create a mock detector with a custom pause/resume/seek/abort delay.
    pub fn with_hardware_delay(points: usize, hardware_delay: Duration) -> Self {
        Self {
            points,
            hardware_delay,
            next_step: AtomicUsize::new(0),
            paused: AtomicBool::new(false),
            aborted: AtomicBool::new(false),
            reachable: AtomicBool::new(true),
            health: RwLock::new("OK".to_string()),
        }
    }

    /// Points per run.
    pub fn points(&self) -> usize {
        self.points
    }

    /// Step the next run iteration will acquire.
    pub fn next_step(&self) -> usize {
        self.next_step.load(Ordering::Acquire)
    }

    /// Simulate the device dropping off (or coming back onto) the network.
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::Release);
    }

    /// Health text reported to snapshots.
    pub fn set_health(&self, health: impl Into<String>) {
        *self.health.write() = health.into();
    }

    fn check_reachable(&self) -> Result<()> {
        if self.reachable.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(anyhow!("MockDetector: hardware not reachable"))
        }
    }

    /// Simulated hardware round trip.
    async fn hardware_wait(
        &self,
        core: &DeviceCore<DetectorModel>,
        operation: &str,
        delay: Duration,
        cancel: &CancellationToken,
    ) -> Result<()> {
        tokio::select! {
            _ = cancel.cancelled() => Err(anyhow::Error::new(DeviceError::Cancelled {
                device: core.display_name(),
                operation: operation.to_string(),
            })),
            _ = sleep(delay) => Ok(()),
        }
    }

    async fn wait_while_paused(
        &self,
        core: &DeviceCore<DetectorModel>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        while self.paused.load(Ordering::Acquire) && !self.aborted.load(Ordering::Acquire) {
            self.hardware_wait(core, "run", PAUSE_POLL, cancel).await?;
        }
        Ok(())
    }

    fn point_time(core: &DeviceCore<DetectorModel>) -> Duration {
        core.model()
            .map(|m| Duration::from_secs_f64(m.exposure_time.max(0.0)))
            .unwrap_or(Duration::ZERO)
            .min(MAX_POINT_TIME)
    }
}

impl Default for MockDetector {
    fn default() -> Self {
        Self::new(10)
    }
}

#[async_trait]
impl DeviceDriver for MockDetector {
    type Model = DetectorModel;

    fn validate(&self, _core: &DeviceCore<DetectorModel>, model: &DetectorModel) -> DeviceResult<()> {
        if let Some(timeout) = model.timeout {
            if timeout < model.exposure_time {
                return Err(DeviceError::validation(
                    "timeout must not be shorter than the exposure time",
                    model,
                    "timeout",
                ));
            }
        }
        Ok(())
    }

    async fn configure(&self, core: &DeviceCore<DetectorModel>, model: &DetectorModel) -> Result<()> {
        self.check_reachable()?;
        core.set_device_state(DeviceState::Configuring)?;
        debug!(device = %core.display_name(), exposure = model.exposure_time, "MockDetector: configuring");
        self.next_step.store(0, Ordering::Release);
        self.aborted.store(false, Ordering::Release);
        self.paused.store(false, Ordering::Release);
        Ok(())
    }

    async fn run(
        &self,
        core: &DeviceCore<DetectorModel>,
        _position: Option<&Position>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.check_reachable()?;
        self.aborted.store(false, Ordering::Release);
        core.set_device_state(DeviceState::Running)?;

        let point_time = Self::point_time(core);
        loop {
            self.wait_while_paused(core, cancel).await?;
            if self.aborted.load(Ordering::Acquire) {
                debug!(device = %core.display_name(), "MockDetector: run aborted");
                return Ok(());
            }

            let step = self.next_step.load(Ordering::Acquire);
            if step >= self.points {
                break;
            }

            self.hardware_wait(core, "run", point_time, cancel).await?;
            let position = Position::new(step).with_axis("x", step as f64);
            core.position_complete(&position, step, Some(self.points))?;
            // A seek during the exposure wins over the natural next step.
            let _ = self.next_step.compare_exchange(
                step,
                step + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            );
        }

        core.set_device_state(DeviceState::PostRun)?;
        self.next_step.store(0, Ordering::Release);
        core.set_device_state(DeviceState::Armed)?;
        Ok(())
    }

    async fn abort(&self, core: &DeviceCore<DetectorModel>, cancel: &CancellationToken) -> Result<()> {
        core.set_device_state(DeviceState::Aborting)?;
        self.aborted.store(true, Ordering::Release);
        self.hardware_wait(core, "abort", self.hardware_delay, cancel).await?;
        self.paused.store(false, Ordering::Release);
        core.set_device_state(DeviceState::Aborted)?;
        Ok(())
    }

    async fn disable(&self, core: &DeviceCore<DetectorModel>) -> Result<()> {
        core.set_device_state(DeviceState::Disabling)?;
        self.aborted.store(true, Ordering::Release);
        core.set_device_state(DeviceState::Disabled)?;
        Ok(())
    }

    async fn pause(&self, core: &DeviceCore<DetectorModel>, cancel: &CancellationToken) -> Result<()> {
        self.check_reachable()?;
        self.hardware_wait(core, "pause", self.hardware_delay, cancel).await?;
        self.paused.store(true, Ordering::Release);
        core.set_device_state(DeviceState::Paused)?;
        Ok(())
    }

    async fn resume(&self, core: &DeviceCore<DetectorModel>, cancel: &CancellationToken) -> Result<()> {
        self.check_reachable()?;
        self.hardware_wait(core, "resume", self.hardware_delay, cancel).await?;
        core.set_device_state(DeviceState::Running)?;
        self.paused.store(false, Ordering::Release);
        Ok(())
    }

    async fn seek(
        &self,
        core: &DeviceCore<DetectorModel>,
        step: usize,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if step >= self.points {
            return Err(anyhow!(
                "MockDetector: cannot seek to step {} of {}",
                step,
                self.points
            ));
        }
        self.hardware_wait(core, "seek", self.hardware_delay, cancel).await?;
        self.next_step.store(step, Ordering::Release);
        debug!(device = %core.display_name(), step, "MockDetector: seek complete");
        Ok(())
    }

    fn device_state(&self, core: &DeviceCore<DetectorModel>) -> Result<Option<DeviceState>> {
        self.check_reachable()?;
        Ok(core.device_state())
    }

    fn device_health(&self, _core: &DeviceCore<DetectorModel>) -> Result<Option<String>> {
        self.check_reachable()?;
        Ok(Some(self.health.read().clone()))
    }

    fn is_alive(&self, core: &DeviceCore<DetectorModel>) -> Result<bool> {
        Ok(self.reachable.load(Ordering::Acquire) && core.is_alive())
    }
}

// =============================================================================
// Tests
// =============================================================================
