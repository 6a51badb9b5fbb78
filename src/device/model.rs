//! Device models and capability-based validation.
//!
//! A model is the opaque, device-specific configuration handed to
//! `configure`. Instead of inspecting its concrete type, the base validator
//! asks the model which capabilities it declares and checks each one:
//!
//! - [`Nameable`]: the name must be set and non-empty.
//! - [`ExposureModel`]: the exposure time must be positive.
//!
//! Models declaring none of these pass base validation; drivers add their own
//! checks on top via [`DeviceDriver::validate`](super::DeviceDriver::validate).

use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use crate::error::{DeviceError, DeviceResult};

/// A model that carries a name.
pub trait Nameable {
    /// The model's name; `None` or empty fails validation.
    fn name(&self) -> Option<&str>;
}

/// A model describing exposure-based acquisition.
pub trait ExposureModel {
    /// Exposure time in seconds.
    fn exposure_time(&self) -> f64;
}

/// Configuration type accepted by a device.
pub trait DeviceModel: Debug + Clone + Serialize + Send + Sync + 'static {
    /// The model as [`Nameable`], if it declares a name.
    fn as_nameable(&self) -> Option<&dyn Nameable> {
        None
    }

    /// The model as [`ExposureModel`], if it has an exposure time.
    fn as_exposure(&self) -> Option<&dyn ExposureModel> {
        None
    }
}

/// Devices that take no configuration.
impl DeviceModel for () {}

/// Base validation shared by every device.
///
/// `device_name` only decorates the error message.
pub fn validate_model<M: DeviceModel>(device_name: Option<&str>, model: &M) -> DeviceResult<()> {
    if let Some(named) = model.as_nameable() {
        if named.name().map_or(true, str::is_empty) {
            return Err(DeviceError::validation("name required", model, "name"));
        }
    }
    if let Some(exposure) = model.as_exposure() {
        let time = exposure.exposure_time();
        if time.is_nan() || time <= 0.0 {
            return Err(DeviceError::validation(
                format!(
                    "exposureTime must be non-zero for '{}'",
                    device_name.unwrap_or("<unnamed>")
                ),
                model,
                "exposure_time",
            ));
        }
    }
    Ok(())
}

/// Model for a detector taking timed exposures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorModel {
    /// Detector name.
    pub name: String,
    /// Exposure time in seconds.
    pub exposure_time: f64,
    /// Per-frame timeout in seconds, if the driver enforces one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<f64>,
}

impl DetectorModel {
    /// Model with no timeout.
    pub fn new(name: impl Into<String>, exposure_time: f64) -> Self {
        Self {
            name: name.into(),
            exposure_time,
            timeout: None,
        }
    }
}

impl Nameable for DetectorModel {
    fn name(&self) -> Option<&str> {
        Some(&self.name)
    }
}

impl ExposureModel for DetectorModel {
    fn exposure_time(&self) -> f64 {
        self.exposure_time
    }
}

impl DeviceModel for DetectorModel {
    fn as_nameable(&self) -> Option<&dyn Nameable> {
        Some(self)
    }

    fn as_exposure(&self) -> Option<&dyn ExposureModel> {
        Some(self)
    }
}

/// Model for a motor or other positioner; named but not exposure based.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScannableModel {
    /// Axis name.
    pub name: Option<String>,
    /// Engineering units, such as `mm`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,
}

impl Nameable for ScannableModel {
    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl DeviceModel for ScannableModel {
    fn as_nameable(&self) -> Option<&dyn Nameable> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detector_model_valid() {
        assert!(validate_model(Some("det1"), &DetectorModel::new("det1", 0.1)).is_ok());
    }

    #[test]
    fn test_empty_name_rejected() {
        let err = validate_model(None, &DetectorModel::new("", 1.0)).unwrap_err();
        assert_eq!(err.field(), Some("name"));
        assert!(err.to_string().contains("name required"));
    }

    #[test]
    fn test_missing_name_rejected() {
        let model = ScannableModel {
            name: None,
            units: Some("mm".into()),
        };
        let err = validate_model(None, &model).unwrap_err();
        assert_eq!(err.field(), Some("name"));
    }

    #[test]
    fn test_non_positive_exposure_rejected() {
        for time in [0.0, -1.0, f64::NAN] {
            let err = validate_model(Some("det1"), &DetectorModel::new("det1", time)).unwrap_err();
            assert_eq!(err.field(), Some("exposure_time"));
            assert!(err.to_string().contains("exposureTime must be non-zero"));
        }
    }

    #[test]
    fn test_model_without_capabilities_passes() {
        assert!(validate_model(None, &()).is_ok());
    }
}
