//! Error types for the device core.
//!
//! `DeviceError` is the single error type surfaced by device operations. It
//! separates the four failure classes a caller needs to tell apart:
//!
//! - **`Validation`**: the model handed to `configure` was rejected. Carries the
//!   offending field so a UI can point at it. Nothing was mutated.
//! - **`Transport`**: the publisher failed to broadcast a status. The local
//!   transition that triggered the broadcast has already committed.
//! - **`Cancelled`**: a long-running hook (`abort`, `pause`, `resume`, `seek`,
//!   `run`) observed its cancellation token and stopped.
//! - **`Fault`**: anything else a hook or listener raised, tagged with the
//!   name of the device so batch callers can attribute it.
//!
//! Driver hooks and listeners return `anyhow::Result`, and [`DeviceError::fault`]
//! folds those back into this enum without double-wrapping.

use thiserror::Error;

/// Convenience alias for results using the device error type.
pub type DeviceResult<T> = std::result::Result<T, DeviceError>;

/// Failure of a [`Publisher`](crate::publisher::Publisher) to send a status.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Nobody is listening on the channel.
    #[error("Failed to broadcast status (no subscribers)")]
    NoSubscribers,

    /// The publisher was shut down.
    #[error("Publisher is closed")]
    Closed,

    /// Any other transport failure.
    #[error("Broadcast failed: {0}")]
    Send(String),
}

/// Error returned by device operations.
#[derive(Error, Debug)]
pub enum DeviceError {
    /// The model was rejected before anything changed.
    #[error("Validation error on '{field}': {reason}")]
    Validation {
        /// Human-readable cause.
        reason: String,
        /// Name of the offending model field.
        field: String,
        /// Debug rendering of the rejected model.
        model: String,
    },

    /// Status publishing failed after the transition committed.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// A hook observed its cancellation token.
    #[error("Device '{device}' cancelled during {operation}")]
    Cancelled {
        /// Device the hook ran on.
        device: String,
        /// Hook name, such as `pause` or `seek`.
        operation: String,
    },

    /// A hook or listener failed.
    #[error("Device '{device}' fault: {source}")]
    Fault {
        /// Device the failure is attributed to.
        device: String,
        /// Underlying error.
        #[source]
        source: anyhow::Error,
    },

    /// Settings loaded but failed validation.
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// Settings could not be loaded or parsed.
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    /// A scan attribute value does not convert to or from JSON.
    #[error("Scan attribute '{name}' could not be converted: {source}")]
    Attribute {
        /// Attribute key.
        name: String,
        /// Conversion failure.
        #[source]
        source: serde_json::Error,
    },
}

impl DeviceError {
    /// Build a validation error for `field` of `model`.
    pub fn validation(
        reason: impl Into<String>,
        model: &impl std::fmt::Debug,
        field: impl Into<String>,
    ) -> Self {
        DeviceError::Validation {
            reason: reason.into(),
            field: field.into(),
            model: format!("{model:?}"),
        }
    }

    /// Attribute an arbitrary failure to `device`.
    ///
    /// Errors that already carry their own classification (validation,
    /// cancellation, an existing fault) are passed through unchanged.
    pub fn fault(device: impl Into<String>, err: anyhow::Error) -> Self {
        match err.downcast::<DeviceError>() {
            Ok(
                e @ (DeviceError::Validation { .. }
                | DeviceError::Cancelled { .. }
                | DeviceError::Fault { .. }),
            ) => e,
            Ok(other) => DeviceError::Fault {
                device: device.into(),
                source: anyhow::Error::new(other),
            },
            Err(source) => DeviceError::Fault {
                device: device.into(),
                source,
            },
        }
    }

    /// True for errors raised because a hook was interrupted.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DeviceError::Cancelled { .. })
    }

    /// Field name of a validation error.
    pub fn field(&self) -> Option<&str> {
        match self {
            DeviceError::Validation { field, .. } => Some(field),
            _ => None,
        }
    }
}

impl From<figment::Error> for DeviceError {
    fn from(err: figment::Error) -> Self {
        DeviceError::Config(Box::new(err))
    }
}
