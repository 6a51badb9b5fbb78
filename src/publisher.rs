//! Outbound status publishing.
//!
//! A [`Publisher`] carries [`ScanStatus`] updates beyond the process. One
//! publisher is usually shared by many devices, so devices hold it as an
//! `Arc<dyn Publisher>` and never own its lifetime. A device without a
//! publisher still tracks its state locally.

use tokio::sync::broadcast;

use crate::device::ScanStatus;
use crate::error::TransportError;

/// Transport for device status.
///
/// `broadcast` may block and may fail; a failure never rolls back the device
/// state that produced the status.
pub trait Publisher: Send + Sync {
    /// Send one status to every subscriber.
    fn broadcast(&self, status: &ScanStatus) -> Result<(), TransportError>;
}

/// In-process publisher backed by a `tokio::sync::broadcast` channel.
///
/// Slow receivers lag and lose the oldest statuses rather than blocking the
/// device.
#[derive(Debug, Clone)]
pub struct ChannelPublisher {
    sender: broadcast::Sender<ScanStatus>,
}

impl ChannelPublisher {
    /// Create a publisher buffering up to `capacity` statuses per receiver.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// New receiver seeing statuses broadcast from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ScanStatus> {
        self.sender.subscribe()
    }

    /// Number of live receivers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ChannelPublisher {
    fn default() -> Self {
        Self::new(256)
    }
}

impl Publisher for ChannelPublisher {
    fn broadcast(&self, status: &ScanStatus) -> Result<(), TransportError> {
        self.sender
            .send(status.clone())
            .map(|_| ())
            .map_err(|_| TransportError::NoSubscribers)
    }
}
