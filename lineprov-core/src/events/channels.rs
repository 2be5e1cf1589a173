//! Event channel factories and handles.

use super::types::StatusChanged;
use tokio::sync::mpsc;

/// Default buffer size for event channels.
///
/// This provides enough buffer to handle bursts while keeping memory bounded.
pub const DEFAULT_CHANNEL_BUFFER: usize = 256;

/// Sender handle for StatusChanged events.
pub type StatusChangedSender = mpsc::Sender<StatusChanged>;
/// Receiver handle for StatusChanged events.
pub type StatusChangedReceiver = mpsc::Receiver<StatusChanged>;

/// Create a new StatusChanged channel.
///
/// Returns a (sender, receiver) pair. The orchestrator holds the sender and
/// the notification dispatcher owns the receiver.
pub fn status_changed_channel() -> (StatusChangedSender, StatusChangedReceiver) {
    mpsc::channel(DEFAULT_CHANNEL_BUFFER)
}
