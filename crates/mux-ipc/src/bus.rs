//! A single workspace's event bus: one broadcast channel for live delivery,
//! plus a replay buffer of the active stream's events so a subscriber that
//! joins mid-stream still gets everything from `stream-start` onward before
//! being spliced onto the live feed.

use mux_protocol::IpcEvent;
use tokio::sync::broadcast;
use tokio::sync::Mutex;

const CHANNEL_CAPACITY: usize = 1024;

pub struct WorkspaceBus {
    sender: broadcast::Sender<IpcEvent>,
    /// `Some(buffer)` while a stream is active; reset to a fresh empty
    /// buffer on `stream-start`, cleared back to `None` once the stream's
    /// terminal event has been published.
    active_buffer: Mutex<Option<Vec<IpcEvent>>>,
}

/// What a subscriber should do immediately after subscribing.
pub struct Subscription {
    /// Buffered events of the in-progress stream, oldest first. Empty if no
    /// stream is active (the caller should instead replay historical
    /// messages from the History Store).
    pub replay: Vec<IpcEvent>,
    pub is_stream_active: bool,
    pub receiver: broadcast::Receiver<IpcEvent>,
}

impl WorkspaceBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            sender,
            active_buffer: Mutex::new(None),
        }
    }

    /// Publishes an event to all live subscribers and, while a stream is
    /// active, appends it to the replay buffer. `stream-start` opens a
    /// fresh buffer; a terminal event closes it after publishing.
    pub async fn publish(&self, event: IpcEvent) {
        let mut buffer = self.active_buffer.lock().await;
        if matches!(event, IpcEvent::StreamStart { .. }) {
            *buffer = Some(vec![event.clone()]);
        } else if let Some(buf) = buffer.as_mut() {
            buf.push(event.clone());
        }

        let terminal = event.is_terminal();
        let _ = self.sender.send(event);

        if terminal {
            *buffer = None;
        }
    }

    pub async fn subscribe(&self) -> Subscription {
        // Subscribe before reading the buffer so no live event can land in
        // the gap between snapshotting the buffer and attaching the receiver.
        let receiver = self.sender.subscribe();
        let buffer = self.active_buffer.lock().await;
        let is_stream_active = buffer.is_some();
        let replay = buffer.clone().unwrap_or_default();
        Subscription {
            replay,
            is_stream_active,
            receiver,
        }
    }
}

impl Default for WorkspaceBus {
    fn default() -> Self {
        Self::new()
    }
}
