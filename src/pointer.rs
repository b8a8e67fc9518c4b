//! Global pointer events with scoped subscriptions
//!
//! The presentation layer dispatches every pointer press into a
//! [`PointerEvents`] hub. Interested components hold a [`PointerSubscription`]
//! only while they need the events; dropping it detaches the listener.

use tokio::sync::broadcast;
use tracing::debug;

const CHANNEL_CAPACITY: usize = 64;

/// A pointer press in page coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub x: f64,
    pub y: f64,
}

impl PointerEvent {
    pub fn at(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned screen region occupied by a panel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanelRegion {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl PanelRegion {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn contains(&self, event: &PointerEvent) -> bool {
        event.x >= self.x
            && event.x <= self.x + self.width
            && event.y >= self.y
            && event.y <= self.y + self.height
    }
}

/// Hub that fans pointer events out to the current subscribers
#[derive(Debug, Clone)]
pub struct PointerEvents {
    sender: broadcast::Sender<PointerEvent>,
}

impl Default for PointerEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl PointerEvents {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Deliver an event to every attached listener. Returns how many received it.
    pub fn dispatch(&self, event: PointerEvent) -> usize {
        // No listeners is the common case while every panel is closed.
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> PointerSubscription {
        debug!(listeners = self.sender.receiver_count() + 1, "Pointer listener attached");
        PointerSubscription {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn listener_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// An attached listener; detaches on drop
#[derive(Debug)]
pub struct PointerSubscription {
    receiver: broadcast::Receiver<PointerEvent>,
}

impl PointerSubscription {
    /// Events received since the last call, oldest first
    pub fn drain(&mut self) -> Vec<PointerEvent> {
        let mut events = Vec::new();
        loop {
            match self.receiver.try_recv() {
                Ok(event) => events.push(event),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    debug!(skipped, "Pointer listener lagged");
                }
                Err(_) => break,
            }
        }
        events
    }
}
