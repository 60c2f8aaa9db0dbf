//! Subscriber hubs.
//!
//! Publishing is best effort: an event emitted with nobody listening is
//! dropped, and a subscriber that falls more than `capacity` events behind
//! observes a lag on its receiver.

use std::sync::Arc;

use bbs_models::Event;
use tokio::sync::broadcast;
use tracing::debug;

pub const DEFAULT_CAPACITY: usize = 1024;

/// Fan-out point for one event channel.
pub trait Hub: Send + Sync {
    fn emit(&self, event: Event);
}

impl<H: Hub + ?Sized> Hub for Arc<H> {
    fn emit(&self, event: Event) {
        (**self).emit(event)
    }
}

/// In-process hub over a tokio broadcast channel.
#[derive(Debug, Clone)]
pub struct BroadcastHub {
    name: &'static str,
    sender: broadcast::Sender<Event>,
}

impl BroadcastHub {
    pub fn new(name: &'static str, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { name, sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new("events", DEFAULT_CAPACITY)
    }
}

impl Hub for BroadcastHub {
    fn emit(&self, event: Event) {
        let event_type = event.event_type();
        let key = event.key();
        match self.sender.send(event) {
            Ok(receivers) => debug!(hub = self.name, event_type, %key, receivers, "event emitted"),
            Err(_) => debug!(hub = self.name, event_type, %key, "event dropped, no subscribers"),
        }
    }
}
