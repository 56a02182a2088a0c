// src/services/notifications.rs
//! Live notification channel for verified presentations.
//!
//! Delivery is best effort and at most once: a subscriber only sees records
//! broadcast while it is connected, there is no backlog or replay, and a
//! subscriber that falls behind skips what it missed.

use crate::models::record::SanitizedVerifiedRecord;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Event name of a newly verified presentation.
pub const VP_INSERTED: &str = "vp_inserted";

/// One frame pushed to subscribers.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Notification {
    pub event: String,
    pub data: SanitizedVerifiedRecord,
}

/// Hub fanning out notifications to connected subscribers.
pub struct NotificationHub {
    sender: broadcast::Sender<Notification>,
}

impl NotificationHub {
    /// `capacity` bounds how far a slow subscriber may lag before skipping.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        NotificationHub { sender }
    }

    /// Registers a subscriber. Dropping the receiver unregisters it.
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    /// Sends `record` to every current subscriber and returns how many there
    /// were. Never fails; with no subscribers the record is discarded.
    pub fn broadcast(&self, record: SanitizedVerifiedRecord) -> usize {
        self.sender
            .send(Notification {
                event: VP_INSERTED.to_string(),
                data: record,
            })
            .unwrap_or(0)
    }

    #[cfg(test)]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new(100)
    }
}
