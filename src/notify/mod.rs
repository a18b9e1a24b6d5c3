//! Achievement notification delivery.

pub mod queue;

pub use queue::{
    NotificationEntry, NotificationError, NotificationHandle, NotificationQueueManager,
    NotificationSignal, QueueSnapshot,
};
