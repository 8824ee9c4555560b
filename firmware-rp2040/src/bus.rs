//! Notification bus.
//!
//! Mode changes and setpoint validity go out on a [`PubSubChannel`]. Publishing
//! never waits: when a subscriber falls behind, its oldest message is dropped
//! and it sees a lag on its next read.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::pubsub::{PubSubChannel, Subscriber};
use flight_core::{Notification, Notifier};

/// Queued notifications per subscriber.
pub const BUS_CAPACITY: usize = 8;

/// Subscriber slots (status LED, telemetry).
pub const BUS_SUBSCRIBERS: usize = 2;

pub type NotificationBus =
    PubSubChannel<CriticalSectionRawMutex, Notification, BUS_CAPACITY, BUS_SUBSCRIBERS, 1>;

pub type NotificationSubscriber = Subscriber<
    'static,
    CriticalSectionRawMutex,
    Notification,
    BUS_CAPACITY,
    BUS_SUBSCRIBERS,
    1,
>;

/// [`Notifier`] that publishes onto a [`NotificationBus`].
#[derive(Clone, Copy)]
pub struct BusNotifier {
    bus: &'static NotificationBus,
}

impl BusNotifier {
    #[must_use]
    pub const fn new(bus: &'static NotificationBus) -> Self {
        Self { bus }
    }
}

impl Notifier for BusNotifier {
    fn notify(&self, notification: Notification) {
        self.bus.immediate_publisher().publish_immediate(notification);
    }
}
