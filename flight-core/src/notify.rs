//! Notifications broadcast to collaborators outside the pipeline.
//!
//! Status indicators, motor-disable logic and the ground link learn about mode
//! changes, forced faults and setpoint availability through a [`Notifier`].
//! The bus behind it is supplied by the platform.

use crate::types::{ControlMode, FlightMode};

/// A message broadcast to every collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Notification {
    /// The flight mode changed (accepted transition or forced fault).
    FlightMode(FlightMode),
    /// The control mode changed.
    ControlMode(ControlMode),
    /// The setpoint mailbox became occupied (`true`) or empty (`false`).
    SetpointValid(bool),
}

/// Sink for broadcast notifications.
///
/// Implementations must not block: notifications are raised from the control
/// loop and from inside mode transitions.
pub trait Notifier {
    /// Broadcast a notification. Delivery is best effort.
    fn notify(&self, notification: Notification);
}

impl<T: Notifier + ?Sized> Notifier for &T {
    fn notify(&self, notification: Notification) {
        (**self).notify(notification);
    }
}

/// Notifier that discards everything.
///
/// Use this when no bus is attached.
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _notification: Notification) {}
}
