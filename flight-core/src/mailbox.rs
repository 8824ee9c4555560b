//! Single-slot, priority-ranked, self-expiring setpoint mailbox.
//!
//! Producers (RC receiver, ground link, internal overrides) call
//! [`SetpointMailbox::submit`] concurrently; the control loop peeks with
//! [`SetpointMailbox::fetch`] once per tick. The slot holds at most one entry
//! and is never popped: it empties only when its deadline fires or on a forced
//! reset.
//!
//! The deadline itself is scheduled through a [`DeadlineTimer`], supplied by
//! the platform. The timer is re-armed inside the same critical section that
//! swaps the entry, so an expiry can never clear a value it was not armed for
//! (see [`SetpointMailbox::on_expiry`]).

use core::cell::Cell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_time::{Duration, Instant};

use crate::types::Setpoint;

/// Error returned when a deadline cannot be scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ArmError {
    /// The timer backend refused the deadline.
    Unavailable,
    /// `now + validity` does not fit in an [`Instant`].
    Overflow,
}

/// Single-shot deadline used to expire the mailbox entry.
///
/// Arming replaces any previously armed deadline. When the deadline elapses the
/// platform must call [`SetpointMailbox::on_expiry`] with the deadline that
/// fired.
pub trait DeadlineTimer {
    /// Current time on the timer's clock.
    fn now(&self) -> Instant;

    /// Schedule (or reschedule) the single deadline.
    fn arm(&self, deadline: Instant) -> Result<(), ArmError>;

    /// Drop the pending deadline, if any.
    fn cancel(&self);
}

impl<T: DeadlineTimer + ?Sized> DeadlineTimer for &T {
    fn now(&self) -> Instant {
        (**self).now()
    }

    fn arm(&self, deadline: Instant) -> Result<(), ArmError> {
        (**self).arm(deadline)
    }

    fn cancel(&self) {
        (**self).cancel()
    }
}

/// The value held by the mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MailboxEntry {
    pub setpoint: Setpoint,
    pub priority: u8,
    pub expires_at: Instant,
}

impl MailboxEntry {
    #[inline]
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Outcome of [`SetpointMailbox::submit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SubmitResult {
    /// The entry was replaced and its deadline armed.
    Accepted,
    /// A live entry with strictly higher priority is pending; nothing changed.
    Refused,
    /// The deadline could not be armed; the mailbox is now empty.
    Failed,
}

/// What a submission did to the slot. Used by the vehicle context to decide
/// which validity notification to raise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SubmitEffect {
    pub result: SubmitResult,
    pub was_live: bool,
}

/// Single-slot setpoint holder with priority arbitration and expiry.
pub struct SetpointMailbox<M: RawMutex, T: DeadlineTimer> {
    slot: Mutex<M, Cell<Option<MailboxEntry>>>,
    timer: T,
}

impl<M: RawMutex, T: DeadlineTimer> SetpointMailbox<M, T> {
    /// Create an empty mailbox driven by `timer`.
    pub const fn new(timer: T) -> Self {
        Self {
            slot: Mutex::new(Cell::new(None)),
            timer,
        }
    }

    /// Offer a setpoint valid for `validity` at `priority`.
    ///
    /// A pending, unexpired entry with strictly greater priority wins and the
    /// call returns [`SubmitResult::Refused`]. Equal priority overwrites, so the
    /// newest submission wins ties. If the deadline cannot be armed the slot is
    /// cleared and [`SubmitResult::Failed`] is returned: no setpoint is better
    /// than one that never expires.
    pub fn submit(&self, setpoint: Setpoint, validity: Duration, priority: u8) -> SubmitResult {
        self.submit_inner(setpoint, validity, priority).result
    }

    pub(crate) fn submit_inner(
        &self,
        setpoint: Setpoint,
        validity: Duration,
        priority: u8,
    ) -> SubmitEffect {
        self.slot.lock(|slot| {
            let now = self.timer.now();
            let current = slot.get().filter(|entry| entry.is_live(now));
            let was_live = current.is_some();

            if let Some(entry) = current {
                if entry.priority > priority {
                    trace!(
                        "setpoint refused: pending priority {} > {}",
                        entry.priority,
                        priority
                    );
                    return SubmitEffect {
                        result: SubmitResult::Refused,
                        was_live,
                    };
                }
            }

            let armed = now
                .checked_add(validity)
                .ok_or(ArmError::Overflow)
                .and_then(|deadline| self.timer.arm(deadline).map(|()| deadline));

            match armed {
                Ok(expires_at) => {
                    slot.set(Some(MailboxEntry {
                        setpoint,
                        priority,
                        expires_at,
                    }));
                    SubmitEffect {
                        result: SubmitResult::Accepted,
                        was_live,
                    }
                }
                Err(e) => {
                    warn!("setpoint deadline not armed: {:?}", e);
                    slot.set(None);
                    self.timer.cancel();
                    SubmitEffect {
                        result: SubmitResult::Failed,
                        was_live,
                    }
                }
            }
        })
    }

    /// Peek at the pending setpoint without consuming it.
    ///
    /// Returns `None` when the slot is empty or its deadline has already
    /// passed (even if the expiry has not been delivered yet).
    #[must_use]
    pub fn fetch(&self) -> Option<Setpoint> {
        self.entry().map(|entry| entry.setpoint)
    }

    /// Peek at the full pending entry.
    #[must_use]
    pub fn entry(&self) -> Option<MailboxEntry> {
        self.slot.lock(|slot| {
            let now = self.timer.now();
            slot.get().filter(|entry| entry.is_live(now))
        })
    }

    /// Deliver an elapsed deadline.
    ///
    /// Clears the slot if the pending entry was armed for `deadline` or
    /// earlier. A stale fire (the entry was refreshed after the timer elapsed)
    /// leaves the newer entry in place. Returns `true` if an entry was removed.
    pub fn on_expiry(&self, deadline: Instant) -> bool {
        self.slot.lock(|slot| match slot.get() {
            Some(entry) if entry.expires_at <= deadline => {
                slot.set(None);
                true
            }
            _ => false,
        })
    }

    /// Force the mailbox empty and cancel its deadline.
    ///
    /// Returns `true` if an entry was removed.
    pub fn reset(&self) -> bool {
        self.slot.lock(|slot| {
            self.timer.cancel();
            slot.take().is_some()
        })
    }

    /// Access the deadline timer.
    pub fn timer(&self) -> &T {
        &self.timer
    }
}
