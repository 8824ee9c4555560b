//! Mailbox deadline on the Embassy time driver.
//!
//! [`SignalDeadline`] is the [`DeadlineTimer`] handed to the vehicle. Arming
//! and cancelling only post to a [`Signal`]; the expiry task owns the actual
//! [`Timer`] and reports back through [`SignalDeadline::wait_expired`].

use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::{Instant, Timer};
use flight_core::{ArmError, DeadlineTimer};

pub struct SignalDeadline {
    /// Latest requested deadline; `None` cancels.
    signal: Signal<CriticalSectionRawMutex, Option<Instant>>,
}

impl SignalDeadline {
    pub const fn new() -> Self {
        Self {
            signal: Signal::new(),
        }
    }

    /// Wait until the armed deadline passes and return it.
    ///
    /// Re-arming while waiting moves the deadline; cancelling parks until the
    /// next arm. The caller passes the returned instant to
    /// [`flight_core::Vehicle::setpoint_expired`], which ignores it if the
    /// mailbox has been refreshed since.
    pub async fn wait_expired(&self) -> Instant {
        let mut armed = None;
        loop {
            match armed {
                None => armed = self.signal.wait().await,
                Some(deadline) => match select(Timer::at(deadline), self.signal.wait()).await {
                    Either::First(()) => return deadline,
                    Either::Second(next) => armed = next,
                },
            }
        }
    }
}

impl Default for SignalDeadline {
    fn default() -> Self {
        Self::new()
    }
}

impl DeadlineTimer for SignalDeadline {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn arm(&self, deadline: Instant) -> Result<(), ArmError> {
        self.signal.signal(Some(deadline));
        Ok(())
    }

    fn cancel(&self) {
        self.signal.signal(None);
    }
}
