//! Per-vehicle context: the shared mailbox, both mode machines and the
//! notification sink, passed by reference to every worker.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_time::{Duration, Instant};

use crate::mailbox::{DeadlineTimer, MailboxEntry, SetpointMailbox, SubmitResult};
use crate::mode::{ControlModeMachine, FlightModeMachine, Transition, TransitionTable};
use crate::notify::{Notification, Notifier};
use crate::types::{ControlMode, FlightMode, Setpoint};

/// Shared state of one vehicle.
///
/// Every accepted transition, forced fault and change in setpoint
/// availability is broadcast through the [`Notifier`]. Refused transitions
/// are only reported to the caller.
pub struct Vehicle<M: RawMutex, T: DeadlineTimer, N: Notifier> {
    mailbox: SetpointMailbox<M, T>,
    flight_mode: FlightModeMachine<M>,
    control_mode: ControlModeMachine<M>,
    notifier: N,
}

impl<M: RawMutex, T: DeadlineTimer, N: Notifier> Vehicle<M, T, N> {
    /// Create a vehicle in `init` / `rate` using the given fault policy.
    pub fn new(timer: T, notifier: N, flight_table: TransitionTable<FlightMode>) -> Self {
        Self {
            mailbox: SetpointMailbox::new(timer),
            flight_mode: FlightModeMachine::new(FlightMode::Init, flight_table),
            control_mode: ControlModeMachine::new(ControlMode::Rate, TransitionTable::TOGGLE),
            notifier,
        }
    }

    /// Announce the initial modes. Call once at boot, after the bus is up.
    pub fn start(&self) {
        let flight = self.flight_mode.current();
        let control = self.control_mode.current();
        info!("vehicle start: {:?} / {:?}", flight, control);
        self.notifier.notify(Notification::FlightMode(flight));
        self.notifier.notify(Notification::ControlMode(control));
    }

    /// Offer a setpoint to the mailbox.
    pub fn submit_setpoint(&self, setpoint: Setpoint, validity: Duration, priority: u8) -> SubmitResult {
        let effect = self.mailbox.submit_inner(setpoint, validity, priority);
        match (effect.result, effect.was_live) {
            (SubmitResult::Accepted, false) => {
                self.notifier.notify(Notification::SetpointValid(true));
            }
            (SubmitResult::Failed, true) => {
                self.notifier.notify(Notification::SetpointValid(false));
            }
            _ => {}
        }
        effect.result
    }

    /// Peek at the current setpoint.
    #[must_use]
    pub fn fetch_setpoint(&self) -> Option<Setpoint> {
        self.mailbox.fetch()
    }

    /// Peek at the full mailbox entry.
    #[must_use]
    pub fn setpoint_entry(&self) -> Option<MailboxEntry> {
        self.mailbox.entry()
    }

    /// Deliver the mailbox deadline that elapsed at `deadline`.
    pub fn setpoint_expired(&self, deadline: Instant) {
        if self.mailbox.on_expiry(deadline) {
            debug!("setpoint expired");
            self.notifier.notify(Notification::SetpointValid(false));
        }
    }

    /// Drop any pending setpoint.
    pub fn reset_setpoint(&self) {
        if self.mailbox.reset() {
            self.notifier.notify(Notification::SetpointValid(false));
        }
    }

    /// Current flight mode (non-blocking).
    #[must_use]
    pub fn flight_mode(&self) -> FlightMode {
        self.flight_mode.current()
    }

    /// Current control mode (non-blocking).
    #[must_use]
    pub fn control_mode(&self) -> ControlMode {
        self.control_mode.current()
    }

    /// Request a flight-mode transition, broadcasting it if accepted.
    pub fn request_flight_mode(&self, target: FlightMode) -> Transition<FlightMode> {
        let result = self.flight_mode.request_transition(target);
        match result {
            Transition::Accepted { from } => {
                info!("flight mode {:?} -> {:?}", from, target);
                self.notifier.notify(Notification::FlightMode(target));
            }
            Transition::Refused { current } => {
                debug!("flight mode {:?} refused in {:?}", target, current);
            }
        }
        result
    }

    /// Request a control-mode transition, broadcasting it if accepted.
    pub fn request_control_mode(&self, target: ControlMode) -> Transition<ControlMode> {
        let result = self.control_mode.request_transition(target);
        match result {
            Transition::Accepted { from } => {
                info!("control mode {:?} -> {:?}", from, target);
                self.notifier.notify(Notification::ControlMode(target));
            }
            Transition::Refused { current } => {
                debug!("control mode {:?} refused in {:?}", target, current);
            }
        }
        result
    }

    /// Force the flight mode into fault and broadcast it.
    pub fn force_fault(&self) {
        let interrupted = self.flight_mode.force_fault();
        error!("forced fault (was {:?})", interrupted);
        self.notifier.notify(Notification::FlightMode(FlightMode::Fault));
    }

    /// Mark the control mode unavailable and broadcast it.
    pub fn force_control_fault(&self) {
        let interrupted = self.control_mode.force_fault();
        warn!("control mode unavailable (was {:?})", interrupted);
        self.notifier.notify(Notification::ControlMode(ControlMode::NotAvailable));
    }

    pub fn mailbox(&self) -> &SetpointMailbox<M, T> {
        &self.mailbox
    }

    pub fn flight_mode_machine(&self) -> &FlightModeMachine<M> {
        &self.flight_mode
    }
}
