//! Platform-agnostic setpoint arbitration and flight-mode supervision.
//!
//! This crate holds the parts of the flight stack that decide *whether* a
//! setpoint may reach the motors, without any chip-specific dependencies. It
//! runs in embedded `no_std` environments and on host for testing.
//!
//! # Overview
//!
//! - [`types`]: Core data ([`Setpoint`], [`FlightMode`], [`ControlMode`])
//! - [`mailbox`]: Single-slot, priority-ranked, self-expiring setpoint holder
//!   ([`SetpointMailbox`], [`DeadlineTimer`])
//! - [`mode`]: Guarded state machines ([`ModeMachine`], [`TransitionTable`])
//! - [`notify`]: Broadcast notifications ([`Notification`], [`Notifier`])
//! - [`vehicle`]: Per-vehicle context tying the above together ([`Vehicle`])
//! - [`supervisor`]: Fixed-rate flight sequencing ([`FlightSupervisor`])
//!
//! # Data flow
//!
//! ```text
//! producers ──submit──▶ SetpointMailbox ──fetch──▶ FlightSupervisor ──▶ Actuation
//!                            ▲                           │
//!                     DeadlineTimer               FlightModeMachine
//! ```
//!
//! The control loop only receives a setpoint while the flight mode is
//! `Armed`; every other mode yields [`Actuation::Disabled`] or
//! [`Actuation::Idle`].
//!
//! # Example
//!
//! ```
//! use embassy_sync::blocking_mutex::raw::NoopRawMutex;
//! use embassy_time::{Duration, Instant};
//! use flight_core::{
//!     ArmError, DeadlineTimer, FlightMode, NullNotifier, Setpoint, SubmitResult,
//!     TransitionTable, Vehicle,
//! };
//!
//! struct FixedClock;
//!
//! impl DeadlineTimer for FixedClock {
//!     fn now(&self) -> Instant {
//!         Instant::from_millis(0)
//!     }
//!     fn arm(&self, _deadline: Instant) -> Result<(), ArmError> {
//!         Ok(())
//!     }
//!     fn cancel(&self) {}
//! }
//!
//! let vehicle: Vehicle<NoopRawMutex, _, _> =
//!     Vehicle::new(FixedClock, NullNotifier, TransitionTable::LEGACY);
//!
//! let sp = Setpoint::neutral();
//! assert_eq!(vehicle.submit_setpoint(sp, Duration::from_millis(50), 1), SubmitResult::Accepted);
//! assert_eq!(vehicle.fetch_setpoint(), Some(sp));
//! assert!(!vehicle.request_flight_mode(FlightMode::Armed).is_accepted());
//! ```
//!
//! # Features
//!
//! - **`std`**: Enable standard library support (for host testing)
//! - **`defmt`**: Log and derive formatting through defmt (for embedded logging);
//!   otherwise logging goes through the `log` facade
//!
//! # No-std Support
//!
//! This crate is `#![no_std]` by default and uses no heap allocations.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "std")]
extern crate std;

#[macro_use]
mod fmt;

pub mod mailbox;
pub mod mode;
pub mod notify;
pub mod supervisor;
pub mod types;
pub mod vehicle;

// Re-export main types at crate root
pub use mailbox::{ArmError, DeadlineTimer, MailboxEntry, SetpointMailbox, SubmitResult};
pub use mode::{
    ControlModeMachine, FlightModeMachine, ModeMachine, ModeState, Transition, TransitionTable,
};
pub use notify::{Notification, Notifier, NullNotifier};
pub use supervisor::{Actuation, FlightSupervisor, SupervisorConfig, DEFAULT_SUPERVISOR_CONFIG};
pub use types::{ControlMode, FlightMode, Setpoint};
pub use vehicle::Vehicle;

// Fixed-point type used throughout the public API.
pub use fixed::types::I16F16;
