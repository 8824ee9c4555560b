//! Spektrum satellite flight front end for RP2040.
//!
//! Wires the chip-agnostic [`flight_core`] and [`spektrum_proto`] crates to
//! Embassy on a Raspberry Pi Pico.
//!
//! # Overview
//!
//! The firmware:
//! 1. Receives satellite frames over UART (115200 baud, 8N1)
//! 2. Learns the receiver's frame dialect and assembles complete channel sets
//! 3. Arbitrates setpoints through a self-expiring mailbox
//! 4. Sequences flight modes at a fixed control rate
//!
//! # Hardware Configuration
//!
//! | Function | GPIO | Description |
//! |----------|------|-------------|
//! | UART1 TX | 8    | Unused |
//! | UART1 RX | 9    | Satellite data in |
//! | LED      | 25   | On while arming or armed |
//!
//! # Architecture
//!
//! Four tasks share one [`FlightVehicle`]:
//!
//! - **Receiver Task**: Reads frames, submits setpoints, applies stick commands
//! - **Control Task**: Runs the [`FlightSupervisor`](flight_core::FlightSupervisor)
//!   every tick
//! - **Expiry Task**: Waits on the [`SignalDeadline`] and clears stale setpoints
//! - **Status Task**: Follows the [`NotificationBus`] and drives the LED
//!
//! # Modules
//!
//! - [`input`]: UART frame source ([`UartFrameSource`])
//! - [`timer`]: Mailbox deadline ([`SignalDeadline`])
//! - [`bus`]: Notification bus ([`NotificationBus`], [`BusNotifier`])
//!
//! # Features
//!
//! - **`dev-panic`** (default): Use `panic-probe` for development (prints panic info via RTT)
//! - **`prod-panic`**: Use `panic-reset` for production (silent watchdog reset)
//! - **`exit-fault`**: Leave the fault mode through an explicit exit-fault step

#![no_std]

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use flight_core::{FlightMode, TransitionTable, Vehicle};

pub mod bus;
pub mod input;
pub mod timer;

pub use bus::{BusNotifier, NotificationBus, NotificationSubscriber};
pub use input::UartFrameSource;
pub use timer::SignalDeadline;

/// The vehicle context shared by all tasks.
pub type FlightVehicle = Vehicle<CriticalSectionRawMutex, &'static SignalDeadline, BusNotifier>;

/// Flight-mode transition table selected by the `exit-fault` feature.
pub const FLIGHT_TABLE: TransitionTable<FlightMode> = if cfg!(feature = "exit-fault") {
    TransitionTable::EXIT_FAULT
} else {
    TransitionTable::LEGACY
};
