//! Spektrum satellite receiver ingest.
//!
//! Decodes the 16-byte frames a Spektrum satellite streams at 115200 baud,
//! learns which frame shapes make up the receiver's channel set, and turns
//! complete channel sets into [`flight_core::Setpoint`]s and stick commands.
//! Chip-agnostic: bytes come in through the [`FrameSource`] trait.
//!
//! # Overview
//!
//! - [`frame`]: Wire layout ([`RawFrame`], [`ChannelWord`], [`ChannelSet`])
//! - [`decoder`]: Dialect learning and frame trust ([`DecoderState`], [`decode`])
//! - [`accumulator`]: Multi-frame merge ([`ChannelAccumulator`])
//! - [`mapping`]: Channels to setpoint, stick commands ([`RcMapping`])
//! - [`source`]: Byte input trait ([`FrameSource`], [`InputError`])
//! - [`receiver`]: Ingest pipeline and read loop ([`SatelliteReceiver`],
//!   [`ReceiverBridge`])
//!
//! # Frame format
//!
//! ```text
//! ┌────────┬────────┬──────────────────────────────────────┐
//! │ fades  │ system │ 7 × big-endian channel word          │
//! │ 1 byte │ 1 byte │ [15] 0 │ [14:11] channel │ [10:0] value │
//! └────────┴────────┴──────────────────────────────────────┘
//! ```
//!
//! Channel id 15 marks an unused word. Frames arrive every 11 or 22 ms with
//! an idle gap between them; the gap is what [`ReceiverBridge`] resyncs on.
//!
//! # Features
//!
//! - **`std`**: Enable standard library support (for host testing)
//! - **`defmt`**: Log and derive formatting through defmt (for embedded logging)

#![cfg_attr(not(feature = "std"), no_std)]

#[macro_use]
mod fmt;

pub mod accumulator;
pub mod decoder;
pub mod frame;
pub mod mapping;
pub mod receiver;
pub mod source;

pub use accumulator::ChannelAccumulator;
pub use decoder::{decode, DecodeResult, DecoderState, DialectSlot};
pub use frame::{ChannelSet, ChannelWord, RawFrame, FRAME_LEN};
pub use mapping::{
    channels_to_setpoint, control_mode_command, flight_mode_command, RcMapping,
    DEFAULT_RC_MAPPING,
};
pub use receiver::{
    FrameOutcome, ReceiverBridge, ReceiverConfig, ReceiverStats, SatelliteReceiver,
    DEFAULT_RECEIVER_CONFIG, SPEKTRUM_BAUDRATE,
};
pub use source::{FrameSource, InputError};
