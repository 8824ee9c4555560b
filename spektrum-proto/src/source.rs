//! Frame source trait and error types.

use core::future::Future;
use embassy_time::Duration;

/// Error type for receiver input operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InputError {
    /// UART/communication I/O error.
    Io,
    /// Receive FIFO overrun; bytes were lost.
    Overrun,
    /// Line held low (receiver unplugged or unpowered).
    Break,
    /// Parity error.
    Parity,
    /// UART framing error.
    Framing,
}

/// Async byte source for a satellite receiver.
///
/// Reads are bounded by a time window rather than a byte count: the ingest
/// loop uses one window timed to a full frame period and a shorter one timed
/// to the inter-frame gap to detect loss of synchronization.
///
/// # `no_std` Compatibility
///
/// All implementations must be `#![no_std]` compatible with no heap allocation.
pub trait FrameSource {
    /// Fill `buf` with bytes until it is full or `window` has elapsed.
    ///
    /// Returns how many bytes were read. Running out of time is not an error.
    fn read_within(
        &mut self,
        buf: &mut [u8],
        window: Duration,
    ) -> impl Future<Output = Result<usize, InputError>>;
}
