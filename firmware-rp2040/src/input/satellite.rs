//! UART frame source for a Spektrum satellite receiver.
//!
//! The satellite streams 16-byte frames at 115200 baud, 8N1, with an idle gap
//! between frames. Reads are bounded by a deadline instead of a byte count so
//! the ingest loop can tell a full frame from a gap.
//!
//! # Pins
//!
//! Uses UART1 by default:
//! - GPIO 8: TX (unused, the satellite only talks)
//! - GPIO 9: RX

use embassy_rp::uart::{Async, Error as UartError, UartRx};
use embassy_time::{with_deadline, Duration, Instant};
use spektrum_proto::{FrameSource, InputError};

/// Convert UART errors to [`InputError`].
///
/// Both types live in other crates, so this can't be a `From` impl.
#[inline]
fn uart_error_to_input_error(e: UartError) -> InputError {
    match e {
        UartError::Overrun => InputError::Overrun,
        UartError::Break => InputError::Break,
        UartError::Parity => InputError::Parity,
        UartError::Framing => InputError::Framing,
        _ => InputError::Io,
    }
}

/// Satellite receiver attached to a UART RX line.
pub struct UartFrameSource<'d> {
    rx: UartRx<'d, Async>,
}

impl<'d> UartFrameSource<'d> {
    /// Create a source from a UART receiver configured for 115200 baud.
    #[must_use]
    pub fn new(rx: UartRx<'d, Async>) -> Self {
        Self { rx }
    }
}

impl FrameSource for UartFrameSource<'_> {
    async fn read_within(&mut self, buf: &mut [u8], window: Duration) -> Result<usize, InputError> {
        let deadline = Instant::now() + window;
        let mut filled = 0;

        // One byte at a time so a timeout still reports what arrived.
        while filled < buf.len() {
            match with_deadline(deadline, self.rx.read(&mut buf[filled..=filled])).await {
                Ok(Ok(())) => filled += 1,
                Ok(Err(e)) => return Err(uart_error_to_input_error(e)),
                Err(_) => break,
            }
        }

        Ok(filled)
    }
}
