//! Receiver input sources.

pub mod satellite;

pub use satellite::UartFrameSource;
