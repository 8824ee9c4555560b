//! Receiver ingest: frames in, arbitrated setpoints and stick commands out.
//!
//! [`SatelliteReceiver`] is the synchronous per-frame pipeline (decode, merge,
//! map, submit). [`ReceiverBridge`] drives it from a [`FrameSource`] with the
//! bounded-read timing the satellite protocol needs.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_time::Duration;
use flight_core::{
    ControlMode, DeadlineTimer, FlightMode, Notifier, SubmitResult, Transition, Vehicle,
};

use crate::accumulator::ChannelAccumulator;
use crate::decoder::{decode, DecodeResult, DecoderState};
use crate::frame::{RawFrame, FRAME_LEN};
use crate::mapping::{control_mode_command, flight_mode_command, RcMapping, DEFAULT_RC_MAPPING};
use crate::source::{FrameSource, InputError};

/// Ingest timing and arbitration parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ReceiverConfig {
    /// Window for reading one frame; longer than the slowest frame period.
    pub frame_window: Duration,
    /// Window for the gap read after each frame; shorter than the fastest
    /// frame period.
    pub sync_window: Duration,
    /// Validity of each submitted setpoint.
    pub setpoint_validity: Duration,
    /// Mailbox priority of receiver setpoints.
    pub priority: u8,
}

/// Frames every 11 or 22 ms: 25 ms read window, 5 ms gap window, setpoints
/// valid for 50 ms at priority 1.
pub const DEFAULT_RECEIVER_CONFIG: ReceiverConfig = ReceiverConfig {
    frame_window: Duration::from_millis(25),
    sync_window: Duration::from_millis(5),
    setpoint_validity: Duration::from_millis(50),
    priority: 1,
};

/// Satellite UART baud rate.
pub const SPEKTRUM_BAUDRATE: u32 = 115_200;

/// What became of one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameOutcome {
    /// A complete setpoint was offered to the mailbox.
    Submitted(SubmitResult),
    /// A complete setpoint was derived but the flight mode does not take
    /// setpoints (init, config).
    Held,
    /// Trusted frame merged; channel set not complete yet.
    Partial,
    /// Dropped: dialect not locked or shape not part of it.
    Untrusted,
    /// Dropped: repeated channel id.
    Malformed,
    /// Fewer than a frame's worth of bytes arrived in the read window.
    NoFrame,
}

/// Ingest counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ReceiverStats {
    pub trusted: u32,
    pub untrusted: u32,
    pub malformed: u32,
    pub setpoints: u32,
    pub refused: u32,
    pub short_reads: u32,
    pub desyncs: u32,
    pub io_errors: u32,
}

/// Per-frame ingest pipeline. Owns the decoder state and the accumulator.
pub struct SatelliteReceiver {
    decoder: DecoderState,
    accumulator: ChannelAccumulator,
    mapping: RcMapping,
    config: ReceiverConfig,
    stats: ReceiverStats,
    /// Last refused stick request and the mode that refused it. A held stick
    /// is not re-requested until the mode moves.
    refused_flight: Option<(FlightMode, FlightMode)>,
    refused_control: Option<(ControlMode, ControlMode)>,
}

impl SatelliteReceiver {
    pub fn new(mapping: RcMapping, config: ReceiverConfig) -> Self {
        Self {
            decoder: DecoderState::new(),
            accumulator: ChannelAccumulator::new(),
            mapping,
            config,
            stats: ReceiverStats::default(),
            refused_flight: None,
            refused_control: None,
        }
    }

    /// Decode one frame and act on it.
    ///
    /// A completed channel set becomes a setpoint (submitted unless the
    /// vehicle is in init or config) and is checked for stick commands.
    pub fn handle_frame<M: RawMutex, T: DeadlineTimer, N: Notifier>(
        &mut self,
        frame: &RawFrame,
        vehicle: &Vehicle<M, T, N>,
    ) -> FrameOutcome {
        let (channels, presence) = match decode(frame, &mut self.decoder) {
            DecodeResult::Trusted(channels, presence) => (channels, presence),
            DecodeResult::Untrusted => {
                self.stats.untrusted = self.stats.untrusted.wrapping_add(1);
                return FrameOutcome::Untrusted;
            }
            DecodeResult::Malformed => {
                self.stats.malformed = self.stats.malformed.wrapping_add(1);
                return FrameOutcome::Malformed;
            }
        };
        self.stats.trusted = self.stats.trusted.wrapping_add(1);

        self.accumulator.merge(&channels, presence);
        let Some(setpoint) = self.accumulator.take_if_complete(
            self.decoder.complete_mask(),
            &self.mapping,
            vehicle.control_mode(),
        ) else {
            return FrameOutcome::Partial;
        };

        let mode = vehicle.flight_mode();
        let outcome = match mode {
            FlightMode::Init | FlightMode::Config => FrameOutcome::Held,
            _ => {
                let result = vehicle.submit_setpoint(
                    setpoint,
                    self.config.setpoint_validity,
                    self.config.priority,
                );
                self.stats.setpoints = self.stats.setpoints.wrapping_add(1);
                if result != SubmitResult::Accepted {
                    self.stats.refused = self.stats.refused.wrapping_add(1);
                }
                FrameOutcome::Submitted(result)
            }
        };

        self.apply_stick_commands(vehicle, mode);
        outcome
    }

    fn apply_stick_commands<M: RawMutex, T: DeadlineTimer, N: Notifier>(
        &mut self,
        vehicle: &Vehicle<M, T, N>,
        mode: FlightMode,
    ) {
        if matches!(mode, FlightMode::Init | FlightMode::NotAvailable) {
            return;
        }
        let channels = self.accumulator.channels();

        if let Some(command) = flight_mode_command(channels, &self.mapping) {
            let target = fault_exit_target(vehicle, mode, command);
            if target != mode && self.refused_flight != Some((mode, target)) {
                self.refused_flight = match vehicle.request_flight_mode(target) {
                    Transition::Accepted { .. } => None,
                    Transition::Refused { current } => Some((current, target)),
                };
            }
        }

        let control = vehicle.control_mode();
        if let Some(target) = control_mode_command(channels, &self.mapping) {
            if target != control && self.refused_control != Some((control, target)) {
                self.refused_control = match vehicle.request_control_mode(target) {
                    Transition::Accepted { .. } => None,
                    Transition::Refused { current } => Some((current, target)),
                };
            }
        }
    }

    pub fn decoder(&self) -> &DecoderState {
        &self.decoder
    }

    pub fn config(&self) -> &ReceiverConfig {
        &self.config
    }

    pub fn stats(&self) -> &ReceiverStats {
        &self.stats
    }
}

// With a fault table that only leaves through exit_fault, the disarm stick
// asks for exit_fault instead.
fn fault_exit_target<M: RawMutex, T: DeadlineTimer, N: Notifier>(
    vehicle: &Vehicle<M, T, N>,
    mode: FlightMode,
    command: FlightMode,
) -> FlightMode {
    let table = vehicle.flight_mode_machine().table();
    if mode == FlightMode::Fault
        && command == FlightMode::Disarming
        && table.allows(FlightMode::Fault, FlightMode::ExitFault)
        && !table.allows(FlightMode::Fault, FlightMode::Disarming)
    {
        FlightMode::ExitFault
    } else {
        command
    }
}

impl Default for SatelliteReceiver {
    fn default() -> Self {
        Self::new(DEFAULT_RC_MAPPING, DEFAULT_RECEIVER_CONFIG)
    }
}

/// Connects a [`FrameSource`] to a [`SatelliteReceiver`].
///
/// Each step reads one frame within [`ReceiverConfig::frame_window`], then
/// reads again within [`ReceiverConfig::sync_window`]. That second read
/// should land in the inter-frame gap and time out empty; a full frame's worth
/// of bytes there means the reads are straddling frames.
pub struct ReceiverBridge<S> {
    source: S,
    receiver: SatelliteReceiver,
    buf: [u8; 2 * FRAME_LEN],
}

impl<S: FrameSource> ReceiverBridge<S> {
    pub fn new(source: S, receiver: SatelliteReceiver) -> Self {
        Self {
            source,
            receiver,
            buf: [0; 2 * FRAME_LEN],
        }
    }

    /// Run the ingest loop indefinitely.
    pub async fn run<M: RawMutex, T: DeadlineTimer, N: Notifier>(
        &mut self,
        vehicle: &Vehicle<M, T, N>,
    ) -> ! {
        loop {
            if let Err(e) = self.process_one(vehicle).await {
                warn!("receiver input error: {:?}", e);
            }
        }
    }

    /// Read and process one frame, then resync on the inter-frame gap.
    pub async fn process_one<M: RawMutex, T: DeadlineTimer, N: Notifier>(
        &mut self,
        vehicle: &Vehicle<M, T, N>,
    ) -> Result<FrameOutcome, InputError> {
        let config = *self.receiver.config();

        let read = self
            .source
            .read_within(&mut self.buf[..FRAME_LEN], config.frame_window)
            .await;
        let outcome = match read {
            Ok(FRAME_LEN) => {
                let mut bytes = [0u8; FRAME_LEN];
                bytes.copy_from_slice(&self.buf[..FRAME_LEN]);
                Ok(self.receiver.handle_frame(&RawFrame(bytes), vehicle))
            }
            Ok(_) => {
                self.receiver.stats.short_reads = self.receiver.stats.short_reads.wrapping_add(1);
                Ok(FrameOutcome::NoFrame)
            }
            Err(e) => {
                self.receiver.stats.io_errors = self.receiver.stats.io_errors.wrapping_add(1);
                Err(e)
            }
        };

        let gap = self.source.read_within(&mut self.buf, config.sync_window).await;
        match gap {
            Ok(n) if n >= FRAME_LEN => {
                self.receiver.stats.desyncs = self.receiver.stats.desyncs.wrapping_add(1);
                debug!("receiver out of sync, {} bytes in gap", n);
            }
            Ok(_) => {}
            Err(e) => {
                self.receiver.stats.io_errors = self.receiver.stats.io_errors.wrapping_add(1);
                debug!("error during resync: {:?}", e);
            }
        }

        outcome
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn receiver(&self) -> &SatelliteReceiver {
        &self.receiver
    }

    pub fn receiver_mut(&mut self) -> &mut SatelliteReceiver {
        &mut self.receiver
    }

    /// Decompose the bridge into its source and receiver.
    pub fn into_parts(self) -> (S, SatelliteReceiver) {
        (self.source, self.receiver)
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::frame::tests::frame;
    use core::cell::Cell;
    use core::future::Future;
    use core::pin::Pin;
    use core::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};
    use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
    use embassy_time::Instant;
    use flight_core::{ArmError, ControlMode, FlightSupervisor, NullNotifier, TransitionTable};
    use std::collections::VecDeque;
    use std::vec;
    use std::vec::Vec;

    struct StillClock {
        armed: Cell<Option<Instant>>,
    }

    impl DeadlineTimer for StillClock {
        fn now(&self) -> Instant {
            Instant::from_millis(0)
        }

        fn arm(&self, deadline: Instant) -> Result<(), ArmError> {
            self.armed.set(Some(deadline));
            Ok(())
        }

        fn cancel(&self) {
            self.armed.set(None);
        }
    }

    type TestVehicle = Vehicle<CriticalSectionRawMutex, StillClock, NullNotifier>;

    fn vehicle_with(table: TransitionTable<FlightMode>) -> TestVehicle {
        let clock = StillClock {
            armed: Cell::new(None),
        };
        Vehicle::new(clock, NullNotifier, table)
    }

    fn vehicle() -> TestVehicle {
        vehicle_with(TransitionTable::LEGACY)
    }

    fn disarmed_vehicle_with(table: TransitionTable<FlightMode>) -> TestVehicle {
        let v = vehicle_with(table);
        assert!(v.request_flight_mode(FlightMode::Disarming).is_accepted());
        assert!(v.request_flight_mode(FlightMode::Disarmed).is_accepted());
        v
    }

    fn disarmed_vehicle() -> TestVehicle {
        disarmed_vehicle_with(TransitionTable::LEGACY)
    }

    // Throttle high, sticks centered, switches low.
    const CRUISE: &[(u8, u16)] = &[(0, 1000), (1, 1022), (2, 1022), (3, 1022), (4, 300), (5, 300)];
    // Throttle low, arm switch low.
    const ARM: &[(u8, u16)] = &[(0, 10), (1, 1022), (2, 1022), (3, 1022), (4, 300), (5, 300)];
    // Throttle low, arm switch high.
    const DISARM: &[(u8, u16)] = &[(0, 10), (1, 1022), (2, 1022), (3, 1022), (4, 1800), (5, 300)];

    fn locked_receiver(v: &TestVehicle) -> SatelliteReceiver {
        let mut rx = SatelliteReceiver::default();
        for _ in 0..15 {
            assert_eq!(rx.handle_frame(&frame(CRUISE), v), FrameOutcome::Untrusted);
        }
        assert!(rx.decoder().is_locked());
        rx
    }

    #[test]
    fn test_init_holds_setpoints() {
        let v = vehicle();
        let mut rx = locked_receiver(&v);
        assert_eq!(rx.handle_frame(&frame(ARM), &v), FrameOutcome::Held);
        assert_eq!(v.fetch_setpoint(), None);
        // No stick commands during init either.
        assert_eq!(v.flight_mode(), FlightMode::Init);
    }

    #[test]
    fn test_config_holds_setpoints() {
        let v = disarmed_vehicle();
        assert!(v.request_flight_mode(FlightMode::Config).is_accepted());
        let mut rx = locked_receiver(&v);
        assert_eq!(rx.handle_frame(&frame(CRUISE), &v), FrameOutcome::Held);
        assert_eq!(v.fetch_setpoint(), None);
    }

    #[test]
    fn test_complete_frame_submits_setpoint() {
        let v = disarmed_vehicle();
        let mut rx = locked_receiver(&v);
        assert_eq!(
            rx.handle_frame(&frame(CRUISE), &v),
            FrameOutcome::Submitted(SubmitResult::Accepted)
        );
        let entry = v.setpoint_entry().unwrap();
        assert_eq!(entry.priority, 1);
        assert_eq!(entry.expires_at, Instant::from_millis(50));
        assert_eq!(rx.stats().setpoints, 1);
    }

    #[test]
    fn test_arm_stick_command() {
        let v = disarmed_vehicle();
        let mut rx = locked_receiver(&v);
        rx.handle_frame(&frame(ARM), &v);
        assert_eq!(v.flight_mode(), FlightMode::Arming);
    }

    #[test]
    fn test_disarm_and_mode_switch_commands() {
        let v = disarmed_vehicle();
        let mut rx = locked_receiver(&v);
        rx.handle_frame(&frame(ARM), &v);
        assert_eq!(v.flight_mode(), FlightMode::Arming);

        let disarm_attitude: [(u8, u16); 6] = [(0, 10), (1, 1022), (2, 1022), (3, 1022), (4, 1800), (5, 1800)];
        rx.handle_frame(&frame(&disarm_attitude), &v);
        assert_eq!(v.flight_mode(), FlightMode::Disarming);
        assert_eq!(v.control_mode(), ControlMode::Attitude);
    }

    #[test]
    fn test_disarm_stick_leaves_fault_through_exit_fault() {
        let v = disarmed_vehicle_with(TransitionTable::EXIT_FAULT);
        let mut rx = locked_receiver(&v);
        v.force_fault();

        rx.handle_frame(&frame(DISARM), &v);
        assert_eq!(v.flight_mode(), FlightMode::ExitFault);

        let mut supervisor = FlightSupervisor::default();
        supervisor.tick(&v);
        assert_eq!(v.flight_mode(), FlightMode::Disarming);
    }

    #[test]
    fn test_disarm_stick_leaves_fault_directly_with_legacy_table() {
        let v = disarmed_vehicle();
        let mut rx = locked_receiver(&v);
        v.force_fault();

        rx.handle_frame(&frame(DISARM), &v);
        assert_eq!(v.flight_mode(), FlightMode::Disarming);
    }

    #[test]
    fn test_repeated_fault_exits_are_not_suppressed() {
        let v = disarmed_vehicle_with(TransitionTable::EXIT_FAULT);
        let mut rx = locked_receiver(&v);
        for _ in 0..2 {
            v.force_fault();
            rx.handle_frame(&frame(DISARM), &v);
            assert_eq!(v.flight_mode(), FlightMode::ExitFault);
            assert!(v.request_flight_mode(FlightMode::Disarming).is_accepted());
        }
    }

    #[test]
    fn test_refused_stick_request_latched_until_mode_changes() {
        let v = disarmed_vehicle();
        let mut rx = locked_receiver(&v);

        // Disarmed does not go to disarming; the refusal is remembered.
        rx.handle_frame(&frame(DISARM), &v);
        rx.handle_frame(&frame(DISARM), &v);
        assert_eq!(v.flight_mode(), FlightMode::Disarmed);
        assert_eq!(
            rx.refused_flight,
            Some((FlightMode::Disarmed, FlightMode::Disarming))
        );

        // Once the mode moves the same stick is honored again.
        rx.handle_frame(&frame(ARM), &v);
        assert_eq!(v.flight_mode(), FlightMode::Arming);
        assert_eq!(rx.refused_flight, None);
        rx.handle_frame(&frame(DISARM), &v);
        assert_eq!(v.flight_mode(), FlightMode::Disarming);
    }

    #[test]
    fn test_higher_priority_link_wins() {
        let v = disarmed_vehicle();
        let mut rx = locked_receiver(&v);
        v.submit_setpoint(Default::default(), Duration::from_millis(100), 5);
        assert_eq!(
            rx.handle_frame(&frame(CRUISE), &v),
            FrameOutcome::Submitted(SubmitResult::Refused)
        );
        assert_eq!(rx.stats().refused, 1);
    }

    #[test]
    fn test_malformed_and_foreign_frames_counted() {
        let v = disarmed_vehicle();
        let mut rx = locked_receiver(&v);
        assert_eq!(
            rx.handle_frame(&frame(&[(0, 1), (0, 2)]), &v),
            FrameOutcome::Malformed
        );
        assert_eq!(rx.handle_frame(&frame(&[(9, 1)]), &v), FrameOutcome::Untrusted);
        assert_eq!(rx.stats().malformed, 1);
        assert_eq!(rx.stats().untrusted, 16);
    }

    // Scripted source: each read_within call consumes one entry.
    struct MockSource {
        script: VecDeque<Result<Vec<u8>, InputError>>,
        windows: Vec<Duration>,
    }

    impl MockSource {
        fn new(script: Vec<Result<Vec<u8>, InputError>>) -> Self {
            Self {
                script: script.into(),
                windows: Vec::new(),
            }
        }
    }

    impl FrameSource for MockSource {
        fn read_within(
            &mut self,
            buf: &mut [u8],
            window: Duration,
        ) -> impl Future<Output = Result<usize, InputError>> {
            self.windows.push(window);
            let result = match self.script.pop_front() {
                Some(Ok(bytes)) => {
                    let n = bytes.len().min(buf.len());
                    buf[..n].copy_from_slice(&bytes[..n]);
                    Ok(n)
                }
                Some(Err(e)) => Err(e),
                None => Ok(0),
            };
            core::future::ready(result)
        }
    }

    // Helper to run a future to completion (simple blocking executor)
    fn block_on<F: Future>(mut f: F) -> F::Output {
        fn noop_raw_waker() -> RawWaker {
            fn noop(_: *const ()) {}
            fn clone(_: *const ()) -> RawWaker {
                noop_raw_waker()
            }
            static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, noop, noop, noop);
            RawWaker::new(core::ptr::null(), &VTABLE)
        }

        let waker = unsafe { Waker::from_raw(noop_raw_waker()) };
        let mut cx = Context::from_waker(&waker);

        // SAFETY: We don't move f after pinning
        let mut f = unsafe { Pin::new_unchecked(&mut f) };

        match f.as_mut().poll(&mut cx) {
            Poll::Ready(result) => result,
            Poll::Pending => panic!("Mock future returned Pending unexpectedly"),
        }
    }

    #[test]
    fn test_bridge_reads_frame_then_gap() {
        let v = disarmed_vehicle();
        let source = MockSource::new(vec![Ok(frame(CRUISE).0.to_vec()), Ok(vec![])]);
        let mut bridge = ReceiverBridge::new(source, SatelliteReceiver::default());

        assert_eq!(block_on(bridge.process_one(&v)), Ok(FrameOutcome::Untrusted));
        assert_eq!(
            bridge.source().windows,
            [Duration::from_millis(25), Duration::from_millis(5)]
        );
        assert_eq!(bridge.receiver().stats().desyncs, 0);
    }

    #[test]
    fn test_bridge_locks_and_submits() {
        let v = disarmed_vehicle();
        let mut script = Vec::new();
        for _ in 0..16 {
            script.push(Ok(frame(CRUISE).0.to_vec()));
            script.push(Ok(vec![]));
        }
        let mut bridge = ReceiverBridge::new(MockSource::new(script), SatelliteReceiver::default());
        for _ in 0..15 {
            block_on(bridge.process_one(&v)).unwrap();
        }
        assert_eq!(
            block_on(bridge.process_one(&v)),
            Ok(FrameOutcome::Submitted(SubmitResult::Accepted))
        );
        assert!(v.fetch_setpoint().is_some());
    }

    #[test]
    fn test_bridge_counts_short_read_and_desync() {
        let v = vehicle();
        let source = MockSource::new(vec![Ok(vec![0x00; 9]), Ok(vec![0xFF; 20])]);
        let mut bridge = ReceiverBridge::new(source, SatelliteReceiver::default());

        assert_eq!(block_on(bridge.process_one(&v)), Ok(FrameOutcome::NoFrame));
        let stats = bridge.receiver().stats();
        assert_eq!(stats.short_reads, 1);
        assert_eq!(stats.desyncs, 1);
    }

    #[test]
    fn test_bridge_reports_input_error() {
        let v = vehicle();
        let source = MockSource::new(vec![Err(InputError::Break), Ok(vec![])]);
        let mut bridge = ReceiverBridge::new(source, SatelliteReceiver::default());

        assert_eq!(block_on(bridge.process_one(&v)), Err(InputError::Break));
        assert_eq!(bridge.receiver().stats().io_errors, 1);
        // The gap read still ran.
        assert_eq!(bridge.source().windows.len(), 2);
    }
}
