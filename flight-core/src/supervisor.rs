//! Fixed-rate flight supervisor.
//!
//! [`FlightSupervisor::tick`] is called once per control period. It walks the
//! flight mode forward (init → disarming, arming → armed, disarming →
//! disarmed), enforces the setpoint timeout while armed, and decides what the
//! motor stage may do this tick. The control law itself lives downstream and
//! only ever sees an [`Actuation`].

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_time::Duration;

use crate::mailbox::DeadlineTimer;
use crate::notify::Notifier;
use crate::types::{ControlMode, FlightMode, Setpoint};
use crate::vehicle::Vehicle;

/// Supervisor timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SupervisorConfig {
    /// Control period; one [`FlightSupervisor::tick`] per period.
    pub tick: Duration,
    /// Time spent spinning up at idle before requesting armed.
    pub arming_hold: Duration,
    /// Time spent spinning down at idle before requesting disarmed.
    pub disarming_hold: Duration,
    /// Longest gap without a setpoint tolerated while armed.
    pub setpoint_timeout: Duration,
}

/// 500 Hz loop, 1 s spin-up, 200 ms spin-down, 500 ms setpoint timeout.
pub const DEFAULT_SUPERVISOR_CONFIG: SupervisorConfig = SupervisorConfig {
    tick: Duration::from_millis(2),
    arming_hold: Duration::from_millis(1000),
    disarming_hold: Duration::from_millis(200),
    setpoint_timeout: Duration::from_millis(500),
};

/// What the motor stage is allowed to do this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Actuation {
    /// Motors off.
    Disabled,
    /// Motors enabled at idle thrust.
    Idle,
    /// Run the control law toward `setpoint`.
    Track {
        setpoint: Setpoint,
        control_mode: ControlMode,
    },
}

/// State carried between ticks.
pub struct FlightSupervisor {
    config: SupervisorConfig,
    mode: FlightMode,
    ticks_in_mode: u32,
    ticks_without_setpoint: u32,
    last_setpoint: Option<Setpoint>,
}

impl FlightSupervisor {
    pub fn new(config: SupervisorConfig) -> Self {
        Self {
            config,
            mode: FlightMode::NotAvailable,
            ticks_in_mode: 0,
            ticks_without_setpoint: 0,
            last_setpoint: None,
        }
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    /// Run one control period against `vehicle`.
    pub fn tick<M: RawMutex, T: DeadlineTimer, N: Notifier>(
        &mut self,
        vehicle: &Vehicle<M, T, N>,
    ) -> Actuation {
        let mode = vehicle.flight_mode();
        if mode != self.mode {
            self.mode = mode;
            self.ticks_in_mode = 0;
            self.ticks_without_setpoint = 0;
            if mode != FlightMode::Armed {
                self.last_setpoint = None;
            }
        }
        self.ticks_in_mode = self.ticks_in_mode.saturating_add(1);

        match mode {
            FlightMode::Init => {
                self.advance(vehicle, FlightMode::Disarming);
                Actuation::Disabled
            }
            FlightMode::Arming => {
                if self.ticks_in_mode >= self.ticks(self.config.arming_hold) {
                    self.advance(vehicle, FlightMode::Armed);
                }
                Actuation::Idle
            }
            FlightMode::Armed => self.armed(vehicle),
            FlightMode::Disarming => {
                if self.ticks_in_mode >= self.ticks(self.config.disarming_hold) {
                    self.advance(vehicle, FlightMode::Disarmed);
                    Actuation::Disabled
                } else {
                    Actuation::Idle
                }
            }
            FlightMode::ExitFault => {
                self.advance(vehicle, FlightMode::Disarming);
                Actuation::Disabled
            }
            FlightMode::Disarmed
            | FlightMode::Config
            | FlightMode::Fault
            | FlightMode::NotAvailable => Actuation::Disabled,
        }
    }

    fn armed<M: RawMutex, T: DeadlineTimer, N: Notifier>(
        &mut self,
        vehicle: &Vehicle<M, T, N>,
    ) -> Actuation {
        match vehicle.fetch_setpoint() {
            Some(setpoint) => {
                self.ticks_without_setpoint = 0;
                self.last_setpoint = Some(setpoint);
            }
            None => {
                self.ticks_without_setpoint = self.ticks_without_setpoint.saturating_add(1);
                if self.ticks_without_setpoint >= self.ticks(self.config.setpoint_timeout) {
                    warn!(
                        "no setpoint for {} ticks while armed",
                        self.ticks_without_setpoint
                    );
                    vehicle.force_fault();
                    return Actuation::Disabled;
                }
            }
        }

        match self.last_setpoint {
            Some(setpoint) => Actuation::Track {
                setpoint,
                control_mode: vehicle.control_mode(),
            },
            None => Actuation::Idle,
        }
    }

    // A supervisor-driven step that is refused leaves the vehicle in an
    // unknown sequence; treat it as a fault.
    fn advance<M: RawMutex, T: DeadlineTimer, N: Notifier>(
        &self,
        vehicle: &Vehicle<M, T, N>,
        target: FlightMode,
    ) {
        if !vehicle.request_flight_mode(target).is_accepted() {
            vehicle.force_fault();
        }
    }

    fn ticks(&self, span: Duration) -> u32 {
        let per_tick = self.config.tick.as_ticks().max(1);
        u32::try_from(span.as_ticks() / per_tick).unwrap_or(u32::MAX).max(1)
    }
}

impl Default for FlightSupervisor {
    fn default() -> Self {
        Self::new(DEFAULT_SUPERVISOR_CONFIG)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailbox::tests::sp;
    use crate::notify::Notification;
    use crate::vehicle::tests::{vehicle, TestVehicle};

    /// Tick until the flight mode changes or `limit` ticks pass.
    fn run_until_change(sup: &mut FlightSupervisor, v: &TestVehicle, limit: u32) -> u32 {
        let start = v.flight_mode();
        for n in 1..=limit {
            sup.tick(v);
            if v.flight_mode() != start {
                return n;
            }
        }
        limit
    }

    fn armed_vehicle(sup: &mut FlightSupervisor) -> TestVehicle {
        let (v, _) = vehicle();
        sup.tick(&v);
        sup.tick(&v); // disarming
        run_until_change(sup, &v, 1000);
        assert_eq!(v.flight_mode(), FlightMode::Disarmed);
        assert!(v.request_flight_mode(FlightMode::Arming).is_accepted());
        run_until_change(sup, &v, 1000);
        assert_eq!(v.flight_mode(), FlightMode::Armed);
        v
    }

    #[test]
    fn test_init_requests_disarming() {
        let (v, rec) = vehicle();
        let mut sup = FlightSupervisor::default();
        assert_eq!(sup.tick(&v), Actuation::Disabled);
        assert_eq!(v.flight_mode(), FlightMode::Disarming);
        assert_eq!(rec.take(), [Notification::FlightMode(FlightMode::Disarming)]);
    }

    #[test]
    fn test_disarming_holds_then_disarms() {
        let (v, _) = vehicle();
        let mut sup = FlightSupervisor::default();
        sup.tick(&v);
        // 200 ms at 2 ms per tick.
        assert_eq!(run_until_change(&mut sup, &v, 1000), 100);
        assert_eq!(v.flight_mode(), FlightMode::Disarmed);
    }

    #[test]
    fn test_arming_idles_for_one_second() {
        let mut sup = FlightSupervisor::default();
        let (v, _) = vehicle();
        sup.tick(&v);
        run_until_change(&mut sup, &v, 1000);
        v.request_flight_mode(FlightMode::Arming);
        assert_eq!(sup.tick(&v), Actuation::Idle);
        assert_eq!(run_until_change(&mut sup, &v, 1000), 499);
        assert_eq!(v.flight_mode(), FlightMode::Armed);
    }

    #[test]
    fn test_armed_tracks_setpoint() {
        let mut sup = FlightSupervisor::default();
        let v = armed_vehicle(&mut sup);
        v.submit_setpoint(sp(1), Duration::from_millis(50), 1);
        assert_eq!(
            sup.tick(&v),
            Actuation::Track {
                setpoint: sp(1),
                control_mode: ControlMode::Rate
            }
        );
    }

    #[test]
    fn test_armed_holds_last_setpoint_then_faults() {
        let mut sup = FlightSupervisor::default();
        let v = armed_vehicle(&mut sup);
        v.submit_setpoint(sp(1), Duration::from_millis(50), 1);
        sup.tick(&v);
        v.reset_setpoint();

        for _ in 0..249 {
            assert!(matches!(sup.tick(&v), Actuation::Track { .. }));
        }
        assert_eq!(sup.tick(&v), Actuation::Disabled);
        assert_eq!(v.flight_mode(), FlightMode::Fault);
    }

    #[test]
    fn test_armed_without_any_setpoint_idles() {
        let mut sup = FlightSupervisor::default();
        let v = armed_vehicle(&mut sup);
        assert_eq!(sup.tick(&v), Actuation::Idle);
    }

    #[test]
    fn test_fault_keeps_motors_disabled() {
        let mut sup = FlightSupervisor::default();
        let v = armed_vehicle(&mut sup);
        v.force_fault();
        for _ in 0..10 {
            assert_eq!(sup.tick(&v), Actuation::Disabled);
        }
        assert_eq!(v.flight_mode(), FlightMode::Fault);
    }

    #[test]
    fn test_exit_fault_requests_disarming() {
        use crate::mailbox::tests::ManualTimer;
        use crate::mode::TransitionTable;
        use crate::notify::NullNotifier;
        use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

        let v: Vehicle<CriticalSectionRawMutex, _, _> =
            Vehicle::new(ManualTimer::new(), NullNotifier, TransitionTable::EXIT_FAULT);
        v.force_fault();
        assert!(v.request_flight_mode(FlightMode::ExitFault).is_accepted());
        let mut sup = FlightSupervisor::default();
        assert_eq!(sup.tick(&v), Actuation::Disabled);
        assert_eq!(v.flight_mode(), FlightMode::Disarming);
    }

    #[test]
    fn test_refused_step_forces_fault() {
        let (v, _) = vehicle();
        let mut sup = FlightSupervisor::default();
        sup.tick(&v);
        run_until_change(&mut sup, &v, 1000);
        v.request_flight_mode(FlightMode::Arming);
        // Hold the transition lock across the arming deadline.
        let guard = v.flight_mode_machine().hold_lock();
        run_until_change(&mut sup, &v, 1000);
        drop(guard);
        assert_eq!(v.flight_mode(), FlightMode::Fault);
    }
}
