//! Guarded mode state machines.
//!
//! A [`ModeMachine`] holds one mode value. Reads are lock-free snapshots of an
//! atomic; transitions are checked against a [`TransitionTable`] and serialize
//! through a mutex that is only ever *tried*, so a contended request is refused
//! instead of waiting. [`ModeMachine::force_fault`] bypasses both the table and
//! the lock.

use core::future::Future;
use core::marker::PhantomData;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::mutex::Mutex;
use embassy_time::{with_timeout, Duration};
use portable_atomic::{AtomicU8, Ordering};

use crate::types::{ControlMode, FlightMode};

/// Upper bound on the number of states a table can describe.
pub const MAX_STATES: usize = 16;

/// A mode value that can live in a [`ModeMachine`].
pub trait ModeState: Copy + Eq {
    /// Mode entered by [`ModeMachine::force_fault`].
    const FAULT: Self;

    /// Dense index below [`MAX_STATES`].
    fn index(self) -> u8;

    /// Inverse of [`ModeState::index`].
    fn from_index(index: u8) -> Option<Self>;
}

impl ModeState for FlightMode {
    const FAULT: Self = FlightMode::Fault;

    fn index(self) -> u8 {
        self as u8
    }

    fn from_index(index: u8) -> Option<Self> {
        FlightMode::from_u8(index)
    }
}

impl ModeState for ControlMode {
    const FAULT: Self = ControlMode::NotAvailable;

    fn index(self) -> u8 {
        self as u8
    }

    fn from_index(index: u8) -> Option<Self> {
        ControlMode::from_u8(index)
    }
}

/// Allow-list of transitions: for each state, a bitmask of permitted targets.
///
/// Tables are plain data so that alternative policies are a configuration
/// choice. For flight modes two are provided:
///
/// - [`TransitionTable::LEGACY`]: `fault → disarming`
/// - [`TransitionTable::EXIT_FAULT`]: `fault → exit_fault → disarming`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransitionTable<S> {
    edges: [u16; MAX_STATES],
    _state: PhantomData<S>,
}

impl<S: ModeState> TransitionTable<S> {
    /// Build a table from raw per-state target bitmasks, indexed by
    /// [`ModeState::index`].
    #[must_use]
    pub const fn from_edges(edges: [u16; MAX_STATES]) -> Self {
        Self {
            edges,
            _state: PhantomData,
        }
    }

    /// Whether `from → to` is on the allow-list.
    #[inline]
    #[must_use]
    pub fn allows(&self, from: S, to: S) -> bool {
        let from = usize::from(from.index());
        let to = to.index();
        from < MAX_STATES && to < MAX_STATES as u8 && self.edges[from] & (1u16 << to) != 0
    }
}

const fn flight_targets(targets: &[FlightMode]) -> u16 {
    let mut mask: u16 = 0;
    let mut i = 0;
    while i < targets.len() {
        mask |= 1u16 << (targets[i] as u16);
        i += 1;
    }
    mask
}

const fn flight_table(exit_fault: bool) -> TransitionTable<FlightMode> {
    use FlightMode::*;

    let mut edges = [0u16; MAX_STATES];
    edges[Init as usize] = flight_targets(&[Disarming]);
    edges[Disarmed as usize] = flight_targets(&[Config, Init, Arming, Armed, Fault]);
    edges[Config as usize] = flight_targets(&[Disarming, Fault]);
    edges[Arming as usize] = flight_targets(&[Armed, Disarming, Fault]);
    edges[Armed as usize] = flight_targets(&[Disarming, Fault]);
    edges[Disarming as usize] = flight_targets(&[Disarmed, Fault]);
    if exit_fault {
        edges[Fault as usize] = flight_targets(&[ExitFault]);
        edges[ExitFault as usize] = flight_targets(&[Disarming]);
    } else {
        edges[Fault as usize] = flight_targets(&[Disarming]);
    }
    TransitionTable::from_edges(edges)
}

impl TransitionTable<FlightMode> {
    /// Faults are cleared by going straight to disarming.
    pub const LEGACY: Self = flight_table(false);

    /// Faults are cleared through an explicit exit-fault step.
    pub const EXIT_FAULT: Self = flight_table(true);
}

impl TransitionTable<ControlMode> {
    /// Rate and attitude toggle; from not-available either may be selected.
    pub const TOGGLE: Self = {
        let rate: u16 = 1 << (ControlMode::Rate as u16);
        let attitude: u16 = 1 << (ControlMode::Attitude as u16);
        let mut edges = [0u16; MAX_STATES];
        edges[ControlMode::Rate as usize] = attitude;
        edges[ControlMode::Attitude as usize] = rate;
        edges[ControlMode::NotAvailable as usize] = rate | attitude;
        TransitionTable::from_edges(edges)
    };
}

/// Outcome of a transition request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Transition<S> {
    /// The machine moved from `from` to the requested target.
    Accepted { from: S },
    /// Nothing changed; the machine is still in `current`.
    Refused { current: S },
}

impl<S> Transition<S> {
    #[inline]
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        matches!(self, Transition::Accepted { .. })
    }
}

/// Guarded finite state machine over a [`ModeState`].
pub struct ModeMachine<M: RawMutex, S: ModeState> {
    current: AtomicU8,
    table: TransitionTable<S>,
    lock: Mutex<M, ()>,
}

/// Flight-mode machine.
pub type FlightModeMachine<M> = ModeMachine<M, FlightMode>;

/// Control-mode machine.
pub type ControlModeMachine<M> = ModeMachine<M, ControlMode>;

impl<M: RawMutex, S: ModeState> ModeMachine<M, S> {
    /// Create a machine in `initial`, guarded by `table`.
    pub fn new(initial: S, table: TransitionTable<S>) -> Self {
        Self {
            current: AtomicU8::new(initial.index()),
            table,
            lock: Mutex::new(()),
        }
    }

    /// Non-blocking snapshot of the current mode.
    #[must_use]
    pub fn current(&self) -> S {
        self.decode(self.current.load(Ordering::Acquire))
    }

    /// The table this machine enforces.
    pub fn table(&self) -> &TransitionTable<S> {
        &self.table
    }

    /// Request a transition to `target` without waiting.
    ///
    /// Refused when `current → target` is not on the allow-list, or when
    /// another request holds the transition lock. A refusal reports the
    /// unchanged current mode to the caller only.
    pub fn request_transition(&self, target: S) -> Transition<S> {
        match self.lock.try_lock() {
            Ok(_guard) => self.apply(target),
            Err(_) => Transition::Refused {
                current: self.current(),
            },
        }
    }

    /// Request a transition, waiting at most `wait` for the transition lock.
    pub fn request_transition_within(
        &self,
        target: S,
        wait: Duration,
    ) -> impl Future<Output = Transition<S>> + '_ {
        async move {
            match with_timeout(wait, self.lock.lock()).await {
                Ok(_guard) => self.apply(target),
                Err(_) => Transition::Refused {
                    current: self.current(),
                },
            }
        }
    }

    /// Enter the fault mode unconditionally. Returns the mode that was
    /// interrupted.
    pub fn force_fault(&self) -> S {
        self.decode(self.current.swap(S::FAULT.index(), Ordering::AcqRel))
    }

    // Caller holds `self.lock`. A concurrent `force_fault` is not serialized
    // by the lock, so the swap is a compare-exchange against the mode the
    // table was checked for.
    fn apply(&self, target: S) -> Transition<S> {
        let from = self.current();
        if !self.table.allows(from, target) {
            return Transition::Refused { current: from };
        }
        match self.current.compare_exchange(
            from.index(),
            target.index(),
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => Transition::Accepted { from },
            Err(now) => Transition::Refused {
                current: self.decode(now),
            },
        }
    }

    fn decode(&self, raw: u8) -> S {
        S::from_index(raw).unwrap_or(S::FAULT)
    }

    #[cfg(test)]
    pub(crate) fn hold_lock(&self) -> embassy_sync::mutex::MutexGuard<'_, M, ()> {
        self.lock.try_lock().unwrap()
    }
}
