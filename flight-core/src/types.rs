//! Core flight types: Setpoint, FlightMode, ControlMode.

use fixed::types::I16F16;

/// Desired next control state of the vehicle, in 16.16 fixed point.
///
/// Rotational axes are normalized so that `1.0` equals π rad/s in rate mode
/// and π rad in attitude mode. Which one `roll`/`pitch` carry depends on the
/// [`ControlMode`] active when the setpoint was mapped; `yaw_rate` is always a
/// rate.
///
/// # Example
///
/// ```
/// use flight_core::Setpoint;
/// use fixed::types::I16F16;
///
/// let sp = Setpoint::neutral();
/// assert_eq!(sp.thrust, I16F16::ZERO);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Setpoint {
    /// Collective thrust, 0.0 (idle) to 1.0 (full).
    pub thrust: I16F16,
    /// Roll rate or roll angle.
    pub roll: I16F16,
    /// Pitch rate or pitch angle.
    pub pitch: I16F16,
    /// Yaw rate.
    pub yaw_rate: I16F16,
}

impl Setpoint {
    /// Zero thrust, all axes centered.
    #[inline]
    #[must_use]
    pub const fn neutral() -> Self {
        Self {
            thrust: I16F16::ZERO,
            roll: I16F16::ZERO,
            pitch: I16F16::ZERO,
            yaw_rate: I16F16::ZERO,
        }
    }
}

impl Default for Setpoint {
    fn default() -> Self {
        Self::neutral()
    }
}

// `fixed` has no defmt support; log the raw 16.16 bits instead.
#[cfg(feature = "defmt")]
impl defmt::Format for Setpoint {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "Setpoint {{ thrust: {=i32}, roll: {=i32}, pitch: {=i32}, yaw_rate: {=i32} }}",
            self.thrust.to_bits(),
            self.roll.to_bits(),
            self.pitch.to_bits(),
            self.yaw_rate.to_bits()
        )
    }
}

/// Vehicle flight mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum FlightMode {
    /// Booting; nothing is trusted yet.
    Init = 0,
    /// Motors disabled, waiting for an arm request.
    Disarmed = 1,
    /// Ground configuration; setpoints are ignored.
    Config = 2,
    /// Motors spinning up at idle.
    Arming = 3,
    /// Flying; setpoints reach the motors.
    Armed = 4,
    /// Motors spinning down.
    Disarming = 5,
    /// Unrecoverable condition; motors disabled.
    Fault = 6,
    /// Leaving a fault, on the way back to disarming.
    ExitFault = 7,
    /// Mode unknown or not yet reported.
    NotAvailable = 8,
}

impl FlightMode {
    /// Every flight mode, in discriminant order.
    pub const ALL: [FlightMode; 9] = [
        FlightMode::Init,
        FlightMode::Disarmed,
        FlightMode::Config,
        FlightMode::Arming,
        FlightMode::Armed,
        FlightMode::Disarming,
        FlightMode::Fault,
        FlightMode::ExitFault,
        FlightMode::NotAvailable,
    ];

    /// Convert a discriminant back into a mode.
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Init),
            1 => Some(Self::Disarmed),
            2 => Some(Self::Config),
            3 => Some(Self::Arming),
            4 => Some(Self::Armed),
            5 => Some(Self::Disarming),
            6 => Some(Self::Fault),
            7 => Some(Self::ExitFault),
            8 => Some(Self::NotAvailable),
            _ => None,
        }
    }
}

/// How the attitude controller interprets roll and pitch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ControlMode {
    /// Roll and pitch are body rates.
    Rate = 0,
    /// Roll and pitch are absolute angles.
    Attitude = 1,
    /// Not selected, or faulted.
    NotAvailable = 2,
}

impl ControlMode {
    /// Every control mode, in discriminant order.
    pub const ALL: [ControlMode; 3] = [
        ControlMode::Rate,
        ControlMode::Attitude,
        ControlMode::NotAvailable,
    ];

    /// Convert a discriminant back into a mode.
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Rate),
            1 => Some(Self::Attitude),
            2 => Some(Self::NotAvailable),
            _ => None,
        }
    }
}
