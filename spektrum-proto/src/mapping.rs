//! Channel-to-setpoint mapping and stick commands.
//!
//! Satellite channels are 11-bit (0-2047) with neutral at 1022. Rotational
//! axes are center-referenced and scaled into 16.16 fixed point:
//!
//! | Control mode | Counts from center | Setpoint |
//! |--------------|--------------------|----------|
//! | rate         | 512                | 1.0 (π rad/s) |
//! | attitude     | 1024               | 1.0 (π rad)   |
//!
//! Throttle is not center-referenced: 2047 maps to just under 1.0.

use fixed::types::I16F16;
use fixed_macro::fixed;
use flight_core::{ControlMode, FlightMode, Setpoint};

use crate::frame::ChannelSet;

/// Satellite channel neutral value.
pub const SPEKTRUM_CENTER: u16 = 1022;

/// Satellite channel maximum value (11-bit).
pub const SPEKTRUM_MAX: u16 = 2047;

/// Throttle below this counts as "stick down" for stick commands.
pub const LOW_THROTTLE: u16 = 40;

/// 16.16 bits per count in rate mode (512 counts = 1.0).
pub const RATE_SCALE: i32 = 128;

/// 16.16 bits per count in attitude mode (1024 counts = 1.0).
pub const ANGLE_SCALE: i32 = 64;

/// 16.16 bits per throttle count (2047 counts ≈ 1.0).
pub const THROTTLE_SCALE: i32 = 32;

/// Channel assignment and sensitivity.
///
/// Customize this at compile-time by creating your own const.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RcMapping {
    pub throttle: u8,
    pub roll: u8,
    pub pitch: u8,
    pub yaw: u8,
    /// Above center with throttle low: disarm. Below: arm.
    pub arm_switch: u8,
    /// Above center with throttle low: attitude. Below: rate.
    pub mode_switch: u8,
    /// Applied to roll, pitch and yaw.
    pub multiplier: I16F16,
    /// Applied to thrust.
    pub throttle_multiplier: I16F16,
}

/// Standard Spektrum channel order.
///
/// - CH0 throttle, CH1 roll (aileron), CH2 pitch (elevator), CH3 yaw (rudder)
/// - CH4 flap switch: arm / disarm
/// - CH5 gear switch: rate / attitude
pub const DEFAULT_RC_MAPPING: RcMapping = RcMapping {
    throttle: 0,
    roll: 1,
    pitch: 2,
    yaw: 3,
    arm_switch: 4,
    mode_switch: 5,
    multiplier: fixed!(1: I16F16),
    throttle_multiplier: fixed!(1: I16F16),
};

/// Center-referenced stick value in 16.16, `scale` bits per count.
#[inline]
#[must_use]
pub fn stick_to_fixed(value: u16, scale: i32) -> I16F16 {
    I16F16::from_bits((i32::from(value) - i32::from(SPEKTRUM_CENTER)) * scale)
}

/// Throttle value in 16.16.
#[inline]
#[must_use]
pub fn throttle_to_fixed(value: u16) -> I16F16 {
    I16F16::from_bits(i32::from(value) * THROTTLE_SCALE)
}

/// Map a complete channel set to a setpoint.
///
/// Roll and pitch are angles in attitude mode and rates otherwise. Missing
/// channels read as neutral stick / zero throttle.
#[must_use]
pub fn channels_to_setpoint(
    channels: &ChannelSet,
    mapping: &RcMapping,
    control_mode: ControlMode,
) -> Setpoint {
    let axis_scale = match control_mode {
        ControlMode::Attitude => ANGLE_SCALE,
        ControlMode::Rate | ControlMode::NotAvailable => RATE_SCALE,
    };
    let stick = |channel: u8, scale: i32| {
        let value = channels.get(channel).unwrap_or(SPEKTRUM_CENTER);
        stick_to_fixed(value, scale).saturating_mul(mapping.multiplier)
    };

    Setpoint {
        thrust: throttle_to_fixed(channels.get(mapping.throttle).unwrap_or(0))
            .saturating_mul(mapping.throttle_multiplier),
        roll: stick(mapping.roll, axis_scale),
        pitch: stick(mapping.pitch, axis_scale),
        yaw_rate: stick(mapping.yaw, RATE_SCALE),
    }
}

fn throttle_low(channels: &ChannelSet, mapping: &RcMapping) -> bool {
    matches!(channels.get(mapping.throttle), Some(v) if v < LOW_THROTTLE)
}

/// Arm/disarm request encoded by the sticks, if any.
#[must_use]
pub fn flight_mode_command(channels: &ChannelSet, mapping: &RcMapping) -> Option<FlightMode> {
    if !throttle_low(channels, mapping) {
        return None;
    }
    match channels.get(mapping.arm_switch)? {
        v if v > SPEKTRUM_CENTER => Some(FlightMode::Disarming),
        v if v < SPEKTRUM_CENTER => Some(FlightMode::Arming),
        _ => None,
    }
}

/// Rate/attitude request encoded by the sticks, if any.
#[must_use]
pub fn control_mode_command(channels: &ChannelSet, mapping: &RcMapping) -> Option<ControlMode> {
    if !throttle_low(channels, mapping) {
        return None;
    }
    match channels.get(mapping.mode_switch)? {
        v if v > SPEKTRUM_CENTER => Some(ControlMode::Attitude),
        v if v < SPEKTRUM_CENTER => Some(ControlMode::Rate),
        _ => None,
    }
}
