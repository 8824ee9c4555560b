//! Merges trusted frames until the dialect's full channel set has been seen.

use flight_core::{ControlMode, Setpoint};

use crate::frame::ChannelSet;
use crate::mapping::{channels_to_setpoint, RcMapping};

/// Running merge of trusted frames.
///
/// A dialect may need several frames to deliver every channel once. Values
/// are kept across completions, so a channel that arrives once per cycle is
/// always read at its latest value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelAccumulator {
    channels: ChannelSet,
    merged_mask: u16,
}

impl ChannelAccumulator {
    pub const fn new() -> Self {
        Self {
            channels: ChannelSet::new(),
            merged_mask: 0,
        }
    }

    /// Store every channel in `presence` from `cs`.
    pub fn merge(&mut self, cs: &ChannelSet, presence: u16) {
        for channel in 0..crate::frame::CHANNEL_COUNT as u8 {
            if presence & (1u16 << channel) != 0 {
                if let Some(value) = cs.get(channel) {
                    self.channels.set(channel, value);
                }
            }
        }
        self.merged_mask |= presence;
    }

    /// Map the merged channels to a setpoint once every channel in
    /// `complete_mask` has been seen since the last completion.
    ///
    /// The merge mask is cleared on success; the channel values are kept and
    /// remain readable through [`ChannelAccumulator::channels`].
    pub fn take_if_complete(
        &mut self,
        complete_mask: u16,
        mapping: &RcMapping,
        control_mode: ControlMode,
    ) -> Option<Setpoint> {
        if complete_mask == 0 || self.merged_mask != complete_mask {
            return None;
        }
        self.merged_mask = 0;
        Some(channels_to_setpoint(&self.channels, mapping, control_mode))
    }

    /// Latest value of every channel merged so far.
    pub fn channels(&self) -> &ChannelSet {
        &self.channels
    }

    #[inline]
    #[must_use]
    pub const fn merged_mask(&self) -> u16 {
        self.merged_mask
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{DEFAULT_RC_MAPPING, SPEKTRUM_CENTER};
    use fixed::types::I16F16;

    fn set(values: &[(u8, u16)]) -> (ChannelSet, u16) {
        let mut cs = ChannelSet::new();
        for &(ch, v) in values {
            cs.set(ch, v);
        }
        let presence = cs.presence();
        (cs, presence)
    }

    #[test]
    fn test_single_frame_dialect_completes_each_frame() {
        let mut acc = ChannelAccumulator::new();
        let (cs, mask) = set(&[(0, 100), (1, SPEKTRUM_CENTER), (2, SPEKTRUM_CENTER), (3, SPEKTRUM_CENTER)]);
        acc.merge(&cs, mask);
        assert!(acc.take_if_complete(mask, &DEFAULT_RC_MAPPING, ControlMode::Rate).is_some());
        assert_eq!(acc.merged_mask(), 0);
        assert!(acc.take_if_complete(mask, &DEFAULT_RC_MAPPING, ControlMode::Rate).is_none());
    }

    #[test]
    fn test_two_frames_needed() {
        let mut acc = ChannelAccumulator::new();
        let (a, mask_a) = set(&[(0, 100), (1, 1534)]);
        let (b, mask_b) = set(&[(2, SPEKTRUM_CENTER), (3, SPEKTRUM_CENTER)]);
        let complete = mask_a | mask_b;

        acc.merge(&a, mask_a);
        assert_eq!(acc.take_if_complete(complete, &DEFAULT_RC_MAPPING, ControlMode::Rate), None);

        acc.merge(&b, mask_b);
        let sp = acc
            .take_if_complete(complete, &DEFAULT_RC_MAPPING, ControlMode::Rate)
            .unwrap();
        assert_eq!(sp.roll, I16F16::from_num(1));
    }

    #[test]
    fn test_latest_value_wins_within_cycle() {
        let mut acc = ChannelAccumulator::new();
        let (first, mask) = set(&[(0, 100), (1, 1534)]);
        let (second, _) = set(&[(0, 100), (1, SPEKTRUM_CENTER)]);
        acc.merge(&first, mask);
        acc.merge(&second, mask);
        let sp = acc
            .take_if_complete(mask, &DEFAULT_RC_MAPPING, ControlMode::Rate)
            .unwrap();
        assert_eq!(sp.roll, I16F16::ZERO);
    }

    #[test]
    fn test_unlocked_mask_never_completes() {
        let mut acc = ChannelAccumulator::new();
        assert_eq!(acc.take_if_complete(0, &DEFAULT_RC_MAPPING, ControlMode::Rate), None);
    }
}
