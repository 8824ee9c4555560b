//! Frame dialect learning and decoding.
//!
//! Satellite receivers spread the logical channel set over one or more
//! repeating frame "dialects": each dialect carries a fixed subset of channel
//! ids. Which subsets are in use depends on the receiver and transmitter
//! firmware, so the decoder learns them by observation. Every frame shape
//! (its presence mask) votes for a slot; once one slot reaches
//! [`CONFIDENCE_MAX`], every slot above [`CONFIDENCE_THRESHOLD`] is accepted as
//! part of the dialect and the decoder locks.
//!
//! Until then no frame is trusted. After locking, only frames whose shape
//! matches a confident slot are.

use crate::frame::{ChannelSet, RawFrame};

/// Confidence at which a slot locks the decoder.
pub const CONFIDENCE_MAX: u8 = 15;

/// Slots above this confidence belong to the locked dialect; slots below it
/// are discarded on shape churn.
pub const CONFIDENCE_THRESHOLD: u8 = 10;

/// Number of frame shapes tracked at once.
pub const MAX_FRAME_SHAPES: usize = 3;

/// A remembered frame shape and how often it has been seen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DialectSlot {
    pub mask: u16,
    pub confidence: u8,
}

impl DialectSlot {
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.confidence == 0
    }

    #[inline]
    #[must_use]
    pub const fn is_confident(&self) -> bool {
        self.confidence > CONFIDENCE_THRESHOLD
    }
}

/// Learned dialect, owned by the ingest worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DecoderState {
    slots: [DialectSlot; MAX_FRAME_SHAPES],
    locked: bool,
    complete_mask: u16,
}

/// Outcome of [`decode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeResult {
    /// Frame matches the locked dialect. Carries the channels and the frame's
    /// presence mask.
    Trusted(ChannelSet, u16),
    /// Dialect not locked yet, or frame shape not part of it.
    Untrusted,
    /// A channel id repeats within the frame.
    Malformed,
}

impl DecoderState {
    pub const fn new() -> Self {
        Self {
            slots: [DialectSlot {
                mask: 0,
                confidence: 0,
            }; MAX_FRAME_SHAPES],
            locked: false,
            complete_mask: 0,
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_locked(&self) -> bool {
        self.locked
    }

    /// OR of every confident slot's mask; zero until locked.
    #[inline]
    #[must_use]
    pub const fn complete_mask(&self) -> u16 {
        self.complete_mask
    }

    pub fn slots(&self) -> &[DialectSlot; MAX_FRAME_SHAPES] {
        &self.slots
    }

    /// Vote for the frame shape `mask`.
    ///
    /// A matching slot gains confidence (saturating at [`CONFIDENCE_MAX`]) and
    /// locks the decoder when it gets there. An unseen shape takes the first
    /// empty slot. With all slots taken by other shapes, every slot below
    /// the threshold is cleared so discovery can restart; slots at or above
    /// it survive.
    pub fn lock_frame_shape(&mut self, mask: u16) {
        if let Some(slot) = self
            .slots
            .iter_mut()
            .find(|slot| !slot.is_empty() && slot.mask == mask)
        {
            if slot.confidence < CONFIDENCE_MAX {
                slot.confidence += 1;
            }
            if slot.confidence == CONFIDENCE_MAX && !self.locked {
                self.locked = true;
                self.complete_mask = self
                    .slots
                    .iter()
                    .filter(|slot| slot.is_confident())
                    .fold(0, |acc, slot| acc | slot.mask);
                info!("dialect locked, channel mask {:#x}", self.complete_mask);
            }
            return;
        }

        if let Some(slot) = self.slots.iter_mut().find(|slot| slot.is_empty()) {
            *slot = DialectSlot {
                mask,
                confidence: 1,
            };
            return;
        }

        debug!("frame shape churn, purging unconfident slots");
        for slot in self.slots.iter_mut() {
            if slot.confidence < CONFIDENCE_THRESHOLD {
                *slot = DialectSlot::default();
            }
        }
    }

    fn is_dialect_shape(&self, mask: u16) -> bool {
        self.slots
            .iter()
            .any(|slot| slot.is_confident() && slot.mask == mask)
    }
}

/// Decode one frame against the learned dialect.
///
/// A repeated channel id yields [`DecodeResult::Malformed`] before `state` is
/// touched; a frame of only unused words is untrusted and not voted on.
/// While unlocked, the frame's shape is voted on and the frame is
/// [`Untrusted`](DecodeResult::Untrusted), including the frame that completes
/// the lock.
pub fn decode(raw: &RawFrame, state: &mut DecoderState) -> DecodeResult {
    let mut channels = ChannelSet::new();
    let mut presence: u16 = 0;

    for word in raw.words().filter(|word| !word.is_unused()) {
        let bit = 1u16 << word.channel;
        if presence & bit != 0 {
            return DecodeResult::Malformed;
        }
        presence |= bit;
        channels.set(word.channel, word.value);
    }

    // A frame without a single channel carries no shape to learn.
    if presence == 0 {
        return DecodeResult::Untrusted;
    }

    if state.locked {
        if state.is_dialect_shape(presence) {
            DecodeResult::Trusted(channels, presence)
        } else {
            DecodeResult::Untrusted
        }
    } else {
        state.lock_frame_shape(presence);
        DecodeResult::Untrusted
    }
}
