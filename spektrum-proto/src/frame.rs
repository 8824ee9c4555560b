//! Raw satellite frame layout and channel storage.
//!
//! A frame is 16 bytes. Bytes 0-1 carry fade count / system type and are
//! ignored. Bytes 2-15 are seven big-endian words:
//!
//! ```text
//!  15  14     11 10                    0
//! ┌───┬─────────┬───────────────────────┐
//! │ - │ channel │         value         │
//! └───┴─────────┴───────────────────────┘
//! ```
//!
//! Channel id 15 marks an unused slot.

/// Bytes per frame.
pub const FRAME_LEN: usize = 16;

/// Channel words per frame.
pub const WORDS_PER_FRAME: usize = 7;

/// Number of addressable channel ids (0..=14).
pub const CHANNEL_COUNT: usize = 15;

/// Channel id marking an unused word.
pub const UNUSED_CHANNEL: u8 = 15;

const HEADER_LEN: usize = 2;
const CHANNEL_MASK: u16 = 0x7800;
const CHANNEL_SHIFT: u32 = 11;
const VALUE_MASK: u16 = 0x07FF;

/// One 16-byte frame as read from the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RawFrame(pub [u8; FRAME_LEN]);

impl RawFrame {
    /// Iterate the seven channel words in wire order, unused slots included.
    pub fn words(&self) -> impl Iterator<Item = ChannelWord> + '_ {
        self.0[HEADER_LEN..]
            .chunks_exact(2)
            .map(|pair| ChannelWord::from_raw(u16::from_be_bytes([pair[0], pair[1]])))
    }
}

impl From<[u8; FRAME_LEN]> for RawFrame {
    fn from(bytes: [u8; FRAME_LEN]) -> Self {
        Self(bytes)
    }
}

/// A decoded channel word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelWord {
    pub channel: u8,
    pub value: u16,
}

impl ChannelWord {
    #[inline]
    #[must_use]
    pub const fn from_raw(word: u16) -> Self {
        Self {
            channel: ((word & CHANNEL_MASK) >> CHANNEL_SHIFT) as u8,
            value: word & VALUE_MASK,
        }
    }

    /// Pack back into a wire word.
    #[inline]
    #[must_use]
    pub const fn to_raw(self) -> u16 {
        ((self.channel as u16) << CHANNEL_SHIFT) & CHANNEL_MASK | (self.value & VALUE_MASK)
    }

    #[inline]
    #[must_use]
    pub const fn is_unused(self) -> bool {
        self.channel == UNUSED_CHANNEL
    }
}

/// Channel values plus the mask of ids they were populated for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelSet {
    values: [u16; CHANNEL_COUNT],
    presence: u16,
}

impl ChannelSet {
    pub const fn new() -> Self {
        Self {
            values: [0; CHANNEL_COUNT],
            presence: 0,
        }
    }

    /// Store `value` for `channel`. Ids outside 0..=14 are ignored.
    #[inline]
    pub fn set(&mut self, channel: u8, value: u16) {
        if let Some(slot) = self.values.get_mut(usize::from(channel)) {
            *slot = value;
            self.presence |= 1u16 << channel;
        }
    }

    /// Value for `channel`, if it was populated.
    #[inline]
    #[must_use]
    pub fn get(&self, channel: u8) -> Option<u16> {
        if self.contains(channel) {
            self.values.get(usize::from(channel)).copied()
        } else {
            None
        }
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, channel: u8) -> bool {
        usize::from(channel) < CHANNEL_COUNT && self.presence & (1u16 << channel) != 0
    }

    /// Bitmask of populated channel ids.
    #[inline]
    #[must_use]
    pub const fn presence(&self) -> u16 {
        self.presence
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Build a frame from `(channel, value)` pairs; remaining words are unused.
    pub(crate) fn frame(words: &[(u8, u16)]) -> RawFrame {
        let mut bytes = [0u8; FRAME_LEN];
        bytes[0] = 0x03;
        bytes[1] = 0xB2;
        for i in 0..WORDS_PER_FRAME {
            let word = match words.get(i) {
                Some(&(channel, value)) => ChannelWord { channel, value },
                None => ChannelWord {
                    channel: UNUSED_CHANNEL,
                    value: 0x7FF,
                },
            };
            let [hi, lo] = word.to_raw().to_be_bytes();
            bytes[HEADER_LEN + 2 * i] = hi;
            bytes[HEADER_LEN + 2 * i + 1] = lo;
        }
        RawFrame(bytes)
    }

    #[test]
    fn test_word_layout() {
        // channel 3, value 1022 -> 0b0_0011_01111111110
        let word = ChannelWord::from_raw(0x1BFE);
        assert_eq!(word, ChannelWord { channel: 3, value: 1022 });
    }

    #[test]
    fn test_top_bit_ignored() {
        let word = ChannelWord::from_raw(0x8000 | 0x0800 | 5);
        assert_eq!(word, ChannelWord { channel: 1, value: 5 });
    }

    #[test]
    fn test_words_skip_header() {
        let f = frame(&[(0, 100), (4, 2047)]);
        let words: [ChannelWord; WORDS_PER_FRAME] = {
            let mut out = [ChannelWord { channel: 0, value: 0 }; WORDS_PER_FRAME];
            for (slot, w) in out.iter_mut().zip(f.words()) {
                *slot = w;
            }
            out
        };
        assert_eq!(words[0], ChannelWord { channel: 0, value: 100 });
        assert_eq!(words[1], ChannelWord { channel: 4, value: 2047 });
        assert!(words[2..].iter().all(|w| w.is_unused()));
    }

    #[test]
    fn test_channel_set_tracks_presence() {
        let mut cs = ChannelSet::new();
        cs.set(2, 512);
        cs.set(15, 1);
        assert_eq!(cs.presence(), 1 << 2);
        assert_eq!(cs.get(2), Some(512));
        assert_eq!(cs.get(3), None);
        assert_eq!(cs.get(15), None);
    }
}
