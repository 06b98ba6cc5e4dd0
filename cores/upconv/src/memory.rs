// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL-2.0) or the
// GNU General Public License Version 3 (GPL-3).
// If a copy of these licenses was not distributed with this file, you can
// obtain them at https://mozilla.org/MPL/2.0/ and http://www.gnu.org/licenses/.

use alloc::vec::Vec;

use crate::ConfigError;

/// Number of logical DAC channels.
pub const CHANNELS: usize = 4;

/// One of the four DAC channels.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Channel {
    A,
    B,
    C,
    D,
}

impl Channel {
    pub const ALL: [Channel; CHANNELS] = [Channel::A, Channel::B, Channel::C, Channel::D];
}

/// Sample memory streamed to the DAC during playback.
///
/// Each channel holds packed rows of four 16-bit samples,
/// `(S3 S2 S1 S0)` from high to low lane. Contents are loaded once at
/// configuration time and are read-only afterwards.
#[derive(Debug)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct SampleMemory {
    channels: [Vec<u64>; CHANNELS],
    depth: usize,
}

impl SampleMemory {
    /// Build the memory from a logical sample count and one word table
    /// per channel, in `A, B, C, D` order. The count must be a non-zero
    /// multiple of 4 and every channel must supply `count / 4` words.
    pub fn new(count: usize, channels: [Vec<u64>; CHANNELS]) -> Result<Self, ConfigError> {
        if count == 0 || count % 4 != 0 {
            return Err(ConfigError::SampleCount { count });
        }
        let depth = count / 4;
        for (words, channel) in channels.iter().zip(Channel::ALL) {
            if words.len() != depth {
                return Err(ConfigError::ChannelLength {
                    channel,
                    words: words.len(),
                    expected: depth,
                });
            }
        }
        Ok(Self { channels, depth })
    }

    /// The pattern table shipped with the reference configuration.
    pub fn reference_pattern() -> Self {
        Self {
            channels: [
                alloc::vec![0x7A7A_1A1A_7A7A_1A1A; 2],
                alloc::vec![0xB6B6_1616_B6B6_1616; 2],
                alloc::vec![0xEAEA_AAAA_EAEA_AAAA; 2],
                alloc::vec![0x4545_C6C6_4545_C6C6; 2],
            ],
            depth: 2,
        }
    }

    /// Number of rows per channel.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// The packed row of the given channel at the given row address.
    pub fn word(&self, channel: Channel, address: usize) -> u64 {
        self.channels[channel as usize][address]
    }
}
