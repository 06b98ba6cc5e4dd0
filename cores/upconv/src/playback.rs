// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL-2.0) or the
// GNU General Public License Version 3 (GPL-3).
// If a copy of these licenses was not distributed with this file, you can
// obtain them at https://mozilla.org/MPL/2.0/ and http://www.gnu.org/licenses/.

use common::components::sync::Synchronizer;

use crate::memory::{Channel, SampleMemory, CHANNELS};

/// Fixed per-channel words substituted for memory output while
/// test-pattern mode is enabled.
pub const TEST_PATTERNS: [u64; CHANNELS] = [
    0x1A1A_7A7A_1A1A_7A7A,
    0x1616_B6B6_1616_B6B6,
    0xAAAA_EAEA_AAAA_EAEA,
    0xC6C6_4545_C6C6_4545,
];

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
enum State {
    #[default]
    Idle,
    Playing,
}

/// The sequencer streaming sample memory to the DAC bus.
///
/// It runs in its own clock domain, one tick per sample clock. The
/// play request originates in the serial clock domain and is taken
/// through a two-stage synchronizer before the state machine sees it.
/// While playing, the row address free-runs modulo the memory depth;
/// the frame strobe marks the first row of a run so the consumer can
/// align on it.
#[derive(Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Playback {
    state: State,
    address: usize,
    output_enable: bool,
    frame_strobe: bool,
    play: Synchronizer<bool>,
}

/// One sample tick of output on the parallel DAC bus.
#[derive(Debug, Copy, Clone)]
pub struct DacFrame {
    /// Asserted for exactly the first row of a playback run.
    pub frame_strobe: bool,
    /// Asserted while samples are being streamed.
    pub output_enable: bool,
    /// One packed row per channel, in `A, B, C, D` order.
    pub data: [u64; CHANNELS],
}

impl Playback {
    /// Advance by one sample clock tick. `play` is the raw request bit
    /// from the register file; `test_pattern` substitutes the fixed
    /// pattern words for memory output.
    pub fn tick(&mut self, play: bool, test_pattern: bool, memory: &SampleMemory) -> DacFrame {
        let play = self.play.tick(play);
        match self.state {
            State::Idle => {
                self.address = 0;
                self.frame_strobe = false;
                self.output_enable = false;
                if play {
                    self.state = State::Playing;
                    self.frame_strobe = true;
                    self.output_enable = true;
                }
            }
            State::Playing => {
                self.frame_strobe = false;
                if !play {
                    self.state = State::Idle;
                    self.output_enable = false;
                    self.address = 0;
                } else if self.address >= memory.depth() - 1 {
                    self.address = 0;
                } else {
                    self.address += 1;
                }
            }
        }

        let mask = if test_pattern { u64::MAX } else { 0 };
        let mut data = [0; CHANNELS];
        for (out, (channel, pattern)) in data
            .iter_mut()
            .zip(Channel::ALL.into_iter().zip(TEST_PATTERNS))
        {
            let word = memory.word(channel, self.address);
            *out = (word & !mask) | (pattern & mask);
        }
        DacFrame {
            frame_strobe: self.frame_strobe,
            output_enable: self.output_enable,
            data,
        }
    }

    /// Row address emitted on the current tick.
    pub fn address(&self) -> usize {
        self.address
    }

    pub fn playing(&self) -> bool {
        self.state == State::Playing
    }
}
