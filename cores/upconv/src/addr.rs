// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL-2.0) or the
// GNU General Public License Version 3 (GPL-3).
// If a copy of these licenses was not distributed with this file, you can
// obtain them at https://mozilla.org/MPL/2.0/ and http://www.gnu.org/licenses/.

//! Address map of the configuration bus on the reference board.

/// Mask partitioning the 7-bit address space between targets.
pub const ADR_MASK: u8 = 0b000_1111;

/// Miscellaneous status.
pub const REG0: u8 = 0;
/// Miscellaneous control.
pub const REG1: u8 = 1;
/// DAC control / status.
pub const REG2: u8 = 2;
/// Gain control.
pub const REG3: u8 = 3;
/// Upconverter control / status.
pub const REG4: u8 = 4;

/// DAC serial passthrough.
pub const DAC: u8 = 5;
/// Upconverter serial passthroughs, one per RF channel.
pub const MIXER0: u8 = 6;
pub const MIXER1: u8 = 7;
