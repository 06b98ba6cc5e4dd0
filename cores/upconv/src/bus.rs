// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL-2.0) or the
// GNU General Public License Version 3 (GPL-3).
// If a copy of these licenses was not distributed with this file, you can
// obtain them at https://mozilla.org/MPL/2.0/ and http://www.gnu.org/licenses/.

use arrayvec::ArrayVec;
use common::numutil::NumExt;

use crate::{Board, ConfigError, Target};

/// Width of the address phase, in bits.
pub const ADR_BITS: u32 = 7;
/// Width of the data phase, in bits.
pub const DATA_BITS: u32 = 16;
/// Total bits shifted per transaction.
pub const FRAME_BITS: u32 = ADR_BITS + 1 + DATA_BITS;

/// Upper bound on routed bus targets.
const MAX_TARGETS: usize = 16;

/// Pack a transaction into wire order: `[ADR(7) | WE(1) | DATA(16)]`,
/// most significant bit shifted first.
pub fn frame(adr: u8, we: bool, data: u16) -> u32 {
    (((adr & 0x7F) as u32) << (DATA_BITS + 1)) | ((we as u32) << DATA_BITS) | data as u32
}

#[derive(Debug, Copy, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
struct Entry<T> {
    adr: u8,
    mask: u8,
    target: T,
}

/// The set of `(address, mask)` ranges routed by the bridge.
///
/// Ranges must be disjoint: an incoming address masked by an entry's
/// mask must match at most one entry. `connect` enforces this at
/// configuration time; there is no runtime recovery. The table is
/// bounded at 16 entries, twice the reference map.
#[derive(Debug)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct AddressMap<T: Copy> {
    entries: ArrayVec<Entry<T>, MAX_TARGETS>,
}

impl<T: Copy> Default for AddressMap<T> {
    fn default() -> Self {
        Self {
            entries: ArrayVec::new(),
        }
    }
}

impl<T: Copy> AddressMap<T> {
    /// Route `adr` under `mask` to the given target. The address is
    /// stored pre-masked. Fails if the new range intersects any
    /// previously connected one.
    pub fn connect(&mut self, adr: u8, mask: u8, target: T) -> Result<(), ConfigError> {
        let adr = adr & mask;
        for other in &self.entries {
            // Two ranges intersect iff they agree on every bit both
            // masks select.
            if adr & other.mask == other.adr & mask {
                return Err(ConfigError::AddressOverlap {
                    adr,
                    mask,
                    other_adr: other.adr,
                    other_mask: other.mask,
                });
            }
        }
        self.entries.push(Entry { adr, mask, target });
        Ok(())
    }

    /// The target strobed by the given incoming address, if any.
    pub fn resolve(&self, adr: u8) -> Option<T> {
        self.entries
            .iter()
            .find(|e| adr & e.mask == e.adr)
            .map(|e| e.target)
    }
}

// Wire order of one 24-bit transaction, MSB first:
//
//   A6 A5 A4 A3 A2 A1 A0  WE  D15 .. D0
//   \__ address phase __/  |  \_ data phase _/
//                    read dispatch
//
// The read value of the addressed target is latched into the data
// shift register on the WE edge and leaves MSB-first on the data-out
// line during the data phase, while the incoming data bits fill the
// register from the low end.

/// Bit-level engine of the configuration bus.
///
/// The bridge consumes one incoming bit per serial clock edge while
/// frame select is asserted, driven by a down-counter that reloads
/// whenever frame select is released. A frame abandoned before the
/// counter reaches zero commits nothing. The read side of a target is
/// dispatched as soon as the address phase completes, strictly before
/// any write of the same frame.
#[derive(Debug)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct SerialBridge {
    /// Bits still to be transferred in the current frame, minus one.
    n: u32,
    selected: bool,
    adr: u8,
    dat: u16,
    we: bool,
    /// Passthrough port strobed by the current frame.
    ext: Option<usize>,
}

impl SerialBridge {
    pub(crate) fn set_select(board: &mut Board, selected: bool) {
        if selected && !board.bridge.selected {
            board.bridge.adr = 0;
            board.bridge.dat = 0;
            board.bridge.we = false;
        }
        if !selected {
            // Deselect reaches a strobed passthrough port at the end of
            // the frame, and reloads the bit counter.
            if let Some(port) = board.bridge.ext.take() {
                board.ext_select(port, false);
            }
            board.bridge.n = FRAME_BITS - 1;
        }
        board.bridge.selected = selected;
    }

    /// One rising serial clock edge. Returns the state of the data-out
    /// line for this bit period.
    pub(crate) fn clock(board: &mut Board, sdi: bool) -> bool {
        if !board.bridge.selected {
            return board.bridge.dat.is_bit(15);
        }

        let n = board.bridge.n;
        let mut sdo = board.bridge.dat.is_bit(15);
        if let Some(port) = board.bridge.ext {
            // A strobed port owns the rest of the frame: it sees every
            // clock and its readback replaces the bridge output.
            sdo = board.ext_clock(port, sdi);
        }

        if n > DATA_BITS {
            // Address phase.
            board.bridge.adr = ((board.bridge.adr << 1) | sdi as u8) & 0x7F;
        } else if n == DATA_BITS {
            // The WE bit is on the wire and the address is complete.
            // Dispatch the read now; a write later in the same frame
            // must not clobber the readout.
            board.bridge.we = sdi;
            board.bridge.dat = 0;
            match board.map.resolve(board.bridge.adr) {
                Some(Target::Reg(index)) => {
                    let value = board.reg_read(index);
                    board.bridge.dat = value;
                }
                Some(Target::Ext(port)) => {
                    board.bridge.ext = Some(port);
                    board.ext_select(port, true);
                }
                None => log::debug!("read of unmapped address {:#04X}", board.bridge.adr),
            }
        } else {
            // Data phase: the readback shifts out of the high end while
            // write data enters the low end.
            board.bridge.dat = (board.bridge.dat << 1) | sdi as u16;
        }

        if n == 0 {
            if board.bridge.we {
                match board.map.resolve(board.bridge.adr) {
                    Some(Target::Reg(index)) => {
                        let value = board.bridge.dat;
                        board.regs.write(index, value);
                    }
                    // A strobed port received the raw stream instead.
                    Some(Target::Ext(_)) => (),
                    None => log::debug!("write to unmapped address {:#04X}", board.bridge.adr),
                }
            }
        } else {
            board.bridge.n = n - 1;
        }
        sdo
    }
}

impl Default for SerialBridge {
    fn default() -> Self {
        Self {
            n: FRAME_BITS - 1,
            selected: false,
            adr: 0,
            dat: 0,
            we: false,
            ext: None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn frame_packing() {
        assert_eq!(frame(0x2, true, 3 << 4), 0x2 << 17 | 1 << 16 | 3 << 4);
        assert_eq!(frame(0x7F, false, 0xFFFF), 0xFE_FFFF);
    }

    #[test]
    fn overlapping_ranges_rejected() {
        let mut map = AddressMap::default();
        map.connect(0x00, 0x0F, 1u8).unwrap();
        let err = map.connect(0x10, 0x0F, 2u8).unwrap_err();
        assert_eq!(
            err,
            ConfigError::AddressOverlap {
                adr: 0x00,
                mask: 0x0F,
                other_adr: 0x00,
                other_mask: 0x0F,
            }
        );
    }

    #[test]
    fn partial_mask_overlap_rejected() {
        let mut map = AddressMap::default();
        map.connect(0b0000, 0b1100, 1u8).unwrap();
        // Address 0b0011 matches both ranges.
        assert!(map.connect(0b0011, 0b0011, 2u8).is_err());
    }

    #[test]
    fn disjoint_ranges_resolve_independently() {
        let mut map = AddressMap::default();
        for i in 0..8u8 {
            map.connect(i, 0x0F, i).unwrap();
        }
        assert_eq!(map.resolve(0x05), Some(5));
        // Only the masked bits take part in the match.
        assert_eq!(map.resolve(0x75), Some(5));
        assert_eq!(map.resolve(0x0C), None);
    }
}
