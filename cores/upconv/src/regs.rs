// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL-2.0) or the
// GNU General Public License Version 3 (GPL-3).
// If a copy of these licenses was not distributed with this file, you can
// obtain them at https://mozilla.org/MPL/2.0/ and http://www.gnu.org/licenses/.

use alloc::vec::Vec;

use modular_bitfield::{bitfield, specifiers::*};

/// Protocol revision reported in REG0. Increment when the register or
/// pin behavior changes.
pub const PROTO_REV: u8 = 0;

/// Widths of the parallel registers on the reference board, by address.
pub const REG_WIDTHS: [u32; 5] = [10, 9, 7, 4, 4];

/// REG0 readout: miscellaneous board status.
#[bitfield]
#[repr(u16)]
#[derive(Debug, Default, Copy, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Status {
    /// Termination state, active high.
    pub term: B2,
    pub hw_rev: B4,
    pub proto_rev: B2,
    /// 0: upconverter, 1: baseband.
    pub assy_variant: bool,
    pub clk_test: bool,
    #[skip]
    __: B6,
}

/// REG1: miscellaneous control. Reads back as written.
#[bitfield]
#[repr(u16)]
#[derive(Debug, Default, Copy, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Control {
    pub led: B6,
    /// Clock source select, 0: MMCX, 1: SMA.
    pub clk_sel: bool,
    /// Attenuator resets, active low.
    pub att_rstn: B2,
    #[skip]
    __: B7,
}

/// REG2: DAC control / status. Bit 3 is the alarm pin state on readout
/// and ignored on write; bit 5 reads back as the derived interface
/// reset line, which is the inverted write bit.
#[bitfield]
#[repr(u16)]
#[derive(Debug, Default, Copy, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct DacControl {
    pub txena: bool,
    pub sleep: bool,
    pub resetn: bool,
    pub alarm: bool,
    /// Stream the samples embedded in memory.
    pub play: bool,
    pub if_rstn: bool,
    pub test_pattern: bool,
    #[skip]
    __: B9,
}

/// REG3: per-channel gain control. Reads back as written.
#[bitfield]
#[repr(u16)]
#[derive(Debug, Default, Copy, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Gains {
    /// Channel gain, 1/10/100/1000.
    pub ch0: B2,
    pub ch1: B2,
    #[skip]
    __: B12,
}

/// REG4: upconverter control / status. Lock detect is injected on
/// readout above the power-save bits.
#[bitfield]
#[repr(u16)]
#[derive(Debug, Default, Copy, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct MixerControl {
    pub pwr_save: B2,
    pub lock_det: B2,
    #[skip]
    __: B12,
}

/// Status lines injected by the embedder. These feed the readout of
/// REG0, REG2 and REG4; the register file never mutates them.
#[derive(Debug, Default, Copy, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct BoardStatus {
    /// Termination state, 2 bits.
    pub term: u8,
    /// Hardware revision straps, 4 bits.
    pub hw_rev: u8,
    pub assy_variant: bool,
    pub clk_test: bool,
    /// State of the DAC alarm pin.
    pub dac_alarm: bool,
    /// Upconverter lock detect, one bit per channel.
    pub lock_det: u8,
}

impl BoardStatus {
    /// The REG0 readout for the current line state.
    pub fn reg0(&self) -> u16 {
        Status::new()
            .with_term(self.term & 0b11)
            .with_hw_rev(self.hw_rev & 0b1111)
            .with_proto_rev(PROTO_REV)
            .with_assy_variant(self.assy_variant)
            .with_clk_test(self.clk_test)
            .into()
    }
}

/// A single parallel configuration register.
///
/// The written value is truncated to the configured width. The readout
/// is not stored here; it is recomputed per access from the write field
/// and the injected status lines.
#[derive(Debug, Copy, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Register {
    width: u32,
    value: u16,
}

impl Register {
    pub fn new(width: u32) -> Self {
        debug_assert!(width <= 16);
        Self { width, value: 0 }
    }

    pub fn write(&mut self, value: u16) {
        self.value = value & self.mask();
    }

    pub fn value(&self) -> u16 {
        self.value
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    fn mask(&self) -> u16 {
        ((1u32 << self.width) - 1) as u16
    }
}

/// The bank of parallel registers reachable over the configuration bus.
#[derive(Debug)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct RegisterFile {
    regs: Vec<Register>,
}

impl RegisterFile {
    pub fn new(widths: &[u32]) -> Self {
        Self {
            regs: widths.iter().map(|w| Register::new(*w)).collect(),
        }
    }

    /// The register bank of the reference board.
    pub fn reference() -> Self {
        Self::new(&REG_WIDTHS)
    }

    pub fn len(&self) -> usize {
        self.regs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regs.is_empty()
    }

    /// The write field of the given register.
    pub fn value(&self, index: usize) -> u16 {
        self.regs[index].value()
    }

    pub fn write(&mut self, index: usize, value: u16) {
        self.regs[index].write(value);
    }

    /// REG1 as its typed layout.
    pub fn control(&self) -> Control {
        Control::from(self.value(1))
    }

    /// REG2's write field as its typed layout.
    pub fn dac_control(&self) -> DacControl {
        DacControl::from(self.value(2))
    }

    /// REG3 as its typed layout.
    pub fn gains(&self) -> Gains {
        Gains::from(self.value(3))
    }

    /// REG4's write field as its typed layout.
    pub fn mixer_control(&self) -> MixerControl {
        MixerControl::from(self.value(4))
    }

    /// The DAC interface reset line, active high. Derived from the
    /// active-low REG2 write bit.
    pub fn dac_if_reset(&self) -> bool {
        !self.dac_control().if_rstn()
    }

    /// The REG2 readout: write bits 0..3, then alarm pin state and the
    /// derived play/reset/test-pattern lines.
    pub fn dac_readback(&self, alarm: bool) -> u16 {
        let ctl = self.dac_control();
        DacControl::new()
            .with_txena(ctl.txena())
            .with_sleep(ctl.sleep())
            .with_resetn(ctl.resetn())
            .with_alarm(alarm)
            .with_play(ctl.play())
            .with_if_rstn(self.dac_if_reset())
            .with_test_pattern(ctl.test_pattern())
            .into()
    }

    /// The REG4 readout: own power-save bits plus injected lock detect.
    pub fn mixer_readback(&self, lock_det: u8) -> u16 {
        MixerControl::new()
            .with_pwr_save(self.mixer_control().pwr_save())
            .with_lock_det(lock_det & 0b11)
            .into()
    }
}
