// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL-2.0) or the
// GNU General Public License Version 3 (GPL-3).
// If a copy of these licenses was not distributed with this file, you can
// obtain them at https://mozilla.org/MPL/2.0/ and http://www.gnu.org/licenses/.

//! Model of the configuration and playback engine of an RF
//! upconverter / DAC front-end board.
//!
//! The board is reached over a 4-wire serial link (clock, data in,
//! data out, frame select). Every transaction is 24 bits:
//! `ADR(7), WE(1), DATA(16)`, most significant bit first. The address
//! space, partitioned by a 4-bit mask, holds five parallel registers
//! and three raw serial passthroughs:
//!
//! | ADR | Target                    |
//! |-----|---------------------------|
//! | 0   | REG0 status               |
//! | 1   | REG1 control              |
//! | 2   | REG2 DAC control / status |
//! | 3   | REG3 gains                |
//! | 4   | REG4 upconverter          |
//! | 5   | DAC serial port           |
//! | 6   | Mixer 0 serial port       |
//! | 7   | Mixer 1 serial port       |
//!
//! Next to the bus sits the playback sequencer, clocked by the
//! independent sample clock, which streams the embedded sample memory
//! to the parallel DAC bus while the REG2 play bit is set. The two
//! domains share nothing but that bit, which crosses through a
//! synchronizer.

#![no_std]

extern crate alloc;

use alloc::boxed::Box;

use common::numutil::NumExt;
use thiserror::Error;

use crate::bus::{AddressMap, SerialBridge};

pub mod addr;
pub mod bus;
pub mod memory;
pub mod playback;
pub mod regs;

pub use memory::{Channel, SampleMemory};
pub use playback::DacFrame;
pub use regs::BoardStatus;
use regs::RegisterFile;

/// A static configuration error. All of these are fatal at
/// construction time; nothing in the model fails at runtime.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("address range {adr:#04x}/{mask:#04x} intersects {other_adr:#04x}/{other_mask:#04x}")]
    AddressOverlap {
        adr: u8,
        mask: u8,
        other_adr: u8,
        other_mask: u8,
    },
    #[error("sample count {count} is not a non-zero multiple of 4")]
    SampleCount { count: usize },
    #[error("channel {channel:?} holds {words} words, expected {expected}")]
    ChannelLength {
        channel: Channel,
        words: usize,
        expected: usize,
    },
}

/// A downstream device on a raw serial passthrough port.
///
/// While its address is strobed, the device sees its own chip select
/// asserted and receives the remaining clock edges of the transaction;
/// its data-out bit replaces the bridge output for those edges. An
/// unaddressed device sees no edges at all.
pub trait SerialPeripheral {
    /// Chip select changed state.
    fn select(&mut self, selected: bool);
    /// One rising clock edge with the given data-in bit. Returns the
    /// data-out bit for this bit period.
    fn clock(&mut self, sdi: bool) -> bool;
}

/// The serial passthrough ports of the reference board.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Port {
    Dac,
    Mixer0,
    Mixer1,
}

const EXT_PORTS: usize = 3;

impl Port {
    fn index(self) -> usize {
        self as usize
    }
}

/// A routed bus target.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub(crate) enum Target {
    /// Parallel register, by index into the register file.
    Reg(usize),
    /// Raw serial passthrough, by port index.
    Ext(usize),
}

/// How register readback is composed.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
enum Readout {
    /// Every register reads back its own write field.
    Raw,
    /// The reference board mapping: REG0/REG2/REG4 mix injected status
    /// lines into their readback.
    FrontEnd,
}

#[derive(Default)]
struct ExtPort {
    device: Option<Box<dyn SerialPeripheral>>,
}

impl core::fmt::Debug for ExtPort {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ExtPort")
            .field("device", &self.device.as_ref().map(|_| "dyn SerialPeripheral"))
            .finish()
    }
}

/// The board and its state.
#[derive(Debug)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Board {
    pub(crate) bridge: SerialBridge,
    pub(crate) map: AddressMap<Target>,
    pub regs: RegisterFile,
    /// Status lines injected by the embedder.
    pub status: BoardStatus,
    memory: SampleMemory,
    playback: playback::Playback,
    readout: Readout,

    /// Attached passthrough devices. Not part of a savestate; they
    /// must be re-attached after loading one.
    #[cfg_attr(feature = "serde", serde(skip))]
    ext: [ExtPort; EXT_PORTS],
}

impl Board {
    /// A board with the reference register bank and address map.
    pub fn new(memory: SampleMemory) -> Result<Self, ConfigError> {
        let regs = RegisterFile::reference();
        let mut map = AddressMap::default();
        for i in 0..regs.len() {
            map.connect(i as u8, addr::ADR_MASK, Target::Reg(i))?;
        }
        map.connect(addr::DAC, addr::ADR_MASK, Target::Ext(Port::Dac.index()))?;
        map.connect(addr::MIXER0, addr::ADR_MASK, Target::Ext(Port::Mixer0.index()))?;
        map.connect(addr::MIXER1, addr::ADR_MASK, Target::Ext(Port::Mixer1.index()))?;
        Ok(Self::assemble(map, regs, memory, Readout::FrontEnd))
    }

    /// A board with a custom register bank at addresses
    /// `0..widths.len()` under the given mask, raw readback and no
    /// passthrough routes. Register layout is a configuration concern;
    /// this serves embedders whose map differs from the reference.
    pub fn with_register_map(
        memory: SampleMemory,
        widths: &[u32],
        mask: u8,
    ) -> Result<Self, ConfigError> {
        let regs = RegisterFile::new(widths);
        let mut map = AddressMap::default();
        for i in 0..regs.len() {
            map.connect(i as u8, mask, Target::Reg(i))?;
        }
        Ok(Self::assemble(map, regs, memory, Readout::Raw))
    }

    fn assemble(
        map: AddressMap<Target>,
        regs: RegisterFile,
        memory: SampleMemory,
        readout: Readout,
    ) -> Self {
        Self {
            bridge: SerialBridge::default(),
            map,
            regs,
            status: BoardStatus::default(),
            memory,
            playback: playback::Playback::default(),
            readout,
            ext: Default::default(),
        }
    }

    /// Attach a downstream device to a passthrough port.
    pub fn attach(&mut self, port: Port, device: Box<dyn SerialPeripheral>) {
        self.ext[port.index()].device = Some(device);
    }

    /// Drive the frame select line. Deasserting it mid-frame abandons
    /// the transaction without committing anything.
    pub fn set_frame_select(&mut self, selected: bool) {
        SerialBridge::set_select(self, selected);
    }

    /// One rising serial clock edge with the given data-in bit.
    /// Returns the data-out bit.
    pub fn serial_clock(&mut self, sdi: bool) -> bool {
        SerialBridge::clock(self, sdi)
    }

    /// Drive one complete transaction as the bus master would: assert
    /// frame select, shift all 24 bits MSB first, release. Returns the
    /// bits observed on the data-out line, in the same order.
    pub fn transfer(&mut self, frame: u32) -> u32 {
        self.set_frame_select(true);
        let mut miso = 0;
        for bit in (0..bus::FRAME_BITS).rev() {
            let sdo = self.serial_clock(frame.is_bit(bit as u16));
            miso = (miso << 1) | sdo as u32;
        }
        self.set_frame_select(false);
        miso
    }

    /// One tick of the sample clock domain.
    pub fn sample_tick(&mut self) -> DacFrame {
        let ctl = self.regs.dac_control();
        self.playback
            .tick(ctl.play(), ctl.test_pattern(), &self.memory)
    }

    pub fn playback(&self) -> &playback::Playback {
        &self.playback
    }

    pub fn memory(&self) -> &SampleMemory {
        &self.memory
    }

    /// The readout of a parallel register, as seen by the bus.
    pub(crate) fn reg_read(&self, index: usize) -> u16 {
        if self.readout == Readout::Raw {
            return self.regs.value(index);
        }
        match index as u8 {
            addr::REG0 => self.status.reg0(),
            addr::REG2 => self.regs.dac_readback(self.status.dac_alarm),
            addr::REG4 => self.regs.mixer_readback(self.status.lock_det),
            _ => self.regs.value(index),
        }
    }

    pub(crate) fn ext_select(&mut self, port: usize, selected: bool) {
        if let Some(dev) = self.ext[port].device.as_mut() {
            dev.select(selected);
        }
    }

    pub(crate) fn ext_clock(&mut self, port: usize, sdi: bool) -> bool {
        match self.ext[port].device.as_mut() {
            Some(dev) => dev.clock(sdi),
            None => false,
        }
    }
}

#[cfg(test)]
mod test {
    use alloc::{boxed::Box, rc::Rc, vec, vec::Vec};
    use core::cell::RefCell;

    use super::*;
    use crate::bus::frame;

    fn board() -> Board {
        Board::new(SampleMemory::reference_pattern()).unwrap()
    }

    #[test]
    fn write_commits_on_final_edge() {
        let mut board = board();
        board.set_frame_select(true);
        let f = frame(addr::REG1, true, 0x155);
        for bit in (1..bus::FRAME_BITS).rev() {
            board.serial_clock(f.is_bit(bit as u16));
            assert_eq!(board.regs.value(1), 0, "write fired early");
        }
        board.serial_clock(f.is_bit(0));
        assert_eq!(board.regs.value(1), 0x155);
        board.set_frame_select(false);
    }

    #[test]
    fn we_clear_commits_nothing() {
        let mut board = board();
        board.transfer(frame(addr::REG1, false, 0x1FF));
        assert_eq!(board.regs.value(1), 0);
    }

    #[test]
    fn readback_previous_value() {
        let mut board = board();
        board.transfer(frame(addr::REG1, true, 0x0AA));
        // The same frame writes a new value and reads out the old one.
        let miso = board.transfer(frame(addr::REG1, true, 0x155));
        assert_eq!(miso & 0xFFFF, 0x0AA);
        assert_eq!(board.regs.value(1), 0x155);
    }

    #[test]
    fn truncated_frame_is_abandoned() {
        let mut board = board();
        let f = frame(addr::REG1, true, 0x1FF);
        board.set_frame_select(true);
        for bit in (4..bus::FRAME_BITS).rev() {
            board.serial_clock(f.is_bit(bit as u16));
        }
        board.set_frame_select(false);
        assert_eq!(board.regs.value(1), 0);

        // The next frame decodes cleanly.
        board.transfer(frame(addr::REG1, true, 0x123));
        assert_eq!(board.regs.value(1), 0x123);
    }

    #[test]
    fn writes_strobe_only_their_target() {
        let mut board = board();
        board.transfer(frame(addr::REG1, true, 0x1FF));
        board.transfer(frame(addr::REG3, true, 0x5));
        assert_eq!(board.regs.value(1), 0x1FF);
        assert_eq!(board.regs.value(2), 0);
        assert_eq!(board.regs.value(3), 0x5);
    }

    #[test]
    fn unmapped_address_is_ignored() {
        let mut board = board();
        let miso = board.transfer(frame(0x0C, true, 0xFFFF));
        assert_eq!(miso & 0xFFFF, 0);
        for i in 0..5 {
            assert_eq!(board.regs.value(i), 0);
        }
    }

    #[derive(Default)]
    struct RecorderState {
        selected: bool,
        deselects: usize,
        received: Vec<bool>,
        out: u16,
    }

    /// Peripheral that records its sub-transaction and shifts out a
    /// preloaded value.
    struct Recorder(Rc<RefCell<RecorderState>>);

    impl SerialPeripheral for Recorder {
        fn select(&mut self, selected: bool) {
            let mut s = self.0.borrow_mut();
            if s.selected && !selected {
                s.deselects += 1;
            }
            s.selected = selected;
        }

        fn clock(&mut self, sdi: bool) -> bool {
            let mut s = self.0.borrow_mut();
            assert!(s.selected, "clocked while deselected");
            s.received.push(sdi);
            let sdo = s.out & 0x8000 != 0;
            s.out <<= 1;
            sdo
        }
    }

    #[test]
    fn passthrough_frames_the_addressed_port_only() {
        let mut board = board();
        let dac = Rc::new(RefCell::new(RecorderState {
            out: 0xBEEF,
            ..Default::default()
        }));
        let mixer = Rc::new(RefCell::new(RecorderState::default()));
        board.attach(Port::Dac, Box::new(Recorder(dac.clone())));
        board.attach(Port::Mixer0, Box::new(Recorder(mixer.clone())));

        let miso = board.transfer(frame(addr::DAC, true, 0xA5C3));

        let dac = dac.borrow();
        let expected: Vec<bool> = (0..16).rev().map(|i| 0xA5C3u16.is_bit(i)).collect();
        assert_eq!(dac.received, expected);
        assert_eq!(dac.deselects, 1);
        assert!(!dac.selected);
        // The port's readback replaced the bridge output.
        assert_eq!(miso & 0xFFFF, 0xBEEF);

        // The unaddressed port never saw an edge.
        assert!(mixer.borrow().received.is_empty());
        assert_eq!(mixer.borrow().deselects, 0);

        // And no parallel register was touched.
        for i in 0..5 {
            assert_eq!(board.regs.value(i), 0);
        }
    }

    #[test]
    fn unattached_port_swallows_the_stream() {
        let mut board = board();
        let miso = board.transfer(frame(addr::MIXER1, true, 0xFFFF));
        assert_eq!(miso & 0xFFFF, 0);
    }

    #[test]
    fn status_lines_read_back_through_reg0() {
        let mut board = board();
        board.status.hw_rev = 0b0011;
        board.status.assy_variant = true;
        let miso = board.transfer(frame(addr::REG0, false, 0));
        assert_eq!(miso & 0xFFFF, u32::from(board.status.reg0()));
    }

    #[test]
    fn play_bit_drives_playback_after_sync_delay() {
        let mut board = board();
        board.transfer(frame(addr::REG2, true, 1 << 4));

        // Two sample ticks of synchronizer latency.
        assert!(!board.sample_tick().output_enable);
        assert!(!board.sample_tick().output_enable);

        let f = board.sample_tick();
        assert!(f.frame_strobe && f.output_enable);
        assert_eq!(f.data[0], 0x7A7A_1A1A_7A7A_1A1A);
        let f = board.sample_tick();
        assert!(!f.frame_strobe && f.output_enable);
        assert_eq!(board.playback().address(), 1);

        // Test-pattern mode replaces every channel's word.
        board.transfer(frame(addr::REG2, true, 1 << 4 | 1 << 6));
        let f = board.sample_tick();
        assert_eq!(f.data, playback::TEST_PATTERNS);

        // Withdrawing play returns to idle, through the synchronizer.
        board.transfer(frame(addr::REG2, true, 0));
        board.sample_tick();
        board.sample_tick();
        let f = board.sample_tick();
        assert!(!f.output_enable);
        assert_eq!(board.playback().address(), 0);
    }

    /// xorshift32, for dependency-free random frames.
    fn rand(state: &mut u32) -> u32 {
        *state ^= *state << 13;
        *state ^= *state >> 17;
        *state ^= *state << 5;
        *state
    }

    #[test]
    fn random_frame_loopback() {
        // Full-width registers under a mask covering the whole 7-bit
        // space: every address resolves to register `adr & 0b111`.
        let mut board =
            Board::with_register_map(SampleMemory::reference_pattern(), &[16; 8], 0b111).unwrap();
        let mut state = 0x2A2A_1234;
        for _ in 0..1000 {
            let r = rand(&mut state);
            let adr = (r >> 24) as u8 & 0x7F;
            let we = r.is_bit(23);
            let data = r as u16;
            let index = (adr & 0b111) as usize;
            let before = board.regs.value(index);

            board.transfer(frame(adr, we, data));
            if we {
                assert_eq!(board.regs.value(index), data);
            } else {
                assert_eq!(board.regs.value(index), before);
            }
        }
    }

    #[test]
    fn overlapping_map_fails_construction() {
        // Mask 0 makes the first range match every address.
        let err = Board::with_register_map(
            SampleMemory::reference_pattern(),
            &[16, 16],
            0,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::AddressOverlap { .. }));
    }

    #[test]
    fn config_errors_are_fatal_and_typed() {
        let err = SampleMemory::new(10, [vec![], vec![], vec![], vec![]]).unwrap_err();
        assert_eq!(err, ConfigError::SampleCount { count: 10 });
    }
}
