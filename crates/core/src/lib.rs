//! # spectrum-core
//!
//! Emulation core for the ZX Spectrum 48K: the ULA (keyboard matrix, port
//! 0xFE, screen decoder), the 16 KB ROM / 48 KB RAM address space and the
//! 50 Hz frame loop that clocks a CPU core against wall time.
//!
//! ## Architecture
//!
//! - [`Spectrum`]: Owned machine context: CPU, [`Board`], flash phase and frame buffer
//! - [`Board`]: Address space plus ULA, the CPU's view of the machine through [`Bus`]
//! - [`AddressSpace`]: 64 KB memory with a write-protected ROM region
//! - [`Ula`]: Port 0xFE: border latch and keyboard row scanning
//! - [`KeyboardMatrix`] / [`KeyMap`]: 8×5 key matrix and host key translation
//! - [`video`]: Display file decoder (interleaved bitmap, attributes, flash)
//! - [`frame`]: Poll → execute → decode → present → throttle state machine
//! - [`z80`]: Bundled Z80 core implementing [`Cpu`]
//! - [`savestate`]: Quick save / quick load
//! - [`png`]: Screenshot encoder
//!
//! ## Timing
//!
//! | Quantity          | Value                      |
//! |-------------------|----------------------------|
//! | CPU clock         | 3.5 MHz                    |
//! | Frame rate        | 50 Hz                      |
//! | T-states / frame  | 70,000                     |
//! | Interrupts / frame| 1, raised after execution  |

pub mod board;
pub mod cpu;
pub mod frame;
pub mod keyboard;
pub mod memory;
pub mod png;
pub mod savestate;
pub mod ula;
pub mod video;
pub mod z80;

use std::path::PathBuf;
use std::time::Duration;

pub use board::Board;
pub use cpu::{Bus, Cpu};
pub use frame::{FrameLoop, Host, HostEvent, Pacing, Phase};
pub use keyboard::{KeyMap, KeyboardMatrix, MatrixKey};
pub use memory::AddressSpace;
pub use ula::Ula;
pub use video::{Flash, Geometry};
pub use z80::Z80;

/// ROM size: 16 KB at 0x0000
pub const ROM_SIZE: usize = 0x4000;
/// Full Z80 address space
pub const ADDRESS_SPACE_SIZE: usize = 0x10000;

/// Active display width in pixels
pub const SCREEN_WIDTH: usize = 256;
/// Active display height in pixels
pub const SCREEN_HEIGHT: usize = 192;

/// CPU clock frequency: 3.5 MHz
pub const CLOCK_HZ: u32 = 3_500_000;
/// Display refresh rate
pub const FRAME_RATE: u32 = 50;
/// T-states executed between two frame interrupts
pub const CYCLES_PER_FRAME: u64 = (CLOCK_HZ / FRAME_RATE) as u64;
/// Wall-clock length of one frame
pub const FRAME_PERIOD: Duration = Duration::from_millis(1000 / FRAME_RATE as u64);
/// Byte on the data bus during interrupt acknowledge (floating bus).
/// IM 2 therefore reads its vector from `I:FF`, not `I:00`.
pub const INTERRUPT_DATA: u8 = 0xFF;

/// Errors reported by the core.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("ROM image too short: need {expected} bytes, got {actual}")]
    RomTooShort { expected: usize, actual: usize },
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid save state: {0}")]
    InvalidState(String),
    #[error("save state encoding failed: {0}")]
    Encode(#[from] bincode::Error),
    #[error("presentation failed: {0}")]
    Present(String),
}

/// The whole machine, exclusively owned by whoever drives the frame loop.
pub struct Spectrum<C: Cpu = Z80> {
    pub cpu: C,
    pub board: Board,
    flash: Flash,
    geometry: Geometry,
    framebuffer: Vec<u32>,
    frame_count: u64,
}

impl Spectrum<Z80> {
    pub fn new() -> Self {
        Self::with_cpu(Z80::new())
    }
}

impl Default for Spectrum<Z80> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Cpu> Spectrum<C> {
    /// Machine with a caller-supplied CPU core and no border margin.
    pub fn with_cpu(cpu: C) -> Self {
        let geometry = Geometry::default();
        Spectrum {
            cpu,
            board: Board::new(),
            flash: Flash::new(),
            geometry,
            framebuffer: vec![video::PALETTE[0]; geometry.pixel_count()],
            frame_count: 0,
        }
    }

    /// Change the output size. The buffer is reallocated and redrawn on the
    /// next decode.
    pub fn set_geometry(&mut self, geometry: Geometry) {
        self.geometry = geometry;
        self.framebuffer = vec![video::PALETTE[0]; geometry.pixel_count()];
    }

    /// Install a ROM image and reset the machine.
    pub fn load_rom(&mut self, image: &[u8]) -> Result<(), Error> {
        self.board.mem.load_rom(image)?;
        self.reset();
        Ok(())
    }

    /// Power-on reset. Memory contents are kept.
    pub fn reset(&mut self) {
        self.cpu.reset();
        self.board.ula = Ula::new();
        self.flash = Flash::new();
        self.frame_count = 0;
    }

    /// Run the CPU for one frame's worth of T-states, then raise the frame
    /// interrupt. Returns the T-states actually consumed.
    pub fn execute_frame(&mut self) -> u64 {
        let used = self.cpu.run_for(&mut self.board, CYCLES_PER_FRAME);
        self.cpu.request_interrupt(INTERRUPT_DATA);
        used
    }

    /// Advance the flash phase and redraw the frame buffer.
    pub fn decode_frame(&mut self) {
        if self.flash.advance() {
            log::trace!("flash phase -> {}", self.flash.inverted());
        }
        video::render(
            &self.board.mem,
            self.board.ula.border(),
            self.flash.inverted(),
            self.geometry,
            &mut self.framebuffer,
        );
        self.frame_count += 1;
    }

    /// Execute and decode one frame without any host interaction.
    pub fn run_frame(&mut self) {
        self.execute_frame();
        self.decode_frame();
    }

    /// Last decoded frame, `geometry().width()` pixels per row.
    pub fn framebuffer(&self) -> &[u32] {
        &self.framebuffer
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    pub fn keyboard(&self) -> &KeyboardMatrix {
        &self.board.ula.keyboard
    }

    pub fn keyboard_mut(&mut self) -> &mut KeyboardMatrix {
        &mut self.board.ula.keyboard
    }

    /// Frames decoded since the last reset.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn flash(&self) -> Flash {
        self.flash
    }

    pub(crate) fn restore_frame_state(&mut self, flash: Flash, frame_count: u64) {
        self.flash = flash;
        self.frame_count = frame_count;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Burns a fixed number of T-states per step and records interrupts.
    struct StubCpu {
        cost: u32,
        cycles: u64,
        interrupts: Vec<(u64, u8)>,
    }

    impl StubCpu {
        fn new(cost: u32) -> Self {
            StubCpu { cost, cycles: 0, interrupts: Vec::new() }
        }
    }

    impl Cpu for StubCpu {
        fn step<B: Bus>(&mut self, _bus: &mut B) -> u32 {
            self.cycles += self.cost as u64;
            self.cost
        }
        fn cycles(&self) -> u64 {
            self.cycles
        }
        fn request_interrupt(&mut self, data: u8) {
            self.interrupts.push((self.cycles, data));
        }
        fn reset(&mut self) {
            self.cycles = 0;
        }
    }

    fn rom_with(code: &[u8]) -> Vec<u8> {
        let mut rom = vec![0u8; ROM_SIZE];
        rom[..code.len()].copy_from_slice(code);
        rom
    }

    #[test]
    fn test_cycles_per_frame() {
        assert_eq!(CYCLES_PER_FRAME, 70_000);
        assert_eq!(FRAME_PERIOD, Duration::from_millis(20));
    }

    #[test]
    fn test_one_interrupt_per_frame() {
        let mut zx = Spectrum::with_cpu(StubCpu::new(4));
        for frame in 1..=3u64 {
            assert_eq!(zx.execute_frame(), CYCLES_PER_FRAME);
            assert_eq!(zx.cpu.interrupts.len() as u64, frame);
        }
        assert_eq!(zx.cpu.interrupts[0], (70_000, INTERRUPT_DATA));
        assert_eq!(zx.cpu.interrupts[2].0, 210_000);
    }

    #[test]
    fn test_overshoot_not_carried() {
        // 23 does not divide 70,000: 3044 steps overshoot by 12
        let mut zx = Spectrum::with_cpu(StubCpu::new(23));
        assert_eq!(zx.execute_frame(), 70_012);
        assert_eq!(zx.execute_frame(), 70_012);
        assert_eq!(zx.cpu.cycles(), 140_024);
    }

    #[test]
    fn test_flash_toggles_every_16_frames() {
        let mut zx = Spectrum::with_cpu(StubCpu::new(70_000));
        for _ in 0..15 {
            zx.run_frame();
        }
        assert!(!zx.flash().inverted());
        zx.run_frame();
        assert!(zx.flash().inverted());
        assert_eq!(zx.frame_count(), 16);
    }

    #[test]
    fn test_rom_too_short() {
        let mut zx = Spectrum::new();
        match zx.load_rom(&[0u8; 100]) {
            Err(Error::RomTooShort { expected, actual }) => {
                assert_eq!(expected, ROM_SIZE);
                assert_eq!(actual, 100);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_program_draws_screen_and_border() {
        let rom = rom_with(&[
            0x3E, 0x02,       // LD A,2
            0xD3, 0xFE,       // OUT (FEh),A   border 1
            0x21, 0x00, 0x58, // LD HL,5800h
            0x36, 0x47,       // LD (HL),47h   bright, ink 7, paper 0
            0x21, 0x00, 0x40, // LD HL,4000h
            0x36, 0xFF,       // LD (HL),FFh
            0x32, 0x00, 0x01, // LD (0100h),A  ROM, dropped
            0x76,             // HALT
        ]);
        let mut zx = Spectrum::new();
        zx.set_geometry(Geometry::with_border(4));
        zx.load_rom(&rom).expect("rom");
        zx.run_frame();

        assert!(zx.cpu.halted);
        assert_eq!(zx.board.ula.border(), 1);
        assert_eq!(zx.board.mem.read(0x0100), 0x00);

        let g = zx.geometry();
        let fb = zx.framebuffer();
        assert_eq!(fb.len(), 264 * 200);
        assert_eq!(fb[0], video::PALETTE[1]);
        assert_eq!(fb[4 * g.width() + 4], video::PALETTE[15]);
        assert_eq!(fb[5 * g.width() + 4], video::PALETTE[0]);
        // Interrupts are still disabled, so the frame interrupt waits.
        assert!(zx.cpu.interrupt_pending());
    }

    #[test]
    fn test_program_reads_keyboard() {
        let rom = rom_with(&[
            0x3E, 0xFE,       // LD A,FEh      select row 0
            0xDB, 0xFE,       // IN A,(FEh)
            0x32, 0x00, 0x5B, // LD (5B00h),A
            0x76,             // HALT
        ]);
        let mut zx = Spectrum::new();
        zx.load_rom(&rom).expect("rom");
        zx.keyboard_mut().set_matrix_key(MatrixKey::CapsShift, true);
        zx.execute_frame();
        assert_eq!(zx.board.mem.read(0x5B00), 0xFE);
    }

    #[test]
    fn test_halt_woken_by_frame_interrupt() {
        let rom = rom_with(&[
            0xED, 0x56, // IM 1
            0xFB,       // EI
            0x76,       // HALT
        ]);
        let mut zx = Spectrum::new();
        zx.load_rom(&rom).expect("rom");
        zx.execute_frame();
        assert!(zx.cpu.halted);
        zx.cpu.step(&mut zx.board);
        assert!(!zx.cpu.halted);
        assert_eq!(zx.cpu.regs.pc, 0x0038);
    }

    #[test]
    fn test_im2_vector_read_from_i_ff() {
        let rom = rom_with(&[
            0x3E, 0x80,       // LD A,80h
            0xED, 0x47,       // LD I,A
            0xED, 0x5E,       // IM 2
            0x21, 0x00, 0x02, // LD HL,0200h
            0x22, 0xFF, 0x80, // LD (80FFh),HL
            0xFB,             // EI
            0x76,             // HALT
        ]);
        let mut zx = Spectrum::new();
        zx.load_rom(&rom).expect("rom");
        // a zero data byte would fetch the vector from 8000h instead
        zx.board.mem.write(0x8000, 0x00);
        zx.board.mem.write(0x8001, 0x01);
        zx.execute_frame();
        zx.cpu.step(&mut zx.board);
        assert_eq!(zx.cpu.regs.pc, 0x0200);
    }
}
