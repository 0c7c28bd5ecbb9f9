//! Zilog Z80 core.
//!
//! Implements the full documented instruction set (unprefixed, CB, ED,
//! DD/FD and DDCB/FDCB pages) plus the undocumented IXH/IXL/IYH/IYL
//! register halves and SLL. Each [`Cpu::step`] returns the instruction's
//! T-state count; memory contention is not modelled.
//!
//! Flags follow the Z80 user manual. Bits 3 and 5 (X/Y) are copied from
//! the result for the common ALU cases; block instructions and `BIT n,(HL)`
//! use simplified X/Y values.
//!
//! ## Interrupts
//!
//! A request from [`Cpu::request_interrupt`] is held until IFF1 is set and
//! the instruction after `EI` has run. `HALT` burns 4 T-states per step
//! until then. Acceptance costs 13 T-states in IM 0/1 and 19 in IM 2.
//! IM 0 executes the RST on the data bus; any other byte falls back to
//! RST 38h.

mod alu;
mod execute;

use serde::{Deserialize, Serialize};

use crate::cpu::{Bus, Cpu};

pub const FLAG_C: u8 = 0x01;
pub const FLAG_N: u8 = 0x02;
pub const FLAG_PV: u8 = 0x04;
pub const FLAG_X: u8 = 0x08;
pub const FLAG_H: u8 = 0x10;
pub const FLAG_Y: u8 = 0x20;
pub const FLAG_Z: u8 = 0x40;
pub const FLAG_S: u8 = 0x80;

/// Register file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registers {
    pub a: u8,
    pub f: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,
    /// Shadow AF', BC', DE', HL'
    pub af_alt: u16,
    pub bc_alt: u16,
    pub de_alt: u16,
    pub hl_alt: u16,
    pub ix: u16,
    pub iy: u16,
    pub sp: u16,
    pub pc: u16,
    pub i: u8,
    pub r: u8,
}

impl Registers {
    #[inline(always)]
    pub fn af(&self) -> u16 {
        (self.a as u16) << 8 | self.f as u16
    }
    #[inline(always)]
    pub fn bc(&self) -> u16 {
        (self.b as u16) << 8 | self.c as u16
    }
    #[inline(always)]
    pub fn de(&self) -> u16 {
        (self.d as u16) << 8 | self.e as u16
    }
    #[inline(always)]
    pub fn hl(&self) -> u16 {
        (self.h as u16) << 8 | self.l as u16
    }

    #[inline(always)]
    pub fn set_af(&mut self, v: u16) {
        self.a = (v >> 8) as u8;
        self.f = v as u8;
    }
    #[inline(always)]
    pub fn set_bc(&mut self, v: u16) {
        self.b = (v >> 8) as u8;
        self.c = v as u8;
    }
    #[inline(always)]
    pub fn set_de(&mut self, v: u16) {
        self.d = (v >> 8) as u8;
        self.e = v as u8;
    }
    #[inline(always)]
    pub fn set_hl(&mut self, v: u16) {
        self.h = (v >> 8) as u8;
        self.l = v as u8;
    }

    #[inline(always)]
    pub fn flag(&self, mask: u8) -> bool {
        self.f & mask != 0
    }
}

/// Which register stands in for HL: plain, or after a DD/FD prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Index {
    HL,
    IX,
    IY,
}

/// Z80 processor state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Z80 {
    pub regs: Registers,
    pub iff1: bool,
    pub iff2: bool,
    /// Interrupt mode 0, 1 or 2
    pub im: u8,
    /// Set by HALT, cleared by interrupt acceptance
    pub halted: bool,
    /// True for the one instruction following EI
    ei_delay: bool,
    /// Pending maskable interrupt and its data-bus byte
    int_request: Option<u8>,
    /// Monotonic T-state counter
    tick: u64,
}

impl Z80 {
    pub fn new() -> Self {
        let mut cpu = Z80 {
            regs: Registers::default(),
            iff1: false,
            iff2: false,
            im: 0,
            halted: false,
            ei_delay: false,
            int_request: None,
            tick: 0,
        };
        cpu.reset();
        cpu
    }

    /// True while an interrupt request is waiting to be accepted.
    pub fn interrupt_pending(&self) -> bool {
        self.int_request.is_some()
    }

    // --- Bus helpers ---

    /// Fetch an opcode byte (M1 cycle: bumps the refresh register).
    #[inline(always)]
    fn fetch_opcode<B: Bus>(&mut self, bus: &B) -> u8 {
        self.regs.r = (self.regs.r & 0x80) | (self.regs.r.wrapping_add(1) & 0x7F);
        self.fetch8(bus)
    }

    /// Step back over an opcode byte fetched with [`fetch_opcode`](Self::fetch_opcode).
    fn unfetch_opcode(&mut self) {
        self.regs.pc = self.regs.pc.wrapping_sub(1);
        self.regs.r = (self.regs.r & 0x80) | (self.regs.r.wrapping_sub(1) & 0x7F);
    }

    #[inline(always)]
    fn fetch8<B: Bus>(&mut self, bus: &B) -> u8 {
        let v = bus.read(self.regs.pc);
        self.regs.pc = self.regs.pc.wrapping_add(1);
        v
    }

    #[inline(always)]
    fn fetch16<B: Bus>(&mut self, bus: &B) -> u16 {
        let lo = self.fetch8(bus) as u16;
        let hi = self.fetch8(bus) as u16;
        hi << 8 | lo
    }

    #[inline(always)]
    fn read16<B: Bus>(bus: &B, addr: u16) -> u16 {
        let lo = bus.read(addr) as u16;
        let hi = bus.read(addr.wrapping_add(1)) as u16;
        hi << 8 | lo
    }

    #[inline(always)]
    fn write16<B: Bus>(bus: &mut B, addr: u16, v: u16) {
        bus.write(addr, v as u8);
        bus.write(addr.wrapping_add(1), (v >> 8) as u8);
    }

    fn push<B: Bus>(&mut self, bus: &mut B, v: u16) {
        self.regs.sp = self.regs.sp.wrapping_sub(2);
        Self::write16(bus, self.regs.sp, v);
    }

    fn pop<B: Bus>(&mut self, bus: &B) -> u16 {
        let v = Self::read16(bus, self.regs.sp);
        self.regs.sp = self.regs.sp.wrapping_add(2);
        v
    }

    /// Accept the pending interrupt: push PC and jump to the handler.
    fn accept_interrupt<B: Bus>(&mut self, bus: &mut B, data: u8) -> u32 {
        self.halted = false;
        self.iff1 = false;
        self.iff2 = false;
        self.regs.r = (self.regs.r & 0x80) | (self.regs.r.wrapping_add(1) & 0x7F);
        let pc = self.regs.pc;
        self.push(bus, pc);
        match self.im {
            2 => {
                let vector = (self.regs.i as u16) << 8 | data as u16;
                self.regs.pc = Self::read16(bus, vector);
                19
            }
            0 if data & 0xC7 == 0xC7 => {
                self.regs.pc = (data & 0x38) as u16;
                13
            }
            _ => {
                self.regs.pc = 0x0038;
                13
            }
        }
    }
}

impl Default for Z80 {
    fn default() -> Self {
        Self::new()
    }
}

impl Cpu for Z80 {
    fn step<B: Bus>(&mut self, bus: &mut B) -> u32 {
        let t = match self.int_request {
            Some(data) if self.iff1 && !self.ei_delay => {
                self.int_request = None;
                self.accept_interrupt(bus, data)
            }
            _ => {
                self.ei_delay = false;
                if self.halted {
                    self.regs.r = (self.regs.r & 0x80) | (self.regs.r.wrapping_add(1) & 0x7F);
                    4
                } else {
                    self.execute(bus)
                }
            }
        };
        self.tick += t as u64;
        t
    }

    fn cycles(&self) -> u64 {
        self.tick
    }

    fn request_interrupt(&mut self, data: u8) {
        self.int_request = Some(data);
    }

    fn reset(&mut self) {
        self.regs = Registers {
            a: 0xFF,
            f: 0xFF,
            sp: 0xFFFF,
            ..Registers::default()
        };
        self.iff1 = false;
        self.iff2 = false;
        self.im = 0;
        self.halted = false;
        self.ei_delay = false;
        self.int_request = None;
    }
}
