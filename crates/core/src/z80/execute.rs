//! Instruction decoder.
//!
//! Opcodes are split into the usual fields `x = op[7:6]`, `y = op[5:3]`,
//! `z = op[2:0]`, `p = y >> 1`, `q = y & 1` and dispatched per page.
//!
//! | Page      | Entry                                   |
//! |-----------|-----------------------------------------|
//! | unprefixed| [`Z80::exec_main`] with `Index::HL`     |
//! | CB        | [`Z80::exec_cb`]                        |
//! | ED        | [`Z80::exec_ed`]                        |
//! | DD / FD   | [`Z80::exec_main`] with `Index::IX/IY`  |
//! | DDCB/FDCB | [`Z80::exec_index_cb`]                  |

use super::alu;
use super::{Index, Z80, FLAG_C, FLAG_H, FLAG_N, FLAG_PV, FLAG_S, FLAG_X, FLAG_Y, FLAG_Z};
use crate::cpu::Bus;

impl Z80 {
    pub(super) fn execute<B: Bus>(&mut self, bus: &mut B) -> u32 {
        let op = self.fetch_opcode(bus);
        self.exec_main(bus, op, Index::HL)
    }

    // --- Operand helpers ---

    /// 8-bit register by encoding (6 = (HL) is handled by the caller).
    /// H and L become the index halves under a DD/FD prefix.
    fn reg8(&self, r: u8, idx: Index) -> u8 {
        match (r, idx) {
            (0, _) => self.regs.b,
            (1, _) => self.regs.c,
            (2, _) => self.regs.d,
            (3, _) => self.regs.e,
            (4, Index::HL) => self.regs.h,
            (4, Index::IX) => (self.regs.ix >> 8) as u8,
            (4, Index::IY) => (self.regs.iy >> 8) as u8,
            (5, Index::HL) => self.regs.l,
            (5, Index::IX) => self.regs.ix as u8,
            (5, Index::IY) => self.regs.iy as u8,
            (7, _) => self.regs.a,
            _ => unreachable!("(HL) is not a register"),
        }
    }

    fn set_reg8(&mut self, r: u8, v: u8, idx: Index) {
        match (r, idx) {
            (0, _) => self.regs.b = v,
            (1, _) => self.regs.c = v,
            (2, _) => self.regs.d = v,
            (3, _) => self.regs.e = v,
            (4, Index::HL) => self.regs.h = v,
            (4, Index::IX) => self.regs.ix = (self.regs.ix & 0x00FF) | (v as u16) << 8,
            (4, Index::IY) => self.regs.iy = (self.regs.iy & 0x00FF) | (v as u16) << 8,
            (5, Index::HL) => self.regs.l = v,
            (5, Index::IX) => self.regs.ix = (self.regs.ix & 0xFF00) | v as u16,
            (5, Index::IY) => self.regs.iy = (self.regs.iy & 0xFF00) | v as u16,
            (7, _) => self.regs.a = v,
            _ => unreachable!("(HL) is not a register"),
        }
    }

    #[inline(always)]
    fn index_reg(&self, idx: Index) -> u16 {
        match idx {
            Index::HL => self.regs.hl(),
            Index::IX => self.regs.ix,
            Index::IY => self.regs.iy,
        }
    }

    #[inline(always)]
    fn set_index_reg(&mut self, idx: Index, v: u16) {
        match idx {
            Index::HL => self.regs.set_hl(v),
            Index::IX => self.regs.ix = v,
            Index::IY => self.regs.iy = v,
        }
    }

    /// Address of the `(HL)` operand; `(IX+d)` / `(IY+d)` fetch the displacement.
    fn operand_addr<B: Bus>(&mut self, bus: &B, idx: Index) -> u16 {
        match idx {
            Index::HL => self.regs.hl(),
            _ => {
                let d = self.fetch8(bus) as i8 as u16;
                self.index_reg(idx).wrapping_add(d)
            }
        }
    }

    /// BC, DE, HL/IX/IY, SP
    fn rp(&self, p: u8, idx: Index) -> u16 {
        match p {
            0 => self.regs.bc(),
            1 => self.regs.de(),
            2 => self.index_reg(idx),
            _ => self.regs.sp,
        }
    }

    fn set_rp(&mut self, p: u8, v: u16, idx: Index) {
        match p {
            0 => self.regs.set_bc(v),
            1 => self.regs.set_de(v),
            2 => self.set_index_reg(idx, v),
            _ => self.regs.sp = v,
        }
    }

    /// As [`rp`](Self::rp) with AF in place of SP (PUSH/POP).
    fn rp2(&self, p: u8, idx: Index) -> u16 {
        if p == 3 { self.regs.af() } else { self.rp(p, idx) }
    }

    fn set_rp2(&mut self, p: u8, v: u16, idx: Index) {
        if p == 3 { self.regs.set_af(v) } else { self.set_rp(p, v, idx) }
    }

    /// NZ, Z, NC, C, PO, PE, P, M
    fn condition(&self, y: u8) -> bool {
        let f = self.regs.f;
        match y {
            0 => f & FLAG_Z == 0,
            1 => f & FLAG_Z != 0,
            2 => f & FLAG_C == 0,
            3 => f & FLAG_C != 0,
            4 => f & FLAG_PV == 0,
            5 => f & FLAG_PV != 0,
            6 => f & FLAG_S == 0,
            _ => f & FLAG_S != 0,
        }
    }

    #[inline(always)]
    fn jump_relative(&mut self, d: u8) {
        self.regs.pc = self.regs.pc.wrapping_add(d as i8 as u16);
    }

    // --- Pages ---

    /// Unprefixed page, or the DD/FD page when `idx` names an index register.
    /// Returned T-states exclude the 4 of a DD/FD prefix.
    pub(super) fn exec_main<B: Bus>(&mut self, bus: &mut B, op: u8, idx: Index) -> u32 {
        let x = op >> 6;
        let y = (op >> 3) & 7;
        let z = op & 7;
        let p = y >> 1;
        let q = y & 1;
        // extra T-states for a displacement byte on (IX+d)
        let disp = if idx == Index::HL { 0 } else { 8 };

        match x {
            0 => match z {
                0 => match y {
                    0 => 4,
                    1 => {
                        let af = self.regs.af();
                        self.regs.set_af(self.regs.af_alt);
                        self.regs.af_alt = af;
                        4
                    }
                    2 => {
                        let d = self.fetch8(bus);
                        self.regs.b = self.regs.b.wrapping_sub(1);
                        if self.regs.b != 0 {
                            self.jump_relative(d);
                            13
                        } else {
                            8
                        }
                    }
                    3 => {
                        let d = self.fetch8(bus);
                        self.jump_relative(d);
                        12
                    }
                    _ => {
                        let d = self.fetch8(bus);
                        if self.condition(y - 4) {
                            self.jump_relative(d);
                            12
                        } else {
                            7
                        }
                    }
                },
                1 => {
                    if q == 0 {
                        let nn = self.fetch16(bus);
                        self.set_rp(p, nn, idx);
                        10
                    } else {
                        let (v, f) = alu::add16(self.index_reg(idx), self.rp(p, idx), self.regs.f);
                        self.set_index_reg(idx, v);
                        self.regs.f = f;
                        11
                    }
                }
                2 => match (q, p) {
                    (0, 0) => {
                        bus.write(self.regs.bc(), self.regs.a);
                        7
                    }
                    (0, 1) => {
                        bus.write(self.regs.de(), self.regs.a);
                        7
                    }
                    (0, 2) => {
                        let nn = self.fetch16(bus);
                        Self::write16(bus, nn, self.index_reg(idx));
                        16
                    }
                    (0, _) => {
                        let nn = self.fetch16(bus);
                        bus.write(nn, self.regs.a);
                        13
                    }
                    (_, 0) => {
                        self.regs.a = bus.read(self.regs.bc());
                        7
                    }
                    (_, 1) => {
                        self.regs.a = bus.read(self.regs.de());
                        7
                    }
                    (_, 2) => {
                        let nn = self.fetch16(bus);
                        let v = Self::read16(bus, nn);
                        self.set_index_reg(idx, v);
                        16
                    }
                    _ => {
                        let nn = self.fetch16(bus);
                        self.regs.a = bus.read(nn);
                        13
                    }
                },
                3 => {
                    let v = self.rp(p, idx);
                    let v = if q == 0 { v.wrapping_add(1) } else { v.wrapping_sub(1) };
                    self.set_rp(p, v, idx);
                    6
                }
                4 | 5 => {
                    let step = if z == 4 { alu::inc8 } else { alu::dec8 };
                    if y == 6 {
                        let addr = self.operand_addr(bus, idx);
                        let (v, f) = step(bus.read(addr), self.regs.f);
                        bus.write(addr, v);
                        self.regs.f = f;
                        11 + disp
                    } else {
                        let (v, f) = step(self.reg8(y, idx), self.regs.f);
                        self.set_reg8(y, v, idx);
                        self.regs.f = f;
                        4
                    }
                }
                6 => {
                    if y == 6 {
                        let addr = self.operand_addr(bus, idx);
                        let n = self.fetch8(bus);
                        bus.write(addr, n);
                        if idx == Index::HL { 10 } else { 15 }
                    } else {
                        let n = self.fetch8(bus);
                        self.set_reg8(y, n, idx);
                        7
                    }
                }
                _ => {
                    self.exec_accumulator_op(y);
                    4
                }
            },
            1 => {
                if op == 0x76 {
                    self.halted = true;
                    4
                } else if z == 6 {
                    let addr = self.operand_addr(bus, idx);
                    let v = bus.read(addr);
                    self.set_reg8(y, v, Index::HL);
                    7 + disp
                } else if y == 6 {
                    let addr = self.operand_addr(bus, idx);
                    bus.write(addr, self.reg8(z, Index::HL));
                    7 + disp
                } else {
                    let v = self.reg8(z, idx);
                    self.set_reg8(y, v, idx);
                    4
                }
            }
            2 => {
                let (v, t) = if z == 6 {
                    let addr = self.operand_addr(bus, idx);
                    (bus.read(addr), 7 + disp)
                } else {
                    (self.reg8(z, idx), 4)
                };
                let (a, f) = alu::alu(y, self.regs.a, v, self.regs.f);
                self.regs.a = a;
                self.regs.f = f;
                t
            }
            _ => match z {
                0 => {
                    if self.condition(y) {
                        self.regs.pc = self.pop(bus);
                        11
                    } else {
                        5
                    }
                }
                1 => {
                    if q == 0 {
                        let v = self.pop(bus);
                        self.set_rp2(p, v, idx);
                        10
                    } else {
                        match p {
                            0 => {
                                self.regs.pc = self.pop(bus);
                                10
                            }
                            1 => {
                                let (bc, de, hl) = (self.regs.bc(), self.regs.de(), self.regs.hl());
                                self.regs.set_bc(self.regs.bc_alt);
                                self.regs.set_de(self.regs.de_alt);
                                self.regs.set_hl(self.regs.hl_alt);
                                self.regs.bc_alt = bc;
                                self.regs.de_alt = de;
                                self.regs.hl_alt = hl;
                                4
                            }
                            2 => {
                                self.regs.pc = self.index_reg(idx);
                                4
                            }
                            _ => {
                                self.regs.sp = self.index_reg(idx);
                                6
                            }
                        }
                    }
                }
                2 => {
                    let nn = self.fetch16(bus);
                    if self.condition(y) {
                        self.regs.pc = nn;
                    }
                    10
                }
                3 => match y {
                    0 => {
                        self.regs.pc = self.fetch16(bus);
                        10
                    }
                    1 => self.exec_cb(bus),
                    2 => {
                        let n = self.fetch8(bus);
                        let port = (self.regs.a as u16) << 8 | n as u16;
                        bus.port_out(port, self.regs.a);
                        11
                    }
                    3 => {
                        let n = self.fetch8(bus);
                        let port = (self.regs.a as u16) << 8 | n as u16;
                        self.regs.a = bus.port_in(port);
                        11
                    }
                    4 => {
                        let sp = self.regs.sp;
                        let v = Self::read16(bus, sp);
                        Self::write16(bus, sp, self.index_reg(idx));
                        self.set_index_reg(idx, v);
                        19
                    }
                    5 => {
                        let de = self.regs.de();
                        self.regs.set_de(self.regs.hl());
                        self.regs.set_hl(de);
                        4
                    }
                    6 => {
                        self.iff1 = false;
                        self.iff2 = false;
                        4
                    }
                    _ => {
                        self.iff1 = true;
                        self.iff2 = true;
                        self.ei_delay = true;
                        4
                    }
                },
                4 => {
                    let nn = self.fetch16(bus);
                    if self.condition(y) {
                        let pc = self.regs.pc;
                        self.push(bus, pc);
                        self.regs.pc = nn;
                        17
                    } else {
                        10
                    }
                }
                5 => {
                    if q == 0 {
                        let v = self.rp2(p, idx);
                        self.push(bus, v);
                        11
                    } else {
                        match p {
                            0 => {
                                let nn = self.fetch16(bus);
                                let pc = self.regs.pc;
                                self.push(bus, pc);
                                self.regs.pc = nn;
                                17
                            }
                            1 => self.exec_prefixed(bus, Index::IX),
                            2 => self.exec_ed(bus),
                            _ => self.exec_prefixed(bus, Index::IY),
                        }
                    }
                }
                6 => {
                    let n = self.fetch8(bus);
                    let (a, f) = alu::alu(y, self.regs.a, n, self.regs.f);
                    self.regs.a = a;
                    self.regs.f = f;
                    7
                }
                _ => {
                    let pc = self.regs.pc;
                    self.push(bus, pc);
                    self.regs.pc = (y as u16) * 8;
                    11
                }
            },
        }
    }

    /// RLCA, RRCA, RLA, RRA, DAA, CPL, SCF, CCF
    fn exec_accumulator_op(&mut self, y: u8) {
        let (a, f) = (self.regs.a, self.regs.f);
        let keep = f & (FLAG_S | FLAG_Z | FLAG_PV);
        match y {
            0..=3 => {
                let (a, f) = alu::rot_a(y, a, f);
                self.regs.a = a;
                self.regs.f = f;
            }
            4 => {
                let (a, f) = alu::daa(a, f);
                self.regs.a = a;
                self.regs.f = f;
            }
            5 => {
                let a = !a;
                self.regs.a = a;
                self.regs.f = keep | (f & FLAG_C) | FLAG_H | FLAG_N | (a & (FLAG_X | FLAG_Y));
            }
            6 => self.regs.f = keep | FLAG_C | (a & (FLAG_X | FLAG_Y)),
            _ => {
                let half = if f & FLAG_C != 0 { FLAG_H } else { FLAG_C };
                self.regs.f = keep | half | (a & (FLAG_X | FLAG_Y));
            }
        }
    }

    /// DD or FD seen: run the following opcode against IX/IY.
    fn exec_prefixed<B: Bus>(&mut self, bus: &mut B, idx: Index) -> u32 {
        let op = self.fetch_opcode(bus);
        match op {
            // a second prefix cancels the first, which costs a NOP
            0xDD | 0xFD => {
                self.unfetch_opcode();
                4
            }
            0xED => 4 + self.exec_ed(bus),
            0xCB => self.exec_index_cb(bus, idx),
            _ => 4 + self.exec_main(bus, op, idx),
        }
    }

    pub(super) fn exec_cb<B: Bus>(&mut self, bus: &mut B) -> u32 {
        let op = self.fetch_opcode(bus);
        let x = op >> 6;
        let y = (op >> 3) & 7;
        let z = op & 7;

        let mem = z == 6;
        let v = if mem { bus.read(self.regs.hl()) } else { self.reg8(z, Index::HL) };

        if x == 1 {
            let xy = if mem { self.regs.h } else { v };
            self.regs.f = alu::bit(y, v, xy, self.regs.f);
            return if mem { 12 } else { 8 };
        }

        let res = self.bit_op(x, y, v);
        if mem {
            bus.write(self.regs.hl(), res);
            15
        } else {
            self.set_reg8(z, res, Index::HL);
            8
        }
    }

    /// DDCB d op / FDCB d op. Neither the displacement nor the final opcode
    /// is an M1 fetch. Non-BIT forms also copy the result into `r[z]`.
    fn exec_index_cb<B: Bus>(&mut self, bus: &mut B, idx: Index) -> u32 {
        let d = self.fetch8(bus) as i8 as u16;
        let op = self.fetch8(bus);
        let addr = self.index_reg(idx).wrapping_add(d);
        let x = op >> 6;
        let y = (op >> 3) & 7;
        let z = op & 7;
        let v = bus.read(addr);

        if x == 1 {
            self.regs.f = alu::bit(y, v, (addr >> 8) as u8, self.regs.f);
            return 20;
        }

        let res = self.bit_op(x, y, v);
        bus.write(addr, res);
        if z != 6 {
            self.set_reg8(z, res, Index::HL);
        }
        23
    }

    /// Rotate/shift (x=0), RES (x=2) or SET (x=3); updates F for rotates.
    fn bit_op(&mut self, x: u8, y: u8, v: u8) -> u8 {
        match x {
            0 => {
                let (res, f) = alu::rot(y, v, self.regs.f);
                self.regs.f = f;
                res
            }
            2 => v & !(1 << y),
            _ => v | (1 << y),
        }
    }

    pub(super) fn exec_ed<B: Bus>(&mut self, bus: &mut B) -> u32 {
        let op = self.fetch_opcode(bus);
        let x = op >> 6;
        let y = (op >> 3) & 7;
        let z = op & 7;
        let p = y >> 1;
        let q = y & 1;

        match (x, z) {
            (1, 0) => {
                let v = bus.port_in(self.regs.bc());
                if y != 6 {
                    self.set_reg8(y, v, Index::HL);
                }
                self.regs.f = (self.regs.f & FLAG_C) | alu::sz53p(v);
                12
            }
            (1, 1) => {
                let v = if y == 6 { 0 } else { self.reg8(y, Index::HL) };
                bus.port_out(self.regs.bc(), v);
                12
            }
            (1, 2) => {
                let hl = self.regs.hl();
                let rr = self.rp(p, Index::HL);
                let (v, f) = if q == 0 {
                    alu::sbc16(hl, rr, self.regs.f)
                } else {
                    alu::adc16(hl, rr, self.regs.f)
                };
                self.regs.set_hl(v);
                self.regs.f = f;
                15
            }
            (1, 3) => {
                let nn = self.fetch16(bus);
                if q == 0 {
                    Self::write16(bus, nn, self.rp(p, Index::HL));
                } else {
                    let v = Self::read16(bus, nn);
                    self.set_rp(p, v, Index::HL);
                }
                20
            }
            (1, 4) => {
                let (a, f) = alu::sub8(0, self.regs.a, false);
                self.regs.a = a;
                self.regs.f = f;
                8
            }
            (1, 5) => {
                // RETN and RETI both restore IFF1
                self.iff1 = self.iff2;
                self.regs.pc = self.pop(bus);
                14
            }
            (1, 6) => {
                self.im = [0, 0, 1, 2][(y & 3) as usize];
                8
            }
            (1, _) => self.exec_ed_misc(bus, y),
            (2, 0..=3) if y >= 4 => self.exec_block(bus, y, z),
            _ => 8,
        }
    }

    /// LD I,A / LD R,A / LD A,I / LD A,R / RRD / RLD
    fn exec_ed_misc<B: Bus>(&mut self, bus: &mut B, y: u8) -> u32 {
        match y {
            0 => {
                self.regs.i = self.regs.a;
                9
            }
            1 => {
                self.regs.r = self.regs.a;
                9
            }
            2 | 3 => {
                let a = if y == 2 { self.regs.i } else { self.regs.r };
                self.regs.a = a;
                let pv = if self.iff2 { FLAG_PV } else { 0 };
                self.regs.f = (self.regs.f & FLAG_C) | alu::sz53(a) | pv;
                9
            }
            4 | 5 => {
                let hl = self.regs.hl();
                let m = bus.read(hl);
                let a = self.regs.a;
                let (m, a) = if y == 4 {
                    ((a << 4) | (m >> 4), (a & 0xF0) | (m & 0x0F))
                } else {
                    ((m << 4) | (a & 0x0F), (a & 0xF0) | (m >> 4))
                };
                bus.write(hl, m);
                self.regs.a = a;
                self.regs.f = (self.regs.f & FLAG_C) | alu::sz53p(a);
                18
            }
            _ => 8,
        }
    }

    /// LDI/CPI/INI/OUTI and their D and repeating forms.
    /// `y`: 4 = inc, 5 = dec, 6 = inc repeat, 7 = dec repeat.
    fn exec_block<B: Bus>(&mut self, bus: &mut B, y: u8, z: u8) -> u32 {
        let forward = y & 1 == 0;
        let repeat = y >= 6;
        let step = |v: u16| if forward { v.wrapping_add(1) } else { v.wrapping_sub(1) };
        let hl = self.regs.hl();

        let again = match z {
            0 => {
                let v = bus.read(hl);
                bus.write(self.regs.de(), v);
                self.regs.set_hl(step(hl));
                self.regs.set_de(step(self.regs.de()));
                let bc = self.regs.bc().wrapping_sub(1);
                self.regs.set_bc(bc);
                let n = v.wrapping_add(self.regs.a);
                let pv = if bc != 0 { FLAG_PV } else { 0 };
                self.regs.f = (self.regs.f & (FLAG_S | FLAG_Z | FLAG_C))
                    | pv
                    | (n & FLAG_X)
                    | ((n << 4) & FLAG_Y);
                bc != 0
            }
            1 => {
                let v = bus.read(hl);
                let a = self.regs.a;
                let res = a.wrapping_sub(v);
                self.regs.set_hl(step(hl));
                let bc = self.regs.bc().wrapping_sub(1);
                self.regs.set_bc(bc);
                let half = (a ^ v ^ res) & FLAG_H;
                let n = res.wrapping_sub(if half != 0 { 1 } else { 0 });
                let pv = if bc != 0 { FLAG_PV } else { 0 };
                self.regs.f = (self.regs.f & FLAG_C)
                    | FLAG_N
                    | (alu::sz53(res) & (FLAG_S | FLAG_Z))
                    | half
                    | pv
                    | (n & FLAG_X)
                    | ((n << 4) & FLAG_Y);
                bc != 0 && res != 0
            }
            2 => {
                let v = bus.port_in(self.regs.bc());
                bus.write(hl, v);
                self.regs.set_hl(step(hl));
                self.regs.b = self.regs.b.wrapping_sub(1);
                self.regs.f = (self.regs.f & FLAG_C) | FLAG_N | alu::sz53(self.regs.b);
                self.regs.b != 0
            }
            _ => {
                let v = bus.read(hl);
                self.regs.b = self.regs.b.wrapping_sub(1);
                bus.port_out(self.regs.bc(), v);
                self.regs.set_hl(step(hl));
                self.regs.f = (self.regs.f & FLAG_C) | FLAG_N | alu::sz53(self.regs.b);
                self.regs.b != 0
            }
        };

        if repeat && again {
            self.regs.pc = self.regs.pc.wrapping_sub(2);
            21
        } else {
            16
        }
    }
}
