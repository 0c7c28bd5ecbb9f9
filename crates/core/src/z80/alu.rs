//! Flag arithmetic. Every function is pure: operands and the incoming F
//! register in, result and new F out.

use super::{FLAG_C, FLAG_H, FLAG_N, FLAG_PV, FLAG_S, FLAG_X, FLAG_Y, FLAG_Z};

const XY: u8 = FLAG_X | FLAG_Y;

/// S, Z and the undocumented X/Y bits for an 8-bit result.
#[inline(always)]
pub(super) fn sz53(v: u8) -> u8 {
    (v & (FLAG_S | XY)) | if v == 0 { FLAG_Z } else { 0 }
}

/// [`sz53`] plus even parity in P/V.
#[inline(always)]
pub(super) fn sz53p(v: u8) -> u8 {
    sz53(v) | if v.count_ones() % 2 == 0 { FLAG_PV } else { 0 }
}

pub(super) fn add8(a: u8, b: u8, carry: bool) -> (u8, u8) {
    let r = a as u16 + b as u16 + carry as u16;
    let res = r as u8;
    let mut f = sz53(res) | ((a ^ b ^ res) & FLAG_H);
    if !(a ^ b) & (a ^ res) & 0x80 != 0 { f |= FLAG_PV; }
    if r > 0xFF { f |= FLAG_C; }
    (res, f)
}

pub(super) fn sub8(a: u8, b: u8, carry: bool) -> (u8, u8) {
    let r = a as i16 - b as i16 - carry as i16;
    let res = r as u8;
    let mut f = sz53(res) | FLAG_N | ((a ^ b ^ res) & FLAG_H);
    if (a ^ b) & (a ^ res) & 0x80 != 0 { f |= FLAG_PV; }
    if r < 0 { f |= FLAG_C; }
    (res, f)
}

/// CP: flags of `a - b`, X/Y taken from the operand.
pub(super) fn cp8(a: u8, b: u8) -> u8 {
    let (_, f) = sub8(a, b, false);
    (f & !XY) | (b & XY)
}

pub(super) fn and8(a: u8, b: u8) -> (u8, u8) {
    let res = a & b;
    (res, sz53p(res) | FLAG_H)
}

pub(super) fn xor8(a: u8, b: u8) -> (u8, u8) {
    let res = a ^ b;
    (res, sz53p(res))
}

pub(super) fn or8(a: u8, b: u8) -> (u8, u8) {
    let res = a | b;
    (res, sz53p(res))
}

/// The eight accumulator ALU operations selected by opcode bits 5–3:
/// ADD, ADC, SUB, SBC, AND, XOR, OR, CP. Returns the new A and F.
pub(super) fn alu(op: u8, a: u8, v: u8, f: u8) -> (u8, u8) {
    let carry = f & FLAG_C != 0;
    match op & 7 {
        0 => add8(a, v, false),
        1 => add8(a, v, carry),
        2 => sub8(a, v, false),
        3 => sub8(a, v, carry),
        4 => and8(a, v),
        5 => xor8(a, v),
        6 => or8(a, v),
        _ => (a, cp8(a, v)),
    }
}

pub(super) fn inc8(v: u8, f: u8) -> (u8, u8) {
    let res = v.wrapping_add(1);
    let mut nf = (f & FLAG_C) | sz53(res);
    if res & 0x0F == 0 { nf |= FLAG_H; }
    if res == 0x80 { nf |= FLAG_PV; }
    (res, nf)
}

pub(super) fn dec8(v: u8, f: u8) -> (u8, u8) {
    let res = v.wrapping_sub(1);
    let mut nf = (f & FLAG_C) | FLAG_N | sz53(res);
    if res & 0x0F == 0x0F { nf |= FLAG_H; }
    if res == 0x7F { nf |= FLAG_PV; }
    (res, nf)
}

/// Shift/rotate selected by bits 5–3 of a CB opcode:
/// RLC, RRC, RL, RR, SLA, SRA, SLL, SRL.
pub(super) fn rot(op: u8, v: u8, f: u8) -> (u8, u8) {
    let cin = f & FLAG_C;
    let (res, cout) = match op & 7 {
        0 => (v.rotate_left(1), v >> 7),
        1 => (v.rotate_right(1), v & 1),
        2 => (v << 1 | cin, v >> 7),
        3 => (v >> 1 | cin << 7, v & 1),
        4 => (v << 1, v >> 7),
        5 => (v >> 1 | (v & 0x80), v & 1),
        6 => (v << 1 | 1, v >> 7),
        _ => (v >> 1, v & 1),
    };
    (res, sz53p(res) | cout)
}

/// RLCA/RRCA/RLA/RRA: like [`rot`] but S, Z and P/V are preserved.
pub(super) fn rot_a(op: u8, a: u8, f: u8) -> (u8, u8) {
    let (res, rf) = rot(op, a, f);
    (res, (f & (FLAG_S | FLAG_Z | FLAG_PV)) | (res & XY) | (rf & FLAG_C))
}

/// BIT n: `xy` supplies the undocumented bits 3/5.
pub(super) fn bit(n: u8, v: u8, xy: u8, f: u8) -> u8 {
    let set = v & (1 << n) != 0;
    let mut nf = (f & FLAG_C) | FLAG_H | (xy & XY);
    if !set { nf |= FLAG_Z | FLAG_PV; }
    if n == 7 && set { nf |= FLAG_S; }
    nf
}

pub(super) fn daa(a: u8, f: u8) -> (u8, u8) {
    let lo = a & 0x0F;
    let mut diff = 0u8;
    let mut carry = f & FLAG_C != 0;
    if f & FLAG_H != 0 || lo > 9 { diff |= 0x06; }
    if carry || a > 0x99 {
        diff |= 0x60;
        carry = true;
    }
    let subtract = f & FLAG_N != 0;
    let res = if subtract { a.wrapping_sub(diff) } else { a.wrapping_add(diff) };
    let half = if subtract { f & FLAG_H != 0 && lo < 6 } else { lo > 9 };
    let mut nf = sz53p(res) | (f & FLAG_N);
    if half { nf |= FLAG_H; }
    if carry { nf |= FLAG_C; }
    (res, nf)
}

/// ADD HL,rr: S, Z and P/V preserved.
pub(super) fn add16(a: u16, b: u16, f: u8) -> (u16, u8) {
    let r = a as u32 + b as u32;
    let res = r as u16;
    let mut nf = (f & (FLAG_S | FLAG_Z | FLAG_PV))
        | (((a ^ b ^ res) >> 8) as u8 & FLAG_H)
        | ((res >> 8) as u8 & XY);
    if r > 0xFFFF { nf |= FLAG_C; }
    (res, nf)
}

pub(super) fn adc16(a: u16, b: u16, f: u8) -> (u16, u8) {
    let r = a as u32 + b as u32 + (f & FLAG_C) as u32;
    let res = r as u16;
    let mut nf = ((res >> 8) as u8 & (FLAG_S | XY)) | (((a ^ b ^ res) >> 8) as u8 & FLAG_H);
    if res == 0 { nf |= FLAG_Z; }
    if !(a ^ b) & (a ^ res) & 0x8000 != 0 { nf |= FLAG_PV; }
    if r > 0xFFFF { nf |= FLAG_C; }
    (res, nf)
}

pub(super) fn sbc16(a: u16, b: u16, f: u8) -> (u16, u8) {
    let r = a as i32 - b as i32 - (f & FLAG_C) as i32;
    let res = r as u16;
    let mut nf =
        ((res >> 8) as u8 & (FLAG_S | XY)) | (((a ^ b ^ res) >> 8) as u8 & FLAG_H) | FLAG_N;
    if res == 0 { nf |= FLAG_Z; }
    if (a ^ b) & (a ^ res) & 0x8000 != 0 { nf |= FLAG_PV; }
    if r < 0 { nf |= FLAG_C; }
    (res, nf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add8_flags() {
        assert_eq!(add8(0x0F, 0x01, false), (0x10, FLAG_H));
        assert_eq!(add8(0x7F, 0x01, false), (0x80, FLAG_S | FLAG_H | FLAG_PV));
        assert_eq!(add8(0xFF, 0x01, false), (0x00, FLAG_Z | FLAG_H | FLAG_C));
        assert_eq!(add8(0x10, 0x10, true), (0x21, FLAG_Y));
    }

    #[test]
    fn test_sub8_flags() {
        assert_eq!(sub8(0x10, 0x01, false), (0x0F, FLAG_N | FLAG_H | FLAG_X));
        assert_eq!(sub8(0x80, 0x01, false).1 & FLAG_PV, FLAG_PV);
        let all = FLAG_S | FLAG_Y | FLAG_H | FLAG_X | FLAG_N | FLAG_C;
        assert_eq!(sub8(0x00, 0x01, false), (0xFF, all));
        assert_eq!(sub8(0x05, 0x05, false).1 & FLAG_Z, FLAG_Z);
        assert_eq!(sub8(0x05, 0x04, true).1 & FLAG_Z, FLAG_Z);
    }

    #[test]
    fn test_cp_xy_from_operand() {
        let f = cp8(0x00, 0x28);
        assert_eq!(f & (FLAG_X | FLAG_Y), 0x28);
        assert_eq!(f & FLAG_C, FLAG_C);
    }

    #[test]
    fn test_logic_parity() {
        assert_eq!(and8(0xF0, 0x3C), (0x30, FLAG_Y | FLAG_H | FLAG_PV));
        assert_eq!(xor8(0xFF, 0xFF), (0x00, FLAG_Z | FLAG_PV));
        assert_eq!(or8(0x01, 0x00), (0x01, 0));
    }

    #[test]
    fn test_inc_dec() {
        assert_eq!(inc8(0x7F, FLAG_C), (0x80, FLAG_C | FLAG_S | FLAG_H | FLAG_PV));
        assert_eq!(inc8(0xFF, 0), (0x00, FLAG_Z | FLAG_H));
        assert_eq!(dec8(0x80, 0), (0x7F, FLAG_N | FLAG_H | FLAG_PV | FLAG_Y | FLAG_X));
        assert_eq!(dec8(0x01, 0), (0x00, FLAG_N | FLAG_Z));
    }

    #[test]
    fn test_rotates() {
        assert_eq!(rot(0, 0x81, 0), (0x03, FLAG_C | FLAG_PV));
        assert_eq!(rot(2, 0x80, FLAG_C), (0x01, FLAG_C));
        assert_eq!(rot(3, 0x01, 0), (0x00, FLAG_Z | FLAG_PV | FLAG_C));
        assert_eq!(rot(5, 0x81, 0).0, 0xC0);
        assert_eq!(rot(6, 0x00, 0).0, 0x01);
        assert_eq!(rot(7, 0x80, 0).0, 0x40);
        // RLCA keeps Z even for a zero result
        assert_eq!(rot_a(0, 0x00, FLAG_Z), (0x00, FLAG_Z));
    }

    #[test]
    fn test_bit() {
        assert_eq!(bit(0, 0x00, 0, 0), FLAG_Z | FLAG_PV | FLAG_H);
        assert_eq!(bit(7, 0x80, 0, FLAG_C), FLAG_S | FLAG_H | FLAG_C);
    }

    #[test]
    fn test_daa() {
        let (sum, f) = add8(0x15, 0x27, false);
        assert_eq!(daa(sum, f).0, 0x42);
        let (sum, f) = add8(0x99, 0x01, false);
        let (r, nf) = daa(sum, f);
        assert_eq!(r, 0x00);
        assert!(nf & FLAG_C != 0 && nf & FLAG_Z != 0);
        let (diff, f) = sub8(0x42, 0x15, false);
        assert_eq!(daa(diff, f).0, 0x27);
    }

    #[test]
    fn test_16bit() {
        assert_eq!(add16(0x0FFF, 0x0001, FLAG_Z), (0x1000, FLAG_Z | FLAG_H));
        assert_eq!(add16(0xFFFF, 0x0001, 0).1 & FLAG_C, FLAG_C);
        assert_eq!(adc16(0x7FFF, 0x0000, FLAG_C).1 & (FLAG_PV | FLAG_S), FLAG_PV | FLAG_S);
        assert_eq!(sbc16(0x1000, 0x1000, 0).1 & (FLAG_Z | FLAG_N), FLAG_Z | FLAG_N);
        let all = FLAG_S | FLAG_Y | FLAG_X | FLAG_H | FLAG_N | FLAG_C;
        assert_eq!(sbc16(0x0000, 0x0000, FLAG_C), (0xFFFF, all));
    }
}
