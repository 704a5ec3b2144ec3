//! Instruction encoders.
//!
//! One function per mnemonic, returning the 16-bit instruction word. Register
//! arguments are masked to four bits and immediates to their field width.

use super::{Nzp, Opcode};

#[inline]
fn rrr(op: Opcode, rd: u8, rs: u8, rt: u8) -> u16 {
    ((op as u16) << 12) | (((rd & 0xF) as u16) << 8) | (((rs & 0xF) as u16) << 4) | (rt & 0xF) as u16
}

pub fn nop() -> u16 {
    0x0000
}

pub fn ret() -> u16 {
    (Opcode::Ret as u16) << 12
}

/// `CONST Rd, #imm`. Only the low 8 bits of `imm` are encoded.
pub fn constant(rd: u8, imm: i16) -> u16 {
    ((Opcode::Const as u16) << 12) | (((rd & 0xF) as u16) << 8) | (imm as u16 & 0xFF)
}

pub fn add(rd: u8, rs: u8, rt: u8) -> u16 {
    rrr(Opcode::Add, rd, rs, rt)
}

pub fn sub(rd: u8, rs: u8, rt: u8) -> u16 {
    rrr(Opcode::Sub, rd, rs, rt)
}

pub fn mul(rd: u8, rs: u8, rt: u8) -> u16 {
    rrr(Opcode::Mul, rd, rs, rt)
}

pub fn div(rd: u8, rs: u8, rt: u8) -> u16 {
    rrr(Opcode::Div, rd, rs, rt)
}

/// `LDR Rd, Rs`: `Rd <- mem[Rs]`.
pub fn ldr(rd: u8, rs: u8) -> u16 {
    rrr(Opcode::Ldr, rd, rs, 0)
}

/// `STR Rd, Rs`: `mem[Rd] <- Rs`.
pub fn str(rd: u8, rs: u8) -> u16 {
    rrr(Opcode::Str, rd, rs, 0)
}

/// `FMA Rd, Rs, Rt`: `Rd <- Rs * Rt + Rd` in Q1.15.
pub fn fma(rd: u8, rs: u8, rt: u8) -> u16 {
    rrr(Opcode::Fma, rd, rs, rt)
}

/// `ACT Rd, Rs, Rt`: `Rd <- f(Rs + Rt)`.
///
/// The function select is `rd[1:0]`, so the destination register also picks
/// the activation.
pub fn act(rd: u8, rs: u8, rt: u8) -> u16 {
    rrr(Opcode::Act, rd, rs, rt)
}

/// `CMP Rd, Rs`: sets NZP from `Rd <=> Rs`.
pub fn cmp(rd: u8, rs: u8) -> u16 {
    rrr(Opcode::Cmp, rd, rs, 0)
}

/// `BRnzp offset`: branch to `pc + 1 + offset` if the mask matches NZP.
pub fn br(nzp: Nzp, offset: i16) -> u16 {
    ((Opcode::Branch as u16) << 12) | ((nzp.bits() as u16) << 9) | (offset as u16 & 0x1FF)
}

pub fn brn(offset: i16) -> u16 {
    br(Nzp::N, offset)
}

pub fn brz(offset: i16) -> u16 {
    br(Nzp::Z, offset)
}

pub fn brp(offset: i16) -> u16 {
    br(Nzp::P, offset)
}

pub fn brnz(offset: i16) -> u16 {
    br(Nzp::from_bits(0b110), offset)
}

pub fn brnp(offset: i16) -> u16 {
    br(Nzp::from_bits(0b101), offset)
}

pub fn brzp(offset: i16) -> u16 {
    br(Nzp::from_bits(0b011), offset)
}

/// Unconditional (once any compare has run).
pub fn brnzp(offset: i16) -> u16 {
    br(Nzp::ALL, offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encodings() {
        assert_eq!(ret(), 0xF000);
        assert_eq!(constant(1, 0), 0x9100);
        assert_eq!(constant(5, 255), 0x95FF);
        assert_eq!(constant(2, -1), 0x92FF);
        assert_eq!(add(4, 1, 0), 0x3410);
        assert_eq!(mul(0, 13, 14), 0x50DE);
        assert_eq!(ldr(4, 4), 0x7440);
        assert_eq!(str(7, 6), 0x8760);
        assert_eq!(fma(8, 10, 11), 0xA8AB);
        assert_eq!(cmp(9, 2), 0x2920);
    }

    #[test]
    fn test_branch_encoding() {
        assert_eq!(brn(-12), 0x1000 | (0b100 << 9) | 0x1F4);
        assert_eq!(brz(3), 0x1403);
        assert_eq!(brp(1), 0x1201);
        assert_eq!(brnzp(0), 0x1E00);
    }
}
