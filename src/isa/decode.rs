//! Combinational instruction decoder.
//!
//! [`decode`] is a pure function of the instruction word. The core calls it
//! every cycle against the fetcher's instruction register, so the control
//! bundle is stable for as long as the instruction is.

use std::fmt;

use super::{field, sign_extend, Opcode};

/// Register write-back source (the register file's input mux).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegWriteSource {
    Alu,
    Memory,
    /// Sign-extended 8-bit immediate.
    Constant,
    Fma,
    Activation,
}

/// Data memory access issued by the LSU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemAccess {
    /// `Rd <- mem[Rs]`
    Read,
    /// `mem[Rd] <- Rs`
    Write,
}

/// Integer ALU operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AluOp {
    #[default]
    Add,
    Sub,
    Mul,
    Div,
}

/// Which ALU result is latched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AluOutput {
    #[default]
    Arithmetic,
    /// `{N, Z, P}` compare mask in the low three bits.
    Compare,
}

/// Next-PC source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PcMux {
    #[default]
    Increment,
    Branch,
}

/// Activation applied after the bias add.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ActivationFunction {
    #[default]
    None,
    Relu,
    /// Negative inputs are scaled by `2^-7`.
    LeakyRelu,
    /// Behaves exactly like [`ActivationFunction::Relu`]; the upper clip is
    /// not implemented in hardware.
    ClippedRelu,
}

impl ActivationFunction {
    /// Decode the 2-bit function select.
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0b00 => ActivationFunction::None,
            0b01 => ActivationFunction::Relu,
            0b10 => ActivationFunction::LeakyRelu,
            _ => ActivationFunction::ClippedRelu,
        }
    }

    pub fn bits(self) -> u8 {
        match self {
            ActivationFunction::None => 0b00,
            ActivationFunction::Relu => 0b01,
            ActivationFunction::LeakyRelu => 0b10,
            ActivationFunction::ClippedRelu => 0b11,
        }
    }
}

/// 3-bit condition mask: N (bit 2), Z (bit 1), P (bit 0).
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Nzp(u8);

impl Nzp {
    pub const NONE: Nzp = Nzp(0);
    pub const N: Nzp = Nzp(0b100);
    pub const Z: Nzp = Nzp(0b010);
    pub const P: Nzp = Nzp(0b001);
    pub const ALL: Nzp = Nzp(0b111);

    /// Build from the low three bits.
    #[inline]
    pub const fn from_bits(bits: u8) -> Self {
        Nzp(bits & 0b111)
    }

    #[inline]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Result of a signed comparison of `rs` against `rt`.
    pub fn compare(rs: u16, rt: u16) -> Self {
        match (rs as i16).cmp(&(rt as i16)) {
            std::cmp::Ordering::Less => Nzp::N,
            std::cmp::Ordering::Equal => Nzp::Z,
            std::cmp::Ordering::Greater => Nzp::P,
        }
    }

    /// True if any condition bit is shared.
    #[inline]
    pub const fn intersects(self, other: Nzp) -> bool {
        self.0 & other.0 != 0
    }

    /// Lower-case condition suffix (`"nz"`, `"p"`, ...).
    pub fn suffix(self) -> String {
        let mut s = String::with_capacity(3);
        if self.intersects(Nzp::N) {
            s.push('n');
        }
        if self.intersects(Nzp::Z) {
            s.push('z');
        }
        if self.intersects(Nzp::P) {
            s.push('p');
        }
        s
    }
}

impl fmt::Debug for Nzp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Nzp({:03b})", self.0)
    }
}

/// Control bundle produced by the decoder.
///
/// Enable/mux pairs that only make sense together are folded into `Option`s:
/// a register write always names its source, a memory access always names its
/// direction, and an activation always names its function.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodedInstruction {
    /// Raw instruction word.
    pub word: u16,
    /// `None` for unassigned opcodes, which decode as NOP.
    pub opcode: Option<Opcode>,
    /// Destination register.
    pub rd: u8,
    /// First source register (after the CMP/STR remap).
    pub rs: u8,
    /// Second source register (after the CMP/STR remap).
    pub rt: u8,
    /// Branch condition mask.
    pub nzp: Nzp,
    /// Raw 8-bit immediate, sign-extended at write-back.
    pub immediate: u8,
    /// Sign-extended 9-bit branch offset.
    pub branch_offset: i16,
    pub reg_write: Option<RegWriteSource>,
    pub mem_access: Option<MemAccess>,
    pub nzp_write: bool,
    pub alu_op: AluOp,
    pub alu_output: AluOutput,
    pub pc_mux: PcMux,
    pub activation: Option<ActivationFunction>,
    pub ret: bool,
}

impl DecodedInstruction {
    #[inline]
    pub fn reg_write_enable(&self) -> bool {
        self.reg_write.is_some()
    }

    #[inline]
    pub fn mem_read_enable(&self) -> bool {
        self.mem_access == Some(MemAccess::Read)
    }

    #[inline]
    pub fn mem_write_enable(&self) -> bool {
        self.mem_access == Some(MemAccess::Write)
    }

    /// FMA instructions hold EXECUTE for two cycles.
    #[inline]
    pub fn fma_enable(&self) -> bool {
        self.reg_write == Some(RegWriteSource::Fma)
    }

    /// Sign-extended CONST immediate.
    #[inline]
    pub fn immediate_value(&self) -> u16 {
        self.immediate as i8 as i16 as u16
    }
}

/// Decode an instruction word into its control bundle.
pub fn decode(word: u16) -> DecodedInstruction {
    let rd_field = field(word, 8, 4) as u8;
    let rs_field = field(word, 4, 4) as u8;
    let rt_field = field(word, 0, 4) as u8;
    let opcode = Opcode::of(word);

    let mut d = DecodedInstruction {
        word,
        opcode,
        rd: rd_field,
        rs: rs_field,
        rt: rt_field,
        nzp: Nzp::from_bits(field(word, 9, 3) as u8),
        immediate: field(word, 0, 8) as u8,
        branch_offset: sign_extend(field(word, 0, 9), 9),
        ..Default::default()
    };

    let Some(opcode) = opcode else {
        return d;
    };

    match opcode {
        Opcode::Nop => {}
        Opcode::Branch => d.pc_mux = PcMux::Branch,
        Opcode::Cmp => {
            // Operands live in the rd/rs fields.
            d.rs = rd_field;
            d.rt = rs_field;
            d.alu_output = AluOutput::Compare;
            d.nzp_write = true;
        }
        Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::Div => {
            d.reg_write = Some(RegWriteSource::Alu);
            d.alu_op = match opcode {
                Opcode::Add => AluOp::Add,
                Opcode::Sub => AluOp::Sub,
                Opcode::Mul => AluOp::Mul,
                _ => AluOp::Div,
            };
        }
        Opcode::Ldr => {
            d.reg_write = Some(RegWriteSource::Memory);
            d.mem_access = Some(MemAccess::Read);
        }
        Opcode::Str => {
            // Address in rd, data in rs.
            d.rs = rd_field;
            d.rt = rs_field;
            d.mem_access = Some(MemAccess::Write);
        }
        Opcode::Const => d.reg_write = Some(RegWriteSource::Constant),
        Opcode::Fma => d.reg_write = Some(RegWriteSource::Fma),
        Opcode::Act => {
            d.reg_write = Some(RegWriteSource::Activation);
            d.activation = Some(ActivationFunction::from_bits(field(word, 8, 2) as u8));
        }
        Opcode::Ret => d.ret = true,
    }

    d
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::asm;

    #[test]
    fn test_decode_nop() {
        let d = decode(asm::nop());
        assert_eq!(d.opcode, Some(Opcode::Nop));
        assert!(!d.reg_write_enable());
        assert!(d.mem_access.is_none());
        assert!(!d.nzp_write);
        assert_eq!(d.pc_mux, PcMux::Increment);
        assert!(!d.ret);
    }

    #[test]
    fn test_decode_arithmetic() {
        for (word, op) in [
            (asm::add(1, 2, 3), AluOp::Add),
            (asm::sub(1, 2, 3), AluOp::Sub),
            (asm::mul(1, 2, 3), AluOp::Mul),
            (asm::div(1, 2, 3), AluOp::Div),
        ] {
            let d = decode(word);
            assert_eq!((d.rd, d.rs, d.rt), (1, 2, 3));
            assert_eq!(d.reg_write, Some(RegWriteSource::Alu));
            assert_eq!(d.alu_op, op);
            assert_eq!(d.alu_output, AluOutput::Arithmetic);
        }
    }

    #[test]
    fn test_decode_cmp_remaps_operands() {
        let d = decode(asm::cmp(1, 2));
        assert_eq!(d.rs, 1, "first CMP operand comes from the rd field");
        assert_eq!(d.rt, 2, "second CMP operand comes from the rs field");
        assert_eq!(d.alu_output, AluOutput::Compare);
        assert!(d.nzp_write);
        assert!(!d.reg_write_enable());
    }

    #[test]
    fn test_decode_str_remaps_operands() {
        let d = decode(asm::str(7, 6));
        assert_eq!(d.rs, 7, "address register");
        assert_eq!(d.rt, 6, "data register");
        assert!(d.mem_write_enable());
        assert!(!d.mem_read_enable());
        assert!(!d.reg_write_enable());
    }

    #[test]
    fn test_decode_ldr() {
        let d = decode(asm::ldr(4, 5));
        assert_eq!((d.rd, d.rs), (4, 5));
        assert!(d.mem_read_enable());
        assert_eq!(d.reg_write, Some(RegWriteSource::Memory));
    }

    #[test]
    fn test_decode_const() {
        let d = decode(asm::constant(5, 255));
        assert_eq!(d.rd, 5);
        assert_eq!(d.immediate, 255);
        assert_eq!(d.immediate_value(), 0xFFFF, "immediate is sign-extended on write");
        assert_eq!(decode(asm::constant(3, 16)).immediate_value(), 16);
        assert_eq!(d.reg_write, Some(RegWriteSource::Constant));
    }

    #[test]
    fn test_decode_branch() {
        let d = decode(asm::brn(-12));
        assert_eq!(d.pc_mux, PcMux::Branch);
        assert_eq!(d.nzp, Nzp::N);
        assert_eq!(d.branch_offset, -12);
        assert!(!d.reg_write_enable());

        let d = decode(asm::br(Nzp::ALL, 255));
        assert_eq!(d.nzp.bits(), 0b111);
        assert_eq!(d.branch_offset, 255);
    }

    #[test]
    fn test_decode_fma() {
        let d = decode(asm::fma(8, 10, 11));
        assert_eq!((d.rd, d.rs, d.rt), (8, 10, 11));
        assert!(d.fma_enable());
        assert_eq!(d.reg_write, Some(RegWriteSource::Fma));
    }

    #[test]
    fn test_decode_act_function_overlaps_rd() {
        let d = decode(asm::act(5, 1, 2));
        assert_eq!(d.rd, 5);
        assert_eq!(d.activation, Some(ActivationFunction::Relu), "rd=0b0101 selects ReLU");
        assert_eq!(decode(asm::act(6, 1, 2)).activation, Some(ActivationFunction::LeakyRelu));
        assert_eq!(decode(asm::act(7, 1, 2)).activation, Some(ActivationFunction::ClippedRelu));
        assert_eq!(decode(asm::act(4, 1, 2)).activation, Some(ActivationFunction::None));
    }

    #[test]
    fn test_decode_ret() {
        let d = decode(asm::ret());
        assert!(d.ret);
        assert!(!d.reg_write_enable());
    }

    #[test]
    fn test_decode_unknown_is_nop() {
        for word in [0xC123u16, 0xD456, 0xE789] {
            let d = decode(word);
            assert_eq!(d.opcode, None);
            assert!(!d.reg_write_enable());
            assert!(d.mem_access.is_none());
            assert!(!d.nzp_write);
            assert_eq!(d.pc_mux, PcMux::Increment);
            assert!(!d.ret);
            assert!(d.activation.is_none());
        }
    }

    #[test]
    fn test_nzp_compare_is_signed() {
        assert_eq!(Nzp::compare(1, 2), Nzp::N);
        assert_eq!(Nzp::compare(2, 2), Nzp::Z);
        assert_eq!(Nzp::compare(3, 2), Nzp::P);
        assert_eq!(Nzp::compare(0xFFFF, 0), Nzp::N, "-1 < 0");
        assert_eq!(Nzp::compare(0x7FFF, 0x8000), Nzp::P);
    }

    #[test]
    fn test_nzp_suffix() {
        assert_eq!(Nzp::N.suffix(), "n");
        assert_eq!(Nzp::from_bits(0b011).suffix(), "zp");
        assert_eq!(Nzp::ALL.suffix(), "nzp");
    }
}
