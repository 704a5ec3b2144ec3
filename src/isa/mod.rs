//! Atreides instruction set.
//!
//! Every instruction is a single 16-bit word:
//!
//! | Bits    | Field                                    |
//! |---------|------------------------------------------|
//! | `15:12` | opcode                                   |
//! | `11:8`  | rd (BR: `11:9` is the NZP mask)          |
//! | `7:4`   | rs                                       |
//! | `3:0`   | rt                                       |
//! | `7:0`   | immediate (CONST)                        |
//! | `8:0`   | signed PC-relative offset (BR)           |
//! | `9:8`   | activation function (ACT, overlaps rd)   |
//!
//! # Example
//!
//! ```ignore
//! use atreides_sim::isa::{asm, decode, disassemble};
//!
//! let word = asm::add(4, 1, 0);
//! let decoded = decode(word);
//! assert!(decoded.reg_write_enable());
//! assert_eq!(disassemble(word), "ADD R4, R1, R0");
//! ```

pub mod asm;
mod decode;
mod disasm;

pub use decode::{
    decode, ActivationFunction, AluOp, AluOutput, DecodedInstruction, MemAccess, Nzp, PcMux,
    RegWriteSource,
};
pub use disasm::{disassemble, register_name};

/// Number of registers per thread.
pub const NUM_REGISTERS: usize = 16;

/// Registers `R0..R12` are writable; anything at or above this is read-only.
pub const NUM_WRITABLE_REGISTERS: u8 = 13;

/// `%blockIdx`: the block currently executing on the core.
pub const REG_BLOCK_IDX: u8 = 13;

/// `%blockDim`: threads per block.
pub const REG_BLOCK_DIM: u8 = 14;

/// `%threadIdx`: the thread's slot within its block.
pub const REG_THREAD_IDX: u8 = 15;

/// Instruction opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    Nop = 0x0,
    /// Conditional PC-relative branch on the NZP register.
    Branch = 0x1,
    /// Signed compare; sets NZP.
    Cmp = 0x2,
    Add = 0x3,
    Sub = 0x4,
    Mul = 0x5,
    Div = 0x6,
    /// Load a word from data memory.
    Ldr = 0x7,
    /// Store a word to data memory.
    Str = 0x8,
    /// Load an 8-bit sign-extended immediate.
    Const = 0x9,
    /// Q1.15 fused multiply-add: `Rd = Rs * Rt + Rd`.
    Fma = 0xA,
    /// Q1.15 bias-add followed by an activation function.
    Act = 0xB,
    /// Retire the block.
    Ret = 0xF,
}

impl Opcode {
    /// Decode a 4-bit opcode field. Unassigned encodings return `None`.
    pub fn from_bits(bits: u8) -> Option<Self> {
        Some(match bits & 0xF {
            0x0 => Opcode::Nop,
            0x1 => Opcode::Branch,
            0x2 => Opcode::Cmp,
            0x3 => Opcode::Add,
            0x4 => Opcode::Sub,
            0x5 => Opcode::Mul,
            0x6 => Opcode::Div,
            0x7 => Opcode::Ldr,
            0x8 => Opcode::Str,
            0x9 => Opcode::Const,
            0xA => Opcode::Fma,
            0xB => Opcode::Act,
            0xF => Opcode::Ret,
            _ => return None,
        })
    }

    /// Opcode of an instruction word.
    #[inline]
    pub fn of(word: u16) -> Option<Self> {
        Self::from_bits(field(word, 12, 4) as u8)
    }

    /// Assembler mnemonic.
    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Nop => "NOP",
            Opcode::Branch => "BR",
            Opcode::Cmp => "CMP",
            Opcode::Add => "ADD",
            Opcode::Sub => "SUB",
            Opcode::Mul => "MUL",
            Opcode::Div => "DIV",
            Opcode::Ldr => "LDR",
            Opcode::Str => "STR",
            Opcode::Const => "CONST",
            Opcode::Fma => "FMA",
            Opcode::Act => "ACT",
            Opcode::Ret => "RET",
        }
    }
}

/// Extract an unsigned bit field.
#[inline]
pub(crate) fn field(word: u16, lo: u32, width: u32) -> u16 {
    (word >> lo) & ((1u16 << width) - 1)
}

/// Sign-extend the low `bits` of `value`.
#[inline]
pub(crate) fn sign_extend(value: u16, bits: u32) -> i16 {
    let shift = 16 - bits;
    ((value << shift) as i16) >> shift
}
