//! Disassembler used by traces and the `disasm` command.

use std::fmt;

use super::{decode, field, DecodedInstruction, Opcode, REG_BLOCK_DIM, REG_BLOCK_IDX, REG_THREAD_IDX};

/// Assembler name of a register.
pub fn register_name(reg: u8) -> String {
    match reg {
        REG_BLOCK_IDX => "%blockIdx".to_string(),
        REG_BLOCK_DIM => "%blockDim".to_string(),
        REG_THREAD_IDX => "%threadIdx".to_string(),
        r => format!("R{}", r),
    }
}

/// Disassemble one instruction word.
pub fn disassemble(word: u16) -> String {
    decode(word).to_string()
}

impl fmt::Display for DecodedInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(op) = self.opcode else {
            return write!(f, "UNK({:04b})", field(self.word, 12, 4));
        };
        let r = register_name;
        let m = op.mnemonic();
        match op {
            Opcode::Nop | Opcode::Ret => write!(f, "{}", m),
            Opcode::Branch => write!(f, "BR{} {}", self.nzp.suffix(), self.branch_offset),
            // CMP and STR carry their operands in rs/rt after decode.
            Opcode::Cmp | Opcode::Str => write!(f, "{} {}, {}", m, r(self.rs), r(self.rt)),
            Opcode::Ldr => write!(f, "{} {}, {}", m, r(self.rd), r(self.rs)),
            Opcode::Const => write!(f, "{} {}, #{}", m, r(self.rd), self.immediate as i8),
            Opcode::Add
            | Opcode::Sub
            | Opcode::Mul
            | Opcode::Div
            | Opcode::Fma
            | Opcode::Act => write!(f, "{} {}, {}, {}", m, r(self.rd), r(self.rs), r(self.rt)),
        }
    }
}
