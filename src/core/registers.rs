//! Per-thread register file.
//!
//! | Register   | Name         | Behaviour                                   |
//! |------------|--------------|---------------------------------------------|
//! | `R0..R12`  | general      | written only in UPDATE                      |
//! | `R13`      | `%blockIdx`  | follows the core's block id every cycle     |
//! | `R14`      | `%blockDim`  | threads per block, fixed at reset           |
//! | `R15`      | `%threadIdx` | the thread's slot, fixed at reset           |
//!
//! The `rs`/`rt` operand latches capture their registers in REQUEST and hold
//! them for the rest of the instruction.

use std::fmt;

use crate::core::{CoreSignals, CoreState};
use crate::isa::{
    register_name, RegWriteSource, NUM_REGISTERS, NUM_WRITABLE_REGISTERS, REG_BLOCK_DIM,
    REG_BLOCK_IDX, REG_THREAD_IDX,
};

/// Unit outputs offered to the write-back mux.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteBack {
    pub alu: u16,
    pub memory: u16,
    pub fma: u16,
    pub activation: u16,
}

#[derive(Clone)]
pub struct RegisterFile {
    regs: [u16; NUM_REGISTERS],
    rs: u16,
    rt: u16,
    block_dim: u16,
    thread_idx: u16,
}

impl RegisterFile {
    /// Register file for thread `thread_idx` of a `block_dim`-thread block.
    pub fn new(block_dim: u16, thread_idx: u16) -> Self {
        let mut rf = Self {
            regs: [0; NUM_REGISTERS],
            rs: 0,
            rt: 0,
            block_dim,
            thread_idx,
        };
        rf.reset();
        rf
    }

    /// Zero everything and reseed the read-only registers.
    pub fn reset(&mut self) {
        self.regs = [0; NUM_REGISTERS];
        self.regs[REG_BLOCK_DIM as usize] = self.block_dim;
        self.regs[REG_THREAD_IDX as usize] = self.thread_idx;
        self.rs = 0;
        self.rt = 0;
    }

    /// Combinational read port.
    #[inline]
    pub fn read(&self, reg: u8) -> u16 {
        self.regs[(reg & 0xF) as usize]
    }

    /// Latched `(rs, rt)` operands.
    #[inline]
    pub fn operands(&self) -> (u16, u16) {
        (self.rs, self.rt)
    }

    pub fn as_slice(&self) -> &[u16; NUM_REGISTERS] {
        &self.regs
    }

    /// Host-side write used to preset state in tests and demos.
    pub fn poke(&mut self, reg: u8, value: u16) {
        self.regs[(reg & 0xF) as usize] = value;
    }

    pub fn clock(&mut self, signals: &CoreSignals, write_back: WriteBack) {
        let d = &signals.decoded;

        if signals.state == CoreState::Request {
            self.rs = self.read(d.rs);
            self.rt = self.read(d.rt);
        }

        if signals.state == CoreState::Update && d.rd < NUM_WRITABLE_REGISTERS {
            if let Some(source) = d.reg_write {
                self.regs[d.rd as usize] = match source {
                    RegWriteSource::Alu => write_back.alu,
                    RegWriteSource::Memory => write_back.memory,
                    RegWriteSource::Constant => d.immediate_value(),
                    RegWriteSource::Fma => write_back.fma,
                    RegWriteSource::Activation => write_back.activation,
                };
            }
        }

        self.regs[REG_BLOCK_IDX as usize] = signals.block_id;
    }
}

impl fmt::Debug for RegisterFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Only show non-zero registers
        let non_zero: Vec<_> = self
            .regs
            .iter()
            .enumerate()
            .filter(|(_, &v)| v != 0)
            .map(|(i, v)| format!("{}=0x{:04X}", register_name(i as u8), v))
            .collect();
        write!(f, "RegisterFile {{ {} }}", non_zero.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::{asm, decode};

    fn signals(state: CoreState, word: u16) -> CoreSignals {
        CoreSignals {
            state,
            decoded: decode(word),
            block_id: 3,
            ..Default::default()
        }
    }

    #[test]
    fn test_reset_seeds_read_only() {
        let rf = RegisterFile::new(4, 2);
        assert_eq!(rf.read(REG_BLOCK_DIM), 4);
        assert_eq!(rf.read(REG_THREAD_IDX), 2);
        assert_eq!(rf.read(REG_BLOCK_IDX), 0);
        assert_eq!(rf.read(0), 0);
    }

    #[test]
    fn test_block_idx_tracks_every_cycle() {
        let mut rf = RegisterFile::new(4, 0);
        rf.clock(&signals(CoreState::Idle, asm::nop()), WriteBack::default());
        assert_eq!(rf.read(REG_BLOCK_IDX), 3);
    }

    #[test]
    fn test_operands_latch_in_request_only() {
        let mut rf = RegisterFile::new(4, 1);
        rf.poke(1, 11);
        rf.poke(2, 22);
        let word = asm::add(0, 1, 2);
        rf.clock(&signals(CoreState::Decode, word), WriteBack::default());
        assert_eq!(rf.operands(), (0, 0));
        rf.clock(&signals(CoreState::Request, word), WriteBack::default());
        assert_eq!(rf.operands(), (11, 22));
        rf.poke(1, 99);
        rf.clock(&signals(CoreState::Execute, word), WriteBack::default());
        assert_eq!(rf.operands(), (11, 22));
    }

    #[test]
    fn test_write_back_mux() {
        let wb = WriteBack {
            alu: 1,
            memory: 2,
            fma: 3,
            activation: 4,
        };
        let cases = [
            (asm::add(5, 0, 0), 1),
            (asm::ldr(5, 0), 2),
            (asm::fma(5, 0, 0), 3),
            (asm::act(5, 0, 0), 4),
            (asm::constant(5, -2), 0xFFFE),
        ];
        for (word, expected) in cases {
            let mut rf = RegisterFile::new(4, 0);
            rf.clock(&signals(CoreState::Update, word), wb);
            assert_eq!(rf.read(5), expected, "instruction 0x{word:04X}");
        }
    }

    #[test]
    fn test_write_only_in_update() {
        let mut rf = RegisterFile::new(4, 0);
        let wb = WriteBack { alu: 9, ..Default::default() };
        rf.clock(&signals(CoreState::Execute, asm::add(5, 0, 0)), wb);
        assert_eq!(rf.read(5), 0);
    }

    #[test]
    fn test_read_only_registers_ignore_writes() {
        let mut rf = RegisterFile::new(4, 2);
        let wb = WriteBack { alu: 0xAAAA, ..Default::default() };
        for rd in [REG_BLOCK_IDX, REG_BLOCK_DIM, REG_THREAD_IDX] {
            rf.clock(&signals(CoreState::Update, asm::add(rd, 0, 0)), wb);
        }
        assert_eq!(rf.read(REG_BLOCK_IDX), 3);
        assert_eq!(rf.read(REG_BLOCK_DIM), 4);
        assert_eq!(rf.read(REG_THREAD_IDX), 2);
    }

    #[test]
    fn test_non_writing_instructions_leave_registers() {
        let mut rf = RegisterFile::new(4, 0);
        let wb = WriteBack { alu: 7, ..Default::default() };
        for word in [asm::cmp(5, 0), asm::str(5, 0), asm::brn(1), asm::nop(), 0xC500] {
            rf.clock(&signals(CoreState::Update, word), wb);
            assert_eq!(rf.read(5), 0, "instruction 0x{word:04X}");
        }
    }
}
