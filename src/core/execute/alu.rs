//! Integer ALU.
//!
//! Arithmetic is plain 16-bit integer arithmetic for address and index
//! computation: add, sub and mul wrap, and DIV is unsigned with `x / 0 = 0`.
//! The compare mode writes the `{N, Z, P}` mask of a signed comparison into
//! the low three bits.

use crate::core::{CoreSignals, CoreState};
use crate::isa::{AluOp, AluOutput, Nzp};

#[derive(Debug, Clone, Default)]
pub struct Alu {
    out: u16,
}

impl Alu {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn out(&self) -> u16 {
        self.out
    }

    pub fn reset(&mut self) {
        self.out = 0;
    }

    /// Combinational arithmetic result.
    pub fn compute(op: AluOp, rs: u16, rt: u16) -> u16 {
        match op {
            AluOp::Add => rs.wrapping_add(rt),
            AluOp::Sub => rs.wrapping_sub(rt),
            AluOp::Mul => rs.wrapping_mul(rt),
            AluOp::Div => rs.checked_div(rt).unwrap_or(0),
        }
    }

    pub fn clock(&mut self, signals: &CoreSignals, rs: u16, rt: u16) {
        if signals.state != CoreState::Execute {
            return;
        }
        let d = &signals.decoded;
        self.out = match d.alu_output {
            AluOutput::Compare => Nzp::compare(rs, rt).bits() as u16,
            AluOutput::Arithmetic => Self::compute(d.alu_op, rs, rt),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::{asm, decode};

    fn at(state: CoreState, word: u16) -> CoreSignals {
        CoreSignals {
            state,
            decoded: decode(word),
            ..Default::default()
        }
    }

    #[test]
    fn test_arithmetic_wraps() {
        assert_eq!(Alu::compute(AluOp::Add, 0xFFFF, 1), 0);
        assert_eq!(Alu::compute(AluOp::Sub, 0, 1), 0xFFFF);
        assert_eq!(Alu::compute(AluOp::Mul, 256, 256), 0);
        assert_eq!(Alu::compute(AluOp::Mul, 3, 4), 12);
    }

    #[test]
    fn test_div() {
        assert_eq!(Alu::compute(AluOp::Div, 7, 2), 3);
        assert_eq!(Alu::compute(AluOp::Div, 0xFFFF, 2), 0x7FFF, "unsigned");
        assert_eq!(Alu::compute(AluOp::Div, 42, 0), 0, "divide by zero yields 0");
    }

    #[test]
    fn test_indexing_sequence() {
        // row = i / N, col = i - row * N, as the matmul kernel computes them.
        let n = 2;
        for i in 0..4u16 {
            let row = Alu::compute(AluOp::Div, i, n);
            let col = Alu::compute(AluOp::Sub, i, Alu::compute(AluOp::Mul, row, n));
            assert_eq!((row, col), (i / n, i % n));
        }
    }

    #[test]
    fn test_latches_only_in_execute() {
        let mut alu = Alu::new();
        let add = asm::add(0, 1, 2);
        for state in [CoreState::Request, CoreState::Wait, CoreState::Update] {
            alu.clock(&at(state, add), 2, 3);
            assert_eq!(alu.out(), 0, "{state}");
        }
        alu.clock(&at(CoreState::Execute, add), 2, 3);
        assert_eq!(alu.out(), 5);
    }

    #[test]
    fn test_compare_mode() {
        let mut alu = Alu::new();
        let cmp = asm::cmp(1, 2);
        alu.clock(&at(CoreState::Execute, cmp), 1, 2);
        assert_eq!(alu.out(), 0b100);
        alu.clock(&at(CoreState::Execute, cmp), 2, 2);
        assert_eq!(alu.out(), 0b010);
        alu.clock(&at(CoreState::Execute, cmp), 0x0002, 0xFFFF);
        assert_eq!(alu.out(), 0b001, "2 > -1");
    }
}
