//! Per-thread program counter and NZP register.

use crate::core::{CoreSignals, CoreState};
use crate::isa::{Nzp, PcMux};

#[derive(Debug, Clone)]
pub struct ProgramCounter {
    nzp: Nzp,
    next_pc: u16,
    /// Program address width mask.
    mask: u16,
}

impl ProgramCounter {
    /// PC unit for a program memory of `addr_bits` address bits.
    pub fn new(addr_bits: u32) -> Self {
        Self {
            nzp: Nzp::NONE,
            next_pc: 0,
            mask: ((1u32 << addr_bits) - 1) as u16,
        }
    }

    #[inline]
    pub fn nzp(&self) -> Nzp {
        self.nzp
    }

    #[inline]
    pub fn next_pc(&self) -> u16 {
        self.next_pc
    }

    pub fn reset(&mut self) {
        self.nzp = Nzp::NONE;
        self.next_pc = 0;
    }

    /// `alu_out` is the ALU's registered output, whose low bits carry the
    /// compare mask after a CMP.
    pub fn clock(&mut self, signals: &CoreSignals, alu_out: u16) {
        let d = &signals.decoded;
        match signals.state {
            CoreState::Execute => {
                let sequential = signals.current_pc.wrapping_add(1);
                let target = if d.pc_mux == PcMux::Branch && self.nzp.intersects(d.nzp) {
                    sequential.wrapping_add(d.branch_offset as u16)
                } else {
                    sequential
                };
                self.next_pc = target & self.mask;
            }
            CoreState::Update if d.nzp_write => {
                self.nzp = Nzp::from_bits(alu_out as u8);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::{asm, decode};

    fn at(state: CoreState, pc: u16, word: u16) -> CoreSignals {
        CoreSignals {
            state,
            current_pc: pc,
            decoded: decode(word),
            ..Default::default()
        }
    }

    #[test]
    fn test_sequential() {
        let mut pc = ProgramCounter::new(8);
        pc.clock(&at(CoreState::Execute, 4, asm::add(0, 0, 0)), 0);
        assert_eq!(pc.next_pc(), 5);
    }

    #[test]
    fn test_branch_taken_backward() {
        let mut pc = ProgramCounter::new(8);
        pc.clock(&at(CoreState::Update, 22, asm::cmp(9, 2)), Nzp::N.bits() as u16);
        assert_eq!(pc.nzp(), Nzp::N);
        pc.clock(&at(CoreState::Execute, 23, asm::brn(-12)), 0);
        assert_eq!(pc.next_pc(), 12);
    }

    #[test]
    fn test_branch_not_taken() {
        let mut pc = ProgramCounter::new(8);
        pc.clock(&at(CoreState::Update, 2, asm::cmp(1, 2)), Nzp::P.bits() as u16);
        pc.clock(&at(CoreState::Execute, 3, asm::brn(5)), 0);
        assert_eq!(pc.next_pc(), 4);
    }

    #[test]
    fn test_branch_without_compare_falls_through() {
        let mut pc = ProgramCounter::new(8);
        pc.clock(&at(CoreState::Execute, 0, asm::brnzp(3)), 0);
        assert_eq!(pc.next_pc(), 1, "NZP resets to 000");
    }

    #[test]
    fn test_nzp_written_only_by_compare_in_update() {
        let mut pc = ProgramCounter::new(8);
        pc.clock(&at(CoreState::Update, 0, asm::add(1, 2, 3)), 0b100);
        assert_eq!(pc.nzp(), Nzp::NONE);
        pc.clock(&at(CoreState::Execute, 0, asm::cmp(1, 2)), 0b100);
        assert_eq!(pc.nzp(), Nzp::NONE);
        pc.clock(&at(CoreState::Update, 0, asm::cmp(1, 2)), 0b010);
        assert_eq!(pc.nzp(), Nzp::Z);
    }

    #[test]
    fn test_pc_wraps_at_address_width() {
        let mut pc = ProgramCounter::new(8);
        pc.clock(&at(CoreState::Execute, 255, asm::nop()), 0);
        assert_eq!(pc.next_pc(), 0);
        let mut wide = ProgramCounter::new(12);
        wide.clock(&at(CoreState::Execute, 255, asm::nop()), 0);
        assert_eq!(wide.next_pc(), 256);
    }
}
