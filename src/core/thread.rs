//! One thread slot: register file plus its private execution units.

use crate::core::execute::{ActivationUnit, Alu, FmaUnit};
use crate::core::lsu::LoadStoreUnit;
use crate::core::pc::ProgramCounter;
use crate::core::registers::{RegisterFile, WriteBack};
use crate::core::CoreSignals;
use crate::memory::MemResponse;

#[derive(Debug, Clone)]
pub struct Thread {
    index: u8,
    registers: RegisterFile,
    alu: Alu,
    fma: FmaUnit,
    activation: ActivationUnit,
    lsu: LoadStoreUnit,
    pc: ProgramCounter,
}

impl Thread {
    pub fn new(index: u8, threads_per_block: u16, program_addr_bits: u32) -> Self {
        Self {
            index,
            registers: RegisterFile::new(threads_per_block, index as u16),
            alu: Alu::new(),
            fma: FmaUnit::new(),
            activation: ActivationUnit::new(),
            lsu: LoadStoreUnit::new(),
            pc: ProgramCounter::new(program_addr_bits),
        }
    }

    pub fn index(&self) -> u8 {
        self.index
    }

    pub fn registers(&self) -> &RegisterFile {
        &self.registers
    }

    pub fn alu(&self) -> &Alu {
        &self.alu
    }

    pub fn fma(&self) -> &FmaUnit {
        &self.fma
    }

    pub fn activation(&self) -> &ActivationUnit {
        &self.activation
    }

    pub fn lsu(&self) -> &LoadStoreUnit {
        &self.lsu
    }

    pub fn pc(&self) -> &ProgramCounter {
        &self.pc
    }

    pub fn reset(&mut self) {
        self.registers.reset();
        self.alu.reset();
        self.fma.reset();
        self.activation.reset();
        self.lsu.reset();
        self.pc.reset();
    }

    /// Clock every unit of an enabled thread.
    ///
    /// All cross-unit values are sampled before any unit is clocked, so the
    /// order of the calls below does not matter.
    pub fn clock(&mut self, signals: &CoreSignals, response: MemResponse) {
        let d = &signals.decoded;
        let (rs, rt) = self.registers.operands();
        let rs_value = self.registers.read(d.rs);
        let rt_value = self.registers.read(d.rt);
        let rd_value = self.registers.read(d.rd);
        let alu_out = self.alu.out();
        let write_back = WriteBack {
            alu: alu_out,
            memory: self.lsu.out(),
            fma: self.fma.out(),
            activation: self.activation.out(),
        };

        self.registers.clock(signals, write_back);
        self.alu.clock(signals, rs, rt);
        self.fma.clock(signals, rs_value, rt_value, rd_value);
        self.activation.clock(signals, rs, rt_value);
        self.lsu.clock(signals, rs, rt, response);
        self.pc.clock(signals, alu_out);
    }
}
