//! Cycle snapshots and their text rendering.
//!
//! A [`GpuSnapshot`] captures the architecturally visible state of every
//! core at one cycle. Its `Display` output is the trace format written at
//! `trace` log level:
//!
//! ```text
//! =================================== Cycle 42 ===================================
//! +---------------------- Core 0 ----------------------+
//! State: EXECUTE  Fetcher: IDLE  PC: 5  Block: 1 (4 threads)
//! Instruction: ADD R4, R1, R0
//!   T0 LSU=IDLE     NZP=000 RS=0x0000 RT=0x0004 ALU=0x0004 FMA=0x0000 ACT=0x0000
//!      R0=0x0004 R1=0x0000 ... %blockIdx=1 %blockDim=4 %threadIdx=0
//! ```

use std::fmt;

use crate::core::{Core, CoreState, FetcherState, LsuState};
use crate::isa::{register_name, DecodedInstruction, NUM_REGISTERS};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadSnapshot {
    pub index: u8,
    pub lsu_state: LsuState,
    pub registers: [u16; NUM_REGISTERS],
    pub rs: u16,
    pub rt: u16,
    pub alu_out: u16,
    pub fma_out: u16,
    pub activation_out: u16,
    pub nzp: u8,
    pub next_pc: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreSnapshot {
    pub id: usize,
    pub state: CoreState,
    pub fetcher_state: FetcherState,
    pub current_pc: u16,
    pub instruction: DecodedInstruction,
    pub block_id: u16,
    /// Enabled threads only.
    pub threads: Vec<ThreadSnapshot>,
}

impl CoreSnapshot {
    pub fn capture(core: &Core) -> Self {
        let enabled = (core.thread_count() as usize).min(core.threads().len());
        let threads = core.threads()[..enabled]
            .iter()
            .map(|t| {
                let (rs, rt) = t.registers().operands();
                ThreadSnapshot {
                    index: t.index(),
                    lsu_state: t.lsu().state(),
                    registers: *t.registers().as_slice(),
                    rs,
                    rt,
                    alu_out: t.alu().out(),
                    fma_out: t.fma().out(),
                    activation_out: t.activation().out(),
                    nzp: t.pc().nzp().bits(),
                    next_pc: t.pc().next_pc(),
                }
            })
            .collect();
        Self {
            id: core.id(),
            state: core.state(),
            fetcher_state: core.fetcher().state(),
            current_pc: core.current_pc(),
            instruction: core.decoded(),
            block_id: core.block_id(),
            threads,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpuSnapshot {
    pub cycle: u64,
    pub cores: Vec<CoreSnapshot>,
}

impl fmt::Display for ThreadSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "  T{:<2} LSU={:<10} NZP={:03b} RS=0x{:04X} RT=0x{:04X} ALU=0x{:04X} FMA=0x{:04X} ACT=0x{:04X}",
            self.index,
            self.lsu_state.name(),
            self.nzp,
            self.rs,
            self.rt,
            self.alu_out,
            self.fma_out,
            self.activation_out
        )?;
        write!(f, "     ")?;
        for (i, value) in self.registers.iter().enumerate() {
            if i < 13 {
                write!(f, " {}=0x{:04X}", register_name(i as u8), value)?;
            } else {
                write!(f, " {}={}", register_name(i as u8), value)?;
            }
        }
        writeln!(f)
    }
}

impl fmt::Display for CoreSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "+{} Core {} {}+", "-".repeat(22), self.id, "-".repeat(22))?;
        writeln!(
            f,
            "State: {:<8} Fetcher: {:<9} PC: {:<4} Block: {} ({} threads)",
            self.state.name(),
            self.fetcher_state.name(),
            self.current_pc,
            self.block_id,
            self.threads.len()
        )?;
        writeln!(f, "Instruction: {}", self.instruction)?;
        for thread in &self.threads {
            write!(f, "{}", thread)?;
        }
        Ok(())
    }
}

impl fmt::Display for GpuSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bar = "=".repeat(35);
        writeln!(f, "{} Cycle {} {}", bar, self.cycle, bar)?;
        for core in &self.cores {
            write!(f, "{}", core)?;
        }
        Ok(())
    }
}

/// Render a memory range as rows of eight words.
pub fn format_memory(words: &[u16], start: u16, title: &str) -> String {
    let mut out = format!("{} [{}..{}]\n", title, start, start as usize + words.len());
    for (row, chunk) in words.chunks(8).enumerate() {
        out.push_str(&format!("  {:04X}:", start as usize + row * 8));
        for word in chunk {
            out.push_str(&format!(" {:04X}", word));
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_memory_rows() {
        let words: Vec<u16> = (0..10).collect();
        let text = format_memory(&words, 16, "Data");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Data [16..26]");
        assert_eq!(lines[1], "  0010: 0000 0001 0002 0003 0004 0005 0006 0007");
        assert_eq!(lines[2], "  0018: 0008 0009");
    }

    #[test]
    fn test_core_snapshot_of_fresh_core() {
        let core = Core::new(3, 4, 8);
        let snap = CoreSnapshot::capture(&core);
        assert_eq!(snap.id, 3);
        assert_eq!(snap.state, CoreState::Idle);
        assert!(snap.threads.is_empty(), "no threads enabled before dispatch");
        let text = snap.to_string();
        assert!(text.contains("Core 3"));
        assert!(text.contains("Instruction: NOP"));
    }
}
