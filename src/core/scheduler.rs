//! Per-core scheduler FSM.
//!
//! ```text
//!  IDLE ─start─► FETCH ─fetched─► DECODE ─► REQUEST ─► WAIT ─lsus idle─► EXECUTE
//!                  ▲                                                      │  ▲ │
//!                  │                                            FMA pass 1└──┘ │
//!                  └──────────────── UPDATE ◄──────────────────────────────────┘
//!                                      │ RET
//!                                      ▼
//!                                     DONE
//! ```
//!
//! The state is broadcast to every thread unit as its only timing reference.

use std::fmt;

use crate::core::FetcherState;
use crate::isa::DecodedInstruction;

/// Scheduler state shared by every unit in a core.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum CoreState {
    #[default]
    Idle,
    Fetch,
    Decode,
    /// Operand latch and memory request issue.
    Request,
    /// Blocked until every LSU has finished.
    Wait,
    Execute,
    /// Register, NZP and PC commit.
    Update,
    /// Block retired; held until the dispatcher resets the core.
    Done,
}

impl CoreState {
    pub fn name(self) -> &'static str {
        match self {
            CoreState::Idle => "IDLE",
            CoreState::Fetch => "FETCH",
            CoreState::Decode => "DECODE",
            CoreState::Request => "REQUEST",
            CoreState::Wait => "WAIT",
            CoreState::Execute => "EXECUTE",
            CoreState::Update => "UPDATE",
            CoreState::Done => "DONE",
        }
    }
}

impl fmt::Display for CoreState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Scheduler registers.
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    state: CoreState,
    current_pc: u16,
    done: bool,
    /// Set while an FMA sits in its second EXECUTE cycle.
    fma_second_cycle: bool,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn state(&self) -> CoreState {
        self.state
    }

    #[inline]
    pub fn current_pc(&self) -> u16 {
        self.current_pc
    }

    #[inline]
    pub fn done(&self) -> bool {
        self.done
    }

    #[inline]
    pub fn fma_second_cycle(&self) -> bool {
        self.fma_second_cycle
    }

    /// Synchronous reset.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Advance one edge.
    ///
    /// `fetcher` and `lsu_busy` are the subordinate units' pre-edge values.
    /// `next_pc` is the converged next PC of the block, consumed only in
    /// UPDATE.
    pub fn clock(
        &mut self,
        start: bool,
        fetcher: FetcherState,
        lsu_busy: bool,
        decoded: &DecodedInstruction,
        next_pc: u16,
    ) {
        self.state = match self.state {
            CoreState::Idle if start => CoreState::Fetch,
            CoreState::Idle => CoreState::Idle,
            CoreState::Fetch if fetcher == FetcherState::Fetched => CoreState::Decode,
            CoreState::Fetch => CoreState::Fetch,
            CoreState::Decode => CoreState::Request,
            CoreState::Request => CoreState::Wait,
            CoreState::Wait if lsu_busy => CoreState::Wait,
            CoreState::Wait => CoreState::Execute,
            CoreState::Execute if decoded.fma_enable() && !self.fma_second_cycle => {
                self.fma_second_cycle = true;
                CoreState::Execute
            }
            CoreState::Execute => {
                self.fma_second_cycle = false;
                CoreState::Update
            }
            CoreState::Update if decoded.ret => {
                self.done = true;
                CoreState::Done
            }
            CoreState::Update => {
                self.current_pc = next_pc;
                CoreState::Fetch
            }
            CoreState::Done => CoreState::Done,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::{asm, decode};

    fn run_to(s: &mut Scheduler, target: CoreState, decoded: &DecodedInstruction) -> usize {
        let mut edges = 0;
        while s.state() != target {
            s.clock(true, FetcherState::Fetched, false, decoded, 7);
            edges += 1;
            assert!(edges < 32, "never reached {target}");
        }
        edges
    }

    #[test]
    fn test_idle_waits_for_start() {
        let mut s = Scheduler::new();
        let nop = decode(asm::nop());
        s.clock(false, FetcherState::Idle, false, &nop, 0);
        assert_eq!(s.state(), CoreState::Idle);
        s.clock(true, FetcherState::Idle, false, &nop, 0);
        assert_eq!(s.state(), CoreState::Fetch);
    }

    #[test]
    fn test_fetch_waits_for_fetcher() {
        let mut s = Scheduler::new();
        let nop = decode(asm::nop());
        s.clock(true, FetcherState::Idle, false, &nop, 0);
        s.clock(true, FetcherState::Fetching, false, &nop, 0);
        assert_eq!(s.state(), CoreState::Fetch);
        s.clock(true, FetcherState::Fetched, false, &nop, 0);
        assert_eq!(s.state(), CoreState::Decode);
    }

    #[test]
    fn test_wait_blocks_on_busy_lsu() {
        let mut s = Scheduler::new();
        let ldr = decode(asm::ldr(1, 2));
        run_to(&mut s, CoreState::Wait, &ldr);
        s.clock(true, FetcherState::Idle, true, &ldr, 0);
        assert_eq!(s.state(), CoreState::Wait);
        s.clock(true, FetcherState::Idle, false, &ldr, 0);
        assert_eq!(s.state(), CoreState::Execute);
    }

    #[test]
    fn test_fma_holds_execute_two_cycles() {
        let mut s = Scheduler::new();
        let fma = decode(asm::fma(1, 2, 3));
        run_to(&mut s, CoreState::Execute, &fma);
        assert!(!s.fma_second_cycle());
        s.clock(true, FetcherState::Idle, false, &fma, 0);
        assert_eq!(s.state(), CoreState::Execute);
        assert!(s.fma_second_cycle());
        s.clock(true, FetcherState::Idle, false, &fma, 0);
        assert_eq!(s.state(), CoreState::Update);
        assert!(!s.fma_second_cycle());
    }

    #[test]
    fn test_non_fma_single_execute() {
        let mut s = Scheduler::new();
        let add = decode(asm::add(1, 2, 3));
        run_to(&mut s, CoreState::Execute, &add);
        s.clock(true, FetcherState::Idle, false, &add, 0);
        assert_eq!(s.state(), CoreState::Update);
    }

    #[test]
    fn test_update_takes_next_pc() {
        let mut s = Scheduler::new();
        let add = decode(asm::add(1, 2, 3));
        run_to(&mut s, CoreState::Update, &add);
        s.clock(true, FetcherState::Idle, false, &add, 7);
        assert_eq!(s.state(), CoreState::Fetch);
        assert_eq!(s.current_pc(), 7);
        assert!(!s.done());
    }

    #[test]
    fn test_ret_finishes_block() {
        let mut s = Scheduler::new();
        let ret = decode(asm::ret());
        run_to(&mut s, CoreState::Done, &ret);
        assert!(s.done());
        assert_eq!(s.current_pc(), 0, "RET does not advance the PC");
        s.clock(true, FetcherState::Idle, false, &ret, 3);
        assert_eq!(s.state(), CoreState::Done);
        s.reset();
        assert_eq!(s.state(), CoreState::Idle);
        assert!(!s.done());
    }
}
