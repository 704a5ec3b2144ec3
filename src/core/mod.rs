//! Compute core: scheduler, fetcher and a block of thread slots.
//!
//! # Architecture
//!
//! ```text
//!                  ┌──────────────────────── Core ───────────────────────┐
//!  program ctrl ◄──┤ Fetcher ──► instruction ──► decode() ──┐            │
//!                  │                                        ▼            │
//!                  │ Scheduler ── CoreSignals ──► Thread 0 … Thread N-1  │
//!                  │    ▲           (state, pc,    regs ALU FMA ACT      │
//!                  │    │            decoded)      LSU PC                │
//!                  │    └── fetcher state, LSU busy, next_pc ◄──┘        │
//!                  └────────────────────────────────────────┬────────────┘
//!                                                data ctrl ◄┘
//! ```
//!
//! Every clock samples all unit outputs first and then advances every unit,
//! so a unit only ever sees the previous cycle's state of its neighbours.
//!
//! All threads share one PC. At UPDATE the core takes the last enabled
//! thread's `next_pc`; when enabled threads disagree the core records a
//! [`Divergence`] instead of silently picking one.

pub mod execute;
mod fetcher;
mod lsu;
mod pc;
mod registers;
mod scheduler;
mod thread;

pub use fetcher::{Fetcher, FetcherState};
pub use lsu::{LoadStoreUnit, LsuState};
pub use pc::ProgramCounter;
pub use registers::{RegisterFile, WriteBack};
pub use scheduler::{CoreState, Scheduler};
pub use thread::Thread;

use smallvec::SmallVec;

use crate::isa::{decode, DecodedInstruction};
use crate::memory::{MemRequest, MemResponse};

/// Signals broadcast from the scheduler to every thread unit.
#[derive(Debug, Clone, Copy, Default)]
pub struct CoreSignals {
    pub state: CoreState,
    pub fma_second_cycle: bool,
    pub current_pc: u16,
    pub decoded: DecodedInstruction,
    pub block_id: u16,
}

/// Per-core control lines driven by the dispatcher.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoreControl {
    pub reset: bool,
    pub start: bool,
    pub block_id: u16,
    /// Number of enabled thread slots.
    pub thread_count: u8,
}

/// Threads of one block disagreeing on the next PC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Divergence {
    pub core: usize,
    pub block_id: u16,
    /// PC of the instruction whose UPDATE diverged.
    pub pc: u16,
    /// `next_pc` of every enabled thread, by thread index.
    pub targets: SmallVec<[u16; 16]>,
    /// PC the core actually continued at.
    pub taken: u16,
}

/// Per-core counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoreStats {
    /// Instructions that completed UPDATE (RET included).
    pub instructions: u64,
    /// Cycles spent in WAIT with an LSU still busy.
    pub wait_stall_cycles: u64,
    /// Second EXECUTE cycles taken by FMA instructions.
    pub fma_second_cycles: u64,
    /// Cycles outside IDLE and DONE.
    pub active_cycles: u64,
    pub blocks_completed: u64,
}

#[derive(Debug, Clone)]
pub struct Core {
    id: usize,
    scheduler: Scheduler,
    fetcher: Fetcher,
    threads: Vec<Thread>,
    /// Enabled thread count seen on the last clock.
    thread_count: u8,
    block_id: u16,
    stats: CoreStats,
    divergences: Vec<Divergence>,
}

impl Core {
    pub fn new(id: usize, threads_per_block: usize, program_addr_bits: u32) -> Self {
        let threads = (0..threads_per_block)
            .map(|i| Thread::new(i as u8, threads_per_block as u16, program_addr_bits))
            .collect();
        Self {
            id,
            scheduler: Scheduler::new(),
            fetcher: Fetcher::new(),
            threads,
            thread_count: 0,
            block_id: 0,
            stats: CoreStats::default(),
            divergences: Vec::new(),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    #[inline]
    pub fn state(&self) -> CoreState {
        self.scheduler.state()
    }

    #[inline]
    pub fn done(&self) -> bool {
        self.scheduler.done()
    }

    #[inline]
    pub fn current_pc(&self) -> u16 {
        self.scheduler.current_pc()
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    pub fn threads(&self) -> &[Thread] {
        &self.threads
    }

    /// Enabled thread count of the current block.
    pub fn thread_count(&self) -> u8 {
        self.thread_count
    }

    pub fn block_id(&self) -> u16 {
        self.block_id
    }

    /// Control bundle of the instruction register.
    pub fn decoded(&self) -> DecodedInstruction {
        decode(self.fetcher.instruction())
    }

    pub fn stats(&self) -> &CoreStats {
        &self.stats
    }

    pub fn divergences(&self) -> &[Divergence] {
        &self.divergences
    }

    pub fn clear_history(&mut self) {
        self.stats = CoreStats::default();
        self.divergences.clear();
    }

    /// Request line toward the program-memory controller.
    pub fn fetch_request(&self) -> MemRequest {
        self.fetcher.request()
    }

    /// Request lines of every thread slot toward the data-memory controller.
    pub fn lsu_requests(&self) -> impl Iterator<Item = MemRequest> + '_ {
        self.threads.iter().map(|t| t.lsu().request())
    }

    /// Synchronous reset of every unit in the core.
    pub fn reset(&mut self) {
        self.scheduler.reset();
        self.fetcher.reset();
        for thread in &mut self.threads {
            thread.reset();
        }
    }

    fn enabled_threads(&self, thread_count: u8) -> usize {
        (thread_count as usize).min(self.threads.len())
    }

    /// Resolve the block's next PC, recording any disagreement.
    fn converge_next_pc(&mut self, enabled: usize) -> u16 {
        let targets: SmallVec<[u16; 16]> = self.threads[..enabled]
            .iter()
            .map(|t| t.pc().next_pc())
            .collect();
        let Some(&taken) = targets.last() else {
            return self.scheduler.current_pc();
        };
        if targets.iter().any(|&t| t != taken) {
            log::warn!(
                "core {} block {}: threads diverge after pc {} (targets {:?}), continuing at {}",
                self.id,
                self.block_id,
                self.scheduler.current_pc(),
                targets.as_slice(),
                taken
            );
            self.divergences.push(Divergence {
                core: self.id,
                block_id: self.block_id,
                pc: self.scheduler.current_pc(),
                targets,
                taken,
            });
        }
        taken
    }

    /// Advance one clock edge.
    ///
    /// `data` holds the data controller's response for each thread slot.
    pub fn clock(&mut self, control: &CoreControl, program: MemResponse, data: &[MemResponse]) {
        if control.reset {
            self.reset();
            return;
        }
        self.thread_count = control.thread_count;
        self.block_id = control.block_id;

        let state = self.scheduler.state();
        let decoded = self.decoded();
        let signals = CoreSignals {
            state,
            fma_second_cycle: self.scheduler.fma_second_cycle(),
            current_pc: self.scheduler.current_pc(),
            decoded,
            block_id: control.block_id,
        };
        let fetcher_state = self.fetcher.state();
        let lsu_busy = self.threads.iter().any(|t| t.lsu().is_busy());
        let enabled = self.enabled_threads(control.thread_count);

        let next_pc = if state == CoreState::Update && !decoded.ret {
            self.converge_next_pc(enabled)
        } else {
            signals.current_pc
        };

        self.record(state, lsu_busy, &signals);

        self.fetcher.clock(state, signals.current_pc, program);
        for (thread, response) in self.threads[..enabled].iter_mut().zip(data) {
            thread.clock(&signals, *response);
        }
        self.scheduler
            .clock(control.start, fetcher_state, lsu_busy, &decoded, next_pc);
    }

    fn record(&mut self, state: CoreState, lsu_busy: bool, signals: &CoreSignals) {
        if !matches!(state, CoreState::Idle | CoreState::Done) {
            self.stats.active_cycles += 1;
        }
        match state {
            CoreState::Wait if lsu_busy => self.stats.wait_stall_cycles += 1,
            CoreState::Execute if signals.fma_second_cycle => self.stats.fma_second_cycles += 1,
            CoreState::Update => {
                self.stats.instructions += 1;
                log::trace!(
                    "core {} block {} retire pc={} {}",
                    self.id,
                    self.block_id,
                    signals.current_pc,
                    signals.decoded
                );
                if signals.decoded.ret {
                    self.stats.blocks_completed += 1;
                    log::debug!("core {} finished block {}", self.id, self.block_id);
                }
            }
            _ => {}
        }
    }
}
