//! Block dispatcher.
//!
//! Splits the launch's `thread_count` into `ceil(thread_count / B)` blocks of
//! `B = threads_per_block` threads and hands them to cores as they come out
//! of reset. The last block carries the remainder.
//!
//! Per core the dispatcher owns the `reset`/`start` pair:
//!
//! ```text
//!  reset=1 ──(block available)──► start=1, reset=0 ──(core done)──► reset=1, start=0
//! ```

use crate::core::CoreControl;

/// One block handed to a core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockAssignment {
    pub block_id: u16,
    pub core: usize,
    pub thread_count: u8,
    /// Clock edge at which the assignment was registered.
    pub cycle: u64,
}

#[derive(Debug, Clone)]
pub struct Dispatcher {
    threads_per_block: u8,
    cores: Vec<CoreControl>,
    start_execution: bool,
    blocks_dispatched: u16,
    blocks_done: u16,
    done: bool,
    log: Vec<BlockAssignment>,
}

impl Dispatcher {
    pub fn new(num_cores: usize, threads_per_block: u8) -> Self {
        let mut dispatcher = Self {
            threads_per_block,
            cores: vec![CoreControl::default(); num_cores],
            start_execution: false,
            blocks_dispatched: 0,
            blocks_done: 0,
            done: false,
            log: Vec::new(),
        };
        dispatcher.reset();
        dispatcher
    }

    /// Number of blocks a launch of `thread_count` threads needs.
    pub fn total_blocks(&self, thread_count: u8) -> u16 {
        (thread_count as u16).div_ceil(self.threads_per_block as u16)
    }

    /// Control lines for one core.
    #[inline]
    pub fn core_control(&self, core: usize) -> CoreControl {
        self.cores[core]
    }

    #[inline]
    pub fn done(&self) -> bool {
        self.done
    }

    pub fn blocks_dispatched(&self) -> u16 {
        self.blocks_dispatched
    }

    pub fn blocks_done(&self) -> u16 {
        self.blocks_done
    }

    /// Every assignment made since the last reset, in order.
    pub fn log(&self) -> &[BlockAssignment] {
        &self.log
    }

    /// Synchronous reset: every core held in reset.
    pub fn reset(&mut self) {
        for core in &mut self.cores {
            *core = CoreControl {
                reset: true,
                start: false,
                block_id: 0,
                thread_count: self.threads_per_block,
            };
        }
        self.start_execution = false;
        self.blocks_dispatched = 0;
        self.blocks_done = 0;
        self.done = false;
        self.log.clear();
    }

    /// Advance one edge. `core_done` holds each core's pre-edge done flag.
    pub fn clock(&mut self, start: bool, thread_count: u8, core_done: &[bool], cycle: u64) {
        if !start {
            return;
        }
        let total = self.total_blocks(thread_count);
        let previous = self.cores.clone();

        if !self.start_execution {
            self.start_execution = true;
            for core in &mut self.cores {
                core.reset = true;
            }
        }

        if self.blocks_done == total && !self.done {
            self.done = true;
            log::info!("all {} blocks retired at cycle {}", total, cycle);
        }

        for (i, prev) in previous.iter().enumerate() {
            if !prev.reset {
                continue;
            }
            let core = &mut self.cores[i];
            core.reset = false;
            if self.blocks_dispatched < total {
                let block_id = self.blocks_dispatched;
                let block_threads = if block_id == total - 1 {
                    thread_count - (block_id * self.threads_per_block as u16) as u8
                } else {
                    self.threads_per_block
                };
                core.start = true;
                core.block_id = block_id;
                core.thread_count = block_threads;
                self.blocks_dispatched += 1;
                self.log.push(BlockAssignment {
                    block_id,
                    core: i,
                    thread_count: block_threads,
                    cycle,
                });
                log::debug!(
                    "dispatch block {} ({} threads) to core {} at cycle {}",
                    block_id, block_threads, i, cycle
                );
            }
        }

        for (i, prev) in previous.iter().enumerate() {
            if prev.start && core_done[i] {
                let core = &mut self.cores[i];
                core.reset = true;
                core.start = false;
                self.blocks_done += 1;
            }
        }
    }
}
