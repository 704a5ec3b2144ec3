//! Top-level GPU: dispatcher, cores, memory controllers and memories.
//!
//! The GPU owns every unit by value and advances them together. One call
//! to [`Gpu::step`] is one clock edge:
//!
//! 1. both memories answer the requests their controller registered last cycle,
//! 2. every unit samples its neighbours' registered outputs,
//! 3. controllers, cores and the dispatcher are clocked on those samples.
//!
//! # Usage
//!
//! ```ignore
//! let mut gpu = Gpu::new(GpuConfig::default())?;
//! gpu.load_program(&program)?;
//! gpu.load_data(0, &data)?;
//! gpu.launch(8);
//! let stats = gpu.run()?;
//! let result = gpu.data_memory().dump(16, 8);
//! ```

pub mod dcr;
pub mod dispatch;
pub mod trace;

pub use dcr::DeviceControlRegister;
pub use dispatch::{BlockAssignment, Dispatcher};
pub use trace::{format_memory, CoreSnapshot, GpuSnapshot, ThreadSnapshot};

use std::fmt;

use thiserror::Error;

use crate::config::{ConfigError, GpuConfig};
use crate::core::{Core, CoreStats, Divergence};
use crate::memory::{ImageError, Memory, MemoryArbiter, MemoryController, MemoryImage};

/// Errors ending a simulation run.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SimError {
    #[error("kernel did not finish within {cycles} cycles")]
    CycleLimit { cycles: u64 },

    #[error("core {core} block {block_id}: threads diverge after pc {pc} (next pc per thread {targets:?})")]
    Divergence {
        core: usize,
        block_id: u16,
        pc: u16,
        targets: Vec<u16>,
    },

    #[error("no kernel launched")]
    NotLaunched,
}

impl From<&Divergence> for SimError {
    fn from(d: &Divergence) -> Self {
        SimError::Divergence {
            core: d.core,
            block_id: d.block_id,
            pc: d.pc,
            targets: d.targets.to_vec(),
        }
    }
}

/// Counters for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunStats {
    pub cycles: u64,
    pub blocks_dispatched: u16,
    pub blocks_done: u16,
    pub cores: Vec<CoreStats>,
    /// Divergent UPDATEs over all cores.
    pub divergences: usize,
}

impl RunStats {
    /// Instructions retired across all cores.
    pub fn instructions(&self) -> u64 {
        self.cores.iter().map(|c| c.instructions).sum()
    }
}

impl fmt::Display for RunStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Cycles:       {}", self.cycles)?;
        writeln!(f, "Blocks:       {} dispatched, {} done", self.blocks_dispatched, self.blocks_done)?;
        writeln!(f, "Instructions: {}", self.instructions())?;
        writeln!(f, "Divergences:  {}", self.divergences)?;
        for (i, core) in self.cores.iter().enumerate() {
            writeln!(
                f,
                "  core {}: {} instr, {} active, {} wait stalls, {} fma extra, {} blocks",
                i,
                core.instructions,
                core.active_cycles,
                core.wait_stall_cycles,
                core.fma_second_cycles,
                core.blocks_completed
            )?;
        }
        Ok(())
    }
}

/// The whole device, generic over the memory arbiter.
pub struct Gpu<A: MemoryArbiter = MemoryController> {
    config: GpuConfig,
    dcr: DeviceControlRegister,
    dispatcher: Dispatcher,
    cores: Vec<Core>,
    program_arbiter: A,
    data_arbiter: A,
    program_memory: Memory,
    data_memory: Memory,
    start: bool,
    cycle: u64,
}

impl Gpu<MemoryController> {
    /// Build a GPU with the stock memory controllers.
    pub fn new(config: GpuConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let program = MemoryController::new("program", config.num_cores, config.program_channels);
        let data = MemoryController::new(
            "data",
            config.num_cores * config.threads_per_block,
            config.data_channels,
        );
        Self::with_arbiters(config, program, data)
    }
}

impl<A: MemoryArbiter> Gpu<A> {
    /// Build a GPU around caller-supplied arbiters.
    ///
    /// The program arbiter must serve one consumer per core and the data
    /// arbiter one per thread slot.
    pub fn with_arbiters(config: GpuConfig, program: A, data: A) -> Result<Self, ConfigError> {
        config.validate()?;
        let thread_slots = config.num_cores * config.threads_per_block;
        if program.num_consumers() != config.num_cores {
            return Err(ConfigError::ArbiterShape {
                arbiter: "program",
                expected: config.num_cores,
                actual: program.num_consumers(),
            });
        }
        if data.num_consumers() != thread_slots {
            return Err(ConfigError::ArbiterShape {
                arbiter: "data",
                expected: thread_slots,
                actual: data.num_consumers(),
            });
        }

        let cores = (0..config.num_cores)
            .map(|id| Core::new(id, config.threads_per_block, config.program_addr_bits))
            .collect();
        let program_memory = Memory::new(
            config.program_addr_bits,
            program.num_channels(),
            config.memory_latency,
        );
        let data_memory = Memory::new(config.data_addr_bits, data.num_channels(), config.memory_latency);

        log::debug!(
            "GPU: {} cores x {} threads, {}/{} address bits, {}+{} channels",
            config.num_cores,
            config.threads_per_block,
            config.program_addr_bits,
            config.data_addr_bits,
            program.num_channels(),
            data.num_channels()
        );

        Ok(Self {
            dispatcher: Dispatcher::new(config.num_cores, config.threads_per_block as u8),
            config,
            dcr: DeviceControlRegister::new(),
            cores,
            program_arbiter: program,
            data_arbiter: data,
            program_memory,
            data_memory,
            start: false,
            cycle: 0,
        })
    }

    pub fn config(&self) -> &GpuConfig {
        &self.config
    }

    /// Load a program image at address 0.
    pub fn load_program(&mut self, program: &[u16]) -> Result<(), ImageError> {
        self.program_memory.load(0, program)
    }

    /// Load data words at `base`.
    pub fn load_data(&mut self, base: u16, data: &[u16]) -> Result<(), ImageError> {
        self.data_memory.load(base, data)
    }

    /// Load a parsed image into data memory.
    pub fn load_data_image(&mut self, image: &MemoryImage) -> Result<(), ImageError> {
        self.data_memory.load_image(image)
    }

    pub fn program_memory(&self) -> &Memory {
        &self.program_memory
    }

    pub fn data_memory(&self) -> &Memory {
        &self.data_memory
    }

    pub fn data_memory_mut(&mut self) -> &mut Memory {
        &mut self.data_memory
    }

    pub fn program_arbiter(&self) -> &A {
        &self.program_arbiter
    }

    pub fn data_arbiter(&self) -> &A {
        &self.data_arbiter
    }

    /// Write the device control register.
    pub fn write_dcr(&mut self, thread_count: u8) {
        self.dcr.write(thread_count);
    }

    /// Write the thread count and assert `start`.
    pub fn launch(&mut self, thread_count: u8) {
        self.write_dcr(thread_count);
        self.start = true;
        log::info!(
            "launch: {} threads in {} blocks",
            thread_count,
            self.dispatcher.total_blocks(thread_count)
        );
    }

    #[inline]
    pub fn is_done(&self) -> bool {
        self.dispatcher.done()
    }

    #[inline]
    pub fn cycles(&self) -> u64 {
        self.cycle
    }

    pub fn cores(&self) -> &[Core] {
        &self.cores
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Every block assignment since the last reset.
    pub fn dispatch_log(&self) -> &[BlockAssignment] {
        self.dispatcher.log()
    }

    /// Divergence records of every core, core by core.
    pub fn divergences(&self) -> Vec<Divergence> {
        self.cores
            .iter()
            .flat_map(|c| c.divergences().iter().cloned())
            .collect()
    }

    fn divergence_count(&self) -> usize {
        self.cores.iter().map(|c| c.divergences().len()).sum()
    }

    pub fn stats(&self) -> RunStats {
        RunStats {
            cycles: self.cycle,
            blocks_dispatched: self.dispatcher.blocks_dispatched(),
            blocks_done: self.dispatcher.blocks_done(),
            cores: self.cores.iter().map(|c| *c.stats()).collect(),
            divergences: self.divergence_count(),
        }
    }

    pub fn snapshot(&self) -> GpuSnapshot {
        GpuSnapshot {
            cycle: self.cycle,
            cores: self.cores.iter().map(CoreSnapshot::capture).collect(),
        }
    }

    /// Device reset. Memory contents survive; history and the cycle count do not.
    pub fn reset(&mut self) {
        self.dcr.reset();
        self.dispatcher.reset();
        for core in &mut self.cores {
            core.reset();
            core.clear_history();
        }
        self.program_arbiter.reset();
        self.data_arbiter.reset();
        self.program_memory.reset_ports();
        self.data_memory.reset_ports();
        self.start = false;
        self.cycle = 0;
    }

    /// Advance one clock edge.
    pub fn step(&mut self) {
        let program_resp = self
            .program_memory
            .service(&self.program_arbiter.channel_requests());
        let data_resp = self.data_memory.service(&self.data_arbiter.channel_requests());

        let fetch_requests: Vec<_> = self.cores.iter().map(Core::fetch_request).collect();
        let lsu_requests: Vec<_> = self.cores.iter().flat_map(Core::lsu_requests).collect();
        let to_fetchers = self.program_arbiter.consumer_responses();
        let to_lsus = self.data_arbiter.consumer_responses();
        let controls: Vec<_> = (0..self.cores.len())
            .map(|i| self.dispatcher.core_control(i))
            .collect();
        let core_done: Vec<bool> = self.cores.iter().map(Core::done).collect();

        self.program_arbiter.clock(&fetch_requests, &program_resp);
        self.data_arbiter.clock(&lsu_requests, &data_resp);

        let tpb = self.config.threads_per_block;
        for (i, core) in self.cores.iter_mut().enumerate() {
            let slots = &to_lsus[i * tpb..(i + 1) * tpb];
            core.clock(&controls[i], to_fetchers[i], slots);
        }
        self.dispatcher
            .clock(self.start, self.dcr.thread_count(), &core_done, self.cycle);

        self.cycle += 1;
        if log::log_enabled!(log::Level::Trace) {
            log::trace!("\n{}", self.snapshot());
        }
    }

    /// Run the launched kernel until `done` or the configured cycle budget.
    pub fn run(&mut self) -> Result<RunStats, SimError> {
        if !self.start {
            return Err(SimError::NotLaunched);
        }
        let limit = self.config.max_cycles;
        while !self.is_done() {
            if self.cycle >= limit {
                log::warn!("cycle budget of {} exhausted", limit);
                return Err(SimError::CycleLimit { cycles: self.cycle });
            }
            self.step();
            if self.config.strict_convergence {
                if let Some(d) = self.cores.iter().find_map(|c| c.divergences().first()) {
                    return Err(SimError::from(d));
                }
            }
        }
        log::info!(
            "kernel done after {} cycles ({} blocks)",
            self.cycle,
            self.dispatcher.blocks_done()
        );
        Ok(self.stats())
    }
}

impl<A: MemoryArbiter> fmt::Debug for Gpu<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gpu")
            .field("cycle", &self.cycle)
            .field("start", &self.start)
            .field("thread_count", &self.dcr.thread_count())
            .field("done", &self.is_done())
            .field("cores", &self.cores.len())
            .finish()
    }
}
