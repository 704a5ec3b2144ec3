//! Kernel harness shared by the binary and the test suite.
//!
//! This module provides:
//! - The built-in kernels with their expected memory contents
//! - A runner that builds a GPU, runs one kernel and checks the result
//!
//! # Usage
//!
//! ```bash
//! cargo run -- kernel all
//! ```

pub mod kernels;

pub use kernels::Kernel;

use crate::config::GpuConfig;
use crate::gpu::{Gpu, RunStats, SimError};

/// One word that differs from the expected result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mismatch {
    pub address: u16,
    pub expected: u16,
    pub actual: u16,
}

/// Result of running a single kernel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KernelOutcome {
    /// Finished with the expected memory contents.
    Pass { cycles: u64 },
    /// Finished, but memory differs.
    Mismatch {
        cycles: u64,
        mismatches: Vec<Mismatch>,
    },
    /// Stopped by a simulation error other than the cycle budget.
    Fail { message: String, cycles: u64 },
    /// Did not finish within the cycle budget.
    Timeout { cycles: u64 },
    /// GPU could not be built or loaded.
    LoadError { message: String },
}

impl KernelOutcome {
    pub fn is_pass(&self) -> bool {
        matches!(self, KernelOutcome::Pass { .. })
    }

    pub fn cycles(&self) -> Option<u64> {
        match self {
            KernelOutcome::Pass { cycles }
            | KernelOutcome::Mismatch { cycles, .. }
            | KernelOutcome::Fail { cycles, .. }
            | KernelOutcome::Timeout { cycles } => Some(*cycles),
            KernelOutcome::LoadError { .. } => None,
        }
    }
}

/// Compare the kernel's result range against its expectation.
pub fn check(kernel: &Kernel, actual: &[u16]) -> Vec<Mismatch> {
    kernel
        .expected
        .iter()
        .zip(actual)
        .enumerate()
        .filter(|(_, (e, a))| e != a)
        .map(|(i, (&expected, &actual))| Mismatch {
            address: kernel.expected_base.wrapping_add(i as u16),
            expected,
            actual,
        })
        .collect()
}

/// Build a GPU for `config`, run `kernel` on it and return the GPU for inspection.
pub fn execute(kernel: &Kernel, config: &GpuConfig) -> (KernelOutcome, Option<(Gpu, RunStats)>) {
    let mut gpu = match Gpu::new(config.clone()) {
        Ok(gpu) => gpu,
        Err(e) => {
            return (
                KernelOutcome::LoadError {
                    message: e.to_string(),
                },
                None,
            )
        }
    };
    let loaded = gpu
        .load_program(&kernel.program)
        .and_then(|_| gpu.load_data(0, &kernel.data));
    if let Err(e) = loaded {
        return (
            KernelOutcome::LoadError {
                message: e.to_string(),
            },
            None,
        );
    }

    gpu.launch(kernel.thread_count);
    let stats = match gpu.run() {
        Ok(stats) => stats,
        Err(SimError::CycleLimit { cycles }) => return (KernelOutcome::Timeout { cycles }, None),
        Err(e) => {
            return (
                KernelOutcome::Fail {
                    message: e.to_string(),
                    cycles: gpu.cycles(),
                },
                None,
            )
        }
    };

    let actual = gpu
        .data_memory()
        .dump(kernel.expected_base, kernel.expected.len());
    let mismatches = check(kernel, &actual);
    let outcome = if mismatches.is_empty() {
        KernelOutcome::Pass {
            cycles: stats.cycles,
        }
    } else {
        for m in &mismatches {
            log::warn!(
                "{}: mem[{}] = 0x{:04X}, expected 0x{:04X}",
                kernel.name, m.address, m.actual, m.expected
            );
        }
        KernelOutcome::Mismatch {
            cycles: stats.cycles,
            mismatches,
        }
    };
    (outcome, Some((gpu, stats)))
}

/// Run one kernel on a fresh GPU.
pub fn run_kernel(kernel: &Kernel, config: &GpuConfig) -> KernelOutcome {
    execute(kernel, config).0
}
