//! atreides-sim library
//!
//! Cycle-accurate functional simulation of the Atreides SIMT GPU: cores
//! running Q1.15 kernels in lockstep thread blocks, shared multi-channel
//! memory controllers, and the weight-stationary systolic accelerator.

pub mod config;
pub mod core;
pub mod fixed;
pub mod gpu;
pub mod isa;
pub mod memory;
pub mod systolic;
pub mod testing;
