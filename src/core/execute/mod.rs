//! Per-thread execution units.
//!
//! Each unit latches its result only while the scheduler is in EXECUTE.
//! Operand capture (FMA, activation bias) happens in REQUEST.

mod activation;
mod alu;
mod fma;

pub use activation::ActivationUnit;
pub use alu::Alu;
pub use fma::FmaUnit;
