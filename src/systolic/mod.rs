//! Weight-stationary matrix accelerator.
//!
//! Three levels, each clocked on its own:
//!
//! - [`ProcessingElement`]: one stationary weight, a two-stage MAC pipeline
//!   and a 24-bit saturating accumulator.
//! - [`SystolicArray`]: an `N x N` grid of PEs with activations flowing east
//!   and weights flowing south.
//! - [`SystolicCluster`]: several arrays behind one port, addressed one at a
//!   time or all together.
//!
//! The accelerator runs beside the cores; nothing in the instruction set
//! drives it, so hosts and tests clock it directly.

mod array;
mod cluster;
mod pe;

pub use array::{ArrayInputs, SystolicArray};
pub use cluster::{ClusterInputs, SystolicCluster};
pub use pe::{PeInputs, ProcessingElement, ACC_BITS, MAC_PIPE_LATENCY};
