//! N x N weight-stationary array.
//!
//! PEs are stored row-major. Activations enter each row from the west edge
//! and ripple east through `a_out`; weights enter each column from the north
//! edge and ripple south through `b_out`. Control lines are shared by every
//! PE in the array.
//!
//! Each PE accumulates only its own products: there is no partial-sum chain
//! between rows, so after streaming row `i` of `A` past weight `W[i][j]` the
//! PE at `(i, j)` holds `sum_k W[i][j] * A[i][k]`.

use super::pe::{PeInputs, ProcessingElement, MAC_PIPE_LATENCY};

/// Edge and control wires of one array for one edge.
#[derive(Debug, Clone, Copy)]
pub struct ArrayInputs<'a> {
    /// West edge, one word per row.
    pub a: &'a [u16],
    /// North edge, one word per column.
    pub b: &'a [u16],
    pub load_weights: bool,
    pub compute_enable: bool,
    pub clear_acc: bool,
    pub enable: bool,
}

impl<'a> ArrayInputs<'a> {
    /// Enabled array with the given edge data and all controls low.
    pub fn data(a: &'a [u16], b: &'a [u16]) -> Self {
        Self {
            a,
            b,
            load_weights: false,
            compute_enable: false,
            clear_acc: false,
            enable: true,
        }
    }
}

/// Edges a `cols`-wide activation stream occupies on an `n x n` array.
pub(super) fn stream_edges(n: usize, cols: usize) -> usize {
    cols + 2 * n - 1
}

/// West-edge words for one edge of a skewed stream: row `i` lags `i` edges.
pub(super) fn skewed_column(activations: &[u16], cols: usize, n: usize, edge: usize) -> Vec<u16> {
    (0..n)
        .map(|row| {
            edge.checked_sub(row)
                .filter(|&k| k < cols)
                .and_then(|k| activations.get(row * cols + k).copied())
                .unwrap_or(0)
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystolicArray {
    size: usize,
    pes: Vec<ProcessingElement>,
}

impl SystolicArray {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            pes: vec![ProcessingElement::new(); size * size],
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn pe(&self, row: usize, col: usize) -> &ProcessingElement {
        &self.pes[row * self.size + col]
    }

    /// Every PE's clamped accumulator, row-major.
    pub fn results(&self) -> Vec<u16> {
        self.pes.iter().map(ProcessingElement::acc_out).collect()
    }

    /// Every PE's stationary weight, row-major.
    pub fn weights(&self) -> Vec<u16> {
        self.pes.iter().map(ProcessingElement::weight).collect()
    }

    pub fn in_flight(&self) -> bool {
        self.pes.iter().any(ProcessingElement::in_flight)
    }

    pub fn reset(&mut self) {
        for pe in &mut self.pes {
            pe.reset();
        }
    }

    /// Advance one edge. Missing edge words read as zero.
    pub fn clock(&mut self, inputs: &ArrayInputs<'_>) {
        let n = self.size;
        let a_out: Vec<u16> = self.pes.iter().map(ProcessingElement::a_out).collect();
        let b_out: Vec<u16> = self.pes.iter().map(ProcessingElement::b_out).collect();

        for row in 0..n {
            for col in 0..n {
                let a_in = if col == 0 {
                    inputs.a.get(row).copied().unwrap_or(0)
                } else {
                    a_out[row * n + col - 1]
                };
                let b_in = if row == 0 {
                    inputs.b.get(col).copied().unwrap_or(0)
                } else {
                    b_out[(row - 1) * n + col]
                };
                self.pes[row * n + col].clock(&PeInputs {
                    a_in,
                    b_in,
                    load_weight: inputs.load_weights,
                    compute_enable: inputs.compute_enable,
                    clear_acc: inputs.clear_acc,
                    enable: inputs.enable,
                });
            }
        }
    }

    /// Load a row-major weight matrix through the north edge.
    ///
    /// Rows are streamed last-first so that row `i` has rippled down to PE
    /// row `i` when `load_weights` pulses together with row 0. Takes `size`
    /// edges.
    pub fn load_weight_matrix(&mut self, weights: &[u16]) {
        let n = self.size;
        let zeros = vec![0u16; n];
        for row in (0..n).rev() {
            let start = (row * n).min(weights.len());
            let end = ((row + 1) * n).min(weights.len());
            let mut inputs = ArrayInputs::data(&zeros, &weights[start..end]);
            inputs.load_weights = row == 0;
            self.clock(&inputs);
        }
    }

    /// Clear every accumulator. One edge.
    pub fn clear(&mut self) {
        let zeros = vec![0u16; self.size];
        let mut inputs = ArrayInputs::data(&zeros, &zeros);
        inputs.clear_acc = true;
        self.clock(&inputs);
    }

    /// Stream a row-major activation matrix with `compute_enable` held high.
    ///
    /// Row `i` is skewed by `i` edges (the diagonal wavefront), and the
    /// stream ends once every element has crossed the whole row and the
    /// pipeline has drained.
    pub fn stream_activations(&mut self, activations: &[u16], cols: usize) {
        let n = self.size;
        let zeros = vec![0u16; n];
        for edge in 0..stream_edges(n, cols) {
            let a = skewed_column(activations, cols, n, edge);
            let mut inputs = ArrayInputs::data(&a, &zeros);
            inputs.compute_enable = true;
            self.clock(&inputs);
        }
        self.drain();
    }

    /// Clock with everything low until no MAC is in flight.
    pub fn drain(&mut self) {
        let zeros = vec![0u16; self.size];
        for _ in 0..MAC_PIPE_LATENCY {
            self.clock(&ArrayInputs::data(&zeros, &zeros));
        }
    }
}
