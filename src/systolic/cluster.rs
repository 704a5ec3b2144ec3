//! Cluster of systolic arrays sharing one set of edge ports.
//!
//! Controls reach either the array named by `array_select` or, in broadcast
//! mode, every array. Edge data is shared, so broadcasting one activation
//! stream past arrays holding different weights computes several output
//! tiles at once.
//!
//! An array's clock enable stays high for two edges after its last
//! `compute_enable` so MACs still in its pipeline reach the accumulators
//! even when the host has already selected another array.

use super::array::{skewed_column, stream_edges, ArrayInputs, SystolicArray};

/// Cluster-level wires for one edge.
#[derive(Debug, Clone, Copy)]
pub struct ClusterInputs<'a> {
    pub a: &'a [u16],
    pub b: &'a [u16],
    pub array_select: usize,
    pub broadcast: bool,
    pub load_weights: bool,
    pub compute_enable: bool,
    pub clear_acc: bool,
    pub enable: bool,
}

impl<'a> ClusterInputs<'a> {
    /// Enabled cluster addressing `array` with all controls low.
    pub fn select(array: usize, a: &'a [u16], b: &'a [u16]) -> Self {
        Self {
            a,
            b,
            array_select: array,
            broadcast: false,
            load_weights: false,
            compute_enable: false,
            clear_acc: false,
            enable: true,
        }
    }

    /// Enabled cluster addressing every array with all controls low.
    pub fn broadcast(a: &'a [u16], b: &'a [u16]) -> Self {
        Self {
            broadcast: true,
            ..Self::select(0, a, b)
        }
    }
}

#[derive(Debug, Clone)]
pub struct SystolicCluster {
    arrays: Vec<SystolicArray>,
    /// `compute_enable` as seen by each array one and two edges ago.
    compute_d1: Vec<bool>,
    compute_d2: Vec<bool>,
}

impl SystolicCluster {
    pub fn new(num_arrays: usize, array_size: usize) -> Self {
        Self {
            arrays: vec![SystolicArray::new(array_size); num_arrays],
            compute_d1: vec![false; num_arrays],
            compute_d2: vec![false; num_arrays],
        }
    }

    /// Geometry from a GPU configuration.
    pub fn from_config(config: &crate::config::GpuConfig) -> Self {
        Self::new(config.num_arrays, config.array_size)
    }

    pub fn num_arrays(&self) -> usize {
        self.arrays.len()
    }

    pub fn array(&self, index: usize) -> &SystolicArray {
        &self.arrays[index]
    }

    /// Row-major results of one array.
    pub fn results(&self, index: usize) -> Vec<u16> {
        self.arrays[index].results()
    }

    /// Whether an array's clock enable would be held this edge.
    pub fn draining(&self, index: usize) -> bool {
        self.compute_d1[index] || self.compute_d2[index]
    }

    pub fn reset(&mut self) {
        for array in &mut self.arrays {
            array.reset();
        }
        self.compute_d1.fill(false);
        self.compute_d2.fill(false);
    }

    pub fn clock(&mut self, inputs: &ClusterInputs<'_>) {
        if inputs.array_select >= self.arrays.len() && !inputs.broadcast {
            log::debug!(
                "systolic cluster: array_select {} out of range ({} arrays)",
                inputs.array_select,
                self.arrays.len()
            );
        }
        for (i, array) in self.arrays.iter_mut().enumerate() {
            let selected = inputs.broadcast || inputs.array_select == i;
            let compute = inputs.compute_enable && selected;
            let enable =
                inputs.enable && (selected || self.compute_d1[i] || self.compute_d2[i]);
            array.clock(&ArrayInputs {
                a: inputs.a,
                b: inputs.b,
                load_weights: inputs.load_weights && selected,
                compute_enable: compute,
                clear_acc: inputs.clear_acc && selected,
                enable,
            });
            if inputs.enable {
                self.compute_d2[i] = self.compute_d1[i];
                self.compute_d1[i] = compute;
            }
        }
    }

    /// Load a weight matrix into one array.
    pub fn load_weights(&mut self, index: usize, weights: &[u16]) {
        let n = self.arrays[index].size();
        let zeros = vec![0u16; n];
        for row in (0..n).rev() {
            let start = (row * n).min(weights.len());
            let end = ((row + 1) * n).min(weights.len());
            let mut inputs = ClusterInputs::select(index, &zeros, &weights[start..end]);
            inputs.load_weights = row == 0;
            self.clock(&inputs);
        }
    }

    /// Broadcast a row-major activation matrix past every array, then
    /// drain. Returns the number of edges clocked.
    ///
    /// All arrays share the cluster's size.
    pub fn stream_activations(&mut self, activations: &[u16], cols: usize) -> usize {
        let n = self.arrays.first().map_or(0, SystolicArray::size);
        let zeros = vec![0u16; n];
        let mut edges = 0;
        for edge in 0..stream_edges(n, cols) {
            let a = skewed_column(activations, cols, n, edge);
            let mut inputs = ClusterInputs::broadcast(&a, &zeros);
            inputs.compute_enable = true;
            self.clock(&inputs);
            edges += 1;
        }
        while (0..self.arrays.len()).any(|i| self.draining(i)) {
            self.clock(&ClusterInputs::broadcast(&zeros, &zeros));
            edges += 1;
        }
        edges
    }
}
