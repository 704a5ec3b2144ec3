//! Processing element.
//!
//! Each PE holds one stationary weight and a 24-bit accumulator. A MAC runs
//! through two pipeline registers before it reaches the accumulator:
//!
//! ```text
//!  edge e    : split   <- (sign(a) ^ sign(w), |a|, |w|)   compute_enable sampled
//!  edge e+1  : product <- sat(±(|a| * |w| >> 15))
//!  edge e+2  : acc     <- sat24(acc + product)
//! ```
//!
//! `a_out` and `b_out` are registered copies of `a_in` and `b_in`, which is
//! what moves activations east and weights south one PE per cycle.

use crate::fixed::{self, FRAC_BITS};

/// Accumulator width.
pub const ACC_BITS: u32 = 24;

const ACC_MAX: i32 = (1 << (ACC_BITS - 1)) - 1;
const ACC_MIN: i32 = -(1 << (ACC_BITS - 1));

/// Edges from a sampled `compute_enable` to the accumulator update.
pub const MAC_PIPE_LATENCY: u32 = 2;

/// Input wires of one PE for one edge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PeInputs {
    pub a_in: u16,
    pub b_in: u16,
    pub load_weight: bool,
    pub compute_enable: bool,
    pub clear_acc: bool,
    /// Clock enable; a disabled PE holds every register.
    pub enable: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct SplitStage {
    valid: bool,
    negative: bool,
    a_mag: u32,
    w_mag: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct ProductStage {
    valid: bool,
    product: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessingElement {
    weight: u16,
    acc: i32,
    a_out: u16,
    b_out: u16,
    split: SplitStage,
    product: ProductStage,
}

impl ProcessingElement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn weight(&self) -> u16 {
        self.weight
    }

    /// Raw 24-bit accumulator.
    pub fn acc(&self) -> i32 {
        self.acc
    }

    /// Accumulator clamped to Q1.15.
    #[inline]
    pub fn acc_out(&self) -> u16 {
        fixed::saturate(self.acc)
    }

    #[inline]
    pub fn a_out(&self) -> u16 {
        self.a_out
    }

    #[inline]
    pub fn b_out(&self) -> u16 {
        self.b_out
    }

    /// True while a MAC is still in the pipeline.
    pub fn in_flight(&self) -> bool {
        self.split.valid || self.product.valid
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn clock(&mut self, inputs: &PeInputs) {
        if !inputs.enable {
            return;
        }

        if inputs.clear_acc {
            self.acc = 0;
        } else if self.product.valid {
            self.acc = (self.acc + self.product.product).clamp(ACC_MIN, ACC_MAX);
        }

        self.product = if self.split.valid {
            let magnitude = ((self.split.a_mag * self.split.w_mag) >> FRAC_BITS) as i32;
            let signed = if self.split.negative { -magnitude } else { magnitude };
            ProductStage {
                valid: true,
                product: fixed::as_signed(fixed::saturate(signed)),
            }
        } else {
            ProductStage::default()
        };

        self.split = if inputs.compute_enable {
            let (neg_a, a_mag) = fixed::sign_magnitude(inputs.a_in);
            let (neg_w, w_mag) = fixed::sign_magnitude(self.weight);
            SplitStage {
                valid: true,
                negative: neg_a ^ neg_w,
                a_mag,
                w_mag,
            }
        } else {
            SplitStage::default()
        };

        if inputs.load_weight {
            self.weight = inputs.b_in;
        }
        self.a_out = inputs.a_in;
        self.b_out = inputs.b_in;
    }
}
