//! Bias-add and activation unit.
//!
//! `out = f(sat(x + bias))` where `x` is the latched Rs operand and the bias
//! is captured from Rt in REQUEST.

use crate::core::{CoreSignals, CoreState};
use crate::fixed;
use crate::isa::ActivationFunction;

#[derive(Debug, Clone, Default)]
pub struct ActivationUnit {
    bias: u16,
    out: u16,
}

impl ActivationUnit {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn out(&self) -> u16 {
        self.out
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Apply an activation function to a biased Q1.15 value.
    pub fn apply(function: ActivationFunction, biased: u16) -> u16 {
        let negative = biased & 0x8000 != 0;
        match function {
            ActivationFunction::None => biased,
            // The upper clip of ClippedReLU was never implemented.
            ActivationFunction::Relu | ActivationFunction::ClippedRelu => {
                if negative {
                    0
                } else {
                    biased
                }
            }
            ActivationFunction::LeakyRelu => {
                if negative {
                    ((biased as i16) >> 7) as u16
                } else {
                    biased
                }
            }
        }
    }

    /// `unbiased` is the latched Rs operand; `bias` is the current Rt value.
    pub fn clock(&mut self, signals: &CoreSignals, unbiased: u16, bias: u16) {
        let Some(function) = signals.decoded.activation else {
            return;
        };
        match signals.state {
            CoreState::Request => self.bias = bias,
            CoreState::Execute => {
                self.out = Self::apply(function, fixed::saturating_add(unbiased, self.bias));
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed::from_f64;
    use crate::isa::{asm, decode};

    fn run(function_rd: u8, x: u16, bias: u16) -> u16 {
        let mut unit = ActivationUnit::new();
        let word = asm::act(function_rd, 1, 2);
        let at = |state| CoreSignals {
            state,
            decoded: decode(word),
            ..Default::default()
        };
        unit.clock(&at(CoreState::Request), 0, bias);
        unit.clock(&at(CoreState::Wait), 0, 0);
        unit.clock(&at(CoreState::Execute), x, 0);
        unit.out()
    }

    #[test]
    fn test_pass_through_adds_bias() {
        assert_eq!(run(0b00, from_f64(0.25), from_f64(0.5)), from_f64(0.75));
        assert_eq!(run(0b00, from_f64(-0.5), from_f64(0.25)), from_f64(-0.25));
    }

    #[test]
    fn test_bias_add_saturates() {
        assert_eq!(run(0b00, 0x6000, 0x6000), 0x7FFF);
        assert_eq!(run(0b00, 0x8000, 0xC000), 0x8000);
    }

    #[test]
    fn test_relu() {
        assert_eq!(run(0b01, from_f64(0.5), 0), from_f64(0.5));
        assert_eq!(run(0b01, from_f64(-0.5), 0), 0);
        assert_eq!(run(0b01, from_f64(0.25), from_f64(-0.5)), 0);
    }

    #[test]
    fn test_leaky_relu() {
        assert_eq!(run(0b10, from_f64(0.5), 0), from_f64(0.5));
        assert_eq!(run(0b10, 0xC000, 0), 0xFF80, "-0.5 >> 7");
        assert_eq!(run(0b10, 0xFFFF, 0), 0xFFFF, "arithmetic shift keeps -1 LSB");
    }

    #[test]
    fn test_clipped_relu_matches_relu() {
        for x in [0x7FFFu16, 0x4000, 0x0000, 0xC000, 0x8000] {
            assert_eq!(run(0b11, x, 0), run(0b01, x, 0), "x=0x{x:04X}");
        }
    }

    #[test]
    fn test_output_only_in_execute() {
        let mut unit = ActivationUnit::new();
        let signals = CoreSignals {
            state: CoreState::Update,
            decoded: decode(asm::act(1, 1, 2)),
            ..Default::default()
        };
        unit.clock(&signals, 0x1000, 0x1000);
        assert_eq!(unit.out(), 0);
    }
}
