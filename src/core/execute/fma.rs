//! Two-stage Q1.15 fused multiply-add.
//!
//! | Scheduler state        | Action                                 |
//! |------------------------|----------------------------------------|
//! | REQUEST                | `R1 <- Rs`, `R2 <- Rt`, `R4 <- Rd`     |
//! | EXECUTE (first cycle)  | `R3 <- sat(R1 * R2)`                   |
//! | EXECUTE (second cycle) | `out <- sat(R4 + R3)`                  |
//!
//! The scheduler's second-cycle flag selects the stage, so the committed
//! output changes only on the second EXECUTE edge.

use crate::core::{CoreSignals, CoreState};
use crate::fixed;

#[derive(Debug, Clone, Default)]
pub struct FmaUnit {
    /// R1: latched activation.
    activation: u16,
    /// R2: latched weight.
    weight: u16,
    /// R3: saturated product.
    product: u16,
    /// R4: latched prior accumulator.
    accumulator: u16,
    out: u16,
}

impl FmaUnit {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn out(&self) -> u16 {
        self.out
    }

    /// Saturated product held between the two EXECUTE cycles.
    #[inline]
    pub fn product(&self) -> u16 {
        self.product
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// `rs`, `rt` and `rq` are the current values of the Rs, Rt and Rd
    /// registers.
    pub fn clock(&mut self, signals: &CoreSignals, rs: u16, rt: u16, rq: u16) {
        if !signals.decoded.fma_enable() {
            return;
        }
        match signals.state {
            CoreState::Request => {
                self.activation = rs;
                self.weight = rt;
                self.accumulator = rq;
            }
            CoreState::Execute if !signals.fma_second_cycle => {
                self.product = fixed::saturating_mul(self.activation, self.weight);
            }
            CoreState::Execute => {
                self.out = fixed::saturating_add(self.accumulator, self.product);
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

    fn at(state: CoreState, second: bool, word: u16) -> CoreSignals {
        CoreSignals {
            state,
            fma_second_cycle: second,
            decoded: decode(word),
            ..Default::default()
        }
    }

    fn run(rs: u16, rt: u16, rq: u16) -> FmaUnit {
        let mut fma = FmaUnit::new();
        let word = asm::fma(1, 2, 3);
        fma.clock(&at(CoreState::Request, false, word), rs, rt, rq);
        fma.clock(&at(CoreState::Wait, false, word), 0, 0, 0);
        fma.clock(&at(CoreState::Execute, false, word), 0, 0, 0);
        fma.clock(&at(CoreState::Execute, true, word), 0, 0, 0);
        fma
    }

    #[test]
    fn test_two_cycle_law() {
        let mut fma = FmaUnit::new();
        let word = asm::fma(1, 2, 3);
        fma.clock(&at(CoreState::Request, false, word), 0x4000, 0x4000, 0x1000);
        fma.clock(&at(CoreState::Execute, false, word), 0, 0, 0);
        assert_eq!(fma.out(), 0, "unchanged after the multiply stage");
        assert_eq!(fma.product(), 0x2000);
        fma.clock(&at(CoreState::Execute, true, word), 0, 0, 0);
        assert_eq!(fma.out(), 0x3000);
    }

    #[test]
    fn test_basic_values() {
        assert_eq!(run(from_f64(0.5), from_f64(0.5), 0).out(), from_f64(0.25));
        assert_eq!(run(from_f64(-0.5), from_f64(0.5), from_f64(0.25)).out(), 0);
        assert_eq!(run(from_f64(0.5), from_f64(-0.25), 0).out(), from_f64(-0.125));
    }

    #[test]
    fn test_accumulate_saturates() {
        assert_eq!(run(0x7FFF, 0x7FFF, 0x7FFF).out(), 0x7FFF);
        assert_eq!(run(0x8000, 0x7FFF, 0x8000).out(), 0x8000);
    }

    #[test]
    fn test_matches_reference_within_one_lsb() {
        let samples = [0x0000u16, 0x0001, 0x1234, 0x4000, 0x7FFF, 0x8000, 0x8001, 0xC000, 0xFFFF, 0xA5A5];
        for &a in &samples {
            for &b in &samples {
                for &acc in &[0u16, 0x2000, 0xE000] {
                    let hw = run(a, b, acc).out() as i16 as i32;
                    let product = ((a as i16 as i32) * (b as i16 as i32)) >> 15;
                    let reference = (acc as i16 as i32 + product.clamp(-32768, 32767)).clamp(-32768, 32767);
                    assert!(
                        (hw - reference).abs() <= 1,
                        "a=0x{a:04X} b=0x{b:04X} acc=0x{acc:04X}: hw={hw} ref={reference}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_idle_without_fma() {
        let mut fma = FmaUnit::new();
        let word = asm::add(1, 2, 3);
        fma.clock(&at(CoreState::Request, false, word), 0x4000, 0x4000, 0);
        fma.clock(&at(CoreState::Execute, false, word), 0, 0, 0);
        fma.clock(&at(CoreState::Execute, true, word), 0, 0, 0);
        assert_eq!(fma.out(), 0);
        assert_eq!(fma.product(), 0);
    }
}
