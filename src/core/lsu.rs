//! Per-thread load-store unit.
//!
//! ```text
//! IDLE ─REQUEST─► REQUESTING ─► WAITING ─ready─► DONE ─UPDATE─► IDLE
//! ```
//!
//! The LSU is a consumer of the data-memory controller. It keeps its valid
//! line high from REQUESTING until the controller answers, which is what
//! keeps the controller's channel bound to it.

use crate::core::{CoreSignals, CoreState};
use crate::isa::MemAccess;
use crate::memory::{MemRequest, MemResponse};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LsuState {
    #[default]
    Idle,
    Requesting,
    Waiting,
    Done,
}

impl LsuState {
    pub fn name(self) -> &'static str {
        match self {
            LsuState::Idle => "IDLE",
            LsuState::Requesting => "REQUESTING",
            LsuState::Waiting => "WAITING",
            LsuState::Done => "DONE",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoadStoreUnit {
    state: LsuState,
    out: u16,
    request: MemRequest,
}

impl LoadStoreUnit {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn state(&self) -> LsuState {
        self.state
    }

    /// Holds the scheduler in WAIT.
    #[inline]
    pub fn is_busy(&self) -> bool {
        matches!(self.state, LsuState::Requesting | LsuState::Waiting)
    }

    /// Last loaded word.
    #[inline]
    pub fn out(&self) -> u16 {
        self.out
    }

    #[inline]
    pub fn request(&self) -> MemRequest {
        self.request
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// `rs`/`rt` are the register file's operand latches: the address, and
    /// for stores the data.
    pub fn clock(&mut self, signals: &CoreSignals, rs: u16, rt: u16, response: MemResponse) {
        let Some(access) = signals.decoded.mem_access else {
            return;
        };

        match self.state {
            LsuState::Idle => {
                if signals.state == CoreState::Request {
                    self.state = LsuState::Requesting;
                }
            }
            LsuState::Requesting => {
                self.request = match access {
                    MemAccess::Read => MemRequest::read(rs),
                    MemAccess::Write => MemRequest::write(rs, rt),
                };
                self.state = LsuState::Waiting;
            }
            LsuState::Waiting => match access {
                MemAccess::Read if response.read_ready => {
                    self.request.read_valid = false;
                    self.out = response.read_data;
                    self.state = LsuState::Done;
                }
                MemAccess::Write if response.write_ready => {
                    self.request.write_valid = false;
                    self.state = LsuState::Done;
                }
                _ => {}
            },
            LsuState::Done => {
                if signals.state == CoreState::Update {
                    self.state = LsuState::Idle;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::{asm, decode};

    fn at(state: CoreState, word: u16) -> CoreSignals {
        CoreSignals {
            state,
            decoded: decode(word),
            ..Default::default()
        }
    }

    #[test]
    fn test_read_sequence() {
        let mut lsu = LoadStoreUnit::new();
        let ldr = asm::ldr(1, 2);
        let none = MemResponse::default();

        lsu.clock(&at(CoreState::Decode, ldr), 0x10, 0, none);
        assert_eq!(lsu.state(), LsuState::Idle);

        lsu.clock(&at(CoreState::Request, ldr), 0x10, 0, none);
        assert_eq!(lsu.state(), LsuState::Requesting);
        assert!(lsu.is_busy());

        lsu.clock(&at(CoreState::Wait, ldr), 0x10, 0, none);
        assert_eq!(lsu.state(), LsuState::Waiting);
        assert_eq!(lsu.request(), MemRequest::read(0x10));

        lsu.clock(&at(CoreState::Wait, ldr), 0x10, 0, none);
        assert_eq!(lsu.state(), LsuState::Waiting);

        let ready = MemResponse {
            read_ready: true,
            read_data: 0x4000,
            write_ready: false,
        };
        lsu.clock(&at(CoreState::Wait, ldr), 0x10, 0, ready);
        assert_eq!(lsu.state(), LsuState::Done);
        assert_eq!(lsu.out(), 0x4000);
        assert!(!lsu.request().read_valid);
        assert!(!lsu.is_busy());

        lsu.clock(&at(CoreState::Execute, ldr), 0x10, 0, ready);
        assert_eq!(lsu.state(), LsuState::Done, "held until UPDATE");
        lsu.clock(&at(CoreState::Update, ldr), 0x10, 0, none);
        assert_eq!(lsu.state(), LsuState::Idle);
        assert_eq!(lsu.out(), 0x4000);
    }

    #[test]
    fn test_write_sequence() {
        let mut lsu = LoadStoreUnit::new();
        let st = asm::str(7, 6);
        let none = MemResponse::default();
        lsu.clock(&at(CoreState::Request, st), 16, 0x6000, none);
        lsu.clock(&at(CoreState::Wait, st), 16, 0x6000, none);
        assert_eq!(lsu.request(), MemRequest::write(16, 0x6000));

        let ack = MemResponse {
            write_ready: true,
            ..Default::default()
        };
        lsu.clock(&at(CoreState::Wait, st), 16, 0x6000, ack);
        assert_eq!(lsu.state(), LsuState::Done);
        assert!(!lsu.request().write_valid);
    }

    #[test]
    fn test_ignores_non_memory_instructions() {
        let mut lsu = LoadStoreUnit::new();
        lsu.clock(&at(CoreState::Request, asm::add(1, 2, 3)), 0, 0, MemResponse::default());
        assert_eq!(lsu.state(), LsuState::Idle);
    }
}
