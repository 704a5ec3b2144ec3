//! Instruction fetcher: one program-memory consumer per core.

use crate::core::CoreState;
use crate::memory::{MemRequest, MemResponse};

/// Fetcher FSM state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FetcherState {
    #[default]
    Idle,
    /// Read request outstanding.
    Fetching,
    /// Instruction register holds the word at `current_pc`.
    Fetched,
}

impl FetcherState {
    pub fn name(self) -> &'static str {
        match self {
            FetcherState::Idle => "IDLE",
            FetcherState::Fetching => "FETCHING",
            FetcherState::Fetched => "FETCHED",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Fetcher {
    state: FetcherState,
    instruction: u16,
    request: MemRequest,
}

impl Fetcher {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn state(&self) -> FetcherState {
        self.state
    }

    /// Instruction register.
    #[inline]
    pub fn instruction(&self) -> u16 {
        self.instruction
    }

    /// Request presented to the program-memory controller.
    #[inline]
    pub fn request(&self) -> MemRequest {
        self.request
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn clock(&mut self, core_state: CoreState, current_pc: u16, response: MemResponse) {
        match self.state {
            FetcherState::Idle => {
                if core_state == CoreState::Fetch {
                    self.request = MemRequest::read(current_pc);
                    self.state = FetcherState::Fetching;
                }
            }
            FetcherState::Fetching => {
                if response.read_ready {
                    self.instruction = response.read_data;
                    self.request.read_valid = false;
                    self.state = FetcherState::Fetched;
                }
            }
            FetcherState::Fetched => {
                if core_state == CoreState::Decode {
                    self.state = FetcherState::Idle;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_cycle() {
        let mut f = Fetcher::new();
        let none = MemResponse::default();

        f.clock(CoreState::Idle, 5, none);
        assert_eq!(f.state(), FetcherState::Idle);
        assert!(!f.request().read_valid);

        f.clock(CoreState::Fetch, 5, none);
        assert_eq!(f.state(), FetcherState::Fetching);
        assert_eq!(f.request(), MemRequest::read(5));

        f.clock(CoreState::Fetch, 5, none);
        assert_eq!(f.state(), FetcherState::Fetching, "holds until ready");

        let ready = MemResponse {
            read_ready: true,
            read_data: 0x3410,
            write_ready: false,
        };
        f.clock(CoreState::Fetch, 5, ready);
        assert_eq!(f.state(), FetcherState::Fetched);
        assert_eq!(f.instruction(), 0x3410);
        assert!(!f.request().read_valid);

        f.clock(CoreState::Fetch, 5, ready);
        assert_eq!(f.state(), FetcherState::Fetched, "waits for DECODE");
        f.clock(CoreState::Decode, 5, none);
        assert_eq!(f.state(), FetcherState::Idle);
        assert_eq!(f.instruction(), 0x3410, "instruction register is kept");
    }
}
