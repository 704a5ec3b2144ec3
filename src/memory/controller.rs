//! Multi-channel memory controller.
//!
//! Each channel runs its own five-state FSM:
//!
//! | State           | Leaves when                          | Next             |
//! |-----------------|--------------------------------------|------------------|
//! | `Idle`          | an unbound consumer has a request    | `*Waiting`       |
//! | `ReadWaiting`   | memory asserts `read_ready`          | `ReadRelaying`   |
//! | `WriteWaiting`  | memory asserts `write_ready`         | `WriteRelaying`  |
//! | `ReadRelaying`  | the consumer drops `read_valid`      | `Idle`           |
//! | `WriteRelaying` | the consumer drops `write_valid`     | `Idle`           |
//!
//! Channels are evaluated in index order within one clock edge and share the
//! "consumer is being served" bits, so a grant made by channel `i` is seen by
//! channel `i + 1` in the same cycle. Idle channels scan consumers from index
//! 0 upward, which makes the lowest pending index win every tie. Replaying
//! the same request sequence always reproduces the same grant order.

use super::{MemRequest, MemResponse, MemoryArbiter};

/// Per-channel controller state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChannelState {
    #[default]
    Idle,
    ReadWaiting,
    WriteWaiting,
    ReadRelaying,
    WriteRelaying,
}

/// Counters accumulated across a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControllerStats {
    /// Read grants per channel.
    pub read_grants: Vec<u64>,
    /// Write grants per channel.
    pub write_grants: Vec<u64>,
    /// Sum over cycles of consumers left waiting with no free channel.
    pub contention_cycles: u64,
}

impl ControllerStats {
    fn new(channels: usize) -> Self {
        Self {
            read_grants: vec![0; channels],
            write_grants: vec![0; channels],
            contention_cycles: 0,
        }
    }

    /// Total grants over all channels.
    pub fn total_grants(&self) -> u64 {
        self.read_grants.iter().sum::<u64>() + self.write_grants.iter().sum::<u64>()
    }
}

/// Shared controller arbitrating consumers onto memory channels.
#[derive(Debug, Clone)]
pub struct MemoryController {
    name: &'static str,
    states: Vec<ChannelState>,
    /// Consumer bound to each channel.
    bound: Vec<Option<usize>>,
    /// Consumers currently held by some channel.
    serving: Vec<bool>,
    /// Registered outputs toward memory.
    channel_out: Vec<MemRequest>,
    /// Registered outputs toward consumers.
    consumer_out: Vec<MemResponse>,
    stats: ControllerStats,
}

impl MemoryController {
    /// Create a controller with the given shape.
    ///
    /// `name` only labels log output ("program", "data").
    pub fn new(name: &'static str, num_consumers: usize, num_channels: usize) -> Self {
        Self {
            name,
            states: vec![ChannelState::Idle; num_channels],
            bound: vec![None; num_channels],
            serving: vec![false; num_consumers],
            channel_out: vec![MemRequest::default(); num_channels],
            consumer_out: vec![MemResponse::default(); num_consumers],
            stats: ControllerStats::new(num_channels),
        }
    }

    /// Controller label.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// State of one channel.
    pub fn channel_state(&self, channel: usize) -> ChannelState {
        self.states[channel]
    }

    /// Accumulated statistics.
    pub fn stats(&self) -> &ControllerStats {
        &self.stats
    }

    fn grant(&mut self, channel: usize, consumers: &[MemRequest]) {
        let candidate = consumers
            .iter()
            .enumerate()
            .find(|(j, req)| req.is_valid() && !self.serving[*j]);

        let Some((consumer, req)) = candidate else {
            return;
        };

        self.serving[consumer] = true;
        self.bound[channel] = Some(consumer);
        if req.read_valid {
            self.channel_out[channel] = MemRequest::read(req.read_address);
            self.states[channel] = ChannelState::ReadWaiting;
            self.stats.read_grants[channel] += 1;
            log::debug!(
                "{} ch{}: read grant to consumer {} @0x{:04X}",
                self.name, channel, consumer, req.read_address
            );
        } else {
            self.channel_out[channel] = MemRequest::write(req.write_address, req.write_data);
            self.states[channel] = ChannelState::WriteWaiting;
            self.stats.write_grants[channel] += 1;
            log::debug!(
                "{} ch{}: write grant to consumer {} @0x{:04X} = 0x{:04X}",
                self.name, channel, consumer, req.write_address, req.write_data
            );
        }
    }

    fn release(&mut self, channel: usize, consumer: usize) {
        self.serving[consumer] = false;
        self.bound[channel] = None;
        self.consumer_out[consumer] = MemResponse::default();
        self.states[channel] = ChannelState::Idle;
    }
}

impl MemoryArbiter for MemoryController {
    fn num_consumers(&self) -> usize {
        self.serving.len()
    }

    fn num_channels(&self) -> usize {
        self.states.len()
    }

    fn consumer_response(&self, consumer: usize) -> MemResponse {
        self.consumer_out[consumer]
    }

    fn channel_request(&self, channel: usize) -> MemRequest {
        self.channel_out[channel]
    }

    fn binding(&self, channel: usize) -> Option<usize> {
        self.bound[channel]
    }

    fn clock(&mut self, consumers: &[MemRequest], channels: &[MemResponse]) {
        debug_assert_eq!(consumers.len(), self.num_consumers());
        debug_assert_eq!(channels.len(), self.num_channels());

        for ch in 0..self.states.len() {
            match (self.states[ch], self.bound[ch]) {
                (ChannelState::Idle, _) => self.grant(ch, consumers),
                (ChannelState::ReadWaiting, Some(consumer)) => {
                    if channels[ch].read_ready {
                        self.channel_out[ch].read_valid = false;
                        self.consumer_out[consumer].read_ready = true;
                        self.consumer_out[consumer].read_data = channels[ch].read_data;
                        self.states[ch] = ChannelState::ReadRelaying;
                    }
                }
                (ChannelState::WriteWaiting, Some(consumer)) => {
                    if channels[ch].write_ready {
                        self.channel_out[ch].write_valid = false;
                        self.consumer_out[consumer].write_ready = true;
                        self.states[ch] = ChannelState::WriteRelaying;
                    }
                }
                (ChannelState::ReadRelaying, Some(consumer)) => {
                    if !consumers[consumer].read_valid {
                        self.release(ch, consumer);
                    }
                }
                (ChannelState::WriteRelaying, Some(consumer)) => {
                    if !consumers[consumer].write_valid {
                        self.release(ch, consumer);
                    }
                }
                (state, None) => {
                    // Unreachable through grant(); recover to a clean channel.
                    log::warn!("{} ch{}: {:?} with no bound consumer", self.name, ch, state);
                    self.states[ch] = ChannelState::Idle;
                    self.channel_out[ch] = MemRequest::default();
                }
            }
        }

        let waiting = consumers
            .iter()
            .zip(&self.serving)
            .filter(|(req, serving)| req.is_valid() && !**serving)
            .count();
        self.stats.contention_cycles += waiting as u64;
    }

    fn reset(&mut self) {
        let channels = self.states.len();
        self.states.fill(ChannelState::Idle);
        self.bound.fill(None);
        self.serving.fill(false);
        self.channel_out.fill(MemRequest::default());
        self.consumer_out.fill(MemResponse::default());
        self.stats = ControllerStats::new(channels);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready_read(data: u16) -> MemResponse {
        MemResponse {
            read_ready: true,
            read_data: data,
            write_ready: false,
        }
    }

    #[test]
    fn test_single_read_round_trip() {
        let mut mc = MemoryController::new("data", 2, 1);
        let idle = [MemResponse::default()];
        let reqs = [MemRequest::read(0x10), MemRequest::default()];

        mc.clock(&reqs, &idle);
        assert_eq!(mc.channel_state(0), ChannelState::ReadWaiting);
        assert_eq!(mc.binding(0), Some(0));
        assert_eq!(mc.channel_request(0), MemRequest::read(0x10));

        mc.clock(&reqs, &[ready_read(0xBEEF)]);
        assert_eq!(mc.channel_state(0), ChannelState::ReadRelaying);
        assert!(!mc.channel_request(0).read_valid);
        let resp = mc.consumer_response(0);
        assert!(resp.read_ready);
        assert_eq!(resp.read_data, 0xBEEF);

        // Consumer still asserting: binding holds.
        mc.clock(&reqs, &idle);
        assert_eq!(mc.binding(0), Some(0));

        // Consumer drops valid: channel releases.
        mc.clock(&[MemRequest::default(); 2], &idle);
        assert_eq!(mc.channel_state(0), ChannelState::Idle);
        assert_eq!(mc.binding(0), None);
        assert!(!mc.consumer_response(0).read_ready);
    }

    #[test]
    fn test_write_round_trip() {
        let mut mc = MemoryController::new("data", 1, 1);
        let reqs = [MemRequest::write(3, 0x1234)];
        mc.clock(&reqs, &[MemResponse::default()]);
        assert_eq!(mc.channel_state(0), ChannelState::WriteWaiting);
        assert_eq!(mc.channel_request(0), MemRequest::write(3, 0x1234));

        let ack = MemResponse {
            write_ready: true,
            ..Default::default()
        };
        mc.clock(&reqs, &[ack]);
        assert_eq!(mc.channel_state(0), ChannelState::WriteRelaying);
        assert!(mc.consumer_response(0).write_ready);

        mc.clock(&[MemRequest::default()], &[MemResponse::default()]);
        assert_eq!(mc.channel_state(0), ChannelState::Idle);
        assert_eq!(mc.stats().write_grants, vec![1]);
    }

    #[test]
    fn test_lowest_index_wins() {
        let mut mc = MemoryController::new("data", 3, 1);
        let reqs = [MemRequest::default(), MemRequest::read(1), MemRequest::read(2)];
        mc.clock(&reqs, &[MemResponse::default()]);
        assert_eq!(mc.binding(0), Some(1));
        assert_eq!(mc.stats().contention_cycles, 1, "consumer 2 left waiting");
    }

    #[test]
    fn test_channels_never_double_grant() {
        let mut mc = MemoryController::new("data", 4, 3);
        let reqs = [
            MemRequest::read(0),
            MemRequest::default(),
            MemRequest::write(2, 7),
            MemRequest::default(),
        ];
        mc.clock(&reqs, &[MemResponse::default(); 3]);
        assert_eq!(mc.binding(0), Some(0));
        assert_eq!(mc.binding(1), Some(2), "channel 1 sees channel 0's grant");
        assert_eq!(mc.binding(2), None);
    }

    #[test]
    fn test_waiting_consumer_gets_freed_channel() {
        let mut mc = MemoryController::new("data", 2, 1);
        let idle = [MemResponse::default()];
        let both = [MemRequest::read(10), MemRequest::read(20)];

        mc.clock(&both, &idle);
        assert_eq!(mc.binding(0), Some(0));
        mc.clock(&both, &[ready_read(1)]);
        // Consumer 0 acknowledges by dropping valid.
        let only_second = [MemRequest::default(), MemRequest::read(20)];
        mc.clock(&only_second, &idle);
        assert_eq!(mc.channel_state(0), ChannelState::Idle);
        mc.clock(&only_second, &idle);
        assert_eq!(mc.binding(0), Some(1));
        assert_eq!(mc.channel_request(0).read_address, 20);
    }

    #[test]
    fn test_reset_clears_bindings() {
        let mut mc = MemoryController::new("program", 2, 1);
        mc.clock(&[MemRequest::read(0), MemRequest::default()], &[MemResponse::default()]);
        mc.reset();
        assert_eq!(mc.binding(0), None);
        assert_eq!(mc.channel_state(0), ChannelState::Idle);
        assert_eq!(mc.stats().total_grants(), 0);
    }
}
