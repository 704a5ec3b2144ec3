//! Memory subsystem: backing stores, images and the shared controllers.
//!
//! # Architecture
//!
//! ```text
//!  LSU / fetcher ──┐
//!  LSU / fetcher ──┼──► MemoryController ──► channel 0 ──► Memory
//!       ...        │    (per-channel FSM)     ...
//!  LSU / fetcher ──┘                         channel N-1
//! ```
//!
//! Every link uses the same pair of wire bundles: a [`MemRequest`] flowing
//! toward memory and a [`MemResponse`] flowing back. All bundles are
//! registered outputs, so a request asserted at one clock edge is observed by
//! the next stage during the following cycle.
//!
//! The controller is reached through the [`MemoryArbiter`] trait so an
//! alternative arbiter (for example one that coalesces neighbouring
//! addresses) can be dropped in without touching the cores.

mod backing;
mod controller;
mod image;

pub use backing::Memory;
pub use controller::{ChannelState, ControllerStats, MemoryController};
pub use image::{parse_hex_image, read_binary_image, ImageError, MemoryImage, Segment};

/// Request wires driven toward memory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemRequest {
    pub read_valid: bool,
    pub read_address: u16,
    pub write_valid: bool,
    pub write_address: u16,
    pub write_data: u16,
}

impl MemRequest {
    /// A read request.
    pub fn read(address: u16) -> Self {
        Self {
            read_valid: true,
            read_address: address,
            ..Default::default()
        }
    }

    /// A write request.
    pub fn write(address: u16, data: u16) -> Self {
        Self {
            write_valid: true,
            write_address: address,
            write_data: data,
            ..Default::default()
        }
    }

    /// True if either direction is asserted.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.read_valid || self.write_valid
    }
}

/// Response wires driven back toward the requester.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemResponse {
    pub read_ready: bool,
    pub read_data: u16,
    pub write_ready: bool,
}

/// Arbitration between many requesters and a few memory channels.
///
/// Implementations are clocked once per cycle with the consumers' registered
/// requests and the memory's responses from the same cycle. Outputs read
/// through [`consumer_response`](MemoryArbiter::consumer_response) and
/// [`channel_request`](MemoryArbiter::channel_request) are the registered
/// values produced by the most recent clock.
pub trait MemoryArbiter {
    /// Number of requesters attached.
    fn num_consumers(&self) -> usize;

    /// Number of memory channels driven.
    fn num_channels(&self) -> usize;

    /// Response currently presented to a consumer.
    fn consumer_response(&self, consumer: usize) -> MemResponse;

    /// Request currently presented to a memory channel.
    fn channel_request(&self, channel: usize) -> MemRequest;

    /// Consumer bound to a channel, if any.
    fn binding(&self, channel: usize) -> Option<usize>;

    /// Advance one clock edge.
    fn clock(&mut self, consumers: &[MemRequest], channels: &[MemResponse]);

    /// Synchronous reset.
    fn reset(&mut self);

    /// All channel requests, in channel order.
    fn channel_requests(&self) -> Vec<MemRequest> {
        (0..self.num_channels()).map(|c| self.channel_request(c)).collect()
    }

    /// All consumer responses, in consumer order.
    fn consumer_responses(&self) -> Vec<MemResponse> {
        (0..self.num_consumers()).map(|c| self.consumer_response(c)).collect()
    }
}
