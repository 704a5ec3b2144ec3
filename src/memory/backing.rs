//! Word-addressed backing store behind a controller's channels.

use super::{ImageError, MemRequest, MemResponse, MemoryImage};

/// External memory array with one port per controller channel.
///
/// Addresses wider than `addr_bits` are truncated, matching the width of
/// the hardware address bus.
#[derive(Clone)]
pub struct Memory {
    words: Vec<u16>,
    addr_bits: u32,
    /// Extra cycles a channel waits before `ready`.
    latency: u32,
    /// Cycles each channel's current request has been pending.
    waited: Vec<u32>,
    reads: u64,
    writes: u64,
}

impl Memory {
    /// Create a zeroed memory of `2^addr_bits` words serving `channels` ports.
    pub fn new(addr_bits: u32, channels: usize, latency: u32) -> Self {
        Self {
            words: vec![0; 1usize << addr_bits],
            addr_bits,
            latency,
            waited: vec![0; channels],
            reads: 0,
            writes: 0,
        }
    }

    /// Number of addressable words.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn addr_bits(&self) -> u32 {
        self.addr_bits
    }

    #[inline]
    fn index(&self, addr: u16) -> usize {
        (addr as usize) & (self.words.len() - 1)
    }

    /// Host-side read (no timing).
    #[inline]
    pub fn read(&self, addr: u16) -> u16 {
        self.words[self.index(addr)]
    }

    /// Host-side write (no timing).
    #[inline]
    pub fn write(&mut self, addr: u16, value: u16) {
        let i = self.index(addr);
        self.words[i] = value;
    }

    /// Copy `data` into memory starting at `base`.
    pub fn load(&mut self, base: u16, data: &[u16]) -> Result<(), ImageError> {
        let end = base as usize + data.len();
        if end > self.words.len() {
            return Err(ImageError::TooLarge {
                base,
                words: data.len(),
                capacity: self.words.len(),
            });
        }
        self.words[base as usize..end].copy_from_slice(data);
        Ok(())
    }

    /// Load every segment of an image.
    pub fn load_image(&mut self, image: &MemoryImage) -> Result<(), ImageError> {
        for segment in &image.segments {
            self.load(segment.base, &segment.words)?;
        }
        Ok(())
    }

    /// Read `count` words starting at `start`, wrapping at the top of memory.
    pub fn dump(&self, start: u16, count: usize) -> Vec<u16> {
        (0..count)
            .map(|i| self.read(start.wrapping_add(i as u16)))
            .collect()
    }

    /// Clear contents and port state.
    pub fn clear(&mut self) {
        self.words.fill(0);
        self.reset_ports();
    }

    /// Clear port state only; contents survive a device reset.
    pub fn reset_ports(&mut self) {
        self.waited.fill(0);
        self.reads = 0;
        self.writes = 0;
    }

    /// Serviced (reads, writes) since the last port reset.
    pub fn access_counts(&self) -> (u64, u64) {
        (self.reads, self.writes)
    }

    /// Answer each channel's request for this cycle.
    ///
    /// A request is answered once it has been pending for `latency` cycles;
    /// writes commit at that moment. Must be called exactly once per cycle.
    pub fn service(&mut self, requests: &[MemRequest]) -> Vec<MemResponse> {
        debug_assert_eq!(requests.len(), self.waited.len());
        let mut responses = vec![MemResponse::default(); requests.len()];

        for (ch, req) in requests.iter().enumerate() {
            if !req.is_valid() {
                self.waited[ch] = 0;
                continue;
            }
            if self.waited[ch] < self.latency {
                self.waited[ch] += 1;
                continue;
            }
            self.waited[ch] = 0;
            if req.read_valid {
                responses[ch].read_ready = true;
                responses[ch].read_data = self.read(req.read_address);
                self.reads += 1;
            } else {
                self.write(req.write_address, req.write_data);
                responses[ch].write_ready = true;
                self.writes += 1;
            }
        }

        responses
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let non_zero = self.words.iter().filter(|w| **w != 0).count();
        f.debug_struct("Memory")
            .field("addr_bits", &self.addr_bits)
            .field("latency", &self.latency)
            .field("non_zero_words", &non_zero)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_truncation() {
        let mut mem = Memory::new(8, 1, 0);
        assert_eq!(mem.len(), 256);
        mem.write(0x0105, 42);
        assert_eq!(mem.read(0x05), 42, "upper address bits are dropped");
    }

    #[test]
    fn test_load_and_dump() {
        let mut mem = Memory::new(8, 1, 0);
        mem.load(16, &[1, 2, 3]).unwrap();
        assert_eq!(mem.dump(15, 5), vec![0, 1, 2, 3, 0]);
    }

    #[test]
    fn test_load_overflow_rejected() {
        let mut mem = Memory::new(4, 1, 0);
        let err = mem.load(14, &[1, 2, 3]).unwrap_err();
        assert!(matches!(err, ImageError::TooLarge { capacity: 16, .. }));
    }

    #[test]
    fn test_clear_versus_port_reset() {
        let mut mem = Memory::new(8, 1, 1);
        mem.load(3, &[0x1234, 0x5678]).unwrap();
        let req = [MemRequest::read(3)];
        assert!(!mem.service(&req)[0].read_ready);

        // A port reset drops the pending wait but keeps contents.
        mem.reset_ports();
        assert!(!mem.service(&req)[0].read_ready);
        assert_eq!(mem.service(&req)[0].read_data, 0x1234);
        assert_eq!(mem.access_counts(), (1, 0));

        mem.clear();
        assert_eq!(mem.dump(3, 2), vec![0, 0]);
        assert_eq!(mem.access_counts(), (0, 0));
    }

    #[test]
    fn test_service_zero_latency() {
        let mut mem = Memory::new(8, 2, 0);
        mem.write(7, 0x4000);
        let resp = mem.service(&[MemRequest::read(7), MemRequest::write(9, 0x1111)]);
        assert!(resp[0].read_ready);
        assert_eq!(resp[0].read_data, 0x4000);
        assert!(resp[1].write_ready);
        assert_eq!(mem.read(9), 0x1111);
        assert_eq!(mem.access_counts(), (1, 1));
    }

    #[test]
    fn test_service_with_latency() {
        let mut mem = Memory::new(8, 1, 2);
        let req = [MemRequest::read(0)];
        assert!(!mem.service(&req)[0].read_ready);
        assert!(!mem.service(&req)[0].read_ready);
        assert!(mem.service(&req)[0].read_ready);
    }

    #[test]
    fn test_idle_channel_not_ready() {
        let mut mem = Memory::new(8, 1, 0);
        let resp = mem.service(&[MemRequest::default()]);
        assert_eq!(resp[0], MemResponse::default());
    }
}
