//! Device control register.

/// 8-bit launch register; the host writes the kernel's thread count here
/// before asserting `start`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceControlRegister {
    value: u8,
}

impl DeviceControlRegister {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register write (`device_control_write_enable` asserted).
    pub fn write(&mut self, value: u8) {
        self.value = value;
    }

    pub fn thread_count(&self) -> u8 {
        self.value
    }

    pub fn reset(&mut self) {
        self.value = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_and_reset() {
        let mut dcr = DeviceControlRegister::new();
        assert_eq!(dcr.thread_count(), 0);
        dcr.write(8);
        assert_eq!(dcr.thread_count(), 8);
        dcr.reset();
        assert_eq!(dcr.thread_count(), 0);
    }
}
