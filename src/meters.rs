//! Thread-safe metering for real-time audio processing.
//!
//! Atomic float storage for sharing peak levels between the audio thread
//! and any observer thread without locks. Values are f32 bit patterns in
//! `AtomicU32` slots with relaxed ordering: a reader may see a one-block-old
//! value, never a torn one. Slots are sized once from the channel topology;
//! nothing here allocates after construction.

use std::sync::atomic::{AtomicU32, Ordering};

/// Peak-level meter bank: one slot per mix channel (pre-post-gain peak) and
/// one input/output pair per primary bus side.
pub struct Meters {
    channel_peak: Vec<AtomicU32>,
    bus_in_peak: Vec<AtomicU32>,
    bus_out_peak: Vec<AtomicU32>,
}

fn zero_slots(n: usize) -> Vec<AtomicU32> {
    (0..n).map(|_| AtomicU32::new(0.0f32.to_bits())).collect()
}

impl Meters {
    pub fn new(mix_channels: usize, buses: usize) -> Self {
        Self {
            channel_peak: zero_slots(mix_channels),
            bus_in_peak: zero_slots(buses),
            bus_out_peak: zero_slots(buses),
        }
    }

    pub fn set_channel_peak(&self, index: usize, val: f32) {
        self.channel_peak[index].store(val.to_bits(), Ordering::Relaxed);
    }

    pub fn set_bus_in_peak(&self, side: usize, val: f32) {
        self.bus_in_peak[side].store(val.to_bits(), Ordering::Relaxed);
    }

    pub fn set_bus_out_peak(&self, side: usize, val: f32) {
        self.bus_out_peak[side].store(val.to_bits(), Ordering::Relaxed);
    }

    pub fn get_channel_peak(&self, index: usize) -> f32 {
        f32::from_bits(self.channel_peak[index].load(Ordering::Relaxed))
    }

    pub fn get_bus_in_peak(&self, side: usize) -> f32 {
        f32::from_bits(self.bus_in_peak[side].load(Ordering::Relaxed))
    }

    pub fn get_bus_out_peak(&self, side: usize) -> f32 {
        f32::from_bits(self.bus_out_peak[side].load(Ordering::Relaxed))
    }

    pub fn reset(&self) {
        let zero = 0.0f32.to_bits();
        for slot in self
            .channel_peak
            .iter()
            .chain(&self.bus_in_peak)
            .chain(&self.bus_out_peak)
        {
            slot.store(zero, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let m = Meters::new(4, 2);
        m.set_channel_peak(3, 0.75);
        m.set_bus_out_peak(1, 1.25);
        assert_eq!(m.get_channel_peak(3), 0.75);
        assert_eq!(m.get_bus_out_peak(1), 1.25);
        assert_eq!(m.get_bus_in_peak(0), 0.0);
    }

    #[test]
    fn test_reset_clears_all() {
        let m = Meters::new(2, 1);
        m.set_channel_peak(0, 0.5);
        m.set_bus_in_peak(0, 0.5);
        m.reset();
        assert_eq!(m.get_channel_peak(0), 0.0);
        assert_eq!(m.get_bus_in_peak(0), 0.0);
    }
}
