use std::f64::consts::PI;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::SeedableRng;

/// Explicit replacement for the source's process-wide `Utils`/`Config`
/// singleton: sample rate, channel count, buffer length, master volume,
/// the shared clock, and the shared PRNG, threaded by reference into every
/// `start`/`getValue`/`fill_buffer` call instead of reached for globally.
pub struct RuntimeContext {
    pub sample_rate: u32,
    pub channels: u32,
    pub buffer_length: u32,
    pub two_pi: f64,

    volume: Mutex<f64>,
    clock_bits: AtomicU64,
    rng: Mutex<StdRng>,
}

impl RuntimeContext {
    pub fn new(sample_rate: u32, channels: u32, buffer_length: u32) -> Self {
        Self {
            sample_rate,
            channels,
            buffer_length,
            two_pi: PI * 2.0,
            volume: Mutex::new(0.25),
            clock_bits: AtomicU64::new(0f64.to_bits()),
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn default_audio() -> Self {
        Self::new(44_100, 2, 128)
    }

    /// Written only by the control loop; read by both loops. `f64` has no
    /// portable atomic form, so the bit pattern rides in an `AtomicU64`.
    pub fn clock(&self) -> f64 {
        f64::from_bits(self.clock_bits.load(Ordering::Acquire))
    }

    pub fn set_clock(&self, time: f64) {
        self.clock_bits.store(time.to_bits(), Ordering::Release);
    }

    pub fn advance_clock(&self, delta: f64) {
        self.set_clock(self.clock() + delta);
    }

    pub fn volume(&self) -> f64 {
        *self.volume.lock().unwrap()
    }

    pub fn set_volume(&self, volume: f64) {
        *self.volume.lock().unwrap() = volume;
    }

    /// A uniform sample in `[low, high)`, drawn from the shared RNG.
    pub fn uniform(&self, low: f64, high: f64) -> f64 {
        use rand::Rng;
        self.rng.lock().unwrap().gen_range(low..high)
    }

    pub fn uniform_index(&self, count: usize) -> usize {
        use rand::Rng;
        self.rng.lock().unwrap().gen_range(0..count)
    }
}
