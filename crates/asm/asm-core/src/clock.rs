//! Wall-clock sources for blend timing.
//!
//! Blends are sampled against elapsed milliseconds, never frame counts, so a
//! crossfade takes the same time at 30 or 144 frames per second.

use instant::Instant;

pub trait Clock {
    /// Monotonic time in milliseconds since an arbitrary origin.
    fn now_ms(&self) -> f64;
}

/// Real monotonic clock (works on native and wasm targets).
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }
}

/// Host-driven clock for tests, replays and fixed-step simulation.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ManualClock {
    now_ms: f64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn advance_ms(&mut self, dt_ms: f64) {
        self.now_ms += dt_ms.max(0.0);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> f64 {
        self.now_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_only_moves_forward() {
        let mut c = ManualClock::new();
        c.advance_ms(16.0);
        c.advance_ms(-5.0);
        assert_eq!(c.now_ms(), 16.0);
        c.advance_ms(84.0);
        assert_eq!(c.now_ms(), 100.0);
    }

    #[test]
    fn system_clock_is_monotonic() {
        let c = SystemClock::new();
        let a = c.now_ms();
        let b = c.now_ms();
        assert!(b >= a);
    }
}
