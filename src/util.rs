//! Shared utilities

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Largest simulation step handed to any layer, in seconds.
/// Longer gaps (tab resume, debugger pause) are clamped to this.
pub const MAX_FRAME_DT: f32 = 0.033;

/// Simple deterministic RNG using xorshift64
/// Good for effects that need reproducible randomness without external dependencies
#[derive(Debug, Clone)]
pub struct Rng {
    state: u64,
}

impl Rng {
    /// Create a new RNG with the given seed
    pub fn new(seed: u64) -> Self {
        Self { state: seed.max(1) } // Ensure non-zero
    }

    /// Get the next random u64
    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        self.state ^= self.state << 13;
        self.state ^= self.state >> 7;
        self.state ^= self.state << 17;
        self.state
    }

    /// Get a random f32 in [0, 1)
    #[inline]
    pub fn next_f32(&mut self) -> f32 {
        (self.next_u64() & 0xFFFFFF) as f32 / 0x1000000 as f32
    }

    /// Get a random f32 in [min, max)
    #[inline]
    pub fn range_f32(&mut self, min: f32, max: f32) -> f32 {
        min + self.next_f32() * (max - min)
    }
}

// ============================================================================
// Frame Clock
// ============================================================================

/// Turns externally supplied monotonic timestamps into clamped frame deltas.
///
/// The first tick yields a zero delta; every later tick yields the elapsed
/// time in seconds, clamped to [`MAX_FRAME_DT`]. Timestamps that go
/// backwards also yield zero.
#[derive(Debug, Clone, Default)]
pub struct FrameClock {
    last_ms: Option<f64>,
    elapsed: f64,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance to `now_ms`, returning the clamped delta in seconds
    pub fn tick(&mut self, now_ms: f64) -> f32 {
        let dt = match self.last_ms {
            Some(last) if now_ms > last => (((now_ms - last) / 1000.0) as f32).min(MAX_FRAME_DT),
            _ => 0.0,
        };
        self.last_ms = Some(now_ms);
        self.elapsed += f64::from(dt);
        dt
    }

    /// Sum of all clamped deltas so far, in seconds.
    /// This is the animation time, not wall-clock time.
    pub fn elapsed(&self) -> f32 {
        self.elapsed as f32
    }
}

// ============================================================================
// Stop Handle
// ============================================================================

/// Cloneable cancellation flag shared by the frame loop and feed threads
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    stopped: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

// ============================================================================
// FPS Counter
// ============================================================================

/// FPS counter with rolling average
pub struct FpsCounter {
    frame_times: VecDeque<f32>,
    last_frame: Instant,
    sample_count: usize,
}

impl FpsCounter {
    /// Create a new FPS counter with specified sample window
    pub fn new(sample_count: usize) -> Self {
        Self {
            frame_times: VecDeque::with_capacity(sample_count),
            last_frame: Instant::now(),
            sample_count,
        }
    }

    /// Call once per frame to record timing. Returns the average FPS.
    pub fn tick(&mut self) -> f32 {
        let now = Instant::now();
        let dt = (now - self.last_frame).as_secs_f32();
        self.last_frame = now;

        self.frame_times.push_back(dt);
        if self.frame_times.len() > self.sample_count {
            self.frame_times.pop_front();
        }

        let avg_dt = self.avg_frame_time_ms() / 1000.0;
        if avg_dt > 0.0 {
            1.0 / avg_dt
        } else {
            0.0
        }
    }

    /// Get the average frame time in milliseconds
    pub fn avg_frame_time_ms(&self) -> f32 {
        let avg_dt: f32 =
            self.frame_times.iter().sum::<f32>() / self.frame_times.len().max(1) as f32;
        avg_dt * 1000.0
    }

    /// Get min/max FPS from sample window
    pub fn min_max_fps(&self) -> (f32, f32) {
        if self.frame_times.is_empty() {
            return (0.0, 0.0);
        }
        let min_dt = self
            .frame_times
            .iter()
            .copied()
            .fold(f32::INFINITY, f32::min);
        let max_dt = self.frame_times.iter().copied().fold(0.0, f32::max);
        let max_fps = if min_dt > 0.0 { 1.0 / min_dt } else { 0.0 };
        let min_fps = if max_dt > 0.0 { 1.0 / max_dt } else { 0.0 };
        (min_fps, max_fps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_clock_first_tick_is_zero() {
        let mut clock = FrameClock::new();
        assert_eq!(clock.tick(1234.0), 0.0);
    }

    #[test]
    fn test_frame_clock_clamps_long_pauses() {
        let mut clock = FrameClock::new();
        clock.tick(0.0);
        let dt = clock.tick(16.0);
        assert!((dt - 0.016).abs() < 1e-5);
        // A 5 second stall (debugger, backgrounded tab) is clamped
        let dt = clock.tick(5016.0);
        assert_eq!(dt, MAX_FRAME_DT);
        assert!((clock.elapsed() - (0.016 + MAX_FRAME_DT)).abs() < 1e-5);
    }

    #[test]
    fn test_frame_clock_ignores_backwards_time() {
        let mut clock = FrameClock::new();
        clock.tick(100.0);
        assert_eq!(clock.tick(50.0), 0.0);
    }

    #[test]
    fn test_rng_range() {
        let mut rng = Rng::new(0x5A0F);
        for _ in 0..1000 {
            let v = rng.range_f32(-2.0, 3.0);
            assert!((-2.0..3.0).contains(&v));
        }
    }

    #[test]
    fn test_stop_handle_shared() {
        let stop = StopHandle::new();
        let other = stop.clone();
        assert!(!other.is_stopped());
        stop.stop();
        assert!(other.is_stopped());
    }
}
