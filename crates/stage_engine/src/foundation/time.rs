//! Time management utilities

use std::time::{Duration, Instant};

use crate::core::config::{ConfigError, TimeConfig};

/// Timing snapshot for a single tick
///
/// Every frame callback and lifecycle hook receives one of these. Hooks that
/// run outside a tick (bulk `awake`/`start` at load time) get the snapshot of
/// the most recent tick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameTime {
    /// Seconds since the previous tick, after clamping
    pub delta_time: f32,
    /// Sum of all clamped deltas so far
    pub elapsed: f32,
    /// Monotonic frame counter, the first tick is frame 0
    pub frame_index: u64,
}

/// Frame clock producing [`FrameTime`] snapshots
///
/// Delta time is clamped so that a debugger pause or a long stage load does
/// not hand a multi-second step to gameplay code. The very first tick reports
/// a zero delta.
#[derive(Debug, Clone)]
pub struct FrameClock {
    last_frame: Option<Instant>,
    elapsed: f32,
    frame_count: u64,
    min_delta: Duration,
    max_delta: Duration,
    latest: FrameTime,
}

impl FrameClock {
    /// Create a clock with the given delta clamps
    ///
    /// Inverted clamps collapse to `max_delta`.
    pub fn new(min_delta: Duration, max_delta: Duration) -> Self {
        if min_delta > max_delta {
            log::warn!("frame clock: min delta {min_delta:?} exceeds max delta {max_delta:?}");
        }
        Self {
            last_frame: None,
            elapsed: 0.0,
            frame_count: 0,
            min_delta: min_delta.min(max_delta),
            max_delta,
            latest: FrameTime::default(),
        }
    }

    /// Create a clock from the time section of the engine configuration
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] if the clamps are not usable durations.
    pub fn from_config(config: &TimeConfig) -> Result<Self, ConfigError> {
        let (min_delta, max_delta) = config.clamps()?;
        Ok(Self::new(min_delta, max_delta))
    }

    /// Advance the clock using wall time
    pub fn tick(&mut self) -> FrameTime {
        let now = Instant::now();
        let delta = match self.last_frame {
            Some(last) => now.saturating_duration_since(last).clamp(self.min_delta, self.max_delta),
            None => Duration::ZERO,
        };
        self.last_frame = Some(now);
        self.advance(delta)
    }

    /// Advance the clock by an explicit step
    ///
    /// Used by headless hosts and tests that need deterministic frames. The
    /// step is clamped like a wall-clock delta.
    pub fn tick_with(&mut self, delta: Duration) -> FrameTime {
        self.last_frame = Some(Instant::now());
        self.advance(delta.clamp(self.min_delta, self.max_delta))
    }

    fn advance(&mut self, delta: Duration) -> FrameTime {
        let delta_time = delta.as_secs_f32();
        self.elapsed += delta_time;
        self.latest = FrameTime {
            delta_time,
            elapsed: self.elapsed,
            frame_index: self.frame_count,
        };
        self.frame_count = self.frame_count.wrapping_add(1);
        self.latest
    }

    /// Snapshot of the most recent tick
    pub fn latest(&self) -> FrameTime {
        self.latest
    }

    /// Number of ticks produced so far
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Forget the previous tick instant, e.g. after the host was suspended
    pub fn reset(&mut self) {
        self.last_frame = None;
    }
}

/// Simple stopwatch for measuring elapsed time
#[derive(Debug, Clone)]
pub struct Stopwatch {
    start_time: Option<Instant>,
    elapsed: Duration,
}

impl Default for Stopwatch {
    fn default() -> Self {
        Self::new()
    }
}

impl Stopwatch {
    /// Create a new stopped stopwatch
    pub fn new() -> Self {
        Self {
            start_time: None,
            elapsed: Duration::ZERO,
        }
    }

    /// Create a new stopwatch and start it immediately
    pub fn start_new() -> Self {
        let mut stopwatch = Self::new();
        stopwatch.start();
        stopwatch
    }

    /// Start the stopwatch
    pub fn start(&mut self) {
        self.start_time = Some(Instant::now());
    }

    /// Stop the stopwatch and accumulate elapsed time
    pub fn stop(&mut self) {
        if let Some(start) = self.start_time.take() {
            self.elapsed += start.elapsed();
        }
    }

    /// Get the elapsed time
    pub fn elapsed(&self) -> Duration {
        let running = self.start_time.map_or(Duration::ZERO, |start| start.elapsed());
        self.elapsed + running
    }

    /// Get the elapsed time in milliseconds
    pub fn elapsed_millis(&self) -> f32 {
        self.elapsed().as_secs_f32() * 1000.0
    }

    /// Check if the stopwatch is currently running
    pub fn is_running(&self) -> bool {
        self.start_time.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn clock() -> FrameClock {
        FrameClock::new(Duration::from_millis(1), Duration::from_millis(100))
    }

    #[test]
    fn test_first_tick_has_zero_delta() {
        let mut clock = clock();
        let frame = clock.tick();
        assert_eq!(frame.frame_index, 0);
        assert_relative_eq!(frame.delta_time, 0.0);
    }

    #[test]
    fn test_explicit_steps_accumulate() {
        let mut clock = clock();
        clock.tick_with(Duration::from_millis(16));
        let frame = clock.tick_with(Duration::from_millis(16));
        assert_eq!(frame.frame_index, 1);
        assert_relative_eq!(frame.delta_time, 0.016, epsilon = 1e-6);
        assert_relative_eq!(frame.elapsed, 0.032, epsilon = 1e-6);
        assert_eq!(clock.frame_count(), 2);
        assert_eq!(clock.latest(), frame);
    }

    #[test]
    fn test_delta_is_clamped() {
        let mut clock = clock();
        let long = clock.tick_with(Duration::from_secs(5));
        assert_relative_eq!(long.delta_time, 0.1, epsilon = 1e-6);

        let short = clock.tick_with(Duration::ZERO);
        assert_relative_eq!(short.delta_time, 0.001, epsilon = 1e-6);
    }

    #[test]
    fn test_inverted_clamps_collapse_to_max() {
        let mut clock = FrameClock::new(Duration::from_millis(50), Duration::from_millis(10));
        let frame = clock.tick_with(Duration::from_millis(30));
        assert_relative_eq!(frame.delta_time, 0.01, epsilon = 1e-6);
    }

    #[test]
    fn test_oversized_config_is_an_error() {
        let config = TimeConfig {
            min_delta_ms: 0.1,
            max_delta_ms: 1.0e25,
        };
        assert!(matches!(FrameClock::from_config(&config), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_stopwatch_accumulates_only_while_running() {
        let mut watch = Stopwatch::start_new();
        assert!(watch.is_running());
        watch.stop();
        let frozen = watch.elapsed();
        assert!(!watch.is_running());
        assert_eq!(watch.elapsed(), frozen);
    }
}
