//! Frame counters and the fixed-timestep tick scheduler
//!
//! Simulation time is a signed frame counter: `-1` is a natural sentinel
//! for "no complete frame yet" and early-game `current_frame - window`
//! arithmetic may dip below zero without branching.
//!
//! The scheduler is an accumulator over an injectable monotonic clock
//! rather than a re-armed timer, so tests drive frames deterministically
//! with a `ManualClock` and no wall-clock waits.

use std::time::{Duration, Instant};

/// A discrete simulation frame number (logical time unit)
pub type Frame = i64;

/// A monotonic source of elapsed time
pub trait Clock {
    /// Time elapsed since the clock was created
    fn elapsed(&self) -> Duration;
}

/// Wall-clock time, anchored at construction
#[derive(Debug)]
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    /// Create a clock anchored at the current instant
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

/// A clock advanced explicitly by the caller, for tests and demos
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Duration,
}

impl ManualClock {
    /// Create a clock at zero elapsed time
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the clock by `delta`
    pub fn advance(&mut self, delta: Duration) {
        self.now += delta;
    }
}

impl Clock for ManualClock {
    fn elapsed(&self) -> Duration {
        self.now
    }
}

/// Fixed-timestep scheduler over an injectable clock
///
/// Each call to `due_frames` reports how many whole tick periods have
/// elapsed since the last call, so the caller runs exactly that many
/// fixed steps regardless of how often it polls.
#[derive(Debug)]
pub struct TickScheduler<C: Clock> {
    clock: C,
    period: Duration,
    consumed: u64,
}

impl<C: Clock> TickScheduler<C> {
    /// Create a scheduler with an explicit tick period
    pub fn new(clock: C, period: Duration) -> Self {
        assert!(!period.is_zero(), "Tick period must be greater than 0");
        Self {
            clock,
            period,
            consumed: 0,
        }
    }

    /// Create a scheduler running at `ticks_per_second`
    pub fn with_rate(clock: C, ticks_per_second: u32) -> Self {
        assert!(ticks_per_second > 0, "Tick rate must be greater than 0");
        Self::new(clock, Duration::from_secs(1) / ticks_per_second)
    }

    /// The fixed tick period
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Number of frames that became due since the last call
    pub fn due_frames(&mut self) -> u64 {
        let total = (self.clock.elapsed().as_nanos() / self.period.as_nanos()) as u64;
        let due = total - self.consumed;
        self.consumed = total;
        due
    }

    /// Access the underlying clock
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Mutable access to the underlying clock (tests advance it directly)
    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_due_frames_counts_whole_periods() {
        let mut scheduler = TickScheduler::with_rate(ManualClock::new(), 60);
        assert_eq!(scheduler.due_frames(), 0);

        scheduler.clock_mut().advance(Duration::from_secs(1));
        assert_eq!(scheduler.due_frames(), 60);

        // No time passed, nothing new is due.
        assert_eq!(scheduler.due_frames(), 0);
    }

    #[test]
    fn test_partial_periods_accumulate() {
        let mut scheduler = TickScheduler::new(ManualClock::new(), Duration::from_millis(10));

        scheduler.clock_mut().advance(Duration::from_millis(15));
        assert_eq!(scheduler.due_frames(), 1);

        // The leftover 5ms combines with the next 5ms into one more frame.
        scheduler.clock_mut().advance(Duration::from_millis(5));
        assert_eq!(scheduler.due_frames(), 1);
    }

    #[test]
    fn test_system_clock_monotonic() {
        let clock = SystemClock::new();
        let a = clock.elapsed();
        let b = clock.elapsed();
        assert!(b >= a);
    }
}
