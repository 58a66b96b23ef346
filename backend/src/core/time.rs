//! Simulated clock for driving the department
//!
//! The engine never reads a wall clock: every operation takes `now` from the
//! caller. Drivers (the CLI, the Python dashboard) use this clock to produce
//! that `now`, advancing it by a fixed number of minutes per tick so a shift
//! can be replayed faster than real time.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Virtual clock advancing in whole-minute ticks from a fixed start
///
/// # Example
/// ```
/// use chrono::{TimeZone, Utc};
/// use ed_flow_core::SimulationClock;
///
/// let start = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
/// let mut clock = SimulationClock::new(start, 1);
/// assert_eq!(clock.now(), start);
///
/// clock.advance_tick();
/// assert_eq!(clock.elapsed_minutes(), 1);
/// assert_eq!(clock.label(), "[T+001min]");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationClock {
    /// Instant the simulated shift started
    start: DateTime<Utc>,
    /// Minutes elapsed since `start`
    elapsed_minutes: i64,
    /// Minutes added by each call to `advance_tick`
    minutes_per_tick: i64,
}

impl SimulationClock {
    /// Create a clock at `start`
    ///
    /// # Panics
    /// Panics if `minutes_per_tick` is not positive; time only moves forward.
    pub fn new(start: DateTime<Utc>, minutes_per_tick: i64) -> Self {
        assert!(minutes_per_tick > 0, "minutes_per_tick must be positive");
        Self {
            start,
            elapsed_minutes: 0,
            minutes_per_tick,
        }
    }

    /// Advance by one tick
    pub fn advance_tick(&mut self) {
        self.elapsed_minutes += self.minutes_per_tick;
    }

    /// Current simulated instant
    pub fn now(&self) -> DateTime<Utc> {
        self.start + Duration::minutes(self.elapsed_minutes)
    }

    /// Start of the simulated shift
    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// Minutes elapsed since the start
    pub fn elapsed_minutes(&self) -> i64 {
        self.elapsed_minutes
    }

    /// Number of ticks performed so far
    pub fn current_tick(&self) -> i64 {
        self.elapsed_minutes / self.minutes_per_tick
    }

    /// Minutes per tick
    pub fn minutes_per_tick(&self) -> i64 {
        self.minutes_per_tick
    }

    /// Log prefix in the form `[T+042min]`
    pub fn label(&self) -> String {
        format!("[T+{:03}min]", self.elapsed_minutes)
    }

    /// Elapsed time as a `HHhMM` display string
    ///
    /// ```
    /// use chrono::{TimeZone, Utc};
    /// use ed_flow_core::SimulationClock;
    ///
    /// let mut clock = SimulationClock::new(Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap(), 5);
    /// for _ in 0..13 {
    ///     clock.advance_tick();
    /// }
    /// assert_eq!(clock.elapsed_display(), "01h05");
    /// ```
    pub fn elapsed_display(&self) -> String {
        format!(
            "{:02}h{:02}",
            self.elapsed_minutes / 60,
            self.elapsed_minutes % 60
        )
    }
}

/// Whole and fractional minutes between two instants, clamped at zero
pub fn minutes_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> f64 {
    let seconds = (later - earlier).num_seconds().max(0);
    seconds as f64 / 60.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    #[should_panic(expected = "minutes_per_tick must be positive")]
    fn test_zero_minutes_per_tick_panics() {
        SimulationClock::new(Utc::now(), 0);
    }

    #[test]
    fn test_minutes_between_clamps_negative() {
        let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
        let t1 = t0 + Duration::seconds(90);
        assert_eq!(minutes_between(t0, t1), 1.5);
        assert_eq!(minutes_between(t1, t0), 0.0);
    }
}
