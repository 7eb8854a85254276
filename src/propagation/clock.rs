//! Simulated clock with playback multiplier

use chrono::{Datelike, Timelike};
use satkit::{Duration, Instant};

/// The simulation's time authority.
///
/// Wall-clock deltas are scaled by the multiplier on every tick; a zero
/// multiplier pauses the simulation and a negative one rewinds it. Absolute
/// jumps (`set_time`, scrubbing) are supported in either direction.
#[derive(Debug, Clone)]
pub struct SimClock {
    current: Instant,
    multiplier: f64,
}

impl SimClock {
    /// Start the clock at the current UTC wall time.
    pub fn now() -> Self {
        Self {
            current: wall_now(),
            multiplier: 1.0,
        }
    }

    /// Start the clock at an explicit instant.
    pub fn starting_at(time: Instant) -> Self {
        Self {
            current: time,
            multiplier: 1.0,
        }
    }

    pub fn current(&self) -> Instant {
        self.current
    }

    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    /// Set the playback multiplier. Zero pauses, negative rewinds.
    pub fn set_multiplier(&mut self, multiplier: f64) {
        self.multiplier = multiplier;
    }

    pub fn is_paused(&self) -> bool {
        self.multiplier == 0.0
    }

    /// Jump to an absolute simulated time.
    pub fn set_time(&mut self, time: Instant) {
        self.current = time;
    }

    /// Snap back to the current UTC wall time.
    pub fn reset_to_now(&mut self) {
        self.current = wall_now();
    }

    /// Advance by a wall-clock delta scaled by the multiplier; returns the
    /// new simulated time.
    pub fn advance(&mut self, wall_dt_s: f64) -> Instant {
        let scaled = wall_dt_s * self.multiplier;
        if scaled != 0.0 {
            self.current = self.current + Duration::from_seconds(scaled);
        }
        self.current
    }

    /// Format the current simulated time for display.
    pub fn format(&self) -> String {
        let (year, month, day, hour, minute, second) = self.current.as_datetime();
        format!(
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02} UTC",
            year, month, day, hour, minute, second as u32
        )
    }
}

fn wall_now() -> Instant {
    let now = chrono::Utc::now();
    Instant::from_datetime(
        now.year(),
        now.month() as i32,
        now.day() as i32,
        now.hour() as i32,
        now.minute() as i32,
        now.second() as f64,
    )
    .unwrap_or_else(|_| Instant::from_datetime(2026, 1, 1, 0, 0, 0.0).unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start() -> Instant {
        Instant::from_datetime(2026, 3, 1, 12, 0, 0.0).unwrap()
    }

    #[test]
    fn test_advance_scales_by_multiplier() {
        let mut clock = SimClock::starting_at(start());
        clock.set_multiplier(60.0);
        clock.advance(1.0);
        assert!(((clock.current() - start()).as_seconds() - 60.0).abs() < 1.0e-9);
    }

    #[test]
    fn test_paused_clock_holds() {
        let mut clock = SimClock::starting_at(start());
        clock.set_multiplier(0.0);
        assert!(clock.is_paused());
        clock.advance(10.0);
        assert_eq!((clock.current() - start()).as_seconds(), 0.0);
    }

    #[test]
    fn test_negative_multiplier_rewinds() {
        let mut clock = SimClock::starting_at(start());
        clock.set_multiplier(-10.0);
        clock.advance(2.0);
        assert!(((clock.current() - start()).as_seconds() + 20.0).abs() < 1.0e-9);
    }

    #[test]
    fn test_set_time_jumps_backward() {
        let mut clock = SimClock::starting_at(start());
        let earlier = Instant::from_datetime(2026, 2, 1, 0, 0, 0.0).unwrap();
        clock.set_time(earlier);
        assert_eq!((clock.current() - earlier).as_seconds(), 0.0);
    }
}
