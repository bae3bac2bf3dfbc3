//! Core types for the TimeSync clock
//!
//! ## Table of Contents
//! - **Constants**: Tick and calendar geometry
//! - **ClockState**: Persisted tick/calendar state
//! - **TimeSnapshot**: Read-only view handed to broadcasts and queries

use serde::{Deserialize, Serialize};
use std::fmt;

/// Ticks in one in-game day
pub const TICKS_PER_DAY: i64 = 24_000;

/// Ticks added per advance (one real second of in-game time)
pub const TICKS_PER_STEP: i64 = 20;

/// Phase shift applied before day-boundary detection.
///
/// The calendar rolls over when `ticks + DAY_BOUNDARY_OFFSET` is a whole
/// multiple of [`TICKS_PER_DAY`], i.e. at tick 18000 rather than tick 0.
pub const DAY_BOUNDARY_OFFSET: i64 = 6_000;

/// Advances between two day boundaries
pub const STEPS_PER_DAY: i64 = TICKS_PER_DAY / TICKS_PER_STEP;

/// Days in a calendar month
pub const DAYS_PER_MONTH: i64 = 30;

/// Months in a calendar year
pub const MONTHS_PER_YEAR: i64 = 12;

/// Mutable clock state, persisted after every advance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockState {
    /// Sub-day time in `[0, TICKS_PER_DAY)`
    pub ticks: i64,
    /// Elapsed in-game days since epoch
    #[serde(rename = "totalDays")]
    pub total_days: i64,
    /// Calendar year, starting at 1
    pub year: i64,
    /// Calendar month in `[1, 12]`
    pub month: i64,
    /// Calendar day in `[1, 30]`
    pub day: i64,
}

impl Default for ClockState {
    fn default() -> Self {
        Self {
            ticks: 0,
            total_days: 0,
            year: 1,
            month: 1,
            day: 1,
        }
    }
}

impl ClockState {
    /// Whether the current tick sits on a day boundary
    pub fn at_day_boundary(&self) -> bool {
        (self.ticks + DAY_BOUNDARY_OFFSET).rem_euclid(TICKS_PER_DAY) == 0
    }

    /// Advance by one step. Returns `true` if a day boundary was crossed.
    ///
    /// Boundary detection looks at the tick value *before* it is moved, so a
    /// boundary fires exactly once every [`STEPS_PER_DAY`] calls.
    pub fn step(&mut self) -> bool {
        let crossed = self.at_day_boundary();
        self.ticks = (self.ticks + TICKS_PER_STEP).rem_euclid(TICKS_PER_DAY);

        if crossed {
            self.total_days = self.total_days.saturating_add(1);
            self.roll_calendar();
        }

        crossed
    }

    fn roll_calendar(&mut self) {
        self.day += 1;
        if self.day > DAYS_PER_MONTH {
            self.day = 1;
            self.month += 1;
            if self.month > MONTHS_PER_YEAR {
                self.month = 1;
                self.year = self.year.saturating_add(1);
            }
        }
    }

    /// Bring out-of-range values back inside the invariants.
    ///
    /// Ticks are wrapped into the day and rounded down onto the step grid;
    /// an off-grid tick would never land on a day boundary again.
    ///
    /// Returns `true` if anything changed.
    pub fn normalize(&mut self) -> bool {
        let before = *self;
        let ticks = self.ticks.rem_euclid(TICKS_PER_DAY);
        self.ticks = ticks - ticks.rem_euclid(TICKS_PER_STEP);
        self.total_days = self.total_days.max(0);
        self.year = self.year.max(1);
        self.month = self.month.clamp(1, MONTHS_PER_YEAR);
        self.day = self.day.clamp(1, DAYS_PER_MONTH);
        before != *self
    }

    /// Formatted calendar date, e.g. `Day 3, Month 7, Year 2`
    pub fn date_string(&self) -> String {
        format!("Day {}, Month {}, Year {}", self.day, self.month, self.year)
    }

    /// Derive a snapshot of this state
    pub fn snapshot(&self) -> TimeSnapshot {
        TimeSnapshot {
            ticks: self.ticks,
            date: self.date_string(),
            total_days: self.total_days,
            day: self.day,
            month: self.month,
            year: self.year,
        }
    }
}

/// Point-in-time view of the clock
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSnapshot {
    /// Sub-day time
    pub ticks: i64,
    /// Formatted calendar date
    pub date: String,
    /// Elapsed in-game days
    #[serde(rename = "totalDays")]
    pub total_days: i64,
    /// Calendar day
    pub day: i64,
    /// Calendar month
    pub month: i64,
    /// Calendar year
    pub year: i64,
}

impl fmt::Display for TimeSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (tick {})", self.date, self.ticks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(ticks: i64, day: i64, month: i64, year: i64) -> ClockState {
        ClockState {
            ticks,
            total_days: 0,
            year,
            month,
            day,
        }
    }

    #[test]
    fn test_step_without_boundary() {
        let mut s = state(100, 4, 2, 1);
        assert!(!s.step());
        assert_eq!(s.ticks, 120);
        assert_eq!(s.total_days, 0);
        assert_eq!((s.day, s.month, s.year), (4, 2, 1));
    }

    #[test]
    fn test_ticks_wrap_without_boundary() {
        let mut s = state(23_990, 4, 2, 1);
        assert!(!s.step());
        assert_eq!(s.ticks, 10);
        assert_eq!(s.total_days, 0);
        assert_eq!(s.day, 4);
    }

    #[test]
    fn test_boundary_at_18000() {
        let mut s = state(18_000, 1, 1, 1);
        assert!(s.at_day_boundary());
        assert!(s.step());
        assert_eq!(s.ticks, 18_020);
        assert_eq!(s.total_days, 1);
        assert_eq!(s.day, 2);
    }

    #[test]
    fn test_year_rollover() {
        let mut s = state(18_000, 30, 12, 5);
        s.step();
        assert_eq!((s.day, s.month, s.year), (1, 1, 6));
    }

    #[test]
    fn test_month_rollover_keeps_year() {
        let mut s = state(18_000, 30, 5, 1);
        s.step();
        assert_eq!((s.day, s.month, s.year), (1, 6, 1));
    }

    #[test]
    fn test_full_day_cycle() {
        let mut s = ClockState::default();
        let crossings = (0..STEPS_PER_DAY).filter(|_| s.step()).count();
        assert_eq!(crossings, 1);
        assert_eq!(s.ticks, 0);
        assert_eq!(s.total_days, 1);
    }

    #[test]
    fn test_normalize() {
        let mut s = ClockState {
            ticks: -20,
            total_days: -3,
            year: 0,
            month: 13,
            day: 0,
        };
        assert!(s.normalize());
        assert_eq!(s.ticks, 23_980);
        assert_eq!(s.total_days, 0);
        assert_eq!((s.day, s.month, s.year), (1, 12, 1));

        let mut ok = ClockState::default();
        assert!(!ok.normalize());
    }

    #[test]
    fn test_normalize_snaps_ticks_to_step_grid() {
        let mut s = state(24_010, 5, 1, 1);
        assert!(s.normalize());
        assert_eq!(s.ticks, 0);

        let mut s = state(18_015, 5, 1, 1);
        assert!(s.normalize());
        assert_eq!(s.ticks, 18_000);
        assert!(s.at_day_boundary());
    }

    #[test]
    fn test_rollover_saturates_at_max() {
        let mut s = ClockState {
            ticks: 18_000,
            total_days: i64::MAX,
            year: i64::MAX,
            month: 12,
            day: 30,
        };
        assert!(s.step());
        assert_eq!(s.total_days, i64::MAX);
        assert_eq!(s.year, i64::MAX);
        assert_eq!((s.day, s.month), (1, 1));
    }

    #[test]
    fn test_date_string() {
        let s = state(0, 3, 7, 2);
        assert_eq!(s.date_string(), "Day 3, Month 7, Year 2");
        assert_eq!(s.snapshot().date, "Day 3, Month 7, Year 2");
    }
}
