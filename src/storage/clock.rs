//! Source of the current UTC calendar day.

use std::fmt;
use std::sync::atomic::{AtomicI32, Ordering};

use chrono::{Datelike, NaiveDate, Utc};

/// Provides today's date in UTC for quota rollover.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Returns the current calendar day in UTC.
    fn today(&self) -> NaiveDate;
}

/// Wall-clock UTC date.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Utc::now().date_naive()
    }
}

/// A clock pinned to a date that can be moved manually.
#[derive(Debug)]
pub struct FixedClock {
    days_from_ce: AtomicI32,
}

impl FixedClock {
    /// Creates a clock that reports `date` until changed.
    #[must_use]
    pub fn new(date: NaiveDate) -> Self {
        Self {
            days_from_ce: AtomicI32::new(date.num_days_from_ce()),
        }
    }

    /// Moves the clock to `date`.
    pub fn set(&self, date: NaiveDate) {
        self.days_from_ce
            .store(date.num_days_from_ce(), Ordering::SeqCst);
    }

    /// Moves the clock forward by `days`.
    pub fn advance_days(&self, days: i32) {
        self.days_from_ce.fetch_add(days, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        NaiveDate::from_num_days_from_ce_opt(self.days_from_ce.load(Ordering::SeqCst))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock_advances() {
        let start = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
        let clock = FixedClock::new(start);
        assert_eq!(clock.today(), start);

        clock.advance_days(1);
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());

        clock.set(start);
        assert_eq!(clock.today(), start);
    }
}
