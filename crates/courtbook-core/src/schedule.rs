//! Scheduled-occurrence enumeration.

use chrono::NaiveDate;

use crate::calendar::{Weekday, WeekdaySet};

/// Every date in `start..=today` that falls on one of `days`, ascending.
///
/// Empty when `days` is empty or `start` is in the future. Recomputed from
/// scratch on every call; the walk is linear in elapsed days, which is fine
/// for a periodic batch pass.
pub fn occurrences(
  start: NaiveDate,
  days: WeekdaySet,
  today: NaiveDate,
) -> Vec<NaiveDate> {
  if days.is_empty() || start > today {
    return Vec::new();
  }
  start
    .iter_days()
    .take_while(|date| *date <= today)
    .filter(|date| days.contains(Weekday::from_date(*date)))
    .collect()
}
