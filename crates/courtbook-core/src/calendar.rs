//! Weekdays, schedule-day labels, and lenient date parsing.
//!
//! The club's historical records label schedule days in Turkish. [`DayNames`]
//! carries the label table for one locale so the rest of the crate can work
//! with [`Weekday`] values and stay locale-free.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

// ─── Weekday ─────────────────────────────────────────────────────────────────

/// Day of the week, Monday-first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weekday {
  Monday,
  Tuesday,
  Wednesday,
  Thursday,
  Friday,
  Saturday,
  Sunday,
}

impl Weekday {
  /// All seven days, Monday-first. Positions match [`Weekday::index`].
  pub const ALL: [Weekday; 7] = [
    Weekday::Monday,
    Weekday::Tuesday,
    Weekday::Wednesday,
    Weekday::Thursday,
    Weekday::Friday,
    Weekday::Saturday,
    Weekday::Sunday,
  ];

  /// The weekday a calendar date falls on.
  pub fn from_date(date: NaiveDate) -> Weekday {
    Self::ALL[date.weekday().num_days_from_monday() as usize]
  }

  /// Monday = 0 .. Sunday = 6.
  pub fn index(self) -> usize {
    self as usize
  }
}

// ─── Day names ───────────────────────────────────────────────────────────────

/// The seven weekday labels of one locale, Monday-first.
///
/// Stored schedule cells hold these labels, so the label table a deployment
/// runs with must match the one its data was written with. Legacy data is
/// Turkish; [`DayNames::turkish`] is the default.
#[derive(Debug, Clone, Copy)]
pub struct DayNames {
  labels: [&'static str; 7],
}

impl DayNames {
  pub fn turkish() -> DayNames {
    DayNames {
      labels: [
        "Pazartesi",
        "Salı",
        "Çarşamba",
        "Perşembe",
        "Cuma",
        "Cumartesi",
        "Pazar",
      ],
    }
  }

  pub fn english() -> DayNames {
    DayNames {
      labels: [
        "Monday",
        "Tuesday",
        "Wednesday",
        "Thursday",
        "Friday",
        "Saturday",
        "Sunday",
      ],
    }
  }

  /// Look up a label table by configuration tag.
  pub fn for_locale(tag: &str) -> Option<DayNames> {
    match tag {
      "turkish" => Some(Self::turkish()),
      "english" => Some(Self::english()),
      _ => None,
    }
  }

  /// The stored label for `day`.
  pub fn label(&self, day: Weekday) -> &'static str {
    self.labels[day.index()]
  }

  /// Parse a stored label back to a [`Weekday`]. Comparison is exact after
  /// trimming; unknown labels yield `None`.
  pub fn parse(&self, token: &str) -> Option<Weekday> {
    let token = token.trim();
    Weekday::ALL
      .iter()
      .copied()
      .find(|day| self.labels[day.index()] == token)
  }
}

impl Default for DayNames {
  fn default() -> DayNames {
    DayNames::turkish()
  }
}

// ─── Weekday set ─────────────────────────────────────────────────────────────

/// A set of weekdays, one bit per day.
///
/// Serialises as a list of lowercase day names. The comma-joined label form
/// used by the record store is the row codec's concern, not this type's.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Weekday>", into = "Vec<Weekday>")]
pub struct WeekdaySet(u8);

impl WeekdaySet {
  pub fn empty() -> WeekdaySet {
    WeekdaySet(0)
  }

  pub fn insert(&mut self, day: Weekday) {
    self.0 |= 1 << day.index();
  }

  pub fn contains(self, day: Weekday) -> bool {
    self.0 & (1 << day.index()) != 0
  }

  pub fn is_empty(self) -> bool {
    self.0 == 0
  }

  pub fn len(self) -> usize {
    self.0.count_ones() as usize
  }

  /// Days in Monday-first order.
  pub fn iter(self) -> impl Iterator<Item = Weekday> {
    Weekday::ALL.into_iter().filter(move |day| self.contains(*day))
  }
}

impl From<Vec<Weekday>> for WeekdaySet {
  fn from(days: Vec<Weekday>) -> WeekdaySet {
    days.into_iter().collect()
  }
}

impl From<WeekdaySet> for Vec<Weekday> {
  fn from(set: WeekdaySet) -> Vec<Weekday> {
    set.iter().collect()
  }
}

impl FromIterator<Weekday> for WeekdaySet {
  fn from_iter<I: IntoIterator<Item = Weekday>>(iter: I) -> WeekdaySet {
    let mut set = WeekdaySet::empty();
    for day in iter {
      set.insert(day);
    }
    set
  }
}

// ─── Dates ───────────────────────────────────────────────────────────────────

/// Parse a stored date cell: ISO `YYYY-MM-DD` first, then `DD.MM.YYYY`.
/// Blank or unrecognised input yields `None`.
pub fn parse_flex_date(s: &str) -> Option<NaiveDate> {
  let s = s.trim();
  if s.is_empty() {
    return None;
  }
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .or_else(|_| NaiveDate::parse_from_str(s, "%d.%m.%Y"))
    .ok()
}

/// Whole years elapsed between `birth` and `today`.
pub fn age_on(birth: NaiveDate, today: NaiveDate) -> i32 {
  let mut years = today.year() - birth.year();
  if (today.month(), today.day()) < (birth.month(), birth.day()) {
    years -= 1;
  }
  years
}

// ─── Tests ───────────────────────────────────────────────────────────────────
