//! Membership records and the derived read model.
//!
//! Activity is never stored. It is recomputed from the end date and the
//! remaining credit balance every time a member is read, so stale status
//! text in the store cannot mislead anything downstream.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::calendar::{self, WeekdaySet};

// ─── Identity ────────────────────────────────────────────────────────────────

/// Member identifier: the Unix timestamp (seconds) taken at enrolment.
///
/// Coarse on purpose. Two enrolments in the same second would collide, which
/// a single-operator club registry never hits in practice.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
  Serialize,
  Deserialize,
)]
#[serde(transparent)]
pub struct MemberId(pub i64);

impl std::fmt::Display for MemberId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

// ─── Enumerations ────────────────────────────────────────────────────────────

/// The kind of lesson package a member is enrolled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LessonType {
  Group,
  Private,
}

impl LessonType {
  /// Credit quantum used when a renewal does not name an amount.
  pub fn renewal_grant(self) -> i64 {
    // Both package kinds currently renew in blocks of eight sessions.
    match self {
      LessonType::Group => 8,
      LessonType::Private => 8,
    }
  }
}

/// How the member pays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
  Cash,
  BankTransfer,
  Card,
}

/// Age bracket. Stored explicitly when known, otherwise inferred on read
/// from the presence of a guardian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
  Adult,
  Junior,
}

// ─── Member ──────────────────────────────────────────────────────────────────

/// One membership row, decoded.
///
/// Date and numeric fields are lenient: blank or unreadable cells decode to
/// `None` / `0` rather than failing the whole row (see the row codec).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
  pub id:                 MemberId,
  pub name:               String,
  pub phone:              String,
  /// Free text, recorded as given.
  pub gender:             String,
  pub birth_date:         Option<NaiveDate>,
  pub enrollment_start:   Option<NaiveDate>,
  pub enrollment_end:     Option<NaiveDate>,
  pub total_credits:      i64,
  pub remaining_credits:  i64,
  pub payment_method:     PaymentMethod,
  pub scheduled_weekdays: WeekdaySet,
  pub lesson_type:        LessonType,
  pub guardian_name:      Option<String>,
  /// Display text only. Activity is derived, never trusted from here.
  pub status:             String,
  pub category:           Option<Category>,
}

impl Member {
  /// A member is active iff the end date has not passed and credits remain.
  /// A missing end date derives inactive.
  pub fn is_active_on(&self, today: NaiveDate) -> bool {
    matches!(self.enrollment_end, Some(end) if end >= today)
      && self.remaining_credits > 0
  }

  /// Explicit category when stored; otherwise juniors are recognised by the
  /// presence of a guardian.
  pub fn resolved_category(&self) -> Category {
    if let Some(category) = self.category {
      return category;
    }
    if self.guardian_name.is_some() {
      Category::Junior
    } else {
      Category::Adult
    }
  }

  /// Whole years of age as of `today`, when a birth date is on file.
  pub fn age_on(&self, today: NaiveDate) -> Option<i32> {
    self.birth_date.map(|birth| calendar::age_on(birth, today))
  }
}

// ─── Payloads ────────────────────────────────────────────────────────────────

/// Input to [`ops::create_member`](crate::ops::create_member). The id and
/// the status text are assigned by the operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMember {
  pub name:               String,
  #[serde(default)]
  pub phone:              String,
  #[serde(default)]
  pub gender:             String,
  #[serde(default)]
  pub birth_date:         Option<NaiveDate>,
  #[serde(default)]
  pub enrollment_start:   Option<NaiveDate>,
  #[serde(default)]
  pub enrollment_end:     Option<NaiveDate>,
  pub initial_credits:    i64,
  pub payment_method:     PaymentMethod,
  #[serde(default)]
  pub scheduled_weekdays: WeekdaySet,
  pub lesson_type:        LessonType,
  #[serde(default)]
  pub guardian_name:      Option<String>,
  #[serde(default)]
  pub category:           Option<Category>,
}

/// Partial update; `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemberUpdate {
  pub name:              Option<String>,
  pub phone:             Option<String>,
  pub birth_date:        Option<NaiveDate>,
  pub lesson_type:       Option<LessonType>,
  pub total_credits:     Option<i64>,
  pub remaining_credits: Option<i64>,
  pub guardian_name:     Option<String>,
  pub category:          Option<Category>,
}

// ─── Derived read model ──────────────────────────────────────────────────────

/// The computed view of a member, relative to a date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberView {
  pub member:   Member,
  /// The date the derived fields were computed against.
  pub as_of:    NaiveDate,
  pub active:   bool,
  pub age:      Option<i32>,
  pub category: Category,
}

impl MemberView {
  pub fn derive(member: Member, today: NaiveDate) -> MemberView {
    let active = member.is_active_on(today);
    let age = member.age_on(today);
    let category = member.resolved_category();
    MemberView { member, as_of: today, active, age, category }
  }
}

// ─── Alerts ──────────────────────────────────────────────────────────────────

/// Window, in days, for the expiring and recently-ended alert lists.
pub const ALERT_WINDOW_DAYS: i64 = 7;

/// Remaining-credit level at or below which an active member counts as
/// expiring.
pub const LOW_CREDIT_THRESHOLD: i64 = 2;

/// Active members about to run out: end date within [`ALERT_WINDOW_DAYS`]
/// of `today`, or credits at or below [`LOW_CREDIT_THRESHOLD`].
pub fn expiring_soon(members: &[Member], today: NaiveDate) -> Vec<Member> {
  members
    .iter()
    .filter(|member| member.is_active_on(today))
    .filter(|member| {
      let ends_soon = matches!(
        member.enrollment_end,
        Some(end) if (end - today).num_days() <= ALERT_WINDOW_DAYS
      );
      ends_soon || member.remaining_credits <= LOW_CREDIT_THRESHOLD
    })
    .cloned()
    .collect()
}

/// Members no longer active whose end date fell within the last
/// [`ALERT_WINDOW_DAYS`], or whose credits are exhausted.
pub fn recently_ended(members: &[Member], today: NaiveDate) -> Vec<Member> {
  members
    .iter()
    .filter(|member| !member.is_active_on(today))
    .filter(|member| {
      let ended_recently = matches!(
        member.enrollment_end,
        Some(end) if end < today && (today - end).num_days() <= ALERT_WINDOW_DAYS
      );
      ended_recently || member.remaining_credits <= 0
    })
    .cloned()
    .collect()
}

// ─── Tests ───────────────────────────────────────────────────────────────────
