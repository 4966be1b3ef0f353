//! Row codec: between typed domain values and the string cells of the
//! record store.
//!
//! Decoding is lenient where historical data is dirty (blank dates,
//! free-text numbers) and strict where a wrong value would corrupt
//! semantics (ids, enum vocabulary). Every lenient fallback is logged.
//!
//! Table and column names are the historical Turkish sheet names; the data
//! predates this system and is kept addressable as-is.

use chrono::NaiveDate;
use tracing::warn;

use crate::{
  admin::Admin,
  calendar::{self, DayNames, WeekdaySet},
  error::{Error, Result},
  ledger::LedgerEntry,
  member::{Category, LessonType, Member, MemberId, PaymentMethod},
  store::Record,
};

// ─── Tables ──────────────────────────────────────────────────────────────────

/// Membership table.
pub const MEMBERS_TABLE: &str = "uyelikler";
/// Administrator table.
pub const ADMINS_TABLE: &str = "yoneticiler";
/// Attendance ledger table.
pub const LEDGER_TABLE: &str = "ders_gecmisi";

/// Membership columns in stored order. Cell updates address these 1-indexed.
pub const MEMBER_COLUMNS: [&str; 15] = [
  "id",
  "name",
  "phone",
  "gender",
  "birth_date",
  "enrollment_start",
  "enrollment_end",
  "total_credits",
  "remaining_credits",
  "payment_method",
  "scheduled_weekdays",
  "lesson_type",
  "guardian_name",
  "status",
  "category",
];

pub const ADMIN_COLUMNS: [&str; 2] = ["username", "password"];

pub const LEDGER_COLUMNS: [&str; 3] = ["member_id", "date", "source_tag"];

/// 1-indexed cell positions used by single-cell updates.
pub mod col {
  pub const NAME: usize = 2;
  pub const PHONE: usize = 3;
  pub const BIRTH_DATE: usize = 5;
  pub const ENROLLMENT_START: usize = 6;
  pub const ENROLLMENT_END: usize = 7;
  pub const TOTAL_CREDITS: usize = 8;
  pub const REMAINING_CREDITS: usize = 9;
  pub const LESSON_TYPE: usize = 12;
  pub const GUARDIAN_NAME: usize = 13;
  pub const CATEGORY: usize = 15;

  pub const ADMIN_PASSWORD: usize = 2;
}

// ─── Enum labels ─────────────────────────────────────────────────────────────

pub fn encode_lesson_type(lesson_type: LessonType) -> &'static str {
  match lesson_type {
    LessonType::Group => "group",
    LessonType::Private => "private",
  }
}

pub fn decode_lesson_type(cell: &str) -> Option<LessonType> {
  match cell.trim() {
    "group" => Some(LessonType::Group),
    "private" => Some(LessonType::Private),
    _ => None,
  }
}

pub fn encode_payment_method(method: PaymentMethod) -> &'static str {
  match method {
    PaymentMethod::Cash => "cash",
    PaymentMethod::BankTransfer => "bank_transfer",
    PaymentMethod::Card => "card",
  }
}

pub fn decode_payment_method(cell: &str) -> Option<PaymentMethod> {
  match cell.trim() {
    "cash" => Some(PaymentMethod::Cash),
    "bank_transfer" => Some(PaymentMethod::BankTransfer),
    "card" => Some(PaymentMethod::Card),
    _ => None,
  }
}

pub fn encode_category(category: Category) -> &'static str {
  match category {
    Category::Adult => "adult",
    Category::Junior => "junior",
  }
}

pub fn decode_category(cell: &str) -> Option<Category> {
  match cell.trim() {
    "adult" => Some(Category::Adult),
    "junior" => Some(Category::Junior),
    _ => None,
  }
}

// ─── Cell helpers ────────────────────────────────────────────────────────────

/// ISO date text, or `""` for `None`. Reads accept the dotted legacy format
/// too, but every write is ISO.
pub fn encode_date(date: Option<NaiveDate>) -> String {
  date.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default()
}

fn decode_date(cell: &str, column: &str, id: MemberId) -> Option<NaiveDate> {
  let trimmed = cell.trim();
  if trimmed.is_empty() {
    return None;
  }
  let parsed = calendar::parse_flex_date(trimmed);
  if parsed.is_none() {
    warn!(
      member = %id,
      column,
      value = trimmed,
      "unparseable date cell, treating as absent"
    );
  }
  parsed
}

fn decode_credits(cell: &str, column: &str, id: MemberId) -> i64 {
  let trimmed = cell.trim();
  if trimmed.is_empty() {
    return 0;
  }
  match trimmed.parse::<i64>() {
    Ok(n) => n,
    Err(_) => {
      warn!(
        member = %id,
        column,
        value = trimmed,
        "unparseable credit cell, treating as 0"
      );
      0
    }
  }
}

fn decode_weekdays(cell: &str, names: DayNames, id: MemberId) -> WeekdaySet {
  let mut set = WeekdaySet::empty();
  for token in cell.split(',') {
    let token = token.trim();
    if token.is_empty() {
      continue;
    }
    match names.parse(token) {
      Some(day) => set.insert(day),
      None => {
        warn!(member = %id, token, "unknown schedule day label, ignoring")
      }
    }
  }
  set
}

/// Comma-joined schedule labels in Monday-first order.
pub fn encode_weekdays(set: WeekdaySet, names: DayNames) -> String {
  set.iter().map(|day| names.label(day)).collect::<Vec<_>>().join(",")
}

// ─── Members ─────────────────────────────────────────────────────────────────

/// Decode one membership row.
///
/// Dirty-but-usable cells degrade with a warning. A row without a readable
/// id, or with an unknown lesson-type or payment-method label, is rejected
/// whole.
pub fn decode_member(record: &Record, names: DayNames) -> Result<Member> {
  let id_cell = record.cell("id");
  let id = id_cell.trim().parse::<i64>().map(MemberId).map_err(|_| {
    Error::UnreadableRow {
      table:  MEMBERS_TABLE,
      detail: format!("id {id_cell:?} is not an integer"),
    }
  })?;

  let lesson_cell = record.cell("lesson_type");
  let lesson_type =
    decode_lesson_type(lesson_cell).ok_or_else(|| Error::UnreadableRow {
      table:  MEMBERS_TABLE,
      detail: format!("unknown lesson type {lesson_cell:?}"),
    })?;

  let payment_cell = record.cell("payment_method");
  let payment_method =
    decode_payment_method(payment_cell).ok_or_else(|| Error::UnreadableRow {
      table:  MEMBERS_TABLE,
      detail: format!("unknown payment method {payment_cell:?}"),
    })?;

  let category_cell = record.cell("category").trim();
  let category = decode_category(category_cell);
  if category.is_none() && !category_cell.is_empty() {
    warn!(member = %id, value = category_cell, "unknown category, ignoring");
  }

  let guardian = record.cell("guardian_name").trim();

  Ok(Member {
    id,
    name: record.cell("name").trim().to_string(),
    phone: record.cell("phone").trim().to_string(),
    gender: record.cell("gender").trim().to_string(),
    birth_date: decode_date(record.cell("birth_date"), "birth_date", id),
    enrollment_start: decode_date(
      record.cell("enrollment_start"),
      "enrollment_start",
      id,
    ),
    enrollment_end: decode_date(
      record.cell("enrollment_end"),
      "enrollment_end",
      id,
    ),
    total_credits: decode_credits(
      record.cell("total_credits"),
      "total_credits",
      id,
    ),
    remaining_credits: decode_credits(
      record.cell("remaining_credits"),
      "remaining_credits",
      id,
    ),
    payment_method,
    scheduled_weekdays: decode_weekdays(
      record.cell("scheduled_weekdays"),
      names,
      id,
    ),
    lesson_type,
    guardian_name: (!guardian.is_empty()).then(|| guardian.to_string()),
    status: record.cell("status").trim().to_string(),
    category,
  })
}

/// The full 15-cell row for `member`, in stored column order.
pub fn encode_member_row(member: &Member, names: DayNames) -> Vec<String> {
  vec![
    member.id.to_string(),
    member.name.clone(),
    member.phone.clone(),
    member.gender.clone(),
    encode_date(member.birth_date),
    encode_date(member.enrollment_start),
    encode_date(member.enrollment_end),
    member.total_credits.to_string(),
    member.remaining_credits.to_string(),
    encode_payment_method(member.payment_method).to_string(),
    encode_weekdays(member.scheduled_weekdays, names),
    encode_lesson_type(member.lesson_type).to_string(),
    member.guardian_name.clone().unwrap_or_default(),
    member.status.clone(),
    member.category.map(encode_category).unwrap_or("").to_string(),
  ]
}

// ─── Admins ──────────────────────────────────────────────────────────────────

/// The password cell holds an argon2 PHC string, never plaintext.
pub fn decode_admin(record: &Record) -> Result<Admin> {
  let username = record.cell("username").trim().to_string();
  if username.is_empty() {
    return Err(Error::UnreadableRow {
      table:  ADMINS_TABLE,
      detail: "blank username".to_string(),
    });
  }
  Ok(Admin {
    username,
    password_hash: record.cell("password").to_string(),
  })
}

pub fn encode_admin_row(admin: &Admin) -> Vec<String> {
  vec![admin.username.clone(), admin.password_hash.clone()]
}

// ─── Ledger ──────────────────────────────────────────────────────────────────

pub fn decode_ledger_entry(record: &Record) -> Result<LedgerEntry> {
  let id_cell = record.cell("member_id");
  let member_id =
    id_cell.trim().parse::<i64>().map(MemberId).map_err(|_| {
      Error::UnreadableRow {
        table:  LEDGER_TABLE,
        detail: format!("member_id {id_cell:?} is not an integer"),
      }
    })?;

  let date_cell = record.cell("date");
  let date = calendar::parse_flex_date(date_cell).ok_or_else(|| {
    Error::UnreadableRow {
      table:  LEDGER_TABLE,
      detail: format!("date {date_cell:?} is not a date"),
    }
  })?;

  Ok(LedgerEntry {
    member_id,
    date,
    source: record.cell("source_tag").to_string(),
  })
}

/// Decode ledger rows, dropping unreadable ones with a warning. An
/// unreadable ledger row cannot match any idempotence key, so dropping it
/// is the only consistent reading.
pub fn decode_ledger_rows(records: &[Record]) -> Vec<LedgerEntry> {
  let mut entries = Vec::with_capacity(records.len());
  for record in records {
    match decode_ledger_entry(record) {
      Ok(entry) => entries.push(entry),
      Err(err) => warn!(error = %err, "skipping unreadable ledger row"),
    }
  }
  entries
}

pub fn encode_ledger_row(entry: &LedgerEntry) -> Vec<String> {
  vec![
    entry.member_id.to_string(),
    entry.date.format("%Y-%m-%d").to_string(),
    entry.source.clone(),
  ]
}

// ─── Tests ───────────────────────────────────────────────────────────────────
