//! Membership CRUD and credit operations.
//!
//! Thin, single-row writes over the record store. Mutations addressed at an
//! id that matches no row are a typed no-op ([`Mutation::NotFound`]) rather
//! than an error; the HTTP layer turns that into a 404.

use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
  calendar::DayNames,
  codec,
  ledger::LedgerEntry,
  member::{Member, MemberId, MemberUpdate, NewMember},
  store::{RecordStore, RowHandle, StoreError},
};

/// Membership extension used when a renewal gives no explicit end date.
pub const RENEWAL_PERIOD_DAYS: i64 = 30;

// ─── Results ─────────────────────────────────────────────────────────────────

/// Result of a mutation addressed at a single row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation<T = ()> {
  Applied(T),
  /// The key matched no row; nothing was written.
  NotFound,
}

impl<T> Mutation<T> {
  pub fn is_applied(&self) -> bool {
    matches!(self, Mutation::Applied(_))
  }
}

/// A decoded membership row and where it lives.
#[derive(Debug, Clone)]
pub struct MemberRow {
  pub handle: RowHandle,
  pub member: Member,
}

/// Every decoded membership row, plus the count of rows that would not
/// decode.
#[derive(Debug, Clone)]
pub struct MemberTable {
  pub members:         Vec<MemberRow>,
  pub unreadable_rows: usize,
}

/// The write a renewal performed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Renewal {
  pub enrollment_start:  NaiveDate,
  pub enrollment_end:    NaiveDate,
  /// Overwritten with just this renewal's grant. The column stops tracking
  /// lifetime credits after the first renewal; long-standing behaviour,
  /// kept as-is.
  pub total_credits:     i64,
  /// Previous balance plus the grant.
  pub remaining_credits: i64,
}

// ─── Reads ───────────────────────────────────────────────────────────────────

/// Read and decode every membership row, in stored order.
///
/// Rows that do not decode are logged and counted, never fatal.
pub async fn load_members(
  store: &impl RecordStore,
  names: DayNames,
) -> Result<MemberTable, StoreError> {
  let records = store.read_all(codec::MEMBERS_TABLE).await?;
  let mut table = MemberTable {
    members:         Vec::with_capacity(records.len()),
    unreadable_rows: 0,
  };
  for record in records {
    match codec::decode_member(&record, names) {
      Ok(member) => {
        table.members.push(MemberRow { handle: record.handle, member })
      }
      Err(err) => {
        warn!(error = %err, "skipping membership row");
        table.unreadable_rows += 1;
      }
    }
  }
  Ok(table)
}

/// One member by id, or `None`.
pub async fn get_member(
  store: &impl RecordStore,
  id: MemberId,
  names: DayNames,
) -> Result<Option<Member>, StoreError> {
  let table = load_members(store, names).await?;
  Ok(table.members.into_iter().map(|row| row.member).find(|m| m.id == id))
}

/// Every ledger entry, oldest first. A store without the ledger table yet
/// reads as empty; reads never create it.
pub async fn load_ledger(
  store: &impl RecordStore,
) -> Result<Vec<LedgerEntry>, StoreError> {
  let records = match store.read_all(codec::LEDGER_TABLE).await {
    Ok(records) => records,
    Err(StoreError::TableMissing(_)) => return Ok(Vec::new()),
    Err(err) => return Err(err),
  };
  Ok(codec::decode_ledger_rows(&records))
}

// ─── Writes ──────────────────────────────────────────────────────────────────

/// Create a membership row.
///
/// The id is the enrolment's Unix timestamp, the status text starts as
/// `"active"`, and the initial grant fills both credit columns.
pub async fn create_member(
  store: &impl RecordStore,
  input: NewMember,
  names: DayNames,
) -> Result<Member, StoreError> {
  let member = Member {
    id:                 MemberId(Utc::now().timestamp()),
    name:               input.name,
    phone:              input.phone,
    gender:             input.gender,
    birth_date:         input.birth_date,
    enrollment_start:   input.enrollment_start,
    enrollment_end:     input.enrollment_end,
    total_credits:      input.initial_credits,
    remaining_credits:  input.initial_credits,
    payment_method:     input.payment_method,
    scheduled_weekdays: input.scheduled_weekdays,
    lesson_type:        input.lesson_type,
    guardian_name:      input.guardian_name,
    status:             "active".to_string(),
    category:           input.category,
  };
  store
    .append_row(codec::MEMBERS_TABLE, codec::encode_member_row(&member, names))
    .await?;
  info!(member = %member.id, name = %member.name, "member created");
  Ok(member)
}

/// Apply the present fields of `update` to the member's row, cell by cell.
pub async fn update_member(
  store: &impl RecordStore,
  id: MemberId,
  update: MemberUpdate,
) -> Result<Mutation, StoreError> {
  let Some(handle) =
    store.find_row(codec::MEMBERS_TABLE, &id.to_string()).await?
  else {
    return Ok(Mutation::NotFound);
  };

  if let Some(name) = update.name {
    store.update_cell(&handle, codec::col::NAME, name).await?;
  }
  if let Some(phone) = update.phone {
    store.update_cell(&handle, codec::col::PHONE, phone).await?;
  }
  if let Some(birth) = update.birth_date {
    store
      .update_cell(&handle, codec::col::BIRTH_DATE, codec::encode_date(Some(birth)))
      .await?;
  }
  if let Some(lesson) = update.lesson_type {
    store
      .update_cell(
        &handle,
        codec::col::LESSON_TYPE,
        codec::encode_lesson_type(lesson).to_string(),
      )
      .await?;
  }
  if let Some(total) = update.total_credits {
    store
      .update_cell(&handle, codec::col::TOTAL_CREDITS, total.to_string())
      .await?;
  }
  if let Some(remaining) = update.remaining_credits {
    store
      .update_cell(&handle, codec::col::REMAINING_CREDITS, remaining.to_string())
      .await?;
  }
  if let Some(guardian) = update.guardian_name {
    store.update_cell(&handle, codec::col::GUARDIAN_NAME, guardian).await?;
  }
  if let Some(category) = update.category {
    store
      .update_cell(
        &handle,
        codec::col::CATEGORY,
        codec::encode_category(category).to_string(),
      )
      .await?;
  }

  info!(member = %id, "member updated");
  Ok(Mutation::Applied(()))
}

/// Remove the member's row entirely. The attendance history stays; ledger
/// rows are never deleted.
pub async fn delete_member(
  store: &impl RecordStore,
  id: MemberId,
) -> Result<Mutation, StoreError> {
  let Some(handle) =
    store.find_row(codec::MEMBERS_TABLE, &id.to_string()).await?
  else {
    return Ok(Mutation::NotFound);
  };
  store.delete_row(&handle).await?;
  info!(member = %id, "member deleted");
  Ok(Mutation::Applied(()))
}

/// Add `delta` (possibly negative) to the remaining balance, floored at
/// zero. Returns the new balance.
pub async fn adjust_credits(
  store: &impl RecordStore,
  id: MemberId,
  delta: i64,
) -> Result<Mutation<i64>, StoreError> {
  let Some(handle) =
    store.find_row(codec::MEMBERS_TABLE, &id.to_string()).await?
  else {
    return Ok(Mutation::NotFound);
  };

  let current = read_remaining(store, &handle).await?;
  let updated = (current + delta).max(0);
  store
    .update_cell(&handle, codec::col::REMAINING_CREDITS, updated.to_string())
    .await?;
  info!(member = %id, delta, remaining = updated, "credits adjusted");
  Ok(Mutation::Applied(updated))
}

/// Renew a membership as of `today`: start becomes `today`, end becomes
/// `until` (default `today` + [`RENEWAL_PERIOD_DAYS`]), the total column is
/// overwritten with `grant`, and the remaining balance grows by `grant`.
pub async fn renew_membership(
  store: &impl RecordStore,
  id: MemberId,
  grant: i64,
  until: Option<NaiveDate>,
  today: NaiveDate,
) -> Result<Mutation<Renewal>, StoreError> {
  let Some(handle) =
    store.find_row(codec::MEMBERS_TABLE, &id.to_string()).await?
  else {
    return Ok(Mutation::NotFound);
  };

  let current = read_remaining(store, &handle).await?;
  let renewal = Renewal {
    enrollment_start:  today,
    enrollment_end:    until
      .unwrap_or(today + Duration::days(RENEWAL_PERIOD_DAYS)),
    total_credits:     grant,
    remaining_credits: current + grant,
  };

  store
    .update_cell(
      &handle,
      codec::col::ENROLLMENT_START,
      codec::encode_date(Some(renewal.enrollment_start)),
    )
    .await?;
  store
    .update_cell(
      &handle,
      codec::col::ENROLLMENT_END,
      codec::encode_date(Some(renewal.enrollment_end)),
    )
    .await?;
  store
    .update_cell(
      &handle,
      codec::col::TOTAL_CREDITS,
      renewal.total_credits.to_string(),
    )
    .await?;
  store
    .update_cell(
      &handle,
      codec::col::REMAINING_CREDITS,
      renewal.remaining_credits.to_string(),
    )
    .await?;

  info!(
    member = %id,
    grant,
    remaining = renewal.remaining_credits,
    until = %renewal.enrollment_end,
    "membership renewed"
  );
  Ok(Mutation::Applied(renewal))
}

/// The remaining balance straight from the cell; dirty values read as 0.
async fn read_remaining(
  store: &impl RecordStore,
  handle: &RowHandle,
) -> Result<i64, StoreError> {
  let cell = store.read_cell(handle, codec::col::REMAINING_CREDITS).await?;
  let trimmed = cell.trim();
  Ok(match trimmed.parse::<i64>() {
    Ok(n) => n,
    Err(_) => {
      if !trimmed.is_empty() {
        warn!(value = trimmed, "unparseable remaining-credit cell, using 0");
      }
      0
    }
  })
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    calendar::Weekday,
    member::{LessonType, PaymentMethod},
    memory::MemStore,
  };

  fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
  }

  async fn store() -> MemStore {
    let store = MemStore::new();
    store
      .create_table(codec::MEMBERS_TABLE, &codec::MEMBER_COLUMNS)
      .await
      .unwrap();
    store
  }

  fn new_member(name: &str) -> NewMember {
    NewMember {
      name:               name.to_string(),
      phone:              "0500".to_string(),
      gender:             String::new(),
      birth_date:         None,
      enrollment_start:   Some(date(2024, 1, 1)),
      enrollment_end:     Some(date(2024, 2, 1)),
      initial_credits:    8,
      payment_method:     PaymentMethod::Card,
      scheduled_weekdays: [Weekday::Monday].into_iter().collect(),
      lesson_type:        LessonType::Group,
      guardian_name:      None,
      category:           None,
    }
  }

  #[tokio::test]
  async fn create_fills_both_credit_columns() {
    let store = store().await;
    let member =
      create_member(&store, new_member("Ayşe"), DayNames::turkish())
        .await
        .unwrap();
    assert_eq!(member.total_credits, 8);
    assert_eq!(member.remaining_credits, 8);
    assert_eq!(member.status, "active");

    let table = load_members(&store, DayNames::turkish()).await.unwrap();
    assert_eq!(table.members.len(), 1);
    assert_eq!(table.members[0].member, member);
  }

  #[tokio::test]
  async fn get_member_by_id() {
    let store = store().await;
    let created =
      create_member(&store, new_member("Ayşe"), DayNames::turkish())
        .await
        .unwrap();

    let found = get_member(&store, created.id, DayNames::turkish())
      .await
      .unwrap()
      .unwrap();
    assert_eq!(found.name, "Ayşe");
    assert!(
      get_member(&store, MemberId(1), DayNames::turkish())
        .await
        .unwrap()
        .is_none()
    );
  }

  #[tokio::test]
  async fn update_touches_only_named_cells() {
    let store = store().await;
    let names = DayNames::turkish();
    let created = create_member(&store, new_member("Ayşe"), names)
      .await
      .unwrap();

    let outcome = update_member(&store, created.id, MemberUpdate {
      name: Some("Ayşe Yılmaz".to_string()),
      remaining_credits: Some(3),
      guardian_name: Some("Fatma".to_string()),
      ..MemberUpdate::default()
    })
    .await
    .unwrap();
    assert!(outcome.is_applied());

    let member =
      get_member(&store, created.id, names).await.unwrap().unwrap();
    assert_eq!(member.name, "Ayşe Yılmaz");
    assert_eq!(member.remaining_credits, 3);
    assert_eq!(member.guardian_name.as_deref(), Some("Fatma"));
    // Untouched cells keep their values.
    assert_eq!(member.phone, "0500");
    assert_eq!(member.total_credits, 8);
    assert_eq!(member.enrollment_start, Some(date(2024, 1, 1)));
  }

  #[tokio::test]
  async fn mutations_on_unknown_ids_are_noops() {
    let store = store().await;
    let ghost = MemberId(404);

    let update =
      update_member(&store, ghost, MemberUpdate::default()).await.unwrap();
    assert_eq!(update, Mutation::NotFound);
    assert_eq!(delete_member(&store, ghost).await.unwrap(), Mutation::NotFound);
    assert_eq!(
      adjust_credits(&store, ghost, 1).await.unwrap(),
      Mutation::NotFound
    );
    assert_eq!(
      renew_membership(&store, ghost, 8, None, date(2024, 1, 1))
        .await
        .unwrap(),
      Mutation::NotFound
    );
  }

  #[tokio::test]
  async fn delete_removes_the_row() {
    let store = store().await;
    let names = DayNames::turkish();
    let created = create_member(&store, new_member("Ayşe"), names)
      .await
      .unwrap();

    assert!(delete_member(&store, created.id).await.unwrap().is_applied());
    assert!(get_member(&store, created.id, names).await.unwrap().is_none());
  }

  #[tokio::test]
  async fn adjust_floors_at_zero() {
    let store = store().await;
    let names = DayNames::turkish();
    let created = create_member(&store, new_member("Ayşe"), names)
      .await
      .unwrap();

    assert_eq!(
      adjust_credits(&store, created.id, -3).await.unwrap(),
      Mutation::Applied(5)
    );
    assert_eq!(
      adjust_credits(&store, created.id, -100).await.unwrap(),
      Mutation::Applied(0)
    );
    assert_eq!(
      adjust_credits(&store, created.id, 2).await.unwrap(),
      Mutation::Applied(2)
    );
  }

  #[tokio::test]
  async fn renewal_adds_to_remaining_but_overwrites_total() {
    let store = store().await;
    let names = DayNames::turkish();
    let created = create_member(&store, new_member("Ayşe"), names)
      .await
      .unwrap();

    // Run the balance down to 1 of 8.
    adjust_credits(&store, created.id, -7).await.unwrap();

    let today = date(2024, 3, 1);
    let Mutation::Applied(renewal) =
      renew_membership(&store, created.id, 8, None, today).await.unwrap()
    else {
      panic!("member exists");
    };

    assert_eq!(renewal.remaining_credits, 9);
    assert_eq!(renewal.total_credits, 8);
    assert_eq!(renewal.enrollment_start, today);
    assert_eq!(renewal.enrollment_end, date(2024, 3, 31));

    let member =
      get_member(&store, created.id, names).await.unwrap().unwrap();
    assert_eq!(member.remaining_credits, 9);
    assert_eq!(member.total_credits, 8);
    assert_eq!(member.enrollment_start, Some(today));
    assert_eq!(member.enrollment_end, Some(date(2024, 3, 31)));
  }

  #[tokio::test]
  async fn renewal_honours_an_explicit_end_date() {
    let store = store().await;
    let names = DayNames::turkish();
    let created = create_member(&store, new_member("Ayşe"), names)
      .await
      .unwrap();

    let until = date(2024, 6, 30);
    let Mutation::Applied(renewal) =
      renew_membership(&store, created.id, 4, Some(until), date(2024, 3, 1))
        .await
        .unwrap()
    else {
      panic!("member exists");
    };
    assert_eq!(renewal.enrollment_end, until);
  }

  #[tokio::test]
  async fn unreadable_rows_are_counted_not_fatal() {
    let store = store().await;
    let names = DayNames::turkish();
    create_member(&store, new_member("Ayşe"), names).await.unwrap();

    let mut junk = vec![String::new(); codec::MEMBER_COLUMNS.len()];
    junk[0] = "not-an-id".to_string();
    store.append_row(codec::MEMBERS_TABLE, junk).await.unwrap();

    let table = load_members(&store, names).await.unwrap();
    assert_eq!(table.members.len(), 1);
    assert_eq!(table.unreadable_rows, 1);
  }

  #[tokio::test]
  async fn ledger_reads_empty_before_first_reconciliation() {
    let store = store().await;
    assert!(load_ledger(&store).await.unwrap().is_empty());
  }
}
