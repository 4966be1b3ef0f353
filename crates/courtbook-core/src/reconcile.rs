//! The attendance reconciliation engine.
//!
//! One batch pass over the membership table: for every member holding a
//! positive balance, every scheduled date between enrollment start and
//! today that is not already in the ledger gets one appended ledger row,
//! then the member's balance is rewritten once, floored at zero. A second
//! pass over the same horizon changes nothing.
//!
//! The enrollment *end* date is deliberately not consulted here; elapsed
//! scheduled dates are debited even when the membership has lapsed, and the
//! ledger may grow past the credit balance. Activity is derived at read
//! time instead.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
  calendar::DayNames,
  codec,
  ledger::{LedgerEntry, LedgerIndex},
  member::{Member, MemberId},
  ops, schedule,
  store::{RecordStore, StoreError},
};

// ─── Report ──────────────────────────────────────────────────────────────────

/// Why a member was left untouched by a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
  /// Zero or negative balance. Such members are never scanned, so their
  /// missed dates are not even enumerated.
  NoRemainingCredits,
  /// Blank or unparseable enrollment start date.
  StartDateMissing,
  /// No scheduled weekdays on file.
  NoScheduledDays,
}

impl SkipReason {
  /// Short operator-facing description.
  pub fn describe(self) -> &'static str {
    match self {
      SkipReason::NoRemainingCredits => "no remaining credits",
      SkipReason::StartDateMissing => "missing start date",
      SkipReason::NoScheduledDays => "no scheduled days",
    }
  }
}

/// Per-member outcome of one pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
  /// New occurrences were debited and the balance rewritten.
  Debited {
    occurrences:      usize,
    remaining_before: i64,
    remaining_after:  i64,
  },
  /// Scanned, but every elapsed occurrence was already in the ledger.
  UpToDate,
  Skipped { reason: SkipReason },
}

/// One member's line in the [`ReconcileReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberOutcome {
  pub member_id: MemberId,
  pub name:      String,
  #[serde(flatten)]
  pub outcome:   Outcome,
}

impl MemberOutcome {
  fn of(member: &Member, outcome: Outcome) -> MemberOutcome {
    MemberOutcome {
      member_id: member.id,
      name: member.name.clone(),
      outcome,
    }
  }
}

/// What one reconciliation pass did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
  /// The horizon the pass ran against.
  pub today:           NaiveDate,
  pub members:         Vec<MemberOutcome>,
  /// Ledger rows appended by this pass.
  pub new_entries:     usize,
  /// Membership rows that would not decode (logged, skipped, not fatal).
  pub unreadable_rows: usize,
  /// Whether the ledger table had to be created first.
  pub ledger_created:  bool,
}

impl ReconcileReport {
  pub fn debited_members(&self) -> usize {
    self
      .members
      .iter()
      .filter(|line| matches!(line.outcome, Outcome::Debited { .. }))
      .count()
  }
}

// ─── Engine ──────────────────────────────────────────────────────────────────

/// Run one reconciliation pass against `store`, dated `today`.
///
/// Writes are row-by-row and durable as they happen; a store failure aborts
/// the pass and leaves earlier members' writes in place, where the next
/// pass picks up behind them. Assumes it is the only pass running; two
/// concurrent passes could append the same date twice.
pub async fn run(
  store: &impl RecordStore,
  today: NaiveDate,
  day_names: DayNames,
) -> Result<ReconcileReport, StoreError> {
  let loaded = ops::load_members(store, day_names).await?;
  let (history, ledger_created) = load_or_create_ledger(store).await?;
  let mut index = LedgerIndex::from_entries(&history);

  let mut report = ReconcileReport {
    today,
    members: Vec::with_capacity(loaded.members.len()),
    new_entries: 0,
    unreadable_rows: loaded.unreadable_rows,
    ledger_created,
  };

  for row in &loaded.members {
    let member = &row.member;

    if member.remaining_credits <= 0 {
      report.members.push(MemberOutcome::of(member, Outcome::Skipped {
        reason: SkipReason::NoRemainingCredits,
      }));
      continue;
    }
    let Some(start) = member.enrollment_start else {
      report.members.push(MemberOutcome::of(member, Outcome::Skipped {
        reason: SkipReason::StartDateMissing,
      }));
      continue;
    };
    if member.scheduled_weekdays.is_empty() {
      report.members.push(MemberOutcome::of(member, Outcome::Skipped {
        reason: SkipReason::NoScheduledDays,
      }));
      continue;
    }

    let mut debits = 0usize;
    for date in schedule::occurrences(start, member.scheduled_weekdays, today)
    {
      // Seen dates include rows appended earlier in this same pass, so a
      // duplicate membership row cannot debit the same date twice.
      if !index.insert(member.id, date) {
        continue;
      }
      let entry = LedgerEntry::automatic(member.id, date);
      store
        .append_row(codec::LEDGER_TABLE, codec::encode_ledger_row(&entry))
        .await?;
      debits += 1;
    }

    if debits == 0 {
      report.members.push(MemberOutcome::of(member, Outcome::UpToDate));
      continue;
    }

    let remaining_before = member.remaining_credits;
    let remaining_after = (remaining_before - debits as i64).max(0);
    store
      .update_cell(
        &row.handle,
        codec::col::REMAINING_CREDITS,
        remaining_after.to_string(),
      )
      .await?;
    debug!(
      member = %member.id,
      debits,
      remaining_after,
      "debited elapsed occurrences"
    );

    report.new_entries += debits;
    report.members.push(MemberOutcome::of(member, Outcome::Debited {
      occurrences: debits,
      remaining_before,
      remaining_after,
    }));
  }

  info!(
    %today,
    members = report.members.len(),
    debited = report.debited_members(),
    new_entries = report.new_entries,
    unreadable = report.unreadable_rows,
    "reconciliation pass complete"
  );
  Ok(report)
}

/// Load the full ledger history, creating the table on first use. Only a
/// missing *ledger* table is recoverable; a missing membership table is a
/// deployment fault and surfaces as the error it is.
async fn load_or_create_ledger(
  store: &impl RecordStore,
) -> Result<(Vec<LedgerEntry>, bool), StoreError> {
  match store.read_all(codec::LEDGER_TABLE).await {
    Ok(records) => Ok((codec::decode_ledger_rows(&records), false)),
    Err(StoreError::TableMissing(_)) => {
      info!(table = codec::LEDGER_TABLE, "ledger table absent, creating");
      store
        .create_table(codec::LEDGER_TABLE, &codec::LEDGER_COLUMNS)
        .await?;
      Ok((Vec::new(), true))
    }
    Err(err) => Err(err),
  }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    calendar::Weekday,
    member::{LessonType, Member, PaymentMethod},
    memory::MemStore,
    ops::load_ledger,
  };

  fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
  }

  fn today() -> NaiveDate {
    date(2024, 1, 17)
  }

  async fn store() -> MemStore {
    let store = MemStore::new();
    store
      .create_table(codec::MEMBERS_TABLE, &codec::MEMBER_COLUMNS)
      .await
      .unwrap();
    store
  }

  fn member(id: i64, start: Option<NaiveDate>, days: &[Weekday], remaining: i64) -> Member {
    Member {
      id:                 MemberId(id),
      name:               format!("member {id}"),
      phone:              String::new(),
      gender:             String::new(),
      birth_date:         None,
      enrollment_start:   start,
      enrollment_end:     Some(date(2024, 2, 1)),
      total_credits:      8,
      remaining_credits:  remaining,
      payment_method:     PaymentMethod::Cash,
      scheduled_weekdays: days.iter().copied().collect(),
      lesson_type:        LessonType::Group,
      guardian_name:      None,
      status:             "active".to_string(),
      category:           None,
    }
  }

  async fn seed(store: &MemStore, member: &Member) {
    store
      .append_row(
        codec::MEMBERS_TABLE,
        codec::encode_member_row(member, DayNames::turkish()),
      )
      .await
      .unwrap();
  }

  fn outcome_of(report: &ReconcileReport, id: i64) -> &Outcome {
    &report
      .members
      .iter()
      .find(|line| line.member_id == MemberId(id))
      .unwrap()
      .outcome
  }

  #[tokio::test]
  async fn debits_exactly_the_elapsed_scheduled_dates() {
    let store = store().await;
    seed(
      &store,
      &member(1, Some(date(2024, 1, 1)), &[Weekday::Monday, Weekday::Wednesday], 8),
    )
    .await;

    let report =
      run(&store, today(), DayNames::turkish()).await.unwrap();

    assert_eq!(report.new_entries, 6);
    assert_eq!(*outcome_of(&report, 1), Outcome::Debited {
      occurrences:      6,
      remaining_before: 8,
      remaining_after:  2,
    });

    let entries = load_ledger(&store).await.unwrap();
    let dates: Vec<_> = entries.iter().map(|e| e.date).collect();
    let want: Vec<_> =
      [1, 3, 8, 10, 15, 17].into_iter().map(|d| date(2024, 1, d)).collect();
    assert_eq!(dates, want);
    assert!(entries.iter().all(|e| e.source == "automatic"));
  }

  #[tokio::test]
  async fn a_second_pass_changes_nothing() {
    let store = store().await;
    seed(
      &store,
      &member(1, Some(date(2024, 1, 1)), &[Weekday::Monday, Weekday::Wednesday], 8),
    )
    .await;

    run(&store, today(), DayNames::turkish()).await.unwrap();
    let second = run(&store, today(), DayNames::turkish()).await.unwrap();

    assert_eq!(second.new_entries, 0);
    assert_eq!(*outcome_of(&second, 1), Outcome::UpToDate);
    assert_eq!(load_ledger(&store).await.unwrap().len(), 6);
  }

  #[tokio::test]
  async fn a_later_horizon_debits_only_the_gap() {
    let store = store().await;
    seed(
      &store,
      &member(1, Some(date(2024, 1, 1)), &[Weekday::Monday, Weekday::Wednesday], 8),
    )
    .await;

    run(&store, date(2024, 1, 10), DayNames::turkish()).await.unwrap();
    let second =
      run(&store, today(), DayNames::turkish()).await.unwrap();

    // 2024-01-15 and 2024-01-17 are the only new dates.
    assert_eq!(second.new_entries, 2);
    assert_eq!(*outcome_of(&second, 1), Outcome::Debited {
      occurrences:      2,
      remaining_before: 4,
      remaining_after:  2,
    });
  }

  #[tokio::test]
  async fn balance_floors_at_zero_while_the_ledger_keeps_growing() {
    let store = store().await;
    seed(
      &store,
      &member(1, Some(date(2024, 1, 1)), &[Weekday::Monday, Weekday::Wednesday], 2),
    )
    .await;

    let report =
      run(&store, today(), DayNames::turkish()).await.unwrap();

    assert_eq!(*outcome_of(&report, 1), Outcome::Debited {
      occurrences:      6,
      remaining_before: 2,
      remaining_after:  0,
    });
    // All six elapsed dates are recorded even though only two credits
    // backed them.
    assert_eq!(load_ledger(&store).await.unwrap().len(), 6);
  }

  #[tokio::test]
  async fn exhausted_members_are_never_scanned() {
    let store = store().await;
    seed(
      &store,
      &member(1, Some(date(2024, 1, 1)), &[Weekday::Monday], 0),
    )
    .await;

    let report =
      run(&store, today(), DayNames::turkish()).await.unwrap();

    assert_eq!(*outcome_of(&report, 1), Outcome::Skipped {
      reason: SkipReason::NoRemainingCredits,
    });
    assert!(load_ledger(&store).await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn missing_and_unparseable_start_dates_skip_explicitly() {
    let store = store().await;
    seed(&store, &member(1, None, &[Weekday::Monday], 8)).await;

    // Row 2 carries text where the start date belongs.
    let mut cells = codec::encode_member_row(
      &member(2, None, &[Weekday::Monday], 8),
      DayNames::turkish(),
    );
    cells[codec::col::ENROLLMENT_START - 1] = "January-ish".to_string();
    store.append_row(codec::MEMBERS_TABLE, cells).await.unwrap();

    let report =
      run(&store, today(), DayNames::turkish()).await.unwrap();

    for id in [1, 2] {
      assert_eq!(*outcome_of(&report, id), Outcome::Skipped {
        reason: SkipReason::StartDateMissing,
      });
    }
    assert_eq!(report.new_entries, 0);
  }

  #[tokio::test]
  async fn members_without_scheduled_days_skip_explicitly() {
    let store = store().await;
    seed(&store, &member(1, Some(date(2024, 1, 1)), &[], 8)).await;

    let report =
      run(&store, today(), DayNames::turkish()).await.unwrap();

    assert_eq!(*outcome_of(&report, 1), Outcome::Skipped {
      reason: SkipReason::NoScheduledDays,
    });
  }

  #[tokio::test]
  async fn future_start_dates_scan_to_nothing() {
    let store = store().await;
    seed(
      &store,
      &member(1, Some(date(2024, 2, 5)), &[Weekday::Monday], 8),
    )
    .await;

    let report =
      run(&store, today(), DayNames::turkish()).await.unwrap();

    assert_eq!(*outcome_of(&report, 1), Outcome::UpToDate);
    assert_eq!(report.new_entries, 0);
  }

  #[tokio::test]
  async fn a_lapsed_end_date_does_not_stop_debits() {
    let store = store().await;
    let mut lapsed =
      member(1, Some(date(2024, 1, 1)), &[Weekday::Monday, Weekday::Wednesday], 8);
    lapsed.enrollment_end = Some(date(2024, 1, 5));
    seed(&store, &lapsed).await;

    let report =
      run(&store, today(), DayNames::turkish()).await.unwrap();

    assert_eq!(report.new_entries, 6);
  }

  #[tokio::test]
  async fn the_ledger_table_is_created_on_first_use() {
    let store = store().await;
    seed(
      &store,
      &member(1, Some(date(2024, 1, 1)), &[Weekday::Monday], 8),
    )
    .await;

    let report =
      run(&store, today(), DayNames::turkish()).await.unwrap();
    assert!(report.ledger_created);

    let second = run(&store, today(), DayNames::turkish()).await.unwrap();
    assert!(!second.ledger_created);
  }

  #[tokio::test]
  async fn a_missing_membership_table_is_fatal() {
    let store = MemStore::new();
    let err =
      run(&store, today(), DayNames::turkish()).await.unwrap_err();
    assert!(
      matches!(err, StoreError::TableMissing(name) if name == codec::MEMBERS_TABLE)
    );
  }

  #[tokio::test]
  async fn duplicate_id_rows_cannot_double_debit() {
    let store = store().await;
    let m = member(1, Some(date(2024, 1, 1)), &[Weekday::Monday], 8);
    seed(&store, &m).await;
    seed(&store, &m).await;

    let report =
      run(&store, today(), DayNames::turkish()).await.unwrap();

    // Three Mondays elapsed; the duplicate row sees them already debited.
    assert_eq!(report.new_entries, 3);
    let outcomes: Vec<_> = report
      .members
      .iter()
      .map(|line| matches!(line.outcome, Outcome::Debited { .. }))
      .collect();
    assert_eq!(outcomes, vec![true, false]);
    assert_eq!(load_ledger(&store).await.unwrap().len(), 3);
  }

  #[tokio::test]
  async fn foreign_ledger_sources_count_for_idempotence() {
    let store = store().await;
    seed(
      &store,
      &member(1, Some(date(2024, 1, 1)), &[Weekday::Monday], 8),
    )
    .await;
    store
      .create_table(codec::LEDGER_TABLE, &codec::LEDGER_COLUMNS)
      .await
      .unwrap();
    // A hand-entered debit for the first Monday.
    store
      .append_row(codec::LEDGER_TABLE, vec![
        "1".to_string(),
        "2024-01-01".to_string(),
        "manual".to_string(),
      ])
      .await
      .unwrap();

    let report =
      run(&store, today(), DayNames::turkish()).await.unwrap();

    // Only 01-08 and 01-15 are new.
    assert_eq!(report.new_entries, 2);
    assert_eq!(*outcome_of(&report, 1), Outcome::Debited {
      occurrences:      2,
      remaining_before: 8,
      remaining_after:  6,
    });
  }

  #[tokio::test]
  async fn unreadable_membership_rows_are_reported() {
    let store = store().await;
    seed(
      &store,
      &member(1, Some(date(2024, 1, 1)), &[Weekday::Monday], 8),
    )
    .await;
    let mut junk = vec![String::new(); codec::MEMBER_COLUMNS.len()];
    junk[0] = "???".to_string();
    store.append_row(codec::MEMBERS_TABLE, junk).await.unwrap();

    let report =
      run(&store, today(), DayNames::turkish()).await.unwrap();

    assert_eq!(report.unreadable_rows, 1);
    assert_eq!(report.members.len(), 1);
    assert_eq!(report.new_entries, 3);
  }
}
