//! The attendance ledger: append-only debit history.

use std::collections::HashSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::member::MemberId;

/// Source tag written by the reconciliation engine.
pub const AUTOMATIC_SOURCE: &str = "automatic";

/// One debit record: the member had a scheduled lesson on `date`.
///
/// Entries are never mutated or deleted in normal operation. Foreign source
/// tags round-trip untouched and count toward idempotence checks exactly
/// like engine-written ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
  pub member_id: MemberId,
  pub date:      NaiveDate,
  pub source:    String,
}

impl LedgerEntry {
  /// An engine-written debit for `member_id` on `date`.
  pub fn automatic(member_id: MemberId, date: NaiveDate) -> LedgerEntry {
    LedgerEntry {
      member_id,
      date,
      source: AUTOMATIC_SOURCE.to_string(),
    }
  }
}

// ─── Index ───────────────────────────────────────────────────────────────────

/// Membership test over `(member_id, date)`, the ledger's idempotence key.
///
/// Built from the loaded history at the start of a reconciliation pass and
/// updated as the pass appends, so a date debited mid-run is visible to
/// every later check in the same run.
#[derive(Debug, Default)]
pub struct LedgerIndex {
  seen: HashSet<(MemberId, NaiveDate)>,
}

impl LedgerIndex {
  pub fn new() -> LedgerIndex {
    LedgerIndex::default()
  }

  pub fn from_entries(entries: &[LedgerEntry]) -> LedgerIndex {
    let mut index = LedgerIndex::new();
    for entry in entries {
      index.insert(entry.member_id, entry.date);
    }
    index
  }

  pub fn contains(&self, member_id: MemberId, date: NaiveDate) -> bool {
    self.seen.contains(&(member_id, date))
  }

  /// Record a key. Returns `true` when it was not present before.
  pub fn insert(&mut self, member_id: MemberId, date: NaiveDate) -> bool {
    self.seen.insert((member_id, date))
  }

  pub fn len(&self) -> usize {
    self.seen.len()
  }

  pub fn is_empty(&self) -> bool {
    self.seen.is_empty()
  }
}
