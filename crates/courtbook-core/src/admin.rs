//! Administrator records.
//!
//! Credentials live in the administrator table; the password cell holds an
//! argon2 PHC string, never plaintext. Hashing and verification are the
//! HTTP layer's job. This module only moves rows.

use tracing::{info, warn};

use crate::{
  codec,
  ops::Mutation,
  store::{RecordStore, StoreError},
};

/// One administrator row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admin {
  pub username:      String,
  /// PHC string, e.g. `$argon2id$v=19$...`.
  pub password_hash: String,
}

/// All administrator rows, in stored order. Unreadable rows are dropped
/// with a warning.
pub async fn load_admins(
  store: &impl RecordStore,
) -> Result<Vec<Admin>, StoreError> {
  let records = store.read_all(codec::ADMINS_TABLE).await?;
  let mut admins = Vec::with_capacity(records.len());
  for record in &records {
    match codec::decode_admin(record) {
      Ok(admin) => admins.push(admin),
      Err(err) => warn!(error = %err, "skipping administrator row"),
    }
  }
  Ok(admins)
}

/// The administrator named `username`, if any. The oldest row wins when
/// duplicates exist.
pub async fn find_admin(
  store: &impl RecordStore,
  username: &str,
) -> Result<Option<Admin>, StoreError> {
  let admins = load_admins(store).await?;
  Ok(admins.into_iter().find(|admin| admin.username == username))
}

/// Append a new administrator row. There is no duplicate-username guard;
/// the oldest row wins at lookup.
pub async fn add_admin(
  store: &impl RecordStore,
  admin: &Admin,
) -> Result<(), StoreError> {
  store
    .append_row(codec::ADMINS_TABLE, codec::encode_admin_row(admin))
    .await?;
  info!(username = %admin.username, "administrator added");
  Ok(())
}

/// Overwrite the stored hash for `username`.
pub async fn set_password_hash(
  store: &impl RecordStore,
  username: &str,
  new_hash: String,
) -> Result<Mutation, StoreError> {
  let Some(handle) = store.find_row(codec::ADMINS_TABLE, username).await?
  else {
    return Ok(Mutation::NotFound);
  };
  store
    .update_cell(&handle, codec::col::ADMIN_PASSWORD, new_hash)
    .await?;
  info!(username, "administrator password updated");
  Ok(Mutation::Applied(()))
}
