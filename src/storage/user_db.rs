// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded user database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `users`: user id → serialized User
//! - `username_index`: username → user id
//! - `firebase_uid_index`: firebase uid → user id
//!
//! redb allows a single write transaction at a time, so the existence check
//! and the insert in [`UserDatabase::create_user`] cannot interleave with
//! another create.

use std::path::Path;

use redb::{
    Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition,
    WriteTransaction,
};

use super::{StoreError, StoreResult, UidField, User, UserStore};

// =============================================================================
// Table Definitions
// =============================================================================

/// Primary table: user id → serialized User (JSON bytes).
const USERS: TableDefinition<&str, &[u8]> = TableDefinition::new("users");

/// Unique index: username → user id.
const USERNAME_INDEX: TableDefinition<&str, &str> = TableDefinition::new("username_index");

/// Unique index: firebase uid → user id.
const FIREBASE_UID_INDEX: TableDefinition<&str, &str> = TableDefinition::new("firebase_uid_index");

fn index_for(field: UidField) -> TableDefinition<'static, &'static str, &'static str> {
    match field {
        UidField::Username => USERNAME_INDEX,
        UidField::FirebaseUid => FIREBASE_UID_INDEX,
    }
}

impl From<redb::Error> for StoreError {
    fn from(e: redb::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}

impl From<redb::DatabaseError> for StoreError {
    fn from(e: redb::DatabaseError) -> Self {
        StoreError::Backend(e.to_string())
    }
}

impl From<redb::TransactionError> for StoreError {
    fn from(e: redb::TransactionError) -> Self {
        StoreError::Backend(e.to_string())
    }
}

impl From<redb::TableError> for StoreError {
    fn from(e: redb::TableError) -> Self {
        StoreError::Backend(e.to_string())
    }
}

impl From<redb::StorageError> for StoreError {
    fn from(e: redb::StorageError) -> Self {
        StoreError::Backend(e.to_string())
    }
}

impl From<redb::CommitError> for StoreError {
    fn from(e: redb::CommitError) -> Self {
        StoreError::Backend(e.to_string())
    }
}

// =============================================================================
// UserDatabase
// =============================================================================

/// Embedded ACID user database.
pub struct UserDatabase {
    db: Database,
}

impl UserDatabase {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Backend(format!("create {}: {e}", parent.display())))?;
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(USERS)?;
            let _ = write_txn.open_table(USERNAME_INDEX)?;
            let _ = write_txn.open_table(FIREBASE_UID_INDEX)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Look up a user by internal ID.
    pub fn get_user(&self, id: &str) -> StoreResult<Option<User>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(USERS)?;
        match table.get(id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Number of stored users.
    pub fn count(&self) -> StoreResult<u64> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(USERS)?;
        Ok(table.len()?)
    }

    /// Insert a fully built user, enforcing both unique indexes.
    pub fn insert_user(&self, user: &User) -> StoreResult<()> {
        let json = serde_json::to_vec(user)?;
        let id = user.id.to_string();

        let write_txn = self.db.begin_write()?;
        if let Some(msg) = find_conflict(&write_txn, user)? {
            write_txn.abort()?;
            return Err(StoreError::ConstraintViolation(msg));
        }
        {
            let mut users = write_txn.open_table(USERS)?;
            users.insert(id.as_str(), json.as_slice())?;

            let mut by_username = write_txn.open_table(USERNAME_INDEX)?;
            by_username.insert(user.username.as_str(), id.as_str())?;

            if let Some(uid) = user.firebase_uid.as_deref() {
                let mut by_uid = write_txn.open_table(FIREBASE_UID_INDEX)?;
                by_uid.insert(uid, id.as_str())?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }
}

/// Describe the first unique index `user` would collide with, if any.
fn find_conflict(write_txn: &WriteTransaction, user: &User) -> StoreResult<Option<String>> {
    let by_username = write_txn.open_table(USERNAME_INDEX)?;
    if by_username.get(user.username.as_str())?.is_some() {
        return Ok(Some(format!("username '{}' already exists", user.username)));
    }

    if let Some(uid) = user.firebase_uid.as_deref() {
        let by_uid = write_txn.open_table(FIREBASE_UID_INDEX)?;
        if by_uid.get(uid)?.is_some() {
            return Ok(Some(format!("firebase_uid '{uid}' already exists")));
        }
    }

    Ok(None)
}

impl UserStore for UserDatabase {
    fn find_user(&self, field: UidField, value: &str) -> StoreResult<Option<User>> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(index_for(field))?;
        let Some(id) = index.get(value)?.map(|v| v.value().to_string()) else {
            return Ok(None);
        };

        let users = read_txn.open_table(USERS)?;
        match users.get(id.as_str())? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Err(StoreError::Backend(format!(
                "{field} index points at missing user {id}"
            ))),
        }
    }

    fn create_user(&self, field: UidField, value: &str, email: &str) -> StoreResult<User> {
        let user = User::provisioned(field, value, email);
        self.insert_user(&user)?;
        Ok(user)
    }
}
