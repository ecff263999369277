// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # User Storage Module
//!
//! Local user records created the first time a Firebase identity
//! authenticates. The store only ever performs two operations on behalf of
//! the authentication flow: look a user up by its key field, and create one.
//!
//! ## Uniqueness
//!
//! The store is the only race-safety mechanism for first logins. A create
//! whose key value is already taken fails with
//! [`StoreError::ConstraintViolation`]; callers re-fetch the winning record.
//!
//! ## Layout
//!
//! ```text
//! $DATA_DIR/
//!   users.redb        # users, username index, firebase uid index
//! ```

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

pub mod user_db;

pub use user_db::UserDatabase;

/// A locally persisted user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct User {
    /// Internal user ID
    pub id: Uuid,
    /// Unique username (holds the Firebase `uid` for provisioned users)
    pub username: String,
    /// Email address copied from the provider at creation time (may be empty)
    pub email: String,
    /// Firebase `uid`, set when the store is keyed by [`UidField::FirebaseUid`]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firebase_uid: Option<String>,
    /// When the record was created
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Build a new user whose `field` holds `uid`.
    pub fn provisioned(field: UidField, uid: &str, email: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: uid.to_string(),
            email: email.to_string(),
            firebase_uid: match field {
                UidField::Username => None,
                UidField::FirebaseUid => Some(uid.to_string()),
            },
            created_at: Utc::now(),
        }
    }

    /// Value of the given key field, if set.
    pub fn key(&self, field: UidField) -> Option<&str> {
        match field {
            UidField::Username => Some(self.username.as_str()),
            UidField::FirebaseUid => self.firebase_uid.as_deref(),
        }
    }
}

/// The user field used as the unique lookup key for a Firebase `uid`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UidField {
    /// Store the uid in `username` (default)
    #[default]
    Username,
    /// Store the uid in `firebase_uid`
    FirebaseUid,
}

impl fmt::Display for UidField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UidField::Username => write!(f, "username"),
            UidField::FirebaseUid => write!(f, "firebase_uid"),
        }
    }
}

impl FromStr for UidField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "username" => Ok(UidField::Username),
            "firebase_uid" | "uid" => Ok(UidField::FirebaseUid),
            other => Err(format!("unknown uid field '{other}'")),
        }
    }
}

/// Errors returned by a [`UserStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A unique key is already taken.
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// The backend failed.
    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence for local users.
pub trait UserStore: Send + Sync {
    /// Find the user whose `field` equals `value`.
    fn find_user(&self, field: UidField, value: &str) -> StoreResult<Option<User>>;

    /// Create a user whose `field` is `value`.
    ///
    /// Fails with [`StoreError::ConstraintViolation`] if a user with that
    /// key already exists.
    fn create_user(&self, field: UidField, value: &str, email: &str) -> StoreResult<User>;
}
