// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # User Directory
//!
//! Maps provider subjects to local user records, creating them on first
//! sight (JIT provisioning). Backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `users`: external_subject → serialized User (JSON bytes)
//! - `user_ids`: internal id → external_subject
//!
//! ## Concurrency
//!
//! The subject is the primary key of the `users` table and upsert runs
//! inside a single write transaction, so two concurrent first logins for
//! the same subject serialize on the store and settle on one record. No
//! application-level locking is involved.

use std::path::Path;

use chrono::{DateTime, Utc};
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Primary table: external_subject → serialized User (JSON bytes).
const USERS: TableDefinition<&str, &[u8]> = TableDefinition::new("users");

/// Index: internal user id (UUID string) → external_subject.
const USER_IDS: TableDefinition<&str, &str> = TableDefinition::new("user_ids");

#[derive(Debug, thiserror::Error)]
pub enum UserStoreError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type UserStoreResult<T> = Result<T, UserStoreError>;

/// A locally provisioned user.
///
/// Created on first successful login for a subject; `email` and `full_name`
/// track the provider on subsequent logins while `id`, `external_subject`
/// and `created_at` are immutable. Deletion is an external administrative
/// concern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Internally generated stable identifier
    pub id: Uuid,
    /// Provider-issued subject identifier (unique, immutable)
    pub external_subject: String,
    /// Email address from the latest login
    pub email: String,
    /// Display name, if the provider supplied one
    pub full_name: Option<String>,
    /// When the user was first provisioned
    pub created_at: DateTime<Utc>,
}

/// Repository for user records.
pub struct UserDirectory {
    db: Database,
}

impl UserDirectory {
    /// Open (or create) the user database at the given path.
    pub fn open(path: &Path) -> UserStoreResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let db = Database::create(path)?;

        // Pre-create tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(USERS)?;
            let _ = write_txn.open_table(USER_IDS)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// JIT-provisioning primitive: create the user on first sight, update
    /// the mutable profile fields on subsequent sight.
    pub fn upsert(
        &self,
        subject: &str,
        email: &str,
        full_name: Option<&str>,
    ) -> UserStoreResult<User> {
        let write_txn = self.db.begin_write()?;
        let user = {
            let mut users = write_txn.open_table(USERS)?;
            let mut ids = write_txn.open_table(USER_IDS)?;

            let existing = users.get(subject)?.map(|guard| guard.value().to_vec());
            match existing {
                Some(bytes) => {
                    let mut user: User = serde_json::from_slice(&bytes)?;
                    if user.email != email || user.full_name.as_deref() != full_name {
                        user.email = email.to_string();
                        user.full_name = full_name.map(str::to_string);
                        let json = serde_json::to_vec(&user)?;
                        users.insert(subject, json.as_slice())?;
                    }
                    user
                }
                None => {
                    let user = User {
                        id: Uuid::new_v4(),
                        external_subject: subject.to_string(),
                        email: email.to_string(),
                        full_name: full_name.map(str::to_string),
                        created_at: Utc::now(),
                    };
                    let json = serde_json::to_vec(&user)?;
                    users.insert(subject, json.as_slice())?;
                    ids.insert(user.id.to_string().as_str(), subject)?;
                    user
                }
            }
        };
        write_txn.commit()?;

        Ok(user)
    }

    /// Look up a user by provider subject. Indexed; runs once per login.
    pub fn find_by_subject(&self, subject: &str) -> UserStoreResult<Option<User>> {
        let read_txn = self.db.begin_read()?;
        let users = read_txn.open_table(USERS)?;
        match users.get(subject)? {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }

    /// Look up a user by internal id. Hot path for session resolution.
    pub fn find_by_id(&self, id: Uuid) -> UserStoreResult<Option<User>> {
        let read_txn = self.db.begin_read()?;
        let ids = read_txn.open_table(USER_IDS)?;
        let subject = match ids.get(id.to_string().as_str())? {
            Some(guard) => guard.value().to_string(),
            None => return Ok(None),
        };
        let users = read_txn.open_table(USERS)?;
        match users.get(subject.as_str())? {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }

    /// Number of provisioned users.
    pub fn count(&self) -> UserStoreResult<u64> {
        let read_txn = self.db.begin_read()?;
        let users = read_txn.open_table(USERS)?;
        Ok(users.len()?)
    }

    /// Cheap store availability check for the health endpoint.
    pub fn check(&self) -> UserStoreResult<()> {
        let read_txn = self.db.begin_read()?;
        let _ = read_txn.open_table(USERS)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn open_directory() -> (UserDirectory, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let directory = UserDirectory::open(&temp_dir.path().join("users.redb")).unwrap();
        (directory, temp_dir)
    }

    #[test]
    fn first_login_creates_user() {
        let (directory, _temp_dir) = open_directory();

        let user = directory.upsert("abc123", "a@x.com", Some("Ada")).unwrap();
        assert_eq!(user.external_subject, "abc123");
        assert_eq!(user.email, "a@x.com");
        assert_eq!(user.full_name.as_deref(), Some("Ada"));

        let found = directory.find_by_subject("abc123").unwrap().unwrap();
        assert_eq!(found, user);
    }

    #[test]
    fn relogin_updates_mutable_fields_only() {
        let (directory, _temp_dir) = open_directory();

        let first = directory.upsert("abc123", "a@x.com", Some("Ada")).unwrap();
        let second = directory.upsert("abc123", "b@x.com", None).unwrap();

        assert_eq!(second.id, first.id);
        assert_eq!(second.external_subject, first.external_subject);
        assert_eq!(second.created_at, first.created_at);
        assert_eq!(second.email, "b@x.com");
        assert!(second.full_name.is_none());

        assert_eq!(directory.count().unwrap(), 1);
    }

    #[test]
    fn unchanged_relogin_is_a_noop() {
        let (directory, _temp_dir) = open_directory();

        let first = directory.upsert("abc123", "a@x.com", Some("Ada")).unwrap();
        let second = directory.upsert("abc123", "a@x.com", Some("Ada")).unwrap();
        assert_eq!(second, first);
    }

    #[test]
    fn find_by_id_round_trips() {
        let (directory, _temp_dir) = open_directory();

        let user = directory.upsert("abc123", "a@x.com", None).unwrap();
        let found = directory.find_by_id(user.id).unwrap().unwrap();
        assert_eq!(found, user);

        assert!(directory.find_by_id(Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn concurrent_first_logins_create_one_user() {
        let (directory, _temp_dir) = open_directory();
        let directory = Arc::new(directory);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let directory = directory.clone();
                std::thread::spawn(move || {
                    directory
                        .upsert("race-subject", "race@x.com", Some("Racer"))
                        .unwrap()
                        .id
                })
            })
            .collect();

        let ids: Vec<Uuid> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert!(ids.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(directory.count().unwrap(), 1);
    }

    #[test]
    fn find_missing_subject_returns_none() {
        let (directory, _temp_dir) = open_directory();
        assert!(directory.find_by_subject("ghost").unwrap().is_none());
    }
}
