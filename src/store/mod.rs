//! Storage abstraction for extracted-text records.
//!
//! The [`RecordStore`] trait is the only way the rest of the crate touches
//! persisted records. [`sqlite::SqliteRecordStore`] is the production backend;
//! [`memory::InMemoryRecordStore`] has identical semantics for tests and
//! injected fakes.
//!
//! # Operations
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`initialize`](RecordStore::initialize) | Ensure the schema exists (idempotent) |
//! | [`create`](RecordStore::create) | Insert a record, returning its new id |
//! | [`list_all`](RecordStore::list_all) | Every record, newest first |
//! | [`search`](RecordStore::search) | Keyword/date filtered records, newest first |
//! | [`get`](RecordStore::get) | Point lookup; `None` when absent |
//! | [`update`](RecordStore::update) | Replace the extracted text; `false` when absent |
//! | [`delete`](RecordStore::delete) | Hard delete; `false` when absent |
//!
//! Ordering is `created_at` descending with ties broken by `id` descending.
//! Keyword matching is ASCII case-insensitive substring matching against the
//! filename or the extracted text.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StorageError;
use crate::models::{Record, RecordFilter};

pub use memory::InMemoryRecordStore;
pub use sqlite::SqliteRecordStore;

/// Source of insertion timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn initialize(&self) -> Result<(), StorageError>;

    async fn create(&self, filename: &str, text: &str) -> Result<i64, StorageError>;

    async fn list_all(&self) -> Result<Vec<Record>, StorageError>;

    async fn search(&self, filter: &RecordFilter) -> Result<Vec<Record>, StorageError>;

    async fn get(&self, id: i64) -> Result<Option<Record>, StorageError>;

    /// Returns `true` if a record with `id` existed and was updated.
    async fn update(&self, id: i64, new_text: &str) -> Result<bool, StorageError>;

    /// Returns `true` if a record with `id` existed and was removed.
    async fn delete(&self, id: i64) -> Result<bool, StorageError>;
}

/// ASCII case-insensitive substring test, matching SQLite's `LIKE`.
pub(crate) fn contains_ignore_ascii_case(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    let needle = needle.to_ascii_lowercase();
    haystack.to_ascii_lowercase().contains(&needle)
}
