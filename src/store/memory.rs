//! In-memory [`RecordStore`] implementation for tests and injected fakes.
//!
//! Uses a `Vec` behind `std::sync::RwLock`. Matching, ordering, and
//! absent-id behavior mirror [`SqliteRecordStore`](super::SqliteRecordStore).

use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::error::StorageError;
use crate::models::{Record, RecordFilter};

use super::{contains_ignore_ascii_case, Clock, RecordStore, SystemClock};

struct Inner {
    records: Vec<Record>,
    next_id: i64,
}

pub struct InMemoryRecordStore {
    inner: RwLock<Inner>,
    clock: Arc<dyn Clock>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: RwLock::new(Inner {
                records: Vec::new(),
                next_id: 1,
            }),
            clock,
        }
    }
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

fn matches(record: &Record, filter: &RecordFilter) -> bool {
    if let Some(keyword) = filter.keyword() {
        if !contains_ignore_ascii_case(&record.filename, keyword)
            && !contains_ignore_ascii_case(&record.extracted_text, keyword)
        {
            return false;
        }
    }
    if let Some(lower) = filter.lower_bound() {
        if record.created_at < lower {
            return false;
        }
    }
    if let Some(upper) = filter.upper_bound() {
        if record.created_at > upper {
            return false;
        }
    }
    true
}

fn newest_first(records: &mut [Record]) {
    records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn initialize(&self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn create(&self, filename: &str, text: &str) -> Result<i64, StorageError> {
        let created_at = self.clock.now();
        let mut inner = self.inner.write().unwrap();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.records.push(Record {
            id,
            filename: filename.to_string(),
            extracted_text: text.to_string(),
            created_at,
        });
        Ok(id)
    }

    async fn list_all(&self) -> Result<Vec<Record>, StorageError> {
        let mut records = self.inner.read().unwrap().records.clone();
        newest_first(&mut records);
        Ok(records)
    }

    async fn search(&self, filter: &RecordFilter) -> Result<Vec<Record>, StorageError> {
        let mut records: Vec<Record> = self
            .inner
            .read()
            .unwrap()
            .records
            .iter()
            .filter(|r| matches(r, filter))
            .cloned()
            .collect();
        newest_first(&mut records);
        Ok(records)
    }

    async fn get(&self, id: i64) -> Result<Option<Record>, StorageError> {
        let inner = self.inner.read().unwrap();
        Ok(inner.records.iter().find(|r| r.id == id).cloned())
    }

    async fn update(&self, id: i64, new_text: &str) -> Result<bool, StorageError> {
        let mut inner = self.inner.write().unwrap();
        match inner.records.iter_mut().find(|r| r.id == id) {
            Some(record) => {
                record.extracted_text = new_text.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: i64) -> Result<bool, StorageError> {
        let mut inner = self.inner.write().unwrap();
        let before = inner.records.len();
        inner.records.retain(|r| r.id != id);
        Ok(inner.records.len() < before)
    }
}
