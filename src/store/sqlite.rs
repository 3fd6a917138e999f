//! SQLite-backed [`RecordStore`] implementation.

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use std::sync::Arc;

use crate::error::StorageError;
use crate::migrate;
use crate::models::{from_micros, to_micros, Record, RecordFilter};

use super::{Clock, RecordStore, SystemClock};

const SELECT_COLUMNS: &str = "SELECT id, filename, extracted_text, created_at FROM extracted_texts";
const ORDER_NEWEST_FIRST: &str = " ORDER BY created_at DESC, id DESC";

/// Wraps a [`SqlitePool`]; every operation is a single self-contained
/// statement.
#[derive(Clone)]
pub struct SqliteRecordStore {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl SqliteRecordStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self::with_clock(pool, Arc::new(SystemClock))
    }

    pub fn with_clock(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn row_to_record(row: SqliteRow) -> Result<Record, StorageError> {
        let created_us: i64 = row.try_get("created_at")?;
        let created_at = from_micros(created_us).ok_or(StorageError::Decode {
            column: "created_at",
            value: created_us.to_string(),
        })?;
        Ok(Record {
            id: row.try_get("id")?,
            filename: row.try_get("filename")?,
            extracted_text: row.try_get("extracted_text")?,
            created_at,
        })
    }
}

/// Escape `LIKE` metacharacters so the keyword matches literally.
fn like_pattern(keyword: &str) -> String {
    let mut escaped = String::with_capacity(keyword.len() + 2);
    escaped.push('%');
    for ch in keyword.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn initialize(&self) -> Result<(), StorageError> {
        migrate::run_migrations(&self.pool).await
    }

    async fn create(&self, filename: &str, text: &str) -> Result<i64, StorageError> {
        let created_at = to_micros(self.clock.now());
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO extracted_texts (filename, extracted_text, created_at) \
             VALUES (?, ?, ?) RETURNING id",
        )
        .bind(filename)
        .bind(text)
        .bind(created_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn list_all(&self) -> Result<Vec<Record>, StorageError> {
        let rows = sqlx::query(&format!("{}{}", SELECT_COLUMNS, ORDER_NEWEST_FIRST))
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Self::row_to_record).collect()
    }

    async fn search(&self, filter: &RecordFilter) -> Result<Vec<Record>, StorageError> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(SELECT_COLUMNS);
        qb.push(" WHERE 1=1");

        if let Some(keyword) = filter.keyword() {
            let pattern = like_pattern(keyword);
            qb.push(" AND (filename LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR extracted_text LIKE ")
                .push_bind(pattern)
                .push(" ESCAPE '\\')");
        }
        if let Some(lower) = filter.lower_bound() {
            qb.push(" AND created_at >= ").push_bind(to_micros(lower));
        }
        if let Some(upper) = filter.upper_bound() {
            qb.push(" AND created_at <= ").push_bind(to_micros(upper));
        }
        qb.push(ORDER_NEWEST_FIRST);

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_record).collect()
    }

    async fn get(&self, id: i64) -> Result<Option<Record>, StorageError> {
        let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::row_to_record).transpose()
    }

    async fn update(&self, id: i64, new_text: &str) -> Result<bool, StorageError> {
        let result = sqlx::query("UPDATE extracted_texts SET extracted_text = ? WHERE id = ?")
            .bind(new_text)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: i64) -> Result<bool, StorageError> {
        let result = sqlx::query("DELETE FROM extracted_texts WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing::{exercise_contract, ManualClock};
    use chrono::{TimeZone, Utc};
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    #[test]
    fn like_pattern_escapes_metacharacters() {
        assert_eq!(like_pattern("abc"), "%abc%");
        assert_eq!(like_pattern("100%"), "%100\\%%");
        assert_eq!(like_pattern("a_b\\c"), "%a\\_b\\\\c%");
    }

    #[tokio::test]
    async fn satisfies_record_store_contract() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let store = SqliteRecordStore::with_clock(memory_pool().await, clock.clone());
        exercise_contract(&store, &clock).await;
    }

    #[tokio::test]
    async fn same_timestamp_orders_by_id_desc() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 5, 12, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::new(ts));
        let store = SqliteRecordStore::with_clock(memory_pool().await, clock);
        store.initialize().await.unwrap();

        let first = store.create("1.png", "one").await.unwrap();
        let second = store.create("2.png", "two").await.unwrap();
        let third = store.create("3.png", "three").await.unwrap();

        let ids: Vec<i64> = store.list_all().await.unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![third, second, first]);
    }

    #[tokio::test]
    async fn raw_insert_defaults_created_at_to_now() {
        let pool = memory_pool().await;
        let store = SqliteRecordStore::new(pool.clone());
        store.initialize().await.unwrap();

        let before = Utc::now().timestamp();
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO extracted_texts (filename, extracted_text) VALUES ('a', 'b') RETURNING id",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        let after = Utc::now().timestamp();

        let rec = store.get(id).await.unwrap().unwrap();
        let secs = rec.created_at.timestamp();
        assert!(before - 1 <= secs && secs <= after, "{} not in [{}, {}]", secs, before, after);
    }

    #[tokio::test]
    async fn preserves_multiline_unicode_text() {
        let store = SqliteRecordStore::new(memory_pool().await);
        store.initialize().await.unwrap();

        let text = "첫 번째 줄\nSecond line\n\n\t탭과 \"quotes\"";
        let id = store.create("", text).await.unwrap();
        let rec = store.get(id).await.unwrap().unwrap();
        assert_eq!(rec.filename, "");
        assert_eq!(rec.extracted_text, text);
    }

    #[tokio::test]
    async fn corrupt_timestamp_is_a_decode_error() {
        let store = SqliteRecordStore::new(memory_pool().await);
        store.initialize().await.unwrap();
        sqlx::query(
            "INSERT INTO extracted_texts (filename, extracted_text, created_at) VALUES ('x', 'y', ?)",
        )
        .bind(i64::MAX)
        .execute(store.pool())
        .await
        .unwrap();

        let err = store.list_all().await.unwrap_err();
        assert!(matches!(err, StorageError::Decode { column: "created_at", .. }));
    }
}
