use sqlx::SqlitePool;

use crate::error::StorageError;

/// Create the `extracted_texts` table and its ordering index.
///
/// `created_at` holds UTC microseconds and defaults to the insertion time
/// for rows written outside the store. Safe to run repeatedly. `AUTOINCREMENT` keeps ids from being reused after
/// the newest row is deleted.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), StorageError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS extracted_texts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            filename TEXT NOT NULL,
            extracted_text TEXT NOT NULL,
            created_at INTEGER NOT NULL
                DEFAULT (CAST(strftime('%s', 'now') AS INTEGER) * 1000000)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_extracted_texts_created_at \
         ON extracted_texts(created_at DESC, id DESC)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
