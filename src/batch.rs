//! Sequential batch extraction and the "save all successes" step.
//!
//! Items are processed strictly one at a time, in input order. A failure on
//! one item is captured in that item's [`BatchEntry`] and never stops the
//! rest of the batch. Error entries are never persisted.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ExtractionError;
use crate::extraction::{mime_type_for_path, Extractor};
use crate::progress::{BatchProgressEvent, BatchProgressReporter};
use crate::store::RecordStore;

/// One image ready for extraction.
#[derive(Debug, Clone)]
pub struct ImageInput {
    pub filename: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// An item that could not even be read; it becomes an error entry in place.
#[derive(Debug, Clone)]
pub struct LoadFailure {
    pub filename: String,
    pub message: String,
}

impl ImageInput {
    /// Read an image from disk, deriving its MIME type from the extension.
    /// The stored filename is the file name without directories.
    pub fn from_path(path: &Path) -> Result<Self, LoadFailure> {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let fail = |message: String| LoadFailure {
            filename: filename.clone(),
            message,
        };

        let mime_type = mime_type_for_path(path).ok_or_else(|| {
            fail("unsupported file type (expected jpg, jpeg, png, gif, bmp, or webp)".to_string())
        })?;
        let bytes = std::fs::read(path).map_err(|e| fail(format!("failed to read file: {}", e)))?;

        Ok(Self {
            filename: filename.clone(),
            mime_type: mime_type.to_string(),
            bytes,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum BatchOutcome {
    Success { text: String },
    Error { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchEntry {
    pub filename: String,
    #[serde(flatten)]
    pub outcome: BatchOutcome,
}

impl BatchEntry {
    pub fn success(filename: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            outcome: BatchOutcome::Success { text: text.into() },
        }
    }

    pub fn error(filename: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            outcome: BatchOutcome::Error {
                message: message.into(),
            },
        }
    }

    pub fn text(&self) -> Option<&str> {
        match &self.outcome {
            BatchOutcome::Success { text } => Some(text),
            BatchOutcome::Error { .. } => None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.text().is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn of(entries: &[BatchEntry]) -> Self {
        let succeeded = entries.iter().filter(|e| e.is_success()).count();
        Self {
            succeeded,
            failed: entries.len() - succeeded,
        }
    }
}

/// Extract text from every item, in order, isolating failures per item.
pub async fn extract_batch(
    extractor: &dyn Extractor,
    items: Vec<Result<ImageInput, LoadFailure>>,
    progress: &dyn BatchProgressReporter,
) -> Vec<BatchEntry> {
    let total = items.len() as u64;
    let mut entries = Vec::with_capacity(items.len());

    for (idx, item) in items.into_iter().enumerate() {
        let entry = match item {
            Ok(image) => {
                progress.report(BatchProgressEvent::Processing {
                    filename: image.filename.clone(),
                    n: idx as u64 + 1,
                    total,
                });
                extract_one(extractor, &image).await
            }
            Err(failure) => BatchEntry::error(failure.filename, failure.message),
        };
        entries.push(entry);
    }

    let summary = BatchSummary::of(&entries);
    progress.report(BatchProgressEvent::Finished {
        succeeded: summary.succeeded as u64,
        failed: summary.failed as u64,
    });
    entries
}

async fn extract_one(extractor: &dyn Extractor, image: &ImageInput) -> BatchEntry {
    match extractor.extract(&image.bytes, &image.mime_type).await {
        Ok(text) => BatchEntry::success(&image.filename, text),
        Err(e) => {
            log_failure(&image.filename, &e);
            BatchEntry::error(&image.filename, e.to_string())
        }
    }
}

fn log_failure(filename: &str, err: &ExtractionError) {
    tracing::warn!(filename, error = %err, "extraction failed");
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SavedEntry {
    pub filename: String,
    pub id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveFailure {
    pub filename: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SaveReport {
    pub saved: Vec<SavedEntry>,
    pub failures: Vec<SaveFailure>,
}

/// Persist every successful entry, one record each. Error entries are
/// skipped; a failed save is recorded and the remaining entries still run.
pub async fn save_successful(store: &dyn RecordStore, entries: &[BatchEntry]) -> SaveReport {
    let mut report = SaveReport::default();
    for entry in entries {
        let Some(text) = entry.text() else {
            continue;
        };
        match store.create(&entry.filename, text).await {
            Ok(id) => report.saved.push(SavedEntry {
                filename: entry.filename.clone(),
                id,
            }),
            Err(e) => {
                tracing::warn!(filename = %entry.filename, error = %e, "failed to save record");
                report.failures.push(SaveFailure {
                    filename: entry.filename.clone(),
                    message: e.to_string(),
                });
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use crate::models::{Record, RecordFilter};
    use crate::progress::NoProgress;
    use crate::store::InMemoryRecordStore;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Fails for any image whose bytes are `b"bad"`; echoes the rest.
    struct EchoExtractor {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Extractor for EchoExtractor {
        async fn extract(&self, image: &[u8], mime_type: &str) -> Result<String, ExtractionError> {
            self.calls.lock().unwrap().push(mime_type.to_string());
            if image == b"bad" {
                return Err(ExtractionError::Api {
                    status: 500,
                    body: "upstream exploded".to_string(),
                });
            }
            Ok(String::from_utf8_lossy(image).into_owned())
        }
    }

    fn image(name: &str, bytes: &[u8]) -> Result<ImageInput, LoadFailure> {
        Ok(ImageInput {
            filename: name.to_string(),
            mime_type: "image/png".to_string(),
            bytes: bytes.to_vec(),
        })
    }

    #[derive(Default)]
    struct RecordingProgress(Mutex<Vec<String>>);

    impl BatchProgressReporter for RecordingProgress {
        fn report(&self, event: BatchProgressEvent) {
            let line = match event {
                BatchProgressEvent::Processing { filename, n, total } => {
                    format!("{} {}/{}", filename, n, total)
                }
                BatchProgressEvent::Finished { succeeded, failed } => {
                    format!("done {} {}", succeeded, failed)
                }
            };
            self.0.lock().unwrap().push(line);
        }
    }

    #[tokio::test]
    async fn failure_in_the_middle_does_not_stop_the_batch() {
        let extractor = EchoExtractor {
            calls: Mutex::new(Vec::new()),
        };
        let progress = RecordingProgress::default();
        let entries = extract_batch(
            &extractor,
            vec![image("1.png", b"one"), image("2.png", b"bad"), image("3.png", b"three")],
            &progress,
        )
        .await;

        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0], BatchEntry::success("1.png", "one"));
        assert!(matches!(&entries[1].outcome, BatchOutcome::Error { message } if message.contains("upstream exploded")));
        assert_eq!(entries[2], BatchEntry::success("3.png", "three"));
        assert_eq!(extractor.calls.lock().unwrap().len(), 3);
        assert_eq!(
            BatchSummary::of(&entries),
            BatchSummary {
                succeeded: 2,
                failed: 1
            }
        );
        assert_eq!(
            *progress.0.lock().unwrap(),
            vec!["1.png 1/3", "2.png 2/3", "3.png 3/3", "done 2 1"]
        );
    }

    #[tokio::test]
    async fn unreadable_items_become_error_entries_in_place() {
        let extractor = EchoExtractor {
            calls: Mutex::new(Vec::new()),
        };
        let entries = extract_batch(
            &extractor,
            vec![
                Err(LoadFailure {
                    filename: "notes.txt".to_string(),
                    message: "unsupported file type".to_string(),
                }),
                image("ok.png", b"fine"),
            ],
            &NoProgress,
        )
        .await;

        assert_eq!(entries[0], BatchEntry::error("notes.txt", "unsupported file type"));
        assert_eq!(entries[1], BatchEntry::success("ok.png", "fine"));
        assert_eq!(extractor.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn save_successful_skips_error_entries() {
        let store = InMemoryRecordStore::new();
        let entries = vec![
            BatchEntry::success("a.png", "alpha"),
            BatchEntry::error("b.png", "boom"),
            BatchEntry::success("c.png", ""),
        ];

        let report = save_successful(&store, &entries).await;
        assert_eq!(report.saved.len(), 2);
        assert!(report.failures.is_empty());

        let records = store.list_all().await.unwrap();
        let names: Vec<&str> = records.iter().map(|r| r.filename.as_str()).collect();
        assert!(names.contains(&"a.png") && names.contains(&"c.png"));
        assert!(!records.iter().any(|r| r.extracted_text == "boom"));
    }

    /// Rejects saves for one filename.
    struct FlakyStore {
        inner: InMemoryRecordStore,
        reject: &'static str,
    }

    #[async_trait]
    impl RecordStore for FlakyStore {
        async fn initialize(&self) -> Result<(), StorageError> {
            Ok(())
        }
        async fn create(&self, filename: &str, text: &str) -> Result<i64, StorageError> {
            if filename == self.reject {
                return Err(StorageError::Database(sqlx::Error::PoolClosed));
            }
            self.inner.create(filename, text).await
        }
        async fn list_all(&self) -> Result<Vec<Record>, StorageError> {
            self.inner.list_all().await
        }
        async fn search(&self, filter: &RecordFilter) -> Result<Vec<Record>, StorageError> {
            self.inner.search(filter).await
        }
        async fn get(&self, id: i64) -> Result<Option<Record>, StorageError> {
            self.inner.get(id).await
        }
        async fn update(&self, id: i64, new_text: &str) -> Result<bool, StorageError> {
            self.inner.update(id, new_text).await
        }
        async fn delete(&self, id: i64) -> Result<bool, StorageError> {
            self.inner.delete(id).await
        }
    }

    #[tokio::test]
    async fn save_failure_is_isolated_per_entry() {
        let store = FlakyStore {
            inner: InMemoryRecordStore::new(),
            reject: "b.png",
        };
        let entries = vec![
            BatchEntry::success("a.png", "alpha"),
            BatchEntry::success("b.png", "beta"),
            BatchEntry::success("c.png", "gamma"),
        ];

        let report = save_successful(&store, &entries).await;
        assert_eq!(
            report.saved.iter().map(|s| s.filename.as_str()).collect::<Vec<_>>(),
            vec!["a.png", "c.png"]
        );
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].filename, "b.png");
    }

    #[test]
    fn entry_serializes_with_status_tag() {
        let json = serde_json::to_value(BatchEntry::error("x.png", "nope")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "filename": "x.png", "status": "error", "message": "nope" })
        );
        let back: BatchEntry = serde_json::from_value(
            serde_json::json!({ "filename": "y.png", "status": "success", "text": "hi" }),
        )
        .unwrap();
        assert_eq!(back, BatchEntry::success("y.png", "hi"));
    }

    #[test]
    fn from_path_rejects_unsupported_extension() {
        let failure = ImageInput::from_path(Path::new("/tmp/readme.txt")).unwrap_err();
        assert_eq!(failure.filename, "readme.txt");
        assert!(failure.message.contains("unsupported"));
    }
}
