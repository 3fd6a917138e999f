//! `snaptext extract`: single and batch extraction from image files.
//!
//! One file runs a single extraction whose failure is the command's failure.
//! Several files run as a batch via [`crate::batch`]: every file is attempted
//! in order, results are printed per file, and `--save` persists only the
//! successful ones. The command exits non-zero when any file failed.

use anyhow::{bail, Result};
use std::path::PathBuf;

use crate::batch::{self, BatchOutcome, BatchSummary, ImageInput};
use crate::extraction::Extractor;
use crate::progress::ProgressMode;
use crate::store::RecordStore;

pub async fn run_extract(
    extractor: &dyn Extractor,
    store: &dyn RecordStore,
    files: &[PathBuf],
    save: bool,
    progress: ProgressMode,
) -> Result<()> {
    match files {
        [] => bail!("no image files given"),
        [single] => run_single(extractor, store, single, save).await,
        many => run_batch(extractor, store, many, save, progress).await,
    }
}

async fn run_single(
    extractor: &dyn Extractor,
    store: &dyn RecordStore,
    path: &std::path::Path,
    save: bool,
) -> Result<()> {
    let image = ImageInput::from_path(path)
        .map_err(|f| anyhow::anyhow!("{}: {}", f.filename, f.message))?;

    let text = extractor
        .extract(&image.bytes, &image.mime_type)
        .await
        .map_err(|e| anyhow::anyhow!("text extraction failed for {}: {}", image.filename, e))?;

    println!("--- {} ---", image.filename);
    println!("{}", text);

    if save {
        let id = store.create(&image.filename, &text).await?;
        tracing::info!(id, filename = %image.filename, "record saved");
        println!();
        println!("Saved record {}.", id);
    }
    Ok(())
}

async fn run_batch(
    extractor: &dyn Extractor,
    store: &dyn RecordStore,
    files: &[PathBuf],
    save: bool,
    progress: ProgressMode,
) -> Result<()> {
    let items = files.iter().map(|p| ImageInput::from_path(p)).collect();
    let reporter = progress.reporter();
    let entries = batch::extract_batch(extractor, items, reporter.as_ref()).await;

    for entry in &entries {
        match &entry.outcome {
            BatchOutcome::Success { text } => {
                println!("--- [ok] {} ---", entry.filename);
                println!("{}", text);
            }
            BatchOutcome::Error { message } => {
                println!("--- [error] {} ---", entry.filename);
                println!("{}", message);
            }
        }
        println!();
    }

    let summary = BatchSummary::of(&entries);
    println!("{} succeeded, {} failed", summary.succeeded, summary.failed);

    if save && summary.succeeded > 0 {
        let report = batch::save_successful(store, &entries).await;
        for failure in &report.failures {
            eprintln!("failed to save {}: {}", failure.filename, failure.message);
        }
        println!("Saved {} record(s).", report.saved.len());
    }

    if summary.failed > 0 {
        bail!("{} of {} images failed", summary.failed, entries.len());
    }
    Ok(())
}
