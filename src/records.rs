//! Browse, search, and edit saved records from the CLI.
//!
//! Each `run_*` function backs one `snaptext` subcommand. A missing id is
//! reported as a "record not found" error so the process exits non-zero.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use std::path::Path;

use crate::models::{Record, RecordFilter};
use crate::store::RecordStore;

const PREVIEW_CHARS: usize = 80;

pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("invalid date '{}': expected YYYY-MM-DD", s))
}

pub async fn run_list(store: &dyn RecordStore) -> Result<()> {
    let records = store.list_all().await?;
    if records.is_empty() {
        println!("No saved records. Run `snaptext extract <image> --save` to add one.");
        return Ok(());
    }
    print_listing(&records);
    Ok(())
}

pub async fn run_search(
    store: &dyn RecordStore,
    keyword: Option<String>,
    from: Option<String>,
    to: Option<String>,
) -> Result<()> {
    let filter = RecordFilter {
        keyword,
        start_date: from.as_deref().map(parse_date).transpose()?,
        end_date: to.as_deref().map(parse_date).transpose()?,
    };

    let records = store.search(&filter).await?;
    if records.is_empty() {
        println!("No matching records.");
        return Ok(());
    }
    print_listing(&records);
    Ok(())
}

pub async fn run_get(store: &dyn RecordStore, id: i64) -> Result<()> {
    let Some(record) = store.get(id).await? else {
        bail!("record not found: {}", id);
    };

    println!("--- Record ---");
    println!("id:          {}", record.id);
    println!("filename:    {}", record.filename);
    println!("created_at:  {}", record.created_at_display());
    println!();
    println!("--- Extracted Text ---");
    println!("{}", record.extracted_text);
    Ok(())
}

/// Replace a record's text with `text`, or with the contents of `file`.
pub async fn run_edit(
    store: &dyn RecordStore,
    id: i64,
    text: Option<String>,
    file: Option<&Path>,
) -> Result<()> {
    let new_text = match (text, file) {
        (Some(text), None) => text,
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        _ => bail!("provide exactly one of --text or --file"),
    };

    if !store.update(id, &new_text).await? {
        bail!("record not found: {}", id);
    }
    tracing::info!(id, chars = new_text.chars().count(), "record updated");
    println!("Updated record {}.", id);
    Ok(())
}

pub async fn run_delete(store: &dyn RecordStore, id: i64) -> Result<()> {
    if !store.delete(id).await? {
        bail!("record not found: {}", id);
    }
    tracing::info!(id, "record deleted");
    println!("Deleted record {}.", id);
    Ok(())
}

fn print_listing(records: &[Record]) {
    println!("{} record(s)", records.len());
    println!();
    for record in records {
        println!(
            "[{}] {}  {}",
            record.id,
            record.filename,
            record.created_at_display()
        );
        println!("    {}", preview(&record.extracted_text));
    }
}

/// First line of the text, truncated to a fixed number of characters.
fn preview(text: &str) -> String {
    let first_line = text.lines().next().unwrap_or("");
    let mut out: String = first_line.chars().take(PREVIEW_CHARS).collect();
    if first_line.chars().count() > PREVIEW_CHARS || text.lines().nth(1).is_some() {
        out.push_str(" …");
    }
    if out.is_empty() {
        out.push_str("(empty)");
    }
    out
}
