//! Aggregate counts over saved records.
//!
//! Gives a quick picture of the ledger: how many records, how many distinct
//! source files, how much text, and how extraction activity is spread over
//! days. Used by `snaptext stats` and `GET /stats`.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

use crate::models::Record;
use crate::progress::format_number;
use crate::store::RecordStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DateCount {
    pub date: NaiveDate,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub total_records: usize,
    pub unique_filenames: usize,
    /// Unicode scalar values across all extracted text.
    pub total_characters: usize,
    /// Records per UTC creation date, newest date first.
    pub by_date: Vec<DateCount>,
}

pub fn summarize(records: &[Record]) -> Summary {
    let unique_filenames = records
        .iter()
        .map(|r| r.filename.as_str())
        .collect::<HashSet<_>>()
        .len();
    let total_characters = records.iter().map(|r| r.extracted_text.chars().count()).sum();

    let mut per_day: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    for record in records {
        *per_day.entry(record.created_at.date_naive()).or_insert(0) += 1;
    }
    let by_date = per_day
        .into_iter()
        .rev()
        .map(|(date, count)| DateCount { date, count })
        .collect();

    Summary {
        total_records: records.len(),
        unique_filenames,
        total_characters,
        by_date,
    }
}

/// CLI entry point for `snaptext stats`.
pub async fn run_stats(store: &dyn RecordStore) -> anyhow::Result<()> {
    let records = store.list_all().await?;
    if records.is_empty() {
        println!("No records saved yet.");
        return Ok(());
    }
    let summary = summarize(&records);

    println!("snaptext History Summary");
    println!("========================");
    println!();
    println!("  Records:          {}", format_number(summary.total_records as u64));
    println!("  Unique files:     {}", format_number(summary.unique_filenames as u64));
    println!(
        "  Characters:       {}",
        format_number(summary.total_characters as u64)
    );
    println!();
    println!("  By date:");
    println!("  {:<12} {:>8}", "DATE", "RECORDS");
    println!("  {}", "-".repeat(21));
    for day in &summary.by_date {
        println!("  {:<12} {:>8}", day.date.to_string(), day.count);
    }
    println!();

    Ok(())
}
