//! Export saved records as CSV or XLSX.
//!
//! Both artifacts carry the same four columns in fixed order (see
//! [`HEADERS`]) with timestamps formatted `YYYY-MM-DD HH:MM:SS`, and are named
//! `extracted_texts_{YYYYMMDD_HHMMSS}.{ext}` after the export time.
//!
//! The XLSX writer produces the smallest valid OOXML package: one worksheet
//! with inline strings, no shared-string table and no styles.

use chrono::{DateTime, Utc};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::ExportError;
use crate::models::Record;
use crate::store::RecordStore;

pub const HEADERS: [&str; 4] = ["ID", "Filename", "Extracted Text", "Created At"];

pub const SHEET_NAME: &str = "Extracted Text";

pub const MIME_CSV: &str = "text/csv; charset=utf-8";
pub const MIME_XLSX: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ExportFormat {
    Csv,
    Xlsx,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Xlsx => "xlsx",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ExportFormat::Csv => MIME_CSV,
            ExportFormat::Xlsx => MIME_XLSX,
        }
    }

    pub fn render(&self, records: &[Record]) -> Result<Vec<u8>, ExportError> {
        match self {
            ExportFormat::Csv => to_csv(records),
            ExportFormat::Xlsx => to_xlsx(records),
        }
    }
}

/// `extracted_texts_20240101_100000.csv`
pub fn export_file_name(format: ExportFormat, at: DateTime<Utc>) -> String {
    format!(
        "extracted_texts_{}.{}",
        at.format("%Y%m%d_%H%M%S"),
        format.extension()
    )
}

fn row(record: &Record) -> [String; 4] {
    [
        record.id.to_string(),
        record.filename.clone(),
        record.extracted_text.clone(),
        record.created_at_display(),
    ]
}

/// UTF-8 CSV with a leading BOM so spreadsheet apps detect the encoding.
pub fn to_csv(records: &[Record]) -> Result<Vec<u8>, ExportError> {
    let mut buf = Vec::from(UTF8_BOM);
    {
        let mut writer = csv::Writer::from_writer(&mut buf);
        writer.write_record(HEADERS)?;
        for record in records {
            writer.write_record(row(record))?;
        }
        writer.flush()?;
    }
    Ok(buf)
}

pub fn to_xlsx(records: &[Record]) -> Result<Vec<u8>, ExportError> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);

    let parts: [(&str, String); 5] = [
        ("[Content_Types].xml", CONTENT_TYPES_XML.to_string()),
        ("_rels/.rels", ROOT_RELS_XML.to_string()),
        ("xl/workbook.xml", workbook_xml()),
        ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS_XML.to_string()),
        ("xl/worksheets/sheet1.xml", sheet_xml(records)),
    ];
    for (name, body) in parts {
        zip.start_file(name, options)?;
        zip.write_all(body.as_bytes())?;
    }

    Ok(zip.finish()?.into_inner())
}

const CONTENT_TYPES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/></Types>"#;

const ROOT_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

const WORKBOOK_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#;

fn workbook_xml() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="{}" sheetId="1" r:id="rId1"/></sheets></workbook>"#,
        quick_xml::escape::escape(SHEET_NAME)
    )
}

fn sheet_xml(records: &[Record]) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
    );

    push_row(&mut xml, 1, HEADERS.iter().map(|h| Cell::Text(*h)));
    for (i, record) in records.iter().enumerate() {
        let created = record.created_at_display();
        push_row(
            &mut xml,
            i + 2,
            [
                Cell::Number(record.id),
                Cell::Text(&record.filename),
                Cell::Text(&record.extracted_text),
                Cell::Text(&created),
            ]
            .into_iter(),
        );
    }

    xml.push_str("</sheetData></worksheet>");
    xml
}

enum Cell<'a> {
    Text(&'a str),
    Number(i64),
}

const COLUMNS: [char; 4] = ['A', 'B', 'C', 'D'];

fn push_row<'a>(xml: &mut String, row_num: usize, cells: impl Iterator<Item = Cell<'a>>) {
    xml.push_str(&format!(r#"<row r="{}">"#, row_num));
    for (col, cell) in COLUMNS.iter().zip(cells) {
        let cell_ref = format!("{}{}", col, row_num);
        match cell {
            Cell::Number(n) => {
                xml.push_str(&format!(r#"<c r="{}"><v>{}</v></c>"#, cell_ref, n));
            }
            Cell::Text(s) => {
                let cleaned = strip_invalid_xml_chars(s);
                xml.push_str(&format!(
                    r#"<c r="{}" t="inlineStr"><is><t xml:space="preserve">{}</t></is></c>"#,
                    cell_ref,
                    quick_xml::escape::escape(cleaned.as_str())
                ));
            }
        }
    }
    xml.push_str("</row>");
}

/// XML 1.0 forbids most control characters even when escaped.
fn strip_invalid_xml_chars(s: &str) -> String {
    s.chars()
        .filter(|&c| matches!(c, '\t' | '\n' | '\r') || c >= ' ')
        .collect()
}

/// Write an export of every record into `dir`.
///
/// Returns `None` without writing anything when the store is empty.
pub async fn write_export(
    store: &dyn RecordStore,
    format: ExportFormat,
    dir: &Path,
    now: DateTime<Utc>,
) -> anyhow::Result<Option<(PathBuf, usize)>> {
    let records = store.list_all().await?;
    if records.is_empty() {
        return Ok(None);
    }

    let bytes = format.render(&records)?;
    std::fs::create_dir_all(dir)?;
    let path = dir.join(export_file_name(format, now));
    std::fs::write(&path, bytes)?;
    tracing::info!(path = %path.display(), records = records.len(), "export written");
    Ok(Some((path, records.len())))
}

/// CLI entry point for `snaptext export`.
pub async fn run_export(
    config: &Config,
    store: &dyn RecordStore,
    format: ExportFormat,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let dir = output.unwrap_or(&config.export.dir);
    match write_export(store, format, dir, Utc::now()).await? {
        Some((path, count)) => {
            println!("Exported {} records to {}", count, path.display());
        }
        None => {
            println!("No records to export.");
        }
    }
    Ok(())
}
