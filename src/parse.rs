//! Turns the raw bytes of an uploaded object into CSV records.

use crate::record::CsvRecord;
use anyhow::{anyhow, Context, Result};
use csv::ReaderBuilder;
use std::borrow::Cow;

/// Columns every uploaded file must provide. Any other column is
/// ignored.
pub const REQUIRED_COLUMNS: [&str; 3] = ["Name", "Subject", "Grade"];

/// Decodes the object contents as UTF-8. Invalid sequences are
/// replaced with U+FFFD instead of failing.
pub fn decode(contents: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(contents)
}

/// Parses CSV text whose first line holds the column names. Blank
/// lines are skipped. The whole input is rejected if any row is
/// malformed, so callers never see a partial result.
pub fn parse_records(text: &str) -> Result<Vec<CsvRecord>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_reader(text.as_bytes());
    let headers = reader
        .headers()
        .context("Failed to read the CSV header row")?
        .clone();
    if headers.is_empty() {
        return Ok(Vec::new());
    }
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|column| !headers.iter().any(|header| header == *column))
        .collect();
    if !missing.is_empty() {
        return Err(anyhow!(
            "CSV header row {:?} is missing required columns {:?}",
            headers.iter().collect::<Vec<_>>(),
            missing
        ));
    }
    let duplicated: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|column| headers.iter().filter(|header| header == column).count() > 1)
        .collect();
    if !duplicated.is_empty() {
        return Err(anyhow!(
            "CSV header row {:?} repeats columns {:?}",
            headers.iter().collect::<Vec<_>>(),
            duplicated
        ));
    }

    let mut records = Vec::new();
    for (index, row) in reader.deserialize::<CsvRecord>().enumerate() {
        let record = row.with_context(|| format!("Failed to parse CSV data row {}", index + 1))?;
        records.push(record);
    }
    Ok(records)
}

/// Decodes and parses an uploaded object in one go.
pub fn parse_object(contents: &[u8]) -> Result<Vec<CsvRecord>> {
    parse_records(&decode(contents))
}
