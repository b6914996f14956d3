//! Fetched-table validation and cell access.
//!
//! RULE: Loaders never index columns by position. Every fetched table is
//! checked against its `SourceConfig` header before any row is read, and
//! cells are then addressed by column name. A former spelling listed in
//! `aliases` is accepted under its current name.

use crate::{
    config::{RowSelection, SourceConfig},
    error::{PipelineError, PipelineResult},
    types::{Dataset, StateKey},
};
use csv::StringRecord;
use std::collections::HashMap;

/// One selected data row with its 1-based line number in the source file.
#[derive(Debug, Clone)]
pub struct RawRow {
    pub line: u64,
    record: StringRecord,
}

/// The state rows of one fetched CSV, header already validated.
#[derive(Debug, Clone)]
pub struct RawTable {
    pub dataset: Dataset,
    header: Vec<String>,
    rows: Vec<RawRow>,
}

impl RawTable {
    pub fn parse(dataset: Dataset, text: &str, source: &SourceConfig) -> PipelineResult<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(text.as_bytes());

        let found: Vec<String> = reader
            .headers()
            .map_err(|e| parse_error(dataset, e))?
            .iter()
            .map(|h| h.trim().trim_start_matches('\u{feff}').to_string())
            .collect();
        let header: Vec<String> = found
            .iter()
            .map(|h| source.canonical(h).to_string())
            .collect();

        if header != source.columns {
            return Err(PipelineError::SchemaMismatch {
                dataset,
                expected: source.columns.join(", "),
                found: found.join(", "),
            });
        }

        let mut all = Vec::new();
        for result in reader.records() {
            let record = result.map_err(|e| parse_error(dataset, e))?;
            let line = record.position().map_or(0, |p| p.line());
            all.push(RawRow { line, record });
        }

        let available = all.len();
        let rows = select_rows(all, &source.rows);
        let wanted = source.rows.take();
        if rows.len() < wanted {
            return Err(PipelineError::InsufficientRows {
                dataset,
                expected: wanted,
                found: rows.len(),
            });
        }

        log::debug!(
            "{dataset}: selected {} of {available} data rows",
            rows.len()
        );

        Ok(Self { dataset, header, rows })
    }

    pub fn rows(&self) -> &[RawRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Resolve a column the loader depends on.
    pub fn column(&self, name: &str) -> PipelineResult<Column> {
        self.header
            .iter()
            .position(|h| h == name)
            .map(|index| Column { index, name: name.to_string() })
            .ok_or_else(|| PipelineError::SchemaMismatch {
                dataset: self.dataset,
                expected: name.to_string(),
                found: self.header.join(", "),
            })
    }

    pub fn text<'a>(&self, row: &'a RawRow, column: &Column) -> &'a str {
        row.record.get(column.index).unwrap_or("").trim()
    }

    /// A cumulative count. Missing cells are `None`; anything that is not a
    /// non-negative integer fails loudly rather than becoming zero.
    pub fn count(&self, row: &RawRow, column: &Column) -> PipelineResult<Option<u64>> {
        let raw = self.text(row, column);
        if is_missing(raw) {
            return Ok(None);
        }
        parse_count(raw)
            .map(Some)
            .ok_or_else(|| self.malformed(row, column, raw))
    }

    /// A non-negative rate supplied by the source.
    pub fn rate(&self, row: &RawRow, column: &Column) -> PipelineResult<Option<f64>> {
        let raw = self.text(row, column);
        if is_missing(raw) {
            return Ok(None);
        }
        match raw.parse::<f64>() {
            Ok(v) if v.is_finite() && v >= 0.0 => Ok(Some(v)),
            _ => Err(self.malformed(row, column, raw)),
        }
    }

    fn malformed(&self, row: &RawRow, column: &Column, raw: &str) -> PipelineError {
        PipelineError::MalformedField {
            dataset: self.dataset,
            line: row.line,
            column: column.name.clone(),
            value: raw.to_string(),
        }
    }
}

/// A validated column handle.
#[derive(Debug, Clone)]
pub struct Column {
    index: usize,
    name: String,
}

fn select_rows(all: Vec<RawRow>, selection: &RowSelection) -> Vec<RawRow> {
    match selection {
        RowSelection::Window { skip, take } => {
            all.into_iter().skip(*skip).take(*take).collect()
        }
        RowSelection::Excluding { rows, take } => all
            .into_iter()
            .enumerate()
            .filter(|(i, _)| !rows.contains(i))
            .map(|(_, row)| row)
            .take(*take)
            .collect(),
    }
}

fn is_missing(raw: &str) -> bool {
    raw.is_empty()
        || raw.eq_ignore_ascii_case("na")
        || raw.eq_ignore_ascii_case("n/a")
        || raw.eq_ignore_ascii_case("nan")
}

/// Accepts `123` and the float spelling `123.0` some exports use.
fn parse_count(raw: &str) -> Option<u64> {
    if let Ok(v) = raw.parse::<u64>() {
        return Some(v);
    }
    let v = raw.parse::<f64>().ok()?;
    if v.is_finite() && v >= 0.0 && v.fract() == 0.0 && v <= u64::MAX as f64 {
        Some(v as u64)
    } else {
        None
    }
}

/// Key rows by normalized state name, rejecting duplicates.
pub(crate) fn index_unique<'a, T>(
    dataset: Dataset,
    rows: &'a [T],
    name: impl Fn(&T) -> &str,
) -> PipelineResult<HashMap<StateKey, &'a T>> {
    let mut index = HashMap::with_capacity(rows.len());
    for row in rows {
        if index.insert(StateKey::new(name(row)), row).is_some() {
            return Err(PipelineError::DuplicateKey {
                dataset,
                name: name(row).to_string(),
            });
        }
    }
    Ok(index)
}

fn parse_error(dataset: Dataset, e: csv::Error) -> PipelineError {
    PipelineError::Parse { dataset, message: e.to_string() }
}
