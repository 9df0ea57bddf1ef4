//! Historical enrollment dataset loaded from CSV.
//!
//! The only structural requirement is the `programa` column; every other
//! column is carried through untouched so it can be echoed into the prompt.
//! Rows keep their file order throughout.
use crate::error::{ForecastError, Result};
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

/// Column that partitions the dataset into forecastable programs.
pub const CATEGORY_COLUMN: &str = "programa";
/// Maximum number of rows embedded into a prompt.
pub const ROW_LIMIT: usize = 20;

/// One CSV record; values are aligned with `Dataset::headers`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    values: Vec<String>,
}

impl Row {
    pub fn new(values: Vec<String>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset {
    headers: Vec<String>,
    rows: Vec<Row>,
}

impl Dataset {
    /// Build a dataset from already-split records. Every row must have one
    /// value per header.
    pub fn new(headers: Vec<String>, rows: Vec<Row>) -> Result<Self> {
        if let Some((idx, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.values.len() != headers.len())
        {
            return Err(ForecastError::InvalidDataset(format!(
                "row {} has {} values but the header has {}",
                idx + 1,
                row.values.len(),
                headers.len()
            )));
        }
        Ok(Self { headers, rows })
    }

    pub fn from_csv_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    /// Parse CSV text with a mandatory header row. Headers and cells are
    /// trimmed; ragged records are rejected by the reader.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);
        let headers = reader
            .headers()?
            .iter()
            .map(str::to_string)
            .collect::<Vec<_>>();
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(Row::new(record.iter().map(str::to_string).collect()));
        }
        Self::new(headers, rows)
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|header| header == name)
    }

    /// First `limit` rows rendered as a table, for previews.
    pub fn preview(&self, limit: usize) -> String {
        let rows = self.rows.iter().take(limit).collect::<Vec<_>>();
        render_table(&self.headers, &rows)
    }
}

/// Check the category column and return its distinct values in first-seen
/// order.
pub fn validate(dataset: &Dataset) -> Result<Vec<String>> {
    let idx = dataset.column_index(CATEGORY_COLUMN).ok_or_else(|| {
        ForecastError::InvalidDataset(format!(
            "missing category column '{CATEGORY_COLUMN}'"
        ))
    })?;
    let mut seen = HashSet::new();
    let mut programs = Vec::new();
    for row in dataset.rows() {
        let value = &row.values[idx];
        if seen.insert(value.as_str()) {
            programs.push(value.clone());
        }
    }
    Ok(programs)
}

/// Rows whose category equals `category`, in file order, at most `limit`.
pub fn filter<'a>(dataset: &'a Dataset, category: &str, limit: usize) -> Result<Vec<&'a Row>> {
    let idx = dataset.column_index(CATEGORY_COLUMN).ok_or_else(|| {
        ForecastError::InvalidDataset(format!(
            "missing category column '{CATEGORY_COLUMN}'"
        ))
    })?;
    Ok(dataset
        .rows()
        .iter()
        .filter(|row| row.values[idx] == category)
        .take(limit)
        .collect())
}

/// Render rows as a fixed-width text table without an index column.
///
/// Columns are separated by two spaces and padded to the widest cell.
/// Cells that parse as numbers are right aligned, everything else is left
/// aligned; headers follow the alignment of their column.
pub fn render_table(headers: &[String], rows: &[&Row]) -> String {
    let widths = headers
        .iter()
        .enumerate()
        .map(|(idx, header)| {
            rows.iter()
                .filter_map(|row| row.values.get(idx))
                .map(|cell| cell.chars().count())
                .chain(std::iter::once(header.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect::<Vec<_>>();
    let numeric = (0..headers.len())
        .map(|idx| {
            !rows.is_empty()
                && rows
                    .iter()
                    .filter_map(|row| row.values.get(idx))
                    .all(|cell| is_numeric(cell))
        })
        .collect::<Vec<_>>();

    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(render_line(headers.iter().map(String::as_str), &widths, &numeric));
    for row in rows {
        lines.push(render_line(
            row.values().iter().map(String::as_str),
            &widths,
            &numeric,
        ));
    }
    lines.join("\n")
}

fn render_line<'a>(
    cells: impl Iterator<Item = &'a str>,
    widths: &[usize],
    numeric: &[bool],
) -> String {
    let padded = cells
        .zip(widths.iter().zip(numeric))
        .map(|(cell, (&width, &right))| {
            if right {
                format!("{cell:>width$}")
            } else {
                format!("{cell:<width$}")
            }
        })
        .collect::<Vec<_>>();
    padded.join("  ").trim_end().to_string()
}

fn is_numeric(cell: &str) -> bool {
    !cell.is_empty() && cell.parse::<f64>().is_ok()
}
