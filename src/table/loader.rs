//! Spreadsheet loading via calamine (workbooks) and csv (delimited text)

use super::row::{CellValue, Row};
use crate::error::{Error, Result};
use calamine::{open_workbook_auto, Data, DataType, Reader};
use indexmap::IndexMap;
use std::path::Path;

/// Input formats recognised by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpreadsheetFormat {
    /// Excel / OpenDocument workbook read through calamine
    Workbook,
    /// Delimited text with the given separator byte
    Delimited(u8),
}

impl SpreadsheetFormat {
    /// Detect the format from the file extension (case-insensitive)
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Some(Self::Workbook),
            "csv" => Some(Self::Delimited(b',')),
            "tsv" => Some(Self::Delimited(b'\t')),
            _ => None,
        }
    }
}

/// Load every data row of a spreadsheet, in file order.
///
/// The first row is the header. Fully blank rows are skipped. For workbooks
/// `sheet` picks the worksheet by name; the first sheet is used otherwise.
pub fn load_rows<P: AsRef<Path>>(path: P, sheet: Option<&str>) -> Result<Vec<Row>> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(Error::SpreadsheetNotFound {
            path: path.display().to_string(),
        });
    }

    let format = SpreadsheetFormat::from_path(path).ok_or_else(|| {
        Error::UnsupportedSpreadsheet {
            path: path.display().to_string(),
        }
    })?;

    let records = match format {
        SpreadsheetFormat::Workbook => read_workbook(path, sheet)?,
        SpreadsheetFormat::Delimited(delimiter) => {
            if sheet.is_some() {
                tracing::warn!(
                    "Ignoring sheet name for delimited file {}",
                    path.display()
                );
            }
            read_delimited(path, delimiter)?
        }
    };

    let rows = rows_from_records(path, records)?;
    tracing::info!("Loaded {} rows from {}", rows.len(), path.display());
    Ok(rows)
}

fn load_error(path: &Path, reason: impl Into<String>) -> Error {
    Error::Load {
        path: path.display().to_string(),
        reason: reason.into(),
    }
}

fn read_workbook(path: &Path, sheet: Option<&str>) -> Result<Vec<Vec<CellValue>>> {
    let mut workbook =
        open_workbook_auto(path).map_err(|e| load_error(path, format!("{}", e)))?;

    let sheet_names = workbook.sheet_names();
    let sheet_name = match sheet {
        Some(name) => {
            if !sheet_names.iter().any(|s| s == name) {
                return Err(load_error(path, format!("No worksheet named '{}'", name)));
            }
            name.to_string()
        }
        None => sheet_names
            .first()
            .cloned()
            .ok_or_else(|| load_error(path, "No worksheet found"))?,
    };

    tracing::debug!("Reading worksheet '{}' from {}", sheet_name, path.display());

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| load_error(path, format!("Failed to read worksheet: {}", e)))?;

    Ok(range
        .rows()
        .map(|cells| cells.iter().map(cell_from_workbook).collect())
        .collect())
}

fn cell_from_workbook(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Int(i) => CellValue::Int(*i),
        Data::Float(f) => CellValue::Float(*f),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(_) | Data::DateTimeIso(_) => cell
            .as_datetime()
            .map(CellValue::DateTime)
            .unwrap_or_else(|| CellValue::Text(cell.to_string())),
        other => CellValue::Text(other.to_string()),
    }
}

fn read_delimited(path: &Path, delimiter: u8) -> Result<Vec<Vec<CellValue>>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|e| load_error(path, format!("{}", e)))?;

    let mut records = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| load_error(path, format!("{}", e)))?;
        records.push(
            record
                .iter()
                .map(|field| {
                    if field.is_empty() {
                        CellValue::Empty
                    } else {
                        CellValue::Text(field.to_string())
                    }
                })
                .collect(),
        );
    }

    Ok(records)
}

/// Turn raw records into rows keyed by the header record
fn rows_from_records(path: &Path, records: Vec<Vec<CellValue>>) -> Result<Vec<Row>> {
    let mut records = records.into_iter();

    let header = records
        .next()
        .ok_or_else(|| load_error(path, "Spreadsheet has no header row"))?;

    let mut columns: Vec<String> = Vec::with_capacity(header.len());
    for (i, cell) in header.iter().enumerate() {
        let name = cell.to_string().trim().to_string();
        let name = if name.is_empty() {
            format!("column_{}", i + 1)
        } else {
            name
        };
        if columns.contains(&name) {
            return Err(load_error(path, format!("Duplicate column '{}'", name)));
        }
        columns.push(name);
    }

    let mut rows = Vec::new();
    for (line, record) in records.enumerate() {
        if record.len() > columns.len() {
            tracing::debug!(
                "Line {} has {} cells but only {} columns; extra cells ignored",
                line + 2,
                record.len(),
                columns.len()
            );
        }

        let mut cells: IndexMap<String, CellValue> = IndexMap::with_capacity(columns.len());
        let mut values = record.into_iter();
        for column in &columns {
            cells.insert(column.clone(), values.next().unwrap_or(CellValue::Empty));
        }

        let row = Row::new(cells);
        if row.is_blank() {
            tracing::debug!("Skipping blank line {}", line + 2);
            continue;
        }
        rows.push(row);
    }

    Ok(rows)
}
