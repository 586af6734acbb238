//! Row transformation: one spreadsheet row into PDF field values

mod date;

pub use date::{from_excel_serial, parse_date, parse_date_text};

use crate::mapping::FormMapping;
use crate::table::{CellValue, Row};
use std::collections::BTreeMap;
use thiserror::Error;

/// PDF field name to the string value written into it
pub type FilledFieldSet = BTreeMap<String, String>;

/// Normalized answer of a yes/no checkbox column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckboxChoice {
    Yes,
    No,
    Unrecognized,
}

impl CheckboxChoice {
    /// Case-insensitive, whitespace-trimmed Yes/No match; booleans map directly
    pub fn normalize(value: &CellValue) -> Self {
        match value {
            CellValue::Bool(true) => CheckboxChoice::Yes,
            CellValue::Bool(false) => CheckboxChoice::No,
            CellValue::Text(text) => {
                let text = text.trim();
                if text.eq_ignore_ascii_case("yes") {
                    CheckboxChoice::Yes
                } else if text.eq_ignore_ascii_case("no") {
                    CheckboxChoice::No
                } else {
                    CheckboxChoice::Unrecognized
                }
            }
            _ => CheckboxChoice::Unrecognized,
        }
    }
}

/// A non-fatal, field-scoped problem found while transforming a row
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldIssue {
    /// The spreadsheet has no such column
    #[error("column '{column}' not found in spreadsheet")]
    MissingColumn { column: String },

    /// The cell is blank where a yes/no answer was expected
    #[error("no value in checkbox column '{column}'")]
    MissingValue { column: String },

    /// A date column value could not be parsed
    #[error("could not parse '{value}' in column '{column}' as a date")]
    DateParse { column: String, value: String },

    /// A checkbox column value is neither yes nor no
    #[error("unrecognized checkbox value '{value}' in column '{column}'")]
    CheckboxValue { column: String, value: String },
}

/// Result of transforming one row
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RowTransform {
    /// Values to write into the template
    pub fields: FilledFieldSet,
    /// Problems that left a field unset
    pub issues: Vec<FieldIssue>,
}

/// Build the PDF field values for one row.
///
/// Never fails: missing columns, unparseable dates and unrecognized checkbox
/// answers are logged, recorded in [`RowTransform::issues`], and leave the
/// affected field untouched.
pub fn transform_row(row: &Row, mapping: &FormMapping) -> RowTransform {
    let mut out = RowTransform::default();

    for (column, pdf_field) in mapping.fields() {
        if mapping.is_checkbox_column(column) {
            continue;
        }

        let Some(value) = row.get(column) else {
            tracing::warn!("Column '{}' not found in spreadsheet", column);
            out.issues.push(FieldIssue::MissingColumn {
                column: column.clone(),
            });
            continue;
        };

        if mapping.is_date_column(column) {
            if let Some(rendered) = format_date_cell(column, value, mapping, &mut out.issues) {
                out.fields.insert(pdf_field.clone(), rendered);
            }
        } else {
            out.fields.insert(pdf_field.clone(), value.to_string());
        }
    }

    for (column, branches) in mapping.checkboxes() {
        let Some(value) = row.get(column) else {
            tracing::warn!("Checkbox column '{}' not found in spreadsheet", column);
            out.issues.push(FieldIssue::MissingColumn {
                column: column.clone(),
            });
            continue;
        };

        if value.is_blank() {
            tracing::info!("No value for checkbox column '{}'; leaving default", column);
            out.issues.push(FieldIssue::MissingValue {
                column: column.clone(),
            });
            continue;
        }

        let branch = match CheckboxChoice::normalize(value) {
            CheckboxChoice::Yes => &branches.yes,
            CheckboxChoice::No => &branches.no,
            CheckboxChoice::Unrecognized => {
                tracing::warn!(
                    "Unrecognized checkbox value '{}' for field '{}'",
                    value,
                    column
                );
                out.issues.push(FieldIssue::CheckboxValue {
                    column: column.clone(),
                    value: value.to_string(),
                });
                continue;
            }
        };

        for (field, export_value) in branch {
            out.fields.insert(field.clone(), export_value.clone());
        }
    }

    out
}

/// Render a date cell in the mapping's target format.
///
/// Blank cells render as an empty string; unparseable ones are recorded and
/// yield `None`.
fn format_date_cell(
    column: &str,
    value: &CellValue,
    mapping: &FormMapping,
    issues: &mut Vec<FieldIssue>,
) -> Option<String> {
    if value.is_blank() {
        return Some(String::new());
    }

    match parse_date(value) {
        Some(date) => Some(date.format(mapping.date_format()).to_string()),
        None => {
            tracing::warn!("Date parsing failed for '{}' in column '{}'", value, column);
            issues.push(FieldIssue::DateParse {
                column: column.to_string(),
                value: value.to_string(),
            });
            None
        }
    }
}
