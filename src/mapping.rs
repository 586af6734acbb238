//! Column-to-field mapping configuration
//!
//! A [`FormMapping`] bundles the three static tables that drive a batch:
//! - `fields`: spreadsheet column to PDF field name
//! - `checkboxes`: spreadsheet column to the PDF checkbox values set for a
//!   "yes" or "no" answer
//! - `date_fields`: columns whose values are parsed and reformatted as dates
//!
//! Mappings are validated when constructed or deserialized and are never
//! mutated afterwards.

use crate::error::{Error, Result};
use chrono::format::{Item, StrftimeItems};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Default rendering for date fields (MM/DD/YYYY)
pub const DEFAULT_DATE_FORMAT: &str = "%m/%d/%Y";

/// PDF field name to the value written into it
pub type FieldValues = IndexMap<String, String>;

/// Field values to apply for each answer of a yes/no column
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CheckboxBranches {
    #[serde(default)]
    pub yes: FieldValues,
    #[serde(default)]
    pub no: FieldValues,
}

impl CheckboxBranches {
    /// All PDF fields touched by either branch, without duplicates
    pub fn pdf_fields(&self) -> IndexSet<&str> {
        self.yes
            .keys()
            .chain(self.no.keys())
            .map(String::as_str)
            .collect()
    }
}

/// Validated mapping from spreadsheet columns to PDF form fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawFormMapping")]
pub struct FormMapping {
    fields: IndexMap<String, String>,
    checkboxes: IndexMap<String, CheckboxBranches>,
    date_fields: IndexSet<String>,
    date_format: String,
}

/// Unvalidated on-disk shape of a mapping file
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawFormMapping {
    #[serde(default)]
    fields: IndexMap<String, String>,
    #[serde(default)]
    checkboxes: IndexMap<String, CheckboxBranches>,
    #[serde(default)]
    date_fields: IndexSet<String>,
    #[serde(default = "default_date_format")]
    date_format: String,
}

fn default_date_format() -> String {
    DEFAULT_DATE_FORMAT.to_string()
}

impl TryFrom<RawFormMapping> for FormMapping {
    type Error = Error;

    fn try_from(raw: RawFormMapping) -> Result<Self> {
        FormMapping::new(raw.fields, raw.checkboxes, raw.date_fields, raw.date_format)
    }
}

impl FormMapping {
    /// Build a mapping, rejecting inconsistent configurations.
    ///
    /// Rules:
    /// - column and PDF field names must be non-empty
    /// - every date column must also have an entry in `fields`
    /// - `date_format` must be a valid strftime pattern
    /// - no PDF field may be written by two different columns
    pub fn new(
        fields: IndexMap<String, String>,
        checkboxes: IndexMap<String, CheckboxBranches>,
        date_fields: IndexSet<String>,
        date_format: impl Into<String>,
    ) -> Result<Self> {
        let mapping = Self {
            fields,
            checkboxes,
            date_fields,
            date_format: date_format.into(),
        };
        mapping.validate()?;
        Ok(mapping)
    }

    /// Load and validate a JSON mapping file
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| Error::Config {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;
        Self::from_json_str(&contents)
    }

    /// Parse and validate a JSON mapping document
    pub fn from_json_str(json: &str) -> Result<Self> {
        let raw: RawFormMapping = serde_json::from_str(json).map_err(|e| Error::Config {
            reason: e.to_string(),
        })?;
        Self::try_from(raw)
    }

    /// Pretty-printed JSON that [`FormMapping::from_json_str`] accepts
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn fields(&self) -> &IndexMap<String, String> {
        &self.fields
    }

    pub fn checkboxes(&self) -> &IndexMap<String, CheckboxBranches> {
        &self.checkboxes
    }

    pub fn date_fields(&self) -> &IndexSet<String> {
        &self.date_fields
    }

    pub fn date_format(&self) -> &str {
        &self.date_format
    }

    pub fn is_date_column(&self, column: &str) -> bool {
        self.date_fields.contains(column)
    }

    pub fn is_checkbox_column(&self, column: &str) -> bool {
        self.checkboxes.contains_key(column)
    }

    /// Every PDF field name this mapping may write
    pub fn pdf_field_names(&self) -> IndexSet<&str> {
        let mut names: IndexSet<&str> = self
            .fields
            .iter()
            .filter(|(column, _)| !self.is_checkbox_column(column))
            .map(|(_, field)| field.as_str())
            .collect();
        for branches in self.checkboxes.values() {
            names.extend(branches.pdf_fields());
        }
        names
    }

    fn validate(&self) -> Result<()> {
        let config_error = |reason: String| Error::Config { reason };

        for (column, field) in &self.fields {
            if column.trim().is_empty() {
                return Err(config_error("empty column name in fields".to_string()));
            }
            if field.trim().is_empty() {
                return Err(config_error(format!(
                    "column '{}' maps to an empty PDF field name",
                    column
                )));
            }
        }

        for date_column in &self.date_fields {
            if !self.fields.contains_key(date_column) {
                return Err(config_error(format!(
                    "date column '{}' has no entry in fields",
                    date_column
                )));
            }
            if self.is_checkbox_column(date_column) {
                return Err(config_error(format!(
                    "column '{}' is both a date and a checkbox column",
                    date_column
                )));
            }
        }

        if StrftimeItems::new(&self.date_format).any(|item| matches!(item, Item::Error)) {
            return Err(config_error(format!(
                "invalid date format '{}'",
                self.date_format
            )));
        }

        // Each PDF field has exactly one owning column
        let mut owners: HashMap<&str, &str> = HashMap::new();

        for (column, field) in &self.fields {
            if self.is_checkbox_column(column) {
                tracing::warn!(
                    "Column '{}' has both a field and a checkbox mapping; the checkbox mapping is used",
                    column
                );
                continue;
            }
            claim_field(&mut owners, field, column)?;
        }

        for (column, branches) in &self.checkboxes {
            if column.trim().is_empty() {
                return Err(config_error("empty column name in checkboxes".to_string()));
            }
            let pdf_fields = branches.pdf_fields();
            if pdf_fields.is_empty() {
                return Err(config_error(format!(
                    "checkbox column '{}' sets no PDF fields",
                    column
                )));
            }
            for field in pdf_fields {
                if field.trim().is_empty() {
                    return Err(config_error(format!(
                        "checkbox column '{}' maps to an empty PDF field name",
                        column
                    )));
                }
                claim_field(&mut owners, field, column)?;
            }
        }

        Ok(())
    }
}

fn claim_field<'a>(
    owners: &mut HashMap<&'a str, &'a str>,
    field: &'a str,
    column: &'a str,
) -> Result<()> {
    match owners.get(field) {
        Some(owner) if *owner != column => Err(Error::Config {
            reason: format!(
                "PDF field '{}' is mapped from both '{}' and '{}'",
                field, owner, column
            ),
        }),
        _ => {
            owners.insert(field, column);
            Ok(())
        }
    }
}

impl Default for FormMapping {
    /// Mapping for IRS Form 8936 Schedule A (Clean Vehicle Credit Amount)
    fn default() -> Self {
        let fields: IndexMap<String, String> = [
            ("Name(s)", "f1_01[0]"),
            ("Identifying number", "f1_02[0]"),
            ("Year", "f1_03[0]"),
            ("Make", "f1_04[0]"),
            ("Model", "f1_05[0]"),
            ("VIN", "f1_06[0]"),
            ("Date in Service", "f1_07[0]"),
        ]
        .into_iter()
        .map(|(c, f)| (c.to_string(), f.to_string()))
        .collect();

        let yes_no = |field: &str| CheckboxBranches {
            yes: [
                (format!("{}[0]", field), "/1".to_string()),
                (format!("{}[1]", field), String::new()),
            ]
            .into_iter()
            .collect(),
            no: [
                (format!("{}[0]", field), String::new()),
                (format!("{}[1]", field), "/2".to_string()),
            ]
            .into_iter()
            .collect(),
        };

        let checkboxes: IndexMap<String, CheckboxBranches> = [
            ("more than $25,000?", yes_no("c1_1")),
            ("new clean vehicle?", yes_no("c1_2")),
        ]
        .into_iter()
        .map(|(c, b)| (c.to_string(), b))
        .collect();

        let date_fields: IndexSet<String> = ["Date in Service".to_string()].into_iter().collect();

        Self {
            fields,
            checkboxes,
            date_fields,
            date_format: default_date_format(),
        }
    }
}
