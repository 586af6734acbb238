//! Writing filled forms to disk

use super::form::{fill_form_fields, load_template, FillReport};
use crate::error::{Error, Result};
use crate::transform::FilledFieldSet;
use std::path::Path;

/// Produces one filled PDF from a template and a set of field values
pub trait FormWriter {
    /// Fill `template` with `fields` and write the result to `output`.
    ///
    /// Field names that the template lacks are reported in the returned
    /// [`FillReport`]; only an unreadable template or an unwritable output
    /// is an error.
    fn fill(&self, template: &Path, fields: &FilledFieldSet, output: &Path) -> Result<FillReport>;
}

/// [`FormWriter`] backed by PDFium
#[derive(Debug, Clone, Default)]
pub struct PdfiumFormWriter {
    password: Option<String>,
}

impl PdfiumFormWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Password for encrypted templates
    pub fn with_password(password: impl Into<String>) -> Self {
        Self {
            password: Some(password.into()),
        }
    }
}

impl FormWriter for PdfiumFormWriter {
    fn fill(&self, template: &Path, fields: &FilledFieldSet, output: &Path) -> Result<FillReport> {
        // Fresh read per call: no document state is shared between rows
        let data = load_template(template)?;
        let (bytes, report) = fill_form_fields(&data, self.password.as_deref(), fields)?;

        for skipped in &report.fields_skipped {
            tracing::warn!("Field '{}' not filled: {}", skipped.name, skipped.reason);
        }

        std::fs::write(output, &bytes).map_err(|source| Error::OutputWrite {
            path: output.display().to_string(),
            source,
        })?;

        Ok(report)
    }
}
