//! Batch orchestration: one filled PDF per spreadsheet row

use crate::error::{Error, Result};
use crate::mapping::FormMapping;
use crate::pdf::FormWriter;
use crate::table::{load_rows, Row};
use crate::transform::{transform_row, FieldIssue};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Column whose value, when present, names a row's output file
pub const FILENAME_COLUMN: &str = "filename";

/// Inputs and output location for a batch run
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Spreadsheet with one record per output PDF
    pub data_path: PathBuf,
    /// Blank PDF form to fill
    pub template_path: PathBuf,
    /// Directory receiving the filled PDFs (created if missing)
    pub output_dir: PathBuf,
    /// Worksheet to read (default: first sheet)
    pub sheet: Option<String>,
    /// Transform rows and log the result without writing any PDF
    pub dry_run: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("PDF Source.xlsx"),
            template_path: PathBuf::from("form.pdf"),
            output_dir: PathBuf::from("output"),
            sheet: None,
            dry_run: false,
        }
    }
}

/// What went wrong with a single row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowErrorKind {
    /// The `filename` value is not usable as a file name
    InvalidFilename,
    /// The template could not be filled or the output could not be written
    Fill,
}

/// A row-scoped failure; the batch continues past it
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("row {row_index}: {detail}")]
pub struct RowError {
    pub kind: RowErrorKind,
    /// 1-based position of the row among the loaded rows
    pub row_index: usize,
    pub detail: String,
}

/// Outcome of processing one row
#[derive(Debug)]
pub struct RowOutcome {
    pub row_index: usize,
    /// Path of the written (or, on a dry run, planned) PDF
    pub result: std::result::Result<PathBuf, RowError>,
    /// Field-level problems absorbed while transforming the row
    pub issues: Vec<FieldIssue>,
}

/// Per-row outcomes of a completed batch
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub outcomes: Vec<RowOutcome>,
}

impl BatchSummary {
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.total() - self.succeeded()
    }

    pub fn failures(&self) -> impl Iterator<Item = &RowError> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().err())
    }

    /// Output paths of the successful rows, in row order
    pub fn written(&self) -> impl Iterator<Item = &Path> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok().map(PathBuf::as_path))
    }
}

/// Output file name for a row.
///
/// Uses the row's `filename` value verbatim (adding `.pdf` if it lacks that
/// extension) when present and non-blank, otherwise `output_<row_index>.pdf`.
/// Names that would leave the output directory are rejected.
pub fn output_file_name(row: &Row, row_index: usize) -> Result<String> {
    let name = match row.get(FILENAME_COLUMN) {
        Some(value) if !value.is_blank() => value.to_string(),
        _ => return Ok(format!("output_{}.pdf", row_index)),
    };

    if name.contains(&['/', '\\', '\0'][..]) || name == "." || name == ".." {
        return Err(Error::InvalidFilename { name });
    }

    if name.to_ascii_lowercase().ends_with(".pdf") {
        Ok(name)
    } else {
        Ok(format!("{}.pdf", name))
    }
}

/// Per-run state shared by the rows of one batch
#[derive(Debug, Default)]
struct RunState {
    /// Outputs already produced by earlier successful rows
    written: HashSet<PathBuf>,
    /// Why the output directory is unusable, if it is
    output_dir_error: Option<String>,
}

/// Fill one PDF per spreadsheet row.
///
/// Only a failure to load the spreadsheet aborts the run. Every other
/// failure, including an output directory that cannot be created, is logged
/// and recorded per row in the returned [`BatchSummary`].
pub fn run_batch<W: FormWriter + ?Sized>(
    config: &BatchConfig,
    mapping: &FormMapping,
    writer: &W,
) -> Result<BatchSummary> {
    let mut state = RunState::default();

    if !config.dry_run {
        if let Err(e) = std::fs::create_dir_all(&config.output_dir) {
            let detail = format!(
                "Failed to create output directory {}: {}",
                config.output_dir.display(),
                e
            );
            tracing::error!("{}", detail);
            state.output_dir_error = Some(detail);
        }
    }

    let rows = load_rows(&config.data_path, config.sheet.as_deref()).map_err(|e| {
        tracing::error!("Error reading spreadsheet: {}", e);
        e
    })?;

    tracing::info!(
        "Filling {} with {} rows from {}",
        config.template_path.display(),
        rows.len(),
        config.data_path.display()
    );

    let mut summary = BatchSummary::default();

    for (i, row) in rows.iter().enumerate() {
        let row_index = i + 1;
        let outcome = process_row(config, mapping, writer, row, row_index, &mut state);

        match &outcome.result {
            Ok(path) if config.dry_run => {
                tracing::info!("Row {}: would write {}", row_index, path.display())
            }
            Ok(path) => tracing::info!("PDF saved as {}", path.display()),
            Err(e) => tracing::error!("Error filling PDF for {}", e),
        }

        summary.outcomes.push(outcome);
    }

    if summary.failed() > 0 {
        tracing::warn!(
            "Processed {} rows: {} succeeded, {} failed",
            summary.total(),
            summary.succeeded(),
            summary.failed()
        );
    } else {
        tracing::info!(
            "Processed {} rows: {} succeeded, {} failed",
            summary.total(),
            summary.succeeded(),
            summary.failed()
        );
    }

    Ok(summary)
}

fn process_row<W: FormWriter + ?Sized>(
    config: &BatchConfig,
    mapping: &FormMapping,
    writer: &W,
    row: &Row,
    row_index: usize,
    state: &mut RunState,
) -> RowOutcome {
    let row_error = |kind: RowErrorKind, detail: String| RowError {
        kind,
        row_index,
        detail,
    };

    let file_name = match output_file_name(row, row_index) {
        Ok(name) => name,
        Err(e) => {
            return RowOutcome {
                row_index,
                result: Err(row_error(RowErrorKind::InvalidFilename, e.to_string())),
                issues: Vec::new(),
            }
        }
    };
    let output_path = config.output_dir.join(file_name);

    let transformed = transform_row(row, mapping);
    tracing::debug!("Row {} fields: {:?}", row_index, transformed.fields);

    if state.written.contains(&output_path) {
        tracing::warn!(
            "Row {} overwrites {} written by an earlier row",
            row_index,
            output_path.display()
        );
    }

    let result = if config.dry_run {
        Ok(output_path)
    } else if let Some(detail) = &state.output_dir_error {
        Err(row_error(RowErrorKind::Fill, detail.clone()))
    } else {
        writer
            .fill(&config.template_path, &transformed.fields, &output_path)
            .map(|report| {
                tracing::debug!(
                    "Row {}: {} fields filled, {} skipped",
                    row_index,
                    report.fields_filled,
                    report.fields_skipped.len()
                );
                output_path
            })
            .map_err(|e| row_error(RowErrorKind::Fill, e.to_string()))
    };

    if let Ok(path) = &result {
        state.written.insert(path.clone());
    }

    RowOutcome {
        row_index,
        result,
        issues: transformed.issues,
    }
}
