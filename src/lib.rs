//! Batch PDF Form Filler Library
//!
//! Fills one copy of a PDF form template per spreadsheet row:
//! - `table`: load spreadsheet rows (xlsx/xls/ods via calamine, csv/tsv)
//! - `mapping`: column-to-field, checkbox and date configuration
//! - `transform`: turn a row into PDF field values
//! - `pdf`: inspect and fill AcroForm fields with PDFium
//! - `batch`: run the whole pipeline and summarize per-row outcomes

pub mod batch;
pub mod error;
pub mod mapping;
pub mod pdf;
pub mod table;
pub mod transform;

pub use batch::{
    output_file_name, run_batch, BatchConfig, BatchSummary, RowError, RowErrorKind, RowOutcome,
};
pub use error::{Error, Result};
pub use mapping::{CheckboxBranches, FormMapping};
pub use pdf::{FormWriter, PdfiumFormWriter};
pub use table::{load_rows, CellValue, Row};
pub use transform::{transform_row, CheckboxChoice, FieldIssue, FilledFieldSet, RowTransform};
