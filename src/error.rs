//! Error types for the PDF form filler

use thiserror::Error;

/// Result type alias for the PDF form filler
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the PDF form filler
#[derive(Error, Debug)]
pub enum Error {
    /// Spreadsheet file not found
    #[error("Spreadsheet not found: {path}")]
    SpreadsheetNotFound { path: String },

    /// Spreadsheet could not be read or parsed as a table
    #[error("Failed to load spreadsheet {path}: {reason}")]
    Load { path: String, reason: String },

    /// Spreadsheet extension is not one we know how to read
    #[error("Unsupported spreadsheet format: {path}")]
    UnsupportedSpreadsheet { path: String },

    /// PDF template not found
    #[error("PDF template not found: {path}")]
    TemplateNotFound { path: String },

    /// Invalid PDF file
    #[error("Invalid PDF file: {reason}")]
    InvalidPdf { reason: String },

    /// PDF is password protected and no password was provided
    #[error("PDF is password protected")]
    PasswordRequired,

    /// PDFium error
    #[error("PDFium error: {reason}")]
    Pdfium { reason: String },

    /// Form dictionary could not be parsed or updated
    #[error("PDF structure error: {reason}")]
    PdfStructure { reason: String },

    /// Filled PDF could not be written
    #[error("Failed to write {path}: {source}")]
    OutputWrite {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Mapping configuration is inconsistent
    #[error("Invalid mapping configuration: {reason}")]
    Config { reason: String },

    /// A row's `filename` value cannot be used as an output file name
    #[error("Invalid output file name: {name:?}")]
    InvalidFilename { name: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Whether this error comes from loading the spreadsheet.
    ///
    /// Load errors are the only ones that abort a whole batch.
    pub fn is_load_error(&self) -> bool {
        matches!(
            self,
            Error::SpreadsheetNotFound { .. }
                | Error::Load { .. }
                | Error::UnsupportedSpreadsheet { .. }
        )
    }

    /// Whether this error comes from opening the template or writing the output.
    pub fn is_fill_error(&self) -> bool {
        matches!(
            self,
            Error::TemplateNotFound { .. }
                | Error::InvalidPdf { .. }
                | Error::PasswordRequired
                | Error::Pdfium { .. }
                | Error::PdfStructure { .. }
                | Error::OutputWrite { .. }
        )
    }
}
