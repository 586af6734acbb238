//! PDF processing layer
//!
//! This module provides AcroForm inspection and filling using PDFium, with a
//! `lopdf` pass for the form dictionary entries PDFium cannot write.

mod acroform;
mod form;
mod writer;

pub use acroform::{finish_form, form_field_names, CheckboxUpdate};
pub use form::{
    extract_form_fields, fill_form_fields, inspect_fields, is_checked_value, load_template,
    pdfium_available, FillReport, FormFieldInfo, SkippedField,
};
pub use writer::{FormWriter, PdfiumFormWriter};
