//! AcroForm inspection and filling via PDFium

use super::acroform::finish_form;
use crate::error::{Error, Result};
use crate::transform::FilledFieldSet;
use pdfium_render::prelude::*;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Information about a PDF form field
#[derive(Debug, Clone, Serialize)]
pub struct FormFieldInfo {
    /// Page number (1-indexed)
    pub page: u32,
    /// Fully qualified field name
    pub name: Option<String>,
    /// Field type ("text", "checkbox", "radio_button", "combo_box", "list_box",
    /// "push_button", "signature" or "unknown")
    pub field_type: String,
    /// Current value (for text fields)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Whether checked (for checkbox/radio)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_checked: Option<bool>,
    /// Whether the field is read-only
    pub is_read_only: bool,
    /// Whether the field must have a value before submission
    pub is_required: bool,
}

/// Result of filling form fields
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FillReport {
    /// Number of fields successfully filled
    pub fields_filled: u32,
    /// Fields that could not be filled
    pub fields_skipped: Vec<SkippedField>,
}

/// Info about a field that could not be filled
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedField {
    /// Field name
    pub name: String,
    /// Reason the field was skipped
    pub reason: String,
}

/// Get PDFium instance (creates new instance each time - PDFium is not thread-safe)
fn create_pdfium() -> Result<Pdfium> {
    // Try to bind to system library or use static linking
    let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(
                "/opt/pdfium/lib",
            ))
        })
        .or_else(|_| Pdfium::bind_to_system_library())
        .map_err(|e| Error::Pdfium {
            reason: format!("Failed to initialize PDFium: {}", e),
        })?;

    Ok(Pdfium::new(bindings))
}

/// Whether a PDFium library can be bound on this machine
pub fn pdfium_available() -> bool {
    create_pdfium().is_ok()
}

fn map_pdfium_error(e: PdfiumError) -> Error {
    match e {
        PdfiumError::PdfiumLibraryInternalError(PdfiumInternalError::PasswordError) => {
            Error::PasswordRequired
        }
        _ => Error::Pdfium {
            reason: format!("{}", e),
        },
    }
}

fn check_pdf_header(data: &[u8]) -> Result<()> {
    if data.len() < 4 || &data[0..4] != b"%PDF" {
        return Err(Error::InvalidPdf {
            reason: "Not a valid PDF file".to_string(),
        });
    }
    Ok(())
}

/// Read a template from disk and check that it looks like a PDF
pub fn load_template<P: AsRef<Path>>(path: P) -> Result<Vec<u8>> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(Error::TemplateNotFound {
            path: path.display().to_string(),
        });
    }

    let data = std::fs::read(path).map_err(|e| Error::InvalidPdf {
        reason: format!("Failed to read {}: {}", path.display(), e),
    })?;
    check_pdf_header(&data)?;
    Ok(data)
}

/// True when a value should leave a checkbox or radio button selected.
///
/// Any non-empty export value counts, except the conventional "Off" state.
pub fn is_checked_value(value: &str) -> bool {
    let value = value.trim();
    let bare = value.strip_prefix('/').unwrap_or(value);
    !bare.is_empty() && !bare.eq_ignore_ascii_case("off")
}

/// Find the requested entry for a fully qualified field name.
///
/// PDFium reports names like `topmostSubform[0].Page1[0].f1_01[0]`; mappings
/// may use either that or just the terminal part (`f1_01[0]`). An exact
/// match wins.
fn lookup_field<'v>(values: &'v FilledFieldSet, full_name: &str) -> Option<(&'v str, &'v str)> {
    if let Some((k, v)) = values.get_key_value(full_name) {
        return Some((k.as_str(), v.as_str()));
    }
    let terminal = full_name.rsplit('.').next()?;
    values
        .get_key_value(terminal)
        .map(|(k, v)| (k.as_str(), v.as_str()))
}

/// Extract form fields from PDF bytes
pub fn extract_form_fields(data: &[u8], password: Option<&str>) -> Result<Vec<FormFieldInfo>> {
    check_pdf_header(data)?;

    let pdfium = create_pdfium()?;

    let document = pdfium
        .load_pdf_from_byte_slice(data, password)
        .map_err(map_pdfium_error)?;

    let mut fields = Vec::new();
    let pages = document.pages();

    for page_index in 0..pages.len() {
        let page_num = page_index as u32 + 1;
        let page = pages.get(page_index).map_err(|e| Error::Pdfium {
            reason: format!("Failed to get page {}: {}", page_num, e),
        })?;

        for annotation in page.annotations().iter() {
            if let Some(field) = annotation.as_form_field() {
                let mut info = FormFieldInfo {
                    page: page_num,
                    name: field.name(),
                    field_type: String::new(),
                    value: None,
                    is_checked: None,
                    is_read_only: field.is_read_only(),
                    is_required: field.is_required(),
                };

                if let Some(text_field) = field.as_text_field() {
                    info.field_type = "text".to_string();
                    info.value = text_field.value();
                } else if let Some(checkbox) = field.as_checkbox_field() {
                    info.field_type = "checkbox".to_string();
                    info.is_checked = checkbox.is_checked().ok();
                } else if let Some(radio) = field.as_radio_button_field() {
                    info.field_type = "radio_button".to_string();
                    info.is_checked = radio.is_checked().ok();
                } else if field.as_combo_box_field().is_some() {
                    info.field_type = "combo_box".to_string();
                } else if field.as_list_box_field().is_some() {
                    info.field_type = "list_box".to_string();
                } else if field.as_push_button_field().is_some() {
                    info.field_type = "push_button".to_string();
                } else if field.as_signature_field().is_some() {
                    info.field_type = "signature".to_string();
                } else {
                    info.field_type = "unknown".to_string();
                }

                fields.push(info);
            }
        }
    }

    Ok(fields)
}

/// Names of every form field in a template, for configuration debugging
pub fn inspect_fields<P: AsRef<Path>>(
    template: P,
    password: Option<&str>,
) -> Result<BTreeSet<String>> {
    let data = load_template(template)?;
    let names = extract_form_fields(&data, password)?
        .into_iter()
        .filter_map(|f| f.name)
        .collect();
    Ok(names)
}

/// Fill form fields in a PDF and return the modified PDF bytes.
///
/// Each call loads its own document from `data`, so nothing carries over
/// between calls. Names in `values` that match no field are reported in the
/// returned [`FillReport`] rather than failing the fill.
///
/// Text fields and radio buttons are written through PDFium. Checkbox values
/// are export names (`/1`, `/Yes`, `""` for unchecked) and are written by
/// [`finish_form`] after PDFium saves, which also asks viewers to redraw
/// field appearances.
pub fn fill_form_fields(
    data: &[u8],
    password: Option<&str>,
    values: &FilledFieldSet,
) -> Result<(Vec<u8>, FillReport)> {
    check_pdf_header(data)?;

    let pdfium = create_pdfium()?;

    let document = pdfium
        .load_pdf_from_byte_slice(data, password)
        .map_err(map_pdfium_error)?;

    let mut applied: BTreeSet<&str> = BTreeSet::new();
    let mut fields_skipped: Vec<SkippedField> = Vec::new();
    // Checkbox values by fully qualified name, plus the name each was requested as
    let mut checkboxes: BTreeMap<String, String> = BTreeMap::new();
    let mut checkbox_requests: BTreeMap<String, &str> = BTreeMap::new();

    let pages = document.pages();

    for page_index in 0..pages.len() {
        let page = pages.get(page_index).map_err(|e| Error::Pdfium {
            reason: format!("Failed to get page {}: {}", page_index + 1, e),
        })?;

        for mut annotation in page.annotations().iter() {
            let Some(field) = annotation.as_form_field_mut() else {
                continue;
            };
            let Some(full_name) = field.name() else {
                continue;
            };
            let Some((requested, value)) = lookup_field(values, &full_name) else {
                continue;
            };

            let outcome = if let Some(text_field) = field.as_text_field_mut() {
                text_field
                    .set_value(value)
                    .map_err(|e| format!("Failed to set value: {}", e))
            } else if field.as_checkbox_field_mut().is_some() {
                checkboxes.insert(full_name.clone(), value.to_string());
                checkbox_requests.insert(full_name, requested);
                continue;
            } else if let Some(radio) = field.as_radio_button_field_mut() {
                if is_checked_value(value) {
                    radio
                        .set_checked()
                        .map_err(|e| format!("Failed to select radio: {}", e))
                } else {
                    Err("Radio button can only be selected, not cleared".to_string())
                }
            } else {
                Err("Unsupported field type for writing".to_string())
            };

            match outcome {
                Ok(()) => {
                    tracing::debug!("Set field '{}' = {:?}", full_name, value);
                    applied.insert(requested);
                }
                Err(reason) => skip_field(&mut fields_skipped, requested, reason),
            }
        }
    }

    // Save the modified PDF to bytes
    let saved = document.save_to_bytes().map_err(|e| Error::Pdfium {
        reason: format!("Failed to save modified PDF: {}", e),
    })?;

    let (output_bytes, update) = finish_form(&saved, &checkboxes)?;

    for full_name in &update.set {
        if let Some(&requested) = checkbox_requests.get(full_name) {
            tracing::debug!("Set checkbox '{}' = {:?}", full_name, checkboxes[full_name]);
            applied.insert(requested);
        }
    }
    for (full_name, reason) in update.rejected {
        let requested = checkbox_requests
            .get(&full_name)
            .copied()
            .unwrap_or(full_name.as_str());
        skip_field(&mut fields_skipped, requested, reason);
    }

    // Report any remaining unmatched field names
    for name in values.keys() {
        let name = name.as_str();
        if !applied.contains(name) {
            skip_field(&mut fields_skipped, name, "Field not found in PDF".to_string());
        }
    }
    fields_skipped.retain(|s| !applied.contains(s.name.as_str()));

    Ok((
        output_bytes,
        FillReport {
            fields_filled: applied.len() as u32,
            fields_skipped,
        },
    ))
}

/// Record a skipped field once, keeping the first reason
fn skip_field(skipped: &mut Vec<SkippedField>, name: &str, reason: String) {
    if !skipped.iter().any(|s| s.name == name) {
        skipped.push(SkippedField {
            name: name.to_string(),
            reason,
        });
    }
}
