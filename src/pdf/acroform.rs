//! Form dictionary edits that PDFium does not expose
//!
//! PDFium can only toggle a checkbox to `/Yes`, and it does not regenerate
//! appearance streams for the values it writes. After PDFium saves a
//! filled form, this pass reopens it with `lopdf` to:
//! - write each checkbox's configured export name into `/V` and `/AS`
//! - set `/AcroForm /NeedAppearances true` so viewers redraw field values

use super::form::is_checked_value;
use crate::error::{Error, Result};
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::BTreeMap;

const OFF_STATE: &[u8] = b"Off";

/// Guards against cyclic `/Kids` chains in malformed files
const MAX_FIELD_DEPTH: usize = 32;

/// What the dictionary pass did with the requested checkbox states
#[derive(Debug, Default, PartialEq)]
pub struct CheckboxUpdate {
    /// Fully qualified names of checkboxes now in the requested state
    pub set: Vec<String>,
    /// Fully qualified names left untouched, with the reason
    pub rejected: Vec<(String, String)>,
}

fn structure_error(context: &str, e: impl std::fmt::Display) -> Error {
    Error::PdfStructure {
        reason: format!("{}: {}", context, e),
    }
}

/// Apply checkbox states and request appearance regeneration.
///
/// `checkboxes` maps fully qualified field names to the value to store: an
/// export value such as `/1` checks the box, `""` or `Off` clears it.
pub fn finish_form(
    data: &[u8],
    checkboxes: &BTreeMap<String, String>,
) -> Result<(Vec<u8>, CheckboxUpdate)> {
    let mut doc =
        Document::load_mem(data).map_err(|e| structure_error("Failed to parse filled PDF", e))?;

    let mut update = CheckboxUpdate::default();

    if doc.trailer.has(b"Encrypt") {
        for name in checkboxes.keys() {
            update.rejected.push((
                name.clone(),
                "Checkbox states cannot be written to an encrypted document".to_string(),
            ));
        }
        return Ok((data.to_vec(), update));
    }

    let Some(location) = acroform_location(&doc) else {
        for name in checkboxes.keys() {
            update
                .rejected
                .push((name.clone(), "Document has no interactive form".to_string()));
        }
        return Ok((data.to_vec(), update));
    };

    let fields = field_index(&doc, &location);

    for (name, value) in checkboxes {
        let Some(&field_id) = fields.get(name) else {
            update
                .rejected
                .push((name.clone(), "Field not found in form dictionary".to_string()));
            continue;
        };
        match set_checkbox(&mut doc, field_id, value) {
            Ok(()) => update.set.push(name.clone()),
            Err(reason) => update.rejected.push((name.clone(), reason)),
        }
    }

    acroform_mut(&mut doc, &location)?.set("NeedAppearances", Object::Boolean(true));

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)
        .map_err(|e| structure_error("Failed to save filled PDF", e))?;

    Ok((bytes, update))
}

/// Fully qualified names of every field in the form dictionary
pub fn form_field_names(data: &[u8]) -> Result<Vec<String>> {
    let doc =
        Document::load_mem(data).map_err(|e| structure_error("Failed to parse PDF", e))?;
    Ok(match acroform_location(&doc) {
        Some(location) => field_index(&doc, &location).into_keys().collect(),
        None => Vec::new(),
    })
}

enum AcroFormLocation {
    /// `/AcroForm` is an indirect object
    Indirect(ObjectId),
    /// `/AcroForm` is a dictionary inside the catalog with this id
    Inline(ObjectId),
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

fn acroform_location(doc: &Document) -> Option<AcroFormLocation> {
    let catalog_id = doc.trailer.get(b"Root").ok()?.as_reference().ok()?;
    let catalog = doc.get_object(catalog_id).ok()?.as_dict().ok()?;
    match catalog.get(b"AcroForm").ok()? {
        Object::Reference(id) => Some(AcroFormLocation::Indirect(*id)),
        Object::Dictionary(_) => Some(AcroFormLocation::Inline(catalog_id)),
        _ => None,
    }
}

fn acroform<'a>(doc: &'a Document, location: &AcroFormLocation) -> Option<&'a Dictionary> {
    match location {
        AcroFormLocation::Indirect(id) => doc.get_object(*id).ok()?.as_dict().ok(),
        AcroFormLocation::Inline(catalog_id) => doc
            .get_object(*catalog_id)
            .ok()?
            .as_dict()
            .ok()?
            .get(b"AcroForm")
            .ok()?
            .as_dict()
            .ok(),
    }
}

fn acroform_mut<'a>(
    doc: &'a mut Document,
    location: &AcroFormLocation,
) -> Result<&'a mut Dictionary> {
    let dict = match location {
        AcroFormLocation::Indirect(id) => doc.get_object_mut(*id).and_then(|o| o.as_dict_mut()),
        AcroFormLocation::Inline(catalog_id) => doc
            .get_object_mut(*catalog_id)
            .and_then(|o| o.as_dict_mut())
            .and_then(|catalog| catalog.get_mut(b"AcroForm"))
            .and_then(|o| o.as_dict_mut()),
    };
    dict.map_err(|e| structure_error("Failed to update /AcroForm", e))
}

fn references(doc: &Document, obj: &Object) -> Vec<ObjectId> {
    resolve(doc, obj)
        .and_then(|o| o.as_array().ok())
        .map(|items| items.iter().filter_map(|o| o.as_reference().ok()).collect())
        .unwrap_or_default()
}

/// Decode a PDF text string (UTF-16BE with BOM, otherwise byte-per-char)
fn decode_text(bytes: &[u8]) -> String {
    match bytes {
        [0xFE, 0xFF, rest @ ..] => {
            let units: Vec<u16> = rest
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16_lossy(&units)
        }
        _ => bytes.iter().map(|&b| b as char).collect(),
    }
}

fn partial_name(dict: &Dictionary) -> Option<String> {
    dict.get(b"T").ok()?.as_str().ok().map(decode_text)
}

/// Map fully qualified field names (`parent.child`) to their field objects
fn field_index(doc: &Document, location: &AcroFormLocation) -> BTreeMap<String, ObjectId> {
    let mut index = BTreeMap::new();
    if let Some(roots) = acroform(doc, location).and_then(|form| form.get(b"Fields").ok()) {
        collect_fields(doc, &references(doc, roots), None, 0, &mut index);
    }
    index
}

fn collect_fields(
    doc: &Document,
    ids: &[ObjectId],
    parent: Option<&str>,
    depth: usize,
    index: &mut BTreeMap<String, ObjectId>,
) {
    if depth > MAX_FIELD_DEPTH {
        return;
    }
    for &id in ids {
        let Ok(dict) = doc.get_object(id).and_then(|o| o.as_dict()) else {
            continue;
        };
        // Kids without /T are widgets of their parent, not fields
        let Some(partial) = partial_name(dict) else {
            continue;
        };
        let name = match parent {
            Some(parent) => format!("{}.{}", parent, partial),
            None => partial,
        };
        if let Ok(kids) = dict.get(b"Kids") {
            collect_fields(doc, &references(doc, kids), Some(&name), depth + 1, index);
        }
        index.insert(name, id);
    }
}

/// Widget annotations of a field: its `/T`-less kids, or the field itself
fn widget_ids(doc: &Document, field_id: ObjectId) -> Vec<ObjectId> {
    let kids: Vec<ObjectId> = doc
        .get_object(field_id)
        .and_then(|o| o.as_dict())
        .ok()
        .and_then(|field| field.get(b"Kids").ok())
        .map(|kids| references(doc, kids))
        .unwrap_or_default()
        .into_iter()
        .filter(|id| {
            doc.get_object(*id)
                .and_then(|o| o.as_dict())
                .map(|d| !d.has(b"T"))
                .unwrap_or(false)
        })
        .collect();

    if kids.is_empty() {
        vec![field_id]
    } else {
        kids
    }
}

/// Appearance states other than `Off` in a widget's normal appearance
fn on_states(doc: &Document, widget: &Dictionary) -> Option<Vec<Vec<u8>>> {
    let appearance = resolve(doc, widget.get(b"AP").ok()?)?.as_dict().ok()?;
    let normal = resolve(doc, appearance.get(b"N").ok()?)?.as_dict().ok()?;
    Some(
        normal
            .iter()
            .map(|(state, _)| state.clone())
            .filter(|state| state.as_slice() != OFF_STATE)
            .collect(),
    )
}

/// Export name to store for a requested value, `None` meaning unchecked
fn export_name(value: &str) -> Option<Vec<u8>> {
    if !is_checked_value(value) {
        return None;
    }
    let value = value.trim();
    Some(value.strip_prefix('/').unwrap_or(value).as_bytes().to_vec())
}

fn set_checkbox(
    doc: &mut Document,
    field_id: ObjectId,
    value: &str,
) -> std::result::Result<(), String> {
    let requested = export_name(value);
    let widgets = widget_ids(doc, field_id);

    let mut states = Vec::with_capacity(widgets.len());
    let mut known: Vec<String> = Vec::new();
    let mut matched = requested.is_none();

    for id in widgets {
        let widget = doc
            .get_object(id)
            .and_then(|o| o.as_dict())
            .map_err(|e| format!("Unreadable widget: {}", e))?;
        let state = match (&requested, on_states(doc, widget)) {
            (None, _) => OFF_STATE.to_vec(),
            (Some(name), Some(available)) if !available.contains(name) => {
                known.extend(
                    available
                        .iter()
                        .map(|s| format!("/{}", String::from_utf8_lossy(s))),
                );
                OFF_STATE.to_vec()
            }
            (Some(name), _) => {
                matched = true;
                name.clone()
            }
        };
        states.push((id, state));
    }

    if !matched {
        known.sort();
        known.dedup();
        return Err(format!(
            "Export value {:?} is not an on state of this checkbox (available: {})",
            value,
            known.join(", ")
        ));
    }

    let field_value = requested.unwrap_or_else(|| OFF_STATE.to_vec());
    doc.get_object_mut(field_id)
        .and_then(|o| o.as_dict_mut())
        .map_err(|e| format!("Unwritable field: {}", e))?
        .set("V", Object::Name(field_value));

    for (id, state) in states {
        doc.get_object_mut(id)
            .and_then(|o| o.as_dict_mut())
            .map_err(|e| format!("Unwritable widget: {}", e))?
            .set("AS", Object::Name(state));
    }

    Ok(())
}
