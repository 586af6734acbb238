//! Integration tests for the batch PDF form filler

use chrono::NaiveDate;
use pdf_form_filler::pdf::{
    extract_form_fields, fill_form_fields, form_field_names, inspect_fields, pdfium_available,
    FillReport, FormFieldInfo, FormWriter, SkippedField,
};
use pdf_form_filler::{
    load_rows, run_batch, BatchConfig, CellValue, Error, FieldIssue, FilledFieldSet,
    FormMapping, PdfiumFormWriter, RowErrorKind,
};
use pretty_assertions::assert_eq;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn fixture_path(name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    path
}

/// Filling real forms needs the PDFium shared library at runtime
fn pdfium_or_skip() -> bool {
    if pdfium_available() {
        true
    } else {
        eprintln!("PDFium library not available, skipping");
        false
    }
}

fn field_values(pairs: &[(&str, &str)]) -> FilledFieldSet {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn find_field<'a>(fields: &'a [FormFieldInfo], terminal: &str) -> &'a FormFieldInfo {
    fields
        .iter()
        .find(|f| {
            f.name
                .as_deref()
                .is_some_and(|n| n.rsplit('.').next() == Some(terminal))
        })
        .unwrap_or_else(|| panic!("field {} not in form", terminal))
}

/// Writes the field set as JSON instead of a PDF and remembers every call
#[derive(Default)]
struct RecordingWriter {
    calls: RefCell<Vec<(PathBuf, FilledFieldSet)>>,
    /// Output file names that should fail to write
    fail_on: Vec<String>,
}

impl FormWriter for RecordingWriter {
    fn fill(
        &self,
        _template: &Path,
        fields: &FilledFieldSet,
        output: &Path,
    ) -> pdf_form_filler::Result<FillReport> {
        let name = output.file_name().unwrap().to_string_lossy().to_string();
        if self.fail_on.contains(&name) {
            return Err(Error::OutputWrite {
                path: output.display().to_string(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
            });
        }

        std::fs::write(output, serde_json::to_vec(fields)?)?;
        self.calls
            .borrow_mut()
            .push((output.to_path_buf(), fields.clone()));

        Ok(FillReport {
            fields_filled: fields.len() as u32,
            fields_skipped: Vec::new(),
        })
    }
}

fn read_fields(path: &Path) -> BTreeMap<String, String> {
    serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap()
}

fn newsletter_mapping() -> FormMapping {
    FormMapping::from_json_str(
        r#"{
            "fields": {
                "Name": "pdf_name_field",
                "Date of Birth": "pdf_dob_field"
            },
            "checkboxes": {
                "Subscribe to Newsletter": {
                    "yes": { "newsletter_yes_checkbox": "/Yes", "newsletter_no_checkbox": "" },
                    "no":  { "newsletter_yes_checkbox": "", "newsletter_no_checkbox": "/Yes" }
                }
            },
            "date_fields": ["Date of Birth"]
        }"#,
    )
    .unwrap()
}

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn config(&self, data_path: PathBuf) -> BatchConfig {
        BatchConfig {
            data_path,
            template_path: self.dir.path().join("template.pdf"),
            output_dir: self.dir.path().join("out"),
            sheet: None,
            dry_run: false,
        }
    }
}

#[test]
fn test_load_csv_rows_in_file_order() {
    let ws = Workspace::new();
    let path = ws.write(
        "people.csv",
        "Name,Year,filename\nAlice,1990,alice\n,,\nBob,,bob\n\"Smith, J\",2001,\n",
    );

    let rows = load_rows(&path, None).unwrap();

    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].get("Name"), Some(&CellValue::Text("Alice".into())));
    assert_eq!(rows[1].get("Year"), Some(&CellValue::Empty));
    assert_eq!(rows[2].get("Name"), Some(&CellValue::Text("Smith, J".into())));
    assert_eq!(rows[2].get("filename"), Some(&CellValue::Empty));
}

#[test]
fn test_load_tsv_rows() {
    let ws = Workspace::new();
    let path = ws.write("people.tsv", "Name\tMake\nAlice\tChevrolet\n");

    let rows = load_rows(&path, None).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("Make"), Some(&CellValue::Text("Chevrolet".into())));
}

#[test]
fn test_load_missing_spreadsheet() {
    let result = load_rows("/nonexistent/PDF Source.xlsx", None);
    assert!(matches!(result, Err(Error::SpreadsheetNotFound { .. })));
}

#[test]
fn test_load_corrupt_workbook() {
    let ws = Workspace::new();
    let path = ws.write("broken.xlsx", "this is not a zip archive");

    let err = load_rows(&path, None).unwrap_err();
    assert!(matches!(err, Error::Load { .. }));
    assert!(err.is_load_error());
}

#[test]
fn test_load_unsupported_extension() {
    let ws = Workspace::new();
    let path = ws.write("notes.txt", "Name\nAlice\n");

    let result = load_rows(&path, None);
    assert!(matches!(result, Err(Error::UnsupportedSpreadsheet { .. })));
}

#[test]
fn test_load_empty_csv_has_no_header() {
    let ws = Workspace::new();
    let path = ws.write("empty.csv", "");

    let result = load_rows(&path, None);
    assert!(matches!(result, Err(Error::Load { .. })));
}

#[test]
fn test_load_workbook_first_sheet_with_typed_cells() {
    let rows = load_rows(fixture_path("vehicles.xlsx"), None).unwrap();

    // The blank spreadsheet line between the two records is skipped
    assert_eq!(rows.len(), 2);
    assert_eq!(
        rows[0].columns().collect::<Vec<_>>(),
        vec![
            "Name(s)",
            "Identifying number",
            "Year",
            "Date in Service",
            "more than $25,000?",
            "filename"
        ]
    );
    assert_eq!(
        rows[0].get("Name(s)"),
        Some(&CellValue::Text("Alice Smith".into()))
    );
    assert_eq!(rows[0].get("Year"), Some(&CellValue::Float(2023.0)));
    assert_eq!(
        rows[0].get("Date in Service"),
        Some(&CellValue::DateTime(
            NaiveDate::from_ymd_opt(2023, 3, 15)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        ))
    );
    assert_eq!(rows[0].get("more than $25,000?"), Some(&CellValue::Bool(true)));
    assert_eq!(rows[1].get("more than $25,000?"), Some(&CellValue::Text("No".into())));
}

#[test]
fn test_load_workbook_named_sheet() {
    let rows = load_rows(fixture_path("vehicles.xlsx"), Some("Notes")).unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(
        rows[0].get("Comment"),
        Some(&CellValue::Text("not the data sheet".into()))
    );
}

#[test]
fn test_load_workbook_unknown_sheet() {
    let err = load_rows(fixture_path("vehicles.xlsx"), Some("Missing")).unwrap_err();
    assert!(matches!(err, Error::Load { .. }));
    assert!(err.to_string().contains("Missing"));
}

#[test]
fn test_batch_from_workbook_with_default_mapping() {
    let ws = Workspace::new();
    let writer = RecordingWriter::default();

    let summary = run_batch(
        &ws.config(fixture_path("vehicles.xlsx")),
        &FormMapping::default(),
        &writer,
    )
    .unwrap();

    assert_eq!(summary.succeeded(), 2);
    let out = ws.dir.path().join("out");

    let alice = read_fields(&out.join("alice.pdf"));
    assert_eq!(alice["f1_01[0]"], "Alice Smith");
    assert_eq!(alice["f1_03[0]"], "2023");
    assert_eq!(alice["f1_07[0]"], "03/15/2023");
    assert_eq!(alice["c1_1[0]"], "/1");
    assert_eq!(alice["c1_1[1]"], "");

    let bob = read_fields(&out.join("bob.pdf"));
    assert_eq!(bob["f1_07[0]"], "07/25/2022");
    assert_eq!(bob["c1_1[0]"], "");
    assert_eq!(bob["c1_1[1]"], "/2");
}

#[test]
fn test_batch_alice_scenario() {
    let ws = Workspace::new();
    let data = ws.write(
        "people.csv",
        "Name,Date of Birth,Subscribe to Newsletter,filename\n\
         Alice,1990-05-02,Yes,alice\n",
    );
    let writer = RecordingWriter::default();

    let summary = run_batch(&ws.config(data), &newsletter_mapping(), &writer).unwrap();

    assert_eq!(summary.total(), 1);
    assert_eq!(summary.succeeded(), 1);

    let output = ws.dir.path().join("out").join("alice.pdf");
    assert!(output.exists());

    let expected: BTreeMap<String, String> = [
        ("pdf_name_field", "Alice"),
        ("pdf_dob_field", "05/02/1990"),
        ("newsletter_yes_checkbox", "/Yes"),
        ("newsletter_no_checkbox", ""),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    assert_eq!(read_fields(&output), expected);
}

#[test]
fn test_batch_unrecognized_checkbox_still_writes_row() {
    let ws = Workspace::new();
    let data = ws.write(
        "people.csv",
        "Name,Date of Birth,Subscribe to Newsletter\nCarol,1990-05-02,maybe\n",
    );
    let writer = RecordingWriter::default();

    let summary = run_batch(&ws.config(data), &newsletter_mapping(), &writer).unwrap();

    assert_eq!(summary.succeeded(), 1);
    let outcome = &summary.outcomes[0];
    assert_eq!(
        outcome.issues,
        vec![FieldIssue::CheckboxValue {
            column: "Subscribe to Newsletter".to_string(),
            value: "maybe".to_string(),
        }]
    );

    let fields = read_fields(&ws.dir.path().join("out").join("output_1.pdf"));
    assert_eq!(fields.get("pdf_name_field").map(String::as_str), Some("Carol"));
    assert!(!fields.contains_key("newsletter_yes_checkbox"));
    assert!(!fields.contains_key("newsletter_no_checkbox"));
}

#[test]
fn test_batch_bad_date_does_not_stop_later_rows() {
    let ws = Workspace::new();
    let data = ws.write(
        "people.csv",
        "Name,Date of Birth,Subscribe to Newsletter\n\
         Dave,not a date,no\n\
         Erin,1985-11-30,yes\n",
    );
    let writer = RecordingWriter::default();

    let summary = run_batch(&ws.config(data), &newsletter_mapping(), &writer).unwrap();

    assert_eq!(summary.succeeded(), 2);
    assert!(matches!(
        summary.outcomes[0].issues[0],
        FieldIssue::DateParse { .. }
    ));

    let out = ws.dir.path().join("out");
    let first = read_fields(&out.join("output_1.pdf"));
    assert!(!first.contains_key("pdf_dob_field"));
    let second = read_fields(&out.join("output_2.pdf"));
    assert_eq!(second["pdf_dob_field"], "11/30/1985");
}

#[test]
fn test_batch_fill_failure_is_row_scoped() {
    let ws = Workspace::new();
    let data = ws.write(
        "people.csv",
        "Name,filename\nAlice,alice\nBob,bob\nCarol,carol\n",
    );
    let writer = RecordingWriter {
        fail_on: vec!["bob.pdf".to_string()],
        ..Default::default()
    };
    let mapping = FormMapping::from_json_str(r#"{ "fields": { "Name": "name" } }"#).unwrap();

    let summary = run_batch(&ws.config(data), &mapping, &writer).unwrap();

    assert_eq!(summary.total(), 3);
    assert_eq!(summary.succeeded(), 2);
    assert_eq!(summary.failed(), 1);

    let failure = summary.failures().next().unwrap();
    assert_eq!(failure.row_index, 2);
    assert_eq!(failure.kind, RowErrorKind::Fill);

    let written: Vec<String> = summary
        .written()
        .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
        .collect();
    assert_eq!(written, vec!["alice.pdf", "carol.pdf"]);
}

#[test]
fn test_batch_invalid_filename_is_row_scoped() {
    let ws = Workspace::new();
    let data = ws.write("people.csv", "Name,filename\nMallory,../../etc/x\nTrent,\n");
    let writer = RecordingWriter::default();
    let mapping = FormMapping::from_json_str(r#"{ "fields": { "Name": "name" } }"#).unwrap();

    let summary = run_batch(&ws.config(data), &mapping, &writer).unwrap();

    assert_eq!(summary.failed(), 1);
    assert_eq!(
        summary.failures().next().unwrap().kind,
        RowErrorKind::InvalidFilename
    );
    assert!(ws.dir.path().join("out").join("output_2.pdf").exists());
    assert_eq!(writer.calls.borrow().len(), 1);
}

#[test]
fn test_batch_missing_spreadsheet_aborts() {
    let ws = Workspace::new();
    let writer = RecordingWriter::default();

    let err = run_batch(
        &ws.config(ws.dir.path().join("missing.csv")),
        &newsletter_mapping(),
        &writer,
    )
    .unwrap_err();

    assert!(err.is_load_error());
    assert!(writer.calls.borrow().is_empty());
    // The output directory is created before the spreadsheet is read
    assert!(ws.dir.path().join("out").is_dir());
}

#[test]
fn test_batch_unusable_output_dir_fails_each_row() {
    let ws = Workspace::new();
    let data = ws.write("people.csv", "Name\nAlice\nBob\n");
    let mut config = ws.config(data);
    // A regular file where the output directory should be
    config.output_dir = ws.write("out", "not a directory");
    let writer = RecordingWriter::default();

    let summary = run_batch(&config, &newsletter_mapping(), &writer).unwrap();

    assert_eq!(summary.total(), 2);
    assert_eq!(summary.failed(), 2);
    assert!(summary.failures().all(|f| f.kind == RowErrorKind::Fill));
    assert!(summary
        .failures()
        .all(|f| f.detail.contains("Failed to create output directory")));
    assert!(writer.calls.borrow().is_empty());
}

#[test]
fn test_batch_dry_run_writes_nothing() {
    let ws = Workspace::new();
    let data = ws.write("people.csv", "Name,filename\nAlice,alice\nBob,\n");
    let mut config = ws.config(data);
    config.dry_run = true;
    let writer = RecordingWriter::default();

    let summary = run_batch(&config, &newsletter_mapping(), &writer).unwrap();

    assert_eq!(summary.succeeded(), 2);
    assert!(writer.calls.borrow().is_empty());
    assert!(!ws.dir.path().join("out").exists());

    let planned: Vec<PathBuf> = summary.written().map(Path::to_path_buf).collect();
    let out = ws.dir.path().join("out");
    assert_eq!(planned, vec![out.join("alice.pdf"), out.join("output_2.pdf")]);
}

#[test]
fn test_batch_duplicate_filenames_last_row_wins() {
    let ws = Workspace::new();
    let data = ws.write("people.csv", "Name,filename\nFirst,same\nSecond,same.pdf\n");
    let writer = RecordingWriter::default();
    let mapping = FormMapping::from_json_str(r#"{ "fields": { "Name": "name" } }"#).unwrap();

    let summary = run_batch(&ws.config(data), &mapping, &writer).unwrap();

    assert_eq!(summary.succeeded(), 2);
    let fields = read_fields(&ws.dir.path().join("out").join("same.pdf"));
    assert_eq!(fields["name"], "Second");
}

#[test]
fn test_batch_is_deterministic() {
    let ws = Workspace::new();
    let data = ws.write(
        "people.csv",
        "Name,Date of Birth,Subscribe to Newsletter\nAlice,05/02/1990, yes \n",
    );
    let mapping = newsletter_mapping();

    let first = RecordingWriter::default();
    run_batch(&ws.config(data.clone()), &mapping, &first).unwrap();
    let second = RecordingWriter::default();
    run_batch(&ws.config(data), &mapping, &second).unwrap();

    assert_eq!(first.calls.into_inner(), second.calls.into_inner());
}

#[test]
fn test_pdfium_writer_reports_missing_template_per_row() {
    let ws = Workspace::new();
    let data = ws.write("people.csv", "Name\nAlice\nBob\n");

    // template.pdf is never created, so every row fails to fill
    let summary = run_batch(
        &ws.config(data),
        &newsletter_mapping(),
        &PdfiumFormWriter::new(),
    )
    .unwrap();

    assert_eq!(summary.total(), 2);
    assert_eq!(summary.failed(), 2);
    assert!(summary.failures().all(|f| f.kind == RowErrorKind::Fill));
}

#[test]
fn test_inspect_fields_missing_template() {
    let result = inspect_fields("/nonexistent/form.pdf", None);
    assert!(matches!(result, Err(Error::TemplateNotFound { .. })));
}

#[test]
fn test_fill_form_round_trip() {
    if !pdfium_or_skip() {
        return;
    }
    let template = std::fs::read(fixture_path("form.pdf")).unwrap();
    let values = field_values(&[
        ("f1_01[0]", "Alice Smith"),
        ("topmostSubform[0].Page1[0].f1_07[0]", "03/15/2023"),
        ("c1_1[0]", "/1"),
        ("c1_1[1]", ""),
        ("nonexistent_field", "ignored"),
    ]);

    let (bytes, report) = fill_form_fields(&template, None, &values).unwrap();

    assert_eq!(report.fields_filled, 4);
    assert_eq!(
        report.fields_skipped,
        vec![SkippedField {
            name: "nonexistent_field".to_string(),
            reason: "Field not found in PDF".to_string(),
        }]
    );

    let fields = extract_form_fields(&bytes, None).unwrap();
    assert_eq!(
        find_field(&fields, "f1_01[0]").value.as_deref(),
        Some("Alice Smith")
    );
    assert_eq!(
        find_field(&fields, "f1_07[0]").value.as_deref(),
        Some("03/15/2023")
    );
    // Fields absent from the value set keep the template's defaults
    assert_eq!(
        find_field(&fields, "f1_04[0]").value.as_deref(),
        Some("Template make")
    );
    assert_eq!(find_field(&fields, "c1_1[0]").is_checked, Some(true));
    assert_eq!(find_field(&fields, "c1_1[1]").is_checked, Some(false));
    assert_eq!(find_field(&fields, "c1_2[0]").is_checked, Some(false));
}

#[test]
fn test_fill_form_rejects_unknown_export_value() {
    if !pdfium_or_skip() {
        return;
    }
    let template = std::fs::read(fixture_path("form.pdf")).unwrap();

    let (bytes, report) =
        fill_form_fields(&template, None, &field_values(&[("c1_2[0]", "/Yes")])).unwrap();

    assert_eq!(report.fields_filled, 0);
    assert_eq!(report.fields_skipped.len(), 1);
    assert_eq!(report.fields_skipped[0].name, "c1_2[0]");
    assert!(report.fields_skipped[0].reason.contains("/1"));

    let fields = extract_form_fields(&bytes, None).unwrap();
    assert_eq!(find_field(&fields, "c1_2[0]").is_checked, Some(false));
}

#[test]
fn test_fill_form_radio_cannot_be_cleared() {
    if !pdfium_or_skip() {
        return;
    }
    let template = std::fs::read(fixture_path("form.pdf")).unwrap();

    let (_, report) =
        fill_form_fields(&template, None, &field_values(&[("r1[0]", "")])).unwrap();

    assert_eq!(report.fields_filled, 0);
    assert_eq!(
        report.fields_skipped,
        vec![SkippedField {
            name: "r1[0]".to_string(),
            reason: "Radio button can only be selected, not cleared".to_string(),
        }]
    );
}

#[test]
fn test_inspect_fixture_form() {
    if !pdfium_or_skip() {
        return;
    }
    let template = std::fs::read(fixture_path("form.pdf")).unwrap();
    let fields = extract_form_fields(&template, None).unwrap();

    let required = find_field(&fields, "f1_01[0]");
    assert_eq!(required.field_type, "text");
    assert!(required.is_required);
    assert!(!required.is_read_only);

    let read_only = find_field(&fields, "f2_01[0]");
    assert!(read_only.is_read_only);
    assert!(!read_only.is_required);

    assert_eq!(find_field(&fields, "c1_1[0]").field_type, "checkbox");
    assert_eq!(find_field(&fields, "r1[0]").field_type, "radio_button");

    // PDFium and the form dictionary agree on fully qualified names
    let dictionary_names = form_field_names(&template).unwrap();
    let names = inspect_fields(fixture_path("form.pdf"), None).unwrap();
    assert!(names.contains("topmostSubform[0].Page1[0].c1_1[0]"));
    for name in &names {
        assert!(dictionary_names.contains(name), "{} missing", name);
    }
}

#[test]
fn test_pdfium_batch_from_workbook() {
    if !pdfium_or_skip() {
        return;
    }
    let ws = Workspace::new();
    let mut config = ws.config(fixture_path("vehicles.xlsx"));
    config.template_path = fixture_path("form.pdf");

    let summary = run_batch(&config, &FormMapping::default(), &PdfiumFormWriter::new()).unwrap();
    assert_eq!(summary.succeeded(), 2);

    let out = ws.dir.path().join("out");
    let alice = extract_form_fields(&std::fs::read(out.join("alice.pdf")).unwrap(), None).unwrap();
    assert_eq!(
        find_field(&alice, "f1_01[0]").value.as_deref(),
        Some("Alice Smith")
    );
    assert_eq!(
        find_field(&alice, "f1_07[0]").value.as_deref(),
        Some("03/15/2023")
    );
    assert_eq!(find_field(&alice, "c1_1[0]").is_checked, Some(true));
    assert_eq!(find_field(&alice, "c1_1[1]").is_checked, Some(false));

    let bob = extract_form_fields(&std::fs::read(out.join("bob.pdf")).unwrap(), None).unwrap();
    assert_eq!(find_field(&bob, "c1_1[0]").is_checked, Some(false));
    assert_eq!(find_field(&bob, "c1_1[1]").is_checked, Some(true));
}
