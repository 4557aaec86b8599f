mod common;

use std::cell::Cell;
use std::path::PathBuf;
use std::rc::Rc;

use pdf_retext::{
    BoundingBox, BuiltinFont, Diagnostics, EditError, FontChoice, FontSource, LocateError,
    LocatorConfig, MatchOutcome, PdfEditor, RedactError, Rgb, TextInserter, TextProperties,
    baseline_position,
};

/// Counts lookups and never finds anything.
#[derive(Default)]
struct CountingSource {
    calls: Rc<Cell<usize>>,
}

impl FontSource for CountingSource {
    fn locate(&self, family: &str, _diag: &Diagnostics) -> Result<PathBuf, LocateError> {
        self.calls.set(self.calls.get() + 1);
        Err(LocateError::NotFound {
            family: family.to_owned(),
        })
    }
}

fn offline() -> LocatorConfig {
    LocatorConfig::new()
        .search_dirs(Vec::<PathBuf>::new())
        .downloads(false)
}

#[test_log::test]
fn replaces_every_occurrence_and_saves_beside_source() {
    let dir = tempfile::tempdir().unwrap();
    let path = common::sample_pdf(dir.path());

    let mut editor = PdfEditor::builder().locator(offline()).open(&path).unwrap();
    editor.set_verbose(true);
    let report = editor.edit_text(0, "sensitive", "redacted").unwrap();

    assert_eq!(report.matches.len(), 2);
    assert!(report.is_complete());
    assert_eq!(report.output, dir.path().join("example_edited.pdf"));
    assert!(report.output.exists());
    for outcome in &report.matches {
        match outcome {
            MatchOutcome::Replaced {
                properties, font, ..
            } => {
                assert_eq!(properties.font, "Helvetica");
                assert!((properties.size - 12.).abs() < 1e-6);
                assert_eq!(properties.color, Rgb::BLACK);
                assert_eq!(font, &FontChoice::Builtin(BuiltinFont::Helvetica));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    let mut edited = PdfEditor::open(&report.output).unwrap();
    let text = edited.page_text(0).unwrap();
    assert!(text.contains("redacted"), "{}", text);
    assert!(!text.contains("sensitive"), "{}", text);
    assert!(text.contains("multiple lines of text"), "{}", text);
    assert!(text.contains("information"), "{}", text);
}

#[test]
fn source_file_is_left_alone() {
    let dir = tempfile::tempdir().unwrap();
    let path = common::sample_pdf(dir.path());
    let before = std::fs::read(&path).unwrap();

    let mut editor = PdfEditor::builder().locator(offline()).open(&path).unwrap();
    editor.edit_text(0, "sensitive", "redacted").unwrap();

    assert_eq!(std::fs::read(&path).unwrap(), before);
}

#[test]
fn no_match_still_writes_an_unchanged_copy() {
    let dir = tempfile::tempdir().unwrap();
    let path = common::sample_pdf(dir.path());

    let mut editor = PdfEditor::builder().locator(offline()).open(&path).unwrap();
    let report = editor.edit_text(0, "absent", "anything").unwrap();

    assert!(report.matches.is_empty());
    assert!(report.is_complete());
    let mut copy = PdfEditor::open(&report.output).unwrap();
    assert_eq!(copy.page_count(), 1);
    let text = copy.page_text(0).unwrap();
    for line in common::LINES {
        assert!(text.contains(line), "{:?} missing from {}", line, text);
    }
}

#[test]
fn custom_suffix_names_the_output() {
    let dir = tempfile::tempdir().unwrap();
    let path = common::sample_pdf(dir.path());

    let mut editor = PdfEditor::builder()
        .locator(offline())
        .output_suffix("-v2")
        .open(&path)
        .unwrap();
    let report = editor.edit_text(0, "test", "demo").unwrap();

    assert_eq!(report.output, dir.path().join("example-v2.pdf"));
    assert_eq!(report.replaced(), 1);
}

#[test]
fn page_out_of_range_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = common::sample_pdf(dir.path());

    let mut editor = PdfEditor::builder().locator(offline()).open(&path).unwrap();
    let err = editor.edit_text(3, "sensitive", "redacted").unwrap_err();
    assert!(matches!(
        err,
        EditError::PageOutOfRange {
            page: 3,
            page_count: 1
        }
    ));
    assert!(!dir.path().join("example_edited.pdf").exists());
}

#[test]
fn missing_file_fails_to_open() {
    let dir = tempfile::tempdir().unwrap();
    assert!(PdfEditor::open(dir.path().join("nope.pdf")).is_err());
}

#[test]
fn page_text_follows_reading_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = common::sample_pdf(dir.path());

    let mut editor = PdfEditor::open(&path).unwrap();
    let text = editor.page_text(0).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines, common::LINES);
}

#[test]
fn search_redact_and_insert_through_a_page() {
    let dir = tempfile::tempdir().unwrap();
    let path = common::sample_pdf(dir.path());
    let locator = offline().build();
    let diag = Diagnostics::quiet();

    let mut editor = PdfEditor::open(&path).unwrap();
    let mut page = editor.page(0).unwrap();
    let found = page.search_for("multiple");
    assert_eq!(found.len(), 1);
    let rect = found[0].rect;
    assert_eq!(found[0].page, 0);
    // Second baseline is 700pt up, 92pt down from the top.
    assert!(rect.l > 100.);
    assert!(rect.t > 75. && rect.t < 92.);
    assert!(rect.b > 92. && rect.b < 97.);

    let props = page.extract_properties(&rect);
    page.redact(&rect, Some(Rgb::WHITE), &diag).unwrap();
    assert!(page.search_for("multiple").is_empty());

    let mut inserter = TextInserter::new(&locator);
    let position = baseline_position(&rect, props.size);
    let font = page
        .insert_text(&mut inserter, position, "several", &props, &diag)
        .unwrap();
    assert_eq!(font, FontChoice::Builtin(BuiltinFont::Helvetica));

    let again = page.search_for("several");
    assert_eq!(again.len(), 1);
    assert!((again[0].rect.l - rect.l).abs() < 0.5);
    let inserted = page.extract_properties(&again[0].rect);
    assert_eq!(inserted.font, "Helvetica");
    assert!((inserted.size - props.size).abs() < 1e-6);
}

#[test]
fn empty_region_has_default_properties() {
    let dir = tempfile::tempdir().unwrap();
    let path = common::sample_pdf(dir.path());

    let mut editor = PdfEditor::open(&path).unwrap();
    let page = editor.page(0).unwrap();
    let props = page.extract_properties(&BoundingBox::new(400., 400., 500., 500.));
    assert_eq!(props, TextProperties::default());
    assert_eq!(props.font, "helv");
    assert_eq!(props.size, 11.);
}

#[test_log::test]
fn aliases_never_reach_the_font_source() {
    let source = CountingSource::default();
    let calls = Rc::clone(&source.calls);
    let dir = tempfile::tempdir().unwrap();
    let path = common::sample_pdf(dir.path());

    let mut editor = PdfEditor::builder()
        .font_source(source)
        .open(&path)
        .unwrap();
    let report = editor.edit_text(0, "sensitive", "redacted").unwrap();

    assert_eq!(report.replaced(), 2);
    assert_eq!(calls.get(), 0);
}

#[test]
fn unreachable_font_service_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let locator = LocatorConfig::new()
        .search_dirs([dir.path()])
        .user_font_dir(dir.path())
        .css_endpoint("http://127.0.0.1:9/css")
        .build();

    let located = locator.locate("Some Family That Does Not Exist", &Diagnostics::quiet());
    assert!(located.is_err());
    assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
}

#[test]
fn save_pdf_writes_current_state() {
    let dir = tempfile::tempdir().unwrap();
    let path = common::sample_pdf(dir.path());
    let out = dir.path().join("snapshot.pdf");

    let mut editor = PdfEditor::open(&path).unwrap();
    {
        let mut page = editor.page(0).unwrap();
        let rect = page.search_for("PDFEditor")[0].rect;
        page.redact(&rect, None, &Diagnostics::quiet()).unwrap();
    }
    editor.save_pdf(&out).unwrap();

    let mut saved = PdfEditor::open(&out).unwrap();
    let text = saved.page_text(0).unwrap();
    assert!(!text.contains("PDFEditor"));
    assert!(text.contains("can be edited using"));
    assert_eq!(occurrences(&std::fs::read(&out).unwrap(), b"PDFEditor"), 0);
}

fn occurrences(haystack: &[u8], needle: &[u8]) -> usize {
    haystack.windows(needle.len()).filter(|w| *w == needle).count()
}

#[test]
fn redacted_text_is_gone_from_the_file_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let path = common::sample_pdf(dir.path());
    assert_eq!(occurrences(&std::fs::read(&path).unwrap(), b"sensitive"), 2);

    let mut editor = PdfEditor::builder().locator(offline()).open(&path).unwrap();
    let report = editor.edit_text(0, "sensitive", "redacted").unwrap();
    assert_eq!(report.replaced(), 2);

    let bytes = std::fs::read(&report.output).unwrap();
    assert_eq!(occurrences(&bytes, b"sensitive"), 0);
    assert_eq!(occurrences(&bytes, b"redacted"), 2);
}

#[test_log::test]
fn failed_redaction_skips_to_the_next_match() {
    let dir = tempfile::tempdir().unwrap();
    let path = common::form_pdf(dir.path());

    let mut editor = PdfEditor::builder().locator(offline()).open(&path).unwrap();
    let report = editor.edit_text(0, "sensitive", "redacted").unwrap();

    assert_eq!(report.matches.len(), 2);
    assert!(!report.is_complete());
    assert_eq!(report.replaced(), 1);
    let (in_form, in_page) = (&report.matches[0], &report.matches[1]);
    assert!(
        matches!(
            in_form,
            MatchOutcome::RedactFailed {
                error: RedactError::Unreachable { .. },
                ..
            }
        ),
        "{:?}",
        in_form
    );
    assert!(in_page.is_replaced(), "{:?}", in_page);
    assert!(report.output.exists());

    let mut edited = PdfEditor::open(&report.output).unwrap();
    let text = edited.page_text(0).unwrap();
    assert!(text.contains("sensitive form"), "{}", text);
    assert!(!text.contains("sensitive page"), "{}", text);

    let page = edited.page(0).unwrap();
    let drawn = page.search_for("redacted");
    assert_eq!(drawn.len(), 1);
    let rect = drawn[0].rect;
    assert!((rect.l - in_page.rect().l).abs() < 0.5);
    assert!((rect.t - in_page.rect().t).abs() < 2.);
    assert!(rect.b < in_form.rect().t || rect.t > in_form.rect().b);
}
