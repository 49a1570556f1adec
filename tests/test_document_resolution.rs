//! Cross-reference chains and object resolution through `PdfDocument`.

mod common;

use common::{analyze, minimal_pdf, PdfBuilder};
use pdf_probe::xref::SectionKind;
use pdf_probe::{MessageId, Object, PdfDocument, PropertyValue, ValidationOptions, Validity};
use std::io::Cursor;
use std::rc::Rc;

fn load(data: Vec<u8>) -> PdfDocument<Cursor<Vec<u8>>> {
    PdfDocument::load(Cursor::new(data), ValidationOptions::default())
}

fn media_box_width(object: &Object) -> Option<i64> {
    object.get("MediaBox")?.as_array()?.get(2)?.as_integer()
}

// ============================================================================
// Incremental updates
// ============================================================================

fn updated_pdf() -> Vec<u8> {
    PdfBuilder::new("1.4")
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>")
        .object(3, "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Resources << >> >>")
        .classic_xref("/Root 1 0 R")
        .object(3, "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 595 842] /Resources << >> >>")
        .classic_xref("/Root 1 0 R")
        .finish()
}

#[test]
fn test_newest_section_wins() {
    let mut doc = load(updated_pdf());
    assert!(doc.structure_read());
    assert_eq!(doc.xref_sections(), 2);
    let page = doc.resolve(3, 0);
    assert_eq!(media_box_width(&page), Some(595));
}

#[test]
fn test_trailer_root_inherited_from_older_section() {
    let data = PdfBuilder::new("1.4")
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(2, "<< /Type /Pages /Kids [] /Count 0 >>")
        .classic_xref("/Root 1 0 R")
        .object(2, "<< /Type /Pages /Kids [] /Count 0 >>")
        .classic_xref("")
        .finish();
    let report = analyze(data);
    assert_eq!(report.well_formed(), Validity::True, "{:?}", report.messages());
    assert!(!report.has_message(MessageId::RootMissing));
}

#[test]
fn test_incremental_updates_property() {
    let report = analyze(updated_pdf());
    assert_eq!(
        report.property("IncrementalUpdates"),
        Some(&PropertyValue::Integer(1))
    );
    assert_eq!(report.valid(), Validity::True, "{:?}", report.messages());
}

#[test]
fn test_circular_prev_terminates() {
    let mut data = minimal_pdf("1.4");
    let at = data.len();
    data.extend_from_slice(
        format!(
            "xref\n0 1\n0000000000 65535 f\r\ntrailer\n<< /Size 4 /Root 1 0 R /Prev {} >>\nstartxref\n{}\n%%EOF\n",
            at, at
        )
        .as_bytes(),
    );
    let report = analyze(data);
    assert!(report.has_message(MessageId::XrefChainCircular));
    assert_eq!(report.valid(), Validity::False);
}

// ============================================================================
// Resolution
// ============================================================================

#[test]
fn test_resolution_is_cached() {
    let mut doc = load(minimal_pdf("1.4"));
    let first = doc.resolve(1, 0);
    let second = doc.resolve(1, 0);
    assert!(Rc::ptr_eq(&first, &second));
    assert_eq!(first.dict_type(), Some("Catalog"));
}

#[test]
fn test_missing_object_is_null_with_one_diagnostic() {
    let mut doc = load(minimal_pdf("1.4"));
    let first = doc.resolve(40, 0);
    let second = doc.resolve(40, 0);
    assert!(first.is_null());
    assert!(Rc::ptr_eq(&first, &second));
    assert_eq!(doc.report().count_messages(MessageId::MissingObject), 1);
}

#[test]
fn test_wrong_generation_is_missing() {
    let mut doc = load(minimal_pdf("1.4"));
    assert!(doc.resolve(1, 3).is_null());
    assert!(doc.report().has_message(MessageId::MissingObject));
}

// ============================================================================
// Xref streams and object streams
// ============================================================================

fn compressed_pdf() -> Vec<u8> {
    PdfBuilder::new("1.5")
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object_stream(
            5,
            &[
                (2, "<< /Type /Pages /Kids [3 0 R 4 0 R] /Count 2 >>"),
                (3, "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Resources << >> >>"),
                (4, "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Resources << >> >>"),
            ],
        )
        .stream_xref(6, "/Root 1 0 R")
        .finish()
}

#[test]
fn test_objects_resolved_from_object_stream() {
    let mut doc = load(compressed_pdf());
    assert!(doc.structure_read());
    assert_eq!(doc.xref_kinds(), &[SectionKind::Stream]);
    let pages = doc.resolve(2, 0);
    assert_eq!(pages.dict_type(), Some("Pages"));
    assert_eq!(pages.get("Count").and_then(Object::as_integer), Some(2));
    assert_eq!(doc.resolve(4, 0).dict_type(), Some("Page"));
}

#[test]
fn test_compressed_document_is_valid() {
    let report = analyze(compressed_pdf());
    assert_eq!(report.well_formed(), Validity::True, "{:?}", report.messages());
    assert_eq!(report.valid(), Validity::True, "{:?}", report.messages());
    assert_eq!(report.property("PageCount"), Some(&PropertyValue::Integer(2)));
}

#[test]
fn test_stream_update_over_classic_base() {
    let data = PdfBuilder::new("1.5")
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(2, "<< /Type /Pages /Kids [] /Count 0 >>")
        .classic_xref("/Root 1 0 R")
        .object(1, "<< /Type /Catalog /Pages 2 0 R /MarkInfo << /Marked true >> >>")
        .stream_xref(3, "/Root 1 0 R")
        .finish();
    let mut doc = load(data.clone());
    assert_eq!(doc.xref_kinds(), &[SectionKind::Stream, SectionKind::Table]);
    assert!(doc.resolve(1, 0).get("MarkInfo").is_some());

    let report = analyze(data);
    assert_eq!(report.property("Tagged"), Some(&PropertyValue::Bool(true)));
}
