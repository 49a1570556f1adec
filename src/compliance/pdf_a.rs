//! PDF/A-1 level B profile.
//!
//! Checks the document-level requirements of ISO 19005-1:2005 that can be
//! decided from the object graph: file structure (6.1), metadata (6.7),
//! actions (6.6), transparency (6.4) and output intents (6.2.2). Font and
//! colour space programs are not inspected.

use super::{catalog_dict, Profile, ProfileKind, ReasonCollector};
use crate::document::PdfDocument;
use crate::error::Result;
use crate::metadata::parse_pdfa_identification;
use crate::object::{Dictionary, Object};
use crate::report::{Message, MessageId, Validity};
use crate::validators::DocumentTrees;
use std::io::{Read, Seek};

/// PDF/A-1b.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfA1bProfile;

impl Profile for PdfA1bProfile {
    fn kind(&self) -> ProfileKind {
        ProfileKind::PdfA1b
    }

    fn evaluate<R: Read + Seek>(
        &self,
        doc: &mut PdfDocument<R>,
        trees: &DocumentTrees,
        reasons: &mut ReasonCollector,
    ) {
        macro_rules! run_rule {
            ($rule:ident) => {
                reasons.check(stringify!($rule), |r| $rule(doc, trees, r));
            };
        }

        run_rule!(check_well_formed);
        run_rule!(check_version);
        run_rule!(check_binary_marker);
        run_rule!(check_trailer_id);
        run_rule!(check_encryption);
        run_rule!(check_metadata_stream);
        run_rule!(check_identification);
        run_rule!(check_javascript);
        run_rule!(check_additional_actions);
        run_rule!(check_embedded_files);
        run_rule!(check_transparency);
        run_rule!(check_output_intents);
    }
}

fn check_well_formed<R: Read + Seek>(
    doc: &mut PdfDocument<R>,
    _trees: &DocumentTrees,
    r: &mut ReasonCollector,
) -> Result<()> {
    if doc.report().well_formed() == Validity::False || !doc.structure_read() {
        r.fail(MessageId::PdfANotWellFormed, "document is not well-formed");
    }
    Ok(())
}

fn check_version<R: Read + Seek>(
    doc: &mut PdfDocument<R>,
    _trees: &DocumentTrees,
    r: &mut ReasonCollector,
) -> Result<()> {
    match doc.header().and_then(|h| h.version) {
        Some(version) if version <= (1, 4) => {},
        Some((major, minor)) => r.add(
            Message::new(MessageId::PdfAVersion, "PDF/A-1 requires PDF 1.4 or earlier")
                .with_sub_message(format!("header declares {}.{}", major, minor)),
        ),
        None => r.fail(MessageId::PdfAVersion, "no readable header version"),
    }
    Ok(())
}

fn check_binary_marker<R: Read + Seek>(
    doc: &mut PdfDocument<R>,
    _trees: &DocumentTrees,
    r: &mut ReasonCollector,
) -> Result<()> {
    if !doc.header().is_some_and(|h| h.binary_marker) {
        r.fail(
            MessageId::PdfABinaryMarker,
            "no binary marker comment after the header",
        );
    }
    Ok(())
}

fn check_trailer_id<R: Read + Seek>(
    _doc: &mut PdfDocument<R>,
    trees: &DocumentTrees,
    r: &mut ReasonCollector,
) -> Result<()> {
    if !trees.trailer.has_id {
        r.fail(MessageId::PdfANoId, "trailer has no valid /ID");
    }
    Ok(())
}

fn check_encryption<R: Read + Seek>(
    _doc: &mut PdfDocument<R>,
    trees: &DocumentTrees,
    r: &mut ReasonCollector,
) -> Result<()> {
    if trees.trailer.encrypted {
        r.fail(MessageId::PdfAEncrypted, "encryption is not allowed");
    }
    Ok(())
}

/// The catalog `/Metadata` stream, if it is one.
fn metadata_stream<R: Read + Seek>(
    doc: &mut PdfDocument<R>,
    catalog: &Dictionary,
) -> Option<std::rc::Rc<Object>> {
    doc.resolve_entry(catalog, "Metadata").filter(|m| m.is_stream())
}

fn check_metadata_stream<R: Read + Seek>(
    doc: &mut PdfDocument<R>,
    trees: &DocumentTrees,
    r: &mut ReasonCollector,
) -> Result<()> {
    let catalog = catalog_dict(trees)?;
    let Some(metadata) = metadata_stream(doc, catalog) else {
        r.fail(MessageId::PdfAMetadata, "catalog has no /Metadata stream");
        return Ok(());
    };
    if metadata.dict_type() != Some("Metadata")
        || metadata.get("Subtype").and_then(Object::as_name) != Some("XML")
    {
        r.fail(
            MessageId::PdfAMetadata,
            "/Metadata stream is not /Type /Metadata /Subtype /XML",
        );
    }
    Ok(())
}

fn check_identification<R: Read + Seek>(
    doc: &mut PdfDocument<R>,
    trees: &DocumentTrees,
    r: &mut ReasonCollector,
) -> Result<()> {
    let catalog = catalog_dict(trees)?;
    let Some(metadata) = metadata_stream(doc, catalog) else {
        r.fail(MessageId::PdfAIdentification, "no XMP metadata to identify PDF/A");
        return Ok(());
    };
    let xml = match metadata.decode_stream_data(doc.options()) {
        Ok(xml) => xml,
        Err(e) => {
            r.add(
                Message::new(MessageId::PdfAIdentification, "XMP metadata cannot be decoded")
                    .with_sub_message(e.to_string()),
            );
            return Ok(());
        },
    };
    let id = match parse_pdfa_identification(&xml) {
        Ok(id) => id,
        Err(e) => {
            r.add(
                Message::new(MessageId::PdfAIdentification, "XMP metadata cannot be parsed")
                    .with_sub_message(e.to_string()),
            );
            return Ok(());
        },
    };
    let part_ok = id.part.as_deref() == Some("1");
    let conformance_ok = matches!(id.conformance.as_deref(), Some("A") | Some("B"));
    if !part_ok || !conformance_ok {
        r.add(
            Message::new(
                MessageId::PdfAIdentification,
                "XMP lacks PDF/A-1 identification (pdfaid:part 1, conformance A or B)",
            )
            .with_sub_message(format!(
                "part {}, conformance {}",
                id.part.as_deref().unwrap_or("missing"),
                id.conformance.as_deref().unwrap_or("missing")
            )),
        );
    }
    Ok(())
}

/// The catalog `/Names` dictionary, resolved.
fn names_dict<R: Read + Seek>(doc: &mut PdfDocument<R>, catalog: &Dictionary) -> Option<Dictionary> {
    doc.resolve_entry(catalog, "Names")
        .and_then(|n| n.as_dict().cloned())
}

fn check_javascript<R: Read + Seek>(
    doc: &mut PdfDocument<R>,
    trees: &DocumentTrees,
    r: &mut ReasonCollector,
) -> Result<()> {
    let catalog = catalog_dict(trees)?;
    if names_dict(doc, catalog).is_some_and(|names| names.contains_key("JavaScript")) {
        r.fail(MessageId::PdfAJavaScript, "/Names contains a /JavaScript name tree");
    }
    if let Some(action) = doc.resolve_entry(catalog, "OpenAction") {
        if action.get("S").and_then(Object::as_name) == Some("JavaScript") {
            r.fail(MessageId::PdfAJavaScript, "/OpenAction is a JavaScript action");
        }
    }
    Ok(())
}

fn check_additional_actions<R: Read + Seek>(
    _doc: &mut PdfDocument<R>,
    trees: &DocumentTrees,
    r: &mut ReasonCollector,
) -> Result<()> {
    if catalog_dict(trees)?.contains_key("AA") {
        r.fail(
            MessageId::PdfAAdditionalActions,
            "catalog has an /AA additional-actions dictionary",
        );
    }
    Ok(())
}

fn check_embedded_files<R: Read + Seek>(
    doc: &mut PdfDocument<R>,
    trees: &DocumentTrees,
    r: &mut ReasonCollector,
) -> Result<()> {
    let catalog = catalog_dict(trees)?;
    if names_dict(doc, catalog).is_some_and(|names| names.contains_key("EmbeddedFiles")) {
        r.fail(MessageId::PdfAEmbeddedFiles, "/Names contains an /EmbeddedFiles name tree");
    }
    Ok(())
}

fn check_transparency<R: Read + Seek>(
    doc: &mut PdfDocument<R>,
    trees: &DocumentTrees,
    r: &mut ReasonCollector,
) -> Result<()> {
    for (index, page) in trees.pages.pages.iter().enumerate() {
        let Some(page_dict) = page.dict.as_dict() else {
            continue;
        };
        let Some(group) = doc.resolve_entry(page_dict, "Group") else {
            continue;
        };
        if group.get("S").and_then(Object::as_name) == Some("Transparency") {
            r.add(
                Message::new(MessageId::PdfATransparency, "page uses a transparency group")
                    .with_sub_message(match page.obj_ref {
                        Some(obj_ref) => format!("page {} ({})", index + 1, obj_ref),
                        None => format!("page {}", index + 1),
                    }),
            );
        }
    }
    Ok(())
}

fn check_output_intents<R: Read + Seek>(
    doc: &mut PdfDocument<R>,
    trees: &DocumentTrees,
    r: &mut ReasonCollector,
) -> Result<()> {
    let catalog = catalog_dict(trees)?;
    let Some(intents) = doc.resolve_entry(catalog, "OutputIntents") else {
        return Ok(());
    };
    let Some(intents) = intents.as_array() else {
        r.fail(MessageId::PdfAOutputIntent, "/OutputIntents is not an array");
        return Ok(());
    };
    for intent in intents {
        let intent = doc.resolve_object(intent);
        let subtype = intent.get("S").and_then(Object::as_name);
        if subtype != Some("GTS_PDFA1") {
            r.add(
                Message::new(MessageId::PdfAOutputIntent, "output intent is not /GTS_PDFA1")
                    .with_sub_message(subtype.map_or_else(|| "no /S".to_string(), |s| format!("/{}", s))),
            );
        }
    }
    Ok(())
}
