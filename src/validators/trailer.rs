//! Trailer checks: `%%EOF`, `/Size`, `/ID`, `/Info` and `/Encrypt`.

use super::{Progress, ValidatorState};
use crate::document::PdfDocument;
use crate::object::Object;
use crate::report::{Message, MessageId};
use std::io::{Read, Seek};
use std::rc::Rc;

/// What the trailer validator found.
#[derive(Debug, Clone)]
pub struct TrailerOutcome {
    /// Final validator state
    pub state: ValidatorState,
    /// Trailer `/Size`
    pub object_count: Option<i64>,
    /// `/Encrypt` is present
    pub encrypted: bool,
    /// Trailer `/ID` is an array of two strings
    pub has_id: bool,
    /// Document information dictionary
    pub info: Option<Rc<Object>>,
}

/// Check the merged trailer dictionary.
pub fn validate_trailer<R: Read + Seek>(doc: &mut PdfDocument<R>) -> TrailerOutcome {
    let mut progress = Progress::new("trailer");
    let mut outcome = TrailerOutcome {
        state: ValidatorState::NotStarted,
        object_count: None,
        encrypted: false,
        has_id: false,
        info: None,
    };
    let Some(trailer) = doc.trailer().cloned() else {
        outcome.state = progress.absent();
        return outcome;
    };

    progress.begin(doc.report());
    if !doc.eof_marker_present() {
        doc.report_mut()
            .add_message(MessageId::EofMarkerMissing, "%%EOF marker not found at end of file");
    }

    outcome.object_count = trailer.get("Size").and_then(Object::as_integer);
    if !outcome.object_count.is_some_and(|n| n >= 0) {
        doc.report_mut().add(
            Message::new(MessageId::TrailerSizeInvalid, "trailer /Size missing or not a count")
                .with_sub_message(
                    trailer
                        .get("Size")
                        .map_or("missing", Object::type_name)
                        .to_string(),
                ),
        );
    }

    if let Some(id) = doc.resolve_entry(&trailer, "ID") {
        outcome.has_id = id.as_array().is_some_and(|parts| {
            parts.len() == 2 && parts.iter().all(|p| p.as_string().is_some())
        });
        if !outcome.has_id {
            doc.report_mut().add(
                Message::new(MessageId::TrailerIdInvalid, "trailer /ID is not an array of two strings")
                    .with_sub_message(id.type_name()),
            );
        }
    }

    if let Some(info) = doc.resolve_entry(&trailer, "Info") {
        if info.as_dict().is_some() && !info.is_stream() {
            outcome.info = Some(info);
        } else {
            doc.report_mut().add(
                Message::new(MessageId::InfoNotDictionary, "/Info does not resolve to a dictionary")
                    .with_sub_message(info.type_name()),
            );
        }
    }

    if trailer.contains_key("Encrypt") {
        log::debug!("document is encrypted; objects are read structurally only");
        outcome.encrypted = true;
        doc.report_mut()
            .add_message(MessageId::Encrypted, "document is encrypted");
    }

    outcome.state = progress.finish(doc.report());
    outcome
}
