//! Tagged PDF profile.

use super::{catalog_dict, Profile, ProfileKind, ReasonCollector};
use crate::document::PdfDocument;
use crate::object::Object;
use crate::report::{Message, MessageId};
use crate::validators::{DocumentTrees, ValidatorState};
use std::io::{Read, Seek};

/// Tagged PDF: the catalog's `/MarkInfo` has `/Marked true`, and a valid
/// structure tree is present.
#[derive(Debug, Clone, Copy, Default)]
pub struct TaggedProfile;

impl Profile for TaggedProfile {
    fn kind(&self) -> ProfileKind {
        ProfileKind::Tagged
    }

    fn evaluate<R: Read + Seek>(
        &self,
        doc: &mut PdfDocument<R>,
        trees: &DocumentTrees,
        reasons: &mut ReasonCollector,
    ) {
        reasons.check("MarkInfo", |r| {
            let catalog = catalog_dict(trees)?;
            let Some(mark_info) = doc.resolve_entry(catalog, "MarkInfo") else {
                r.fail(MessageId::TaggedNoMarkInfo, "document catalog has no /MarkInfo");
                return Ok(());
            };
            let Some(mark_info) = mark_info.as_dict().filter(|_| !mark_info.is_stream()) else {
                r.add(
                    Message::new(MessageId::TaggedNoMarkInfo, "/MarkInfo is not a dictionary")
                        .with_sub_message(mark_info.type_name()),
                );
                return Ok(());
            };
            let marked = doc.resolve_entry(mark_info, "Marked");
            if marked.as_deref().and_then(Object::as_bool) != Some(true) {
                r.fail(MessageId::TaggedNotMarked, "/MarkInfo /Marked is not true");
            }
            Ok(())
        });

        reasons.check("StructTreeRoot", |r| {
            match trees.structure.state {
                ValidatorState::Valid => {},
                ValidatorState::Invalid => r.fail(
                    MessageId::TaggedStructTreeInvalid,
                    "structure tree has validation errors",
                ),
                _ => r.fail(MessageId::TaggedNoStructTree, "document has no structure tree"),
            }
            Ok(())
        });
    }
}
