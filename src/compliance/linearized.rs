//! Linearized PDF profile.
//!
//! A linearized file starts with a linearization parameter dictionary:
//!
//! ```text
//! 43 0 obj
//! << /Linearized 1.0 /L 54567 /H [475 598] /O 45 /E 5437 /N 11 /T 52786 >>
//! endobj
//! ```
//!
//! `/L` must equal the file length and `/N` the number of pages.

use super::{Profile, ProfileKind, ReasonCollector};
use crate::document::PdfDocument;
use crate::object::{Dictionary, Object};
use crate::report::{Message, MessageId};
use crate::validators::DocumentTrees;
use std::io::{Read, Seek};

/// Linearized PDF.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearizedProfile;

impl Profile for LinearizedProfile {
    fn kind(&self) -> ProfileKind {
        ProfileKind::Linearized
    }

    fn evaluate<R: Read + Seek>(
        &self,
        doc: &mut PdfDocument<R>,
        trees: &DocumentTrees,
        reasons: &mut ReasonCollector,
    ) {
        let mut params: Option<Dictionary> = None;
        reasons.check("linearization dictionary", |r| {
            params = linearization_dictionary(doc);
            if params.is_none() {
                r.fail(
                    MessageId::LinearizedNoDictionary,
                    "first object is not a linearization dictionary",
                );
            }
            Ok(())
        });
        // Without the dictionary the remaining rules have nothing to compare.
        let Some(params) = params else {
            return;
        };

        reasons.check("/L", |r| {
            let declared = params.get("L").and_then(Object::as_integer);
            if declared != i64::try_from(doc.file_size()).ok() {
                r.add(
                    Message::new(MessageId::LinearizedLength, "/L does not match the file length")
                        .with_sub_message(format!(
                            "/L {}, file has {} bytes",
                            declared.map_or_else(|| "missing".to_string(), |l| l.to_string()),
                            doc.file_size()
                        )),
                );
            }
            Ok(())
        });

        reasons.check("/N", |r| {
            let declared = params.get("N").and_then(Object::as_integer);
            let pages = trees.pages.page_count;
            if declared != i64::try_from(pages).ok() {
                r.add(
                    Message::new(MessageId::LinearizedPageCount, "/N does not match the page count")
                        .with_sub_message(format!(
                            "/N {}, page tree has {}",
                            declared.map_or_else(|| "missing".to_string(), |n| n.to_string()),
                            pages
                        )),
                );
            }
            Ok(())
        });
    }
}

/// The first object's dictionary, when it carries `/Linearized`.
pub(crate) fn linearization_dictionary<R: Read + Seek>(doc: &mut PdfDocument<R>) -> Option<Dictionary> {
    let first = doc.first_object()?;
    match first.object {
        Object::Dictionary(dict) if dict.contains_key("Linearized") => Some(dict),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compliance::satisfies_profile;
    use crate::parser_config::ValidationOptions;
    use crate::validators::test_support::build;
    use crate::validators::validate_trees;
    use std::io::Cursor;

    /// A one-page file whose first object is `/Linearized` with the given
    /// `/L` (`None` = the real length) and `/N`.
    fn linearized(l: Option<usize>, n: usize) -> Vec<u8> {
        let objects = |l: usize| {
            vec![
                (1u32, "<< /Type /Catalog /Pages 2 0 R >>".to_string()),
                (2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string()),
                (3, "<< /Type /Page /MediaBox [0 0 1 1] /Resources << >> >>".to_string()),
                (4, format!("<< /Linearized 1 /L {:010} /N {} >>", l, n)),
            ]
        };
        // The catalog must stay object 1, so move the parameter dictionary
        // to the front of the file.
        let render = |l: usize| {
            let objs = objects(l);
            let mut ordered: Vec<(u32, &str)> = vec![(4, objs[3].1.as_str())];
            ordered.extend(objs[..3].iter().map(|(id, body)| (*id, body.as_str())));
            build(&ordered, "")
        };
        let length = render(0).len();
        render(l.unwrap_or(length))
    }

    fn check(data: Vec<u8>) -> crate::compliance::ProfileOutcome {
        let mut doc = PdfDocument::load(Cursor::new(data), ValidationOptions::default());
        let trees = validate_trees(&mut doc);
        satisfies_profile(&LinearizedProfile, &mut doc, &trees)
    }

    #[test]
    fn test_consistent_linearization() {
        let outcome = check(linearized(None, 1));
        assert!(outcome.satisfied, "{:?}", outcome.reasons);
    }

    #[test]
    fn test_wrong_length_and_page_count() {
        let outcome = check(linearized(Some(12), 4));
        assert!(outcome.has_reason(MessageId::LinearizedLength));
        assert!(outcome.has_reason(MessageId::LinearizedPageCount));
        assert_eq!(outcome.reasons.len(), 2);
    }

    #[test]
    fn test_not_linearized() {
        let data = build(&[(1, "<< /Type /Catalog >>")], "");
        let outcome = check(data);
        assert_eq!(outcome.reasons.len(), 1);
        assert!(outcome.has_reason(MessageId::LinearizedNoDictionary));
    }
}
