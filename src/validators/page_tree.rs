//! Page tree validation.
//!
//! The tree under the catalog's `/Pages` is walked depth-first with an
//! explicit stack. Inheritable attributes (`/Resources`, `/MediaBox`,
//! `/CropBox`, `/Rotate`) travel down with each pending node so leaves can
//! be checked against their effective values. A node reached a second time
//! is a cycle: that branch stops, its siblings do not.

use super::{CatalogOutcome, Progress, ValidatorState};
use crate::document::PdfDocument;
use crate::object::{Dictionary, Object, ObjectRef};
use crate::report::{Message, MessageId};
use std::collections::HashSet;
use std::io::{Read, Seek};
use std::rc::Rc;

/// A leaf page found during the walk.
#[derive(Debug, Clone)]
pub struct PageInfo {
    /// Where the page is stored, when indirect
    pub obj_ref: Option<ObjectRef>,
    /// The page dictionary
    pub dict: Rc<Object>,
}

/// What the page tree validator found.
#[derive(Debug, Clone)]
pub struct PageTreeOutcome {
    /// Final validator state
    pub state: ValidatorState,
    /// Number of leaf pages reached
    pub page_count: usize,
    /// Leaf pages in document order
    pub pages: Vec<PageInfo>,
}

/// Attributes a node passes on to its descendants.
#[derive(Debug, Clone, Default)]
struct Inherited {
    resources: Option<Object>,
    media_box: Option<Object>,
    crop_box: Option<Object>,
    rotate: Option<Object>,
}

impl Inherited {
    /// Values for the children of `dict`: its own entries override ours.
    fn overlay(&self, dict: &Dictionary) -> Self {
        let pick = |key: &str, current: &Option<Object>| dict.get(key).cloned().or_else(|| current.clone());
        Self {
            resources: pick("Resources", &self.resources),
            media_box: pick("MediaBox", &self.media_box),
            crop_box: pick("CropBox", &self.crop_box),
            rotate: pick("Rotate", &self.rotate),
        }
    }
}

/// A kid waiting to be visited.
struct Pending {
    node: Object,
    parent: Option<usize>,
    inherited: Inherited,
}

/// An intermediate node, for the `/Count` check after the walk.
struct Branch {
    obj_ref: Option<ObjectRef>,
    declared: Option<i64>,
    parent: Option<usize>,
    leaves: usize,
}

/// Walk the page tree under the catalog's `/Pages`.
pub fn validate_page_tree<R: Read + Seek>(
    doc: &mut PdfDocument<R>,
    catalog: &CatalogOutcome,
) -> PageTreeOutcome {
    let mut progress = Progress::new("page tree");
    let mut outcome = PageTreeOutcome {
        state: ValidatorState::NotStarted,
        page_count: 0,
        pages: Vec::new(),
    };
    if catalog.catalog.is_none() {
        return outcome;
    }
    let Some(root) = catalog.get("Pages").cloned() else {
        doc.report_mut()
            .add_message(MessageId::PagesMissing, "document catalog has no /Pages entry");
        outcome.state = progress.absent();
        return outcome;
    };
    if doc.resolve_object(&root).is_null() {
        doc.report_mut().add(
            Message::new(MessageId::PagesMissing, "/Pages does not resolve to an object")
                .with_sub_message(describe(root.as_reference())),
        );
        outcome.state = progress.absent();
        return outcome;
    }

    progress.begin(doc.report());
    let mut branches: Vec<Branch> = Vec::new();
    let mut visited: HashSet<ObjectRef> = HashSet::new();
    let mut stack = vec![Pending {
        node: root,
        parent: None,
        inherited: Inherited::default(),
    }];

    while let Some(Pending {
        node,
        parent,
        inherited,
    }) = stack.pop()
    {
        let obj_ref = node.as_reference();
        if let Some(r) = obj_ref {
            if !visited.insert(r) {
                log::warn!("page tree revisits {}", r);
                doc.report_mut().add(
                    Message::new(MessageId::PageTreeCycle, "page tree node reached twice")
                        .with_sub_message(r.to_string()),
                );
                continue;
            }
        }

        let resolved = doc.resolve_object(&node);
        let Object::Dictionary(dict) = &*resolved else {
            doc.report_mut().add(
                Message::new(MessageId::PageKidsInvalid, "page tree node is not a dictionary")
                    .with_sub_message(format!("{}: {}", describe(obj_ref), resolved.type_name())),
            );
            continue;
        };

        let is_branch = match dict.get("Type").and_then(Object::as_name) {
            Some("Pages") => true,
            Some("Page") => false,
            other => {
                let inferred = dict.contains_key("Kids");
                doc.report_mut().add(
                    Message::new(MessageId::PageNodeWrongType, "page tree node has wrong /Type")
                        .with_sub_message(format!(
                            "{}: {}, treated as {}",
                            describe(obj_ref),
                            other.map_or_else(|| "no /Type".to_string(), |t| format!("/{}", t)),
                            if inferred { "/Pages" } else { "/Page" }
                        )),
                );
                inferred
            },
        };

        if is_branch {
            let index = branches.len();
            let declared = doc.resolve_entry(dict, "Count").and_then(|c| c.as_integer());
            branches.push(Branch {
                obj_ref,
                declared,
                parent,
                leaves: 0,
            });
            let kids = doc.resolve_entry(dict, "Kids");
            let Some(kids) = kids.as_deref().and_then(Object::as_array) else {
                doc.report_mut().add(
                    Message::new(MessageId::PageKidsInvalid, "/Kids missing or not an array")
                        .with_sub_message(describe(obj_ref)),
                );
                continue;
            };
            let passed_down = inherited.overlay(dict);
            for kid in kids.iter().rev() {
                stack.push(Pending {
                    node: kid.clone(),
                    parent: Some(index),
                    inherited: passed_down.clone(),
                });
            }
        } else {
            if let Some(p) = parent {
                branches[p].leaves += 1;
            }
            check_leaf(doc, obj_ref, &inherited.overlay(dict));
            outcome.pages.push(PageInfo {
                obj_ref,
                dict: Rc::clone(&resolved),
            });
        }
    }

    // Children always come after their parent, so one reverse pass
    // accumulates leaf counts bottom-up.
    for i in (0..branches.len()).rev() {
        if let Some(p) = branches[i].parent {
            branches[p].leaves += branches[i].leaves;
        }
    }
    for branch in &branches {
        if branch.declared != Some(branch.leaves as i64) {
            doc.report_mut().add(
                Message::new(MessageId::PageCountMismatch, "/Count does not match pages beneath node")
                    .with_sub_message(format!(
                        "{}: /Count {}, found {}",
                        describe(branch.obj_ref),
                        branch.declared.map_or_else(|| "missing".to_string(), |c| c.to_string()),
                        branch.leaves
                    )),
            );
        }
    }

    outcome.page_count = outcome.pages.len();
    outcome.state = progress.finish(doc.report());
    outcome
}

/// Check the effective attributes of one leaf page.
fn check_leaf<R: Read + Seek>(doc: &mut PdfDocument<R>, obj_ref: Option<ObjectRef>, attrs: &Inherited) {
    let media_box = attrs.media_box.as_ref().map(|m| doc.resolve_object(m));
    if !media_box.as_deref().is_some_and(is_rectangle) {
        doc.report_mut().add(
            Message::new(MessageId::MediaBoxInvalid, "page has no valid /MediaBox")
                .with_sub_message(describe(obj_ref)),
        );
    }

    let resources = attrs.resources.as_ref().map(|r| doc.resolve_object(r));
    if !resources.as_deref().is_some_and(|r| r.as_dict().is_some()) {
        doc.report_mut().add(
            Message::new(MessageId::ResourcesMissing, "page has no /Resources dictionary")
                .with_sub_message(describe(obj_ref)),
        );
    }

    if let Some(rotate) = &attrs.rotate {
        let rotate = doc.resolve_object(rotate);
        if !rotate.as_integer().is_some_and(|r| r % 90 == 0) {
            doc.report_mut().add(
                Message::new(MessageId::RotateInvalid, "/Rotate is not a multiple of 90")
                    .with_sub_message(describe(obj_ref)),
            );
        }
    }
}

fn is_rectangle(obj: &Object) -> bool {
    obj.as_array()
        .is_some_and(|a| a.len() == 4 && a.iter().all(|n| n.as_number().is_some()))
}

fn describe(obj_ref: Option<ObjectRef>) -> String {
    obj_ref.map_or_else(|| "direct node".to_string(), |r| format!("page node {}", r))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validators::test_support::load;
    use crate::validators::validate_catalog;

    fn run(objects: &[(u32, &str)]) -> (PageTreeOutcome, crate::report::ValidationReport) {
        let mut doc = load(objects);
        let catalog = validate_catalog(&mut doc);
        let outcome = validate_page_tree(&mut doc, &catalog);
        (outcome, doc.into_report())
    }

    const CATALOG: (u32, &str) = (1, "<< /Type /Catalog /Pages 2 0 R >>");

    // ========================================================================
    // Walking
    // ========================================================================

    #[test]
    fn test_nested_tree_in_document_order() {
        let (outcome, report) = run(&[
            CATALOG,
            (2, "<< /Type /Pages /Kids [3 0 R 4 0 R] /Count 3 /MediaBox [0 0 100 100] /Resources << >> >>"),
            (3, "<< /Type /Pages /Kids [5 0 R 6 0 R] /Count 2 /Parent 2 0 R >>"),
            (4, "<< /Type /Page /Parent 2 0 R >>"),
            (5, "<< /Type /Page /Parent 3 0 R >>"),
            (6, "<< /Type /Page /Parent 3 0 R /Rotate 270 >>"),
        ]);
        assert_eq!(outcome.state, ValidatorState::Valid, "{:?}", report.messages());
        assert_eq!(outcome.page_count, 3);
        let order: Vec<u32> = outcome.pages.iter().filter_map(|p| p.obj_ref).map(|r| r.id).collect();
        assert_eq!(order, vec![5, 6, 4]);
    }

    #[test]
    fn test_pages_missing() {
        let (outcome, report) = run(&[(1, "<< /Type /Catalog >>")]);
        assert_eq!(outcome.state, ValidatorState::Absent);
        assert!(report.has_message(MessageId::PagesMissing));
    }

    #[test]
    fn test_no_catalog_means_not_started() {
        let (outcome, _) = run(&[(1, "42")]);
        assert_eq!(outcome.state, ValidatorState::NotStarted);
    }

    // ========================================================================
    // Cycles and counts
    // ========================================================================

    #[test]
    fn test_cycle_to_ancestor_stops_branch_only() {
        let (outcome, report) = run(&[
            CATALOG,
            (2, "<< /Type /Pages /Kids [3 0 R 4 0 R] /Count 2 /MediaBox [0 0 1 1] /Resources << >> >>"),
            (3, "<< /Type /Pages /Kids [2 0 R] /Count 0 >>"),
            (4, "<< /Type /Page >>"),
        ]);
        assert_eq!(report.count_messages(MessageId::PageTreeCycle), 1);
        assert_eq!(outcome.page_count, 1);
        assert_eq!(outcome.state, ValidatorState::Invalid);
    }

    #[test]
    fn test_self_cycle() {
        let (_, report) = run(&[CATALOG, (2, "<< /Type /Pages /Kids [2 0 R] /Count 0 >>")]);
        assert_eq!(report.count_messages(MessageId::PageTreeCycle), 1);
    }

    #[test]
    fn test_count_mismatch() {
        let (_, report) = run(&[
            CATALOG,
            (2, "<< /Type /Pages /Kids [3 0 R] /Count 5 >>"),
            (3, "<< /Type /Page /MediaBox [0 0 1 1] /Resources << >> >>"),
        ]);
        assert_eq!(report.count_messages(MessageId::PageCountMismatch), 1);
    }

    #[test]
    fn test_wrong_type_reported_and_walk_continues() {
        let (outcome, report) = run(&[
            CATALOG,
            (2, "<< /Type /Pages /Kids [3 0 R 4 0 R] /Count 2 /MediaBox [0 0 1 1] /Resources << >> >>"),
            (3, "<< /Type /Foo >>"),
            (4, "<< /Type /Page >>"),
        ]);
        assert_eq!(report.count_messages(MessageId::PageNodeWrongType), 1);
        assert_eq!(outcome.page_count, 2);
    }

    #[test]
    fn test_kids_not_array() {
        let (_, report) = run(&[CATALOG, (2, "<< /Type /Pages /Kids 3 /Count 0 >>")]);
        assert!(report.has_message(MessageId::PageKidsInvalid));
    }

    // ========================================================================
    // Leaf attributes
    // ========================================================================

    #[test]
    fn test_inherited_attributes_satisfy_leaf() {
        let (_, report) = run(&[
            CATALOG,
            (2, "<< /Type /Pages /Kids [3 0 R] /Count 1 /MediaBox 4 0 R /Resources << /Font << >> >> >>"),
            (3, "<< /Type /Page >>"),
            (4, "[0 0 595.3 841.9]"),
        ]);
        assert!(report.messages().is_empty(), "{:?}", report.messages());
    }

    #[test]
    fn test_leaf_attribute_errors() {
        let (outcome, report) = run(&[
            CATALOG,
            (2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>"),
            (3, "<< /Type /Page /MediaBox [0 0 1] /Rotate 45 >>"),
        ]);
        assert_eq!(outcome.state, ValidatorState::Invalid);
        assert!(report.has_message(MessageId::MediaBoxInvalid));
        assert!(report.has_message(MessageId::ResourcesMissing));
        assert!(report.has_message(MessageId::RotateInvalid));
        let media = report
            .messages()
            .iter()
            .find(|m| m.id == MessageId::MediaBoxInvalid)
            .unwrap();
        assert!(media.sub_message.as_deref().unwrap().contains("3 0 R"));
    }
}
