//! Logical structure tree validation.
//!
//! The tree under `/StructTreeRoot` is optional. When present, each
//! element reachable from `/K` is checked and added to a [`StructTree`]
//! arena. A child that cannot be built yields one diagnostic and is
//! skipped; its siblings are still processed.

use super::{CatalogOutcome, Progress, ValidatorState};
use crate::document::PdfDocument;
use crate::error::{Error, Result};
use crate::object::{Dictionary, Object, ObjectRef};
use crate::report::{Message, MessageId};
use crate::structure::{RoleMap, StructChild, StructElem, StructTree, StructType};
use std::collections::{HashMap, HashSet};
use std::io::{Read, Seek};

/// What the structure tree validator found.
#[derive(Debug, Clone)]
pub struct StructTreeOutcome {
    /// Final validator state
    pub state: ValidatorState,
    /// The tree, when `/StructTreeRoot` is a dictionary
    pub tree: Option<StructTree>,
    /// The role map, when present and well-formed
    pub role_map: Option<RoleMap>,
}

impl StructTreeOutcome {
    fn empty(state: ValidatorState) -> Self {
        Self {
            state,
            tree: None,
            role_map: None,
        }
    }
}

/// A `/K` entry waiting to be visited.
struct Pending {
    node: Object,
    parent: Option<usize>,
}

/// One visited `/K` entry, before it is attached to its parent.
enum Built {
    Element(StructElem, Option<Object>),
    Child(StructChild),
}

/// Walk state shared by all children of one tree.
struct Walk<'m> {
    role_map: &'m RoleMap,
    max_hops: u32,
    standard: HashMap<String, Option<StructType>>,
}

impl Walk<'_> {
    /// Standard type `name` stands for, memoized so a bad mapping is
    /// reported once per name.
    fn standard_type<R: Read + Seek>(
        &mut self,
        doc: &mut PdfDocument<R>,
        name: &str,
        at: &str,
    ) -> Option<StructType> {
        if let Some(known) = self.standard.get(name) {
            return known.clone();
        }
        let mapped = self
            .role_map
            .dereference_struct_type(name, self.max_hops, doc.report_mut());
        let standard = match mapped {
            Some(target) => {
                let ty = StructType::from_name(&target);
                if ty.is_standard() {
                    Some(ty)
                } else {
                    doc.report_mut().add(
                        Message::new(
                            MessageId::StructTypeNonStandard,
                            "structure type does not map to a standard type",
                        )
                        .with_sub_message(format!("/{} in {}", name, at)),
                    );
                    None
                }
            },
            None => None,
        };
        self.standard.insert(name.to_string(), standard.clone());
        standard
    }
}

/// Check `/StructTreeRoot` and build the structure tree beneath it.
pub fn validate_struct_tree<R: Read + Seek>(
    doc: &mut PdfDocument<R>,
    catalog: &CatalogOutcome,
) -> StructTreeOutcome {
    let mut progress = Progress::new("structure tree");
    if catalog.catalog.is_none() {
        return StructTreeOutcome::empty(progress.state());
    }
    let Some(root_entry) = catalog.get("StructTreeRoot").cloned() else {
        return StructTreeOutcome::empty(progress.absent());
    };

    progress.begin(doc.report());
    let root = doc.resolve_object(&root_entry);
    let Object::Dictionary(root_dict) = &*root else {
        doc.report_mut().add(
            Message::new(MessageId::StructTreeRootWrongType, "/StructTreeRoot is not a dictionary")
                .with_sub_message(root.type_name()),
        );
        return StructTreeOutcome::empty(progress.finish(doc.report()));
    };
    if root_dict.get("Type").and_then(Object::as_name) != Some("StructTreeRoot") {
        doc.report_mut().add(
            Message::new(MessageId::StructTreeRootWrongType, "/StructTreeRoot has wrong /Type")
                .with_sub_message(describe(root_entry.as_reference())),
        );
    }

    let role_map = match doc.resolve_entry(root_dict, "RoleMap") {
        None => Some(RoleMap::default()),
        Some(obj) => match &*obj {
            Object::Dictionary(entries) => {
                // Values may be indirect names
                let resolved = entries
                    .iter()
                    .map(|(key, value)| (key.clone(), (*doc.resolve_object(value)).clone()))
                    .collect();
                Some(RoleMap::new(resolved))
            },
            other => {
                doc.report_mut().add(
                    Message::new(MessageId::RoleMapInvalid, "/RoleMap is not a dictionary")
                        .with_sub_message(other.type_name()),
                );
                None
            },
        },
    };

    let fallback = RoleMap::default();
    let mut walk = Walk {
        role_map: role_map.as_ref().unwrap_or(&fallback),
        max_hops: doc.options().max_role_map_hops,
        standard: HashMap::new(),
    };
    let mut tree = StructTree::default();
    let mut visited: HashSet<ObjectRef> = HashSet::new();
    if let Some(r) = root_entry.as_reference() {
        visited.insert(r);
    }

    let mut stack = Vec::new();
    if let Some(k) = root_dict.get("K") {
        push_kids(&mut stack, doc, k, None);
    }

    while let Some(Pending { node, parent }) = stack.pop() {
        let obj_ref = node.as_reference();
        if let Some(r) = obj_ref {
            if !visited.insert(r) {
                log::warn!("structure tree revisits {}", r);
                doc.report_mut().add(
                    Message::new(MessageId::StructTreeCycle, "structure element reached twice")
                        .with_sub_message(r.to_string()),
                );
                continue;
            }
        }

        let resolved = doc.resolve_object(&node);
        match build_child(doc, &mut walk, obj_ref, &resolved) {
            Ok(Built::Element(elem, kids)) => {
                let index = tree.elements.len();
                tree.elements.push(elem);
                match parent {
                    Some(p) => tree.elements[p].children.push(StructChild::Element(index)),
                    None => tree.roots.push(index),
                }
                if let Some(kids) = kids {
                    push_kids(&mut stack, doc, &kids, Some(index));
                }
            },
            Ok(Built::Child(child)) => match parent {
                Some(p) => tree.elements[p].children.push(child),
                None => doc.report_mut().add(
                    Message::new(
                        MessageId::StructElemInvalid,
                        "content reference directly under the structure tree root",
                    )
                    .with_sub_message(describe(obj_ref)),
                ),
            },
            Err(e) => {
                log::debug!("structure child {} skipped: {}", describe(obj_ref), e);
                let id = match e {
                    Error::InvalidObjectType { ref expected, .. } if expected == "Name" => {
                        MessageId::StructTypeMissing
                    },
                    _ => MessageId::StructElemInvalid,
                };
                doc.report_mut().add(
                    Message::new(id, "structure element could not be built")
                        .with_sub_message(format!("{}: {}", describe(obj_ref), e)),
                );
            },
        }
    }

    log::debug!("structure tree holds {} elements", tree.len());
    StructTreeOutcome {
        state: progress.finish(doc.report()),
        tree: Some(tree),
        role_map,
    }
}

/// Queue the entries of a `/K` value so they are visited in order.
fn push_kids<R: Read + Seek>(
    stack: &mut Vec<Pending>,
    doc: &mut PdfDocument<R>,
    k: &Object,
    parent: Option<usize>,
) {
    // An indirect /K may hold an array of kids.
    let resolved;
    let k = match k {
        Object::Reference(_) => {
            resolved = doc.resolve_object(k);
            match &*resolved {
                Object::Array(_) => &*resolved,
                _ => k,
            }
        },
        direct => direct,
    };
    match k {
        Object::Array(kids) => {
            for kid in kids.iter().rev() {
                stack.push(Pending {
                    node: kid.clone(),
                    parent,
                });
            }
        },
        single => stack.push(Pending {
            node: single.clone(),
            parent,
        }),
    }
}

/// Build one `/K` entry: a structure element, a marked-content reference
/// or an object reference.
fn build_child<R: Read + Seek>(
    doc: &mut PdfDocument<R>,
    walk: &mut Walk<'_>,
    obj_ref: Option<ObjectRef>,
    obj: &Object,
) -> Result<Built> {
    let dict = match obj {
        Object::Integer(mcid) => {
            return Ok(Built::Child(StructChild::MarkedContent {
                mcid: *mcid,
                page: None,
            }));
        },
        Object::Dictionary(dict) => dict,
        other => {
            return Err(Error::InvalidObjectType {
                expected: "Dictionary".to_string(),
                found: other.type_name().to_string(),
            });
        },
    };

    match dict.get("Type").and_then(Object::as_name) {
        Some("MCR") => {
            let mcid = dict
                .get("MCID")
                .and_then(Object::as_integer)
                .ok_or_else(|| Error::MalformedStructure {
                    offset: 0,
                    reason: "marked-content reference without integer /MCID".to_string(),
                })?;
            let page = dict.get("Pg").and_then(Object::as_reference);
            return Ok(Built::Child(StructChild::MarkedContent { mcid, page }));
        },
        Some("OBJR") => {
            let target = dict
                .get("Obj")
                .and_then(Object::as_reference)
                .ok_or_else(|| Error::MalformedStructure {
                    offset: 0,
                    reason: "object reference without indirect /Obj".to_string(),
                })?;
            return Ok(Built::Child(StructChild::ObjectRef(target)));
        },
        Some("StructElem") | None => {},
        Some(other) => doc.report_mut().add(
            Message::new(MessageId::StructElemWrongType, "structure element has wrong /Type")
                .with_sub_message(format!("{}: /{}", describe(obj_ref), other)),
        ),
    }

    let struct_type = match dict.get("S") {
        Some(Object::Name(s)) => s.clone(),
        other => {
            return Err(Error::InvalidObjectType {
                expected: "Name".to_string(),
                found: other.map_or("nothing", Object::type_name).to_string(),
            });
        },
    };

    if let Some(p) = dict.get("P") {
        if p.as_reference().is_none() {
            doc.report_mut().add(
                Message::new(MessageId::StructParentInvalid, "/P is not an indirect reference")
                    .with_sub_message(describe(obj_ref)),
            );
        }
    }

    check_attributes(doc, obj_ref, dict);
    let standard_type = walk.standard_type(doc, &struct_type, &describe(obj_ref));

    Ok(Built::Element(
        StructElem {
            obj_ref,
            struct_type,
            standard_type,
            children: Vec::new(),
        },
        dict.get("K").cloned(),
    ))
}

/// `/A` holds an attribute dictionary, or an array of attribute
/// dictionaries each optionally followed by a revision number.
fn check_attributes<R: Read + Seek>(doc: &mut PdfDocument<R>, obj_ref: Option<ObjectRef>, dict: &Dictionary) {
    let Some(attrs) = doc.resolve_entry(dict, "A") else {
        return;
    };
    let entries: Vec<Object> = match &*attrs {
        Object::Array(items) => items.clone(),
        single => vec![single.clone()],
    };
    for entry in &entries {
        let entry = doc.resolve_object(entry);
        let ok = match &*entry {
            Object::Integer(_) => true,
            Object::Dictionary(attr) | Object::Stream { dict: attr, .. } => {
                attr.get("O").and_then(Object::as_name).is_some()
            },
            _ => false,
        };
        if !ok {
            doc.report_mut().add(
                Message::new(MessageId::StructElemInvalid, "attribute object lacks an /O owner")
                    .with_sub_message(describe(obj_ref)),
            );
        }
    }
}

fn describe(obj_ref: Option<ObjectRef>) -> String {
    obj_ref.map_or_else(|| "direct element".to_string(), |r| r.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::ValidationReport;
    use crate::validators::test_support::load;
    use crate::validators::validate_catalog;

    fn run(objects: &[(u32, &str)]) -> (StructTreeOutcome, ValidationReport) {
        let mut doc = load(objects);
        let catalog = validate_catalog(&mut doc);
        let outcome = validate_struct_tree(&mut doc, &catalog);
        (outcome, doc.into_report())
    }

    const CATALOG: (u32, &str) = (1, "<< /Type /Catalog /StructTreeRoot 2 0 R >>");

    // ========================================================================
    // Presence
    // ========================================================================

    #[test]
    fn test_absent_is_not_an_error() {
        let (outcome, report) = run(&[(1, "<< /Type /Catalog >>")]);
        assert_eq!(outcome.state, ValidatorState::Absent);
        assert!(report.messages().is_empty());
    }

    #[test]
    fn test_root_wrong_type() {
        let (outcome, report) = run(&[CATALOG, (2, "<< /Type /StructElem >>")]);
        assert_eq!(outcome.state, ValidatorState::Invalid);
        assert!(report.has_message(MessageId::StructTreeRootWrongType));
    }

    #[test]
    fn test_root_not_a_dictionary() {
        let (outcome, report) = run(&[CATALOG, (2, "[1 2]")]);
        assert!(outcome.tree.is_none());
        assert!(report.has_message(MessageId::StructTreeRootWrongType));
    }

    // ========================================================================
    // Building
    // ========================================================================

    #[test]
    fn test_builds_tree_with_all_child_kinds() {
        let (outcome, report) = run(&[
            CATALOG,
            (2, "<< /Type /StructTreeRoot /K 3 0 R >>"),
            (3, "<< /Type /StructElem /S /Document /P 2 0 R /K [4 0 R 5 0 R] >>"),
            (4, "<< /Type /StructElem /S /P /P 3 0 R /K [0 << /Type /MCR /MCID 1 /Pg 9 0 R >>] >>"),
            (5, "<< /S /Link /P 3 0 R /K << /Type /OBJR /Obj 8 0 R >> >>"),
        ]);
        assert_eq!(outcome.state, ValidatorState::Valid, "{:?}", report.messages());
        let tree = outcome.tree.unwrap();
        assert_eq!(tree.len(), 3);
        assert_eq!(tree.roots, vec![0]);
        assert_eq!(tree.elements[0].standard_type, Some(StructType::Document));
        assert_eq!(
            tree.elements[0].children,
            vec![StructChild::Element(1), StructChild::Element(2)]
        );
        assert_eq!(
            tree.elements[1].children,
            vec![
                StructChild::MarkedContent { mcid: 0, page: None },
                StructChild::MarkedContent {
                    mcid: 1,
                    page: Some(ObjectRef::new(9, 0))
                },
            ]
        );
        assert_eq!(
            tree.elements[2].children,
            vec![StructChild::ObjectRef(ObjectRef::new(8, 0))]
        );
    }

    #[test]
    fn test_role_map_maps_custom_types() {
        let (outcome, report) = run(&[
            CATALOG,
            (2, "<< /Type /StructTreeRoot /RoleMap << /Chapter /Sect /Para /P >> /K [3 0 R 4 0 R] >>"),
            (3, "<< /S /Chapter /P 2 0 R >>"),
            (4, "<< /S /Para /P 2 0 R >>"),
        ]);
        assert!(report.messages().is_empty(), "{:?}", report.messages());
        let tree = outcome.tree.unwrap();
        assert_eq!(tree.elements[0].struct_type, "Chapter");
        assert_eq!(tree.elements[0].standard_type, Some(StructType::Sect));
        assert_eq!(outcome.role_map.unwrap().len(), 2);
    }

    #[test]
    fn test_role_map_value_may_be_indirect() {
        let (outcome, report) = run(&[
            CATALOG,
            (2, "<< /Type /StructTreeRoot /RoleMap << /Para 7 0 R >> /K [3 0 R 4 0 R] >>"),
            (3, "<< /S /Para /P 2 0 R >>"),
            (4, "<< /S /P /P 2 0 R >>"),
            (7, "/P"),
        ]);
        assert!(!report.has_message(MessageId::RoleMapEntryMalformed), "{:?}", report.messages());
        let tree = outcome.tree.unwrap();
        assert_eq!(tree.elements[0].standard_type, Some(StructType::P));
        let role_map = outcome.role_map.unwrap();
        assert_eq!(role_map.name_entries().collect::<Vec<_>>(), vec![("Para", "P")]);
    }

    #[test]
    fn test_circular_role_map_reported_once_per_name() {
        let (outcome, report) = run(&[
            CATALOG,
            (2, "<< /Type /StructTreeRoot /RoleMap << /A /B /B /A >> /K [3 0 R 4 0 R] >>"),
            (3, "<< /S /A /P 2 0 R >>"),
            (4, "<< /S /A /P 2 0 R >>"),
        ]);
        assert_eq!(report.count_messages(MessageId::RoleMapCircular), 1);
        assert_eq!(outcome.state, ValidatorState::Invalid);
        assert_eq!(outcome.tree.unwrap().elements[1].standard_type, None);
    }

    #[test]
    fn test_role_map_not_dictionary_reported_once() {
        let (outcome, report) = run(&[
            CATALOG,
            (2, "<< /Type /StructTreeRoot /RoleMap [/A] /K [3 0 R 4 0 R] >>"),
            (3, "<< /S /P >>"),
            (4, "<< /S /Span >>"),
        ]);
        assert_eq!(report.count_messages(MessageId::RoleMapInvalid), 1);
        assert!(outcome.role_map.is_none());
        assert_eq!(outcome.tree.unwrap().len(), 2);
    }

    #[test]
    fn test_non_standard_type() {
        let (_, report) = run(&[
            CATALOG,
            (2, "<< /Type /StructTreeRoot /K 3 0 R >>"),
            (3, "<< /S /Chapter >>"),
        ]);
        assert!(report.has_message(MessageId::StructTypeNonStandard));
    }

    #[test]
    fn test_bad_child_does_not_stop_siblings() {
        let (outcome, report) = run(&[
            CATALOG,
            (2, "<< /Type /StructTreeRoot /K [3 0 R 4 0 R 5 0 R 7 0 R] >>"),
            (3, "<< /Type /StructElem /S 12 >>"),
            (4, "(not an element)"),
            (5, "<< /S /P /P 2 >>"),
        ]);
        assert!(report.has_message(MessageId::StructTypeMissing));
        assert!(report.has_message(MessageId::StructElemInvalid));
        assert!(report.has_message(MessageId::StructParentInvalid));
        assert!(report.has_message(MessageId::MissingObject));
        assert_eq!(outcome.tree.unwrap().len(), 1);
    }

    #[test]
    fn test_cycle_in_structure() {
        let (outcome, report) = run(&[
            CATALOG,
            (2, "<< /Type /StructTreeRoot /K 3 0 R >>"),
            (3, "<< /S /Div /K 4 0 R >>"),
            (4, "<< /S /Div /K 3 0 R >>"),
        ]);
        assert_eq!(report.count_messages(MessageId::StructTreeCycle), 1);
        assert_eq!(outcome.tree.unwrap().len(), 2);
    }

    #[test]
    fn test_wrong_element_type_and_bad_mcr() {
        let (_, report) = run(&[
            CATALOG,
            (2, "<< /Type /StructTreeRoot /K 3 0 R >>"),
            (3, "<< /Type /Page /S /P /K << /Type /MCR /MCID /x >> >>"),
        ]);
        assert!(report.has_message(MessageId::StructElemWrongType));
        assert!(report.has_message(MessageId::StructElemInvalid));
    }

    #[test]
    fn test_attributes() {
        let (_, report) = run(&[
            CATALOG,
            (2, "<< /Type /StructTreeRoot /K [3 0 R 4 0 R] >>"),
            (3, "<< /S /Table /A [<< /O /Table /Summary (x) >> 0] >>"),
            (4, "<< /S /Figure /A << /BBox [0 0 1 1] >> >>"),
        ]);
        assert_eq!(report.count_messages(MessageId::StructElemInvalid), 1);
    }
}
