//! Document catalog validation.

use super::{Progress, ValidatorState};
use crate::document::PdfDocument;
use crate::object::{Object, ObjectRef};
use crate::report::{Message, MessageId};
use std::io::{Read, Seek};
use std::rc::Rc;

/// What the catalog validator found.
#[derive(Debug, Clone)]
pub struct CatalogOutcome {
    /// Final validator state
    pub state: ValidatorState,
    /// `/Root` reference, when it is indirect
    pub obj_ref: Option<ObjectRef>,
    /// The catalog dictionary, if `/Root` led to one (even with a bad `/Type`)
    pub catalog: Option<Rc<Object>>,
    /// Catalog `/Version` override
    pub version: Option<String>,
}

impl CatalogOutcome {
    fn without_catalog(state: ValidatorState) -> Self {
        Self {
            state,
            obj_ref: None,
            catalog: None,
            version: None,
        }
    }

    /// Look up `key` in the catalog dictionary.
    pub fn get(&self, key: &str) -> Option<&Object> {
        self.catalog.as_deref()?.get(key)
    }
}

/// Fetch `/Root` from the trailer and check it is a `/Catalog` dictionary.
pub fn validate_catalog<R: Read + Seek>(doc: &mut PdfDocument<R>) -> CatalogOutcome {
    let mut progress = Progress::new("catalog");
    let root = match doc.trailer() {
        None => return CatalogOutcome::without_catalog(progress.absent()),
        Some(trailer) => trailer.get("Root").cloned(),
    };

    let Some(root) = root else {
        doc.report_mut()
            .add_message(MessageId::RootMissing, "trailer has no /Root entry");
        return CatalogOutcome::without_catalog(progress.absent());
    };
    let obj_ref = root.as_reference();
    let catalog = doc.resolve_object(&root);
    if catalog.is_null() {
        doc.report_mut().add(
            Message::new(MessageId::RootMissing, "/Root does not resolve to an object")
                .with_sub_message(obj_ref.map_or_else(|| "null".to_string(), |r| r.to_string())),
        );
        return CatalogOutcome::without_catalog(progress.absent());
    }

    progress.begin(doc.report());
    let Object::Dictionary(dict) = &*catalog else {
        doc.report_mut().add(
            Message::new(MessageId::CatalogNotDictionary, "document catalog is not a dictionary")
                .with_sub_message(catalog.type_name()),
        );
        return CatalogOutcome {
            state: progress.finish(doc.report()),
            obj_ref,
            catalog: None,
            version: None,
        };
    };

    match dict.get("Type") {
        None => doc.report_mut().add(
            Message::new(MessageId::CatalogNoType, "document catalog has no /Type entry")
                .with_sub_message(describe(obj_ref)),
        ),
        Some(Object::Name(name)) if name == "Catalog" => {},
        Some(other) => doc.report_mut().add(
            Message::new(MessageId::CatalogWrongType, "document catalog /Type is not /Catalog")
                .with_sub_message(format!("{}: {}", describe(obj_ref), type_label(other))),
        ),
    }

    let version = dict.get("Version").and_then(Object::as_name).map(str::to_string);
    CatalogOutcome {
        state: progress.finish(doc.report()),
        obj_ref,
        catalog: Some(Rc::clone(&catalog)),
        version,
    }
}

fn describe(obj_ref: Option<ObjectRef>) -> String {
    obj_ref.map_or_else(|| "direct /Root".to_string(), |r| r.to_string())
}

fn type_label(obj: &Object) -> String {
    match obj {
        Object::Name(n) => format!("/{}", n),
        other => other.type_name().to_string(),
    }
}
