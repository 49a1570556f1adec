//! Document tree validators.
//!
//! Each validator walks one part of the object graph (trailer, catalog,
//! page tree, structure tree), writes its diagnostics into the document's
//! report and hands back what it found so later stages do not walk the
//! same objects again. Validators never stop each other: a broken page
//! tree still lets the structure tree be checked. Only a missing catalog
//! leaves the page and structure validators with nothing to do.
//!
//! Every validator moves through the same states:
//!
//! ```text
//! NotStarted -> Absent
//! NotStarted -> Present -> Validating -> Valid | Invalid
//! ```

mod catalog;
mod page_tree;
mod struct_tree;
mod trailer;

pub use catalog::{validate_catalog, CatalogOutcome};
pub use page_tree::{validate_page_tree, PageInfo, PageTreeOutcome};
pub use struct_tree::{validate_struct_tree, StructTreeOutcome};
pub use trailer::{validate_trailer, TrailerOutcome};

use crate::document::PdfDocument;
use crate::report::ValidationReport;
use std::io::{Read, Seek};

/// Lifecycle of one validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidatorState {
    /// Not run
    NotStarted,
    /// The checked object exists
    Present,
    /// The checked object does not exist
    Absent,
    /// Checks in progress
    Validating,
    /// Checks finished without errors
    Valid,
    /// Checks finished with at least one not-valid or not-well-formed error
    Invalid,
}

impl ValidatorState {
    /// Did the validator run to completion without errors?
    pub fn is_valid(self) -> bool {
        self == ValidatorState::Valid
    }
}

/// State tracking shared by the validators.
#[derive(Debug)]
pub(crate) struct Progress {
    name: &'static str,
    state: ValidatorState,
    errors_before: usize,
}

impl Progress {
    pub(crate) fn new(name: &'static str) -> Self {
        Self {
            name,
            state: ValidatorState::NotStarted,
            errors_before: 0,
        }
    }

    pub(crate) fn state(&self) -> ValidatorState {
        self.state
    }

    fn enter(&mut self, next: ValidatorState) {
        log::trace!("{} validator: {:?} -> {:?}", self.name, self.state, next);
        self.state = next;
    }

    /// The checked object does not exist.
    pub(crate) fn absent(&mut self) -> ValidatorState {
        self.enter(ValidatorState::Absent);
        self.state
    }

    /// The checked object exists; start counting errors.
    pub(crate) fn begin(&mut self, report: &ValidationReport) {
        self.enter(ValidatorState::Present);
        self.errors_before = report.error_count();
        self.enter(ValidatorState::Validating);
    }

    /// Settle on `Valid` or `Invalid` from the errors recorded since
    /// [`begin`](Self::begin).
    pub(crate) fn finish(&mut self, report: &ValidationReport) -> ValidatorState {
        let next = if report.error_count() > self.errors_before {
            ValidatorState::Invalid
        } else {
            ValidatorState::Valid
        };
        self.enter(next);
        self.state
    }
}

/// Everything the tree validators found, shared with the profiles.
#[derive(Debug)]
pub struct DocumentTrees {
    /// Trailer checks
    pub trailer: TrailerOutcome,
    /// Document catalog
    pub catalog: CatalogOutcome,
    /// Page tree
    pub pages: PageTreeOutcome,
    /// Logical structure tree
    pub structure: StructTreeOutcome,
}

/// Run the trailer, catalog, page tree and structure tree validators.
pub fn validate_trees<R: Read + Seek>(doc: &mut PdfDocument<R>) -> DocumentTrees {
    let trailer = validate_trailer(doc);
    let catalog = validate_catalog(doc);
    let pages = validate_page_tree(doc, &catalog);
    let structure = validate_struct_tree(doc, &catalog);
    DocumentTrees {
        trailer,
        catalog,
        pages,
        structure,
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::document::PdfDocument;
    use crate::parser_config::ValidationOptions;
    use std::io::Cursor;

    /// Build a classic-xref PDF from `(number, body)` pairs with `/Root 1 0 R`.
    pub fn build(objects: &[(u32, &str)], trailer_extra: &str) -> Vec<u8> {
        let mut out = b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n".to_vec();
        let mut offsets = Vec::new();
        for (id, body) in objects {
            offsets.push((*id, out.len()));
            out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", id, body).as_bytes());
        }
        let size = objects.iter().map(|(id, _)| id + 1).max().unwrap_or(1);
        let xref_at = out.len();
        out.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f\r\n", size).as_bytes());
        for id in 1..size {
            match offsets.iter().find(|(n, _)| *n == id) {
                Some((_, off)) => {
                    out.extend_from_slice(format!("{:010} 00000 n\r\n", off).as_bytes())
                },
                None => out.extend_from_slice(b"0000000000 65535 f\r\n"),
            }
        }
        out.extend_from_slice(
            format!(
                "trailer\n<< /Size {} /Root 1 0 R {} >>\nstartxref\n{}\n%%EOF\n",
                size, trailer_extra, xref_at
            )
            .as_bytes(),
        );
        out
    }

    pub fn load(objects: &[(u32, &str)]) -> PdfDocument<Cursor<Vec<u8>>> {
        PdfDocument::load(Cursor::new(build(objects, "")), ValidationOptions::default())
    }
}
