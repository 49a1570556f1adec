//! Per-file driver.
//!
//! [`Analyzer::analyze`] is handed an open byte source and an empty
//! report, runs every stage in order and returns the populated report:
//!
//! 1. header and cross-reference chain ([`PdfDocument::load_with_report`])
//! 2. trailer, catalog, page tree and structure tree validators
//! 3. document information dictionary
//! 4. profiles
//! 5. properties, then the verdict flags are settled
//!
//! The source is owned by the per-run [`PdfDocument`] and dropped before
//! `analyze` returns, whichever way it returns. A panic anywhere in the
//! run is caught and recorded as [`MessageId::InternalError`].

use crate::compliance::{check_profile, linearization_dictionary, ProfileOutcome};
use crate::document::PdfDocument;
use crate::error::Result;
use crate::metadata::info_properties;
use crate::object::Object;
use crate::parser_config::ValidationOptions;
use crate::report::{Message, MessageId, Property, ValidationReport};
use crate::validators::{validate_trees, DocumentTrees, ValidatorState};
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;

/// Runs the PDF checks over one source at a time.
#[derive(Debug, Clone, Default)]
pub struct Analyzer {
    options: ValidationOptions,
}

impl Analyzer {
    /// Analyzer with the given options.
    pub fn new(options: ValidationOptions) -> Self {
        Self { options }
    }

    /// Options in use.
    pub fn options(&self) -> &ValidationOptions {
        &self.options
    }

    /// Validate `source`, recording into `report`.
    pub fn analyze<R: Read + Seek>(&self, source: R, report: ValidationReport) -> ValidationReport {
        let fallback = report.clone();
        let loaded = catch_unwind(AssertUnwindSafe(|| {
            PdfDocument::load_with_report(source, self.options.clone(), report)
        }));
        let mut doc = match loaded {
            Ok(doc) => doc,
            Err(panic) => {
                let mut report = fallback;
                report.add(internal_error(&*panic));
                return report;
            },
        };

        match catch_unwind(AssertUnwindSafe(|| self.run(&mut doc))) {
            Ok(()) => {
                let structure_read = doc.structure_read();
                let mut report = doc.into_report();
                report.settle(structure_read);
                report
            },
            Err(panic) => {
                doc.report_mut().add(internal_error(&*panic));
                doc.into_report()
            },
        }
    }

    /// Open and validate the file at `path`.
    ///
    /// Only failing to open the file is an error; everything found inside
    /// it is in the report.
    pub fn analyze_file(&self, path: impl AsRef<Path>) -> Result<ValidationReport> {
        let file = File::open(path.as_ref())?;
        log::debug!("analyzing {}", path.as_ref().display());
        Ok(self.analyze(BufReader::new(file), ValidationReport::new()))
    }

    fn run<R: Read + Seek>(&self, doc: &mut PdfDocument<R>) {
        if !doc.structure_read() {
            log::debug!("file structure unreadable; skipping document checks");
            if let Some(header) = doc.header() {
                let version = header.version_text.clone();
                doc.report_mut().add_property(Property::string("Version", version));
            }
            return;
        }

        let trees = validate_trees(doc);
        let info = match trees.trailer.info.clone() {
            Some(info) => info_properties(doc, &info),
            None => Vec::new(),
        };
        let outcomes: Vec<ProfileOutcome> = self
            .options
            .profiles
            .iter()
            .map(|&kind| check_profile(kind, doc, &trees))
            .collect();

        let properties = self.properties(doc, &trees, &outcomes, info);
        let report = doc.report_mut();
        for property in properties {
            report.add_property(property);
        }
        for outcome in outcomes {
            report.add_profile(outcome);
        }
    }

    fn properties<R: Read + Seek>(
        &self,
        doc: &mut PdfDocument<R>,
        trees: &DocumentTrees,
        outcomes: &[ProfileOutcome],
        info: Vec<Property>,
    ) -> Vec<Property> {
        let mut props = Vec::new();
        if let Some(version) = effective_version(doc, trees) {
            props.push(Property::string("Version", version));
        }
        props.push(Property::list(
            "Profiles",
            outcomes
                .iter()
                .filter(|o| o.satisfied)
                .map(|o| Property::string("Profile", o.profile.name()))
                .collect(),
        ));
        if let Some(count) = trees.trailer.object_count {
            props.push(Property::integer("ObjectCount", count));
        }
        if trees.pages.state != ValidatorState::NotStarted {
            props.push(Property::integer("PageCount", trees.pages.page_count as i64));
        }
        props.push(Property::boolean("Tagged", is_marked(doc, trees)));
        props.push(Property::boolean("Encrypted", trees.trailer.encrypted));
        props.push(Property::boolean(
            "Linearized",
            linearization_dictionary(doc).is_some(),
        ));
        props.push(Property::integer(
            "IncrementalUpdates",
            i64::from(doc.xref_sections().saturating_sub(1)),
        ));
        if let Some(role_map) = trees.structure.role_map.as_ref().filter(|m| !m.is_empty()) {
            props.push(Property::list(
                "RoleMap",
                role_map
                    .name_entries()
                    .map(|(custom, standard)| Property::string(custom, standard))
                    .collect(),
            ));
        }
        if !info.is_empty() {
            props.push(Property::list("Info", info));
        }
        props
    }
}

/// Header version, raised by a later catalog `/Version`.
fn effective_version<R: Read + Seek>(doc: &PdfDocument<R>, trees: &DocumentTrees) -> Option<String> {
    let header = doc.header()?;
    let catalog_version = trees.catalog.version.as_deref().and_then(|v| {
        let (major, minor) = v.split_once('.')?;
        Some((major.parse::<u8>().ok()?, minor.parse::<u8>().ok()?))
    });
    match (header.version, catalog_version) {
        (Some(h), Some(c)) if c > h => Some(format!("{}.{}", c.0, c.1)),
        _ => Some(header.version_text.clone()),
    }
}

/// `/MarkInfo /Marked true` in the catalog.
fn is_marked<R: Read + Seek>(doc: &mut PdfDocument<R>, trees: &DocumentTrees) -> bool {
    let Some(catalog) = trees.catalog.catalog.as_deref().and_then(Object::as_dict) else {
        return false;
    };
    let Some(mark_info) = doc.resolve_entry(catalog, "MarkInfo") else {
        return false;
    };
    let Some(mark_info) = mark_info.as_dict() else {
        return false;
    };
    doc.resolve_entry(mark_info, "Marked")
        .and_then(|m| m.as_bool())
        .unwrap_or(false)
}

fn internal_error(panic: &(dyn std::any::Any + Send)) -> Message {
    let detail = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    log::warn!("analysis aborted by internal error: {}", detail);
    Message::new(MessageId::InternalError, "analysis aborted by an internal error")
        .with_sub_message(detail)
}
