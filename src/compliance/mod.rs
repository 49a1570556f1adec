//! Profile checking.
//!
//! A profile is a set of rules a document may satisfy on top of being
//! valid PDF:
//!
//! - **Tagged PDF**: `/MarkInfo /Marked true` and a valid structure tree
//! - **PDF/A-1b**: the ISO 19005-1 level B requirements checked here
//! - **Linearized PDF**: a linearization dictionary consistent with the file
//!
//! Rules never short-circuit. Every unmet rule adds its own reason to the
//! outcome, so a report lists all of them rather than the first. A rule
//! that fails with an error or panics is converted into one
//! [`MessageId::ProfileUnmetAssumption`] reason and the remaining rules
//! still run.
//!
//! Reasons are informational: they explain a profile verdict and never
//! change the document's well-formed or valid flags.
//!
//! ## Standards Reference
//!
//! - ISO 32000-1:2008, 14.8 (Tagged PDF) and Annex F (Linearized PDF)
//! - ISO 19005-1:2005 (PDF/A-1)

mod linearized;
mod pdf_a;
mod tagged;
mod types;

pub use linearized::LinearizedProfile;
pub(crate) use linearized::linearization_dictionary;
pub use pdf_a::PdfA1bProfile;
pub use tagged::TaggedProfile;
pub use types::{ProfileKind, ProfileOutcome};

use crate::document::PdfDocument;
use crate::error::{Error, Result};
use crate::object::Dictionary;
use crate::report::{Message, MessageId};
use crate::validators::DocumentTrees;
use std::io::{Read, Seek};
use std::panic::{catch_unwind, AssertUnwindSafe};

/// A set of rules checked against a loaded document.
pub trait Profile {
    /// Which profile this is.
    fn kind(&self) -> ProfileKind;

    /// Run every rule, adding one reason per unmet rule.
    fn evaluate<R: Read + Seek>(
        &self,
        doc: &mut PdfDocument<R>,
        trees: &DocumentTrees,
        reasons: &mut ReasonCollector,
    );
}

/// Collects the reasons a profile is not satisfied.
#[derive(Debug, Default)]
pub struct ReasonCollector {
    reasons: Vec<Message>,
}

impl ReasonCollector {
    /// Empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an unmet rule.
    pub fn add(&mut self, reason: Message) {
        log::debug!("profile rule unmet: {}", reason);
        self.reasons.push(reason);
    }

    /// Shorthand for [`add`](Self::add) with a fresh [`Message`].
    pub fn fail(&mut self, id: MessageId, text: impl Into<String>) {
        self.add(Message::new(id, text));
    }

    /// Run one rule. An error or panic inside it becomes a single
    /// unmet-assumption reason.
    pub fn check<F>(&mut self, rule: &str, f: F)
    where
        F: FnOnce(&mut ReasonCollector) -> Result<()>,
    {
        match catch_unwind(AssertUnwindSafe(|| f(self))) {
            Ok(Ok(())) => {},
            Ok(Err(e)) => self.unmet(rule, e.to_string()),
            Err(panic) => self.unmet(rule, panic_text(&*panic)),
        }
    }

    fn unmet(&mut self, rule: &str, detail: String) {
        log::warn!("profile rule `{}` could not be evaluated: {}", rule, detail);
        self.add(
            Message::new(MessageId::ProfileUnmetAssumption, "profile rule could not be evaluated")
                .with_sub_message(format!("{}: {}", rule, detail)),
        );
    }

    /// Reasons so far.
    pub fn reasons(&self) -> &[Message] {
        &self.reasons
    }

    /// No reasons recorded.
    pub fn is_empty(&self) -> bool {
        self.reasons.is_empty()
    }

    fn into_reasons(self) -> Vec<Message> {
        self.reasons
    }
}

fn panic_text(panic: &(dyn std::any::Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "panic".to_string())
}

/// Check `profile` and collect every reason it is not satisfied.
///
/// Always returns an outcome; nothing a profile does escapes as an error
/// or panic.
pub fn satisfies_profile<R: Read + Seek, P: Profile>(
    profile: &P,
    doc: &mut PdfDocument<R>,
    trees: &DocumentTrees,
) -> ProfileOutcome {
    let mut reasons = ReasonCollector::new();
    let kind = profile.kind();
    reasons.check(kind.name(), |r| {
        profile.evaluate(doc, trees, r);
        Ok(())
    });
    let reasons = reasons.into_reasons();
    log::debug!("{}: {} reason(s)", kind, reasons.len());
    ProfileOutcome {
        profile: kind,
        satisfied: reasons.is_empty(),
        reasons,
    }
}

/// Check the profile named by `kind`.
pub fn check_profile<R: Read + Seek>(
    kind: ProfileKind,
    doc: &mut PdfDocument<R>,
    trees: &DocumentTrees,
) -> ProfileOutcome {
    match kind {
        ProfileKind::Tagged => satisfies_profile(&TaggedProfile, doc, trees),
        ProfileKind::PdfA1b => satisfies_profile(&PdfA1bProfile, doc, trees),
        ProfileKind::Linearized => satisfies_profile(&LinearizedProfile, doc, trees),
    }
}

/// The catalog dictionary, or an error that makes a rule an unmet
/// assumption.
pub(crate) fn catalog_dict(trees: &DocumentTrees) -> Result<&Dictionary> {
    trees
        .catalog
        .catalog
        .as_deref()
        .and_then(|c| c.as_dict())
        .ok_or_else(|| Error::MalformedStructure {
            offset: 0,
            reason: "no usable document catalog".to_string(),
        })
}
