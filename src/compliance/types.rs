//! Types for profile checking.

use crate::report::{Message, MessageId};
use serde::Serialize;
use std::fmt;

/// A profile a document can be checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ProfileKind {
    /// Tagged PDF (ISO 32000-1:2008, 14.8)
    #[serde(rename = "Tagged PDF")]
    Tagged,
    /// PDF/A-1 level B (ISO 19005-1:2005)
    #[serde(rename = "PDF/A-1b")]
    PdfA1b,
    /// Linearized PDF (ISO 32000-1:2008, Annex F)
    #[serde(rename = "Linearized PDF")]
    Linearized,
}

impl ProfileKind {
    /// Every profile, in evaluation order.
    pub fn all() -> &'static [ProfileKind] {
        &[ProfileKind::Tagged, ProfileKind::PdfA1b, ProfileKind::Linearized]
    }

    /// Display name.
    pub fn name(self) -> &'static str {
        match self {
            ProfileKind::Tagged => "Tagged PDF",
            ProfileKind::PdfA1b => "PDF/A-1b",
            ProfileKind::Linearized => "Linearized PDF",
        }
    }
}

impl fmt::Display for ProfileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of checking one profile.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileOutcome {
    /// Which profile
    pub profile: ProfileKind,
    /// All rules held
    pub satisfied: bool,
    /// One entry per unmet rule
    pub reasons: Vec<Message>,
}

impl ProfileOutcome {
    /// Is there a reason with `id`?
    pub fn has_reason(&self, id: MessageId) -> bool {
        self.reasons.iter().any(|r| r.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_names() {
        assert_eq!(ProfileKind::PdfA1b.to_string(), "PDF/A-1b");
        assert_eq!(ProfileKind::all().len(), 3);
        assert_eq!(
            serde_json::to_string(&ProfileKind::Tagged).unwrap(),
            "\"Tagged PDF\""
        );
    }
}
