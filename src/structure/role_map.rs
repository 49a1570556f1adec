//! Role map: custom structure type names mapped to other (eventually
//! standard) names.

use crate::object::{Dictionary, Object};
use crate::report::{Message, MessageId, ValidationReport};

/// Outcome of following the role map from one name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleLookup {
    /// Name reached after `hops` mappings (0 when unmapped)
    Resolved {
        /// Final name
        name: String,
        /// Mappings followed
        hops: u32,
    },
    /// A mapped value was not a name
    Malformed {
        /// Key whose value was bad
        key: String,
    },
    /// Hop limit reached; presumed circular
    Circular {
        /// Name the lookup started from
        start: String,
    },
}

/// `/RoleMap` dictionary of a structure tree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoleMap {
    entries: Dictionary,
}

impl RoleMap {
    /// Wrap a role map dictionary whose indirect values are already resolved.
    pub fn new(entries: Dictionary) -> Self {
        Self { entries }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Is the map empty?
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries whose value is a name, in file order.
    pub fn name_entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .filter_map(|(k, v)| v.as_name().map(|n| (k.as_str(), n)))
    }

    /// Follow mappings from `name` for at most `max_hops` steps.
    pub fn lookup(&self, name: &str, max_hops: u32) -> RoleLookup {
        let mut current = name;
        for hops in 0..=max_hops {
            match self.entries.get(current) {
                None => {
                    return RoleLookup::Resolved {
                        name: current.to_string(),
                        hops,
                    };
                },
                Some(Object::Name(next)) if hops < max_hops => current = next,
                Some(Object::Name(_)) => break,
                Some(_) => {
                    return RoleLookup::Malformed {
                        key: current.to_string(),
                    };
                },
            }
        }
        RoleLookup::Circular {
            start: name.to_string(),
        }
    }

    /// Dereference `name` to the type it stands for.
    ///
    /// Returns `name` itself when unmapped. Returns `None`, after recording
    /// exactly one diagnostic, when a mapped value is not a name or when
    /// `max_hops` mappings did not reach an unmapped name.
    pub fn dereference_struct_type(
        &self,
        name: &str,
        max_hops: u32,
        report: &mut ValidationReport,
    ) -> Option<String> {
        match self.lookup(name, max_hops) {
            RoleLookup::Resolved { name, .. } => Some(name),
            RoleLookup::Malformed { key } => {
                log::debug!("role map entry /{} is not a name", key);
                report.add(
                    Message::new(MessageId::RoleMapEntryMalformed, "role map value is not a name")
                        .with_sub_message(format!("/{} (while dereferencing /{})", key, name)),
                );
                None
            },
            RoleLookup::Circular { start } => {
                log::warn!("role map lookup of /{} exceeded {} hops", start, max_hops);
                report.add(
                    Message::new(
                        MessageId::RoleMapCircular,
                        "role map lookup did not terminate; mapping presumed circular",
                    )
                    .with_sub_message(format!("/{} after {} hops", start, max_hops)),
                );
                None
            },
        }
    }
}
