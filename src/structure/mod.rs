//! PDF logical structure (Tagged PDF) types.
//!
//! Implements the structure types of ISO 32000-1:2008 Section 14.7 and
//! 14.8.4, and the role map that renames custom types to standard ones.
//! The structure tree validator in [`crate::validators`] builds a
//! [`StructTree`] from these pieces.

mod role_map;
mod types;

pub use role_map::{RoleLookup, RoleMap};
pub use types::{StructChild, StructElem, StructTree, StructType};
