//! Validation options: guard limits and strictness.

use crate::compliance::ProfileKind;

/// Options controlling how hard the core tries to recover and how far it
/// is willing to walk through adversarial structures.
///
/// # Example
///
/// ```
/// use pdf_probe::parser_config::ValidationOptions;
///
/// // Lenient mode (default): syntax irregularities are advisory
/// let lenient = ValidationOptions::lenient();
/// assert!(!lenient.strict);
///
/// // Strict mode: recoverable irregularities also clear the valid flag
/// let strict = ValidationOptions::strict().with_max_xref_hops(16);
/// assert!(strict.strict);
/// assert_eq!(strict.max_xref_hops, 16);
/// ```
#[derive(Debug, Clone)]
pub struct ValidationOptions {
    /// Treat recovered syntax problems (wrong `/Length`, object header
    /// mismatch, malformed xref entry) as validity failures.
    pub strict: bool,

    /// Maximum number of xref sections followed through `/Prev` and
    /// `/XRefStm` before the chain is abandoned.
    pub max_xref_hops: u32,

    /// Maximum number of role-map hops when dereferencing a structure type.
    pub max_role_map_hops: u32,

    /// Maximum indirect hops when resolving a stream's `/Length`.
    pub max_length_hops: u32,

    /// Maximum array/dictionary nesting depth inside one object.
    pub max_nesting: usize,

    /// Bytes from the start of the file searched for the header signature.
    pub header_window: usize,

    /// Bytes from the end of the file searched for `startxref` and `%%EOF`.
    pub trailer_window: usize,

    /// Maximum decompression ratio (compressed:decompressed).
    ///
    /// Applies to xref streams and object streams. Set to 0 to disable.
    pub max_decompression_ratio: u32,

    /// Maximum decompressed stream size in bytes. Set to 0 to disable.
    pub max_decompressed_size: usize,

    /// Maximum number of diagnostics kept in the report (0 = unlimited).
    ///
    /// Flags keep being updated after the cap is hit; only the message
    /// list stops growing.
    pub max_messages: usize,

    /// Profiles evaluated after the document tree validators ran.
    pub profiles: Vec<ProfileKind>,
}

impl Default for ValidationOptions {
    /// Default configuration: lenient mode, every profile
    fn default() -> Self {
        Self::lenient()
    }
}

impl ValidationOptions {
    /// Strict mode: recovered irregularities count against validity.
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Self::lenient()
        }
    }

    /// Lenient mode: recover, report advisories, keep going.
    pub fn lenient() -> Self {
        Self {
            strict: false,
            max_xref_hops: 1000,
            max_role_map_hops: 50,
            max_length_hops: 8,
            max_nesting: 256,
            header_window: 1024,
            trailer_window: 2048,
            max_decompression_ratio: 100,
            max_decompressed_size: 100 * 1024 * 1024, // 100 MB
            max_messages: 1000,
            profiles: ProfileKind::all().to_vec(),
        }
    }

    /// Set strictness.
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Set the xref chain guard.
    pub fn with_max_xref_hops(mut self, hops: u32) -> Self {
        self.max_xref_hops = hops;
        self
    }

    /// Set the role-map dereference guard.
    pub fn with_max_role_map_hops(mut self, hops: u32) -> Self {
        self.max_role_map_hops = hops;
        self
    }

    /// Set the nesting limit for arrays and dictionaries.
    pub fn with_max_nesting(mut self, depth: usize) -> Self {
        self.max_nesting = depth;
        self
    }

    /// Set the diagnostic cap.
    pub fn with_max_messages(mut self, max: usize) -> Self {
        self.max_messages = max;
        self
    }

    /// Replace the set of profiles to evaluate.
    pub fn with_profiles(mut self, profiles: impl IntoIterator<Item = ProfileKind>) -> Self {
        self.profiles = profiles.into_iter().collect();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lenient_defaults() {
        let opts = ValidationOptions::default();
        assert!(!opts.strict);
        assert_eq!(opts.max_xref_hops, 1000);
        assert_eq!(opts.max_role_map_hops, 50);
        assert_eq!(opts.header_window, 1024);
        assert_eq!(opts.profiles.len(), ProfileKind::all().len());
    }

    #[test]
    fn test_strict_keeps_limits() {
        let opts = ValidationOptions::strict();
        assert!(opts.strict);
        assert_eq!(opts.max_nesting, ValidationOptions::lenient().max_nesting);
    }

    #[test]
    fn test_builders() {
        let opts = ValidationOptions::lenient()
            .with_strict(true)
            .with_max_role_map_hops(5)
            .with_max_nesting(10)
            .with_max_messages(0)
            .with_profiles([ProfileKind::Tagged]);
        assert!(opts.strict);
        assert_eq!(opts.max_role_map_hops, 5);
        assert_eq!(opts.max_nesting, 10);
        assert_eq!(opts.max_messages, 0);
        assert_eq!(opts.profiles, vec![ProfileKind::Tagged]);
    }
}
