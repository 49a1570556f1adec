//! Error types for the PDF validation core.
//!
//! Errors describe why a single step (lexing one token, parsing one object,
//! reading one cross-reference section) failed. They never escape the
//! analyzer: each stage turns them into diagnostics on the
//! [`ValidationReport`](crate::report::ValidationReport) at the smallest
//! scope that can recover.

/// Result type alias for validation core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while reading and checking a PDF.
#[derive(Debug, thiserror::Error)]
#[allow(clippy::enum_variant_names)]
pub enum Error {
    /// No `%PDF-` (or `%!PS-Adobe-... PDF-`) signature in the header window
    #[error("Invalid PDF header: {0}")]
    InvalidHeader(String),

    /// Parse error at specific byte offset
    #[error("Failed to parse object at byte {offset}: {reason}")]
    ParseError {
        /// Byte offset where error occurred
        offset: usize,
        /// Reason for parse failure
        reason: String,
    },

    /// A token could not be recognized
    #[error("Lexical error at byte {offset}: {reason}")]
    LexicalError {
        /// Byte offset of the offending token
        offset: usize,
        /// What was wrong with it
        reason: String,
    },

    /// Array or dictionary left open at end of input
    #[error("Malformed structure at byte {offset}: {reason}")]
    MalformedStructure {
        /// Byte offset where the unclosed container started
        offset: usize,
        /// Description of the unbalanced delimiter
        reason: String,
    },

    /// Invalid cross-reference section
    #[error("Invalid cross-reference data: {0}")]
    InvalidXref(String),

    /// Referenced object not found in cross-reference table
    #[error("Object not found: {0} {1} R")]
    ObjectNotFound(u32, u16),

    /// Object has wrong type
    #[error("Invalid object type: expected {expected}, found {found}")]
    InvalidObjectType {
        /// Expected object type
        expected: String,
        /// Actual object type found
        found: String,
    },

    /// Unexpected end of file
    #[error("End of file reached unexpectedly")]
    UnexpectedEof,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Stream decoding error
    #[error("Stream decoding error: {0}")]
    Decode(String),

    /// Unsupported stream filter
    #[error("Unsupported filter: {0}")]
    UnsupportedFilter(String),

    /// Circular reference detected in object graph
    #[error("Circular reference detected: object {0}")]
    CircularReference(crate::object::ObjectRef),

    /// A bounded walk (xref chain, role map, length chain) ran past its guard
    #[error("Hop limit exceeded (max: {0})")]
    HopLimitExceeded(u32),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ObjectRef;

    #[test]
    fn test_invalid_header_error() {
        let err = Error::InvalidHeader("no %PDF- signature".to_string());
        let msg = format!("{}", err);
        assert!(msg.contains("Invalid PDF header"));
        assert!(msg.contains("no %PDF- signature"));
    }

    #[test]
    fn test_parse_error() {
        let err = Error::ParseError {
            offset: 1234,
            reason: "invalid token".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("1234"));
        assert!(msg.contains("invalid token"));
    }

    #[test]
    fn test_lexical_and_structure_errors() {
        let lex = Error::LexicalError {
            offset: 7,
            reason: "unterminated literal string".to_string(),
        };
        assert!(lex.to_string().contains("byte 7"));

        let structure = Error::MalformedStructure {
            offset: 12,
            reason: "array not closed".to_string(),
        };
        assert!(structure.to_string().contains("array not closed"));
    }

    #[test]
    fn test_object_not_found_error() {
        let err = Error::ObjectNotFound(10, 0);
        assert!(err.to_string().contains("10 0 R"));
    }

    #[test]
    fn test_invalid_object_type_error() {
        let err = Error::InvalidObjectType {
            expected: "Dictionary".to_string(),
            found: "Array".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("Dictionary"));
        assert!(msg.contains("Array"));
    }

    #[test]
    fn test_circular_reference_and_hops() {
        let err = Error::CircularReference(ObjectRef::new(4, 0));
        assert!(err.to_string().contains("4 0 R"));

        let err = Error::HopLimitExceeded(1000);
        assert!(err.to_string().contains("1000"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(err.to_string().contains("IO error"));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Error>();
    }
}
