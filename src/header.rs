//! File header recognition.
//!
//! A PDF starts with `%PDF-M.m`, or in old PostScript/PDF hybrids with
//! `%!PS-Adobe-N.n PDF-M.m`, somewhere inside the first kilobyte. No
//! signature at all means the file is not a PDF; a signature with a
//! version we do not recognize is still a PDF, just not a valid one.

use crate::error::{Error, Result};
use std::io::{Read, Seek, SeekFrom};

const PDF_SIGNATURE: &[u8] = b"%PDF-";
const PS_SIGNATURE: &[u8] = b"%!PS-Adobe-";

/// How the header's version string classifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionStatus {
    /// 1.0 through 1.7, or 2.0
    Supported,
    /// Well-shaped `M.m` that no published PDF version uses
    Unsupported,
    /// Not of the form digit `.` digit
    Malformed,
}

/// What was found at the top of the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfHeader {
    /// Offset of the `%` that starts the signature
    pub offset: usize,
    /// Version text following `PDF-`, up to the first whitespace or delimiter
    pub version_text: String,
    /// Parsed `(major, minor)` when the text is digit `.` digit
    pub version: Option<(u8, u8)>,
    /// Header came from a `%!PS-Adobe-` line
    pub postscript_hybrid: bool,
    /// The line after the header is a comment with at least four bytes >= 128
    pub binary_marker: bool,
}

impl PdfHeader {
    /// Classify the version string.
    pub fn version_status(&self) -> VersionStatus {
        match self.version {
            Some((1, 0..=7)) | Some((2, 0)) => VersionStatus::Supported,
            Some(_) => VersionStatus::Unsupported,
            None => VersionStatus::Malformed,
        }
    }
}

/// Read the first `window` bytes of `reader` and look for a header.
pub fn parse_header<R: Read + Seek>(reader: &mut R, window: usize) -> Result<PdfHeader> {
    reader.seek(SeekFrom::Start(0))?;
    let mut buf = Vec::with_capacity(window);
    reader.take(window as u64).read_to_end(&mut buf)?;
    scan_header(&buf)
}

/// Look for a header signature in `window`.
pub fn scan_header(window: &[u8]) -> Result<PdfHeader> {
    let pdf_at = find(window, PDF_SIGNATURE);
    let ps_at = find(window, PS_SIGNATURE).and_then(|ps| {
        let line_end = line_end(window, ps);
        find(&window[ps..line_end], b"PDF-").map(|rel| (ps, ps + rel))
    });

    let (offset, version_at, postscript_hybrid) = match (pdf_at, ps_at) {
        (Some(pdf), Some((ps, _))) if pdf < ps => (pdf, pdf + PDF_SIGNATURE.len(), false),
        (_, Some((ps, pdf_word))) => (ps, pdf_word + 4, true),
        (Some(pdf), None) => (pdf, pdf + PDF_SIGNATURE.len(), false),
        (None, None) => {
            return Err(Error::InvalidHeader(
                "no %PDF- signature in the header window".to_string(),
            ));
        },
    };

    let text_end = (version_at..window.len())
        .find(|&i| crate::lexer::is_whitespace(window[i]) || crate::lexer::is_delimiter(window[i]))
        .unwrap_or(window.len());
    let version_bytes = &window[version_at..text_end];
    let version = match version_bytes {
        [major, b'.', minor] if major.is_ascii_digit() && minor.is_ascii_digit() => {
            Some((major - b'0', minor - b'0'))
        },
        _ => None,
    };

    Ok(PdfHeader {
        offset,
        version_text: String::from_utf8_lossy(version_bytes).into_owned(),
        version,
        postscript_hybrid,
        binary_marker: has_binary_marker(window, line_end(window, offset)),
    })
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn line_end(buf: &[u8], from: usize) -> usize {
    (from..buf.len())
        .find(|&i| buf[i] == b'\r' || buf[i] == b'\n')
        .unwrap_or(buf.len())
}

/// Is the line starting after the EOL at `eol` a `%` comment with four or
/// more high bytes?
fn has_binary_marker(buf: &[u8], eol: usize) -> bool {
    let mut start = eol;
    while start < buf.len() && (buf[start] == b'\r' || buf[start] == b'\n') {
        start += 1;
    }
    if buf.get(start) != Some(&b'%') {
        return false;
    }
    let end = line_end(buf, start);
    buf[start + 1..end].iter().filter(|&&b| b >= 128).count() >= 4
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_plain_header() {
        let header = scan_header(b"%PDF-1.7\n%\xE2\xE3\xCF\xD3\n1 0 obj").unwrap();
        assert_eq!(header.offset, 0);
        assert_eq!(header.version, Some((1, 7)));
        assert_eq!(header.version_status(), VersionStatus::Supported);
        assert!(header.binary_marker);
        assert!(!header.postscript_hybrid);
    }

    #[test]
    fn test_header_after_junk() {
        let header = scan_header(b"garbage bytes\r\n%PDF-1.4\r\n").unwrap();
        assert_eq!(header.offset, 15);
        assert_eq!(header.version, Some((1, 4)));
        assert!(!header.binary_marker);
    }

    #[test]
    fn test_unsupported_version() {
        let header = scan_header(b"%PDF-1.9\n").unwrap();
        assert_eq!(header.version, Some((1, 9)));
        assert_eq!(header.version_status(), VersionStatus::Unsupported);
    }

    #[test]
    fn test_pdf_2_0_is_supported() {
        let header = scan_header(b"%PDF-2.0\n").unwrap();
        assert_eq!(header.version_status(), VersionStatus::Supported);
    }

    #[test]
    fn test_malformed_version() {
        let header = scan_header(b"%PDF-1.x\n").unwrap();
        assert_eq!(header.version, None);
        assert_eq!(header.version_text, "1.x");
        assert_eq!(header.version_status(), VersionStatus::Malformed);
    }

    #[test]
    fn test_comment_glued_to_version() {
        let header = scan_header(b"%PDF-1.4%\xE2\xE3\xCF\xD3\n1 0 obj").unwrap();
        assert_eq!(header.version_text, "1.4");
        assert_eq!(header.version, Some((1, 4)));
        assert_eq!(header.version_status(), VersionStatus::Supported);
    }

    #[test]
    fn test_postscript_hybrid() {
        let header = scan_header(b"%!PS-Adobe-3.0 PDF-1.2\n%%Title: x\n").unwrap();
        assert!(header.postscript_hybrid);
        assert_eq!(header.version, Some((1, 2)));
    }

    #[test]
    fn test_missing_header() {
        assert!(matches!(
            scan_header(b"just some text\n"),
            Err(Error::InvalidHeader(_))
        ));
    }

    #[test]
    fn test_signature_outside_window() {
        let mut data = vec![b' '; 2000];
        data.extend_from_slice(b"%PDF-1.4\n");
        let mut cursor = Cursor::new(data);
        assert!(parse_header(&mut cursor, 1024).is_err());
    }
}
