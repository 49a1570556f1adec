//! Document metadata: the information dictionary and XMP identification.
//!
//! Text strings in the information dictionary are either PDFDocEncoding
//! or UTF-16BE with a byte order mark (ISO 32000-1:2008, 7.9.2.2). Dates
//! use the PDF date format of 7.9.4:
//!
//! ```text
//! D:YYYYMMDDHHmmSSOHH'mm'
//! ```
//!
//! where everything after the year is optional and `O` is `+`, `-` or `Z`.

use crate::document::PdfDocument;
use crate::error::{Error, Result};
use crate::object::Object;
use crate::report::{Message, MessageId, Property};
use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::io::{Read, Seek};

/// Information dictionary keys reported as properties, in report order.
const INFO_KEYS: &[&str] = &[
    "Title",
    "Author",
    "Subject",
    "Keywords",
    "Creator",
    "Producer",
    "CreationDate",
    "ModDate",
];

/// Map one PDFDocEncoding byte to a character.
fn pdfdoc_char(code: u8) -> Option<char> {
    let c = match code {
        0x18 => '\u{02D8}', // breve
        0x19 => '\u{02C7}', // caron
        0x1A => '\u{02C6}', // circumflex
        0x1B => '\u{02D9}', // dotaccent
        0x1C => '\u{02DD}', // hungarumlaut
        0x1D => '\u{02DB}', // ogonek
        0x1E => '\u{02DA}', // ring
        0x1F => '\u{02DC}', // tilde
        0x00..=0x7E => code as char,
        0x80 => '\u{2022}', // bullet
        0x81 => '\u{2020}', // dagger
        0x82 => '\u{2021}', // daggerdbl
        0x83 => '\u{2026}', // ellipsis
        0x84 => '\u{2014}', // emdash
        0x85 => '\u{2013}', // endash
        0x86 => '\u{0192}', // florin
        0x87 => '\u{2044}', // fraction
        0x88 => '\u{2039}', // guilsinglleft
        0x89 => '\u{203A}', // guilsinglright
        0x8A => '\u{2212}', // minus
        0x8B => '\u{2030}', // perthousand
        0x8C => '\u{201E}', // quotedblbase
        0x8D => '\u{201C}', // quotedblleft
        0x8E => '\u{201D}', // quotedblright
        0x8F => '\u{2018}', // quoteleft
        0x90 => '\u{2019}', // quoteright
        0x91 => '\u{201A}', // quotesinglbase
        0x92 => '\u{2122}', // trademark
        0x93 => '\u{FB01}', // fi
        0x94 => '\u{FB02}', // fl
        0x95 => '\u{0141}', // Lslash
        0x96 => '\u{0152}', // OE
        0x97 => '\u{0160}', // Scaron
        0x98 => '\u{0178}', // Ydieresis
        0x99 => '\u{017D}', // Zcaron
        0x9A => '\u{0131}', // dotlessi
        0x9B => '\u{0142}', // lslash
        0x9C => '\u{0153}', // oe
        0x9D => '\u{0161}', // scaron
        0x9E => '\u{017E}', // zcaron
        0xA0 => '\u{20AC}', // Euro
        0xA1..=0xAC | 0xAE..=0xFF => code as char,
        // 0x7F, 0x9F and 0xAD are undefined
        _ => return None,
    };
    Some(c)
}

/// Decode a PDF text string.
///
/// UTF-16BE and UTF-8 byte order marks select those encodings; anything
/// else is PDFDocEncoding. Undecodable units become U+FFFD.
pub fn decode_text_string(bytes: &[u8]) -> String {
    if let Some(utf16) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = utf16
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    if let Some(utf8) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8_lossy(utf8).into_owned();
    }
    bytes
        .iter()
        .map(|&b| pdfdoc_char(b).unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}

/// Parse a PDF date string.
pub fn parse_pdf_date(text: &str) -> Result<DateTime<FixedOffset>> {
    let bad = |reason: &str| Error::ParseError {
        offset: 0,
        reason: format!("invalid date {:?}: {}", text, reason),
    };
    let s = text.trim();
    let s = s.strip_prefix("D:").unwrap_or(s).as_bytes();

    let mut pos = 0;
    let year = digits(s, &mut pos, 4).ok_or_else(|| bad("year missing"))?;
    let month = digits(s, &mut pos, 2).unwrap_or(1);
    let day = digits(s, &mut pos, 2).unwrap_or(1);
    let hour = digits(s, &mut pos, 2).unwrap_or(0);
    let minute = digits(s, &mut pos, 2).unwrap_or(0);
    let second = digits(s, &mut pos, 2).unwrap_or(0);

    let sign = match s.get(pos) {
        None | Some(b'Z') => 0,
        Some(b'+') => 1,
        Some(b'-') => -1,
        Some(_) => return Err(bad("unexpected character after time")),
    };
    pos += 1;
    let mut offset_minutes = 0i32;
    if sign != 0 {
        let hours = digits(s, &mut pos, 2).ok_or_else(|| bad("offset hours missing"))?;
        if s.get(pos) == Some(&b'\'') {
            pos += 1;
        }
        let minutes = digits(s, &mut pos, 2).unwrap_or(0);
        offset_minutes = sign * (hours as i32 * 60 + minutes as i32);
    }

    let naive = NaiveDate::from_ymd_opt(year as i32, month, day)
        .and_then(|d| d.and_hms_opt(hour, minute, second))
        .ok_or_else(|| bad("field out of range"))?;
    let zone = FixedOffset::east_opt(offset_minutes * 60).ok_or_else(|| bad("offset out of range"))?;
    zone.from_local_datetime(&naive)
        .single()
        .ok_or_else(|| bad("ambiguous local time"))
}

/// Fixed-width decimal field at `pos`; `None` when absent.
fn digits(s: &[u8], pos: &mut usize, width: usize) -> Option<u32> {
    let field = s.get(*pos..*pos + width)?;
    if !field.iter().all(u8::is_ascii_digit) {
        return None;
    }
    *pos += width;
    Some(field.iter().fold(0, |acc, d| acc * 10 + u32::from(d - b'0')))
}

/// Properties for the document information dictionary.
///
/// Unparseable `CreationDate`/`ModDate` values are reported and kept as
/// their raw text.
pub fn info_properties<R: Read + Seek>(doc: &mut PdfDocument<R>, info: &Object) -> Vec<Property> {
    let Some(dict) = info.as_dict() else {
        return Vec::new();
    };
    let mut props = Vec::new();
    for key in INFO_KEYS {
        let Some(value) = doc.resolve_entry(dict, key) else {
            continue;
        };
        let Some(raw) = value.as_string() else {
            log::debug!("/Info /{} is a {}, not a string", key, value.type_name());
            continue;
        };
        let text = decode_text_string(raw);
        if *key == "CreationDate" || *key == "ModDate" {
            match parse_pdf_date(&text) {
                Ok(date) => props.push(Property::string(*key, date.to_rfc3339())),
                Err(e) => {
                    doc.report_mut().add(
                        Message::new(MessageId::InfoDateInvalid, "document information date is malformed")
                            .with_sub_message(format!("/{}: {}", key, e)),
                    );
                    props.push(Property::string(*key, text));
                },
            }
        } else {
            props.push(Property::string(*key, text));
        }
    }
    props
}

/// PDF/A identification schema values from an XMP packet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PdfAIdentification {
    /// `pdfaid:part`
    pub part: Option<String>,
    /// `pdfaid:conformance`
    pub conformance: Option<String>,
}

/// Pull `pdfaid:part` and `pdfaid:conformance` out of an XMP packet.
///
/// Values may be attributes of `rdf:Description` or child elements.
pub fn parse_pdfa_identification(xml: &[u8]) -> Result<PdfAIdentification> {
    let text = String::from_utf8_lossy(xml);
    let mut reader = Reader::from_str(&text);
    reader.trim_text(true);

    let mut id = PdfAIdentification::default();
    let mut current: Option<String> = None;
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                read_attributes(&e, &mut id);
                current = Some(String::from_utf8_lossy(e.name().as_ref()).into_owned());
            },
            Ok(Event::Empty(e)) => read_attributes(&e, &mut id),
            Ok(Event::Text(e)) => {
                let value = e.unescape().unwrap_or_default().trim().to_string();
                match current.as_deref() {
                    Some("pdfaid:part") => id.part = Some(value),
                    Some("pdfaid:conformance") => id.conformance = Some(value),
                    _ => {},
                }
            },
            Ok(Event::End(_)) => current = None,
            Ok(Event::Eof) => break,
            Err(e) => {
                log::warn!("XMP parsing error: {:?}", e);
                return Err(Error::ParseError {
                    offset: reader.buffer_position(),
                    reason: format!("XMP metadata is not well-formed XML: {}", e),
                });
            },
            _ => {},
        }
    }
    Ok(id)
}

fn read_attributes(e: &BytesStart<'_>, id: &mut PdfAIdentification) {
    for attr in e.attributes().flatten() {
        let slot = match attr.key.as_ref() {
            b"pdfaid:part" => &mut id.part,
            b"pdfaid:conformance" => &mut id.conformance,
            _ => continue,
        };
        if let Ok(value) = attr.unescape_value() {
            *slot = Some(value.trim().to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========================================================================
    // Text strings
    // ========================================================================

    #[test]
    fn test_decode_pdfdoc() {
        assert_eq!(decode_text_string(b"Hello"), "Hello");
        assert_eq!(decode_text_string(&[0x84, b'x', 0x92]), "\u{2014}x\u{2122}");
        assert_eq!(decode_text_string(&[0xE9]), "\u{e9}");
        assert_eq!(decode_text_string(&[0x9F]), "\u{FFFD}");
    }

    #[test]
    fn test_decode_utf16be() {
        assert_eq!(decode_text_string(&[0xFE, 0xFF, 0x00, b'A', 0x26, 0x3A]), "A\u{263A}");
    }

    #[test]
    fn test_decode_utf8_bom() {
        assert_eq!(decode_text_string("\u{FEFF}caf\u{e9}".as_bytes()), "caf\u{e9}");
    }

    // ========================================================================
    // Dates
    // ========================================================================

    #[test]
    fn test_full_date() {
        let date = parse_pdf_date("D:20240115103000+01'00'").unwrap();
        assert_eq!(date.to_rfc3339(), "2024-01-15T10:30:00+01:00");
    }

    #[test]
    fn test_partial_dates() {
        assert_eq!(parse_pdf_date("D:2024").unwrap().to_rfc3339(), "2024-01-01T00:00:00+00:00");
        assert_eq!(
            parse_pdf_date("D:199812231952Z").unwrap().to_rfc3339(),
            "1998-12-23T19:52:00+00:00"
        );
        assert_eq!(
            parse_pdf_date("20010203040506-05'30").unwrap().to_rfc3339(),
            "2001-02-03T04:05:06-05:30"
        );
    }

    #[test]
    fn test_invalid_dates() {
        assert!(parse_pdf_date("yesterday").is_err());
        assert!(parse_pdf_date("D:20241301").is_err());
        assert!(parse_pdf_date("D:20240101x").is_err());
        assert!(parse_pdf_date("").is_err());
    }

    // ========================================================================
    // XMP
    // ========================================================================

    #[test]
    fn test_pdfaid_as_attributes() {
        let xmp = br#"<x:xmpmeta xmlns:x="adobe:ns:meta/">
  <rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#">
    <rdf:Description rdf:about="" xmlns:pdfaid="http://www.aiim.org/pdfa/ns/id/"
        pdfaid:part="1" pdfaid:conformance="B"/>
  </rdf:RDF>
</x:xmpmeta>"#;
        let id = parse_pdfa_identification(xmp).unwrap();
        assert_eq!(id.part.as_deref(), Some("1"));
        assert_eq!(id.conformance.as_deref(), Some("B"));
    }

    #[test]
    fn test_pdfaid_as_elements() {
        let xmp = br#"<?xpacket begin="" id="W5M0MpCehiHzreSzNTczkc9d"?>
<x:xmpmeta xmlns:x="adobe:ns:meta/">
  <rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#">
    <rdf:Description rdf:about="" xmlns:pdfaid="http://www.aiim.org/pdfa/ns/id/">
      <pdfaid:part>1</pdfaid:part>
      <pdfaid:conformance>A</pdfaid:conformance>
    </rdf:Description>
  </rdf:RDF>
</x:xmpmeta>
<?xpacket end="w"?>"#;
        let id = parse_pdfa_identification(xmp).unwrap();
        assert_eq!(id.part.as_deref(), Some("1"));
        assert_eq!(id.conformance.as_deref(), Some("A"));
    }

    #[test]
    fn test_no_pdfaid() {
        let id = parse_pdfa_identification(b"<x:xmpmeta><rdf:RDF/></x:xmpmeta>").unwrap();
        assert_eq!(id, PdfAIdentification::default());
    }

    #[test]
    fn test_malformed_xml() {
        assert!(parse_pdfa_identification(b"<a><b></a>").is_err());
    }
}
