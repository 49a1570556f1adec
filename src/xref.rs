//! Cross-reference data: `startxref`, classic tables, xref streams, and the
//! `/Prev` / `/XRefStm` chain of incremental updates.
//!
//! Sections are read newest first, starting at the offset named by the last
//! `startxref`. An object number keeps the entry of the first section that
//! mentions it, so newer updates shadow older ones.
//!
//! Nothing here fails hard once `startxref` is found: problems are collected
//! as [`XrefProblem`]s next to whatever entries could be merged.

use crate::error::{Error, Result};
use crate::lexer::{Keyword, TokenKind};
use crate::object::{Dictionary, Object};
use crate::parser::{ParseNote, Parser};
use crate::parser_config::ValidationOptions;
use std::collections::{HashMap, HashSet, VecDeque};
use std::io::{Read, Seek, SeekFrom};

/// Largest subsection count accepted in a classic table.
const MAX_SUBSECTION_COUNT: u64 = 8_388_607;

/// Initial window when reading a section or an object.
pub(crate) const INITIAL_WINDOW: usize = 8 * 1024;

/// Trailer keys that older sections may supply when newer ones omit them.
const INHERITED_TRAILER_KEYS: &[&str] = &["Root", "Info", "ID", "Encrypt"];

/// Where an object lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XrefEntry {
    /// Free entry
    Free {
        /// Next free object number
        next: u64,
        /// Generation to use when the number is reused
        gen: u16,
    },
    /// Uncompressed object at a byte offset
    InFile {
        /// Offset of the `N G obj` header
        offset: u64,
        /// Generation number
        gen: u16,
    },
    /// Object packed in an object stream (generation is always 0)
    Compressed {
        /// Object number of the containing `/ObjStm`
        stream: u32,
        /// Index within that stream
        index: u32,
    },
}

/// Merged cross-reference table.
#[derive(Debug, Clone, Default)]
pub struct XrefTable {
    entries: HashMap<u32, XrefEntry>,
}

impl XrefTable {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert unless the number is already present. Returns whether it was
    /// inserted.
    pub fn insert_if_absent(&mut self, id: u32, entry: XrefEntry) -> bool {
        match self.entries.entry(id) {
            std::collections::hash_map::Entry::Occupied(_) => false,
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(entry);
                true
            },
        }
    }

    /// Entry for an object number.
    pub fn get(&self, id: u32) -> Option<&XrefEntry> {
        self.entries.get(&id)
    }

    /// Number of entries, free ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Is the table empty?
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All object numbers, ascending.
    pub fn object_numbers(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.entries.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

/// Classic table or stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    /// `xref` keyword, subsections, `trailer`
    Table,
    /// `/Type /XRef` stream object
    Stream,
}

/// One parsed section.
#[derive(Debug, Clone)]
pub struct XrefSection {
    /// File offset the section was read from
    pub offset: u64,
    /// Classic table or stream
    pub kind: SectionKind,
    /// Entries in file order
    pub entries: Vec<(u32, XrefEntry)>,
    /// Trailer dictionary (the stream dictionary for xref streams)
    pub trailer: Dictionary,
}

/// A recovered or fatal problem met while reading the chain.
#[derive(Debug, Clone, PartialEq)]
pub enum XrefProblem {
    /// A section could not be read; its entries are missing
    SectionInvalid {
        /// Offset of the section
        offset: u64,
        /// What went wrong
        reason: String,
    },
    /// An entry was unreadable or not in the fixed 20-byte form
    EntryMalformed {
        /// Offset of the section holding it
        offset: u64,
        /// Description
        reason: String,
    },
    /// `/Prev` or `/XRefStm` pointed back to a section already read
    Circular {
        /// The repeated offset
        offset: u64,
    },
    /// The chain was longer than the configured hop limit
    HopLimit {
        /// The limit
        limit: u32,
    },
    /// Recovered syntax problem inside a section's trailer or stream
    Syntax(ParseNote),
}

/// Result of walking the whole chain.
#[derive(Debug, Clone)]
pub struct XrefChain {
    /// Offset named by `startxref`
    pub startxref: u64,
    /// Merged entries, newest first-seen wins
    pub table: XrefTable,
    /// Trailer of the newest section, with older trailers filling
    /// `/Root`, `/Info`, `/ID`, `/Encrypt` when absent
    pub trailer: Option<Dictionary>,
    /// Main sections read (`/XRefStm` hybrids not counted)
    pub sections: u32,
    /// Kinds of the sections read, newest first
    pub kinds: Vec<SectionKind>,
    /// Problems in chain order
    pub problems: Vec<XrefProblem>,
}

/// Find the offset named by the last `startxref` in the final `window`
/// bytes of the file.
pub fn find_startxref<R: Read + Seek>(reader: &mut R, window: usize) -> Result<u64> {
    let file_size = reader.seek(SeekFrom::End(0))?;
    let read_size = (window as u64).min(file_size);
    reader.seek(SeekFrom::Start(file_size - read_size))?;
    let mut tail = Vec::with_capacity(read_size as usize);
    reader.take(read_size).read_to_end(&mut tail)?;
    scan_startxref(&tail)
}

/// Find the offset after the last `startxref` keyword in `tail`.
pub fn scan_startxref(tail: &[u8]) -> Result<u64> {
    let keyword = b"startxref";
    let at = tail
        .windows(keyword.len())
        .rposition(|w| w == keyword)
        .ok_or_else(|| Error::InvalidXref("no startxref keyword near end of file".to_string()))?;

    let mut lexer = crate::lexer::Lexer::new(&tail[at + keyword.len()..]);
    match lexer.next().kind {
        TokenKind::Integer(n) if n >= 0 => Ok(n as u64),
        other => Err(Error::InvalidXref(format!(
            "startxref not followed by an offset: {:?}",
            other
        ))),
    }
}

/// Does `%%EOF` appear in the final `window` bytes?
pub fn has_eof_marker<R: Read + Seek>(reader: &mut R, window: usize) -> Result<bool> {
    let file_size = reader.seek(SeekFrom::End(0))?;
    let read_size = (window as u64).min(file_size);
    reader.seek(SeekFrom::Start(file_size - read_size))?;
    let mut tail = Vec::with_capacity(read_size as usize);
    reader.take(read_size).read_to_end(&mut tail)?;
    Ok(tail.windows(5).any(|w| w == b"%%EOF"))
}

/// Run `attempt` on a window of the file starting at `offset`, doubling the
/// window while it asks for more bytes with [`Error::UnexpectedEof`].
///
/// `attempt` receives the bytes and whether they reach the end of the file.
pub(crate) fn with_growing_window<R, T, F>(
    reader: &mut R,
    offset: u64,
    mut attempt: F,
) -> Result<T>
where
    R: Read + Seek,
    F: FnMut(&[u8], bool) -> Result<T>,
{
    let file_size = reader.seek(SeekFrom::End(0))?;
    if offset >= file_size {
        return Err(Error::InvalidXref(format!(
            "offset {} is beyond end of file ({} bytes)",
            offset, file_size
        )));
    }
    let mut window = INITIAL_WINDOW as u64;
    loop {
        let len = window.min(file_size - offset);
        let at_eof = offset + len == file_size;
        reader.seek(SeekFrom::Start(offset))?;
        let mut buf = Vec::with_capacity(len as usize);
        reader.take(len).read_to_end(&mut buf)?;
        match attempt(&buf, at_eof) {
            Err(Error::UnexpectedEof) if !at_eof => window = window.saturating_mul(2),
            other => return other,
        }
    }
}

/// Read the section at `offset`.
pub fn read_section<R: Read + Seek>(
    reader: &mut R,
    offset: u64,
    options: &ValidationOptions,
) -> Result<(XrefSection, Vec<XrefProblem>)> {
    with_growing_window(reader, offset, |buf, at_eof| {
        let start = buf
            .iter()
            .position(|&b| !crate::lexer::is_whitespace(b))
            .unwrap_or(buf.len());
        if buf[start..].starts_with(b"xref") {
            log::debug!("classic xref table at byte {}", offset);
            parse_table(buf, offset, at_eof, options)
        } else if buf.get(start).is_some_and(u8::is_ascii_digit) {
            log::debug!("xref stream at byte {}", offset);
            parse_stream_section(buf, offset, at_eof, options)
        } else if start == buf.len() && !at_eof {
            Err(Error::UnexpectedEof)
        } else {
            Err(Error::InvalidXref(format!(
                "neither 'xref' nor an object at byte {}",
                offset
            )))
        }
    })
}

/// Split into lines on CR, LF or CRLF, yielding `(start, end)` byte ranges
/// without the terminator.
fn line_ranges(buf: &[u8]) -> Vec<(usize, usize)> {
    let mut lines = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < buf.len() {
        match buf[i] {
            b'\r' => {
                lines.push((start, i));
                i += if buf.get(i + 1) == Some(&b'\n') { 2 } else { 1 };
                start = i;
            },
            b'\n' => {
                lines.push((start, i));
                i += 1;
                start = i;
            },
            _ => i += 1,
        }
    }
    if start < buf.len() {
        lines.push((start, buf.len()));
    }
    lines
}

fn trim(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|&b| !crate::lexer::is_whitespace(b))
        .unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|&b| !crate::lexer::is_whitespace(b))
        .map_or(start, |p| p + 1);
    &bytes[start..end]
}

fn parse_number<T: std::str::FromStr>(field: &[u8]) -> Option<T> {
    if field.is_empty() || !field.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(field).ok()?.parse().ok()
}

/// Parse a classic table starting (after whitespace) with `xref`.
fn parse_table(
    buf: &[u8],
    offset: u64,
    at_eof: bool,
    options: &ValidationOptions,
) -> Result<(XrefSection, Vec<XrefProblem>)> {
    let mut lines = line_ranges(buf);
    if !at_eof && !buf.ends_with(b"\n") && !buf.ends_with(b"\r") {
        // The window may have cut the last line short
        lines.pop();
    }
    let mut problems = Vec::new();
    let mut entries = Vec::new();
    let mut irregular = 0usize;
    let mut idx = 0;

    // Skip to the line holding `xref`
    while idx < lines.len() && trim(&buf[lines[idx].0..lines[idx].1]).is_empty() {
        idx += 1;
    }
    idx += 1;

    let trailer_at = loop {
        let Some(&(start, end)) = lines.get(idx) else {
            return if at_eof {
                Err(Error::InvalidXref("xref table without trailer".to_string()))
            } else {
                Err(Error::UnexpectedEof)
            };
        };
        idx += 1;
        let line = trim(&buf[start..end]);
        if line.is_empty() || line.starts_with(b"%") {
            continue;
        }
        if line.starts_with(b"trailer") {
            let lead = buf[start..end]
                .iter()
                .position(|&b| b == b't')
                .unwrap_or(0);
            break start + lead;
        }

        let fields: Vec<&[u8]> = line
            .split(|&b| crate::lexer::is_whitespace(b))
            .filter(|f| !f.is_empty())
            .collect();
        let (first, count) = match fields.as_slice() {
            [first, count] => match (parse_number::<u32>(first), parse_number::<u64>(count)) {
                (Some(first), Some(count)) if count <= MAX_SUBSECTION_COUNT => (first, count),
                _ => {
                    return Err(Error::InvalidXref(format!(
                        "bad subsection header {:?}",
                        String::from_utf8_lossy(line)
                    )));
                },
            },
            _ => {
                return Err(Error::InvalidXref(format!(
                    "expected subsection header, found {:?}",
                    String::from_utf8_lossy(line)
                )));
            },
        };

        let mut i = 0u64;
        while i < count {
            let Some(&(estart, eend)) = lines.get(idx) else {
                if !at_eof {
                    return Err(Error::UnexpectedEof);
                }
                break;
            };
            let raw = &buf[estart..eend];
            let entry_line = trim(raw);
            if entry_line.is_empty() {
                idx += 1;
                continue;
            }
            if entry_line.starts_with(b"trailer") {
                log::warn!(
                    "xref subsection {} declares {} entries, found {}",
                    first,
                    count,
                    i
                );
                problems.push(XrefProblem::EntryMalformed {
                    offset,
                    reason: format!(
                        "subsection starting at {} declares {} entries but has {}",
                        first, count, i
                    ),
                });
                break;
            }
            idx += 1;

            let id = match u32::try_from(u64::from(first) + i) {
                Ok(id) => id,
                Err(_) => break,
            };
            i += 1;

            let fields: Vec<&[u8]> = entry_line
                .split(|&b| crate::lexer::is_whitespace(b))
                .filter(|f| !f.is_empty())
                .collect();
            let parsed = match fields.as_slice() {
                [off, gen, flag, ..] => {
                    match (parse_number::<u64>(off), parse_number::<u16>(gen), flag) {
                        (Some(off), Some(gen), [b'n']) => Some(XrefEntry::InFile { offset: off, gen }),
                        (Some(off), Some(gen), [b'f']) => Some(XrefEntry::Free { next: off, gen }),
                        _ => None,
                    }
                },
                _ => None,
            };
            match parsed {
                Some(entry) => {
                    if fields[0].len() != 10 || fields[1].len() != 5 || fields.len() != 3 {
                        irregular += 1;
                    }
                    entries.push((id, entry));
                },
                None => {
                    log::warn!("malformed xref entry for object {}: {:?}", id, entry_line);
                    problems.push(XrefProblem::EntryMalformed {
                        offset,
                        reason: format!(
                            "entry for object {} unreadable: {:?}",
                            id,
                            String::from_utf8_lossy(entry_line)
                        ),
                    });
                },
            }
        }
    };

    if irregular > 0 {
        problems.push(XrefProblem::EntryMalformed {
            offset,
            reason: format!("{} entries not in the fixed 20-byte form", irregular),
        });
    }

    let mut parser = Parser::with_base(&buf[trailer_at..], offset as usize + trailer_at)
        .with_limits(options)
        .partial(!at_eof);
    let keyword = parser.lexer().next();
    if !keyword.is_keyword(&Keyword::Trailer) {
        return Err(Error::InvalidXref("expected 'trailer'".to_string()));
    }
    let trailer = match parser.parse_object()? {
        Object::Dictionary(dict) => dict,
        other => {
            return Err(Error::InvalidXref(format!(
                "trailer is {}, not a dictionary",
                other.type_name()
            )));
        },
    };
    problems.extend(parser.take_notes().into_iter().map(XrefProblem::Syntax));

    Ok((
        XrefSection {
            offset,
            kind: SectionKind::Table,
            entries,
            trailer,
        },
        problems,
    ))
}

fn read_be(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
}

/// Parse an xref stream object.
fn parse_stream_section(
    buf: &[u8],
    offset: u64,
    at_eof: bool,
    options: &ValidationOptions,
) -> Result<(XrefSection, Vec<XrefProblem>)> {
    let mut parser = Parser::with_base(buf, offset as usize)
        .with_limits(options)
        .partial(!at_eof);
    let def = parser.parse_indirect_definition()?;
    let mut problems: Vec<XrefProblem> = parser
        .take_notes()
        .into_iter()
        .map(XrefProblem::Syntax)
        .collect();

    let Object::Stream { dict, .. } = &def.object else {
        return Err(Error::InvalidXref(format!(
            "object {} at byte {} is not a stream",
            def.obj_ref, offset
        )));
    };
    if def.object.dict_type() != Some("XRef") {
        return Err(Error::InvalidXref(format!(
            "stream {} is not /Type /XRef",
            def.obj_ref
        )));
    }

    let widths: Vec<usize> = dict
        .get("W")
        .and_then(Object::as_array)
        .map(|w| {
            w.iter()
                .filter_map(Object::as_integer)
                .filter(|n| (0..=8).contains(n))
                .map(|n| n as usize)
                .collect()
        })
        .unwrap_or_default();
    let [w1, w2, w3] = widths[..] else {
        return Err(Error::InvalidXref("/W must hold three widths of 0 to 8 bytes".to_string()));
    };
    let row = w1 + w2 + w3;
    if row == 0 {
        return Err(Error::InvalidXref("/W widths are all zero".to_string()));
    }

    let size = dict
        .get("Size")
        .and_then(Object::as_integer)
        .filter(|&n| n >= 0)
        .ok_or_else(|| Error::InvalidXref("xref stream without /Size".to_string()))?;

    let ranges: Vec<(u64, u64)> = match dict.get("Index").and_then(Object::as_array) {
        Some(index) => {
            if index.len() % 2 != 0 {
                problems.push(XrefProblem::EntryMalformed {
                    offset,
                    reason: "/Index has an odd number of elements".to_string(),
                });
            }
            index
                .chunks_exact(2)
                .filter_map(|pair| match (pair[0].as_integer(), pair[1].as_integer()) {
                    (Some(s), Some(c)) if s >= 0 && c >= 0 => Some((s as u64, c as u64)),
                    _ => None,
                })
                .collect()
        },
        None => vec![(0, size as u64)],
    };

    let data = def
        .object
        .decode_stream_data(options)
        .map_err(|e| Error::InvalidXref(format!("xref stream {}: {}", def.obj_ref, e)))?;

    let mut entries = Vec::new();
    let mut rows = data.chunks_exact(row);
    'ranges: for (first, count) in ranges {
        for i in 0..count {
            let Some(fields) = rows.next() else {
                problems.push(XrefProblem::EntryMalformed {
                    offset,
                    reason: format!("xref stream data ends before object {}", first + i),
                });
                break 'ranges;
            };
            let Ok(id) = u32::try_from(first + i) else {
                break 'ranges;
            };
            let kind = if w1 == 0 { 1 } else { read_be(&fields[..w1]) };
            let f2 = read_be(&fields[w1..w1 + w2]);
            let f3 = read_be(&fields[w1 + w2..]);
            let entry = match kind {
                0 => XrefEntry::Free {
                    next: f2,
                    gen: u16::try_from(f3).unwrap_or(u16::MAX),
                },
                1 => XrefEntry::InFile {
                    offset: f2,
                    gen: u16::try_from(f3).unwrap_or(u16::MAX),
                },
                2 => match (u32::try_from(f2), u32::try_from(f3)) {
                    (Ok(stream), Ok(index)) => XrefEntry::Compressed { stream, index },
                    _ => continue,
                },
                other => {
                    // Unknown types are null references
                    problems.push(XrefProblem::EntryMalformed {
                        offset,
                        reason: format!("entry type {} for object {}", other, id),
                    });
                    continue;
                },
            };
            entries.push((id, entry));
        }
    }

    Ok((
        XrefSection {
            offset,
            kind: SectionKind::Stream,
            entries,
            trailer: dict.clone(),
        },
        problems,
    ))
}

fn offset_entry(trailer: &Dictionary, key: &str) -> Option<u64> {
    trailer
        .get(key)
        .and_then(Object::as_integer)
        .and_then(|n| u64::try_from(n).ok())
}

/// Walk the chain starting at `startxref`, newest section first.
pub fn read_chain<R: Read + Seek>(
    reader: &mut R,
    startxref: u64,
    options: &ValidationOptions,
) -> XrefChain {
    let mut chain = XrefChain {
        startxref,
        table: XrefTable::new(),
        trailer: None,
        sections: 0,
        kinds: Vec::new(),
        problems: Vec::new(),
    };

    // (offset, is a hybrid /XRefStm section)
    let mut queue: VecDeque<(u64, bool)> = VecDeque::from([(startxref, false)]);
    let mut visited: HashSet<u64> = HashSet::new();
    let mut hops = 0u32;

    while let Some((offset, hybrid)) = queue.pop_front() {
        if !visited.insert(offset) {
            log::warn!("xref chain loops back to byte {}", offset);
            chain.problems.push(XrefProblem::Circular { offset });
            continue;
        }
        if hops >= options.max_xref_hops {
            log::warn!("xref chain exceeds {} sections", options.max_xref_hops);
            chain.problems.push(XrefProblem::HopLimit {
                limit: options.max_xref_hops,
            });
            break;
        }
        hops += 1;

        let (section, problems) = match read_section(reader, offset, options) {
            Ok(read) => read,
            Err(e) => {
                log::warn!("xref section at byte {} unreadable: {}", offset, e);
                chain.problems.push(XrefProblem::SectionInvalid {
                    offset,
                    reason: e.to_string(),
                });
                continue;
            },
        };
        chain.problems.extend(problems);
        chain.kinds.push(section.kind);

        for (id, entry) in section.entries {
            chain.table.insert_if_absent(id, entry);
        }
        if hybrid {
            continue;
        }
        chain.sections += 1;

        // Hybrid stream entries rank after this table but before /Prev
        if let Some(prev) = offset_entry(&section.trailer, "Prev") {
            queue.push_front((prev, false));
        }
        if section.kind == SectionKind::Table {
            if let Some(stm) = offset_entry(&section.trailer, "XRefStm") {
                queue.push_front((stm, true));
            }
        }

        match chain.trailer.as_mut() {
            None => chain.trailer = Some(section.trailer),
            Some(newest) => {
                for key in INHERITED_TRAILER_KEYS {
                    if let Some(value) = section.trailer.get(*key) {
                        newest
                            .entry((*key).to_string())
                            .or_insert_with(|| value.clone());
                    }
                }
            },
        }
    }

    chain
}
