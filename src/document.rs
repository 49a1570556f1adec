//! Per-file validation context and indirect object resolver.
//!
//! A [`PdfDocument`] owns the byte source for one validation run together
//! with everything derived from it: header, merged cross-reference table,
//! trailer, the resolved-object cache and the [`ValidationReport`] every
//! stage writes into. Dropping it releases the source.
//!
//! Resolution never fails. A reference to an object that is absent, free,
//! or unreadable yields [`Object::Null`] and a diagnostic; the same number
//! is never reported twice.

use crate::error::{Error, Result};
use crate::header::{parse_header, PdfHeader, VersionStatus};
use crate::lexer::TokenKind;
use crate::object::{Dictionary, IndirectObject, Object, ObjectRef};
use crate::objstm::{parse_object_stream, ObjectStream};
use crate::parser::{ParseNote, Parser, ReferenceLookup};
use crate::parser_config::ValidationOptions;
use crate::report::{Message, MessageId, ValidationReport};
use crate::xref::{self, SectionKind, XrefEntry, XrefProblem, XrefTable, INITIAL_WINDOW};
use std::collections::{HashMap, HashSet};
use std::io::{Read, Seek, SeekFrom};
use std::rc::Rc;

/// Bytes searched for the first object when checking linearization.
const FIRST_OBJECT_WINDOW: u64 = 4096;

/// One validation run over one file.
pub struct PdfDocument<R: Read + Seek> {
    reader: R,
    options: ValidationOptions,
    file_size: u64,
    header: Option<PdfHeader>,
    xref: XrefTable,
    trailer: Option<Dictionary>,
    xref_sections: u32,
    xref_kinds: Vec<SectionKind>,
    cache: HashMap<ObjectRef, Rc<Object>>,
    object_streams: HashMap<u32, Option<Rc<ObjectStream>>>,
    resolving: HashSet<ObjectRef>,
    reported_missing: HashSet<u32>,
    report: ValidationReport,
}

impl<R: Read + Seek> std::fmt::Debug for PdfDocument<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfDocument")
            .field("file_size", &self.file_size)
            .field("header", &self.header)
            .field("xref_entries", &self.xref.len())
            .field("cached", &self.cache.len())
            .finish()
    }
}

impl<R: Read + Seek> PdfDocument<R> {
    /// Read header and cross-reference chain into a fresh report.
    pub fn load(reader: R, options: ValidationOptions) -> Self {
        Self::load_with_report(reader, options, ValidationReport::new())
    }

    /// Read header and cross-reference chain, recording into `report`.
    pub fn load_with_report(reader: R, options: ValidationOptions, report: ValidationReport) -> Self {
        let report = report
            .with_strict(options.strict)
            .with_max_messages(options.max_messages);
        let mut doc = PdfDocument {
            reader,
            options,
            file_size: 0,
            header: None,
            xref: XrefTable::new(),
            trailer: None,
            xref_sections: 0,
            xref_kinds: Vec::new(),
            cache: HashMap::new(),
            object_streams: HashMap::new(),
            resolving: HashSet::new(),
            reported_missing: HashSet::new(),
            report,
        };
        if let Err(e) = doc.read_structure() {
            log::warn!("I/O failure while reading file structure: {}", e);
            doc.report.add(
                Message::new(MessageId::TrailerMissing, "file structure could not be read")
                    .with_sub_message(e.to_string()),
            );
        }
        doc
    }

    fn read_structure(&mut self) -> Result<()> {
        self.file_size = self.reader.seek(SeekFrom::End(0))?;

        match parse_header(&mut self.reader, self.options.header_window) {
            Ok(header) => {
                self.check_header(&header);
                self.header = Some(header);
            },
            Err(Error::InvalidHeader(reason)) => {
                self.report.add(
                    Message::new(MessageId::HeaderMissing, "no PDF header signature")
                        .with_sub_message(reason)
                        .at(0),
                );
                return Ok(());
            },
            Err(e) => return Err(e),
        }

        let startxref = match xref::find_startxref(&mut self.reader, self.options.trailer_window)
        {
            Ok(offset) => offset,
            Err(Error::InvalidXref(reason)) => {
                self.report.add(
                    Message::new(MessageId::StartxrefMissing, "startxref not found")
                        .with_sub_message(reason),
                );
                return Ok(());
            },
            Err(e) => return Err(e),
        };

        let chain = xref::read_chain(&mut self.reader, startxref, &self.options);
        for problem in chain.problems {
            let message = xref_problem_message(problem);
            self.report.add(message);
        }
        self.xref = chain.table;
        self.xref_sections = chain.sections;
        self.xref_kinds = chain.kinds;
        self.trailer = chain.trailer;
        if self.trailer.is_none() {
            self.report.add(
                Message::new(MessageId::TrailerMissing, "no readable trailer dictionary")
                    .at(startxref),
            );
        }
        Ok(())
    }

    fn check_header(&mut self, header: &PdfHeader) {
        let offset = header.offset as u64;
        match header.version_status() {
            VersionStatus::Supported => {},
            VersionStatus::Unsupported => self.report.add(
                Message::new(MessageId::UnsupportedVersion, "unsupported PDF version")
                    .with_sub_message(header.version_text.clone())
                    .at(offset),
            ),
            VersionStatus::Malformed => self.report.add(
                Message::new(MessageId::MalformedVersion, "malformed PDF version")
                    .with_sub_message(header.version_text.clone())
                    .at(offset),
            ),
        }
        if header.postscript_hybrid {
            self.report.add(
                Message::new(MessageId::PostScriptHeader, "PostScript header with embedded PDF version")
                    .at(offset),
            );
        }
    }

    /// Header, if one was found.
    pub fn header(&self) -> Option<&PdfHeader> {
        self.header.as_ref()
    }

    /// Merged trailer, if the chain produced one.
    pub fn trailer(&self) -> Option<&Dictionary> {
        self.trailer.as_ref()
    }

    /// Merged cross-reference table.
    pub fn xref(&self) -> &XrefTable {
        &self.xref
    }

    /// Number of main xref sections walked (1 plus incremental updates).
    pub fn xref_sections(&self) -> u32 {
        self.xref_sections
    }

    /// Kinds of all sections read, newest first.
    pub fn xref_kinds(&self) -> &[SectionKind] {
        &self.xref_kinds
    }

    /// Header and trailer were both read.
    pub fn structure_read(&self) -> bool {
        self.header.is_some() && self.trailer.is_some()
    }

    /// Size of the source in bytes.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Options of this run.
    pub fn options(&self) -> &ValidationOptions {
        &self.options
    }

    /// The report being built.
    pub fn report(&self) -> &ValidationReport {
        &self.report
    }

    /// Mutable access to the report.
    pub fn report_mut(&mut self) -> &mut ValidationReport {
        &mut self.report
    }

    /// Finish the run, releasing the source.
    pub fn into_report(self) -> ValidationReport {
        self.report
    }

    /// Does `%%EOF` appear near the end of the file?
    pub fn eof_marker_present(&mut self) -> bool {
        xref::has_eof_marker(&mut self.reader, self.options.trailer_window).unwrap_or(false)
    }

    /// Resolve `id gen R`.
    ///
    /// Repeated calls return the same `Rc`.
    pub fn resolve(&mut self, id: u32, gen: u16) -> Rc<Object> {
        self.resolve_ref(ObjectRef::new(id, gen))
    }

    /// Resolve an [`ObjectRef`].
    pub fn resolve_ref(&mut self, obj_ref: ObjectRef) -> Rc<Object> {
        if let Some(hit) = self.cache.get(&obj_ref) {
            return Rc::clone(hit);
        }
        if self.resolving.contains(&obj_ref) {
            log::warn!("object {} refers to itself while being resolved", obj_ref);
            return Rc::new(Object::Null);
        }

        self.resolving.insert(obj_ref);
        let object = match self.xref.get(obj_ref.id).copied() {
            None => self.missing(obj_ref, "not in the cross-reference table"),
            Some(XrefEntry::Free { .. }) => {
                self.missing(obj_ref, "marked free in the cross-reference table")
            },
            Some(XrefEntry::InFile { offset, gen }) if gen == obj_ref.gen => {
                self.load_in_file(obj_ref, offset)
            },
            Some(XrefEntry::Compressed { stream, index }) if obj_ref.gen == 0 => {
                self.load_compressed(obj_ref, stream, index)
            },
            Some(_) => self.missing(obj_ref, "generation differs from the cross-reference table"),
        };
        self.resolving.remove(&obj_ref);

        let object = Rc::new(object);
        self.cache.insert(obj_ref, Rc::clone(&object));
        object
    }

    /// Follow `obj` if it is a reference; otherwise wrap a copy.
    pub fn resolve_object(&mut self, obj: &Object) -> Rc<Object> {
        match obj {
            Object::Reference(r) => self.resolve_ref(*r),
            direct => Rc::new(direct.clone()),
        }
    }

    /// Look up `key` in `dict`, following a reference. `None` when absent.
    pub fn resolve_entry(&mut self, dict: &Dictionary, key: &str) -> Option<Rc<Object>> {
        dict.get(key).map(|value| self.resolve_object(value))
    }

    /// Resolve a trailer entry.
    pub fn trailer_entry(&mut self, key: &str) -> Option<Rc<Object>> {
        let value = self.trailer.as_ref()?.get(key)?.clone();
        Some(self.resolve_object(&value))
    }

    fn missing(&mut self, obj_ref: ObjectRef, why: &str) -> Object {
        if self.reported_missing.insert(obj_ref.id) {
            log::debug!("object {} missing: {}", obj_ref, why);
            self.report.add(
                Message::new(MessageId::MissingObject, "reference to a missing object")
                    .with_sub_message(format!("{}: {}", obj_ref, why)),
            );
        }
        Object::Null
    }

    /// Read `len` bytes at `offset`; the flag says whether they reach EOF.
    fn read_window(&mut self, offset: u64, len: u64) -> Result<(Vec<u8>, bool)> {
        let len = len.min(self.file_size.saturating_sub(offset));
        self.reader.seek(SeekFrom::Start(offset))?;
        let mut buf = Vec::with_capacity(len as usize);
        (&mut self.reader).take(len).read_to_end(&mut buf)?;
        Ok((buf, offset + len >= self.file_size))
    }

    /// Parse the indirect definition at `offset`, growing the read window
    /// until the definition fits.
    fn parse_definition_at(&mut self, offset: u64) -> Result<(IndirectObject, Vec<ParseNote>)> {
        if offset >= self.file_size {
            return Err(Error::ParseError {
                offset: offset as usize,
                reason: format!("offset is beyond end of file ({} bytes)", self.file_size),
            });
        }
        let options = self.options.clone();
        let mut window = INITIAL_WINDOW as u64;
        loop {
            let (buf, at_eof) = self.read_window(offset, window)?;
            let mut parser = Parser::with_base(&buf, offset as usize)
                .with_limits(&options)
                .partial(!at_eof)
                .with_lookup(self);
            match parser.parse_indirect_definition() {
                Err(Error::UnexpectedEof) if !at_eof => window = window.saturating_mul(2),
                Err(e) => return Err(e),
                Ok(def) => {
                    let notes = parser.take_notes();
                    return Ok((def, notes));
                },
            }
        }
    }

    fn load_in_file(&mut self, obj_ref: ObjectRef, offset: u64) -> Object {
        log::trace!("loading {} from byte {}", obj_ref, offset);
        match self.parse_definition_at(offset) {
            Ok((def, notes)) => {
                for note in notes {
                    self.report.add(parse_note_message(note));
                }
                if def.obj_ref != obj_ref {
                    log::warn!(
                        "xref points {} at byte {}, which holds {}",
                        obj_ref,
                        offset,
                        def.obj_ref
                    );
                    self.report.add(
                        Message::new(
                            MessageId::ObjectHeaderMismatch,
                            "object header does not match the cross-reference entry",
                        )
                        .with_sub_message(format!("expected {}, found {}", obj_ref, def.obj_ref))
                        .at(offset),
                    );
                }
                def.object
            },
            Err(e) => {
                let id = match e {
                    Error::MalformedStructure { .. } => MessageId::MalformedStructure,
                    _ => MessageId::ObjectParseFailed,
                };
                self.report.add(
                    Message::new(id, "object could not be parsed")
                        .with_sub_message(format!("{}: {}", obj_ref, e))
                        .at(offset),
                );
                Object::Null
            },
        }
    }

    fn object_stream(&mut self, stream: u32) -> Option<Rc<ObjectStream>> {
        if let Some(cached) = self.object_streams.get(&stream) {
            return cached.clone();
        }
        let container = self.resolve(stream, 0);
        let unpacked = match parse_object_stream(&container, &self.options) {
            Ok(objstm) => Some(Rc::new(objstm)),
            Err(e) => {
                let id = match e {
                    Error::Decode(_) | Error::UnsupportedFilter(_) => MessageId::StreamDecodeFailed,
                    _ => MessageId::ObjectStreamInvalid,
                };
                self.report.add(
                    Message::new(id, "object stream unusable")
                        .with_sub_message(format!("{} 0 R: {}", stream, e)),
                );
                None
            },
        };
        self.object_streams.insert(stream, unpacked.clone());
        unpacked
    }

    fn load_compressed(&mut self, obj_ref: ObjectRef, stream: u32, index: u32) -> Object {
        let Some(objstm) = self.object_stream(stream) else {
            return Object::Null;
        };
        match objstm.get(obj_ref.id, index) {
            Some(packed) => match &packed.object {
                Ok(object) => object.clone(),
                Err(reason) => {
                    self.report.add(
                        Message::new(MessageId::ObjectStreamInvalid, "packed object unreadable")
                            .with_sub_message(format!(
                                "{} in object stream {}: {}",
                                obj_ref, stream, reason
                            )),
                    );
                    Object::Null
                },
            },
            None => self.missing(obj_ref, "absent from its object stream"),
        }
    }

    /// First indirect object after the header, if any starts within the
    /// first few kilobytes.
    pub fn first_object(&mut self) -> Option<IndirectObject> {
        let start = self.header.as_ref()?.offset as u64;
        let (buf, at_eof) = self.read_window(start, FIRST_OBJECT_WINDOW).ok()?;
        let mut parser = Parser::with_base(&buf, start as usize)
            .with_limits(&self.options)
            .partial(!at_eof);
        loop {
            let checkpoint = parser.lexer().checkpoint();
            let token = parser.lexer().next();
            match token.kind {
                TokenKind::Comment(_) => continue,
                TokenKind::Integer(_) => {
                    parser.lexer().rewind(checkpoint);
                    return parser.parse_indirect_definition().ok();
                },
                _ => return None,
            }
        }
    }
}

impl<R: Read + Seek> ReferenceLookup for PdfDocument<R> {
    fn lookup(&mut self, obj_ref: ObjectRef) -> Option<Object> {
        let object = self.resolve_ref(obj_ref);
        (!object.is_null()).then(|| (*object).clone())
    }
}

/// Diagnostic for a recovered parse irregularity.
pub fn parse_note_message(note: ParseNote) -> Message {
    match note {
        ParseNote::Lexical { offset, reason } => {
            Message::new(MessageId::LexicalError, "malformed token skipped")
                .with_sub_message(reason)
                .at(offset as u64)
        },
        ParseNote::StreamLength {
            offset,
            declared,
            actual,
        } => {
            let declared = declared.map_or_else(|| "unresolvable".to_string(), |n| n.to_string());
            Message::new(
                MessageId::StreamLengthMismatch,
                "stream /Length inconsistent with endstream position",
            )
            .with_sub_message(format!("declared {}, actual {}", declared, actual))
            .at(offset as u64)
        },
        ParseNote::StreamKeywordEol { offset } => Message::new(
            MessageId::StreamKeywordEol,
            "stream keyword not followed by CRLF or LF",
        )
        .at(offset as u64),
        ParseNote::MissingEndobj { offset } => {
            Message::new(MessageId::MissingEndobj, "endobj keyword missing").at(offset as u64)
        },
    }
}

fn xref_problem_message(problem: XrefProblem) -> Message {
    match problem {
        XrefProblem::SectionInvalid { offset, reason } => Message::new(
            MessageId::XrefSectionInvalid,
            "cross-reference section unreadable",
        )
        .with_sub_message(reason)
        .at(offset),
        XrefProblem::EntryMalformed { offset, reason } => {
            Message::new(MessageId::XrefEntryMalformed, "malformed cross-reference entry")
                .with_sub_message(reason)
                .at(offset)
        },
        XrefProblem::Circular { offset } => Message::new(
            MessageId::XrefChainCircular,
            "cross-reference chain loops back on itself",
        )
        .at(offset),
        XrefProblem::HopLimit { limit } => Message::new(
            MessageId::XrefHopLimit,
            "cross-reference chain too long; remaining sections ignored",
        )
        .with_sub_message(format!("limit {}", limit)),
        XrefProblem::Syntax(note) => parse_note_message(note),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::Validity;
    use crate::validators::test_support::build;
    use std::io::Cursor;

    fn load(data: Vec<u8>) -> PdfDocument<Cursor<Vec<u8>>> {
        PdfDocument::load(Cursor::new(data), ValidationOptions::default())
    }

    // ========================================================================
    // Loading
    // ========================================================================

    #[test]
    fn test_load_simple() {
        let doc = load(build(&[(1, "<< /Type /Catalog >>")], ""));
        assert!(doc.structure_read());
        assert_eq!(doc.header().unwrap().version, Some((1, 4)));
        assert_eq!(doc.xref_sections(), 1);
        assert!(doc.report().messages().is_empty(), "{:?}", doc.report().messages());
    }

    #[test]
    fn test_missing_header() {
        let doc = load(b"hello world\nstartxref\n0\n%%EOF".to_vec());
        assert!(!doc.structure_read());
        assert!(doc.report().has_message(MessageId::HeaderMissing));
        assert_eq!(doc.report().well_formed(), Validity::False);
    }

    #[test]
    fn test_missing_startxref() {
        let doc = load(b"%PDF-1.4\n1 0 obj null endobj\n".to_vec());
        assert!(doc.report().has_message(MessageId::StartxrefMissing));
        assert!(!doc.structure_read());
    }

    // ========================================================================
    // Resolution
    // ========================================================================

    #[test]
    fn test_resolve_is_cached_and_shared() {
        let mut doc = load(build(&[(1, "<< /Type /Catalog >>"), (2, "[1 2 3]")], ""));
        let a = doc.resolve(2, 0);
        let b = doc.resolve(2, 0);
        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(a.as_array().map(Vec::len), Some(3));
    }

    #[test]
    fn test_missing_object_reported_once() {
        let mut doc = load(build(&[(1, "<< /Type /Catalog >>")], ""));
        assert!(doc.resolve(40, 0).is_null());
        assert!(doc.resolve(40, 0).is_null());
        assert!(doc.resolve(40, 3).is_null());
        assert_eq!(doc.report().count_messages(MessageId::MissingObject), 1);
    }

    #[test]
    fn test_free_entry_resolves_to_null() {
        let mut doc = load(build(&[(1, "<< /Type /Catalog >>"), (3, "7")], ""));
        assert!(doc.resolve(2, 0).is_null());
        assert_eq!(doc.report().count_messages(MessageId::MissingObject), 1);
    }

    #[test]
    fn test_header_mismatch_still_returns_object() {
        let mut data = build(&[(1, "<< /Type /Catalog >>"), (2, "(two)")], "");
        // Rewrite "2 0 obj" as "5 0 obj"
        let at = data.windows(7).position(|w| w == b"2 0 obj").unwrap();
        data[at] = b'5';
        let mut doc = load(data);
        assert_eq!(doc.resolve(2, 0).as_string(), Some(&b"two"[..]));
        assert!(doc.report().has_message(MessageId::ObjectHeaderMismatch));
    }

    #[test]
    fn test_indirect_length_resolved_through_document() {
        let mut doc = load(build(
            &[
                (1, "<< /Type /Catalog >>"),
                (2, "<< /Length 3 0 R >>\nstream\nabcdef\nendstream"),
                (3, "6"),
            ],
            "",
        ));
        let stream = doc.resolve(2, 0);
        assert!(stream.is_stream());
        assert!(!doc.report().has_message(MessageId::StreamLengthMismatch));
    }

    #[test]
    fn test_self_referential_length_terminates() {
        let mut doc = load(build(
            &[
                (1, "<< /Type /Catalog >>"),
                (2, "<< /Length 2 0 R >>\nstream\nabc\nendstream"),
            ],
            "",
        ));
        assert!(doc.resolve(2, 0).is_stream());
        assert!(doc.report().has_message(MessageId::StreamLengthMismatch));
    }

    #[test]
    fn test_large_object_grows_window() {
        let big = format!("({})", "x".repeat(3 * INITIAL_WINDOW));
        let mut doc = load(build(&[(1, "<< /Type /Catalog >>"), (2, &big)], ""));
        assert_eq!(
            doc.resolve(2, 0).as_string().map(<[u8]>::len),
            Some(3 * INITIAL_WINDOW)
        );
    }

    #[test]
    fn test_unparseable_object() {
        let mut doc = load(build(&[(1, "<< /Type /Catalog >>"), (2, "[1 2")], ""));
        assert!(doc.resolve(2, 0).is_null());
        assert!(doc.report().has_message(MessageId::MalformedStructure));
    }

    #[test]
    fn test_first_object() {
        let mut doc = load(build(&[(1, "<< /Linearized 1 >>")], ""));
        let first = doc.first_object().unwrap();
        assert_eq!(first.obj_ref, ObjectRef::new(1, 0));
        assert!(first.object.get("Linearized").is_some());
    }
}
