//! PDF object parser.
//!
//! Builds [`Object`]s from the token stream of a [`Lexer`]:
//! - Scalars, names, strings
//! - Arrays and dictionaries (balanced; left open at end of input is a
//!   [`Error::MalformedStructure`])
//! - Indirect references (`10 0 R`), found by two-token lookahead
//! - Streams: a dictionary followed by `stream`, delimited by `endstream`
//! - Indirect definitions (`N G obj ... endobj`)
//!
//! Problems the parser recovers from are not errors. They are collected as
//! [`ParseNote`]s for the caller to report.

use crate::error::{Error, Result};
use crate::lexer::{Delimiter, Keyword, Lexer, Token, TokenKind};
use crate::object::{Dictionary, IndirectObject, Object, ObjectRef};
use crate::parser_config::ValidationOptions;

const ENDSTREAM: &[u8] = b"endstream";

/// Resolves indirect references met while parsing (stream `/Length`).
pub trait ReferenceLookup {
    /// Resolve `obj_ref`, or `None` when it cannot be resolved.
    fn lookup(&mut self, obj_ref: ObjectRef) -> Option<Object>;
}

/// A recovered irregularity.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseNote {
    /// The lexer skipped a malformed token
    Lexical {
        /// Offset of the bad token
        offset: usize,
        /// What was wrong
        reason: String,
    },
    /// `/Length` missing or inconsistent with the `endstream` position
    StreamLength {
        /// Offset of the stream dictionary
        offset: usize,
        /// Declared length, if one could be read
        declared: Option<i64>,
        /// Length between `stream` and `endstream`
        actual: usize,
    },
    /// `stream` keyword not followed by CRLF or LF
    StreamKeywordEol {
        /// Offset just after the keyword
        offset: usize,
    },
    /// Indirect definition without `endobj`
    MissingEndobj {
        /// Where `endobj` was expected
        offset: usize,
    },
}

/// Parser over one buffer.
pub struct Parser<'a, 'r> {
    lexer: Lexer<'a>,
    lookup: Option<&'r mut dyn ReferenceLookup>,
    max_nesting: usize,
    max_length_hops: u32,
    complete: bool,
    notes: Vec<ParseNote>,
}

impl<'a> Parser<'a, 'static> {
    /// Parse `input`, with offsets relative to its start.
    pub fn new(input: &'a [u8]) -> Self {
        Self::with_base(input, 0)
    }

    /// Parse `input`, which was read from absolute file offset `base`.
    pub fn with_base(input: &'a [u8], base: usize) -> Self {
        let defaults = ValidationOptions::default();
        Parser {
            lexer: Lexer::with_base(input, base),
            lookup: None,
            max_nesting: defaults.max_nesting,
            max_length_hops: defaults.max_length_hops,
            complete: true,
            notes: Vec::new(),
        }
    }
}

impl<'a, 'r> Parser<'a, 'r> {
    /// Use `lookup` to resolve indirect stream lengths.
    pub fn with_lookup<'s>(self, lookup: &'s mut dyn ReferenceLookup) -> Parser<'a, 's> {
        Parser {
            lexer: self.lexer,
            lookup: Some(lookup),
            max_nesting: self.max_nesting,
            max_length_hops: self.max_length_hops,
            complete: self.complete,
            notes: self.notes,
        }
    }

    /// Take nesting and `/Length` hop limits from `options`.
    pub fn with_limits(mut self, options: &ValidationOptions) -> Self {
        self.max_nesting = options.max_nesting;
        self.max_length_hops = options.max_length_hops;
        self
    }

    /// The buffer is a window that stops before the end of the file.
    ///
    /// Running off its end then yields [`Error::UnexpectedEof`] so the
    /// caller can retry with more bytes.
    pub fn partial(mut self, partial: bool) -> Self {
        self.complete = !partial;
        self
    }

    /// The underlying lexer.
    pub fn lexer(&mut self) -> &mut Lexer<'a> {
        &mut self.lexer
    }

    /// Recovered irregularities so far, lexical ones included.
    pub fn take_notes(&mut self) -> Vec<ParseNote> {
        for err in self.lexer.take_errors() {
            if let Error::LexicalError { offset, reason } = err {
                self.notes.push(ParseNote::Lexical { offset, reason });
            }
        }
        std::mem::take(&mut self.notes)
    }

    /// Parse one direct object.
    pub fn parse_object(&mut self) -> Result<Object> {
        let token = self.next_significant();
        self.parse_value(token, 0)
    }

    /// Parse `N G obj <object> endobj`.
    pub fn parse_indirect_definition(&mut self) -> Result<IndirectObject> {
        let first = self.next_significant();
        let offset = first.offset;
        let id = match first.kind {
            TokenKind::Integer(n) if (0..=u32::MAX as i64).contains(&n) => n as u32,
            TokenKind::Eof => return Err(Error::UnexpectedEof),
            _ => return Err(self.unexpected(&first, "object number")),
        };
        let second = self.next_significant();
        let gen = match second.kind {
            TokenKind::Integer(g) if (0..=u16::MAX as i64).contains(&g) => g as u16,
            _ => return Err(self.unexpected(&second, "generation number")),
        };
        let keyword = self.next_significant();
        if !keyword.is_keyword(&Keyword::Obj) {
            return Err(self.unexpected(&keyword, "'obj'"));
        }

        let body = self.next_significant();
        if body.is_keyword(&Keyword::EndObj) {
            return Ok(IndirectObject {
                obj_ref: ObjectRef::new(id, gen),
                object: Object::Null,
                offset,
            });
        }
        let object = self.parse_value(body, 0)?;

        let end = self.next_significant();
        if !end.is_keyword(&Keyword::EndObj) {
            if end.is_eof() && !self.complete {
                return Err(Error::UnexpectedEof);
            }
            log::warn!("object {} {} has no endobj (byte {})", id, gen, end.offset);
            self.notes
                .push(ParseNote::MissingEndobj { offset: end.offset });
        }

        Ok(IndirectObject {
            obj_ref: ObjectRef::new(id, gen),
            object,
            offset,
        })
    }

    fn next_significant(&mut self) -> Token {
        loop {
            let token = self.lexer.next();
            if !matches!(token.kind, TokenKind::Comment(_)) {
                return token;
            }
        }
    }

    fn unexpected(&self, token: &Token, wanted: &str) -> Error {
        Error::ParseError {
            offset: token.offset,
            reason: format!("expected {}, found {:?}", wanted, token.kind),
        }
    }

    fn parse_value(&mut self, token: Token, depth: usize) -> Result<Object> {
        if depth > self.max_nesting {
            return Err(Error::ParseError {
                offset: token.offset,
                reason: format!("nesting deeper than {}", self.max_nesting),
            });
        }
        match token.kind {
            TokenKind::Integer(n) => Ok(self.integer_or_reference(n)),
            TokenKind::Real(r) => Ok(Object::Real(r)),
            TokenKind::Name(name) => Ok(Object::Name(name)),
            TokenKind::LiteralString(s) | TokenKind::HexString(s) => Ok(Object::String(s)),
            TokenKind::Keyword(Keyword::True) => Ok(Object::Boolean(true)),
            TokenKind::Keyword(Keyword::False) => Ok(Object::Boolean(false)),
            TokenKind::Keyword(Keyword::Null) => Ok(Object::Null),
            TokenKind::Delimiter(Delimiter::ArrayOpen) => self.parse_array(token.offset, depth),
            TokenKind::Delimiter(Delimiter::DictOpen) => {
                let dict = self.parse_dictionary(token.offset, depth)?;
                if self.lexer.peek().is_keyword(&Keyword::Stream) {
                    self.lexer.next();
                    self.parse_stream_body(dict, token.offset)
                } else {
                    Ok(Object::Dictionary(dict))
                }
            },
            TokenKind::Eof => Err(Error::UnexpectedEof),
            _ => Err(self.unexpected(&token, "an object")),
        }
    }

    /// `n`, or `n g R` when the next two tokens complete a reference.
    fn integer_or_reference(&mut self, n: i64) -> Object {
        if !(0..=u32::MAX as i64).contains(&n) {
            return Object::Integer(n);
        }
        let checkpoint = self.lexer.checkpoint();
        if let TokenKind::Integer(gen) = self.next_significant().kind {
            if (0..=u16::MAX as i64).contains(&gen) && self.next_significant().is_keyword(&Keyword::R)
            {
                return Object::Reference(ObjectRef::new(n as u32, gen as u16));
            }
        }
        self.lexer.rewind(checkpoint);
        Object::Integer(n)
    }

    fn open_container_error(&self, token: &Token, start: usize, what: &str) -> Error {
        if token.is_eof() && !self.complete {
            Error::UnexpectedEof
        } else {
            Error::MalformedStructure {
                offset: start,
                reason: format!("{} not closed before byte {}", what, token.offset),
            }
        }
    }

    fn parse_array(&mut self, start: usize, depth: usize) -> Result<Object> {
        let mut items = Vec::new();
        loop {
            let token = self.next_significant();
            match token.kind {
                TokenKind::Delimiter(Delimiter::ArrayClose) => return Ok(Object::Array(items)),
                TokenKind::Eof | TokenKind::Keyword(Keyword::EndObj) => {
                    return Err(self.open_container_error(&token, start, "array"));
                },
                _ => items.push(self.parse_value(token, depth + 1)?),
            }
        }
    }

    fn parse_dictionary(&mut self, start: usize, depth: usize) -> Result<Dictionary> {
        let mut dict = Dictionary::new();
        loop {
            let token = self.next_significant();
            match token.kind {
                TokenKind::Delimiter(Delimiter::DictClose) => return Ok(dict),
                TokenKind::Eof | TokenKind::Keyword(Keyword::EndObj) => {
                    return Err(self.open_container_error(&token, start, "dictionary"));
                },
                TokenKind::Name(key) => {
                    let value_token = self.next_significant();
                    if matches!(value_token.kind, TokenKind::Delimiter(Delimiter::DictClose)) {
                        // `/Key >>`: key without value reads as null
                        dict.insert(key, Object::Null);
                        return Ok(dict);
                    }
                    let value = self.parse_value(value_token, depth + 1)?;
                    dict.insert(key, value);
                },
                _ => return Err(self.unexpected(&token, "a name key")),
            }
        }
    }

    fn declared_length(&mut self, dict: &Dictionary) -> Option<i64> {
        let mut current = dict.get("Length")?.clone();
        for _ in 0..=self.max_length_hops {
            match current {
                Object::Integer(n) => return Some(n),
                Object::Reference(r) => current = self.lookup.as_mut()?.lookup(r)?,
                _ => return None,
            }
        }
        log::warn!("stream /Length chain longer than {} hops", self.max_length_hops);
        None
    }

    fn parse_stream_body(&mut self, dict: Dictionary, dict_offset: usize) -> Result<Object> {
        let input = self.lexer.input();
        let base = self.lexer.base();
        let keyword_end = self.lexer.position();
        let rest = &input[keyword_end..];
        let start = if rest.starts_with(b"\r\n") {
            keyword_end + 2
        } else if rest.starts_with(b"\n") {
            keyword_end + 1
        } else {
            self.notes.push(ParseNote::StreamKeywordEol {
                offset: base + keyword_end,
            });
            if rest.starts_with(b"\r") {
                keyword_end + 1
            } else {
                keyword_end
            }
        };

        let declared = self.declared_length(&dict);
        if let Some(len) = declared.and_then(|l| usize::try_from(l).ok()) {
            match start.checked_add(len) {
                Some(end) if end <= input.len() => {
                    if let Some(after) = endstream_at(input, end) {
                        self.lexer.set_position(after);
                        return Ok(Object::Stream {
                            dict,
                            data: bytes::Bytes::copy_from_slice(&input[start..end]),
                        });
                    }
                },
                _ if !self.complete => return Err(Error::UnexpectedEof),
                _ => {},
            }
        }

        let found = input[start..]
            .windows(ENDSTREAM.len())
            .position(|w| w == ENDSTREAM);
        let rel = match found {
            Some(rel) => rel,
            None if !self.complete => return Err(Error::UnexpectedEof),
            None => {
                return Err(Error::MalformedStructure {
                    offset: dict_offset,
                    reason: "stream without endstream".to_string(),
                });
            },
        };

        let mut end = start + rel;
        if end > start && input[end - 1] == b'\n' {
            end -= 1;
        }
        if end > start && input[end - 1] == b'\r' {
            end -= 1;
        }
        log::warn!(
            "stream at byte {}: /Length {:?} but endstream after {} bytes",
            dict_offset,
            declared,
            end - start
        );
        self.notes.push(ParseNote::StreamLength {
            offset: dict_offset,
            declared,
            actual: end - start,
        });
        self.lexer.set_position(start + rel + ENDSTREAM.len());
        Ok(Object::Stream {
            dict,
            data: bytes::Bytes::copy_from_slice(&input[start..end]),
        })
    }
}

/// If `endstream` follows `pos` after optional whitespace, the position just
/// past it.
fn endstream_at(input: &[u8], pos: usize) -> Option<usize> {
    let mut i = pos;
    while i < input.len() && crate::lexer::is_whitespace(input[i]) {
        i += 1;
    }
    input[i..]
        .starts_with(ENDSTREAM)
        .then_some(i + ENDSTREAM.len())
}

/// Parse a single direct object from `input`.
pub fn parse_object(input: &[u8]) -> Result<Object> {
    Parser::new(input).parse_object()
}
