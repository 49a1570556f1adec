//! PDF lexer (tokenizer).
//!
//! Turns raw bytes into [`Token`]s: numbers, names, literal and hex strings,
//! the structural delimiters, bare keywords and `%` comments. Every token
//! carries the absolute byte offset it started at.
//!
//! The lexer never gives up on a byte stream. A malformed token (an
//! unterminated literal string, a stray `)`, a hex string with non-hex
//! content, `1.2.3`) is recorded as a [`Error::LexicalError`] and the lexer
//! resynchronizes at the next delimiter. Callers drain those errors with
//! [`Lexer::take_errors`] and turn them into diagnostics.
//!
//! # PDF Syntax Overview
//!
//! - Numbers: integers (42, -123) and reals (3.14, -.5, 4.); no exponents
//! - Strings: literal `(Hello)` with nested parentheses and escapes, hex `<48656C6C6F>`
//! - Names: `/Type`, with `#xx` escapes
//! - Delimiters: `[ ] << >> { }`
//! - Keywords: `true false null obj endobj stream endstream R xref trailer startxref`
//! - Comments: `%` to end of line

use crate::error::Error;
use nom::{
    branch::alt,
    bytes::complete::{take_till, take_while},
    character::complete::{char, digit0, digit1, one_of},
    combinator::{opt, recognize},
    sequence::{delimited, pair, preceded},
    IResult,
};

/// PDF whitespace: NUL, TAB, LF, FF, CR, SPACE.
pub fn is_whitespace(c: u8) -> bool {
    matches!(c, 0x00 | 0x09 | 0x0A | 0x0C | 0x0D | 0x20)
}

/// The eight structural delimiter characters `( ) < > [ ] { } / %`.
pub fn is_delimiter(c: u8) -> bool {
    matches!(c, b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%')
}

/// Anything that is neither whitespace nor a delimiter.
pub fn is_regular(c: u8) -> bool {
    !is_whitespace(c) && !is_delimiter(c)
}

/// Structural delimiters that form a token by themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    /// `[`
    ArrayOpen,
    /// `]`
    ArrayClose,
    /// `<<`
    DictOpen,
    /// `>>`
    DictClose,
    /// `{`
    BraceOpen,
    /// `}`
    BraceClose,
}

/// Bare words.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Keyword {
    /// `true`
    True,
    /// `false`
    False,
    /// `null`
    Null,
    /// `obj`
    Obj,
    /// `endobj`
    EndObj,
    /// `stream`
    Stream,
    /// `endstream`
    EndStream,
    /// `R`
    R,
    /// `xref`
    Xref,
    /// `trailer`
    Trailer,
    /// `startxref`
    StartXref,
    /// Any other run of regular characters
    Other(String),
}

impl Keyword {
    fn from_bytes(word: &[u8]) -> Self {
        match word {
            b"true" => Keyword::True,
            b"false" => Keyword::False,
            b"null" => Keyword::Null,
            b"obj" => Keyword::Obj,
            b"endobj" => Keyword::EndObj,
            b"stream" => Keyword::Stream,
            b"endstream" => Keyword::EndStream,
            b"R" => Keyword::R,
            b"xref" => Keyword::Xref,
            b"trailer" => Keyword::Trailer,
            b"startxref" => Keyword::StartXref,
            other => Keyword::Other(String::from_utf8_lossy(other).into_owned()),
        }
    }
}

/// Token types recognized by the PDF lexer.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Integer number (e.g., 42, -123)
    Integer(i64),
    /// Real number (e.g., 3.14, -.5)
    Real(f64),
    /// Name with `#xx` escapes decoded (e.g., "Type" from "/Type")
    Name(String),
    /// Literal string with escapes decoded
    LiteralString(Vec<u8>),
    /// Hex string decoded to bytes
    HexString(Vec<u8>),
    /// Structural delimiter
    Delimiter(Delimiter),
    /// Bare keyword
    Keyword(Keyword),
    /// Comment text after `%`, without the line ending
    Comment(Vec<u8>),
    /// End of input (or of the requested range)
    Eof,
}

/// A token and the absolute byte offset it starts at.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// What was recognized
    pub kind: TokenKind,
    /// Absolute offset of the first byte
    pub offset: usize,
}

impl Token {
    /// Is this the end-of-input token?
    pub fn is_eof(&self) -> bool {
        matches!(self.kind, TokenKind::Eof)
    }

    /// Is this the given keyword?
    pub fn is_keyword(&self, keyword: &Keyword) -> bool {
        matches!(&self.kind, TokenKind::Keyword(k) if k == keyword)
    }
}

/// Cursor over a byte buffer producing [`Token`]s.
#[derive(Debug)]
pub struct Lexer<'a> {
    input: &'a [u8],
    pos: usize,
    base: usize,
    errors: Vec<Error>,
}

impl<'a> Lexer<'a> {
    /// Lex `input`, reporting offsets relative to its start.
    pub fn new(input: &'a [u8]) -> Self {
        Self::with_base(input, 0)
    }

    /// Lex `input`, which was read from absolute file offset `base`.
    pub fn with_base(input: &'a [u8], base: usize) -> Self {
        Self {
            input,
            pos: 0,
            base,
            errors: Vec::new(),
        }
    }

    /// Absolute offset of the next unread byte.
    pub fn offset(&self) -> usize {
        self.base + self.pos
    }

    /// Position within the buffer.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Move to a position within the buffer (clamped to its length).
    pub fn set_position(&mut self, pos: usize) {
        self.pos = pos.min(self.input.len());
    }

    /// The whole buffer.
    pub fn input(&self) -> &'a [u8] {
        self.input
    }

    /// Absolute offset of the first buffer byte.
    pub fn base(&self) -> usize {
        self.base
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> &'a [u8] {
        &self.input[self.pos..]
    }

    /// Lexical errors recorded since the last call.
    pub fn take_errors(&mut self) -> Vec<Error> {
        std::mem::take(&mut self.errors)
    }

    /// Next token anywhere in the buffer.
    pub fn next(&mut self) -> Token {
        self.next_token(usize::MAX)
    }

    /// Next token that starts before the absolute offset `limit`.
    ///
    /// Returns [`TokenKind::Eof`] once the buffer or the limit is reached.
    /// Malformed input is recorded and skipped, never returned.
    pub fn next_token(&mut self, limit: usize) -> Token {
        let end = limit.saturating_sub(self.base).min(self.input.len());
        loop {
            while self.pos < end && is_whitespace(self.input[self.pos]) {
                self.pos += 1;
            }
            if self.pos >= end {
                return Token {
                    kind: TokenKind::Eof,
                    offset: self.base + self.pos.min(end),
                };
            }

            let start = self.pos;
            match lex_one(&self.input[start..end]) {
                Ok((consumed, kind)) => {
                    self.pos = start + consumed;
                    return Token {
                        kind,
                        offset: self.base + start,
                    };
                },
                Err(reason) => {
                    log::debug!("lexical error at byte {}: {}", self.base + start, reason);
                    self.errors.push(Error::LexicalError {
                        offset: self.base + start,
                        reason,
                    });
                    self.pos = if self.input[start] == b'<' {
                        skip_past_hex_end(self.input, start + 1, end)
                    } else {
                        resync(self.input, start + 1, end)
                    };
                },
            }
        }
    }

    /// Look at the next token without consuming it.
    ///
    /// Lexical errors met while peeking are dropped; they are recorded again
    /// when the token is really consumed.
    pub fn peek(&mut self) -> Token {
        let saved = self.checkpoint();
        let token = self.next();
        self.rewind(saved);
        token
    }

    /// Remember the current position for a later [`Lexer::rewind`].
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            pos: self.pos,
            errors: self.errors.len(),
        }
    }

    /// Go back to a checkpoint, forgetting errors recorded since.
    pub fn rewind(&mut self, checkpoint: Checkpoint) {
        self.pos = checkpoint.pos;
        self.errors.truncate(checkpoint.errors);
    }
}

/// Saved lexer state for backtracking (see [`Lexer::checkpoint`]).
#[derive(Debug, Clone, Copy)]
pub struct Checkpoint {
    pos: usize,
    errors: usize,
}

/// First index at or after `from` holding a delimiter, or `end`.
fn resync(input: &[u8], from: usize, end: usize) -> usize {
    (from..end).find(|&i| is_delimiter(input[i])).unwrap_or(end)
}

/// A broken hex string is skipped through its closing `>` when there is one
/// before the next other delimiter.
fn skip_past_hex_end(input: &[u8], from: usize, end: usize) -> usize {
    let next = resync(input, from, end);
    if next < end && input[next] == b'>' {
        next + 1
    } else {
        next
    }
}

/// Recognize exactly one token at the start of `input` (non-empty, no
/// leading whitespace). Returns bytes consumed and the token.
fn lex_one(input: &[u8]) -> Result<(usize, TokenKind), String> {
    let consumed = |rest: &[u8]| input.len() - rest.len();
    match input[0] {
        b'%' => comment(input)
            .map(|(rest, text)| (consumed(rest), TokenKind::Comment(text.to_vec())))
            .map_err(|_| "malformed comment".to_string()),
        b'(' => literal_string(input)
            .map(|(rest, raw)| {
                (
                    consumed(rest),
                    TokenKind::LiteralString(decode_literal_string_escapes(raw)),
                )
            })
            .map_err(|_| "unterminated literal string".to_string()),
        b'<' if input.get(1) == Some(&b'<') => Ok((2, TokenKind::Delimiter(Delimiter::DictOpen))),
        b'<' => hex_string(input)
            .map(|(rest, digits)| (consumed(rest), TokenKind::HexString(decode_hex(digits))))
            .map_err(|_| "malformed hex string".to_string()),
        b'>' if input.get(1) == Some(&b'>') => Ok((2, TokenKind::Delimiter(Delimiter::DictClose))),
        b'>' => Err("unexpected '>'".to_string()),
        b')' => Err("unbalanced ')'".to_string()),
        b'[' => Ok((1, TokenKind::Delimiter(Delimiter::ArrayOpen))),
        b']' => Ok((1, TokenKind::Delimiter(Delimiter::ArrayClose))),
        b'{' => Ok((1, TokenKind::Delimiter(Delimiter::BraceOpen))),
        b'}' => Ok((1, TokenKind::Delimiter(Delimiter::BraceClose))),
        b'/' => name(input)
            .map(|(rest, raw)| (consumed(rest), TokenKind::Name(decode_name(raw))))
            .map_err(|_| "malformed name".to_string()),
        _ => {
            let len = input.iter().position(|&c| !is_regular(c)).unwrap_or(input.len());
            let word = &input[..len];
            if matches!(word[0], b'+' | b'-' | b'.' | b'0'..=b'9') {
                match number(word) {
                    Ok((rest, kind)) if rest.is_empty() => Ok((len, kind)),
                    _ => Err(format!("malformed number '{}'", String::from_utf8_lossy(word))),
                }
            } else {
                Ok((len, TokenKind::Keyword(Keyword::from_bytes(word))))
            }
        },
    }
}

/// `%` comment up to (not including) the end of line.
fn comment(input: &[u8]) -> IResult<&[u8], &[u8]> {
    preceded(char('%'), take_till(|c| c == b'\r' || c == b'\n'))(input)
}

/// Integer or real without exponent: `+17`, `-.002`, `4.`, `0.5`.
fn number(input: &[u8]) -> IResult<&[u8], TokenKind> {
    let (rest, text) = recognize(pair(
        opt(one_of("+-")),
        alt((
            recognize(pair(digit1, opt(pair(char('.'), digit0)))),
            recognize(pair(char('.'), digit1)),
        )),
    ))(input)?;

    // Only ASCII sign/digit/dot bytes reach here.
    let text = String::from_utf8_lossy(text);
    let kind = if text.contains('.') {
        TokenKind::Real(parse_real(&text))
    } else {
        match text.parse::<i64>() {
            Ok(i) => TokenKind::Integer(i),
            // Out of i64 range: keep the magnitude as a real.
            Err(_) => TokenKind::Real(parse_real(&text)),
        }
    };
    Ok((rest, kind))
}

fn parse_real(text: &str) -> f64 {
    let (sign, body) = match text.as_bytes().first() {
        Some(b'-') => (-1.0, &text[1..]),
        Some(b'+') => (1.0, &text[1..]),
        _ => (1.0, text),
    };
    let normalized = match (body.starts_with('.'), body.ends_with('.')) {
        (true, _) => format!("0{}", body),
        (_, true) => format!("{}0", body),
        _ => body.to_string(),
    };
    sign * normalized.parse::<f64>().unwrap_or(0.0)
}

/// Literal string with balanced parentheses; returns the raw body.
fn literal_string(input: &[u8]) -> IResult<&[u8], &[u8]> {
    let (body, _) = char('(')(input)?;
    let mut depth = 1usize;
    let mut i = 0;
    while i < body.len() {
        match body[i] {
            b'\\' => i += 2,
            b'(' => {
                depth += 1;
                i += 1;
            },
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Ok((&body[i + 1..], &body[..i]));
                }
                i += 1;
            },
            _ => i += 1,
        }
    }
    Err(nom::Err::Error(nom::error::Error::new(
        input,
        nom::error::ErrorKind::Char,
    )))
}

/// `<` hex digits and whitespace `>`; returns the body.
fn hex_string(input: &[u8]) -> IResult<&[u8], &[u8]> {
    delimited(
        char('<'),
        take_while(|c: u8| c.is_ascii_hexdigit() || is_whitespace(c)),
        char('>'),
    )(input)
}

/// `/` followed by regular characters; returns the raw name bytes.
fn name(input: &[u8]) -> IResult<&[u8], &[u8]> {
    preceded(char('/'), take_while(is_regular))(input)
}

/// Decode a literal string body: escapes, octal, line continuations and
/// end-of-line normalization to LF.
pub fn decode_literal_string_escapes(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        match raw[i] {
            b'\\' if i + 1 < raw.len() => {
                let c = raw[i + 1];
                i += 2;
                match c {
                    b'n' => out.push(b'\n'),
                    b'r' => out.push(b'\r'),
                    b't' => out.push(b'\t'),
                    b'b' => out.push(0x08),
                    b'f' => out.push(0x0C),
                    b'\n' => {},
                    b'\r' => {
                        if raw.get(i) == Some(&b'\n') {
                            i += 1;
                        }
                    },
                    b'0'..=b'7' => {
                        let mut value = u32::from(c - b'0');
                        for _ in 0..2 {
                            match raw.get(i) {
                                Some(&d @ b'0'..=b'7') => {
                                    value = value * 8 + u32::from(d - b'0');
                                    i += 1;
                                },
                                _ => break,
                            }
                        }
                        out.push((value & 0xFF) as u8);
                    },
                    // \( \) \\ and unknown escapes keep the character
                    other => out.push(other),
                }
            },
            // A lone trailing backslash is dropped.
            b'\\' => i += 1,
            b'\r' => {
                out.push(b'\n');
                i += 1;
                if raw.get(i) == Some(&b'\n') {
                    i += 1;
                }
            },
            c => {
                out.push(c);
                i += 1;
            },
        }
    }
    out
}

/// Decode hex digits (whitespace ignored, odd count padded with `0`).
pub fn decode_hex(digits: &[u8]) -> Vec<u8> {
    let nibbles: Vec<u8> = digits
        .iter()
        .filter_map(|&c| (c as char).to_digit(16).map(|d| d as u8))
        .collect();
    nibbles
        .chunks(2)
        .map(|pair| (pair[0] << 4) | pair.get(1).copied().unwrap_or(0))
        .collect()
}

/// Decode `#xx` escapes in a name. Invalid escapes are kept literally.
///
/// Names that are not UTF-8 after decoding map each byte to the char of
/// the same value; the original bytes are not kept.
fn decode_name(raw: &[u8]) -> String {
    let mut bytes = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'#' && i + 2 < raw.len() {
            let hi = (raw[i + 1] as char).to_digit(16);
            let lo = (raw[i + 2] as char).to_digit(16);
            if let (Some(hi), Some(lo)) = (hi, lo) {
                bytes.push((hi * 16 + lo) as u8);
                i += 3;
                continue;
            }
        }
        bytes.push(raw[i]);
        i += 1;
    }
    match String::from_utf8(bytes) {
        Ok(s) => s,
        // Names are byte strings; keep non-UTF-8 ones readable as Latin-1.
        Err(e) => e.into_bytes().iter().map(|&b| b as char).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &[u8]) -> Vec<TokenKind> {
        let mut lexer = Lexer::new(input);
        let mut out = Vec::new();
        loop {
            let token = lexer.next();
            if token.is_eof() {
                break;
            }
            out.push(token.kind);
        }
        out
    }

    // ========================================================================
    // Numbers
    // ========================================================================

    #[test]
    fn test_integers_and_reals() {
        assert_eq!(
            kinds(b"42 -17 +3 3.14 -.5 4. 0.0"),
            vec![
                TokenKind::Integer(42),
                TokenKind::Integer(-17),
                TokenKind::Integer(3),
                TokenKind::Real(3.14),
                TokenKind::Real(-0.5),
                TokenKind::Real(4.0),
                TokenKind::Real(0.0),
            ]
        );
    }

    #[test]
    fn test_huge_integer_becomes_real() {
        assert_eq!(kinds(b"99999999999999999999"), vec![TokenKind::Real(1e20)]);
    }

    #[test]
    fn test_malformed_number_is_recovered() {
        let mut lexer = Lexer::new(b"1.2.3 /Next");
        assert_eq!(lexer.next().kind, TokenKind::Name("Next".to_string()));
        let errors = lexer.take_errors();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], Error::LexicalError { offset: 0, .. }));
    }

    #[test]
    fn test_exponent_is_not_a_number() {
        let mut lexer = Lexer::new(b"1e5");
        assert!(lexer.next().is_eof());
        assert_eq!(lexer.take_errors().len(), 1);
    }

    // ========================================================================
    // Strings
    // ========================================================================

    #[test]
    fn test_literal_string_nested_and_escaped() {
        assert_eq!(
            kinds(b"(a (nested) \\(x\\) \\101\\7 end)"),
            vec![TokenKind::LiteralString(b"a (nested) (x) A\x07 end".to_vec())]
        );
    }

    #[test]
    fn test_literal_string_line_continuation_and_eol() {
        assert_eq!(
            kinds(b"(one\\\ntwo\r\nthree)"),
            vec![TokenKind::LiteralString(b"onetwo\nthree".to_vec())]
        );
    }

    #[test]
    fn test_unterminated_literal_string_recovers() {
        let mut lexer = Lexer::new(b"(never closed /Name");
        let token = lexer.next();
        assert_eq!(token.kind, TokenKind::Name("Name".to_string()));
        assert_eq!(token.offset, 14);
        assert!(lexer.next().is_eof());
        let errors = lexer.take_errors();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("unterminated literal string"));
    }

    #[test]
    fn test_hex_string_with_whitespace_and_odd_digits() {
        assert_eq!(
            kinds(b"<48 65 6C\n6C 6F> <901>"),
            vec![
                TokenKind::HexString(b"Hello".to_vec()),
                TokenKind::HexString(vec![0x90, 0x10]),
            ]
        );
    }

    #[test]
    fn test_bad_hex_string() {
        let mut lexer = Lexer::new(b"<12XY> 7");
        assert_eq!(lexer.next().kind, TokenKind::Integer(7));
        assert_eq!(lexer.take_errors().len(), 1);
    }

    // ========================================================================
    // Names, delimiters, keywords, comments
    // ========================================================================

    #[test]
    fn test_names_with_escapes() {
        assert_eq!(
            kinds(b"/Type /A#20B /A#2 /"),
            vec![
                TokenKind::Name("Type".to_string()),
                TokenKind::Name("A B".to_string()),
                TokenKind::Name("A#2".to_string()),
                TokenKind::Name(String::new()),
            ]
        );
    }

    #[test]
    fn test_non_utf8_name_decodes_as_latin1() {
        assert_eq!(
            kinds(b"/caf#C3#A9 /A#FF"),
            vec![
                TokenKind::Name("caf\u{E9}".to_string()),
                TokenKind::Name("A\u{FF}".to_string()),
            ]
        );
    }

    #[test]
    fn test_delimiters() {
        use Delimiter::*;
        assert_eq!(
            kinds(b"[<<>>]{}"),
            vec![
                TokenKind::Delimiter(ArrayOpen),
                TokenKind::Delimiter(DictOpen),
                TokenKind::Delimiter(DictClose),
                TokenKind::Delimiter(ArrayClose),
                TokenKind::Delimiter(BraceOpen),
                TokenKind::Delimiter(BraceClose),
            ]
        );
    }

    #[test]
    fn test_keywords() {
        assert_eq!(
            kinds(b"true false null obj endobj stream endstream R xref trailer startxref Tj"),
            vec![
                TokenKind::Keyword(Keyword::True),
                TokenKind::Keyword(Keyword::False),
                TokenKind::Keyword(Keyword::Null),
                TokenKind::Keyword(Keyword::Obj),
                TokenKind::Keyword(Keyword::EndObj),
                TokenKind::Keyword(Keyword::Stream),
                TokenKind::Keyword(Keyword::EndStream),
                TokenKind::Keyword(Keyword::R),
                TokenKind::Keyword(Keyword::Xref),
                TokenKind::Keyword(Keyword::Trailer),
                TokenKind::Keyword(Keyword::StartXref),
                TokenKind::Keyword(Keyword::Other("Tj".to_string())),
            ]
        );
    }

    #[test]
    fn test_comment_token() {
        assert_eq!(
            kinds(b"%PDF-1.7\r\n1"),
            vec![TokenKind::Comment(b"PDF-1.7".to_vec()), TokenKind::Integer(1)]
        );
    }

    #[test]
    fn test_keyword_glued_to_delimiter() {
        assert_eq!(
            kinds(b"1 0 R>>"),
            vec![
                TokenKind::Integer(1),
                TokenKind::Integer(0),
                TokenKind::Keyword(Keyword::R),
                TokenKind::Delimiter(Delimiter::DictClose),
            ]
        );
    }

    // ========================================================================
    // Offsets and limits
    // ========================================================================

    #[test]
    fn test_offsets_are_absolute() {
        let mut lexer = Lexer::with_base(b"  /Key 12", 100);
        assert_eq!(lexer.next().offset, 102);
        assert_eq!(lexer.next().offset, 107);
        assert_eq!(lexer.next().offset, 109);
    }

    #[test]
    fn test_limit_offset_stops_lexing() {
        let mut lexer = Lexer::new(b"1 2 3");
        assert_eq!(lexer.next_token(3).kind, TokenKind::Integer(1));
        assert_eq!(lexer.next_token(3).kind, TokenKind::Integer(2));
        assert!(lexer.next_token(3).is_eof());
        assert_eq!(lexer.next().kind, TokenKind::Integer(3));
    }

    #[test]
    fn test_peek_does_not_consume() {
        let mut lexer = Lexer::new(b"/A /B");
        assert_eq!(lexer.peek().kind, TokenKind::Name("A".to_string()));
        assert_eq!(lexer.next().kind, TokenKind::Name("A".to_string()));
        assert_eq!(lexer.next().kind, TokenKind::Name("B".to_string()));
    }

    #[test]
    fn test_stray_close_paren_and_angle() {
        let mut lexer = Lexer::new(b") > /Ok");
        assert_eq!(lexer.next().kind, TokenKind::Name("Ok".to_string()));
        assert_eq!(lexer.take_errors().len(), 2);
    }
}
