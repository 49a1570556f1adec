//! Object stream unpacking (PDF 1.5+).
//!
//! An object stream (`/Type /ObjStm`) packs several objects into one
//! compressed stream:
//!
//! ```text
//! 12 0 obj
//! << /Type /ObjStm /N 3 /First 18 /Filter /FlateDecode /Length ... >>
//! stream
//! 10 0 11 15 12 28        % N pairs: object number, offset relative to /First
//! << /Type /Page >>       % object 10
//! [1 2 3]                 % object 11
//! ...
//! endstream
//! ```
//!
//! A header that cannot be read fails the whole stream. A single packed
//! object that cannot be parsed only loses that object.

use crate::error::{Error, Result};
use crate::lexer::{Lexer, TokenKind};
use crate::object::Object;
use crate::parser::Parser;
use crate::parser_config::ValidationOptions;

/// Upper bound on `/N`.
const MAX_OBJECTS: i64 = 1_000_000;

/// One packed object, or why it could not be read.
#[derive(Debug, Clone, PartialEq)]
pub struct PackedObject {
    /// Object number from the header pairs
    pub id: u32,
    /// Offset of its data relative to `/First`
    pub offset: usize,
    /// The object, or a description of the failure
    pub object: std::result::Result<Object, String>,
}

/// Decoded object stream.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectStream {
    /// Objects in header order
    pub objects: Vec<PackedObject>,
}

impl ObjectStream {
    /// The object at position `index` in the header, if it claims number `id`.
    pub fn get(&self, id: u32, index: u32) -> Option<&PackedObject> {
        self.objects
            .get(index as usize)
            .filter(|packed| packed.id == id)
            .or_else(|| self.objects.iter().find(|packed| packed.id == id))
    }
}

/// Decode and unpack an object stream.
pub fn parse_object_stream(stream: &Object, options: &ValidationOptions) -> Result<ObjectStream> {
    let dict = match stream {
        Object::Stream { dict, .. } => dict,
        other => {
            return Err(Error::InvalidObjectType {
                expected: "Stream".to_string(),
                found: other.type_name().to_string(),
            });
        },
    };

    match stream.dict_type() {
        Some("ObjStm") => {},
        other => {
            return Err(Error::MalformedStructure {
                offset: 0,
                reason: format!("object stream has /Type {:?}, expected /ObjStm", other),
            });
        },
    }

    let n = dict
        .get("N")
        .and_then(Object::as_integer)
        .filter(|n| (0..=MAX_OBJECTS).contains(n))
        .ok_or_else(|| Error::MalformedStructure {
            offset: 0,
            reason: "object stream /N missing or out of range".to_string(),
        })? as usize;
    let first = dict
        .get("First")
        .and_then(Object::as_integer)
        .filter(|&f| f >= 0)
        .ok_or_else(|| Error::MalformedStructure {
            offset: 0,
            reason: "object stream /First missing or negative".to_string(),
        })? as usize;

    let data = stream.decode_stream_data(options)?;
    if data.len() < first {
        return Err(Error::MalformedStructure {
            offset: 0,
            reason: format!(
                "object stream holds {} bytes, /First is {}",
                data.len(),
                first
            ),
        });
    }

    let pairs = parse_pairs(&data[..first], n)?;
    let body = &data[first..];
    let objects = pairs
        .into_iter()
        .map(|(id, offset)| {
            let object = if offset >= body.len() {
                log::warn!("packed object {} offset {} past end of stream", id, offset);
                Err(format!(
                    "offset {} is beyond the {} bytes of object data",
                    offset,
                    body.len()
                ))
            } else {
                Parser::new(&body[offset..])
                    .with_limits(options)
                    .parse_object()
                    .map_err(|e| e.to_string())
            };
            PackedObject { id, offset, object }
        })
        .collect();

    Ok(ObjectStream { objects })
}

/// Read `count` pairs of (object number, offset).
fn parse_pairs(header: &[u8], count: usize) -> Result<Vec<(u32, usize)>> {
    let mut lexer = Lexer::new(header);
    let mut pairs = Vec::with_capacity(count.min(4096));
    for i in 0..count {
        let id = lexer.next();
        let offset = lexer.next();
        match (id.kind, offset.kind) {
            (TokenKind::Integer(id), TokenKind::Integer(off))
                if (0..=u32::MAX as i64).contains(&id) && off >= 0 =>
            {
                pairs.push((id as u32, off as usize));
            },
            _ => {
                return Err(Error::MalformedStructure {
                    offset: id.offset,
                    reason: format!("object stream header pair {} of {} unreadable", i + 1, count),
                });
            },
        }
    }
    Ok(pairs)
}
