//! PDF object model.
//!
//! Every value the parser produces is an [`Object`]. Shape checks go through
//! the `as_*` accessors, which return `None` on a mismatch, so malformed
//! structure is an ordinary match arm at the call site.

use crate::decoders::{self, DecodeParams};
use crate::error::{Error, Result};
use crate::parser_config::ValidationOptions;
use indexmap::IndexMap;

/// Dictionary body: insertion-ordered, unique keys, last write wins.
pub type Dictionary = IndexMap<String, Object>;

/// PDF object representation.
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    /// Null object
    Null,
    /// Boolean value
    Boolean(bool),
    /// Integer value
    Integer(i64),
    /// Real (floating-point) value
    Real(f64),
    /// String (byte array)
    String(Vec<u8>),
    /// Name (starting with /)
    ///
    /// Decoded name bytes that are not UTF-8 are held as Latin-1 chars, so
    /// such names are written back UTF-8 encoded rather than byte for byte.
    Name(String),
    /// Array of objects
    Array(Vec<Object>),
    /// Dictionary (key-value pairs)
    Dictionary(Dictionary),
    /// Stream (dictionary + raw, still-encoded data)
    Stream {
        /// Stream dictionary
        dict: Dictionary,
        /// Bytes between `stream` and `endstream`
        data: bytes::Bytes,
    },
    /// Indirect object reference
    Reference(ObjectRef),
}

/// Reference to an indirect object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectRef {
    /// Object number
    pub id: u32,
    /// Generation number
    pub gen: u16,
}

impl ObjectRef {
    /// Create a new object reference.
    pub fn new(id: u32, gen: u16) -> Self {
        Self { id, gen }
    }
}

impl std::fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} R", self.id, self.gen)
    }
}

/// An `N G obj ... endobj` definition found while scanning the file.
#[derive(Debug, Clone, PartialEq)]
pub struct IndirectObject {
    /// Object and generation numbers from the `obj` header
    pub obj_ref: ObjectRef,
    /// The wrapped object
    pub object: Object,
    /// Byte offset of the object number
    pub offset: usize,
}

impl Object {
    /// Get the type name of this object (without data).
    pub fn type_name(&self) -> &'static str {
        match self {
            Object::Null => "Null",
            Object::Boolean(_) => "Boolean",
            Object::Integer(_) => "Integer",
            Object::Real(_) => "Real",
            Object::String(_) => "String",
            Object::Name(_) => "Name",
            Object::Array(_) => "Array",
            Object::Dictionary(_) => "Dictionary",
            Object::Stream { .. } => "Stream",
            Object::Reference(_) => "Reference",
        }
    }

    /// Try to cast to integer.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Object::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Integer or real as `f64`.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Object::Integer(i) => Some(*i as f64),
            Object::Real(r) => Some(*r),
            _ => None,
        }
    }

    /// Try to cast to name.
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Object::Name(s) => Some(s),
            _ => None,
        }
    }

    /// Try to cast to dictionary. Works for both Dictionary and Stream objects.
    pub fn as_dict(&self) -> Option<&Dictionary> {
        match self {
            Object::Dictionary(d) => Some(d),
            Object::Stream { dict, .. } => Some(dict),
            _ => None,
        }
    }

    /// Try to cast to array.
    pub fn as_array(&self) -> Option<&Vec<Object>> {
        match self {
            Object::Array(arr) => Some(arr),
            _ => None,
        }
    }

    /// Try to cast to reference.
    pub fn as_reference(&self) -> Option<ObjectRef> {
        match self {
            Object::Reference(r) => Some(*r),
            _ => None,
        }
    }

    /// Try to cast to boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Object::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to cast to real number.
    pub fn as_real(&self) -> Option<f64> {
        match self {
            Object::Real(r) => Some(*r),
            _ => None,
        }
    }

    /// Try to cast to string (bytes).
    pub fn as_string(&self) -> Option<&[u8]> {
        match self {
            Object::String(s) => Some(s),
            _ => None,
        }
    }

    /// Check if object is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Object::Null)
    }

    /// Check if object is a stream.
    pub fn is_stream(&self) -> bool {
        matches!(self, Object::Stream { .. })
    }

    /// Look up `key` in a dictionary or stream dictionary.
    pub fn get(&self, key: &str) -> Option<&Object> {
        self.as_dict().and_then(|d| d.get(key))
    }

    /// `/Type` of a dictionary or stream, if it is a name.
    pub fn dict_type(&self) -> Option<&str> {
        self.get("Type").and_then(Object::as_name)
    }

    /// Decode stream data using the filters named in the stream dictionary.
    ///
    /// Decompression limits come from `options`.
    pub fn decode_stream_data(&self, options: &ValidationOptions) -> Result<Vec<u8>> {
        match self {
            Object::Stream { dict, data } => {
                let filters = dict
                    .get("Filter")
                    .map(extract_filter_names)
                    .unwrap_or_default();
                if filters.is_empty() {
                    return Ok(data.to_vec());
                }
                let params = extract_decode_params(dict.get("DecodeParms"));
                decoders::decode_stream_with_options(data, &filters, params.as_ref(), options)
            },
            _ => Err(Error::InvalidObjectType {
                expected: "Stream".to_string(),
                found: self.type_name().to_string(),
            }),
        }
    }

    /// Serialize this object in PDF syntax.
    ///
    /// Streams are written with a `/Length` equal to their data length.
    pub fn to_pdf_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.write_to(&mut out);
        out
    }

    /// Append this object in PDF syntax to `out`.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        match self {
            Object::Null => out.extend_from_slice(b"null"),
            Object::Boolean(true) => out.extend_from_slice(b"true"),
            Object::Boolean(false) => out.extend_from_slice(b"false"),
            Object::Integer(i) => out.extend_from_slice(i.to_string().as_bytes()),
            Object::Real(r) => write_real(*r, out),
            Object::String(s) => write_literal_string(s, out),
            Object::Name(n) => write_name(n, out),
            Object::Array(items) => {
                out.push(b'[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(b' ');
                    }
                    item.write_to(out);
                }
                out.push(b']');
            },
            Object::Dictionary(dict) => write_dictionary(dict, out),
            Object::Stream { dict, data } => {
                let mut dict = dict.clone();
                dict.insert("Length".to_string(), Object::Integer(data.len() as i64));
                write_dictionary(&dict, out);
                out.extend_from_slice(b"\nstream\n");
                out.extend_from_slice(data);
                out.extend_from_slice(b"\nendstream");
            },
            Object::Reference(r) => out.extend_from_slice(r.to_string().as_bytes()),
        }
    }
}

impl IndirectObject {
    /// Serialize as `N G obj ... endobj`.
    pub fn to_pdf_bytes(&self) -> Vec<u8> {
        let mut out = format!("{} {} obj\n", self.obj_ref.id, self.obj_ref.gen).into_bytes();
        self.object.write_to(&mut out);
        out.extend_from_slice(b"\nendobj\n");
        out
    }
}

fn write_dictionary(dict: &Dictionary, out: &mut Vec<u8>) {
    out.extend_from_slice(b"<<");
    for (key, value) in dict {
        write_name(key, out);
        out.push(b' ');
        value.write_to(out);
        out.push(b' ');
    }
    out.extend_from_slice(b">>");
}

fn write_real(value: f64, out: &mut Vec<u8>) {
    if !value.is_finite() {
        out.extend_from_slice(b"0.0");
        return;
    }
    let text = value.to_string();
    out.extend_from_slice(text.as_bytes());
    if !text.contains('.') {
        out.extend_from_slice(b".0");
    }
}

fn write_literal_string(bytes: &[u8], out: &mut Vec<u8>) {
    out.push(b'(');
    for &b in bytes {
        match b {
            b'(' | b')' | b'\\' => {
                out.push(b'\\');
                out.push(b);
            },
            0x20..=0x7E => out.push(b),
            _ => out.extend_from_slice(format!("\\{:03o}", b).as_bytes()),
        }
    }
    out.push(b')');
}

fn write_name(name: &str, out: &mut Vec<u8>) {
    out.push(b'/');
    for &b in name.as_bytes() {
        let regular = (0x21..=0x7E).contains(&b)
            && !matches!(
                b,
                b'#' | b'/' | b'%' | b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}'
            );
        if regular {
            out.push(b);
        } else {
            out.extend_from_slice(format!("#{:02X}", b).as_bytes());
        }
    }
}

/// Filter names from a `/Filter` entry (single name or array of names).
pub(crate) fn extract_filter_names(filter_obj: &Object) -> Vec<String> {
    match filter_obj {
        Object::Name(name) => vec![name.clone()],
        Object::Array(arr) => arr
            .iter()
            .filter_map(|obj| obj.as_name().map(|s| s.to_string()))
            .collect(),
        _ => vec![],
    }
}

/// Predictor parameters from a `/DecodeParms` entry.
///
/// For an array of parameter dictionaries the first dictionary is used.
pub(crate) fn extract_decode_params(params_obj: Option<&Object>) -> Option<DecodeParams> {
    let dict = match params_obj? {
        Object::Dictionary(d) => d,
        Object::Array(arr) => arr.iter().find_map(|obj| obj.as_dict())?,
        _ => return None,
    };

    let int = |key: &str, default: i64| {
        dict.get(key)
            .and_then(Object::as_integer)
            .unwrap_or(default)
    };

    Some(DecodeParams {
        predictor: int("Predictor", 1),
        columns: int("Columns", 1).max(1) as usize,
        colors: int("Colors", 1).max(1) as usize,
        bits_per_component: int("BitsPerComponent", 8).max(1) as usize,
    })
}
