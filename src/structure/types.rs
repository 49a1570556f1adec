//! Types for PDF logical structure trees.
//!
//! Structure element types follow ISO 32000-1:2008 Section 14.8.4.

use crate::object::ObjectRef;

/// Standard structure types from PDF spec Section 14.8.4.
///
/// Custom types can be mapped to standard types via the RoleMap.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StructType {
    // Grouping elements
    /// Document root
    Document,
    /// Part (major division)
    Part,
    /// Article
    Art,
    /// Section
    Sect,
    /// Division
    Div,
    /// Block quotation
    BlockQuote,
    /// Caption
    Caption,
    /// Table of contents
    TOC,
    /// Table of contents item
    TOCI,
    /// Index
    Index,
    /// Non-structural grouping
    NonStruct,
    /// Producer-private content
    Private,

    // Paragraph-like elements
    /// Paragraph
    P,
    /// Heading (level unspecified)
    H,
    /// Heading level 1
    H1,
    /// Heading level 2
    H2,
    /// Heading level 3
    H3,
    /// Heading level 4
    H4,
    /// Heading level 5
    H5,
    /// Heading level 6
    H6,

    // Lists
    /// List
    L,
    /// List item
    LI,
    /// Label (list item marker)
    Lbl,
    /// List body (list item content)
    LBody,

    // Tables
    /// Table
    Table,
    /// Table row
    TR,
    /// Table header cell
    TH,
    /// Table data cell
    TD,
    /// Table header group
    THead,
    /// Table body group
    TBody,
    /// Table footer group
    TFoot,

    // Inline elements
    /// Span (inline generic)
    Span,
    /// Quote
    Quote,
    /// Note
    Note,
    /// Reference
    Reference,
    /// Bibliographic entry
    BibEntry,
    /// Code
    Code,
    /// Link
    Link,
    /// Annotation
    Annot,
    /// Ruby
    Ruby,
    /// Ruby base text
    RB,
    /// Ruby annotation text
    RT,
    /// Ruby punctuation
    RP,
    /// Warichu
    Warichu,
    /// Warichu text
    WT,
    /// Warichu punctuation
    WP,

    // Illustrations
    /// Figure
    Figure,
    /// Formula
    Formula,
    /// Form (input field)
    Form,

    /// Type not defined in the PDF specification
    Custom(String),
}

impl StructType {
    /// Map a `/S` name to a structure type.
    pub fn from_name(s: &str) -> Self {
        match s {
            "Document" => Self::Document,
            "Part" => Self::Part,
            "Art" => Self::Art,
            "Sect" => Self::Sect,
            "Div" => Self::Div,
            "BlockQuote" => Self::BlockQuote,
            "Caption" => Self::Caption,
            "TOC" => Self::TOC,
            "TOCI" => Self::TOCI,
            "Index" => Self::Index,
            "NonStruct" => Self::NonStruct,
            "Private" => Self::Private,
            "P" => Self::P,
            "H" => Self::H,
            "H1" => Self::H1,
            "H2" => Self::H2,
            "H3" => Self::H3,
            "H4" => Self::H4,
            "H5" => Self::H5,
            "H6" => Self::H6,
            "L" => Self::L,
            "LI" => Self::LI,
            "Lbl" => Self::Lbl,
            "LBody" => Self::LBody,
            "Table" => Self::Table,
            "TR" => Self::TR,
            "TH" => Self::TH,
            "TD" => Self::TD,
            "THead" => Self::THead,
            "TBody" => Self::TBody,
            "TFoot" => Self::TFoot,
            "Span" => Self::Span,
            "Quote" => Self::Quote,
            "Note" => Self::Note,
            "Reference" => Self::Reference,
            "BibEntry" => Self::BibEntry,
            "Code" => Self::Code,
            "Link" => Self::Link,
            "Annot" => Self::Annot,
            "Ruby" => Self::Ruby,
            "RB" => Self::RB,
            "RT" => Self::RT,
            "RP" => Self::RP,
            "Warichu" => Self::Warichu,
            "WT" => Self::WT,
            "WP" => Self::WP,
            "Figure" => Self::Figure,
            "Formula" => Self::Formula,
            "Form" => Self::Form,
            _ => Self::Custom(s.to_string()),
        }
    }

    /// Is this one of the standard types?
    pub fn is_standard(&self) -> bool {
        !matches!(self, Self::Custom(_))
    }

    /// Check if this is a heading type (H, H1-H6)
    pub fn is_heading(&self) -> bool {
        matches!(self, Self::H | Self::H1 | Self::H2 | Self::H3 | Self::H4 | Self::H5 | Self::H6)
    }
}

/// Child entry of a structure element.
#[derive(Debug, Clone, PartialEq)]
pub enum StructChild {
    /// Another structure element, by index into [`StructTree::elements`]
    Element(usize),
    /// Marked-content sequence: bare integer MCID or an `/MCR` dictionary
    MarkedContent {
        /// Marked content identifier
        mcid: i64,
        /// Page holding the content, when given by `/Pg`
        page: Option<ObjectRef>,
    },
    /// Object reference (`/OBJR`), e.g. to an annotation
    ObjectRef(ObjectRef),
}

/// A validated structure element.
#[derive(Debug, Clone, PartialEq)]
pub struct StructElem {
    /// Where the element is stored, when indirect
    pub obj_ref: Option<ObjectRef>,
    /// The `/S` name as written
    pub struct_type: String,
    /// Standard type reached through the role map, if any
    pub standard_type: Option<StructType>,
    /// Children in `/K` order
    pub children: Vec<StructChild>,
}

/// Logical structure built from `/StructTreeRoot`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructTree {
    /// All elements; parents precede their children
    pub elements: Vec<StructElem>,
    /// Indices of the root's immediate children
    pub roots: Vec<usize>,
}

impl StructTree {
    /// Number of structure elements.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Does the tree hold no elements?
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}
