//! Validation result: verdict flags, diagnostics and extracted properties.
//!
//! One [`ValidationReport`] is created per file and every stage of the
//! analysis writes into it. Renderers only read it through its accessors
//! (or its `serde` form).

use crate::compliance::ProfileOutcome;
use serde::{Serialize, Serializer};
use std::fmt;

/// Tri-state verdict flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Validity {
    /// Checked and holds
    True,
    /// Checked and violated
    False,
    /// Not (yet) decided
    Undetermined,
}

/// How a diagnostic affects the verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    /// Syntax violation: clears both flags
    NotWellFormed,
    /// Semantic violation: clears the valid flag
    NotValid,
    /// Informational: flags untouched
    Info,
}

macro_rules! message_ids {
    ($($variant:ident => ($code:literal, $severity:ident, $advisory:literal),)*) => {
        /// Stable identifier of a diagnostic condition.
        ///
        /// The string [`code`](MessageId::code) never changes between
        /// releases; tests and localization key on it.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum MessageId {
            $(
                #[allow(missing_docs)]
                $variant,
            )*
        }

        impl MessageId {
            /// Stable string code, e.g. `PDF-HDR-001`.
            pub fn code(self) -> &'static str {
                match self {
                    $(MessageId::$variant => $code,)*
                }
            }

            /// Severity used unless the caller overrides it.
            pub fn default_severity(self) -> Severity {
                match self {
                    $(MessageId::$variant => Severity::$severity,)*
                }
            }

            /// Recovered irregularity that only counts against validity in
            /// strict mode.
            pub fn is_advisory(self) -> bool {
                match self {
                    $(MessageId::$variant => $advisory,)*
                }
            }
        }
    };
}

message_ids! {
    // Header
    HeaderMissing => ("PDF-HDR-001", NotWellFormed, false),
    UnsupportedVersion => ("PDF-HDR-002", NotValid, false),
    MalformedVersion => ("PDF-HDR-003", NotValid, false),
    PostScriptHeader => ("PDF-HDR-004", Info, false),

    // Objects
    LexicalError => ("PDF-OBJ-001", Info, true),
    ObjectParseFailed => ("PDF-OBJ-002", NotWellFormed, false),
    MalformedStructure => ("PDF-OBJ-003", NotWellFormed, false),
    StreamLengthMismatch => ("PDF-OBJ-004", Info, true),
    StreamKeywordEol => ("PDF-OBJ-005", Info, true),
    MissingEndobj => ("PDF-OBJ-006", Info, true),
    ObjectHeaderMismatch => ("PDF-OBJ-007", Info, true),
    MissingObject => ("PDF-OBJ-008", NotValid, false),
    ObjectStreamInvalid => ("PDF-OBJ-009", NotValid, false),
    StreamDecodeFailed => ("PDF-OBJ-010", NotValid, false),

    // Cross-reference data
    StartxrefMissing => ("PDF-XRF-001", NotWellFormed, false),
    XrefSectionInvalid => ("PDF-XRF-002", NotWellFormed, false),
    XrefEntryMalformed => ("PDF-XRF-003", Info, true),
    XrefChainCircular => ("PDF-XRF-004", NotValid, false),
    XrefHopLimit => ("PDF-XRF-005", NotValid, false),
    TrailerMissing => ("PDF-XRF-006", NotWellFormed, false),

    // Trailer
    EofMarkerMissing => ("PDF-TRL-001", NotValid, false),
    TrailerIdInvalid => ("PDF-TRL-002", NotValid, false),
    TrailerSizeInvalid => ("PDF-TRL-003", NotValid, false),
    InfoNotDictionary => ("PDF-TRL-004", NotValid, false),
    Encrypted => ("PDF-TRL-005", Info, false),

    // Catalog
    RootMissing => ("PDF-CAT-001", NotWellFormed, false),
    CatalogNoType => ("PDF-CAT-002", NotValid, false),
    CatalogNotDictionary => ("PDF-CAT-003", NotWellFormed, false),
    CatalogWrongType => ("PDF-CAT-004", NotValid, false),

    // Page tree
    PagesMissing => ("PDF-PAG-001", NotValid, false),
    PageTreeCycle => ("PDF-PAG-002", NotValid, false),
    PageNodeWrongType => ("PDF-PAG-003", NotValid, false),
    PageCountMismatch => ("PDF-PAG-004", NotValid, false),
    PageKidsInvalid => ("PDF-PAG-005", NotValid, false),
    MediaBoxInvalid => ("PDF-PAG-006", NotValid, false),
    ResourcesMissing => ("PDF-PAG-007", NotValid, false),
    RotateInvalid => ("PDF-PAG-008", NotValid, false),

    // Structure tree
    StructTreeRootWrongType => ("PDF-STR-001", NotValid, false),
    RoleMapInvalid => ("PDF-STR-002", NotValid, false),
    RoleMapCircular => ("PDF-STR-003", NotValid, false),
    RoleMapEntryMalformed => ("PDF-STR-004", NotValid, false),
    StructElemInvalid => ("PDF-STR-005", NotValid, false),
    StructTypeMissing => ("PDF-STR-006", NotValid, false),
    StructParentInvalid => ("PDF-STR-007", NotValid, false),
    StructElemWrongType => ("PDF-STR-008", NotValid, false),
    StructTypeNonStandard => ("PDF-STR-009", NotValid, false),
    StructTreeCycle => ("PDF-STR-010", NotValid, false),

    // Document information
    InfoDateInvalid => ("PDF-INF-001", NotValid, false),

    // Profile reasons (carried by profile outcomes, never affect flags)
    ProfileUnmetAssumption => ("PDF-PRF-001", Info, false),
    TaggedNoMarkInfo => ("PDF-TAG-001", Info, false),
    TaggedNotMarked => ("PDF-TAG-002", Info, false),
    TaggedNoStructTree => ("PDF-TAG-003", Info, false),
    TaggedStructTreeInvalid => ("PDF-TAG-004", Info, false),
    PdfANotWellFormed => ("PDF-PDFA-001", Info, false),
    PdfAVersion => ("PDF-PDFA-002", Info, false),
    PdfABinaryMarker => ("PDF-PDFA-003", Info, false),
    PdfANoId => ("PDF-PDFA-004", Info, false),
    PdfAEncrypted => ("PDF-PDFA-005", Info, false),
    PdfAMetadata => ("PDF-PDFA-006", Info, false),
    PdfAIdentification => ("PDF-PDFA-007", Info, false),
    PdfAJavaScript => ("PDF-PDFA-008", Info, false),
    PdfAAdditionalActions => ("PDF-PDFA-009", Info, false),
    PdfAEmbeddedFiles => ("PDF-PDFA-010", Info, false),
    PdfATransparency => ("PDF-PDFA-011", Info, false),
    PdfAOutputIntent => ("PDF-PDFA-012", Info, false),
    LinearizedNoDictionary => ("PDF-LIN-001", Info, false),
    LinearizedLength => ("PDF-LIN-002", Info, false),
    LinearizedPageCount => ("PDF-LIN-003", Info, false),

    // Analyzer
    InternalError => ("PDF-INT-001", Info, false),
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl Serialize for MessageId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

/// One diagnostic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    /// Stable identifier
    pub id: MessageId,
    /// Effect on the verdict
    pub severity: Severity,
    /// Human-readable text
    pub text: String,
    /// Extra detail (object number, offending value)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_message: Option<String>,
    /// Byte offset in the file, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
}

impl Message {
    /// New message with the id's default severity.
    pub fn new(id: MessageId, text: impl Into<String>) -> Self {
        Self {
            id,
            severity: id.default_severity(),
            text: text.into(),
            sub_message: None,
            offset: None,
        }
    }

    /// Attach a sub-message.
    pub fn with_sub_message(mut self, sub: impl Into<String>) -> Self {
        self.sub_message = Some(sub.into());
        self
    }

    /// Attach a byte offset.
    pub fn at(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Override the severity.
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.id, self.text)?;
        if let Some(sub) = &self.sub_message {
            write!(f, " ({})", sub)?;
        }
        if let Some(offset) = self.offset {
            write!(f, " at byte {}", offset)?;
        }
        Ok(())
    }
}

/// Value of a property.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PropertyValue {
    /// Text
    String(String),
    /// Whole number
    Integer(i64),
    /// Flag
    Bool(bool),
    /// Nested properties
    List(Vec<Property>),
}

/// Named entry in the extracted property tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Property {
    /// Property name (`Version`, `PageCount`, ...)
    pub name: String,
    /// Property value
    pub value: PropertyValue,
}

impl Property {
    /// Text property.
    pub fn string(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: PropertyValue::String(value.into()),
        }
    }

    /// Integer property.
    pub fn integer(name: impl Into<String>, value: i64) -> Self {
        Self {
            name: name.into(),
            value: PropertyValue::Integer(value),
        }
    }

    /// Boolean property.
    pub fn boolean(name: impl Into<String>, value: bool) -> Self {
        Self {
            name: name.into(),
            value: PropertyValue::Bool(value),
        }
    }

    /// Subtree property.
    pub fn list(name: impl Into<String>, children: Vec<Property>) -> Self {
        Self {
            name: name.into(),
            value: PropertyValue::List(children),
        }
    }
}

/// Accumulated result of validating one file.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    well_formed: Validity,
    valid: Validity,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "is_zero")]
    dropped_messages: usize,
    properties: Vec<Property>,
    profiles: Vec<ProfileOutcome>,
    #[serde(skip)]
    errors: usize,
    #[serde(skip)]
    max_messages: usize,
    #[serde(skip)]
    strict: bool,
}

fn is_zero(n: &usize) -> bool {
    *n == 0
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidationReport {
    /// Empty report with undetermined flags.
    pub fn new() -> Self {
        Self {
            well_formed: Validity::Undetermined,
            valid: Validity::Undetermined,
            messages: Vec::new(),
            dropped_messages: 0,
            properties: Vec::new(),
            profiles: Vec::new(),
            errors: 0,
            max_messages: 0,
            strict: false,
        }
    }

    /// Keep at most `max` messages (0 = no cap).
    pub fn with_max_messages(mut self, max: usize) -> Self {
        self.max_messages = max;
        self
    }

    /// Count advisory conditions against validity.
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Record a diagnostic and update the flags.
    pub fn add(&mut self, mut message: Message) {
        if self.strict && message.id.is_advisory() && message.severity == Severity::Info {
            message.severity = Severity::NotValid;
        }
        if message.severity != Severity::Info {
            self.errors += 1;
        }
        match message.severity {
            Severity::NotWellFormed => {
                self.well_formed = Validity::False;
                self.valid = Validity::False;
            },
            Severity::NotValid => self.valid = Validity::False,
            Severity::Info => {},
        }
        if self.max_messages != 0 && self.messages.len() >= self.max_messages {
            self.dropped_messages += 1;
            return;
        }
        log::debug!("{}", message);
        self.messages.push(message);
    }

    /// Shorthand for [`add`](Self::add) with a fresh [`Message`].
    pub fn add_message(&mut self, id: MessageId, text: impl Into<String>) {
        self.add(Message::new(id, text));
    }

    /// Settle undetermined flags to `True`.
    ///
    /// Well-formedness is only asserted when `structure_read` says the
    /// header and cross-reference chain were actually read.
    pub fn settle(&mut self, structure_read: bool) {
        if structure_read && self.well_formed == Validity::Undetermined {
            self.well_formed = Validity::True;
        }
        if self.well_formed == Validity::True && self.valid == Validity::Undetermined {
            self.valid = Validity::True;
        }
    }

    /// Append a property.
    pub fn add_property(&mut self, property: Property) {
        self.properties.push(property);
    }

    /// Append a profile outcome.
    pub fn add_profile(&mut self, outcome: ProfileOutcome) {
        self.profiles.push(outcome);
    }

    /// Well-formedness verdict.
    pub fn well_formed(&self) -> Validity {
        self.well_formed
    }

    /// Validity verdict.
    pub fn valid(&self) -> Validity {
        self.valid
    }

    /// Diagnostics in the order they were recorded.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Number of not-well-formed and not-valid diagnostics recorded,
    /// including any dropped by the cap.
    pub fn error_count(&self) -> usize {
        self.errors
    }

    /// Number of diagnostics dropped by the cap.
    pub fn dropped_messages(&self) -> usize {
        self.dropped_messages
    }

    /// Does any message carry `id`?
    pub fn has_message(&self, id: MessageId) -> bool {
        self.messages.iter().any(|m| m.id == id)
    }

    /// Number of messages carrying `id`.
    pub fn count_messages(&self, id: MessageId) -> usize {
        self.messages.iter().filter(|m| m.id == id).count()
    }

    /// Top-level properties.
    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    /// First top-level property called `name`.
    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties
            .iter()
            .find(|p| p.name == name)
            .map(|p| &p.value)
    }

    /// Profile outcomes in evaluation order.
    pub fn profiles(&self) -> &[ProfileOutcome] {
        &self.profiles
    }
}
