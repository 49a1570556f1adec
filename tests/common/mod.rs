//! In-memory PDF builder for integration tests.
//!
//! Objects are appended in call order; each `*_xref` call closes the
//! current revision with a cross-reference section covering the objects
//! written since the previous one, so successive calls produce
//! incremental updates chained through `/Prev`.

#![allow(dead_code)]

use pdf_probe::{Analyzer, ValidationOptions, ValidationReport};
use std::io::Cursor;

/// Where one object lives.
#[derive(Debug, Clone, Copy)]
enum Entry {
    InFile(usize),
    Compressed { stream: u32, index: u32 },
}

/// Builds a PDF file revision by revision.
pub struct PdfBuilder {
    out: Vec<u8>,
    pending: Vec<(u32, Entry)>,
    prev_xref: Option<usize>,
    max_id: u32,
    first_section: bool,
}

impl PdfBuilder {
    /// `%PDF-<version>` header followed by a binary marker comment.
    pub fn new(version: &str) -> Self {
        let mut out = format!("%PDF-{}\n", version).into_bytes();
        out.extend_from_slice(b"%\xE2\xE3\xCF\xD3\n");
        Self::from_prefix(out)
    }

    /// Start from arbitrary leading bytes (no header written).
    pub fn from_prefix(prefix: Vec<u8>) -> Self {
        Self {
            out: prefix,
            pending: Vec::new(),
            prev_xref: None,
            max_id: 0,
            first_section: true,
        }
    }

    /// `id 0 obj <body> endobj`.
    pub fn object(mut self, id: u32, body: &str) -> Self {
        self.record(id, Entry::InFile(self.out.len()));
        self.out
            .extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", id, body).as_bytes());
        self
    }

    /// A stream object; `/Length` is added to `dict_entries`.
    pub fn stream(mut self, id: u32, dict_entries: &str, data: &[u8]) -> Self {
        self.record(id, Entry::InFile(self.out.len()));
        self.out.extend_from_slice(
            format!(
                "{} 0 obj\n<< {} /Length {} >>\nstream\n",
                id,
                dict_entries,
                data.len()
            )
            .as_bytes(),
        );
        self.out.extend_from_slice(data);
        self.out.extend_from_slice(b"\nendstream\nendobj\n");
        self
    }

    /// An uncompressed `/ObjStm` holding `objects`, registered as
    /// compressed entries for the next stream xref.
    pub fn object_stream(mut self, id: u32, objects: &[(u32, &str)]) -> Self {
        let mut header = String::new();
        let mut body = String::new();
        for (id, text) in objects {
            header.push_str(&format!("{} {} ", id, body.len()));
            body.push_str(text);
            body.push(' ');
        }
        let data = format!("{}{}", header, body);
        let dict = format!("/Type /ObjStm /N {} /First {}", objects.len(), header.len());
        self = self.stream(id, &dict, data.as_bytes());
        for (index, (obj, _)) in objects.iter().enumerate() {
            self.record(
                *obj,
                Entry::Compressed {
                    stream: id,
                    index: index as u32,
                },
            );
        }
        self
    }

    /// Raw bytes appended as-is.
    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.out.extend_from_slice(bytes);
        self
    }

    /// Close the revision with a classic `xref` table and `trailer`.
    pub fn classic_xref(mut self, trailer_extra: &str) -> Self {
        let at = self.out.len();
        let mut table = String::from("xref\n");
        if self.first_section {
            table.push_str("0 1\n0000000000 65535 f\r\n");
        }
        let mut pending = std::mem::take(&mut self.pending);
        pending.sort_by_key(|(id, _)| *id);
        for (id, entry) in &pending {
            if let Entry::InFile(offset) = entry {
                table.push_str(&format!("{} 1\n{:010} 00000 n\r\n", id, offset));
            }
        }
        self.out.extend_from_slice(table.as_bytes());
        let trailer = format!("trailer\n<< {} >>\n", self.trailer_entries(trailer_extra));
        self.out.extend_from_slice(trailer.as_bytes());
        self.close_revision(at)
    }

    /// Close the revision with a cross-reference stream numbered `id`.
    pub fn stream_xref(mut self, id: u32, trailer_extra: &str) -> Self {
        let at = self.out.len();
        self.record(id, Entry::InFile(at));
        let mut pending = std::mem::take(&mut self.pending);
        pending.sort_by_key(|(id, _)| *id);

        let mut index = Vec::new();
        let mut rows = Vec::new();
        if self.first_section {
            index.push("0 1".to_string());
            rows.extend_from_slice(&[0, 0, 0, 0, 0, 0xFF, 0xFF]);
        }
        for (obj, entry) in &pending {
            index.push(format!("{} 1", obj));
            match *entry {
                Entry::InFile(offset) => {
                    rows.push(1);
                    rows.extend_from_slice(&(offset as u32).to_be_bytes());
                    rows.extend_from_slice(&[0, 0]);
                },
                Entry::Compressed { stream, index } => {
                    rows.push(2);
                    rows.extend_from_slice(&stream.to_be_bytes());
                    rows.extend_from_slice(&(index as u16).to_be_bytes());
                },
            }
        }
        let dict = format!(
            "/Type /XRef /W [1 4 2] /Index [{}] {}",
            index.join(" "),
            self.trailer_entries(trailer_extra)
        );
        self.out.extend_from_slice(
            format!("{} 0 obj\n<< {} /Length {} >>\nstream\n", id, dict, rows.len()).as_bytes(),
        );
        self.out.extend_from_slice(&rows);
        self.out.extend_from_slice(b"\nendstream\nendobj\n");
        self.close_revision(at)
    }

    /// The finished file.
    pub fn finish(self) -> Vec<u8> {
        self.out
    }

    fn record(&mut self, id: u32, entry: Entry) {
        self.max_id = self.max_id.max(id);
        self.pending.retain(|(other, _)| *other != id);
        self.pending.push((id, entry));
    }

    fn trailer_entries(&self, extra: &str) -> String {
        let mut entries = format!("/Size {}", self.max_id + 1);
        if let Some(prev) = self.prev_xref {
            entries.push_str(&format!(" /Prev {}", prev));
        }
        if !extra.is_empty() {
            entries.push(' ');
            entries.push_str(extra);
        }
        entries
    }

    fn close_revision(mut self, at: usize) -> Self {
        self.out
            .extend_from_slice(format!("startxref\n{}\n%%EOF\n", at).as_bytes());
        self.prev_xref = Some(at);
        self.first_section = false;
        self
    }
}

/// Catalog, a one-page tree and a classic xref: the smallest valid file.
pub fn minimal_pdf(version: &str) -> Vec<u8> {
    PdfBuilder::new(version)
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>")
        .object(3, "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Resources << >> >>")
        .classic_xref("/Root 1 0 R")
        .finish()
}

/// Run the default analyzer over in-memory bytes.
pub fn analyze(data: Vec<u8>) -> ValidationReport {
    analyze_with(data, ValidationOptions::default())
}

/// Run an analyzer with `options` over in-memory bytes.
pub fn analyze_with(data: Vec<u8>, options: ValidationOptions) -> ValidationReport {
    Analyzer::new(options).analyze(Cursor::new(data), ValidationReport::new())
}
