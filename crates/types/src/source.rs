//! Resolved `doc(...)` references.
//!
//! A `SourceHandle` is produced once at compile time. Row fetching only ever
//! reads it, so the raw text is never re-classified while a document runs.

use std::fmt;

/// Trims surrounding whitespace and case-folds, giving the identity key used
/// to decide whether two source references are the same.
pub fn normalize_source_text(text: &str) -> String {
    text.trim().to_lowercase()
}

/// What a source reference resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    /// A query statement handed verbatim (original case) to the data source.
    SqlPassthrough { text: String },
    /// A named virtual document known to the metadata catalog.
    VirtualDocument {
        name: String,
        columns: Vec<String>,
        query: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceHandle {
    original: String,
    normalized: String,
    kind: SourceKind,
}

impl SourceHandle {
    pub fn sql(text: &str) -> Self {
        let original = text.trim().to_string();
        Self {
            normalized: normalize_source_text(&original),
            kind: SourceKind::SqlPassthrough {
                text: original.clone(),
            },
            original,
        }
    }

    pub fn virtual_document(
        text: &str,
        name: impl Into<String>,
        columns: Vec<String>,
        query: impl Into<String>,
    ) -> Self {
        let original = text.trim().to_string();
        Self {
            normalized: normalize_source_text(&original),
            kind: SourceKind::VirtualDocument {
                name: name.into(),
                columns,
                query: query.into(),
            },
            original,
        }
    }

    /// The trimmed text as written in the template.
    pub fn original(&self) -> &str {
        &self.original
    }

    /// The identity key: trimmed and case-folded.
    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    pub fn kind(&self) -> &SourceKind {
        &self.kind
    }

    /// The text a data source should execute for this handle.
    pub fn fetch_text(&self) -> &str {
        match &self.kind {
            SourceKind::SqlPassthrough { text } => text,
            SourceKind::VirtualDocument { query, .. } => query,
        }
    }

    /// Declared columns of a virtual document; empty for passthrough queries.
    pub fn declared_columns(&self) -> &[String] {
        match &self.kind {
            SourceKind::SqlPassthrough { .. } => &[],
            SourceKind::VirtualDocument { columns, .. } => columns,
        }
    }
}

impl fmt::Display for SourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.original)
    }
}
