use thiserror::Error;
use xqdoc_path::PathError;
use xqdoc_source::SourceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub line: usize,
    pub col: usize,
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}, column {}", self.line, self.col)
    }
}

impl From<(usize, usize)> for Location {
    fn from((line, col): (usize, usize)) -> Self {
        Location { line, col }
    }
}

/// Computes the 1-based line and column of a byte offset.
pub fn get_line_col_from_pos(source: &str, pos: usize) -> (usize, usize) {
    let pos = pos.min(source.len());
    let before = source.get(..pos).unwrap_or(source);
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
    let col = before[line_start..].chars().count() + 1;
    (line, col)
}

/// Errors that abort `compile`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("Template syntax error: {reason} at {location}")]
    Parse {
        /// Byte offset into the template text.
        position: usize,
        location: Location,
        reason: String,
    },

    #[error("Cannot resolve source '{source_text}': {reason}")]
    Resolution { source_text: String, reason: String },
}

impl CompileError {
    pub(crate) fn parse(source: &str, position: usize, reason: impl Into<String>) -> Self {
        CompileError::Parse {
            position,
            location: get_line_col_from_pos(source, position).into(),
            reason: reason.into(),
        }
    }
}

/// Errors that abort `execute`. No partial document is ever produced.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecuteError {
    #[error(
        "Binding ${variable} over '{source_text}' requires exactly one row, found {}",
        describe_count(.actual)
    )]
    Cardinality {
        variable: String,
        source_text: String,
        /// Rows seen before fetching stopped; 2 means "two or more".
        actual: usize,
    },

    #[error("Projection of '{path}' failed: {cause}")]
    Projection { path: String, cause: PathError },

    #[error("Source '{source_text}' failed: {cause}")]
    Source {
        source_text: String,
        cause: SourceError,
    },

    #[error("Serialization failed: {0}")]
    Serialize(String),

    /// The template and its plans disagree, e.g. plans from another compile.
    #[error("Template structure error: {0}")]
    Structure(String),
}

fn describe_count(actual: &usize) -> &'static str {
    match *actual {
        0 => "none",
        1 => "one",
        _ => "more than one",
    }
}
