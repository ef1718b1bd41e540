use crate::cursor::RowCursor;
use crate::error::SourceError;
use std::sync::Arc;
use xqdoc_types::{RowTuple, SourceHandle};

/// The row currently bound to an enclosing variable.
#[derive(Debug, Clone, Copy)]
pub struct Parameter<'a> {
    pub variable: &'a str,
    pub row: &'a RowTuple,
}

/// Everything a data source is told about one fetch.
///
/// Root-level fetches carry no parameters. A nested binding's fetch carries
/// the rows of every enclosing binding, outermost first.
#[derive(Debug, Clone)]
pub struct FetchRequest<'a> {
    source: &'a SourceHandle,
    parameters: Vec<Parameter<'a>>,
}

impl<'a> FetchRequest<'a> {
    pub fn new(source: &'a SourceHandle) -> Self {
        Self {
            source,
            parameters: Vec::new(),
        }
    }

    pub fn with_parameters(source: &'a SourceHandle, parameters: Vec<Parameter<'a>>) -> Self {
        Self { source, parameters }
    }

    pub fn source(&self) -> &SourceHandle {
        self.source
    }

    /// The statement to execute: passthrough SQL text, or the underlying
    /// query of a virtual document.
    pub fn text(&self) -> &str {
        self.source.fetch_text()
    }

    pub fn parameters(&self) -> &[Parameter<'a>] {
        &self.parameters
    }

    /// The row bound to `variable`, innermost binding first.
    pub fn parameter(&self, variable: &str) -> Option<&RowTuple> {
        self.parameters
            .iter()
            .rev()
            .find(|p| p.variable == variable)
            .map(|p| p.row)
    }
}

/// The external collaborator that answers `doc(...)` requests.
///
/// Implementations must be safe to share between threads: one compiled
/// document may be executed concurrently against the same source.
pub trait DataSource: Send + Sync {
    /// Opens a cursor over the rows for `request`.
    fn fetch<'s>(
        &'s self,
        request: &FetchRequest<'_>,
    ) -> Result<Box<dyn RowCursor + 's>, SourceError>;
}

impl<T: DataSource + ?Sized> DataSource for &T {
    fn fetch<'s>(
        &'s self,
        request: &FetchRequest<'_>,
    ) -> Result<Box<dyn RowCursor + 's>, SourceError> {
        (**self).fetch(request)
    }
}

impl<T: DataSource + ?Sized> DataSource for Box<T> {
    fn fetch<'s>(
        &'s self,
        request: &FetchRequest<'_>,
    ) -> Result<Box<dyn RowCursor + 's>, SourceError> {
        (**self).fetch(request)
    }
}

impl<T: DataSource + ?Sized> DataSource for Arc<T> {
    fn fetch<'s>(
        &'s self,
        request: &FetchRequest<'_>,
    ) -> Result<Box<dyn RowCursor + 's>, SourceError> {
        (**self).fetch(request)
    }
}
