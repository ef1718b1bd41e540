//! An in-memory data source keyed by statement text.
//!
//! Useful for tests, benchmarks, and callers that already hold their rows.
//! Statement text is matched after trimming and case-folding, the same way
//! source references are compared at compile time.

use crate::cursor::{RowCursor, VecRowCursor};
use crate::datasource::{DataSource, FetchRequest};
use crate::error::SourceError;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use xqdoc_types::{RowTuple, normalize_source_text};

type Responder =
    Box<dyn Fn(&FetchRequest<'_>) -> Result<Vec<RowTuple>, SourceError> + Send + Sync>;

enum Response {
    Rows(Vec<RowTuple>),
    Failure(String),
    Computed(Responder),
}

/// Column name used for rows given as bare scalars.
pub const SCALAR_COLUMN: &str = "value";

#[derive(Default)]
pub struct StaticDataSource {
    responses: HashMap<String, Response>,
    fetches: Mutex<HashMap<String, usize>>,
    open_cursors: AtomicUsize,
}

impl StaticDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(mut self, text: &str, rows: Vec<RowTuple>) -> Self {
        self.responses
            .insert(normalize_source_text(text), Response::Rows(rows));
        self
    }

    /// Registers single-column rows named [`SCALAR_COLUMN`].
    pub fn with_values(self, text: &str, values: &[&str]) -> Self {
        let rows = values
            .iter()
            .map(|v| RowTuple::new().with(SCALAR_COLUMN, *v))
            .collect();
        self.with_rows(text, rows)
    }

    pub fn with_failure(mut self, text: &str, message: &str) -> Self {
        self.responses.insert(
            normalize_source_text(text),
            Response::Failure(message.to_string()),
        );
        self
    }

    /// Registers rows computed from the request, typically from its parameters.
    pub fn with_responder<F>(mut self, text: &str, responder: F) -> Self
    where
        F: Fn(&FetchRequest<'_>) -> Result<Vec<RowTuple>, SourceError> + Send + Sync + 'static,
    {
        self.responses.insert(
            normalize_source_text(text),
            Response::Computed(Box::new(responder)),
        );
        self
    }

    /// Loads `{"statement": [row, ...], ...}`.
    ///
    /// A row is either a scalar (one `value` column) or an object whose
    /// members become columns. `{"error": "message"}` in place of the row
    /// array registers a failing statement.
    pub fn from_json(value: &Value) -> Result<Self, SourceError> {
        let entries = value
            .as_object()
            .ok_or_else(|| SourceError::Fixture("data must be a JSON object".into()))?;

        let mut source = Self::new();
        for (text, response) in entries {
            source = match response {
                Value::Array(items) => {
                    let rows = items
                        .iter()
                        .map(|item| row_from_json(text, item))
                        .collect::<Result<Vec<_>, _>>()?;
                    source.with_rows(text, rows)
                }
                Value::Object(obj) => match obj.get("error").and_then(Value::as_str) {
                    Some(message) => source.with_failure(text, message),
                    None => {
                        return Err(SourceError::Fixture(format!(
                            "'{}' must map to an array of rows or an error",
                            text
                        )));
                    }
                },
                _ => {
                    return Err(SourceError::Fixture(format!(
                        "'{}' must map to an array of rows or an error",
                        text
                    )));
                }
            };
        }
        Ok(source)
    }

    /// How many times `text` was fetched.
    pub fn fetch_count(&self, text: &str) -> usize {
        self.fetches
            .lock()
            .map(|f| f.get(&normalize_source_text(text)).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    pub fn total_fetches(&self) -> usize {
        self.fetches.lock().map(|f| f.values().sum()).unwrap_or(0)
    }

    /// Cursors handed out and not yet dropped.
    pub fn open_cursors(&self) -> usize {
        self.open_cursors.load(Ordering::SeqCst)
    }

    fn record_fetch(&self, key: &str) {
        match self.fetches.lock() {
            Ok(mut fetches) => *fetches.entry(key.to_string()).or_insert(0) += 1,
            Err(_) => log::warn!("Fetch counter lock poisoned"),
        }
    }
}

fn row_from_json(text: &str, item: &Value) -> Result<RowTuple, SourceError> {
    match item {
        Value::Object(members) => members
            .iter()
            .map(|(name, v)| scalar_from_json(text, v).map(|s| (name.clone(), s)))
            .collect(),
        other => Ok(RowTuple::new().with(SCALAR_COLUMN, scalar_from_json(text, other)?)),
    }
}

fn scalar_from_json(text: &str, value: &Value) -> Result<String, SourceError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Ok(String::new()),
        _ => Err(SourceError::Fixture(format!(
            "'{}' has a nested value where a scalar was expected",
            text
        ))),
    }
}

impl DataSource for StaticDataSource {
    fn fetch<'s>(
        &'s self,
        request: &FetchRequest<'_>,
    ) -> Result<Box<dyn RowCursor + 's>, SourceError> {
        let key = normalize_source_text(request.text());
        self.record_fetch(&key);

        let rows = match self.responses.get(&key) {
            Some(Response::Rows(rows)) => rows.clone(),
            Some(Response::Computed(responder)) => responder(request)?,
            Some(Response::Failure(message)) => {
                return Err(SourceError::Execution(message.clone()));
            }
            None => return Err(SourceError::Unknown(request.text().to_string())),
        };
        log::trace!("Serving {} rows for '{}'", rows.len(), request.text());

        self.open_cursors.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(TrackedCursor {
            inner: VecRowCursor::new(rows),
            open: &self.open_cursors,
        }))
    }
}

/// Keeps `open_cursors` honest: the count drops when the cursor is dropped.
struct TrackedCursor<'s> {
    inner: VecRowCursor,
    open: &'s AtomicUsize,
}

impl RowCursor for TrackedCursor<'_> {
    fn next_row(&mut self) -> Option<Result<RowTuple, SourceError>> {
        self.inner.next_row()
    }

    fn size_hint(&self) -> Option<usize> {
        self.inner.size_hint()
    }
}

impl Drop for TrackedCursor<'_> {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}
