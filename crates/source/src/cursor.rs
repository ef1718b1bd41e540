//! Row cursors handed out by a data source for one fetch.
//!
//! A cursor is owned by the fetch that opened it. Dropping it releases
//! whatever the data source holds open (statement handles, buffers, locks),
//! which is how early termination is cleaned up.

use crate::error::SourceError;
use xqdoc_types::RowTuple;

/// A trait for the row stream produced by one data source invocation.
pub trait RowCursor {
    /// Get the next row, if available.
    ///
    /// Returns `None` when the cursor is exhausted.
    fn next_row(&mut self) -> Option<Result<RowTuple, SourceError>>;

    /// Hint about the total number of rows.
    ///
    /// Returns `None` if the size is unknown.
    fn size_hint(&self) -> Option<usize> {
        None
    }

    /// Check if the cursor has a known size.
    fn has_known_size(&self) -> bool {
        self.size_hint().is_some()
    }
}

/// Wraps any iterator of fallible rows as a cursor.
pub struct IteratorRowCursor<I>
where
    I: Iterator<Item = Result<RowTuple, SourceError>>,
{
    inner: I,
    size_hint: Option<usize>,
}

impl<I> IteratorRowCursor<I>
where
    I: Iterator<Item = Result<RowTuple, SourceError>>,
{
    pub fn new(inner: I) -> Self {
        let (lower, upper) = inner.size_hint();
        let size_hint = if upper == Some(lower) {
            Some(lower)
        } else {
            None
        };
        Self { inner, size_hint }
    }
}

impl<I> RowCursor for IteratorRowCursor<I>
where
    I: Iterator<Item = Result<RowTuple, SourceError>>,
{
    fn next_row(&mut self) -> Option<Result<RowTuple, SourceError>> {
        self.inner.next()
    }

    fn size_hint(&self) -> Option<usize> {
        self.size_hint
    }
}

/// A cursor over rows that are already in memory.
pub struct VecRowCursor {
    rows: std::vec::IntoIter<RowTuple>,
    len: usize,
}

impl VecRowCursor {
    pub fn new(rows: Vec<RowTuple>) -> Self {
        Self {
            len: rows.len(),
            rows: rows.into_iter(),
        }
    }

    /// Get the total number of rows.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Get the number of rows not yet read.
    pub fn remaining(&self) -> usize {
        self.rows.len()
    }
}

impl RowCursor for VecRowCursor {
    fn next_row(&mut self) -> Option<Result<RowTuple, SourceError>> {
        self.rows.next().map(Ok)
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.len)
    }
}

impl<C: RowCursor + ?Sized> RowCursor for Box<C> {
    fn next_row(&mut self) -> Option<Result<RowTuple, SourceError>> {
        (**self).next_row()
    }

    fn size_hint(&self) -> Option<usize> {
        (**self).size_hint()
    }
}
