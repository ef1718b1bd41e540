//! The evaluation engine for projecting a parsed path onto a `RowTuple`.
//!
//! A row is navigated as if it were `<row><col>value</col>...</row>`, with
//! every column also visible as an attribute of the row element. Every path
//! must land on exactly one scalar value.

use crate::ast::{PathExpr, Step};
use crate::error::PathError;
use serde::{Deserialize, Serialize};
use xqdoc_types::RowTuple;

/// What to do with a bare `$x` reference that has no scalar step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BareVariablePolicy {
    /// Raise a projection error.
    #[default]
    Reject,
    /// Treat `$x` exactly like `$x/text()`.
    CoerceToText,
}

#[derive(Clone, Copy)]
enum Focus<'r> {
    /// A column viewed as an element; `text()` may still follow.
    Column(&'r str),
    /// A text node or attribute value; nothing may follow.
    Scalar(&'r str),
}

/// Evaluates `path` against the row bound to its variable.
pub fn evaluate<'r>(
    path: &PathExpr,
    row: &'r RowTuple,
    policy: BareVariablePolicy,
) -> Result<&'r str, PathError> {
    let Some((first, rest)) = path.steps.split_first() else {
        return match policy {
            BareVariablePolicy::Reject => Err(PathError::BareVariable(path.to_string())),
            BareVariablePolicy::CoerceToText => row_text(path, row, &Step::Text),
        };
    };

    let mut focus = match first {
        Step::Child(name) => Focus::Column(single_column(path, row, name, first)?),
        Step::Attribute(name) => Focus::Scalar(single_column(path, row, name, first)?),
        Step::Text => Focus::Scalar(row_text(path, row, first)?),
    };

    for step in rest {
        focus = match (focus, step) {
            (Focus::Column(value), Step::Text) => Focus::Scalar(value),
            // Column values are flat text: they have no child elements or
            // attributes of their own.
            _ => return Err(not_present(path, step)),
        };
    }

    match focus {
        Focus::Column(value) | Focus::Scalar(value) => Ok(value),
    }
}

fn single_column<'r>(
    path: &PathExpr,
    row: &'r RowTuple,
    name: &str,
    step: &Step,
) -> Result<&'r str, PathError> {
    let mut matches = row.columns().iter().filter(|c| c.name == name);
    match (matches.next(), matches.count()) {
        (None, _) => Err(not_present(path, step)),
        (Some(column), 0) => Ok(column.value.as_str()),
        (Some(_), more) => Err(PathError::Ambiguous {
            path: path.to_string(),
            step: step.to_string(),
            matches: more + 1,
        }),
    }
}

/// The text of the row itself is only defined for single-column rows.
fn row_text<'r>(path: &PathExpr, row: &'r RowTuple, step: &Step) -> Result<&'r str, PathError> {
    match row.columns() {
        [] => Err(not_present(path, step)),
        [only] => Ok(only.value.as_str()),
        many => Err(PathError::Ambiguous {
            path: path.to_string(),
            step: step.to_string(),
            matches: many.len(),
        }),
    }
}

fn not_present(path: &PathExpr, step: &Step) -> PathError {
    PathError::NotPresent {
        path: path.to_string(),
        step: step.to_string(),
    }
}
