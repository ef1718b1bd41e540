//! Classifies `doc(...)` text into a `SourceHandle`, once, at compile time.

use crate::error::CompileError;
use xqdoc_source::MetadataCache;
use xqdoc_types::SourceHandle;

/// Leading keywords that mark `doc(...)` text as a query statement.
pub const QUERY_KEYWORDS: &[&str] = &["select", "with", "values", "table", "exec", "execute", "call"];

/// True if `text` starts with a query keyword followed by whitespace, `(`,
/// or nothing at all. Case-insensitive.
pub fn is_query_statement(text: &str) -> bool {
    let text = text.trim_start();
    QUERY_KEYWORDS.iter().any(|keyword| {
        text.get(..keyword.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(keyword))
            && text[keyword.len()..]
                .chars()
                .next()
                .is_none_or(|c| c.is_whitespace() || c == '(')
    })
}

pub struct SourceResolver<'c> {
    cache: &'c MetadataCache,
}

impl<'c> SourceResolver<'c> {
    pub fn new(cache: &'c MetadataCache) -> Self {
        Self { cache }
    }

    pub fn resolve(&self, raw: &str) -> Result<SourceHandle, CompileError> {
        let text = raw.trim();
        if text.is_empty() {
            return Err(resolution_error(raw, "source text is empty"));
        }

        if is_query_statement(text) {
            log::debug!("Source '{}' is a query statement", text);
            return Ok(SourceHandle::sql(text));
        }

        match self.cache.resolve(text) {
            Ok(Some(info)) => {
                log::debug!(
                    "Source '{}' is virtual document '{}' ({} declared columns)",
                    text,
                    info.name,
                    info.columns.len()
                );
                Ok(SourceHandle::virtual_document(
                    text,
                    info.name.clone(),
                    info.columns.clone(),
                    info.underlying_query.clone(),
                ))
            }
            Ok(None) => Err(resolution_error(text, "no virtual document has this name")),
            Err(e) => Err(resolution_error(text, &e.to_string())),
        }
    }
}

fn resolution_error(source_text: &str, reason: &str) -> CompileError {
    CompileError::Resolution {
        source_text: source_text.to_string(),
        reason: reason.to_string(),
    }
}
