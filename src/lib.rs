//! xqdoc turns XQuery-style document templates into canonical XML.
//!
//! A template mixes literal markup with `for $v in doc("...") return ...`
//! bindings over relational sources:
//!
//! ```
//! use std::sync::Arc;
//! use xqdoc::{ExecutionConfig, InMemoryCatalog, MetadataCache, StaticDataSource, compile};
//!
//! let cache = MetadataCache::new(Arc::new(
//!     InMemoryCatalog::new().with_document("A", ["value"], "SELECT value FROM a"),
//! ));
//! let document = compile(
//!     r#"<Items>{for $x in doc("A") return <Item>{$x/text()}</Item>}</Items>"#,
//!     &cache,
//! )?;
//! assert_eq!(document.plan_count(), 1);
//!
//! let rows = StaticDataSource::new().with_values("SELECT value FROM a", &["Lamp", "Goat"]);
//! let xml = document.execute(&rows, &ExecutionConfig::default())?;
//! assert_eq!(
//!     xml,
//!     r#"<?xml version="1.0" encoding="UTF-8"?><Items><Item>Lamp</Item><Item>Goat</Item></Items>"#
//! );
//! # Ok::<(), xqdoc::Error>(())
//! ```

use thiserror::Error;

pub use xqdoc_path::{BareVariablePolicy, PathError, PathExpr, Step};
pub use xqdoc_source::{
    CatalogError, DataSource, FetchRequest, InMemoryCatalog, IteratorRowCursor, MetadataCache,
    MetadataCatalog, Parameter, RowCursor, SourceError, StaticDataSource, VecRowCursor,
    VirtualDocumentInfo,
};
pub use xqdoc_types::{BindingId, Column, PlanId, RowTuple, SourceHandle, SourceKind};
pub use xqdoc_xquery::{
    AssembledDocument, AssembledNode, CompileError, CompiledDocument, ExecuteError,
    ExecutionConfig, Location, NodeId, OutputBuilder, Plan, PlanTable, TreeBuilder, compile,
    serialize,
};

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Execute(#[from] ExecuteError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Compiles `template` and executes it once.
///
/// Callers running a template more than once should `compile` it and keep
/// the `CompiledDocument`.
pub fn render(
    template: &str,
    cache: &MetadataCache,
    source: &dyn DataSource,
    config: &ExecutionConfig,
) -> Result<String, Error> {
    let document = compile(template, cache)?;
    Ok(document.execute(source, config)?)
}
