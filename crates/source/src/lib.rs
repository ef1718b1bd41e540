//! Data source and metadata abstractions for document execution.
//!
//! This crate defines the two external collaborators the engine talks to,
//! plus in-memory implementations of both.
//!
//! ## Collaborators
//!
//! - `DataSource`: answers a `doc(...)` request with a `RowCursor`
//! - `MetadataCatalog`: resolves virtual document names, memoized by a
//!   caller-owned `MetadataCache`
//!
//! ## Example
//!
//! ```
//! use xqdoc_source::{DataSource, FetchRequest, RowCursor, StaticDataSource};
//! use xqdoc_types::SourceHandle;
//!
//! let source = StaticDataSource::new().with_values("SELECT item FROM a", &["Lamp", "Goat"]);
//! let handle = SourceHandle::sql("SELECT item FROM a");
//! let mut cursor = source.fetch(&FetchRequest::new(&handle)).unwrap();
//!
//! while let Some(row) = cursor.next_row() {
//!     println!("Fetched: {:?}", row.unwrap());
//! }
//! ```

pub mod catalog;
pub mod cursor;
pub mod datasource;
pub mod error;
pub mod memory;

pub use catalog::{InMemoryCatalog, MetadataCache, MetadataCatalog, VirtualDocumentInfo};
pub use cursor::{IteratorRowCursor, RowCursor, VecRowCursor};
pub use datasource::{DataSource, FetchRequest, Parameter};
pub use error::{CatalogError, SourceError};
pub use memory::{SCALAR_COLUMN, StaticDataSource};
