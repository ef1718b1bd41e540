//! Metadata lookups for named virtual documents.
//!
//! The engine never talks to a catalog directly. Callers own a
//! `MetadataCache` and pass it to compilation, so resolved metadata can be
//! shared across compiles without any process-wide state.

use crate::error::CatalogError;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

/// What the catalog knows about one virtual document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualDocumentInfo {
    pub name: String,
    pub columns: Vec<String>,
    pub underlying_query: String,
}

/// The external collaborator resolving virtual document names.
pub trait MetadataCatalog: Send + Sync {
    /// Returns `Ok(None)` when the name is unknown.
    fn resolve_virtual_document(
        &self,
        name: &str,
    ) -> Result<Option<VirtualDocumentInfo>, CatalogError>;
}

fn catalog_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// A catalog backed by a map, with case-insensitive names.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    documents: HashMap<String, VirtualDocumentInfo>,
    lookups: AtomicUsize,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document<C, S>(mut self, name: &str, columns: C, underlying_query: &str) -> Self
    where
        C: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.insert(VirtualDocumentInfo {
            name: name.to_string(),
            columns: columns.into_iter().map(Into::into).collect(),
            underlying_query: underlying_query.to_string(),
        });
        self
    }

    pub fn insert(&mut self, info: VirtualDocumentInfo) {
        self.documents.insert(catalog_key(&info.name), info);
    }

    /// Loads `{"Name": {"columns": [...], "query": "..."}, ...}`.
    pub fn from_json(value: &Value) -> Result<Self, CatalogError> {
        let entries = value
            .as_object()
            .ok_or_else(|| CatalogError::Fixture("catalog must be a JSON object".into()))?;

        let mut catalog = Self::new();
        for (name, entry) in entries {
            let query = entry
                .get("query")
                .and_then(Value::as_str)
                .ok_or_else(|| CatalogError::Fixture(format!("'{}' has no string 'query'", name)))?;
            let columns = match entry.get("columns") {
                None => Vec::new(),
                Some(Value::Array(items)) => items
                    .iter()
                    .map(|c| {
                        c.as_str().map(str::to_string).ok_or_else(|| {
                            CatalogError::Fixture(format!("'{}' has a non-string column", name))
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?,
                Some(_) => {
                    return Err(CatalogError::Fixture(format!(
                        "'{}' columns must be an array",
                        name
                    )));
                }
            };
            catalog.insert(VirtualDocumentInfo {
                name: name.clone(),
                columns,
                underlying_query: query.to_string(),
            });
        }
        Ok(catalog)
    }

    /// Number of lookups answered so far.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::Relaxed)
    }
}

impl MetadataCatalog for InMemoryCatalog {
    fn resolve_virtual_document(
        &self,
        name: &str,
    ) -> Result<Option<VirtualDocumentInfo>, CatalogError> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        Ok(self.documents.get(&catalog_key(name)).cloned())
    }
}

/// A caller-owned memo over a `MetadataCatalog`.
///
/// Both hits and misses are remembered; catalog errors are not.
pub struct MetadataCache {
    catalog: Arc<dyn MetadataCatalog>,
    entries: RwLock<HashMap<String, Option<Arc<VirtualDocumentInfo>>>>,
}

impl MetadataCache {
    pub fn new(catalog: Arc<dyn MetadataCatalog>) -> Self {
        Self {
            catalog,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn resolve(&self, name: &str) -> Result<Option<Arc<VirtualDocumentInfo>>, CatalogError> {
        let key = catalog_key(name);
        if let Ok(entries) = self.entries.read() {
            if let Some(hit) = entries.get(&key) {
                return Ok(hit.clone());
            }
        }

        let resolved = self.catalog.resolve_virtual_document(name)?.map(Arc::new);
        log::debug!(
            "Metadata lookup for '{}': {}",
            name,
            if resolved.is_some() { "found" } else { "unknown" }
        );
        match self.entries.write() {
            Ok(mut entries) => {
                entries.insert(key, resolved.clone());
            }
            Err(_) => log::warn!("Metadata cache lock poisoned; not caching '{}'", name),
        }
        Ok(resolved)
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
    }
}

impl std::fmt::Debug for MetadataCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataCache")
            .field("catalog", &"Arc<dyn MetadataCatalog>")
            .field("entries", &self.len())
            .finish()
    }
}
