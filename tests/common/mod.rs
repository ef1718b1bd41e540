#![allow(dead_code)]

pub mod fixtures;

use std::sync::Arc;
use xqdoc::{
    ExecutionConfig, InMemoryCatalog, MetadataCache, RowTuple, SourceError, StaticDataSource,
    compile,
};

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

pub const DECL: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn catalog() -> Arc<InMemoryCatalog> {
    Arc::new(
        InMemoryCatalog::from_json(&fixtures::catalog_json())
            .expect("catalog fixture should be valid"),
    )
}

pub fn cache() -> MetadataCache {
    MetadataCache::new(catalog())
}

pub fn source() -> StaticDataSource {
    StaticDataSource::from_json(&fixtures::data_json()).expect("data fixture should be valid")
}

/// The fixture data plus orders computed from the enclosing customer row.
pub fn source_with_orders() -> StaticDataSource {
    source().with_responder("SELECT id, total FROM orders", |request| {
        let customer = request
            .parameter("c")
            .and_then(|row| row.get("id"))
            .ok_or_else(|| SourceError::Execution("orders need a customer".into()))?;
        Ok((1..=2)
            .map(|n| {
                RowTuple::new()
                    .with("id", format!("{}-o{}", customer, n))
                    .with("total", format!("{}", n * 10))
            })
            .collect())
    })
}

/// Compiles against the fixture catalog and runs with the default config.
pub fn render(template: &str, source: &StaticDataSource) -> Result<String, xqdoc::Error> {
    let document = compile(template, &cache())?;
    Ok(document.execute(source, &ExecutionConfig::default())?)
}

/// Asserts that `xml` parses and returns the root element's name.
pub fn assert_well_formed(xml: &str) -> String {
    let doc = roxmltree::Document::parse(xml).expect("output should be well-formed XML");
    doc.root_element().tag_name().name().to_string()
}
