use std::env;
use std::fs;
use std::sync::Arc;
use xqdoc::{Error, ExecutionConfig, InMemoryCatalog, MetadataCache, StaticDataSource, compile};

/// Renders a template against JSON fixtures and prints the XML.
fn main() -> Result<(), Error> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if !(4..=5).contains(&args.len()) {
        eprintln!("Renders an XQuery-style document template to XML.");
        eprintln!();
        eprintln!(
            "Usage: {} <template.xq> <catalog.json> <data.json> [config.json]",
            args.first().map(String::as_str).unwrap_or("xqdoc")
        );
        eprintln!();
        eprintln!("  catalog.json  {{\"Name\": {{\"columns\": [...], \"query\": \"SELECT ...\"}}}}");
        eprintln!("  data.json     {{\"SELECT ...\": [{{\"column\": \"value\"}}, ...]}}");
        eprintln!("  config.json   {{\"bareVariable\": \"coerceToText\", \"strict\": true}}");
        std::process::exit(1);
    }

    log::info!("Loading template from {}", args[1]);
    let template = fs::read_to_string(&args[1])?;

    log::info!("Loading catalog from {}", args[2]);
    let catalog: serde_json::Value = serde_json::from_str(&fs::read_to_string(&args[2])?)?;
    let cache = MetadataCache::new(Arc::new(InMemoryCatalog::from_json(&catalog)?));

    log::info!("Loading data from {}", args[3]);
    let data: serde_json::Value = serde_json::from_str(&fs::read_to_string(&args[3])?)?;
    let source = StaticDataSource::from_json(&data)?;

    let config: ExecutionConfig = match args.get(4) {
        Some(path) => serde_json::from_str(&fs::read_to_string(path)?)?,
        None => ExecutionConfig::default(),
    };

    let document = compile(&template, &cache)?;
    log::info!("Compiled template with {} plan(s)", document.plan_count());

    let xml = document.execute(&source, &config)?;
    println!("{}", xml);
    Ok(())
}
