use serde_json::{Value, json};

/// Virtual documents used across the integration tests.
pub fn catalog_json() -> Value {
    json!({
        "A": { "columns": ["value"], "query": "SELECT value FROM a" },
        "B": { "columns": ["value"], "query": "SELECT value FROM b" },
        "Customers": { "columns": ["id", "name"], "query": "SELECT id, name FROM customers" },
        "Orders": { "columns": ["id", "total"], "query": "SELECT id, total FROM orders" },
        "Empty": { "columns": ["value"], "query": "SELECT value FROM empty" }
    })
}

/// Rows keyed by the statement the data source is asked to run.
pub fn data_json() -> Value {
    json!({
        "SELECT value FROM a": ["Lamp", "Screwdriver", "Goat"],
        "SELECT value FROM b": ["Chair", "Desk"],
        "SELECT id, name FROM customers": [
            { "id": "c1", "name": "Ada" },
            { "id": "c2", "name": "Grace" }
        ],
        "SELECT value FROM empty": [],
        "SELECT 1 AS one": [{ "one": 1 }],
        "SELECT broken": { "error": "relation \"broken\" does not exist" }
    })
}

/// `{for $var in doc("source") return <Item>{$var/text()}</Item>}`
pub fn item_block(var: &str, source: &str) -> String {
    format!(r#"{{for ${var} in doc("{source}") return <Item>{{${var}/text()}}</Item>}}"#)
}

/// `<Items>` wrapping one item block per source, in order.
pub fn items_template(sources: &[&str]) -> String {
    let blocks: String = sources
        .iter()
        .enumerate()
        .map(|(i, source)| item_block(&format!("x{}", i), source))
        .collect();
    format!("<Items>{}</Items>", blocks)
}
