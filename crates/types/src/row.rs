use serde::{Deserialize, Serialize};

/// One named scalar value of a row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub value: String,
}

/// One fetched record: an ordered list of named scalar text values.
///
/// Column order is the order the data source produced them in. Duplicate
/// names are allowed here; projecting a duplicated name is an ambiguity the
/// path evaluator reports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowTuple {
    columns: Vec<Column>,
}

impl RowTuple {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style append of a column.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(name, value);
        self
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.columns.push(Column {
            name: name.into(),
            value: value.into(),
        });
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// All values stored under `name`, in column order.
    pub fn values_named<'r>(&'r self, name: &str) -> impl Iterator<Item = &'r str> {
        self.columns
            .iter()
            .filter(move |c| c.name == name)
            .map(|c| c.value.as_str())
    }

    /// The first value stored under `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values_named(name).next()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }
}

impl<K, V> FromIterator<(K, V)> for RowTuple
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut row = RowTuple::new();
        for (name, value) in iter {
            row.push(name, value);
        }
        row
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_preserves_column_order() {
        let row = RowTuple::new().with("b", "2").with("a", "1");
        let names: Vec<_> = row.column_names().collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(row.get("a"), Some("1"));
        assert_eq!(row.get("missing"), None);
    }

    #[test]
    fn test_duplicate_columns_are_kept() {
        let row: RowTuple = [("name", "Lamp"), ("name", "Goat")].into_iter().collect();
        assert_eq!(row.len(), 2);
        let values: Vec<_> = row.values_named("name").collect();
        assert_eq!(values, vec!["Lamp", "Goat"]);
    }

    #[test]
    fn test_row_serializes_as_column_list() {
        let row = RowTuple::new().with("id", "7");
        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(json, r#"[{"name":"id","value":"7"}]"#);
        let back: RowTuple = serde_json::from_str(&json).unwrap();
        assert_eq!(back, row);
    }
}
