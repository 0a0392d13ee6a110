/// Row Module
///
/// Result rows as ordered column-name to value mappings.

use super::value::SqlValue;

/// One result row. Columns keep the order the statement produced them in.
///
/// When several columns share a name, lookups by name see the last one, as
/// the JSON rendering does; `iter` and `into_pairs` still expose all of them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    columns: Vec<(String, SqlValue)>,
}

impl Row {
    pub fn new(columns: Vec<(String, SqlValue)>) -> Self {
        Row { columns }
    }

    /// Reads the current row of a driver cursor
    pub(crate) fn from_driver(names: &[String], row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        let mut columns = Vec::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            columns.push((name.clone(), SqlValue::from_value_ref(row.get_ref(i)?)));
        }
        Ok(Row { columns })
    }

    /// Value of the last column named `column`.
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .rev()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn get_i64(&self, column: &str) -> Option<i64> {
        self.get(column).and_then(SqlValue::as_i64)
    }

    pub fn get_str(&self, column: &str) -> Option<&str> {
        self.get(column).and_then(SqlValue::as_str)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &SqlValue> {
        self.columns.iter().map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn into_pairs(self) -> Vec<(String, SqlValue)> {
        self.columns
    }

    /// Renders the row as a JSON object, last value winning for duplicate
    /// column names.
    pub fn to_json(&self) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> = self
            .columns
            .iter()
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect();
        serde_json::Value::Object(map)
    }
}
