use std::collections::btree_map;
use std::collections::BTreeMap;

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use super::types::SchemaError;

/// One observation: column name → value.
///
/// Columns are kept sorted so rows print and compare deterministically.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow(BTreeMap<String, f64>);

impl FeatureRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a column, returning the previous value if there was one.
    pub fn insert(&mut self, column: impl Into<String>, value: f64) -> Option<f64> {
        self.0.insert(column.into(), value)
    }

    /// Builder-style `insert`.
    pub fn with(mut self, column: impl Into<String>, value: f64) -> Self {
        self.insert(column, value);
        self
    }

    pub fn get(&self, column: &str) -> Option<f64> {
        self.0.get(column).copied()
    }

    pub fn remove(&mut self, column: &str) -> Option<f64> {
        self.0.remove(column)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, f64> {
        self.0.iter()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Values laid out in `schema` order.
    ///
    /// The row must hold exactly the schema's columns: anything missing or
    /// extra is reported in one `SchemaError`.
    pub fn ordered_values(&self, schema: &[String]) -> Result<Array1<f64>, SchemaError> {
        let missing: Vec<String> = schema
            .iter()
            .filter(|column| !self.0.contains_key(column.as_str()))
            .cloned()
            .collect();
        let unexpected: Vec<String> = self
            .0
            .keys()
            .filter(|column| !schema.contains(column))
            .cloned()
            .collect();

        if !missing.is_empty() || !unexpected.is_empty() {
            return Err(SchemaError { missing, unexpected });
        }

        Ok(schema.iter().map(|column| self.0[column.as_str()]).collect())
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for FeatureRow {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl<'a> IntoIterator for &'a FeatureRow {
    type Item = (&'a String, &'a f64);
    type IntoIter = btree_map::Iter<'a, String, f64>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
