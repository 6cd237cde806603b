//! Attribute tables
//!
//! Movement parameter tables (foot march, vehicle) and the vegetation,
//! soils and roughness lookup tables are small lists of records. On disk
//! they are JSON arrays of flat objects:
//!
//! ```json
//! [
//!   {"visibility": "Day",   "maxmph": 5.0, "onslope": 15.0},
//!   {"visibility": "Night", "maxmph": 2.5, "onslope": 10.0}
//! ]
//! ```

use crate::error::{Error, Result};
use crate::vector::{AttributeValue, FeatureCollection};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

/// One table row
pub type Record = HashMap<String, AttributeValue>;

/// A named list of records
#[derive(Debug, Clone, Default)]
pub struct AttributeTable {
    name: String,
    rows: Vec<Record>,
}

/// Outcome of [`AttributeTable::join_into`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JoinSummary {
    /// Features that found a table row
    pub matched: usize,
    /// Features whose key had no row (or no key at all)
    pub unmatched: usize,
}

impl AttributeTable {
    /// Create a table from records
    pub fn new(name: impl Into<String>, rows: Vec<Record>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }

    /// Read a JSON table; the table is named after the file stem
    pub fn read_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self::parse_json(name, &text)
    }

    /// Parse a JSON array of objects
    pub fn parse_json(name: impl Into<String>, text: &str) -> Result<Self> {
        let name = name.into();
        let root: Value = serde_json::from_str(text)
            .map_err(|e| Error::external("table decode", format!("{}: {}", name, e)))?;

        let items = root.as_array().ok_or_else(|| {
            Error::external("table decode", format!("{}: expected an array of records", name))
        })?;

        let rows = items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                let object = item.as_object().ok_or_else(|| {
                    Error::external("table decode", format!("{}: row {} is not an object", name, i))
                })?;
                Ok(object
                    .iter()
                    .map(|(k, v)| (k.clone(), AttributeValue::from(v)))
                    .collect::<Record>())
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { name, rows })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Whether any row carries `field`
    pub fn has_field(&self, field: &str) -> bool {
        self.rows.iter().any(|r| r.contains_key(field))
    }

    /// Rows satisfying `predicate`, in table order
    pub fn select<F>(&self, predicate: F) -> Vec<&Record>
    where
        F: Fn(&Record) -> bool,
    {
        self.rows.iter().filter(|r| predicate(r)).collect()
    }

    /// Read a required numeric field from a row of this table
    pub fn number(&self, row: &Record, field: &str) -> Result<f64> {
        row.get(field).and_then(AttributeValue::as_f64).ok_or_else(|| {
            Error::config(format!(
                "table '{}' has no numeric '{}' value in row {:?}",
                self.name, field, row
            ))
        })
    }

    /// Copy `fields` from this table onto each feature whose `key` matches.
    ///
    /// Keys are compared with [`AttributeValue::as_key`]. When the table holds
    /// several rows for one key, the first row wins. Features without a
    /// matching row are left untouched.
    pub fn join_into(
        &self,
        features: &mut FeatureCollection,
        key: &str,
        fields: &[&str],
    ) -> Result<JoinSummary> {
        if !self.has_field(key) {
            return Err(Error::external(
                "join",
                format!("table '{}' has no key field '{}'", self.name, key),
            ));
        }

        let mut index: HashMap<String, &Record> = HashMap::new();
        for row in &self.rows {
            if let Some(k) = row.get(key).and_then(AttributeValue::as_key) {
                index.entry(k).or_insert(row);
            }
        }

        let mut summary = JoinSummary::default();
        for feature in features.iter_mut() {
            let row = feature
                .get_property(key)
                .and_then(AttributeValue::as_key)
                .and_then(|k| index.get(&k));

            match row {
                Some(row) => {
                    for field in fields {
                        if let Some(value) = row.get(*field) {
                            feature.set_property(*field, value.clone());
                        }
                    }
                    summary.matched += 1;
                }
                None => summary.unmatched += 1,
            }
        }

        Ok(summary)
    }
}
