//! Composite (record) variable storage.
//!
//! A record variable holds a set of rows indexed by the value of the first
//! column. The first inserted row fixes the arity; column kinds lock lazily
//! on the first non-null value seen per column, and `Null` matches any
//! locked kind. A single null key slot is allowed, like any other key.

use rustc_hash::FxHashMap;
use satchel_core::{Error, Result, Value, ValueKind};

/// Row shape of a record variable: arity plus lazily locked column kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSchema {
    columns: Vec<Option<ValueKind>>,
}

impl RecordSchema {
    fn new(arity: usize) -> Self {
        RecordSchema {
            columns: vec![None; arity],
        }
    }

    /// Number of columns.
    pub fn arity(&self) -> usize {
        self.columns.len()
    }

    /// Locked kind of a column, if any non-null value has been seen for it.
    pub fn column_kind(&self, index: usize) -> Option<ValueKind> {
        self.columns.get(index).copied().flatten()
    }

    /// Check a row against the schema, locking still-open column kinds.
    fn admit_row(&mut self, name: &str, row: &[Value]) -> Result<()> {
        if row.len() != self.arity() {
            return Err(Error::InvalidArgument(format!(
                "record for variable \"{name}\" has {} columns, expected {}",
                row.len(),
                self.arity()
            )));
        }
        for (slot, value) in self.columns.iter_mut().zip(row) {
            if value.is_null() {
                continue;
            }
            match slot {
                Some(kind) if *kind != value.kind() => {
                    return Err(Error::TypeMismatch {
                        name: name.to_string(),
                        declared: *kind,
                    });
                }
                Some(_) => {}
                None => *slot = Some(value.kind()),
            }
        }
        Ok(())
    }
}

/// Row set keyed by the first column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordTable {
    schema: Option<RecordSchema>,
    rows: FxHashMap<Value, Vec<Value>>,
}

impl RecordTable {
    /// New empty table; the schema is fixed by the first insert.
    pub fn new() -> Self {
        RecordTable::default()
    }

    /// Row shape, if any row has been inserted yet.
    pub fn schema(&self) -> Option<&RecordSchema> {
        self.schema.as_ref()
    }

    /// Number of live rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table holds no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Insert a row. Fails on an empty row, a schema conflict, or a
    /// duplicate key; nothing is stored on failure.
    pub fn insert(&mut self, name: &str, row: Vec<Value>) -> Result<()> {
        if row.is_empty() {
            return Err(Error::InvalidArgument(format!(
                "record for variable \"{name}\" must have at least one column"
            )));
        }
        let schema = self
            .schema
            .get_or_insert_with(|| RecordSchema::new(row.len()));
        schema.admit_row(name, &row)?;

        let key = row[0].clone();
        if self.rows.contains_key(&key) {
            return Err(Error::InvalidArgument(format!(
                "record with the same key already exists in variable \"{name}\""
            )));
        }
        self.rows.insert(key, row);
        Ok(())
    }

    /// Replace the row with the same key. Returns whether a row was
    /// replaced; an unknown key is not an error.
    pub fn update(&mut self, name: &str, row: Vec<Value>) -> Result<bool> {
        if row.is_empty() {
            return Err(Error::InvalidArgument(format!(
                "record for variable \"{name}\" must have at least one column"
            )));
        }
        let schema = self
            .schema
            .get_or_insert_with(|| RecordSchema::new(row.len()));
        schema.admit_row(name, &row)?;

        let key = row[0].clone();
        match self.rows.get_mut(&key) {
            Some(existing) => {
                *existing = row;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Remove the row with this key. Returns whether a row existed.
    pub fn remove(&mut self, key: &Value) -> bool {
        self.rows.remove(key).is_some()
    }

    /// Row with this key, if any.
    pub fn get(&self, key: &Value) -> Option<&[Value]> {
        self.rows.get(key).map(Vec::as_slice)
    }

    /// Iterate all rows in unspecified order.
    pub fn rows(&self) -> impl Iterator<Item = &[Value]> {
        self.rows.values().map(Vec::as_slice)
    }

    /// Check a key value against the locked kind of the key column.
    ///
    /// Null keys and a still-open key column are accepted.
    pub fn check_key(&self, name: &str, key: &Value) -> Result<()> {
        if key.is_null() {
            return Ok(());
        }
        if let Some(declared) = self.schema.as_ref().and_then(|s| s.column_kind(0)) {
            if declared != key.kind() {
                return Err(Error::TypeMismatch {
                    name: name.to_string(),
                    declared,
                });
            }
        }
        Ok(())
    }

    /// Approximate bytes retained by all rows (keys included).
    pub fn retained_bytes(&self) -> usize {
        self.rows
            .iter()
            .map(|(key, row)| {
                key.retained_bytes() + row.iter().map(Value::retained_bytes).sum::<usize>()
            })
            .sum()
    }
}
