//! Row tables
//!
//! A [`Table`] is a schema plus rows that all conform to it. Historical
//! event tables go in, and augmented tables with feature columns come out.

use serde::{Serialize, Serializer};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::record::{Record, Row};
use crate::schema::{ExtraFieldPolicy, Field, Schema};
use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    schema: Arc<Schema>,
    rows: Vec<Record>,
}

impl Table {
    pub fn new(schema: Arc<Schema>) -> Self {
        Self {
            schema,
            rows: Vec::new(),
        }
    }

    /// Build a table from loose rows, validating each one
    pub fn from_rows(schema: Arc<Schema>, rows: Vec<Row>, policy: ExtraFieldPolicy) -> Result<Self> {
        let rows = rows
            .into_iter()
            .enumerate()
            .map(|(i, row)| Record::from_row(schema.clone(), row, policy, &format!("row {}", i)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { schema, rows })
    }

    /// Decode a JSON array of objects
    pub fn from_json(schema: Arc<Schema>, rows: &[serde_json::Value], policy: ExtraFieldPolicy) -> Result<Self> {
        let mut table = Table::new(schema.clone());
        for (i, row) in rows.iter().enumerate() {
            let object = row
                .as_object()
                .ok_or_else(|| Error::Serialization(format!("row {} is not an object", i)))?;
            table
                .rows
                .push(Record::from_json(schema.clone(), object, policy, &format!("row {}", i))?);
        }
        Ok(table)
    }

    /// Append a record; it must carry this table's schema
    pub fn push(&mut self, record: Record) -> Result<()> {
        if record.schema().as_ref() != self.schema.as_ref() {
            let missing = self
                .schema
                .names()
                .filter(|n| !record.schema().contains(n))
                .map(str::to_string)
                .collect();
            let unexpected = record
                .schema()
                .names()
                .filter(|n| !self.schema.contains(n))
                .map(str::to_string)
                .collect();
            return Err(Error::SchemaMismatch {
                context: format!("row {}", self.rows.len()),
                missing,
                mismatched: Vec::new(),
                unexpected,
            });
        }
        self.rows.push(record);
        Ok(())
    }

    #[inline]
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    #[inline]
    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// All values of one column, in row order
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let i = self.schema.index_of(name)?;
        Some(self.rows.iter().map(|r| &r.values()[i]).collect())
    }

    /// New table with extra columns appended to every row.
    ///
    /// `columns[i]` holds the values for row `i`, in the order of `fields`.
    pub fn with_columns(&self, fields: Vec<Field>, columns: Vec<Vec<Value>>) -> Result<Table> {
        if columns.len() != self.rows.len() {
            return Err(Error::InvalidConfig(format!(
                "expected {} rows of appended values, got {}",
                self.rows.len(),
                columns.len()
            )));
        }
        let schema = Arc::new(self.schema.extend(fields)?);
        let rows = self
            .rows
            .iter()
            .zip(columns)
            .enumerate()
            .map(|(i, (row, extra))| {
                let mut builder = crate::record::RecordBuilder::new(schema.clone())
                    .context(format!("row {}", i));
                for (name, value) in row.iter() {
                    builder = builder.set(name, value.clone());
                }
                for (field, value) in schema.fields()[row.values().len()..].iter().zip(extra) {
                    builder = builder.set(field.name.clone(), value);
                }
                builder.build()
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Table { schema, rows })
    }
}

impl Serialize for Table {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.rows.iter())
    }
}
