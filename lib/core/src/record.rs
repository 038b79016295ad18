//! Schema-bound records
//!
//! A [`Record`] always satisfies its schema: it can only be obtained through
//! [`RecordBuilder::build`] or the validating constructors below, so field
//! access never needs to re-check shape.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::{Error, FieldMismatch, Result};
use crate::schema::{ExtraFieldPolicy, Schema};
use crate::value::Value;

/// Loosely shaped name → value mapping, as produced by transformations and
/// lookup backends before validation
pub type Row = HashMap<String, Value>;

/// A validated record
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    schema: Arc<Schema>,
    values: Vec<Value>,
}

impl Record {
    /// A record with every field null. Fails unless all fields are nullable.
    pub fn nulls(schema: Arc<Schema>, context: &str) -> Result<Self> {
        RecordBuilder::new(schema)
            .context(context)
            .fill_nulls()
            .build()
    }

    /// Validate a row against a schema
    pub fn from_row(
        schema: Arc<Schema>,
        row: Row,
        policy: ExtraFieldPolicy,
        context: &str,
    ) -> Result<Self> {
        let mut builder = RecordBuilder::new(schema).context(context).policy(policy);
        for (name, value) in row {
            builder = builder.set(name, value);
        }
        builder.build()
    }

    /// Validate a row, keeping only the fields the schema declares
    pub fn project(schema: Arc<Schema>, row: &Row, context: &str) -> Result<Self> {
        let mut builder = RecordBuilder::new(schema.clone()).context(context);
        for field in schema.fields() {
            if let Some(value) = row.get(&field.name) {
                builder = builder.set(field.name.clone(), value.clone());
            }
        }
        builder.build()
    }

    /// Decode a JSON object against a schema
    pub fn from_json(
        schema: Arc<Schema>,
        object: &serde_json::Map<String, serde_json::Value>,
        policy: ExtraFieldPolicy,
        context: &str,
    ) -> Result<Self> {
        let mut builder = RecordBuilder::new(schema.clone()).context(context).policy(policy);
        for (name, json) in object {
            match schema.field(name) {
                Some(field) => match Value::from_json(json, field.field_type) {
                    Some(value) => builder = builder.set(name.clone(), value),
                    None => builder = builder.mismatch(name, json_type_name(json)),
                },
                None => builder = builder.set(name.clone(), Value::Null),
            }
        }
        builder.build()
    }

    #[inline]
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    #[inline]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.schema.index_of(name).map(|i| &self.values[i])
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_i64)
    }

    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Value::as_f64)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(Value::as_bool)
    }

    pub fn get_timestamp(&self, name: &str) -> Option<DateTime<Utc>> {
        self.get(name).and_then(Value::as_timestamp)
    }

    /// Iterate `(name, value)` pairs in schema order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.schema.names().zip(self.values.iter())
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    pub fn to_row(&self) -> Row {
        self.iter().map(|(n, v)| (n.to_string(), v.clone())).collect()
    }

    pub fn to_json(&self) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> = self
            .iter()
            .map(|(n, v)| (n.to_string(), v.to_json()))
            .collect();
        serde_json::Value::Object(map)
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, value) in self.iter() {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Builds a [`Record`], validating on [`build`](RecordBuilder::build)
#[derive(Debug)]
pub struct RecordBuilder {
    schema: Arc<Schema>,
    values: Vec<Option<Value>>,
    mismatched: Vec<FieldMismatch>,
    unexpected: Vec<String>,
    policy: ExtraFieldPolicy,
    context: String,
}

impl RecordBuilder {
    pub fn new(schema: Arc<Schema>) -> Self {
        let len = schema.len();
        Self {
            schema,
            values: vec![None; len],
            mismatched: Vec::new(),
            unexpected: Vec::new(),
            policy: ExtraFieldPolicy::Reject,
            context: "record".to_string(),
        }
    }

    /// Label used in validation errors, e.g. the source name
    #[must_use]
    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    #[must_use]
    pub fn policy(mut self, policy: ExtraFieldPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn set(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let name = name.into();
        let value = value.into();
        match self.schema.index_of(&name) {
            Some(i) => {
                let field = &self.schema.fields()[i];
                let fits = match value.field_type() {
                    None => field.nullable,
                    Some(t) => t == field.field_type,
                };
                if fits {
                    self.values[i] = Some(value);
                } else {
                    self.mismatched.push(FieldMismatch {
                        field: name,
                        expected: field.field_type,
                        actual: value.type_name().to_string(),
                    });
                }
            }
            None => {
                if self.policy == ExtraFieldPolicy::Reject {
                    self.unexpected.push(name);
                }
            }
        }
        self
    }

    fn mismatch(mut self, name: &str, actual: &str) -> Self {
        if let Some(field) = self.schema.field(name) {
            self.mismatched.push(FieldMismatch {
                field: name.to_string(),
                expected: field.field_type,
                actual: actual.to_string(),
            });
        }
        self
    }

    fn fill_nulls(mut self) -> Self {
        for (field, slot) in self.schema.fields().iter().zip(self.values.iter_mut()) {
            if slot.is_some() {
                continue;
            }
            if field.nullable {
                *slot = Some(Value::Null);
            } else {
                self.mismatched.push(FieldMismatch {
                    field: field.name.clone(),
                    expected: field.field_type,
                    actual: "null".to_string(),
                });
            }
        }
        self
    }

    pub fn build(self) -> Result<Record> {
        let mismatched_names: Vec<&str> = self.mismatched.iter().map(|m| m.field.as_str()).collect();
        let missing: Vec<String> = self
            .schema
            .fields()
            .iter()
            .zip(self.values.iter())
            .filter(|(f, v)| v.is_none() && !mismatched_names.contains(&f.name.as_str()))
            .map(|(f, _)| f.name.clone())
            .collect();

        if !missing.is_empty() || !self.mismatched.is_empty() || !self.unexpected.is_empty() {
            let mut unexpected = self.unexpected;
            unexpected.sort();
            return Err(Error::mismatch(self.context, missing, self.mismatched, unexpected));
        }

        Ok(Record {
            schema: self.schema,
            values: self.values.into_iter().flatten().collect(),
        })
    }
}

fn json_type_name(json: &serde_json::Value) -> &'static str {
    match json {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
