//! Schema definitions
//!
//! A schema is an ordered list of uniquely named, typed fields. Schemas
//! describe the records a source delivers and the records a transformation
//! must produce.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::value::FieldType;

/// A named, typed field
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Field {
    pub name: String,

    #[serde(rename = "type")]
    pub field_type: FieldType,

    /// Whether null is an acceptable value for this field
    #[serde(default)]
    pub nullable: bool,
}

impl Field {
    /// Create a non-nullable field
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            nullable: false,
        }
    }

    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }
}

/// How validation treats fields a schema does not declare
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExtraFieldPolicy {
    /// Drop undeclared fields silently
    Ignore,
    /// Fail validation, listing the undeclared fields
    #[default]
    Reject,
}

/// Ordered collection of uniquely named fields
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "Vec<Field>", into = "Vec<Field>")]
pub struct Schema {
    fields: Vec<Field>,
    index: HashMap<String, usize, ahash::RandomState>,
}

impl Schema {
    /// Create a schema, rejecting duplicate field names
    pub fn new(fields: Vec<Field>) -> Result<Self> {
        let mut index = HashMap::with_capacity_and_hasher(fields.len(), ahash::RandomState::new());
        for (i, field) in fields.iter().enumerate() {
            if index.insert(field.name.clone(), i).is_some() {
                return Err(Error::DuplicateName {
                    kind: "field",
                    name: field.name.clone(),
                });
            }
        }
        Ok(Self { fields, index })
    }

    /// Create a schema of non-nullable fields from `(name, type)` pairs
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, FieldType)>,
        S: Into<String>,
    {
        Self::new(pairs.into_iter().map(|(n, t)| Field::new(n, t)).collect())
    }

    #[inline]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    #[inline]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.index_of(name).map(|i| &self.fields[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Copy of this schema with every field nullable.
    ///
    /// Precomputed sources use this shape: a join key without history
    /// resolves to a record of nulls.
    #[must_use]
    pub fn to_nullable(&self) -> Schema {
        Schema {
            fields: self.fields.iter().cloned().map(Field::nullable).collect(),
            index: self.index.clone(),
        }
    }

    /// Fields renamed to `<prefix>.<name>`
    pub fn qualified(&self, prefix: &str) -> Vec<Field> {
        self.fields
            .iter()
            .map(|f| Field {
                name: format!("{}.{}", prefix, f.name),
                field_type: f.field_type,
                nullable: f.nullable,
            })
            .collect()
    }

    /// Append fields, rejecting names already present
    pub fn extend(&self, extra: Vec<Field>) -> Result<Schema> {
        let mut fields = self.fields.clone();
        fields.extend(extra);
        Schema::new(fields)
    }
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.fields == other.fields
    }
}

impl TryFrom<Vec<Field>> for Schema {
    type Error = Error;

    fn try_from(fields: Vec<Field>) -> Result<Self> {
        Schema::new(fields)
    }
}

impl From<Schema> for Vec<Field> {
    fn from(schema: Schema) -> Self {
        schema.fields
    }
}
