//! Sources and entities
//!
//! A source names a schema and says where its values come from: the live
//! request, or a precomputed store read by join key.

use featx_core::{
    Error, FeatureLookup, JoinKeys, LookupTime, Record, RecordBuilder, Result, Row, Schema,
};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Where a source's values come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Request,
    Precomputed,
}

pub(crate) enum Provenance {
    Request,
    Precomputed {
        join_keys: Vec<String>,
        lookup: Arc<dyn FeatureLookup>,
    },
}

impl fmt::Debug for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provenance::Request => f.write_str("Request"),
            Provenance::Precomputed { join_keys, .. } => f
                .debug_struct("Precomputed")
                .field("join_keys", join_keys)
                .finish_non_exhaustive(),
        }
    }
}

/// A declared input to feature views
#[derive(Debug)]
pub struct Source {
    name: String,
    schema: Arc<Schema>,
    provenance: Provenance,
}

impl Source {
    pub(crate) fn request(name: String, schema: Schema) -> Self {
        Self {
            name,
            schema: Arc::new(schema),
            provenance: Provenance::Request,
        }
    }

    /// Precomputed sources always use a nullable schema so that a join key
    /// without history can resolve to a record of nulls.
    pub(crate) fn precomputed(
        name: String,
        schema: Schema,
        join_keys: Vec<String>,
        lookup: Arc<dyn FeatureLookup>,
    ) -> Self {
        Self {
            name,
            schema: Arc::new(schema.to_nullable()),
            provenance: Provenance::Precomputed { join_keys, lookup },
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn kind(&self) -> SourceKind {
        match self.provenance {
            Provenance::Request => SourceKind::Request,
            Provenance::Precomputed { .. } => SourceKind::Precomputed,
        }
    }

    #[inline]
    pub fn is_request(&self) -> bool {
        self.kind() == SourceKind::Request
    }

    /// Join keys a precomputed source is read by; empty for request sources
    pub fn join_keys(&self) -> &[String] {
        match &self.provenance {
            Provenance::Request => &[],
            Provenance::Precomputed { join_keys, .. } => join_keys,
        }
    }

    /// The subset of `keys` this source is read by
    pub fn select_keys(&self, keys: &JoinKeys) -> Result<JoinKeys> {
        let mut selected = JoinKeys::new();
        let mut missing = Vec::new();
        for key in self.join_keys() {
            match keys.get(key) {
                Some(v) => {
                    selected.insert(key.clone(), v.clone());
                }
                None => missing.push(key.clone()),
            }
        }
        if !missing.is_empty() {
            return Err(Error::SchemaMismatch {
                context: format!("join keys for source '{}'", self.name),
                missing,
                mismatched: Vec::new(),
                unexpected: Vec::new(),
            });
        }
        Ok(selected)
    }

    /// Record for a request source, taking only the declared fields from a
    /// payload that may be shared with other sources
    pub fn request_record(&self, payload: &Row) -> Result<Record> {
        Record::project(self.schema.clone(), payload, &format!("request source '{}'", self.name))
    }

    /// Same as [`request_record`](Self::request_record) but reading from an
    /// event row
    pub fn record_from_event(&self, event: &Record) -> Result<Record> {
        let mut builder = RecordBuilder::new(self.schema.clone())
            .context(format!("event fields for source '{}'", self.name));
        for field in self.schema.fields() {
            if let Some(value) = event.get(&field.name) {
                builder = builder.set(field.name.clone(), value.clone());
            }
        }
        builder.build()
    }

    /// Resolve a precomputed source through its lookup, bounded by `timeout`.
    ///
    /// No history yields a record of nulls.
    pub async fn resolve(&self, keys: &JoinKeys, at: LookupTime, timeout: Duration) -> Result<Record> {
        let lookup = match &self.provenance {
            Provenance::Precomputed { lookup, .. } => lookup,
            Provenance::Request => {
                return Err(Error::InvalidConfig(format!(
                    "request source '{}' cannot be looked up",
                    self.name
                )))
            }
        };
        let keys = self.select_keys(keys)?;
        let context = format!("precomputed source '{}'", self.name);

        match tokio::time::timeout(timeout, lookup.lookup(&self.name, &keys, at)).await {
            Err(_) => {
                warn!(source = %self.name, ?keys, %at, ?timeout, "lookup timed out");
                Err(Error::LookupTimeout {
                    source_name: self.name.clone(),
                    timeout,
                })
            }
            Ok(Err(e)) => Err(e),
            Ok(Ok(None)) => Record::nulls(self.schema.clone(), &context),
            Ok(Ok(Some(row))) => Record::project(self.schema.clone(), &row, &context),
        }
    }
}

/// A named entity and the join keys that identify it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entity {
    pub name: String,
    pub join_keys: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Entity {
    pub fn new(name: impl Into<String>, join_keys: Vec<String>) -> Self {
        Self {
            name: name.into(),
            join_keys,
            description: None,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}
