//! Feature services
//!
//! A feature service bundles feature views behind one entry point and
//! merges their outputs into a single flat vector. Evaluation is
//! all-or-nothing: a failing view fails the whole call.

use featx_core::{Error, ExtraFieldPolicy, Field, JoinKeys, LookupTime, Record, Result, Row, Schema, Table, Value};
use futures_util::future::try_join_all;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::ServingOptions;
use crate::source::Source;
use crate::view::{resolve_events, resolve_sources, undeclared_request_fields, FeatureView, FeatureViewInfo};

/// Merged output of a feature service, keyed `<view>.<field>`, in view
/// then field order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeatureVector {
    entries: Vec<(String, Value)>,
}

impl FeatureVector {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    fn extend_from(&mut self, view: &str, record: Record) {
        let names: Vec<String> = record.schema().names().map(|n| format!("{}.{}", view, n)).collect();
        self.entries.extend(names.into_iter().zip(record.into_values()));
    }
}

impl Serialize for FeatureVector {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

#[derive(Debug)]
pub struct FeatureService {
    name: String,
    views: Vec<Arc<FeatureView>>,
    output: Arc<Schema>,
    request: Arc<Schema>,
    extra_fields: ExtraFieldPolicy,
    timestamp_field: String,
}

impl FeatureService {
    /// Views must already be deduplicated by name
    pub(crate) fn new(
        name: String,
        views: Vec<Arc<FeatureView>>,
        extra_fields: ExtraFieldPolicy,
        timestamp_field: String,
    ) -> Result<Self> {
        let output = Schema::new(
            views
                .iter()
                .flat_map(|v| v.output_schema().qualified(v.name()))
                .collect(),
        )?;

        let mut request_fields: Vec<Field> = Vec::new();
        for source in views.iter().flat_map(|v| v.request_sources()) {
            for field in source.schema().fields() {
                match request_fields.iter().find(|f| f.name == field.name) {
                    None => request_fields.push(field.clone()),
                    Some(existing) if existing.field_type == field.field_type => {}
                    Some(existing) => {
                        return Err(Error::InvalidConfig(format!(
                            "feature service '{}': request field '{}' is declared as both {} and {}",
                            name, field.name, existing.field_type, field.field_type
                        )))
                    }
                }
            }
        }

        Ok(Self {
            name,
            views,
            output: Arc::new(output),
            request: Arc::new(Schema::new(request_fields)?),
            extra_fields,
            timestamp_field,
        })
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn views(&self) -> &[Arc<FeatureView>] {
        &self.views
    }

    /// Qualified output fields, in vector order
    #[inline]
    pub fn output_schema(&self) -> &Arc<Schema> {
        &self.output
    }

    /// Union of the request fields every view needs
    #[inline]
    pub fn request_schema(&self) -> &Arc<Schema> {
        &self.request
    }

    fn precomputed_sources(&self) -> impl Iterator<Item = &Arc<Source>> {
        self.views.iter().flat_map(|v| v.precomputed_sources())
    }

    /// Join key names needed by the precomputed sources of all views
    pub fn join_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .precomputed_sources()
            .flat_map(|s| s.join_keys().iter().cloned())
            .collect();
        keys.sort();
        keys.dedup();
        keys
    }

    /// Decode a JSON request payload against the request schema.
    /// Absent fields are left to per-view validation.
    pub fn decode_request_data(&self, payload: &serde_json::Map<String, serde_json::Value>) -> Result<Row> {
        let mut row = Row::new();
        let mut mismatched = Vec::new();
        let mut unexpected = Vec::new();
        for (name, json) in payload {
            match self.request.field(name) {
                Some(field) => match Value::from_json(json, field.field_type) {
                    Some(value) => {
                        row.insert(name.clone(), value);
                    }
                    None => mismatched.push(featx_core::FieldMismatch {
                        field: name.clone(),
                        expected: field.field_type,
                        actual: json_kind(json).to_string(),
                    }),
                },
                None if self.extra_fields == ExtraFieldPolicy::Reject => unexpected.push(name.clone()),
                None => {}
            }
        }
        if mismatched.is_empty() && unexpected.is_empty() {
            return Ok(row);
        }
        unexpected.sort();
        Err(Error::SchemaMismatch {
            context: format!("request data for '{}'", self.name),
            missing: Vec::new(),
            mismatched,
            unexpected,
        })
    }

    /// Evaluate every view for one request and merge the outputs.
    ///
    /// The request payload is shared by all views. Each precomputed source is
    /// looked up once per call, so views reading the same source see the same
    /// record. Lookups run concurrently.
    pub async fn get_online_features(
        &self,
        join_keys: &JoinKeys,
        request_data: &Row,
        opts: &ServingOptions,
    ) -> Result<FeatureVector> {
        if self.extra_fields == ExtraFieldPolicy::Reject {
            let sources = self.views.iter().flat_map(|v| v.request_sources());
            let unexpected = undeclared_request_fields(request_data, sources);
            if !unexpected.is_empty() {
                return Err(Error::SchemaMismatch {
                    context: format!("request data for '{}'", self.name),
                    missing: Vec::new(),
                    mismatched: Vec::new(),
                    unexpected,
                });
            }
        }

        debug!(service = %self.name, views = self.views.len(), "serving online features");
        let evaluate = async {
            let resolved = resolve_sources(self.precomputed_sources(), join_keys, LookupTime::Latest, opts).await?;
            let mut vector = FeatureVector::default();
            for view in &self.views {
                vector.extend_from(view.name(), view.online_from(request_data, &resolved)?);
            }
            Ok::<_, Error>(vector)
        };
        evaluate.await.map_err(|e| {
            warn!(service = %self.name, error = %e, "online evaluation failed");
            e
        })
    }

    /// Append every view's outputs to the events table as qualified columns.
    /// Any failure fails the whole call.
    pub async fn get_features_for_events(&self, events: &Table, opts: &ServingOptions) -> Result<Table> {
        for view in &self.views {
            view.check_events_schema(events.schema())?;
        }
        debug!(service = %self.name, rows = events.len(), "building training rows");
        let resolved = resolve_events(self.precomputed_sources(), events, &self.timestamp_field, opts).await?;
        let per_view = try_join_all(self.views.iter().map(|view| view.batch_from(events, &resolved))).await?;

        let mut columns: Vec<Vec<Value>> = vec![Vec::with_capacity(self.output.len()); events.len()];
        for outputs in per_view {
            for (row, record) in columns.iter_mut().zip(outputs) {
                row.extend(record.into_values());
            }
        }
        events.with_columns(self.output.fields().to_vec(), columns)
    }

    pub fn info(&self) -> FeatureServiceInfo {
        FeatureServiceInfo {
            name: self.name.clone(),
            feature_views: self.views.iter().map(|v| FeatureViewInfo::from(v.as_ref())).collect(),
            join_keys: self.join_keys(),
            request_schema: self.request.as_ref().clone(),
            output_schema: self.output.as_ref().clone(),
        }
    }
}

/// Description of a service for listings
#[derive(Debug, Clone, Serialize)]
pub struct FeatureServiceInfo {
    pub name: String,
    pub feature_views: Vec<FeatureViewInfo>,
    pub join_keys: Vec<String>,
    pub request_schema: Schema,
    pub output_schema: Schema,
}

fn json_kind(json: &serde_json::Value) -> &'static str {
    match json {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
