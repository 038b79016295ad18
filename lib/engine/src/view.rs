//! Feature views
//!
//! A feature view binds ordered sources to a transformation and an output
//! schema. Views are built with [`FeatureViewBuilder`] and declared through
//! the [`Registry`](crate::Registry); once declared they are immutable.

use featx_core::{
    Error, ExtraFieldPolicy, FieldType, JoinKeys, LookupTime, Record, Result, Row, Schema, Table,
};
use futures_util::future::try_join_all;
use futures_util::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;

use crate::config::ServingOptions;
use crate::executor::{ExecutionMode, Transformation, TransformInputs, TransformationExecutor};
use crate::source::{Source, SourceKind};

/// Declaration of a feature view, resolved by the registry
#[derive(Debug)]
pub struct FeatureViewBuilder {
    pub(crate) name: String,
    pub(crate) sources: Vec<String>,
    pub(crate) output: Option<Schema>,
    pub(crate) transformation: Option<Transformation>,
    pub(crate) passthrough: bool,
    pub(crate) description: Option<String>,
    pub(crate) tags: BTreeMap<String, String>,
}

impl FeatureViewBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sources: Vec::new(),
            output: None,
            transformation: None,
            passthrough: false,
            description: None,
            tags: BTreeMap::new(),
        }
    }

    /// View that serves one precomputed source's values unchanged
    pub fn passthrough(name: impl Into<String>, source: impl Into<String>) -> Self {
        let mut builder = Self::new(name);
        builder.sources.push(source.into());
        builder.passthrough = true;
        builder
    }

    /// Add a source; transformation inputs follow declaration order
    #[must_use]
    pub fn source(mut self, name: impl Into<String>) -> Self {
        self.sources.push(name.into());
        self
    }

    #[must_use]
    pub fn output(mut self, schema: Schema) -> Self {
        self.output = Some(schema);
        self
    }

    #[must_use]
    pub fn transform<F>(mut self, f: F) -> Self
    where
        F: Fn(&TransformInputs<'_>) -> std::result::Result<Row, featx_core::BoxError>
            + Send
            + Sync
            + 'static,
    {
        self.transformation = Some(Transformation::new(f));
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }
}

/// Settings a view copies from the engine config at declaration
#[derive(Debug, Clone)]
pub(crate) struct ViewSettings {
    pub extra_fields: ExtraFieldPolicy,
    pub timestamp_field: String,
}

#[derive(Debug)]
pub struct FeatureView {
    name: String,
    description: Option<String>,
    tags: BTreeMap<String, String>,
    sources: Vec<Arc<Source>>,
    executor: TransformationExecutor,
    settings: ViewSettings,
}

impl FeatureView {
    pub fn builder(name: impl Into<String>) -> FeatureViewBuilder {
        FeatureViewBuilder::new(name)
    }

    pub(crate) fn new(
        name: String,
        description: Option<String>,
        tags: BTreeMap<String, String>,
        sources: Vec<Arc<Source>>,
        output: Arc<Schema>,
        transformation: Transformation,
        settings: ViewSettings,
    ) -> Self {
        let executor = TransformationExecutor::new(name.clone(), output, transformation);
        Self {
            name,
            description,
            tags,
            sources,
            executor,
            settings,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    #[inline]
    pub fn sources(&self) -> &[Arc<Source>] {
        &self.sources
    }

    #[inline]
    pub fn output_schema(&self) -> &Arc<Schema> {
        self.executor.output_schema()
    }

    pub fn request_sources(&self) -> impl Iterator<Item = &Arc<Source>> {
        self.sources.iter().filter(|s| s.is_request())
    }

    pub fn precomputed_sources(&self) -> impl Iterator<Item = &Arc<Source>> {
        self.sources.iter().filter(|s| !s.is_request())
    }

    /// Execute once with literal inputs, one row per declared source
    pub fn run(&self, inputs: &HashMap<String, Row>) -> Result<Record> {
        self.check_input_names(inputs.keys().map(String::as_str))?;
        let records = self
            .sources
            .iter()
            .map(|source| {
                let row = inputs.get(source.name()).cloned().unwrap_or_default();
                Record::from_row(
                    source.schema().clone(),
                    row,
                    self.settings.extra_fields,
                    &format!("input '{}' of '{}'", source.name(), self.name),
                )
            })
            .collect::<Result<Vec<_>>>()?;
        self.executor.execute_test(&self.sources, &records)
    }

    /// [`run`](Self::run) with JSON inputs decoded against each source schema
    pub fn run_json(&self, inputs: &serde_json::Map<String, serde_json::Value>) -> Result<Record> {
        self.check_input_names(inputs.keys().map(String::as_str))?;
        let empty = serde_json::Map::new();
        let records = self
            .sources
            .iter()
            .map(|source| {
                let object = match inputs.get(source.name()) {
                    None => &empty,
                    Some(value) => value.as_object().ok_or_else(|| {
                        Error::Serialization(format!("input '{}' must be an object", source.name()))
                    })?,
                };
                Record::from_json(
                    source.schema().clone(),
                    object,
                    self.settings.extra_fields,
                    &format!("input '{}' of '{}'", source.name(), self.name),
                )
            })
            .collect::<Result<Vec<_>>>()?;
        self.executor.execute_test(&self.sources, &records)
    }

    /// Online evaluation: latest precomputed values plus the request payload
    pub async fn get_online_features(
        &self,
        join_keys: &JoinKeys,
        request_data: &Row,
        opts: &ServingOptions,
    ) -> Result<Record> {
        if self.settings.extra_fields == ExtraFieldPolicy::Reject {
            let unexpected = undeclared_request_fields(request_data, self.request_sources());
            if !unexpected.is_empty() {
                return Err(Error::SchemaMismatch {
                    context: format!("request data for '{}'", self.name),
                    missing: Vec::new(),
                    mismatched: Vec::new(),
                    unexpected,
                });
            }
        }
        self.online_record(join_keys, request_data, opts).await
    }

    /// Online evaluation without the payload check; the payload may be
    /// shared with other views
    pub(crate) async fn online_record(
        &self,
        join_keys: &JoinKeys,
        request_data: &Row,
        opts: &ServingOptions,
    ) -> Result<Record> {
        let resolved = resolve_sources(self.precomputed_sources(), join_keys, LookupTime::Latest, opts).await?;
        self.online_from(request_data, &resolved)
    }

    /// Online evaluation over precomputed records already looked up by the
    /// caller
    pub(crate) fn online_from(&self, request_data: &Row, resolved: &Resolved) -> Result<Record> {
        debug!(view = %self.name, "evaluating online features");
        let inputs = self
            .sources
            .iter()
            .map(|source| match source.kind() {
                SourceKind::Request => source.request_record(request_data),
                SourceKind::Precomputed => resolved_record(resolved, source),
            })
            .collect::<Result<Vec<_>>>()?;
        self.executor.execute_online(&self.sources, &inputs)
    }

    /// Augment historical events with this view's outputs, qualified as
    /// `<view>.<field>`
    pub async fn get_features_for_events(&self, events: &Table, opts: &ServingOptions) -> Result<Table> {
        let outputs = self.batch_outputs(events, opts).await?;
        let columns = outputs.into_iter().map(Record::into_values).collect();
        events.with_columns(self.output_schema().qualified(&self.name), columns)
    }

    /// One output record per event row, in row order
    pub(crate) async fn batch_outputs(&self, events: &Table, opts: &ServingOptions) -> Result<Vec<Record>> {
        self.check_events_schema(events.schema())?;
        let resolved = resolve_events(
            self.precomputed_sources(),
            events,
            &self.settings.timestamp_field,
            opts,
        )
        .await?;
        self.batch_from(events, &resolved).await
    }

    /// Row-wise evaluation over precomputed records looked up per event by
    /// the caller. `resolved` is in row order.
    pub(crate) async fn batch_from(&self, events: &Table, resolved: &[Resolved]) -> Result<Vec<Record>> {
        debug!(view = %self.name, rows = events.len(), "evaluating features for events");
        let inputs = events
            .rows()
            .iter()
            .zip(resolved)
            .map(|(event, resolved)| {
                self.sources
                    .iter()
                    .map(|source| match source.kind() {
                        SourceKind::Request => source.record_from_event(event),
                        SourceKind::Precomputed => resolved_record(resolved, source),
                    })
                    .collect::<Result<Vec<_>>>()
            })
            .collect::<Result<Vec<_>>>()?;

        // the rayon pass must not hold an async worker thread
        let executor = self.executor.clone();
        let sources = self.sources.clone();
        tokio::task::spawn_blocking(move || executor.execute_batch(&sources, &inputs))
            .await
            .map_err(|e| Error::TransformationExecution {
                view: self.name.clone(),
                mode: ExecutionMode::Batch.as_str(),
                source: Box::new(e),
            })?
    }

    fn check_input_names<'a>(&self, names: impl Iterator<Item = &'a str>) -> Result<()> {
        if self.settings.extra_fields == ExtraFieldPolicy::Ignore {
            return Ok(());
        }
        let mut unexpected: Vec<String> = names
            .filter(|n| !self.sources.iter().any(|s| s.name() == *n))
            .map(str::to_string)
            .collect();
        if unexpected.is_empty() {
            return Ok(());
        }
        unexpected.sort();
        Err(Error::SchemaMismatch {
            context: format!("inputs of '{}'", self.name),
            missing: Vec::new(),
            mismatched: Vec::new(),
            unexpected,
        })
    }

    /// Events must carry every request field, every join key and the
    /// timestamp column
    pub(crate) fn check_events_schema(&self, schema: &Schema) -> Result<()> {
        let mut missing = Vec::new();
        let mut mismatched = Vec::new();
        let mut expect = |name: &str, ty: Option<FieldType>| match schema.field(name) {
            None => {
                if !missing.iter().any(|m| m == name) {
                    missing.push(name.to_string());
                }
            }
            Some(field) => {
                if let Some(ty) = ty {
                    if field.field_type != ty {
                        mismatched.push(featx_core::FieldMismatch {
                            field: name.to_string(),
                            expected: ty,
                            actual: field.field_type.to_string(),
                        });
                    }
                }
            }
        };

        expect(self.settings.timestamp_field.as_str(), Some(FieldType::Timestamp));
        for source in &self.sources {
            match source.kind() {
                SourceKind::Request => {
                    for field in source.schema().fields() {
                        expect(field.name.as_str(), Some(field.field_type));
                    }
                }
                SourceKind::Precomputed => {
                    for key in source.join_keys() {
                        expect(key.as_str(), None);
                    }
                }
            }
        }

        if missing.is_empty() && mismatched.is_empty() {
            Ok(())
        } else {
            Err(Error::SchemaMismatch {
                context: format!("events for '{}'", self.name),
                missing,
                mismatched,
                unexpected: Vec::new(),
            })
        }
    }
}

/// Summary of a view for listings
#[derive(Debug, Clone, Serialize)]
pub struct FeatureViewInfo {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub tags: BTreeMap<String, String>,
    pub sources: Vec<SourceInfo>,
    pub output: Schema,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceInfo {
    pub name: String,
    pub kind: SourceKind,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub join_keys: Vec<String>,
}

impl From<&FeatureView> for FeatureViewInfo {
    fn from(view: &FeatureView) -> Self {
        Self {
            name: view.name.clone(),
            description: view.description.clone(),
            tags: view.tags.clone(),
            sources: view
                .sources
                .iter()
                .map(|s| SourceInfo {
                    name: s.name().to_string(),
                    kind: s.kind(),
                    join_keys: s.join_keys().to_vec(),
                })
                .collect(),
            output: view.output_schema().as_ref().clone(),
        }
    }
}

fn event_join_keys(source: &Source, event: &Record) -> Result<JoinKeys> {
    let mut keys = JoinKeys::new();
    let mut missing = Vec::new();
    for key in source.join_keys() {
        match event.get(key).and_then(|v| v.to_key_string()) {
            Some(value) => {
                keys.insert(key.clone(), value);
            }
            None => missing.push(key.clone()),
        }
    }
    if missing.is_empty() {
        Ok(keys)
    } else {
        Err(Error::SchemaMismatch {
            context: format!("join keys for source '{}'", source.name()),
            missing,
            mismatched: Vec::new(),
            unexpected: Vec::new(),
        })
    }
}

/// Precomputed records of one lookup pass, keyed by source name
pub(crate) type Resolved = HashMap<String, Record>;

/// Look up each distinct precomputed source once
pub(crate) async fn resolve_sources<'a>(
    sources: impl IntoIterator<Item = &'a Arc<Source>>,
    keys: &JoinKeys,
    at: LookupTime,
    opts: &ServingOptions,
) -> Result<Resolved> {
    let distinct = distinct_sources(sources);
    let records = try_join_all(distinct.iter().map(|source| source.resolve(keys, at, opts.timeout))).await?;
    Ok(distinct.iter().map(|s| s.name().to_string()).zip(records).collect())
}

/// Look up each distinct precomputed source once per event, as of the
/// event's timestamp. Results are in row order.
pub(crate) async fn resolve_events<'a>(
    sources: impl IntoIterator<Item = &'a Arc<Source>>,
    events: &Table,
    ts_field: &str,
    opts: &ServingOptions,
) -> Result<Vec<Resolved>> {
    let distinct = distinct_sources(sources);
    let distinct = &distinct;
    stream::iter(events.rows().iter().enumerate())
        .map(|(i, event)| async move {
            let at = event.get_timestamp(ts_field).ok_or_else(|| Error::SchemaMismatch {
                context: format!("row {} of events", i),
                missing: vec![ts_field.to_string()],
                mismatched: Vec::new(),
                unexpected: Vec::new(),
            })?;
            let records = try_join_all(distinct.iter().map(|source| async move {
                let keys = event_join_keys(source, event)?;
                source.resolve(&keys, LookupTime::AsOf(at), opts.timeout).await
            }))
            .await
            .map_err(|e| {
                debug!(row = i, error = %e, "event resolution failed");
                e
            })?;
            Ok::<_, Error>(distinct.iter().map(|s| s.name().to_string()).zip(records).collect::<Resolved>())
        })
        .buffered(opts.batch_concurrency.max(1))
        .try_collect()
        .await
}

fn distinct_sources<'a>(sources: impl IntoIterator<Item = &'a Arc<Source>>) -> Vec<&'a Arc<Source>> {
    let mut distinct: Vec<&'a Arc<Source>> = Vec::new();
    for source in sources {
        if !distinct.iter().any(|s| s.name() == source.name()) {
            distinct.push(source);
        }
    }
    distinct
}

fn resolved_record(resolved: &Resolved, source: &Source) -> Result<Record> {
    resolved.get(source.name()).cloned().ok_or_else(|| {
        Error::InvalidConfig(format!("precomputed source '{}' was not looked up", source.name()))
    })
}

pub(crate) fn undeclared_request_fields<'a>(
    payload: &Row,
    sources: impl Iterator<Item = &'a Arc<Source>>,
) -> Vec<String> {
    let sources: Vec<&Arc<Source>> = sources.collect();
    let mut unexpected: Vec<String> = payload
        .keys()
        .filter(|k| !sources.iter().any(|s| s.schema().contains(k)))
        .cloned()
        .collect();
    unexpected.sort();
    unexpected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::registry::Registry;
    use chrono::{DateTime, TimeZone, Utc};
    use featx_core::{lookup_fn, Field, Value};

    fn ts(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, 12, 0, 0).unwrap()
    }

    /// Yearly average history for `u1`: 100.0 from the 1st, 900.0 from the 10th
    fn registry() -> Registry {
        let registry = Registry::new(EngineConfig::default()).unwrap();
        registry
            .declare_request_source(
                "transaction_request",
                Schema::from_pairs([("amount", FieldType::Float64)]).unwrap(),
            )
            .unwrap();
        registry
            .declare_precomputed_source(
                "user_transaction_averages",
                Schema::from_pairs([("yearly_average", FieldType::Float64)]).unwrap(),
                vec!["user_id".to_string()],
                lookup_fn(|_, keys, at| {
                    if keys.get("user_id").map(String::as_str) != Some("u1") {
                        return Ok(None);
                    }
                    let average = match at {
                        LookupTime::Latest => 900.0,
                        LookupTime::AsOf(t) if t >= ts(10) => 900.0,
                        LookupTime::AsOf(t) if t >= ts(1) => 100.0,
                        LookupTime::AsOf(_) => return Ok(None),
                    };
                    let mut row = Row::new();
                    row.insert("yearly_average".to_string(), Value::Float64(average));
                    Ok(Some(row))
                }),
            )
            .unwrap();
        registry
            .declare_feature_view(
                FeatureView::builder("transaction_amount_is_higher_than_average")
                    .source("user_transaction_averages")
                    .source("transaction_request")
                    .output(
                        Schema::from_pairs([("transaction_amount_is_higher_than_average", FieldType::Bool)])
                            .unwrap(),
                    )
                    .transform(|inputs| {
                        let average = inputs.at(0).get_f64("yearly_average").unwrap_or(0.0);
                        let amount = inputs.require("transaction_request")?.get_f64("amount").unwrap_or(0.0);
                        let mut row = Row::new();
                        row.insert(
                            "transaction_amount_is_higher_than_average".to_string(),
                            Value::Bool(amount > average),
                        );
                        Ok(row)
                    }),
            )
            .unwrap();
        registry
    }

    fn user(id: &str) -> JoinKeys {
        let mut keys = JoinKeys::new();
        keys.insert("user_id".to_string(), id.to_string());
        keys
    }

    fn payload(amount: f64) -> Row {
        let mut row = Row::new();
        row.insert("amount".to_string(), Value::Float64(amount));
        row
    }

    fn events(rows: &[(&str, u32, f64)]) -> Table {
        let schema = Arc::new(
            Schema::new(vec![
                Field::new("user_id", FieldType::String),
                Field::new("timestamp", FieldType::Timestamp),
                Field::new("amount", FieldType::Float64),
            ])
            .unwrap(),
        );
        let rows = rows
            .iter()
            .map(|(u, day, amount)| {
                let mut row = payload(*amount);
                row.insert("user_id".to_string(), Value::from(*u));
                row.insert("timestamp".to_string(), Value::Timestamp(ts(*day)));
                row
            })
            .collect();
        Table::from_rows(schema, rows, ExtraFieldPolicy::Reject).unwrap()
    }

    const OUTPUT: &str = "transaction_amount_is_higher_than_average";

    #[test]
    fn test_run_with_literal_inputs() {
        let registry = registry();
        let view = registry.feature_view(OUTPUT).unwrap();

        let mut inputs = HashMap::new();
        inputs.insert("transaction_request".to_string(), payload(182.4));
        let mut average = Row::new();
        average.insert("yearly_average".to_string(), Value::Null);
        inputs.insert("user_transaction_averages".to_string(), average);

        let out = view.run(&inputs).unwrap();
        assert_eq!(out.get_bool(OUTPUT), Some(true));
    }

    #[test]
    fn test_run_requires_every_input() {
        let registry = registry();
        let view = registry.feature_view(OUTPUT).unwrap();

        let mut inputs = HashMap::new();
        inputs.insert("transaction_request".to_string(), payload(182.4));
        let err = view.run(&inputs).unwrap_err();
        assert!(matches!(err, Error::SchemaMismatch { .. }));

        inputs.insert("user_transaction_averages".to_string(), Row::new());
        inputs.insert("unknown_source".to_string(), Row::new());
        let err = view.run(&inputs).unwrap_err();
        assert!(err.to_string().contains("unknown_source"));
    }

    #[test]
    fn test_run_json_decodes_by_schema() {
        let registry = registry();
        let view = registry.feature_view(OUTPUT).unwrap();
        let inputs = serde_json::json!({
            "transaction_request": {"amount": 50},
            "user_transaction_averages": {"yearly_average": 75.5}
        });
        let out = view.run_json(inputs.as_object().unwrap()).unwrap();
        assert_eq!(out.get_bool(OUTPUT), Some(false));
    }

    #[tokio::test]
    async fn test_unseen_user_resolves_to_nulls() {
        let registry = registry();
        let view = registry.feature_view(OUTPUT).unwrap();
        let out = view
            .get_online_features(&user("unseen"), &payload(182.4), &registry.serving_options())
            .await
            .unwrap();
        assert_eq!(out.get_bool(OUTPUT), Some(true));
    }

    #[tokio::test]
    async fn test_online_rejects_undeclared_request_fields() {
        let registry = registry();
        let view = registry.feature_view(OUTPUT).unwrap();
        let mut request = payload(10.0);
        request.insert("merchant".to_string(), Value::from("acme"));
        let err = view
            .get_online_features(&user("u1"), &request, &registry.serving_options())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SchemaMismatch { ref unexpected, .. } if unexpected == &["merchant".to_string()]));
    }

    #[tokio::test]
    async fn test_events_see_only_past_values() {
        let registry = registry();
        let view = registry.feature_view(OUTPUT).unwrap();

        // 500.0 is above the early average and below the later one
        let table = events(&[("u1", 5, 500.0), ("u1", 12, 500.0), ("u1", 1, 50.0), ("u2", 12, 1.0)]);
        let out = view
            .get_features_for_events(&table, &registry.serving_options())
            .await
            .unwrap();

        let column = format!("{}.{}", OUTPUT, OUTPUT);
        let values: Vec<Option<bool>> = out
            .column(&column)
            .unwrap()
            .into_iter()
            .map(Value::as_bool)
            .collect();
        assert_eq!(values, vec![Some(true), Some(false), Some(false), Some(true)]);
        assert_eq!(out.schema().len(), 4);
        assert_eq!(out.rows()[2].get_f64("amount"), Some(50.0));
    }

    #[tokio::test]
    async fn test_online_matches_batch_for_same_inputs() {
        let registry = registry();
        let view = registry.feature_view(OUTPUT).unwrap();
        let opts = registry.serving_options();

        // online reads the latest value, the day-12 event sees the same one
        for amount in [10.0, 899.0, 901.0] {
            let online = view.get_online_features(&user("u1"), &payload(amount), &opts).await.unwrap();
            let batch = view.batch_outputs(&events(&[("u1", 12, amount)]), &opts).await.unwrap();
            assert_eq!(
                serde_json::to_string(&online).unwrap(),
                serde_json::to_string(&batch[0]).unwrap()
            );
        }
    }

    #[tokio::test]
    async fn test_batch_leaves_the_runtime_free() {
        let registry = registry();
        let (tx, rx) = std::sync::mpsc::channel::<()>();
        let rx = parking_lot::Mutex::new(rx);
        registry
            .declare_feature_view(
                FeatureView::builder("waits_for_signal")
                    .source("transaction_request")
                    .output(Schema::from_pairs([("signalled", FieldType::Bool)]).unwrap())
                    .transform(move |_| {
                        rx.lock()
                            .recv_timeout(std::time::Duration::from_secs(5))
                            .map_err(|e| e.to_string())?;
                        let mut row = Row::new();
                        row.insert("signalled".to_string(), Value::Bool(true));
                        Ok(row)
                    }),
            )
            .unwrap();
        let view = registry.feature_view("waits_for_signal").unwrap();
        let opts = registry.serving_options();
        let table = events(&[("u1", 5, 10.0)]);

        // the signal can only be sent while the transformation is running
        // if the batch does not block this single-threaded runtime
        let signal = async {
            tokio::task::yield_now().await;
            tx.send(()).unwrap();
        };
        let (out, ()) = tokio::join!(view.get_features_for_events(&table, &opts), signal);
        assert_eq!(out.unwrap().rows()[0].get_bool("waits_for_signal.signalled"), Some(true));
    }

    #[tokio::test]
    async fn test_events_missing_columns() {
        let registry = registry();
        let view = registry.feature_view(OUTPUT).unwrap();
        let schema = Arc::new(Schema::from_pairs([("user_id", FieldType::String)]).unwrap());
        let table = Table::new(schema);
        let err = view
            .get_features_for_events(&table, &registry.serving_options())
            .await
            .unwrap_err();
        match err {
            Error::SchemaMismatch { missing, .. } => {
                assert_eq!(missing, vec!["timestamp".to_string(), "amount".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_info_lists_sources() {
        let registry = registry();
        let info = FeatureViewInfo::from(registry.feature_view(OUTPUT).unwrap().as_ref());
        let kinds: Vec<SourceKind> = info.sources.iter().map(|s| s.kind).collect();
        assert_eq!(kinds, vec![SourceKind::Precomputed, SourceKind::Request]);
        assert_eq!(info.sources[0].join_keys, vec!["user_id".to_string()]);
    }
}
