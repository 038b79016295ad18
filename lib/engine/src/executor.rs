//! Transformation executor
//!
//! One code path runs user transformations in every mode. Test, batch and
//! online calls differ only in how inputs are gathered, never in how the
//! function is invoked or its output validated, so identical resolved
//! inputs always give identical outputs.

use featx_core::{BoxError, Error, ExtraFieldPolicy, Record, Result, Row, Schema};
use rayon::prelude::*;
use serde::Serialize;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::warn;

use crate::source::Source;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Literal inputs supplied by the caller
    Test,
    /// Row-wise over historical events
    Batch,
    /// Per live request
    Online,
}

impl ExecutionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionMode::Test => "test",
            ExecutionMode::Batch => "batch",
            ExecutionMode::Online => "online",
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

type TransformFn = dyn Fn(&TransformInputs<'_>) -> std::result::Result<Row, BoxError> + Send + Sync;

/// A user-defined pure function from source records to one output row
#[derive(Clone)]
pub struct Transformation {
    f: Arc<TransformFn>,
}

impl Transformation {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&TransformInputs<'_>) -> std::result::Result<Row, BoxError> + Send + Sync + 'static,
    {
        Self { f: Arc::new(f) }
    }

    /// Output the first input record unchanged
    pub fn passthrough() -> Self {
        Self::new(|inputs| Ok(inputs.at(0).to_row()))
    }
}

impl fmt::Debug for Transformation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Transformation")
    }
}

/// Input records handed to a transformation, one per declared source
pub struct TransformInputs<'a> {
    sources: &'a [Arc<Source>],
    records: &'a [Record],
}

impl<'a> TransformInputs<'a> {
    /// Record for the named source
    pub fn get(&self, source: &str) -> Option<&'a Record> {
        self.sources
            .iter()
            .position(|s| s.name() == source)
            .map(|i| &self.records[i])
    }

    /// Record for the named source, as an error the transformation can `?`
    pub fn require(&self, source: &str) -> std::result::Result<&'a Record, BoxError> {
        self.get(source)
            .ok_or_else(|| format!("no input named '{}'", source).into())
    }

    /// Record at a declared position
    pub fn at(&self, index: usize) -> &'a Record {
        &self.records[index]
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Runs a feature view's transformation and validates its output
#[derive(Debug, Clone)]
pub struct TransformationExecutor {
    view: String,
    output: Arc<Schema>,
    transformation: Transformation,
}

impl TransformationExecutor {
    pub fn new(view: impl Into<String>, output: Arc<Schema>, transformation: Transformation) -> Self {
        Self {
            view: view.into(),
            output,
            transformation,
        }
    }

    #[inline]
    pub fn output_schema(&self) -> &Arc<Schema> {
        &self.output
    }

    /// Single invocation with caller-supplied inputs
    pub fn execute_test(&self, sources: &[Arc<Source>], inputs: &[Record]) -> Result<Record> {
        self.invoke(sources, inputs, ExecutionMode::Test)
    }

    /// Single invocation with inputs resolved for a live request
    pub fn execute_online(&self, sources: &[Arc<Source>], inputs: &[Record]) -> Result<Record> {
        self.invoke(sources, inputs, ExecutionMode::Online)
    }

    /// Row-wise invocation over resolved event inputs. Rows run in parallel;
    /// output order matches input order.
    pub fn execute_batch(&self, sources: &[Arc<Source>], rows: &[Vec<Record>]) -> Result<Vec<Record>> {
        rows.par_iter()
            .map(|inputs| self.invoke(sources, inputs, ExecutionMode::Batch))
            .collect()
    }

    fn invoke(&self, sources: &[Arc<Source>], inputs: &[Record], mode: ExecutionMode) -> Result<Record> {
        self.check_inputs(sources, inputs)?;

        let args = TransformInputs {
            sources,
            records: inputs,
        };
        let outcome = catch_unwind(AssertUnwindSafe(|| (self.transformation.f)(&args)));

        let row = match outcome {
            Ok(Ok(row)) => row,
            Ok(Err(cause)) => {
                warn!(view = %self.view, %mode, error = %cause, "transformation failed");
                return Err(self.failure(mode, cause));
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                warn!(view = %self.view, %mode, %message, "transformation panicked");
                return Err(self.failure(mode, format!("panicked: {}", message).into()));
            }
        };

        Record::from_row(
            self.output.clone(),
            row,
            ExtraFieldPolicy::Reject,
            &format!("output of '{}'", self.view),
        )
    }

    fn check_inputs(&self, sources: &[Arc<Source>], inputs: &[Record]) -> Result<()> {
        if sources.len() != inputs.len() {
            return Err(Error::InvalidConfig(format!(
                "'{}' expects {} input records, got {}",
                self.view,
                sources.len(),
                inputs.len()
            )));
        }
        for (source, record) in sources.iter().zip(inputs) {
            let same = Arc::ptr_eq(source.schema(), record.schema())
                || source.schema().as_ref() == record.schema().as_ref();
            if !same {
                return Err(Error::SchemaMismatch {
                    context: format!("input '{}' of '{}'", source.name(), self.view),
                    missing: source
                        .schema()
                        .names()
                        .filter(|n| !record.schema().contains(n))
                        .map(str::to_string)
                        .collect(),
                    mismatched: Vec::new(),
                    unexpected: record
                        .schema()
                        .names()
                        .filter(|n| !source.schema().contains(n))
                        .map(str::to_string)
                        .collect(),
                });
            }
        }
        Ok(())
    }

    fn failure(&self, mode: ExecutionMode, source: BoxError) -> Error {
        Error::TransformationExecution {
            view: self.view.clone(),
            mode: mode.as_str(),
            source,
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use featx_core::{FieldType, RecordBuilder, Value};
    use std::error::Error as _;

    fn request_source() -> Arc<Source> {
        Arc::new(Source::request(
            "transaction_request".to_string(),
            Schema::from_pairs([("amount", FieldType::Float64)]).unwrap(),
        ))
    }

    fn is_high_executor() -> TransformationExecutor {
        let output = Arc::new(Schema::from_pairs([("transaction_amount_is_high", FieldType::Bool)]).unwrap());
        TransformationExecutor::new(
            "transaction_amount_is_high",
            output,
            Transformation::new(|inputs| {
                let amount = inputs.require("transaction_request")?.get_f64("amount").unwrap_or(0.0);
                let mut row = Row::new();
                row.insert("transaction_amount_is_high".to_string(), Value::Bool(amount > 1000.0));
                Ok(row)
            }),
        )
    }

    fn amount(source: &Arc<Source>, v: f64) -> Record {
        RecordBuilder::new(source.schema().clone()).set("amount", v).build().unwrap()
    }

    #[test]
    fn test_modes_agree() {
        let source = request_source();
        let sources = vec![source.clone()];
        let executor = is_high_executor();

        for v in [0.0, 182.4, 1000.0, 1000.01, 25_000.0] {
            let inputs = vec![amount(&source, v)];
            let test = executor.execute_test(&sources, &inputs).unwrap();
            let online = executor.execute_online(&sources, &inputs).unwrap();
            let batch = executor.execute_batch(&sources, &[inputs.clone()]).unwrap();

            let expected = serde_json::to_vec(&test).unwrap();
            assert_eq!(serde_json::to_vec(&online).unwrap(), expected);
            assert_eq!(serde_json::to_vec(&batch[0]).unwrap(), expected);
        }
    }

    #[test]
    fn test_batch_preserves_order() {
        let source = request_source();
        let sources = vec![source.clone()];
        let rows: Vec<Vec<Record>> = (0..500).map(|i| vec![amount(&source, i as f64 * 10.0)]).collect();

        let out = is_high_executor().execute_batch(&sources, &rows).unwrap();
        assert_eq!(out.len(), 500);
        for (i, record) in out.iter().enumerate() {
            assert_eq!(record.get_bool("transaction_amount_is_high"), Some(i as f64 * 10.0 > 1000.0));
        }
    }

    #[test]
    fn test_error_keeps_cause() {
        let source = request_source();
        let executor = TransformationExecutor::new(
            "broken",
            Arc::new(Schema::from_pairs([("x", FieldType::Bool)]).unwrap()),
            Transformation::new(|_| Err("upstream value out of range".into())),
        );
        let err = executor
            .execute_online(&[source.clone()], &[amount(&source, 1.0)])
            .unwrap_err();
        assert!(matches!(err, Error::TransformationExecution { mode: "online", .. }));
        assert_eq!(err.source().unwrap().to_string(), "upstream value out of range");
    }

    #[test]
    fn test_panic_is_reported() {
        let source = request_source();
        let executor = TransformationExecutor::new(
            "panics",
            Arc::new(Schema::from_pairs([("x", FieldType::Bool)]).unwrap()),
            Transformation::new(|_| panic!("bad index")),
        );
        let err = executor
            .execute_test(&[source.clone()], &[amount(&source, 1.0)])
            .unwrap_err();
        assert!(err.source().unwrap().to_string().contains("bad index"));
    }

    #[test]
    fn test_output_validated() {
        let source = request_source();
        let executor = TransformationExecutor::new(
            "wrong_type",
            Arc::new(Schema::from_pairs([("is_high", FieldType::Bool)]).unwrap()),
            Transformation::new(|_| {
                let mut row = Row::new();
                row.insert("is_high".to_string(), Value::from("yes"));
                row.insert("extra".to_string(), Value::Bool(true));
                Ok(row)
            }),
        );
        let err = executor
            .execute_test(&[source.clone()], &[amount(&source, 1.0)])
            .unwrap_err();
        match err {
            Error::SchemaMismatch { mismatched, unexpected, .. } => {
                assert_eq!(mismatched[0].field, "is_high");
                assert_eq!(unexpected, vec!["extra".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_input_schema_checked() {
        let source = request_source();
        let other = Arc::new(Schema::from_pairs([("value", FieldType::Float64)]).unwrap());
        let record = RecordBuilder::new(other).set("value", 1.0).build().unwrap();
        let err = is_high_executor().execute_test(&[source], &[record]).unwrap_err();
        assert!(matches!(err, Error::SchemaMismatch { .. }));
    }
}
