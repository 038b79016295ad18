//! # featx
//!
//! An on-demand feature engine. Feature views combine live request data with
//! precomputed feature history and run the same transformation whether they
//! are called from a test, over historical events or per request.
//!
//! ## Quick Start
//!
//! ### As a Server
//!
//! ```bash
//! featx --http-port 8080 --snapshot data/fraud_snapshot.json
//! ```
//!
//! ### As a Library
//!
//! ```rust,no_run
//! use featx::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<()> {
//! let store = Arc::new(MemoryStore::new());
//! let registry = featx::fraud::registry(EngineConfig::default(), store)?;
//! let service = registry.feature_service("fraud_detection_feature_service:v2")?;
//!
//! let mut keys = JoinKeys::new();
//! keys.insert("user_id".to_string(), "user_268308151877".to_string());
//! let mut request = Row::new();
//! request.insert("amount".to_string(), Value::Float64(182.4));
//!
//! let features = service
//!     .get_online_features(&keys, &request, &registry.serving_options())
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Crate Structure
//!
//! - `featx-core` - values, schemas, records, tables and the lookup trait
//! - `featx-engine` - sources, transformation executor, feature views and services
//! - `featx-storage` - in-memory point-in-time store with JSON snapshots
//! - `featx-api` - REST serving API

pub mod fraud;

// Re-export core types
pub use featx_core::{
    lookup_fn, Error, ExtraFieldPolicy, FeatureLookup, Field, FieldType, JoinKeys, LookupTime, Record,
    RecordBuilder, Result, Row, Schema, Table, Value,
};

// Re-export engine
pub use featx_engine::{
    Entity, EngineConfig, ExecutionMode, FeatureService, FeatureVector, FeatureView, FeatureViewBuilder,
    Registry, ServingOptions, Source, SourceKind, TransformInputs, Transformation,
};

// Re-export storage
pub use featx_storage::MemoryStore;

// Re-export API
pub use featx_api::RestApi;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        EngineConfig, Error, FeatureLookup, FeatureService, FeatureView, FeatureViewBuilder, Field,
        FieldType, JoinKeys, LookupTime, MemoryStore, Record, Registry, Result, Row, Schema, Table,
        Value,
    };
}
