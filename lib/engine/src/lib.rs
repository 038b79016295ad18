//! # featx engine
//!
//! Request-time feature computation. Sources describe where inputs come
//! from, feature views run a transformation over them, and feature services
//! merge several views into one vector.
//!
//! ```ignore
//! let registry = Registry::new(EngineConfig::default())?;
//! registry.declare_request_source("transaction_request", request_schema)?;
//! registry.declare_feature_view(
//!     FeatureView::builder("transaction_amount_is_high")
//!         .source("transaction_request")
//!         .output(output_schema)
//!         .transform(|inputs| { /* ... */ }),
//! )?;
//! let service = registry.declare_feature_service("fraud", &["transaction_amount_is_high"])?;
//! let vector = service.get_online_features(&keys, &payload, &registry.serving_options()).await?;
//! ```

pub mod config;
pub mod executor;
pub mod registry;
pub mod service;
pub mod source;
pub mod view;

pub use config::{EngineConfig, ServingOptions};
pub use executor::{ExecutionMode, TransformInputs, Transformation, TransformationExecutor};
pub use registry::Registry;
pub use service::{FeatureService, FeatureServiceInfo, FeatureVector};
pub use source::{Entity, Source, SourceKind};
pub use view::{FeatureView, FeatureViewBuilder, FeatureViewInfo, SourceInfo};
