//! # featx Core
//!
//! Core types for the featx on-demand feature engine.
//!
//! - [`Schema`] / [`Field`] - ordered, uniquely named, typed fields
//! - [`Value`] - typed scalar or null
//! - [`Record`] / [`RecordBuilder`] - records validated against a schema on construction
//! - [`Table`] - rows sharing one schema, used for historical events
//! - [`FeatureLookup`] - read capability for precomputed feature values
//!
//! ## Example
//!
//! ```rust
//! use featx_core::{FieldType, RecordBuilder, Schema};
//! use std::sync::Arc;
//!
//! let schema = Arc::new(Schema::from_pairs([("amount", FieldType::Float64)]).unwrap());
//! let record = RecordBuilder::new(schema)
//!     .set("amount", 182.4)
//!     .build()
//!     .unwrap();
//! assert_eq!(record.get_f64("amount"), Some(182.4));
//! ```

pub mod error;
pub mod lookup;
pub mod record;
pub mod schema;
pub mod table;
pub mod value;

pub use error::{BoxError, Error, FieldMismatch, Result};
pub use lookup::{lookup_fn, FeatureLookup, FnLookup, JoinKeys, LookupTime};
pub use record::{Record, RecordBuilder, Row};
pub use schema::{ExtraFieldPolicy, Field, Schema};
pub use table::Table;
pub use value::{FieldType, Value};
