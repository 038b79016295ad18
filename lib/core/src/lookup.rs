//! Precomputed feature lookup capability
//!
//! The engine never stores precomputed features itself. It reads them
//! through a [`FeatureLookup`] implementation supplied at configuration
//! time, always stating the point in time the values must be valid for.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::record::Row;

/// Join key name → key value, e.g. `user_id → "user_268308151877"`
pub type JoinKeys = BTreeMap<String, String>;

/// Point in time a lookup must be answered for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LookupTime {
    /// Most recent value, used when serving online
    Latest,
    /// Most recent value with effective time <= the instant
    AsOf(DateTime<Utc>),
}

impl fmt::Display for LookupTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupTime::Latest => f.write_str("latest"),
            LookupTime::AsOf(t) => write!(f, "as of {}", t.to_rfc3339()),
        }
    }
}

/// Read access to precomputed feature values
///
/// `Ok(None)` means the store has no history for the join keys at that time.
#[async_trait]
pub trait FeatureLookup: Send + Sync {
    async fn lookup(&self, source: &str, join_keys: &JoinKeys, at: LookupTime) -> Result<Option<Row>>;
}

/// Adapts a synchronous closure into a [`FeatureLookup`]
pub struct FnLookup<F> {
    f: F,
}

impl<F> FnLookup<F>
where
    F: Fn(&str, &JoinKeys, LookupTime) -> Result<Option<Row>> + Send + Sync + 'static,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F> FeatureLookup for FnLookup<F>
where
    F: Fn(&str, &JoinKeys, LookupTime) -> Result<Option<Row>> + Send + Sync + 'static,
{
    async fn lookup(&self, source: &str, join_keys: &JoinKeys, at: LookupTime) -> Result<Option<Row>> {
        (self.f)(source, join_keys, at)
    }
}

/// Shared lookup handle from a closure
pub fn lookup_fn<F>(f: F) -> Arc<dyn FeatureLookup>
where
    F: Fn(&str, &JoinKeys, LookupTime) -> Result<Option<Row>> + Send + Sync + 'static,
{
    Arc::new(FnLookup::new(f))
}
