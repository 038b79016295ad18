use async_trait::async_trait;
use chrono::{DateTime, Utc};
use featx_core::{FeatureLookup, JoinKeys, LookupTime, Result, Row};
use parking_lot::RwLock;
use std::collections::HashMap;

type Series = HashMap<JoinKeys, Vec<Entry>, ahash::RandomState>;

#[derive(Debug, Clone)]
pub(crate) struct Entry {
    pub effective_time: DateTime<Utc>,
    pub values: Row,
}

/// In-memory history of precomputed feature values
///
/// Values are kept per source and join keys, ordered by effective time, so
/// a lookup as of `t` never sees a value that became effective after `t`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    sources: RwLock<HashMap<String, Series, ahash::RandomState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record values that became effective at `effective_time`. A second
    /// insert at the same time replaces the first.
    pub fn insert(&self, source: &str, join_keys: JoinKeys, effective_time: DateTime<Utc>, values: Row) {
        let mut sources = self.sources.write();
        let history = sources
            .entry(source.to_string())
            .or_default()
            .entry(join_keys)
            .or_default();
        match history.binary_search_by(|e| e.effective_time.cmp(&effective_time)) {
            Ok(i) => history[i].values = values,
            Err(i) => history.insert(
                i,
                Entry {
                    effective_time,
                    values,
                },
            ),
        }
    }

    /// Values for the join keys at `at`, if any were effective by then
    pub fn get(&self, source: &str, join_keys: &JoinKeys, at: LookupTime) -> Option<Row> {
        let sources = self.sources.read();
        let history = sources.get(source)?.get(join_keys)?;
        let entry = match at {
            LookupTime::Latest => history.last(),
            LookupTime::AsOf(t) => {
                let end = history.partition_point(|e| e.effective_time <= t);
                end.checked_sub(1).map(|i| &history[i])
            }
        }?;
        Some(entry.values.clone())
    }

    /// Number of stored entries across all sources
    pub fn len(&self) -> usize {
        self.sources
            .read()
            .values()
            .flat_map(|series| series.values())
            .map(Vec::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.sources.write().clear();
    }

    /// Every entry, grouped by source, for snapshots
    pub(crate) fn entries(&self) -> Vec<(String, JoinKeys, Entry)> {
        let sources = self.sources.read();
        let mut out = Vec::new();
        for (source, series) in sources.iter() {
            for (keys, history) in series {
                for entry in history {
                    out.push((source.clone(), keys.clone(), entry.clone()));
                }
            }
        }
        out.sort_by(|a, b| (&a.0, &a.1, a.2.effective_time).cmp(&(&b.0, &b.1, b.2.effective_time)));
        out
    }
}

#[async_trait]
impl FeatureLookup for MemoryStore {
    async fn lookup(&self, source: &str, join_keys: &JoinKeys, at: LookupTime) -> Result<Option<Row>> {
        Ok(self.get(source, join_keys, at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use featx_core::Value;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, d, 0, 0, 0).unwrap()
    }

    fn user(id: &str) -> JoinKeys {
        let mut keys = JoinKeys::new();
        keys.insert("user_id".to_string(), id.to_string());
        keys
    }

    fn mean(v: f64) -> Row {
        let mut row = Row::new();
        row.insert("amount_mean_1d_1d".to_string(), Value::Float64(v));
        row
    }

    fn store() -> MemoryStore {
        let store = MemoryStore::new();
        // inserted out of order on purpose
        store.insert("user_transaction_metrics", user("u1"), day(10), mean(30.0));
        store.insert("user_transaction_metrics", user("u1"), day(2), mean(10.0));
        store.insert("user_transaction_metrics", user("u1"), day(5), mean(20.0));
        store
    }

    fn mean_at(store: &MemoryStore, at: LookupTime) -> Option<f64> {
        store
            .get("user_transaction_metrics", &user("u1"), at)
            .map(|row| row["amount_mean_1d_1d"].as_f64().unwrap())
    }

    #[test]
    fn test_as_of_never_reads_future_values() {
        let store = store();
        assert_eq!(mean_at(&store, LookupTime::AsOf(day(1))), None);
        assert_eq!(mean_at(&store, LookupTime::AsOf(day(2))), Some(10.0));
        assert_eq!(mean_at(&store, LookupTime::AsOf(day(4))), Some(10.0));
        assert_eq!(mean_at(&store, LookupTime::AsOf(day(5))), Some(20.0));
        assert_eq!(mean_at(&store, LookupTime::AsOf(day(30))), Some(30.0));
        assert_eq!(mean_at(&store, LookupTime::Latest), Some(30.0));
    }

    #[test]
    fn test_same_time_replaces() {
        let store = store();
        store.insert("user_transaction_metrics", user("u1"), day(5), mean(25.0));
        assert_eq!(store.len(), 3);
        assert_eq!(mean_at(&store, LookupTime::AsOf(day(6))), Some(25.0));
    }

    #[tokio::test]
    async fn test_lookup_unknown_keys() {
        let store = store();
        let found = store
            .lookup("user_transaction_metrics", &user("u2"), LookupTime::Latest)
            .await
            .unwrap();
        assert!(found.is_none());
        let found = store.lookup("users", &user("u1"), LookupTime::Latest).await.unwrap();
        assert!(found.is_none());
    }
}
