//! JSON snapshots of precomputed feature history
//!
//! A snapshot is a list of entries, each holding one source's values for
//! one set of join keys at one effective time. Files ending in `.gz` are
//! gzip-compressed. Values are typed by the source schema on load.

use atomicwrites::{AllowOverwrite, AtomicFile};
use chrono::{DateTime, Utc};
use featx_core::{Error, ExtraFieldPolicy, JoinKeys, Record, Result, Schema, Value};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::memory::MemoryStore;

/// One stored row as it appears on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub source: String,
    pub join_keys: JoinKeys,
    pub effective_time: DateTime<Utc>,
    pub values: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotFile {
    created_at: DateTime<Utc>,
    entries: Vec<SnapshotEntry>,
}

/// Summary returned after loading or saving
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SnapshotStats {
    pub entries: usize,
    pub sources: usize,
}

fn is_gzip(path: &Path) -> bool {
    path.extension().and_then(|s| s.to_str()) == Some("gz")
}

impl MemoryStore {
    /// Load entries from a snapshot file. `schema_of` gives the schema a
    /// source's values are decoded with; entries for unknown sources fail
    /// the load and nothing is inserted.
    pub fn load_snapshot<P, F>(&self, path: P, schema_of: F) -> Result<SnapshotStats>
    where
        P: AsRef<Path>,
        F: Fn(&str) -> Option<Arc<Schema>>,
    {
        let path = path.as_ref();
        let file = BufReader::new(File::open(path)?);
        let mut bytes = Vec::new();
        if is_gzip(path) {
            GzDecoder::new(file).read_to_end(&mut bytes)?;
        } else {
            let mut file = file;
            file.read_to_end(&mut bytes)?;
        }
        let snapshot: SnapshotFile = serde_json::from_slice(&bytes)?;

        let mut decoded = Vec::with_capacity(snapshot.entries.len());
        for (i, entry) in snapshot.entries.into_iter().enumerate() {
            let schema = schema_of(&entry.source)
                .ok_or_else(|| Error::NotFound(format!("source '{}' in snapshot entry {}", entry.source, i)))?;
            let record = Record::from_json(
                Arc::new(schema.to_nullable()),
                &entry.values,
                ExtraFieldPolicy::Ignore,
                &format!("snapshot entry {} for '{}'", i, entry.source),
            )?;
            decoded.push((entry.source, entry.join_keys, entry.effective_time, record.to_row()));
        }

        let mut sources: Vec<&str> = decoded.iter().map(|(s, ..)| s.as_str()).collect();
        sources.sort_unstable();
        sources.dedup();
        let stats = SnapshotStats {
            entries: decoded.len(),
            sources: sources.len(),
        };

        for (source, keys, at, row) in decoded {
            self.insert(&source, keys, at, row);
        }
        info!(path = %path.display(), entries = stats.entries, sources = stats.sources, "loaded snapshot");
        Ok(stats)
    }

    /// Write every entry to `path`, replacing it atomically
    pub fn save_snapshot<P: AsRef<Path>>(&self, path: P) -> Result<SnapshotStats> {
        let path = path.as_ref();
        let entries: Vec<SnapshotEntry> = self
            .entries()
            .into_iter()
            .map(|(source, join_keys, entry)| SnapshotEntry {
                source,
                join_keys,
                effective_time: entry.effective_time,
                values: entry
                    .values
                    .iter()
                    .map(|(name, value)| (name.clone(), Value::to_json(value)))
                    .collect(),
            })
            .collect();

        let mut sources: Vec<&str> = entries.iter().map(|e| e.source.as_str()).collect();
        sources.sort_unstable();
        sources.dedup();
        let stats = SnapshotStats {
            entries: entries.len(),
            sources: sources.len(),
        };

        let json = serde_json::to_vec(&SnapshotFile {
            created_at: Utc::now(),
            entries,
        })?;
        let gzip = is_gzip(path);
        AtomicFile::new(path, AllowOverwrite)
            .write(|file| -> std::io::Result<()> {
                if gzip {
                    let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
                    encoder.write_all(&json)?;
                    encoder.finish()?.flush()
                } else {
                    file.write_all(&json)
                }
            })
            .map_err(|e| match e {
                atomicwrites::Error::Internal(e) | atomicwrites::Error::User(e) => Error::Io(e),
            })?;

        info!(path = %path.display(), entries = stats.entries, "saved snapshot");
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use featx_core::{FieldType, LookupTime, Row};

    fn schema_of(source: &str) -> Option<Arc<Schema>> {
        match source {
            "user_transaction_metrics" => Some(Arc::new(
                Schema::from_pairs([
                    ("amount_mean_1d_1d", FieldType::Float64),
                    ("amount_count_1d_1d", FieldType::Int64),
                ])
                .unwrap(),
            )),
            _ => None,
        }
    }

    fn user(id: &str) -> JoinKeys {
        let mut keys = JoinKeys::new();
        keys.insert("user_id".to_string(), id.to_string());
        keys
    }

    const SNAPSHOT: &str = r#"{
        "created_at": "2026-04-01T00:00:00Z",
        "entries": [
            {"source": "user_transaction_metrics", "join_keys": {"user_id": "u1"},
             "effective_time": "2026-04-02T00:00:00Z",
             "values": {"amount_mean_1d_1d": 12, "amount_count_1d_1d": 3}},
            {"source": "user_transaction_metrics", "join_keys": {"user_id": "u1"},
             "effective_time": "2026-04-03T00:00:00Z",
             "values": {"amount_mean_1d_1d": null, "amount_count_1d_1d": 0}}
        ]
    }"#;

    #[test]
    fn test_load_decodes_by_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("features.json");
        std::fs::write(&path, SNAPSHOT).unwrap();

        let store = MemoryStore::new();
        let stats = store.load_snapshot(&path, schema_of).unwrap();
        assert_eq!(stats, SnapshotStats { entries: 2, sources: 1 });

        let at = Utc.with_ymd_and_hms(2026, 4, 2, 12, 0, 0).unwrap();
        let row = store.get("user_transaction_metrics", &user("u1"), LookupTime::AsOf(at)).unwrap();
        assert_eq!(row["amount_mean_1d_1d"], Value::Float64(12.0));
        assert_eq!(row["amount_count_1d_1d"], Value::Int64(3));

        let latest = store.get("user_transaction_metrics", &user("u1"), LookupTime::Latest).unwrap();
        assert_eq!(latest["amount_mean_1d_1d"], Value::Null);
    }

    #[test]
    fn test_unknown_source_fails_whole_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("features.json");
        let snapshot = SNAPSHOT.replace(
            r#""entries": ["#,
            r#""entries": [{"source": "users", "join_keys": {"user_id": "u1"},
                "effective_time": "2026-04-01T00:00:00Z", "values": {}},"#,
        );
        std::fs::write(&path, snapshot).unwrap();

        let store = MemoryStore::new();
        assert!(matches!(store.load_snapshot(&path, schema_of), Err(Error::NotFound(_))));
        assert!(store.is_empty());
    }

    #[test]
    fn test_save_then_load_gzip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("features.json.gz");

        let store = MemoryStore::new();
        let mut row = Row::new();
        row.insert("amount_mean_1d_1d".to_string(), Value::Float64(7.5));
        row.insert("amount_count_1d_1d".to_string(), Value::Int64(2));
        let at = Utc.with_ymd_and_hms(2026, 4, 1, 0, 0, 0).unwrap();
        store.insert("user_transaction_metrics", user("u9"), at, row.clone());
        store.save_snapshot(&path).unwrap();

        let restored = MemoryStore::new();
        restored.load_snapshot(&path, schema_of).unwrap();
        assert_eq!(
            restored.get("user_transaction_metrics", &user("u9"), LookupTime::Latest),
            Some(row)
        );
    }
}
