//! JSON-backed trigger-word database.
//!
//! The whole document is loaded for every operation and rewritten on every
//! save; there is no cache and no locking. Concurrent writers race and the
//! last completed rewrite wins.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;

use crate::error::StoreError;
use crate::key::{normalize, unify_separators};

/// Trigger words recorded for one adapter file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerRecord {
    #[serde(default, alias = "allTriggers")]
    pub all_triggers: String,
    #[serde(default, alias = "activeTriggers")]
    pub active_triggers: String,
}

impl TriggerRecord {
    pub fn new(all: impl Into<String>, active: impl Into<String>) -> Self {
        Self {
            all_triggers: all.into(),
            active_triggers: active.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.all_triggers.is_empty() && self.active_triggers.is_empty()
    }
}

/// A value as found in the store document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredEntry {
    /// Older documents stored only the full trigger list as a bare string.
    Legacy(String),
    Record(#[serde(deserialize_with = "record_from_map")] TriggerRecord),
    /// Any other shape. Kept verbatim on rewrite, read as an empty record.
    Unknown(JsonValue),
}

/// Records only come from JSON objects; a derived struct would also accept
/// a two-element array.
fn record_from_map<'de, D>(d: D) -> Result<TriggerRecord, D::Error>
where
    D: Deserializer<'de>,
{
    let map = serde_json::Map::<String, JsonValue>::deserialize(d)?;
    serde_json::from_value(JsonValue::Object(map)).map_err(serde::de::Error::custom)
}

impl StoredEntry {
    /// Read as-is: a legacy string has no active set.
    pub fn as_record(&self) -> TriggerRecord {
        match self {
            StoredEntry::Legacy(all) => TriggerRecord::new(all.clone(), ""),
            StoredEntry::Record(rec) => rec.clone(),
            StoredEntry::Unknown(_) => TriggerRecord::default(),
        }
    }

    /// Read for autoload: an absent or empty active set mirrors the full list.
    pub fn mirrored(&self) -> TriggerRecord {
        let mut rec = self.as_record();
        if rec.active_triggers.is_empty() {
            rec.active_triggers = rec.all_triggers.clone();
        }
        rec
    }
}

/// In-memory copy of the store document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TriggerDb {
    entries: BTreeMap<String, StoredEntry>,
}

impl TriggerDb {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up the entry for an adapter file name.
    ///
    /// Tries the normalized key first, then rescans every stored key with its
    /// separators unified so entries written on another platform still match.
    pub fn find(&self, raw_name: &str) -> Option<(&str, &StoredEntry)> {
        let key = normalize(raw_name);
        if let Some((k, v)) = self.entries.get_key_value(&key) {
            return Some((k.as_str(), v));
        }
        self.entries
            .iter()
            .find(|(stored, _)| unify_separators(stored) == key)
            .map(|(k, v)| (k.as_str(), v))
    }

    /// Record for the plain fetch path; empty when nothing matches.
    pub fn record_for(&self, raw_name: &str) -> TriggerRecord {
        self.find(raw_name)
            .map(|(_, entry)| entry.as_record())
            .unwrap_or_default()
    }

    /// Record for the autoload path, with the active set mirrored.
    pub fn autoload_record(&self, raw_name: &str) -> TriggerRecord {
        self.find(raw_name)
            .map(|(_, entry)| entry.mirrored())
            .unwrap_or_default()
    }

    fn insert(&mut self, key: String, entry: StoredEntry) -> Option<StoredEntry> {
        self.entries.insert(key, entry)
    }

    fn restore(&mut self, key: &str, previous: Option<StoredEntry>) {
        match previous {
            Some(prev) => {
                self.entries.insert(key.to_string(), prev);
            }
            None => {
                self.entries.remove(key);
            }
        }
    }
}

/// Result of a save request that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved { key: String },
    /// Both trigger strings were blank; nothing was written.
    NothingToSave,
}

/// Handle to the store document on disk.
#[derive(Debug, Clone)]
pub struct TriggerStore {
    path: PathBuf,
}

impl TriggerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the document. Never fails: a missing, unreadable or malformed
    /// file is an empty store.
    pub fn load(&self) -> TriggerDb {
        let content = match fs::read_to_string(&self.path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    "trigger store {} not found; using an empty store",
                    self.path.display()
                );
                return TriggerDb::default();
            }
            Err(e) => {
                tracing::warn!("failed to read {}: {}", self.path.display(), e);
                return TriggerDb::default();
            }
        };
        if content.trim().is_empty() {
            return TriggerDb::default();
        }
        match serde_json::from_str::<TriggerDb>(&content) {
            Ok(db) => {
                tracing::debug!(
                    "loaded trigger store {} (entries={})",
                    self.path.display(),
                    db.len()
                );
                db
            }
            Err(e) => {
                tracing::warn!("error loading {}: {}", self.path.display(), e);
                TriggerDb::default()
            }
        }
    }

    /// Upsert the triggers for `raw_name` and rewrite the document.
    ///
    /// Blank input is a no-op and never deletes an existing record. On a
    /// write failure `db` is left as it was before the call.
    pub fn save(
        &self,
        db: &mut TriggerDb,
        raw_name: &str,
        all_triggers: &str,
        active_triggers: &str,
    ) -> Result<SaveOutcome, StoreError> {
        let all = all_triggers.trim();
        let active = active_triggers.trim();
        if all.is_empty() && active.is_empty() {
            return Ok(SaveOutcome::NothingToSave);
        }
        let key = normalize(raw_name);
        let previous = db.insert(
            key.clone(),
            StoredEntry::Record(TriggerRecord::new(all, active)),
        );
        if let Err(e) = self.persist(db) {
            db.restore(&key, previous);
            return Err(e);
        }
        tracing::info!("saved triggers for {}: all='{}', active='{}'", key, all, active);
        Ok(SaveOutcome::Saved { key })
    }

    /// Rewrite the whole document through a temp file renamed into place.
    pub fn persist(&self, db: &TriggerDb) -> Result<(), StoreError> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(|source| StoreError::CreateDir {
            path: dir.clone(),
            source,
        })?;

        let mut body = serde_json::to_string_pretty(db)?;
        body.push('\n');

        let write_err = |source: std::io::Error| StoreError::Write {
            path: self.path.clone(),
            source,
        };
        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(write_err)?;
        tmp.write_all(body.as_bytes()).map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist(&self.path).map_err(|e| write_err(e.error))?;
        Ok(())
    }
}
