//! LoRA load orchestration.
//!
//! Responsibilities:
//! - Resolve the adapter file the host should merge, or skip loading.
//! - Decide the trigger strings the node emits: stored record first, then
//!   words recovered from the adapter's metadata, then the caller's text.
//!
//! The weight merge itself belongs to the host's model library; this module
//! only reports which file to merge and at what strength.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::Settings;
use crate::error::LookupError;
use crate::metadata::{read_metadata, triggers_from_metadata};
use crate::paths::resolve_adapter;
use crate::store::{TriggerRecord, TriggerStore};

/// One node execution as seen by the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadRequest {
    pub lora_name: String,
    pub strength_model: f64,
    pub all_triggers: String,
    pub active_triggers: String,
    /// Let stored or metadata-derived triggers replace the caller's text.
    pub autoload: bool,
}

/// Where the emitted trigger strings came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerSource {
    /// Caller-supplied text passed through.
    Input,
    Store,
    Metadata,
    /// Nothing was loaded (zero strength or adapter file missing).
    Skipped,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadOutcome {
    /// Adapter file for the host to merge; `None` when loading was skipped.
    pub lora_path: Option<PathBuf>,
    pub strength_model: f64,
    pub all_triggers: String,
    pub active_triggers: String,
    pub source: TriggerSource,
}

impl LoadOutcome {
    fn passthrough(req: LoadRequest, lora_path: Option<PathBuf>, source: TriggerSource) -> Self {
        Self {
            lora_path,
            strength_model: req.strength_model,
            all_triggers: req.all_triggers,
            active_triggers: req.active_triggers,
            source,
        }
    }
}

/// Orchestrator over the trigger store, the LoRA folders and the metadata
/// reader. Cheap to share; holds no per-request state.
#[derive(Debug, Clone)]
pub struct LoraLoader {
    store: TriggerStore,
    lora_dirs: Vec<PathBuf>,
    metadata_max_bytes: u64,
}

impl LoraLoader {
    pub fn new(store: TriggerStore, lora_dirs: Vec<PathBuf>, metadata_max_bytes: u64) -> Self {
        Self {
            store,
            lora_dirs,
            metadata_max_bytes,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.store(),
            settings.lora_dirs.clone(),
            settings.metadata_max_bytes,
        )
    }

    pub fn store(&self) -> &TriggerStore {
        &self.store
    }

    /// Resolve the adapter and the trigger strings for one execution.
    pub fn load(&self, req: LoadRequest) -> LoadOutcome {
        if req.strength_model == 0.0 {
            tracing::debug!("strength is zero for '{}'; skipping load", req.lora_name);
            return LoadOutcome::passthrough(req, None, TriggerSource::Skipped);
        }

        let Some(path) = resolve_adapter(&self.lora_dirs, &req.lora_name) else {
            tracing::warn!("failed to load LoRA: {}", req.lora_name);
            return LoadOutcome::passthrough(req, None, TriggerSource::Skipped);
        };

        if !req.autoload {
            return LoadOutcome::passthrough(req, Some(path), TriggerSource::Input);
        }

        match self.autoload_triggers(&req.lora_name, &path) {
            Some((rec, source)) => {
                tracing::info!(
                    "autoloaded triggers for '{}' from {:?}",
                    req.lora_name,
                    source
                );
                LoadOutcome {
                    lora_path: Some(path),
                    strength_model: req.strength_model,
                    all_triggers: rec.all_triggers,
                    active_triggers: rec.active_triggers,
                    source,
                }
            }
            None => LoadOutcome::passthrough(req, Some(path), TriggerSource::Input),
        }
    }

    /// Stored record (active mirrors all when empty), else metadata words.
    fn autoload_triggers(
        &self,
        lora_name: &str,
        path: &Path,
    ) -> Option<(TriggerRecord, TriggerSource)> {
        let stored = self.store.load().autoload_record(lora_name);
        if !stored.is_empty() {
            return Some((stored, TriggerSource::Store));
        }
        match read_metadata(path, self.metadata_max_bytes) {
            Ok(meta) => triggers_from_metadata(&meta)
                .map(|joined| (TriggerRecord::new(joined.clone(), joined), TriggerSource::Metadata)),
            Err(e) => {
                tracing::debug!("no metadata triggers for '{}': {}", lora_name, e);
                None
            }
        }
    }

    /// Trigger words recovered from the adapter's metadata alone, with the
    /// active set mirroring the full list.
    pub fn metadata_triggers(&self, lora_name: &str) -> Result<TriggerRecord, LookupError> {
        let path = resolve_adapter(&self.lora_dirs, lora_name)
            .ok_or_else(|| LookupError::AdapterNotFound(lora_name.to_string()))?;
        let meta = read_metadata(&path, self.metadata_max_bytes)?;
        let joined = triggers_from_metadata(&meta)
            .ok_or_else(|| LookupError::NoTriggers(lora_name.to_string()))?;
        Ok(TriggerRecord::new(joined.clone(), joined))
    }
}
