use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::store::TriggerStore;

/// Metadata reads above this size are refused unless configured otherwise.
pub const DEFAULT_METADATA_MAX_BYTES: u64 = 2 * 1024 * 1024 * 1024;

/// File name of the trigger store inside its directory.
pub const TRIGGERS_FILE_NAME: &str = "triggers.json";

#[derive(Debug, Default, Deserialize)]
pub struct UserConfig {
    pub logging: Option<LoggingCfg>,
    pub server: Option<ServerCfg>,
    pub store: Option<StoreCfg>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoggingCfg {
    pub to_file: Option<bool>,
    pub dir: Option<String>,
    pub json: Option<bool>,
    pub compact: Option<bool>,
    pub pretty: Option<bool>,
    pub level: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ServerCfg {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StoreCfg {
    pub lora_dirs: Option<Vec<String>>, // first entry also hosts triggers.json
    pub file: Option<String>,
    pub metadata_max_bytes: Option<u64>,
}

/// Fully resolved runtime settings; immutable after startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub home: PathBuf,
    pub host: String,
    pub port: u16,
    pub lora_dirs: Vec<PathBuf>,
    pub triggers_file: PathBuf,
    pub metadata_max_bytes: u64,
}

impl Settings {
    pub fn store(&self) -> TriggerStore {
        TriggerStore::new(self.triggers_file.clone())
    }
}

pub fn load_user_config(home: &Path) -> anyhow::Result<Option<UserConfig>> {
    let path = home.join("config.toml");
    if !path.exists() {
        return Ok(None);
    }
    let s = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let cfg: UserConfig =
        toml::from_str(&s).with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(Some(cfg))
}

pub fn expand_home(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(stripped);
    }
    PathBuf::from(path)
}

/// Service home: explicit value, else `~/.lora-triggerdb`, else `./.lora-triggerdb`.
pub fn resolve_home(explicit: &str) -> PathBuf {
    if !explicit.is_empty() {
        return expand_home(explicit);
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".lora-triggerdb");
    }
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(".lora-triggerdb")
}

/// Split a comma-separated directory list, expanding `~/`.
pub fn split_dirs(list: &str) -> Vec<PathBuf> {
    list.split(',')
        .filter(|s| !s.trim().is_empty())
        .map(|s| expand_home(s.trim()))
        .collect()
}

/// Store location when none is configured: next to the adapters in the
/// first LoRA folder, else the platform data directory, else `home`.
pub fn default_triggers_file(lora_dirs: &[PathBuf], home: &Path) -> PathBuf {
    if let Some(first) = lora_dirs.first() {
        return first.join(TRIGGERS_FILE_NAME);
    }
    if let Some(data) = dirs::data_dir() {
        return data.join("lora-triggerdb").join(TRIGGERS_FILE_NAME);
    }
    home.join(TRIGGERS_FILE_NAME)
}

/// Env wins when explicitly set, then the config file, then the env default.
pub fn layered<T>(env_is_set: bool, env_value: T, cfg_value: Option<T>) -> T {
    if env_is_set {
        return env_value;
    }
    cfg_value.unwrap_or(env_value)
}
