//! Resolve adapter names against the configured LoRA folders.

use std::path::{Component, Path, PathBuf};

use crate::key::unify_separators;

/// Relative path for an adapter name as sent by the UI. Names that are
/// absolute or climb out of the LoRA folder are refused.
fn relative_adapter_path(lora_name: &str) -> Option<PathBuf> {
    let unified = unify_separators(lora_name);
    let rel = Path::new(&unified);
    if unified.starts_with('/') || unified.is_empty() {
        return None;
    }
    let mut out = PathBuf::new();
    for comp in rel.components() {
        match comp {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if out.as_os_str().is_empty() {
        None
    } else {
        Some(out)
    }
}

/// Full path of the first existing file named `lora_name` under `lora_dirs`.
pub fn resolve_adapter(lora_dirs: &[PathBuf], lora_name: &str) -> Option<PathBuf> {
    let Some(rel) = relative_adapter_path(lora_name) else {
        tracing::warn!("refusing adapter name outside LoRA folders: '{}'", lora_name);
        return None;
    };
    lora_dirs.iter().map(|dir| dir.join(&rel)).find(|p| p.is_file())
}
