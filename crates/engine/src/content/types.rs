use std::path::PathBuf;

use thiserror::Error;

/// Which mods to layer over `assets/base`, in load order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentRequest {
    pub enabled_mods: Vec<String>,
}

impl ContentRequest {
    /// Parses a comma-separated mod list, skipping blank entries.
    pub fn from_mod_list(raw: &str) -> Self {
        Self {
            enabled_mods: raw
                .split(',')
                .map(str::trim)
                .filter(|mod_id| !mod_id.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ContentDiscoveryError {
    #[error("enabled mod id cannot be empty")]
    EmptyEnabledMod,
    #[error("duplicate enabled mod id in request: {mod_id}")]
    DuplicateEnabledMod { mod_id: String },
    #[error("enabled mod does not exist on disk: {mod_id} at {expected_dir}")]
    EnabledModMissing {
        mod_id: String,
        expected_dir: PathBuf,
    },
}
