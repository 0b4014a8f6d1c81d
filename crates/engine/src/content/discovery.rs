use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::AppPaths;

use super::types::{ContentDiscoveryError, ContentRequest};

#[derive(Debug, Clone)]
pub(crate) struct ModSource {
    pub mod_id: String,
    pub source_dir: PathBuf,
}

/// `base` first, then enabled mods in request order.
pub(crate) fn discover_mod_sources(
    app_paths: &AppPaths,
    request: &ContentRequest,
) -> Result<Vec<ModSource>, ContentDiscoveryError> {
    let mut seen = HashSet::<&str>::new();
    let mut sources = vec![ModSource {
        mod_id: "base".to_string(),
        source_dir: app_paths.base_content_dir.clone(),
    }];

    for mod_id in &request.enabled_mods {
        let trimmed = mod_id.trim();
        if trimmed.is_empty() {
            return Err(ContentDiscoveryError::EmptyEnabledMod);
        }
        if !seen.insert(trimmed) {
            return Err(ContentDiscoveryError::DuplicateEnabledMod {
                mod_id: trimmed.to_string(),
            });
        }
        let mod_dir = app_paths.mods_dir.join(trimmed);
        ensure_dir_exists(trimmed, &mod_dir)?;
        sources.push(ModSource {
            mod_id: trimmed.to_string(),
            source_dir: mod_dir,
        });
    }

    Ok(sources)
}

fn ensure_dir_exists(mod_id: &str, path: &Path) -> Result<(), ContentDiscoveryError> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(ContentDiscoveryError::EnabledModMissing {
            mod_id: mod_id.to_string(),
            expected_dir: path.to_path_buf(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    fn app_paths(root: &Path) -> AppPaths {
        AppPaths {
            root: root.to_path_buf(),
            base_content_dir: root.join("assets").join("base"),
            mods_dir: root.join("mods"),
        }
    }

    #[test]
    fn base_is_first_then_enabled_order() {
        let temp = TempDir::new().expect("tempdir");
        let root = temp.path();
        fs::create_dir_all(root.join("assets").join("base")).expect("create base");
        fs::create_dir_all(root.join("mods").join("late_zones")).expect("create mod");
        fs::create_dir_all(root.join("mods").join("fast_player")).expect("create mod");
        let request = ContentRequest {
            enabled_mods: vec!["late_zones".to_string(), "fast_player".to_string()],
        };

        let sources = discover_mod_sources(&app_paths(root), &request).expect("discover");
        let ids = sources
            .iter()
            .map(|source| source.mod_id.as_str())
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["base", "late_zones", "fast_player"]);
    }

    #[test]
    fn missing_and_duplicate_mods_are_rejected() {
        let temp = TempDir::new().expect("tempdir");
        let root = temp.path();
        fs::create_dir_all(root.join("mods").join("a")).expect("create mod");

        let missing = discover_mod_sources(
            &app_paths(root),
            &ContentRequest {
                enabled_mods: vec!["nope".to_string()],
            },
        )
        .expect_err("missing");
        assert!(matches!(
            missing,
            ContentDiscoveryError::EnabledModMissing { .. }
        ));

        let duplicate = discover_mod_sources(
            &app_paths(root),
            &ContentRequest {
                enabled_mods: vec!["a".to_string(), " a ".to_string()],
            },
        )
        .expect_err("duplicate");
        assert!(matches!(
            duplicate,
            ContentDiscoveryError::DuplicateEnabledMod { .. }
        ));
    }
}
