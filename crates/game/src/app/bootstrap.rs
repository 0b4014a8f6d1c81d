use std::env;
use std::path::PathBuf;

use engine::{
    resolve_app_paths, ContentRequest, InputSource, LoopConfig, Scene, StartupError,
    ENABLED_MODS_ENV_VAR,
};
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

use super::gameplay;
use super::script::{load_script, ScriptError, ScriptedInput};

const LEVEL_ENV_VAR: &str = "RECALL_LEVEL";
const SCRIPT_ENV_VAR: &str = "RECALL_SCRIPT";
const DEFAULT_LEVEL: &str = "level.intro";

pub(crate) struct AppWiring {
    pub(crate) config: LoopConfig,
    pub(crate) scene: Box<dyn Scene>,
    pub(crate) input: Box<dyn InputSource>,
}

#[derive(Debug, Error)]
pub(crate) enum BootstrapError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error(transparent)]
    Script(#[from] ScriptError),
}

pub(crate) fn build_app() -> Result<AppWiring, BootstrapError> {
    init_tracing();
    info!("=== Recall Startup ===");

    let script_path = resolve_script_path()?;
    let script = load_script(&script_path)?;
    let level = non_empty_env(LEVEL_ENV_VAR)
        .or_else(|| script.level.clone())
        .unwrap_or_else(|| DEFAULT_LEVEL.to_string());
    let config = LoopConfig {
        max_ticks: Some(script.ticks),
        content_request: ContentRequest::from_mod_list(
            &non_empty_env(ENABLED_MODS_ENV_VAR).unwrap_or_default(),
        ),
        ..LoopConfig::default()
    };
    info!(
        script = %script_path.display(),
        level = %level,
        ticks = script.ticks,
        steps = script.steps.len(),
        "run_script_loaded"
    );

    let scene = gameplay::build_level_scene(&level, config.target_tps);
    Ok(AppWiring {
        config,
        scene,
        input: Box::new(ScriptedInput::new(script)),
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

fn resolve_script_path() -> Result<PathBuf, StartupError> {
    if let Some(path) = non_empty_env(SCRIPT_ENV_VAR) {
        return Ok(PathBuf::from(path));
    }
    let app_paths = resolve_app_paths()?;
    Ok(app_paths.root.join("assets").join("scripts").join("demo.json"))
}

fn non_empty_env(var: &str) -> Option<String> {
    env::var(var)
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|value| !value.is_empty())
}
