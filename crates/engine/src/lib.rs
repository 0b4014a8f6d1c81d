use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub mod app;
pub mod content;

pub use app::{
    run_app, run_app_with_metrics, run_with_database, Actor, ActorBody, ActorHost, ActorKind,
    ActorSpawn, AppError, Entity, EntityId, ExitReason, FrameSample, InputAction, InputCollector,
    InputIntent, InputSnapshot, InputSource, LoopConfig, LoopMetricsSnapshot, MetricsHandle,
    Pose, Quat, RecordedSequence, RecorderMode, RecorderTick, RecorderTickStats, RunSummary,
    Scene, SceneCommand, SceneDebugCommand, SceneDebugCommandResult, SceneWorld, TickInput,
    TickScheduler, TrackRecorder, Vec3, ZoneSignal, REALTIME_ENV_VAR,
};
pub use content::{
    compile_def_database, compile_defs_from_str, ActorArchetype, ActorDefId,
    ContentCompileError, ContentDiscoveryError, ContentErrorCode, ContentRequest, DefDatabase,
    LevelDef, LevelDefId, SourceLocation, StartZoneDef, ZoneBox,
};

pub const ROOT_ENV_VAR: &str = "RECALL_ROOT";
pub const ENABLED_MODS_ENV_VAR: &str = "RECALL_ENABLED_MODS";

/// Directories the runtime reads content and scripts from.
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub root: PathBuf,
    pub base_content_dir: PathBuf,
    pub mods_dir: PathBuf,
}

impl AppPaths {
    fn under(root: PathBuf) -> Self {
        Self {
            base_content_dir: root.join("assets").join("base"),
            mods_dir: root.join("mods"),
            root,
        }
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("{var} is not valid unicode: {source}")]
    EnvVar {
        var: &'static str,
        #[source]
        source: env::VarError,
    },
    #[error("cannot locate the running executable: {0}")]
    CurrentExe(#[source] std::io::Error),
    #[error("executable path {0} has no parent directory")]
    ExeHasNoParent(PathBuf),
    #[error("{var}={path} is not a project root (needs Cargo.toml plus assets/ or crates/)")]
    InvalidEnvRoot { var: &'static str, path: PathBuf },
    #[error(
        "no project root above {start_dir} (looked for Cargo.toml plus assets/ or crates/); \
set {env_var} to the checkout directory"
    )]
    RootNotFound {
        start_dir: PathBuf,
        env_var: &'static str,
    },
}

/// Resolves the project root from `RECALL_ROOT`, falling back to the
/// nearest ancestor of the executable that looks like a checkout.
pub fn resolve_app_paths() -> Result<AppPaths, StartupError> {
    let root = match env::var(ROOT_ENV_VAR) {
        Ok(value) => {
            let path = canonical_or_raw(Path::new(&value));
            if !looks_like_project_root(&path) {
                return Err(StartupError::InvalidEnvRoot {
                    var: ROOT_ENV_VAR,
                    path,
                });
            }
            path
        }
        Err(env::VarError::NotPresent) => {
            let exe = env::current_exe().map_err(StartupError::CurrentExe)?;
            let exe_dir = exe
                .parent()
                .ok_or_else(|| StartupError::ExeHasNoParent(exe.clone()))?;
            find_project_root(exe_dir).ok_or_else(|| StartupError::RootNotFound {
                start_dir: canonical_or_raw(exe_dir),
                env_var: ROOT_ENV_VAR,
            })?
        }
        Err(source) => {
            return Err(StartupError::EnvVar {
                var: ROOT_ENV_VAR,
                source,
            })
        }
    };
    Ok(AppPaths::under(root))
}

fn find_project_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|candidate| looks_like_project_root(candidate))
        .map(canonical_or_raw)
}

fn looks_like_project_root(path: &Path) -> bool {
    path.join("Cargo.toml").is_file()
        && (path.join("assets").is_dir() || path.join("crates").is_dir())
}

fn canonical_or_raw(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
