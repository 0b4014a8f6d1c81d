mod actor;
mod input;
mod loop_runner;
mod metrics;
mod pose;
mod scene;
mod schedule;
mod tools;
mod track;

pub use actor::{Actor, ActorHost};
pub use input::{InputAction, InputCollector, InputIntent, InputSnapshot};
pub use loop_runner::{
    run_app, run_app_with_metrics, run_with_database, AppError, ExitReason, InputSource,
    LoopConfig, RunSummary, TickInput, REALTIME_ENV_VAR,
};
pub use metrics::{LoopMetricsSnapshot, MetricsHandle};
pub use pose::{Pose, Quat, Vec3};
pub use scene::{
    ActorBody, ActorKind, ActorSpawn, Entity, EntityId, RecorderTickStats, Scene, SceneCommand,
    SceneDebugCommand, SceneDebugCommandResult, SceneWorld, ZoneSignal,
};
pub use schedule::TickScheduler;
pub use track::{FrameSample, RecordedSequence, RecorderMode, RecorderTick, TrackRecorder};
