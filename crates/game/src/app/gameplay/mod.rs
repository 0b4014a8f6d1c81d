use engine::{
    ActorArchetype, ActorHost, ActorKind, ActorSpawn, EntityId, InputAction, InputIntent,
    InputSnapshot, LevelDef, Pose, RecordedSequence, RecorderMode, Scene, SceneCommand,
    SceneDebugCommand, SceneDebugCommandResult, SceneWorld, StartZoneDef, TickScheduler,
    TrackRecorder, Vec3, ZoneBox, ZoneSignal,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Sub-tick slack when comparing the countdown against zero.
const TIMER_EPSILON_SECONDS: f64 = 1e-6;
const DEFAULT_LOOP_DURATION_SECONDS: f32 = 10.0;
const CONTROLS_PROMPT_SECONDS: f32 = 5.0;
const CONTROLS_PROMPT_TEXT: &str = "Controls:\n\
WASD - Move\n\
Space - Jump\n\
L - Return to spawn / Start clone replay\n\
R - Reset level completely\n\n\
Leave the start zone to begin recording!";
const RECORDING_COMPLETE_PROMPT_TEXT: &str =
    "Recording complete. Press L to return to spawn and create a clone.";
const GAMEPLAY_SYSTEM_ORDER_TEXT: &str =
    "InputIntent>Movement>ZoneSignals>Recorders>LoopTimer>LoopCommands>Prompts";

include!("types.rs");
include!("orchestrator.rs");
include!("zones.rs");
include!("prompt.rs");
include!("scene_impl.rs");
include!("util.rs");

pub(crate) fn build_level_scene(level_name: &str, ticks_per_second: u32) -> Box<dyn Scene> {
    Box::new(LevelScene::new(level_name, ticks_per_second))
}
