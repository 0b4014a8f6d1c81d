use std::env;
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{info, warn};

use crate::{
    compile_def_database, resolve_app_paths, ContentCompileError, ContentRequest, DefDatabase,
    StartupError,
};

use super::metrics::MetricsAccumulator;
use super::scene::{SceneDebugCommand, SceneDebugCommandResult, SceneHost};
use super::tools::{ConsoleCommandProcessor, ConsoleState, DebugCommand};
use super::{InputSnapshot, MetricsHandle, Scene, SceneCommand};

pub const REALTIME_ENV_VAR: &str = "RECALL_REALTIME";

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub target_tps: u32,
    pub max_frame_delta: Duration,
    pub max_ticks_per_frame: u32,
    pub metrics_log_interval: Duration,
    /// Pace ticks against the wall clock instead of running them back to back.
    pub realtime: bool,
    pub max_ticks: Option<u64>,
    pub content_request: ContentRequest,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            target_tps: 60,
            max_frame_delta: Duration::from_millis(250),
            max_ticks_per_frame: 5,
            metrics_log_interval: Duration::from_secs(1),
            realtime: false,
            max_ticks: None,
            content_request: ContentRequest::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error("failed to compile content defs: {0}")]
    Content(#[from] ContentCompileError),
}

/// Everything fed into the simulation for one fixed tick.
#[derive(Debug, Clone, Default)]
pub struct TickInput {
    pub snapshot: InputSnapshot,
    pub console_lines: Vec<String>,
}

impl TickInput {
    pub fn from_snapshot(snapshot: InputSnapshot) -> Self {
        Self {
            snapshot,
            console_lines: Vec::new(),
        }
    }
}

pub trait InputSource {
    /// Returns `None` once there is nothing left to feed.
    fn next_tick(&mut self, tick: u64) -> Option<TickInput>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    InputExhausted,
    QuitRequested,
    TickLimit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub ticks_run: u64,
    pub exit_reason: ExitReason,
}

pub fn run_app(
    config: LoopConfig,
    scene: Box<dyn Scene>,
    mut input: Box<dyn InputSource>,
) -> Result<RunSummary, AppError> {
    let metrics_handle = MetricsHandle::default();
    run_app_with_metrics(config, scene, input.as_mut(), metrics_handle)
}

pub fn run_app_with_metrics(
    config: LoopConfig,
    scene: Box<dyn Scene>,
    input: &mut dyn InputSource,
    metrics_handle: MetricsHandle,
) -> Result<RunSummary, AppError> {
    let app_paths = resolve_app_paths()?;
    info!(
        root = %app_paths.root.display(),
        base_content_dir = %app_paths.base_content_dir.display(),
        mods_dir = %app_paths.mods_dir.display(),
        "startup"
    );
    let def_database = compile_def_database(&app_paths, &config.content_request)?;
    info!(
        actor_defs = def_database.actor_defs().len(),
        level_defs = def_database.level_defs().len(),
        enabled_mods = config.content_request.enabled_mods.len(),
        "content_compiled"
    );

    Ok(run_with_database(
        config,
        scene,
        input,
        def_database,
        metrics_handle,
    ))
}

/// Runs the loop against an already compiled def database.
pub fn run_with_database(
    config: LoopConfig,
    scene: Box<dyn Scene>,
    input: &mut dyn InputSource,
    def_database: DefDatabase,
    metrics_handle: MetricsHandle,
) -> RunSummary {
    let target_tps = config.target_tps.max(1);
    let max_frame_delta =
        normalize_non_zero_duration(config.max_frame_delta, Duration::from_millis(250));
    let max_ticks_per_frame = config.max_ticks_per_frame.max(1);
    let metrics_log_interval =
        normalize_non_zero_duration(config.metrics_log_interval, Duration::from_secs(1));
    let fixed_dt = Duration::from_secs_f64(1.0 / target_tps as f64);
    let realtime = resolve_realtime(config.realtime);

    let mut host = SceneHost::new(scene);
    host.set_def_database(def_database);
    host.load();
    host.apply_pending();
    info!(
        scene = host.debug_title().as_deref().unwrap_or("untitled"),
        entity_count = host.world().entity_count(),
        "scene_loaded"
    );
    info!(
        target_tps,
        max_frame_delta_ms = max_frame_delta.as_millis() as u64,
        max_ticks_per_frame,
        metrics_log_interval_ms = metrics_log_interval.as_millis() as u64,
        realtime,
        max_ticks = config.max_ticks.unwrap_or(0),
        "loop_config"
    );

    let mut runner = TickRunner {
        host,
        console: ConsoleState::default(),
        processor: ConsoleCommandProcessor::new(),
        metrics: MetricsAccumulator::new(metrics_log_interval),
        metrics_handle,
        fixed_dt_seconds: fixed_dt.as_secs_f32(),
        max_ticks: config.max_ticks,
        tick: 0,
    };

    let exit_reason = if realtime {
        run_paced(&mut runner, input, fixed_dt, max_frame_delta, max_ticks_per_frame)
    } else {
        run_unpaced(&mut runner, input)
    };

    runner.host.shutdown();
    info!(ticks_run = runner.tick, exit_reason = ?exit_reason, "shutdown");
    RunSummary {
        ticks_run: runner.tick,
        exit_reason,
    }
}

struct TickRunner {
    host: SceneHost,
    console: ConsoleState,
    processor: ConsoleCommandProcessor,
    metrics: MetricsAccumulator,
    metrics_handle: MetricsHandle,
    fixed_dt_seconds: f32,
    max_ticks: Option<u64>,
    tick: u64,
}

impl TickRunner {
    fn run_one_tick(&mut self, input: &mut dyn InputSource) -> Option<ExitReason> {
        if self.max_ticks.is_some_and(|limit| self.tick >= limit) {
            return Some(ExitReason::TickLimit);
        }
        let started = Instant::now();
        let Some(tick_input) = input.next_tick(self.tick) else {
            return Some(ExitReason::InputExhausted);
        };
        if tick_input.snapshot.quit_requested() {
            info!(reason = "input", "shutdown_requested");
            return Some(ExitReason::QuitRequested);
        }
        for line in &tick_input.console_lines {
            self.console.submit_line(line);
        }

        let command = self
            .host
            .update(self.fixed_dt_seconds, &tick_input.snapshot);
        self.host.apply_pending();
        let mut exit = match command {
            SceneCommand::None => None,
            SceneCommand::HardReset => {
                self.host.hard_reset();
                self.host.apply_pending();
                info!(
                    entity_count = self.host.world().entity_count(),
                    "scene_reset"
                );
                None
            }
            SceneCommand::Quit => {
                info!(reason = "scene", "shutdown_requested");
                Some(ExitReason::QuitRequested)
            }
        };
        if exit.is_none() {
            exit = self.process_console_commands();
        }
        self.host.apply_pending();
        self.flush_console_output();

        let recorder_stats = self.host.take_recorder_stats();
        self.metrics.record_tick(started.elapsed(), recorder_stats);
        self.tick = self.tick.saturating_add(1);
        if let Some(snapshot) = self.metrics.maybe_snapshot(Instant::now()) {
            self.metrics_handle.publish(snapshot);
            info!(
                tps = snapshot.tps,
                tick_time_ms = snapshot.tick_time_ms,
                ticks_total = snapshot.ticks_total,
                frames_captured = snapshot.frames_captured,
                frames_replayed = snapshot.frames_replayed,
                entity_count = self.host.world().entity_count(),
                "loop_metrics"
            );
        }
        exit
    }

    fn process_console_commands(&mut self) -> Option<ExitReason> {
        self.processor.process_pending_lines(&mut self.console);
        let mut commands = Vec::new();
        self.processor
            .drain_pending_debug_commands_into(&mut commands);

        for command in commands {
            match command {
                DebugCommand::Quit => {
                    self.console.append_output_line("ok: quit requested");
                    info!(reason = "console", "shutdown_requested");
                    return Some(ExitReason::QuitRequested);
                }
                DebugCommand::ResetScene => {
                    self.host.hard_reset();
                    self.host.apply_pending();
                    self.console.append_output_line("ok: scene reset");
                }
                other => {
                    let Some(scene_command) = to_scene_debug_command(other) else {
                        continue;
                    };
                    match self.host.execute_debug_command(scene_command) {
                        SceneDebugCommandResult::Success(text) => {
                            self.console.append_output_line(text);
                        }
                        SceneDebugCommandResult::Error(text) => {
                            self.console.append_output_line(format!("error: {text}"));
                        }
                        SceneDebugCommandResult::Unsupported => {
                            self.console
                                .append_output_line("error: command not supported by scene");
                        }
                    }
                }
            }
        }
        None
    }

    fn flush_console_output(&mut self) {
        let mut lines = Vec::new();
        self.console.drain_fresh_output_into(&mut lines);
        for line in lines {
            info!(tick = self.tick, line = %line, "console_output");
        }
    }
}

fn to_scene_debug_command(command: DebugCommand) -> Option<SceneDebugCommand> {
    match command {
        DebugCommand::StartPlayback => Some(SceneDebugCommand::StartPlayback),
        DebugCommand::ReturnToSpawn => Some(SceneDebugCommand::ReturnToSpawn),
        DebugCommand::ResetLevel => Some(SceneDebugCommand::ResetLevel),
        DebugCommand::CompleteRecording => Some(SceneDebugCommand::CompleteRecording),
        DebugCommand::Zone { signal } => Some(SceneDebugCommand::Zone { signal }),
        DebugCommand::DumpState => Some(SceneDebugCommand::DumpState),
        DebugCommand::Quit | DebugCommand::ResetScene => None,
    }
}

fn run_unpaced(runner: &mut TickRunner, input: &mut dyn InputSource) -> ExitReason {
    loop {
        if let Some(reason) = runner.run_one_tick(input) {
            return reason;
        }
    }
}

fn run_paced(
    runner: &mut TickRunner,
    input: &mut dyn InputSource,
    fixed_dt: Duration,
    max_frame_delta: Duration,
    max_ticks_per_frame: u32,
) -> ExitReason {
    let mut accumulator = Duration::ZERO;
    let mut last_frame_instant = Instant::now();

    loop {
        let now = Instant::now();
        let raw_frame_dt = now.saturating_duration_since(last_frame_instant);
        last_frame_instant = now;

        accumulator = accumulator.saturating_add(clamp_frame_delta(raw_frame_dt, max_frame_delta));
        let step_plan = plan_sim_steps(accumulator, fixed_dt, max_ticks_per_frame);
        for _ in 0..step_plan.ticks_to_run {
            if let Some(reason) = runner.run_one_tick(input) {
                return reason;
            }
        }
        accumulator = step_plan.remaining_accumulator;

        if step_plan.dropped_backlog > Duration::ZERO {
            warn!(
                dropped_backlog_ms = step_plan.dropped_backlog.as_millis() as u64,
                max_ticks_per_frame, "sim_clamp_triggered"
            );
        }

        let elapsed = Instant::now().saturating_duration_since(now);
        let pacing_sleep = compute_pacing_sleep(elapsed, fixed_dt);
        if pacing_sleep > Duration::ZERO {
            thread::sleep(pacing_sleep);
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct StepPlan {
    ticks_to_run: u32,
    remaining_accumulator: Duration,
    dropped_backlog: Duration,
}

fn plan_sim_steps(
    mut accumulator: Duration,
    fixed_dt: Duration,
    max_ticks_per_frame: u32,
) -> StepPlan {
    let mut ticks_to_run = 0u32;

    while accumulator >= fixed_dt && ticks_to_run < max_ticks_per_frame {
        accumulator = accumulator.saturating_sub(fixed_dt);
        ticks_to_run = ticks_to_run.saturating_add(1);
    }

    let dropped_backlog = if accumulator >= fixed_dt {
        std::mem::take(&mut accumulator)
    } else {
        Duration::ZERO
    };
    StepPlan {
        ticks_to_run,
        remaining_accumulator: accumulator,
        dropped_backlog,
    }
}

fn clamp_frame_delta(frame_dt: Duration, max_frame_delta: Duration) -> Duration {
    frame_dt.min(max_frame_delta)
}

fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}

fn compute_pacing_sleep(elapsed: Duration, target: Duration) -> Duration {
    target.saturating_sub(elapsed)
}

fn resolve_realtime(config_realtime: bool) -> bool {
    match env::var(REALTIME_ENV_VAR) {
        Ok(value) => match parse_flag(&value) {
            Some(flag) => flag,
            None => {
                warn!(
                    env_var = REALTIME_ENV_VAR,
                    value = value.as_str(),
                    "invalid realtime env var value; falling back to config"
                );
                config_realtime
            }
        },
        Err(env::VarError::NotPresent) => config_realtime,
        Err(err) => {
            warn!(
                env_var = REALTIME_ENV_VAR,
                error = %err,
                "unable to read realtime env var; falling back to config"
            );
            config_realtime
        }
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
