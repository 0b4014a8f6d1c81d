#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
enum LoopPhase {
    Idle,
    Recording,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
struct LoopSettings {
    loop_duration_seconds: f32,
    max_clones: u32,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            loop_duration_seconds: DEFAULT_LOOP_DURATION_SECONDS,
            max_clones: 0,
        }
    }
}

impl LoopSettings {
    fn from_start_zone(zone: &StartZoneDef) -> Self {
        Self {
            loop_duration_seconds: zone.loop_duration_seconds,
            max_clones: zone.max_clones,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum ClearReason {
    EndZone,
    ResetLevel,
    FirstStartZoneEntry,
}

#[derive(Debug, Clone, PartialEq)]
enum LoopEvent {
    RecordingStarted { loop_duration_seconds: f32 },
    RecordingPaused { frames: usize },
    RecordingResumed { frames: usize },
    RecordingCompleted { frames: usize },
    CloneCommitted {
        clone_id: EntityId,
        frames: usize,
        clones_spawned: u32,
    },
    DegenerateClone { clone_id: EntityId },
    PlaybackStarted { clones: usize },
    SessionCleared {
        reason: ClearReason,
        clones_destroyed: usize,
    },
    PromptShown { text: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopEventKind {
    RecordingStarted,
    RecordingPaused,
    RecordingResumed,
    RecordingCompleted,
    CloneCommitted,
    DegenerateClone,
    PlaybackStarted,
    SessionCleared,
    PromptShown,
}

impl LoopEvent {
    fn kind(&self) -> LoopEventKind {
        match self {
            Self::RecordingStarted { .. } => LoopEventKind::RecordingStarted,
            Self::RecordingPaused { .. } => LoopEventKind::RecordingPaused,
            Self::RecordingResumed { .. } => LoopEventKind::RecordingResumed,
            Self::RecordingCompleted { .. } => LoopEventKind::RecordingCompleted,
            Self::CloneCommitted { .. } => LoopEventKind::CloneCommitted,
            Self::DegenerateClone { .. } => LoopEventKind::DegenerateClone,
            Self::PlaybackStarted { .. } => LoopEventKind::PlaybackStarted,
            Self::SessionCleared { .. } => LoopEventKind::SessionCleared,
            Self::PromptShown { .. } => LoopEventKind::PromptShown,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
struct LoopEventCounts {
    total: u32,
    recordings_started: u32,
    recordings_completed: u32,
    clones_committed: u32,
    degenerate_clones: u32,
    playbacks_started: u32,
    sessions_cleared: u32,
}

impl LoopEventCounts {
    fn record(&mut self, kind: LoopEventKind) {
        self.total = self.total.saturating_add(1);
        match kind {
            LoopEventKind::RecordingStarted => {
                self.recordings_started = self.recordings_started.saturating_add(1)
            }
            LoopEventKind::RecordingCompleted => {
                self.recordings_completed = self.recordings_completed.saturating_add(1)
            }
            LoopEventKind::CloneCommitted => {
                self.clones_committed = self.clones_committed.saturating_add(1)
            }
            LoopEventKind::DegenerateClone => {
                self.degenerate_clones = self.degenerate_clones.saturating_add(1)
            }
            LoopEventKind::PlaybackStarted => {
                self.playbacks_started = self.playbacks_started.saturating_add(1)
            }
            LoopEventKind::SessionCleared => {
                self.sessions_cleared = self.sessions_cleared.saturating_add(1)
            }
            LoopEventKind::RecordingPaused
            | LoopEventKind::RecordingResumed
            | LoopEventKind::PromptShown => {}
        }
    }
}

/// Events emitted since the last rollover. Presentation reads them once
/// per tick, then `finish_tick_rollover` folds them into counts.
#[derive(Debug, Default)]
struct LoopEventBus {
    current_tick_events: Vec<LoopEvent>,
    last_tick_counts: LoopEventCounts,
}

impl LoopEventBus {
    fn emit(&mut self, event: LoopEvent) {
        self.current_tick_events.push(event);
    }

    fn iter_emitted_so_far(&self) -> impl Iterator<Item = &LoopEvent> {
        self.current_tick_events.iter()
    }

    fn finish_tick_rollover(&mut self) {
        let mut counts = LoopEventCounts::default();
        for event in &self.current_tick_events {
            counts.record(event.kind());
        }
        self.last_tick_counts = counts;
        self.current_tick_events.clear();
    }

    fn last_tick_counts(&self) -> LoopEventCounts {
        self.last_tick_counts
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopErrorKind {
    Precondition,
    MissingCollaborator,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
enum LoopError {
    #[error("clone capacity reached ({max_clones}); reset the level to record again")]
    CapacityReached { max_clones: u32 },
    #[error("a completed recording is waiting to be committed")]
    AwaitingCommit,
    #[error("loop is {actual:?}, expected {expected:?}")]
    WrongPhase {
        expected: LoopPhase,
        actual: LoopPhase,
    },
    #[error("player is inside the start zone")]
    PlayerInStartZone,
    #[error("player is outside the start zone")]
    PlayerOutsideStartZone,
    #[error("no clones to play back")]
    NoClones,
    #[error("no pending recording to commit")]
    NoPendingSequence,
    #[error("no spawn point is set")]
    MissingSpawnPoint,
    #[error("no clone prefab is configured")]
    MissingClonePrefab,
    #[error("player actor or its recorder is missing")]
    MissingPlayer,
    #[error("spawned clone {} has no recorder", clone_id.0)]
    MissingRecorder { clone_id: EntityId },
}

impl LoopError {
    fn kind(&self) -> LoopErrorKind {
        match self {
            Self::CapacityReached { .. }
            | Self::AwaitingCommit
            | Self::WrongPhase { .. }
            | Self::PlayerInStartZone
            | Self::PlayerOutsideStartZone
            | Self::NoClones
            | Self::NoPendingSequence => LoopErrorKind::Precondition,
            Self::MissingSpawnPoint
            | Self::MissingClonePrefab
            | Self::MissingPlayer
            | Self::MissingRecorder { .. } => LoopErrorKind::MissingCollaborator,
        }
    }
}

/// What the L key ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopKeyOutcome {
    CloneCommitted(EntityId),
    PlaybackStarted(usize),
}

#[derive(Debug, Clone, Serialize)]
struct RecorderStateSnapshot {
    entity_id: u64,
    mode: RecorderMode,
    armed: bool,
    replaying: bool,
    frames: usize,
    cursor: usize,
    pose: Pose,
}

#[derive(Debug, Clone, Serialize)]
struct LoopSessionSnapshot {
    phase: LoopPhase,
    timer_seconds: f64,
    timer_running: bool,
    settings: LoopSettings,
    deferred_settings: Option<LoopSettings>,
    clones_spawned: u32,
    player_in_start_zone: bool,
    spawn_point: Option<Pose>,
    pending_frames: Option<usize>,
    player: Option<RecorderStateSnapshot>,
    clones: Vec<RecorderStateSnapshot>,
}

#[derive(Debug, Clone, Serialize)]
struct LevelStateSnapshot {
    level: String,
    tick: u64,
    prompt: Option<String>,
    last_tick_events: LoopEventCounts,
    session: LoopSessionSnapshot,
}
