/// Session state machine for the record / commit / replay loop.
///
/// Never constructs actors itself: clones come from `ActorHost::spawn_clone`
/// and every recorder is reached through the host by entity id.
#[derive(Debug)]
struct LoopOrchestrator {
    phase: LoopPhase,
    timer_seconds: f64,
    timer_running: bool,
    settings: LoopSettings,
    deferred_settings: Option<LoopSettings>,
    clones_spawned: u32,
    spawn_point: Option<Pose>,
    clone_prefab: Option<ActorArchetype>,
    player_id: Option<EntityId>,
    player_in_start_zone: bool,
    live_clones: Vec<EntityId>,
    pending_sequence: Option<RecordedSequence>,
    events: LoopEventBus,
}

impl Default for LoopOrchestrator {
    fn default() -> Self {
        Self {
            phase: LoopPhase::Idle,
            timer_seconds: 0.0,
            timer_running: false,
            settings: LoopSettings::default(),
            deferred_settings: None,
            clones_spawned: 0,
            spawn_point: None,
            clone_prefab: None,
            player_id: None,
            player_in_start_zone: true,
            live_clones: Vec::new(),
            pending_sequence: None,
            events: LoopEventBus::default(),
        }
    }
}

impl LoopOrchestrator {
    fn bind_player(&mut self, player_id: EntityId) {
        self.player_id = Some(player_id);
    }

    fn set_clone_prefab(&mut self, prefab: ActorArchetype) {
        self.clone_prefab = Some(prefab);
    }

    /// Applies a start zone's loop duration and capacity. A running
    /// countdown keeps the duration it started with.
    ///
    /// A capacity below the clones already committed (plus the one being
    /// recorded or awaiting commit) is held back until history is cleared,
    /// so `clones_spawned` never exceeds `max_clones`.
    fn configure(&mut self, settings: LoopSettings) {
        let in_use = self
            .clones_spawned
            .saturating_add(u32::from(self.phase != LoopPhase::Idle));
        if settings.max_clones < in_use {
            if self.deferred_settings != Some(settings) {
                info!(
                    max_clones = settings.max_clones,
                    clones_spawned = self.clones_spawned,
                    phase = ?self.phase,
                    "loop_settings_deferred"
                );
            }
            self.deferred_settings = Some(settings);
            return;
        }
        self.deferred_settings = None;
        if settings != self.settings {
            info!(
                loop_duration_seconds = settings.loop_duration_seconds,
                max_clones = settings.max_clones,
                "loop_settings_updated"
            );
        }
        self.settings = settings;
    }

    /// Called once clones and the pending recording are gone.
    fn apply_deferred_settings(&mut self) {
        if let Some(settings) = self.deferred_settings.take() {
            self.configure(settings);
        }
    }

    fn set_spawn_point(&mut self, spawn_point: Pose) {
        self.spawn_point = Some(spawn_point);
    }

    fn phase(&self) -> LoopPhase {
        self.phase
    }

    fn clones_spawned(&self) -> u32 {
        self.clones_spawned
    }

    fn live_clones(&self) -> &[EntityId] {
        &self.live_clones
    }

    #[cfg(test)]
    fn pending_sequence(&self) -> Option<&RecordedSequence> {
        self.pending_sequence.as_ref()
    }

    #[cfg(test)]
    fn timer_seconds(&self) -> f64 {
        self.timer_seconds
    }

    #[cfg(test)]
    fn is_timer_running(&self) -> bool {
        self.timer_running
    }

    #[cfg(test)]
    fn player_in_start_zone(&self) -> bool {
        self.player_in_start_zone
    }

    fn player_recorder<'h>(&self, host: &'h mut dyn ActorHost) -> Option<&'h mut TrackRecorder> {
        host.recorder_mut(self.player_id?)
    }

    fn has_capacity(&self) -> bool {
        self.clones_spawned < self.settings.max_clones
    }

    fn entered_start_zone(&mut self, host: &mut dyn ActorHost) {
        self.player_in_start_zone = true;
        let Some(recorder) = self.player_recorder(host) else {
            return;
        };
        recorder.disarm();
        if self.phase == LoopPhase::Recording {
            let frames = recorder.sequence().len();
            info!(frames, "recording_paused");
            self.events.emit(LoopEvent::RecordingPaused { frames });
        }
    }

    fn exited_start_zone(&mut self, host: &mut dyn ActorHost) -> Result<(), LoopError> {
        self.player_in_start_zone = false;
        match self.phase {
            LoopPhase::Recording => {
                let recorder = self
                    .player_recorder(host)
                    .ok_or(LoopError::MissingPlayer)?;
                recorder.arm();
                let frames = recorder.sequence().len();
                info!(frames, "recording_resumed");
                self.events.emit(LoopEvent::RecordingResumed { frames });
                Ok(())
            }
            LoopPhase::Completed => Err(LoopError::AwaitingCommit),
            LoopPhase::Idle => {
                if !self.has_capacity() {
                    return Err(LoopError::CapacityReached {
                        max_clones: self.settings.max_clones,
                    });
                }
                let recorder = self
                    .player_recorder(host)
                    .ok_or(LoopError::MissingPlayer)?;
                // Every loop records from an empty sequence.
                recorder.clear_sequence();
                recorder.begin_recording();
                recorder.arm();
                self.timer_seconds = f64::from(self.settings.loop_duration_seconds);
                self.timer_running = true;
                self.phase = LoopPhase::Recording;
                info!(
                    loop_duration_seconds = self.settings.loop_duration_seconds,
                    clones_spawned = self.clones_spawned,
                    max_clones = self.settings.max_clones,
                    "recording_started"
                );
                self.events.emit(LoopEvent::RecordingStarted {
                    loop_duration_seconds: self.settings.loop_duration_seconds,
                });
                Ok(())
            }
        }
    }

    /// Advances the countdown. Expiry completes the recording only once the
    /// player is outside the start zone; until then the timer stays expired.
    fn tick(&mut self, fixed_dt_seconds: f32, host: &mut dyn ActorHost) {
        if self.phase != LoopPhase::Recording || !self.timer_running {
            return;
        }
        self.timer_seconds -= f64::from(fixed_dt_seconds);
        if self.timer_seconds > TIMER_EPSILON_SECONDS
            || self.player_in_start_zone
            || !self.has_capacity()
        {
            return;
        }
        if let Err(error) = self.complete_recording(host) {
            warn!(error = %error, "loop_timer_completion_failed");
        }
    }

    fn complete_recording(&mut self, host: &mut dyn ActorHost) -> Result<usize, LoopError> {
        if self.phase != LoopPhase::Recording {
            return Err(LoopError::WrongPhase {
                expected: LoopPhase::Recording,
                actual: self.phase,
            });
        }
        let player_id = self.player_id.ok_or(LoopError::MissingPlayer)?;
        let recorder = host
            .recorder_mut(player_id)
            .ok_or(LoopError::MissingPlayer)?;
        recorder.end_recording();
        let snapshot = recorder.snapshot();
        let frames = snapshot.len();
        self.pending_sequence = Some(snapshot);
        if let Some(player) = host.actor_mut(player_id) {
            player.set_movement_enabled(false);
        }

        self.timer_running = false;
        self.timer_seconds = 0.0;
        self.phase = LoopPhase::Completed;
        info!(frames, "recording_completed");
        self.events.emit(LoopEvent::RecordingCompleted { frames });
        self.events.emit(LoopEvent::PromptShown {
            text: RECORDING_COMPLETE_PROMPT_TEXT.to_string(),
        });
        Ok(frames)
    }

    /// Commits the pending recording as a new clone at the spawn point and
    /// sends the player back to record the next loop.
    fn return_to_spawn(&mut self, host: &mut dyn ActorHost) -> Result<EntityId, LoopError> {
        if self.phase != LoopPhase::Completed {
            return Err(LoopError::WrongPhase {
                expected: LoopPhase::Completed,
                actual: self.phase,
            });
        }
        if self.player_in_start_zone {
            return Err(LoopError::PlayerInStartZone);
        }
        let spawn_point = self.spawn_point.ok_or(LoopError::MissingSpawnPoint)?;
        let prefab = self
            .clone_prefab
            .as_ref()
            .ok_or(LoopError::MissingClonePrefab)?;
        if self.pending_sequence.is_none() {
            return Err(LoopError::NoPendingSequence);
        }
        let player_id = self.player_id.ok_or(LoopError::MissingPlayer)?;
        if host.recorder_mut(player_id).is_none() {
            return Err(LoopError::MissingPlayer);
        }

        let clone_id = host.spawn_clone(prefab, spawn_point);
        let Some(clone_recorder) = host.recorder_mut(clone_id) else {
            host.despawn_actor(clone_id);
            return Err(LoopError::MissingRecorder { clone_id });
        };
        let sequence = self.pending_sequence.take().unwrap_or_default();
        let frames = sequence.len();
        clone_recorder.install_sequence(sequence);
        clone_recorder.begin_replaying();
        if frames == 0 {
            warn!(clone_id = clone_id.0, "degenerate_clone_committed");
            self.events.emit(LoopEvent::DegenerateClone { clone_id });
        }
        self.live_clones.push(clone_id);
        self.clones_spawned = self.clones_spawned.saturating_add(1);

        if let Some(player) = host.actor_mut(player_id) {
            player.set_pose(spawn_point);
            player.set_movement_enabled(true);
        }
        if let Some(recorder) = host.recorder_mut(player_id) {
            recorder.clear_sequence();
            recorder.begin_recording();
        }
        self.restart_clones(spawn_point, host);
        self.phase = LoopPhase::Idle;

        info!(
            clone_id = clone_id.0,
            frames,
            clones_spawned = self.clones_spawned,
            max_clones = self.settings.max_clones,
            "clone_committed"
        );
        self.events.emit(LoopEvent::CloneCommitted {
            clone_id,
            frames,
            clones_spawned: self.clones_spawned,
        });
        Ok(clone_id)
    }

    fn start_playback(&mut self, host: &mut dyn ActorHost) -> Result<usize, LoopError> {
        if self.phase != LoopPhase::Idle {
            return Err(LoopError::WrongPhase {
                expected: LoopPhase::Idle,
                actual: self.phase,
            });
        }
        if !self.player_in_start_zone {
            return Err(LoopError::PlayerOutsideStartZone);
        }
        if self.live_clones.is_empty() {
            return Err(LoopError::NoClones);
        }
        let spawn_point = self.spawn_point.ok_or(LoopError::MissingSpawnPoint)?;
        let clones = self.restart_clones(spawn_point, host);
        info!(clones, "playback_started");
        self.events.emit(LoopEvent::PlaybackStarted { clones });
        Ok(clones)
    }

    /// L key: commit when a finished recording waits outside the start
    /// zone, otherwise restart clone playback.
    fn handle_loop_key(&mut self, host: &mut dyn ActorHost) -> Result<LoopKeyOutcome, LoopError> {
        if self.phase == LoopPhase::Completed && !self.player_in_start_zone {
            self.return_to_spawn(host)
                .map(LoopKeyOutcome::CloneCommitted)
        } else {
            self.start_playback(host)
                .map(LoopKeyOutcome::PlaybackStarted)
        }
    }

    fn entered_end_zone(&mut self, host: &mut dyn ActorHost) {
        self.timer_running = false;
        self.timer_seconds = 0.0;
        if let Some(player_id) = self.player_id {
            if self.phase == LoopPhase::Recording {
                if let Some(recorder) = host.recorder_mut(player_id) {
                    recorder.end_recording();
                }
            }
            if let Some(player) = host.actor_mut(player_id) {
                player.set_movement_enabled(true);
            }
        }
        let clones_destroyed = self.destroy_clones(host);
        self.pending_sequence = None;
        self.clones_spawned = 0;
        self.phase = LoopPhase::Idle;
        self.apply_deferred_settings();
        info!(clones_destroyed, "level_end_reached");
        self.events.emit(LoopEvent::SessionCleared {
            reason: ClearReason::EndZone,
            clones_destroyed,
        });
    }

    fn reset_level(&mut self, host: &mut dyn ActorHost) {
        let clones_destroyed = self.clear_history(host);
        match (self.player_id, self.spawn_point) {
            (Some(player_id), Some(spawn_point)) => {
                if let Some(player) = host.actor_mut(player_id) {
                    player.set_pose(spawn_point);
                }
            }
            (_, None) => warn!("reset_without_spawn_point"),
            (None, Some(_)) => {}
        }
        info!(clones_destroyed, "level_reset");
        self.events.emit(LoopEvent::SessionCleared {
            reason: ClearReason::ResetLevel,
            clones_destroyed,
        });
    }

    fn entered_start_zone_first_time(&mut self, host: &mut dyn ActorHost) {
        let clones_destroyed = self.clear_history(host);
        info!(clones_destroyed, "loop_history_cleared");
        self.events.emit(LoopEvent::SessionCleared {
            reason: ClearReason::FirstStartZoneEntry,
            clones_destroyed,
        });
    }

    fn clear_history(&mut self, host: &mut dyn ActorHost) -> usize {
        let clones_destroyed = self.destroy_clones(host);
        self.pending_sequence = None;
        self.clones_spawned = 0;
        self.timer_running = false;
        self.timer_seconds = 0.0;
        self.phase = LoopPhase::Idle;
        self.apply_deferred_settings();
        if let Some(player_id) = self.player_id {
            if let Some(recorder) = host.recorder_mut(player_id) {
                recorder.disarm();
                recorder.clear_sequence();
                recorder.begin_recording();
            }
            if let Some(player) = host.actor_mut(player_id) {
                player.set_movement_enabled(true);
            }
        }
        clones_destroyed
    }

    fn destroy_clones(&mut self, host: &mut dyn ActorHost) -> usize {
        let count = self.live_clones.len();
        for clone_id in self.live_clones.drain(..) {
            host.despawn_actor(clone_id);
        }
        count
    }

    /// Puts every live clone back at the spawn pose replaying from the
    /// first sample, so all clones run in lockstep.
    fn restart_clones(&mut self, spawn_point: Pose, host: &mut dyn ActorHost) -> usize {
        let mut restarted = 0;
        for &clone_id in &self.live_clones {
            let Some(recorder) = host.recorder_mut(clone_id) else {
                warn!(clone_id = clone_id.0, "clone_missing_recorder");
                continue;
            };
            recorder.stop_replaying();
            recorder.begin_replaying();
            if let Some(clone) = host.actor_mut(clone_id) {
                clone.set_pose(spawn_point);
            }
            restarted += 1;
        }
        restarted
    }

    fn session_snapshot(&self, world: &SceneWorld) -> LoopSessionSnapshot {
        let recorder_state = |id: EntityId| {
            let entity = world.find_entity(id)?;
            let recorder = entity.recorder.as_ref()?;
            Some(RecorderStateSnapshot {
                entity_id: id.0,
                mode: recorder.mode(),
                armed: recorder.is_armed(),
                replaying: recorder.is_replaying(),
                frames: recorder.sequence().len(),
                cursor: recorder.cursor(),
                pose: entity.body.pose,
            })
        };
        LoopSessionSnapshot {
            phase: self.phase,
            timer_seconds: self.timer_seconds,
            timer_running: self.timer_running,
            settings: self.settings,
            deferred_settings: self.deferred_settings,
            clones_spawned: self.clones_spawned,
            player_in_start_zone: self.player_in_start_zone,
            spawn_point: self.spawn_point,
            pending_frames: self.pending_sequence.as_ref().map(RecordedSequence::len),
            player: self.player_id.and_then(&recorder_state),
            clones: self
                .live_clones
                .iter()
                .filter_map(|&id| recorder_state(id))
                .collect(),
        }
    }
}
