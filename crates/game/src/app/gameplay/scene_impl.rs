struct LevelScene {
    level_name: String,
    level_label: String,
    ticks_per_second: u32,
    tick: u64,
    player_id: Option<EntityId>,
    orchestrator: LoopOrchestrator,
    zones: ZoneTracker,
    prompt: PromptPanel,
    system_order_text: String,
}

impl LevelScene {
    fn new(level_name: &str, ticks_per_second: u32) -> Self {
        Self {
            level_name: level_name.to_string(),
            level_label: level_name.to_string(),
            ticks_per_second: ticks_per_second.max(1),
            tick: 0,
            player_id: None,
            orchestrator: LoopOrchestrator::default(),
            zones: ZoneTracker::default(),
            prompt: PromptPanel::default(),
            system_order_text: GAMEPLAY_SYSTEM_ORDER_TEXT.to_string(),
        }
    }

    fn reset_runtime_state(&mut self) {
        self.tick = 0;
        self.player_id = None;
        self.orchestrator = LoopOrchestrator::default();
        self.zones = ZoneTracker::default();
        self.prompt.clear();
        self.level_label = self.level_name.clone();
    }

    fn spawn_level(&mut self, world: &mut SceneWorld) -> Result<(), String> {
        let def_database = world
            .def_database()
            .ok_or_else(|| "def database is not loaded".to_string())?;
        let level = def_database
            .level_def_by_name(&self.level_name)
            .ok_or_else(|| format!("unknown LevelDef '{}'", self.level_name))?
            .clone();
        let player_def = def_database
            .actor_def(level.player_def)
            .cloned()
            .ok_or_else(|| format!("player def missing for level '{}'", level.def_name))?;
        let clone_def = def_database
            .actor_def(level.clone_def)
            .cloned()
            .ok_or_else(|| format!("clone def missing for level '{}'", level.def_name))?;

        let player_id = world.spawn_actor(ActorSpawn {
            kind: ActorKind::Player,
            label: player_def.label.clone(),
            pose: Pose::at(level.player_start),
            move_speed: player_def.move_speed,
            movement_enabled: true,
            with_recorder: player_def.has_recorder,
        });
        if !player_def.has_recorder {
            warn!(def_name = %player_def.def_name, "player_def_without_recorder");
        }

        self.player_id = Some(player_id);
        self.level_label = level.label.clone();
        self.orchestrator.bind_player(player_id);
        self.orchestrator.set_clone_prefab(clone_def);
        if let Some(zone) = level.start_zones.first() {
            self.orchestrator.configure(LoopSettings::from_start_zone(zone));
            self.orchestrator.set_spawn_point(zone.spawn);
        }
        self.zones = ZoneTracker::from_level(&level);
        Ok(())
    }

    fn apply_player_intent_and_movement(
        &mut self,
        fixed_dt_seconds: f32,
        input: &InputSnapshot,
        world: &mut SceneWorld,
    ) -> Option<Vec3> {
        let entity = world.find_entity_mut(self.player_id?)?;
        let body = &mut entity.body;
        if !body.movement_enabled {
            body.input_intent = InputIntent::default();
            return Some(body.pose.position);
        }
        body.input_intent = input.movement_intent();
        let delta = movement_delta(
            body.input_intent,
            body.pose.orientation,
            body.move_speed,
            fixed_dt_seconds,
        );
        body.pose.position = body.pose.position + delta;
        Some(body.pose.position)
    }

    fn apply_zone_transition(&mut self, transition: ZoneTransition, world: &mut SceneWorld) {
        debug!(tick = self.tick, transition = ?transition, "zone_transition");
        let outcome = match transition {
            ZoneTransition::EnteredStart {
                zone_index,
                first_time,
            } => {
                if first_time {
                    self.orchestrator.entered_start_zone_first_time(world);
                }
                self.apply_zone_signal(ZoneSignal::EnteredStartZone, Some(zone_index), world)
            }
            ZoneTransition::ExitedStart { zone_index } => {
                self.apply_zone_signal(ZoneSignal::ExitedStartZone, Some(zone_index), world)
            }
            ZoneTransition::EnteredEnd => {
                self.apply_zone_signal(ZoneSignal::EnteredEndZone, None, world)
            }
        };
        if let Err(error) = outcome {
            self.log_rejection("zone_trigger", &error);
        }
    }

    /// Routes one zone signal into the orchestrator. Entering a start zone
    /// also adopts that zone's settings and spawn point.
    fn apply_zone_signal(
        &mut self,
        signal: ZoneSignal,
        zone_index: Option<usize>,
        world: &mut SceneWorld,
    ) -> Result<(), LoopError> {
        match signal {
            ZoneSignal::EnteredStartZoneFirstTime => {
                self.orchestrator.entered_start_zone_first_time(world);
                Ok(())
            }
            ZoneSignal::EnteredStartZone => {
                if let Some(zone) = zone_index.and_then(|index| self.zones.start_zone(index)) {
                    self.orchestrator
                        .configure(LoopSettings::from_start_zone(zone));
                    self.orchestrator.set_spawn_point(zone.spawn);
                }
                self.orchestrator.entered_start_zone(world);
                Ok(())
            }
            ZoneSignal::ExitedStartZone => self.orchestrator.exited_start_zone(world),
            ZoneSignal::EnteredEndZone => {
                self.orchestrator.entered_end_zone(world);
                Ok(())
            }
        }
    }

    fn run_loop_commands(&mut self, input: &InputSnapshot, world: &mut SceneWorld) {
        if input.was_pressed(InputAction::LoopCommand) {
            match self.orchestrator.handle_loop_key(world) {
                Ok(LoopKeyOutcome::CloneCommitted(clone_id)) => {
                    debug!(tick = self.tick, clone_id = clone_id.0, "loop_key_committed_clone");
                }
                Ok(LoopKeyOutcome::PlaybackStarted(clones)) => {
                    debug!(tick = self.tick, clones, "loop_key_restarted_playback");
                }
                Err(error) => self.log_rejection("loop_key", &error),
            }
        }
        if input.was_pressed(InputAction::ResetLevel) {
            self.orchestrator.reset_level(world);
        }
    }

    fn present_loop_events(&mut self) {
        let mut show = None;
        let mut hide = false;
        for event in self.orchestrator.events.iter_emitted_so_far() {
            match event {
                LoopEvent::PromptShown { text } => {
                    show = Some(text.clone());
                    hide = false;
                }
                LoopEvent::CloneCommitted { .. }
                | LoopEvent::SessionCleared {
                    reason: ClearReason::EndZone | ClearReason::ResetLevel,
                    ..
                } => {
                    show = None;
                    hide = true;
                }
                _ => {}
            }
        }
        if hide {
            self.prompt.hide();
        }
        if let Some(text) = show {
            self.prompt.show(text, self.tick, None);
        }
        self.prompt.update(self.tick);
        self.orchestrator.events.finish_tick_rollover();
    }

    fn log_rejection(&self, command: &'static str, error: &LoopError) {
        warn!(
            command,
            kind = ?error.kind(),
            phase = ?self.orchestrator.phase(),
            error = %error,
            "loop_command_rejected"
        );
    }

    fn state_snapshot(&self, world: &SceneWorld) -> LevelStateSnapshot {
        LevelStateSnapshot {
            level: self.level_name.clone(),
            tick: self.tick,
            prompt: self.prompt.text().map(str::to_string),
            last_tick_events: self.orchestrator.events.last_tick_counts(),
            session: self.orchestrator.session_snapshot(world),
        }
    }
}

impl Scene for LevelScene {
    fn load(&mut self, world: &mut SceneWorld) {
        self.reset_runtime_state();
        if let Err(error) = self.spawn_level(world) {
            warn!(level = %self.level_name, error = %error, "level_load_failed");
            return;
        }
        self.prompt.show(
            CONTROLS_PROMPT_TEXT,
            self.tick,
            Some(seconds_to_ticks(CONTROLS_PROMPT_SECONDS, self.ticks_per_second)),
        );
        world.apply_pending();
        info!(
            scene = %self.level_label,
            level = %self.level_name,
            entity_count = world.entity_count(),
            start_zones = self.zones.start_zones.len(),
            end_zones = self.zones.end_zones.len(),
            sys = %self.system_order_text,
            "scene_loaded"
        );
    }

    fn update(
        &mut self,
        fixed_dt_seconds: f32,
        input: &InputSnapshot,
        world: &mut SceneWorld,
    ) -> SceneCommand {
        if self.player_id.is_none() {
            return SceneCommand::None;
        }

        if let Some(position) =
            self.apply_player_intent_and_movement(fixed_dt_seconds, input, world)
        {
            for transition in self.zones.observe(position) {
                self.apply_zone_transition(transition, world);
            }
        }

        let recorder_stats = world.tick_recorders();
        debug!(
            tick = self.tick,
            captured = recorder_stats.captured,
            drove = recorder_stats.drove,
            "recorders_ticked"
        );

        self.orchestrator.tick(fixed_dt_seconds, world);
        self.run_loop_commands(input, world);
        self.present_loop_events();

        self.tick = self.tick.saturating_add(1);
        SceneCommand::None
    }

    fn unload(&mut self, world: &mut SceneWorld) {
        info!(
            level = %self.level_name,
            ticks = self.tick,
            clones = self.orchestrator.live_clones().len(),
            "scene_unloaded"
        );
        world.clear();
        self.reset_runtime_state();
    }

    fn debug_title(&self, _world: &SceneWorld) -> Option<String> {
        Some(format!(
            "{} | {:?} | clones {}/{}",
            self.level_label,
            self.orchestrator.phase(),
            self.orchestrator.clones_spawned(),
            self.orchestrator.settings.max_clones
        ))
    }

    fn execute_debug_command(
        &mut self,
        command: SceneDebugCommand,
        world: &mut SceneWorld,
    ) -> SceneDebugCommandResult {
        if self.player_id.is_none() {
            return SceneDebugCommandResult::Error(format!(
                "level '{}' is not loaded",
                self.level_name
            ));
        }
        match command {
            SceneDebugCommand::StartPlayback => loop_result_message(
                self.orchestrator.start_playback(world),
                |clones| format!("ok: restarted {clones} clone(s)"),
            ),
            SceneDebugCommand::ReturnToSpawn => loop_result_message(
                self.orchestrator.return_to_spawn(world),
                |clone_id| format!("ok: clone {} committed", clone_id.0),
            ),
            SceneDebugCommand::ResetLevel => {
                self.orchestrator.reset_level(world);
                SceneDebugCommandResult::Success("ok: level reset".to_string())
            }
            SceneDebugCommand::CompleteRecording => loop_result_message(
                self.orchestrator.complete_recording(world),
                |frames| format!("ok: recording completed with {frames} frame(s)"),
            ),
            SceneDebugCommand::Zone { signal } => {
                let zone_index = self.zones.active_start_zone_index();
                let result = self.apply_zone_signal(signal, zone_index, world);
                self.zones.apply_injected_signal(signal, zone_index);
                let phase = self.orchestrator.phase();
                loop_result_message(result, |()| format!("ok: {signal:?} -> {phase:?}"))
            }
            SceneDebugCommand::DumpState => {
                match serde_json::to_string_pretty(&self.state_snapshot(world)) {
                    Ok(json) => SceneDebugCommandResult::Success(json),
                    Err(error) => {
                        SceneDebugCommandResult::Error(format!("failed to encode state: {error}"))
                    }
                }
            }
        }
    }
}
