use super::actor::{Actor, ActorHost};
use super::input::{InputIntent, InputSnapshot};
use super::pose::Pose;
use super::track::{RecorderTick, TrackRecorder};
use crate::content::{ActorArchetype, DefDatabase};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneCommand {
    None,
    HardReset,
    Quit,
}

/// Containment changes reported by zone triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneSignal {
    EnteredStartZone,
    EnteredStartZoneFirstTime,
    ExitedStartZone,
    EnteredEndZone,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SceneDebugCommand {
    StartPlayback,
    ReturnToSpawn,
    ResetLevel,
    CompleteRecording,
    Zone { signal: ZoneSignal },
    DumpState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SceneDebugCommandResult {
    Unsupported,
    Success(String),
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorKind {
    Player,
    Clone,
}

#[derive(Debug, Clone)]
pub struct ActorBody {
    pub pose: Pose,
    pub input_intent: InputIntent,
    pub movement_enabled: bool,
    pub move_speed: f32,
}

impl Actor for ActorBody {
    fn current_pose(&self) -> Pose {
        self.pose
    }

    fn current_input_intent(&self) -> InputIntent {
        self.input_intent
    }

    fn set_pose(&mut self, pose: Pose) {
        self.pose = pose;
    }

    fn set_movement_enabled(&mut self, enabled: bool) {
        self.movement_enabled = enabled;
        if !enabled {
            self.input_intent = InputIntent::default();
        }
    }
}

#[derive(Debug, Clone)]
pub struct ActorSpawn {
    pub kind: ActorKind,
    pub label: String,
    pub pose: Pose,
    pub move_speed: f32,
    pub movement_enabled: bool,
    pub with_recorder: bool,
}

#[derive(Debug, Clone)]
pub struct Entity {
    pub id: EntityId,
    pub kind: ActorKind,
    pub label: String,
    pub body: ActorBody,
    pub recorder: Option<TrackRecorder>,
    applied_spawn_order: u64,
}

impl Entity {
    pub fn applied_spawn_order(&self) -> u64 {
        self.applied_spawn_order
    }
}

#[derive(Debug, Default)]
pub struct EntityIdAllocator {
    next: u64,
}

impl EntityIdAllocator {
    pub fn allocate(&mut self) -> EntityId {
        let id = EntityId(self.next);
        self.next = self.next.saturating_add(1);
        id
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecorderTickStats {
    pub captured: usize,
    pub drove: usize,
}

#[derive(Debug, Default)]
pub struct SceneWorld {
    allocator: EntityIdAllocator,
    entities: Vec<Entity>,
    pending_spawns: Vec<Entity>,
    pending_despawns: Vec<EntityId>,
    next_applied_spawn_order: u64,
    def_database: Option<DefDatabase>,
    recorder_stats: RecorderTickStats,
}

impl SceneWorld {
    pub fn spawn_actor(&mut self, spawn: ActorSpawn) -> EntityId {
        let id = self.allocator.allocate();
        self.pending_spawns.push(Entity {
            id,
            kind: spawn.kind,
            label: spawn.label,
            body: ActorBody {
                pose: spawn.pose,
                input_intent: InputIntent::default(),
                movement_enabled: spawn.movement_enabled,
                move_speed: spawn.move_speed,
            },
            recorder: spawn.with_recorder.then(TrackRecorder::new),
            applied_spawn_order: 0,
        });
        id
    }

    pub fn despawn(&mut self, id: EntityId) -> bool {
        let exists_now = self.entities.iter().any(|entity| entity.id == id);
        let pending_spawn = self.pending_spawns.iter().any(|entity| entity.id == id);
        if !exists_now && !pending_spawn {
            return false;
        }
        self.pending_despawns.push(id);
        true
    }

    pub fn apply_pending(&mut self) {
        if !self.pending_despawns.is_empty() {
            self.pending_despawns.sort();
            self.pending_despawns.dedup();
            let pending = &self.pending_despawns;
            self.entities
                .retain(|entity| pending.binary_search(&entity.id).is_err());
            // A spawn despawned before it was applied never becomes visible.
            self.pending_spawns
                .retain(|entity| pending.binary_search(&entity.id).is_err());
            self.pending_despawns.clear();
        }

        for mut entity in self.pending_spawns.drain(..) {
            entity.applied_spawn_order = self.next_applied_spawn_order;
            self.next_applied_spawn_order = self.next_applied_spawn_order.saturating_add(1);
            self.entities.push(entity);
        }
    }

    pub fn clear(&mut self) {
        self.entities.clear();
        self.pending_spawns.clear();
        self.pending_despawns.clear();
        self.next_applied_spawn_order = 0;
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn count_kind(&self, kind: ActorKind) -> usize {
        self.entities
            .iter()
            .filter(|entity| entity.kind == kind)
            .count()
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn entities_mut(&mut self) -> &mut [Entity] {
        &mut self.entities
    }

    pub fn find_entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.iter().find(|entity| entity.id == id)
    }

    pub fn find_entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.iter_mut().find(|entity| entity.id == id)
    }

    /// Like `find_entity_mut`, but also resolves spawns not yet applied.
    /// Entities already queued for despawn are not returned.
    pub fn find_live_or_pending_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        if self.pending_despawns.contains(&id) {
            return None;
        }
        self.entities
            .iter_mut()
            .chain(self.pending_spawns.iter_mut())
            .find(|entity| entity.id == id)
    }

    /// Advances every applied recorder by exactly one tick.
    pub fn tick_recorders(&mut self) -> RecorderTickStats {
        let mut stats = RecorderTickStats::default();
        for entity in &mut self.entities {
            let Some(recorder) = entity.recorder.as_mut() else {
                continue;
            };
            match recorder.tick(&mut entity.body) {
                RecorderTick::Captured => stats.captured += 1,
                RecorderTick::Drove => stats.drove += 1,
                RecorderTick::Idle => {}
            }
        }
        self.recorder_stats.captured += stats.captured;
        self.recorder_stats.drove += stats.drove;
        stats
    }

    /// Recorder activity accumulated since the previous call.
    pub fn take_recorder_stats(&mut self) -> RecorderTickStats {
        std::mem::take(&mut self.recorder_stats)
    }

    pub fn set_def_database(&mut self, def_database: DefDatabase) {
        self.def_database = Some(def_database);
    }

    pub fn def_database(&self) -> Option<&DefDatabase> {
        self.def_database.as_ref()
    }
}

impl ActorHost for SceneWorld {
    fn spawn_clone(&mut self, prefab: &ActorArchetype, pose: Pose) -> EntityId {
        self.spawn_actor(ActorSpawn {
            kind: ActorKind::Clone,
            label: prefab.label.clone(),
            pose,
            move_speed: prefab.move_speed,
            movement_enabled: false,
            with_recorder: prefab.has_recorder,
        })
    }

    fn despawn_actor(&mut self, id: EntityId) -> bool {
        self.despawn(id)
    }

    fn actor_mut(&mut self, id: EntityId) -> Option<&mut dyn Actor> {
        self.find_live_or_pending_mut(id)
            .map(|entity| &mut entity.body as &mut dyn Actor)
    }

    fn recorder_mut(&mut self, id: EntityId) -> Option<&mut TrackRecorder> {
        self.find_live_or_pending_mut(id)
            .and_then(|entity| entity.recorder.as_mut())
    }
}

pub trait Scene {
    fn load(&mut self, world: &mut SceneWorld);
    fn update(
        &mut self,
        fixed_dt_seconds: f32,
        input: &InputSnapshot,
        world: &mut SceneWorld,
    ) -> SceneCommand;
    fn unload(&mut self, world: &mut SceneWorld);
    fn debug_title(&self, _world: &SceneWorld) -> Option<String> {
        None
    }
    fn execute_debug_command(
        &mut self,
        _command: SceneDebugCommand,
        _world: &mut SceneWorld,
    ) -> SceneDebugCommandResult {
        SceneDebugCommandResult::Unsupported
    }
}

pub(crate) struct SceneHost {
    scene: Box<dyn Scene>,
    world: SceneWorld,
    is_loaded: bool,
}

impl SceneHost {
    pub(crate) fn new(scene: Box<dyn Scene>) -> Self {
        Self {
            scene,
            world: SceneWorld::default(),
            is_loaded: false,
        }
    }

    pub(crate) fn set_def_database(&mut self, def_database: DefDatabase) {
        self.world.set_def_database(def_database);
    }

    pub(crate) fn load(&mut self) {
        if self.is_loaded {
            return;
        }
        self.scene.load(&mut self.world);
        self.is_loaded = true;
    }

    pub(crate) fn update(&mut self, fixed_dt_seconds: f32, input: &InputSnapshot) -> SceneCommand {
        self.scene.update(fixed_dt_seconds, input, &mut self.world)
    }

    pub(crate) fn apply_pending(&mut self) {
        self.world.apply_pending();
    }

    pub(crate) fn world(&self) -> &SceneWorld {
        &self.world
    }

    pub(crate) fn take_recorder_stats(&mut self) -> RecorderTickStats {
        self.world.take_recorder_stats()
    }

    #[cfg(test)]
    pub(crate) fn world_mut(&mut self) -> &mut SceneWorld {
        &mut self.world
    }

    pub(crate) fn debug_title(&self) -> Option<String> {
        self.scene.debug_title(&self.world)
    }

    pub(crate) fn execute_debug_command(
        &mut self,
        command: SceneDebugCommand,
    ) -> SceneDebugCommandResult {
        self.scene.execute_debug_command(command, &mut self.world)
    }

    pub(crate) fn hard_reset(&mut self) {
        if self.is_loaded {
            self.scene.unload(&mut self.world);
        }
        self.world.clear();
        self.scene.load(&mut self.world);
        self.is_loaded = true;
    }

    pub(crate) fn shutdown(&mut self) {
        if self.is_loaded {
            self.scene.unload(&mut self.world);
            self.world.clear();
            self.is_loaded = false;
        }
    }
}
