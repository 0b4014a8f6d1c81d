use std::collections::HashMap;

use crate::app::{Pose, Vec3};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActorDefId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LevelDefId(pub u32);

/// Prefab for a spawnable actor. `has_recorder` decides whether spawned
/// instances carry a `TrackRecorder` component.
#[derive(Debug, Clone, PartialEq)]
pub struct ActorArchetype {
    pub id: ActorDefId,
    pub def_name: String,
    pub label: String,
    pub move_speed: f32,
    pub has_recorder: bool,
}

/// Axis-aligned trigger volume. Boundary points count as inside.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoneBox {
    pub center: Vec3,
    pub half_extents: Vec3,
}

impl ZoneBox {
    pub fn contains(&self, point: Vec3) -> bool {
        (point.x - self.center.x).abs() <= self.half_extents.x
            && (point.y - self.center.y).abs() <= self.half_extents.y
            && (point.z - self.center.z).abs() <= self.half_extents.z
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StartZoneDef {
    pub bounds: ZoneBox,
    pub loop_duration_seconds: f32,
    pub max_clones: u32,
    pub spawn: Pose,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LevelDef {
    pub id: LevelDefId,
    pub def_name: String,
    pub label: String,
    pub player_def: ActorDefId,
    pub clone_def: ActorDefId,
    pub player_start: Vec3,
    pub start_zones: Vec<StartZoneDef>,
    pub end_zones: Vec<ZoneBox>,
}

#[derive(Debug, Default, Clone)]
pub struct DefDatabase {
    actor_defs: Vec<ActorArchetype>,
    actor_ids_by_name: HashMap<String, ActorDefId>,
    level_defs: Vec<LevelDef>,
    level_ids_by_name: HashMap<String, LevelDefId>,
}

impl DefDatabase {
    /// Ids are assigned from slice order, so callers pass defs sorted by name.
    pub(crate) fn from_defs(
        mut actor_defs: Vec<ActorArchetype>,
        mut level_defs: Vec<LevelDef>,
    ) -> Self {
        let mut actor_ids_by_name = HashMap::with_capacity(actor_defs.len());
        for (idx, def) in actor_defs.iter_mut().enumerate() {
            let id = ActorDefId(idx as u32);
            def.id = id;
            actor_ids_by_name.insert(def.def_name.clone(), id);
        }
        let mut level_ids_by_name = HashMap::with_capacity(level_defs.len());
        for (idx, def) in level_defs.iter_mut().enumerate() {
            let id = LevelDefId(idx as u32);
            def.id = id;
            level_ids_by_name.insert(def.def_name.clone(), id);
        }
        Self {
            actor_defs,
            actor_ids_by_name,
            level_defs,
            level_ids_by_name,
        }
    }

    pub fn actor_def_id_by_name(&self, name: &str) -> Option<ActorDefId> {
        self.actor_ids_by_name.get(name).copied()
    }

    pub fn actor_def(&self, id: ActorDefId) -> Option<&ActorArchetype> {
        self.actor_defs.get(id.0 as usize)
    }

    pub fn actor_defs(&self) -> &[ActorArchetype] {
        &self.actor_defs
    }

    pub fn level_def_id_by_name(&self, name: &str) -> Option<LevelDefId> {
        self.level_ids_by_name.get(name).copied()
    }

    pub fn level_def(&self, id: LevelDefId) -> Option<&LevelDef> {
        self.level_defs.get(id.0 as usize)
    }

    pub fn level_def_by_name(&self, name: &str) -> Option<&LevelDef> {
        self.level_def_id_by_name(name)
            .and_then(|id| self.level_def(id))
    }

    pub fn level_defs(&self) -> &[LevelDef] {
        &self.level_defs
    }
}
