use crate::content::ActorArchetype;

use super::input::InputIntent;
use super::pose::Pose;
use super::scene::EntityId;
use super::track::TrackRecorder;

/// What a recorder needs from the actor it is attached to.
pub trait Actor {
    fn current_pose(&self) -> Pose;
    fn current_input_intent(&self) -> InputIntent;
    fn set_pose(&mut self, pose: Pose);
    fn set_movement_enabled(&mut self, enabled: bool);
}

/// Spawn and lookup surface the loop orchestration drives actors through.
///
/// Spawned actors may still be pending; implementations must resolve pending
/// ids in `actor_mut`/`recorder_mut` so a clone can be configured on the tick
/// it was spawned.
pub trait ActorHost {
    fn spawn_clone(&mut self, prefab: &ActorArchetype, pose: Pose) -> EntityId;
    fn despawn_actor(&mut self, id: EntityId) -> bool;
    fn actor_mut(&mut self, id: EntityId) -> Option<&mut dyn Actor>;
    fn recorder_mut(&mut self, id: EntityId) -> Option<&mut TrackRecorder>;
}
