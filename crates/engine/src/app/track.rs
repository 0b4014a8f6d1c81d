//! Per-actor capture and replay of fixed-tick frame samples.
//!
//! A `TrackRecorder` either samples its actor once per tick while armed
//! (`Recording`) or drives the actor's pose from a stored sequence
//! (`Replaying`). The tick index is the sample index; samples carry no
//! timestamps.

use serde::Serialize;

use super::actor::Actor;
use super::pose::{Pose, Quat, Vec3};

/// One captured tick of movement-relevant actor state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FrameSample {
    pub horizontal_input: f32,
    pub vertical_input: f32,
    pub jump_requested: bool,
    pub position: Vec3,
    pub orientation: Quat,
}

impl FrameSample {
    pub fn pose(&self) -> Pose {
        Pose {
            position: self.position,
            orientation: self.orientation,
        }
    }
}

/// Ordered samples owned by exactly one recorder.
///
/// `Clone` is a deep copy; handing a sequence to another actor never shares
/// storage with the original.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordedSequence {
    frames: Vec<FrameSample>,
}

impl RecordedSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_frames(frames: Vec<FrameSample>) -> Self {
        Self { frames }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&FrameSample> {
        self.frames.get(index)
    }

    pub fn last(&self) -> Option<&FrameSample> {
        self.frames.last()
    }

    pub fn frames(&self) -> &[FrameSample] {
        &self.frames
    }

    pub fn poses(&self) -> Vec<Pose> {
        self.frames.iter().map(FrameSample::pose).collect()
    }

    fn push(&mut self, sample: FrameSample) {
        self.frames.push(sample);
    }

    fn clear(&mut self) {
        self.frames.clear();
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum RecorderMode {
    #[default]
    Recording,
    Replaying,
}

/// What a single `TrackRecorder::tick` did to its actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderTick {
    Idle,
    Captured,
    Drove,
}

#[derive(Debug, Clone, Default)]
pub struct TrackRecorder {
    mode: RecorderMode,
    armed: bool,
    replay_active: bool,
    sequence: RecordedSequence,
    cursor: usize,
}

impl TrackRecorder {
    /// Starts in `Recording` mode, disarmed, with an empty sequence.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> RecorderMode {
        self.mode
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn is_replaying(&self) -> bool {
        self.mode == RecorderMode::Replaying && self.replay_active
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn sequence(&self) -> &RecordedSequence {
        &self.sequence
    }

    /// Replay has written every sample; the actor now holds the final pose.
    pub fn is_replay_finished(&self) -> bool {
        self.mode == RecorderMode::Replaying && self.cursor >= self.sequence.len()
    }

    pub fn arm(&mut self) {
        self.armed = true;
    }

    /// Pauses sampling. The sequence and mode are untouched.
    pub fn disarm(&mut self) {
        self.armed = false;
    }

    /// Switches to `Recording` and rewinds the cursor. Existing frames are
    /// kept; use `clear_sequence` to discard them.
    pub fn begin_recording(&mut self) {
        self.mode = RecorderMode::Recording;
        self.replay_active = false;
        self.cursor = 0;
    }

    pub fn end_recording(&mut self) {
        self.disarm();
    }

    pub fn begin_replaying(&mut self) {
        self.mode = RecorderMode::Replaying;
        self.armed = false;
        self.replay_active = true;
        self.cursor = 0;
    }

    /// Halts pose driving and rewinds. Safe to call on a recorder that is
    /// not replaying.
    pub fn stop_replaying(&mut self) {
        self.replay_active = false;
        self.cursor = 0;
    }

    /// Replaces the sequence with an owned copy and rewinds.
    pub fn install_sequence(&mut self, sequence: RecordedSequence) {
        self.sequence = sequence;
        self.cursor = 0;
    }

    pub fn clear_sequence(&mut self) {
        self.sequence.clear();
        self.cursor = 0;
    }

    /// Deep copy of the current sequence.
    pub fn snapshot(&self) -> RecordedSequence {
        self.sequence.clone()
    }

    pub fn tick(&mut self, actor: &mut dyn Actor) -> RecorderTick {
        match self.mode {
            RecorderMode::Recording => {
                if !self.armed {
                    return RecorderTick::Idle;
                }
                let intent = actor.current_input_intent();
                let pose = actor.current_pose();
                self.sequence.push(FrameSample {
                    horizontal_input: intent.horizontal,
                    vertical_input: intent.vertical,
                    jump_requested: intent.jump,
                    position: pose.position,
                    orientation: pose.orientation,
                });
                RecorderTick::Captured
            }
            RecorderMode::Replaying => {
                if !self.replay_active {
                    return RecorderTick::Idle;
                }
                let Some(sample) = self.sequence.get(self.cursor) else {
                    return RecorderTick::Idle;
                };
                actor.set_pose(sample.pose());
                self.cursor += 1;
                RecorderTick::Drove
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::input::InputIntent;

    #[derive(Default)]
    struct TestActor {
        pose: Pose,
        intent: InputIntent,
        movement_enabled: bool,
    }

    impl Actor for TestActor {
        fn current_pose(&self) -> Pose {
            self.pose
        }

        fn current_input_intent(&self) -> InputIntent {
            self.intent
        }

        fn set_pose(&mut self, pose: Pose) {
            self.pose = pose;
        }

        fn set_movement_enabled(&mut self, enabled: bool) {
            self.movement_enabled = enabled;
        }
    }

    fn record_walk(recorder: &mut TrackRecorder, actor: &mut TestActor, ticks: usize) {
        for step in 0..ticks {
            actor.pose = Pose::with_yaw_degrees(
                Vec3::new(step as f32 * 0.1, 0.0, step as f32 * -0.05),
                step as f32,
            );
            actor.intent = InputIntent {
                horizontal: 1.0,
                vertical: -1.0,
                jump: step % 7 == 0,
            };
            recorder.tick(&mut *actor);
        }
    }

    #[test]
    fn new_recorder_is_disarmed_recording_and_empty() {
        let recorder = TrackRecorder::new();
        assert_eq!(recorder.mode(), RecorderMode::Recording);
        assert!(!recorder.is_armed());
        assert!(recorder.sequence().is_empty());
        assert_eq!(recorder.cursor(), 0);
    }

    #[test]
    fn disarmed_recorder_captures_nothing() {
        let mut recorder = TrackRecorder::new();
        let mut actor = TestActor::default();
        assert_eq!(recorder.tick(&mut actor), RecorderTick::Idle);
        assert!(recorder.sequence().is_empty());
    }

    #[test]
    fn armed_recorder_captures_intent_and_pose() {
        let mut recorder = TrackRecorder::new();
        let mut actor = TestActor::default();
        recorder.arm();
        record_walk(&mut recorder, &mut actor, 3);

        let frames = recorder.sequence().frames();
        assert_eq!(frames.len(), 3);
        assert!(frames[0].jump_requested);
        assert!(!frames[1].jump_requested);
        assert_eq!(frames[2].horizontal_input, 1.0);
        assert_eq!(frames[2].vertical_input, -1.0);
        assert_eq!(frames[2].position, Vec3::new(0.2, 0.0, -0.1));
    }

    #[test]
    fn replay_reproduces_recorded_poses_in_order() {
        for ticks in [0usize, 1, 2, 17, 120] {
            let mut recorder = TrackRecorder::new();
            let mut actor = TestActor::default();
            recorder.arm();
            record_walk(&mut recorder, &mut actor, ticks);
            recorder.end_recording();
            let expected = recorder.sequence().poses();

            let mut clone = TestActor::default();
            recorder.begin_replaying();
            let mut observed = Vec::new();
            for _ in 0..ticks {
                assert_eq!(recorder.tick(&mut clone), RecorderTick::Drove);
                observed.push(clone.pose);
            }
            assert_eq!(observed, expected, "ticks={ticks}");
        }
    }

    #[test]
    fn replay_holds_final_pose_after_sequence_end() {
        let mut recorder = TrackRecorder::new();
        let mut actor = TestActor::default();
        recorder.arm();
        record_walk(&mut recorder, &mut actor, 4);
        let last = recorder.sequence().last().map(FrameSample::pose);

        let mut clone = TestActor::default();
        recorder.begin_replaying();
        for _ in 0..10 {
            recorder.tick(&mut clone);
        }
        assert!(recorder.is_replay_finished());
        assert_eq!(recorder.cursor(), 4);
        assert_eq!(Some(clone.pose), last);
    }

    #[test]
    fn replaying_empty_sequence_is_noop() {
        let mut recorder = TrackRecorder::new();
        let mut actor = TestActor {
            pose: Pose::at(Vec3::new(5.0, 0.0, 5.0)),
            ..TestActor::default()
        };
        recorder.begin_replaying();
        assert_eq!(recorder.tick(&mut actor), RecorderTick::Idle);
        assert_eq!(actor.pose.position, Vec3::new(5.0, 0.0, 5.0));
    }

    #[test]
    fn stop_replaying_is_idempotent() {
        let mut recorder = TrackRecorder::new();
        let mut actor = TestActor::default();
        recorder.arm();
        record_walk(&mut recorder, &mut actor, 5);
        recorder.begin_replaying();
        recorder.tick(&mut actor);
        recorder.tick(&mut actor);

        recorder.stop_replaying();
        let once = (recorder.mode(), recorder.cursor(), recorder.is_replaying());
        recorder.stop_replaying();
        let twice = (recorder.mode(), recorder.cursor(), recorder.is_replaying());
        assert_eq!(once, twice);
        assert_eq!(recorder.cursor(), 0);
        assert_eq!(recorder.tick(&mut actor), RecorderTick::Idle);

        let mut fresh = TrackRecorder::new();
        fresh.stop_replaying();
        assert_eq!(fresh.mode(), RecorderMode::Recording);
    }

    #[test]
    fn pause_keeps_frames_and_resume_appends() {
        let mut recorder = TrackRecorder::new();
        let mut actor = TestActor::default();
        recorder.arm();
        record_walk(&mut recorder, &mut actor, 10);
        recorder.disarm();
        record_walk(&mut recorder, &mut actor, 5);
        assert_eq!(recorder.sequence().len(), 10);

        recorder.arm();
        record_walk(&mut recorder, &mut actor, 3);
        assert_eq!(recorder.sequence().len(), 13);
    }

    #[test]
    fn begin_recording_does_not_clear_sequence() {
        let mut recorder = TrackRecorder::new();
        let mut actor = TestActor::default();
        recorder.arm();
        record_walk(&mut recorder, &mut actor, 4);
        recorder.begin_replaying();
        recorder.tick(&mut actor);

        recorder.begin_recording();
        assert_eq!(recorder.mode(), RecorderMode::Recording);
        assert_eq!(recorder.cursor(), 0);
        assert_eq!(recorder.sequence().len(), 4);
    }

    #[test]
    fn snapshot_is_isolated_from_later_mutation() {
        let mut recorder = TrackRecorder::new();
        let mut actor = TestActor::default();
        recorder.arm();
        record_walk(&mut recorder, &mut actor, 6);
        let snapshot = recorder.snapshot();

        recorder.clear_sequence();
        record_walk(&mut recorder, &mut actor, 2);

        assert_eq!(snapshot.len(), 6);
        assert_eq!(recorder.sequence().len(), 2);
    }
}
