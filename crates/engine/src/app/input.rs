#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputAction {
    MoveForward,
    MoveBack,
    MoveLeft,
    MoveRight,
    Jump,
    /// L key: return to spawn and commit, or restart clone playback.
    LoopCommand,
    /// R key: reset the level completely.
    ResetLevel,
    Quit,
}

const ACTION_COUNT: usize = 8;

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ActionStates {
    down: [bool; ACTION_COUNT],
}

impl ActionStates {
    pub(crate) fn set(&mut self, action: InputAction, is_down: bool) {
        self.down[action.index()] = is_down;
    }

    pub(crate) fn is_down(&self, action: InputAction) -> bool {
        self.down[action.index()]
    }
}

impl InputAction {
    const fn index(self) -> usize {
        match self {
            InputAction::MoveForward => 0,
            InputAction::MoveBack => 1,
            InputAction::MoveLeft => 2,
            InputAction::MoveRight => 3,
            InputAction::Jump => 4,
            InputAction::LoopCommand => 5,
            InputAction::ResetLevel => 6,
            InputAction::Quit => 7,
        }
    }
}

/// Per-tick movement intent in the actor's local frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InputIntent {
    pub horizontal: f32,
    pub vertical: f32,
    pub jump: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InputSnapshot {
    quit_requested: bool,
    actions: ActionStates,
    pressed: ActionStates,
}

impl InputSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn quit_requested(&self) -> bool {
        self.quit_requested
    }

    pub fn is_down(&self, action: InputAction) -> bool {
        self.actions.is_down(action)
    }

    /// True only on the tick the action went from up to down.
    pub fn was_pressed(&self, action: InputAction) -> bool {
        self.pressed.is_down(action)
    }

    pub fn with_action_down(mut self, action: InputAction, is_down: bool) -> Self {
        self.actions.set(action, is_down);
        self
    }

    pub fn with_action_pressed(mut self, action: InputAction, pressed: bool) -> Self {
        self.pressed.set(action, pressed);
        if pressed {
            self.actions.set(action, true);
        }
        self
    }

    pub fn with_quit_requested(mut self, quit_requested: bool) -> Self {
        self.quit_requested = quit_requested;
        self
    }

    pub fn movement_intent(&self) -> InputIntent {
        let mut horizontal = 0.0f32;
        let mut vertical = 0.0f32;
        if self.is_down(InputAction::MoveRight) {
            horizontal += 1.0;
        }
        if self.is_down(InputAction::MoveLeft) {
            horizontal -= 1.0;
        }
        if self.is_down(InputAction::MoveForward) {
            vertical += 1.0;
        }
        if self.is_down(InputAction::MoveBack) {
            vertical -= 1.0;
        }
        InputIntent {
            horizontal,
            vertical,
            jump: self.was_pressed(InputAction::Jump),
        }
    }
}

/// Collects held action state between ticks and derives single-tick press edges.
#[derive(Debug, Default)]
pub struct InputCollector {
    quit_requested: bool,
    down: ActionStates,
    pressed_edges: ActionStates,
}

impl InputCollector {
    pub fn set_action(&mut self, action: InputAction, is_down: bool) {
        if is_down && !self.down.is_down(action) {
            self.pressed_edges.set(action, true);
        }
        self.down.set(action, is_down);
        if action == InputAction::Quit && is_down {
            self.quit_requested = true;
        }
    }

    pub fn mark_quit_requested(&mut self) {
        self.quit_requested = true;
    }

    pub fn snapshot_for_tick(&mut self) -> InputSnapshot {
        let snapshot = InputSnapshot {
            quit_requested: self.quit_requested,
            actions: self.down,
            pressed: self.pressed_edges,
        };
        self.pressed_edges = ActionStates::default();
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn press_is_edge_triggered_for_single_tick() {
        let mut input = InputCollector::default();
        input.set_action(InputAction::Jump, true);

        let first = input.snapshot_for_tick();
        let second = input.snapshot_for_tick();

        assert!(first.was_pressed(InputAction::Jump));
        assert!(!second.was_pressed(InputAction::Jump));
        assert!(second.is_down(InputAction::Jump));
    }

    #[test]
    fn held_key_does_not_spam_press_edges() {
        let mut input = InputCollector::default();

        input.set_action(InputAction::LoopCommand, true);
        let first = input.snapshot_for_tick();
        input.set_action(InputAction::LoopCommand, true);
        let second = input.snapshot_for_tick();
        input.set_action(InputAction::LoopCommand, false);
        input.set_action(InputAction::LoopCommand, true);
        let third = input.snapshot_for_tick();

        assert!(first.was_pressed(InputAction::LoopCommand));
        assert!(!second.was_pressed(InputAction::LoopCommand));
        assert!(third.was_pressed(InputAction::LoopCommand));
    }

    #[test]
    fn key_release_clears_action_state() {
        let mut input = InputCollector::default();
        input.set_action(InputAction::MoveForward, true);
        input.set_action(InputAction::MoveForward, false);
        assert!(!input.snapshot_for_tick().is_down(InputAction::MoveForward));
    }

    #[test]
    fn movement_intent_cancels_opposing_keys() {
        let snapshot = InputSnapshot::empty()
            .with_action_down(InputAction::MoveLeft, true)
            .with_action_down(InputAction::MoveRight, true)
            .with_action_down(InputAction::MoveForward, true)
            .with_action_pressed(InputAction::Jump, true);

        let intent = snapshot.movement_intent();
        assert_eq!(intent.horizontal, 0.0);
        assert_eq!(intent.vertical, 1.0);
        assert!(intent.jump);
    }

    #[test]
    fn quit_action_latches_quit_request() {
        let mut input = InputCollector::default();
        input.set_action(InputAction::Quit, true);
        input.set_action(InputAction::Quit, false);
        assert!(input.snapshot_for_tick().quit_requested());
    }
}
