//! Scripted input for headless runs.
//!
//! A run script is a JSON document naming the level, how many ticks to run,
//! and the key/console activity for specific ticks:
//!
//! ```json
//! { "level": "level.intro", "ticks": 600,
//!   "steps": [ { "tick": 0, "hold": ["forward"] },
//!              { "tick": 240, "release": ["forward"], "press": ["l"] } ] }
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use engine::{InputAction, InputCollector, InputSource, TickInput, TickScheduler};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum ScriptKey {
    #[serde(alias = "w")]
    Forward,
    #[serde(alias = "s")]
    Back,
    #[serde(alias = "a")]
    Left,
    #[serde(alias = "d")]
    Right,
    #[serde(alias = "space")]
    Jump,
    #[serde(alias = "l")]
    Loop,
    #[serde(alias = "r")]
    Reset,
    Quit,
}

impl ScriptKey {
    fn action(self) -> InputAction {
        match self {
            Self::Forward => InputAction::MoveForward,
            Self::Back => InputAction::MoveBack,
            Self::Left => InputAction::MoveLeft,
            Self::Right => InputAction::MoveRight,
            Self::Jump => InputAction::Jump,
            Self::Loop => InputAction::LoopCommand,
            Self::Reset => InputAction::ResetLevel,
            Self::Quit => InputAction::Quit,
        }
    }
}

/// Input changes applied at the start of `tick`. `press` taps a key for
/// exactly one tick; `hold` and `release` change held state until the
/// next step says otherwise.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ScriptStep {
    pub(crate) tick: u64,
    #[serde(default)]
    pub(crate) hold: Vec<ScriptKey>,
    #[serde(default)]
    pub(crate) release: Vec<ScriptKey>,
    #[serde(default)]
    pub(crate) press: Vec<ScriptKey>,
    #[serde(default)]
    pub(crate) commands: Vec<String>,
    #[serde(default)]
    pub(crate) quit: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RunScript {
    #[serde(default)]
    pub(crate) level: Option<String>,
    pub(crate) ticks: u64,
    #[serde(default)]
    pub(crate) steps: Vec<ScriptStep>,
}

#[derive(Debug, Error)]
pub(crate) enum ScriptError {
    #[error("failed to read run script '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse run script '{}' at {at}: {source}", path.display())]
    Parse {
        path: PathBuf,
        at: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("step {index} targets tick {tick} but the script only runs {ticks} tick(s)")]
    StepOutOfRange { index: usize, tick: u64, ticks: u64 },
}

pub(crate) fn load_script(path: &Path) -> Result<RunScript, ScriptError> {
    let raw = fs::read_to_string(path).map_err(|source| ScriptError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_script(&raw, path)
}

pub(crate) fn parse_script(raw: &str, path: &Path) -> Result<RunScript, ScriptError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    let script: RunScript = serde_path_to_error::deserialize(&mut deserializer).map_err(|error| {
        let at = error.path().to_string();
        ScriptError::Parse {
            path: path.to_path_buf(),
            at,
            source: error.into_inner(),
        }
    })?;
    for (index, step) in script.steps.iter().enumerate() {
        if step.tick >= script.ticks {
            return Err(ScriptError::StepOutOfRange {
                index,
                tick: step.tick,
                ticks: script.ticks,
            });
        }
    }
    Ok(script)
}

/// Replays a `RunScript` as per-tick input. Steps sharing a tick apply in
/// file order.
pub(crate) struct ScriptedInput {
    ticks: u64,
    steps: TickScheduler<ScriptStep>,
    releases: TickScheduler<InputAction>,
    collector: InputCollector,
}

impl ScriptedInput {
    pub(crate) fn new(script: RunScript) -> Self {
        let mut steps = TickScheduler::new();
        for step in script.steps {
            steps.schedule_at(step.tick, step);
        }
        Self {
            ticks: script.ticks,
            steps,
            releases: TickScheduler::new(),
            collector: InputCollector::default(),
        }
    }

    fn apply_step(&mut self, tick: u64, step: ScriptStep, console_lines: &mut Vec<String>) {
        for key in step.release {
            self.collector.set_action(key.action(), false);
        }
        for key in step.hold {
            self.collector.set_action(key.action(), true);
        }
        for key in step.press {
            let action = key.action();
            self.collector.set_action(action, false);
            self.collector.set_action(action, true);
            self.releases.schedule_after(tick, 1, action);
        }
        console_lines.extend(step.commands);
        if step.quit {
            self.collector.mark_quit_requested();
        }
    }
}

impl InputSource for ScriptedInput {
    fn next_tick(&mut self, tick: u64) -> Option<TickInput> {
        if tick >= self.ticks {
            return None;
        }
        for action in self.releases.drain_due(tick) {
            self.collector.set_action(action, false);
        }
        let mut console_lines = Vec::new();
        for step in self.steps.drain_due(tick) {
            debug!(tick, "script_step_applied");
            self.apply_step(tick, step, &mut console_lines);
        }
        Some(TickInput {
            snapshot: self.collector.snapshot_for_tick(),
            console_lines,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> Result<RunScript, ScriptError> {
        parse_script(raw, Path::new("test.json"))
    }

    #[test]
    fn parses_keys_aliases_and_defaults() {
        let script = parse(
            r#"{
                "ticks": 10,
                "steps": [
                    { "tick": 0, "hold": ["forward", "d"] },
                    { "tick": 4, "press": ["l"], "commands": ["dump_state"] }
                ]
            }"#,
        )
        .expect("script parses");

        assert_eq!(script.level, None);
        assert_eq!(script.ticks, 10);
        assert_eq!(script.steps[0].hold, vec![ScriptKey::Forward, ScriptKey::Right]);
        assert_eq!(script.steps[1].press, vec![ScriptKey::Loop]);
        assert!(script.steps[1].release.is_empty());
        assert!(!script.steps[1].quit);
    }

    #[test]
    fn parse_error_reports_json_path() {
        let error = parse(r#"{ "ticks": 5, "steps": [ { "tick": 1, "hold": ["jetpack"] } ] }"#)
            .expect_err("unknown key must fail");
        let ScriptError::Parse { at, .. } = &error else {
            panic!("expected parse error, got {error:?}");
        };
        assert_eq!(at, "steps[0].hold[0]");
        assert!(error.to_string().contains("test.json"));

        let error = parse(r#"{ "ticks": 5, "speed": 2 }"#).expect_err("unknown field");
        assert!(matches!(error, ScriptError::Parse { .. }));
    }

    #[test]
    fn steps_past_the_last_tick_are_rejected() {
        let error = parse(r#"{ "ticks": 3, "steps": [ { "tick": 0 }, { "tick": 3 } ] }"#)
            .expect_err("step out of range");
        assert!(matches!(
            error,
            ScriptError::StepOutOfRange {
                index: 1,
                tick: 3,
                ticks: 3
            }
        ));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = std::env::temp_dir().join("recall-script-missing-test");
        let error = load_script(&dir.join("nope.json")).expect_err("missing file");
        assert!(matches!(error, ScriptError::Read { .. }));
    }

    #[test]
    fn scripted_input_holds_taps_and_ends() {
        let script = parse(
            r#"{
                "ticks": 5,
                "steps": [
                    { "tick": 0, "hold": ["w"] },
                    { "tick": 1, "press": ["l"], "commands": ["dump_state"] },
                    { "tick": 3, "release": ["w"], "quit": true }
                ]
            }"#,
        )
        .expect("script parses");
        let mut input = ScriptedInput::new(script);

        let tick0 = input.next_tick(0).expect("tick 0");
        assert!(tick0.snapshot.is_down(InputAction::MoveForward));
        assert!(tick0.console_lines.is_empty());

        let tick1 = input.next_tick(1).expect("tick 1");
        assert!(tick1.snapshot.was_pressed(InputAction::LoopCommand));
        assert!(tick1.snapshot.is_down(InputAction::MoveForward));
        assert_eq!(tick1.console_lines, vec!["dump_state".to_string()]);

        let tick2 = input.next_tick(2).expect("tick 2");
        assert!(!tick2.snapshot.is_down(InputAction::LoopCommand));
        assert!(!tick2.snapshot.was_pressed(InputAction::MoveForward));
        assert!(!tick2.snapshot.quit_requested());

        let tick3 = input.next_tick(3).expect("tick 3");
        assert!(!tick3.snapshot.is_down(InputAction::MoveForward));
        assert!(tick3.snapshot.quit_requested());

        assert!(input.next_tick(4).is_some());
        assert!(input.next_tick(5).is_none());
    }
}
