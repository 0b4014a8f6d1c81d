use std::collections::VecDeque;

use crate::app::ZoneSignal;

use super::ConsoleState;

const MAX_PENDING_DEBUG_COMMANDS: usize = 128;

/// Commands the loop runner forwards to the scene or acts on itself.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum DebugCommand {
    ResetScene,
    Quit,
    StartPlayback,
    ReturnToSpawn,
    ResetLevel,
    CompleteRecording,
    Zone { signal: ZoneSignal },
    DumpState,
}

#[derive(Debug, Clone, PartialEq)]
enum Parsed {
    Help,
    Clear,
    Echo(String),
    Queue(DebugCommand),
}

#[derive(Debug, Clone, Copy)]
enum Arity {
    None,
    Rest,
    One,
}

struct CommandEntry {
    name: &'static str,
    args: &'static str,
    summary: &'static str,
    arity: Arity,
    build: fn(&[String]) -> Result<Parsed, String>,
}

/// Listed in `help` order.
const COMMANDS: &[CommandEntry] = &[
    CommandEntry {
        name: "help",
        args: "",
        summary: "List commands",
        arity: Arity::None,
        build: |_| Ok(Parsed::Help),
    },
    CommandEntry {
        name: "clear",
        args: "",
        summary: "Clear console output",
        arity: Arity::None,
        build: |_| Ok(Parsed::Clear),
    },
    CommandEntry {
        name: "echo",
        args: "<text...>",
        summary: "Print text to console",
        arity: Arity::Rest,
        build: |args| Ok(Parsed::Echo(args.join(" "))),
    },
    CommandEntry {
        name: "reset_scene",
        args: "",
        summary: "Reload the level scene",
        arity: Arity::None,
        build: |_| Ok(Parsed::Queue(DebugCommand::ResetScene)),
    },
    CommandEntry {
        name: "quit",
        args: "",
        summary: "Stop the run",
        arity: Arity::None,
        build: |_| Ok(Parsed::Queue(DebugCommand::Quit)),
    },
    CommandEntry {
        name: "start-playback",
        args: "",
        summary: "Restart every clone from the spawn point",
        arity: Arity::None,
        build: |_| Ok(Parsed::Queue(DebugCommand::StartPlayback)),
    },
    CommandEntry {
        name: "return-to-spawn",
        args: "",
        summary: "Commit the finished recording as a clone",
        arity: Arity::None,
        build: |_| Ok(Parsed::Queue(DebugCommand::ReturnToSpawn)),
    },
    CommandEntry {
        name: "reset-level",
        args: "",
        summary: "Destroy clones and clear all recordings",
        arity: Arity::None,
        build: |_| Ok(Parsed::Queue(DebugCommand::ResetLevel)),
    },
    CommandEntry {
        name: "complete-recording",
        args: "",
        summary: "Finish the running recording now",
        arity: Arity::None,
        build: |_| Ok(Parsed::Queue(DebugCommand::CompleteRecording)),
    },
    CommandEntry {
        name: "zone",
        args: "<enter-start|exit-start|first-start|enter-end>",
        summary: "Inject a zone signal",
        arity: Arity::One,
        build: parse_zone_signal,
    },
    CommandEntry {
        name: "dump_state",
        args: "",
        summary: "Print loop session state",
        arity: Arity::None,
        build: |_| Ok(Parsed::Queue(DebugCommand::DumpState)),
    },
];

impl CommandEntry {
    fn usage(&self) -> String {
        if self.args.is_empty() {
            self.name.to_string()
        } else {
            format!("{} {}", self.name, self.args)
        }
    }

    fn parse(&self, args: &[String]) -> Result<Parsed, String> {
        match (self.arity, args.len()) {
            (Arity::None, 0) | (Arity::One, 1) => {}
            (Arity::Rest, n) if n > 0 => {}
            (Arity::None, _) => return Err("unexpected extra arguments".to_string()),
            (Arity::One, _) => return Err("expected exactly one argument".to_string()),
            (Arity::Rest, _) => return Err(format!("missing required argument {}", self.args)),
        }
        (self.build)(args)
    }
}

fn parse_zone_signal(args: &[String]) -> Result<Parsed, String> {
    let signal = match args[0].to_ascii_lowercase().as_str() {
        "enter-start" => ZoneSignal::EnteredStartZone,
        "exit-start" => ZoneSignal::ExitedStartZone,
        "first-start" => ZoneSignal::EnteredStartZoneFirstTime,
        "enter-end" => ZoneSignal::EnteredEndZone,
        other => return Err(format!("unknown zone signal '{other}'")),
    };
    Ok(Parsed::Queue(DebugCommand::Zone { signal }))
}

fn find_command(name: &str) -> Option<&'static CommandEntry> {
    COMMANDS
        .iter()
        .find(|entry| entry.name.eq_ignore_ascii_case(name))
}

/// Turns console lines into immediate output or queued [`DebugCommand`]s.
#[derive(Debug, Default)]
pub(crate) struct ConsoleCommandProcessor {
    queued: VecDeque<DebugCommand>,
}

impl ConsoleCommandProcessor {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn process_pending_lines(&mut self, console: &mut ConsoleState) {
        let mut lines = Vec::new();
        console.drain_pending_lines_into(&mut lines);
        for line in lines {
            if let Err(message) = self.process_line(console, &line) {
                console.append_output_line(format!("error: {message}"));
            }
        }
    }

    pub(crate) fn drain_pending_debug_commands_into(&mut self, out: &mut Vec<DebugCommand>) {
        out.extend(self.queued.drain(..));
    }

    fn process_line(&mut self, console: &mut ConsoleState, line: &str) -> Result<(), String> {
        let words = split_words(line).map_err(|reason| format!("{reason}. usage: help"))?;
        let Some((name, args)) = words.split_first() else {
            return Ok(());
        };
        let entry =
            find_command(name).ok_or_else(|| format!("unknown command '{name}'. try: help"))?;
        let parsed = entry
            .parse(args)
            .map_err(|reason| format!("{reason}. usage: {}", entry.usage()))?;

        match parsed {
            Parsed::Help => {
                for entry in COMMANDS {
                    console.append_output_line(format!("{} - {}", entry.usage(), entry.summary));
                }
            }
            Parsed::Clear => console.clear_output_lines(),
            Parsed::Echo(text) => console.append_output_line(text),
            Parsed::Queue(command) => {
                if self.queued.len() == MAX_PENDING_DEBUG_COMMANDS {
                    self.queued.pop_front();
                }
                self.queued.push_back(command);
            }
        }
        Ok(())
    }
}

/// Whitespace-separated words; double quotes group words and may produce
/// an empty word (`""`).
fn split_words(line: &str) -> Result<Vec<String>, &'static str> {
    let mut words = Vec::new();
    let mut word: Option<String> = None;
    let mut quoted = false;

    for ch in line.chars() {
        if ch == '"' {
            quoted = !quoted;
            word.get_or_insert_with(String::new);
        } else if ch.is_whitespace() && !quoted {
            words.extend(word.take());
        } else {
            word.get_or_insert_with(String::new).push(ch);
        }
    }

    if quoted {
        return Err("unterminated quoted string");
    }
    words.extend(word);
    Ok(words)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_lines(lines: &[&str]) -> (Vec<String>, Vec<DebugCommand>) {
        let mut processor = ConsoleCommandProcessor::new();
        let mut console = ConsoleState::default();
        for line in lines {
            console.push_pending_line_for_test(line);
        }
        processor.process_pending_lines(&mut console);
        let output = console.output_lines().map(ToString::to_string).collect();
        let mut queued = Vec::new();
        processor.drain_pending_debug_commands_into(&mut queued);
        (output, queued)
    }

    #[test]
    fn help_lists_every_command_with_usage() {
        let (output, queued) = run_lines(&["help"]);

        assert!(queued.is_empty());
        assert_eq!(output.len(), COMMANDS.len());
        assert_eq!(output[0], "help - List commands");
        assert_eq!(output[2], "echo <text...> - Print text to console");
        assert_eq!(
            output[5],
            "start-playback - Restart every clone from the spawn point"
        );
        assert_eq!(
            output[9],
            "zone <enter-start|exit-start|first-start|enter-end> - Inject a zone signal"
        );
        assert_eq!(output[10], "dump_state - Print loop session state");
    }

    #[test]
    fn errors_name_the_problem_and_the_usage() {
        let (output, queued) = run_lines(&[
            "nope",
            "zone sideways",
            "zone",
            "reset-level now",
            "echo",
            "echo \"open",
        ]);

        assert!(queued.is_empty());
        assert_eq!(
            output,
            vec![
                "error: unknown command 'nope'. try: help",
                "error: unknown zone signal 'sideways'. usage: zone <enter-start|exit-start|first-start|enter-end>",
                "error: expected exactly one argument. usage: zone <enter-start|exit-start|first-start|enter-end>",
                "error: unexpected extra arguments. usage: reset-level",
                "error: missing required argument <text...>. usage: echo <text...>",
                "error: unterminated quoted string. usage: help",
            ]
        );
    }

    #[test]
    fn local_commands_apply_immediately() {
        let (output, queued) = run_lines(&["echo hi", "clear", "echo \"two  words\" tail", "   "]);

        assert!(queued.is_empty());
        assert_eq!(output, vec!["two  words tail"]);
    }

    #[test]
    fn loop_commands_queue_in_order_ignoring_case() {
        let (_, queued) = run_lines(&[
            "reset_scene",
            "START-PLAYBACK",
            "return-to-spawn",
            "reset-level",
            "complete-recording",
            "zone enter-start",
            "zone exit-start",
            "zone first-start",
            "zone Enter-End",
            "dump_state",
            "quit",
        ]);

        assert_eq!(
            queued,
            vec![
                DebugCommand::ResetScene,
                DebugCommand::StartPlayback,
                DebugCommand::ReturnToSpawn,
                DebugCommand::ResetLevel,
                DebugCommand::CompleteRecording,
                DebugCommand::Zone {
                    signal: ZoneSignal::EnteredStartZone
                },
                DebugCommand::Zone {
                    signal: ZoneSignal::ExitedStartZone
                },
                DebugCommand::Zone {
                    signal: ZoneSignal::EnteredStartZoneFirstTime
                },
                DebugCommand::Zone {
                    signal: ZoneSignal::EnteredEndZone
                },
                DebugCommand::DumpState,
                DebugCommand::Quit,
            ]
        );
    }

    #[test]
    fn command_names_are_unique() {
        for (index, entry) in COMMANDS.iter().enumerate() {
            assert!(
                COMMANDS[index + 1..]
                    .iter()
                    .all(|other| !other.name.eq_ignore_ascii_case(entry.name)),
                "duplicate command {}",
                entry.name
            );
        }
    }

    #[test]
    fn split_words_groups_quotes() {
        assert_eq!(
            split_words("echo \"two words\" tail").expect("words"),
            vec!["echo", "two words", "tail"]
        );
        assert_eq!(split_words("echo \"\"").expect("words"), vec!["echo", ""]);
        assert!(split_words("  ").expect("words").is_empty());
        assert!(split_words("echo \"oops").is_err());
    }

    #[test]
    fn lines_are_consumed_once_and_queue_is_bounded() {
        let mut processor = ConsoleCommandProcessor::new();
        let mut console = ConsoleState::default();
        console.push_pending_line_for_test("reset-level");
        processor.process_pending_lines(&mut console);
        processor.process_pending_lines(&mut console);

        let mut queued = Vec::new();
        processor.drain_pending_debug_commands_into(&mut queued);
        assert_eq!(queued, vec![DebugCommand::ResetLevel]);

        for _ in 0..(MAX_PENDING_DEBUG_COMMANDS + 4) {
            processor.process_pending_lines(&mut console);
            console.push_pending_line_for_test("quit");
        }
        processor.process_pending_lines(&mut console);
        queued.clear();
        processor.drain_pending_debug_commands_into(&mut queued);
        assert_eq!(queued.len(), MAX_PENDING_DEBUG_COMMANDS);
    }
}
