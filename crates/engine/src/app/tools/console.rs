use std::collections::VecDeque;

pub(crate) const MAX_TRANSCRIPT_LINES: usize = 256;
pub(crate) const MAX_PENDING_LINES: usize = 64;
pub(crate) const MAX_LINE_CHARS: usize = 256;

/// Operator console for headless runs: lines come in from the input
/// source, output goes to the transcript and out to the log.
#[derive(Debug, Default)]
pub(crate) struct ConsoleState {
    pending: VecDeque<String>,
    transcript: VecDeque<String>,
    unlogged: Vec<String>,
}

impl ConsoleState {
    /// Echoes the line and queues it for the command processor.
    pub(crate) fn submit_line(&mut self, raw_line: &str) {
        let line: String = raw_line
            .chars()
            .filter(|ch| !ch.is_control())
            .take(MAX_LINE_CHARS)
            .collect();
        self.append_output_line(format!("> {line}"));
        if self.pending.len() == MAX_PENDING_LINES {
            self.pending.pop_front();
        }
        self.pending.push_back(line);
    }

    pub(crate) fn append_output_line(&mut self, line: impl Into<String>) {
        let line = line.into();
        if self.transcript.len() == MAX_TRANSCRIPT_LINES {
            self.transcript.pop_front();
        }
        self.transcript.push_back(line.clone());
        self.unlogged.push(line);
    }

    /// Clears the transcript only; lines not yet logged are still logged.
    pub(crate) fn clear_output_lines(&mut self) {
        self.transcript.clear();
    }

    pub(crate) fn drain_pending_lines_into(&mut self, out: &mut Vec<String>) {
        out.extend(self.pending.drain(..));
    }

    pub(crate) fn drain_fresh_output_into(&mut self, out: &mut Vec<String>) {
        out.append(&mut self.unlogged);
    }

    #[cfg(test)]
    pub(crate) fn output_lines(&self) -> impl Iterator<Item = &str> {
        self.transcript.iter().map(String::as_str)
    }

    #[cfg(test)]
    pub(crate) fn push_pending_line_for_test(&mut self, line: &str) {
        self.pending.push_back(line.to_string());
    }
}
