#[derive(Debug, Clone, PartialEq, Eq)]
struct ActivePrompt {
    id: u64,
    text: String,
}

/// Single on-screen prompt. Showing replaces whatever is visible; an
/// expiry only hides the prompt it was scheduled for.
#[derive(Debug, Default)]
struct PromptPanel {
    active: Option<ActivePrompt>,
    expiries: TickScheduler<u64>,
    next_id: u64,
}

impl PromptPanel {
    fn show(&mut self, text: impl Into<String>, now_tick: u64, ttl_ticks: Option<u64>) {
        let id = self.next_id;
        self.next_id = self.next_id.saturating_add(1);
        let text = text.into();
        info!(prompt_id = id, ttl_ticks = ttl_ticks.unwrap_or(0), text = %text, "prompt_shown");
        if let Some(ttl_ticks) = ttl_ticks {
            self.expiries.schedule_after(now_tick, ttl_ticks, id);
        }
        self.active = Some(ActivePrompt { id, text });
    }

    fn hide(&mut self) {
        if let Some(prompt) = self.active.take() {
            info!(prompt_id = prompt.id, "prompt_hidden");
        }
    }

    fn update(&mut self, now_tick: u64) {
        for id in self.expiries.drain_due(now_tick) {
            if self.active.as_ref().is_some_and(|prompt| prompt.id == id) {
                self.hide();
            }
        }
    }

    fn text(&self) -> Option<&str> {
        self.active.as_ref().map(|prompt| prompt.text.as_str())
    }

    fn clear(&mut self) {
        self.active = None;
        self.expiries.clear();
    }
}
