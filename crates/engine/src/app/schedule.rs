use std::collections::BTreeMap;

/// Deferred work keyed by simulation tick.
///
/// Items due on the same tick drain in the order they were scheduled.
#[derive(Debug, Clone)]
pub struct TickScheduler<T> {
    queue: BTreeMap<u64, Vec<T>>,
    pending: usize,
}

impl<T> Default for TickScheduler<T> {
    fn default() -> Self {
        Self {
            queue: BTreeMap::new(),
            pending: 0,
        }
    }
}

impl<T> TickScheduler<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule_at(&mut self, tick: u64, item: T) {
        self.queue.entry(tick).or_default().push(item);
        self.pending += 1;
    }

    pub fn schedule_after(&mut self, now: u64, delay_ticks: u64, item: T) {
        self.schedule_at(now.saturating_add(delay_ticks), item);
    }

    /// Removes and returns every item due at or before `now`.
    pub fn drain_due(&mut self, now: u64) -> Vec<T> {
        let mut due = Vec::new();
        while let Some(entry) = self.queue.first_entry() {
            if *entry.key() > now {
                break;
            }
            let items = entry.remove();
            self.pending -= items.len();
            due.extend(items);
        }
        due
    }

    pub fn next_due_tick(&self) -> Option<u64> {
        self.queue.keys().next().copied()
    }

    pub fn pending_count(&self) -> usize {
        self.pending
    }

    pub fn is_empty(&self) -> bool {
        self.pending == 0
    }

    pub fn clear(&mut self) {
        self.queue.clear();
        self.pending = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drains_only_due_items_in_tick_order() {
        let mut scheduler = TickScheduler::new();
        scheduler.schedule_at(5, "late");
        scheduler.schedule_at(2, "early");
        scheduler.schedule_after(1, 1, "same_tick");

        assert!(scheduler.drain_due(1).is_empty());
        assert_eq!(scheduler.drain_due(2), vec!["early", "same_tick"]);
        assert_eq!(scheduler.pending_count(), 1);
        assert_eq!(scheduler.next_due_tick(), Some(5));
        assert_eq!(scheduler.drain_due(10), vec!["late"]);
        assert!(scheduler.is_empty());
    }

    #[test]
    fn schedule_after_saturates() {
        let mut scheduler = TickScheduler::new();
        scheduler.schedule_after(u64::MAX - 1, 10, 7u32);
        assert_eq!(scheduler.next_due_tick(), Some(u64::MAX));
    }

    #[test]
    fn clear_drops_everything() {
        let mut scheduler = TickScheduler::new();
        scheduler.schedule_at(0, 1u8);
        scheduler.schedule_at(3, 2u8);
        scheduler.clear();
        assert!(scheduler.drain_due(u64::MAX).is_empty());
        assert_eq!(scheduler.pending_count(), 0);
    }
}
