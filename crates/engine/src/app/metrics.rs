use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use super::scene::RecorderTickStats;

/// Loop health over the last metrics interval.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoopMetricsSnapshot {
    pub tps: f32,
    pub tick_time_ms: f32,
    pub ticks_total: u64,
    pub frames_captured: usize,
    pub frames_replayed: usize,
}

/// Shared read side of the loop metrics. Clones observe the same value.
#[derive(Clone, Debug, Default)]
pub struct MetricsHandle {
    latest: Arc<Mutex<LoopMetricsSnapshot>>,
}

impl MetricsHandle {
    pub fn snapshot(&self) -> LoopMetricsSnapshot {
        *self.latest.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn publish(&self, snapshot: LoopMetricsSnapshot) {
        *self.latest.lock().unwrap_or_else(PoisonError::into_inner) = snapshot;
    }
}

#[derive(Debug)]
pub(crate) struct MetricsAccumulator {
    window_start: Instant,
    window: Duration,
    window_ticks: u32,
    window_work: Duration,
    window_recorders: RecorderTickStats,
    ticks_total: u64,
}

impl MetricsAccumulator {
    pub(crate) fn new(window: Duration) -> Self {
        Self {
            window_start: Instant::now(),
            window,
            window_ticks: 0,
            window_work: Duration::ZERO,
            window_recorders: RecorderTickStats::default(),
            ticks_total: 0,
        }
    }

    pub(crate) fn record_tick(&mut self, work: Duration, recorders: RecorderTickStats) {
        self.window_ticks = self.window_ticks.saturating_add(1);
        self.ticks_total = self.ticks_total.saturating_add(1);
        self.window_work = self.window_work.saturating_add(work);
        self.window_recorders.captured += recorders.captured;
        self.window_recorders.drove += recorders.drove;
    }

    /// Closes the window once it has run for at least its duration.
    pub(crate) fn maybe_snapshot(&mut self, now: Instant) -> Option<LoopMetricsSnapshot> {
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed < self.window {
            return None;
        }

        let tick_time_ms = match self.window_ticks {
            0 => 0.0,
            ticks => self.window_work.as_secs_f32() * 1000.0 / ticks as f32,
        };
        let recorders = std::mem::take(&mut self.window_recorders);
        let snapshot = LoopMetricsSnapshot {
            tps: self.window_ticks as f32 / elapsed.as_secs_f32().max(f32::EPSILON),
            tick_time_ms,
            ticks_total: self.ticks_total,
            frames_captured: recorders.captured,
            frames_replayed: recorders.drove,
        };

        self.window_start = now;
        self.window_ticks = 0;
        self.window_work = Duration::ZERO;
        Some(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    fn recorders(captured: usize, drove: usize) -> RecorderTickStats {
        RecorderTickStats { captured, drove }
    }

    #[test]
    fn window_reports_rate_work_and_recorder_frames() {
        let mut accumulator = MetricsAccumulator::new(Duration::from_secs(1));
        let base = Instant::now();
        for _ in 0..4 {
            accumulator.record_tick(Duration::from_millis(2), recorders(1, 2));
        }

        let snapshot = accumulator
            .maybe_snapshot(base + Duration::from_secs(1))
            .expect("window closes after one second");

        assert!((snapshot.tps - 4.0).abs() < 0.05);
        assert!((snapshot.tick_time_ms - 2.0).abs() < 0.001);
        assert_eq!(snapshot.ticks_total, 4);
        assert_eq!(snapshot.frames_captured, 4);
        assert_eq!(snapshot.frames_replayed, 8);
    }

    #[test]
    fn recorder_frames_reset_per_window_but_ticks_total_does_not() {
        let mut accumulator = MetricsAccumulator::new(Duration::from_secs(1));
        let base = Instant::now();
        accumulator.record_tick(Duration::ZERO, recorders(3, 0));
        let first = accumulator
            .maybe_snapshot(base + Duration::from_secs(1))
            .expect("first window");
        accumulator.record_tick(Duration::ZERO, recorders(0, 1));
        let second = accumulator
            .maybe_snapshot(base + Duration::from_secs(3))
            .expect("second window");

        assert_eq!((first.ticks_total, first.frames_captured), (1, 3));
        assert_eq!(second.ticks_total, 2);
        assert_eq!((second.frames_captured, second.frames_replayed), (0, 1));
    }

    #[test]
    fn open_window_yields_nothing() {
        let mut accumulator = MetricsAccumulator::new(Duration::from_secs(1));
        let base = Instant::now();
        accumulator.record_tick(Duration::from_millis(1), recorders(1, 0));

        assert!(accumulator
            .maybe_snapshot(base + Duration::from_millis(500))
            .is_none());
    }

    #[test]
    fn handle_survives_a_poisoned_lock() {
        let handle = MetricsHandle::default();
        let poisoner = handle.clone();
        let _ = thread::spawn(move || {
            let _guard = poisoner.latest.lock().expect("lock");
            panic!("poison metrics lock");
        })
        .join();

        assert_eq!(handle.snapshot(), LoopMetricsSnapshot::default());
        let published = LoopMetricsSnapshot {
            tps: 60.0,
            tick_time_ms: 0.4,
            ticks_total: 600,
            frames_captured: 600,
            frames_replayed: 1200,
        };
        handle.publish(published);
        assert_eq!(handle.snapshot(), published);
    }
}
