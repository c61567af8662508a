use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tracing::warn;

static METRICS_LOCK_POISON_WARNED: AtomicBool = AtomicBool::new(false);

fn warn_lock_poison_once(operation: &'static str) {
    if !METRICS_LOCK_POISON_WARNED.swap(true, Ordering::Relaxed) {
        warn!(operation, "loop metrics lock poisoned; recovered inner value");
    }
}

/// Rates over the last completed metrics interval.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoopMetricsSnapshot {
    /// Rendered frames per second.
    pub fps: f32,
    /// Updates per second, catch-up passes included.
    pub ups: f32,
    /// Catch-up (update-only) passes during the interval.
    pub frames_skipped: u32,
    /// Mean render+update time of a tick, before sleeping.
    pub tick_time_ms: f32,
}

/// Read side of the loop metrics, cheap to clone across threads.
#[derive(Clone, Debug, Default)]
pub struct MetricsHandle {
    snapshot: Arc<RwLock<LoopMetricsSnapshot>>,
}

impl MetricsHandle {
    pub fn snapshot(&self) -> LoopMetricsSnapshot {
        match self.snapshot.read() {
            Ok(guard) => *guard,
            Err(poisoned) => {
                warn_lock_poison_once("read");
                *poisoned.into_inner()
            }
        }
    }

    pub(crate) fn publish(&self, snapshot: LoopMetricsSnapshot) {
        let mut guard = match self.snapshot.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn_lock_poison_once("write");
                poisoned.into_inner()
            }
        };
        *guard = snapshot;
    }
}

#[derive(Debug)]
pub(crate) struct MetricsAccumulator {
    interval: Duration,
    interval_start: Option<Duration>,
    frames: u32,
    updates: u32,
    skipped: u32,
    tick_time_sum: Duration,
}

impl MetricsAccumulator {
    pub(crate) fn new(interval: Duration) -> Self {
        Self {
            interval: if interval.is_zero() {
                Duration::from_secs(1)
            } else {
                interval
            },
            interval_start: None,
            frames: 0,
            updates: 0,
            skipped: 0,
            tick_time_sum: Duration::ZERO,
        }
    }

    pub(crate) fn record_tick(&mut self, tick_time: Duration, updates: u32, skipped: u32) {
        self.frames = self.frames.saturating_add(1);
        self.updates = self.updates.saturating_add(updates);
        self.skipped = self.skipped.saturating_add(skipped);
        self.tick_time_sum = self.tick_time_sum.saturating_add(tick_time);
    }

    /// Starts a fresh interval at `now`, discarding anything recorded so far.
    pub(crate) fn open_interval(&mut self, now: Duration) {
        self.interval_start = Some(now);
        self.reset_counts();
    }

    /// `now` comes from the loop clock. Without an open interval the call
    /// only opens one.
    pub(crate) fn maybe_snapshot(&mut self, now: Duration) -> Option<LoopMetricsSnapshot> {
        let Some(start) = self.interval_start else {
            self.open_interval(now);
            return None;
        };
        let elapsed = now.saturating_sub(start);
        if elapsed < self.interval {
            return None;
        }

        let elapsed_seconds = elapsed.as_secs_f32().max(f32::EPSILON);
        let tick_time_ms = if self.frames == 0 {
            0.0
        } else {
            self.tick_time_sum.as_secs_f32() * 1000.0 / self.frames as f32
        };
        let snapshot = LoopMetricsSnapshot {
            fps: self.frames as f32 / elapsed_seconds,
            ups: self.updates as f32 / elapsed_seconds,
            frames_skipped: self.skipped,
            tick_time_ms,
        };

        self.open_interval(now);
        Some(snapshot)
    }

    fn reset_counts(&mut self) {
        self.frames = 0;
        self.updates = 0;
        self.skipped = 0;
        self.tick_time_sum = Duration::ZERO;
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn snapshot_reports_rates_over_interval() {
        let mut accumulator = MetricsAccumulator::new(Duration::from_secs(1));
        assert!(accumulator.maybe_snapshot(Duration::ZERO).is_none());

        accumulator.record_tick(Duration::from_millis(10), 1, 0);
        accumulator.record_tick(Duration::from_millis(30), 3, 2);

        let snapshot = accumulator
            .maybe_snapshot(Duration::from_secs(2))
            .expect("interval elapsed");
        assert!((snapshot.fps - 1.0).abs() < 0.001);
        assert!((snapshot.ups - 2.0).abs() < 0.001);
        assert_eq!(snapshot.frames_skipped, 2);
        assert!((snapshot.tick_time_ms - 20.0).abs() < 0.001);
    }

    #[test]
    fn snapshot_waits_for_full_interval_and_resets() {
        let mut accumulator = MetricsAccumulator::new(Duration::from_secs(1));
        accumulator.maybe_snapshot(Duration::ZERO);
        accumulator.record_tick(Duration::from_millis(5), 1, 0);

        assert!(accumulator
            .maybe_snapshot(Duration::from_millis(500))
            .is_none());
        assert!(accumulator.maybe_snapshot(Duration::from_secs(1)).is_some());

        let empty = accumulator
            .maybe_snapshot(Duration::from_secs(2))
            .expect("second interval");
        assert_eq!(empty.fps, 0.0);
        assert_eq!(empty.tick_time_ms, 0.0);
    }

    #[test]
    fn open_interval_discards_earlier_ticks() {
        let mut accumulator = MetricsAccumulator::new(Duration::from_secs(1));
        accumulator.record_tick(Duration::from_millis(5), 4, 3);

        accumulator.open_interval(Duration::from_secs(10));
        accumulator.record_tick(Duration::from_millis(5), 1, 0);

        assert!(accumulator
            .maybe_snapshot(Duration::from_millis(10_500))
            .is_none());
        let snapshot = accumulator
            .maybe_snapshot(Duration::from_secs(11))
            .expect("interval elapsed");
        assert!((snapshot.fps - 1.0).abs() < 0.001);
        assert!((snapshot.ups - 1.0).abs() < 0.001);
        assert_eq!(snapshot.frames_skipped, 0);
    }

    #[test]
    fn handle_survives_poisoned_lock() {
        let handle = MetricsHandle::default();
        let poisoner = handle.clone();
        let _ = thread::spawn(move || {
            let _guard = poisoner.snapshot.write().expect("write guard");
            panic!("poison loop metrics lock");
        })
        .join();

        assert_eq!(handle.snapshot(), LoopMetricsSnapshot::default());
        let published = LoopMetricsSnapshot {
            fps: 60.0,
            ups: 60.0,
            frames_skipped: 0,
            tick_time_ms: 4.0,
        };
        handle.publish(published);
        assert_eq!(handle.snapshot(), published);
    }
}
