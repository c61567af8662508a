use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Time source for the loop and the game manager.
///
/// `now` is monotonic and measured from the clock's own origin, so two
/// readings can be subtracted without caring about wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> Duration;
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        Instant::now().saturating_duration_since(self.origin)
    }

    fn sleep(&self, duration: Duration) {
        if duration > Duration::ZERO {
            thread::sleep(duration);
        }
    }
}

/// Clock that only moves when told to. `sleep` advances it instantly.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_micros: AtomicU64,
    slept_micros: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, duration: Duration) {
        self.now_micros
            .fetch_add(duration_to_micros(duration), Ordering::SeqCst);
    }

    /// Total time spent in `sleep` since creation.
    pub fn total_slept(&self) -> Duration {
        Duration::from_micros(self.slept_micros.load(Ordering::SeqCst))
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_micros(self.now_micros.load(Ordering::SeqCst))
    }

    fn sleep(&self, duration: Duration) {
        let micros = duration_to_micros(duration);
        self.slept_micros.fetch_add(micros, Ordering::SeqCst);
        self.now_micros.fetch_add(micros, Ordering::SeqCst);
    }
}

fn duration_to_micros(duration: Duration) -> u64 {
    u64::try_from(duration.as_micros()).unwrap_or(u64::MAX)
}
