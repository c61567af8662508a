use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use super::manager::{GameManager, ManagerError};
use super::metrics::{MetricsAccumulator, MetricsHandle};
use super::rendering::Canvas;
use super::settings::GameSettings;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoopError {
    #[error("game loop stopped on a manager error: {0}")]
    Manager(#[from] ManagerError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopControl {
    #[default]
    Continue,
    Exit,
}

/// Game-side hooks driven by the loop.
pub trait Director {
    /// Called once after the manager has a running state. Install the
    /// opening state and its sprites here.
    fn start(&mut self, manager: &mut GameManager) -> Result<(), ManagerError>;

    /// Called before every manager update pass, catch-up passes included.
    fn update(&mut self, manager: &mut GameManager) -> Result<LoopControl, ManagerError>;

    fn shutdown(&mut self, _manager: &mut GameManager) {}
}

/// Shared run flag. Clones observe and control the same loop.
#[derive(Debug, Clone)]
pub struct LoopHandle {
    running: Arc<AtomicBool>,
}

impl Default for LoopHandle {
    fn default() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
        }
    }
}

impl LoopHandle {
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramePlan {
    /// Time to sleep before the next tick. Zero whenever catch-up ran.
    pub sleep: Duration,
    /// Update-only passes to run before the next render.
    pub catch_up_updates: u32,
    /// Lag still outstanding once the skip cap was hit; it is not carried
    /// into the next tick.
    pub dropped_backlog: Duration,
}

/// Decides what follows a render+update cycle that took `time_diff`.
///
/// The sleep time is `period - time_diff`. When that is negative the loop
/// is behind and runs update-only passes, each worth one period, until the
/// sleep time is no longer negative or `max_frame_skips` passes have run.
pub fn plan_frame(time_diff: Duration, period: Duration, max_frame_skips: u32) -> FramePlan {
    if time_diff <= period {
        return FramePlan {
            sleep: period - time_diff,
            catch_up_updates: 0,
            dropped_backlog: Duration::ZERO,
        };
    }

    let mut behind = time_diff - period;
    let mut catch_up_updates = 0u32;
    while !behind.is_zero() && catch_up_updates < max_frame_skips {
        behind = behind.saturating_sub(period);
        catch_up_updates += 1;
    }

    FramePlan {
        sleep: Duration::ZERO,
        catch_up_updates,
        dropped_backlog: behind,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    /// Manager update passes run, the regular one included.
    pub updates: u32,
    pub catch_up_updates: u32,
    /// Render plus the regular update, before sleeping.
    pub time_diff: Duration,
    pub slept: Duration,
    pub control: LoopControl,
}

/// Fixed-period render/update loop with frame skipping.
///
/// Each tick renders once, updates once, then either sleeps off the rest of
/// the frame period or, when the tick overran, runs update-only passes to
/// catch the game clock up without rendering.
pub struct GameLoop {
    frame_period: Duration,
    max_frame_skips: u32,
    handle: LoopHandle,
    metrics: MetricsAccumulator,
    metrics_handle: MetricsHandle,
    ticks: u64,
}

impl GameLoop {
    pub fn new(settings: &GameSettings) -> Self {
        Self::with_metrics_handle(settings, MetricsHandle::default())
    }

    pub fn with_metrics_handle(settings: &GameSettings, metrics_handle: MetricsHandle) -> Self {
        Self {
            frame_period: settings.frame_period(),
            max_frame_skips: settings.max_frame_skips,
            handle: LoopHandle::default(),
            metrics: MetricsAccumulator::new(settings.metrics_log_interval()),
            metrics_handle,
            ticks: 0,
        }
    }

    pub fn handle(&self) -> LoopHandle {
        self.handle.clone()
    }

    pub fn metrics_handle(&self) -> MetricsHandle {
        self.metrics_handle.clone()
    }

    pub fn frame_period(&self) -> Duration {
        self.frame_period
    }

    pub fn max_frame_skips(&self) -> u32 {
        self.max_frame_skips
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_running()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Starts the manager with a default state unless the caller already
    /// did, hands it to the director, and resets the update clock so the
    /// first update does not include setup time. When the director fails to
    /// start, everything is shut down again before the error returns.
    pub fn begin(
        &mut self,
        manager: &mut GameManager,
        director: &mut dyn Director,
    ) -> Result<(), LoopError> {
        if !manager.is_started() {
            manager.start(None);
        }
        if let Err(error) = director.start(manager) {
            warn!(error = %error, "director_start_failed");
            self.finish(manager, director);
            return Err(error.into());
        }
        manager.set_update_time();
        self.metrics.open_interval(manager.clock().now());
        info!(
            frame_period_ms = self.frame_period.as_millis() as u64,
            max_frame_skips = self.max_frame_skips,
            "loop_config"
        );
        Ok(())
    }

    pub fn tick(
        &mut self,
        manager: &mut GameManager,
        director: &mut dyn Director,
        canvas: &mut dyn Canvas,
    ) -> Result<TickReport, LoopError> {
        let clock = Arc::clone(manager.clock());
        let begin = clock.now();

        manager.render(canvas)?;
        let mut control = Self::update_pass(manager, director)?;
        let mut updates = 1u32;

        let time_diff = clock.now().saturating_sub(begin);
        let plan = plan_frame(time_diff, self.frame_period, self.max_frame_skips);

        if !plan.sleep.is_zero() {
            clock.sleep(plan.sleep);
        }

        let mut catch_up_updates = 0u32;
        while control == LoopControl::Continue && catch_up_updates < plan.catch_up_updates {
            control = Self::update_pass(manager, director)?;
            updates += 1;
            catch_up_updates += 1;
        }

        if !plan.dropped_backlog.is_zero() {
            warn!(
                dropped_backlog_ms = plan.dropped_backlog.as_millis() as u64,
                max_frame_skips = self.max_frame_skips,
                "frame_skip_cap_reached"
            );
        }

        if control == LoopControl::Exit {
            info!(reason = "director_exit", "shutdown_requested");
            self.handle.stop();
        }

        self.ticks = self.ticks.saturating_add(1);
        self.metrics
            .record_tick(time_diff, updates, catch_up_updates);
        if let Some(snapshot) = self.metrics.maybe_snapshot(clock.now()) {
            self.metrics_handle.publish(snapshot);
            info!(
                fps = snapshot.fps,
                ups = snapshot.ups,
                frames_skipped = snapshot.frames_skipped,
                tick_time_ms = snapshot.tick_time_ms,
                "loop_metrics"
            );
        }

        Ok(TickReport {
            updates,
            catch_up_updates,
            time_diff,
            slept: plan.sleep,
            control,
        })
    }

    /// Ticks until the handle is stopped, then shuts the director and the
    /// manager down. Shutdown also runs when a tick fails.
    pub fn run(
        &mut self,
        manager: &mut GameManager,
        director: &mut dyn Director,
        canvas: &mut dyn Canvas,
    ) -> Result<(), LoopError> {
        let result = self.run_until_stopped(manager, director, canvas);
        self.finish(manager, director);
        result
    }

    /// Stops the loop and shuts everything down. Safe to call twice.
    pub fn finish(&mut self, manager: &mut GameManager, director: &mut dyn Director) {
        self.handle.stop();
        if manager.is_started() {
            director.shutdown(manager);
            manager.shutdown();
        }
        info!(ticks = self.ticks, "shutdown");
    }

    fn run_until_stopped(
        &mut self,
        manager: &mut GameManager,
        director: &mut dyn Director,
        canvas: &mut dyn Canvas,
    ) -> Result<(), LoopError> {
        self.begin(manager, director)?;
        while self.handle.is_running() {
            self.tick(manager, director, canvas)?;
        }
        Ok(())
    }

    fn update_pass(
        manager: &mut GameManager,
        director: &mut dyn Director,
    ) -> Result<LoopControl, ManagerError> {
        let control = director.update(manager)?;
        manager.update()?;
        Ok(control)
    }
}
