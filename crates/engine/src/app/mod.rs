mod clock;
mod game_loop;
mod geometry;
mod loop_runner;
mod manager;
mod metrics;
mod rendering;
mod settings;
mod sprite;
mod state;

pub use clock::{Clock, ManualClock, SystemClock};
pub use game_loop::{
    plan_frame, Director, FramePlan, GameLoop, LoopControl, LoopError, LoopHandle, TickReport,
};
pub use geometry::{ImageRegion, Vec2};
pub use loop_runner::{run_app, run_app_with_metrics, AppError};
pub use manager::{GameManager, ManagerError};
pub use metrics::{LoopMetricsSnapshot, MetricsHandle};
pub use rendering::{Canvas, ImageCache, ImageLoadError, PixelCanvas, SpriteImage};
pub use settings::{GameSettings, SettingsError, FPS_ENV_VAR, MAX_FRAME_SKIPS_ENV_VAR};
pub use sprite::{
    AnimatedSprite, Animation, BasicSprite, Layer, SheetGeometry, Sprite, SpriteId, SpriteManager,
};
pub use state::{GameState, StateError, StateStatus};
