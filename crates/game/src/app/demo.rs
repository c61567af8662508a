use std::sync::Arc;
use std::time::Duration;

use engine::{
    AnimatedSprite, BasicSprite, Canvas, Director, GameManager, GameSettings, GameState,
    ImageCache, LoopControl, ManagerError, Sprite, SpriteId, SpriteImage, Vec2,
};
use tracing::{info, warn};

pub(crate) const PLAYFIELD_STATE: &str = "playfield";
pub(crate) const INTERMISSION_STATE: &str = "intermission";

const BACKDROP_KEY: &str = "backdrop";
const CRATE_KEY: &str = "crate";
const HERO_SHEET_KEY: &str = "hero_walk";
const SLIME_KEY: &str = "slime";
const BANNER_KEY: &str = "banner";

const HERO_FRAME_SIZE: u32 = 32;
const HERO_SHEET_ROWS: u32 = 2;
const HERO_SHEET_COLS: u32 = 4;
const HERO_MS_PER_FRAME: u32 = 120;
const SLIME_SIZE: u32 = 24;
const SLIME_SPEED_PX_PER_MS: f32 = 0.12;
const CRATE_SIZE: u32 = 40;
const CRATE_COUNT: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DemoTiming {
    /// Playfield time before the intermission screen is shown.
    pub(crate) intermission_every: Duration,
    pub(crate) intermission_length: Duration,
    /// Total run time before the demo asks the loop to exit.
    pub(crate) exit_after: Option<Duration>,
}

impl Default for DemoTiming {
    fn default() -> Self {
        Self {
            intermission_every: Duration::from_secs(6),
            intermission_length: Duration::from_secs(2),
            exit_after: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Playfield,
    Intermission,
}

/// Populates a layered playfield, then alternates it with an intermission
/// screen that keeps the playfield paused underneath.
pub(crate) struct DemoDirector {
    images: ImageCache,
    screen: (u32, u32),
    background_color: [u8; 4],
    timing: DemoTiming,
    phase: Phase,
    phase_started: Duration,
    run_started: Duration,
    hero: Option<SpriteId>,
    intermissions: u32,
}

impl DemoDirector {
    pub(crate) fn new(images: ImageCache, settings: &GameSettings, timing: DemoTiming) -> Self {
        Self {
            images,
            screen: (settings.screen_width.max(1), settings.screen_height.max(1)),
            background_color: settings.background_color,
            timing,
            phase: Phase::Playfield,
            phase_started: Duration::ZERO,
            run_started: Duration::ZERO,
            hero: None,
            intermissions: 0,
        }
    }

    pub(crate) fn intermissions(&self) -> u32 {
        self.intermissions
    }

    fn populate_playfield(&mut self, manager: &mut GameManager) -> Result<(), ManagerError> {
        let (width, height) = self.screen;
        manager.set_background_fill(Some(self.background_color))?;

        let backdrop = self.image_or_placeholder(BACKDROP_KEY, || backdrop_image(width, height));
        manager.set_static_game_background(Some(Box::new(BasicSprite::with_image(backdrop))))?;

        let crate_image =
            self.image_or_placeholder(CRATE_KEY, || framed_square(CRATE_SIZE, [150, 100, 50, 255]));
        let spacing = width as f32 / (CRATE_COUNT + 1) as f32;
        for index in 1..=CRATE_COUNT {
            let position = Vec2::new(
                spacing * index as f32 - CRATE_SIZE as f32 / 2.0,
                height as f32 * 0.7,
            );
            manager.add_sprite_to_midground_environment(Box::new(
                BasicSprite::with_image(Arc::clone(&crate_image)).at(position),
            ))?;
        }

        let slime_image =
            self.image_or_placeholder(SLIME_KEY, || framed_square(SLIME_SIZE, [60, 200, 90, 255]));
        for (index, direction) in [(0.8f32, 0.6f32), (-0.5, 0.9)].into_iter().enumerate() {
            let start = Vec2::new(width as f32 * (0.25 + 0.5 * index as f32), height as f32 * 0.3);
            let velocity = Vec2::new(
                direction.0 * SLIME_SPEED_PX_PER_MS,
                direction.1 * SLIME_SPEED_PX_PER_MS,
            );
            manager.add_enemy_sprite(Box::new(Bouncer::new(
                BasicSprite::with_image(Arc::clone(&slime_image)).at(start),
                velocity,
                (width, height),
            )))?;
        }

        let hero_sheet = self.image_or_placeholder(HERO_SHEET_KEY, hero_sheet_image);
        let hero = AnimatedSprite::sheet(
            hero_sheet,
            HERO_SHEET_ROWS * HERO_SHEET_COLS,
            HERO_MS_PER_FRAME,
            HERO_SHEET_ROWS,
            HERO_SHEET_COLS,
        )
        .at(Vec2::new(
            (width / 2).saturating_sub(HERO_FRAME_SIZE / 2) as f32,
            (height / 2).saturating_sub(HERO_FRAME_SIZE / 2) as f32,
        ));
        self.hero = Some(manager.add_player_sprite(Box::new(hero))?);

        let banner = self.image_or_placeholder(BANNER_KEY, || banner_image(width));
        let banner_height = banner.height();
        manager.add_sprite_to_foreground(Box::new(BasicSprite::with_image(banner).at(
            Vec2::new(0.0, height.saturating_sub(banner_height) as f32),
        )))?;

        info!(
            state = PLAYFIELD_STATE,
            cached_images = self.images.len(),
            "playfield_populated"
        );
        Ok(())
    }

    fn populate_intermission(&mut self, manager: &mut GameManager) -> Result<(), ManagerError> {
        let (width, height) = self.screen;
        manager.set_background_fill(Some([20, 20, 40, 255]))?;
        let hero_sheet = self.image_or_placeholder(HERO_SHEET_KEY, hero_sheet_image);
        let mut hero = AnimatedSprite::sheet(
            hero_sheet,
            HERO_SHEET_COLS,
            HERO_MS_PER_FRAME / 2,
            HERO_SHEET_ROWS,
            HERO_SHEET_COLS,
        )
        .at(Vec2::new(
            (width / 2).saturating_sub(HERO_FRAME_SIZE / 2) as f32,
            (height / 3) as f32,
        ));
        if let Some(animation) = hero.animation_mut() {
            animation.set_reverse(true);
        }
        manager.add_non_enemy_character_sprite(Box::new(hero))?;
        Ok(())
    }

    fn enter_intermission(
        &mut self,
        manager: &mut GameManager,
        now: Duration,
    ) -> Result<(), ManagerError> {
        manager.change_state(GameState::new(INTERMISSION_STATE), true)?;
        self.populate_intermission(manager)?;
        self.phase = Phase::Intermission;
        self.phase_started = now;
        self.intermissions += 1;
        info!(intermissions = self.intermissions, "intermission_started");
        Ok(())
    }

    fn leave_intermission(
        &mut self,
        manager: &mut GameManager,
        now: Duration,
    ) -> Result<(), ManagerError> {
        if !manager.revert_to_previous_state()? {
            warn!(state = PLAYFIELD_STATE, "playfield_rebuilt");
            manager.change_state(GameState::new(PLAYFIELD_STATE), false)?;
            self.populate_playfield(manager)?;
        }
        self.phase = Phase::Playfield;
        self.phase_started = now;

        // The hero walks the other way after every intermission.
        if let Some(hero) = self.hero {
            if let Some(animation) = manager
                .sprite_mut(hero)?
                .and_then(|sprite| sprite.animation_mut())
            {
                let reversed = animation.is_reversed();
                animation.set_reverse(!reversed);
            }
        }
        Ok(())
    }

    /// Missing or broken art is not fatal: a generated stand-in is cached
    /// under the same key instead.
    fn image_or_placeholder(
        &mut self,
        key: &str,
        placeholder: impl FnOnce() -> SpriteImage,
    ) -> Arc<SpriteImage> {
        match self.images.get_or_load(key) {
            Ok(image) => image,
            Err(error) => {
                warn!(key, error = %error, "image_placeholder_used");
                self.images.insert(key, placeholder())
            }
        }
    }
}

impl Director for DemoDirector {
    fn start(&mut self, manager: &mut GameManager) -> Result<(), ManagerError> {
        manager.start(Some(GameState::new(PLAYFIELD_STATE)));
        self.populate_playfield(manager)?;
        let now = manager.clock().now();
        self.run_started = now;
        self.phase_started = now;
        self.phase = Phase::Playfield;
        Ok(())
    }

    fn update(&mut self, manager: &mut GameManager) -> Result<LoopControl, ManagerError> {
        let now = manager.clock().now();
        if let Some(limit) = self.timing.exit_after {
            if now.saturating_sub(self.run_started) >= limit {
                return Ok(LoopControl::Exit);
            }
        }

        let in_phase = now.saturating_sub(self.phase_started);
        match self.phase {
            Phase::Playfield if in_phase >= self.timing.intermission_every => {
                self.enter_intermission(manager, now)?;
            }
            Phase::Intermission if in_phase >= self.timing.intermission_length => {
                self.leave_intermission(manager, now)?;
            }
            _ => {}
        }
        Ok(LoopControl::Continue)
    }

    fn shutdown(&mut self, _manager: &mut GameManager) {
        info!(
            intermissions = self.intermissions,
            cached_images = self.images.len(),
            "demo_shutdown"
        );
        self.images.flush();
        self.hero = None;
    }
}

/// Enemy that drifts at a constant velocity and bounces off the screen
/// edges.
pub(crate) struct Bouncer {
    sprite: BasicSprite,
    velocity: Vec2,
    bounds: (u32, u32),
}

impl Bouncer {
    pub(crate) fn new(sprite: BasicSprite, velocity: Vec2, bounds: (u32, u32)) -> Self {
        Self {
            sprite,
            velocity,
            bounds,
        }
    }

    fn size(&self) -> (f32, f32) {
        self.sprite
            .image()
            .map(|image| (image.width() as f32, image.height() as f32))
            .unwrap_or((0.0, 0.0))
    }
}

impl Sprite for Bouncer {
    fn update(&mut self, dt_ms: f32) {
        let (width, height) = self.size();
        let max_x = (self.bounds.0 as f32 - width).max(0.0);
        let max_y = (self.bounds.1 as f32 - height).max(0.0);
        let (x, vx) = bounce_axis(self.sprite.x(), self.velocity.x, dt_ms, max_x);
        let (y, vy) = bounce_axis(self.sprite.y(), self.velocity.y, dt_ms, max_y);
        self.velocity = Vec2::new(vx, vy);
        self.sprite.set_position(Vec2::new(x, y));
    }

    fn paint(&self, canvas: &mut dyn Canvas) {
        self.sprite.paint(canvas);
    }

    fn position(&self) -> Vec2 {
        self.sprite.position()
    }

    fn set_position(&mut self, position: Vec2) {
        self.sprite.set_position(position);
    }

    fn is_visible(&self) -> bool {
        self.sprite.is_visible()
    }

    fn set_visible(&mut self, visible: bool) {
        self.sprite.set_visible(visible);
    }
}

fn bounce_axis(position: f32, velocity: f32, dt_ms: f32, max: f32) -> (f32, f32) {
    let next = position + velocity * dt_ms;
    if next < 0.0 {
        ((-next).min(max), velocity.abs())
    } else if next > max {
        ((2.0 * max - next).max(0.0), -velocity.abs())
    } else {
        (next, velocity)
    }
}

fn backdrop_image(width: u32, height: u32) -> SpriteImage {
    let span = height.max(1) as f32;
    SpriteImage::from_fn(width, height, |_, y| {
        let t = y as f32 / span;
        [
            (40.0 + 60.0 * t) as u8,
            (90.0 + 80.0 * t) as u8,
            (180.0 - 60.0 * t) as u8,
            255,
        ]
    })
}

fn framed_square(size: u32, fill: [u8; 4]) -> SpriteImage {
    let edge = size.saturating_sub(1);
    SpriteImage::from_fn(size, size, |x, y| {
        if x == 0 || y == 0 || x == edge || y == edge {
            [20, 20, 20, 255]
        } else {
            fill
        }
    })
}

/// Eight 32px cells; the lit column marks the frame index.
fn hero_sheet_image() -> SpriteImage {
    let width = HERO_FRAME_SIZE * HERO_SHEET_COLS;
    let height = HERO_FRAME_SIZE * HERO_SHEET_ROWS;
    SpriteImage::from_fn(width, height, |x, y| {
        let col = x / HERO_FRAME_SIZE;
        let row = y / HERO_FRAME_SIZE;
        let frame = row * HERO_SHEET_COLS + col;
        let local_x = x % HERO_FRAME_SIZE;
        let local_y = y % HERO_FRAME_SIZE;
        let marker = local_x / 4 == frame;
        if !(4..28).contains(&local_y) {
            [0, 0, 0, 0]
        } else if marker {
            [255, 230, 80, 255]
        } else {
            [200, 60, 60, 255]
        }
    })
}

fn banner_image(width: u32) -> SpriteImage {
    SpriteImage::solid(width.max(1), 24, [30, 30, 30, 200])
}
