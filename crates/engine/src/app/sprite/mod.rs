mod animation;
mod layers;

use std::path::Path;
use std::sync::Arc;

use super::rendering::{Canvas, ImageLoadError, SpriteImage};
use super::Vec2;

pub use animation::{AnimatedSprite, Animation, SheetGeometry};
pub use layers::{Layer, SpriteId, SpriteManager};

/// Anything the sprite manager can update and paint.
///
/// `update` receives the elapsed time since the previous update in
/// milliseconds. Types that carry an [`Animation`] expose it through
/// `animation_mut` so owners can drive playback after handing the sprite
/// to a manager.
pub trait Sprite {
    fn update(&mut self, _dt_ms: f32) {}

    fn paint(&self, canvas: &mut dyn Canvas);

    fn position(&self) -> Vec2;

    fn set_position(&mut self, position: Vec2);

    fn is_visible(&self) -> bool;

    fn set_visible(&mut self, visible: bool);

    fn animation_mut(&mut self) -> Option<&mut Animation> {
        None
    }

    fn translate(&mut self, dx: f32, dy: f32) {
        let position = self.position();
        self.set_position(Vec2::new(position.x + dx, position.y + dy));
    }
}

/// Single-frame sprite drawn at its position.
#[derive(Debug, Clone)]
pub struct BasicSprite {
    image: Option<Arc<SpriteImage>>,
    position: Vec2,
    visible: bool,
}

impl Default for BasicSprite {
    fn default() -> Self {
        Self {
            image: None,
            position: Vec2::ZERO,
            visible: true,
        }
    }
}

impl BasicSprite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_image(image: Arc<SpriteImage>) -> Self {
        Self {
            image: Some(image),
            ..Self::default()
        }
    }

    pub fn load(path: &Path) -> Result<Self, ImageLoadError> {
        Ok(Self::with_image(Arc::new(SpriteImage::load(path)?)))
    }

    pub fn at(mut self, position: Vec2) -> Self {
        self.position = position;
        self
    }

    /// Replaces the current image with one decoded from `path`.
    pub fn load_image(&mut self, path: &Path) -> Result<(), ImageLoadError> {
        self.image = Some(Arc::new(SpriteImage::load(path)?));
        Ok(())
    }

    pub fn set_image(&mut self, image: Option<Arc<SpriteImage>>) {
        self.image = image;
    }

    pub fn image(&self) -> Option<&Arc<SpriteImage>> {
        self.image.as_ref()
    }

    pub fn x(&self) -> f32 {
        self.position.x
    }

    pub fn y(&self) -> f32 {
        self.position.y
    }

    pub fn set_x(&mut self, x: f32) {
        self.position.x = x;
    }

    pub fn set_y(&mut self, y: f32) {
        self.position.y = y;
    }
}

impl Sprite for BasicSprite {
    fn paint(&self, canvas: &mut dyn Canvas) {
        if !self.visible {
            return;
        }
        if let Some(image) = &self.image {
            let (x, y) = self.position.to_pixel();
            canvas.draw_image(image, x, y);
        }
    }

    fn position(&self) -> Vec2 {
        self.position
    }

    fn set_position(&mut self, position: Vec2) {
        self.position = position;
    }

    fn is_visible(&self) -> bool {
        self.visible
    }

    fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }
}
