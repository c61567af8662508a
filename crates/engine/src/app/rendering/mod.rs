mod canvas;
mod sprite_image;

pub use canvas::{Canvas, PixelCanvas};
pub use sprite_image::{ImageCache, ImageLoadError, SpriteImage};
