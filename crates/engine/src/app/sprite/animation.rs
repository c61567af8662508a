use std::path::Path;
use std::sync::Arc;

use crate::app::rendering::{Canvas, ImageLoadError, SpriteImage};
use crate::app::{ImageRegion, Vec2};

use super::{BasicSprite, Sprite};

/// Grid layout of a sprite sheet. Every cell has the same size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SheetGeometry {
    rows: u32,
    cols: u32,
}

impl SheetGeometry {
    /// Zero counts are clamped to one.
    pub fn new(rows: u32, cols: u32) -> Self {
        Self {
            rows: rows.max(1),
            cols: cols.max(1),
        }
    }

    pub fn single_row(cols: u32) -> Self {
        Self::new(1, cols)
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn cols(&self) -> u32 {
        self.cols
    }

    pub fn cell_count(&self) -> u32 {
        self.rows.saturating_mul(self.cols)
    }

    pub fn frame_size(&self, sheet_width: u32, sheet_height: u32) -> (u32, u32) {
        (sheet_width / self.cols, sheet_height / self.rows)
    }
}

/// Time-based playback over the frames of a sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct Animation {
    geometry: SheetGeometry,
    frame_count: u32,
    current_frame: u32,
    ms_per_frame: u32,
    elapsed_ms: f32,
    paused: bool,
    reverse: bool,
    repeat: bool,
    stopped: bool,
}

impl Animation {
    /// `frame_count == 0` uses every cell of the sheet. Larger counts are
    /// clamped to the number of cells.
    pub fn new(geometry: SheetGeometry, frame_count: u32, ms_per_frame: u32) -> Self {
        let cells = geometry.cell_count();
        let frame_count = if frame_count == 0 {
            cells
        } else {
            frame_count.min(cells)
        };
        Self {
            geometry,
            frame_count,
            current_frame: 0,
            ms_per_frame,
            elapsed_ms: 0.0,
            paused: false,
            reverse: false,
            repeat: true,
            stopped: false,
        }
    }

    pub fn geometry(&self) -> SheetGeometry {
        self.geometry
    }

    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    pub fn current_frame(&self) -> u32 {
        self.current_frame
    }

    pub fn ms_per_frame(&self) -> u32 {
        self.ms_per_frame
    }

    pub fn has_stopped(&self) -> bool {
        self.stopped
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_repeating(&self) -> bool {
        self.repeat
    }

    pub fn is_reversed(&self) -> bool {
        self.reverse
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn stop(&mut self) {
        self.stopped = true;
    }

    /// Back to the first frame of the current direction, playing.
    pub fn restart(&mut self) {
        self.stopped = false;
        self.paused = false;
        self.elapsed_ms = 0.0;
        self.current_frame = self.first_frame();
    }

    pub fn set_reverse(&mut self, reverse: bool) {
        self.reverse = reverse;
    }

    pub fn set_repeat(&mut self, repeat: bool) {
        self.repeat = repeat;
    }

    pub fn set_ms_per_frame(&mut self, ms_per_frame: u32) {
        self.ms_per_frame = ms_per_frame;
    }

    /// Jumps to `frame`; out-of-range frames are ignored.
    pub fn set_frame(&mut self, frame: u32) -> bool {
        if frame >= self.frame_count {
            return false;
        }
        self.current_frame = frame;
        self.elapsed_ms = 0.0;
        true
    }

    /// Steps one frame per full `ms_per_frame` of accumulated time. Long
    /// gaps are applied in one go: repeating animations wrap, one-shot
    /// animations stop on their final frame.
    pub fn advance(&mut self, dt_ms: f32) {
        if self.paused || self.stopped || self.ms_per_frame == 0 || self.frame_count == 0 {
            return;
        }
        if !dt_ms.is_finite() || dt_ms <= 0.0 {
            return;
        }

        let frame_ms = f64::from(self.ms_per_frame);
        let elapsed = f64::from(self.elapsed_ms) + f64::from(dt_ms);
        let steps = (elapsed / frame_ms).floor();
        self.elapsed_ms = (elapsed - steps * frame_ms).max(0.0) as f32;
        let steps = steps as u64;
        if steps == 0 {
            return;
        }

        let last = u64::from(self.frame_count - 1);
        let played = u64::from(self.frames_played());
        let target = if self.repeat {
            let count = u64::from(self.frame_count);
            (played + steps % count) % count
        } else if steps > last - played {
            self.stopped = true;
            self.elapsed_ms = 0.0;
            last
        } else {
            played + steps
        };
        // `target` never exceeds `last`, which fits in u32.
        self.current_frame = self.frame_at_played(target as u32);
    }

    /// Row and column of `frame` on the sheet, counting from (0, 0).
    pub fn frame_row_col(&self, frame: u32) -> (u32, u32) {
        let cols = self.geometry.cols();
        (frame / cols, frame % cols)
    }

    pub fn frame_region(&self, sheet_width: u32, sheet_height: u32) -> ImageRegion {
        let (frame_width, frame_height) = self.geometry.frame_size(sheet_width, sheet_height);
        let (row, col) = self.frame_row_col(self.current_frame);
        ImageRegion::new(
            col * frame_width,
            row * frame_height,
            frame_width,
            frame_height,
        )
    }

    fn first_frame(&self) -> u32 {
        if self.reverse {
            self.frame_count.saturating_sub(1)
        } else {
            0
        }
    }

    /// Frames between the first frame of the playback direction and the
    /// current one.
    fn frames_played(&self) -> u32 {
        let last = self.frame_count.saturating_sub(1);
        let current = self.current_frame.min(last);
        if self.reverse {
            last - current
        } else {
            current
        }
    }

    fn frame_at_played(&self, played: u32) -> u32 {
        if self.reverse {
            self.frame_count.saturating_sub(1) - played
        } else {
            played
        }
    }
}

/// Sprite that draws the current frame of a sheet.
#[derive(Debug, Clone)]
pub struct AnimatedSprite {
    base: BasicSprite,
    animation: Animation,
}

impl AnimatedSprite {
    pub fn new(base: BasicSprite, animation: Animation) -> Self {
        Self { base, animation }
    }

    pub fn single_row(image: Arc<SpriteImage>, frame_count: u32, ms_per_frame: u32) -> Self {
        Self::sheet(image, frame_count, ms_per_frame, 1, frame_count)
    }

    pub fn sheet(
        image: Arc<SpriteImage>,
        frame_count: u32,
        ms_per_frame: u32,
        rows: u32,
        cols: u32,
    ) -> Self {
        Self {
            base: BasicSprite::with_image(image),
            animation: Animation::new(SheetGeometry::new(rows, cols), frame_count, ms_per_frame),
        }
    }

    pub fn load_single_row(
        path: &Path,
        frame_count: u32,
        ms_per_frame: u32,
    ) -> Result<Self, ImageLoadError> {
        Ok(Self::single_row(
            Arc::new(SpriteImage::load(path)?),
            frame_count,
            ms_per_frame,
        ))
    }

    pub fn load_sheet(
        path: &Path,
        frame_count: u32,
        ms_per_frame: u32,
        rows: u32,
        cols: u32,
    ) -> Result<Self, ImageLoadError> {
        Ok(Self::sheet(
            Arc::new(SpriteImage::load(path)?),
            frame_count,
            ms_per_frame,
            rows,
            cols,
        ))
    }

    pub fn at(mut self, position: Vec2) -> Self {
        self.base.set_position(position);
        self
    }

    pub fn animation(&self) -> &Animation {
        &self.animation
    }

    pub fn base(&self) -> &BasicSprite {
        &self.base
    }

    pub fn current_frame_region(&self) -> Option<ImageRegion> {
        let image = self.base.image()?;
        let region = self.animation.frame_region(image.width(), image.height());
        image.region(region)
    }
}

impl Sprite for AnimatedSprite {
    fn update(&mut self, dt_ms: f32) {
        self.animation.advance(dt_ms);
    }

    fn paint(&self, canvas: &mut dyn Canvas) {
        if !self.base.is_visible() {
            return;
        }
        let (Some(image), Some(region)) = (self.base.image(), self.current_frame_region()) else {
            return;
        };
        let (x, y) = self.base.position().to_pixel();
        canvas.draw_image_region(image, region, x, y);
    }

    fn position(&self) -> Vec2 {
        self.base.position()
    }

    fn set_position(&mut self, position: Vec2) {
        self.base.set_position(position);
    }

    fn is_visible(&self) -> bool {
        self.base.is_visible()
    }

    fn set_visible(&mut self, visible: bool) {
        self.base.set_visible(visible);
    }

    fn animation_mut(&mut self) -> Option<&mut Animation> {
        Some(&mut self.animation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::sprite::test_support::{DrawCall, RecordingCanvas};

    fn four_frames(ms_per_frame: u32) -> Animation {
        Animation::new(SheetGeometry::single_row(4), 4, ms_per_frame)
    }

    #[test]
    fn zero_frame_count_uses_every_cell() {
        let animation = Animation::new(SheetGeometry::new(2, 3), 0, 100);
        assert_eq!(animation.frame_count(), 6);
    }

    #[test]
    fn frame_count_is_clamped_to_cells() {
        let animation = Animation::new(SheetGeometry::new(2, 2), 9, 100);
        assert_eq!(animation.frame_count(), 4);
    }

    #[test]
    fn advance_steps_once_per_full_frame_period() {
        let mut animation = four_frames(100);
        animation.advance(99.0);
        assert_eq!(animation.current_frame(), 0);
        animation.advance(1.0);
        assert_eq!(animation.current_frame(), 1);
        animation.advance(250.0);
        assert_eq!(animation.current_frame(), 3);
    }

    #[test]
    fn repeating_animation_wraps_to_first_frame() {
        let mut animation = four_frames(10);
        animation.advance(40.0);
        assert_eq!(animation.current_frame(), 0);
        assert!(!animation.has_stopped());
    }

    #[test]
    fn one_shot_animation_stops_on_last_frame() {
        let mut animation = four_frames(10);
        animation.set_repeat(false);
        animation.advance(1000.0);
        assert_eq!(animation.current_frame(), 3);
        assert!(animation.has_stopped());

        animation.advance(1000.0);
        assert_eq!(animation.current_frame(), 3);
    }

    #[test]
    fn reverse_playback_counts_down_and_wraps() {
        let mut animation = four_frames(10);
        animation.set_reverse(true);
        animation.restart();
        assert_eq!(animation.current_frame(), 3);
        animation.advance(10.0);
        assert_eq!(animation.current_frame(), 2);
        animation.advance(30.0);
        assert_eq!(animation.current_frame(), 3);
    }

    #[test]
    fn long_gap_wraps_repeating_animation_in_one_step() {
        let mut animation = four_frames(1);
        animation.advance(30_000_002.0);
        assert_eq!(animation.current_frame(), 2);
        assert!(!animation.has_stopped());

        animation.advance(1.0);
        assert_eq!(animation.current_frame(), 3);

        animation.set_reverse(true);
        animation.advance(30_000_002.0);
        assert_eq!(animation.current_frame(), 1);
    }

    #[test]
    fn long_gap_stops_one_shot_animation_on_final_frame() {
        let mut animation = four_frames(1);
        animation.set_repeat(false);
        animation.advance(f32::MAX);
        assert_eq!(animation.current_frame(), 3);
        assert!(animation.has_stopped());
    }

    #[test]
    fn reverse_one_shot_stops_on_first_frame() {
        let mut animation = four_frames(10);
        animation.set_reverse(true);
        animation.set_repeat(false);
        animation.restart();
        animation.advance(500.0);
        assert_eq!(animation.current_frame(), 0);
        assert!(animation.has_stopped());
    }

    #[test]
    fn paused_and_zero_rate_animations_do_not_advance() {
        let mut paused = four_frames(10);
        paused.pause();
        paused.advance(100.0);
        assert_eq!(paused.current_frame(), 0);
        paused.resume();
        paused.advance(10.0);
        assert_eq!(paused.current_frame(), 1);

        let mut zero_rate = four_frames(0);
        zero_rate.advance(100.0);
        assert_eq!(zero_rate.current_frame(), 0);
    }

    #[test]
    fn restart_clears_stop() {
        let mut animation = four_frames(10);
        animation.stop();
        animation.advance(50.0);
        assert_eq!(animation.current_frame(), 0);
        animation.restart();
        animation.advance(10.0);
        assert_eq!(animation.current_frame(), 1);
    }

    #[test]
    fn set_frame_ignores_out_of_range() {
        let mut animation = four_frames(10);
        assert!(animation.set_frame(2));
        assert!(!animation.set_frame(4));
        assert_eq!(animation.current_frame(), 2);
    }

    #[test]
    fn frame_row_col_walks_rows_left_to_right() {
        let animation = Animation::new(SheetGeometry::new(2, 3), 0, 10);
        assert_eq!(animation.frame_row_col(0), (0, 0));
        assert_eq!(animation.frame_row_col(2), (0, 2));
        assert_eq!(animation.frame_row_col(3), (1, 0));
        assert_eq!(animation.frame_row_col(5), (1, 2));
    }

    #[test]
    fn frame_region_uses_sheet_size_divided_by_grid() {
        let mut animation = Animation::new(SheetGeometry::new(2, 3), 0, 10);
        animation.set_frame(4);
        assert_eq!(animation.frame_region(96, 64), ImageRegion::new(32, 32, 32, 32));
    }

    #[test]
    fn animated_sprite_paints_current_frame() {
        let sheet = Arc::new(SpriteImage::solid(64, 16, [255, 255, 255, 255]));
        let mut sprite = AnimatedSprite::single_row(sheet, 4, 50).at(Vec2::new(10.0, 20.0));
        sprite.update(120.0);

        let mut canvas = RecordingCanvas::new(100, 100);
        sprite.paint(&mut canvas);

        assert_eq!(
            canvas.calls,
            vec![DrawCall::Image {
                region: ImageRegion::new(32, 0, 16, 16),
                x: 10,
                y: 20
            }]
        );
    }

    #[test]
    fn animated_sprite_exposes_animation_capability() {
        let sheet = Arc::new(SpriteImage::solid(8, 2, [1, 1, 1, 255]));
        let mut sprite: Box<dyn Sprite> = Box::new(AnimatedSprite::single_row(sheet, 4, 10));
        sprite.animation_mut().expect("animation").pause();
        sprite.update(100.0);
        assert_eq!(sprite.animation_mut().expect("animation").current_frame(), 0);
    }
}
