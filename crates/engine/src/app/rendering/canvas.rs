use crate::app::ImageRegion;

use super::SpriteImage;

/// Drawing surface sprites paint onto. Positions are top-left pixels and
/// everything is clipped to `size()`.
pub trait Canvas {
    fn size(&self) -> (u32, u32);

    fn fill_rect(&mut self, x: i32, y: i32, width: u32, height: u32, color: [u8; 4]);

    fn draw_image_region(&mut self, image: &SpriteImage, region: ImageRegion, x: i32, y: i32);

    fn draw_image(&mut self, image: &SpriteImage, x: i32, y: i32) {
        self.draw_image_region(image, image.full_region(), x, y);
    }

    fn clear(&mut self, color: [u8; 4]) {
        let (width, height) = self.size();
        self.fill_rect(0, 0, width, height, color);
    }
}

/// `Canvas` over an RGBA8 frame buffer such as the `pixels` frame.
pub struct PixelCanvas<'a> {
    frame: &'a mut [u8],
    width: u32,
    height: u32,
}

impl<'a> PixelCanvas<'a> {
    /// Returns `None` when the buffer is smaller than `width * height * 4`.
    pub fn new(frame: &'a mut [u8], width: u32, height: u32) -> Option<Self> {
        let required = width as usize * height as usize * 4;
        (frame.len() >= required).then_some(Self {
            frame,
            width,
            height,
        })
    }
}

impl Canvas for PixelCanvas<'_> {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn fill_rect(&mut self, x: i32, y: i32, width: u32, height: u32, color: [u8; 4]) {
        let Some((left, top, right, bottom)) =
            clip_rect(x, y, width, height, self.width, self.height)
        else {
            return;
        };
        let frame_width = self.width as usize;
        for out_y in top..bottom {
            let row = out_y as usize * frame_width;
            for out_x in left..right {
                let offset = (row + out_x as usize) * 4;
                self.frame[offset..offset + 4].copy_from_slice(&color);
            }
        }
    }

    fn draw_image_region(&mut self, image: &SpriteImage, region: ImageRegion, x: i32, y: i32) {
        let Some(region) = image.region(region) else {
            return;
        };
        let Some((left, top, right, bottom)) =
            clip_rect(x, y, region.width, region.height, self.width, self.height)
        else {
            return;
        };

        let rgba = image.rgba();
        let image_width = image.width() as usize;
        let frame_width = self.width as usize;
        for out_y in top..bottom {
            let src_y = region.y as usize + (out_y - y) as usize;
            let src_row = src_y * image_width;
            let dst_row = out_y as usize * frame_width;
            for out_x in left..right {
                let src_x = region.x as usize + (out_x - x) as usize;
                let src_offset = (src_row + src_x) * 4;
                let alpha = rgba[src_offset + 3];
                if alpha == 0 {
                    continue;
                }
                let dst_offset = (dst_row + out_x as usize) * 4;
                self.frame[dst_offset..dst_offset + 4]
                    .copy_from_slice(&rgba[src_offset..src_offset + 4]);
            }
        }
    }
}

/// Intersects a rect with the surface; `None` when nothing is visible.
fn clip_rect(
    x: i32,
    y: i32,
    width: u32,
    height: u32,
    surface_width: u32,
    surface_height: u32,
) -> Option<(i32, i32, i32, i32)> {
    let right = (x as i64 + width as i64).min(surface_width as i64) as i32;
    let bottom = (y as i64 + height as i64).min(surface_height as i64) as i32;
    let left = x.max(0);
    let top = y.max(0);
    (left < right && top < bottom).then_some((left, top, right, bottom))
}
