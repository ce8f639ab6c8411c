use crate::font::{BitmapFont, DrawText};
use crate::frame::{Detection, PixelRect};
use image::{Rgb, RgbImage};

pub const DEFAULT_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

/// Gap between the top edge of a box and the baseline of its label.
const LABEL_OFFSET: i32 = 2;

/// Draws detection boxes and their labels onto a decoded frame.
pub struct Overlay<F = BitmapFont> {
    color: Rgb<u8>,
    font: F,
}

impl Default for Overlay<BitmapFont> {
    fn default() -> Self {
        Self::new(DEFAULT_COLOR, BitmapFont)
    }
}

impl<F: DrawText> Overlay<F> {
    pub fn new(color: Rgb<u8>, font: F) -> Self {
        Self { color, font }
    }

    /// Annotates `image` in place with every detection at or above the
    /// confidence threshold, in input order.
    pub fn draw<'a>(
        &self,
        image: &'a mut RgbImage,
        reference_width: f64,
        reference_height: f64,
        detections: &[Detection],
    ) -> &'a mut RgbImage {
        for detection in detections.iter().filter(|d| d.is_confident()) {
            let rect = detection.pixel_rect(reference_width, reference_height);
            self.rectangle(image, rect);
            self.font.draw_text(
                image,
                rect.x1,
                rect.y1.saturating_sub(LABEL_OFFSET),
                &detection.label,
                self.color,
            );
        }
        image
    }

    fn rectangle(&self, image: &mut RgbImage, rect: PixelRect) {
        self.horizontal(image, rect.x1, rect.y1, rect.x2);
        self.horizontal(image, rect.x1, rect.y2, rect.x2);
        self.vertical(image, rect.x1, rect.y1, rect.y2);
        self.vertical(image, rect.x2, rect.y1, rect.y2);
    }

    fn horizontal(&self, image: &mut RgbImage, x1: i32, y: i32, x2: i32) {
        // Walk only the span that can touch the image.
        let (from, to) = (x1.max(-1), x2.min(image.width() as i32));
        for x in from..=to {
            for dy in -1..=1 {
                set(image, x, y.saturating_add(dy), self.color);
            }
        }
    }

    fn vertical(&self, image: &mut RgbImage, x: i32, y1: i32, y2: i32) {
        let (from, to) = (y1.max(-1), y2.min(image.height() as i32));
        for y in from..=to {
            for dx in -1..=1 {
                set(image, x.saturating_add(dx), y, self.color);
            }
        }
    }
}

fn set(image: &mut RgbImage, x: i32, y: i32, color: Rgb<u8>) {
    if x < 0 || y < 0 || x >= image.width() as i32 || y >= image.height() as i32 {
        return;
    }
    image.put_pixel(x as u32, y as u32, color);
}
