use image::{Rgb, RgbImage};

pub const GLYPH_WIDTH: i32 = 5;
pub const GLYPH_HEIGHT: i32 = 7;
/// Horizontal distance between consecutive glyph origins.
pub const GLYPH_ADVANCE: i32 = 6;

/// Text rendering capability used by the overlay.
pub trait DrawText: Send + Sync {
    /// Draws `text` with its baseline at `y`, starting at column `x`.
    /// Pixels that land outside `image` are skipped.
    fn draw_text(&self, image: &mut RgbImage, x: i32, y: i32, text: &str, color: Rgb<u8>);
}

/// Fixed-width 5x7 font. Lowercase letters render as uppercase; characters
/// without a glyph leave an empty cell.
#[derive(Debug, Default, Clone, Copy)]
pub struct BitmapFont;

impl DrawText for BitmapFont {
    fn draw_text(&self, image: &mut RgbImage, x: i32, y: i32, text: &str, color: Rgb<u8>) {
        let top = y.saturating_sub(GLYPH_HEIGHT);
        let mut origin = x;
        for ch in text.chars().flat_map(char::to_uppercase) {
            if let Some(glyph) = glyph_bits(ch) {
                blit(image, origin, top, &glyph, color);
            }
            origin = origin.saturating_add(GLYPH_ADVANCE);
        }
    }
}

fn blit(image: &mut RgbImage, left: i32, top: i32, glyph: &[u8; 7], color: Rgb<u8>) {
    let width = image.width() as i32;
    let height = image.height() as i32;
    for (row, pattern) in glyph.iter().enumerate() {
        let py = top.saturating_add(row as i32);
        if py < 0 || py >= height {
            continue;
        }
        for col in 0..GLYPH_WIDTH {
            if (pattern >> (GLYPH_WIDTH - 1 - col)) & 1 == 1 {
                let px = left.saturating_add(col);
                if px >= 0 && px < width {
                    image.put_pixel(px as u32, py as u32, color);
                }
            }
        }
    }
}

#[rustfmt::skip]
fn glyph_bits(ch: char) -> Option<[u8; 7]> {
    let glyph = match ch {
        'A' => [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'B' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10001, 0b10001, 0b11110],
        'C' => [0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110],
        'D' => [0b11100, 0b10010, 0b10001, 0b10001, 0b10001, 0b10010, 0b11100],
        'E' => [0b11111, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000, 0b11111],
        'F' => [0b11111, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000, 0b10000],
        'G' => [0b01110, 0b10001, 0b10000, 0b10111, 0b10001, 0b10001, 0b01111],
        'H' => [0b10001, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'I' => [0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        'J' => [0b00111, 0b00010, 0b00010, 0b00010, 0b00010, 0b10010, 0b01100],
        'K' => [0b10001, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010, 0b10001],
        'L' => [0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111],
        'M' => [0b10001, 0b11011, 0b10101, 0b10101, 0b10001, 0b10001, 0b10001],
        'N' => [0b10001, 0b11001, 0b10101, 0b10101, 0b10011, 0b10001, 0b10001],
        'O' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'P' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000],
        'Q' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10101, 0b10010, 0b01101],
        'R' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001],
        'S' => [0b01111, 0b10000, 0b01110, 0b00001, 0b00001, 0b10001, 0b01110],
        'T' => [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100],
        'U' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'V' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01010, 0b00100],
        'W' => [0b10001, 0b10001, 0b10001, 0b10101, 0b10101, 0b11011, 0b10001],
        'X' => [0b10001, 0b10001, 0b01010, 0b00100, 0b01010, 0b10001, 0b10001],
        'Y' => [0b10001, 0b10001, 0b01010, 0b00100, 0b00100, 0b00100, 0b00100],
        'Z' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b11111],
        '0' => [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
        '1' => [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        '2' => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
        '3' => [0b11110, 0b00001, 0b00001, 0b01110, 0b00001, 0b00001, 0b11110],
        '4' => [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
        '5' => [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
        '6' => [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
        '7' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
        '8' => [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
        '9' => [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100],
        '.' => [0, 0, 0, 0, 0, 0b00110, 0b00110],
        ',' => [0, 0, 0, 0, 0b00110, 0b00100, 0b01000],
        ':' => [0, 0b00110, 0b00110, 0, 0b00110, 0b00110, 0],
        '-' => [0, 0, 0, 0b11111, 0, 0, 0],
        '_' => [0, 0, 0, 0, 0, 0, 0b11111],
        '+' => [0, 0b00100, 0b00100, 0b11111, 0b00100, 0b00100, 0],
        '=' => [0, 0, 0b11111, 0, 0b11111, 0, 0],
        '/' => [0b00001, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b10000],
        '(' => [0b00010, 0b00100, 0b01000, 0b01000, 0b01000, 0b00100, 0b00010],
        ')' => [0b01000, 0b00100, 0b00010, 0b00010, 0b00010, 0b00100, 0b01000],
        '%' => [0b11001, 0b11010, 0b00010, 0b00100, 0b01000, 0b01011, 0b10011],
        '#' => [0b01010, 0b01010, 0b11111, 0b01010, 0b11111, 0b01010, 0b01010],
        '!' => [0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0, 0b00100],
        '?' => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0, 0b00100],
        '\'' => [0b00100, 0b00100, 0b01000, 0, 0, 0, 0],
        _ => return None,
    };
    Some(glyph)
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
    const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

    fn lit(image: &RgbImage) -> Vec<(u32, u32)> {
        image
            .enumerate_pixels()
            .filter(|(_, _, p)| **p == WHITE)
            .map(|(x, y, _)| (x, y))
            .collect()
    }

    #[test]
    fn test_glyph_sits_above_baseline() {
        let mut image = RgbImage::from_pixel(8, 10, BLACK);
        BitmapFont.draw_text(&mut image, 0, 9, "L", WHITE);

        let pixels = lit(&image);
        // vertical stroke of the L occupies rows 2..=8, foot is the last row above the baseline
        assert!(pixels.contains(&(0, 2)));
        assert!(pixels.contains(&(0, 8)));
        assert!(pixels.contains(&(4, 8)));
        assert!(!pixels.iter().any(|&(_, y)| y >= 9 || y < 2));
    }

    #[test]
    fn test_lowercase_matches_uppercase() {
        let mut upper = RgbImage::from_pixel(20, 10, BLACK);
        let mut lower = RgbImage::from_pixel(20, 10, BLACK);
        BitmapFont.draw_text(&mut upper, 1, 8, "CAT", WHITE);
        BitmapFont.draw_text(&mut lower, 1, 8, "cat", WHITE);
        assert_eq!(upper, lower);
    }

    #[test]
    fn test_advance_is_fixed_width() {
        let mut image = RgbImage::from_pixel(20, 8, BLACK);
        BitmapFont.draw_text(&mut image, 0, 7, "~I", WHITE);

        // unknown glyph leaves its cell empty but still advances
        assert!(lit(&image).iter().all(|&(x, _)| x >= GLYPH_ADVANCE as u32));
        assert!(!lit(&image).is_empty());
    }

    #[test]
    fn test_clipped_text_does_not_panic() {
        let mut image = RgbImage::from_pixel(4, 4, BLACK);
        BitmapFont.draw_text(&mut image, -3, 2, "WIDE LABEL", WHITE);
        BitmapFont.draw_text(&mut image, 2, 100, "X", WHITE);
        BitmapFont.draw_text(&mut image, i32::MIN / 2, i32::MIN / 2, "X", WHITE);
    }
}
