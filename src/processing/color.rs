use std::fmt;
use std::str::FromStr;

use image::{Rgba, RgbaImage};
use serde::de::{self, Deserializer};
use serde::Deserialize;

use crate::error::{Error, Result};

pub const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Axis-aligned region of device pixels, already clipped to its buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BlockRect {
    /// Block of nominal size `block` at (`x`, `y`), clipped to `width` x `height`.
    pub fn clipped(x: u32, y: u32, block: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width: block.min(width.saturating_sub(x)),
            height: block.min(height.saturating_sub(y)),
        }
    }

    fn check(&self, image: &RgbaImage) -> Result<()> {
        let fits_x = self.x.checked_add(self.width).is_some_and(|r| r <= image.width());
        let fits_y = self.y.checked_add(self.height).is_some_and(|b| b <= image.height());
        if fits_x && fits_y {
            Ok(())
        } else {
            Err(Error::BlockOutOfBounds {
                x: self.x,
                y: self.y,
                width: self.width,
                height: self.height,
                buffer_width: image.width(),
                buffer_height: image.height(),
            })
        }
    }
}

/// Average colour of a block, counting only pixels with alpha > 0.
///
/// Fully transparent pixels are skipped so edge blocks are not darkened by
/// empty surroundings. A block without any visible pixel averages to
/// [`TRANSPARENT`]. Each channel, alpha included, is the rounded mean over the
/// counted pixels.
pub fn average_block_color(image: &RgbaImage, rect: BlockRect) -> Result<Rgba<u8>> {
    rect.check(image)?;
    let mut accum = [0u64; 4];
    let mut count = 0u64;
    for y in rect.y..rect.y + rect.height {
        for x in rect.x..rect.x + rect.width {
            let pixel = image.get_pixel(x, y);
            if pixel[3] == 0 {
                continue;
            }
            for (total, &channel) in accum.iter_mut().zip(pixel.0.iter()) {
                *total += u64::from(channel);
            }
            count += 1;
        }
    }
    if count == 0 {
        return Ok(TRANSPARENT);
    }
    let mean = |total: u64| ((total as f64) / (count as f64)).round().clamp(0.0, 255.0) as u8;
    Ok(Rgba([
        mean(accum[0]),
        mean(accum[1]),
        mean(accum[2]),
        mean(accum[3]),
    ]))
}

/// Clears the block and fills it with `color`.
///
/// Clearing first matters for translucent colours: painting over would keep
/// the previously opaque pixels underneath.
pub fn paint_block(image: &mut RgbaImage, rect: BlockRect, color: Rgba<u8>) -> Result<()> {
    rect.check(image)?;
    for y in rect.y..rect.y + rect.height {
        for x in rect.x..rect.x + rect.width {
            let pixel = image.get_pixel_mut(x, y);
            *pixel = TRANSPARENT;
            blend_over(pixel, color);
        }
    }
    Ok(())
}

/// Source-over compositing of unpremultiplied RGBA8.
pub fn blend_over(dst: &mut Rgba<u8>, src: Rgba<u8>) {
    let sa = src[3];
    if sa == 255 || dst[3] == 0 {
        *dst = src;
        return;
    }
    if sa == 0 {
        return;
    }
    let sa = f32::from(sa) / 255.0;
    let da = f32::from(dst[3]) / 255.0;
    let out_a = sa + da * (1.0 - sa);
    for c in 0..3 {
        let sc = f32::from(src[c]) * sa;
        let dc = f32::from(dst[c]) * da * (1.0 - sa);
        dst[c] = ((sc + dc) / out_a).round().clamp(0.0, 255.0) as u8;
    }
    dst[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
}

/// Composites `layer` onto `dst` with its top-left corner at (`x`, `y`).
/// Pixels falling outside `dst` are clipped.
pub fn composite_over(dst: &mut RgbaImage, layer: &RgbaImage, x: i64, y: i64) {
    let (dw, dh) = (i64::from(dst.width()), i64::from(dst.height()));
    for (lx, ly, pixel) in layer.enumerate_pixels() {
        let tx = x + i64::from(lx);
        let ty = y + i64::from(ly);
        if tx < 0 || ty < 0 || tx >= dw || ty >= dh {
            continue;
        }
        blend_over(dst.get_pixel_mut(tx as u32, ty as u32), *pixel);
    }
}

/// Colour written as a CSS hex literal: `#rgb`, `#rrggbb` or `#rrggbbaa`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HexColor(pub Rgba<u8>);

impl HexColor {
    pub const BLACK: Self = Self(Rgba([0, 0, 0, 255]));

    pub fn rgba(&self) -> Rgba<u8> {
        self.0
    }
}

impl Default for HexColor {
    fn default() -> Self {
        Self::BLACK
    }
}

impl FromStr for HexColor {
    type Err = String;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        let digits = raw
            .trim()
            .strip_prefix('#')
            .ok_or_else(|| format!("colour '{raw}' must start with '#'"))?;
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(format!("colour '{raw}' contains non-hex digits"));
        }
        let byte = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).map_err(|e| e.to_string());
        let nibble = |i: usize| {
            u8::from_str_radix(&digits[i..i + 1], 16)
                .map(|v| v * 17)
                .map_err(|e| e.to_string())
        };
        let rgba = match digits.len() {
            3 => [nibble(0)?, nibble(1)?, nibble(2)?, 255],
            6 => [byte(0)?, byte(2)?, byte(4)?, 255],
            8 => [byte(0)?, byte(2)?, byte(4)?, byte(6)?],
            n => return Err(format!("colour '{raw}' has {n} hex digits, expected 3, 6 or 8")),
        };
        Ok(Self(Rgba(rgba)))
    }
}

impl fmt::Display for HexColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b, a] = self.0.0;
        if a == 255 {
            write!(f, "#{r:02x}{g:02x}{b:02x}")
        } else {
            write!(f, "#{r:02x}{g:02x}{b:02x}{a:02x}")
        }
    }
}

impl<'de> Deserialize<'de> for HexColor {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_skips_transparent_pixels() {
        let mut img = RgbaImage::from_pixel(2, 2, TRANSPARENT);
        img.put_pixel(0, 0, Rgba([100, 50, 0, 255]));
        img.put_pixel(1, 0, Rgba([201, 51, 0, 128]));
        let avg = average_block_color(&img, BlockRect::clipped(0, 0, 2, 2, 2)).unwrap();
        // (100+201)/2 = 150.5 rounds up, (255+128)/2 = 191.5 rounds up
        assert_eq!(avg, Rgba([151, 51, 0, 192]));
    }

    #[test]
    fn empty_block_is_transparent() {
        let img = RgbaImage::from_pixel(3, 3, TRANSPARENT);
        let avg = average_block_color(&img, BlockRect::clipped(0, 0, 3, 3, 3)).unwrap();
        assert_eq!(avg, TRANSPARENT);
    }

    #[test]
    fn clipped_rect_stops_at_edges() {
        let rect = BlockRect::clipped(14, 7, 7, 20, 20);
        assert_eq!((rect.width, rect.height), (6, 7));
    }

    #[test]
    fn out_of_bounds_block_is_an_error() {
        let img = RgbaImage::new(4, 4);
        let rect = BlockRect {
            x: 2,
            y: 0,
            width: 4,
            height: 4,
        };
        assert!(matches!(
            average_block_color(&img, rect),
            Err(Error::BlockOutOfBounds { .. })
        ));
    }

    #[test]
    fn paint_block_replaces_instead_of_blending() {
        let mut img = RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 255]));
        let color = Rgba([255, 255, 255, 64]);
        paint_block(&mut img, BlockRect::clipped(0, 0, 2, 2, 2), color).unwrap();
        assert!(img.pixels().all(|p| *p == color));
    }

    #[test]
    fn blend_half_white_over_black() {
        let mut dst = Rgba([0, 0, 0, 255]);
        blend_over(&mut dst, Rgba([255, 255, 255, 128]));
        assert_eq!(dst[3], 255);
        assert!((i32::from(dst[0]) - 128).abs() <= 1);
    }

    #[test]
    fn parses_hex_colours() {
        assert_eq!("#000".parse::<HexColor>().unwrap(), HexColor::BLACK);
        assert_eq!(
            "#ff8000".parse::<HexColor>().unwrap().rgba(),
            Rgba([255, 128, 0, 255])
        );
        assert_eq!(
            "#11223380".parse::<HexColor>().unwrap().rgba(),
            Rgba([0x11, 0x22, 0x33, 0x80])
        );
        assert!("ff8000".parse::<HexColor>().is_err());
        assert!("#ff80".parse::<HexColor>().is_err());
        assert!("#gg0000".parse::<HexColor>().is_err());
        assert_eq!(HexColor(Rgba([1, 2, 3, 255])).to_string(), "#010203");
    }
}
