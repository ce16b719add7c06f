use image::{Rgba, RgbaImage};

use crate::processing::blur::gaussian_blur_plane;
use crate::processing::color::{blend_over, HexColor};

/// Single-argument colour filters, parameterised the way the CSS filter
/// functions are: brightness as a multiplier, hue rotation in degrees and
/// everything else as a percentage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColorFilter {
    Brightness(f32),
    Contrast(f32),
    Grayscale(f32),
    HueRotate(f32),
    Invert(f32),
    Opacity(f32),
    Saturate(f32),
}

enum Op {
    Matrix([[f32; 3]; 3]),
    Linear { slope: f32, intercept: f32 },
    Invert(f32),
    Alpha(f32),
}

impl ColorFilter {
    pub fn apply(&self, image: &mut RgbaImage) {
        let op = self.op();
        for pixel in image.pixels_mut() {
            apply_op(&op, pixel);
        }
    }

    fn op(&self) -> Op {
        match *self {
            Self::Brightness(amount) => Op::Linear {
                slope: amount,
                intercept: 0.0,
            },
            Self::Contrast(percent) => {
                let c = percent / 100.0;
                Op::Linear {
                    slope: c,
                    intercept: 0.5 - 0.5 * c,
                }
            }
            Self::Grayscale(percent) => Op::Matrix(grayscale_matrix(unit_amount(percent))),
            Self::HueRotate(degrees) => Op::Matrix(hue_rotate_matrix(degrees)),
            Self::Invert(percent) => Op::Invert(unit_amount(percent)),
            Self::Opacity(percent) => Op::Alpha(unit_amount(percent)),
            Self::Saturate(percent) => Op::Matrix(saturate_matrix(percent / 100.0)),
        }
    }
}

/// Percentage mapped to a `[0, 1]` amount; grayscale, invert and opacity
/// saturate at 100%.
fn unit_amount(percent: f32) -> f32 {
    (percent / 100.0).clamp(0.0, 1.0)
}

fn apply_op(op: &Op, pixel: &mut Rgba<u8>) {
    let rgb = [
        f32::from(pixel[0]) / 255.0,
        f32::from(pixel[1]) / 255.0,
        f32::from(pixel[2]) / 255.0,
    ];
    let out = match op {
        Op::Matrix(m) => [
            m[0][0] * rgb[0] + m[0][1] * rgb[1] + m[0][2] * rgb[2],
            m[1][0] * rgb[0] + m[1][1] * rgb[1] + m[1][2] * rgb[2],
            m[2][0] * rgb[0] + m[2][1] * rgb[1] + m[2][2] * rgb[2],
        ],
        Op::Linear { slope, intercept } => rgb.map(|c| c * slope + intercept),
        Op::Invert(amount) => rgb.map(|c| amount + c * (1.0 - 2.0 * amount)),
        Op::Alpha(amount) => {
            pixel[3] = to_channel(f32::from(pixel[3]) / 255.0 * amount);
            return;
        }
    };
    for (channel, value) in pixel.0.iter_mut().zip(out) {
        *channel = to_channel(value);
    }
}

fn to_channel(value: f32) -> u8 {
    (value * 255.0).round().clamp(0.0, 255.0) as u8
}

fn grayscale_matrix(amount: f32) -> [[f32; 3]; 3] {
    let inv = 1.0 - amount;
    [
        [0.2126 + 0.7874 * inv, 0.7152 - 0.7152 * inv, 0.0722 - 0.0722 * inv],
        [0.2126 - 0.2126 * inv, 0.7152 + 0.2848 * inv, 0.0722 - 0.0722 * inv],
        [0.2126 - 0.2126 * inv, 0.7152 - 0.7152 * inv, 0.0722 + 0.9278 * inv],
    ]
}

fn saturate_matrix(s: f32) -> [[f32; 3]; 3] {
    [
        [0.213 + 0.787 * s, 0.715 - 0.715 * s, 0.072 - 0.072 * s],
        [0.213 - 0.213 * s, 0.715 + 0.285 * s, 0.072 - 0.072 * s],
        [0.213 - 0.213 * s, 0.715 - 0.715 * s, 0.072 + 0.928 * s],
    ]
}

fn hue_rotate_matrix(degrees: f32) -> [[f32; 3]; 3] {
    let (sin, cos) = degrees.to_radians().sin_cos();
    [
        [
            0.213 + cos * 0.787 - sin * 0.213,
            0.715 - cos * 0.715 - sin * 0.715,
            0.072 - cos * 0.072 + sin * 0.928,
        ],
        [
            0.213 - cos * 0.213 + sin * 0.143,
            0.715 + cos * 0.285 + sin * 0.140,
            0.072 - cos * 0.072 - sin * 0.283,
        ],
        [
            0.213 - cos * 0.213 - sin * 0.787,
            0.715 - cos * 0.715 + sin * 0.715,
            0.072 + cos * 0.928 + sin * 0.072,
        ],
    ]
}

/// Renders `layer` over its own shadow.
///
/// The shadow is the layer's coverage shifted by (`dx`, `dy`) device pixels,
/// blurred with standard deviation `sigma` and tinted with `color`. The
/// result has the same size as `layer`; shadow pixels shifted outside it are
/// dropped.
pub fn drop_shadow(layer: &RgbaImage, dx: i64, dy: i64, sigma: f32, color: HexColor) -> RgbaImage {
    let (width, height) = layer.dimensions();
    let (w, h) = (width as usize, height as usize);
    let mut coverage = vec![0.0f32; w * h];
    for (x, y, pixel) in layer.enumerate_pixels() {
        let tx = i64::from(x) + dx;
        let ty = i64::from(y) + dy;
        if tx < 0 || ty < 0 || tx >= i64::from(width) || ty >= i64::from(height) {
            continue;
        }
        coverage[ty as usize * w + tx as usize] = f32::from(pixel[3]) / 255.0;
    }
    gaussian_blur_plane(&mut coverage, w, h, sigma);

    let tint = color.rgba();
    let tint_alpha = f32::from(tint[3]) / 255.0;
    let mut out = RgbaImage::new(width, height);
    for (x, y, pixel) in out.enumerate_pixels_mut() {
        let a = coverage[y as usize * w + x as usize] * tint_alpha;
        *pixel = Rgba([tint[0], tint[1], tint[2], to_channel(a)]);
        blend_over(pixel, *layer.get_pixel(x, y));
    }
    out
}
