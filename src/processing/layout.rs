use crate::error::{Error, Result};

/// Largest buffer edge in device pixels.
pub const MAX_CANVAS_SIDE: u32 = 32_767;
/// Largest buffer area in device pixels.
pub const MAX_CANVAS_AREA: u64 = 268_435_456;

/// Margin, in multiples of the blur radius, reserved around a blurred image
/// so the haze is not clipped.
pub const SPREAD_FACTOR: f32 = 2.5;

/// Logical canvas required by an effect and where the image sits inside it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasLayout {
    pub spread: f32,
    pub width: f32,
    pub height: f32,
    pub origin_x: f32,
    pub origin_y: f32,
}

impl CanvasLayout {
    /// Canvas exactly covering the image.
    pub fn plain(image_w: u32, image_h: u32) -> Self {
        Self {
            spread: 0.0,
            width: image_w as f32,
            height: image_h as f32,
            origin_x: 0.0,
            origin_y: 0.0,
        }
    }

    /// Buffer size in device pixels for this layout. Fails when the canvas
    /// would not fit a buffer.
    pub fn device_size(&self, scale: f32) -> Result<(u32, u32)> {
        let width = f64::from(self.width) * f64::from(scale);
        let height = f64::from(self.height) * f64::from(scale);
        let fits = |extent: f64| extent.is_finite() && extent.floor() <= f64::from(MAX_CANVAS_SIDE);
        if !fits(width) || !fits(height) {
            return Err(Error::CanvasTooLarge { width, height });
        }
        let size = (
            device_extent(self.width, scale),
            device_extent(self.height, scale),
        );
        check_canvas(size.0, size.1)?;
        Ok(size)
    }
}

/// Rejects buffers past [`MAX_CANVAS_SIDE`] or [`MAX_CANVAS_AREA`].
pub fn check_canvas(width: u32, height: u32) -> Result<()> {
    let area = u64::from(width) * u64::from(height);
    if width > MAX_CANVAS_SIDE || height > MAX_CANVAS_SIDE || area > MAX_CANVAS_AREA {
        return Err(Error::CanvasTooLarge {
            width: f64::from(width),
            height: f64::from(height),
        });
    }
    Ok(())
}

/// Device pixels spanned by a logical length. Truncates like a canvas width
/// assignment.
pub fn device_extent(logical: f32, scale: f32) -> u32 {
    let device = (logical * scale).floor();
    if device.is_finite() && device > 0.0 {
        device.min(u32::MAX as f32) as u32
    } else {
        0
    }
}

/// Device coordinate of a logical position.
pub fn device_offset(logical: f32, scale: f32) -> i64 {
    (logical * scale).round() as i64
}

/// Logical spread of a blur of `radius` device pixels. Zero when the canvas
/// is not allowed to grow.
pub fn blur_spread(radius: f32, scale: f32, scale_canvas: bool) -> f32 {
    if scale_canvas {
        radius * SPREAD_FACTOR / scale
    } else {
        0.0
    }
}

pub fn blur_layout(image_w: u32, image_h: u32, radius: f32, scale: f32, scale_canvas: bool) -> CanvasLayout {
    let spread = blur_spread(radius, scale, scale_canvas);
    CanvasLayout {
        spread,
        width: image_w as f32 + spread * 2.0,
        height: image_h as f32 + spread * 2.0,
        origin_x: spread,
        origin_y: spread,
    }
}

/// Canvas for a drop shadow. Grows past the blur spread on any axis where the
/// shadow offset is larger than the spread, and shifts the image away from a
/// negative offset.
pub fn shadow_layout(
    image_w: u32,
    image_h: u32,
    offset_x: f32,
    offset_y: f32,
    radius: f32,
    scale: f32,
) -> CanvasLayout {
    let spread = radius * SPREAD_FACTOR / scale;
    let extra_x = (offset_x.abs() - spread).max(0.0);
    let extra_y = (offset_y.abs() - spread).max(0.0);
    CanvasLayout {
        spread,
        width: image_w as f32 + spread * 2.0 + extra_x,
        height: image_h as f32 + spread * 2.0 + extra_y,
        origin_x: (spread - offset_x).max(0.0),
        origin_y: (spread - offset_y).max(0.0),
    }
}
