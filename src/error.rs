use thiserror::Error;

use crate::effects::EffectId;

/// Library error type for canvas-fx operations.
#[derive(Debug, Error)]
pub enum Error {
    /// An effect parameter is NaN, infinite or out of range.
    #[error("invalid {effect} parameter {name}: {value}")]
    InvalidParameter {
        effect: EffectId,
        name: &'static str,
        value: f32,
    },

    /// The requested effect identifier is not one of the ten known effects.
    #[error("unknown effect identifier '{0}'")]
    UnknownEffect(String),

    /// Scale factors must be positive and finite.
    #[error("invalid scale factor: {0}")]
    InvalidScale(f32),

    /// No source image has finished loading.
    #[error("no displayable image loaded")]
    NotDisplayable,

    /// An effect asked for a buffer too large to allocate.
    #[error("canvas of {width}x{height} device pixels exceeds the buffer limit")]
    CanvasTooLarge { width: f64, height: f64 },

    /// A mosaic block was addressed outside the work buffer.
    #[error(
        "block at ({x}, {y}) sized {width}x{height} exceeds the {buffer_width}x{buffer_height} work buffer"
    )]
    BlockOutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        buffer_width: u32,
        buffer_height: u32,
    },

    /// The shared surface mutex was poisoned by a panicking writer.
    #[error("surface lock poisoned")]
    Poisoned,

    /// Underlying IO error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Decoding or encoding error from the `image` crate.
    #[error(transparent)]
    Image(#[from] image::ImageError),

    /// Rendering error raised by a processing stage.
    #[error("render error: {0}")]
    Render(anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn invalid(effect: EffectId, name: &'static str, value: f32) -> Self {
        Self::InvalidParameter {
            effect,
            name,
            value,
        }
    }
}
