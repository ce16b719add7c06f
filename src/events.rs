use std::fmt;

use image::RgbaImage;

/// A decoded image ready to become the surface source.
#[derive(Debug)]
pub struct LoadedImage {
    /// File name, used to name exports.
    pub name: String,
    pub image: RgbaImage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    UnknownEffect,
    EffectFailed,
    MosaicFailed,
    LoadFailed,
    ExportFailed,
}

/// Failure the user should be told about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAlert {
    pub kind: AlertKind,
    pub message: String,
}

impl fmt::Display for UserAlert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}
