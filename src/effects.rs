pub mod blur;
pub mod drop_shadow;
pub mod filter;
pub mod mosaic;

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Deserializer};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::surface::Surface;

pub use blur::BlurEffect;
pub use drop_shadow::DropShadowEffect;
pub use filter::{FilterEffect, FilterKind};
pub use mosaic::MosaicEffect;

/// The ten effects the engine knows how to draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EffectId {
    Mosaic,
    Blur,
    Brightness,
    Contrast,
    DropShadow,
    Grayscale,
    HueRotate,
    Invert,
    Opacity,
    Saturate,
}

impl EffectId {
    pub const ALL: &'static [Self] = &[
        Self::Mosaic,
        Self::Blur,
        Self::Brightness,
        Self::Contrast,
        Self::DropShadow,
        Self::Grayscale,
        Self::HueRotate,
        Self::Invert,
        Self::Opacity,
        Self::Saturate,
    ];
    pub const NAMES: &'static [&'static str] = &[
        "mosaic",
        "blur",
        "brightness",
        "contrast",
        "drop-shadow",
        "grayscale",
        "hue-rotate",
        "invert",
        "opacity",
        "saturate",
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mosaic => "mosaic",
            Self::Blur => "blur",
            Self::Brightness => "brightness",
            Self::Contrast => "contrast",
            Self::DropShadow => "drop-shadow",
            Self::Grayscale => "grayscale",
            Self::HueRotate => "hue-rotate",
            Self::Invert => "invert",
            Self::Opacity => "opacity",
            Self::Saturate => "saturate",
        }
    }
}

impl fmt::Display for EffectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EffectId {
    type Err = Error;

    /// Accepts the kebab-case names as well as the camelCase spellings
    /// (`dropShadow`, `hueRotate`).
    fn from_str(raw: &str) -> Result<Self> {
        let normalized = match raw {
            "dropShadow" => "drop-shadow",
            "hueRotate" => "hue-rotate",
            other => other,
        };
        Self::ALL
            .iter()
            .copied()
            .find(|id| id.as_str() == normalized)
            .ok_or_else(|| Error::UnknownEffect(raw.to_string()))
    }
}

impl<'de> Deserialize<'de> for EffectId {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse()
            .map_err(|_| de::Error::unknown_variant(&raw, Self::NAMES))
    }
}

/// What a draw request ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawOutcome {
    /// The buffer now shows the effect.
    Drawn,
    /// A mosaic pass was handed to the runtime.
    Scheduled,
    /// Nothing to draw or invalid parameters; the buffer is untouched.
    Skipped,
    /// A mosaic pass stopped early and its work was discarded.
    Cancelled,
    /// A mosaic request was replaced by a newer one before it started.
    Superseded,
    /// The effect raised an error.
    Failed,
}

/// Common contract of all effects.
pub trait Effect: Send + Sync {
    fn id(&self) -> EffectId;

    /// Rejects NaN, infinite and out-of-range parameters.
    fn validate(&self) -> Result<()>;

    /// Draws into `surface`. Only called with a displayable surface and
    /// validated parameters. `overlap == false` means stale pixels must be
    /// cleared first.
    fn render(&self, surface: &mut Surface, overlap: bool) -> Result<()>;

    fn draw(&self, surface: &mut Surface, overlap: bool) -> Result<DrawOutcome> {
        if !surface.is_displayable() {
            debug!(effect = %self.id(), "no displayable image; draw skipped");
            return Ok(DrawOutcome::Skipped);
        }
        if let Err(err) = self.validate() {
            warn!(effect = %self.id(), error = %err, "draw skipped");
            return Ok(DrawOutcome::Skipped);
        }
        self.render(surface, overlap)?;
        Ok(DrawOutcome::Drawn)
    }
}

/// `value` must be a finite number no smaller than zero.
pub(crate) fn non_negative(effect: EffectId, name: &'static str, value: f32) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(Error::invalid(effect, name, value))
    }
}

/// Parameters of every effect, one instance each.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectSet {
    pub mosaic: MosaicEffect,
    pub blur: BlurEffect,
    pub brightness: FilterEffect,
    pub contrast: FilterEffect,
    pub drop_shadow: DropShadowEffect,
    pub grayscale: FilterEffect,
    pub hue_rotate: FilterEffect,
    pub invert: FilterEffect,
    pub opacity: FilterEffect,
    pub saturate: FilterEffect,
}

impl EffectSet {
    pub fn get(&self, id: EffectId) -> &dyn Effect {
        match id {
            EffectId::Mosaic => &self.mosaic,
            EffectId::Blur => &self.blur,
            EffectId::Brightness => &self.brightness,
            EffectId::Contrast => &self.contrast,
            EffectId::DropShadow => &self.drop_shadow,
            EffectId::Grayscale => &self.grayscale,
            EffectId::HueRotate => &self.hue_rotate,
            EffectId::Invert => &self.invert,
            EffectId::Opacity => &self.opacity,
            EffectId::Saturate => &self.saturate,
        }
    }
}

impl Default for EffectSet {
    fn default() -> Self {
        Self {
            mosaic: MosaicEffect::default(),
            blur: BlurEffect::default(),
            brightness: FilterEffect::new(FilterKind::Brightness, 1.0),
            contrast: FilterEffect::new(FilterKind::Contrast, 100.0),
            drop_shadow: DropShadowEffect::default(),
            grayscale: FilterEffect::new(FilterKind::Grayscale, 100.0),
            hue_rotate: FilterEffect::new(FilterKind::HueRotate, 180.0),
            invert: FilterEffect::new(FilterKind::Invert, 100.0),
            opacity: FilterEffect::new(FilterKind::Opacity, 50.0),
            saturate: FilterEffect::new(FilterKind::Saturate, 200.0),
        }
    }
}
