use std::path::Path;
use std::time::Duration;

use anyhow::{ensure, Context, Result};
use serde::Deserialize;

use crate::effects::{
    BlurEffect, DropShadowEffect, EffectId, EffectSet, FilterEffect, FilterKind, MosaicEffect,
};
use crate::tasks::mosaic::MosaicSchedule;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct MosaicOptions {
    /// Block edge in device pixels.
    pub block_size: f32,
    /// Pixels painted between two frame yields.
    pub pixel_budget: u64,
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub frame_interval: Duration,
}

impl Default for MosaicOptions {
    fn default() -> Self {
        let schedule = MosaicSchedule::default();
        Self {
            block_size: MosaicEffect::default().block_size,
            pixel_budget: schedule.pixel_budget,
            poll_interval: schedule.poll_interval,
            frame_interval: schedule.frame_interval,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Configuration {
    /// Device pixels per logical pixel.
    pub scale: f32,
    /// Effect drawn once an image is loaded.
    pub effect: EffectId,
    pub mosaic: MosaicOptions,
    pub blur: BlurEffect,
    /// Multiplier, 1.0 leaves the image unchanged.
    pub brightness: f32,
    /// Percent.
    pub contrast: f32,
    pub drop_shadow: DropShadowEffect,
    /// Percent.
    pub grayscale: f32,
    /// Degrees.
    pub hue_rotate: f32,
    /// Percent.
    pub invert: f32,
    /// Percent.
    pub opacity: f32,
    /// Percent.
    pub saturate: f32,
}

impl Default for Configuration {
    fn default() -> Self {
        let effects = EffectSet::default();
        Self {
            scale: 1.0,
            effect: EffectId::Mosaic,
            mosaic: MosaicOptions::default(),
            blur: effects.blur,
            brightness: effects.brightness.amount,
            contrast: effects.contrast.amount,
            drop_shadow: effects.drop_shadow,
            grayscale: effects.grayscale.amount,
            hue_rotate: effects.hue_rotate.amount,
            invert: effects.invert.amount,
            opacity: effects.opacity.amount,
            saturate: effects.saturate.amount,
        }
    }
}

impl Configuration {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        serde_yaml::from_str(&s).with_context(|| format!("parsing {}", path.display()))
    }

    /// Validate runtime invariants that cannot be expressed via serde defaults alone.
    pub fn validated(self) -> Result<Self> {
        ensure!(
            self.scale.is_finite() && self.scale > 0.0,
            "scale must be a positive number"
        );
        ensure!(
            self.mosaic.pixel_budget > 0,
            "mosaic.pixel-budget must be greater than zero"
        );
        ensure!(
            self.mosaic.block_size.is_finite() && self.mosaic.block_size >= 1.0,
            "mosaic.block-size must be at least 1"
        );
        for (name, value) in [
            ("blur.radius", self.blur.radius),
            ("brightness", self.brightness),
            ("contrast", self.contrast),
            ("drop-shadow.blur-radius", self.drop_shadow.blur_radius),
            ("grayscale", self.grayscale),
            ("hue-rotate", self.hue_rotate),
            ("invert", self.invert),
            ("opacity", self.opacity),
            ("saturate", self.saturate),
        ] {
            ensure!(
                value.is_finite() && value >= 0.0,
                "{name} must be a non-negative number"
            );
        }
        ensure!(
            self.drop_shadow.offset_x.is_finite() && self.drop_shadow.offset_y.is_finite(),
            "drop-shadow offsets must be finite"
        );
        Ok(self)
    }

    pub fn effect_set(&self) -> EffectSet {
        EffectSet {
            mosaic: MosaicEffect {
                block_size: self.mosaic.block_size,
            },
            blur: self.blur.clone(),
            brightness: FilterEffect::new(FilterKind::Brightness, self.brightness),
            contrast: FilterEffect::new(FilterKind::Contrast, self.contrast),
            drop_shadow: self.drop_shadow.clone(),
            grayscale: FilterEffect::new(FilterKind::Grayscale, self.grayscale),
            hue_rotate: FilterEffect::new(FilterKind::HueRotate, self.hue_rotate),
            invert: FilterEffect::new(FilterKind::Invert, self.invert),
            opacity: FilterEffect::new(FilterKind::Opacity, self.opacity),
            saturate: FilterEffect::new(FilterKind::Saturate, self.saturate),
        }
    }

    pub fn schedule(&self) -> MosaicSchedule {
        MosaicSchedule {
            pixel_budget: self.mosaic.pixel_budget,
            poll_interval: self.mosaic.poll_interval,
            frame_interval: self.mosaic.frame_interval,
        }
    }
}
