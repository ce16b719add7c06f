use image::{imageops, RgbaImage};
use serde::Deserialize;
use tracing::trace;

use crate::effects::{non_negative, Effect, EffectId};
use crate::error::{Error, Result};
use crate::processing::color::HexColor;
use crate::processing::filters::drop_shadow;
use crate::processing::layout::{device_offset, shadow_layout};
use crate::surface::Surface;

/// Offsets are logical pixels and may be negative.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct DropShadowEffect {
    pub offset_x: f32,
    pub offset_y: f32,
    pub blur_radius: f32,
    pub color: HexColor,
}

impl Default for DropShadowEffect {
    fn default() -> Self {
        Self {
            offset_x: 10.0,
            offset_y: 10.0,
            blur_radius: 10.0,
            color: HexColor::BLACK,
        }
    }
}

impl Effect for DropShadowEffect {
    fn id(&self) -> EffectId {
        EffectId::DropShadow
    }

    fn validate(&self) -> Result<()> {
        non_negative(EffectId::DropShadow, "blur-radius", self.blur_radius)?;
        for (name, value) in [("offset-x", self.offset_x), ("offset-y", self.offset_y)] {
            if !value.is_finite() {
                return Err(Error::invalid(EffectId::DropShadow, name, value));
            }
        }
        Ok(())
    }

    /// Always starts from a fresh buffer: the image origin moves with the
    /// offsets, so nothing drawn before can be reused.
    fn render(&self, surface: &mut Surface, _overlap: bool) -> Result<()> {
        let (image_w, image_h) = surface.source_size()?;
        let scale = surface.scale();
        let layout = shadow_layout(
            image_w,
            image_h,
            self.offset_x,
            self.offset_y,
            self.blur_radius,
            scale,
        );
        let (width, height) = layout.device_size(scale)?;
        surface.resize(width, height)?;
        trace!(spread = layout.spread, width, height, "drop-shadow canvas");

        let scaled = surface.scaled_source()?;
        let mut layer = RgbaImage::new(width, height);
        imageops::replace(
            &mut layer,
            &*scaled,
            device_offset(layout.origin_x, scale),
            device_offset(layout.origin_y, scale),
        );
        let shadowed = drop_shadow(
            &layer,
            device_offset(self.offset_x, scale),
            device_offset(self.offset_y, scale),
            self.blur_radius / 2.0,
            self.color,
        );
        surface.composite(&shadowed, 0, 0);
        Ok(())
    }
}
