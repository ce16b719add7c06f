use image::{imageops, RgbaImage};
use serde::Deserialize;
use tracing::trace;

use crate::effects::{non_negative, Effect, EffectId};
use crate::error::Result;
use crate::processing::blur::gaussian_blur;
use crate::processing::layout::{blur_layout, device_offset};
use crate::surface::Surface;

/// Gaussian blur. With `scale_canvas` the canvas grows so the haze around
/// the edges is kept.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct BlurEffect {
    pub radius: f32,
    pub scale_canvas: bool,
}

impl Default for BlurEffect {
    fn default() -> Self {
        Self {
            radius: 5.0,
            scale_canvas: true,
        }
    }
}

impl Effect for BlurEffect {
    fn id(&self) -> EffectId {
        EffectId::Blur
    }

    fn validate(&self) -> Result<()> {
        non_negative(EffectId::Blur, "radius", self.radius)
    }

    fn render(&self, surface: &mut Surface, overlap: bool) -> Result<()> {
        let (image_w, image_h) = surface.source_size()?;
        let scale = surface.scale();
        let layout = blur_layout(image_w, image_h, self.radius, scale, self.scale_canvas);
        let (width, height) = layout.device_size(scale)?;
        if layout.spread > 0.0 {
            surface.resize(width, height)?;
        } else if !surface.ensure_size(width, height)? && !overlap {
            surface.clear();
        }
        trace!(spread = layout.spread, width, height, "blur canvas");

        let scaled = surface.scaled_source()?;
        let mut layer = RgbaImage::new(width, height);
        imageops::replace(
            &mut layer,
            &*scaled,
            device_offset(layout.origin_x, scale),
            device_offset(layout.origin_y, scale),
        );
        let blurred = gaussian_blur(&layer, self.radius);
        surface.composite(&blurred, 0, 0);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::DrawOutcome;
    use crate::error::Error;
    use image::Rgba;

    fn loaded(scale: f32) -> Surface {
        let mut surface = Surface::new(scale).unwrap();
        surface.set_source(RgbaImage::from_pixel(20, 10, Rgba([0, 128, 255, 255])));
        surface.resize_to_source().unwrap();
        surface
    }

    #[test]
    fn spread_enlarges_buffer() {
        let mut surface = loaded(2.0);
        let effect = BlurEffect {
            radius: 4.0,
            scale_canvas: true,
        };
        assert_eq!(effect.draw(&mut surface, false).unwrap(), DrawOutcome::Drawn);
        // spread = 4 * 2.5 / 2 = 5
        assert_eq!(surface.buffer().dimensions(), (60, 40));
        assert_eq!(surface.buffer().get_pixel(0, 0)[3], 0);
        assert!(surface.buffer().get_pixel(30, 20)[3] > 240);
    }

    #[test]
    fn fixed_canvas_keeps_image_size() {
        let mut surface = loaded(1.0);
        let effect = BlurEffect {
            radius: 2.0,
            scale_canvas: false,
        };
        effect.draw(&mut surface, false).unwrap();
        assert_eq!(surface.buffer().dimensions(), (20, 10));
        // edges fade against the transparent outside
        assert!(surface.buffer().get_pixel(0, 0)[3] < 255);
    }

    #[test]
    fn zero_radius_redraws_the_image() {
        let mut surface = loaded(1.0);
        let effect = BlurEffect {
            radius: 0.0,
            scale_canvas: true,
        };
        effect.draw(&mut surface, false).unwrap();
        assert_eq!(surface.buffer(), surface.source().unwrap().as_ref());
    }

    #[test]
    fn oversized_canvas_fails_without_touching_buffer() {
        let mut surface = loaded(1.0);
        let before = surface.buffer().clone();
        let effect = BlurEffect {
            radius: 1e9,
            scale_canvas: true,
        };
        assert!(effect.validate().is_ok());
        let err = effect.draw(&mut surface, false).unwrap_err();
        assert!(matches!(err, Error::CanvasTooLarge { .. }));
        assert_eq!(surface.buffer(), &before);
    }

    #[test]
    fn huge_radius_on_fixed_canvas_fades_out() {
        let mut surface = loaded(1.0);
        let effect = BlurEffect {
            radius: 1e9,
            scale_canvas: false,
        };
        assert_eq!(effect.draw(&mut surface, false).unwrap(), DrawOutcome::Drawn);
        assert_eq!(surface.buffer().dimensions(), (20, 10));
        assert!(surface.buffer().pixels().all(|p| p[3] == 0));
    }
}
