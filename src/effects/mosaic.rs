use image::RgbaImage;
use serde::Deserialize;

use crate::effects::{Effect, EffectId};
use crate::error::{Error, Result};
use crate::processing::color::{average_block_color, paint_block, BlockRect};
use crate::surface::Surface;

/// Pixelation into square blocks of `block_size` device pixels. Fractional
/// sizes are truncated.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct MosaicEffect {
    pub block_size: f32,
}

impl Default for MosaicEffect {
    fn default() -> Self {
        Self { block_size: 10.0 }
    }
}

impl MosaicEffect {
    /// Validated block edge length.
    pub fn block(&self) -> Result<u32> {
        if self.block_size.is_finite() && self.block_size >= 1.0 {
            Ok(self.block_size.min(u32::MAX as f32) as u32)
        } else {
            Err(Error::invalid(EffectId::Mosaic, "block-size", self.block_size))
        }
    }
}

/// Row-major walk over `block` x `block` cells covering `width` x `height`;
/// the last column and row are clipped.
pub fn blocks(width: u32, height: u32, block: u32) -> impl Iterator<Item = BlockRect> {
    let step = block.max(1) as usize;
    (0..height).step_by(step).flat_map(move |y| {
        (0..width)
            .step_by(step)
            .map(move |x| BlockRect::clipped(x, y, block, width, height))
    })
}

/// Replaces a block with its average colour. Returns the nominal cost of the
/// block in pixels.
pub fn mosaic_block(image: &mut RgbaImage, rect: BlockRect, block: u32) -> Result<u64> {
    let color = average_block_color(image, rect)?;
    paint_block(image, rect, color)?;
    Ok(u64::from(block) * u64::from(block))
}

/// Unfiltered source at device size, the sampling input of a pass.
pub fn sampling_buffer(surface: &mut Surface) -> Result<RgbaImage> {
    Ok((*surface.scaled_source()?).clone())
}

/// Draws the plain image; a block size of one is no mosaic at all.
pub fn draw_plain(surface: &mut Surface) -> Result<()> {
    surface.resize_to_source()?;
    let scaled = surface.scaled_source()?;
    surface.composite(&scaled, 0, 0);
    Ok(())
}

impl Effect for MosaicEffect {
    fn id(&self) -> EffectId {
        EffectId::Mosaic
    }

    fn validate(&self) -> Result<()> {
        self.block().map(|_| ())
    }

    /// Whole pass in one go, without yielding. The engine routes mosaic
    /// requests through the async controller instead.
    fn render(&self, surface: &mut Surface, _overlap: bool) -> Result<()> {
        let block = self.block()?;
        if block == 1 {
            return draw_plain(surface);
        }
        let mut work = sampling_buffer(surface)?;
        let (width, height) = work.dimensions();
        for rect in blocks(width, height, block) {
            mosaic_block(&mut work, rect, block)?;
        }
        surface.replace_buffer(work);
        Ok(())
    }
}
