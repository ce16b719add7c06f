use anyhow::{bail, Context, Result};
use fast_image_resize as fir;
use image::RgbaImage;

/// Resamples `source` to exactly `target_w` x `target_h` device pixels with a
/// Catmull-Rom convolution. Returns a clone when the size already matches.
pub fn resize_rgba(source: &RgbaImage, target_w: u32, target_h: u32) -> Result<RgbaImage> {
    let (source_w, source_h) = source.dimensions();
    if target_w == 0 || target_h == 0 {
        bail!("device size {target_w}x{target_h} has no pixels to resample into");
    }
    if (source_w, source_h) == (target_w, target_h) {
        return Ok(source.clone());
    }
    if source_w == 0 || source_h == 0 {
        bail!("source image is empty");
    }

    let view = fir::images::ImageRef::new(source_w, source_h, source.as_raw(), fir::PixelType::U8x4)
        .with_context(|| format!("source image {source_w}x{source_h} is not packed RGBA"))?;
    let mut scaled = fir::images::Image::new(target_w, target_h, fir::PixelType::U8x4);
    let options =
        fir::ResizeOptions::new().resize_alg(fir::ResizeAlg::Convolution(fir::FilterType::CatmullRom));
    fir::Resizer::new()
        .resize(&view, &mut scaled, Some(&options))
        .with_context(|| {
            format!("scaling source {source_w}x{source_h} to device size {target_w}x{target_h}")
        })?;
    RgbaImage::from_raw(target_w, target_h, scaled.into_vec())
        .context("scaled source does not match the device size")
}
