use std::io::Cursor;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use image::{ImageFormat, RgbaImage};
use tracing::debug;

use crate::error::{Error, Result};
use crate::processing::color::composite_over;
use crate::processing::layout::{check_canvas, CanvasLayout};
use crate::processing::resample::resize_rgba;

/// Surface shared between the engine and in-flight mosaic passes.
pub type SharedSurface = Arc<Mutex<Surface>>;

pub fn lock_surface(surface: &SharedSurface) -> Result<MutexGuard<'_, Surface>> {
    surface.lock().map_err(|_| Error::Poisoned)
}

/// Drawing target: the loaded source image plus the device-pixel buffer the
/// active effect renders into.
#[derive(Debug)]
pub struct Surface {
    source: Option<Arc<RgbaImage>>,
    buffer: RgbaImage,
    scale: f32,
    displayable: bool,
    scaled: Option<(f32, Arc<RgbaImage>)>,
}

impl Surface {
    pub fn new(scale: f32) -> Result<Self> {
        check_scale(scale)?;
        Ok(Self {
            source: None,
            buffer: RgbaImage::new(0, 0),
            scale,
            displayable: false,
            scaled: None,
        })
    }

    pub fn shared(self) -> SharedSurface {
        Arc::new(Mutex::new(self))
    }

    /// Installs a freshly decoded source and marks the surface displayable.
    pub fn set_source(&mut self, image: RgbaImage) {
        debug!(width = image.width(), height = image.height(), "source image installed");
        self.source = Some(Arc::new(image));
        self.scaled = None;
        self.displayable = true;
    }

    /// Hides the current source, e.g. while a new one is loading or after a
    /// load failed.
    pub fn mark_unavailable(&mut self) {
        self.displayable = false;
    }

    pub fn is_displayable(&self) -> bool {
        self.displayable && self.source.is_some()
    }

    pub fn source(&self) -> Option<&Arc<RgbaImage>> {
        self.source.as_ref()
    }

    /// Logical (unscaled) size of the source image.
    pub fn source_size(&self) -> Result<(u32, u32)> {
        self.source
            .as_ref()
            .map(|img| img.dimensions())
            .ok_or(Error::NotDisplayable)
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Changes the scale. Refused when the source would not fit a buffer at
    /// the new scale.
    pub fn set_scale(&mut self, scale: f32) -> Result<()> {
        check_scale(scale)?;
        if let Some(source) = &self.source {
            let (w, h) = source.dimensions();
            CanvasLayout::plain(w, h).device_size(scale)?;
        }
        if scale != self.scale {
            self.scale = scale;
            self.scaled = None;
        }
        Ok(())
    }

    pub fn buffer(&self) -> &RgbaImage {
        &self.buffer
    }

    /// Reallocates the buffer. The new buffer is fully transparent. An
    /// oversized request leaves the current buffer in place.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        check_canvas(width, height)?;
        self.buffer = RgbaImage::new(width, height);
        Ok(())
    }

    /// Reallocates only when the size differs. Returns whether it did.
    pub fn ensure_size(&mut self, width: u32, height: u32) -> Result<bool> {
        if self.buffer.dimensions() == (width, height) {
            return Ok(false);
        }
        self.resize(width, height)?;
        Ok(true)
    }

    /// Device size of a canvas that exactly covers the source.
    pub fn source_device_size(&self) -> Result<(u32, u32)> {
        let (w, h) = self.source_size()?;
        CanvasLayout::plain(w, h).device_size(self.scale)
    }

    /// Reallocates the buffer to cover exactly the source at the current scale.
    pub fn resize_to_source(&mut self) -> Result<()> {
        let (w, h) = self.source_device_size()?;
        self.resize(w, h)
    }

    pub fn clear(&mut self) {
        for pixel in self.buffer.pixels_mut() {
            pixel.0 = [0, 0, 0, 0];
        }
    }

    /// The source resampled to device pixels, cached per scale.
    pub fn scaled_source(&mut self) -> Result<Arc<RgbaImage>> {
        let source = self.source.clone().ok_or(Error::NotDisplayable)?;
        if let Some((scale, image)) = &self.scaled {
            if *scale == self.scale {
                return Ok(Arc::clone(image));
            }
        }
        let (w, h) = self.source_device_size()?;
        let image = if source.dimensions() == (w, h) {
            source
        } else if w == 0 || h == 0 {
            Arc::new(RgbaImage::new(w, h))
        } else {
            Arc::new(resize_rgba(&source, w, h).map_err(Error::Render)?)
        };
        self.scaled = Some((self.scale, Arc::clone(&image)));
        Ok(image)
    }

    /// Source-over composites `layer` with its top-left corner at the given
    /// device coordinate.
    pub fn composite(&mut self, layer: &RgbaImage, x: i64, y: i64) {
        composite_over(&mut self.buffer, layer, x, y);
    }

    /// Swaps in a fully rendered buffer in one step.
    pub fn replace_buffer(&mut self, buffer: RgbaImage) {
        self.buffer = buffer;
    }

    pub fn encode_png(&self) -> Result<Vec<u8>> {
        let mut bytes = Cursor::new(Vec::new());
        self.buffer.write_to(&mut bytes, ImageFormat::Png)?;
        Ok(bytes.into_inner())
    }

    pub fn save_png(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.encode_png()?)?;
        debug!(path = %path.display(), "surface exported");
        Ok(())
    }
}

fn check_scale(scale: f32) -> Result<()> {
    if scale.is_finite() && scale > 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidScale(scale))
    }
}
