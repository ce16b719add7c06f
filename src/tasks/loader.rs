use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use image::{imageops, RgbaImage};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::events::LoadedImage;

/// Extensions recognised as images. Other files are still decoded by content.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp"];

pub fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
}

/// Decodes `path` off the async runtime.
pub async fn load(path: PathBuf) -> Result<LoadedImage> {
    if !is_image_path(&path) {
        warn!(path = %path.display(), "unrecognised image extension; sniffing content");
    }
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let image = tokio::task::spawn_blocking(move || decode_rgba8_apply_exif(&path))
        .await
        .map_err(|err| Error::Render(anyhow::Error::new(err)))??;
    debug!(%name, width = image.width(), height = image.height(), "image decoded");
    Ok(LoadedImage { name, image })
}

// Decodes to RGBA8 and applies the EXIF orientation, if any.
fn decode_rgba8_apply_exif(path: &Path) -> Result<RgbaImage> {
    let img = image::ImageReader::open(path)?
        .with_guessed_format()?
        .decode()?
        .to_rgba8();
    let orientation = read_orientation(path).unwrap_or(1);
    Ok(apply_orientation(img, orientation))
}

/// Undoes an EXIF orientation tag. Unknown values leave the image as is.
pub fn apply_orientation(img: RgbaImage, orientation: u16) -> RgbaImage {
    match orientation {
        2 => imageops::flip_horizontal(&img),
        3 => imageops::rotate180(&img),
        4 => imageops::flip_vertical(&img),
        // transpose
        5 => imageops::flip_horizontal(&imageops::rotate90(&img)),
        6 => imageops::rotate90(&img),
        // transverse
        7 => imageops::flip_horizontal(&imageops::rotate270(&img)),
        8 => imageops::rotate270(&img),
        _ => img,
    }
}

fn read_orientation(path: &Path) -> Option<u16> {
    let file = File::open(path).ok()?;
    let mut buf = BufReader::new(file);
    let exif = exif::Reader::new().read_from_container(&mut buf).ok()?;
    let field = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;
    let orientation = field.value.get_uint(0)? as u16;
    debug!(orientation, path = %path.display(), "exif orientation");
    Some(orientation)
}
