use image::RgbaImage;

/// Gaussian blur with standard deviation `sigma` device pixels.
///
/// Colour is blurred premultiplied so transparent neighbours do not bleed
/// black into the result. Everything outside the image counts as transparent,
/// which is what lets a blurred image fade out into an enlarged canvas.
pub fn gaussian_blur(image: &RgbaImage, sigma: f32) -> RgbaImage {
    if sigma.is_nan() || sigma <= 0.0 || image.width() == 0 || image.height() == 0 {
        return image.clone();
    }
    let width = image.width() as usize;
    let height = image.height() as usize;
    let (weights, radius) = gaussian_kernel(sigma, width.max(height) - 1);
    let mut src = rgba_to_premul_f32(image);
    let mut tmp = vec![0.0f32; src.len()];
    blur_pass(&src, &mut tmp, width, height, 4, radius, &weights, true);
    blur_pass(&tmp, &mut src, width, height, 4, radius, &weights, false);
    premul_f32_to_rgba(image.width(), image.height(), &src)
}

/// Blurs a single-channel plane in place, e.g. a shadow's coverage mask.
pub fn gaussian_blur_plane(plane: &mut [f32], width: usize, height: usize, sigma: f32) {
    if sigma.is_nan() || sigma <= 0.0 || width == 0 || height == 0 {
        return;
    }
    let (weights, radius) = gaussian_kernel(sigma, width.max(height) - 1);
    let mut tmp = vec![0.0f32; plane.len()];
    blur_pass(plane, &mut tmp, width, height, 1, radius, &weights, true);
    blur_pass(&tmp, plane, width, height, 1, radius, &weights, false);
}

/// Kernels wider than this are normalised by the area under the continuous
/// curve instead of summing every tap.
const EXACT_NORMALISATION_RADIUS: f64 = 65_536.0;

/// Weights for taps `-radius..=radius`, with the radius capped at
/// `max_radius`. Taps past the cap would only sample outside the image, but
/// their weight still counts in the normalisation, so an oversized blur
/// fades the image out.
fn gaussian_kernel(sigma: f32, max_radius: usize) -> (Vec<f32>, usize) {
    let sigma = f64::from(sigma.max(0.01));
    let full_radius = (sigma * 3.0).ceil();
    let radius = full_radius.min(max_radius as f64) as usize;
    let denom = 2.0 * sigma * sigma;
    let weight = |offset: f64| (-offset * offset / denom).exp();
    let total = if full_radius <= EXACT_NORMALISATION_RADIUS {
        let reach = full_radius as i64;
        (-reach..=reach).map(|i| weight(i as f64)).sum::<f64>()
    } else {
        sigma * (2.0 * std::f64::consts::PI).sqrt()
    };
    let center = radius as f64;
    let weights = (0..=2 * radius)
        .map(|k| (weight(k as f64 - center) / total) as f32)
        .collect();
    (weights, radius)
}

#[allow(clippy::too_many_arguments)]
fn blur_pass(
    src: &[f32],
    dst: &mut [f32],
    width: usize,
    height: usize,
    channels: usize,
    radius: usize,
    weights: &[f32],
    horizontal: bool,
) {
    let r = radius as isize;
    for y in 0..height {
        for x in 0..width {
            let mut acc = [0.0f32; 4];
            for (k, &w) in weights.iter().enumerate() {
                let offset = k as isize - r;
                let (sx, sy) = if horizontal {
                    (x as isize + offset, y as isize)
                } else {
                    (x as isize, y as isize + offset)
                };
                if sx < 0 || sy < 0 || sx >= width as isize || sy >= height as isize {
                    continue;
                }
                let base = (sy as usize * width + sx as usize) * channels;
                for c in 0..channels {
                    acc[c] += src[base + c] * w;
                }
            }
            let base = (y * width + x) * channels;
            dst[base..base + channels].copy_from_slice(&acc[..channels]);
        }
    }
}

fn rgba_to_premul_f32(image: &RgbaImage) -> Vec<f32> {
    let mut out = Vec::with_capacity(image.as_raw().len());
    for pixel in image.pixels() {
        let a = f32::from(pixel[3]) / 255.0;
        out.push(f32::from(pixel[0]) / 255.0 * a);
        out.push(f32::from(pixel[1]) / 255.0 * a);
        out.push(f32::from(pixel[2]) / 255.0 * a);
        out.push(a);
    }
    out
}

fn premul_f32_to_rgba(width: u32, height: u32, data: &[f32]) -> RgbaImage {
    let mut out = RgbaImage::new(width, height);
    for (pixel, chunk) in out.pixels_mut().zip(data.chunks_exact(4)) {
        let a = chunk[3].clamp(0.0, 1.0);
        if a <= f32::EPSILON {
            continue;
        }
        let unmul = |c: f32| ((c / a) * 255.0).round().clamp(0.0, 255.0) as u8;
        pixel.0 = [
            unmul(chunk[0]),
            unmul(chunk[1]),
            unmul(chunk[2]),
            (a * 255.0).round() as u8,
        ];
    }
    out
}
