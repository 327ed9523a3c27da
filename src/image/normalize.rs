//! Pre-encode normalization: alpha flattening and bounding-box downscale.

use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgba, RgbaImage};
use std::borrow::Cow;

/// Opaque fill used under transparent pixels.
pub const BACKGROUND: [u8; 3] = [255, 255, 255];

/// Composite an image carrying alpha onto [`BACKGROUND`].
///
/// Images without an alpha channel are returned as-is. The result is
/// irreversible: transparency is gone and the output is always RGB8.
pub fn flatten_alpha(image: &DynamicImage) -> Cow<'_, DynamicImage> {
    if !image.color().has_alpha() {
        return Cow::Borrowed(image);
    }

    let [r, g, b] = BACKGROUND;
    let mut canvas = RgbaImage::from_pixel(image.width(), image.height(), Rgba([r, g, b, 255]));
    imageops::overlay(&mut canvas, &image.to_rgba8(), 0, 0);
    Cow::Owned(DynamicImage::ImageRgb8(
        DynamicImage::ImageRgba8(canvas).to_rgb8(),
    ))
}

/// Downscale so the image fits inside `max_width` x `max_height`, keeping the
/// aspect ratio. Returns `None` when the image already fits.
pub fn fit_within(image: &DynamicImage, max_width: u32, max_height: u32) -> Option<DynamicImage> {
    let (width, height) = (image.width(), image.height());
    if width <= max_width && height <= max_height {
        return None;
    }

    let ratio = f64::min(
        f64::from(max_width) / f64::from(width),
        f64::from(max_height) / f64::from(height),
    );
    let new_width = ((f64::from(width) * ratio) as u32).max(1);
    let new_height = ((f64::from(height) * ratio) as u32).max(1);

    tracing::debug!(
        "Resizing {}x{} -> {}x{}",
        width,
        height,
        new_width,
        new_height
    );
    Some(image.resize_exact(new_width, new_height, FilterType::Lanczos3))
}
