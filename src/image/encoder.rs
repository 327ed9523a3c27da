use super::{Encoder, OutputFormat};
use crate::{Error, Result};
use image::DynamicImage;
use std::borrow::Cow;

/// libwebp method 6, the slowest and smallest setting.
const WEBP_MAX_METHOD: i32 = 6;

/// Lossy WebP encoder backed by libwebp.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebpEncoder;

impl WebpEncoder {
    pub fn new() -> Self {
        Self
    }
}

fn rgb_view(image: &DynamicImage) -> Cow<'_, image::RgbImage> {
    match image {
        DynamicImage::ImageRgb8(rgb) => Cow::Borrowed(rgb),
        _ => Cow::Owned(image.to_rgb8()),
    }
}

impl Encoder for WebpEncoder {
    fn format(&self) -> OutputFormat {
        OutputFormat::WebP
    }

    fn encode(&self, image: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
        let rgb = rgb_view(image);
        let (width, height) = rgb.dimensions();
        if width == 0 || height == 0 {
            return Err(Error::Encode(format!(
                "cannot encode empty {}x{} image",
                width, height
            )));
        }

        let encoder = webp::Encoder::from_rgb(rgb.as_raw(), width, height);
        let mut config = webp::WebPConfig::new()
            .map_err(|_| Error::Encode("failed to create WebPConfig".to_string()))?;
        config.lossless = 0;
        config.quality = f32::from(quality.min(100));
        config.method = WEBP_MAX_METHOD;

        let encoded = encoder
            .encode_advanced(&config)
            .map_err(|e| Error::Encode(format!("WebP encode failed: {:?}", e)))?;
        Ok(encoded.to_vec())
    }
}

/// Lowest quality the `image` JPEG encoder accepts.
const JPEG_MIN_QUALITY: u8 = 1;

/// Baseline JPEG encoder from the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct JpegEncoder;

impl JpegEncoder {
    pub fn new() -> Self {
        Self
    }
}

impl Encoder for JpegEncoder {
    fn format(&self) -> OutputFormat {
        OutputFormat::Jpeg
    }

    fn min_quality(&self) -> u8 {
        JPEG_MIN_QUALITY
    }

    fn encode(&self, image: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
        if quality < JPEG_MIN_QUALITY {
            return Err(Error::Encode(format!(
                "JPEG quality must be at least {}, got {}",
                JPEG_MIN_QUALITY, quality
            )));
        }

        let rgb = rgb_view(image);
        let mut bytes = Vec::new();
        {
            let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(
                &mut bytes,
                quality.min(100),
            );
            encoder.encode_image(&*rgb)?;
        }
        Ok(bytes)
    }
}
