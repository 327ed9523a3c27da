//! Image decoding, normalization and encoding
//!
//! Wraps the `image` and `webp` crates behind a small [`Encoder`] seam so the
//! budgeted compressor can be exercised against in-memory buffers.

pub mod encoder;
pub mod mock;
pub mod normalize;

pub use encoder::{JpegEncoder, WebpEncoder};
pub use mock::MockEncoder;
pub use normalize::{fit_within, flatten_alpha, BACKGROUND};

use crate::{Error, Result};
use clap::ValueEnum;
use image::DynamicImage;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Lossy WebP at maximum compression effort
    #[value(name = "webp")]
    WebP,
    /// Baseline JPEG
    #[value(name = "jpeg", alias = "jpg")]
    Jpeg,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::WebP => "webp",
            OutputFormat::Jpeg => "jpg",
        }
    }

    /// Identify an encoded file by its magic bytes.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        match bytes {
            [0xFF, 0xD8, 0xFF, ..] => Some(OutputFormat::Jpeg),
            [0x52, 0x49, 0x46, 0x46, _, _, _, _, 0x57, 0x45, 0x42, 0x50, ..] => {
                Some(OutputFormat::WebP)
            }
            _ => None,
        }
    }

    /// Concrete encoder for this format.
    pub fn encoder(&self) -> Arc<dyn Encoder> {
        match self {
            OutputFormat::WebP => Arc::new(WebpEncoder::new()),
            OutputFormat::Jpeg => Arc::new(JpegEncoder::new()),
        }
    }
}

/// Re-encodes a raster at a given quality and reports the encoded bytes.
///
/// Implementations hold compression effort at its maximum and must not touch
/// the file system.
pub trait Encoder: Send + Sync {
    fn format(&self) -> OutputFormat;

    /// Lowest quality the encoder accepts.
    fn min_quality(&self) -> u8 {
        0
    }

    fn encode(&self, image: &DynamicImage, quality: u8) -> Result<Vec<u8>>;
}

/// Reject a quality below what `encoder` can honour.
pub fn check_quality(encoder: &dyn Encoder, quality: u8) -> Result<()> {
    if quality < encoder.min_quality() {
        return Err(Error::Configuration(format!(
            "{:?} encoder needs quality >= {}, got {}",
            encoder.format(),
            encoder.min_quality(),
            quality
        )));
    }
    Ok(())
}

/// Decode an in-memory image file. Paletted sources come back expanded to
/// RGB or RGBA.
pub fn decode(data: &[u8]) -> Result<DynamicImage> {
    Ok(image::load_from_memory(data)?)
}
