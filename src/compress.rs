//! Budgeted compression
//!
//! Re-encodes an image at descending quality levels until the encoded size
//! fits a byte budget. The search walks a finite, strictly decreasing ladder
//! and always yields exactly one result: when nothing fits, the encoding at
//! the floor quality is returned with `met == false`.

use crate::image::{check_quality, flatten_alpha, Encoder};
use crate::models::{CompressionResult, CompressionSettings};
use crate::{Error, Result};
use image::DynamicImage;
use tracing::debug;

/// One encode of the search. Never outlives [`compress`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionAttempt {
    pub quality: u8,
    pub size: u64,
}

impl CompressionAttempt {
    pub fn fits(&self, budget_bytes: u64) -> bool {
        self.size <= budget_bytes
    }
}

/// Qualities the search tries, in order: `start, start - step, ...` down to
/// the last value not below `min`, then `min` itself if it was skipped.
pub fn quality_ladder(settings: &CompressionSettings) -> Result<Vec<u8>> {
    settings.validate()?;

    let mut ladder = vec![settings.start_quality];
    let mut quality = settings.start_quality;
    while let Some(next) = quality.checked_sub(settings.step) {
        if next < settings.min_quality {
            break;
        }
        ladder.push(next);
        quality = next;
    }
    if quality != settings.min_quality {
        ladder.push(settings.min_quality);
    }
    Ok(ladder)
}

/// Encode `image` at the highest ladder quality whose output fits
/// `settings.budget_bytes`.
///
/// Alpha is flattened onto white before the first encode. Codec errors are
/// returned as-is on the first failure; missing the budget is not an error.
pub fn compress(
    encoder: &dyn Encoder,
    image: &DynamicImage,
    settings: &CompressionSettings,
) -> Result<CompressionResult> {
    let ladder = quality_ladder(settings)?;
    check_quality(encoder, settings.min_quality)?;
    let image = flatten_alpha(image);

    let mut last = None;
    for quality in ladder {
        let bytes = encoder.encode(&image, quality)?;
        let attempt = CompressionAttempt {
            quality,
            size: bytes.len() as u64,
        };
        debug!(
            "Quality {}%: {:.1} KB",
            attempt.quality,
            attempt.size as f64 / 1024.0
        );

        if attempt.fits(settings.budget_bytes) {
            return Ok(CompressionResult::new(
                bytes,
                quality,
                settings.budget_bytes,
            ));
        }
        last = Some((quality, bytes));
    }

    // Floor reached: the last attempt is always at min_quality.
    let (quality, bytes) =
        last.ok_or_else(|| Error::Invariant("quality ladder was empty".to_string()))?;
    Ok(CompressionResult::new(bytes, quality, settings.budget_bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::{JpegEncoder, MockEncoder, WebpEncoder};
    use image::{ColorType, Rgba, RgbaImage};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    const KB: usize = 1024;

    fn test_image() -> DynamicImage {
        DynamicImage::ImageRgb8(image::RgbImage::new(8, 8))
    }

    fn noisy_image(width: u32, height: u32) -> DynamicImage {
        let img = image::RgbImage::from_fn(width, height, |x, y| {
            let v = (x * 13 + y * 7) ^ (x * y * 3);
            image::Rgb([(v % 256) as u8, (v % 199) as u8, (v % 131) as u8])
        });
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn test_ladder_on_grid() {
        let ladder = quality_ladder(&CompressionSettings::hero()).unwrap();
        assert_eq!(ladder, vec![55, 50, 45, 40, 35, 30]);
    }

    #[test]
    fn test_ladder_appends_off_grid_floor() {
        let ladder = quality_ladder(&CompressionSettings::new(1, 55, 30, 10)).unwrap();
        assert_eq!(ladder, vec![55, 45, 35, 30]);
    }

    #[test]
    fn test_ladder_single_rung() {
        let ladder = quality_ladder(&CompressionSettings::new(1, 40, 40, 5)).unwrap();
        assert_eq!(ladder, vec![40]);
    }

    #[test]
    fn test_ladder_reaches_zero() {
        let ladder = quality_ladder(&CompressionSettings::new(1, 10, 0, 5)).unwrap();
        assert_eq!(ladder, vec![10, 5, 0]);
    }

    #[test]
    fn test_meets_budget_on_first_attempt() {
        let encoder = MockEncoder::new();
        let settings = CompressionSettings::hero();

        let result = compress(&encoder, &test_image(), &settings).unwrap();

        assert_eq!(result.quality(), 55);
        assert!(result.met());
        assert_eq!(encoder.get_calls(), vec![55]);
    }

    #[test]
    fn test_steps_down_until_budget_fits() {
        let encoder = MockEncoder::new()
            .with_size(55, 200 * KB)
            .with_size(50, 140 * KB);

        let result = compress(&encoder, &test_image(), &CompressionSettings::hero()).unwrap();

        assert_eq!(result.quality(), 50);
        assert!(result.met());
        assert_eq!(result.size(), (140 * KB) as u64);
        assert_eq!(encoder.get_calls(), vec![55, 50]);
    }

    #[test]
    fn test_unmet_budget_falls_back_to_floor() {
        let encoder = MockEncoder::new().with_size_fn(|q| 160 * KB + usize::from(q) * KB);

        let result = compress(&encoder, &test_image(), &CompressionSettings::hero()).unwrap();

        assert_eq!(result.quality(), 30);
        assert!(!result.met());
        assert_eq!(result.size(), (190 * KB) as u64);
        // The floor is the last rung, so it is not encoded twice.
        assert_eq!(encoder.get_calls(), vec![55, 50, 45, 40, 35, 30]);
    }

    #[test]
    fn test_off_grid_floor_gets_one_final_encode() {
        let encoder = MockEncoder::new().with_size_fn(|_| 500 * KB);
        let settings = CompressionSettings::new(150 * KB as u64, 55, 30, 10);

        let result = compress(&encoder, &test_image(), &settings).unwrap();

        assert_eq!(result.quality(), 30);
        assert!(!result.met());
        assert_eq!(encoder.get_calls(), vec![55, 45, 35, 30]);
    }

    #[test]
    fn test_min_above_start_fails_before_encoding() {
        let encoder = MockEncoder::new();
        let settings = CompressionSettings::new(150 * KB as u64, 55, 60, 5);

        let err = compress(&encoder, &test_image(), &settings).unwrap_err();

        assert!(matches!(err, Error::Configuration(_)));
        assert_eq!(encoder.get_call_count(), 0);
    }

    #[test]
    fn test_floor_below_encoder_minimum_fails_before_encoding() {
        let settings = CompressionSettings::new(1, 10, 0, 5);

        let err = compress(&JpegEncoder::new(), &test_image(), &settings).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));

        let result = compress(
            &JpegEncoder::new(),
            &test_image(),
            &CompressionSettings::new(1, 10, 1, 5),
        )
        .unwrap();
        assert_eq!(result.quality(), 1);
        assert!(!result.met());
    }

    #[test]
    fn test_codec_error_is_not_retried() {
        let encoder = MockEncoder::new().with_failure(true);

        let err = compress(&encoder, &test_image(), &CompressionSettings::hero()).unwrap_err();

        assert!(err.is_codec());
        assert!(matches!(err, Error::Encode(_)));
    }

    #[test]
    fn test_alpha_is_flattened_before_encode() {
        let encoder = MockEncoder::new();
        let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 0])));

        compress(&encoder, &image, &CompressionSettings::hero()).unwrap();

        assert_eq!(encoder.get_seen_colors(), vec![ColorType::Rgb8]);
    }

    #[test]
    fn test_real_encoder_is_idempotent() {
        let image = noisy_image(64, 48);
        let settings = CompressionSettings::new(2 * KB as u64, 55, 30, 5);
        let encoder = WebpEncoder::new();

        let first = compress(&encoder, &image, &settings).unwrap();
        let second = compress(&encoder, &image, &settings).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_real_encoder_generous_budget() {
        let image = noisy_image(32, 32);
        let settings = CompressionSettings::new(10 * 1024 * KB as u64, 55, 30, 5);

        let result = compress(&WebpEncoder::new(), &image, &settings).unwrap();

        assert_eq!(result.quality(), 55);
        assert!(result.met());
        assert_eq!(&result.bytes()[8..12], b"WEBP");
    }

    #[test]
    fn test_real_encoder_impossible_budget() {
        let image = noisy_image(32, 32);
        let settings = CompressionSettings::new(1, 55, 30, 5);

        let result = compress(&WebpEncoder::new(), &image, &settings).unwrap();

        assert_eq!(result.quality(), 30);
        assert!(!result.met());
        assert!(result.size() > 1);
    }

    fn settings_strategy() -> impl Strategy<Value = CompressionSettings> {
        (0u8..=100, 1u8..=30, 1u64..=20_000).prop_flat_map(|(start, step, budget)| {
            (0u8..=start).prop_map(move |min| CompressionSettings::new(budget, start, min, step))
        })
    }

    proptest! {
        /// Property: the chosen quality is always a rung of the ladder.
        #[test]
        fn prop_quality_stays_on_ladder(settings in settings_strategy(), per_q in 0usize..256) {
            let encoder = MockEncoder::new().with_size_fn(move |q| usize::from(q) * per_q);
            let result = compress(&encoder, &test_image(), &settings).unwrap();

            let ladder = quality_ladder(&settings).unwrap();
            prop_assert!(ladder.contains(&result.quality()));
            let on_grid = result.quality() == settings.min_quality
                || (settings.start_quality - result.quality()) % settings.step == 0;
            prop_assert!(on_grid);
        }

        /// Property: attempts never exceed ceil((start - min) / step) + 1.
        #[test]
        fn prop_attempts_are_bounded(settings in settings_strategy(), per_q in 0usize..256) {
            let encoder = MockEncoder::new().with_size_fn(move |q| usize::from(q) * per_q);
            compress(&encoder, &test_image(), &settings).unwrap();

            let span = u32::from(settings.start_quality - settings.min_quality);
            let bound = span.div_ceil(u32::from(settings.step)) as usize + 1;
            prop_assert!(encoder.get_call_count() <= bound);
        }

        /// Property: a tighter budget never yields a higher quality.
        #[test]
        fn prop_tighter_budget_never_raises_quality(
            settings in settings_strategy(),
            b1 in 1u64..20_000,
            b2 in 1u64..20_000,
            per_q in 1usize..256,
        ) {
            let (tight, loose) = if b1 <= b2 { (b1, b2) } else { (b2, b1) };
            let encoder = MockEncoder::new().with_size_fn(move |q| usize::from(q) * per_q + 1);

            let tight_result = compress(
                &encoder,
                &test_image(),
                &CompressionSettings { budget_bytes: tight, ..settings },
            ).unwrap();
            let loose_result = compress(
                &encoder,
                &test_image(),
                &CompressionSettings { budget_bytes: loose, ..settings },
            ).unwrap();

            prop_assert!(tight_result.quality() <= loose_result.quality());
        }

        /// Property: if the start quality fits, it is taken on the first try.
        #[test]
        fn prop_generous_budget_takes_start_quality(settings in settings_strategy()) {
            let encoder = MockEncoder::new().with_size_fn(|q| usize::from(q) * 10);
            let settings = CompressionSettings {
                budget_bytes: u64::from(settings.start_quality) * 10 + 1,
                ..settings
            };

            let result = compress(&encoder, &test_image(), &settings).unwrap();

            prop_assert_eq!(result.quality(), settings.start_quality);
            prop_assert!(result.met());
            prop_assert_eq!(encoder.get_call_count(), 1);
        }
    }
}
