use std::path::Path;

use image::codecs::jpeg::JpegEncoder as ImageJpegEncoder;
use image::imageops::FilterType;
use image::RgbImage;
use thiserror::Error;
use tracing::debug;

use crate::types::{CompressionBudget, ImageBlob, NormalizedImage, Quality};

#[derive(Debug, Error)]
pub enum CompressError {
    #[error("Failed to decode image: {0}")]
    Decode(String),
    #[error("Failed to encode image: {0}")]
    Encode(String),
    #[error("Compression task failed: {0}")]
    Join(String),
}

/// Abstraction over the lossy re-encoder used by [`normalize_with`].
pub trait LossyEncoder: Send + Sync {
    fn encode(&self, image: &RgbImage, quality: Quality) -> Result<Vec<u8>, CompressError>;

    fn mime_type(&self) -> &'static str;

    fn extension(&self) -> &'static str;
}

/// Baseline JPEG via the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct JpegEncoder;

impl LossyEncoder for JpegEncoder {
    fn encode(&self, image: &RgbImage, quality: Quality) -> Result<Vec<u8>, CompressError> {
        let mut buf = Vec::new();
        ImageJpegEncoder::new_with_quality(&mut buf, quality.percent())
            .encode_image(image)
            .map_err(|e| CompressError::Encode(e.to_string()))?;
        Ok(buf)
    }

    fn mime_type(&self) -> &'static str {
        "image/jpeg"
    }

    fn extension(&self) -> &'static str {
        "jpg"
    }
}

/// Shrink `image` until it fits `budget`, re-encoding as JPEG.
pub fn normalize(
    image: &ImageBlob,
    budget: CompressionBudget,
) -> Result<NormalizedImage, CompressError> {
    normalize_with(&JpegEncoder, image, budget)
}

/// Runs [`normalize`] on the blocking pool.
pub async fn normalize_async(
    image: ImageBlob,
    budget: CompressionBudget,
) -> Result<NormalizedImage, CompressError> {
    tokio::task::spawn_blocking(move || normalize(&image, budget))
        .await
        .map_err(|e| CompressError::Join(e.to_string()))?
}

/// Images already within the byte budget are returned untouched. Anything
/// larger is decoded, its longer edge capped at `max_dimension`, and encoded
/// at quality 0.9, 0.8, … until it fits. Reaching 0.1 without fitting is not
/// an error: the 0.1 encode is returned.
pub fn normalize_with<E: LossyEncoder + ?Sized>(
    encoder: &E,
    image: &ImageBlob,
    budget: CompressionBudget,
) -> Result<NormalizedImage, CompressError> {
    if image.bytes.is_empty() {
        return Err(CompressError::Decode("image is empty".to_string()));
    }

    if image.byte_size() <= budget.max_bytes() {
        debug!(file = %image.file_name, size = image.byte_size(), "image within budget, passing through");
        return Ok(NormalizedImage::passthrough(image.clone()));
    }

    let decoded =
        image::load_from_memory(&image.bytes).map_err(|e| CompressError::Decode(e.to_string()))?;

    let (src_w, src_h) = (decoded.width(), decoded.height());
    let (width, height) = target_dimensions(src_w, src_h, budget.max_dimension());
    let pixels: RgbImage = if (width, height) == (src_w, src_h) {
        decoded.to_rgb8()
    } else {
        debug!(src_w, src_h, width, height, "resizing");
        decoded.resize_exact(width, height, FilterType::Lanczos3).to_rgb8()
    };

    let mut quality = Quality::START;
    let bytes = loop {
        let encoded = encoder.encode(&pixels, quality)?;
        let fits = encoded.len() as u64 <= budget.max_bytes();
        debug!(%quality, size = encoded.len(), fits, "encoded");

        match quality.step_down() {
            Some(next) if !fits => quality = next,
            _ => break encoded,
        }
    };

    debug!(
        file = %image.file_name,
        from = image.byte_size(),
        to = bytes.len(),
        %quality,
        "image normalized"
    );

    Ok(NormalizedImage {
        blob: ImageBlob::new(
            bytes,
            encoder.mime_type(),
            with_extension(&image.file_name, encoder.extension()),
        ),
        quality: Some(quality),
        dimensions: Some((width, height)),
    })
}

/// Caps the longer edge at `max_dimension`, scaling the shorter edge to keep
/// the aspect ratio (rounded to nearest, never below one pixel).
pub fn target_dimensions(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    if width <= max_dimension && height <= max_dimension {
        return (width, height);
    }

    let scale = |short: u32, long: u32| -> u32 {
        let (short, long, max) = (u64::from(short), u64::from(long), u64::from(max_dimension));
        let scaled = (2 * short * max + long) / (2 * long);
        u32::try_from(scaled).unwrap_or(max_dimension).max(1)
    };

    if width >= height {
        (max_dimension, scale(height, width))
    } else {
        (scale(width, height), max_dimension)
    }
}

fn with_extension(file_name: &str, ext: &str) -> String {
    let renamed = Path::new(file_name).with_extension(ext);
    match renamed.to_str() {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => format!("image.{ext}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageBuffer, Rgb};
    use std::io::Cursor;
    use std::sync::Mutex;

    fn noisy_rgb(width: u32, height: u32) -> DynamicImage {
        let img: RgbImage = ImageBuffer::from_fn(width, height, |x, y| {
            let v = x.wrapping_mul(7919) ^ y.wrapping_mul(104_729) ^ x.wrapping_mul(y);
            Rgb([v as u8, (v >> 8) as u8, (v >> 16) as u8])
        });
        DynamicImage::ImageRgb8(img)
    }

    fn png_blob(img: &DynamicImage, name: &str) -> ImageBlob {
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        ImageBlob::new(buf, "image/png", name)
    }

    /// Always too large; records every quality it was asked for.
    struct BloatedEncoder {
        size: usize,
        calls: Mutex<Vec<Quality>>,
    }

    impl LossyEncoder for BloatedEncoder {
        fn encode(&self, _image: &RgbImage, quality: Quality) -> Result<Vec<u8>, CompressError> {
            self.calls.lock().unwrap().push(quality);
            Ok(vec![0u8; self.size])
        }

        fn mime_type(&self) -> &'static str {
            "image/jpeg"
        }

        fn extension(&self) -> &'static str {
            "jpg"
        }
    }

    struct FailingEncoder;

    impl LossyEncoder for FailingEncoder {
        fn encode(&self, _image: &RgbImage, _quality: Quality) -> Result<Vec<u8>, CompressError> {
            Err(CompressError::Encode("encoder exploded".into()))
        }

        fn mime_type(&self) -> &'static str {
            "image/jpeg"
        }

        fn extension(&self) -> &'static str {
            "jpg"
        }
    }

    #[test]
    fn small_image_passes_through_byte_identical() {
        let blob = png_blob(&noisy_rgb(8, 8), "tiny.png");
        let budget = CompressionBudget::new(blob.byte_size(), 2048).unwrap();
        let out = normalize(&blob, budget).unwrap();
        assert_eq!(out.blob, blob);
        assert!(!out.was_reencoded());
    }

    #[test]
    fn small_corrupt_input_is_not_inspected() {
        let blob = ImageBlob::new(b"not an image".to_vec(), "image/png", "x.png");
        let out = normalize(&blob, CompressionBudget::default()).unwrap();
        assert_eq!(out.blob.bytes, b"not an image");
    }

    #[test]
    fn empty_input_is_a_decode_error() {
        let blob = ImageBlob::new(Vec::new(), "image/png", "empty.png");
        let err = normalize(&blob, CompressionBudget::default()).unwrap_err();
        assert!(matches!(err, CompressError::Decode(_)));
    }

    #[test]
    fn oversized_corrupt_input_is_a_decode_error() {
        let blob = ImageBlob::new(vec![0xAB; 64], "image/jpeg", "junk.jpg");
        let budget = CompressionBudget::new(16, 2048).unwrap();
        let err = normalize(&blob, budget).unwrap_err();
        assert!(matches!(err, CompressError::Decode(_)));
    }

    #[test]
    fn quality_search_is_linear_down_to_floor() {
        let blob = png_blob(&noisy_rgb(16, 16), "receipt.png");
        let budget = CompressionBudget::new(10, 2048).unwrap();
        let encoder = BloatedEncoder { size: 11, calls: Mutex::new(Vec::new()) };

        let out = normalize_with(&encoder, &blob, budget).unwrap();

        let seen: Vec<f32> = encoder.calls.lock().unwrap().iter().map(|q| q.as_f32()).collect();
        assert_eq!(seen, vec![0.9, 0.8, 0.7, 0.6, 0.5, 0.4, 0.3, 0.2, 0.1]);
        assert_eq!(out.quality, Some(Quality::FLOOR));
        assert_eq!(out.blob.byte_size(), 11);
    }

    #[test]
    fn search_stops_at_first_fit() {
        let blob = png_blob(&noisy_rgb(16, 16), "receipt.png");
        let budget = CompressionBudget::new(10, 2048).unwrap();
        let encoder = BloatedEncoder { size: 10, calls: Mutex::new(Vec::new()) };

        let out = normalize_with(&encoder, &blob, budget).unwrap();

        assert_eq!(encoder.calls.lock().unwrap().len(), 1);
        assert_eq!(out.quality, Some(Quality::START));
    }

    #[test]
    fn encoder_failure_surfaces() {
        let blob = png_blob(&noisy_rgb(16, 16), "receipt.png");
        let budget = CompressionBudget::new(10, 2048).unwrap();
        let err = normalize_with(&FailingEncoder, &blob, budget).unwrap_err();
        assert!(matches!(err, CompressError::Encode(_)));
    }

    #[test]
    fn jpeg_output_meets_budget_or_floor() {
        let blob = png_blob(&noisy_rgb(600, 400), "receipt.png");
        let budget = CompressionBudget::new(40_000, 300).unwrap();

        let out = normalize(&blob, budget).unwrap();

        assert!(out.blob.byte_size() <= budget.max_bytes() || out.quality == Some(Quality::FLOOR));
        assert_eq!(out.dimensions, Some((300, 200)));
        assert_eq!(out.blob.mime_type, "image/jpeg");
        assert_eq!(out.blob.file_name, "receipt.jpg");
        // JPEG SOI marker.
        assert_eq!(&out.blob.bytes[..2], &[0xFF, 0xD8]);
        let reread = image::load_from_memory(&out.blob.bytes).unwrap();
        assert_eq!((reread.width(), reread.height()), (300, 200));
    }

    #[test]
    fn rgba_input_is_flattened_for_jpeg() {
        let rgba = DynamicImage::ImageRgba8(ImageBuffer::from_fn(32, 32, |x, y| {
            image::Rgba([x as u8 * 8, y as u8 * 8, 0, 128])
        }));
        let blob = png_blob(&rgba, "alpha.png");
        let budget = CompressionBudget::new(1, 2048).unwrap();
        let out = normalize(&blob, budget).unwrap();
        assert_eq!(out.quality, Some(Quality::FLOOR));
        assert_eq!(out.dimensions, Some((32, 32)));
    }

    #[tokio::test]
    async fn async_wrapper_matches_sync() {
        let blob = png_blob(&noisy_rgb(64, 48), "receipt.png");
        let budget = CompressionBudget::new(2_000, 32).unwrap();
        let sync = normalize(&blob, budget).unwrap();
        let asynced = normalize_async(blob, budget).await.unwrap();
        assert_eq!(sync, asynced);
    }

    #[test]
    fn target_dimensions_within_cap_untouched() {
        assert_eq!(target_dimensions(800, 600, 2048), (800, 600));
        assert_eq!(target_dimensions(2048, 2048, 2048), (2048, 2048));
        assert_eq!(target_dimensions(1, 1, 2048), (1, 1));
    }

    #[test]
    fn target_dimensions_clamp_longer_edge() {
        assert_eq!(target_dimensions(4000, 3000, 2048), (2048, 1536));
        assert_eq!(target_dimensions(3000, 4000, 2048), (1536, 2048));
        assert_eq!(target_dimensions(5000, 5000, 2048), (2048, 2048));
        // 1000 * 2048 / 3000 = 682.67
        assert_eq!(target_dimensions(3000, 1000, 2048), (2048, 683));
    }

    #[test]
    fn target_dimensions_never_zero() {
        assert_eq!(target_dimensions(100_000, 1, 2048), (2048, 1));
        assert_eq!(target_dimensions(1, 100_000, 2048), (1, 2048));
        assert_eq!(target_dimensions(3, 2, 1), (1, 1));
    }

    #[test]
    fn target_dimensions_preserve_aspect_ratio() {
        let sizes = [(4032, 3024), (3024, 4032), (2049, 17), (12_000, 9_000), (2500, 2499), (7000, 300)];
        for (w, h) in sizes {
            let (ow, oh) = target_dimensions(w, h, 2048);
            assert!(ow <= 2048 && oh <= 2048, "{w}x{h} -> {ow}x{oh}");
            assert!(ow >= 1 && oh >= 1);
            // Rounding one edge by at most half a pixel bounds the cross product.
            let skew = (i64::from(ow) * i64::from(h) - i64::from(oh) * i64::from(w)).abs();
            assert!(2 * skew <= i64::from(w.max(h)), "{w}x{h} -> {ow}x{oh}");
        }
        let (ow, oh) = target_dimensions(4032, 3024, 2048);
        assert!((ow as f64 / oh as f64 - 4032.0 / 3024.0).abs() < 1e-3);
    }

    #[test]
    fn extension_is_normalized() {
        assert_eq!(with_extension("receipt.png", "jpg"), "receipt.jpg");
        assert_eq!(with_extension("scan.2024.HEIC", "jpg"), "scan.2024.jpg");
        assert_eq!(with_extension("photo", "jpg"), "photo.jpg");
        assert_eq!(with_extension("", "jpg"), "image.jpg");
    }
}
