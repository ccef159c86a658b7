//! Image half of the processor (§4.G step 2): decode, digest, DCT-image
//! hash, DCT-features (keypoint hashes), and color descriptor.

use crate::digest::compute_digest;
use crate::error::{ProcessorError, Result};
use image::{DynamicImage, GenericImageView};
use media_dedup_color::compute_color_descriptor;
use media_dedup_common::{Media, MediaType};
use media_dedup_hash::{autocrop, dct_hash_64};
use std::path::Path;

/// Feature hash crop must be at least this large to be worth hashing
/// (§4.G: "if the region is ≥ 31×31").
const MIN_FEATURE_REGION: u32 = 31;
const FEATURE_HALF_SIZE: i64 = 16;

pub struct ImageOptions {
    pub num_features: usize,
    pub auto_crop: bool,
    pub color_seed: u64,
}

impl Default for ImageOptions {
    fn default() -> Self {
        ImageOptions { num_features: 40, auto_crop: true, color_seed: 0x5eed }
    }
}

/// Fully process one image file into a populated `Media` record.
pub fn process_image(path: &Path, opts: &ImageOptions) -> Result<Media> {
    let bytes = std::fs::read(path).map_err(|source| ProcessorError::Open { path: path.to_path_buf(), source })?;
    let digest = compute_digest(&bytes);

    let img = image::load_from_memory(&bytes)?;
    let (width, height) = img.dimensions();

    let mut working = img.clone();
    if opts.auto_crop {
        working = autocrop(&working, 12);
    }

    let dct_hash = dct_hash_64(&working);
    let feature_hashes = compute_feature_hashes(&working, opts.num_features);
    let color_descriptor = compute_color_descriptor(&working, opts.color_seed);

    let mut media = Media::new(path.to_path_buf(), MediaType::Image);
    media.digest = Some(digest);
    media.width = width;
    media.height = height;
    media.dct_hash = Some(dct_hash);
    media.feature_hashes = Some(feature_hashes);
    media.color_descriptor = Some(color_descriptor);
    Ok(media)
}

/// Detect up to `num_features` corner keypoints and hash a square region
/// around each (§4.G). Corner detection stands in for ORB's detector
/// stage; descriptor matching itself lives behind the template-match
/// crate's `AffineValidator`.
fn compute_feature_hashes(img: &DynamicImage, num_features: usize) -> Vec<u64> {
    let gray = img.to_luma8();
    let corners = imageproc::corners::corners_fast9(&gray, 32);
    let mut ranked = corners;
    ranked.sort_by(|a, b| b.score.cmp(&a.score));
    ranked.truncate(num_features);

    let (w, h) = (gray.width() as i64, gray.height() as i64);
    ranked
        .into_iter()
        .filter_map(|corner| {
            let (cx, cy) = (i64::from(corner.x), i64::from(corner.y));
            let left = (cx - FEATURE_HALF_SIZE).max(0);
            let top = (cy - FEATURE_HALF_SIZE).max(0);
            let right = (cx + FEATURE_HALF_SIZE).min(w);
            let bottom = (cy + FEATURE_HALF_SIZE).min(h);
            let (region_w, region_h) = ((right - left) as u32, (bottom - top) as u32);
            if region_w < MIN_FEATURE_REGION || region_h < MIN_FEATURE_REGION {
                return None;
            }
            let cropped = img.crop_imm(left as u32, top as u32, region_w, region_h);
            Some(dct_hash_64(&cropped))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    fn write_test_png(dir: &Path) -> std::path::PathBuf {
        let img: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::from_fn(64, 64, |x, y| {
            Rgb([(x * 4) as u8, (y * 4) as u8, 128])
        });
        let path = dir.join("t.png");
        img.save(&path).unwrap();
        path
    }

    #[test]
    fn process_image_populates_all_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_test_png(dir.path());
        let media = process_image(&path, &ImageOptions::default()).unwrap();
        assert!(media.digest.is_some());
        assert!(media.dct_hash.is_some());
        assert!(media.color_descriptor.is_some());
        assert_eq!(media.width, 64);
        assert_eq!(media.height, 64);
    }

    #[test]
    fn missing_file_is_an_open_error() {
        let result = process_image(Path::new("/does/not/exist.png"), &ImageOptions::default());
        assert!(matches!(result, Err(ProcessorError::Open { .. })));
    }
}
