//! Perceptual hash primitives (§4.A): 64-bit DCT hash, average hash,
//! Hamming distance, autocrop, and aspect-preserving resize.
//!
//! These are the building blocks every index backend and the processor
//! consume; nothing here touches the metadata store or the filesystem scan.

use image::{imageops, DynamicImage, GrayImage, Luma};
use ndarray::Array2;

/// Side length of the thumbnail the DCT is computed over.
pub const DCT_THUMB_SIZE: u32 = 32;
/// Size of the retained low-frequency coefficient block (excludes DC).
const DCT_BLOCK: usize = 8;

/// `hamm64(a, b)`: population count of `a ^ b`. Symmetric, `hamm64(x, x) == 0`.
#[must_use]
pub fn hamm64(a: u64, b: u64) -> u32 {
    (a ^ b).count_ones()
}

/// 64-bit DCT perceptual hash (§4.A).
///
/// Grayscale -> resize to 32x32 (Lanczos3) -> 2D DCT-II -> take the
/// upper-left 8x8 block excluding the DC term -> compare each of the 63
/// remaining coefficients to their median -> pack MSB-first into a u64.
/// Bit 0 is always left clear so it stays usable as a radix key downstream
/// (the reserved-zero invariant holds by construction, not by masking).
#[must_use]
pub fn dct_hash_64(img: &DynamicImage) -> u64 {
    let gray = to_gray_thumbnail(img, DCT_THUMB_SIZE);
    let coeffs = dct2d(&gray);
    pack_coefficients(&coeffs)
}

/// Complementary hash: same pipeline, but bits compare against the mean
/// pixel intensity of an 8x8 downsample rather than DCT coefficients
/// against their median. The mean is taken over all 64 thumbnail pixels,
/// but (mirroring `dct_hash_64`'s DC-term skip) only 63 of them are
/// packed into bits, so bit 0 stays reserved and clear.
#[must_use]
pub fn average_hash_64(img: &DynamicImage) -> u64 {
    let thumb = to_gray_thumbnail(img, 8);
    let all_values: Vec<f64> = thumb.pixels().map(|p| f64::from(p.0[0])).collect();
    let mean = all_values.iter().sum::<f64>() / all_values.len() as f64;
    pack_against_threshold(&all_values[1..], mean)
}

fn to_gray_thumbnail(img: &DynamicImage, side: u32) -> GrayImage {
    let gray = imageops::grayscale(img);
    imageops::resize(&gray, side, side, imageops::FilterType::Lanczos3)
}

/// Separable 2D DCT-II over a square grayscale image, returning the
/// upper-left `DCT_BLOCK x DCT_BLOCK` coefficients.
fn dct2d(img: &GrayImage) -> Array2<f64> {
    let n = img.width() as usize;
    let mut pixels = Array2::<f64>::zeros((n, n));
    for y in 0..n {
        for x in 0..n {
            pixels[[y, x]] = f64::from(img.get_pixel(x as u32, y as u32).0[0]);
        }
    }

    let basis = dct_basis(n, DCT_BLOCK);
    // rows: project each row onto the first DCT_BLOCK basis vectors
    let mut rows_out = Array2::<f64>::zeros((n, DCT_BLOCK));
    for y in 0..n {
        for u in 0..DCT_BLOCK {
            let mut sum = 0.0;
            for x in 0..n {
                sum += pixels[[y, x]] * basis[[u, x]];
            }
            rows_out[[y, u]] = sum;
        }
    }
    // columns: project each column of the row-transformed data
    let mut out = Array2::<f64>::zeros((DCT_BLOCK, DCT_BLOCK));
    for u in 0..DCT_BLOCK {
        for v in 0..DCT_BLOCK {
            let mut sum = 0.0;
            for y in 0..n {
                sum += rows_out[[y, u]] * basis[[v, y]];
            }
            out[[v, u]] = sum;
        }
    }
    out
}

/// Precompute the first `k` DCT-II basis vectors for length `n`:
/// `basis[u][x] = alpha(u) * cos(pi/n * (x + 0.5) * u)`.
fn dct_basis(n: usize, k: usize) -> Array2<f64> {
    let mut basis = Array2::<f64>::zeros((k, n));
    for u in 0..k {
        let alpha = if u == 0 {
            (1.0 / n as f64).sqrt()
        } else {
            (2.0 / n as f64).sqrt()
        };
        for x in 0..n {
            basis[[u, x]] =
                alpha * ((std::f64::consts::PI / n as f64) * (x as f64 + 0.5) * u as f64).cos();
        }
    }
    basis
}

fn pack_coefficients(coeffs: &Array2<f64>) -> u64 {
    // row-major, skipping (0,0) which is the DC term
    let values: Vec<f64> = coeffs
        .indexed_iter()
        .filter(|((r, c), _)| !(*r == 0 && *c == 0))
        .map(|(_, &v)| v)
        .collect();
    debug_assert_eq!(values.len(), DCT_BLOCK * DCT_BLOCK - 1);
    let median = median_of(&values);
    pack_against_threshold(&values, median)
}

/// Pack `values` against `threshold` MSB-first, leaving bit 0 clear.
/// `values.len()` must be <= 63.
fn pack_against_threshold(values: &[f64], threshold: f64) -> u64 {
    debug_assert!(values.len() <= 63);
    let mut bits: u64 = 0;
    for (i, &v) in values.iter().enumerate() {
        if v > threshold {
            bits |= 1u64 << (63 - i);
        }
    }
    bits
}

fn median_of(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).expect("DCT coefficients are never NaN"));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Find the largest balanced (equal top/bottom, equal left/right) solid-color
/// border and crop it off. A row/column is "solid" iff every pixel in it is
/// within `range` of the image's median pixel value. Idempotent: running
/// autocrop again on the result returns the same image unchanged (a cropped
/// image with no remaining uniform border autocrops to itself).
#[must_use]
pub fn autocrop(img: &GrayImage, range: u8) -> GrayImage {
    let (w, h) = img.dimensions();
    if w <= 1 || h <= 1 {
        return img.clone();
    }

    let median = median_pixel(img);
    let is_row_solid = |y: u32| (0..w).all(|x| within_range(img.get_pixel(x, y).0[0], median, range));
    let is_col_solid = |x: u32| (0..h).all(|y| within_range(img.get_pixel(x, y).0[0], median, range));

    let mut top = 0;
    while top < h / 2 && is_row_solid(top) {
        top += 1;
    }
    let mut bottom = 0;
    while bottom < h / 2 && is_row_solid(h - 1 - bottom) {
        bottom += 1;
    }
    let vert = top.min(bottom);

    let mut left = 0;
    while left < w / 2 && is_col_solid(left) {
        left += 1;
    }
    let mut right = 0;
    while right < w / 2 && is_col_solid(w - 1 - right) {
        right += 1;
    }
    let horiz = left.min(right);

    let new_w = (w - 2 * horiz).max(1);
    let new_h = (h - 2 * vert).max(1);
    imageops::crop_imm(img, horiz, vert, new_w, new_h).to_image()
}

fn within_range(value: u8, median: u8, range: u8) -> bool {
    let diff = value.abs_diff(median);
    diff <= range
}

fn median_pixel(img: &GrayImage) -> u8 {
    let mut values: Vec<u8> = img.pixels().map(|p: &Luma<u8>| p.0[0]).collect();
    values.sort_unstable();
    values[values.len() / 2]
}

/// Scale so `max(w, h) == n`, preserving aspect ratio.
#[must_use]
pub fn resize_longest_side(img: &DynamicImage, n: u32, filter: imageops::FilterType) -> DynamicImage {
    let (w, h) = (img.width(), img.height());
    if w == 0 || h == 0 {
        return img.clone();
    }
    let (new_w, new_h) = if w >= h {
        (n, (u64::from(h) * u64::from(n) / u64::from(w)).max(1) as u32)
    } else {
        ((u64::from(w) * u64::from(n) / u64::from(h)).max(1) as u32, n)
    };
    img.resize_exact(new_w, new_h, filter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgba};

    fn solid_image(w: u32, h: u32, value: u8) -> DynamicImage {
        DynamicImage::ImageLuma8(ImageBuffer::from_pixel(w, h, Luma([value])))
    }

    fn checkerboard(w: u32, h: u32) -> DynamicImage {
        let buf = ImageBuffer::from_fn(w, h, |x, y| {
            let v = if (x / 4 + y / 4) % 2 == 0 { 0u8 } else { 255u8 };
            Rgba([v, v, v, 255])
        });
        DynamicImage::ImageRgba8(buf)
    }

    #[test]
    fn hamm64_self_distance_is_zero() {
        assert_eq!(hamm64(0xdead_beef_cafe_babe, 0xdead_beef_cafe_babe), 0);
    }

    #[test]
    fn hamm64_is_symmetric() {
        let (a, b) = (0x1234_5678_90ab_cdefu64, 0x0f0f_0f0f_0f0f_0f0fu64);
        assert_eq!(hamm64(a, b), hamm64(b, a));
    }

    #[test]
    fn average_hash_bit0_always_clear() {
        let img = checkerboard(64, 64);
        let h = average_hash_64(&img);
        assert_eq!(h & 1, 0);
    }

    #[test]
    fn average_hash_of_solid_image_has_no_set_bits_above_mean() {
        let img = solid_image(32, 32, 128);
        assert_eq!(average_hash_64(&img), 0);
    }

    #[test]
    fn dct_hash_bit0_always_clear() {
        let img = checkerboard(64, 64);
        let h = dct_hash_64(&img);
        assert_eq!(h & 1, 0);
    }

    #[test]
    fn dct_hash_stable_on_identical_input() {
        let img = checkerboard(128, 128);
        assert_eq!(dct_hash_64(&img), dct_hash_64(&img));
    }

    #[test]
    fn dct_hash_of_solid_image_has_no_set_bits_above_median() {
        // A perfectly flat image has all coefficients equal (== median),
        // so strictly-greater-than-median never fires.
        let img = solid_image(32, 32, 128);
        assert_eq!(dct_hash_64(&img), 0);
    }

    #[test]
    fn different_images_usually_hash_differently() {
        let a = checkerboard(64, 64);
        let b = solid_image(64, 64, 200);
        assert_ne!(dct_hash_64(&a), dct_hash_64(&b));
    }

    #[test]
    fn autocrop_removes_balanced_border() {
        let mut buf = ImageBuffer::from_pixel(20, 20, Luma([10u8]));
        for y in 4..16 {
            for x in 4..16 {
                buf.put_pixel(x, y, Luma([240u8]));
            }
        }
        let cropped = autocrop(&buf, 2);
        assert!(cropped.width() <= 12);
        assert!(cropped.height() <= 12);
    }

    #[test]
    fn autocrop_is_idempotent() {
        let mut buf = ImageBuffer::from_pixel(16, 16, Luma([5u8]));
        for y in 2..14 {
            for x in 2..14 {
                buf.put_pixel(x, y, Luma([250u8]));
            }
        }
        let once = autocrop(&buf, 1);
        let twice = autocrop(&once, 1);
        assert_eq!(once.dimensions(), twice.dimensions());
    }

    #[test]
    fn autocrop_never_collapses_to_empty() {
        let buf = ImageBuffer::from_pixel(4, 4, Luma([100u8]));
        let cropped = autocrop(&buf, 0);
        assert!(cropped.width() >= 1 && cropped.height() >= 1);
    }

    #[test]
    fn resize_longest_side_preserves_aspect() {
        let img = solid_image(200, 100, 1);
        let resized = resize_longest_side(&img, 64, imageops::FilterType::Lanczos3);
        assert_eq!(resized.width(), 64);
        assert_eq!(resized.height(), 32);
    }

    #[test]
    fn resize_longest_side_handles_portrait() {
        let img = solid_image(50, 200, 1);
        let resized = resize_longest_side(&img, 64, imageops::FilterType::Lanczos3);
        assert_eq!(resized.height(), 64);
        assert_eq!(resized.width(), 16);
    }
}
