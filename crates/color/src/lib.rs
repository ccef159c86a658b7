//! Color descriptor (§4.C): up to 32 quantized LUV colors with a
//! k-means-like clustering construction and a weighted-distance metric.

use image::{DynamicImage, GenericImageView};
use serde::{Deserialize, Serialize};

/// Maximum number of clusters kept in a descriptor.
pub const MAX_COLORS: usize = 32;

/// LUV compression ranges (§3).
const L_RANGE: (f64, f64) = (0.0, 100.0);
const U_RANGE: (f64, f64) = (-134.0, 220.0);
const V_RANGE: (f64, f64) = (-140.0, 122.0);

/// One quantized color: LUV components compressed into `[0, 2^16)`, plus a
/// weight proportional to cluster population (also normalized to `u16`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorEntry {
    pub l: u16,
    pub u: u16,
    pub v: u16,
    pub weight: u16,
}

impl ColorEntry {
    /// Unique key of the color: `(l << 32 | u << 16 | v)`.
    #[must_use]
    pub fn key(self) -> u64 {
        (u64::from(self.l) << 32) | (u64::from(self.u) << 16) | u64::from(self.v)
    }

    fn luv(self) -> (f64, f64, f64) {
        (
            expand(self.l, L_RANGE),
            expand(self.u, U_RANGE),
            expand(self.v, V_RANGE),
        )
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ColorDescriptor {
    pub entries: Vec<ColorEntry>,
}

fn compress(value: f64, range: (f64, f64)) -> u16 {
    let (lo, hi) = range;
    let clamped = value.clamp(lo, hi);
    let norm = (clamped - lo) / (hi - lo);
    (norm * f64::from(u16::MAX)).round() as u16
}

fn expand(value: u16, range: (f64, f64)) -> f64 {
    let (lo, hi) = range;
    lo + (f64::from(value) / f64::from(u16::MAX)) * (hi - lo)
}

fn srgb_to_linear(c: f64) -> f64 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

/// sRGB (0..1 each) to CIE LUV.
fn rgb_to_luv(r: u8, g: u8, b: u8) -> (f64, f64, f64) {
    let (r, g, b) = (
        srgb_to_linear(f64::from(r) / 255.0),
        srgb_to_linear(f64::from(g) / 255.0),
        srgb_to_linear(f64::from(b) / 255.0),
    );
    // sRGB -> XYZ (D65)
    let x = 0.4124 * r + 0.3576 * g + 0.1805 * b;
    let y = 0.2126 * r + 0.7152 * g + 0.0722 * b;
    let z = 0.0193 * r + 0.1192 * g + 0.9505 * b;

    let yn = 1.0;
    let un = 0.1978;
    let vn = 0.4683;

    let denom = x + 15.0 * y + 3.0 * z;
    let (u_prime, v_prime) = if denom > 1e-9 {
        (4.0 * x / denom, 9.0 * y / denom)
    } else {
        (0.0, 0.0)
    };

    let l = if y / yn > 0.008856 {
        116.0 * (y / yn).cbrt() - 16.0
    } else {
        903.3 * (y / yn)
    };
    let u = 13.0 * l * (u_prime - un);
    let v = 13.0 * l * (v_prime - vn);
    (l, u, v)
}

/// Tiny deterministic PRNG (xorshift64*) so centroid seeding is
/// bit-reproducible without pulling in a general-purpose RNG crate for one
/// call site.
struct Xorshift64(u64);

impl Xorshift64 {
    fn next(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }
}

/// Build a color descriptor via k-means-like clustering of LUV pixels down
/// to at most `MAX_COLORS` centroids. Deterministic: the same input bytes
/// and `seed` always produce the same output.
#[must_use]
pub fn compute_color_descriptor(img: &DynamicImage, seed: u64) -> ColorDescriptor {
    let rgb = img.to_rgb8();
    let pixels: Vec<(f64, f64, f64)> = rgb
        .pixels()
        .map(|p| rgb_to_luv(p.0[0], p.0[1], p.0[2]))
        .collect();

    if pixels.is_empty() {
        return ColorDescriptor::default();
    }

    let k = MAX_COLORS.min(pixels.len());
    let mut rng = Xorshift64(seed | 1);
    let mut centroids: Vec<(f64, f64, f64)> = (0..k)
        .map(|_| pixels[(rng.next() as usize) % pixels.len()])
        .collect();

    const ITERATIONS: usize = 8;
    let mut assignment = vec![0usize; pixels.len()];
    for _ in 0..ITERATIONS {
        for (i, &p) in pixels.iter().enumerate() {
            let mut best = 0usize;
            let mut best_d = f64::MAX;
            for (c_idx, &c) in centroids.iter().enumerate() {
                let d = euclid2(p, c);
                if d < best_d {
                    best_d = d;
                    best = c_idx;
                }
            }
            assignment[i] = best;
        }

        let mut sums = vec![(0.0, 0.0, 0.0); k];
        let mut counts = vec![0u64; k];
        for (i, &p) in pixels.iter().enumerate() {
            let c = assignment[i];
            sums[c].0 += p.0;
            sums[c].1 += p.1;
            sums[c].2 += p.2;
            counts[c] += 1;
        }
        for c in 0..k {
            if counts[c] > 0 {
                centroids[c] = (
                    sums[c].0 / counts[c] as f64,
                    sums[c].1 / counts[c] as f64,
                    sums[c].2 / counts[c] as f64,
                );
            }
        }
    }

    let mut population = vec![0u64; k];
    for &a in &assignment {
        population[a] += 1;
    }
    let total: u64 = population.iter().sum();

    let mut entries: Vec<ColorEntry> = (0..k)
        .filter(|&c| population[c] > 0)
        .map(|c| {
            let (l, u, v) = centroids[c];
            let weight_frac = population[c] as f64 / total.max(1) as f64;
            ColorEntry {
                l: compress(l, L_RANGE),
                u: compress(u, U_RANGE),
                v: compress(v, V_RANGE),
                weight: (weight_frac * f64::from(u16::MAX)).round() as u16,
            }
        })
        .collect();
    entries.truncate(MAX_COLORS);

    ColorDescriptor { entries }
}

fn euclid2(a: (f64, f64, f64), b: (f64, f64, f64)) -> f64 {
    let dl = a.0 - b.0;
    let du = a.1 - b.1;
    let dv = a.2 - b.2;
    dl * dl + du * du + dv * dv
}

/// Weighted distance: sum over all centroid pairs of `w_i * w_j *
/// euclidean(luv_i, luv_j)^2`, divided by the total weight squared.
/// Symmetric; `distance(x, x) == 0`.
#[must_use]
pub fn distance(a: &ColorDescriptor, b: &ColorDescriptor) -> f64 {
    if a.entries.is_empty() || b.entries.is_empty() {
        return 0.0;
    }
    let mut sum = 0.0;
    let mut weight_sum = 0.0;
    for &ea in &a.entries {
        for &eb in &b.entries {
            let wa = f64::from(ea.weight);
            let wb = f64::from(eb.weight);
            let d2 = euclid2(ea.luv(), eb.luv());
            sum += wa * wb * d2;
            weight_sum += wa * wb;
        }
    }
    if weight_sum == 0.0 {
        0.0
    } else {
        sum / (weight_sum * weight_sum).max(f64::EPSILON)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    fn solid(w: u32, h: u32, rgb: [u8; 3]) -> DynamicImage {
        DynamicImage::ImageRgb8(ImageBuffer::from_pixel(w, h, Rgb(rgb)))
    }

    #[test]
    fn distance_to_self_is_zero() {
        let img = solid(16, 16, [120, 60, 200]);
        let d = compute_color_descriptor(&img, 42);
        assert_eq!(distance(&d, &d), 0.0);
    }

    #[test]
    fn distance_is_symmetric() {
        let a = compute_color_descriptor(&solid(16, 16, [255, 0, 0]), 1);
        let b = compute_color_descriptor(&solid(16, 16, [0, 255, 0]), 1);
        assert!((distance(&a, &b) - distance(&b, &a)).abs() < 1e-9);
    }

    #[test]
    fn deterministic_given_same_seed() {
        let img = solid(8, 8, [10, 200, 30]);
        let a = compute_color_descriptor(&img, 7);
        let b = compute_color_descriptor(&img, 7);
        assert_eq!(a.entries.len(), b.entries.len());
        for (ea, eb) in a.entries.iter().zip(b.entries.iter()) {
            assert_eq!(ea.key(), eb.key());
            assert_eq!(ea.weight, eb.weight);
        }
    }

    #[test]
    fn at_most_32_colors() {
        let img = solid(64, 64, [1, 2, 3]);
        let d = compute_color_descriptor(&img, 9);
        assert!(d.entries.len() <= MAX_COLORS);
    }

    #[test]
    fn solid_image_has_single_color_entry() {
        let img = solid(32, 32, [50, 50, 50]);
        let d = compute_color_descriptor(&img, 3);
        assert_eq!(d.entries.len(), 1);
        assert_eq!(d.entries[0].weight, u16::MAX);
    }

    #[test]
    fn different_colors_have_positive_distance() {
        let a = compute_color_descriptor(&solid(16, 16, [255, 255, 255]), 1);
        let b = compute_color_descriptor(&solid(16, 16, [0, 0, 0]), 1);
        assert!(distance(&a, &b) > 0.0);
    }
}
