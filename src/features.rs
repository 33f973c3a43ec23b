//! Statistical image features for tone prediction.
//!
//! [`extract`] reduces an image to a 7-dimensional descriptor of its
//! luminance and saturation distributions. The descriptor is the regression
//! input for the tone predictor, so the field order is load-bearing and must
//! stay in sync between training and inference.

use serde::{Deserialize, Serialize};

use crate::image::ImageData;

/// Number of features produced by [`extract`].
pub const FEATURE_COUNT: usize = 7;

/// 7-dimensional statistical descriptor of an image.
///
/// Luminance is BT.601 luma (`0.299 R + 0.587 G + 0.114 B`), saturation is
/// HSV saturation scaled to 0-255. The three ratio fields partition the
/// luminance population into dark (< 50), mid ([50, 150)), and bright
/// (>= 150) buckets and sum to 1.0 whenever at least one pixel is included.
///
/// For RGBA images only pixels with alpha > 0 contribute. A fully transparent
/// image yields all-zero features.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageFeatures {
    /// Mean luminance over included pixels.
    pub luminance_mean: f64,
    /// Population standard deviation of luminance.
    pub luminance_std: f64,
    /// Fraction of included pixels with luminance below 50.
    pub dark_ratio: f64,
    /// Fraction of included pixels with luminance in [50, 150).
    pub mid_ratio: f64,
    /// Fraction of included pixels with luminance at or above 150.
    pub bright_ratio: f64,
    /// Mean saturation over included pixels.
    pub saturation_mean: f64,
    /// Population standard deviation of saturation.
    pub saturation_std: f64,
}

impl ImageFeatures {
    /// Components in regression input order.
    #[must_use]
    pub fn to_array(self) -> [f64; FEATURE_COUNT] {
        [
            self.luminance_mean,
            self.luminance_std,
            self.dark_ratio,
            self.mid_ratio,
            self.bright_ratio,
            self.saturation_mean,
            self.saturation_std,
        ]
    }

    /// Field names in regression input order, for reports.
    #[must_use]
    pub fn names() -> [&'static str; FEATURE_COUNT] {
        [
            "luminance_mean",
            "luminance_std",
            "dark_ratio",
            "mid_ratio",
            "bright_ratio",
            "saturation_mean",
            "saturation_std",
        ]
    }
}

/// Compute the feature descriptor for an image.
///
/// Deterministic for identical pixel data; no side effects.
#[must_use]
pub fn extract(image: &ImageData) -> ImageFeatures {
    let mut luminance = Vec::new();
    let mut saturation = Vec::new();

    let mut push = |r: u8, g: u8, b: u8| {
        let (r, g, b) = (r as f64, g as f64, b as f64);
        luminance.push(0.299 * r + 0.587 * g + 0.114 * b);

        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let sat = if max > 0.0 { (max - min) / max } else { 0.0 };
        saturation.push(sat * 255.0);
    };

    match image {
        ImageData::Rgb8(img) => {
            for p in img.pixels() {
                push(p.r, p.g, p.b);
            }
        }
        ImageData::Rgba8(img) => {
            for p in img.pixels() {
                if p.a > 0 {
                    push(p.r, p.g, p.b);
                }
            }
        }
    }

    if luminance.is_empty() {
        return ImageFeatures::default();
    }

    let n = luminance.len() as f64;
    let dark = luminance.iter().filter(|&&l| l < 50.0).count() as f64;
    let bright = luminance.iter().filter(|&&l| l >= 150.0).count() as f64;
    let mid = luminance.len() as f64 - dark - bright;

    ImageFeatures {
        luminance_mean: mean(&luminance),
        luminance_std: population_std(&luminance),
        dark_ratio: dark / n,
        mid_ratio: mid / n,
        bright_ratio: bright / n,
        saturation_mean: mean(&saturation),
        saturation_std: population_std(&saturation),
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation (N denominator).
fn population_std(values: &[f64]) -> f64 {
    let m = mean(values);
    let variance = values.iter().map(|x| (x - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use imgref::ImgVec;
    use rgb::{RGB8, RGBA8};

    #[test]
    fn test_uniform_gray_end_to_end() {
        let img = ImageData::Rgb8(ImgVec::new(
            vec![RGB8::new(128, 128, 128); 100 * 100],
            100,
            100,
        ));
        let f = extract(&img);

        assert!((f.luminance_mean - 128.0).abs() < 1e-6);
        assert!(f.luminance_std.abs() < 1e-6);
        assert!(f.dark_ratio.abs() < 1e-12);
        assert!((f.mid_ratio - 1.0).abs() < 1e-12);
        assert!(f.bright_ratio.abs() < 1e-12);
        assert!(f.saturation_mean.abs() < 1e-12);
        assert!(f.saturation_std.abs() < 1e-12);
    }

    #[test]
    fn test_ratio_sum_invariant() {
        let pixels = (0..256)
            .map(|i| RGB8::new(i as u8, (i / 2) as u8, (255 - i) as u8))
            .collect();
        let img = ImageData::Rgb8(ImgVec::new(pixels, 16, 16));
        let f = extract(&img);
        let sum = f.dark_ratio + f.mid_ratio + f.bright_ratio;
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_bucket_assignment() {
        // One pixel per bucket boundary region
        let pixels = vec![
            RGB8::new(10, 10, 10),   // dark
            RGB8::new(50, 50, 50),   // mid (boundary is inclusive)
            RGB8::new(149, 149, 149),// mid
            RGB8::new(150, 150, 150),// bright (boundary is inclusive)
        ];
        let img = ImageData::Rgb8(ImgVec::new(pixels, 2, 2));
        let f = extract(&img);
        assert!((f.dark_ratio - 0.25).abs() < 1e-12);
        assert!((f.mid_ratio - 0.5).abs() < 1e-12);
        assert!((f.bright_ratio - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_saturation_scale() {
        // Pure red: max=255, min=0, saturation = 255
        let img = ImageData::Rgb8(ImgVec::new(vec![RGB8::new(255, 0, 0); 4], 2, 2));
        let f = extract(&img);
        assert!((f.saturation_mean - 255.0).abs() < 1e-9);

        // Black pixel: max = 0, saturation defined as 0
        let img = ImageData::Rgb8(ImgVec::new(vec![RGB8::new(0, 0, 0); 4], 2, 2));
        let f = extract(&img);
        assert!(f.saturation_mean.abs() < 1e-12);
    }

    #[test]
    fn test_alpha_mask_restricts_population() {
        // Opaque dark pixel plus transparent bright pixels: only the dark one counts
        let pixels = vec![
            RGBA8::new(10, 10, 10, 255),
            RGBA8::new(250, 250, 250, 0),
            RGBA8::new(250, 250, 250, 0),
            RGBA8::new(250, 250, 250, 0),
        ];
        let img = ImageData::Rgba8(ImgVec::new(pixels, 2, 2));
        let f = extract(&img);
        assert!((f.dark_ratio - 1.0).abs() < 1e-12);
        assert!((f.luminance_mean - 10.0).abs() < 1e-6);
    }

    #[test]
    fn test_fully_transparent_is_all_zero() {
        let img = ImageData::Rgba8(ImgVec::new(vec![RGBA8::new(200, 10, 30, 0); 9], 3, 3));
        assert_eq!(extract(&img), ImageFeatures::default());
    }

    #[test]
    fn test_to_array_order() {
        let f = ImageFeatures {
            luminance_mean: 1.0,
            luminance_std: 2.0,
            dark_ratio: 3.0,
            mid_ratio: 4.0,
            bright_ratio: 5.0,
            saturation_mean: 6.0,
            saturation_std: 7.0,
        };
        assert_eq!(f.to_array(), [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
        assert_eq!(ImageFeatures::names().len(), FEATURE_COUNT);
    }
}
