//! Parametric brightness/contrast/gamma tone curve.
//!
//! The curve maps each RGB channel value `x` through
//! `clip((x * contrast + brightness) / 255, 0, 1) ^ gamma * 255`,
//! independently per channel. Alpha passes through untouched.
//!
//! ## Key Items
//!
//! - [`ToneParameters`]: the (brightness, contrast, gamma) triple
//! - [`adjust`]: apply the curve to a whole image
//! - [`adjust_masked`]: apply the curve and blend by a region mask
//! - [`tone_value`]: the continuous forward model used for fitting

use imgref::ImgVec;
use rgb::{RGB8, RGBA8};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::image::{composite, ImageData, Mask};

/// Tone curve parameters.
///
/// Defaults to the identity transform `(0.0, 1.0, 1.0)`. The fitting bounds
/// are brightness ∈ [-50, 50], contrast ∈ [0.5, 2.0], gamma ∈ [0.5, 2.5];
/// application itself tolerates out-of-range values because intermediate
/// normalized values are clipped to [0, 1] before the power step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ToneParameters {
    /// Additive offset applied before normalization.
    pub brightness: f64,
    /// Multiplicative gain applied before normalization.
    pub contrast: f64,
    /// Exponent applied to the normalized value. Must be positive.
    pub gamma: f64,
}

impl Default for ToneParameters {
    fn default() -> Self {
        Self::identity()
    }
}

impl ToneParameters {
    /// Create parameters from explicit components.
    #[must_use]
    pub fn new(brightness: f64, contrast: f64, gamma: f64) -> Self {
        Self {
            brightness,
            contrast,
            gamma,
        }
    }

    /// The identity transform `(0, 1, 1)`.
    #[must_use]
    pub fn identity() -> Self {
        Self {
            brightness: 0.0,
            contrast: 1.0,
            gamma: 1.0,
        }
    }

    /// Components in fitting order: brightness, contrast, gamma.
    #[must_use]
    pub fn to_array(self) -> [f64; 3] {
        [self.brightness, self.contrast, self.gamma]
    }

    /// Build from components in fitting order: brightness, contrast, gamma.
    #[must_use]
    pub fn from_array(values: [f64; 3]) -> Self {
        Self {
            brightness: values[0],
            contrast: values[1],
            gamma: values[2],
        }
    }
}

/// The continuous tone curve for a single channel value.
///
/// Input and output are in the 0-255 range; the output is not quantized.
///
/// # Example
///
/// ```
/// use autotone::tone::{tone_value, ToneParameters};
///
/// let identity = ToneParameters::identity();
/// assert!((tone_value(128.0, &identity) - 128.0).abs() < 1e-12);
/// ```
#[must_use]
pub fn tone_value(x: f64, params: &ToneParameters) -> f64 {
    let normalized = ((x * params.contrast + params.brightness) / 255.0).clamp(0.0, 1.0);
    normalized.powf(params.gamma) * 255.0
}

/// Per-channel lookup table for 8-bit application.
fn tone_lut(params: &ToneParameters) -> [u8; 256] {
    let mut lut = [0u8; 256];
    for (x, entry) in lut.iter_mut().enumerate() {
        *entry = tone_value(x as f64, params).round().clamp(0.0, 255.0) as u8;
    }
    lut
}

/// Apply the tone curve to every RGB channel of an image.
///
/// Output has the same dimensions and channel layout as the input; the alpha
/// channel, if present, is preserved unchanged.
#[must_use]
pub fn adjust(image: &ImageData, params: &ToneParameters) -> ImageData {
    let lut = tone_lut(params);
    match image {
        ImageData::Rgb8(img) => {
            let pixels = img
                .pixels()
                .map(|p| RGB8::new(lut[p.r as usize], lut[p.g as usize], lut[p.b as usize]))
                .collect();
            ImageData::Rgb8(ImgVec::new(pixels, img.width(), img.height()))
        }
        ImageData::Rgba8(img) => {
            let pixels = img
                .pixels()
                .map(|p| {
                    RGBA8::new(
                        lut[p.r as usize],
                        lut[p.g as usize],
                        lut[p.b as usize],
                        p.a,
                    )
                })
                .collect();
            ImageData::Rgba8(ImgVec::new(pixels, img.width(), img.height()))
        }
    }
}

/// Apply the tone curve and blend the result with the input by a mask.
///
/// Where the mask is 255 the adjusted pixel wins, where it is 0 the original
/// pixel is kept. Used for region-specific grading with product/background
/// masks derived from the alpha channel.
pub fn adjust_masked(
    image: &ImageData,
    params: &ToneParameters,
    mask: &Mask,
) -> Result<ImageData> {
    let adjusted = adjust(image, params);
    composite(&adjusted, image, mask)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_rgb(w: usize, h: usize) -> ImageData {
        let pixels = (0..w * h)
            .map(|i| {
                let v = (i % 256) as u8;
                RGB8::new(v, v.wrapping_add(3), v.wrapping_add(7))
            })
            .collect();
        ImageData::Rgb8(ImgVec::new(pixels, w, h))
    }

    #[test]
    fn test_identity_preserves_image() {
        let img = gradient_rgb(64, 64);
        let out = adjust(&img, &ToneParameters::identity());
        assert_eq!(img.to_rgb8_vec(), out.to_rgb8_vec());
    }

    #[test]
    fn test_brightness_shift() {
        let params = ToneParameters::new(20.0, 1.0, 1.0);
        assert!((tone_value(100.0, &params) - 120.0).abs() < 1e-9);
    }

    #[test]
    fn test_contrast_gain() {
        let params = ToneParameters::new(0.0, 1.5, 1.0);
        assert!((tone_value(100.0, &params) - 150.0).abs() < 1e-9);
    }

    #[test]
    fn test_gamma_darkens_midtones() {
        let params = ToneParameters::new(0.0, 1.0, 2.0);
        let expected = (128.0f64 / 255.0).powi(2) * 255.0;
        assert!((tone_value(128.0, &params) - expected).abs() < 1e-9);
        assert!(tone_value(128.0, &params) < 128.0);
    }

    #[test]
    fn test_overflow_clips_before_gamma() {
        let params = ToneParameters::new(100.0, 1.0, 1.0);
        assert!((tone_value(200.0, &params) - 255.0).abs() < 1e-9);

        let params = ToneParameters::new(-100.0, 1.0, 0.5);
        assert!((tone_value(50.0, &params)).abs() < 1e-9);
    }

    #[test]
    fn test_brightness_monotonic() {
        let img = gradient_rgb(16, 16);
        let low = adjust(&img, &ToneParameters::new(5.0, 1.0, 1.0));
        let high = adjust(&img, &ToneParameters::new(15.0, 1.0, 1.0));
        for (a, b) in low.to_rgb8_vec().iter().zip(high.to_rgb8_vec().iter()) {
            assert!(b >= a);
        }
    }

    #[test]
    fn test_output_in_range_at_bound_extremes() {
        // Corners of the fitting box all produce in-range 8-bit output
        let corners = [
            ToneParameters::new(-50.0, 0.5, 0.5),
            ToneParameters::new(-50.0, 2.0, 2.5),
            ToneParameters::new(50.0, 0.5, 2.5),
            ToneParameters::new(50.0, 2.0, 0.5),
        ];
        for params in &corners {
            for x in 0..=255u32 {
                let y = tone_value(x as f64, params);
                assert!((0.0..=255.0).contains(&y));
            }
        }
    }

    #[test]
    fn test_alpha_passthrough() {
        let pixels = vec![RGBA8::new(100, 100, 100, 42); 9];
        let img = ImageData::Rgba8(ImgVec::new(pixels, 3, 3));
        let out = adjust(&img, &ToneParameters::new(30.0, 1.2, 0.8));
        match out {
            ImageData::Rgba8(out) => assert!(out.pixels().all(|p| p.a == 42)),
            ImageData::Rgb8(_) => panic!("layout changed"),
        }
    }

    #[test]
    fn test_adjust_masked_blend() {
        let pixels = vec![RGB8::new(100, 100, 100); 4];
        let img = ImageData::Rgb8(ImgVec::new(pixels, 2, 2));
        let params = ToneParameters::new(50.0, 1.0, 1.0);

        let mask = ImgVec::new(vec![255, 255, 0, 0], 2, 2);
        let out = adjust_masked(&img, &params, &mask).unwrap();
        let raw = out.to_rgb8_vec();
        assert_eq!(raw[0], 150);
        assert_eq!(raw[9], 100);
    }

    #[test]
    fn test_round_trip_serde() {
        let params = ToneParameters::new(10.0, 1.2, 0.9);
        let json = serde_json::to_string(&params).unwrap();
        assert!(json.contains("\"brightness\""));
        let back: ToneParameters = serde_json::from_str(&json).unwrap();
        assert_eq!(params, back);
    }
}
