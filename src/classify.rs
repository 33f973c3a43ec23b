//! Product view and background classification.
//!
//! This module defines the classification seam used when preparing training
//! data:
//!
//! - [`ViewKind`]: the seven shot types of a product listing
//! - [`ViewClassifier`]: trait implemented by classification backends
//! - [`PixelBackgroundClassifier`]: white-background detection from pixel
//!   statistics, no model required

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::image::ImageData;

/// Shot type of a product photo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewKind {
    /// Full front view.
    Front,
    /// Full back view.
    Back,
    /// Sleeve close-up.
    Sleeve,
    /// Hem close-up.
    Hem,
    /// Brand, care, or size tag.
    Tag,
    /// Detail close-up other than sleeve, hem, or tag.
    Zoom,
    /// Anything else.
    Other,
}

impl ViewKind {
    /// Get all view variants.
    #[must_use]
    pub fn all() -> &'static [Self] {
        &[
            Self::Front,
            Self::Back,
            Self::Sleeve,
            Self::Hem,
            Self::Tag,
            Self::Zoom,
            Self::Other,
        ]
    }

    /// Whether this view enters the tone training set.
    #[must_use]
    pub fn is_trainable(self) -> bool {
        matches!(self, Self::Front | Self::Back)
    }
}

impl std::fmt::Display for ViewKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Front => "front",
            Self::Back => "back",
            Self::Sleeve => "sleeve",
            Self::Hem => "hem",
            Self::Tag => "tag",
            Self::Zoom => "zoom",
            Self::Other => "other",
        };
        write!(f, "{name}")
    }
}

impl std::str::FromStr for ViewKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "front" => Ok(Self::Front),
            "back" => Ok(Self::Back),
            "sleeve" => Ok(Self::Sleeve),
            "hem" => Ok(Self::Hem),
            "tag" => Ok(Self::Tag),
            "zoom" => Ok(Self::Zoom),
            "other" => Ok(Self::Other),
            _ => Err(format!("Unknown view: {s}")),
        }
    }
}

/// Result of classifying a product photo's view.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewClassification {
    /// The classified view.
    pub kind: ViewKind,

    /// Backend confidence in [0, 1].
    pub confidence: f64,
}

impl ViewClassification {
    /// Create a classification with full confidence.
    #[must_use]
    pub fn new(kind: ViewKind) -> Self {
        Self {
            kind,
            confidence: 1.0,
        }
    }
}

/// Classifies a product photo into one of the seven [`ViewKind`]s.
///
/// Backends range from vision models to fixed stubs in tests; the pipeline
/// only depends on this trait.
pub trait ViewClassifier {
    /// Classify one image.
    fn classify(&self, image: &ImageData) -> Result<ViewClassification>;
}

/// Background color family of a product photo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackgroundKind {
    /// Clean white or near-white backdrop.
    White,
    /// Anything else, including undetermined.
    NonWhite,
}

impl std::fmt::Display for BackgroundKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::White => write!(f, "white"),
            Self::NonWhite => write!(f, "non_white"),
        }
    }
}

/// Result of background classification.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BackgroundClassification {
    /// The background family.
    pub kind: BackgroundKind,

    /// Fraction of background pixels that were white, in [0, 1].
    pub confidence: f64,
}

/// White-background detection from HSV pixel statistics.
///
/// Pixels darker than `foreground_brightness_threshold` are assumed to be
/// the product and excluded; the remaining pixels count as white when their
/// value is high and saturation low. The image is white-backed when the
/// white fraction reaches `white_ratio_threshold`.
#[derive(Debug, Clone)]
pub struct PixelBackgroundClassifier {
    /// Minimum HSV value for a pixel to count as white.
    pub min_brightness: f64,

    /// Maximum HSV saturation for a pixel to count as white.
    pub max_saturation: f64,

    /// White-pixel fraction above which the background is white.
    pub white_ratio_threshold: f64,

    /// HSV value below which a pixel is treated as product, not background.
    pub foreground_brightness_threshold: f64,
}

impl Default for PixelBackgroundClassifier {
    fn default() -> Self {
        Self {
            min_brightness: 0.9,
            max_saturation: 0.1,
            white_ratio_threshold: 0.8,
            foreground_brightness_threshold: 0.2,
        }
    }
}

impl PixelBackgroundClassifier {
    /// Create a classifier with the default thresholds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify the background of one image.
    ///
    /// Alpha is ignored; RGBA images are evaluated on their raw color
    /// channels.
    #[must_use]
    pub fn classify(&self, image: &ImageData) -> BackgroundClassification {
        let rgb = image.to_rgb8_vec();

        let mut included = 0usize;
        let mut white = 0usize;
        for px in rgb.chunks_exact(3) {
            let r = f64::from(px[0]) / 255.0;
            let g = f64::from(px[1]) / 255.0;
            let b = f64::from(px[2]) / 255.0;

            let value = r.max(g).max(b);
            if value < self.foreground_brightness_threshold {
                continue;
            }
            included += 1;

            let min = r.min(g).min(b);
            let saturation = if value > 0.0 { (value - min) / value } else { 0.0 };
            if value >= self.min_brightness && saturation <= self.max_saturation {
                white += 1;
            }
        }

        if included == 0 {
            return BackgroundClassification {
                kind: BackgroundKind::NonWhite,
                confidence: 0.0,
            };
        }

        let white_ratio = white as f64 / included as f64;
        let kind = if white_ratio >= self.white_ratio_threshold {
            BackgroundKind::White
        } else {
            BackgroundKind::NonWhite
        };
        BackgroundClassification {
            kind,
            confidence: white_ratio,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use imgref::ImgVec;
    use rgb::RGB8;

    fn image_with_product(bg: RGB8, product: RGB8) -> ImageData {
        // 10x10 backdrop with a 3x3 product patch
        let mut pixels = vec![bg; 100];
        for y in 4..7 {
            for x in 4..7 {
                pixels[y * 10 + x] = product;
            }
        }
        ImageData::Rgb8(ImgVec::new(pixels, 10, 10))
    }

    #[test]
    fn test_view_kind_round_trip() {
        for kind in ViewKind::all() {
            let parsed: ViewKind = kind.to_string().parse().unwrap();
            assert_eq!(*kind, parsed);
        }
        assert!("sideways".parse::<ViewKind>().is_err());
    }

    #[test]
    fn test_view_kind_serde_lowercase() {
        assert_eq!(serde_json::to_string(&ViewKind::Front).unwrap(), "\"front\"");
        let kind: ViewKind = serde_json::from_str("\"zoom\"").unwrap();
        assert_eq!(kind, ViewKind::Zoom);
    }

    #[test]
    fn test_trainable_views() {
        assert!(ViewKind::Front.is_trainable());
        assert!(ViewKind::Back.is_trainable());
        assert!(!ViewKind::Tag.is_trainable());
    }

    #[test]
    fn test_white_background_with_dark_product() {
        // Product pixels fall under the foreground threshold and are ignored
        let image = image_with_product(RGB8::new(255, 255, 255), RGB8::new(30, 30, 30));
        let result = PixelBackgroundClassifier::new().classify(&image);

        assert_eq!(result.kind, BackgroundKind::White);
        assert!((result.confidence - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_gray_background_is_not_white() {
        let image = image_with_product(RGB8::new(200, 200, 200), RGB8::new(30, 30, 30));
        let result = PixelBackgroundClassifier::new().classify(&image);

        assert_eq!(result.kind, BackgroundKind::NonWhite);
        assert!(result.confidence < 1e-12);
    }

    #[test]
    fn test_saturated_background_is_not_white() {
        // Bright but saturated blue: value passes, saturation fails
        let image = image_with_product(RGB8::new(50, 50, 255), RGB8::new(30, 30, 30));
        let result = PixelBackgroundClassifier::new().classify(&image);
        assert_eq!(result.kind, BackgroundKind::NonWhite);
    }

    #[test]
    fn test_brightness_boundary() {
        // 230/255 is just above the 0.9 cutoff, 229/255 just below
        let bright = image_with_product(RGB8::new(230, 230, 230), RGB8::new(30, 30, 30));
        let dim = image_with_product(RGB8::new(229, 229, 229), RGB8::new(30, 30, 30));

        let classifier = PixelBackgroundClassifier::new();
        assert_eq!(classifier.classify(&bright).kind, BackgroundKind::White);
        assert_eq!(classifier.classify(&dim).kind, BackgroundKind::NonWhite);
    }

    #[test]
    fn test_all_dark_image_is_undetermined() {
        let image = ImageData::Rgb8(ImgVec::new(vec![RGB8::new(10, 10, 10); 25], 5, 5));
        let result = PixelBackgroundClassifier::new().classify(&image);

        assert_eq!(result.kind, BackgroundKind::NonWhite);
        assert!(result.confidence.abs() < 1e-12);
    }
}
