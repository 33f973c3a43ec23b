//! Image containers and pixel I/O.
//!
//! This module provides [`ImageData`], the pixel representation used across
//! the library. Images are held as `imgref` buffers of `rgb` pixel types;
//! decoding, encoding, and Lanczos resampling go through the `image` crate.

use std::path::Path;

use imgref::ImgVec;
use rgb::{RGB8, RGBA8};

use crate::error::{Error, Result};

/// Grayscale mask; 255 selects the subject, 0 the background.
pub type Mask = ImgVec<u8>;

/// Supported image extensions.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "bmp"];

/// Image pixel data, with or without an alpha channel.
#[derive(Debug, Clone)]
pub enum ImageData {
    /// RGB8 image using imgref.
    Rgb8(ImgVec<RGB8>),

    /// RGBA8 image using imgref.
    Rgba8(ImgVec<RGBA8>),
}

impl ImageData {
    /// Load an image from disk.
    ///
    /// Formats with an alpha channel decode to [`ImageData::Rgba8`]; everything
    /// else decodes to [`ImageData::Rgb8`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let img = image::open(path).map_err(|e| Error::ImageLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        if img.color().has_alpha() {
            let rgba = img.to_rgba8();
            let (w, h) = rgba.dimensions();
            let pixels = rgba
                .pixels()
                .map(|p| RGBA8::new(p[0], p[1], p[2], p[3]))
                .collect();
            Ok(Self::Rgba8(ImgVec::new(pixels, w as usize, h as usize)))
        } else {
            let rgb = img.to_rgb8();
            let (w, h) = rgb.dimensions();
            let pixels = rgb.pixels().map(|p| RGB8::new(p[0], p[1], p[2])).collect();
            Ok(Self::Rgb8(ImgVec::new(pixels, w as usize, h as usize)))
        }
    }

    /// Save the image to disk, inferring the format from the extension.
    ///
    /// JPEG output has no alpha channel; RGBA images are written with the
    /// alpha channel dropped.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let jpeg = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some(ext) if ext.eq_ignore_ascii_case("jpg") || ext.eq_ignore_ascii_case("jpeg")
        );

        let result = match self {
            Self::Rgb8(img) => image::save_buffer(
                path,
                &rgb_raw(img),
                img.width() as u32,
                img.height() as u32,
                image::ExtendedColorType::Rgb8,
            ),
            Self::Rgba8(img) if jpeg => {
                let raw: Vec<u8> = img.pixels().flat_map(|p| [p.r, p.g, p.b]).collect();
                image::save_buffer(
                    path,
                    &raw,
                    img.width() as u32,
                    img.height() as u32,
                    image::ExtendedColorType::Rgb8,
                )
            }
            Self::Rgba8(img) => {
                let raw: Vec<u8> = img.pixels().flat_map(|p| [p.r, p.g, p.b, p.a]).collect();
                image::save_buffer(
                    path,
                    &raw,
                    img.width() as u32,
                    img.height() as u32,
                    image::ExtendedColorType::Rgba8,
                )
            }
        };

        result.map_err(|e| Error::ImageSave {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Get image width.
    #[must_use]
    pub fn width(&self) -> usize {
        match self {
            Self::Rgb8(img) => img.width(),
            Self::Rgba8(img) => img.width(),
        }
    }

    /// Get image height.
    #[must_use]
    pub fn height(&self) -> usize {
        match self {
            Self::Rgb8(img) => img.height(),
            Self::Rgba8(img) => img.height(),
        }
    }

    /// Whether the image carries an alpha channel.
    #[must_use]
    pub fn has_alpha(&self) -> bool {
        matches!(self, Self::Rgba8(_))
    }

    /// Flatten to interleaved RGB bytes, dropping alpha if present.
    #[must_use]
    pub fn to_rgb8_vec(&self) -> Vec<u8> {
        match self {
            Self::Rgb8(img) => rgb_raw(img),
            Self::Rgba8(img) => img.pixels().flat_map(|p| [p.r, p.g, p.b]).collect(),
        }
    }

    /// Convert to an RGBA buffer. RGB images get a fully opaque alpha channel.
    #[must_use]
    pub fn to_rgba8(&self) -> ImgVec<RGBA8> {
        match self {
            Self::Rgb8(img) => {
                let pixels = img
                    .pixels()
                    .map(|p| RGBA8::new(p.r, p.g, p.b, 255))
                    .collect();
                ImgVec::new(pixels, img.width(), img.height())
            }
            Self::Rgba8(img) => {
                ImgVec::new(img.pixels().collect(), img.width(), img.height())
            }
        }
    }

    /// Resample to the given dimensions with a Lanczos3 filter.
    #[must_use]
    pub fn resize(&self, width: usize, height: usize) -> Self {
        match self {
            Self::Rgb8(img) => {
                let stride = img.stride();
                let buf = img.buf();
                let src = image::RgbImage::from_fn(
                    img.width() as u32,
                    img.height() as u32,
                    |x, y| {
                        let p = buf[y as usize * stride + x as usize];
                        image::Rgb([p.r, p.g, p.b])
                    },
                );
                let out = image::imageops::resize(
                    &src,
                    width as u32,
                    height as u32,
                    image::imageops::FilterType::Lanczos3,
                );
                let pixels = out.pixels().map(|p| RGB8::new(p[0], p[1], p[2])).collect();
                Self::Rgb8(ImgVec::new(pixels, width, height))
            }
            Self::Rgba8(img) => {
                let stride = img.stride();
                let buf = img.buf();
                let src = image::RgbaImage::from_fn(
                    img.width() as u32,
                    img.height() as u32,
                    |x, y| {
                        let p = buf[y as usize * stride + x as usize];
                        image::Rgba([p.r, p.g, p.b, p.a])
                    },
                );
                let out = image::imageops::resize(
                    &src,
                    width as u32,
                    height as u32,
                    image::imageops::FilterType::Lanczos3,
                );
                let pixels = out
                    .pixels()
                    .map(|p| RGBA8::new(p[0], p[1], p[2], p[3]))
                    .collect();
                Self::Rgba8(ImgVec::new(pixels, width, height))
            }
        }
    }
}

/// Blend `over` onto `under` weighted by a grayscale mask.
///
/// Where the mask is 255 the output takes `over`, where it is 0 the output
/// takes `under`, with linear interpolation between. All three inputs must
/// share dimensions. The output is RGBA if either input carries alpha.
pub fn composite(over: &ImageData, under: &ImageData, mask: &Mask) -> Result<ImageData> {
    ensure_same_size(over, under)?;
    if mask.width() != over.width() || mask.height() != over.height() {
        return Err(Error::DimensionMismatch {
            expected: (over.width(), over.height()),
            actual: (mask.width(), mask.height()),
        });
    }

    if let (ImageData::Rgb8(a), ImageData::Rgb8(b)) = (over, under) {
        let pixels = a
            .pixels()
            .zip(b.pixels())
            .zip(mask.pixels())
            .map(|((p, q), m)| {
                RGB8::new(
                    lerp_u8(p.r, q.r, m),
                    lerp_u8(p.g, q.g, m),
                    lerp_u8(p.b, q.b, m),
                )
            })
            .collect();
        return Ok(ImageData::Rgb8(ImgVec::new(
            pixels,
            over.width(),
            over.height(),
        )));
    }

    let a = over.to_rgba8();
    let b = under.to_rgba8();
    let pixels = a
        .pixels()
        .zip(b.pixels())
        .zip(mask.pixels())
        .map(|((p, q), m)| {
            RGBA8::new(
                lerp_u8(p.r, q.r, m),
                lerp_u8(p.g, q.g, m),
                lerp_u8(p.b, q.b, m),
                lerp_u8(p.a, q.a, m),
            )
        })
        .collect();
    Ok(ImageData::Rgba8(ImgVec::new(
        pixels,
        over.width(),
        over.height(),
    )))
}

/// Check that two images share dimensions.
pub(crate) fn ensure_same_size(a: &ImageData, b: &ImageData) -> Result<()> {
    if a.width() != b.width() || a.height() != b.height() {
        return Err(Error::DimensionMismatch {
            expected: (a.width(), a.height()),
            actual: (b.width(), b.height()),
        });
    }
    Ok(())
}

fn rgb_raw(img: &ImgVec<RGB8>) -> Vec<u8> {
    img.pixels().flat_map(|p| [p.r, p.g, p.b]).collect()
}

fn lerp_u8(over: u8, under: u8, mask: u8) -> u8 {
    let m = mask as f64 / 255.0;
    (over as f64 * m + under as f64 * (1.0 - m)).round() as u8
}
