//! Subject framing and background operations.
//!
//! Operations on cutout product images whose subject is delimited by the
//! alpha channel:
//!
//! - [`product_mask`] / [`background_mask`]: region masks from alpha
//! - [`center_subject`]: scale and center the subject on a margined canvas
//! - [`refine_edges`]: shrink and feather the alpha edge to cut fringing
//! - [`add_floor_shadow`]: composite a soft drop shadow over white
//! - [`flatten_onto_white`]: final white-background flattening

use imgref::ImgVec;
use rgb::{RGB8, RGBA8};

use crate::image::{ImageData, Mask};

/// Canvas size used for centering when no explicit size is given.
pub const DEFAULT_CANVAS: (usize, usize) = (1200, 1200);

/// Margin kept on every canvas side when centering, as a fraction of the
/// canvas dimension.
pub const DEFAULT_MARGIN_RATIO: f64 = 0.05;

/// Alpha erosion passes applied by edge refinement. One pass shrinks the
/// silhouette by about one pixel.
pub const DEFAULT_ERODE_ITERATIONS: usize = 2;

/// Feather blur radius in pixels applied after erosion.
pub const DEFAULT_FEATHER_RADIUS: f64 = 0.8;

/// Mask selecting the subject, taken from the alpha channel.
///
/// Images without alpha are treated as all subject.
#[must_use]
pub fn product_mask(image: &ImageData) -> Mask {
    match image {
        ImageData::Rgb8(img) => ImgVec::new(
            vec![255u8; img.width() * img.height()],
            img.width(),
            img.height(),
        ),
        ImageData::Rgba8(img) => ImgVec::new(
            img.pixels().map(|p| p.a).collect(),
            img.width(),
            img.height(),
        ),
    }
}

/// Complement of [`product_mask`], selecting the background.
#[must_use]
pub fn background_mask(image: &ImageData) -> Mask {
    let mut mask = product_mask(image);
    for v in mask.buf_mut() {
        *v = 255 - *v;
    }
    mask
}

/// Half-open bounding box `(left, top, right, bottom)` of pixels with
/// nonzero alpha. `None` when the image is fully transparent; images
/// without alpha span the whole frame.
#[must_use]
pub fn content_bbox(image: &ImageData) -> Option<(usize, usize, usize, usize)> {
    let ImageData::Rgba8(img) = image else {
        return Some((0, 0, image.width(), image.height()));
    };

    let mut min_x = usize::MAX;
    let mut min_y = usize::MAX;
    let mut max_x = 0;
    let mut max_y = 0;
    let mut found = false;
    for (y, row) in img.rows().enumerate() {
        for (x, p) in row.iter().enumerate() {
            if p.a > 0 {
                found = true;
                min_x = min_x.min(x);
                max_x = max_x.max(x);
                min_y = min_y.min(y);
                max_y = max_y.max(y);
            }
        }
    }

    if found {
        Some((min_x, min_y, max_x + 1, max_y + 1))
    } else {
        None
    }
}

/// Scale the subject to fit the canvas minus margins and center it.
///
/// The subject is cropped to its alpha bounding box, scaled uniformly
/// (Lanczos3) so it fits the margined area, and placed centered on a
/// transparent canvas. A fully transparent input yields a blank canvas.
#[must_use]
pub fn center_subject(
    image: &ImageData,
    canvas_size: (usize, usize),
    margin_ratio: f64,
) -> ImageData {
    let (canvas_w, canvas_h) = canvas_size;

    let Some((left, top, right, bottom)) = content_bbox(image) else {
        return blank_canvas(canvas_w, canvas_h);
    };
    let content_w = right - left;
    let content_h = bottom - top;

    let rgba = image.to_rgba8();
    let view = rgba.as_ref().sub_image(left, top, content_w, content_h);
    let content = ImageData::Rgba8(ImgVec::new(view.pixels().collect(), content_w, content_h));

    let avail_w = (canvas_w as f64 * (1.0 - margin_ratio * 2.0)) as usize;
    let avail_h = (canvas_h as f64 * (1.0 - margin_ratio * 2.0)) as usize;
    let scale = (avail_w as f64 / content_w as f64).min(avail_h as f64 / content_h as f64);
    let new_w = ((content_w as f64 * scale) as usize).max(1);
    let new_h = ((content_h as f64 * scale) as usize).max(1);

    let scaled = content.resize(new_w, new_h).to_rgba8();

    let mut canvas = ImgVec::new(
        vec![RGBA8::new(255, 255, 255, 0); canvas_w * canvas_h],
        canvas_w,
        canvas_h,
    );
    let offset_x = (canvas_w - new_w) / 2;
    let offset_y = (canvas_h - new_h) / 2;
    paste(&mut canvas, &scaled, offset_x, offset_y);

    ImageData::Rgba8(canvas)
}

/// Shrink the alpha edge and feather it.
///
/// Each erosion pass takes a 3x3 minimum over the alpha plane, pulling the
/// silhouette in by about one pixel to cut background fringing; a small
/// Gaussian feather then smooths the hard edge. Color channels are kept.
#[must_use]
pub fn refine_edges(image: &ImageData, erode_iterations: usize, feather_radius: f64) -> ImageData {
    let rgba = image.to_rgba8();
    let (w, h) = (rgba.width(), rgba.height());

    let mut alpha: Vec<u8> = rgba.pixels().map(|p| p.a).collect();
    for _ in 0..erode_iterations {
        alpha = erode_min3(&alpha, w, h);
    }
    if feather_radius > 0.0 {
        alpha = blur_plane(&alpha, w, h, feather_radius);
    }

    let pixels = rgba
        .pixels()
        .zip(&alpha)
        .map(|(p, &a)| RGBA8::new(p.r, p.g, p.b, a))
        .collect();
    ImageData::Rgba8(ImgVec::new(pixels, w, h))
}

/// Options for [`add_floor_shadow`].
#[derive(Debug, Clone)]
pub struct ShadowOptions {
    /// Vertical shadow offset as a fraction of image height.
    pub offset_ratio: f64,

    /// Gaussian blur radius as a fraction of image height.
    pub blur_ratio: f64,

    /// Shadow opacity, 0-255.
    pub opacity: u8,

    /// Shadow color.
    pub shadow_color: RGB8,

    /// Backdrop color behind shadow and subject.
    pub background: RGB8,
}

impl Default for ShadowOptions {
    fn default() -> Self {
        Self {
            offset_ratio: 0.03,
            blur_ratio: 0.03,
            opacity: 100,
            shadow_color: RGB8::new(0, 0, 0),
            background: RGB8::new(255, 255, 255),
        }
    }
}

/// Composite a soft floor shadow under the subject over a solid backdrop.
///
/// The subject silhouette is tinted with the shadow color, shifted down,
/// blurred, and layered between the backdrop and the subject. The result is
/// fully opaque.
#[must_use]
pub fn add_floor_shadow(image: &ImageData, options: &ShadowOptions) -> ImageData {
    let rgba = image.to_rgba8();
    let (w, h) = (rgba.width(), rgba.height());

    let offset_y = (h as f64 * options.offset_ratio) as usize;
    let blur_radius = (h as f64 * options.blur_ratio) as usize;

    // Silhouette tinted with the shadow color, shifted down by the offset
    let mut shadow = vec![RGBA8::new(0, 0, 0, 0); w * h];
    for (y, row) in rgba.rows().enumerate() {
        let dest_y = y + offset_y;
        if dest_y >= h {
            break;
        }
        for (x, p) in row.iter().enumerate() {
            shadow[dest_y * w + x] = RGBA8::new(
                scale_u8(options.shadow_color.r, p.a),
                scale_u8(options.shadow_color.g, p.a),
                scale_u8(options.shadow_color.b, p.a),
                scale_u8(options.opacity, p.a),
            );
        }
    }
    let shadow = if blur_radius > 0 {
        blur_rgba(&ImgVec::new(shadow, w, h), blur_radius as f64)
    } else {
        ImgVec::new(shadow, w, h)
    };

    let bg = options.background;
    let pixels = shadow
        .pixels()
        .zip(rgba.pixels())
        .map(|(s, p)| {
            let backdrop = RGBA8::new(bg.r, bg.g, bg.b, 255);
            alpha_over(alpha_over(backdrop, s), p)
        })
        .collect();
    ImageData::Rgba8(ImgVec::new(pixels, w, h))
}

/// Composite the image over an opaque white background, dropping alpha.
#[must_use]
pub fn flatten_onto_white(image: &ImageData) -> ImageData {
    match image {
        ImageData::Rgb8(_) => image.clone(),
        ImageData::Rgba8(img) => {
            let pixels = img
                .pixels()
                .map(|p| {
                    let a = f64::from(p.a) / 255.0;
                    let blend = |v: u8| (f64::from(v) * a + 255.0 * (1.0 - a)).round() as u8;
                    RGB8::new(blend(p.r), blend(p.g), blend(p.b))
                })
                .collect();
            ImageData::Rgb8(ImgVec::new(pixels, img.width(), img.height()))
        }
    }
}

fn blank_canvas(width: usize, height: usize) -> ImageData {
    ImageData::Rgba8(ImgVec::new(
        vec![RGBA8::new(255, 255, 255, 0); width * height],
        width,
        height,
    ))
}

fn paste(canvas: &mut ImgVec<RGBA8>, src: &ImgVec<RGBA8>, offset_x: usize, offset_y: usize) {
    let stride = canvas.stride();
    let buf = canvas.buf_mut();
    for (y, row) in src.rows().enumerate() {
        let start = (offset_y + y) * stride + offset_x;
        buf[start..start + row.len()].copy_from_slice(row);
    }
}

/// 3x3 minimum filter with edge replication.
fn erode_min3(alpha: &[u8], width: usize, height: usize) -> Vec<u8> {
    let mut out = vec![0u8; width * height];
    for y in 0..height {
        for x in 0..width {
            let mut m = 255u8;
            for ny in y.saturating_sub(1)..=(y + 1).min(height - 1) {
                for nx in x.saturating_sub(1)..=(x + 1).min(width - 1) {
                    m = m.min(alpha[ny * width + nx]);
                }
            }
            out[y * width + x] = m;
        }
    }
    out
}

fn blur_plane(plane: &[u8], width: usize, height: usize, sigma: f64) -> Vec<u8> {
    let src = image::GrayImage::from_fn(width as u32, height as u32, |x, y| {
        image::Luma([plane[y as usize * width + x as usize]])
    });
    image::imageops::blur(&src, sigma as f32).into_raw()
}

fn blur_rgba(img: &ImgVec<RGBA8>, sigma: f64) -> ImgVec<RGBA8> {
    let (w, h) = (img.width(), img.height());
    let stride = img.stride();
    let buf = img.buf();
    let src = image::RgbaImage::from_fn(w as u32, h as u32, |x, y| {
        let p = buf[y as usize * stride + x as usize];
        image::Rgba([p.r, p.g, p.b, p.a])
    });
    let out = image::imageops::blur(&src, sigma as f32);
    ImgVec::new(
        out.pixels()
            .map(|p| RGBA8::new(p[0], p[1], p[2], p[3]))
            .collect(),
        w,
        h,
    )
}

/// Porter-Duff "over" in straight (non-premultiplied) alpha.
fn alpha_over(under: RGBA8, over: RGBA8) -> RGBA8 {
    let oa = f64::from(over.a) / 255.0;
    let ua = f64::from(under.a) / 255.0;
    let out_a = oa + ua * (1.0 - oa);
    if out_a <= 0.0 {
        return RGBA8::new(0, 0, 0, 0);
    }
    let blend =
        |o: u8, u: u8| ((f64::from(o) * oa + f64::from(u) * ua * (1.0 - oa)) / out_a).round() as u8;
    RGBA8::new(
        blend(over.r, under.r),
        blend(over.g, under.g),
        blend(over.b, under.b),
        (out_a * 255.0).round() as u8,
    )
}

fn scale_u8(value: u8, alpha: u8) -> u8 {
    ((u16::from(value) * u16::from(alpha) + 127) / 255) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Transparent canvas with an opaque colored rectangle.
    fn cutout(
        w: usize,
        h: usize,
        rect: (usize, usize, usize, usize),
        color: RGBA8,
    ) -> ImageData {
        let (left, top, right, bottom) = rect;
        let mut pixels = vec![RGBA8::new(0, 0, 0, 0); w * h];
        for y in top..bottom {
            for x in left..right {
                pixels[y * w + x] = color;
            }
        }
        ImageData::Rgba8(ImgVec::new(pixels, w, h))
    }

    fn pixel(image: &ImageData, x: usize, y: usize) -> RGBA8 {
        match image {
            ImageData::Rgba8(img) => img.buf()[y * img.stride() + x],
            ImageData::Rgb8(img) => {
                let p = img.buf()[y * img.stride() + x];
                RGBA8::new(p.r, p.g, p.b, 255)
            }
        }
    }

    #[test]
    fn test_masks_complement() {
        let image = cutout(4, 4, (1, 1, 3, 3), RGBA8::new(10, 20, 30, 200));
        let product = product_mask(&image);
        let background = background_mask(&image);

        assert_eq!(product.buf()[0], 0);
        assert_eq!(background.buf()[0], 255);
        assert_eq!(product.buf()[5], 200);
        assert_eq!(background.buf()[5], 55);
    }

    #[test]
    fn test_mask_of_rgb_image_is_all_subject() {
        let image = ImageData::Rgb8(ImgVec::new(vec![RGB8::new(9, 9, 9); 6], 3, 2));
        assert!(product_mask(&image).buf().iter().all(|&v| v == 255));
    }

    #[test]
    fn test_content_bbox() {
        let image = cutout(10, 10, (2, 3, 5, 7), RGBA8::new(1, 2, 3, 255));
        assert_eq!(content_bbox(&image), Some((2, 3, 5, 7)));

        let empty = cutout(10, 10, (0, 0, 0, 0), RGBA8::new(0, 0, 0, 0));
        assert_eq!(content_bbox(&empty), None);
    }

    #[test]
    fn test_center_subject_scales_and_centers() {
        let image = cutout(10, 10, (4, 4, 6, 6), RGBA8::new(50, 60, 70, 255));
        let centered = center_subject(&image, (100, 100), 0.05);

        assert_eq!(centered.width(), 100);
        assert_eq!(centered.height(), 100);
        // 2x2 content scaled into a 90x90 area leaves a 5 pixel border
        assert!(pixel(&centered, 50, 50).a >= 250);
        assert_eq!(pixel(&centered, 2, 2).a, 0);
        assert_eq!(pixel(&centered, 50, 2).a, 0);
    }

    #[test]
    fn test_center_subject_empty_input() {
        let empty = cutout(10, 10, (0, 0, 0, 0), RGBA8::new(0, 0, 0, 0));
        let centered = center_subject(&empty, (64, 32), 0.05);

        assert_eq!(centered.width(), 64);
        assert_eq!(centered.height(), 32);
        match centered {
            ImageData::Rgba8(img) => assert!(img.pixels().all(|p| p.a == 0)),
            ImageData::Rgb8(_) => panic!("expected RGBA canvas"),
        }
    }

    #[test]
    fn test_refine_edges_shrinks_silhouette() {
        let image = cutout(9, 9, (2, 2, 7, 7), RGBA8::new(100, 100, 100, 255));
        let refined = refine_edges(&image, 1, 0.0);

        // One erosion pass removes the outermost silhouette ring
        assert_eq!(pixel(&refined, 4, 4).a, 255);
        assert_eq!(pixel(&refined, 2, 2).a, 0);
        assert_eq!(pixel(&refined, 3, 3).a, 255);
        // Color channels are untouched
        assert_eq!(pixel(&refined, 4, 4).r, 100);
    }

    #[test]
    fn test_floor_shadow_layers() {
        let image = cutout(20, 20, (5, 5, 15, 10), RGBA8::new(200, 0, 0, 255));
        let options = ShadowOptions {
            offset_ratio: 0.25,
            blur_ratio: 0.0,
            ..ShadowOptions::default()
        };
        let shaded = add_floor_shadow(&image, &options);

        // Subject wins where present
        assert_eq!(pixel(&shaded, 7, 7), RGBA8::new(200, 0, 0, 255));
        // Shadow band sits 5 rows below the subject: opacity 100 black over white
        assert_eq!(pixel(&shaded, 7, 12), RGBA8::new(155, 155, 155, 255));
        // Everything else is the opaque backdrop
        assert_eq!(pixel(&shaded, 2, 2), RGBA8::new(255, 255, 255, 255));
    }

    #[test]
    fn test_flatten_onto_white() {
        let mut pixels = vec![RGBA8::new(0, 0, 0, 0); 4];
        pixels[1] = RGBA8::new(100, 0, 0, 255);
        pixels[2] = RGBA8::new(100, 0, 0, 128);
        let image = ImageData::Rgba8(ImgVec::new(pixels, 4, 1));

        let flat = flatten_onto_white(&image);
        assert!(!flat.has_alpha());
        assert_eq!(pixel(&flat, 0, 0), RGBA8::new(255, 255, 255, 255));
        assert_eq!(pixel(&flat, 1, 0), RGBA8::new(100, 0, 0, 255));
        // 128/255 alpha blend of 100 over 255
        assert_eq!(pixel(&flat, 2, 0).r, 177);
    }
}
