// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image processor: decode, normalise colour mode for a target container and
// encode. Operates on in-memory images using the `image` crate.

use std::io::Cursor;
use std::path::Path;

use fily_core::error::{FilyError, Result};
use fily_core::types::ImageTarget;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use tracing::{debug, info, instrument};

/// ICO entries cannot exceed 256 px on either side.
pub const ICO_MAX_DIMENSION: u32 = 256;

/// Colour layout an image is normalised to before encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorMode {
    /// Opaque RGB, transparency composited onto white.
    Rgb,
    /// RGBA, whatever the source layout.
    Rgba,
    /// Source layout kept when the container can store it, otherwise RGBA.
    /// Gray+alpha counts as storable only when `gray_alpha` is set.
    Preserve { gray_alpha: bool },
    /// Palette image; quantised by the encoder from RGBA.
    Indexed,
}

/// Colour transition applied for each target container.
pub fn target_color_mode(target: ImageTarget) -> ColorMode {
    match target {
        ImageTarget::Jpeg | ImageTarget::Bmp | ImageTarget::Pdf | ImageTarget::Eps => ColorMode::Rgb,
        ImageTarget::Png | ImageTarget::WebP => ColorMode::Preserve { gray_alpha: true },
        ImageTarget::Tiff => ColorMode::Preserve { gray_alpha: false },
        ImageTarget::Gif => ColorMode::Indexed,
        ImageTarget::Ico => ColorMode::Rgba,
    }
}

/// Image pipeline operating on a single in-memory image.
///
/// Transformations consume `self` and return a new `ImageProcessor`, enabling
/// method chaining.
pub struct ImageProcessor {
    image: DynamicImage,
}

impl ImageProcessor {
    // -- Construction ---------------------------------------------------------

    /// Load an image from a file path.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(FilyError::InputNotFound(path.to_path_buf()));
        }
        let img = image::open(path)
            .map_err(|err| FilyError::read(format!("failed to decode image: {err}")))?;
        info!(width = img.width(), height = img.height(), color = ?img.color(), "Image loaded");
        Ok(Self { image: img })
    }

    /// Wrap an already-decoded `DynamicImage`.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self { image }
    }

    // -- Accessors ------------------------------------------------------------

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn as_dynamic(&self) -> &DynamicImage {
        &self.image
    }

    pub fn into_dynamic(self) -> DynamicImage {
        self.image
    }

    // -- Transformations ------------------------------------------------------

    /// Shrink to fit within `max_width` x `max_height`, preserving aspect
    /// ratio. Images already small enough are left alone.
    #[instrument(skip(self), fields(max_width, max_height))]
    pub fn fit_within(self, max_width: u32, max_height: u32) -> Self {
        if self.image.width() <= max_width && self.image.height() <= max_height {
            return self;
        }
        let resized = self.image.resize(max_width, max_height, FilterType::Lanczos3);
        debug!(new_w = resized.width(), new_h = resized.height(), "Resize complete");
        Self { image: resized }
    }

    /// Opaque RGB copy with any transparency composited onto white.
    pub fn flatten_onto_white(&self) -> RgbImage {
        flatten_onto_white(&self.image)
    }

    /// Normalise the colour layout for `mode`.
    pub fn apply_color_mode(self, mode: ColorMode) -> Self {
        let image = match mode {
            ColorMode::Rgb => DynamicImage::ImageRgb8(flatten_onto_white(&self.image)),
            ColorMode::Rgba | ColorMode::Indexed => DynamicImage::ImageRgba8(self.image.to_rgba8()),
            ColorMode::Preserve { gray_alpha } => match self.image {
                DynamicImage::ImageLuma8(_) | DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_) => {
                    self.image
                }
                DynamicImage::ImageLumaA8(_) if gray_alpha => self.image,
                other => DynamicImage::ImageRgba8(other.to_rgba8()),
            },
        };
        debug!(?mode, color = ?image.color(), "Colour mode applied");
        Self { image }
    }

    // -- Output ---------------------------------------------------------------

    /// Encode the current image as JPEG bytes with the given quality (1-100).
    pub fn to_jpeg_bytes(&self, quality: u8) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        let rgb = flatten_onto_white(&self.image);
        let encoder = JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100));
        rgb.write_with_encoder(encoder)
            .map_err(|err| FilyError::render(format!("JPEG encoding failed: {err}")))?;
        Ok(buffer)
    }

    /// Encode as PNG; `quality` selects compression effort.
    pub fn to_png_bytes(&self, quality: u8) -> Result<Vec<u8>> {
        let compression = match quality {
            0..=33 => CompressionType::Fast,
            34..=66 => CompressionType::Default,
            _ => CompressionType::Best,
        };
        let mut buffer = Vec::new();
        let encoder = PngEncoder::new_with_quality(&mut buffer, compression, PngFilter::Adaptive);
        self.image
            .write_with_encoder(encoder)
            .map_err(|err| FilyError::render(format!("PNG encoding failed: {err}")))?;
        Ok(buffer)
    }

    /// Encode in a container without a quality parameter.
    pub fn to_format_bytes(&self, format: ImageFormat) -> Result<Vec<u8>> {
        encode_to_format(&self.image, format)
    }

    /// Encapsulated PostScript with the opaque RGB image at 1 px = 1 pt.
    pub fn to_eps_bytes(&self) -> Vec<u8> {
        write_eps(&flatten_onto_white(&self.image))
    }
}

/// Composite `image` over an opaque white background.
pub fn flatten_onto_white(image: &DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.to_rgb8();
    }
    let rgba = image.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let image::Rgba([r, g, b, a]) = *rgba.get_pixel(x, y);
        let alpha = a as u16;
        let blend = |channel: u8| -> u8 {
            ((channel as u16 * alpha + 255 * (255 - alpha) + 127) / 255) as u8
        };
        Rgb([blend(r), blend(g), blend(b)])
    })
}

/// Encode a `DynamicImage` into the specified format, returning the raw bytes.
fn encode_to_format(image: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let mut cursor = Cursor::new(&mut buffer);
    image
        .write_to(&mut cursor, format)
        .map_err(|err| FilyError::render(format!("{format:?} encoding failed: {err}")))?;
    Ok(buffer)
}

/// Level 2 EPS drawing the image with `colorimage` from hex data.
fn write_eps(image: &RgbImage) -> Vec<u8> {
    let (w, h) = (image.width(), image.height());
    let mut out = String::with_capacity(image.as_raw().len() * 2 + 512);
    out.push_str("%!PS-Adobe-3.0 EPSF-3.0\n");
    out.push_str("%%Creator: fily\n");
    out.push_str(&format!("%%BoundingBox: 0 0 {w} {h}\n"));
    out.push_str("%%LanguageLevel: 2\n");
    out.push_str("%%EndComments\n");
    out.push_str("gsave\n");
    out.push_str(&format!("/rowdata {} string def\n", w * 3));
    out.push_str(&format!("{w} {h} scale\n"));
    out.push_str(&format!(
        "{w} {h} 8 [{w} 0 0 -{h} 0 {h}]\n{{currentfile rowdata readhexstring pop}} false 3 colorimage\n"
    ));
    for row in image.as_raw().chunks((w * 3).max(1) as usize) {
        for chunk in row.chunks(36) {
            out.push_str(&hex::encode(chunk));
            out.push('\n');
        }
    }
    out.push_str("grestore\n");
    out.push_str("showpage\n");
    out.push_str("%%EOF\n");
    out.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn half_transparent() -> DynamicImage {
        let mut img = RgbaImage::from_pixel(4, 4, Rgba([255, 0, 0, 255]));
        img.put_pixel(0, 0, Rgba([0, 0, 0, 0]));
        img.put_pixel(1, 0, Rgba([0, 0, 0, 128]));
        DynamicImage::ImageRgba8(img)
    }

    #[test]
    fn transparent_pixels_become_white() {
        let flat = flatten_onto_white(&half_transparent());
        assert_eq!(*flat.get_pixel(0, 0), Rgb([255, 255, 255]));
        assert_eq!(*flat.get_pixel(2, 2), Rgb([255, 0, 0]));
        let Rgb([r, _, _]) = *flat.get_pixel(1, 0);
        assert!((126..=128).contains(&r), "half-alpha black over white is mid grey, got {r}");
    }

    #[test]
    fn color_matrix_per_target() {
        assert_eq!(target_color_mode(ImageTarget::Jpeg), ColorMode::Rgb);
        assert_eq!(target_color_mode(ImageTarget::Eps), ColorMode::Rgb);
        assert_eq!(target_color_mode(ImageTarget::Png), ColorMode::Preserve { gray_alpha: true });
        assert_eq!(target_color_mode(ImageTarget::Tiff), ColorMode::Preserve { gray_alpha: false });
        assert_eq!(target_color_mode(ImageTarget::Gif), ColorMode::Indexed);
        assert_eq!(target_color_mode(ImageTarget::Ico), ColorMode::Rgba);
    }

    #[test]
    fn preserve_keeps_alpha_and_widens_exotic_layouts() {
        let preserve = ColorMode::Preserve { gray_alpha: true };
        let kept = ImageProcessor::from_dynamic(half_transparent()).apply_color_mode(preserve);
        assert!(kept.as_dynamic().color().has_alpha());

        let wide = DynamicImage::ImageRgb16(image::ImageBuffer::new(2, 2));
        let widened = ImageProcessor::from_dynamic(wide).apply_color_mode(preserve);
        assert!(matches!(widened.as_dynamic(), DynamicImage::ImageRgba8(_)));
    }

    #[test]
    fn gray_alpha_widens_where_it_cannot_be_stored() {
        let gray_alpha = || DynamicImage::ImageLumaA8(image::ImageBuffer::from_pixel(2, 2, image::LumaA([90, 200])));

        let kept = ImageProcessor::from_dynamic(gray_alpha())
            .apply_color_mode(ColorMode::Preserve { gray_alpha: true });
        assert!(matches!(kept.as_dynamic(), DynamicImage::ImageLumaA8(_)));

        let widened = ImageProcessor::from_dynamic(gray_alpha())
            .apply_color_mode(ColorMode::Preserve { gray_alpha: false });
        assert!(matches!(widened.as_dynamic(), DynamicImage::ImageRgba8(_)));

        let gray = DynamicImage::ImageLuma8(image::ImageBuffer::new(2, 2));
        let kept = ImageProcessor::from_dynamic(gray).apply_color_mode(ColorMode::Preserve { gray_alpha: false });
        assert!(matches!(kept.as_dynamic(), DynamicImage::ImageLuma8(_)));
    }

    #[test]
    fn fit_within_never_upscales() {
        let small = ImageProcessor::from_dynamic(DynamicImage::new_rgb8(10, 10)).fit_within(256, 256);
        assert_eq!((small.width(), small.height()), (10, 10));

        let big = ImageProcessor::from_dynamic(DynamicImage::new_rgb8(1024, 512)).fit_within(256, 256);
        assert_eq!((big.width(), big.height()), (256, 128));
    }

    #[test]
    fn eps_has_bounding_box_and_data() {
        let eps = ImageProcessor::from_dynamic(DynamicImage::new_rgb8(3, 2)).to_eps_bytes();
        let text = String::from_utf8(eps).unwrap();
        assert!(text.starts_with("%!PS-Adobe-3.0 EPSF-3.0"));
        assert!(text.contains("%%BoundingBox: 0 0 3 2"));
        assert!(text.contains("colorimage"));
        assert!(text.trim_end().ends_with("%%EOF"));
    }

    #[test]
    fn png_quality_changes_nothing_visible() {
        let processor = ImageProcessor::from_dynamic(half_transparent());
        for quality in [0, 50, 100] {
            let bytes = processor.to_png_bytes(quality).unwrap();
            let decoded = image::load_from_memory(&bytes).unwrap();
            assert_eq!(decoded.to_rgba8(), processor.as_dynamic().to_rgba8());
        }
    }
}
