//! Alpha-aware overlay compositing
//!
//! Blending ("source over") happens in normalized f32 RGBA on the
//! sRGB-encoded values, and only over the part of the base the overlay
//! covers. That window is converted back to the base's color type and
//! pasted into a copy of the base.

use image::imageops::{self, FilterType};
use image::{ColorType, DynamicImage, Rgba32FImage, RgbaImage};
use tracing::debug;

use crate::error::{ImageError, Result};

/// Resize `overlay` to `size` and blend it onto a copy of `base` with its
/// top-left corner at `offset`.
///
/// Parts of the overlay outside the base are dropped silently. The result has
/// the base's dimensions and color type, and pixels outside the overlay are
/// copied from the base unchanged.
pub fn composite(
    base: &DynamicImage,
    overlay: &RgbaImage,
    size: (u32, u32),
    offset: (i64, i64),
) -> Result<DynamicImage> {
    let (width, height) = size;
    if width == 0 || height == 0 || overlay.width() == 0 || overlay.height() == 0 {
        return Err(ImageError::InvalidResizeTarget { width, height }.into());
    }

    let (base_w, base_h) = (base.width(), base.height());
    let (off_x, off_y) = offset;

    // Visible window of the overlay, in overlay coordinates
    let start_x = (-off_x).clamp(0, width as i64) as u32;
    let start_y = (-off_y).clamp(0, height as i64) as u32;
    let end_x = (base_w as i64 - off_x).clamp(0, width as i64) as u32;
    let end_y = (base_h as i64 - off_y).clamp(0, height as i64) as u32;

    let mut output = base.clone();
    if start_x >= end_x || start_y >= end_y {
        debug!(
            offset = format!("({}, {})", off_x, off_y),
            base = format!("{}x{}", base_w, base_h),
            "Overlay entirely outside base"
        );
        return Ok(output);
    }

    let resized = if overlay.dimensions() == size {
        overlay.clone()
    } else {
        imageops::resize(overlay, width, height, FilterType::Lanczos3)
    };

    // Same window in base coordinates
    let win_x = (off_x + start_x as i64) as u32;
    let win_y = (off_y + start_y as i64) as u32;
    let mut window: Rgba32FImage = base
        .crop_imm(win_x, win_y, end_x - start_x, end_y - start_y)
        .to_rgba32f();

    for (wx, wy, dst) in window.enumerate_pixels_mut() {
        let src = resized.get_pixel(start_x + wx, start_y + wy).0;
        let src_a = src[3] as f32 / 255.0;
        if src_a > 0.0 {
            dst.0 = blend_over(src, dst.0, src_a);
        }
    }

    let window = restore_color_type(window, base.color());
    paste(&mut output, &window, win_x as i64, win_y as i64);
    Ok(output)
}

/// Porter-Duff "source over" for one pixel
fn blend_over(src: [u8; 4], dst: [f32; 4], src_a: f32) -> [f32; 4] {
    let dst_a = dst[3];
    let out_a = src_a + dst_a * (1.0 - src_a);
    if out_a <= 0.0 {
        return [0.0; 4];
    }
    let mut out = [0.0, 0.0, 0.0, out_a];
    for c in 0..3 {
        let s = src[c] as f32 / 255.0;
        out[c] = (s * src_a + dst[c] * dst_a * (1.0 - src_a)) / out_a;
    }
    out
}

/// Copy `window` into `output` at `(x, y)` without leaving their shared
/// color type
fn paste(output: &mut DynamicImage, window: &DynamicImage, x: i64, y: i64) {
    match (output, window) {
        (DynamicImage::ImageLuma8(o), DynamicImage::ImageLuma8(w)) => imageops::replace(o, w, x, y),
        (DynamicImage::ImageLumaA8(o), DynamicImage::ImageLumaA8(w)) => {
            imageops::replace(o, w, x, y)
        }
        (DynamicImage::ImageRgb8(o), DynamicImage::ImageRgb8(w)) => imageops::replace(o, w, x, y),
        (DynamicImage::ImageRgba8(o), DynamicImage::ImageRgba8(w)) => imageops::replace(o, w, x, y),
        (DynamicImage::ImageLuma16(o), DynamicImage::ImageLuma16(w)) => {
            imageops::replace(o, w, x, y)
        }
        (DynamicImage::ImageLumaA16(o), DynamicImage::ImageLumaA16(w)) => {
            imageops::replace(o, w, x, y)
        }
        (DynamicImage::ImageRgb16(o), DynamicImage::ImageRgb16(w)) => imageops::replace(o, w, x, y),
        (DynamicImage::ImageRgba16(o), DynamicImage::ImageRgba16(w)) => {
            imageops::replace(o, w, x, y)
        }
        (DynamicImage::ImageRgb32F(o), DynamicImage::ImageRgb32F(w)) => {
            imageops::replace(o, w, x, y)
        }
        (DynamicImage::ImageRgba32F(o), DynamicImage::ImageRgba32F(w)) => {
            imageops::replace(o, w, x, y)
        }
        (o, w) => imageops::replace(o, w, x, y),
    }
}

fn restore_color_type(canvas: Rgba32FImage, color: ColorType) -> DynamicImage {
    let blended = DynamicImage::ImageRgba32F(canvas);
    match color {
        ColorType::L8 => DynamicImage::ImageLuma8(blended.to_luma8()),
        ColorType::La8 => DynamicImage::ImageLumaA8(blended.to_luma_alpha8()),
        ColorType::Rgb8 => DynamicImage::ImageRgb8(blended.to_rgb8()),
        ColorType::Rgba8 => DynamicImage::ImageRgba8(blended.to_rgba8()),
        ColorType::L16 => DynamicImage::ImageLuma16(blended.to_luma16()),
        ColorType::La16 => DynamicImage::ImageLumaA16(blended.to_luma_alpha16()),
        ColorType::Rgb16 => DynamicImage::ImageRgb16(blended.to_rgb16()),
        ColorType::Rgba16 => DynamicImage::ImageRgba16(blended.to_rgba16()),
        ColorType::Rgb32F => DynamicImage::ImageRgb32F(blended.to_rgb32f()),
        _ => blended,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, GrayImage, ImageBuffer, Luma, Rgb, RgbImage, Rgba};

    fn white_rgb(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([255, 255, 255])))
    }

    fn ink(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba([0, 0, 0, 255]))
    }

    #[test]
    fn test_opaque_overlay_replaces_pixels() {
        let out = composite(&white_rgb(20, 20), &ink(4, 4), (4, 4), (5, 6)).unwrap();
        let rgb = out.as_rgb8().unwrap();
        assert_eq!(*rgb.get_pixel(5, 6), Rgb([0, 0, 0]));
        assert_eq!(*rgb.get_pixel(8, 9), Rgb([0, 0, 0]));
        assert_eq!(*rgb.get_pixel(9, 9), Rgb([255, 255, 255]));
        assert_eq!(*rgb.get_pixel(4, 6), Rgb([255, 255, 255]));
    }

    #[test]
    fn test_transparent_overlay_leaves_base() {
        let clear = RgbaImage::from_pixel(4, 4, Rgba([255, 255, 255, 0]));
        let base = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb([10, 120, 200])));
        let out = composite(&base, &clear, (4, 4), (2, 2)).unwrap();
        assert_eq!(out, base);
    }

    #[test]
    fn test_half_alpha_blends() {
        let half = RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 128]));
        let out = composite(&white_rgb(2, 2), &half, (1, 1), (0, 0)).unwrap();
        let value = out.as_rgb8().unwrap().get_pixel(0, 0).0[0];
        assert!((126..=128).contains(&value), "got {}", value);
    }

    #[test]
    fn test_base_is_not_mutated() {
        let base = white_rgb(10, 10);
        let before = base.clone();
        let _ = composite(&base, &ink(3, 3), (3, 3), (0, 0)).unwrap();
        assert_eq!(base, before);
    }

    #[test]
    fn test_overlay_clipped_at_edges() {
        let out = composite(&white_rgb(10, 10), &ink(4, 4), (4, 4), (8, -2)).unwrap();
        let rgb = out.as_rgb8().unwrap();
        assert_eq!(out.dimensions(), (10, 10));
        assert_eq!(*rgb.get_pixel(9, 0), Rgb([0, 0, 0]));
        assert_eq!(*rgb.get_pixel(9, 1), Rgb([0, 0, 0]));
        assert_eq!(*rgb.get_pixel(9, 2), Rgb([255, 255, 255]));
        assert_eq!(*rgb.get_pixel(7, 0), Rgb([255, 255, 255]));
    }

    #[test]
    fn test_overlay_fully_outside_is_noop() {
        let base = white_rgb(10, 10);
        let out = composite(&base, &ink(4, 4), (4, 4), (50, 50)).unwrap();
        assert_eq!(out, base);
    }

    #[test]
    fn test_zero_size_is_rejected() {
        let err = composite(&white_rgb(10, 10), &ink(4, 4), (0, 4), (0, 0)).unwrap_err();
        assert!(matches!(
            err,
            crate::StampError::Image(ImageError::InvalidResizeTarget { width: 0, height: 4 })
        ));
    }

    #[test]
    fn test_overlay_is_resized() {
        let out = composite(&white_rgb(40, 40), &ink(2, 2), (20, 10), (0, 0)).unwrap();
        let rgb = out.as_rgb8().unwrap();
        assert_eq!(*rgb.get_pixel(10, 5), Rgb([0, 0, 0]));
        assert_eq!(*rgb.get_pixel(10, 12), Rgb([255, 255, 255]));
    }

    #[test]
    fn test_grayscale_base_stays_grayscale() {
        let base = DynamicImage::ImageLuma8(GrayImage::from_pixel(6, 6, Luma([255])));
        let out = composite(&base, &ink(2, 2), (2, 2), (1, 1)).unwrap();
        assert_eq!(out.color(), ColorType::L8);
        assert_eq!(out.as_luma8().unwrap().get_pixel(1, 1).0[0], 0);
        assert_eq!(out.as_luma8().unwrap().get_pixel(0, 0).0[0], 255);
    }

    #[test]
    fn test_pixels_outside_overlay_are_copied_exactly() {
        let base = DynamicImage::ImageRgb16(ImageBuffer::from_fn(12, 8, |x, y| {
            Rgb([x as u16 * 4099 + 1, y as u16 * 7919 + 3, 12345])
        }));
        let out = composite(&base, &ink(3, 3), (3, 3), (4, 2)).unwrap();
        let (before, after) = (base.as_rgb16().unwrap(), out.as_rgb16().unwrap());

        for (x, y, pixel) in after.enumerate_pixels() {
            let inside = (4..7).contains(&x) && (2..5).contains(&y);
            if inside {
                assert_eq!(*pixel, Rgb([0, 0, 0]));
            } else {
                assert_eq!(pixel, before.get_pixel(x, y), "({}, {})", x, y);
            }
        }
    }

    #[test]
    fn test_rgba_base_stays_rgba_and_gains_coverage() {
        let base = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([0, 0, 255, 0])));
        let out = composite(&base, &ink(2, 2), (2, 2), (0, 0)).unwrap();
        assert_eq!(out.color(), ColorType::Rgba8);
        assert_eq!(*out.as_rgba8().unwrap().get_pixel(0, 0), Rgba([0, 0, 0, 255]));
        assert_eq!(*out.as_rgba8().unwrap().get_pixel(3, 3), Rgba([0, 0, 255, 0]));
    }
}
