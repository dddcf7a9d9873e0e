use image::{DynamicImage, Rgb, RgbImage};

use crate::error::ValidationError;

/// Side length every upload is resized to before statistics are taken.
/// The classifier was trained on features computed at this resolution.
pub const CANONICAL_SIZE: u32 = 300;

pub fn decode(bytes: &[u8]) -> Result<DynamicImage, ValidationError> {
    if bytes.is_empty() {
        return Err(ValidationError::MissingImage);
    }
    image::load_from_memory(bytes).map_err(|e| ValidationError::UndecodableImage(e.to_string()))
}

/// Fractional bits of the interpolation weights, as in OpenCV's 8-bit resize.
const COEF_BITS: u32 = 11;
const COEF_ONE: i32 = 1 << COEF_BITS;

/// Drops alpha, expands grayscale to RGB and resizes to exactly `size` x `size`.
/// Aspect ratio is not preserved.
pub fn normalize(image: &DynamicImage, size: u32) -> Result<RgbImage, ValidationError> {
    if image.width() == 0 || image.height() == 0 || size == 0 {
        return Err(ValidationError::EmptyImage);
    }

    let rgb = image.to_rgb8();
    if rgb.dimensions() == (size, size) {
        return Ok(rgb);
    }
    Ok(resize_linear(&rgb, size, size))
}

/// Two source pixels and their fixed-point weights for one output coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Tap {
    index: [u32; 2],
    weight: [i32; 2],
}

/// Maps output coordinates onto the source grid with half-pixel centers,
/// clamping at the borders.
fn taps(src_len: u32, dst_len: u32) -> Vec<Tap> {
    let scale = f64::from(src_len) / f64::from(dst_len);
    let last = i64::from(src_len) - 1;
    (0..dst_len)
        .map(|d| {
            let position = (f64::from(d) + 0.5) * scale - 0.5;
            let mut start = position.floor() as i64;
            let mut fraction = position - start as f64;
            if start < 0 {
                start = 0;
                fraction = 0.0;
            }
            if start >= last {
                start = last;
                fraction = 0.0;
            }
            let start = start as u32;
            let far = (fraction * f64::from(COEF_ONE)).round() as i32;
            Tap {
                index: [start, (start + 1).min(src_len - 1)],
                weight: [COEF_ONE - far, far],
            }
        })
        .collect()
}

/// Bilinear resize sampling a 2x2 neighborhood per output pixel, the way
/// `cv2.resize` does with `INTER_LINEAR`. Unlike the `image` crate's
/// triangle filter, the kernel does not widen when shrinking, so large photos
/// are point-sampled rather than averaged.
fn resize_linear(src: &RgbImage, width: u32, height: u32) -> RgbImage {
    let columns = taps(src.width(), width);
    let rows = taps(src.height(), height);

    let horizontal = |x: &Tap, y: u32, channel: usize| -> i32 {
        i32::from(src.get_pixel(x.index[0], y)[channel]) * x.weight[0]
            + i32::from(src.get_pixel(x.index[1], y)[channel]) * x.weight[1]
    };

    RgbImage::from_fn(width, height, |dx, dy| {
        let x = &columns[dx as usize];
        let y = &rows[dy as usize];
        let mut px = [0u8; 3];
        for (channel, out) in px.iter_mut().enumerate() {
            let top = horizontal(x, y.index[0], channel);
            let bottom = horizontal(x, y.index[1], channel);
            // Vertical pass in OpenCV's fixed-point order: 22 fractional bits total.
            let value = (((y.weight[0] * (top >> 4)) >> 16)
                + ((y.weight[1] * (bottom >> 4)) >> 16)
                + 2)
                >> 2;
            *out = value.clamp(0, 255) as u8;
        }
        Rgb(px)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, ImageFormat, Luma, Rgba};
    use std::io::Cursor;

    fn encode_png(image: &DynamicImage) -> Vec<u8> {
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn test_decode_rejects_empty_upload() {
        assert_eq!(decode(&[]).unwrap_err(), ValidationError::MissingImage);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            decode(b"definitely not an image"),
            Err(ValidationError::UndecodableImage(_))
        ));
    }

    #[test]
    fn test_decode_png() {
        let image = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(4, 3, Rgb([10, 20, 30])));
        let decoded = decode(&encode_png(&image)).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (4, 3));
        assert_eq!(decoded.to_rgb8().get_pixel(0, 0), &Rgb([10, 20, 30]));
    }

    #[test]
    fn test_normalize_resizes_to_canonical_square() {
        let image = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(640, 120, Rgb([0, 0, 0])));
        let normalized = normalize(&image, CANONICAL_SIZE).unwrap();
        assert_eq!(normalized.dimensions(), (CANONICAL_SIZE, CANONICAL_SIZE));
    }

    #[test]
    fn test_normalize_preserves_solid_colors() {
        for (w, h) in [(640, 120), (7, 3), (301, 299)] {
            let image = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(w, h, Rgb([13, 200, 77])));
            let normalized = normalize(&image, CANONICAL_SIZE).unwrap();
            assert!(normalized.pixels().all(|px| *px == Rgb([13, 200, 77])));
        }
    }

    #[test]
    fn test_shrinking_samples_two_by_two_neighborhood() {
        // Scale 3 lands exactly on source columns 1 and 4; neighbours must not bleed in.
        let columns = [10, 200, 10, 10, 90, 10];
        let source = ImageBuffer::from_fn(6, 6, |x, _| Rgb([columns[x as usize]; 3]));
        let resized = resize_linear(&source, 2, 2);
        assert_eq!(resized.get_pixel(0, 0), &Rgb([200; 3]));
        assert_eq!(resized.get_pixel(1, 1), &Rgb([90; 3]));
    }

    #[test]
    fn test_enlarging_interpolates_between_half_pixel_centers() {
        let source = ImageBuffer::from_fn(2, 1, |x, _| Rgb([if x == 0 { 0 } else { 200 }; 3]));
        let resized = resize_linear(&source, 4, 1);
        let row: Vec<u8> = resized.pixels().map(|px| px[0]).collect();
        assert_eq!(row, vec![0, 50, 150, 200]);
    }

    #[test]
    fn test_taps_clamp_at_borders() {
        let taps = taps(2, 4);
        assert_eq!(
            taps[0],
            Tap {
                index: [0, 1],
                weight: [COEF_ONE, 0]
            }
        );
        assert_eq!(
            taps[3],
            Tap {
                index: [1, 1],
                weight: [COEF_ONE, 0]
            }
        );
    }

    #[test]
    fn test_normalize_keeps_canonical_input_untouched() {
        let mut buffer: RgbImage = ImageBuffer::from_pixel(8, 8, Rgb([1, 2, 3]));
        buffer.put_pixel(3, 4, Rgb([200, 100, 50]));
        let normalized = normalize(&DynamicImage::ImageRgb8(buffer.clone()), 8).unwrap();
        assert_eq!(normalized, buffer);
    }

    #[test]
    fn test_normalize_drops_alpha_and_expands_gray() {
        let rgba = DynamicImage::ImageRgba8(ImageBuffer::from_pixel(2, 2, Rgba([9, 8, 7, 0])));
        assert_eq!(normalize(&rgba, 2).unwrap().get_pixel(1, 1), &Rgb([9, 8, 7]));

        let gray = DynamicImage::ImageLuma8(ImageBuffer::from_pixel(2, 2, Luma([42])));
        assert_eq!(normalize(&gray, 2).unwrap().get_pixel(0, 0), &Rgb([42, 42, 42]));
    }

    #[test]
    fn test_normalize_rejects_zero_size() {
        let empty = DynamicImage::ImageRgb8(RgbImage::new(0, 0));
        assert_eq!(
            normalize(&empty, CANONICAL_SIZE).unwrap_err(),
            ValidationError::EmptyImage
        );

        let image = DynamicImage::ImageRgb8(RgbImage::new(4, 4));
        assert_eq!(normalize(&image, 0).unwrap_err(), ValidationError::EmptyImage);
    }
}
