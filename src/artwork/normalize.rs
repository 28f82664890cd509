//! RGBA to RGB compositing over white.

use image::{DynamicImage, Rgb, RgbImage};

/// Background channel value (opaque white).
const BACKGROUND: u16 = 255;

/// Composite one channel over white: `src * a + 255 * (1 - a)`, rounded.
///
/// `alpha == 255` returns `src` exactly and `alpha == 0` returns 255.
#[inline]
pub fn composite_channel(src: u8, alpha: u8) -> u8 {
    let a = alpha as u16;
    let blended = src as u16 * a + BACKGROUND * (255 - a);
    // integer round-half-up division by 255
    ((blended + 127) / 255) as u8
}

/// Flatten an image of any colour mode onto an opaque white canvas.
///
/// The image is promoted to RGBA first (RGB sources gain full opacity), so
/// every source takes the same path and the result is deterministic.
pub fn flatten_on_white(image: &DynamicImage) -> RgbImage {
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();

    RgbImage::from_fn(width, height, |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        Rgb([
            composite_channel(r, a),
            composite_channel(g, a),
            composite_channel(b, a),
        ])
    })
}
