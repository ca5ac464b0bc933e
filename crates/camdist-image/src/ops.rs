use crate::error::ImageError;
use crate::image::{Image, ImageDtype};

/// Convert an 8-bit image to a floating point image with the same values.
///
/// The values are kept in the `[0, 255]` range so that a round trip through
/// [`cast_f32_to_u8`] reproduces the input exactly.
pub fn cast_u8_to_f32<const C: usize>(src: &Image<u8, C>) -> Result<Image<f32, C>, ImageError> {
    let data = src.as_slice().iter().map(|&v| v as f32).collect();
    Image::new(src.size(), data)
}

/// Convert a floating point image back to 8 bits, rounding and saturating.
pub fn cast_f32_to_u8<const C: usize>(src: &Image<f32, C>) -> Result<Image<u8, C>, ImageError> {
    let data = src.as_slice().iter().map(|&v| u8::from_f32(v)).collect();
    Image::new(src.size(), data)
}
