use camdist_image::{Image, ImageError};

use super::bilinear::bilinear_interpolation;
use crate::calibration::undistort::UndistortionMap;
use crate::parallel;

/// Apply an undistortion map to an image.
///
/// Each destination pixel is obtained by bilinear sampling of the source
/// image at the coordinate stored in the map; samples outside the source
/// resolve to `border`.
///
/// # Arguments
///
/// * `src` - The input image container with shape (height, width, C).
/// * `dst` - The output image container, sized like the map.
/// * `map` - The per-pixel source coordinates.
/// * `border` - The value used for out-of-bounds samples.
///
/// # Errors
///
/// The source and the destination must both match the map resolution.
pub fn remap<const C: usize>(
    src: &Image<f32, C>,
    dst: &mut Image<f32, C>,
    map: &UndistortionMap,
    border: f32,
) -> Result<(), ImageError> {
    if src.size() != map.size() {
        return Err(ImageError::InvalidImageSize(
            src.cols(),
            src.rows(),
            map.size().width,
            map.size().height,
        ));
    }

    if dst.size() != map.size() {
        return Err(ImageError::InvalidImageSize(
            dst.cols(),
            dst.rows(),
            map.size().width,
            map.size().height,
        ));
    }

    parallel::par_iter_rows_resample(dst, map.map_x(), map.map_y(), |&x, &y, dst_pixel| {
        let pixel = bilinear_interpolation(src, x, y, border);
        dst_pixel.copy_from_slice(&pixel);
    });

    Ok(())
}
