use camdist_image::Image;

/// Kernel for bilinear interpolation with a border value.
///
/// Samples the image at the fractional coordinate `(u, v)`. Coordinates
/// outside the valid pixel grid resolve to `border` in every channel.
///
/// # Arguments
///
/// * `image` - The input image container.
/// * `u` - The x coordinate of the pixel to interpolate.
/// * `v` - The y coordinate of the pixel to interpolate.
/// * `border` - The value returned for out-of-bounds samples.
///
/// # Returns
///
/// The interpolated pixel values.
pub fn bilinear_interpolation<const C: usize>(
    image: &Image<f32, C>,
    u: f32,
    v: f32,
    border: f32,
) -> [f32; C] {
    let (rows, cols) = (image.rows(), image.cols());

    if u < 0.0 || v < 0.0 || u > (cols - 1) as f32 || v > (rows - 1) as f32 {
        return [border; C];
    }

    let iu0 = (u.trunc() as usize).min(cols - 1);
    let iv0 = (v.trunc() as usize).min(rows - 1);
    let iu1 = (iu0 + 1).min(cols - 1);
    let iv1 = (iv0 + 1).min(rows - 1);

    let frac_u = u.fract();
    let frac_v = v.fract();

    let w00 = (1.0 - frac_u) * (1.0 - frac_v);
    let w01 = frac_u * (1.0 - frac_v);
    let w10 = (1.0 - frac_u) * frac_v;
    let w11 = frac_u * frac_v;

    let data = image.as_slice();
    let base00 = (iv0 * cols + iu0) * C;
    let base01 = (iv0 * cols + iu1) * C;
    let base10 = (iv1 * cols + iu0) * C;
    let base11 = (iv1 * cols + iu1) * C;

    let mut pixel = [0.0; C];
    for (k, value) in pixel.iter_mut().enumerate() {
        *value = data[base00 + k] * w00
            + data[base01 + k] * w01
            + data[base10 + k] * w10
            + data[base11 + k] * w11;
    }

    pixel
}

#[cfg(test)]
mod tests {
    use super::*;
    use camdist_image::{ImageError, ImageSize};

    #[test]
    fn interpolates_between_pixels() -> Result<(), ImageError> {
        let image = Image::<f32, 1>::new(
            ImageSize {
                width: 2,
                height: 2,
            },
            vec![0.0, 2.0, 4.0, 6.0],
        )?;

        assert_eq!(bilinear_interpolation(&image, 0.5, 0.0, 0.0), [1.0]);
        assert_eq!(bilinear_interpolation(&image, 0.0, 0.5, 0.0), [2.0]);
        assert_eq!(bilinear_interpolation(&image, 0.5, 0.5, 0.0), [3.0]);
        Ok(())
    }

    #[test]
    fn out_of_bounds_resolves_to_border() -> Result<(), ImageError> {
        let image = Image::<f32, 1>::new(
            ImageSize {
                width: 2,
                height: 2,
            },
            vec![1.0, 1.0, 1.0, 1.0],
        )?;

        assert_eq!(bilinear_interpolation(&image, -0.1, 0.0, 7.0), [7.0]);
        assert_eq!(bilinear_interpolation(&image, 0.0, 1.5, 7.0), [7.0]);
        assert_eq!(bilinear_interpolation(&image, 1.0, 1.0, 7.0), [1.0]);
        Ok(())
    }
}
