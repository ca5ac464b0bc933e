use rayon::prelude::*;

use camdist_image::ImageSize;

use super::distortion::{distort_point_polynomial, undistort_point_polynomial};
use super::{CameraIntrinsic, PolynomialDistortion};

/// An error type for undistortion map generation.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum UndistortionError {
    /// The crop parameter is outside the valid `[0, 1]` range.
    #[error("crop parameter must be in [0, 1], got {0}")]
    InvalidCropParameter(f64),

    /// The requested map resolution is degenerate.
    #[error("map resolution must be non-zero, got {0}x{1}")]
    InvalidMapSize(usize, usize),
}

/// A per-pixel remap table from rectified to distorted coordinates.
///
/// For every destination pixel `(u, v)` the table stores the source pixel
/// coordinate that should be sampled to fill it. The table is a pure
/// function of the camera model, the resolution and the crop parameter, so
/// it can be computed once and shared read-only between frames.
#[derive(Clone, Debug)]
pub struct UndistortionMap {
    map_x: Vec<f32>,
    map_y: Vec<f32>,
    size: ImageSize,
}

impl UndistortionMap {
    /// The x source coordinates, row-major at the map resolution.
    pub fn map_x(&self) -> &[f32] {
        &self.map_x
    }

    /// The y source coordinates, row-major at the map resolution.
    pub fn map_y(&self) -> &[f32] {
        &self.map_y
    }

    /// The destination resolution of the map.
    pub fn size(&self) -> ImageSize {
        self.size
    }
}

// Grid density used to probe the undistorted image boundary.
const RECT_GRID: usize = 9;

/// Undistorted axis-aligned extents of the source image.
///
/// `inner` is the largest rectangle that contains only pixels with valid
/// source data, `outer` the smallest rectangle containing the whole
/// undistorted field of view. Both are in source pixel coordinates.
fn undistorted_rectangles(
    intrinsic: &CameraIntrinsic,
    distortion: &PolynomialDistortion,
    size: ImageSize,
) -> ((f64, f64, f64, f64), (f64, f64, f64, f64)) {
    let (w, h) = (size.width as f64, size.height as f64);

    let mut ix0 = f64::MIN;
    let mut ix1 = f64::MAX;
    let mut iy0 = f64::MIN;
    let mut iy1 = f64::MAX;
    let mut ox0 = f64::MAX;
    let mut ox1 = f64::MIN;
    let mut oy0 = f64::MAX;
    let mut oy1 = f64::MIN;

    for gy in 0..RECT_GRID {
        for gx in 0..RECT_GRID {
            let x = gx as f64 * (w - 1.0) / (RECT_GRID - 1) as f64;
            let y = gy as f64 * (h - 1.0) / (RECT_GRID - 1) as f64;
            let (xu, yu) = undistort_point_polynomial(x, y, intrinsic, distortion);

            ox0 = ox0.min(xu);
            ox1 = ox1.max(xu);
            oy0 = oy0.min(yu);
            oy1 = oy1.max(yu);

            if gx == 0 {
                ix0 = ix0.max(xu);
            }
            if gx == RECT_GRID - 1 {
                ix1 = ix1.min(xu);
            }
            if gy == 0 {
                iy0 = iy0.max(yu);
            }
            if gy == RECT_GRID - 1 {
                iy1 = iy1.min(yu);
            }
        }
    }

    ((ix0, iy0, ix1, iy1), (ox0, oy0, ox1, oy1))
}

/// Compute the optimal new camera matrix for a crop parameter.
///
/// The new matrix keeps the principal point centered in the destination
/// image and linearly blends between two focal scales: `alpha = 0` scales
/// so that every destination pixel has valid source data (maximal crop),
/// `alpha = 1` scales so that the full undistorted field of view is kept,
/// including border regions without source data.
///
/// # Arguments
///
/// * `intrinsic` - The intrinsic parameters scaled to `size`
/// * `distortion` - The distortion parameters of the camera
/// * `size` - The target resolution
/// * `alpha` - The crop parameter in `[0, 1]`
///
/// # Returns
///
/// The intrinsic parameters of the rectified destination view.
pub fn optimal_new_intrinsic(
    intrinsic: &CameraIntrinsic,
    distortion: &PolynomialDistortion,
    size: ImageSize,
    alpha: f64,
) -> Result<CameraIntrinsic, UndistortionError> {
    if !(0.0..=1.0).contains(&alpha) {
        return Err(UndistortionError::InvalidCropParameter(alpha));
    }
    if size.width == 0 || size.height == 0 {
        return Err(UndistortionError::InvalidMapSize(size.width, size.height));
    }

    let ((ix0, iy0, ix1, iy1), (ox0, oy0, ox1, oy1)) =
        undistorted_rectangles(intrinsic, distortion, size);

    let cx = (size.width as f64 - 1.0) * 0.5;
    let cy = (size.height as f64 - 1.0) * 0.5;
    let (cx0, cy0) = (intrinsic.cx, intrinsic.cy);

    // smallest focal scale at which the centered view still lies inside the
    // all-valid rectangle
    let s0 = (cx / (cx0 - ix0))
        .max(cy / (cy0 - iy0))
        .max(cx / (ix1 - cx0))
        .max(cy / (iy1 - cy0));

    // largest focal scale at which the centered view still covers the full
    // undistorted extent
    let s1 = (cx / (cx0 - ox0))
        .min(cy / (cy0 - oy0))
        .min(cx / (ox1 - cx0))
        .min(cy / (oy1 - cy0));

    let s = s0 * (1.0 - alpha) + s1 * alpha;

    Ok(CameraIntrinsic {
        fx: intrinsic.fx * s,
        fy: intrinsic.fy * s,
        cx,
        cy,
    })
}

/// Generate the undistortion remap table for a polynomial distortion model.
///
/// For every destination pixel the table stores the source coordinate
/// obtained by normalizing through `new_intrinsic`, applying the forward
/// distortion polynomial and mapping back through `intrinsic`.
///
/// # Arguments
///
/// * `intrinsic` - The intrinsic parameters of the distorted source view
/// * `new_intrinsic` - The intrinsic parameters of the rectified view
/// * `distortion` - The distortion parameters of the camera
/// * `size` - The destination resolution
pub fn generate_undistortion_map(
    intrinsic: &CameraIntrinsic,
    new_intrinsic: &CameraIntrinsic,
    distortion: &PolynomialDistortion,
    size: ImageSize,
) -> Result<UndistortionMap, UndistortionError> {
    if size.width == 0 || size.height == 0 {
        return Err(UndistortionError::InvalidMapSize(size.width, size.height));
    }

    let cols = size.width;
    let mut map_x = vec![0f32; cols * size.height];
    let mut map_y = vec![0f32; cols * size.height];

    map_x
        .par_chunks_exact_mut(cols)
        .zip(map_y.par_chunks_exact_mut(cols))
        .enumerate()
        .for_each(|(v, (row_x, row_y))| {
            for (u, (mx, my)) in row_x.iter_mut().zip(row_y.iter_mut()).enumerate() {
                let (xsrc, ysrc) = distort_point_polynomial(
                    u as f64,
                    v as f64,
                    intrinsic,
                    new_intrinsic,
                    distortion,
                );
                *mx = xsrc as f32;
                *my = ysrc as f32;
            }
        });

    Ok(UndistortionMap {
        map_x,
        map_y,
        size,
    })
}
