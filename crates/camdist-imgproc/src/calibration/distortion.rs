use super::{CameraIntrinsic, PolynomialDistortion};

/// Apply the forward radial + tangential distortion polynomial to a point in
/// normalized camera coordinates.
///
/// # Arguments
///
/// * `x` - The x coordinate of the normalized point
/// * `y` - The y coordinate of the normalized point
/// * `distortion` - The distortion parameters of the camera
///
/// # Returns
///
/// The distorted point in normalized camera coordinates.
pub fn distort_normalized(x: f64, y: f64, distortion: &PolynomialDistortion) -> (f64, f64) {
    let (k1, k2, p1, p2, k3) = (
        distortion.k1,
        distortion.k2,
        distortion.p1,
        distortion.p2,
        distortion.k3,
    );

    let r2 = x * x + y * y;

    // radial distortion
    let kr = 1.0 + k1 * r2 + k2 * r2 * r2 + k3 * r2 * r2 * r2;

    // tangential distortion
    let xd = x * kr + 2.0 * p1 * x * y + p2 * (r2 + 2.0 * x * x);
    let yd = y * kr + p1 * (r2 + 2.0 * y * y) + 2.0 * p2 * x * y;

    (xd, yd)
}

/// Distort a destination pixel through the polynomial model.
///
/// The pixel is first normalized through `new_intrinsic` (the camera matrix
/// of the undistorted, destination view), then distorted, then mapped back
/// to pixel space through `intrinsic` (the camera matrix of the distorted
/// source view). With `new_intrinsic == intrinsic` this is plain forward
/// distortion of a pixel.
///
/// # Arguments
///
/// * `x` - The x coordinate of the destination pixel
/// * `y` - The y coordinate of the destination pixel
/// * `intrinsic` - The intrinsic parameters of the distorted source view
/// * `new_intrinsic` - The intrinsic parameters of the destination view
/// * `distortion` - The distortion parameters of the camera
///
/// # Returns
///
/// The source pixel coordinate that the destination pixel samples from.
pub fn distort_point_polynomial(
    x: f64,
    y: f64,
    intrinsic: &CameraIntrinsic,
    new_intrinsic: &CameraIntrinsic,
    distortion: &PolynomialDistortion,
) -> (f64, f64) {
    // normalize the coordinates through the destination view
    let xn = (x - new_intrinsic.cx) / new_intrinsic.fx;
    let yn = (y - new_intrinsic.cy) / new_intrinsic.fy;

    let (xd, yd) = distort_normalized(xn, yn, distortion);

    // denormalize the coordinates through the source view
    let xdst = intrinsic.fx * xd + intrinsic.cx;
    let ydst = intrinsic.fy * yd + intrinsic.cy;

    (xdst, ydst)
}

/// Undistort a source pixel through the polynomial model.
///
/// Inverts the forward distortion with a fixed-point compensation loop and
/// reprojects the ideal point through the same intrinsic matrix, so the
/// result is the pixel position the point would have on an undistorted
/// sensor with identical intrinsics.
///
/// # Arguments
///
/// * `x` - The x coordinate of the distorted pixel
/// * `y` - The y coordinate of the distorted pixel
/// * `intrinsic` - The intrinsic parameters of the camera
/// * `distortion` - The distortion parameters of the camera
///
/// # Returns
///
/// The undistorted pixel coordinate.
pub fn undistort_point_polynomial(
    x: f64,
    y: f64,
    intrinsic: &CameraIntrinsic,
    distortion: &PolynomialDistortion,
) -> (f64, f64) {
    let (k1, k2, p1, p2, k3) = (
        distortion.k1,
        distortion.k2,
        distortion.p1,
        distortion.p2,
        distortion.k3,
    );

    let x_distorted = (x - intrinsic.cx) / intrinsic.fx;
    let y_distorted = (y - intrinsic.cy) / intrinsic.fy;

    // iteratively compensate the distortion terms
    let mut xu = x_distorted;
    let mut yu = y_distorted;

    for _ in 0..5 {
        let r2 = xu * xu + yu * yu;
        let kr = 1.0 + k1 * r2 + k2 * r2 * r2 + k3 * r2 * r2 * r2;
        let d_tan_x = 2.0 * p1 * xu * yu + p2 * (r2 + 2.0 * xu * xu);
        let d_tan_y = p1 * (r2 + 2.0 * yu * yu) + 2.0 * p2 * xu * yu;

        xu = (x_distorted - d_tan_x) / kr;
        yu = (y_distorted - d_tan_y) / kr;
    }

    (
        intrinsic.fx * xu + intrinsic.cx,
        intrinsic.fy * yu + intrinsic.cy,
    )
}
