use camdist_image::ImageSize;
use camdist_imgproc::calibration::CameraIntrinsic;
use nalgebra::{DMatrix, DVector, Vector3};

use crate::error::CalibError;
use crate::Mat3;

/// Closed form focal length estimate from plane homographies.
///
/// Fixes the principal point at the image center and solves the absolute
/// conic constraints of each homography for `1/fx^2` and `1/fy^2` by least
/// squares. Each view contributes two equations, so a single view is
/// enough for an initial guess.
pub(crate) fn init_intrinsic(
    homographies: &[Mat3],
    resolution: ImageSize,
) -> Result<CameraIntrinsic, CalibError> {
    if homographies.is_empty() {
        return Err(CalibError::NoValidCalibrationData);
    }

    let cx = (resolution.width as f64 - 1.0) * 0.5;
    let cy = (resolution.height as f64 - 1.0) * 0.5;

    let mut a = DMatrix::<f64>::zeros(2 * homographies.len(), 2);
    let mut b = DVector::<f64>::zeros(2 * homographies.len());

    for (i, h_raw) in homographies.iter().enumerate() {
        // Move the principal point to the origin so the conic constraints
        // only involve the focal lengths.
        let mut h = *h_raw;
        for c in 0..3 {
            h[(0, c)] -= cx * h[(2, c)];
            h[(1, c)] -= cy * h[(2, c)];
        }

        let h1 = h.column(0).into_owned();
        let h2 = h.column(1).into_owned();
        let d1: Vector3<f64> = (h1 + h2) * 0.5;
        let d2: Vector3<f64> = (h1 - h2) * 0.5;

        // h1 _|_ h2 and d1 _|_ d2 (that is |h1| = |h2|) under the metric
        // diag(1/fx^2, 1/fy^2, 1).
        a[(2 * i, 0)] = h1.x * h2.x;
        a[(2 * i, 1)] = h1.y * h2.y;
        b[2 * i] = -h1.z * h2.z;

        a[(2 * i + 1, 0)] = d1.x * d2.x;
        a[(2 * i + 1, 1)] = d1.y * d2.y;
        b[2 * i + 1] = -d1.z * d2.z;
    }

    let svd = a.svd(true, true);
    let f = svd
        .solve(&b, 1e-12)
        .map_err(|e| CalibError::SolverDivergence(e.to_string()))?;

    if f[0] <= 0.0 || f[1] <= 0.0 {
        return Err(CalibError::SolverDivergence(
            "focal length initialization produced a non physical solution".to_string(),
        ));
    }

    Ok(CameraIntrinsic {
        fx: 1.0 / f[0].sqrt(),
        fy: 1.0 / f[1].sqrt(),
        cx,
        cy,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::pose::rotation_from_rvec;

    fn homography_for_pose(k: &Mat3, rvec: Vector3<f64>, t: Vector3<f64>) -> Mat3 {
        let r = rotation_from_rvec(&rvec);
        let mut h = Mat3::zeros();
        h.set_column(0, &(k * r.column(0)));
        h.set_column(1, &(k * r.column(1)));
        h.set_column(2, &(k * t));
        h / h[(2, 2)]
    }

    #[test]
    fn recovers_focal_lengths_with_centered_principal_point() {
        let resolution = ImageSize {
            width: 641,
            height: 481,
        };
        let k_gt = Mat3::new(700.0, 0.0, 320.0, 0.0, 680.0, 240.0, 0.0, 0.0, 1.0);

        let homographies = vec![
            homography_for_pose(&k_gt, Vector3::new(0.2, 0.1, 0.05), Vector3::new(0.0, 0.0, 1.0)),
            homography_for_pose(&k_gt, Vector3::new(-0.15, 0.25, 0.0), Vector3::new(0.1, -0.1, 1.2)),
            homography_for_pose(&k_gt, Vector3::new(0.1, -0.3, 0.1), Vector3::new(-0.2, 0.05, 0.9)),
        ];

        let k = init_intrinsic(&homographies, resolution).unwrap();
        assert!((k.fx - 700.0).abs() / 700.0 < 0.02, "fx = {}", k.fx);
        assert!((k.fy - 680.0).abs() / 680.0 < 0.02, "fy = {}", k.fy);
        assert_eq!(k.cx, 320.0);
        assert_eq!(k.cy, 240.0);
    }

    #[test]
    fn single_view_is_enough() {
        let resolution = ImageSize {
            width: 641,
            height: 481,
        };
        let k_gt = Mat3::new(700.0, 0.0, 320.0, 0.0, 680.0, 240.0, 0.0, 0.0, 1.0);
        let homographies = vec![homography_for_pose(
            &k_gt,
            Vector3::new(0.3, 0.2, 0.05),
            Vector3::new(0.05, -0.05, 1.0),
        )];

        let k = init_intrinsic(&homographies, resolution).unwrap();
        assert!((k.fx - 700.0).abs() / 700.0 < 0.05, "fx = {}", k.fx);
        assert!((k.fy - 680.0).abs() / 680.0 < 0.05, "fy = {}", k.fy);
    }

    #[test]
    fn no_homographies_is_an_error() {
        let resolution = ImageSize {
            width: 640,
            height: 480,
        };
        assert!(init_intrinsic(&[], resolution).is_err());
    }
}
