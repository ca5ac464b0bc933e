use nalgebra::Vector3;

use crate::error::CalibError;
use crate::Mat3;

/// Rotation matrix from an axis-angle vector (Rodrigues formula).
pub(crate) fn rotation_from_rvec(rvec: &Vector3<f64>) -> Mat3 {
    let theta = rvec.norm();
    let w = skew(rvec);
    if theta < 1e-12 {
        return Mat3::identity() + w;
    }
    Mat3::identity() + (theta.sin() / theta) * w + ((1.0 - theta.cos()) / theta.powi(2)) * (w * w)
}

/// Axis-angle vector of a rotation matrix.
pub(crate) fn rvec_from_rotation(r: &Mat3) -> Vector3<f64> {
    let cos_theta = ((r.trace() - 1.0) * 0.5).clamp(-1.0, 1.0);
    let theta = cos_theta.acos();
    let axis_raw = Vector3::new(
        r[(2, 1)] - r[(1, 2)],
        r[(0, 2)] - r[(2, 0)],
        r[(1, 0)] - r[(0, 1)],
    );

    if theta < 1e-12 {
        return 0.5 * axis_raw;
    }

    let sin_theta = theta.sin();
    if sin_theta.abs() > 1e-6 {
        return (theta / (2.0 * sin_theta)) * axis_raw;
    }

    // theta near pi: the antisymmetric part vanishes, recover the axis from
    // the diagonal of R = I + 2 aa^T - ... instead.
    let mut axis = Vector3::new(
        ((r[(0, 0)] + 1.0) * 0.5).max(0.0).sqrt(),
        ((r[(1, 1)] + 1.0) * 0.5).max(0.0).sqrt(),
        ((r[(2, 2)] + 1.0) * 0.5).max(0.0).sqrt(),
    );
    if r[(0, 1)] + r[(1, 0)] < 0.0 {
        axis.y = -axis.y;
    }
    if r[(0, 2)] + r[(2, 0)] < 0.0 {
        axis.z = -axis.z;
    }
    theta * axis.normalize()
}

fn skew(v: &Vector3<f64>) -> Mat3 {
    Mat3::new(0.0, -v.z, v.y, v.z, 0.0, -v.x, -v.y, v.x, 0.0)
}

/// Decompose a plane induced homography into a camera pose.
///
/// Assumes the calibration target lies on the `z = 0` plane of its own
/// frame and `H` maps target plane coordinates to pixels under intrinsics
/// `K`. The sign of `H` is chosen so the target sits in front of the
/// camera, and the rotation estimate is projected onto SO(3).
pub(crate) fn pose_from_homography(
    kmtx: &Mat3,
    hmtx: &Mat3,
) -> Result<(Vector3<f64>, Vector3<f64>), CalibError> {
    let k_inv = kmtx.try_inverse().ok_or_else(|| {
        CalibError::SolverDivergence("intrinsic matrix is not invertible".to_string())
    })?;

    let k_inv_h1 = k_inv * hmtx.column(0);
    let k_inv_h2 = k_inv * hmtx.column(1);
    let k_inv_h3 = k_inv * hmtx.column(2);

    let norm1 = k_inv_h1.norm();
    let norm2 = k_inv_h2.norm();
    if norm1 < f64::EPSILON || norm2 < f64::EPSILON {
        return Err(CalibError::SolverDivergence(
            "degenerate homography decomposition".to_string(),
        ));
    }
    let mut lambda = 2.0 / (norm1 + norm2);

    // The homography sign is arbitrary; the target must be in front of the
    // camera.
    if (lambda * k_inv_h3).z < 0.0 {
        lambda = -lambda;
    }

    let r1 = lambda * k_inv_h1;
    let r2 = lambda * k_inv_h2;
    let r3 = r1.cross(&r2);
    let t = lambda * k_inv_h3;

    let mut r_mat = Mat3::zeros();
    r_mat.set_column(0, &r1);
    r_mat.set_column(1, &r2);
    r_mat.set_column(2, &r3);

    // Project onto SO(3) (polar decomposition via SVD).
    let svd = r_mat.svd(true, true);
    let (u, v_t) = match (svd.u, svd.v_t) {
        (Some(u), Some(v_t)) => (u, v_t),
        _ => {
            return Err(CalibError::SolverDivergence(
                "svd failed on rotation estimate".to_string(),
            ))
        }
    };
    let mut r_orth = u * v_t;
    if r_orth.determinant() < 0.0 {
        let mut u_flipped = u;
        u_flipped.column_mut(2).neg_mut();
        r_orth = u_flipped * v_t;
    }

    Ok((rvec_from_rotation(&r_orth), t))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn rodrigues_roundtrip() {
        for rvec in [
            Vector3::new(0.1, -0.2, 0.3),
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(1.5, 0.5, -0.7),
            Vector3::new(0.0, 0.0, 1e-9),
        ] {
            let r = rotation_from_rvec(&rvec);
            let back = rvec_from_rotation(&r);
            assert_relative_eq!(back.x, rvec.x, epsilon = 1e-9);
            assert_relative_eq!(back.y, rvec.y, epsilon = 1e-9);
            assert_relative_eq!(back.z, rvec.z, epsilon = 1e-9);
        }
    }

    #[test]
    fn rotation_is_orthonormal() {
        let r = rotation_from_rvec(&Vector3::new(0.3, -0.1, 0.25));
        let should_be_identity = r.transpose() * r;
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_relative_eq!(should_be_identity[(i, j)], expected, epsilon = 1e-12);
            }
        }
        assert_relative_eq!(r.determinant(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn recovers_pose_from_exact_homography() {
        let kmtx = Mat3::new(800.0, 0.0, 320.0, 0.0, 780.0, 240.0, 0.0, 0.0, 1.0);
        let rvec_gt = Vector3::new(0.1, -0.05, 0.2);
        let t_gt = Vector3::new(0.1, -0.05, 1.0);

        // For a plane z = 0, H = K [r1 r2 t].
        let r = rotation_from_rvec(&rvec_gt);
        let mut h = Mat3::zeros();
        h.set_column(0, &(kmtx * r.column(0)));
        h.set_column(1, &(kmtx * r.column(1)));
        h.set_column(2, &(kmtx * t_gt));

        let (rvec, t) = pose_from_homography(&kmtx, &h).unwrap();
        assert_relative_eq!((rvec - rvec_gt).norm(), 0.0, epsilon = 1e-6);
        assert_relative_eq!((t - t_gt).norm(), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn sign_flip_keeps_target_in_front() {
        let kmtx = Mat3::new(800.0, 0.0, 320.0, 0.0, 780.0, 240.0, 0.0, 0.0, 1.0);
        let rvec_gt = Vector3::new(0.05, 0.1, -0.15);
        let t_gt = Vector3::new(-0.2, 0.1, 1.5);

        let r = rotation_from_rvec(&rvec_gt);
        let mut h = Mat3::zeros();
        h.set_column(0, &(kmtx * r.column(0)));
        h.set_column(1, &(kmtx * r.column(1)));
        h.set_column(2, &(kmtx * t_gt));
        h = -h;

        let (_, t) = pose_from_homography(&kmtx, &h).unwrap();
        assert!(t.z > 0.0);
    }
}
