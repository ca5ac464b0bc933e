use nalgebra::DMatrix;

use crate::error::CalibError;
use crate::{Mat3, Pt2};

/// Hartley normalization for 2D points.
///
/// Centers the points at the origin and scales them so that the mean
/// distance from the origin is `sqrt(2)`, which conditions the DLT system.
/// Returns the normalized points and the similarity `T` such that
/// `p_norm = T * p_homogeneous`.
pub(crate) fn normalize_points_2d(points: &[Pt2]) -> Option<(Vec<Pt2>, Mat3)> {
    if points.is_empty() {
        return None;
    }

    let n = points.len() as f64;
    let (mut cx, mut cy) = (0.0, 0.0);
    for p in points {
        cx += p.x;
        cy += p.y;
    }
    cx /= n;
    cy /= n;

    let mut mean_dist = 0.0;
    for p in points {
        mean_dist += ((p.x - cx).powi(2) + (p.y - cy).powi(2)).sqrt();
    }
    mean_dist /= n;
    if mean_dist < f64::EPSILON {
        return None;
    }

    let s = std::f64::consts::SQRT_2 / mean_dist;
    let t = Mat3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0);

    let normalized = points
        .iter()
        .map(|p| Pt2::new(s * (p.x - cx), s * (p.y - cy)))
        .collect();

    Some((normalized, t))
}

/// Estimate `H` such that `image ~ H * world` with the normalized DLT.
///
/// Needs at least 4 correspondences in general position. The result is
/// scaled so that `H[2,2] = 1`.
pub(crate) fn dlt_homography(world: &[Pt2], image: &[Pt2]) -> Result<Mat3, CalibError> {
    let n = world.len();
    if n < 4 || image.len() != n {
        return Err(CalibError::SolverDivergence(format!(
            "need at least 4 point correspondences for a homography, got {n}"
        )));
    }

    let (world_n, t_w) = normalize_points_2d(world).ok_or_else(degenerate)?;
    let (image_n, t_i) = normalize_points_2d(image).ok_or_else(degenerate)?;

    // With exactly 4 points the 8x9 system has a one dimensional null space
    // but nalgebra's SVD wants at least as many rows as columns; pad with a
    // zero row which does not change the solution.
    let rows = (2 * n).max(9);
    let mut a = DMatrix::<f64>::zeros(rows, 9);

    for (i, (pw, pi)) in world_n.iter().zip(image_n.iter()).enumerate() {
        let (x, y) = (pw.x, pw.y);
        let (u, v) = (pi.x, pi.y);

        let r0 = 2 * i;
        let r1 = 2 * i + 1;

        a[(r0, 0)] = -x;
        a[(r0, 1)] = -y;
        a[(r0, 2)] = -1.0;
        a[(r0, 6)] = u * x;
        a[(r0, 7)] = u * y;
        a[(r0, 8)] = u;

        a[(r1, 3)] = -x;
        a[(r1, 4)] = -y;
        a[(r1, 5)] = -1.0;
        a[(r1, 6)] = v * x;
        a[(r1, 7)] = v * y;
        a[(r1, 8)] = v;
    }

    // Null vector of A: row of V^T for the smallest singular value.
    let svd = a.svd(false, true);
    let v_t = svd.v_t.ok_or_else(|| {
        CalibError::SolverDivergence("svd failed on homography system".to_string())
    })?;
    let h = v_t.row(v_t.nrows() - 1);

    let mut h_norm = Mat3::zeros();
    for r in 0..3 {
        for c in 0..3 {
            h_norm[(r, c)] = h[3 * r + c];
        }
    }

    // Undo the conditioning transforms.
    let t_i_inv = t_i.try_inverse().ok_or_else(degenerate)?;
    let mut h_mat = t_i_inv * h_norm * t_w;

    let scale = h_mat[(2, 2)];
    if scale.abs() < f64::EPSILON {
        return Err(degenerate());
    }
    h_mat /= scale;

    Ok(h_mat)
}

fn degenerate() -> CalibError {
    CalibError::SolverDivergence("degenerate point configuration for a homography".to_string())
}
