use camdist_imgproc::calibration::{distortion::distort_normalized, PolynomialDistortion};
use nalgebra::Vector3;

use crate::solver::pose::rotation_from_rvec;
use crate::{Pt2, Pt3};

/// Camera parameters of one view used during refinement.
pub(crate) struct ViewParams {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
    pub distortion: PolynomialDistortion,
    pub rvec: Vector3<f64>,
    pub tvec: Vector3<f64>,
}

/// Project the pattern points of one view to distorted pixel coordinates.
pub(crate) fn project_view(params: &ViewParams, object_points: &[Pt3], out: &mut Vec<Pt2>) {
    out.clear();
    let r = rotation_from_rvec(&params.rvec);
    for p in object_points {
        let pc = r * p.coords + params.tvec;
        let xn = pc.x / pc.z;
        let yn = pc.y / pc.z;
        let (xd, yd) = distort_normalized(xn, yn, &params.distortion);
        out.push(Pt2::new(
            params.fx * xd + params.cx,
            params.fy * yd + params.cy,
        ));
    }
}
