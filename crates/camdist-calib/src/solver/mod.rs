//! Intrinsic calibration solver.
//!
//! Estimates the pinhole intrinsics and polynomial distortion coefficients
//! of a camera from planar point correspondences: per view homographies
//! give a closed form initial guess, which a Levenberg-Marquardt pass then
//! refines over all views jointly by minimizing the reprojection error.

mod homography;
mod intrinsics;
mod pose;
mod projection;
mod refine;

use camdist_imgproc::calibration::{CameraIntrinsic, PolynomialDistortion};
use nalgebra::{DVector, Vector3};

use crate::cancel::CancelToken;
use crate::collect::Correspondences;
use crate::error::CalibError;
use crate::{Mat3, Pt2};

pub use refine::SolveReport;

use projection::ViewParams;
use refine::{NllsProblem, SolveOptions};

/// The estimated camera parameters and solve diagnostics.
#[derive(Clone, Copy, Debug)]
pub struct CalibrationResult {
    /// The refined pinhole intrinsics, in pixels of the calibration
    /// resolution.
    pub intrinsic: CameraIntrinsic,
    /// The refined distortion coefficients.
    pub distortion: PolynomialDistortion,
    /// Mean reprojection error in pixels: the per view mean point error,
    /// averaged over the views.
    pub reprojection_error: f64,
    /// Diagnostics of the refinement.
    pub report: SolveReport,
}

// Parameter vector layout: [fx, fy, cx, cy, k1, k2, p1, p2, k3] followed by
// [rvec, tvec] per view.
const NUM_SHARED: usize = 9;
const NUM_PER_VIEW: usize = 6;

struct ReprojectionProblem<'a> {
    correspondences: &'a Correspondences,
}

impl ReprojectionProblem<'_> {
    fn unpack(params: &DVector<f64>, view: usize) -> ViewParams {
        let o = NUM_SHARED + NUM_PER_VIEW * view;
        ViewParams {
            fx: params[0],
            fy: params[1],
            cx: params[2],
            cy: params[3],
            distortion: PolynomialDistortion::from_coeffs(&[
                params[4], params[5], params[6], params[7], params[8],
            ]),
            rvec: Vector3::new(params[o], params[o + 1], params[o + 2]),
            tvec: Vector3::new(params[o + 3], params[o + 4], params[o + 5]),
        }
    }
}

impl NllsProblem for ReprojectionProblem<'_> {
    fn num_residuals(&self) -> usize {
        2 * self.correspondences.object_points.len() * self.correspondences.views.len()
    }

    fn residuals(&self, params: &DVector<f64>, out: &mut DVector<f64>) {
        let object = &self.correspondences.object_points;
        let mut projected = Vec::with_capacity(object.len());
        let mut r = 0;
        for (v, view) in self.correspondences.views.iter().enumerate() {
            let view_params = Self::unpack(params, v);
            projection::project_view(&view_params, object, &mut projected);
            for (p, q) in projected.iter().zip(view.image_points.iter()) {
                out[r] = p.x - q.x;
                out[r + 1] = p.y - q.y;
                r += 2;
            }
        }
    }
}

/// Calibrate a camera from collected correspondences.
///
/// Estimates per view homographies, derives a closed form initial guess
/// for the intrinsics and poses, and refines everything jointly with
/// Levenberg-Marquardt. Distortion coefficients start at zero.
///
/// # Errors
///
/// * [`CalibError::NoValidCalibrationData`] when there are no views.
/// * [`CalibError::SolverDivergence`] when no converging solution exists;
///   no partial model is produced.
/// * [`CalibError::Cancelled`] when `cancel` fires during the solve.
pub fn calibrate(
    correspondences: &Correspondences,
    cancel: &CancelToken,
) -> Result<CalibrationResult, CalibError> {
    calibrate_with_options(correspondences, &SolveOptions::default(), cancel)
}

fn calibrate_with_options(
    correspondences: &Correspondences,
    options: &SolveOptions,
    cancel: &CancelToken,
) -> Result<CalibrationResult, CalibError> {
    if correspondences.views.is_empty() {
        return Err(CalibError::NoValidCalibrationData);
    }

    // The pattern lies on its z = 0 plane, so each view is a homography
    // between plane and image coordinates.
    let plane: Vec<Pt2> = correspondences
        .object_points
        .iter()
        .map(|p| Pt2::new(p.x, p.y))
        .collect();

    let mut homographies = Vec::with_capacity(correspondences.views.len());
    for view in &correspondences.views {
        if cancel.is_cancelled() {
            return Err(CalibError::Cancelled);
        }
        homographies.push(homography::dlt_homography(&plane, &view.image_points)?);
    }

    let intrinsic0 = intrinsics::init_intrinsic(&homographies, correspondences.resolution)?;
    log::debug!(
        "initial intrinsic guess: fx={:.2} fy={:.2} cx={:.2} cy={:.2}",
        intrinsic0.fx,
        intrinsic0.fy,
        intrinsic0.cx,
        intrinsic0.cy
    );

    let kmtx = Mat3::new(
        intrinsic0.fx,
        0.0,
        intrinsic0.cx,
        0.0,
        intrinsic0.fy,
        intrinsic0.cy,
        0.0,
        0.0,
        1.0,
    );

    let mut params = DVector::zeros(NUM_SHARED + NUM_PER_VIEW * correspondences.views.len());
    params[0] = intrinsic0.fx;
    params[1] = intrinsic0.fy;
    params[2] = intrinsic0.cx;
    params[3] = intrinsic0.cy;
    // distortion coefficients start at zero

    for (v, h) in homographies.iter().enumerate() {
        let (rvec, tvec) = pose::pose_from_homography(&kmtx, h)?;
        let o = NUM_SHARED + NUM_PER_VIEW * v;
        params[o] = rvec.x;
        params[o + 1] = rvec.y;
        params[o + 2] = rvec.z;
        params[o + 3] = tvec.x;
        params[o + 4] = tvec.y;
        params[o + 5] = tvec.z;
    }

    let problem = ReprojectionProblem { correspondences };
    let (params, report) = refine::solve_lm(&problem, params, options, cancel)?;

    let intrinsic = CameraIntrinsic {
        fx: params[0],
        fy: params[1],
        cx: params[2],
        cy: params[3],
    };
    let distortion = PolynomialDistortion::from_coeffs(&[
        params[4], params[5], params[6], params[7], params[8],
    ]);

    let reprojection_error = mean_reprojection_error(&problem, &params);
    log::info!(
        "calibration converged after {} iterations, reprojection error {:.4} px",
        report.iterations,
        reprojection_error
    );

    Ok(CalibrationResult {
        intrinsic,
        distortion,
        reprojection_error,
        report,
    })
}

/// Mean over the views of the mean per point pixel error.
fn mean_reprojection_error(problem: &ReprojectionProblem<'_>, params: &DVector<f64>) -> f64 {
    let correspondences = problem.correspondences;
    let object = &correspondences.object_points;
    let mut projected = Vec::with_capacity(object.len());

    let mut total = 0.0;
    for (v, view) in correspondences.views.iter().enumerate() {
        let view_params = ReprojectionProblem::unpack(params, v);
        projection::project_view(&view_params, object, &mut projected);

        let mut view_error = 0.0;
        for (p, q) in projected.iter().zip(view.image_points.iter()) {
            view_error += ((p.x - q.x).powi(2) + (p.y - q.y).powi(2)).sqrt();
        }
        total += view_error / object.len() as f64;
    }
    total / correspondences.views.len() as f64
}
