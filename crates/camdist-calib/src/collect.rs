use camdist_image::{Image, ImageSize};
use rayon::prelude::*;

use crate::cancel::CancelToken;
use crate::detector::PatternDetector;
use crate::error::CalibError;
use crate::observer::CollectObserver;
use crate::pattern::CalibrationPattern;
use crate::{Pt2, Pt3};

/// A named grayscale frame submitted for pattern detection.
pub struct GrayFrame {
    /// Identifier used in progress reports and errors, typically a file name.
    pub name: String,
    /// The grayscale pixel data.
    pub image: Image<u8, 1>,
}

/// The detected pattern corners of a single accepted view.
#[derive(Clone, Debug)]
pub struct DetectedView {
    /// Identifier of the source frame.
    pub name: String,
    /// Refined pixel coordinates, one per pattern corner in reference order.
    pub image_points: Vec<Pt2>,
}

/// Point correspondences accumulated over the accepted views.
#[derive(Clone, Debug)]
pub struct Correspondences {
    /// Reference coordinates of the pattern corners, shared by all views.
    pub object_points: Vec<Pt3>,
    /// The accepted views, in input order.
    pub views: Vec<DetectedView>,
    /// The common pixel resolution of the calibration images.
    pub resolution: ImageSize,
}

/// Tally of the collection phase.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CollectStats {
    /// Views in which the pattern was found and refined.
    pub accepted: usize,
    /// Views skipped because the pattern was not found.
    pub skipped: usize,
}

/// Detect the calibration pattern in each frame and gather correspondences.
///
/// Frames are processed in parallel; accepted views and observer events are
/// reported in input order. Frames where the pattern is not found are
/// skipped, which is an error only when it leaves no accepted view at all.
///
/// # Errors
///
/// * [`CalibError::ResolutionMismatch`] when the frames do not share a
///   common pixel resolution.
/// * [`CalibError::NoValidCalibrationData`] when no frame yields the
///   pattern.
/// * [`CalibError::Cancelled`] when `cancel` fires before the result is
///   assembled.
pub fn collect_correspondences(
    frames: &[GrayFrame],
    pattern: &CalibrationPattern,
    detector: &dyn PatternDetector,
    observer: &dyn CollectObserver,
    cancel: &CancelToken,
) -> Result<(Correspondences, CollectStats), CalibError> {
    if frames.is_empty() {
        return Err(CalibError::NoValidCalibrationData);
    }

    let resolution = frames[0].image.size();
    for frame in frames {
        if frame.image.size() != resolution {
            return Err(CalibError::ResolutionMismatch {
                image: frame.name.clone(),
                got: frame.image.size(),
                expected: resolution,
            });
        }
    }

    if cancel.is_cancelled() {
        return Err(CalibError::Cancelled);
    }

    // Detection dominates the runtime; each frame is independent. The
    // indexed iterator keeps the merged results in input order.
    let detections: Vec<Result<DetectedView, CalibError>> = frames
        .par_iter()
        .map(|frame| {
            if cancel.is_cancelled() {
                return Err(CalibError::Cancelled);
            }
            detect_view(frame, pattern, detector)
        })
        .collect();

    if cancel.is_cancelled() {
        return Err(CalibError::Cancelled);
    }

    let mut views = Vec::with_capacity(frames.len());
    let mut stats = CollectStats::default();
    for detection in detections {
        match detection {
            Ok(view) => {
                observer.pattern_found(&view.name, view.image_points.len());
                stats.accepted += 1;
                views.push(view);
            }
            Err(CalibError::PatternNotFound(name)) => {
                observer.pattern_not_found(&name);
                stats.skipped += 1;
            }
            Err(e) => return Err(e),
        }
    }

    if views.is_empty() {
        return Err(CalibError::NoValidCalibrationData);
    }

    Ok((
        Correspondences {
            object_points: pattern.reference_points(),
            views,
            resolution,
        },
        stats,
    ))
}

fn detect_view(
    frame: &GrayFrame,
    pattern: &CalibrationPattern,
    detector: &dyn PatternDetector,
) -> Result<DetectedView, CalibError> {
    let mut corners = detector
        .detect(&frame.image, pattern)
        .ok_or_else(|| CalibError::PatternNotFound(frame.name.clone()))?;

    // A detection with the wrong corner count cannot be matched against the
    // reference points and is treated the same as a missed pattern.
    if corners.len() != pattern.num_points() {
        return Err(CalibError::PatternNotFound(frame.name.clone()));
    }

    detector.refine(&frame.image, &mut corners);

    Ok(DetectedView {
        name: frame.name.clone(),
        image_points: corners,
    })
}
