use std::path::{Path, PathBuf};

use camdist_calib::{
    calibrate, collect_correspondences, CalibrationPattern, CalibrationResult, CameraModel,
    CancelToken, CollectObserver, CollectStats, GrayFrame, PatternDetector,
};
use camdist_io::functional::read_image_gray8;

use super::PipelineError;

/// Output of a full calibration run.
pub struct CalibrationSummary {
    /// The resolution independent camera model.
    pub model: CameraModel,
    /// The raw solver output at the calibration resolution.
    pub result: CalibrationResult,
    /// How many images were accepted and skipped during collection.
    pub stats: CollectStats,
    /// How many supported images the folder contained.
    pub images_found: usize,
    /// Where the parameter file was written.
    pub parameter_file: PathBuf,
}

const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Calibrate a camera from a folder of pattern images.
///
/// Loads every supported image in `images_dir` in file name order,
/// collects pattern correspondences with `detector`, solves for the
/// camera parameters and folds them into a resolution independent
/// [`CameraModel`] named `camera_name`.
///
/// Images where the pattern is not found are skipped with a report to
/// `observer`; the run fails only when no image yields the pattern. On
/// success the parameter file is written into `images_dir` as
/// `<camera_name>.json`.
pub fn calibrate_image_folder(
    images_dir: impl AsRef<Path>,
    pattern: &CalibrationPattern,
    camera_name: &str,
    detector: &dyn PatternDetector,
    observer: &dyn CollectObserver,
    cancel: &CancelToken,
) -> Result<CalibrationSummary, PipelineError> {
    let images_dir = images_dir.as_ref();
    let paths = list_images(images_dir)?;
    if paths.is_empty() {
        return Err(PipelineError::NoInputImages(images_dir.to_path_buf()));
    }
    log::info!(
        "calibrating '{camera_name}' from {} images in {}",
        paths.len(),
        images_dir.display()
    );

    let mut frames = Vec::with_capacity(paths.len());
    for path in &paths {
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        frames.push(GrayFrame {
            name,
            image: read_image_gray8(path)?,
        });
    }

    let (correspondences, stats) =
        collect_correspondences(&frames, pattern, detector, observer, cancel)?;
    let result = calibrate(&correspondences, cancel)?;

    let model = CameraModel::from_calibration(
        camera_name,
        &result.intrinsic,
        &result.distortion,
        correspondences.resolution,
    );
    let parameter_file = save_camera_model(&model, images_dir)?;
    log::info!("wrote {}", parameter_file.display());

    Ok(CalibrationSummary {
        model,
        result,
        stats,
        images_found: paths.len(),
        parameter_file,
    })
}

/// Write the parameter file of a model into `dir` as `<camera_name>.json`.
///
/// The write goes through [`CameraModel::save`], which renames a
/// temporary file into place.
///
/// # Returns
///
/// The path of the written parameter file.
pub fn save_camera_model(
    model: &CameraModel,
    dir: impl AsRef<Path>,
) -> Result<PathBuf, PipelineError> {
    let path = dir.as_ref().join(format!("{}.json", model.camera_name));
    model.save(&path)?;
    Ok(path)
}

/// The supported images of a folder, sorted by file name.
fn list_images(dir: &Path) -> Result<Vec<PathBuf>, PipelineError> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let supported = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()));
        if supported {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}
