//! End to end pipelines: calibrate a camera from an image folder and
//! rectify images or video streams with the resulting model.

mod calibrate;
mod rectify;

pub use calibrate::{calibrate_image_folder, save_camera_model, CalibrationSummary};
pub use rectify::{
    rectify_files, rectify_video, undistorted_output_path, Rectifier, RectifyStats,
};

use camdist_calib::CalibError;
use camdist_image::ImageError;
use camdist_imgproc::calibration::undistort::UndistortionError;
use camdist_io::IoError;

/// An error type for the pipeline module.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    /// Error during calibration.
    #[error(transparent)]
    Calib(#[from] CalibError),

    /// Error creating an image buffer.
    #[error(transparent)]
    Image(#[from] ImageError),

    /// Error generating the undistortion map.
    #[error(transparent)]
    Undistortion(#[from] UndistortionError),

    /// Error reading or writing image or video data.
    #[error(transparent)]
    Io(#[from] IoError),

    /// Error accessing the file system.
    #[error("Failed to access the file system. {0}")]
    File(#[from] std::io::Error),

    /// No calibration images were found in the input folder.
    #[error("no calibration images found in '{0}'")]
    NoInputImages(std::path::PathBuf),

    /// The operation was cancelled.
    #[error("operation cancelled")]
    Cancelled,
}
