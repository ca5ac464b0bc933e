use camdist_image::ImageSize;

/// An error type for the calibration module.
#[derive(thiserror::Error, Debug)]
pub enum CalibError {
    /// No calibration pattern was found in an image. Recovered per image
    /// during collection: the image is skipped and processing continues.
    #[error("no calibration pattern found in image '{0}'")]
    PatternNotFound(String),

    /// None of the calibration images yielded point correspondences.
    #[error("none of the calibration images contained a recognizable calibration pattern")]
    NoValidCalibrationData,

    /// The numerical optimization failed to converge. No partial model is
    /// produced.
    #[error("calibration solver failed to converge: {0}")]
    SolverDivergence(String),

    /// The calibration images do not share a common pixel resolution.
    #[error("calibration image '{image}' has resolution {got}, expected {expected}")]
    ResolutionMismatch {
        /// The offending image.
        image: String,
        /// The resolution of the offending image.
        got: ImageSize,
        /// The resolution of the preceding images.
        expected: ImageSize,
    },

    /// The parameter file contains a field outside the known schema.
    #[error("unknown field '{0}' in camera parameter file")]
    UnknownField(String),

    /// The parameter file lacks a field of the known schema.
    #[error("missing field '{0}' in camera parameter file")]
    MissingField(String),

    /// The parameter file content does not form a valid normalized model.
    #[error("invalid camera parameter file: {0}")]
    InvalidModel(String),

    /// The operation was cancelled through its [`crate::CancelToken`].
    #[error("operation cancelled")]
    Cancelled,

    /// Error accessing the parameter file.
    #[error("failed to access the parameter file. {0}")]
    Io(#[from] std::io::Error),

    /// Error parsing the parameter file.
    #[error("failed to parse the parameter file. {0}")]
    Json(#[from] serde_json::Error),
}
