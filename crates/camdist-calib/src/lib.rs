#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// cooperative cancellation.
pub mod cancel;
pub use cancel::CancelToken;

/// correspondence collection from calibration images.
pub mod collect;
pub use collect::{collect_correspondences, CollectStats, Correspondences, DetectedView, GrayFrame};

/// pattern detection interface.
pub mod detector;
pub use detector::PatternDetector;

/// calibration error types.
pub mod error;
pub use error::CalibError;

/// camera model with normalized intrinsics and persistence.
pub mod model;
pub use model::CameraModel;

/// collection progress observers.
pub mod observer;
pub use observer::{CollectObserver, LogObserver, NullObserver};

/// planar calibration pattern geometry.
pub mod pattern;
pub use pattern::CalibrationPattern;

/// the calibration solver.
pub mod solver;
pub use solver::{calibrate, CalibrationResult};

/// A 2D point in pixel coordinates.
pub type Pt2 = nalgebra::Point2<f64>;

/// A 3D point in pattern coordinates.
pub type Pt3 = nalgebra::Point3<f64>;

/// A 3x3 matrix of f64.
pub type Mat3 = nalgebra::Matrix3<f64>;
