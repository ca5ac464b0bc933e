#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

#[doc(inline)]
pub use camdist_calib as calib;

#[doc(inline)]
pub use camdist_image as image;

#[doc(inline)]
pub use camdist_imgproc as imgproc;

#[doc(inline)]
pub use camdist_io as io;

/// end to end calibration and rectification pipelines.
pub mod pipeline;
