//! Pixel interpolation methods for image rectification.
//!
//! Sampling happens at the fractional source coordinates stored in an
//! undistortion map; out-of-bounds samples resolve to a caller-supplied
//! border value.

mod bilinear;
mod remap;

pub use bilinear::bilinear_interpolation;
pub use remap::remap;
