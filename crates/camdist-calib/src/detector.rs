use camdist_image::Image;

use crate::pattern::CalibrationPattern;
use crate::Pt2;

/// Interface to an external pattern detection capability.
///
/// The collector is independent of any particular detection algorithm; a
/// detector locates the pattern corners in a grayscale image and refines
/// them to subpixel precision. Implementations must return corners in the
/// pattern's row-major reference ordering.
pub trait PatternDetector: Send + Sync {
    /// Locate the pattern corners in the image.
    ///
    /// Returns `None` when the pattern is not visible. On success the
    /// returned sequence holds one pixel coordinate per pattern corner, in
    /// reference order.
    fn detect(&self, image: &Image<u8, 1>, pattern: &CalibrationPattern) -> Option<Vec<Pt2>>;

    /// Refine detected corners to subpixel precision in place.
    fn refine(&self, image: &Image<u8, 1>, corners: &mut [Pt2]);
}
