use crate::Pt3;

/// Geometry of a planar calibration pattern.
///
/// # Fields
///
/// * `width` - The number of inner corners along the horizontal axis
/// * `height` - The number of inner corners along the vertical axis
/// * `size` - The physical spacing between neighboring corners
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CalibrationPattern {
    /// The number of inner corners along the horizontal axis
    pub width: usize,
    /// The number of inner corners along the vertical axis
    pub height: usize,
    /// The physical spacing between neighboring corners
    pub size: f64,
}

impl CalibrationPattern {
    /// Create a pattern description.
    pub fn new(width: usize, height: usize, size: f64) -> Self {
        Self {
            width,
            height,
            size,
        }
    }

    /// The total number of pattern corners.
    pub fn num_points(&self) -> usize {
        self.width * self.height
    }

    /// The reference coordinates of the pattern corners on the `z = 0` plane.
    ///
    /// Points are laid out row-major (`y` outer, `x` inner) with spacing
    /// `size`, matching the corner ordering convention of pattern detectors:
    /// reference point `i` corresponds to detected corner `i`.
    pub fn reference_points(&self) -> Vec<Pt3> {
        let mut points = Vec::with_capacity(self.num_points());
        for y in 0..self.height {
            for x in 0..self.width {
                points.push(Pt3::new(x as f64 * self.size, y as f64 * self.size, 0.0));
            }
        }
        points
    }
}
