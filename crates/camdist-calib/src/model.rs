use std::io::Write;
use std::path::Path;

use camdist_image::ImageSize;
use camdist_imgproc::calibration::{CameraIntrinsic, PolynomialDistortion};
use serde_json::{json, Map, Value};

use crate::error::CalibError;
use crate::Mat3;

/// A calibrated camera in resolution independent form.
///
/// The stored intrinsic matrix is normalized row-wise: the first row is
/// divided by the calibration width and the second row by the calibration
/// height. Scaling back to any pixel resolution is the exact row-wise
/// multiplication by that resolution, so a model calibrated at one
/// resolution applies to any other resolution with the same aspect
/// behavior.
#[derive(Clone, Debug, PartialEq)]
pub struct CameraModel {
    /// Name identifying the camera, used for parameter file naming.
    pub camera_name: String,
    intrinsic_matrix: Mat3,
    distortion_coeffs: [f64; 5],
}

impl CameraModel {
    /// Build a model from calibration output at its native resolution.
    pub fn from_calibration(
        camera_name: impl Into<String>,
        intrinsic: &CameraIntrinsic,
        distortion: &PolynomialDistortion,
        resolution: ImageSize,
    ) -> Self {
        let m = intrinsic.to_matrix();
        let w = resolution.width as f64;
        let h = resolution.height as f64;
        let intrinsic_matrix = Mat3::new(
            m[0][0] / w,
            m[0][1] / w,
            m[0][2] / w,
            m[1][0] / h,
            m[1][1] / h,
            m[1][2] / h,
            m[2][0],
            m[2][1],
            m[2][2],
        );
        Self {
            camera_name: camera_name.into(),
            intrinsic_matrix,
            distortion_coeffs: distortion.coeffs(),
        }
    }

    /// The normalized intrinsic matrix.
    pub fn normalized_intrinsic_matrix(&self) -> &Mat3 {
        &self.intrinsic_matrix
    }

    /// The intrinsic matrix scaled to pixel units of `resolution`.
    pub fn scaled_intrinsic_matrix(&self, resolution: ImageSize) -> Mat3 {
        let w = resolution.width as f64;
        let h = resolution.height as f64;
        let m = &self.intrinsic_matrix;
        Mat3::new(
            m[(0, 0)] * w,
            m[(0, 1)] * w,
            m[(0, 2)] * w,
            m[(1, 0)] * h,
            m[(1, 1)] * h,
            m[(1, 2)] * h,
            m[(2, 0)],
            m[(2, 1)],
            m[(2, 2)],
        )
    }

    /// The pinhole parameters scaled to pixel units of `resolution`.
    pub fn scaled_intrinsic(&self, resolution: ImageSize) -> CameraIntrinsic {
        let m = self.scaled_intrinsic_matrix(resolution);
        CameraIntrinsic {
            fx: m[(0, 0)],
            fy: m[(1, 1)],
            cx: m[(0, 2)],
            cy: m[(1, 2)],
        }
    }

    /// The distortion parameters, which do not depend on the resolution.
    pub fn distortion(&self) -> PolynomialDistortion {
        PolynomialDistortion::from_coeffs(&self.distortion_coeffs)
    }

    /// Serialize the model to its JSON parameter document.
    pub fn to_json(&self) -> Result<String, CalibError> {
        let m = &self.intrinsic_matrix;
        let rows: Vec<Vec<f64>> = (0..3)
            .map(|r| (0..3).map(|c| m[(r, c)]).collect())
            .collect();
        let value = json!({
            "camera_name": self.camera_name,
            "intrinsic_matrix": rows,
            "distortion_coeffs": self.distortion_coeffs,
        });
        Ok(serde_json::to_string_pretty(&value)?)
    }

    /// Parse a model from its JSON parameter document.
    ///
    /// The schema is validated strictly: fields outside the schema are
    /// rejected instead of ignored, so corrupted or foreign files fail
    /// loudly rather than producing a half read model.
    pub fn from_json(json: &str) -> Result<Self, CalibError> {
        let value: Value = serde_json::from_str(json)?;
        let obj = value
            .as_object()
            .ok_or_else(|| CalibError::InvalidModel("document is not an object".to_string()))?;

        for key in obj.keys() {
            if !matches!(
                key.as_str(),
                "camera_name" | "intrinsic_matrix" | "distortion_coeffs"
            ) {
                return Err(CalibError::UnknownField(key.clone()));
            }
        }

        let camera_name = field(obj, "camera_name")?
            .as_str()
            .ok_or_else(|| CalibError::InvalidModel("camera_name is not a string".to_string()))?
            .to_string();

        let intrinsic_matrix = parse_matrix(field(obj, "intrinsic_matrix")?)?;
        let distortion_coeffs = parse_coeffs(field(obj, "distortion_coeffs")?)?;

        Ok(Self {
            camera_name,
            intrinsic_matrix,
            distortion_coeffs,
        })
    }

    /// Write the parameter document to `path`.
    ///
    /// The document goes to a temporary file in the target directory
    /// first and is renamed into place, so readers never observe a
    /// partially written parameter file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), CalibError> {
        let path = path.as_ref();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(self.to_json()?.as_bytes())?;
        tmp.persist(path).map_err(|e| CalibError::Io(e.error))?;
        Ok(())
    }

    /// Read a parameter document from `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CalibError> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }
}

fn field<'a>(obj: &'a Map<String, Value>, name: &str) -> Result<&'a Value, CalibError> {
    obj.get(name)
        .ok_or_else(|| CalibError::MissingField(name.to_string()))
}

fn parse_matrix(value: &Value) -> Result<Mat3, CalibError> {
    let rows = value
        .as_array()
        .filter(|rows| rows.len() == 3)
        .ok_or_else(|| invalid("intrinsic_matrix must be a 3x3 array"))?;

    let mut m = Mat3::zeros();
    for (r, row) in rows.iter().enumerate() {
        let cols = row
            .as_array()
            .filter(|cols| cols.len() == 3)
            .ok_or_else(|| invalid("intrinsic_matrix must be a 3x3 array"))?;
        for (c, v) in cols.iter().enumerate() {
            m[(r, c)] = v
                .as_f64()
                .ok_or_else(|| invalid("intrinsic_matrix entries must be numbers"))?;
        }
    }

    if m[(2, 0)] != 0.0 || m[(2, 1)] != 0.0 || m[(2, 2)] != 1.0 {
        return Err(invalid("intrinsic_matrix bottom row must be [0, 0, 1]"));
    }
    if m[(0, 0)] <= 0.0 || m[(1, 1)] <= 0.0 {
        return Err(invalid("intrinsic_matrix focal lengths must be positive"));
    }

    Ok(m)
}

fn parse_coeffs(value: &Value) -> Result<[f64; 5], CalibError> {
    let values = value
        .as_array()
        .filter(|v| v.len() == 5)
        .ok_or_else(|| invalid("distortion_coeffs must hold 5 numbers"))?;

    let mut coeffs = [0.0; 5];
    for (i, v) in values.iter().enumerate() {
        coeffs[i] = v
            .as_f64()
            .ok_or_else(|| invalid("distortion_coeffs must hold 5 numbers"))?;
    }
    Ok(coeffs)
}

fn invalid(msg: &str) -> CalibError {
    CalibError::InvalidModel(msg.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn model() -> CameraModel {
        CameraModel::from_calibration(
            "front",
            &CameraIntrinsic {
                fx: 620.0,
                fy: 610.0,
                cx: 319.5,
                cy: 239.5,
            },
            &PolynomialDistortion {
                k1: -0.1,
                k2: 0.02,
                p1: 0.001,
                p2: -0.0005,
                k3: 0.003,
            },
            ImageSize {
                width: 640,
                height: 480,
            },
        )
    }

    #[test]
    fn scaling_back_to_native_resolution_is_exact() {
        let model = model();
        let native = model.scaled_intrinsic(ImageSize {
            width: 640,
            height: 480,
        });
        assert_relative_eq!(native.fx, 620.0, epsilon = 1e-12);
        assert_relative_eq!(native.fy, 610.0, epsilon = 1e-12);
        assert_relative_eq!(native.cx, 319.5, epsilon = 1e-12);
        assert_relative_eq!(native.cy, 239.5, epsilon = 1e-12);
    }

    #[test]
    fn scaling_follows_the_resolution_ratio() {
        let model = model();
        let half = model.scaled_intrinsic(ImageSize {
            width: 320,
            height: 240,
        });
        assert_relative_eq!(half.fx, 310.0, epsilon = 1e-12);
        assert_relative_eq!(half.fy, 305.0, epsilon = 1e-12);
        assert_relative_eq!(half.cx, 159.75, epsilon = 1e-12);
        assert_relative_eq!(half.cy, 119.75, epsilon = 1e-12);
    }

    #[test]
    fn distortion_is_resolution_independent() {
        let model = model();
        assert_eq!(
            model.distortion().coeffs(),
            [-0.1, 0.02, 0.001, -0.0005, 0.003]
        );
    }

    #[test]
    fn json_roundtrip_preserves_the_model() {
        let model = model();
        let json = model.to_json().unwrap();
        let back = CameraModel::from_json(&json).unwrap();
        assert_eq!(back, model);
    }

    #[test]
    fn save_and_load_roundtrip() {
        let model = model();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("front.json");
        model.save(&path).unwrap();
        let back = CameraModel::load(&path).unwrap();
        assert_eq!(back, model);
    }

    #[test]
    fn save_replaces_an_existing_parameter_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("front.json");
        std::fs::write(&path, b"stale").unwrap();

        let model = model();
        model.save(&path).unwrap();
        let back = CameraModel::load(&path).unwrap();
        assert_eq!(back, model);

        // only the parameter file remains, no leftover temporary
        let entries = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn unknown_field_is_rejected() {
        let json = r#"{
            "camera_name": "front",
            "intrinsic_matrix": [[0.9, 0.0, 0.5], [0.0, 1.2, 0.5], [0.0, 0.0, 1.0]],
            "distortion_coeffs": [0.0, 0.0, 0.0, 0.0, 0.0],
            "extra": 1
        }"#;
        assert!(matches!(
            CameraModel::from_json(json),
            Err(CalibError::UnknownField(f)) if f == "extra"
        ));
    }

    #[test]
    fn missing_field_is_rejected() {
        let json = r#"{
            "camera_name": "front",
            "distortion_coeffs": [0.0, 0.0, 0.0, 0.0, 0.0]
        }"#;
        assert!(matches!(
            CameraModel::from_json(json),
            Err(CalibError::MissingField(f)) if f == "intrinsic_matrix"
        ));
    }

    #[test]
    fn invalid_bottom_row_is_rejected() {
        let json = r#"{
            "camera_name": "front",
            "intrinsic_matrix": [[0.9, 0.0, 0.5], [0.0, 1.2, 0.5], [0.0, 0.1, 1.0]],
            "distortion_coeffs": [0.0, 0.0, 0.0, 0.0, 0.0]
        }"#;
        assert!(matches!(
            CameraModel::from_json(json),
            Err(CalibError::InvalidModel(_))
        ));
    }

    #[test]
    fn wrong_coefficient_count_is_rejected() {
        let json = r#"{
            "camera_name": "front",
            "intrinsic_matrix": [[0.9, 0.0, 0.5], [0.0, 1.2, 0.5], [0.0, 0.0, 1.0]],
            "distortion_coeffs": [0.0, 0.0, 0.0]
        }"#;
        assert!(matches!(
            CameraModel::from_json(json),
            Err(CalibError::InvalidModel(_))
        ));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        assert!(matches!(
            CameraModel::from_json("{ not json"),
            Err(CalibError::Json(_))
        ));
    }
}
