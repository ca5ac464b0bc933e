use std::path::{Path, PathBuf};
use std::sync::Arc;

use rayon::prelude::*;

use camdist_calib::{CameraModel, CancelToken};
use camdist_image::{ops, Image, ImageSize};
use camdist_imgproc::calibration::undistort::{
    generate_undistortion_map, optimal_new_intrinsic, UndistortionError, UndistortionMap,
};
use camdist_io::functional::{read_image_rgb8, write_image_rgb8};
use camdist_io::{FrameSink, FrameSource};

use super::PipelineError;

/// Suffix appended to the file stem of rectified outputs.
const OUTPUT_SUFFIX: &str = "_undist";

/// How many video frames are rectified in parallel per batch.
const VIDEO_BATCH: usize = 16;

/// Applies a camera model to images of any resolution.
///
/// The remap table for the most recent input resolution is kept, so
/// rectifying a batch of same sized inputs computes it once. A different
/// resolution replaces the kept table.
pub struct Rectifier {
    model: CameraModel,
    alpha: f64,
    map: Option<(ImageSize, Arc<UndistortionMap>)>,
}

impl Rectifier {
    /// Create a rectifier for a model and crop parameter.
    ///
    /// `alpha = 0` crops to pixels with valid source data, `alpha = 1`
    /// keeps the full undistorted field of view.
    pub fn new(model: CameraModel, alpha: f64) -> Result<Self, PipelineError> {
        if !(0.0..=1.0).contains(&alpha) {
            return Err(UndistortionError::InvalidCropParameter(alpha).into());
        }
        Ok(Self {
            model,
            alpha,
            map: None,
        })
    }

    /// The remap table for inputs of `size`, computed on first use.
    pub fn map_for(&mut self, size: ImageSize) -> Result<Arc<UndistortionMap>, PipelineError> {
        if let Some((cached_size, map)) = &self.map {
            if *cached_size == size {
                return Ok(map.clone());
            }
        }

        let intrinsic = self.model.scaled_intrinsic(size);
        let distortion = self.model.distortion();
        let new_intrinsic = optimal_new_intrinsic(&intrinsic, &distortion, size, self.alpha)?;
        log::debug!(
            "undistortion map for {size}: fx {:.2} -> {:.2}",
            intrinsic.fx,
            new_intrinsic.fx
        );

        let map = Arc::new(generate_undistortion_map(
            &intrinsic,
            &new_intrinsic,
            &distortion,
            size,
        )?);
        self.map = Some((size, map.clone()));
        Ok(map)
    }

    /// Rectify a single RGB8 image.
    pub fn rectify_image(&mut self, src: &Image<u8, 3>) -> Result<Image<u8, 3>, PipelineError> {
        let map = self.map_for(src.size())?;
        rectify_with_map(&map, src)
    }
}

fn rectify_with_map(
    map: &UndistortionMap,
    src: &Image<u8, 3>,
) -> Result<Image<u8, 3>, PipelineError> {
    let src_f32 = ops::cast_u8_to_f32(src)?;
    let mut dst = Image::from_size_val(map.size(), 0f32)?;
    camdist_imgproc::interpolation::remap(&src_f32, &mut dst, map, 0.0)?;
    Ok(ops::cast_f32_to_u8(&dst)?)
}

/// The output path of a rectified file: the input file name with
/// `_undist` appended to the stem, placed under `output_dir`.
pub fn undistorted_output_path(input: &Path, output_dir: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match input.extension() {
        Some(ext) => format!("{stem}{OUTPUT_SUFFIX}.{}", ext.to_string_lossy()),
        None => format!("{stem}{OUTPUT_SUFFIX}"),
    };
    output_dir.join(name)
}

/// Tally of a batch rectification run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RectifyStats {
    /// Files rectified and written next to their inputs.
    pub written: usize,
    /// Files skipped because reading, rectifying or writing failed.
    pub failed: usize,
}

/// Rectify a batch of image files into an output folder.
///
/// Each output is named after its input with the `_undist` stem suffix.
/// A failure on one file is logged and counted but does not stop the
/// others; only cancellation aborts the run.
pub fn rectify_files(
    rectifier: &mut Rectifier,
    inputs: &[PathBuf],
    output_dir: &Path,
    cancel: &CancelToken,
) -> Result<RectifyStats, PipelineError> {
    let mut stats = RectifyStats::default();
    for input in inputs {
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        match rectify_one_file(rectifier, input, output_dir) {
            Ok(output) => {
                log::info!("wrote {}", output.display());
                stats.written += 1;
            }
            Err(e) => {
                log::warn!("skipping {}: {e}", input.display());
                stats.failed += 1;
            }
        }
    }
    Ok(stats)
}

fn rectify_one_file(
    rectifier: &mut Rectifier,
    input: &Path,
    output_dir: &Path,
) -> Result<PathBuf, PipelineError> {
    let image = read_image_rgb8(input)?;
    let rectified = rectifier.rectify_image(&image)?;
    let output = undistorted_output_path(input, output_dir);
    write_image_rgb8(&output, &rectified)?;
    Ok(output)
}

/// Rectify a video stream frame by frame.
///
/// Frames are pulled in batches, rectified in parallel and written to the
/// sink in presentation order. The sink is committed with
/// [`FrameSink::finish`] only after the whole stream went through; an
/// error or cancellation leaves it uncommitted.
///
/// # Returns
///
/// The number of frames written.
pub fn rectify_video(
    rectifier: &mut Rectifier,
    source: &mut dyn FrameSource,
    sink: &mut dyn FrameSink,
    cancel: &CancelToken,
) -> Result<usize, PipelineError> {
    let map = rectifier.map_for(source.size())?;
    let mut written = 0;

    loop {
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        let mut batch = Vec::with_capacity(VIDEO_BATCH);
        while batch.len() < VIDEO_BATCH {
            match source.next_frame()? {
                Some(frame) => batch.push(frame),
                None => break,
            }
        }
        if batch.is_empty() {
            break;
        }

        // The indexed iterator keeps the rectified frames in presentation
        // order.
        let rectified: Vec<Result<Image<u8, 3>, PipelineError>> = batch
            .par_iter()
            .map(|frame| rectify_with_map(&map, frame))
            .collect();

        for frame in rectified {
            sink.write_frame(&frame?)?;
            written += 1;
        }
    }

    sink.finish()?;
    log::info!("rectified {written} video frames");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use camdist_imgproc::calibration::{CameraIntrinsic, PolynomialDistortion};
    use camdist_io::{MemoryFrameSink, MemoryFrameSource};

    const SIZE: ImageSize = ImageSize {
        width: 64,
        height: 48,
    };

    fn identity_model() -> CameraModel {
        // zero distortion with a centered principal point rectifies to the
        // identity
        CameraModel::from_calibration(
            "identity",
            &CameraIntrinsic {
                fx: 0.55 * SIZE.width as f64,
                fy: 0.55 * SIZE.width as f64,
                cx: (SIZE.width as f64 - 1.0) * 0.5,
                cy: (SIZE.height as f64 - 1.0) * 0.5,
            },
            &PolynomialDistortion::default(),
            SIZE,
        )
    }

    fn gradient_image(size: ImageSize) -> Image<u8, 3> {
        let mut data = Vec::with_capacity(size.width * size.height * 3);
        for v in 0..size.height {
            for u in 0..size.width {
                data.push((u * 3) as u8);
                data.push((v * 5) as u8);
                data.push(((u + v) * 2) as u8);
            }
        }
        Image::new(size, data).unwrap()
    }

    #[test]
    fn output_path_gets_the_undist_suffix() {
        assert_eq!(
            undistorted_output_path(Path::new("/data/shot01.png"), Path::new("/out")),
            Path::new("/out/shot01_undist.png")
        );
        assert_eq!(
            undistorted_output_path(Path::new("clip"), Path::new("out")),
            Path::new("out/clip_undist")
        );
    }

    #[test]
    fn invalid_alpha_is_rejected() {
        let res = Rectifier::new(identity_model(), -0.1);
        assert!(matches!(res, Err(PipelineError::Undistortion(_))));
    }

    #[test]
    fn identity_model_reproduces_the_input() {
        let mut rectifier = Rectifier::new(identity_model(), 0.0).unwrap();
        let image = gradient_image(SIZE);
        let out = rectifier.rectify_image(&image).unwrap();
        assert_eq!(out.as_slice(), image.as_slice());
    }

    #[test]
    fn map_is_reused_for_the_same_resolution() {
        let mut rectifier = Rectifier::new(identity_model(), 0.0).unwrap();
        let first = rectifier.map_for(SIZE).unwrap();
        let second = rectifier.map_for(SIZE).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn map_cache_keeps_only_the_latest_resolution() {
        let small = ImageSize {
            width: 32,
            height: 24,
        };
        let mut rectifier = Rectifier::new(identity_model(), 0.0).unwrap();
        let first = rectifier.map_for(SIZE).unwrap();

        let other = rectifier.map_for(small).unwrap();
        assert!(!Arc::ptr_eq(&first, &other));

        // switching back recomputes; the earlier table was dropped
        let again = rectifier.map_for(SIZE).unwrap();
        assert!(!Arc::ptr_eq(&first, &again));
        assert_eq!(again.size(), SIZE);
    }

    #[test]
    fn rectify_files_isolates_per_file_failures() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.png");
        write_image_rgb8(&good, &gradient_image(SIZE)).unwrap();
        let broken = dir.path().join("broken.png");
        std::fs::write(&broken, b"not an image").unwrap();

        let mut rectifier = Rectifier::new(identity_model(), 0.0).unwrap();
        let inputs = vec![broken, good];
        let stats =
            rectify_files(&mut rectifier, &inputs, dir.path(), &CancelToken::new()).unwrap();

        assert_eq!(stats, RectifyStats { written: 1, failed: 1 });
        assert!(dir.path().join("good_undist.png").exists());
        assert!(!dir.path().join("broken_undist.png").exists());
    }

    #[test]
    fn rectify_video_preserves_frame_order() {
        let frames: Vec<Image<u8, 3>> = (0..40)
            .map(|i| Image::from_size_val(SIZE, i as u8).unwrap())
            .collect();
        let mut source = MemoryFrameSource::new(SIZE, frames);
        let mut sink = MemoryFrameSink::new(SIZE);

        let mut rectifier = Rectifier::new(identity_model(), 0.0).unwrap();
        let written =
            rectify_video(&mut rectifier, &mut source, &mut sink, &CancelToken::new()).unwrap();

        assert_eq!(written, 40);
        assert_eq!(sink.frames.len(), 40);
        assert!(sink.is_finished());
        for (i, frame) in sink.frames.iter().enumerate() {
            assert_eq!(frame.as_slice()[0], i as u8);
        }
    }

    #[test]
    fn cancelled_video_run_stops() {
        let frames: Vec<Image<u8, 3>> = (0..4)
            .map(|_| Image::from_size_val(SIZE, 0u8).unwrap())
            .collect();
        let mut source = MemoryFrameSource::new(SIZE, frames);
        let mut sink = MemoryFrameSink::new(SIZE);

        let cancel = CancelToken::new();
        cancel.cancel();
        let mut rectifier = Rectifier::new(identity_model(), 0.0).unwrap();
        let res = rectify_video(&mut rectifier, &mut source, &mut sink, &cancel);
        assert!(matches!(res, Err(PipelineError::Cancelled)));
        assert!(sink.frames.is_empty());
        assert!(!sink.is_finished());
    }
}
