/// Observer for per-image collection progress.
///
/// The collector has no process-wide mutable state; progress is reported
/// through this explicitly passed dependency. All methods default to
/// no-ops.
pub trait CollectObserver: Send + Sync {
    /// The pattern was found and refined in an image.
    fn pattern_found(&self, _image: &str, _num_corners: usize) {}

    /// The pattern was not found in an image; the image is skipped.
    fn pattern_not_found(&self, _image: &str) {}
}

/// An observer that forwards progress to the `log` facade.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogObserver;

impl CollectObserver for LogObserver {
    fn pattern_found(&self, image: &str, num_corners: usize) {
        log::debug!("{num_corners} corners have been found on image {image}");
    }

    fn pattern_not_found(&self, image: &str) {
        log::warn!("cannot find corners on image {image}");
    }
}

/// An observer that ignores all progress events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullObserver;

impl CollectObserver for NullObserver {}
