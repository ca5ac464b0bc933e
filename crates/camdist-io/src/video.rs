use camdist_image::{Image, ImageSize};

use crate::error::IoError;

/// A pull based source of decoded RGB8 video frames.
///
/// Decoding itself happens behind this trait; rectification only needs the
/// frames and their common resolution.
pub trait FrameSource {
    /// The resolution shared by every frame of the stream.
    fn size(&self) -> ImageSize;

    /// The next frame, or `None` at the end of the stream.
    fn next_frame(&mut self) -> Result<Option<Image<u8, 3>>, IoError>;
}

/// A push based sink for RGB8 video frames.
///
/// Frames must be written in presentation order and match the sink
/// resolution. Written frames stay in a temporary location until
/// [`finish`](FrameSink::finish) commits them; a sink that is dropped
/// without `finish` must discard its partial output.
pub trait FrameSink {
    /// The resolution the sink accepts.
    fn size(&self) -> ImageSize;

    /// Append a frame to the stream.
    fn write_frame(&mut self, frame: &Image<u8, 3>) -> Result<(), IoError>;

    /// Commit the output atomically.
    ///
    /// Called once, after the last frame of a fully successful run.
    fn finish(&mut self) -> Result<(), IoError>;
}

/// A frame source backed by an in-memory frame list.
pub struct MemoryFrameSource {
    size: ImageSize,
    frames: std::vec::IntoIter<Image<u8, 3>>,
}

impl MemoryFrameSource {
    /// Create a source yielding `frames` in order.
    ///
    /// Frames that do not match `size` are rejected when pulled.
    pub fn new(size: ImageSize, frames: Vec<Image<u8, 3>>) -> Self {
        Self {
            size,
            frames: frames.into_iter(),
        }
    }
}

impl FrameSource for MemoryFrameSource {
    fn size(&self) -> ImageSize {
        self.size
    }

    fn next_frame(&mut self) -> Result<Option<Image<u8, 3>>, IoError> {
        match self.frames.next() {
            Some(frame) if frame.size() != self.size => Err(IoError::FrameResolutionMismatch {
                got_width: frame.size().width,
                got_height: frame.size().height,
                width: self.size.width,
                height: self.size.height,
            }),
            other => Ok(other),
        }
    }
}

/// A frame sink collecting frames into memory.
pub struct MemoryFrameSink {
    size: ImageSize,
    finished: bool,
    /// The frames written so far, in write order.
    pub frames: Vec<Image<u8, 3>>,
}

impl MemoryFrameSink {
    /// Create an empty sink for frames of `size`.
    pub fn new(size: ImageSize) -> Self {
        Self {
            size,
            finished: false,
            frames: Vec::new(),
        }
    }

    /// Whether the stream was committed with [`FrameSink::finish`].
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl FrameSink for MemoryFrameSink {
    fn size(&self) -> ImageSize {
        self.size
    }

    fn write_frame(&mut self, frame: &Image<u8, 3>) -> Result<(), IoError> {
        if frame.size() != self.size {
            return Err(IoError::FrameResolutionMismatch {
                got_width: frame.size().width,
                got_height: frame.size().height,
                width: self.size.width,
                height: self.size.height,
            });
        }
        self.frames.push(frame.clone());
        Ok(())
    }

    fn finish(&mut self) -> Result<(), IoError> {
        self.finished = true;
        Ok(())
    }
}
