/// An error type for the io module.
#[derive(thiserror::Error, Debug)]
pub enum IoError {
    /// Error when the file does not exist.
    #[error("File does not exist: {0}")]
    FileDoesNotExist(std::path::PathBuf),

    /// Invalid file extension.
    #[error("File does not have a valid extension: {0}")]
    InvalidFileExtension(std::path::PathBuf),

    /// Error to manipulate the file.
    #[error("Failed to manipulate the file. {0}")]
    FileError(#[from] std::io::Error),

    /// Error to create the image.
    #[error("Failed to create image. {0}")]
    ImageCreationError(#[from] camdist_image::ImageError),

    /// Error to decode or encode the image.
    #[error("Failed to decode or encode the image. {0}")]
    ImageFormatError(#[from] image::ImageError),

    /// The frame does not match the resolution of the stream.
    #[error("Frame resolution {got_width}x{got_height} does not match the stream resolution {width}x{height}")]
    FrameResolutionMismatch {
        /// Width of the offending frame.
        got_width: usize,
        /// Height of the offending frame.
        got_height: usize,
        /// Width of the stream.
        width: usize,
        /// Height of the stream.
        height: usize,
    },
}
