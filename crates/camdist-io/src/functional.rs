use std::io::Write;
use std::path::Path;

use camdist_image::{Image, ImageSize};

use crate::error::IoError;

/// Reads an RGB8 image from the given file path.
///
/// The method tries to read from any image format supported by the image
/// crate, converting to RGB8 when needed.
///
/// # Arguments
///
/// * `file_path` - The path to a valid image file.
///
/// # Returns
///
/// An image containing the image data.
pub fn read_image_rgb8(file_path: impl AsRef<Path>) -> Result<Image<u8, 3>, IoError> {
    let file_path = file_path.as_ref();
    if !file_path.exists() {
        return Err(IoError::FileDoesNotExist(file_path.to_path_buf()));
    }

    let img = image::open(file_path)?.into_rgb8();
    let size = ImageSize {
        width: img.width() as usize,
        height: img.height() as usize,
    };
    Ok(Image::new(size, img.into_raw())?)
}

/// Reads a grayscale image from the given file path.
///
/// Color inputs are converted to 8-bit luma.
///
/// # Arguments
///
/// * `file_path` - The path to a valid image file.
///
/// # Returns
///
/// An image containing the image data.
pub fn read_image_gray8(file_path: impl AsRef<Path>) -> Result<Image<u8, 1>, IoError> {
    let file_path = file_path.as_ref();
    if !file_path.exists() {
        return Err(IoError::FileDoesNotExist(file_path.to_path_buf()));
    }

    let img = image::open(file_path)?.into_luma8();
    let size = ImageSize {
        width: img.width() as usize,
        height: img.height() as usize,
    };
    Ok(Image::new(size, img.into_raw())?)
}

/// Writes an RGB8 image to the given file path.
///
/// The format is taken from the file extension. The image is first written
/// to a temporary file next to the destination and then renamed into
/// place, so a crash mid write never leaves a truncated output file.
///
/// # Arguments
///
/// * `file_path` - The destination path, with a supported image extension.
/// * `image` - The image to write.
pub fn write_image_rgb8(file_path: impl AsRef<Path>, image: &Image<u8, 3>) -> Result<(), IoError> {
    let file_path = file_path.as_ref();
    let format = image::ImageFormat::from_path(file_path)
        .map_err(|_| IoError::InvalidFileExtension(file_path.to_path_buf()))?;

    let parent = file_path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    {
        let mut writer = std::io::BufWriter::new(tmp.as_file_mut());
        image::write_buffer_with_format(
            &mut writer,
            image.as_slice(),
            image.cols() as u32,
            image.rows() as u32,
            image::ExtendedColorType::Rgb8,
            format,
        )?;
        writer.flush()?;
    }
    tmp.persist(file_path).map_err(|e| IoError::FileError(e.error))?;

    Ok(())
}
