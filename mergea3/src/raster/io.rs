use std::path::Path;

use image as image_lib;

use super::Raster;
use crate::error::{MergeError, Result};

/// Supported image file extensions for reading and writing.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "tiff", "tif", "bmp"];

fn image_format<P: AsRef<Path>>(filename: P) -> Result<image_lib::ImageFormat> {
    let extension = filename
        .as_ref()
        .extension()
        .and_then(|os_str| os_str.to_str())
        .ok_or_else(|| MergeError::UnsupportedExtension("missing extension".to_string()))?
        .to_ascii_lowercase();

    let format = match extension.as_str() {
        "png" => image_lib::ImageFormat::Png,
        "jpeg" | "jpg" => image_lib::ImageFormat::Jpeg,
        "tiff" | "tif" => image_lib::ImageFormat::Tiff,
        "bmp" => image_lib::ImageFormat::Bmp,

        _ => return Err(MergeError::UnsupportedExtension(extension)),
    };

    Ok(format)
}

impl Raster {
    /// Decodes an image file into an RGB raster. Alpha is dropped and
    /// 16-bit channels are reduced to 8 bits.
    pub fn read_file<P: AsRef<Path>>(filename: P) -> Result<Raster> {
        let path = filename.as_ref();
        let format = image_format(path)?;

        let mut reader = image_lib::ImageReader::open(path)
            .map_err(|e| MergeError::ImageLoad {
                path: path.to_path_buf(),
                source: image_lib::ImageError::IoError(e),
            })?
            .with_guessed_format()
            .map_err(|e| MergeError::ImageLoad {
                path: path.to_path_buf(),
                source: image_lib::ImageError::IoError(e),
            })?;

        // Fall back to the extension when the content sniffing is inconclusive.
        if reader.format().is_none() {
            reader.set_format(format);
        }

        let decoded = reader.decode().map_err(|source| MergeError::ImageLoad {
            path: path.to_path_buf(),
            source,
        })?;

        tracing::debug!(
            path = %path.display(),
            width = decoded.width(),
            height = decoded.height(),
            color = ?decoded.color(),
            "Loaded raster"
        );

        Ok(Raster::from_dynamic_image(&decoded))
    }

    /// Encodes the raster; the format follows the file extension.
    pub fn save_file<P: AsRef<Path>>(&self, filename: P) -> Result<()> {
        let path = filename.as_ref();
        let format = image_format(path)?;

        self.to_rgb_image()
            .save_with_format(path, format)
            .map_err(|source| MergeError::ImageSave {
                path: path.to_path_buf(),
                source,
            })?;

        tracing::debug!(
            path = %path.display(),
            width = self.width(),
            height = self.height(),
            "Saved raster"
        );

        Ok(())
    }
}
