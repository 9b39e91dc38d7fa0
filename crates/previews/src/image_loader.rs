use std::path::Path;

use image::GenericImageView;

use crate::error::ResourceError;

/// Decoded image ready for upload: tightly packed RGBA8 rows, top row first.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub rgba: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Decodes the image at `path` into RGBA8 pixel data.
pub fn decode(path: &Path) -> Result<DecodedImage, ResourceError> {
    let image = image::open(path).map_err(|err| ResourceError::ImageDecodeFailure {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })?;
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(ResourceError::ImageDecodeFailure {
            path: path.to_path_buf(),
            reason: format!("image has no pixels ({width}x{height})"),
        });
    }

    Ok(DecodedImage {
        rgba: image.to_rgba8().into_raw(),
        width,
        height,
    })
}
