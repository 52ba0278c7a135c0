//! Avatar re-encoding boundary.
//!
//! Full image decode/encode is an external collaborator (spec §1); this
//! trait keeps that pipeline narrow so `tootik-core` never has to know the
//! `image` crate exists.

use crate::AppResult;

/// Fixed square side, in pixels, every stored avatar is normalized to.
pub const AVATAR_SIDE: u32 = 256;

/// Re-encodes uploaded avatar bytes into a fixed-size square image.
pub trait AvatarProcessor: Send + Sync {
    /// Decode `data`, crop/scale it to a centered `AVATAR_SIDE`×`AVATAR_SIDE`
    /// square, and re-encode as PNG. Rejects anything that doesn't decode as
    /// a supported raster image.
    fn normalize(&self, data: &[u8]) -> AppResult<Vec<u8>>;
}

/// `image`-crate backed [`AvatarProcessor`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageAvatarProcessor;

impl AvatarProcessor for ImageAvatarProcessor {
    fn normalize(&self, data: &[u8]) -> AppResult<Vec<u8>> {
        use image::imageops::FilterType;
        use std::io::Cursor;

        let img = image::load_from_memory(data)
            .map_err(|e| crate::AppError::BadInput(format!("unreadable image: {e}")))?;

        let (width, height) = (img.width(), img.height());
        let side = width.min(height);
        let x = (width - side) / 2;
        let y = (height - side) / 2;

        let square = img.crop_imm(x, y, side, side).resize_exact(
            AVATAR_SIDE,
            AVATAR_SIDE,
            FilterType::Lanczos3,
        );

        let mut out = Vec::new();
        square
            .write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
            .map_err(|e| crate::AppError::Internal(format!("failed to encode avatar: {e}")))?;

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_image_bytes() {
        let processor = ImageAvatarProcessor;
        let result = processor.normalize(b"not an image");
        assert!(result.is_err());
    }
}
