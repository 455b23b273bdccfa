//! Image preparation: raw bytes → decoded image → base64 PNG `ImageData`.
//!
//! Catalog previews arrive as JPEG or WebP of arbitrary size. Decoding first
//! rejects anything that is not really an image before a model call is paid
//! for; re-encoding as PNG keeps text edges crisp, and the size cap keeps the
//! request body well under provider upload limits.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::{imageops::FilterType, DynamicImage};
use std::io::Cursor;
use tracing::debug;

/// Decode `bytes` into an image, whatever its container format.
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, image::ImageError> {
    image::load_from_memory(bytes)
}

/// Shrink `img` so neither side exceeds `max_pixels`, keeping the aspect ratio.
pub fn fit_within(img: DynamicImage, max_pixels: u32) -> DynamicImage {
    if img.width() <= max_pixels && img.height() <= max_pixels {
        return img;
    }
    debug!(
        "Downscaling {}x{} to fit {}px",
        img.width(),
        img.height(),
        max_pixels
    );
    img.resize(max_pixels, max_pixels, FilterType::Triangle)
}

/// Encode an image as a base64 PNG ready for the vision API.
pub fn encode_image(img: &DynamicImage) -> Result<ImageData, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;

    let b64 = STANDARD.encode(&buf);
    debug!("Encoded image → {} bytes base64", b64.len());

    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}

/// Decode, downscale and encode in one step.
pub fn prepare_image(bytes: &[u8], max_pixels: u32) -> Result<ImageData, image::ImageError> {
    let img = decode_image(bytes)?;
    encode_image(&fit_within(img, max_pixels))
}
