//! Image encoding: chart raster → PNG bytes.
//!
//! PNG is lossless, so thin grid lines and small tick labels survive intact,
//! and the encoder is deterministic, so the same report always yields the
//! same bytes.

use image::{ImageFormat, RgbImage};
use std::io::Cursor;
use tracing::debug;

/// Encode a chart as PNG.
pub fn encode_png(img: &RgbImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;

    debug!(
        "Encoded {}x{} chart → {} bytes PNG",
        img.width(),
        img.height(),
        buf.len()
    );
    Ok(buf)
}
