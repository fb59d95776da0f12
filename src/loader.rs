use image::RgbaImage;

use crate::errors::{Result, ViewerError};
use crate::traits::ResourceFetcher;

/// Fetch and decode an image resource into an owned RGBA buffer.
///
/// Grayscale masks expand to equal RGB channels, so channel 0 carries the
/// brightness the mask processor looks at.
pub async fn load_image<F: ResourceFetcher + ?Sized>(fetcher: &F, url: &str) -> Result<RgbaImage> {
    let bytes = fetcher.fetch(url).await?;
    decode_image(url, &bytes)
}

pub fn decode_image(url: &str, bytes: &[u8]) -> Result<RgbaImage> {
    let image = image::load_from_memory(bytes).map_err(|e| ViewerError::Decode {
        url: url.to_string(),
        source: e,
    })?;
    log::debug!(
        "decoded {} ({}x{}, {:?})",
        url,
        image.width(),
        image.height(),
        image.color()
    );
    Ok(image.to_rgba8())
}
