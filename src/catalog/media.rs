use chrono::Utc;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;
use rand::distr::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const FALLBACK_CONTENT_TYPE: &str = "image/jpeg";

/// Settings for shrinking article images before upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// Inputs at or below this size are uploaded as they are.
    pub compress_threshold_kb: u64,
    /// Bounding box edge for the resized image.
    pub max_dimension: u32,
    /// JPEG quality, 1..=100.
    pub jpeg_quality: u8,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            compress_threshold_kb: 25,
            max_dimension: 600,
            jpeg_quality: 50,
        }
    }
}

/// Bytes ready for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedImage {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub compressed: bool,
}

/// Shrinks `bytes` to a JPEG that fits the configured bounding box when they
/// exceed the size threshold. Anything that cannot be decoded is passed through.
pub fn compress_image(bytes: Vec<u8>, config: &ImageConfig) -> PreparedImage {
    let threshold = config.compress_threshold_kb.saturating_mul(1024);
    if (bytes.len() as u64) <= threshold {
        debug!(size = bytes.len(), "Image below compression threshold");
        return passthrough(bytes);
    }

    match encode_jpeg(&bytes, config) {
        Ok(compressed) => {
            debug!(
                original = bytes.len(),
                compressed = compressed.len(),
                "Compressed article image"
            );
            PreparedImage {
                bytes: compressed,
                content_type: FALLBACK_CONTENT_TYPE.to_string(),
                compressed: true,
            }
        }
        Err(e) => {
            warn!(error = %e, "Image compression failed, uploading original");
            passthrough(bytes)
        }
    }
}

fn encode_jpeg(bytes: &[u8], config: &ImageConfig) -> image::ImageResult<Vec<u8>> {
    let mut img = image::load_from_memory(bytes)?;
    let max = config.max_dimension.max(1);
    if img.width() > max || img.height() > max {
        img = img.resize(max, max, FilterType::Triangle);
    }

    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let mut out = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut out, config.jpeg_quality.clamp(1, 100));
    rgb.write_with_encoder(encoder)?;
    Ok(out)
}

fn passthrough(bytes: Vec<u8>) -> PreparedImage {
    let content_type = image::guess_format(&bytes)
        .map(|format| format.to_mime_type().to_string())
        .unwrap_or_else(|_| FALLBACK_CONTENT_TYPE.to_string());
    PreparedImage {
        bytes,
        content_type,
        compressed: false,
    }
}

/// Object path for a new article image: `articles/{millis}_{random}.jpg`.
pub fn article_object_path() -> String {
    let suffix: String = rand::rng()
        .sample_iter(Alphanumeric)
        .take(7)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();
    format!("articles/{}_{}.jpg", Utc::now().timestamp_millis(), suffix)
}
