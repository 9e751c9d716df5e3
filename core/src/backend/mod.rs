mod encode;
pub mod codec;
pub mod optimizer;
pub mod pixel;
pub mod tinify;

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::arbitrate::NEGLIGIBLE_SAVINGS_RATIO;
use crate::config::CompressOptions;
use crate::error::BackendError;
use crate::format::ContainerType;

pub use codec::CodecBackend;
pub use optimizer::OptimizerBackend;
pub use pixel::PixelBackend;
pub use tinify::TinifyBackend;

/// Identifies a backend in candidate tables, attempts and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendId {
    /// Decode, resize and re-encode in the source format
    Codec,
    /// Format-specific optimizers: palette quantization, oxipng, WebP, GIF re-encode
    Optimizer,
    /// Plain raster re-encode with exact resizing
    Pixel,
    /// Remote Tinify API
    Tinify,
    /// Sentinel for "input returned unchanged"
    Original,
}

impl BackendId {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendId::Codec => "codec",
            BackendId::Optimizer => "optimizer",
            BackendId::Pixel => "pixel",
            BackendId::Tinify => "tinify",
            BackendId::Original => "original",
        }
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A compression engine.
///
/// `compress` may return a buffer larger than its input; deciding whether the
/// result is worth keeping is left to arbitration.
#[async_trait]
pub trait Backend: Send + Sync {
    fn id(&self) -> BackendId;

    /// Whether the backend can keep EXIF/ICC/XMP metadata when asked to.
    fn preserves_metadata(&self) -> bool;

    /// Checked once when the backend is registered.
    fn probe(&self) -> Result<(), BackendError> {
        Ok(())
    }

    async fn compress(&self, input: Bytes, options: &CompressOptions) -> Result<Bytes, BackendError>;
}

/// Run CPU-bound encoder work off the async executor.
pub(crate) async fn run_blocking<F>(work: F) -> Result<Vec<u8>, BackendError>
where
    F: FnOnce() -> Result<Vec<u8>, BackendError> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| BackendError::TaskFailed(e.to_string()))?
}

/// Return the input instead of an output that saves less than 2%.
pub(crate) fn unless_negligible(input: Bytes, output: Vec<u8>) -> Bytes {
    if output.len() as f64 >= input.len() as f64 * NEGLIGIBLE_SAVINGS_RATIO {
        log::debug!(
            "Output ({} bytes) saves too little over input ({} bytes), keeping input",
            output.len(),
            input.len()
        );
        input
    } else {
        Bytes::from(output)
    }
}

pub(crate) fn ensure_non_empty(input: &[u8]) -> Result<(), BackendError> {
    if input.is_empty() {
        return Err(BackendError::InvalidInput("buffer must not be empty".into()));
    }
    Ok(())
}

pub(crate) fn decode(input: &[u8], container: ContainerType) -> Result<DynamicImage, BackendError> {
    let decoded = match container.image_format() {
        Some(format) => image::load_from_memory_with_format(input, format),
        None => image::load_from_memory(input),
    };
    decoded.map_err(|e| BackendError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negligible_output_falls_back_to_input() {
        let input = Bytes::from(vec![0u8; 100]);
        assert_eq!(unless_negligible(input.clone(), vec![1u8; 98]), input);
        assert_eq!(unless_negligible(input.clone(), vec![1u8; 150]), input);
        assert_eq!(unless_negligible(input, vec![1u8; 97]).len(), 97);
    }

    #[test]
    fn empty_buffers_are_rejected() {
        assert!(matches!(ensure_non_empty(&[]), Err(BackendError::InvalidInput(_))));
        assert!(ensure_non_empty(&[1]).is_ok());
    }

    #[test]
    fn ids_serialize_lowercase() {
        assert_eq!(serde_json::to_string(&BackendId::Optimizer).unwrap(), "\"optimizer\"");
        assert_eq!(BackendId::Original.to_string(), "original");
    }
}
