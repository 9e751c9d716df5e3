use async_trait::async_trait;
use bytes::Bytes;
use image::ImageFormat;

use crate::backend::{encode, ensure_non_empty, run_blocking, unless_negligible, Backend, BackendId};
use crate::config::CompressOptions;
use crate::error::BackendError;
use crate::format::ContainerType;
use crate::metadata;
use crate::resize::{self, ResizePolicy};

/// Plain raster re-encode through the `image` crate, resizing to exactly the
/// requested target. Supports JPEG, PNG, GIF and BMP sources.
pub struct PixelBackend;

#[async_trait]
impl Backend for PixelBackend {
    fn id(&self) -> BackendId {
        BackendId::Pixel
    }

    fn preserves_metadata(&self) -> bool {
        true
    }

    async fn compress(&self, input: Bytes, options: &CompressOptions) -> Result<Bytes, BackendError> {
        ensure_non_empty(&input)?;
        let source = input.clone();
        let options = options.clone();
        let output = run_blocking(move || reencode(&source, &options)).await?;
        if output.is_empty() {
            return Err(BackendError::EmptyOutput);
        }
        Ok(unless_negligible(input, output))
    }
}

fn reencode(input: &[u8], options: &CompressOptions) -> Result<Vec<u8>, BackendError> {
    let format = image::guess_format(input).map_err(|e| BackendError::Decode(e.to_string()))?;
    if !matches!(format, ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::Gif | ImageFormat::Bmp) {
        return Err(BackendError::Decode(format!("unsupported format {:?}", format)));
    }

    let image = image::load_from_memory_with_format(input, format).map_err(|e| BackendError::Decode(e.to_string()))?;
    let image = resize::apply(image, options, ResizePolicy::Exact)?;

    let encoded = match format {
        ImageFormat::Jpeg => encode::jpeg(&image, options.encode_settings().quality)?,
        other => encode::with_format(&image, other)?,
    };

    if options.preserve_metadata {
        let container = ContainerType::classify(input);
        return Ok(metadata::carry_over(input, encoded, container));
    }
    Ok(encoded)
}
