use async_trait::async_trait;
use bytes::Bytes;

use crate::backend::{decode, encode, ensure_non_empty, run_blocking, unless_negligible, Backend, BackendId};
use crate::config::CompressOptions;
use crate::error::BackendError;
use crate::format::ContainerType;
use crate::metadata;
use crate::resize::{self, ResizePolicy};

/// Decodes, fits the image inside the requested box and re-encodes it in its
/// own format. GIF input is passed through untouched; unrecognised formats
/// come out as JPEG.
pub struct CodecBackend;

#[async_trait]
impl Backend for CodecBackend {
    fn id(&self) -> BackendId {
        BackendId::Codec
    }

    fn preserves_metadata(&self) -> bool {
        true
    }

    async fn compress(&self, input: Bytes, options: &CompressOptions) -> Result<Bytes, BackendError> {
        ensure_non_empty(&input)?;
        let source = input.clone();
        let options = options.clone();
        let output = run_blocking(move || reencode(&source, &options)).await?;
        Ok(unless_negligible(input, output))
    }
}

fn reencode(input: &[u8], options: &CompressOptions) -> Result<Vec<u8>, BackendError> {
    let container = ContainerType::classify(input);
    if container == ContainerType::Gif {
        log::debug!("GIF input left as is");
        return Ok(input.to_vec());
    }

    let settings = options.encode_settings();
    let image = resize::apply(decode(input, container)?, options, ResizePolicy::FitInside)?;

    let encoded = match container {
        ContainerType::Png => encode::png(&image)?,
        ContainerType::Webp => encode::webp(&image, &settings)?,
        _ => encode::jpeg(&image, settings.quality)?,
    };

    Ok(if options.preserve_metadata {
        metadata::carry_over(input, encoded, container)
    } else {
        encoded
    })
}
