use async_trait::async_trait;
use bytes::Bytes;

use crate::backend::{decode, encode, ensure_non_empty, run_blocking, Backend, BackendId};
use crate::config::{CompressOptions, StripMode};
use crate::error::BackendError;
use crate::format::ContainerType;
use crate::metadata;

/// Per-format optimizers: palette quantization plus oxipng for PNG, libwebp
/// for WebP, a NeuQuant re-encode for GIF and a quality re-encode for JPEG.
///
/// Never resizes. Returns whatever the optimizer produced, even when larger.
pub struct OptimizerBackend;

#[async_trait]
impl Backend for OptimizerBackend {
    fn id(&self) -> BackendId {
        BackendId::Optimizer
    }

    fn preserves_metadata(&self) -> bool {
        true
    }

    async fn compress(&self, input: Bytes, options: &CompressOptions) -> Result<Bytes, BackendError> {
        ensure_non_empty(&input)?;
        let options = options.clone();
        let output = run_blocking(move || optimize(&input, &options)).await?;
        if output.is_empty() {
            return Err(BackendError::EmptyOutput);
        }
        Ok(Bytes::from(output))
    }
}

fn optimize(input: &[u8], options: &CompressOptions) -> Result<Vec<u8>, BackendError> {
    let settings = options.encode_settings();
    let container = ContainerType::classify(input);

    let output = match container {
        ContainerType::Png => {
            let png = if settings.lossless {
                input.to_vec()
            } else {
                encode::quantize_png(&decode(input, container)?, &settings)?
            };
            encode::optimize_png(&png, &settings)?
        }
        ContainerType::Jpeg => encode::jpeg(&decode(input, container)?, settings.quality)?,
        ContainerType::Webp => {
            let webp = encode::webp(&decode(input, container)?, &settings)?;
            match settings.strip {
                StripMode::All => metadata::strip_webp(webp),
                StripMode::None => webp,
            }
        }
        ContainerType::Gif => encode::gif(input, &settings)?,
        ContainerType::Unknown => {
            return Err(BackendError::Decode(
                "unsupported image type; JPEG, PNG, WebP and GIF are supported".into(),
            ))
        }
    };

    Ok(if options.preserve_metadata {
        metadata::carry_over(input, output, container)
    } else {
        output
    })
}
