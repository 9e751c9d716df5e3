use std::io::Cursor;

use image::codecs::gif::{GifDecoder, GifEncoder, Repeat};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{AnimationDecoder, DynamicImage, GenericImageView, ImageEncoder};

use crate::config::{EncodeSettings, StripMode};
use crate::error::BackendError;

pub(crate) fn jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>, BackendError> {
    let rgb = image.to_rgb8();
    let (width, height) = image.dimensions();

    let mut output = Vec::new();
    let mut cursor = Cursor::new(&mut output);
    let mut encoder = JpegEncoder::new_with_quality(&mut cursor, quality);

    encoder
        .encode(rgb.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .map_err(|e| BackendError::Encode(format!("Failed to encode JPEG: {}", e)))?;

    Ok(output)
}

/// Lossless PNG at the highest zlib effort.
pub(crate) fn png(image: &DynamicImage) -> Result<Vec<u8>, BackendError> {
    let image = match image {
        DynamicImage::ImageRgb32F(_) | DynamicImage::ImageRgba32F(_) => DynamicImage::ImageRgba8(image.to_rgba8()),
        other => other.clone(),
    };
    let (width, height) = image.dimensions();

    let mut output = Vec::new();
    PngEncoder::new_with_quality(&mut output, CompressionType::Best, FilterType::Adaptive)
        .write_image(image.as_bytes(), width, height, image.color().into())
        .map_err(|e| BackendError::Encode(format!("Failed to encode PNG: {}", e)))?;

    Ok(output)
}

pub(crate) fn webp(image: &DynamicImage, settings: &EncodeSettings) -> Result<Vec<u8>, BackendError> {
    let rgba = image.to_rgba8();
    let (width, height) = image.dimensions();

    let encoder = webp::Encoder::from_rgba(rgba.as_raw(), width, height);
    let encoded = if settings.lossless {
        encoder.encode_lossless()
    } else {
        encoder.encode(settings.quality as f32)
    };

    Ok(encoded.to_vec())
}

/// Write through one of the `image` crate's built-in encoders.
pub(crate) fn with_format(image: &DynamicImage, format: image::ImageFormat) -> Result<Vec<u8>, BackendError> {
    let image = match format {
        image::ImageFormat::Gif | image::ImageFormat::Bmp => DynamicImage::ImageRgba8(image.to_rgba8()),
        _ => image.clone(),
    };
    let mut cursor = Cursor::new(Vec::new());
    image
        .write_to(&mut cursor, format)
        .map_err(|e| BackendError::Encode(format!("Failed to encode {:?}: {}", format, e)))?;
    Ok(cursor.into_inner())
}

/// Decode every GIF frame and re-encode with NeuQuant at a quality-derived speed.
pub(crate) fn gif(input: &[u8], settings: &EncodeSettings) -> Result<Vec<u8>, BackendError> {
    let decoder = GifDecoder::new(Cursor::new(input)).map_err(|e| BackendError::Decode(e.to_string()))?;
    let frames = decoder
        .into_frames()
        .collect_frames()
        .map_err(|e| BackendError::Decode(e.to_string()))?;

    // 1 = best palette, 30 = fastest
    let speed = 1 + ((100 - settings.quality as i32) * 29) / 99;

    let mut output = Vec::new();
    {
        let mut encoder = GifEncoder::new_with_speed(&mut output, speed);
        encoder
            .set_repeat(Repeat::Infinite)
            .map_err(|e| BackendError::Encode(e.to_string()))?;
        encoder
            .encode_frames(frames)
            .map_err(|e| BackendError::Encode(e.to_string()))?;
    }
    Ok(output)
}

/// Decode PNG → quantize colors → encode as indexed palette PNG
pub(crate) fn quantize_png(image: &DynamicImage, settings: &EncodeSettings) -> Result<Vec<u8>, BackendError> {
    let (width, height) = image.dimensions();
    let rgba = image.to_rgba8();
    let pixels: Vec<imagequant::RGBA> = rgba
        .pixels()
        .map(|p| imagequant::RGBA {
            r: p[0],
            g: p[1],
            b: p[2],
            a: p[3],
        })
        .collect();

    let mut attr = imagequant::new();
    attr.set_quality(0, settings.quality)
        .map_err(|e| BackendError::Quantize(e.to_string()))?;
    attr.set_speed(settings.speed)
        .map_err(|e| BackendError::Quantize(e.to_string()))?;

    let mut image = attr
        .new_image_borrowed(&pixels, width as usize, height as usize, 0.0)
        .map_err(|e| BackendError::Quantize(e.to_string()))?;

    let mut quantization = attr
        .quantize(&mut image)
        .map_err(|e| BackendError::Quantize(e.to_string()))?;

    let (palette, indices) = quantization
        .remapped(&mut image)
        .map_err(|e| BackendError::Quantize(e.to_string()))?;

    let lodepng_palette: Vec<lodepng::RGBA> = palette
        .iter()
        .map(|c| lodepng::RGBA {
            r: c.r,
            g: c.g,
            b: c.b,
            a: c.a,
        })
        .collect();

    let mut encoder = lodepng::Encoder::new();
    encoder.set_auto_convert(false);
    encoder
        .set_palette(&lodepng_palette)
        .map_err(|e| BackendError::Encode(e.to_string()))?;

    {
        let raw = encoder.info_raw_mut();
        raw.set_colortype(lodepng::ColorType::PALETTE);
        raw.set_bitdepth(8);
        raw.palette_clear();
        for &color in &lodepng_palette {
            raw.palette_add(color)
                .map_err(|e| BackendError::Encode(e.to_string()))?;
        }
    }

    encoder
        .encode(&indices, width as usize, height as usize)
        .map_err(|e| BackendError::Encode(e.to_string()))
}

/// Lossless DEFLATE re-compression and metadata stripping via oxipng
pub(crate) fn optimize_png(png_data: &[u8], settings: &EncodeSettings) -> Result<Vec<u8>, BackendError> {
    let mut opts = oxipng::Options::from_preset(4);

    opts.strip = match settings.strip {
        StripMode::All => oxipng::StripChunks::All,
        StripMode::None => oxipng::StripChunks::None,
    };

    oxipng::optimize_from_memory(png_data, &opts).map_err(|e| BackendError::Optimize(e.to_string()))
}
