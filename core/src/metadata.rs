//! Copy EXIF/ICC/XMP and related metadata from a source image into a
//! re-encoded one of the same container type.
//!
//! Encoders in this crate write bare pixel data, so backends that promise to
//! preserve metadata splice the source's metadata chunks back in afterwards.

use std::ops::Range;

use crate::format::ContainerType;

const PNG_SIGNATURE_LEN: usize = 8;

/// PNG chunks carried over. Color chunks must precede PLTE/IDAT, so all are
/// inserted right after IHDR.
const PNG_METADATA_CHUNKS: &[&[u8; 4]] = &[
    b"iCCP", b"sRGB", b"gAMA", b"cHRM", b"pHYs", b"eXIf", b"tIME", b"tEXt", b"zTXt", b"iTXt",
];
const PNG_TEXT_CHUNKS: &[&[u8; 4]] = &[b"tEXt", b"zTXt", b"iTXt"];

const JPEG_APP0: u8 = 0xE0;
const JPEG_APP1: u8 = 0xE1;
const JPEG_APP2: u8 = 0xE2;
const JPEG_SOS: u8 = 0xDA;

const VP8X_ICC: u8 = 0x20;
const VP8X_ALPHA: u8 = 0x10;
const VP8X_EXIF: u8 = 0x08;
const VP8X_XMP: u8 = 0x04;

/// Splice metadata from `original` into `encoded`. Returns `encoded` untouched
/// when there is nothing to carry or either buffer is not well formed.
pub fn carry_over(original: &[u8], encoded: Vec<u8>, container: ContainerType) -> Vec<u8> {
    if ContainerType::classify(&encoded) != container {
        return encoded;
    }
    match container {
        ContainerType::Png => carry_png(original, encoded),
        ContainerType::Jpeg => carry_jpeg(original, encoded),
        ContainerType::Webp => carry_webp(original, encoded),
        ContainerType::Gif | ContainerType::Unknown => encoded,
    }
}

/// Names of the metadata chunks/segments present in a buffer.
pub fn metadata_chunks(buffer: &[u8]) -> Vec<String> {
    match ContainerType::classify(buffer) {
        ContainerType::Png => png_chunks(buffer)
            .filter(|(name, _)| PNG_METADATA_CHUNKS.contains(&name))
            .map(|(name, _)| String::from_utf8_lossy(&name).into_owned())
            .collect(),
        ContainerType::Jpeg => jpeg_segments(buffer)
            .filter_map(|(marker, range)| jpeg_metadata_label(marker, &buffer[range]))
            .map(str::to_string)
            .collect(),
        ContainerType::Webp => webp_chunks(buffer)
            .filter(|(name, _)| matches!(name, b"ICCP" | b"EXIF" | b"XMP "))
            .map(|(name, _)| String::from_utf8_lossy(&name).into_owned())
            .collect(),
        ContainerType::Gif | ContainerType::Unknown => Vec::new(),
    }
}

// ---------------------------------------------------------------------------
// PNG
// ---------------------------------------------------------------------------

/// Walk PNG chunks, yielding the chunk type and the byte range of the whole
/// chunk (length + type + data + CRC).
fn png_chunks(input: &[u8]) -> impl Iterator<Item = ([u8; 4], Range<usize>)> + '_ {
    let mut pos = PNG_SIGNATURE_LEN;
    std::iter::from_fn(move || {
        if pos + 8 > input.len() {
            return None;
        }
        let length = u32::from_be_bytes([input[pos], input[pos + 1], input[pos + 2], input[pos + 3]]) as usize;
        let end = pos.checked_add(12)?.checked_add(length)?;
        if end > input.len() {
            return None;
        }
        let name = [input[pos + 4], input[pos + 5], input[pos + 6], input[pos + 7]];
        let range = pos..end;
        pos = end;
        Some((name, range))
    })
}

fn carry_png(original: &[u8], encoded: Vec<u8>) -> Vec<u8> {
    let present: Vec<[u8; 4]> = png_chunks(&encoded).map(|(name, _)| name).collect();
    let has_color_profile = present.iter().any(|n| n == b"iCCP" || n == b"sRGB");

    let carried: Vec<Range<usize>> = png_chunks(original)
        .filter(|(name, _)| PNG_METADATA_CHUNKS.contains(&name))
        .filter(|(name, range)| {
            if PNG_TEXT_CHUNKS.contains(&name) {
                let chunk = &original[range.clone()];
                return !png_chunks(&encoded).any(|(_, r)| &encoded[r] == chunk);
            }
            if (name == b"iCCP" || name == b"sRGB") && has_color_profile {
                return false;
            }
            !present.contains(name)
        })
        .map(|(_, range)| range)
        .collect();

    if carried.is_empty() {
        return encoded;
    }

    let first = png_chunks(&encoded).next();
    let ihdr_end = match first {
        Some((name, range)) if &name == b"IHDR" => range.end,
        _ => return encoded,
    };

    let extra: usize = carried.iter().map(|r| r.len()).sum();
    let mut output = Vec::with_capacity(encoded.len() + extra);
    output.extend_from_slice(&encoded[..ihdr_end]);
    for range in carried {
        output.extend_from_slice(&original[range]);
    }
    output.extend_from_slice(&encoded[ihdr_end..]);
    output
}

// ---------------------------------------------------------------------------
// JPEG
// ---------------------------------------------------------------------------

/// Walk JPEG marker segments up to the start of scan, yielding the marker and
/// the byte range of the whole segment (marker + length + payload).
fn jpeg_segments(input: &[u8]) -> impl Iterator<Item = (u8, Range<usize>)> + '_ {
    let mut pos = 2;
    std::iter::from_fn(move || {
        loop {
            if pos + 3 >= input.len() || input[pos] != 0xFF {
                return None;
            }
            let marker = input[pos + 1];
            // Fill bytes
            if marker == 0xFF {
                pos += 1;
                continue;
            }
            if marker == JPEG_SOS || marker == 0xD9 {
                return None;
            }
            // Standalone markers carry no length
            if (0xD0..=0xD7).contains(&marker) || marker == 0x01 {
                pos += 2;
                continue;
            }
            let length = u16::from_be_bytes([input[pos + 2], input[pos + 3]]) as usize;
            let end = pos + 2 + length;
            if length < 2 || end > input.len() {
                return None;
            }
            let range = pos..end;
            pos = end;
            return Some((marker, range));
        }
    })
}

fn jpeg_metadata_label(marker: u8, segment: &[u8]) -> Option<&'static str> {
    let payload = segment.get(4..)?;
    match marker {
        JPEG_APP1 if payload.starts_with(b"Exif\0") => Some("EXIF"),
        JPEG_APP1 if payload.starts_with(b"http:") => Some("XMP"),
        JPEG_APP2 if payload.starts_with(b"ICC_PROFILE\0") => Some("ICC"),
        _ => None,
    }
}

fn carry_jpeg(original: &[u8], encoded: Vec<u8>) -> Vec<u8> {
    let carried: Vec<Range<usize>> = jpeg_segments(original)
        .filter(|(marker, range)| jpeg_metadata_label(*marker, &original[range.clone()]).is_some())
        .map(|(_, range)| range)
        .collect();

    if carried.is_empty() {
        return encoded;
    }

    // Keep the encoder's own metadata segments out so labels are not duplicated.
    let mut insert_at = 2;
    let mut dropped: Vec<Range<usize>> = Vec::new();
    for (marker, range) in jpeg_segments(&encoded) {
        if marker == JPEG_APP0 && range.start == insert_at {
            insert_at = range.end;
        } else if jpeg_metadata_label(marker, &encoded[range.clone()]).is_some() {
            dropped.push(range);
        }
    }

    let extra: usize = carried.iter().map(|r| r.len()).sum();
    let mut output = Vec::with_capacity(encoded.len() + extra);
    output.extend_from_slice(&encoded[..insert_at]);
    for range in carried {
        output.extend_from_slice(&original[range]);
    }
    let mut pos = insert_at;
    for range in dropped {
        output.extend_from_slice(&encoded[pos..range.start]);
        pos = range.end;
    }
    output.extend_from_slice(&encoded[pos..]);
    output
}

// ---------------------------------------------------------------------------
// WebP
// ---------------------------------------------------------------------------

/// Walk RIFF chunks after the `WEBP` fourcc, yielding the chunk name and the
/// byte range of the whole chunk including padding.
fn webp_chunks(input: &[u8]) -> impl Iterator<Item = ([u8; 4], Range<usize>)> + '_ {
    let mut pos = 12;
    std::iter::from_fn(move || {
        if pos + 8 > input.len() {
            return None;
        }
        let name = [input[pos], input[pos + 1], input[pos + 2], input[pos + 3]];
        let size = u32::from_le_bytes([input[pos + 4], input[pos + 5], input[pos + 6], input[pos + 7]]) as usize;
        // WebP chunks are padded to even size
        let padded = (size + 1) & !1;
        let end = (pos + 8 + padded).min(input.len());
        if pos + 8 + size > input.len() {
            return None;
        }
        let range = pos..end;
        pos = end;
        Some((name, range))
    })
}

/// Canvas size and alpha flag read from a simple-format image chunk.
fn webp_canvas(name: &[u8; 4], data: &[u8]) -> Option<(u32, u32, bool)> {
    match name {
        b"VP8 " => {
            if data.len() < 10 || data[3..6] != [0x9d, 0x01, 0x2a] {
                return None;
            }
            let width = u16::from_le_bytes([data[6], data[7]]) & 0x3fff;
            let height = u16::from_le_bytes([data[8], data[9]]) & 0x3fff;
            Some((width as u32, height as u32, false))
        }
        b"VP8L" => {
            if data.len() < 5 || data[0] != 0x2f {
                return None;
            }
            let bits = u32::from_le_bytes([data[1], data[2], data[3], data[4]]);
            let width = (bits & 0x3fff) + 1;
            let height = ((bits >> 14) & 0x3fff) + 1;
            let alpha = (bits >> 28) & 1 == 1;
            Some((width, height, alpha))
        }
        _ => None,
    }
}

fn vp8x_chunk(flags: u8, width: u32, height: u32) -> Vec<u8> {
    let mut chunk = Vec::with_capacity(18);
    chunk.extend_from_slice(b"VP8X");
    chunk.extend_from_slice(&10u32.to_le_bytes());
    chunk.push(flags);
    chunk.extend_from_slice(&[0, 0, 0]);
    chunk.extend_from_slice(&(width - 1).to_le_bytes()[..3]);
    chunk.extend_from_slice(&(height - 1).to_le_bytes()[..3]);
    chunk
}

fn carry_webp(original: &[u8], encoded: Vec<u8>) -> Vec<u8> {
    let find = |buffer: &[u8], wanted: &[u8; 4]| {
        webp_chunks(buffer).find(|(name, _)| name == wanted).map(|(_, range)| range)
    };

    let present: Vec<[u8; 4]> = webp_chunks(&encoded).map(|(name, _)| name).collect();
    let iccp = find(original, b"ICCP").filter(|_| !present.contains(b"ICCP"));
    let exif = find(original, b"EXIF").filter(|_| !present.contains(b"EXIF"));
    let xmp = find(original, b"XMP ").filter(|_| !present.contains(b"XMP "));
    if iccp.is_none() && exif.is_none() && xmp.is_none() {
        return encoded;
    }

    let mut flags = 0u8;
    if iccp.is_some() {
        flags |= VP8X_ICC;
    }
    if exif.is_some() {
        flags |= VP8X_EXIF;
    }
    if xmp.is_some() {
        flags |= VP8X_XMP;
    }

    let mut body = Vec::with_capacity(encoded.len() + 64);
    match find(&encoded, b"VP8X") {
        Some(range) => {
            let mut header = encoded[range.clone()].to_vec();
            header[8] |= flags;
            body.extend_from_slice(&header);
            if let Some(r) = &iccp {
                body.extend_from_slice(&original[r.clone()]);
            }
            body.extend_from_slice(&encoded[range.end..]);
        }
        None => {
            let first = webp_chunks(&encoded).next();
            let Some((name, range)) = first else {
                return encoded;
            };
            let Some((width, height, alpha)) = webp_canvas(&name, &encoded[range.start + 8..range.end]) else {
                return encoded;
            };
            if alpha {
                flags |= VP8X_ALPHA;
            }
            body.extend_from_slice(&vp8x_chunk(flags, width, height));
            if let Some(r) = &iccp {
                body.extend_from_slice(&original[r.clone()]);
            }
            body.extend_from_slice(&encoded[12..]);
        }
    }
    if let Some(r) = exif {
        body.extend_from_slice(&original[r]);
    }
    if let Some(r) = xmp {
        body.extend_from_slice(&original[r]);
    }

    let riff_size = (4 + body.len()) as u32;
    let mut output = Vec::with_capacity(12 + body.len());
    output.extend_from_slice(b"RIFF");
    output.extend_from_slice(&riff_size.to_le_bytes());
    output.extend_from_slice(b"WEBP");
    output.extend_from_slice(&body);
    output
}

/// Drop metadata chunks from a WebP file, keeping only image data.
pub fn strip_webp(input: Vec<u8>) -> Vec<u8> {
    if ContainerType::classify(&input) != ContainerType::Webp {
        return input;
    }
    let kept: Vec<Range<usize>> = webp_chunks(&input)
        .filter(|(name, _)| {
            let keep = matches!(name, b"VP8 " | b"VP8L" | b"VP8X" | b"ALPH" | b"ANIM" | b"ANMF");
            if !keep {
                log::debug!("Stripping WebP chunk: {}", String::from_utf8_lossy(name));
            }
            keep
        })
        .map(|(_, range)| range)
        .collect();

    let mut output = Vec::with_capacity(input.len());
    output.extend_from_slice(&input[0..12]);
    for range in kept {
        let start = output.len();
        output.extend_from_slice(&input[range]);
        // Clear VP8X metadata flags for chunks that are gone
        if &output[start..start + 4] == b"VP8X" && output.len() > start + 8 {
            output[start + 8] &= !(VP8X_ICC | VP8X_EXIF | VP8X_XMP);
        }
    }
    let riff_size = (output.len() - 8) as u32;
    output[4..8].copy_from_slice(&riff_size.to_le_bytes());
    output
}
