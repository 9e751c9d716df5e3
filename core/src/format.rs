use std::fmt;

const PNG_MAGIC: &[u8; 8] = b"\x89PNG\r\n\x1a\n";
const JPEG_MAGIC: &[u8; 2] = b"\xFF\xD8";

/// Image container family, inferred from the leading bytes of a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerType {
    Png,
    Jpeg,
    Webp,
    Gif,
    Unknown,
}

impl ContainerType {
    /// Classify a buffer by its signature.
    ///
    /// Checks run in a fixed order (PNG, JPEG, WebP, GIF). A buffer shorter
    /// than a signature simply fails that comparison.
    pub fn classify(buffer: &[u8]) -> Self {
        if buffer.starts_with(PNG_MAGIC) {
            ContainerType::Png
        } else if buffer.starts_with(JPEG_MAGIC) {
            ContainerType::Jpeg
        } else if buffer.len() >= 12 && &buffer[0..4] == b"RIFF" && &buffer[8..12] == b"WEBP" {
            ContainerType::Webp
        } else if buffer.starts_with(b"GIF87a") || buffer.starts_with(b"GIF89a") {
            ContainerType::Gif
        } else {
            ContainerType::Unknown
        }
    }

    /// The container used for backend selection. Unknown buffers are treated as JPEG.
    pub fn selection_key(&self) -> Self {
        match self {
            ContainerType::Unknown => ContainerType::Jpeg,
            other => *other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerType::Png => "PNG",
            ContainerType::Jpeg => "JPEG",
            ContainerType::Webp => "WebP",
            ContainerType::Gif => "GIF",
            ContainerType::Unknown => "unknown",
        }
    }

    /// MIME type of the container. Unknown maps to JPEG, like selection does.
    pub fn mime(&self) -> &'static str {
        match self {
            ContainerType::Png => "image/png",
            ContainerType::Webp => "image/webp",
            ContainerType::Gif => "image/gif",
            ContainerType::Jpeg | ContainerType::Unknown => "image/jpeg",
        }
    }

    /// Matching codec in the `image` crate, if any.
    pub fn image_format(&self) -> Option<image::ImageFormat> {
        match self {
            ContainerType::Png => Some(image::ImageFormat::Png),
            ContainerType::Jpeg => Some(image::ImageFormat::Jpeg),
            ContainerType::Webp => Some(image::ImageFormat::WebP),
            ContainerType::Gif => Some(image::ImageFormat::Gif),
            ContainerType::Unknown => None,
        }
    }
}

impl fmt::Display for ContainerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Default MIME type for materialized results when the file name gives no hint.
pub const DEFAULT_MIME: &str = "image/png";

/// MIME type for a file name, looked up by the text after its last dot.
pub fn mime_from_file_name(name: &str) -> Option<&'static str> {
    let ext = name.rsplit('.').next()?.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "bmp" => Some("image/bmp"),
        "tiff" => Some("image/tiff"),
        "svg" => Some("image/svg+xml"),
        _ => None,
    }
}
