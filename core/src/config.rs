use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::backend::BackendId;
use crate::error::CompressError;

pub const DEFAULT_QUALITY: f32 = 0.6;

/// How a backend should trade size against fidelity. Backends decide what it means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CompressMode {
    #[default]
    KeepSize,
    KeepQuality,
}

impl fmt::Display for CompressMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KeepSize => write!(f, "keepSize"),
            Self::KeepQuality => write!(f, "keepQuality"),
        }
    }
}

impl FromStr for CompressMode {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "keepsize" | "keep-size" | "keep_size" => Ok(Self::KeepSize),
            "keepquality" | "keep-quality" | "keep_quality" => Ok(Self::KeepQuality),
            _ => Err(format!("unknown compress mode: {s}")),
        }
    }
}

/// Representation of the returned image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    #[default]
    #[serde(alias = "buffer")]
    Bytes,
    Base64,
    Blob,
    File,
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bytes => write!(f, "bytes"),
            Self::Base64 => write!(f, "base64"),
            Self::Blob => write!(f, "blob"),
            Self::File => write!(f, "file"),
        }
    }
}

impl FromStr for OutputKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bytes" | "buffer" => Ok(Self::Bytes),
            "base64" => Ok(Self::Base64),
            "blob" => Ok(Self::Blob),
            "file" => Ok(Self::File),
            _ => Err(format!("unknown output kind: {s}")),
        }
    }
}

/// Credential or other per-backend setting supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ToolConfig {
    pub backend: BackendId,
    pub key: Option<String>,
}

/// Options for one compression call.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CompressOptions {
    /// Quality 0.0-1.0, passed to every backend and used by the not-worth-it guard
    pub quality: f32,
    pub mode: CompressMode,
    /// Requested output size; backends decide between exact and fitted resizing
    pub target_width: Option<u32>,
    pub target_height: Option<u32>,
    /// Bounding box the output must fit in
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
    /// Only race backends that can keep EXIF/ICC/XMP metadata
    pub preserve_metadata: bool,
    pub return_all_attempts: bool,
    pub output: OutputKind,
    pub tool_configs: Vec<ToolConfig>,
}

impl Default for CompressOptions {
    fn default() -> Self {
        Self {
            quality: DEFAULT_QUALITY,
            mode: CompressMode::KeepSize,
            target_width: None,
            target_height: None,
            max_width: None,
            max_height: None,
            preserve_metadata: false,
            return_all_attempts: false,
            output: OutputKind::Bytes,
            tool_configs: Vec::new(),
        }
    }
}

impl CompressOptions {
    /// Options equivalent to the positional `(quality, output)` call form.
    pub fn legacy(quality: Option<f32>, output: Option<OutputKind>) -> Self {
        Self {
            quality: quality.unwrap_or(DEFAULT_QUALITY),
            mode: CompressMode::KeepSize,
            output: output.unwrap_or_default(),
            ..Self::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn with_quality(mut self, quality: f32) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_output(mut self, output: OutputKind) -> Self {
        self.output = output;
        self
    }

    pub fn with_tool_key(mut self, backend: BackendId, key: impl Into<String>) -> Self {
        self.tool_configs.push(ToolConfig {
            backend,
            key: Some(key.into()),
        });
        self
    }

    pub fn validate(&self) -> Result<(), CompressError> {
        if !self.quality.is_finite() || !(0.0..=1.0).contains(&self.quality) {
            return Err(CompressError::InvalidInput(format!(
                "quality must be between 0 and 1, got {}",
                self.quality
            )));
        }
        Ok(())
    }

    /// Key configured for a backend in `tool_configs`.
    pub fn tool_key(&self, backend: BackendId) -> Option<&str> {
        self.tool_configs
            .iter()
            .find(|c| c.backend == backend)
            .and_then(|c| c.key.as_deref())
    }

    pub fn has_resize(&self) -> bool {
        self.target_width.is_some()
            || self.target_height.is_some()
            || self.max_width.is_some()
            || self.max_height.is_some()
    }

    pub fn encode_settings(&self) -> EncodeSettings {
        EncodeSettings::from(self)
    }
}

/// Which metadata chunks an encoder keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StripMode {
    All,
    None,
}

impl fmt::Display for StripMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::None => write!(f, "none"),
        }
    }
}

/// Encoder-level settings derived from [`CompressOptions`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncodeSettings {
    /// Quality 1-100
    pub quality: u8,
    /// Quantizer speed 1-10 (1 = slowest/best)
    pub speed: i32,
    /// Skip lossy steps
    pub lossless: bool,
    pub strip: StripMode,
}

impl From<&CompressOptions> for EncodeSettings {
    fn from(options: &CompressOptions) -> Self {
        let quality = (options.quality * 100.0).round().clamp(1.0, 100.0) as u8;
        Self {
            quality,
            speed: 3,
            lossless: options.mode == CompressMode::KeepQuality,
            strip: if options.preserve_metadata {
                StripMode::None
            } else {
                StripMode::All
            },
        }
    }
}

impl Default for EncodeSettings {
    fn default() -> Self {
        EncodeSettings::from(&CompressOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let opts = CompressOptions::default();
        assert_eq!(opts.quality, 0.6);
        assert_eq!(opts.mode, CompressMode::KeepSize);
        assert!(!opts.preserve_metadata);
        assert!(!opts.return_all_attempts);
        assert_eq!(opts.output, OutputKind::Bytes);
    }

    #[test]
    fn legacy_form_maps_to_keep_size() {
        let opts = CompressOptions::legacy(Some(0.8), Some(OutputKind::Base64));
        assert_eq!(opts.quality, 0.8);
        assert_eq!(opts.mode, CompressMode::KeepSize);
        assert_eq!(opts.output, OutputKind::Base64);

        let opts = CompressOptions::legacy(None, None);
        assert_eq!(opts.quality, DEFAULT_QUALITY);
        assert_eq!(opts.output, OutputKind::Bytes);
    }

    #[test]
    fn rejects_out_of_range_quality() {
        assert!(CompressOptions::default().with_quality(1.5).validate().is_err());
        assert!(CompressOptions::default().with_quality(-0.1).validate().is_err());
        assert!(CompressOptions::default().with_quality(f32::NAN).validate().is_err());
        assert!(CompressOptions::default().with_quality(0.0).validate().is_ok());
        assert!(CompressOptions::default().with_quality(1.0).validate().is_ok());
    }

    #[test]
    fn parses_json_options() {
        let opts = CompressOptions::from_json(
            r#"{"quality":0.9,"mode":"keepQuality","maxWidth":800,"preserveMetadata":true,
                "output":"buffer","toolConfigs":[{"backend":"tinify","key":"abc"}]}"#,
        )
        .unwrap();
        assert_eq!(opts.quality, 0.9);
        assert_eq!(opts.mode, CompressMode::KeepQuality);
        assert_eq!(opts.max_width, Some(800));
        assert!(opts.preserve_metadata);
        assert_eq!(opts.output, OutputKind::Bytes);
        assert_eq!(opts.tool_key(BackendId::Tinify), Some("abc"));
        assert_eq!(opts.tool_key(BackendId::Codec), None);
    }

    #[test]
    fn encode_settings_follow_options() {
        let mut opts = CompressOptions::default().with_quality(0.004);
        assert_eq!(opts.encode_settings().quality, 1);
        opts.quality = 0.75;
        opts.mode = CompressMode::KeepQuality;
        opts.preserve_metadata = true;
        let settings = opts.encode_settings();
        assert_eq!(settings.quality, 75);
        assert!(settings.lossless);
        assert_eq!(settings.strip, StripMode::None);
    }

    #[test]
    fn mode_and_output_round_trip_through_strings() {
        assert_eq!("keepQuality".parse::<CompressMode>(), Ok(CompressMode::KeepQuality));
        assert_eq!(CompressMode::KeepSize.to_string(), "keepSize");
        assert_eq!("buffer".parse::<OutputKind>(), Ok(OutputKind::Bytes));
        assert!("pdf".parse::<OutputKind>().is_err());
    }
}
