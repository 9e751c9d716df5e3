use std::io;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use serde::Serialize;

use crate::config::OutputKind;
use crate::format::{mime_from_file_name, DEFAULT_MIME};
use crate::input::ImageSource;

pub const DEFAULT_FILE_NAME: &str = "compressed";

/// In-memory blob: bytes plus size and MIME type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlobDescriptor {
    pub size: u64,
    pub mime: &'static str,
    #[serde(skip)]
    pub bytes: Bytes,
}

impl BlobDescriptor {
    pub fn new(bytes: Bytes, mime: &'static str) -> Self {
        Self {
            size: bytes.len() as u64,
            mime,
            bytes,
        }
    }
}

/// A named blob.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileDescriptor {
    pub name: String,
    pub size: u64,
    pub mime: &'static str,
    #[serde(skip)]
    pub bytes: Bytes,
}

/// The compressed image in the representation the caller asked for.
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    Bytes(Bytes),
    Base64(String),
    Blob(BlobDescriptor),
    File(FileDescriptor),
}

impl Output {
    pub fn kind(&self) -> OutputKind {
        match self {
            Output::Bytes(_) => OutputKind::Bytes,
            Output::Base64(_) => OutputKind::Base64,
            Output::Blob(_) => OutputKind::Blob,
            Output::File(_) => OutputKind::File,
        }
    }

    /// Raw bytes, unless the output is base64 text.
    pub fn bytes(&self) -> Option<&Bytes> {
        match self {
            Output::Bytes(bytes) => Some(bytes),
            Output::Base64(_) => None,
            Output::Blob(blob) => Some(&blob.bytes),
            Output::File(file) => Some(&file.bytes),
        }
    }
}

/// Wrap bytes as `kind`. The MIME type of blob and file outputs comes from
/// the extension of `name_hint`, falling back to `image/png`.
pub fn materialize(bytes: Bytes, kind: OutputKind, name_hint: Option<&str>) -> Output {
    let mime = name_hint.and_then(mime_from_file_name).unwrap_or(DEFAULT_MIME);
    match kind {
        OutputKind::Bytes => Output::Bytes(bytes),
        OutputKind::Base64 => Output::Base64(STANDARD.encode(&bytes)),
        OutputKind::Blob => Output::Blob(BlobDescriptor::new(bytes, mime)),
        OutputKind::File => Output::File(FileDescriptor {
            name: name_hint.unwrap_or(DEFAULT_FILE_NAME).to_string(),
            size: bytes.len() as u64,
            mime,
            bytes,
        }),
    }
}

#[async_trait]
impl ImageSource for BlobDescriptor {
    fn name(&self) -> &str {
        DEFAULT_FILE_NAME
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn mime_type(&self) -> &str {
        self.mime
    }

    async fn read_all(&self) -> io::Result<Bytes> {
        Ok(self.bytes.clone())
    }
}

#[async_trait]
impl ImageSource for FileDescriptor {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn mime_type(&self) -> &str {
        self.mime
    }

    async fn read_all(&self) -> io::Result<Bytes> {
        Ok(self.bytes.clone())
    }
}
