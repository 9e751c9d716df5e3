use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::CompressError;
use crate::format::{mime_from_file_name, DEFAULT_MIME};

/// A named, sized image that can be read once.
#[async_trait]
pub trait ImageSource: Send + Sync {
    fn name(&self) -> &str;
    fn size(&self) -> u64;
    fn mime_type(&self) -> &str;
    async fn read_all(&self) -> io::Result<Bytes>;
}

/// Anything a compression call accepts.
pub enum Input {
    Bytes(Bytes),
    Source(Box<dyn ImageSource>),
}

impl Input {
    pub fn from_source<S: ImageSource + 'static>(source: S) -> Self {
        Input::Source(Box::new(source))
    }

    /// File name hint carried into materialized descriptors.
    pub fn name(&self) -> Option<&str> {
        match self {
            Input::Bytes(_) => None,
            Input::Source(source) => Some(source.name()),
        }
    }

    /// Read the whole input into one shared buffer. Empty input is rejected.
    pub async fn into_bytes(self) -> Result<Bytes, CompressError> {
        let bytes = match self {
            Input::Bytes(bytes) => bytes,
            Input::Source(source) => source.read_all().await?,
        };
        if bytes.is_empty() {
            return Err(CompressError::InvalidInput("input must not be empty".into()));
        }
        Ok(bytes)
    }
}

impl fmt::Debug for Input {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Input::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            Input::Source(source) => f.debug_tuple("Source").field(&source.name()).finish(),
        }
    }
}

impl From<Bytes> for Input {
    fn from(bytes: Bytes) -> Self {
        Input::Bytes(bytes)
    }
}

impl From<Vec<u8>> for Input {
    fn from(bytes: Vec<u8>) -> Self {
        Input::Bytes(Bytes::from(bytes))
    }
}

impl From<&'static [u8]> for Input {
    fn from(bytes: &'static [u8]) -> Self {
        Input::Bytes(Bytes::from_static(bytes))
    }
}

/// An image file on disk, read with `tokio::fs` when the call runs.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    name: String,
    size: u64,
    mime: &'static str,
}

impl FileSource {
    pub async fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let meta = tokio::fs::metadata(&path).await?;
        if !meta.is_file() {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "not a file"));
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mime = mime_from_file_name(&name).unwrap_or(DEFAULT_MIME);
        Ok(Self {
            path,
            name,
            size: meta.len(),
            mime,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ImageSource for FileSource {
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
        tokio::fs::read(&self.path).await.map(Bytes::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_bytes_are_invalid() {
        let err = Input::from(Vec::new()).into_bytes().await.unwrap_err();
        assert!(matches!(err, CompressError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn static_slices_are_not_copied() {
        static DATA: &[u8] = b"\xFF\xD8\xFF";
        let bytes = Input::from(DATA).into_bytes().await.unwrap();
        assert_eq!(bytes.as_ptr(), DATA.as_ptr());
    }

    #[tokio::test]
    async fn file_source_reads_path() {
        let path = std::env::temp_dir().join(format!("image_arbiter_input_{}.png", std::process::id()));
        tokio::fs::write(&path, b"\x89PNG\r\n\x1a\n").await.unwrap();

        let source = FileSource::open(&path).await.unwrap();
        assert_eq!(source.size(), 8);
        assert_eq!(source.mime_type(), "image/png");

        let input = Input::from_source(source);
        assert!(input.name().is_some_and(|n| n.ends_with(".png")));
        assert_eq!(input.into_bytes().await.unwrap().len(), 8);

        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn missing_file_fails_to_open() {
        assert!(FileSource::open("/definitely/not/here.jpg").await.is_err());
    }
}
