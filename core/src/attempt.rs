use bytes::Bytes;

use crate::backend::BackendId;

/// Outcome of invoking one backend once.
///
/// A failed attempt carries the original input, so its bytes are always a
/// usable image and `size()` always equals the length of `bytes()`.
#[derive(Debug, Clone, PartialEq)]
pub struct CompressionAttempt {
    backend: BackendId,
    bytes: Bytes,
    error: Option<String>,
    duration_ms: u64,
}

impl CompressionAttempt {
    pub fn succeeded(backend: BackendId, bytes: Bytes, duration_ms: u64) -> Self {
        Self {
            backend,
            bytes,
            error: None,
            duration_ms,
        }
    }

    pub fn failed(backend: BackendId, input: Bytes, error: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            backend,
            bytes: input,
            error: Some(error.into()),
            duration_ms,
        }
    }

    /// The synthetic "no transformation" result.
    pub fn original(input: Bytes) -> Self {
        Self::succeeded(BackendId::Original, input, 0)
    }

    pub fn backend(&self) -> BackendId {
        self.backend
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }
}

/// The chosen attempt together with everything that raced.
#[derive(Debug, Clone)]
pub struct ArbitrationResult {
    pub winner: CompressionAttempt,
    /// In dispatch order
    pub attempts: Vec<CompressionAttempt>,
    pub total_duration_ms: u64,
}
