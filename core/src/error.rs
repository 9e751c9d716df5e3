use thiserror::Error;

use crate::backend::BackendId;
use crate::format::ContainerType;

/// Request-level failures. These are the only errors a caller ever sees.
#[derive(Debug, Error)]
pub enum CompressError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(
        "no capable backend available for {container} input; \
         check the candidate table or disable metadata preservation"
    )]
    NoCapableBackend { container: ContainerType },

    #[error("failed to read input: {0}")]
    ReadInput(#[from] std::io::Error),
}

/// Failure of a single backend. Contained in the backend's attempt during a race.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend {backend} unavailable: {reason}")]
    Unavailable { backend: BackendId, reason: String },

    #[error("{backend} requires an API key: set {env_var} or pass it in tool configs")]
    MissingCredential {
        backend: BackendId,
        env_var: &'static str,
    },

    #[error("invalid input buffer: {0}")]
    InvalidInput(String),

    #[error("failed to decode image: {0}")]
    Decode(String),

    #[error("quantization failed: {0}")]
    Quantize(String),

    #[error("encoding failed: {0}")]
    Encode(String),

    #[error("optimization failed: {0}")]
    Optimize(String),

    #[error("remote service error: {0}")]
    Remote(String),

    #[error("backend returned an empty buffer")]
    EmptyOutput,

    #[error("backend task failed: {0}")]
    TaskFailed(String),
}

impl BackendError {
    /// True when the backend ran and failed mid-operation, as opposed to never
    /// being usable (unavailable or unconfigured).
    pub fn is_compression_failure(&self) -> bool {
        !matches!(
            self,
            BackendError::Unavailable { .. } | BackendError::MissingCredential { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_failure_families() {
        let unavailable = BackendError::Unavailable {
            backend: BackendId::Tinify,
            reason: "feature disabled".into(),
        };
        assert!(!unavailable.is_compression_failure());
        assert!(BackendError::Decode("bad header".into()).is_compression_failure());
        assert!(BackendError::EmptyOutput.is_compression_failure());
    }

    #[test]
    fn messages_name_the_backend() {
        let err = BackendError::MissingCredential {
            backend: BackendId::Tinify,
            env_var: "TINIFY_API_KEY",
        };
        let msg = err.to_string();
        assert!(msg.contains("tinify"));
        assert!(msg.contains("TINIFY_API_KEY"));

        let err = CompressError::NoCapableBackend {
            container: ContainerType::Png,
        };
        assert!(err.to_string().contains("PNG"));
    }
}
