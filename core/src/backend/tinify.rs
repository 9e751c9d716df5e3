use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;

use crate::backend::{ensure_non_empty, unless_negligible, Backend, BackendId};
use crate::config::CompressOptions;
use crate::error::BackendError;

/// Environment variable consulted when no key is passed in the options.
pub const API_KEY_ENV: &str = "TINIFY_API_KEY";

const DEFAULT_ENDPOINT: &str = "https://api.tinify.com";

/// Compression through the Tinify web service.
///
/// Needs an API key, either from [`CompressOptions::tool_configs`] or from
/// `TINIFY_API_KEY`. Metadata is always dropped by the service.
pub struct TinifyBackend {
    endpoint: String,
    key_env: &'static str,
    #[cfg(feature = "tinify")]
    client: reqwest::Client,
}

impl TinifyBackend {
    pub fn new() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            key_env: API_KEY_ENV,
            #[cfg(feature = "tinify")]
            client: reqwest::Client::new(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    /// Read the key from a different environment variable.
    pub fn with_key_env(mut self, var: &'static str) -> Self {
        self.key_env = var;
        self
    }

    fn api_key(&self, options: &CompressOptions) -> Result<String, BackendError> {
        options
            .tool_key(BackendId::Tinify)
            .filter(|key| !key.is_empty())
            .map(str::to_string)
            .or_else(|| std::env::var(self.key_env).ok().filter(|key| !key.is_empty()))
            .ok_or(BackendError::MissingCredential {
                backend: BackendId::Tinify,
                env_var: self.key_env,
            })
    }

    #[cfg(feature = "tinify")]
    async fn shrink(&self, input: Bytes, key: &str, options: &CompressOptions) -> Result<Bytes, BackendError> {
        use serde::Deserialize;

        #[derive(Deserialize)]
        struct ShrinkResponse {
            output: ShrinkOutput,
        }

        #[derive(Deserialize)]
        struct ShrinkOutput {
            url: String,
        }

        let response = self
            .client
            .post(format!("{}/shrink", self.endpoint))
            .basic_auth("api", Some(key))
            .body(input)
            .send()
            .await
            .map_err(remote)?;
        let location = check_status(response)
            .await?
            .json::<ShrinkResponse>()
            .await
            .map_err(remote)?
            .output
            .url;

        let request = match ResizeRequest::from_options(options) {
            Some(resize) => {
                log::debug!("Requesting Tinify {} resize", resize.method);
                self.client
                    .post(&location)
                    .json(&serde_json::json!({ "resize": resize }))
            }
            None => self.client.get(&location),
        };
        let response = request.basic_auth("api", Some(key)).send().await.map_err(remote)?;
        check_status(response).await?.bytes().await.map_err(remote)
    }

    #[cfg(not(feature = "tinify"))]
    async fn shrink(&self, _input: Bytes, _key: &str, _options: &CompressOptions) -> Result<Bytes, BackendError> {
        Err(disabled())
    }
}

impl Default for TinifyBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Backend for TinifyBackend {
    fn id(&self) -> BackendId {
        BackendId::Tinify
    }

    fn preserves_metadata(&self) -> bool {
        false
    }

    fn probe(&self) -> Result<(), BackendError> {
        #[cfg(feature = "tinify")]
        {
            Ok(())
        }
        #[cfg(not(feature = "tinify"))]
        {
            Err(disabled())
        }
    }

    async fn compress(&self, input: Bytes, options: &CompressOptions) -> Result<Bytes, BackendError> {
        ensure_non_empty(&input)?;
        let key = self.api_key(options)?;
        let output = self.shrink(input.clone(), &key, options).await?;
        if output.is_empty() {
            return Err(BackendError::EmptyOutput);
        }
        Ok(unless_negligible(input, output.to_vec()))
    }
}

#[cfg(not(feature = "tinify"))]
fn disabled() -> BackendError {
    BackendError::Unavailable {
        backend: BackendId::Tinify,
        reason: "built without the `tinify` feature".into(),
    }
}

#[cfg(feature = "tinify")]
fn remote(err: reqwest::Error) -> BackendError {
    BackendError::Remote(err.to_string())
}

#[cfg(feature = "tinify")]
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    #[derive(serde::Deserialize)]
    struct ApiError {
        error: String,
        message: String,
    }

    let body = response.text().await.unwrap_or_default();
    let detail = match serde_json::from_str::<ApiError>(&body) {
        Ok(err) => format!("{}: {}", err.error, err.message),
        Err(_) => body,
    };
    Err(BackendError::Remote(format!("HTTP {}: {}", status, detail)))
}

/// Body of a Tinify resize call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResizeRequest {
    pub method: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

impl ResizeRequest {
    /// `fit` needs both sides; with a single side the service only accepts `scale`.
    pub fn from_options(options: &CompressOptions) -> Option<Self> {
        if !options.has_resize() {
            return None;
        }
        let (width, height) = match (options.target_width, options.target_height) {
            (Some(w), Some(h)) => (Some(w), Some(h)),
            _ if options.max_width.is_some() || options.max_height.is_some() => {
                (options.max_width, options.max_height)
            }
            (w, h) => (w, h),
        };
        let method = match (width, height) {
            (Some(_), Some(_)) => "fit",
            (Some(_), None) | (None, Some(_)) => "scale",
            (None, None) => return None,
        };
        Some(Self { method, width, height })
    }
}
