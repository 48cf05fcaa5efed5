//! Error taxonomy for deployment resolution and culprit attribution.

/// Errors produced while talking to the forge or interpreting what it (or a
/// version marker endpoint) returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeployError {
    #[error("Timeout error trying to load {url}")]
    UpstreamTimeout { url: String },

    #[error("{status} trying to load {url}")]
    UpstreamHttpError { url: String, status: u16 },

    #[error("Doesn't look like a sha\n ({content}) on {url}")]
    UnrecognizedRevisionFormat { content: String, url: String },

    #[error("malformed comment entry from {url}: {reason}")]
    MalformedCommentEntry { url: String, reason: String },

    #[error("transport error trying to load {url}: {message}")]
    Transport { url: String, message: String },

    #[error("could not decode response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("refusing to use {value:?} as a URL path segment")]
    InvalidPathSegment { value: String },

    #[error("configuration error: {0}")]
    Config(String),
}

impl DeployError {
    /// Translate a reqwest failure for `url` into the matching variant.
    pub(crate) fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            DeployError::UpstreamTimeout {
                url: url.to_string(),
            }
        } else if err.is_decode() {
            DeployError::Decode {
                url: url.to_string(),
                message: err.to_string(),
            }
        } else if let Some(status) = err.status() {
            DeployError::UpstreamHttpError {
                url: url.to_string(),
                status: status.as_u16(),
            }
        } else {
            DeployError::Transport {
                url: url.to_string(),
                message: err.to_string(),
            }
        }
    }

    /// Report the failure against `url` instead of the URL actually fetched.
    ///
    /// Used for version markers, which are fetched with a cache-busting
    /// parameter the user never typed.
    pub(crate) fn for_url(self, url: &str) -> Self {
        let url = url.to_string();
        match self {
            DeployError::UpstreamTimeout { .. } => DeployError::UpstreamTimeout { url },
            DeployError::UpstreamHttpError { status, .. } => {
                DeployError::UpstreamHttpError { url, status }
            }
            DeployError::Transport { message, .. } => DeployError::Transport { url, message },
            DeployError::Decode { message, .. } => DeployError::Decode { url, message },
            other => other,
        }
    }
}

/// Result type for whatsdeployed operations.
pub type Result<T> = std::result::Result<T, DeployError>;
