//! Shared HTTP plumbing for the outbound `ureq` clients.

use std::time::Duration;

use thiserror::Error;

/// Longest response-body excerpt kept in an error message.
const BODY_EXCERPT_CHARS: usize = 512;

/// Failure of one outbound HTTP exchange.
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("HTTP {status} from {url}: {body}")]
    Status {
        status: u16,
        url: String,
        body: String,
    },

    #[error("transport error calling {url}: {message}")]
    Transport { url: String, message: String },

    #[error("unexpected response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("invalid endpoint '{0}'")]
    InvalidEndpoint(String),
}

impl HttpError {
    pub(crate) fn from_ureq(url: &str, err: ureq::Error) -> Self {
        match err {
            ureq::Error::Status(status, response) => {
                let body = response.into_string().unwrap_or_default();
                Self::Status {
                    status,
                    url: url.to_string(),
                    body: excerpt(&body),
                }
            }
            ureq::Error::Transport(transport) => Self::Transport {
                url: url.to_string(),
                message: transport.to_string(),
            },
        }
    }

    pub(crate) fn decode(url: &str, message: impl std::fmt::Display) -> Self {
        Self::Decode {
            url: url.to_string(),
            message: message.to_string(),
        }
    }
}

/// Agent shared by every request a client makes. Per-call timeouts are set on
/// each request from the caller's deadline.
pub(crate) fn agent(connect_timeout: Duration) -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout_connect(connect_timeout)
        .user_agent(concat!("ragq/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Trim a trailing slash and reject anything that is not an http(s) URL.
pub(crate) fn normalize_base_url(raw: &str) -> Result<String, HttpError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        Ok(trimmed.to_string())
    } else {
        Err(HttpError::InvalidEndpoint(raw.to_string()))
    }
}

fn excerpt(body: &str) -> String {
    match body.char_indices().nth(BODY_EXCERPT_CHARS) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
