//! Error types for a single proxied exchange.

use crate::proxy::http::full;
use bytes::Bytes;
use http::{header::CONTENT_TYPE, Response, StatusCode};
use http_body_util::combinators::BoxBody;
use thiserror::Error;

/// A link that could not be resolved against the base URL of the response.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Cannot resolve '{link}' against {base}: {source}")]
pub struct ResolutionError {
    pub link: String,
    pub base: String,
    #[source]
    pub source: url::ParseError,
}

/// Errors that end a proxied exchange with a proxy-level response.
#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("Invalid target URL '{target}': {reason}")]
    InvalidTarget { target: String, reason: String },

    #[error("Target host denied: {host}: {reason}")]
    BlockedTarget { host: String, reason: String },

    #[error("Invalid redirect location: {0}")]
    Redirect(#[from] ResolutionError),

    #[error("Error fetching target: {}", error_chain(.0))]
    Dispatch(#[from] hyper_util::client::legacy::Error),

    #[error("Error reading response body: {0}")]
    Body(#[source] hyper::Error),

    #[error("Error decoding response body: {0}")]
    Decode(#[source] std::io::Error),

    #[error("Error building response: {0}")]
    Http(#[from] http::Error),
}

/// Joins an error with all of its sources, outermost first.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

impl ProxyError {
    pub fn invalid_target(target: &str, reason: impl Into<String>) -> Self {
        Self::InvalidTarget {
            target: target.to_string(),
            reason: reason.into(),
        }
    }

    pub fn blocked_target(host: &str, reason: impl Into<String>) -> Self {
        Self::BlockedTarget {
            host: host.to_string(),
            reason: reason.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidTarget { .. } | Self::BlockedTarget { .. } => StatusCode::BAD_REQUEST,
            Self::Redirect(_) | Self::Dispatch(_) => StatusCode::BAD_GATEWAY,
            Self::Body(_) | Self::Decode(_) | Self::Http(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Renders the error as a plain-text response for the client.
    pub fn into_response(self) -> Response<BoxBody<Bytes, anyhow::Error>> {
        let mut response = Response::new(full(self.to_string()));
        *response.status_mut() = self.status();
        response.headers_mut().insert(
            CONTENT_TYPE,
            http::HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        response
    }
}
