use super::http::full;
use crate::config::Credentials;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use hyper::{
    header::{HeaderValue, AUTHORIZATION, WWW_AUTHENTICATE},
    HeaderMap, Response, StatusCode,
};

const REALM: &str = r#"Basic realm="Proxy Login""#;

/// Basic-Auth check in front of the proxy. Without credentials every request
/// is let through.
#[derive(Debug, Clone, Default)]
pub struct AccessGate {
    credentials: Option<Credentials>,
}

impl AccessGate {
    pub fn new(credentials: Option<Credentials>) -> Self {
        Self { credentials }
    }

    pub fn is_enabled(&self) -> bool {
        self.credentials.is_some()
    }

    pub fn authorize(&self, headers: &HeaderMap) -> bool {
        let Some(credentials) = &self.credentials else {
            return true;
        };
        let Some(encoded) = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| {
                let (scheme, rest) = v.trim().split_once(' ')?;
                scheme.eq_ignore_ascii_case("basic").then_some(rest.trim())
            })
        else {
            tracing::debug!("Missing Basic authorization");
            return false;
        };

        let Ok(decoded) = STANDARD.decode(encoded) else {
            tracing::debug!("Malformed Basic authorization");
            return false;
        };
        let Ok(decoded) = std::str::from_utf8(&decoded) else {
            return false;
        };
        match decoded.split_once(':') {
            Some((username, password)) => {
                username == credentials.username && password == credentials.password
            }
            None => false,
        }
    }
}

pub fn unauthorized() -> Response<BoxBody<Bytes, anyhow::Error>> {
    let mut response = Response::new(full("Unauthorized"));
    *response.status_mut() = StatusCode::UNAUTHORIZED;
    response
        .headers_mut()
        .insert(WWW_AUTHENTICATE, HeaderValue::from_static(REALM));
    response
}
