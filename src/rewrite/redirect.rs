use super::link::{proxy_link, ProxiedReference};
use crate::error::ResolutionError;
use http::{header::LOCATION, HeaderMap, StatusCode};
use url::Url;

/// Returns the proxied `Location` for a redirect response, or `None` when the
/// response is not a redirect.
pub fn intercept(
    status: StatusCode,
    headers: &HeaderMap,
    base: &Url,
) -> Option<Result<ProxiedReference, ResolutionError>> {
    if !status.is_redirection() {
        return None;
    }
    let location = headers.get(LOCATION)?;
    let location = String::from_utf8_lossy(location.as_bytes());
    Some(proxy_link(location.trim(), base))
}
