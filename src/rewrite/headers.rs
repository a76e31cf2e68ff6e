use http::header::{HeaderMap, HeaderName, HeaderValue, CONNECTION, SET_COOKIE};

/// Response headers that are never forwarded to the client.
const DENIED_HEADERS: &[&str] = &[
    "content-security-policy",
    "content-security-policy-report-only",
    "clear-site-data",
    "set-cookie2",
];

/// Connection-level headers that only describe the hop they arrived on.
const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Response headers after sanitization, with the `Set-Cookie` values pulled out
/// for the cookie rewriter.
#[derive(Debug, Default)]
pub struct SanitizedHeaders {
    pub headers: HeaderMap,
    pub set_cookies: Vec<HeaderValue>,
}

pub fn sanitize(headers: &HeaderMap) -> SanitizedHeaders {
    let mut sanitized = SanitizedHeaders::default();
    for (name, value) in headers.iter() {
        if *name == SET_COOKIE {
            sanitized.set_cookies.push(value.clone());
        } else if DENIED_HEADERS.contains(&name.as_str()) {
            tracing::debug!("Dropping response header {name}");
        } else {
            sanitized.headers.append(name.clone(), value.clone());
        }
    }
    sanitized
}

/// Removes hop-by-hop headers, including any listed in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();
    for name in listed {
        headers.remove(name);
    }
    for name in HOP_BY_HOP_HEADERS {
        headers.remove(*name);
    }
}
