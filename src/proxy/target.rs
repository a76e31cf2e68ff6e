use crate::error::ProxyError;
use http::Uri;
use url::Url;

/// Returns the non-empty `url` query parameter of an inbound request.
pub fn extract(uri: &Uri) -> Option<String> {
    let query = uri.query()?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == "url")
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Decides which targets the proxy is willing to fetch.
#[derive(Debug, Clone, Default)]
pub struct TargetPolicy {
    allowed_hosts: Vec<String>,
}

impl TargetPolicy {
    /// An empty allow-list means every host is allowed.
    pub fn new(allowed_hosts: &[String]) -> Self {
        Self {
            allowed_hosts: allowed_hosts
                .iter()
                .map(|host| host.trim().trim_start_matches('.').to_ascii_lowercase())
                .filter(|host| !host.is_empty())
                .collect(),
        }
    }

    pub fn parse(&self, raw: &str) -> Result<Url, ProxyError> {
        let candidate = if has_scheme(raw) {
            raw.to_string()
        } else {
            format!("https://{raw}")
        };
        let url = Url::parse(&candidate)
            .map_err(|e| ProxyError::invalid_target(raw, e.to_string()))?;

        match url.scheme() {
            "http" | "https" => {}
            scheme => {
                return Err(ProxyError::invalid_target(
                    raw,
                    format!("unsupported scheme '{scheme}'"),
                ))
            }
        }

        let host = url
            .host_str()
            .ok_or_else(|| ProxyError::invalid_target(raw, "missing host"))?
            .to_ascii_lowercase();
        let host = host.trim_end_matches('.');

        if host == "onion" || host.ends_with(".onion") {
            return Err(ProxyError::blocked_target(
                host,
                "onion services are not proxied",
            ));
        }
        if !self.is_allowed(host) {
            return Err(ProxyError::blocked_target(host, "not in the allowed hosts"));
        }
        Ok(url)
    }

    fn is_allowed(&self, host: &str) -> bool {
        self.allowed_hosts.is_empty()
            || self.allowed_hosts.iter().any(|allowed| {
                host == allowed
                    || host
                        .strip_suffix(allowed.as_str())
                        .is_some_and(|prefix| prefix.ends_with('.'))
            })
    }
}

/// True when `raw` starts with `<scheme>://`. A `://` later on, e.g. inside
/// the query, does not count.
fn has_scheme(raw: &str) -> bool {
    raw.split_once("://").is_some_and(|(scheme, _)| {
        scheme.starts_with(|c: char| c.is_ascii_alphabetic())
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
    })
}
