use crate::error::ResolutionError;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::fmt;
use url::Url;

/// Characters left untouched by JavaScript's `encodeURIComponent`.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

const PREFIX: &str = "/?url=";

/// A link rewritten to go through the proxy: `/?url=<encoded absolute URL>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxiedReference(String);

impl ProxiedReference {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decodes the reference back into the absolute URL it points at.
    pub fn target(&self) -> Option<Url> {
        let encoded = self.0.strip_prefix(PREFIX)?;
        let decoded = percent_decode_str(encoded).decode_utf8().ok()?;
        Url::parse(&decoded).ok()
    }
}

impl fmt::Display for ProxiedReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Returns true for links that must be left exactly as they are.
pub fn is_passthrough(link: &str, skip_data: bool) -> bool {
    link.starts_with('#')
        || starts_with_ignore_case(link, "javascript:")
        || (skip_data && starts_with_ignore_case(link, "data:"))
}

fn starts_with_ignore_case(value: &str, prefix: &str) -> bool {
    value
        .get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

/// Resolves `link` against `base`, expanding protocol-relative links with the
/// scheme of the base.
pub fn resolve(link: &str, base: &Url) -> Result<Url, ResolutionError> {
    let resolved = if let Some(rest) = link.strip_prefix("//") {
        Url::parse(&format!("{}://{}", base.scheme(), rest))
    } else {
        base.join(link)
    };
    resolved.map_err(|source| ResolutionError {
        link: link.to_string(),
        base: base.to_string(),
        source,
    })
}

pub fn encode(url: &Url) -> ProxiedReference {
    ProxiedReference(format!(
        "{PREFIX}{}",
        utf8_percent_encode(url.as_str(), COMPONENT)
    ))
}

/// Resolves and encodes in one step, the shape every body rewriter needs.
pub fn proxy_link(link: &str, base: &Url) -> Result<ProxiedReference, ResolutionError> {
    resolve(link, base).map(|url| encode(&url))
}
