use super::link::proxy_link;
use regex::{Captures, Regex};
use std::sync::LazyLock;
use url::Url;

static URL_TOKEN_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)url\(\s*['"]?([^'")]+?)['"]?\s*\)"#).unwrap());

/// Rewrites every `url(...)` token. Data URIs, absolute, protocol-relative and
/// relative values all go through the same resolve-and-encode step.
pub fn rewrite(css: &str, base: &Url) -> String {
    URL_TOKEN_REGEX
        .replace_all(css, |caps: &Captures| {
            let value = caps[1].trim();
            match proxy_link(value, base) {
                Ok(reference) => format!("url(\"{reference}\")"),
                Err(e) => {
                    tracing::debug!("Leaving CSS url() untouched: {e}");
                    caps[0].to_string()
                }
            }
        })
        .into_owned()
}
