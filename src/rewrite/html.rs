use super::link::{is_passthrough, proxy_link};
use regex::{Captures, Regex};
use std::sync::LazyLock;
use url::Url;

static ATTRIBUTE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\b(href|src|action|formaction)=["']([^"']+)["']"#).unwrap()
});

static SCRIPT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r#"(?i)\b(location\.href\s*=\s*|window\.open\s*\(|fetch\s*\(|"#,
        r#"XMLHttpRequest\.open\s*\(\s*['"](?:GET|POST|PUT|DELETE|OPTIONS|HEAD)['"]\s*,\s*)"#,
        r#"["']([^"']+)["']"#,
    ))
    .unwrap()
});

static HEAD_OPEN_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<head(?:\s[^>]*)?>").unwrap());

/// Rewrites URL-bearing attributes and the known inline-script call shapes so
/// they point back at the proxy.
pub fn rewrite(html: &str, base: &Url) -> String {
    let html = rewrite_attributes(html, base);
    rewrite_scripts(&html, base)
}

fn rewrite_attributes(html: &str, base: &Url) -> String {
    ATTRIBUTE_REGEX
        .replace_all(html, |caps: &Captures| {
            let attr = &caps[1];
            let link = &caps[2];
            match proxied(link, base) {
                Some(reference) => format!("{attr}=\"{reference}\""),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

fn rewrite_scripts(html: &str, base: &Url) -> String {
    SCRIPT_REGEX
        .replace_all(html, |caps: &Captures| {
            let prefix = &caps[1];
            let link = &caps[2];
            match proxied(link, base) {
                Some(reference) => format!("{prefix}\"{reference}\""),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

fn proxied(link: &str, base: &Url) -> Option<String> {
    if is_passthrough(link, true) {
        return None;
    }
    match proxy_link(link, base) {
        Ok(reference) => Some(reference.to_string()),
        Err(e) => {
            tracing::debug!("Leaving link untouched: {e}");
            None
        }
    }
}

/// Places `snippet` right before the closing body tag, or at the end of the
/// document when there is none.
pub fn inject_before_body_end(html: &str, snippet: &str) -> String {
    // ASCII lowercasing keeps byte offsets identical to the original.
    let position = html.to_ascii_lowercase().rfind("</body");
    let mut out = String::with_capacity(html.len() + snippet.len());
    match position {
        Some(index) => {
            out.push_str(&html[..index]);
            out.push_str(snippet);
            out.push_str(&html[index..]);
        }
        None => {
            out.push_str(html);
            out.push_str(snippet);
        }
    }
    out
}

/// Inserts `<base href="{origin}{path}">` right after the opening head tag.
/// Documents without a head tag are returned unchanged.
pub fn inject_base_tag(html: &str, base: &Url) -> String {
    let Some(head) = HEAD_OPEN_REGEX.find(html) else {
        return html.to_string();
    };
    let tag = format!(
        "<base href=\"{}{}\">",
        base.origin().ascii_serialization(),
        base.path()
    );
    let mut out = String::with_capacity(html.len() + tag.len());
    out.push_str(&html[..head.end()]);
    out.push_str(&tag);
    out.push_str(&html[head.end()..]);
    out
}
