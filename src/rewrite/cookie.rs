use http::HeaderValue;
use regex::Regex;
use std::sync::LazyLock;

static DOMAIN_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i);\s*domain=[^;]*").unwrap());

/// Drops the `Domain` attribute so the cookie binds to the proxy host.
pub fn strip_domain(cookie: &str) -> String {
    let stripped = DOMAIN_REGEX.replace_all(cookie, "");
    stripped
        .trim_end_matches(|c: char| c == ';' || c.is_ascii_whitespace())
        .to_string()
}

/// Rewrites every extracted `Set-Cookie` value, keeping order. Values that are
/// not valid UTF-8 are forwarded unchanged.
pub fn rewrite_all(cookies: &[HeaderValue]) -> Vec<HeaderValue> {
    cookies
        .iter()
        .map(|value| {
            value
                .to_str()
                .ok()
                .and_then(|cookie| HeaderValue::from_str(&strip_domain(cookie)).ok())
                .unwrap_or_else(|| value.clone())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_domain() {
        assert_eq!(strip_domain("a=1; Domain=example.com; Path=/"), "a=1; Path=/");
        assert_eq!(strip_domain("a=1; domain=.example.com"), "a=1");
        assert_eq!(strip_domain("a=1; Path=/; DOMAIN=example.com;"), "a=1; Path=/");
    }

    #[test]
    fn test_strip_domain_keeps_other_attributes() {
        let cookie =
            "sid=xyz; Path=/app; Expires=Wed, 21 Oct 2026 07:28:00 GMT; Secure; HttpOnly; SameSite=Lax";
        assert_eq!(strip_domain(cookie), cookie);
        assert_eq!(
            strip_domain("sid=xyz; Domain=example.com; Secure; HttpOnly; SameSite=Lax"),
            "sid=xyz; Secure; HttpOnly; SameSite=Lax"
        );
    }

    #[test]
    fn test_strip_domain_ignores_cookie_named_domain() {
        assert_eq!(strip_domain("domain=value; Path=/"), "domain=value; Path=/");
        assert_eq!(strip_domain("subdomain=1; Path=/"), "subdomain=1; Path=/");
    }

    #[test]
    fn test_rewrite_all_preserves_order() {
        let cookies = vec![
            HeaderValue::from_static("a=1; Domain=example.com; Path=/"),
            HeaderValue::from_static("b=2"),
            HeaderValue::from_bytes(b"c=\xff; Domain=example.com").unwrap(),
        ];
        let rewritten = rewrite_all(&cookies);
        assert_eq!(rewritten.len(), 3);
        assert_eq!(rewritten[0], "a=1; Path=/");
        assert_eq!(rewritten[1], "b=2");
        assert_eq!(rewritten[2], cookies[2]);
    }
}
