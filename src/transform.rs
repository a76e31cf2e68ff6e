use crate::config::{CookiePolicy, RewriteStages};
use crate::error::ProxyError;
use crate::proxy::http::{empty, full, HttpResponseHandler};
use crate::rewrite::{self, cookie, headers, redirect, ContentKind};
use async_compression::tokio::bufread::{BrotliDecoder, DeflateDecoder, GzipDecoder, ZstdDecoder};
use async_trait::async_trait;
use bytes::Bytes;
use http::{
    header::{CONTENT_ENCODING, CONTENT_LENGTH, LOCATION, SET_COOKIE},
    response::Parts,
    HeaderMap, HeaderValue, Method, StatusCode,
};
use http_body_util::{combinators::BoxBody, BodyExt};
use hyper::Response;
use tokio::io::BufReader;
use url::Url;

/// What to do with a response once its head has been rewritten.
#[derive(Debug, PartialEq, Eq)]
enum Disposition {
    /// Redirect pointing back at the proxy; the body is dropped.
    Redirect,
    Forward(ContentKind),
}

/// Sanitizes response heads and rewrites HTML/CSS bodies so the client keeps
/// going through the proxy.
pub struct ResponseRewriter {
    stages: RewriteStages,
}

impl ResponseRewriter {
    pub fn new(stages: RewriteStages) -> Self {
        Self { stages }
    }

    fn rewrite_head(
        &self,
        method: &Method,
        base: &Url,
        parts: &mut Parts,
    ) -> Result<Disposition, ProxyError> {
        let sanitized = headers::sanitize(&parts.headers);
        let cookies = match self.stages.cookies {
            CookiePolicy::Rewrite => cookie::rewrite_all(&sanitized.set_cookies),
            CookiePolicy::Suppress => Vec::new(),
        };

        if self.stages.redirects {
            if let Some(location) = redirect::intercept(parts.status, &sanitized.headers, base) {
                let location = location?;
                tracing::debug!("Redirect {} from {base} to {location}", parts.status);
                let mut redirect_headers = HeaderMap::new();
                redirect_headers.insert(
                    LOCATION,
                    HeaderValue::from_str(location.as_str()).map_err(http::Error::from)?,
                );
                append_cookies(&mut redirect_headers, cookies);
                parts.headers = redirect_headers;
                return Ok(Disposition::Redirect);
            }
        }

        parts.headers = sanitized.headers;
        append_cookies(&mut parts.headers, cookies);
        headers::strip_hop_by_hop(&mut parts.headers);
        if !carries_body(method, parts.status) {
            return Ok(Disposition::Forward(ContentKind::Other));
        }
        Ok(Disposition::Forward(ContentKind::of(&parts.headers, &self.stages)))
    }

    async fn rewrite_body(
        &self,
        base: &Url,
        kind: ContentKind,
        headers: &mut HeaderMap,
        body: Bytes,
    ) -> Result<Bytes, ProxyError> {
        let encoding = headers
            .get(CONTENT_ENCODING)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.trim().to_ascii_lowercase());

        let body = match encoding.as_deref() {
            None | Some("identity") => body,
            Some(enc) => match decompress_body(&body, enc).await? {
                Some(decoded) => {
                    headers.remove(CONTENT_ENCODING);
                    decoded
                }
                None => {
                    tracing::debug!("Skipping rewrite of body with Content-Encoding {enc}");
                    return Ok(body);
                }
            },
        };

        let text = String::from_utf8_lossy(&body);
        let rewritten = rewrite::rewrite_text(kind, &text, base, &self.stages);
        headers.remove(CONTENT_LENGTH);
        Ok(Bytes::from(rewritten))
    }
}

#[async_trait]
impl HttpResponseHandler for ResponseRewriter {
    async fn handle_response(
        &self,
        method: &Method,
        target: &Url,
        response: Response<hyper::body::Incoming>,
    ) -> Result<Response<BoxBody<Bytes, anyhow::Error>>, ProxyError> {
        let (mut parts, body) = response.into_parts();
        tracing::debug!(
            "Response for {}, status {}, headers: {:#?}",
            target,
            parts.status,
            parts.headers
        );

        let kind = match self.rewrite_head(method, target, &mut parts)? {
            Disposition::Redirect => return Ok(Response::from_parts(parts, empty())),
            Disposition::Forward(kind) if kind.is_rewritten() => kind,
            Disposition::Forward(_) => {
                return Ok(Response::from_parts(
                    parts,
                    body.map_err(anyhow::Error::new).boxed(),
                ))
            }
        };

        let full_body = body.collect().await.map_err(ProxyError::Body)?.to_bytes();
        let full_body = self
            .rewrite_body(target, kind, &mut parts.headers, full_body)
            .await?;
        Ok(Response::from_parts(parts, full(full_body)))
    }
}

fn append_cookies(headers: &mut HeaderMap, cookies: Vec<HeaderValue>) {
    for cookie in cookies {
        headers.append(SET_COOKIE, cookie);
    }
}

/// Decodes a compressed body, or returns `None` for encodings it cannot read.
async fn decompress_body(body: &Bytes, encoding: &str) -> Result<Option<Bytes>, ProxyError> {
    let reader = BufReader::new(&body[..]);
    let mut decompressed_buffer = Vec::new();
    let copied = match encoding {
        "gzip" | "x-gzip" => {
            tokio::io::copy(&mut GzipDecoder::new(reader), &mut decompressed_buffer).await
        }
        "br" => tokio::io::copy(&mut BrotliDecoder::new(reader), &mut decompressed_buffer).await,
        "deflate" => {
            tokio::io::copy(&mut DeflateDecoder::new(reader), &mut decompressed_buffer).await
        }
        "zstd" => tokio::io::copy(&mut ZstdDecoder::new(reader), &mut decompressed_buffer).await,
        _ => return Ok(None),
    };
    copied.map_err(ProxyError::Decode)?;
    Ok(Some(Bytes::from(decompressed_buffer)))
}

/// HEAD responses and 204/304 statuses never have a body to rewrite.
fn carries_body(method: &Method, status: StatusCode) -> bool {
    *method != Method::HEAD
        && status != StatusCode::NO_CONTENT
        && status != StatusCode::NOT_MODIFIED
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_compression::tokio::bufread::GzipEncoder;
    use tokio::io::AsyncReadExt;

    fn parts(status: u16, headers: &[(&str, &str)]) -> Parts {
        let mut builder = Response::builder().status(status);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    fn base(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_rewrite_head_sanitizes_and_rewrites_cookies() {
        let rewriter = ResponseRewriter::new(RewriteStages::default());
        let mut parts = parts(
            200,
            &[
                ("content-security-policy", "default-src 'self'"),
                ("set-cookie", "a=1; Domain=example.com; Path=/"),
                ("x-custom", "v"),
                ("content-type", "text/html"),
            ],
        );

        let disposition = rewriter
            .rewrite_head(&Method::GET, &base("https://example.com/"), &mut parts)
            .unwrap();
        assert_eq!(disposition, Disposition::Forward(ContentKind::Html));
        assert!(parts.headers.get("content-security-policy").is_none());
        assert_eq!(parts.headers["x-custom"], "v");
        let cookies: Vec<_> = parts.headers.get_all(SET_COOKIE).iter().collect();
        assert_eq!(cookies, vec!["a=1; Path=/"]);
    }

    #[test]
    fn test_rewrite_head_suppresses_cookies() {
        let rewriter = ResponseRewriter::new(RewriteStages {
            cookies: CookiePolicy::Suppress,
            ..RewriteStages::default()
        });
        let mut parts = parts(200, &[("set-cookie", "a=1"), ("set-cookie", "b=2")]);

        rewriter
            .rewrite_head(&Method::GET, &base("https://example.com/"), &mut parts)
            .unwrap();
        assert!(parts.headers.get(SET_COOKIE).is_none());
    }

    #[test]
    fn test_rewrite_head_intercepts_redirect() {
        let rewriter = ResponseRewriter::new(RewriteStages::default());
        let mut parts = parts(
            302,
            &[
                ("location", "/login"),
                ("set-cookie", "sid=1; Domain=example.com; HttpOnly"),
                ("set-cookie", "seen=yes"),
                ("cache-control", "no-store"),
            ],
        );

        let disposition = rewriter
            .rewrite_head(&Method::GET, &base("https://example.com/app/"), &mut parts)
            .unwrap();
        assert_eq!(disposition, Disposition::Redirect);
        assert_eq!(parts.status, StatusCode::FOUND);
        assert_eq!(
            parts.headers[LOCATION],
            "/?url=https%3A%2F%2Fexample.com%2Flogin"
        );
        let cookies: Vec<_> = parts.headers.get_all(SET_COOKIE).iter().collect();
        assert_eq!(cookies, vec!["sid=1; HttpOnly", "seen=yes"]);
        assert!(parts.headers.get("cache-control").is_none());
    }

    #[test]
    fn test_rewrite_head_unresolvable_redirect() {
        let rewriter = ResponseRewriter::new(RewriteStages::default());
        let mut parts = parts(301, &[("location", "http://[::1/")]);

        let err = rewriter
            .rewrite_head(&Method::GET, &base("https://example.com/"), &mut parts)
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_rewrite_head_redirect_stage_disabled() {
        let rewriter = ResponseRewriter::new(RewriteStages {
            redirects: false,
            ..RewriteStages::default()
        });
        let mut parts = parts(302, &[("location", "/login")]);

        let disposition = rewriter
            .rewrite_head(&Method::GET, &base("https://example.com/"), &mut parts)
            .unwrap();
        assert_eq!(disposition, Disposition::Forward(ContentKind::Other));
        assert_eq!(parts.headers[LOCATION], "/login");
    }

    #[test]
    fn test_rewrite_head_strips_hop_by_hop() {
        let rewriter = ResponseRewriter::new(RewriteStages::default());
        let mut parts = parts(
            200,
            &[
                ("transfer-encoding", "chunked"),
                ("connection", "close"),
                ("content-type", "text/css"),
            ],
        );

        let disposition = rewriter
            .rewrite_head(&Method::GET, &base("https://example.com/"), &mut parts)
            .unwrap();
        assert_eq!(disposition, Disposition::Forward(ContentKind::Css));
        assert_eq!(parts.headers.len(), 1);
    }

    #[tokio::test]
    async fn test_rewrite_body_css() {
        let rewriter = ResponseRewriter::new(RewriteStages::default());
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("33"));

        let body = rewriter
            .rewrite_body(
                &base("https://example.com/style/"),
                ContentKind::Css,
                &mut headers,
                Bytes::from_static(b"body{background:url(img/bg.png)}"),
            )
            .await
            .unwrap();
        assert_eq!(
            body,
            r#"body{background:url("/?url=https%3A%2F%2Fexample.com%2Fstyle%2Fimg%2Fbg.png")}"#
        );
        assert!(headers.get(CONTENT_LENGTH).is_none());
    }

    #[tokio::test]
    async fn test_rewrite_body_gzip() {
        let html = br#"<html><body><a href="/next">next</a></body></html>"#;
        let mut compressed = Vec::new();
        GzipEncoder::new(&html[..])
            .read_to_end(&mut compressed)
            .await
            .unwrap();

        let rewriter = ResponseRewriter::new(RewriteStages {
            home_button: false,
            ..RewriteStages::default()
        });
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_ENCODING, HeaderValue::from_static("gzip"));

        let body = rewriter
            .rewrite_body(
                &base("https://example.com/"),
                ContentKind::Html,
                &mut headers,
                Bytes::from(compressed),
            )
            .await
            .unwrap();
        assert_eq!(
            body,
            r#"<html><body><a href="/?url=https%3A%2F%2Fexample.com%2Fnext">next</a></body></html>"#
        );
        assert!(headers.get(CONTENT_ENCODING).is_none());
    }

    #[tokio::test]
    async fn test_rewrite_body_unknown_encoding_passes_through() {
        let rewriter = ResponseRewriter::new(RewriteStages::default());
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_ENCODING, HeaderValue::from_static("compress"));
        let original = Bytes::from_static(b"\x1f\x9d\x90opaque");

        let body = rewriter
            .rewrite_body(
                &base("https://example.com/"),
                ContentKind::Html,
                &mut headers,
                original.clone(),
            )
            .await
            .unwrap();
        assert_eq!(body, original);
        assert_eq!(headers[CONTENT_ENCODING], "compress");
    }

    #[tokio::test]
    async fn test_rewrite_body_non_utf8_is_still_rewritten() {
        let rewriter = ResponseRewriter::new(RewriteStages {
            home_button: false,
            ..RewriteStages::default()
        });

        let body = rewriter
            .rewrite_body(
                &base("https://example.com/"),
                ContentKind::Html,
                &mut HeaderMap::new(),
                Bytes::from_static(b"<a href=\"/next\">Caf\xe9</a>"),
            )
            .await
            .unwrap();
        assert_eq!(
            body,
            "<a href=\"/?url=https%3A%2F%2Fexample.com%2Fnext\">Caf\u{FFFD}</a>"
        );
    }

    #[test]
    fn test_rewrite_head_skips_bodiless_responses() {
        let rewriter = ResponseRewriter::new(RewriteStages::default());
        let html = [("content-type", "text/html"), ("content-length", "120")];

        let mut head = parts(200, &html);
        let disposition = rewriter
            .rewrite_head(&Method::HEAD, &base("https://example.com/"), &mut head)
            .unwrap();
        assert_eq!(disposition, Disposition::Forward(ContentKind::Other));
        assert_eq!(head.headers[CONTENT_LENGTH], "120");

        for status in [204, 304] {
            let mut bodiless = parts(status, &html);
            let disposition = rewriter
                .rewrite_head(&Method::GET, &base("https://example.com/"), &mut bodiless)
                .unwrap();
            assert_eq!(disposition, Disposition::Forward(ContentKind::Other));
        }

        let mut ok = parts(200, &html);
        let disposition = rewriter
            .rewrite_head(&Method::GET, &base("https://example.com/"), &mut ok)
            .unwrap();
        assert_eq!(disposition, Disposition::Forward(ContentKind::Html));
    }
}
