use crate::config::RewriteStages;
use http::{header::CONTENT_TYPE, HeaderMap};
use url::Url;

pub mod cookie;
pub mod css;
pub mod headers;
pub mod html;
pub mod link;
pub mod redirect;

/// How a response body is treated, decided by its `Content-Type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Html,
    Css,
    Other,
}

impl ContentKind {
    pub fn of(headers: &HeaderMap, stages: &RewriteStages) -> Self {
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_ascii_lowercase())
            .unwrap_or_default();

        if content_type.contains("text/html") {
            Self::Html
        } else if stages.css
            && (content_type.contains("text/css") || content_type.contains("application/css"))
        {
            Self::Css
        } else {
            Self::Other
        }
    }

    pub fn is_rewritten(&self) -> bool {
        !matches!(self, Self::Other)
    }
}

/// Rewrites a complete text body according to its kind and the enabled stages.
pub fn rewrite_text(kind: ContentKind, text: &str, base: &Url, stages: &RewriteStages) -> String {
    match kind {
        ContentKind::Html => {
            let mut out = html::rewrite(text, base);
            if stages.home_button {
                out = html::inject_before_body_end(&out, crate::web::HOME_BUTTON);
            }
            if stages.base_tag {
                out = html::inject_base_tag(&out, base);
            }
            out
        }
        ContentKind::Css => css::rewrite(text, base),
        ContentKind::Other => text.to_string(),
    }
}
