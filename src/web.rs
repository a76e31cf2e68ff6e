use crate::proxy::http::full;
use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use hyper::{header::CONTENT_TYPE, Response, StatusCode};

/// Link back to the landing page, added to every proxied HTML document.
pub const HOME_BUTTON: &str = concat!(
    r#"<a href="/" id="detour-home" "#,
    r#"style="position:fixed;right:16px;bottom:16px;z-index:2147483647;"#,
    r#"padding:8px 14px;border-radius:18px;background:#1e293b;color:#f1f5f9;"#,
    r#"font:14px sans-serif;text-decoration:none;box-shadow:0 2px 6px rgba(0,0,0,.3)">"#,
    "Proxy home</a>",
);

const FORM_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Detour</title>
    <style>
        body {
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            background: #0f172a;
            color: #f1f5f9;
            margin: 0;
            padding: 20px;
        }

        .container {
            max-width: 720px;
            margin: 80px auto 0;
        }

        h1 {
            text-align: center;
            font-size: 2.2em;
        }

        form {
            display: flex;
            gap: 10px;
        }

        input[type="text"] {
            flex: 1;
            padding: 14px;
            border: 1px solid #475569;
            border-radius: 10px;
            font-size: 16px;
            background: #1e293b;
            color: #f1f5f9;
        }

        button {
            padding: 14px 24px;
            border: none;
            border-radius: 10px;
            font-size: 16px;
            background: #3b82f6;
            color: white;
            cursor: pointer;
        }
    </style>
</head>
<body>
    <div class="container">
        <h1>Detour</h1>
        <form method="GET" action="/">
            <input type="text" name="url" placeholder="https://example.com" autofocus required>
            <button type="submit">Go</button>
        </form>
    </div>
</body>
</html>
"#;

/// The landing page shown when no target URL was requested.
pub fn form_page() -> Response<BoxBody<Bytes, anyhow::Error>> {
    let mut response = Response::new(full(FORM_PAGE));
    *response.status_mut() = StatusCode::OK;
    response.headers_mut().insert(
        CONTENT_TYPE,
        hyper::header::HeaderValue::from_static("text/html; charset=utf-8"),
    );
    response
}
