//! Page served to browsers that open `/ws` without a ticket.

use axum::response::Html;

/// Static landing page.
pub const LANDING_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="UTF-8">
  <title>logrelay</title>
  <style>
    body { font-family: Arial, sans-serif; text-align: center; padding: 50px; }
    h1 { font-size: 28px; margin-bottom: 20px; }
    p { font-size: 18px; margin-bottom: 10px; }
    code { background: #f2f2f2; padding: 2px 6px; }
  </style>
</head>
<body>
  <h1>logrelay</h1>
  <p>Log broadcast relay.</p>
  <p>Subscribe with <code>logrelay tail --url ws://&lt;host&gt;/ws --ticket &lt;ticket&gt;</code></p>
</body>
</html>
"#;

/// Landing page response.
pub fn landing_page() -> Html<&'static str> {
    Html(LANDING_PAGE)
}

#[cfg(test)]
mod tests {
    use axum::http::header::CONTENT_TYPE;
    use axum::response::IntoResponse;

    use super::*;

    #[test]
    fn served_as_html() {
        let resp = landing_page().into_response();
        let content_type = resp.headers().get(CONTENT_TYPE).unwrap().to_str().unwrap();
        assert!(content_type.starts_with("text/html"));
    }

    #[test]
    fn page_is_complete_document() {
        assert!(LANDING_PAGE.starts_with("<!DOCTYPE html>"));
        assert!(LANDING_PAGE.trim_end().ends_with("</html>"));
    }
}
