//! Response rendering.
//!
//! The handler decides a status and a small key–value body; a [`Render`]
//! turns that into the actual response. Swap the renderer to change how
//! visitors see the result without touching the verification logic.

use std::collections::BTreeMap;

use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;

/// Key–value body handed to the renderer. Always carries `message`;
/// carries `reason` when the visitor was blocked.
pub type ResponseBody = BTreeMap<String, String>;

/// Produces the transport response for a verification visit.
pub trait Render: Send + Sync {
    fn render(&self, status: StatusCode, body: &ResponseBody) -> Response;
}

impl<F> Render for F
where
    F: Fn(StatusCode, &ResponseBody) -> Response + Send + Sync,
{
    fn render(&self, status: StatusCode, body: &ResponseBody) -> Response {
        self(status, body)
    }
}

/// Renders the body as a flat JSON object.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonRender;

impl Render for JsonRender {
    fn render(&self, status: StatusCode, body: &ResponseBody) -> Response {
        (status, Json(body)).into_response()
    }
}

/// Renders a minimal standalone HTML page.
#[derive(Clone, Copy, Debug, Default)]
pub struct HtmlRender;

impl Render for HtmlRender {
    fn render(&self, status: StatusCode, body: &ResponseBody) -> Response {
        let message = body.get("message").map(String::as_str).unwrap_or_default();
        let detail = body
            .get("reason")
            .map(|reason| format!("<p>{}</p>", escape_html(reason)))
            .unwrap_or_default();
        let accent = if status.is_success() { "#1a7f37" } else { "#cf222e" };

        let page = format!(
            "<!doctype html>\n<html><head><meta charset=\"utf-8\"><title>{title}</title>\
             <style>body{{font-family:sans-serif;text-align:center;margin-top:15vh}}\
             h1{{color:{accent}}}</style></head>\
             <body><h1>{code} {title}</h1>{detail}</body></html>\n",
            title = escape_html(message),
            code = status.as_u16(),
        );
        let mut response = (status, Html(page)).into_response();
        response
            .headers_mut()
            .insert(header::CACHE_CONTROL, header::HeaderValue::from_static("no-store"));
        response
    }
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn blocked_body() -> ResponseBody {
        let mut body = ResponseBody::new();
        body.insert("message".into(), "Forbidden".into());
        body.insert("reason".into(), "<script>abuse</script>".into());
        body
    }

    #[tokio::test]
    async fn json_render_emits_flat_object() {
        let response = JsonRender.render(StatusCode::FORBIDDEN, &blocked_body());
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let parsed: ResponseBody = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(parsed, blocked_body());
    }

    #[tokio::test]
    async fn html_render_escapes_reason() {
        let response = HtmlRender.render(StatusCode::FORBIDDEN, &blocked_body());
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/html; charset=utf-8"
        );

        let html = body_string(response).await;
        assert!(html.contains("403 Forbidden"));
        assert!(html.contains("&lt;script&gt;abuse&lt;/script&gt;"));
        assert!(!html.contains("<script>"));
    }

    #[tokio::test]
    async fn closures_are_renderers() {
        let plain = |status: StatusCode, body: &ResponseBody| {
            (status, body.get("message").cloned().unwrap_or_default()).into_response()
        };
        let response = plain.render(StatusCode::GONE, &ResponseBody::from([(
            "message".to_string(),
            "Gone".to_string(),
        )]));
        assert_eq!(body_string(response).await, "Gone");
    }
}
