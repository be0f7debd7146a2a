// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! HTTP server command.
//!
//! Public files are served as-is under the configured assets URL; every other
//! request goes through the front controller on a blocking worker.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{request::Parts, Method, StatusCode},
    response::{Html, IntoResponse, Response},
    Router,
};
use console::style;
use tower_http::services::ServeDir;

use crate::app::{error_page, App};

const MAX_BODY_SIZE: usize = 1024 * 1024;

/// Runs the server for the project at `root`.
///
/// `host` and `port` override the `[server]` section of `app.toml`.
pub async fn run(root: &Path, host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    let app = Arc::new(App::bootstrap(root)?);
    let server = &app.project().config.server;
    let addr = format!(
        "{}:{}",
        host.unwrap_or_else(|| server.host.clone()),
        port.unwrap_or(server.port)
    );

    let assets_url = app
        .project()
        .config
        .template
        .assets_url
        .trim_end_matches('/')
        .to_string();
    anyhow::ensure!(
        assets_url.starts_with('/'),
        "template.assets_url must be an absolute path below the site root, got '{}'",
        app.project().config.template.assets_url
    );
    let public_dir = app.project().public_dir();
    println!(
        "{} {} route(s), public files from {}",
        style("Loaded").green(),
        app.router().len(),
        public_dir.display()
    );

    let router = Router::new()
        .nest_service(&assets_url, ServeDir::new(&public_dir))
        .fallback(fallback_handler)
        .with_state(app);

    println!();
    println!(
        "{} {}",
        style("Server running at").green().bold(),
        style(format!("http://{}", addr)).cyan().underlined()
    );
    println!("{}", style("Press Ctrl+C to stop").dim());

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}

async fn fallback_handler(State(app): State<Arc<App>>, request: Request<Body>) -> Response {
    let (parts, body) = request.into_parts();

    let body_bytes = if parts.method != Method::GET && parts.method != Method::HEAD {
        match axum::body::to_bytes(body, MAX_BODY_SIZE).await {
            Ok(bytes) if bytes.is_empty() => None,
            Ok(bytes) => Some(bytes.to_vec()),
            Err(_) => return (StatusCode::PAYLOAD_TOO_LARGE, "Body too large").into_response(),
        }
    } else {
        None
    };

    let request = to_request(&parts, body_bytes);
    match tokio::task::spawn_blocking(move || app.handle(&request)).await {
        Ok(response) => to_http(response),
        Err(e) => {
            tracing::error!("Request worker failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(error_page(500, "Request worker failed")),
            )
                .into_response()
        }
    }
}

/// Converts request parts into the dispatch request.
pub fn to_request(parts: &Parts, body: Option<Vec<u8>>) -> httpstack::Request {
    let headers: HashMap<String, String> = parts
        .headers
        .iter()
        .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
        .collect();
    let cookies = headers
        .get("cookie")
        .map(|c| parse_cookies(c))
        .unwrap_or_default();
    let query: HashMap<String, String> =
        form_urlencoded::parse(parts.uri.query().unwrap_or_default().as_bytes())
            .into_owned()
            .collect();

    let mut request = httpstack::Request::new(parts.method.as_str(), parts.uri.path())
        .with_headers(headers)
        .with_query(query)
        .with_cookies(cookies);
    if let Some(body) = body {
        request = request.with_body(body);
    }
    request
}

/// Splits a `Cookie` header into name/value pairs.
pub fn parse_cookies(header: &str) -> HashMap<String, String> {
    header
        .split(';')
        .filter_map(|pair| {
            let (name, value) = pair.split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                None
            } else {
                Some((name.to_string(), value.trim().to_string()))
            }
        })
        .collect()
}

fn to_http(response: httpstack::Response) -> Response {
    let status = StatusCode::from_u16(response.status()).unwrap_or(StatusCode::OK);
    let has_content_type = response.header("content-type").is_some();

    let mut builder = axum::http::Response::builder().status(status);
    for (key, value) in response.headers() {
        builder = builder.header(key.as_str(), value.as_str());
    }
    if !has_content_type {
        builder = builder.header("content-type", "text/html; charset=utf-8");
    }

    builder
        .body(Body::from(response.body().to_string()))
        .unwrap_or_else(|_| {
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to build response").into_response()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cookies() {
        let cookies = parse_cookies("theme=dark; session=abc=def;  ;lang = en");
        assert_eq!(cookies.get("theme").map(String::as_str), Some("dark"));
        assert_eq!(cookies.get("session").map(String::as_str), Some("abc=def"));
        assert_eq!(cookies.get("lang").map(String::as_str), Some("en"));
        assert_eq!(cookies.len(), 3);
    }

    #[test]
    fn test_to_http_emits_one_content_type() {
        let mut response = httpstack::Response::new();
        response
            .set_content_type("text/plain")
            .set_header("content-type", "application/json")
            .set_body("{}");
        let http = to_http(response);
        let values: Vec<&str> = http
            .headers()
            .get_all("content-type")
            .iter()
            .map(|v| v.to_str().unwrap())
            .collect();
        assert_eq!(values, ["application/json"]);

        let http = to_http(httpstack::Response::new());
        assert_eq!(
            http.headers().get("content-type").unwrap(),
            "text/html; charset=utf-8"
        );
    }

    #[test]
    fn test_to_request_decodes_query_and_cookies() {
        let (parts, _) = axum::http::Request::builder()
            .method("POST")
            .uri("/search?q=rust%20lang&page=2")
            .header("Cookie", "id=7")
            .body(())
            .unwrap()
            .into_parts();
        let request = to_request(&parts, Some(b"x=1".to_vec()));

        assert_eq!(request.method, "POST");
        assert_eq!(request.path, "/search");
        assert_eq!(request.query_param("q"), Some("rust lang"));
        assert_eq!(request.cookies.get("id").map(String::as_str), Some("7"));
        assert_eq!(request.body_str(), Some("x=1"));
    }
}
