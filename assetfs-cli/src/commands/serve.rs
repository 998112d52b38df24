//! Serve command - static HTTP server over the asset tree.

use std::sync::Arc;

use assetfs::config::HttpSettings;
use assetfs::http::{StaticHandler, StaticRequest, StaticResponse};
use assetfs::LookupContext;
use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use percent_encoding::percent_decode_str;

use crate::commands::common::Session;
use crate::error::CliError;

#[derive(Clone)]
struct AppState {
    handler: Arc<StaticHandler>,
    context: LookupContext,
}

fn header_value(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Turn the request parts axum hands us into a [`StaticRequest`].
fn static_request(
    method: &Method,
    uri: &Uri,
    headers: &HeaderMap,
    context: LookupContext,
) -> StaticRequest {
    let path = percent_decode_str(uri.path()).decode_utf8_lossy();
    let mut request =
        StaticRequest::new(method.as_str(), path.trim_start_matches('/')).with_context(context);
    if let Some(value) = header_value(headers, header::IF_NONE_MATCH) {
        request = request.with_if_none_match(value);
    }
    if let Some(value) = header_value(headers, header::IF_MODIFIED_SINCE) {
        request = request.with_if_modified_since(value);
    }
    request
}

fn into_response(response: StaticResponse) -> Response {
    let mut builder = Response::builder().status(response.status);
    for (name, value) in &response.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    match builder.body(Body::from(response.body)) {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(error = %e, "Failed to build response");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn handle(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let request = static_request(&method, &uri, &headers, state.context.clone());
    let handler = Arc::clone(&state.handler);

    // Resolution and hashing touch the disk.
    match tokio::task::spawn_blocking(move || handler.serve(&request)).await {
        Ok(response) => {
            tracing::debug!(
                method = %method,
                path = %uri.path(),
                status = response.status,
                "Served request"
            );
            into_response(response)
        }
        Err(e) => {
            tracing::error!(path = %uri.path(), error = %e, "Request task failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn router(handler: Arc<StaticHandler>, context: LookupContext) -> Router {
    Router::new()
        .fallback(handle)
        .with_state(AppState { handler, context })
}

/// Run the server until the process is stopped.
pub fn run(
    session: Session,
    settings: &HttpSettings,
    listen: Option<&str>,
) -> Result<(), CliError> {
    let addr = listen.unwrap_or(&settings.listen).to_string();
    let handler = Arc::new(StaticHandler::with_config(
        Arc::clone(&session.source),
        settings.handler_config(),
    ));
    let app = router(handler, session.context);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::Serve(format!("failed to start runtime: {}", e)))?;

    runtime.block_on(async move {
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| CliError::Serve(format!("failed to bind {}: {}", addr, e)))?;
        tracing::info!(address = %addr, "Serving assets");
        println!("Serving assets on http://{}", addr);
        axum::serve(listener, app)
            .await
            .map_err(|e| CliError::Serve(e.to_string()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_static_request_from_parts() {
        let mut headers = HeaderMap::new();
        headers.insert(header::IF_NONE_MATCH, HeaderValue::from_static("\"abc\""));
        let uri: Uri = "/css/site.css?v=2".parse().unwrap();

        let request = static_request(&Method::HEAD, &uri, &headers, LookupContext::new());
        assert_eq!(request.method, "HEAD");
        assert_eq!(request.path, "css/site.css");
        assert_eq!(request.if_none_match.as_deref(), Some("\"abc\""));
        assert_eq!(request.if_modified_since, None);
    }

    #[test]
    fn test_static_request_decodes_path() {
        let uri: Uri = "/docs/my%20file.txt".parse().unwrap();
        let request = static_request(&Method::GET, &uri, &HeaderMap::new(), LookupContext::new());
        assert_eq!(request.path, "docs/my file.txt");

        let uri: Uri = "/caf%C3%A9/a%2Bb.css".parse().unwrap();
        let request = static_request(&Method::GET, &uri, &HeaderMap::new(), LookupContext::new());
        assert_eq!(request.path, "café/a+b.css");
    }

    #[test]
    fn test_encoded_request_finds_asset() {
        let temp = tempfile::TempDir::new().unwrap();
        std::fs::write(temp.path().join("my file.txt"), "spaced").unwrap();
        let fs = assetfs::AssetFs::new();
        fs.register_path(temp.path()).unwrap();
        let handler = StaticHandler::new(Arc::new(fs));

        let uri: Uri = "/my%20file.txt".parse().unwrap();
        let request = static_request(&Method::GET, &uri, &HeaderMap::new(), LookupContext::new());
        let response = handler.serve(&request);
        assert_eq!(response.status, 200);
        assert_eq!(response.body, b"spaced");
    }

    #[test]
    fn test_into_response_copies_headers() {
        let response = into_response(StaticResponse {
            status: 200,
            headers: vec![("Content-Type".to_string(), "text/css".to_string())],
            body: b"body".to_vec(),
        });
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/css"
        );
    }

    #[test]
    fn test_into_response_rejects_bad_status() {
        let response = into_response(StaticResponse {
            status: 42,
            headers: Vec::new(),
            body: Vec::new(),
        });
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
