use axum::{
    extract::Request,
    http::uri::Uri,
    middleware::Next,
    response::Response,
};
use tracing::{info, warn};

use crate::catalog::X_CACHE;

/// Rewrites the request path before routing: collapses duplicate slashes and
/// appends a trailing slash, so `/trending` and `//trending/` both hit `/trending/`.
pub fn normalize_path(mut req: Request) -> Request {
    let uri = req.uri();
    let path = uri.path();

    let normalized = normalized_path(path);

    if normalized != path {
        let mut parts = uri.clone().into_parts();
        let new_path_and_query = if let Some(query) = uri.query() {
            format!("{}?{}", normalized, query)
        } else {
            normalized
        };

        if let Ok(new_uri) = new_path_and_query.parse::<Uri>() {
            parts.path_and_query = new_uri.into_parts().path_and_query;
            if let Ok(new_uri) = Uri::from_parts(parts) {
                *req.uri_mut() = new_uri;
            }
        }
    }

    req
}

fn normalized_path(path: &str) -> String {
    let mut normalized = path.to_string();

    while normalized.contains("//") {
        normalized = normalized.replace("//", "/");
    }

    // File-like paths such as /robots.txt keep their form.
    let last = normalized.rsplit('/').next().unwrap_or("");
    if !normalized.ends_with('/') && !last.contains('.') {
        normalized.push('/');
    }

    normalized
}

pub async fn log_request(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();

    let response = next.run(req).await;

    let status = response.status().as_u16();
    let cache = response
        .headers()
        .get(X_CACHE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-");

    let query = uri.query().unwrap_or("");
    if response.status().is_server_error() {
        warn!(
            method = %method,
            path = uri.path(),
            query = query,
            status = status,
            cache = cache,
            "Catalog request failed"
        );
    } else {
        info!(
            method = %method,
            path = uri.path(),
            query = query,
            status = status,
            cache = cache,
            "Catalog request"
        );
    }

    response
}
