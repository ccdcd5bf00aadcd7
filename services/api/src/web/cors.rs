//! services/api/src/web/cors.rs
//!
//! Cross-origin rules for the companion service. Browser extensions and pages served
//! from this machine may call it; `ALLOWED_ORIGIN` adds one more exact origin.

use crate::error::ApiError;
use axum::http::{header::CONTENT_TYPE, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};
use url::Url;

const EXTENSION_SCHEMES: [&str; 2] = ["chrome-extension", "moz-extension"];
const LOCAL_HOSTS: [&str; 2] = ["localhost", "127.0.0.1"];

/// The CORS layer the binary puts in front of the API router.
pub fn cors_layer(extra: Option<&str>) -> Result<CorsLayer, ApiError> {
    Ok(CorsLayer::new()
        .allow_origin(allowed_origins(extra)?)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE]))
}

pub fn allowed_origins(extra: Option<&str>) -> Result<AllowOrigin, ApiError> {
    let extra = extra
        .map(|origin| {
            origin.parse::<HeaderValue>().map_err(|e| {
                ApiError::Internal(format!("ALLOWED_ORIGIN '{}' is not a valid header value: {}", origin, e))
            })
        })
        .transpose()?;

    Ok(AllowOrigin::predicate(move |origin: &HeaderValue, _| {
        if extra.as_ref() == Some(origin) {
            return true;
        }
        origin.to_str().map(is_local_origin).unwrap_or(false)
    }))
}

/// Any extension origin, or plain http on the loopback host names. The host must match
/// exactly, so `http://localhost.example.com` is not local.
pub fn is_local_origin(origin: &str) -> bool {
    let Ok(url) = Url::parse(origin) else {
        return false;
    };
    match url.scheme() {
        scheme if EXTENSION_SCHEMES.contains(&scheme) => true,
        "http" => url
            .host_str()
            .is_some_and(|host| LOCAL_HOSTS.contains(&host)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header, Request},
        routing::get,
        Router,
    };
    use tower::ServiceExt;

    #[test]
    fn loopback_and_extension_origins_are_local() {
        assert!(is_local_origin("http://localhost"));
        assert!(is_local_origin("http://localhost:3000"));
        assert!(is_local_origin("http://127.0.0.1:8080"));
        assert!(is_local_origin("chrome-extension://abcdefghijklmnop"));
        assert!(is_local_origin("moz-extension://0b6c9d4e-1111-2222-3333-444455556666"));
    }

    #[test]
    fn look_alike_hosts_are_not_local() {
        assert!(!is_local_origin("http://localhost.attacker.example"));
        assert!(!is_local_origin("http://127.0.0.1.attacker.example"));
        assert!(!is_local_origin("http://localhostx:3000"));
        assert!(!is_local_origin("https://attacker.example"));
        assert!(!is_local_origin("https://localhost"));
        assert!(!is_local_origin("null"));
    }

    async fn allow_origin_header(extra: Option<&str>, origin: &str) -> Option<HeaderValue> {
        let app = Router::new()
            .route("/health", get(|| async { "ok" }))
            .layer(cors_layer(extra).unwrap());
        let request = Request::builder()
            .uri("/health")
            .header(header::ORIGIN, origin)
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .cloned()
    }

    #[tokio::test]
    async fn only_matching_origins_are_echoed_back() {
        assert_eq!(
            allow_origin_header(None, "http://localhost:3000").await,
            Some(HeaderValue::from_static("http://localhost:3000"))
        );
        assert_eq!(allow_origin_header(None, "http://localhost.attacker.example").await, None);
        assert_eq!(
            allow_origin_header(Some("https://notes.example"), "https://notes.example").await,
            Some(HeaderValue::from_static("https://notes.example"))
        );
        assert_eq!(
            allow_origin_header(Some("https://notes.example"), "https://notes.example.attacker.example").await,
            None
        );
    }
}
