use http::HeaderValue;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::config::AppConfig;

/// Builds the CORS layer from `cors_allowed_origins`, falling back to a
/// permissive layer where the configuration allows it.
pub fn cors_layer(cfg: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = cfg
        .cors_allowed_origins
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    if !origins.is_empty() {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        if cfg.should_allow_permissive_cors() {
            info!(
                environment = %cfg.environment,
                "Using permissive CORS because explicit origins were not configured"
            );
        }
        CorsLayer::permissive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
        routing::get,
        Router,
    };
    use tower::ServiceExt;

    fn config(origins: Option<&str>) -> AppConfig {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".into(),
            "a-test-secret-that-is-long-enough-for-hs256".into(),
            3600,
            "127.0.0.1".into(),
            8080,
            "production".into(),
        );
        cfg.cors_allowed_origins = origins.map(str::to_string);
        cfg
    }

    #[tokio::test]
    async fn configured_origin_is_echoed() {
        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(cors_layer(&config(Some("https://erp.example.com, https://ops.example.com"))));

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::GET)
                    .uri("/")
                    .header(header::ORIGIN, "https://ops.example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "https://ops.example.com"
        );
    }

    #[tokio::test]
    async fn unknown_origin_gets_no_allow_header() {
        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(cors_layer(&config(Some("https://erp.example.com"))));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header(header::ORIGIN, "https://evil.example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert!(response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .is_none());
    }
}
