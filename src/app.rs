use std::net::SocketAddr;

use anyhow::Context;
use axum::{
    http::{header, HeaderValue, Method},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use time::OffsetDateTime;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::error::route_not_found;
use crate::state::AppState;
use crate::{auth, catalog, dashboard, packages, users};

pub fn build_app(state: AppState) -> anyhow::Result<Router> {
    let cors = cors_layer(&state.config.cors_origin)?;

    Ok(Router::new()
        .nest(
            "/api",
            Router::new()
                .merge(auth::router())
                .merge(users::router())
                .merge(packages::router())
                .merge(catalog::router())
                .merge(dashboard::router())
                .route("/health", get(health)),
        )
        .fallback(route_not_found)
        .with_state(state)
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        let latency_ms = latency.as_millis() as u64;
                        if status.is_server_error() {
                            tracing::error!(%status, latency_ms, "response");
                        } else {
                            tracing::info!(%status, latency_ms, "response");
                        }
                    },
                ),
        ))
}

/// Credentialed CORS for the admin frontend origin.
fn cors_layer(origin: &str) -> anyhow::Result<CorsLayer> {
    let origin: HeaderValue = origin
        .parse()
        .with_context(|| format!("invalid CORS_ORIGIN {origin:?}"))?;
    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]))
}

#[derive(Serialize)]
struct Health {
    success: bool,
    message: &'static str,
    #[serde(with = "time::serde::rfc3339")]
    timestamp: OffsetDateTime,
}

async fn health() -> Json<Health> {
    Json(Health {
        success: true,
        message: "Server is running",
        timestamp: OffsetDateTime::now_utc(),
    })
}

pub async fn serve(app: Router) -> anyhow::Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
        std::env::var("APP_PORT").unwrap_or_else(|_| "8080".into())
    )
    .parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::subscription::memory::MemoryStore;

    #[test]
    fn cors_rejects_unparseable_origin() {
        assert!(cors_layer("http://localhost:3000").is_ok());
        assert!(cors_layer("bad\norigin").is_err());
    }

    #[tokio::test]
    async fn health_reports_running() {
        let Json(body) = health().await;
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["success"], true);
        assert!(json["timestamp"].is_string());
    }

    #[tokio::test]
    async fn app_builds_with_every_router() {
        let state = AppState::fake(Arc::new(MemoryStore::default()));
        assert!(build_app(state).is_ok());
    }
}
