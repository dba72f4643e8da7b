//! HTTP surface: public catalog and lead capture, admin CRUD behind a bearer token.

use std::net::SocketAddr;

use axum::extract::{DefaultBodyLimit, FromRequest, FromRequestParts};
use axum::http::{HeaderValue, Method};
use axum::routing::{delete, get, patch, post};
use axum::{middleware, Router};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::images::local::UPLOADS_ROUTE;
use crate::images::MAX_IMAGE_BYTES;
use crate::state::AppState;
use crate::AppError;

pub mod admin;
pub mod health;
pub mod imoveis;
pub mod leads;
pub mod uploads;

const JSON_BODY_LIMIT: usize = 1024 * 1024;
const UPLOAD_BODY_LIMIT: usize = MAX_IMAGE_BYTES + 512 * 1024;

/// `axum::Json` with failures reported in the API error envelope.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);

fn cors(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();
    if allowed.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(AllowOrigin::list(allowed))
    }
}

pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/", get(health::root))
        .route("/health", get(health::health))
        .route("/api/imoveis", get(imoveis::listar))
        .route("/api/imoveis/facets", get(imoveis::facetas))
        .route("/api/imoveis/:id", get(imoveis::obter))
        .route("/api/leads", post(leads::criar))
        .route("/api/send-lead", post(leads::enviar))
        .route("/api/admin/send-otp", post(admin::send_otp))
        .route("/api/admin/validate-otp", post(admin::validate_otp));

    let admin_routes = Router::new()
        .route("/api/admin/me", get(admin::me))
        .route("/api/imoveis", post(imoveis::criar))
        .route("/api/imoveis/next-id", get(imoveis::next_id))
        .route(
            "/api/imoveis/:id",
            axum::routing::put(imoveis::atualizar).delete(imoveis::excluir),
        )
        .route(
            "/api/upload-image",
            post(uploads::upload_image).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/api/delete-image", delete(uploads::delete_image))
        .route("/api/leads", get(leads::listar))
        .route("/api/leads/stats", get(leads::stats))
        .route("/api/leads/:id", patch(leads::marcar))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            admin::require_admin,
        ));

    Router::new()
        .merge(public_routes)
        .merge(admin_routes)
        .nest_service(UPLOADS_ROUTE, ServeDir::new(&state.config.upload_dir))
        .layer(DefaultBodyLimit::max(JSON_BODY_LIMIT))
        .layer(RequestBodyLimitLayer::new(UPLOAD_BODY_LIMIT))
        .layer(TraceLayer::new_for_http())
        .layer(cors(&state.config.cors_origins))
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(target: "imobiliaria", event = "shutdown_signal_failed", error = %err);
        std::future::pending::<()>().await;
    }
    tracing::info!(target: "imobiliaria", event = "shutdown_requested");
}

pub async fn serve(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let db = state.db().ok().cloned();
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(target: "imobiliaria", event = "http_listening", addr = %addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    if let Some(db) = db {
        db.close().await;
    }
    tracing::info!(target: "imobiliaria", event = "http_stopped");
    Ok(())
}
