use axum::routing::get;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use utoipa::OpenApi;
use utoipa_axum::{router::OpenApiRouter, routes};
use utoipa_redoc::{Redoc, Servable};

use crate::flow::AuthFlowService;
use crate::notify::ConnectionRegistry;

pub mod auth_api;
pub mod socket_api;
pub mod ssas_api;

const MISC_TAG: &str = "Miscellaneous";
const AUTH_TAG: &str = "Authorization API";
const SSAS_TAG: &str = "SSAS Callback API";

/// Shared state for every HTTP and WebSocket handler.
#[derive(Clone)]
pub struct ApiState {
    pub flow: AuthFlowService,
    pub registry: ConnectionRegistry,
}

#[utoipa::path(
    method(get, head),
    path = "/health",
    tag = MISC_TAG,
    operation_id = "Health Check",
    responses(
        (status = OK, description = "Ok", body = str, content_type = "text/plain", example = "ok")
    )
)]
async fn health() -> &'static str {
    "ok"
}

pub fn build_router(state: ApiState) -> axum::Router {
    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .nest("/v1/auth", auth_api::router())
        .nest("/v1/ssas", ssas_api::router())
        .routes(routes!(health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .split_for_parts();

    // WebSocket upgrade sits outside the OpenAPI document.
    router
        .route("/v1/auth/socket", get(socket_api::socket_handler))
        .with_state(state)
        .merge(Redoc::with_url("/api-docs", api))
}

pub async fn start_webserver(state: ApiState, bind_address: &str) -> color_eyre::Result<()> {
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(bind_address).await?;
    info!("Server running on http://{bind_address}");
    axum::serve(listener, router.into_make_service())
        .await
        .map_err(|e| color_eyre::Report::msg(format!("Failed to start server: {e}")))?;

    Ok(())
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Stratis ID Authorization Server",
        version = "1.0.0",
        description = "OAuth2-style authorization server issuing tokens against wallet signatures."
    ),
    tags(
        (name = MISC_TAG, description = "Miscellaneous endpoints"),
        (name = AUTH_TAG, description = "Authorization, token and key endpoints"),
        (name = SSAS_TAG, description = "Wallet signature callback endpoints")
    )
)]
struct ApiDoc;
