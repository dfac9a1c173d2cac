pub mod config;
pub mod generation;
mod routes;
pub mod state;

use axum::{extract::Request, routing::get, Router, ServiceExt};
use routes::generation::generation_routes;
use state::AppState;
use std::{net::SocketAddr, str::FromStr, sync::Arc, time::Duration};
use tower::{Layer, ServiceBuilder};
use tower_http::cors::{Any, CorsLayer};
use tower_http::{normalize_path::NormalizePathLayer, timeout::TimeoutLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_rapidoc::RapiDoc;

#[derive(OpenApi)]
#[openapi(
    paths(routes::generation::generate_image),
    components(schemas(
        generation::NormalizedPayload,
        routes::ErrorResponse,
        routes::ErrorDetails
    )),
    tags((name = "Generation", description = "Stability text-to-image proxy"))
)]
struct ApiDoc;

/// Router with every route and layer except path normalization, which has to
/// wrap the router from the outside.
pub fn app(app_state: AppState) -> Router {
    let request_timeout = Duration::from_secs(app_state.config().request_timeout_secs);

    Router::new()
        .merge(generation_routes())
        .route("/health_check", get(routes::health_check))
        .merge(RapiDoc::with_openapi("/api-docs/openapi.json", ApiDoc::openapi()).path("/rapidoc"))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(request_timeout))
                .layer(
                    CorsLayer::new()
                        .allow_headers(Any)
                        .allow_origin(Any)
                        .allow_methods(Any),
                )
                .into_inner(),
        )
        .with_state(Arc::new(app_state))
}

pub async fn run(app_state: AppState) -> anyhow::Result<()> {
    let config = app_state.config().clone();

    let app = NormalizePathLayer::trim_trailing_slash().layer(app(app_state));

    let addr = SocketAddr::from_str(format!("{}:{}", &config.host, &config.port).as_str())?;

    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, ServiceExt::<Request>::into_make_service(app))
        .with_graceful_shutdown(signal_shutdown())
        .await?;

    Ok(())
}

async fn signal_shutdown() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for ctrl-c: {}", e);
        return;
    }
    tracing::info!("signal shutdown");
}
