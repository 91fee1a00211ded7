use axum::{routing::get, routing::post, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::lifecycle::LifecycleSignal;

use super::api::engine as engine_handlers;
use super::api::fixes as fix_handlers;
use super::api::speed as speed_handlers;
use super::state::AppState;

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Platform input
        .route("/api/fixes", post(fix_handlers::push_fix))
        .route("/api/lifecycle", post(engine_handlers::lifecycle))
        // Status
        .route("/api/engine/status", get(engine_handlers::status))
        .route("/api/speed/latest", get(speed_handlers::latest))
        // Middleware
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_server(config: AppConfig) -> std::io::Result<()> {
    let bind_addr = config.web.bind.clone();
    let state = AppState::from_config(&config);
    let app = router(state.clone());

    log::info!("Starting server on {}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            log::info!("Shutdown requested");
        })
        .await?;

    if let Err(e) = state
        .coordinator
        .lock()
        .await
        .handle(LifecycleSignal::Destroyed)
        .await
    {
        log::error!("Failed to stop sampling on shutdown: {}", e);
    }
    Ok(())
}
