mod pages;
mod room;

use crate::signaling;
use crate::state::AppState;
use axum::{routing::get, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let assets = ServeDir::new(&state.config.asset_dir);

    Router::new()
        // Health check
        .route("/health", get(|| async { "OK" }))
        // Templated landing page
        .route("/index", get(pages::index))
        // Room introspection
        .route("/api/room", get(room::get_room_status))
        // Signaling WebSocket endpoint
        .route("/ws", get(signaling::handler::ws_handler))
        // Everything else is a static asset
        .fallback_service(assets)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
