pub mod error;
pub mod routes;
pub mod state;
pub mod ws;

use axum::{
    Router,
    routing::{get, post},
};
use state::AppState;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Wires the signaling endpoint (`/ws`) alongside the out-of-scope
/// wire-level token-issuance and health routes, which exist only so a
/// self-contained deployment has something to talk to.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
    .allow_origin(Any)
    .allow_methods(Any)
    .allow_headers(Any);

    let api = Router::new()
    .route("/token", post(routes::auth::issue_token))
    .route("/health", get(routes::auth::health));

    Router::new()
    .nest("/api", api)
    .route("/ws", get(ws::ws_upgrade))
    .layer(TraceLayer::new_for_http())
    .layer(cors)
    .with_state(state)
}
