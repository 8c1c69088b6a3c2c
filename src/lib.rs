pub mod client;
pub mod cluster;
pub mod config;
pub mod error;
pub mod events;
pub mod hub;
pub mod key_queue;
pub mod protocol;
pub mod state;
pub mod transport;

use axum::routing::get;
use axum::Router;

use state::AppState;

/// Builds the router for the one `/ws` endpoint this service exposes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(transport::ws_handler))
        .with_state(state)
}
