//! HTTP surface: `/api/auth`, `/api/refresh`, `/health` and `/metrics`.

mod cookies;
mod deadline;
mod handlers;
mod origin;
mod state;

use axum::middleware;
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

pub use cookies::{REFRESH_COOKIE_NAME, REFRESH_COOKIE_PATH};
pub use handlers::ACCESS_TOKEN_HEADER;
pub use origin::ClientContext;
pub use state::{AppState, HttpSettings};

/// Build the service router.
///
/// Serve it with `into_make_service_with_connect_info::<SocketAddr>()`; the
/// peer address is the request origin.
pub fn router(state: AppState) -> Router {
    let request_timeout = state.settings.request_timeout;

    Router::new()
        .route("/api/auth", get(handlers::issue))
        .route("/api/refresh", get(handlers::refresh))
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::render_metrics))
        .layer(middleware::from_fn_with_state(request_timeout, deadline::enforce))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
