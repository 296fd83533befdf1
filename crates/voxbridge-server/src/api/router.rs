use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api::{completions, conversations, internal};
use crate::state::AppState;

/// Create the main API router.
///
/// HTTP-level tracing stays thin here: the interesting correlation dimension
/// for this proxy is the voice session, and the turn pipeline opens its own
/// `turn` span (session id + turn serial) the moment a transcript is
/// accepted. Request ids would only ever correlate one leg of a call.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/chat/completions", post(completions::completions))
        // The voice platform appends the completions path to a base URL that
        // already contains it; accept the doubled form too.
        .route(
            "/v1/chat/completions/chat/completions",
            post(completions::completions),
        )
        .route("/health", get(internal::health))
        .route(
            "/conversations",
            get(conversations::list).delete(conversations::clear),
        )
        .route("/conversations/:session_id", get(conversations::get_session))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
