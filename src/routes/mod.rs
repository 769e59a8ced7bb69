pub mod auth;
pub mod chat;
pub mod connections;
pub mod conversations;
pub mod media;
pub mod profiles;

use axum::body::Body;
use axum::extract::DefaultBodyLimit;
use axum::http::Request;
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Room for the JSON around the attachments.
const ENVELOPE_BYTES: usize = 64 * 1024;

/// Largest JSON body that can carry `count` base64 attachments of
/// `max_attachment_bytes` each.
pub fn body_limit(max_attachment_bytes: usize, count: usize) -> usize {
    max_attachment_bytes.div_ceil(3) * 4 * count + ENVELOPE_BYTES
}

/// The full HTTP surface with request tracing.
pub fn build_router(state: AppState) -> Router {
    let max_attachment = state.config.chat.max_attachment_bytes;

    Router::new()
        .route("/health", get(health))
        .merge(auth::router())
        .merge(profiles::router(max_attachment))
        .merge(connections::router())
        .merge(conversations::router())
        .merge(chat::router())
        .merge(media::router())
        .layer(DefaultBodyLimit::max(body_limit(max_attachment, 1)))
        .layer(
            // Path only: chat sockets may carry the session token in the query
            TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
                tracing::info_span!("request", method = %req.method(), path = %req.uri().path())
            }),
        )
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
