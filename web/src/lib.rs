//! HTTP API for the Homestead property marketplace.
//!
//! A thin Axum boundary over `homestead-core`: handlers decode requests,
//! resolve the acting user from the `X-Actor-Id` header, and delegate to
//! the reservation, chat, and sale services. Error categories map onto
//! HTTP statuses in [`error::AppError`].

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod state;

pub use error::AppError;
pub use state::AppState;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Build the full application router.
#[must_use]
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/users", post(handlers::users::create))
        .route("/users/:id", get(handlers::users::get))
        .route(
            "/properties",
            get(handlers::properties::list).post(handlers::properties::create),
        )
        .route("/properties/:id", get(handlers::properties::get))
        .route("/reservations/initialize", post(handlers::reservations::initialize))
        .route("/reservations/verify", post(handlers::reservations::verify))
        .route("/reservations/cancel", post(handlers::reservations::cancel))
        .route("/reservations/soft-hold", post(handlers::reservations::soft_hold))
        .route(
            "/reservations/soft-hold/renew",
            post(handlers::reservations::renew_soft_hold),
        )
        .route(
            "/reservations/soft-hold/release",
            post(handlers::reservations::release_soft_hold),
        )
        .route("/chats", post(handlers::chats::create))
        .route(
            "/chats/:id/messages",
            get(handlers::chats::list_messages).post(handlers::chats::send_message),
        )
        .route(
            "/chats/:id/payment-received",
            post(handlers::chats::mark_payment_received),
        )
        .route("/chats/:id/rating", post(handlers::chats::rate))
        .route("/chats/:id/report", post(handlers::chats::report))
        .route("/chats/:id/request-rating", post(handlers::chats::request_rating))
        .route("/sales", post(handlers::sales::create))
        .route("/sales/:id/review", post(handlers::sales::review))
        .route(
            "/sales/payment-instructions",
            get(handlers::sales::payment_instructions),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
