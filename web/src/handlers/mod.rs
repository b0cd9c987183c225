//! HTTP handlers.
//!
//! Handlers are a thin boundary: decode and validate the request shape,
//! resolve the actor, call one service operation, encode the result. All
//! state-machine rules live in `homestead-core`.

pub mod chats;
pub mod properties;
pub mod reservations;
pub mod sales;
pub mod users;

use axum::Json;
use serde::Serialize;

/// Liveness response.
#[derive(Debug, Serialize)]
pub struct Health {
    /// Always `"ok"` when the process is serving
    pub status: &'static str,
}

/// Liveness probe.
pub async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}
