//! Reservation-lock endpoints.
//!
//! The soft hold is client-driven: the app places it when a user opens a
//! property's chat screen, renews it on activity, and releases it on exit.
//! The chat service itself never touches the hold — it is a browsing-time
//! courtesy lock that ends where the paid reservation begins, so holding it
//! is not a precondition for any chat operation.

use crate::error::AppError;
use crate::extractors::Actor;
use crate::state::AppState;
use axum::extract::State;
use axum::Json;
use chrono::Utc;
use homestead_core::gateway::InitializedPayment;
use homestead_core::services::VerifiedReservation;
use homestead_core::types::{Property, PropertyId};
use serde::Deserialize;
use uuid::Uuid;

/// Request naming the property to act on.
#[derive(Debug, Deserialize)]
pub struct PropertyRequest {
    /// Target property
    pub property_id: Uuid,
}

/// Request to verify a settled payment.
#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    /// Gateway reference from initialization
    pub reference: String,
}

/// Request to cancel the caller's reservation.
#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    /// Target property
    pub property_id: Uuid,
    /// Optional cancellation note
    pub reason: Option<String>,
}

/// `POST /reservations/initialize`
pub async fn initialize(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Json(request): Json<PropertyRequest>,
) -> Result<Json<InitializedPayment>, AppError> {
    let initialized = state
        .reservations
        .initialize_reservation_fee(actor, PropertyId::from_uuid(request.property_id), Utc::now())
        .await?;
    Ok(Json(initialized))
}

/// `POST /reservations/verify`
pub async fn verify(
    State(state): State<AppState>,
    Json(request): Json<VerifyRequest>,
) -> Result<Json<VerifiedReservation>, AppError> {
    let verified = state
        .reservations
        .verify_reservation_fee(&request.reference, Utc::now())
        .await?;
    Ok(Json(verified))
}

/// `POST /reservations/cancel`
pub async fn cancel(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Json(request): Json<CancelRequest>,
) -> Result<Json<Property>, AppError> {
    let property = state
        .reservations
        .cancel_reservation(
            actor,
            PropertyId::from_uuid(request.property_id),
            request.reason.as_deref(),
            Utc::now(),
        )
        .await?;
    Ok(Json(property))
}

/// `POST /reservations/soft-hold` — place or renew the mid-chat hold.
/// Called by the client when the chat screen opens, not by the chat
/// service.
pub async fn soft_hold(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Json(request): Json<PropertyRequest>,
) -> Result<Json<Property>, AppError> {
    let property = state
        .reservations
        .soft_hold_for_chat(actor, PropertyId::from_uuid(request.property_id), Utc::now())
        .await?;
    Ok(Json(property))
}

/// `POST /reservations/soft-hold/renew`
pub async fn renew_soft_hold(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Json(request): Json<PropertyRequest>,
) -> Result<Json<Property>, AppError> {
    let property = state
        .reservations
        .renew_soft_hold_for_chat(actor, PropertyId::from_uuid(request.property_id), Utc::now())
        .await?;
    Ok(Json(property))
}

/// `POST /reservations/soft-hold/release`
pub async fn release_soft_hold(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Json(request): Json<PropertyRequest>,
) -> Result<Json<Property>, AppError> {
    let property = state
        .reservations
        .release_soft_hold_for_chat(actor, PropertyId::from_uuid(request.property_id), Utc::now())
        .await?;
    Ok(Json(property))
}
