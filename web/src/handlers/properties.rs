//! Property listing endpoints.

use crate::error::AppError;
use crate::extractors::Actor;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use homestead_core::types::{FeeStatus, Money, Property, PropertyId, PropertyStatus, UserId};
use homestead_core::MarketError;
use serde::Deserialize;
use uuid::Uuid;

/// Request to list a property.
#[derive(Debug, Deserialize)]
pub struct CreatePropertyRequest {
    /// Listing title
    pub title: String,
    /// Asking price in minor units
    pub price_minor: i64,
    /// Assigned human agent, if any
    pub agent_id: Option<Uuid>,
}

/// `POST /properties` — admin-only listing creation.
pub async fn create(
    State(state): State<AppState>,
    Actor(actor_id): Actor,
    Json(request): Json<CreatePropertyRequest>,
) -> Result<Json<Property>, AppError> {
    let actor = state.users.get(actor_id).await?;
    if !actor.role.is_admin() {
        return Err(MarketError::forbidden("only an admin may list properties").into());
    }
    if request.title.trim().is_empty() {
        return Err(AppError::bad_request("title must not be empty"));
    }
    if request.price_minor <= 0 {
        return Err(AppError::bad_request("price must be positive"));
    }

    let now = Utc::now();
    let property = Property {
        id: PropertyId::new(),
        title: request.title,
        price: Money::from_minor(request.price_minor),
        listed_by: actor_id,
        agent_id: request.agent_id.map(UserId::from_uuid),
        status: PropertyStatus::Available,
        is_reserved: false,
        current_reservation_by: None,
        reservation_started_at: None,
        reservation_expires_at: None,
        reservation_fee_status: FeeStatus::Unpaid,
        soft_hold_by: None,
        soft_hold_expires_at: None,
        created_at: now,
        updated_at: now,
    };
    state.properties.create(&property).await?;
    Ok(Json(property))
}

/// `GET /properties`
pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<Property>>, AppError> {
    let properties = state.properties.list().await?;
    Ok(Json(properties))
}

/// `GET /properties/{id}`
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Property>, AppError> {
    let property = state.properties.get(PropertyId::from_uuid(id)).await?;
    Ok(Json(property))
}
