//! Sale/finance pipeline endpoints.

use crate::error::AppError;
use crate::extractors::Actor;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use homestead_core::config::BankDetails;
use homestead_core::services::{MarkSoldRequest, ReviewDecision};
use homestead_core::types::{Money, PropertyId, Sale, SaleId, UserId};
use serde::Deserialize;
use uuid::Uuid;

/// Request to assert a sale.
#[derive(Debug, Deserialize)]
pub struct CreateSaleRequest {
    /// Property sold
    pub property_id: Uuid,
    /// Buying user
    pub buyer_id: Uuid,
    /// Agreed sale amount in minor units
    pub amount_minor: i64,
    /// Link to the uploaded payment proof, if any
    pub payment_proof_url: Option<String>,
}

/// Finance verdict on an asserted sale.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    /// Confirm receipt of funds
    Confirm,
    /// Reject the asserted payment
    Reject,
}

/// Request to review a sale.
#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    /// Reviewer's verdict
    pub verdict: Verdict,
}

/// `POST /sales`
pub async fn create(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Json(request): Json<CreateSaleRequest>,
) -> Result<Json<Sale>, AppError> {
    if request.amount_minor <= 0 {
        return Err(AppError::bad_request("sale amount must be positive"));
    }

    let sale = state
        .sales
        .mark_as_sold(
            actor,
            MarkSoldRequest {
                property_id: PropertyId::from_uuid(request.property_id),
                buyer_id: UserId::from_uuid(request.buyer_id),
                amount: Money::from_minor(request.amount_minor),
                payment_proof_url: request.payment_proof_url,
            },
            Utc::now(),
        )
        .await?;
    Ok(Json(sale))
}

/// `POST /sales/{id}/review`
pub async fn review(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<Uuid>,
    Json(request): Json<ReviewRequest>,
) -> Result<Json<Sale>, AppError> {
    let decision = match request.verdict {
        Verdict::Confirm => ReviewDecision::Confirm,
        Verdict::Reject => ReviewDecision::Reject,
    };
    let sale = state
        .sales
        .review_sale(actor, SaleId::from_uuid(id), decision, Utc::now())
        .await?;
    Ok(Json(sale))
}

/// `GET /sales/payment-instructions`
pub async fn payment_instructions(
    State(state): State<AppState>,
) -> Result<Json<BankDetails>, AppError> {
    let details = state.sales.payment_instructions()?;
    Ok(Json(details.clone()))
}
