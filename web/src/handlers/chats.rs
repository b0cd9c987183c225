//! Chat lifecycle endpoints.

use crate::error::AppError;
use crate::extractors::Actor;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use homestead_core::types::{
    Chat, ChatId, ChatKind, ChatMessage, ChatReport, Money, PropertyId, RatingScores, UserRating,
};
use serde::Deserialize;
use uuid::Uuid;

/// Request to open a chat.
#[derive(Debug, Deserialize)]
pub struct CreateChatRequest {
    /// Property to chat about
    pub property_id: Uuid,
    /// Chat kind; defaults to the virtual assistant
    #[serde(default = "default_kind")]
    pub kind: ChatKind,
}

const fn default_kind() -> ChatKind {
    ChatKind::VirtualAssistant
}

/// Request to send a message.
#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    /// Message body
    pub body: String,
}

/// Request to confirm payment and close the chat.
#[derive(Debug, Deserialize)]
pub struct MarkPaymentRequest {
    /// Closure reason recorded against the chat
    pub reason: String,
}

/// Request to rate the chat's agent.
#[derive(Debug, Deserialize)]
pub struct RateRequest {
    /// Scores across the five sub-dimensions plus overall
    pub scores: RatingScores,
    /// Optional tip in minor units
    pub tip_minor: Option<i64>,
}

/// Request to report the conversation.
#[derive(Debug, Deserialize)]
pub struct ReportRequest {
    /// Short reason category
    pub reason: String,
    /// Free-form details
    pub details: Option<String>,
}

/// `POST /chats`
pub async fn create(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Json(request): Json<CreateChatRequest>,
) -> Result<Json<Chat>, AppError> {
    let chat = state
        .chats
        .create_chat(
            actor,
            PropertyId::from_uuid(request.property_id),
            request.kind,
            Utc::now(),
        )
        .await?;
    Ok(Json(chat))
}

/// `POST /chats/{id}/messages`
pub async fn send_message(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<Uuid>,
    Json(request): Json<SendMessageRequest>,
) -> Result<Json<ChatMessage>, AppError> {
    if request.body.trim().is_empty() {
        return Err(AppError::bad_request("message body must not be empty"));
    }
    let message = state
        .chats
        .send_message(chat_id(id), actor, request.body, Utc::now())
        .await?;
    Ok(Json(message))
}

/// `GET /chats/{id}/messages`
pub async fn list_messages(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<ChatMessage>>, AppError> {
    let messages = state.chats.list_messages(chat_id(id), actor).await?;
    Ok(Json(messages))
}

/// `POST /chats/{id}/payment-received`
pub async fn mark_payment_received(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<Uuid>,
    Json(request): Json<MarkPaymentRequest>,
) -> Result<Json<Chat>, AppError> {
    let chat = state
        .chats
        .mark_payment_received(chat_id(id), actor, request.reason, Utc::now())
        .await?;
    Ok(Json(chat))
}

/// `POST /chats/{id}/rating`
pub async fn rate(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<Uuid>,
    Json(request): Json<RateRequest>,
) -> Result<Json<UserRating>, AppError> {
    let rating = state
        .chats
        .rate_agent(
            chat_id(id),
            actor,
            request.scores,
            request.tip_minor.map(Money::from_minor),
            Utc::now(),
        )
        .await?;
    Ok(Json(rating))
}

/// `POST /chats/{id}/report`
pub async fn report(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<Uuid>,
    Json(request): Json<ReportRequest>,
) -> Result<Json<ChatReport>, AppError> {
    let report = state
        .chats
        .report_conversation(chat_id(id), actor, request.reason, request.details, Utc::now())
        .await?;
    Ok(Json(report))
}

/// `POST /chats/{id}/request-rating`
pub async fn request_rating(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<ChatMessage>, AppError> {
    let message = state.chats.request_rating(chat_id(id), actor, Utc::now()).await?;
    Ok(Json(message))
}

fn chat_id(id: Uuid) -> ChatId {
    ChatId::from_uuid(id)
}
