//! Chat lifecycle.
//!
//! State machine per chat: `Open → Active → PaymentReceived`, with closure
//! entered atomically with the payment-received transition. Chat creation is
//! gated on a live paid reservation; assistant replies for virtual-assistant
//! chats are generated on a detached task that never fails the sender's
//! request.

use crate::config::MarketplaceConfig;
use crate::error::{MarketError, Result};
use crate::assistant::{property_persona, ChatTurn, TextGeneration};
use crate::stores::{
    AgentStatsRepository, ChatRepository, MessageRepository, PropertyRepository, RatingRepository,
    ReportRepository, UserRepository,
};
use crate::types::{
    Chat, ChatId, ChatKind, ChatMessage, ChatReport, ChatStatus, MessageId, MessageKind, Money,
    PropertyId, RatingId, RatingScores, ReportId, UserId, UserRating,
};
use super::reservations::ReservationService;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// The chat lifecycle service.
pub struct ChatService {
    chats: Arc<dyn ChatRepository>,
    messages: Arc<dyn MessageRepository>,
    ratings: Arc<dyn RatingRepository>,
    reports: Arc<dyn ReportRepository>,
    agent_stats: Arc<dyn AgentStatsRepository>,
    properties: Arc<dyn PropertyRepository>,
    users: Arc<dyn UserRepository>,
    reservations: Arc<ReservationService>,
    assistant: Arc<dyn TextGeneration>,
    config: MarketplaceConfig,
}

impl ChatService {
    /// Create the service over its repositories and collaborators.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        chats: Arc<dyn ChatRepository>,
        messages: Arc<dyn MessageRepository>,
        ratings: Arc<dyn RatingRepository>,
        reports: Arc<dyn ReportRepository>,
        agent_stats: Arc<dyn AgentStatsRepository>,
        properties: Arc<dyn PropertyRepository>,
        users: Arc<dyn UserRepository>,
        reservations: Arc<ReservationService>,
        assistant: Arc<dyn TextGeneration>,
        config: MarketplaceConfig,
    ) -> Self {
        Self {
            chats,
            messages,
            ratings,
            reports,
            agent_stats,
            properties,
            users,
            reservations,
            assistant,
            config,
        }
    }

    /// Open a chat about a property.
    ///
    /// Requires a live paid reservation held by the caller, and at most one
    /// live chat per (user, property). An agent chat requires the property
    /// to have an assigned agent; a virtual-assistant chat leaves the agent
    /// unset and routes replies through the assistant. The agent fee is
    /// computed here and frozen: later configuration changes never
    /// retroactively reprice an open chat.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown property, `BadRequest` without a
    /// live reservation, with an existing live chat, or for an agent chat
    /// on an agentless property.
    pub async fn create_chat(
        &self,
        user_id: UserId,
        property_id: PropertyId,
        kind: ChatKind,
        now: DateTime<Utc>,
    ) -> Result<Chat> {
        let property = self.properties.get(property_id).await?;

        let reserved = self
            .reservations
            .has_user_active_reservation(user_id, property_id, now)
            .await?;
        if !reserved {
            return Err(MarketError::bad_request(
                "an active reservation is required to start a chat",
            ));
        }

        if self.chats.find_live(user_id, property_id).await?.is_some() {
            return Err(MarketError::bad_request(
                "you already have a live chat for this property",
            ));
        }

        let agent_id = match kind {
            ChatKind::Agent => {
                let Some(agent_id) = property.agent_id else {
                    return Err(MarketError::bad_request(
                        "property has no assigned agent",
                    ));
                };
                Some(agent_id)
            }
            ChatKind::VirtualAssistant => None,
        };

        // Frozen at creation: agent fee % of price, then the agent's cut %
        // of that fee.
        let agent_fee_amount = property
            .price
            .percent(self.config.agent_fee_percentage)
            .percent(self.config.agent_cut_percentage);

        let chat = Chat {
            id: ChatId::new(),
            user_id,
            property_id,
            agent_id,
            kind,
            status: ChatStatus::Open,
            user_message_count: 0,
            agent_response_count: 0,
            first_agent_response_at: None,
            last_user_message_at: None,
            last_agent_response_at: None,
            closed_at: None,
            closed_by: None,
            closure_reason: None,
            agent_fee_percentage: self.config.agent_fee_percentage,
            agent_fee_amount,
            agent_payment_received: false,
            created_at: now,
        };
        self.chats.create(&chat).await?;

        self.post_notice(
            chat.id,
            format!(
                "Welcome! You are now chatting about \"{}\". An agent or our \
                 assistant will respond to your questions here.",
                property.title
            ),
            MessageKind::System,
            now,
        )
        .await?;

        tracing::info!(chat_id = %chat.id, property_id = %property_id, ?kind, "chat created");
        Ok(chat)
    }

    /// Send a message in a chat.
    ///
    /// The sender must be the chat's user or its agent, and the chat must
    /// not be closed. An agent reply updates responsiveness statistics and
    /// moves the chat to `Active`. A user message in a virtual-assistant
    /// chat triggers an assistant reply on a detached task whose failure is
    /// logged, never surfaced to the sender, and never retried.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown chat, `Forbidden` for a
    /// non-participant sender, and `BadRequest` when the chat is closed.
    pub async fn send_message(
        &self,
        chat_id: ChatId,
        sender_id: UserId,
        body: String,
        now: DateTime<Utc>,
    ) -> Result<ChatMessage> {
        let mut chat = self.chats.get(chat_id).await?;

        // Authorization first: a non-participant learns nothing about the
        // chat's state, not even that it is closed.
        let is_user = sender_id == chat.user_id;
        let is_agent = chat.agent_id == Some(sender_id);
        if !is_user && !is_agent {
            return Err(MarketError::forbidden(
                "only the chat's user or agent may send messages",
            ));
        }

        if chat.is_closed() {
            return Err(MarketError::bad_request("chat is closed"));
        }

        let message = ChatMessage {
            id: MessageId::new(),
            chat_id,
            sender_id,
            body,
            kind: MessageKind::Text,
            read_at: None,
            created_at: now,
        };
        self.messages.append(&message).await?;

        if is_agent {
            self.record_agent_reply(&mut chat, sender_id, now).await?;
        } else {
            chat.user_message_count += 1;
            chat.last_user_message_at = Some(now);
            self.chats.update(&chat).await?;

            if chat.agent_id.is_none() {
                self.spawn_assistant_reply(&chat);
            }
        }

        Ok(message)
    }

    /// All messages in a chat, oldest first. Participants only.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown chat and `Forbidden` for a
    /// non-participant.
    pub async fn list_messages(
        &self,
        chat_id: ChatId,
        actor_id: UserId,
    ) -> Result<Vec<ChatMessage>> {
        let chat = self.chats.get(chat_id).await?;
        let actor = self.users.get(actor_id).await?;
        let is_participant = actor_id == chat.user_id || chat.agent_id == Some(actor_id);
        if !is_participant && !actor.role.is_elevated() {
            return Err(MarketError::forbidden(
                "only chat participants may read messages",
            ));
        }
        self.messages.list(chat_id).await
    }

    /// Confirm payment for a chat, closing it atomically.
    ///
    /// Admin-only. Sets `PaymentReceived` and the closure fields together,
    /// posts one admin notification, and credits the agent's completed
    /// chats and frozen fee earnings. A second call is rejected because the
    /// chat is already closed.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown chat or admin, `Forbidden` for a
    /// non-admin actor, and `BadRequest` when the chat is already closed.
    pub async fn mark_payment_received(
        &self,
        chat_id: ChatId,
        admin_id: UserId,
        reason: String,
        now: DateTime<Utc>,
    ) -> Result<Chat> {
        let admin = self.users.get(admin_id).await?;
        if !admin.role.is_admin() {
            return Err(MarketError::forbidden(
                "only an admin may confirm chat payment",
            ));
        }

        let mut chat = self.chats.get(chat_id).await?;
        if chat.is_closed() {
            return Err(MarketError::bad_request("chat is already closed"));
        }

        chat.status = ChatStatus::PaymentReceived;
        chat.closed_at = Some(now);
        chat.closed_by = Some(admin_id);
        chat.closure_reason = Some(reason);
        chat.agent_payment_received = true;
        self.chats.update(&chat).await?;

        self.post_notice(
            chat_id,
            "Payment received. This conversation is now closed. Thank you!".to_string(),
            MessageKind::AdminNotification,
            now,
        )
        .await?;

        if let Some(agent_id) = chat.agent_id {
            let mut stats = self.agent_stats.get_or_create(agent_id, now).await?;
            stats.completed_chats += 1;
            stats.total_earnings = stats.total_earnings.saturating_add(chat.agent_fee_amount);
            stats.updated_at = now;
            self.agent_stats.update(&stats).await?;
        }

        tracing::info!(chat_id = %chat_id, admin_id = %admin_id, "chat closed with payment received");
        Ok(chat)
    }

    /// Rate the chat's agent after closure.
    ///
    /// Only the chat's user, only once per chat, only after closure, and
    /// only for a chat with an assigned agent. Credits the agent's rating
    /// and tip statistics.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown chat, `Forbidden` for anyone but
    /// the chat's user, and `BadRequest` for an open chat, an agentless
    /// chat, out-of-range scores, or a duplicate rating.
    pub async fn rate_agent(
        &self,
        chat_id: ChatId,
        user_id: UserId,
        scores: RatingScores,
        tip_amount: Option<Money>,
        now: DateTime<Utc>,
    ) -> Result<UserRating> {
        let chat = self.chats.get(chat_id).await?;

        if user_id != chat.user_id {
            return Err(MarketError::forbidden("only the chat's user may rate"));
        }
        if !chat.is_closed() {
            return Err(MarketError::bad_request(
                "the chat must be closed before rating",
            ));
        }
        let Some(agent_id) = chat.agent_id else {
            return Err(MarketError::bad_request(
                "virtual-assistant chats cannot be rated",
            ));
        };
        if !scores.is_valid() {
            return Err(MarketError::bad_request("scores must be between 1 and 5"));
        }

        let rating = UserRating {
            id: RatingId::new(),
            chat_id,
            user_id,
            agent_id,
            scores,
            tip_amount,
            tip_paid: false,
            created_at: now,
        };
        self.ratings.create(&rating).await?;

        let mut stats = self.agent_stats.get_or_create(agent_id, now).await?;
        stats.ratings_received += 1;
        stats.rating_points += u32::from(scores.overall);
        if let Some(tip) = tip_amount {
            stats.tips_received = stats.tips_received.saturating_add(tip);
        }
        stats.updated_at = now;
        self.agent_stats.update(&stats).await?;

        Ok(rating)
    }

    /// File a report against a conversation.
    ///
    /// Participants only; posts a companion system message confirming the
    /// report was filed.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown chat and `Forbidden` for a
    /// non-participant.
    pub async fn report_conversation(
        &self,
        chat_id: ChatId,
        reporter_id: UserId,
        reason: String,
        details: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<ChatReport> {
        let chat = self.chats.get(chat_id).await?;
        if reporter_id != chat.user_id && chat.agent_id != Some(reporter_id) {
            return Err(MarketError::forbidden(
                "only chat participants may report the conversation",
            ));
        }

        let report = ChatReport {
            id: ReportId::new(),
            chat_id,
            reported_by: reporter_id,
            reason,
            details,
            created_at: now,
        };
        self.reports.create(&report).await?;

        self.post_notice(
            chat_id,
            "This conversation has been reported and will be reviewed.".to_string(),
            MessageKind::System,
            now,
        )
        .await?;

        Ok(report)
    }

    /// Ask the chat's user to rate the agent.
    ///
    /// Only the chat's agent may request a rating; the request is posted as
    /// a system message.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown chat and `Forbidden` for anyone
    /// but the chat's agent.
    pub async fn request_rating(
        &self,
        chat_id: ChatId,
        agent_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<ChatMessage> {
        let chat = self.chats.get(chat_id).await?;
        if chat.agent_id != Some(agent_id) {
            return Err(MarketError::forbidden(
                "only the chat's agent may request a rating",
            ));
        }

        self.post_notice(
            chat_id,
            "How was your experience? Please take a moment to rate your agent.".to_string(),
            MessageKind::System,
            now,
        )
        .await
    }

    async fn record_agent_reply(
        &self,
        chat: &mut Chat,
        agent_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<()> {
        chat.agent_response_count += 1;
        chat.last_agent_response_at = Some(now);

        if chat.first_agent_response_at.is_none() {
            chat.first_agent_response_at = Some(now);
            let latency_minutes = (now - chat.created_at).num_minutes();

            let mut stats = self.agent_stats.get_or_create(agent_id, now).await?;
            if latency_minutes <= self.config.responsive_reply_minutes {
                stats.responsive_first_replies += 1;
            } else {
                stats.missed_first_replies += 1;
                tracing::warn!(
                    chat_id = %chat.id,
                    agent_id = %agent_id,
                    latency_minutes,
                    "agent missed the first-reply responsiveness window"
                );
            }
            stats.updated_at = now;
            self.agent_stats.update(&stats).await?;
        }

        if chat.status == ChatStatus::Open {
            chat.status = ChatStatus::Active;
        }
        self.chats.update(chat).await
    }

    /// Spawn the assistant reply as a detached task. The request path does
    /// not await it; failures are logged here and swallowed.
    fn spawn_assistant_reply(&self, chat: &Chat) {
        let chat_id = chat.id;
        let property_id = chat.property_id;
        let properties = self.properties.clone();
        let messages = self.messages.clone();
        let assistant = self.assistant.clone();

        tokio::spawn(async move {
            let result = async {
                let property = properties.get(property_id).await?;
                let history = messages.list(chat_id).await?;

                let mut turns = vec![property_persona(&property)];
                for message in &history {
                    if message.kind != MessageKind::Text {
                        continue;
                    }
                    if message.sender_id.is_virtual_assistant() {
                        turns.push(ChatTurn::assistant(message.body.clone()));
                    } else {
                        turns.push(ChatTurn::user(message.body.clone()));
                    }
                }

                let reply = assistant.complete(turns).await?;
                let message = ChatMessage {
                    id: MessageId::new(),
                    chat_id,
                    sender_id: UserId::virtual_assistant(),
                    body: reply,
                    kind: MessageKind::Text,
                    read_at: None,
                    created_at: Utc::now(),
                };
                messages.append(&message).await
            }
            .await;

            if let Err(e) = result {
                tracing::warn!(chat_id = %chat_id, error = %e, "assistant reply failed");
            }
        });
    }

    async fn post_notice(
        &self,
        chat_id: ChatId,
        body: String,
        kind: MessageKind,
        now: DateTime<Utc>,
    ) -> Result<ChatMessage> {
        let message = ChatMessage {
            id: MessageId::new(),
            chat_id,
            sender_id: UserId::virtual_assistant(),
            body,
            kind,
            read_at: None,
            created_at: now,
        };
        self.messages.append(&message).await?;
        Ok(message)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::assistant::MockTextGeneration;
    use crate::gateway::MockPaymentGateway;
    use crate::stores::memory::{
        MemoryAgentStatsStore, MemoryChatStore, MemoryMessageStore, MemoryPaymentStore,
        MemoryPropertyStore, MemoryRatingStore, MemoryReportStore, MemoryUserStore,
    };
    use crate::types::{FeeStatus, Property, PropertyStatus, Role, User};
    use std::time::Duration;

    struct Fixture {
        service: ChatService,
        reservations: Arc<ReservationService>,
        properties: Arc<MemoryPropertyStore>,
        users: Arc<MemoryUserStore>,
        messages: Arc<MemoryMessageStore>,
        agent_stats: Arc<MemoryAgentStatsStore>,
        assistant: Arc<MockTextGeneration>,
    }

    fn fixture() -> Fixture {
        let properties = Arc::new(MemoryPropertyStore::new());
        let payments = Arc::new(MemoryPaymentStore::new());
        let users = Arc::new(MemoryUserStore::new());
        let messages = Arc::new(MemoryMessageStore::new());
        let agent_stats = Arc::new(MemoryAgentStatsStore::new());
        let assistant = Arc::new(MockTextGeneration::new());
        let config = MarketplaceConfig::new();

        let reservations = Arc::new(ReservationService::new(
            properties.clone(),
            payments.clone(),
            users.clone(),
            Arc::new(MockPaymentGateway::new()),
            config.clone(),
        ));

        let service = ChatService::new(
            Arc::new(MemoryChatStore::new()),
            messages.clone(),
            Arc::new(MemoryRatingStore::new()),
            Arc::new(MemoryReportStore::new()),
            agent_stats.clone(),
            properties.clone(),
            users.clone(),
            reservations.clone(),
            assistant.clone(),
            config,
        );

        Fixture {
            service,
            reservations,
            properties,
            users,
            messages,
            agent_stats,
            assistant,
        }
    }

    async fn seed_user(f: &Fixture, role: Role) -> UserId {
        let user = User {
            id: UserId::new(),
            email: "user@example.com".to_string(),
            display_name: "User".to_string(),
            role,
            created_at: Utc::now(),
        };
        f.users.create(&user).await.unwrap();
        user.id
    }

    async fn seed_property(f: &Fixture, agent_id: Option<UserId>) -> PropertyId {
        let now = Utc::now();
        let property = Property {
            id: PropertyId::new(),
            title: "Lakeside bungalow".to_string(),
            price: Money::from_major(5_000_000),
            listed_by: UserId::new(),
            agent_id,
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
        f.properties.create(&property).await.unwrap();
        property.id
    }

    async fn reserve(f: &Fixture, user: UserId, property: PropertyId, now: DateTime<Utc>) {
        let reference = f
            .reservations
            .initialize_reservation_fee(user, property, now)
            .await
            .unwrap()
            .reference;
        f.reservations
            .verify_reservation_fee(&reference, now)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_create_chat_requires_reservation() {
        let f = fixture();
        let user = seed_user(&f, Role::Buyer).await;
        let property = seed_property(&f, None).await;
        let now = Utc::now();

        let err = f
            .service
            .create_chat(user, property, ChatKind::VirtualAssistant, now)
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::BadRequest { .. }));

        reserve(&f, user, property, now).await;
        let chat = f
            .service
            .create_chat(user, property, ChatKind::VirtualAssistant, now)
            .await
            .unwrap();
        assert_eq!(chat.status, ChatStatus::Open);
        assert!(chat.agent_id.is_none());

        // Welcome system message was posted.
        let messages = f.messages.list(chat.id).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].kind, MessageKind::System);
    }

    #[tokio::test]
    async fn test_one_live_chat_per_property() {
        let f = fixture();
        let user = seed_user(&f, Role::Buyer).await;
        let property = seed_property(&f, None).await;
        let now = Utc::now();
        reserve(&f, user, property, now).await;

        f.service
            .create_chat(user, property, ChatKind::VirtualAssistant, now)
            .await
            .unwrap();

        let err = f
            .service
            .create_chat(user, property, ChatKind::VirtualAssistant, now)
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::BadRequest { .. }));
    }

    #[tokio::test]
    async fn test_agent_chat_requires_assigned_agent() {
        let f = fixture();
        let user = seed_user(&f, Role::Buyer).await;
        let property = seed_property(&f, None).await;
        let now = Utc::now();
        reserve(&f, user, property, now).await;

        let err = f
            .service
            .create_chat(user, property, ChatKind::Agent, now)
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::BadRequest { .. }));
    }

    #[tokio::test]
    async fn test_agent_fee_frozen_at_creation() {
        let f = fixture();
        let user = seed_user(&f, Role::Buyer).await;
        let agent = seed_user(&f, Role::Agent).await;
        let property = seed_property(&f, Some(agent)).await;
        let now = Utc::now();
        reserve(&f, user, property, now).await;

        let chat = f
            .service
            .create_chat(user, property, ChatKind::Agent, now)
            .await
            .unwrap();

        // 10% of 5,000,000 = 500,000; agent's 70% cut = 350,000.
        assert_eq!(chat.agent_fee_percentage, 10);
        assert_eq!(chat.agent_fee_amount, Money::from_major(350_000));
    }

    #[tokio::test]
    async fn test_agent_reply_activates_and_credits_responsiveness() {
        let f = fixture();
        let user = seed_user(&f, Role::Buyer).await;
        let agent = seed_user(&f, Role::Agent).await;
        let property = seed_property(&f, Some(agent)).await;
        let now = Utc::now();
        reserve(&f, user, property, now).await;

        let chat = f
            .service
            .create_chat(user, property, ChatKind::Agent, now)
            .await
            .unwrap();

        let reply_at = now + chrono::Duration::minutes(30);
        f.service
            .send_message(chat.id, agent, "Happy to help!".to_string(), reply_at)
            .await
            .unwrap();

        let updated = f.service.chats.get(chat.id).await.unwrap();
        assert_eq!(updated.status, ChatStatus::Active);
        assert_eq!(updated.agent_response_count, 1);
        assert_eq!(updated.first_agent_response_at, Some(reply_at));

        let stats = f.agent_stats.get(agent).await.unwrap().unwrap();
        assert_eq!(stats.responsive_first_replies, 1);
        assert_eq!(stats.missed_first_replies, 0);
    }

    #[tokio::test]
    async fn test_late_first_reply_counts_as_missed() {
        let f = fixture();
        let user = seed_user(&f, Role::Buyer).await;
        let agent = seed_user(&f, Role::Agent).await;
        let property = seed_property(&f, Some(agent)).await;
        let now = Utc::now();
        reserve(&f, user, property, now).await;

        let chat = f
            .service
            .create_chat(user, property, ChatKind::Agent, now)
            .await
            .unwrap();

        let reply_at = now + chrono::Duration::minutes(1441);
        f.service
            .send_message(chat.id, agent, "Sorry for the delay".to_string(), reply_at)
            .await
            .unwrap();

        let stats = f.agent_stats.get(agent).await.unwrap().unwrap();
        assert_eq!(stats.responsive_first_replies, 0);
        assert_eq!(stats.missed_first_replies, 1);
    }

    #[tokio::test]
    async fn test_outsider_cannot_send() {
        let f = fixture();
        let user = seed_user(&f, Role::Buyer).await;
        let outsider = seed_user(&f, Role::Buyer).await;
        let property = seed_property(&f, None).await;
        let now = Utc::now();
        reserve(&f, user, property, now).await;

        let chat = f
            .service
            .create_chat(user, property, ChatKind::VirtualAssistant, now)
            .await
            .unwrap();

        let err = f
            .service
            .send_message(chat.id, outsider, "hello".to_string(), now)
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::Forbidden { .. }));
    }

    #[tokio::test]
    async fn test_outsider_gets_forbidden_on_closed_chat() {
        let f = fixture();
        let user = seed_user(&f, Role::Buyer).await;
        let outsider = seed_user(&f, Role::Buyer).await;
        let admin = seed_user(&f, Role::Admin).await;
        let property = seed_property(&f, None).await;
        let now = Utc::now();
        reserve(&f, user, property, now).await;

        let chat = f
            .service
            .create_chat(user, property, ChatKind::VirtualAssistant, now)
            .await
            .unwrap();
        f.service
            .mark_payment_received(chat.id, admin, "bank transfer sighted".to_string(), now)
            .await
            .unwrap();

        // Authorization wins over the closed-chat state: an outsider is
        // rejected as a non-participant, not told the chat is closed.
        let err = f
            .service
            .send_message(chat.id, outsider, "hello".to_string(), now)
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::Forbidden { .. }));
    }

    #[tokio::test]
    async fn test_assistant_replies_without_touching_stats() {
        let f = fixture();
        let user = seed_user(&f, Role::Buyer).await;
        let property = seed_property(&f, None).await;
        let now = Utc::now();
        reserve(&f, user, property, now).await;

        let chat = f
            .service
            .create_chat(user, property, ChatKind::VirtualAssistant, now)
            .await
            .unwrap();
        f.assistant.set_reply("Yes, it is available for viewing.");

        f.service
            .send_message(chat.id, user, "Is this available?".to_string(), now)
            .await
            .unwrap();

        // Let the detached reply task run.
        tokio::time::sleep(Duration::from_millis(50)).await;

        let messages = f.messages.list(chat.id).await.unwrap();
        let assistant_reply = messages
            .iter()
            .find(|m| m.sender_id.is_virtual_assistant() && m.kind == MessageKind::Text)
            .unwrap();
        assert_eq!(assistant_reply.body, "Yes, it is available for viewing.");

        // Only real agent replies move the counters.
        let updated = f.service.chats.get(chat.id).await.unwrap();
        assert_eq!(updated.agent_response_count, 0);
        assert_eq!(updated.status, ChatStatus::Open);
    }

    #[tokio::test]
    async fn test_assistant_failure_does_not_fail_send() {
        let f = fixture();
        let user = seed_user(&f, Role::Buyer).await;
        let property = seed_property(&f, None).await;
        let now = Utc::now();
        reserve(&f, user, property, now).await;

        let chat = f
            .service
            .create_chat(user, property, ChatKind::VirtualAssistant, now)
            .await
            .unwrap();
        f.assistant.set_failing(true);

        // The send succeeds regardless of the assistant outcome.
        f.service
            .send_message(chat.id, user, "Anyone there?".to_string(), now)
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(f.assistant.call_count(), 1);
    }

    #[tokio::test]
    async fn test_closed_chat_rejects_messages_and_second_close() {
        let f = fixture();
        let user = seed_user(&f, Role::Buyer).await;
        let agent = seed_user(&f, Role::Agent).await;
        let admin = seed_user(&f, Role::Admin).await;
        let property = seed_property(&f, Some(agent)).await;
        let now = Utc::now();
        reserve(&f, user, property, now).await;

        let chat = f
            .service
            .create_chat(user, property, ChatKind::Agent, now)
            .await
            .unwrap();

        let closed = f
            .service
            .mark_payment_received(chat.id, admin, "bank transfer sighted".to_string(), now)
            .await
            .unwrap();
        assert_eq!(closed.status, ChatStatus::PaymentReceived);
        assert_eq!(closed.closed_by, Some(admin));
        assert!(closed.agent_payment_received);

        // The closure notice is an admin notification, not a plain system
        // message.
        let messages = f.messages.list(chat.id).await.unwrap();
        let notice = messages.last().unwrap();
        assert_eq!(notice.kind, MessageKind::AdminNotification);

        let err = f
            .service
            .send_message(chat.id, user, "one more thing".to_string(), now)
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::BadRequest { .. }));

        let err = f
            .service
            .mark_payment_received(chat.id, admin, "again".to_string(), now)
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::BadRequest { .. }));

        // Earnings credited exactly once with the frozen amount.
        let stats = f.agent_stats.get(agent).await.unwrap().unwrap();
        assert_eq!(stats.completed_chats, 1);
        assert_eq!(stats.total_earnings, Money::from_major(350_000));
    }

    #[tokio::test]
    async fn test_non_admin_cannot_close() {
        let f = fixture();
        let user = seed_user(&f, Role::Buyer).await;
        let agent = seed_user(&f, Role::Agent).await;
        let property = seed_property(&f, Some(agent)).await;
        let now = Utc::now();
        reserve(&f, user, property, now).await;

        let chat = f
            .service
            .create_chat(user, property, ChatKind::Agent, now)
            .await
            .unwrap();

        let err = f
            .service
            .mark_payment_received(chat.id, agent, "self-serve".to_string(), now)
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::Forbidden { .. }));
    }

    #[tokio::test]
    async fn test_rating_lifecycle() {
        let f = fixture();
        let user = seed_user(&f, Role::Buyer).await;
        let agent = seed_user(&f, Role::Agent).await;
        let admin = seed_user(&f, Role::Admin).await;
        let property = seed_property(&f, Some(agent)).await;
        let now = Utc::now();
        reserve(&f, user, property, now).await;

        let chat = f
            .service
            .create_chat(user, property, ChatKind::Agent, now)
            .await
            .unwrap();

        let scores = RatingScores {
            communication: 5,
            knowledge: 4,
            professionalism: 5,
            responsiveness: 5,
            helpfulness: 4,
            overall: 5,
        };

        // Rating before closure is rejected.
        let err = f
            .service
            .rate_agent(chat.id, user, scores, None, now)
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::BadRequest { .. }));

        f.service
            .mark_payment_received(chat.id, admin, "paid".to_string(), now)
            .await
            .unwrap();

        let rating = f
            .service
            .rate_agent(chat.id, user, scores, Some(Money::from_major(50)), now)
            .await
            .unwrap();
        assert_eq!(rating.agent_id, agent);

        // Exactly once per chat.
        let err = f
            .service
            .rate_agent(chat.id, user, scores, None, now)
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::BadRequest { .. }));

        let stats = f.agent_stats.get(agent).await.unwrap().unwrap();
        assert_eq!(stats.ratings_received, 1);
        assert_eq!(stats.rating_points, 5);
        assert_eq!(stats.tips_received, Money::from_major(50));
    }

    #[tokio::test]
    async fn test_report_requires_participant() {
        let f = fixture();
        let user = seed_user(&f, Role::Buyer).await;
        let outsider = seed_user(&f, Role::Buyer).await;
        let property = seed_property(&f, None).await;
        let now = Utc::now();
        reserve(&f, user, property, now).await;

        let chat = f
            .service
            .create_chat(user, property, ChatKind::VirtualAssistant, now)
            .await
            .unwrap();

        let err = f
            .service
            .report_conversation(chat.id, outsider, "spam".to_string(), None, now)
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::Forbidden { .. }));

        let report = f
            .service
            .report_conversation(
                chat.id,
                user,
                "inappropriate".to_string(),
                Some("details".to_string()),
                now,
            )
            .await
            .unwrap();
        assert_eq!(report.reported_by, user);
    }
}
