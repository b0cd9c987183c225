//! Persistence capability.
//!
//! The relational store is consumed as a capability, not reimplemented: the
//! traits here assume unique constraints and atomic single-row conditional
//! updates. The property repository is the one place that must provide
//! compare-and-set semantics — the reservation lock is only correct if a
//! racing writer can lose (see [`PropertyRepository::try_reserve`]).
//!
//! [`memory`] implements every trait for tests and development.
//! [`postgres`] (feature `postgres`) implements the lock-critical property
//! and payment repositories with conditional `UPDATE ... WHERE` SQL.

pub mod memory;

#[cfg(feature = "postgres")]
pub mod postgres;

use crate::error::Result;
use crate::types::{
    AgentStats, Chat, ChatId, ChatMessage, ChatReport, Commission, InterestStatus, PaymentId,
    Property, PropertyId, PropertyInterest, ReservationFeePayment, Sale, SaleId, User, UserId,
    UserRating,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Property rows, including the reservation-lock fields.
#[async_trait]
pub trait PropertyRepository: Send + Sync {
    /// Insert a new listing.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails or the id already exists.
    async fn create(&self, property: &Property) -> Result<()>;

    /// Fetch a property by id.
    ///
    /// # Errors
    ///
    /// Returns `MarketError::NotFound` if absent.
    async fn get(&self, id: PropertyId) -> Result<Property>;

    /// List all properties.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails.
    async fn list(&self) -> Result<Vec<Property>>;

    /// Atomically claim the paid reservation for `user`.
    ///
    /// Succeeds iff, at `now`, the property has no live (non-expired)
    /// reservation holder, or the holder is already `user`. An expired
    /// holder counts as vacant — this is where lazy expiry self-heals. On
    /// success the row is committed with `is_reserved = true`, the holder,
    /// the window `[now, expires_at)`, fee status paid, and marketplace
    /// status `Pending`.
    ///
    /// Returns `Ok(None)` when a different live holder exists (the caller
    /// lost the race). This check-then-act must be atomic with respect to
    /// concurrent calls for the same property.
    ///
    /// # Errors
    ///
    /// Returns `MarketError::NotFound` if the property is absent.
    async fn try_reserve(
        &self,
        id: PropertyId,
        user: UserId,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<Option<Property>>;

    /// Release the paid reservation: clears holder, timestamps, and fee
    /// status, and returns the property to `Available`.
    ///
    /// # Errors
    ///
    /// Returns `MarketError::NotFound` if the property is absent.
    async fn release_reservation(&self, id: PropertyId, now: DateTime<Utc>) -> Result<Property>;

    /// Atomically place or renew the short-lived soft hold for `user`.
    ///
    /// Same vacancy rule as [`Self::try_reserve`]: an expired soft hold
    /// counts as vacant; a live hold by another user loses the call.
    ///
    /// # Errors
    ///
    /// Returns `MarketError::NotFound` if the property is absent.
    async fn try_soft_hold(
        &self,
        id: PropertyId,
        user: UserId,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<Option<Property>>;

    /// Release the soft hold if `user` owns it; a no-op otherwise.
    ///
    /// # Errors
    ///
    /// Returns `MarketError::NotFound` if the property is absent.
    async fn release_soft_hold(
        &self,
        id: PropertyId,
        user: UserId,
        now: DateTime<Utc>,
    ) -> Result<Property>;

    /// Mark the property sold (off-market) — used by the sale pipeline
    /// before finance confirms, by explicit design.
    ///
    /// # Errors
    ///
    /// Returns `MarketError::NotFound` if the property is absent.
    async fn mark_sold(&self, id: PropertyId, now: DateTime<Utc>) -> Result<Property>;
}

/// Reservation-fee payment records, unique per gateway reference.
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// Insert a new pending payment.
    ///
    /// # Errors
    ///
    /// Returns `MarketError::Conflict` if the reference already exists
    /// (unique constraint).
    async fn create(&self, payment: &ReservationFeePayment) -> Result<()>;

    /// Fetch a payment by gateway reference.
    ///
    /// # Errors
    ///
    /// Returns `MarketError::NotFound` if absent. The message is generic
    /// so callers cannot probe which references are valid.
    async fn get_by_reference(&self, reference: &str) -> Result<ReservationFeePayment>;

    /// Fetch a payment by id.
    ///
    /// # Errors
    ///
    /// Returns `MarketError::NotFound` if absent.
    async fn get(&self, id: PaymentId) -> Result<ReservationFeePayment>;

    /// Transition the payment to `Success`.
    ///
    /// # Errors
    ///
    /// Returns `MarketError::NotFound` if the reference is absent.
    async fn mark_success(
        &self,
        reference: &str,
        paid_at: DateTime<Utc>,
    ) -> Result<ReservationFeePayment>;

    /// Transition the payment to `Failed` with an annotation. Terminal for
    /// this reference.
    ///
    /// # Errors
    ///
    /// Returns `MarketError::NotFound` if the reference is absent.
    async fn mark_failed(&self, reference: &str, reason: &str) -> Result<ReservationFeePayment>;

    /// Latest successful payment for `(user, property)`, if any.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails.
    async fn latest_success_for(
        &self,
        user: UserId,
        property: PropertyId,
    ) -> Result<Option<ReservationFeePayment>>;
}

/// Chat rows. Chats are scoped to a single (user, property) pairing and
/// need no cross-request coordination beyond single-row updates.
#[async_trait]
pub trait ChatRepository: Send + Sync {
    /// Insert a new chat.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails.
    async fn create(&self, chat: &Chat) -> Result<()>;

    /// Fetch a chat by id.
    ///
    /// # Errors
    ///
    /// Returns `MarketError::NotFound` if absent.
    async fn get(&self, id: ChatId) -> Result<Chat>;

    /// Persist an updated chat row.
    ///
    /// # Errors
    ///
    /// Returns `MarketError::NotFound` if absent.
    async fn update(&self, chat: &Chat) -> Result<()>;

    /// The user's live chat for a property, if one exists.
    ///
    /// Live means status in `{Open, Active, PaymentReceived}`.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails.
    async fn find_live(&self, user: UserId, property: PropertyId) -> Result<Option<Chat>>;
}

/// Append-only chat messages, ordered by creation time.
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Append a message. The single append point keeps per-chat ordering
    /// monotonic.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails.
    async fn append(&self, message: &ChatMessage) -> Result<()>;

    /// All messages for a chat, oldest first.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails.
    async fn list(&self, chat_id: ChatId) -> Result<Vec<ChatMessage>>;
}

/// Agent ratings, unique per chat.
#[async_trait]
pub trait RatingRepository: Send + Sync {
    /// Insert a rating.
    ///
    /// # Errors
    ///
    /// Returns `MarketError::BadRequest` if the chat is already rated
    /// (unique chat reference).
    async fn create(&self, rating: &UserRating) -> Result<()>;

    /// The rating for a chat, if any.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails.
    async fn get_by_chat(&self, chat_id: ChatId) -> Result<Option<UserRating>>;
}

/// Sale records.
#[async_trait]
pub trait SaleRepository: Send + Sync {
    /// Insert a new sale.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails.
    async fn create(&self, sale: &Sale) -> Result<()>;

    /// Fetch a sale by id.
    ///
    /// # Errors
    ///
    /// Returns `MarketError::NotFound` if absent.
    async fn get(&self, id: SaleId) -> Result<Sale>;

    /// Persist an updated sale row.
    ///
    /// # Errors
    ///
    /// Returns `MarketError::NotFound` if absent.
    async fn update(&self, sale: &Sale) -> Result<()>;
}

/// Commission records, created only on finance confirmation.
#[async_trait]
pub trait CommissionRepository: Send + Sync {
    /// Insert a commission.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails.
    async fn create(&self, commission: &Commission) -> Result<()>;

    /// All commissions derived from a sale.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails.
    async fn list_for_sale(&self, sale_id: SaleId) -> Result<Vec<Commission>>;
}

/// Per-agent statistics rows.
#[async_trait]
pub trait AgentStatsRepository: Send + Sync {
    /// Fetch the agent's stats row, creating a zeroed one on first use.
    ///
    /// Get-or-create, not a blind create: repeated crediting never
    /// produces duplicate rows.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails.
    async fn get_or_create(&self, agent_id: UserId, now: DateTime<Utc>) -> Result<AgentStats>;

    /// Persist an updated stats row.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails.
    async fn update(&self, stats: &AgentStats) -> Result<()>;

    /// Fetch the agent's stats row if it exists.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails.
    async fn get(&self, agent_id: UserId) -> Result<Option<AgentStats>>;
}

/// Property-interest records, one per (user, property).
#[async_trait]
pub trait InterestRepository: Send + Sync {
    /// Register (or re-activate) the user's interest in a property.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails.
    async fn upsert_active(
        &self,
        user: UserId,
        property: PropertyId,
        now: DateTime<Utc>,
    ) -> Result<PropertyInterest>;

    /// Set the status of the user's interest in a property, if recorded.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails.
    async fn set_status(
        &self,
        user: UserId,
        property: PropertyId,
        status: InterestStatus,
        now: DateTime<Utc>,
    ) -> Result<()>;

    /// Expire every active interest in the property except `winner`'s.
    ///
    /// Returns the number of interests expired.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails.
    async fn expire_others(
        &self,
        property: PropertyId,
        winner: UserId,
        now: DateTime<Utc>,
    ) -> Result<u32>;

    /// All interests recorded for a property.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails.
    async fn list_for_property(&self, property: PropertyId) -> Result<Vec<PropertyInterest>>;
}

/// User accounts.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a user.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails.
    async fn create(&self, user: &User) -> Result<()>;

    /// Fetch a user by id.
    ///
    /// # Errors
    ///
    /// Returns `MarketError::NotFound` if absent.
    async fn get(&self, id: UserId) -> Result<User>;
}

/// Conversation reports.
#[async_trait]
pub trait ReportRepository: Send + Sync {
    /// File a report.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails.
    async fn create(&self, report: &ChatReport) -> Result<()>;

    /// All reports filed against a chat.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails.
    async fn list_for_chat(&self, chat_id: ChatId) -> Result<Vec<ChatReport>>;
}
