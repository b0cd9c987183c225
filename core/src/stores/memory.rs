//! In-memory store implementations.
//!
//! Each store guards its rows with a single mutex, so every check-then-act
//! sequence below is atomic with respect to concurrent callers — the same
//! guarantee a relational store provides through conditional single-row
//! updates. Used by the test suites and the development binary.

use super::{
    AgentStatsRepository, ChatRepository, CommissionRepository, InterestRepository,
    MessageRepository, PaymentRepository, PropertyRepository, RatingRepository, ReportRepository,
    SaleRepository, UserRepository,
};
use crate::error::{MarketError, Result};
use crate::types::{
    AgentStats, Chat, ChatId, ChatMessage, ChatReport, Commission, FeeStatus, InterestId,
    InterestStatus, PaymentId, PaymentStatus, Property, PropertyId, PropertyInterest,
    PropertyStatus, ReservationFeePayment, Sale, SaleId, User, UserId, UserRating,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// Properties
// ============================================================================

/// In-memory property store.
///
/// The mutex is the atomicity boundary for the reservation compare-and-set.
#[derive(Clone, Debug, Default)]
pub struct MemoryPropertyStore {
    rows: Arc<Mutex<HashMap<PropertyId, Property>>>,
}

impl MemoryPropertyStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PropertyRepository for MemoryPropertyStore {
    async fn create(&self, property: &Property) -> Result<()> {
        let mut rows = lock(&self.rows);
        if rows.contains_key(&property.id) {
            return Err(MarketError::conflict("property id already exists"));
        }
        rows.insert(property.id, property.clone());
        Ok(())
    }

    async fn get(&self, id: PropertyId) -> Result<Property> {
        lock(&self.rows)
            .get(&id)
            .cloned()
            .ok_or(MarketError::not_found("property"))
    }

    async fn list(&self) -> Result<Vec<Property>> {
        Ok(lock(&self.rows).values().cloned().collect())
    }

    async fn try_reserve(
        &self,
        id: PropertyId,
        user: UserId,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<Option<Property>> {
        let mut rows = lock(&self.rows);
        let property = rows.get_mut(&id).ok_or(MarketError::not_found("property"))?;

        // Check-then-act entirely under the lock. An expired holder counts
        // as vacant.
        if let Some(holder) = property.reservation_holder_at(now) {
            if holder != user {
                return Ok(None);
            }
        }

        property.is_reserved = true;
        property.current_reservation_by = Some(user);
        property.reservation_started_at = Some(now);
        property.reservation_expires_at = Some(expires_at);
        property.reservation_fee_status = FeeStatus::Paid;
        property.status = PropertyStatus::Pending;
        property.updated_at = now;
        Ok(Some(property.clone()))
    }

    async fn release_reservation(&self, id: PropertyId, now: DateTime<Utc>) -> Result<Property> {
        let mut rows = lock(&self.rows);
        let property = rows.get_mut(&id).ok_or(MarketError::not_found("property"))?;

        property.is_reserved = false;
        property.current_reservation_by = None;
        property.reservation_started_at = None;
        property.reservation_expires_at = None;
        property.reservation_fee_status = FeeStatus::Unpaid;
        property.status = PropertyStatus::Available;
        property.updated_at = now;
        Ok(property.clone())
    }

    async fn try_soft_hold(
        &self,
        id: PropertyId,
        user: UserId,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<Option<Property>> {
        let mut rows = lock(&self.rows);
        let property = rows.get_mut(&id).ok_or(MarketError::not_found("property"))?;

        if let Some(owner) = property.soft_hold_owner_at(now) {
            if owner != user {
                return Ok(None);
            }
        }

        property.soft_hold_by = Some(user);
        property.soft_hold_expires_at = Some(expires_at);
        property.updated_at = now;
        Ok(Some(property.clone()))
    }

    async fn release_soft_hold(
        &self,
        id: PropertyId,
        user: UserId,
        now: DateTime<Utc>,
    ) -> Result<Property> {
        let mut rows = lock(&self.rows);
        let property = rows.get_mut(&id).ok_or(MarketError::not_found("property"))?;

        if property.soft_hold_by == Some(user) {
            property.soft_hold_by = None;
            property.soft_hold_expires_at = None;
            property.updated_at = now;
        }
        Ok(property.clone())
    }

    async fn mark_sold(&self, id: PropertyId, now: DateTime<Utc>) -> Result<Property> {
        let mut rows = lock(&self.rows);
        let property = rows.get_mut(&id).ok_or(MarketError::not_found("property"))?;

        property.status = PropertyStatus::Sold;
        property.updated_at = now;
        Ok(property.clone())
    }
}

// ============================================================================
// Payments
// ============================================================================

/// In-memory payment store, keyed by gateway reference.
#[derive(Clone, Debug, Default)]
pub struct MemoryPaymentStore {
    rows: Arc<Mutex<HashMap<String, ReservationFeePayment>>>,
}

impl MemoryPaymentStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentRepository for MemoryPaymentStore {
    async fn create(&self, payment: &ReservationFeePayment) -> Result<()> {
        let mut rows = lock(&self.rows);
        if rows.contains_key(&payment.reference) {
            return Err(MarketError::conflict("payment reference already exists"));
        }
        rows.insert(payment.reference.clone(), payment.clone());
        Ok(())
    }

    async fn get_by_reference(&self, reference: &str) -> Result<ReservationFeePayment> {
        lock(&self.rows)
            .get(reference)
            .cloned()
            .ok_or(MarketError::not_found("payment record"))
    }

    async fn get(&self, id: PaymentId) -> Result<ReservationFeePayment> {
        lock(&self.rows)
            .values()
            .find(|p| p.id == id)
            .cloned()
            .ok_or(MarketError::not_found("payment record"))
    }

    async fn mark_success(
        &self,
        reference: &str,
        paid_at: DateTime<Utc>,
    ) -> Result<ReservationFeePayment> {
        let mut rows = lock(&self.rows);
        let payment = rows
            .get_mut(reference)
            .ok_or(MarketError::not_found("payment record"))?;
        payment.status = PaymentStatus::Success;
        payment.paid_at = Some(paid_at);
        Ok(payment.clone())
    }

    async fn mark_failed(&self, reference: &str, reason: &str) -> Result<ReservationFeePayment> {
        let mut rows = lock(&self.rows);
        let payment = rows
            .get_mut(reference)
            .ok_or(MarketError::not_found("payment record"))?;
        payment.status = PaymentStatus::Failed;
        payment.failure_reason = Some(reason.to_string());
        Ok(payment.clone())
    }

    async fn latest_success_for(
        &self,
        user: UserId,
        property: PropertyId,
    ) -> Result<Option<ReservationFeePayment>> {
        Ok(lock(&self.rows)
            .values()
            .filter(|p| {
                p.user_id == user && p.property_id == property && p.status == PaymentStatus::Success
            })
            .max_by_key(|p| p.created_at)
            .cloned())
    }
}

// ============================================================================
// Chats & messages
// ============================================================================

/// In-memory chat store.
#[derive(Clone, Debug, Default)]
pub struct MemoryChatStore {
    rows: Arc<Mutex<HashMap<ChatId, Chat>>>,
}

impl MemoryChatStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChatRepository for MemoryChatStore {
    async fn create(&self, chat: &Chat) -> Result<()> {
        lock(&self.rows).insert(chat.id, chat.clone());
        Ok(())
    }

    async fn get(&self, id: ChatId) -> Result<Chat> {
        lock(&self.rows)
            .get(&id)
            .cloned()
            .ok_or(MarketError::not_found("chat"))
    }

    async fn update(&self, chat: &Chat) -> Result<()> {
        let mut rows = lock(&self.rows);
        if !rows.contains_key(&chat.id) {
            return Err(MarketError::not_found("chat"));
        }
        rows.insert(chat.id, chat.clone());
        Ok(())
    }

    async fn find_live(&self, user: UserId, property: PropertyId) -> Result<Option<Chat>> {
        Ok(lock(&self.rows)
            .values()
            .find(|c| c.user_id == user && c.property_id == property && c.status.is_live())
            .cloned())
    }
}

/// In-memory message store. Append order is preserved per chat.
#[derive(Clone, Debug, Default)]
pub struct MemoryMessageStore {
    rows: Arc<Mutex<Vec<ChatMessage>>>,
}

impl MemoryMessageStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageRepository for MemoryMessageStore {
    async fn append(&self, message: &ChatMessage) -> Result<()> {
        lock(&self.rows).push(message.clone());
        Ok(())
    }

    async fn list(&self, chat_id: ChatId) -> Result<Vec<ChatMessage>> {
        let mut messages: Vec<ChatMessage> = lock(&self.rows)
            .iter()
            .filter(|m| m.chat_id == chat_id)
            .cloned()
            .collect();
        messages.sort_by_key(|m| m.created_at);
        Ok(messages)
    }
}

// ============================================================================
// Ratings
// ============================================================================

/// In-memory rating store. Uniqueness per chat is enforced on insert.
#[derive(Clone, Debug, Default)]
pub struct MemoryRatingStore {
    rows: Arc<Mutex<HashMap<ChatId, UserRating>>>,
}

impl MemoryRatingStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RatingRepository for MemoryRatingStore {
    async fn create(&self, rating: &UserRating) -> Result<()> {
        let mut rows = lock(&self.rows);
        if rows.contains_key(&rating.chat_id) {
            return Err(MarketError::bad_request("chat has already been rated"));
        }
        rows.insert(rating.chat_id, rating.clone());
        Ok(())
    }

    async fn get_by_chat(&self, chat_id: ChatId) -> Result<Option<UserRating>> {
        Ok(lock(&self.rows).get(&chat_id).cloned())
    }
}

// ============================================================================
// Sales & commissions
// ============================================================================

/// In-memory sale store.
#[derive(Clone, Debug, Default)]
pub struct MemorySaleStore {
    rows: Arc<Mutex<HashMap<SaleId, Sale>>>,
}

impl MemorySaleStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SaleRepository for MemorySaleStore {
    async fn create(&self, sale: &Sale) -> Result<()> {
        lock(&self.rows).insert(sale.id, sale.clone());
        Ok(())
    }

    async fn get(&self, id: SaleId) -> Result<Sale> {
        lock(&self.rows)
            .get(&id)
            .cloned()
            .ok_or(MarketError::not_found("sale"))
    }

    async fn update(&self, sale: &Sale) -> Result<()> {
        let mut rows = lock(&self.rows);
        if !rows.contains_key(&sale.id) {
            return Err(MarketError::not_found("sale"));
        }
        rows.insert(sale.id, sale.clone());
        Ok(())
    }
}

/// In-memory commission store.
#[derive(Clone, Debug, Default)]
pub struct MemoryCommissionStore {
    rows: Arc<Mutex<Vec<Commission>>>,
}

impl MemoryCommissionStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CommissionRepository for MemoryCommissionStore {
    async fn create(&self, commission: &Commission) -> Result<()> {
        lock(&self.rows).push(commission.clone());
        Ok(())
    }

    async fn list_for_sale(&self, sale_id: SaleId) -> Result<Vec<Commission>> {
        Ok(lock(&self.rows)
            .iter()
            .filter(|c| c.sale_id == sale_id)
            .cloned()
            .collect())
    }
}

// ============================================================================
// Agent statistics
// ============================================================================

/// In-memory agent statistics store.
#[derive(Clone, Debug, Default)]
pub struct MemoryAgentStatsStore {
    rows: Arc<Mutex<HashMap<UserId, AgentStats>>>,
}

impl MemoryAgentStatsStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AgentStatsRepository for MemoryAgentStatsStore {
    async fn get_or_create(&self, agent_id: UserId, now: DateTime<Utc>) -> Result<AgentStats> {
        let mut rows = lock(&self.rows);
        Ok(rows
            .entry(agent_id)
            .or_insert_with(|| AgentStats::new(agent_id, now))
            .clone())
    }

    async fn update(&self, stats: &AgentStats) -> Result<()> {
        lock(&self.rows).insert(stats.agent_id, stats.clone());
        Ok(())
    }

    async fn get(&self, agent_id: UserId) -> Result<Option<AgentStats>> {
        Ok(lock(&self.rows).get(&agent_id).cloned())
    }
}

// ============================================================================
// Property interest
// ============================================================================

/// In-memory interest store, unique per (user, property).
#[derive(Clone, Debug, Default)]
pub struct MemoryInterestStore {
    rows: Arc<Mutex<HashMap<(UserId, PropertyId), PropertyInterest>>>,
}

impl MemoryInterestStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InterestRepository for MemoryInterestStore {
    async fn upsert_active(
        &self,
        user: UserId,
        property: PropertyId,
        now: DateTime<Utc>,
    ) -> Result<PropertyInterest> {
        let mut rows = lock(&self.rows);
        let interest = rows
            .entry((user, property))
            .and_modify(|i| {
                i.status = InterestStatus::Active;
                i.updated_at = now;
            })
            .or_insert_with(|| PropertyInterest {
                id: InterestId::new(),
                user_id: user,
                property_id: property,
                status: InterestStatus::Active,
                created_at: now,
                updated_at: now,
            });
        Ok(interest.clone())
    }

    async fn set_status(
        &self,
        user: UserId,
        property: PropertyId,
        status: InterestStatus,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let mut rows = lock(&self.rows);
        if let Some(interest) = rows.get_mut(&(user, property)) {
            interest.status = status;
            interest.updated_at = now;
        }
        Ok(())
    }

    async fn expire_others(
        &self,
        property: PropertyId,
        winner: UserId,
        now: DateTime<Utc>,
    ) -> Result<u32> {
        let mut rows = lock(&self.rows);
        let mut expired = 0;
        for ((user, prop), interest) in rows.iter_mut() {
            if *prop == property && *user != winner && interest.status == InterestStatus::Active {
                interest.status = InterestStatus::Expired;
                interest.updated_at = now;
                expired += 1;
            }
        }
        Ok(expired)
    }

    async fn list_for_property(&self, property: PropertyId) -> Result<Vec<PropertyInterest>> {
        Ok(lock(&self.rows)
            .values()
            .filter(|i| i.property_id == property)
            .cloned()
            .collect())
    }
}

// ============================================================================
// Users & reports
// ============================================================================

/// In-memory user store.
#[derive(Clone, Debug, Default)]
pub struct MemoryUserStore {
    rows: Arc<Mutex<HashMap<UserId, User>>>,
}

impl MemoryUserStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for MemoryUserStore {
    async fn create(&self, user: &User) -> Result<()> {
        lock(&self.rows).insert(user.id, user.clone());
        Ok(())
    }

    async fn get(&self, id: UserId) -> Result<User> {
        lock(&self.rows)
            .get(&id)
            .cloned()
            .ok_or(MarketError::not_found("user"))
    }
}

/// In-memory report store.
#[derive(Clone, Debug, Default)]
pub struct MemoryReportStore {
    rows: Arc<Mutex<Vec<ChatReport>>>,
}

impl MemoryReportStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReportRepository for MemoryReportStore {
    async fn create(&self, report: &ChatReport) -> Result<()> {
        lock(&self.rows).push(report.clone());
        Ok(())
    }

    async fn list_for_chat(&self, chat_id: ChatId) -> Result<Vec<ChatReport>> {
        Ok(lock(&self.rows)
            .iter()
            .filter(|r| r.chat_id == chat_id)
            .cloned()
            .collect())
    }
}
