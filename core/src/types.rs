//! Domain types for the property marketplace.
//!
//! This module contains the value objects, entities, and state enums for the
//! reservation lock, chat lifecycle, and sale/finance pipeline. Entities are
//! plain data: every state transition is owned by a service in
//! [`crate::services`] and persisted through the repositories in
//! [`crate::stores`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for a user (buyer, agent, admin, or finance reviewer)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(Uuid);

impl UserId {
    /// Creates a new random `UserId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `UserId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// The reserved sentinel id for the automated virtual assistant.
    ///
    /// Messages generated by the assistant carry this sender id; it never
    /// collides with a real user because real ids are random v4 UUIDs.
    #[must_use]
    pub const fn virtual_assistant() -> Self {
        Self(Uuid::nil())
    }

    /// Returns `true` if this id is the virtual-assistant sentinel.
    #[must_use]
    pub const fn is_virtual_assistant(&self) -> bool {
        self.0.is_nil()
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a property listing
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PropertyId(Uuid);

impl PropertyId {
    /// Creates a new random `PropertyId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `PropertyId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PropertyId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a reservation-fee payment record
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaymentId(Uuid);

impl PaymentId {
    /// Creates a new random `PaymentId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `PaymentId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PaymentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PaymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a chat
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatId(Uuid);

impl ChatId {
    /// Creates a new random `ChatId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `ChatId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ChatId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a chat message
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(Uuid);

impl MessageId {
    /// Creates a new random `MessageId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for an agent rating
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RatingId(Uuid);

impl RatingId {
    /// Creates a new random `RatingId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RatingId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RatingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a sale record
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SaleId(Uuid);

impl SaleId {
    /// Creates a new random `SaleId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `SaleId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SaleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SaleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a commission record
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommissionId(Uuid);

impl CommissionId {
    /// Creates a new random `CommissionId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CommissionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CommissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a property-interest record
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InterestId(Uuid);

impl InterestId {
    /// Creates a new random `InterestId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for InterestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for InterestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a conversation report
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReportId(Uuid);

impl ReportId {
    /// Creates a new random `ReportId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ReportId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ReportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Money
// ============================================================================

/// Monetary amount in minor currency units.
///
/// All arithmetic in the state machine happens on minor units (×100 of the
/// displayed major unit). Conversion to and from a payment gateway's wire
/// format is the gateway adapter's responsibility.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Money {
    minor: i64,
}

impl Money {
    /// Zero amount
    pub const ZERO: Self = Self { minor: 0 };

    /// Create from minor units (e.g. kobo, cents)
    #[must_use]
    pub const fn from_minor(minor: i64) -> Self {
        Self { minor }
    }

    /// Create from major units (e.g. naira, dollars)
    #[must_use]
    pub const fn from_major(major: i64) -> Self {
        Self { minor: major * 100 }
    }

    /// Amount in minor units
    #[must_use]
    pub const fn minor(&self) -> i64 {
        self.minor
    }

    /// Amount in whole major units (truncating)
    #[must_use]
    pub const fn major(&self) -> i64 {
        self.minor / 100
    }

    /// Apply a whole-number percentage, truncating toward zero.
    ///
    /// Used for the frozen agent-fee math and the commission rate; repeated
    /// application composes (fee % of price, then cut % of that fee).
    #[must_use]
    pub const fn percent(&self, pct: u8) -> Self {
        Self {
            minor: self.minor * pct as i64 / 100,
        }
    }

    /// Checked addition
    #[must_use]
    pub const fn saturating_add(&self, other: Self) -> Self {
        Self {
            minor: self.minor.saturating_add(other.minor),
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.minor / 100, (self.minor % 100).abs())
    }
}

// ============================================================================
// Users & Roles
// ============================================================================

/// Role of an authenticated actor.
///
/// Authorization is an explicit predicate evaluated at the start of each
/// state-machine operation, never ambient middleware.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Regular buyer / prospective tenant
    Buyer,
    /// Listing agent responding to chats
    Agent,
    /// Marketplace administrator (lists properties, closes chats, asserts sales)
    Admin,
    /// Finance reviewer (second-phase sale approval)
    Finance,
}

impl Role {
    /// Can this role close chats and assert sales?
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }

    /// Can this role perform finance review of a sale?
    #[must_use]
    pub const fn can_review_sales(&self) -> bool {
        matches!(self, Self::Finance)
    }

    /// Admin-or-finance: allowed to act on properties they do not own.
    #[must_use]
    pub const fn is_elevated(&self) -> bool {
        matches!(self, Self::Admin | Self::Finance)
    }
}

/// A marketplace user.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Unique id
    pub id: UserId,
    /// Email address (used by the payment gateway for receipts)
    pub email: String,
    /// Display name
    pub display_name: String,
    /// Actor role
    pub role: Role,
    /// When the account was created
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Property (aggregate root of the reservation lock)
// ============================================================================

/// Marketplace status of a property.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertyStatus {
    /// Open for reservation
    Available,
    /// Reserved by a paying user, sale not yet asserted
    Pending,
    /// An admin has asserted a sale (optimistically, before finance review)
    Sold,
}

/// Whether the reservation fee for the current hold has been paid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeeStatus {
    /// No verified fee payment backs the current state
    Unpaid,
    /// A verified fee payment backs the current reservation
    Paid,
}

/// A property listing and its reservation-lock state.
///
/// The property row is the single resource requiring exclusive-write
/// discipline: transitions of the reservation fields go through the
/// compare-and-set operations on
/// [`PropertyRepository`](crate::stores::PropertyRepository), never through
/// blind overwrites.
///
/// Invariant: `is_reserved == true` implies both `current_reservation_by`
/// and `reservation_expires_at` are set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Property {
    /// Unique id
    pub id: PropertyId,
    /// Listing title
    pub title: String,
    /// Asking price
    pub price: Money,
    /// Admin who listed the property
    pub listed_by: UserId,
    /// Assigned human agent, if any
    pub agent_id: Option<UserId>,
    /// Marketplace status
    pub status: PropertyStatus,
    /// Exclusive paid reservation flag
    pub is_reserved: bool,
    /// Current reservation holder (set iff `is_reserved`)
    pub current_reservation_by: Option<UserId>,
    /// When the current reservation was verified
    pub reservation_started_at: Option<DateTime<Utc>>,
    /// When the current reservation lapses (checked lazily at read time)
    pub reservation_expires_at: Option<DateTime<Utc>>,
    /// Fee state backing the current reservation
    pub reservation_fee_status: FeeStatus,
    /// Short-lived non-paid hold while a user is mid-chat
    pub soft_hold_by: Option<UserId>,
    /// When the soft hold lapses
    pub soft_hold_expires_at: Option<DateTime<Utc>>,
    /// When the listing was created
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp
    pub updated_at: DateTime<Utc>,
}

impl Property {
    /// Returns the non-expired reservation holder at `now`, if any.
    ///
    /// Expiry is passive: an expired reservation is simply treated as
    /// absent the next time it is consulted. The `is_reserved` boolean may
    /// therefore display stale-true until the next write touches the row.
    #[must_use]
    pub fn reservation_holder_at(&self, now: DateTime<Utc>) -> Option<UserId> {
        if !self.is_reserved {
            return None;
        }
        match (self.current_reservation_by, self.reservation_expires_at) {
            (Some(holder), Some(expires)) if now < expires => Some(holder),
            _ => None,
        }
    }

    /// Returns the non-expired soft-hold owner at `now`, if any.
    #[must_use]
    pub fn soft_hold_owner_at(&self, now: DateTime<Utc>) -> Option<UserId> {
        match (self.soft_hold_by, self.soft_hold_expires_at) {
            (Some(owner), Some(expires)) if now < expires => Some(owner),
            _ => None,
        }
    }
}

// ============================================================================
// Reservation-fee payments
// ============================================================================

/// Lifecycle status of a reservation-fee payment record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    /// Initialized with the gateway, not yet verified
    Pending,
    /// Verified successful; transitions at most once
    Success,
    /// Terminal failure for this reference; the user must re-initialize
    Failed,
}

/// A reservation-fee payment.
///
/// Created `Pending` when a payment is initialized with the gateway and
/// transitions to `Success` or `Failed` exactly once. A second verification
/// of an already-`Success` record is a no-op returning the existing record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReservationFeePayment {
    /// Unique id
    pub id: PaymentId,
    /// Paying user
    pub user_id: UserId,
    /// Property being reserved
    pub property_id: PropertyId,
    /// Fixed reservation fee charged
    pub amount: Money,
    /// Lifecycle status
    pub status: PaymentStatus,
    /// Globally unique gateway reference
    pub reference: String,
    /// When the gateway reported the charge settled
    pub paid_at: Option<DateTime<Utc>>,
    /// Annotation recorded when the payment is marked failed
    pub failure_reason: Option<String>,
    /// Opaque metadata echoed to the gateway
    pub metadata: serde_json::Value,
    /// When the record was created
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Chats
// ============================================================================

/// Kind of chat requested at creation time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatKind {
    /// Replies generated by the automated assistant (`agent_id` stays unset)
    VirtualAssistant,
    /// Replies come from the property's assigned human agent
    Agent,
}

/// Chat state machine: `Open → Active → PaymentReceived`.
///
/// `PaymentReceived` is entered together with closure when an admin confirms
/// payment, and is terminal in practice. The `Closed` variant mirrors the
/// stored status vocabulary but has no inbound transition: there is no
/// modeled path for a user-abandoned or admin-cancelled chat to close
/// without payment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatStatus {
    /// Created, awaiting the first agent reply
    Open,
    /// Agent has replied at least once
    Active,
    /// Admin confirmed payment; chat closed atomically with this transition
    PaymentReceived,
    /// Terminal label with no inbound transition in this design
    Closed,
}

impl ChatStatus {
    /// Is the chat still counted as the user's live chat for the property?
    ///
    /// At most one chat per (user, property) may be in a live status.
    #[must_use]
    pub const fn is_live(&self) -> bool {
        matches!(self, Self::Open | Self::Active | Self::PaymentReceived)
    }
}

/// A conversation between a user and either the virtual assistant or the
/// property's assigned agent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    /// Unique id
    pub id: ChatId,
    /// The user who opened the chat
    pub user_id: UserId,
    /// Property under discussion
    pub property_id: PropertyId,
    /// Assigned agent; `None` means virtual-assistant chat
    pub agent_id: Option<UserId>,
    /// Chat kind selected at creation
    pub kind: ChatKind,
    /// State-machine status
    pub status: ChatStatus,
    /// Number of messages the user has sent
    pub user_message_count: u32,
    /// Number of replies the human agent has sent
    pub agent_response_count: u32,
    /// When the agent first replied (responsiveness anchor)
    pub first_agent_response_at: Option<DateTime<Utc>>,
    /// Timestamp of the latest user message
    pub last_user_message_at: Option<DateTime<Utc>>,
    /// Timestamp of the latest agent reply
    pub last_agent_response_at: Option<DateTime<Utc>>,
    /// When the chat was closed (set iff payment was received)
    pub closed_at: Option<DateTime<Utc>>,
    /// Admin who confirmed payment and closed the chat
    pub closed_by: Option<UserId>,
    /// Closure reason recorded by the admin
    pub closure_reason: Option<String>,
    /// Agent fee percentage frozen at creation
    pub agent_fee_percentage: u8,
    /// Agent fee amount frozen at creation (never recomputed)
    pub agent_fee_amount: Money,
    /// Whether the agent's fee has been credited
    pub agent_payment_received: bool,
    /// When the chat was created
    pub created_at: DateTime<Utc>,
}

impl Chat {
    /// Whether the chat is closed to further mutation (messages, closure).
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed_at.is_some() || matches!(self.status, ChatStatus::PaymentReceived | ChatStatus::Closed)
    }
}

/// Kind of a chat message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageKind {
    /// Ordinary text from a user, agent, or the assistant
    Text,
    /// System-generated lifecycle message (welcome, report, rating request)
    System,
    /// Notification posted on behalf of an admin action (payment closure)
    AdminNotification,
}

/// A single chat message. Append-only; creation order is the sequencing
/// authority for conversation state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Unique id
    pub id: MessageId,
    /// Chat this message belongs to
    pub chat_id: ChatId,
    /// Sender: a real user id or the virtual-assistant sentinel
    pub sender_id: UserId,
    /// Message body
    pub body: String,
    /// Message kind
    pub kind: MessageKind,
    /// When the recipient read the message
    pub read_at: Option<DateTime<Utc>>,
    /// Creation timestamp (monotonic per chat via the single append point)
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Ratings
// ============================================================================

/// Scores a user gives an agent after a chat closes.
///
/// Each dimension is 1–5. At most one rating exists per chat.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingScores {
    /// Communication quality
    pub communication: u8,
    /// Market/property knowledge
    pub knowledge: u8,
    /// Professional conduct
    pub professionalism: u8,
    /// Speed of replies
    pub responsiveness: u8,
    /// Overall helpfulness
    pub helpfulness: u8,
    /// Overall score
    pub overall: u8,
}

impl RatingScores {
    /// Are all dimensions within the 1–5 range?
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        let scores = [
            self.communication,
            self.knowledge,
            self.professionalism,
            self.responsiveness,
            self.helpfulness,
            self.overall,
        ];
        let mut i = 0;
        while i < scores.len() {
            if scores[i] < 1 || scores[i] > 5 {
                return false;
            }
            i += 1;
        }
        true
    }
}

/// A user's rating of an agent for one closed chat.
///
/// Immutable once created except for the tip-payment flag.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserRating {
    /// Unique id
    pub id: RatingId,
    /// Rated chat (unique — one rating per chat)
    pub chat_id: ChatId,
    /// Rating user
    pub user_id: UserId,
    /// Rated agent
    pub agent_id: UserId,
    /// Scores across the five sub-dimensions plus overall
    pub scores: RatingScores,
    /// Optional tip pledged to the agent
    pub tip_amount: Option<Money>,
    /// Whether the tip has been paid out
    pub tip_paid: bool,
    /// When the rating was created
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Sales & Commissions
// ============================================================================

/// Status of an admin-asserted sale.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaleStatus {
    /// Admin asserted the sale; payment proof submitted out of band
    PaymentSubmitted,
    /// Finance confirmed receipt of funds
    Confirmed,
    /// Sale withdrawn
    Cancelled,
    /// Finance rejected the asserted payment
    Disputed,
}

/// Finance-review phase of a sale. One-shot: a reviewed sale cannot be
/// reviewed again.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FinanceStatus {
    /// Awaiting review
    Pending,
    /// Review confirmed the payment
    Confirmed,
    /// Review rejected the payment
    Rejected,
}

/// A manually asserted sale reconciling an out-of-band bank payment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sale {
    /// Unique id
    pub id: SaleId,
    /// Property sold
    pub property_id: PropertyId,
    /// Buying user
    pub buyer_id: UserId,
    /// Listing admin/agent credited with the sale
    pub seller_id: UserId,
    /// Sale amount
    pub amount: Money,
    /// Sale status
    pub status: SaleStatus,
    /// Finance-review phase
    pub finance_status: FinanceStatus,
    /// Whether the company account received the funds
    pub company_account_paid: bool,
    /// Link to the uploaded payment proof, if provided
    pub payment_proof_url: Option<String>,
    /// Finance user who reviewed the sale
    pub reviewed_by: Option<UserId>,
    /// When the review happened
    pub reviewed_at: Option<DateTime<Utc>>,
    /// When the sale was asserted
    pub created_at: DateTime<Utc>,
}

/// Payout status of a commission record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommissionStatus {
    /// Owed, not yet paid out
    Pending,
    /// Paid out
    Paid,
}

/// Commission owed to the listing admin after finance confirms a sale.
///
/// Created only on finance confirmation, exactly once per sale.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Commission {
    /// Unique id
    pub id: CommissionId,
    /// Confirmed sale this commission derives from
    pub sale_id: SaleId,
    /// Listing admin credited
    pub admin_id: UserId,
    /// Commission amount (fixed percentage of sale amount)
    pub amount: Money,
    /// Payout status
    pub status: CommissionStatus,
    /// When the commission was created
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Property interest
// ============================================================================

/// Status of a user's recorded interest in a property.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum InterestStatus {
    /// Interest registered and live
    Active,
    /// This user bought the property
    Purchased,
    /// The property sold to someone else
    Expired,
}

/// A user's interest in a property. One record per (user, property).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PropertyInterest {
    /// Unique id
    pub id: InterestId,
    /// Interested user
    pub user_id: UserId,
    /// Property of interest
    pub property_id: PropertyId,
    /// Interest status
    pub status: InterestStatus,
    /// When the interest was first registered
    pub created_at: DateTime<Utc>,
    /// Last status change
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// Agent statistics
// ============================================================================

/// Aggregated per-agent statistics credited by chat closures and ratings.
///
/// The row is get-or-created on first use so repeated crediting never
/// produces duplicate stat rows.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentStats {
    /// Agent this row belongs to
    pub agent_id: UserId,
    /// Chats closed with payment received
    pub completed_chats: u32,
    /// Cumulative fee earnings (frozen per-chat amounts)
    pub total_earnings: Money,
    /// Number of ratings received
    pub ratings_received: u32,
    /// Sum of overall scores (average = points / received)
    pub rating_points: u32,
    /// Cumulative tips pledged
    pub tips_received: Money,
    /// First replies that landed within the responsiveness threshold
    pub responsive_first_replies: u32,
    /// First replies that missed the responsiveness threshold
    pub missed_first_replies: u32,
    /// Last mutation timestamp
    pub updated_at: DateTime<Utc>,
}

impl AgentStats {
    /// Fresh zeroed row for an agent.
    #[must_use]
    pub fn new(agent_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            agent_id,
            completed_chats: 0,
            total_earnings: Money::ZERO,
            ratings_received: 0,
            rating_points: 0,
            tips_received: Money::ZERO,
            responsive_first_replies: 0,
            missed_first_replies: 0,
            updated_at: now,
        }
    }
}

// ============================================================================
// Reports
// ============================================================================

/// A user's report of a conversation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatReport {
    /// Unique id
    pub id: ReportId,
    /// Reported chat
    pub chat_id: ChatId,
    /// Reporting user
    pub reported_by: UserId,
    /// Short reason category
    pub reason: String,
    /// Free-form details
    pub details: Option<String>,
    /// When the report was filed
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_money_percent_composition() {
        // 10% agent fee of 5,000,000.00, then the agent's 70% cut of that fee
        let price = Money::from_major(5_000_000);
        let fee = price.percent(10);
        assert_eq!(fee, Money::from_major(500_000));
        assert_eq!(fee.percent(70), Money::from_major(350_000));
    }

    #[test]
    fn test_virtual_assistant_sentinel() {
        assert!(UserId::virtual_assistant().is_virtual_assistant());
        assert!(!UserId::new().is_virtual_assistant());
    }

    #[test]
    fn test_rating_scores_validation() {
        let valid = RatingScores {
            communication: 5,
            knowledge: 4,
            professionalism: 5,
            responsiveness: 3,
            helpfulness: 4,
            overall: 5,
        };
        assert!(valid.is_valid());

        let zero = RatingScores { overall: 0, ..valid };
        assert!(!zero.is_valid());

        let six = RatingScores { knowledge: 6, ..valid };
        assert!(!six.is_valid());
    }

    mod money_properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn percent_never_exceeds_base(minor in 0i64..10_000_000_000, pct in 0u8..=100) {
                let money = Money::from_minor(minor);
                prop_assert!(money.percent(pct).minor() <= money.minor());
            }

            #[test]
            fn percent_composition_is_commutative(
                minor in 0i64..10_000_000_000,
                a in 1u8..=100,
                b in 1u8..=100,
            ) {
                // Truncation happens per step, but swapping the steps only
                // moves the result by at most one truncation's worth.
                let money = Money::from_minor(minor);
                let ab = money.percent(a).percent(b).minor();
                let ba = money.percent(b).percent(a).minor();
                prop_assert!((ab - ba).abs() <= 1);
            }
        }
    }

    #[test]
    fn test_reservation_holder_expiry_is_lazy() {
        let now = Utc::now();
        let holder = UserId::new();
        let property = Property {
            id: PropertyId::new(),
            title: "3-bed duplex".to_string(),
            price: Money::from_major(1_000_000),
            listed_by: UserId::new(),
            agent_id: None,
            status: PropertyStatus::Pending,
            is_reserved: true,
            current_reservation_by: Some(holder),
            reservation_started_at: Some(now - chrono::Duration::days(8)),
            reservation_expires_at: Some(now - chrono::Duration::days(1)),
            reservation_fee_status: FeeStatus::Paid,
            soft_hold_by: None,
            soft_hold_expires_at: None,
            created_at: now,
            updated_at: now,
        };

        // The boolean still reads true, but the holder is gone at read time.
        assert!(property.is_reserved);
        assert_eq!(property.reservation_holder_at(now), None);
    }
}
