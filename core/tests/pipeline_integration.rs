//! End-to-end pipeline tests: reservation, chat, closure, rating, and the
//! sale/finance review, wired over the in-memory stores with scriptable
//! collaborators.

#![allow(clippy::unwrap_used)]

use chrono::Utc;
use homestead_core::assistant::MockTextGeneration;
use homestead_core::config::MarketplaceConfig;
use homestead_core::error::MarketError;
use homestead_core::gateway::MockPaymentGateway;
use homestead_core::services::{
    ChatService, MarkSoldRequest, ReservationService, ReviewDecision, SaleService,
};
use homestead_core::stores::memory::{
    MemoryAgentStatsStore, MemoryChatStore, MemoryCommissionStore, MemoryInterestStore,
    MemoryMessageStore, MemoryPaymentStore, MemoryPropertyStore, MemoryRatingStore,
    MemoryReportStore, MemorySaleStore, MemoryUserStore,
};
use homestead_core::stores::{
    AgentStatsRepository, CommissionRepository, InterestRepository, PropertyRepository,
    UserRepository,
};
use homestead_core::types::{
    ChatKind, ChatStatus, FeeStatus, InterestStatus, Money, Property, PropertyId, PropertyStatus,
    RatingScores, Role, User, UserId,
};
use std::sync::Arc;

struct Marketplace {
    reservations: Arc<ReservationService>,
    chats: ChatService,
    sales: SaleService,
    properties: Arc<MemoryPropertyStore>,
    users: Arc<MemoryUserStore>,
    interests: Arc<MemoryInterestStore>,
    commissions: Arc<MemoryCommissionStore>,
    agent_stats: Arc<MemoryAgentStatsStore>,
}

fn marketplace() -> Marketplace {
    let config = MarketplaceConfig::new();
    let properties = Arc::new(MemoryPropertyStore::new());
    let payments = Arc::new(MemoryPaymentStore::new());
    let users = Arc::new(MemoryUserStore::new());
    let interests = Arc::new(MemoryInterestStore::new());
    let commissions = Arc::new(MemoryCommissionStore::new());
    let agent_stats = Arc::new(MemoryAgentStatsStore::new());

    let reservations = Arc::new(ReservationService::new(
        properties.clone(),
        payments.clone(),
        users.clone(),
        Arc::new(MockPaymentGateway::new()),
        config.clone(),
    ));

    let chats = ChatService::new(
        Arc::new(MemoryChatStore::new()),
        Arc::new(MemoryMessageStore::new()),
        Arc::new(MemoryRatingStore::new()),
        Arc::new(MemoryReportStore::new()),
        agent_stats.clone(),
        properties.clone(),
        users.clone(),
        reservations.clone(),
        Arc::new(MockTextGeneration::new()),
        config.clone(),
    );

    let sales = SaleService::new(
        Arc::new(MemorySaleStore::new()),
        commissions.clone(),
        properties.clone(),
        interests.clone(),
        users.clone(),
        config,
    );

    Marketplace {
        reservations,
        chats,
        sales,
        properties,
        users,
        interests,
        commissions,
        agent_stats,
    }
}

async fn seed_user(m: &Marketplace, role: Role) -> UserId {
    let user = User {
        id: UserId::new(),
        email: "participant@example.com".to_string(),
        display_name: "Participant".to_string(),
        role,
        created_at: Utc::now(),
    };
    m.users.create(&user).await.unwrap();
    user.id
}

async fn seed_property(
    m: &Marketplace,
    listed_by: UserId,
    agent_id: Option<UserId>,
    price: Money,
) -> PropertyId {
    let now = Utc::now();
    let property = Property {
        id: PropertyId::new(),
        title: "Terraced townhouse".to_string(),
        price,
        listed_by,
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
    m.properties.create(&property).await.unwrap();
    property.id
}

#[tokio::test]
async fn reservation_to_chat_to_rating_flow() {
    let m = marketplace();
    let admin = seed_user(&m, Role::Admin).await;
    let agent = seed_user(&m, Role::Agent).await;
    let buyer = seed_user(&m, Role::Buyer).await;
    let property = seed_property(&m, admin, Some(agent), Money::from_major(5_000_000)).await;
    let now = Utc::now();

    // Chat creation is gated until the fee settles.
    let err = m
        .chats
        .create_chat(buyer, property, ChatKind::Agent, now)
        .await
        .unwrap_err();
    assert!(matches!(err, MarketError::BadRequest { .. }));

    let reference = m
        .reservations
        .initialize_reservation_fee(buyer, property, now)
        .await
        .unwrap()
        .reference;
    let verified = m
        .reservations
        .verify_reservation_fee(&reference, now)
        .await
        .unwrap();
    assert_eq!(verified.property.current_reservation_by, Some(buyer));
    assert_eq!(verified.property.status, PropertyStatus::Pending);

    let chat = m
        .chats
        .create_chat(buyer, property, ChatKind::Agent, now)
        .await
        .unwrap();
    assert_eq!(chat.agent_id, Some(agent));
    assert_eq!(chat.agent_fee_amount, Money::from_major(350_000));

    m.chats
        .send_message(chat.id, buyer, "When can I view it?".to_string(), now)
        .await
        .unwrap();
    m.chats
        .send_message(
            chat.id,
            agent,
            "Tomorrow afternoon works.".to_string(),
            now + chrono::Duration::minutes(10),
        )
        .await
        .unwrap();

    let closed = m
        .chats
        .mark_payment_received(chat.id, admin, "transfer confirmed".to_string(), now)
        .await
        .unwrap();
    assert_eq!(closed.status, ChatStatus::PaymentReceived);

    let scores = RatingScores {
        communication: 5,
        knowledge: 5,
        professionalism: 5,
        responsiveness: 5,
        helpfulness: 5,
        overall: 5,
    };
    m.chats
        .rate_agent(chat.id, buyer, scores, Some(Money::from_major(100)), now)
        .await
        .unwrap();

    let stats = m.agent_stats.get(agent).await.unwrap().unwrap();
    assert_eq!(stats.completed_chats, 1);
    assert_eq!(stats.total_earnings, Money::from_major(350_000));
    assert_eq!(stats.responsive_first_replies, 1);
    assert_eq!(stats.ratings_received, 1);
    assert_eq!(stats.tips_received, Money::from_major(100));

    // PaymentReceived still counts as the live chat for the pairing, so a
    // second chat is rejected.
    let err = m
        .chats
        .create_chat(buyer, property, ChatKind::Agent, now)
        .await
        .unwrap_err();
    assert!(matches!(err, MarketError::BadRequest { .. }));
}

#[tokio::test]
async fn sale_and_finance_review_flow() {
    let m = marketplace();
    let admin = seed_user(&m, Role::Admin).await;
    let finance = seed_user(&m, Role::Finance).await;
    let buyer = seed_user(&m, Role::Buyer).await;
    let rival = seed_user(&m, Role::Buyer).await;
    let property = seed_property(&m, admin, None, Money::from_major(500_000)).await;
    let now = Utc::now();

    m.interests.upsert_active(buyer, property, now).await.unwrap();
    m.interests.upsert_active(rival, property, now).await.unwrap();

    let sale = m
        .sales
        .mark_as_sold(
            admin,
            MarkSoldRequest {
                property_id: property,
                buyer_id: buyer,
                amount: Money::from_major(500_000),
                payment_proof_url: None,
            },
            now,
        )
        .await
        .unwrap();

    // Off-market immediately, interests flipped.
    assert_eq!(
        m.properties.get(property).await.unwrap().status,
        PropertyStatus::Sold
    );
    let interests = m.interests.list_for_property(property).await.unwrap();
    assert!(interests
        .iter()
        .any(|i| i.user_id == buyer && i.status == InterestStatus::Purchased));
    assert!(interests
        .iter()
        .any(|i| i.user_id == rival && i.status == InterestStatus::Expired));

    let reviewed = m
        .sales
        .review_sale(finance, sale.id, ReviewDecision::Confirm, now)
        .await
        .unwrap();
    assert!(reviewed.company_account_paid);

    let commissions = m.commissions.list_for_sale(sale.id).await.unwrap();
    assert_eq!(commissions.len(), 1);
    assert_eq!(commissions[0].amount, Money::from_major(25_000));

    // One-shot review.
    let err = m
        .sales
        .review_sale(finance, sale.id, ReviewDecision::Reject, now)
        .await
        .unwrap_err();
    assert!(matches!(err, MarketError::Forbidden { .. }));
}

#[tokio::test]
async fn cancelled_reservation_reopens_the_property() {
    let m = marketplace();
    let admin = seed_user(&m, Role::Admin).await;
    let first = seed_user(&m, Role::Buyer).await;
    let second = seed_user(&m, Role::Buyer).await;
    let property = seed_property(&m, admin, None, Money::from_major(1_000_000)).await;
    let now = Utc::now();

    let reference = m
        .reservations
        .initialize_reservation_fee(first, property, now)
        .await
        .unwrap()
        .reference;
    m.reservations
        .verify_reservation_fee(&reference, now)
        .await
        .unwrap();

    m.reservations
        .cancel_reservation(first, property, Some("found another place"), now)
        .await
        .unwrap();

    // The next payer can claim immediately.
    let reference = m
        .reservations
        .initialize_reservation_fee(second, property, now + chrono::Duration::milliseconds(1))
        .await
        .unwrap()
        .reference;
    let verified = m
        .reservations
        .verify_reservation_fee(&reference, now)
        .await
        .unwrap();
    assert_eq!(verified.property.current_reservation_by, Some(second));
}
