//! Concurrency tests for the reservation lock.
//!
//! Races two verified payments for the same property and asserts exactly
//! one wins the lock while the loser's payment is marked failed.

#![allow(clippy::unwrap_used, clippy::panic)]

use chrono::Utc;
use homestead_core::config::MarketplaceConfig;
use homestead_core::error::MarketError;
use homestead_core::gateway::MockPaymentGateway;
use homestead_core::services::ReservationService;
use homestead_core::stores::memory::{
    MemoryPaymentStore, MemoryPropertyStore, MemoryUserStore,
};
use homestead_core::stores::{PaymentRepository, PropertyRepository, UserRepository};
use homestead_core::types::{
    FeeStatus, Money, PaymentStatus, Property, PropertyId, PropertyStatus, Role, User, UserId,
};
use std::sync::Arc;

struct Harness {
    service: Arc<ReservationService>,
    properties: Arc<MemoryPropertyStore>,
    payments: Arc<MemoryPaymentStore>,
    users: Arc<MemoryUserStore>,
}

fn harness() -> Harness {
    let properties = Arc::new(MemoryPropertyStore::new());
    let payments = Arc::new(MemoryPaymentStore::new());
    let users = Arc::new(MemoryUserStore::new());
    let service = Arc::new(ReservationService::new(
        properties.clone(),
        payments.clone(),
        users.clone(),
        Arc::new(MockPaymentGateway::new()),
        MarketplaceConfig::new(),
    ));
    Harness {
        service,
        properties,
        payments,
        users,
    }
}

async fn seed_user(h: &Harness) -> UserId {
    let user = User {
        id: UserId::new(),
        email: "buyer@example.com".to_string(),
        display_name: "Buyer".to_string(),
        role: Role::Buyer,
        created_at: Utc::now(),
    };
    h.users.create(&user).await.unwrap();
    user.id
}

async fn seed_property(h: &Harness) -> PropertyId {
    let now = Utc::now();
    let property = Property {
        id: PropertyId::new(),
        title: "Disputed penthouse".to_string(),
        price: Money::from_major(3_000_000),
        listed_by: UserId::new(),
        agent_id: None,
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
    h.properties.create(&property).await.unwrap();
    property.id
}

#[tokio::test]
async fn concurrent_verifications_admit_at_most_one_holder() {
    let h = harness();
    let alice = seed_user(&h).await;
    let bob = seed_user(&h).await;
    let property = seed_property(&h).await;
    let now = Utc::now();

    let alice_ref = h
        .service
        .initialize_reservation_fee(alice, property, now)
        .await
        .unwrap()
        .reference;
    let bob_ref = h
        .service
        .initialize_reservation_fee(bob, property, now + chrono::Duration::milliseconds(1))
        .await
        .unwrap()
        .reference;

    let (alice_result, bob_result) = tokio::join!(
        h.service.verify_reservation_fee(&alice_ref, now),
        h.service.verify_reservation_fee(&bob_ref, now),
    );

    let winners = [alice_result.is_ok(), bob_result.is_ok()]
        .iter()
        .filter(|ok| **ok)
        .count();
    assert_eq!(winners, 1, "exactly one verification may commit the lock");

    let committed = h.properties.get(property).await.unwrap();
    assert!(committed.is_reserved);

    if let Ok(won) = &alice_result {
        assert_eq!(committed.current_reservation_by, Some(alice));
        assert_eq!(won.property.current_reservation_by, Some(alice));
        assert!(matches!(
            bob_result.unwrap_err(),
            MarketError::Conflict { .. }
        ));
        let losing = h.payments.get_by_reference(&bob_ref).await.unwrap();
        assert_eq!(losing.status, PaymentStatus::Failed);
    } else {
        assert_eq!(committed.current_reservation_by, Some(bob));
        assert!(matches!(
            alice_result.unwrap_err(),
            MarketError::Conflict { .. }
        ));
        let losing = h.payments.get_by_reference(&alice_ref).await.unwrap();
        assert_eq!(losing.status, PaymentStatus::Failed);
    }
}

#[tokio::test]
async fn many_racing_payers_leave_one_holder() {
    let h = harness();
    let property = seed_property(&h).await;
    let now = Utc::now();

    let mut references = Vec::new();
    for i in 0..8 {
        let user = seed_user(&h).await;
        let reference = h
            .service
            .initialize_reservation_fee(
                user,
                property,
                now + chrono::Duration::milliseconds(i),
            )
            .await
            .unwrap()
            .reference;
        references.push(reference);
    }

    let mut tasks = Vec::new();
    for reference in references.clone() {
        let service = h.service.clone();
        tasks.push(tokio::spawn(async move {
            service.verify_reservation_fee(&reference, now).await
        }));
    }

    let mut winners = 0;
    for task in tasks {
        if task.await.unwrap().is_ok() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);

    // Every losing reference ended Failed; none dangles as Pending.
    let mut failed = 0;
    for reference in &references {
        let payment = h.payments.get_by_reference(reference).await.unwrap();
        match payment.status {
            PaymentStatus::Failed => failed += 1,
            PaymentStatus::Success => {}
            PaymentStatus::Pending => panic!("reference left pending: {reference}"),
        }
    }
    assert_eq!(failed, references.len() - 1);
}

#[tokio::test]
async fn repeated_verification_of_winner_is_stable() {
    let h = harness();
    let user = seed_user(&h).await;
    let property = seed_property(&h).await;
    let now = Utc::now();

    let reference = h
        .service
        .initialize_reservation_fee(user, property, now)
        .await
        .unwrap()
        .reference;

    let first = h.service.verify_reservation_fee(&reference, now).await.unwrap();

    // Concurrent repeat verifications all observe the same committed state.
    let (a, b, c) = tokio::join!(
        h.service.verify_reservation_fee(&reference, now),
        h.service.verify_reservation_fee(&reference, now),
        h.service.verify_reservation_fee(&reference, now),
    );
    for repeat in [a.unwrap(), b.unwrap(), c.unwrap()] {
        assert_eq!(repeat.payment.id, first.payment.id);
        assert_eq!(repeat.property.current_reservation_by, Some(user));
    }
}
