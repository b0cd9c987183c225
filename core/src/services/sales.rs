//! Sale and finance pipeline.
//!
//! Two-phase approval for manual bank-transfer sales: an admin asserts the
//! sale, then a finance reviewer confirms or rejects it exactly once.
//! Marking sold takes the property off-market immediately, before finance
//! confirms — an intentional ordering that favors inventory correctness
//! over finance certainty.

use crate::config::{BankDetails, MarketplaceConfig};
use crate::error::{MarketError, Result};
use crate::stores::{
    CommissionRepository, InterestRepository, PropertyRepository, SaleRepository, UserRepository,
};
use crate::types::{
    Commission, CommissionId, CommissionStatus, FinanceStatus, InterestStatus, Money, PropertyId,
    PropertyStatus, Sale, SaleId, SaleStatus, UserId,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Request to assert a sale.
#[derive(Clone, Debug, PartialEq)]
pub struct MarkSoldRequest {
    /// Property sold
    pub property_id: PropertyId,
    /// Buying user
    pub buyer_id: UserId,
    /// Agreed sale amount
    pub amount: Money,
    /// Link to the uploaded payment proof, if any
    pub payment_proof_url: Option<String>,
}

/// Finance reviewer's verdict on an asserted sale.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReviewDecision {
    /// The company account received the funds
    Confirm,
    /// The asserted payment could not be verified
    Reject,
}

/// The sale/finance pipeline service.
pub struct SaleService {
    sales: Arc<dyn SaleRepository>,
    commissions: Arc<dyn CommissionRepository>,
    properties: Arc<dyn PropertyRepository>,
    interests: Arc<dyn InterestRepository>,
    users: Arc<dyn UserRepository>,
    config: MarketplaceConfig,
}

impl SaleService {
    /// Create the service over its repositories.
    #[must_use]
    pub fn new(
        sales: Arc<dyn SaleRepository>,
        commissions: Arc<dyn CommissionRepository>,
        properties: Arc<dyn PropertyRepository>,
        interests: Arc<dyn InterestRepository>,
        users: Arc<dyn UserRepository>,
        config: MarketplaceConfig,
    ) -> Self {
        Self {
            sales,
            commissions,
            properties,
            interests,
            users,
            config,
        }
    }

    /// Company bank details for manual-transfer payment instructions.
    ///
    /// # Errors
    ///
    /// Returns `Unconfigured` when the deployment has not set them.
    pub fn payment_instructions(&self) -> Result<&BankDetails> {
        self.config
            .company_bank_details
            .as_ref()
            .ok_or(MarketError::Unconfigured {
                what: "company bank details",
            })
    }

    /// Assert that a property sold to a buyer via out-of-band payment.
    ///
    /// Admin-only; the admin must have listed the property or hold an
    /// elevated role. Creates the sale awaiting finance review, takes the
    /// property off-market immediately, marks the buyer's interest
    /// `Purchased`, and expires every other active interest.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown property, admin, or buyer,
    /// `Forbidden` when the actor may not assert sales for this property,
    /// and `Conflict` when the property has already been sold.
    pub async fn mark_as_sold(
        &self,
        admin_id: UserId,
        request: MarkSoldRequest,
        now: DateTime<Utc>,
    ) -> Result<Sale> {
        let admin = self.users.get(admin_id).await?;
        let property = self.properties.get(request.property_id).await?;

        let owns_listing = property.listed_by == admin_id;
        if !admin.role.is_admin() || (!owns_listing && !admin.role.is_elevated()) {
            return Err(MarketError::forbidden(
                "only the listing admin may mark this property sold",
            ));
        }

        // One sale per property: a sold property cannot be sold again,
        // which keeps finance review and commissions single-fire per
        // property as well as per sale.
        if property.status == PropertyStatus::Sold {
            return Err(MarketError::conflict("property has already been sold"));
        }

        // Buyer must exist before any state is touched.
        self.users.get(request.buyer_id).await?;

        let sale = Sale {
            id: SaleId::new(),
            property_id: request.property_id,
            buyer_id: request.buyer_id,
            seller_id: property.listed_by,
            amount: request.amount,
            status: SaleStatus::PaymentSubmitted,
            finance_status: FinanceStatus::Pending,
            company_account_paid: false,
            payment_proof_url: request.payment_proof_url,
            reviewed_by: None,
            reviewed_at: None,
            created_at: now,
        };
        self.sales.create(&sale).await?;

        // Off-market before finance confirms.
        self.properties.mark_sold(request.property_id, now).await?;

        self.interests
            .set_status(
                request.buyer_id,
                request.property_id,
                InterestStatus::Purchased,
                now,
            )
            .await?;
        let expired = self
            .interests
            .expire_others(request.property_id, request.buyer_id, now)
            .await?;

        tracing::info!(
            sale_id = %sale.id,
            property_id = %request.property_id,
            buyer_id = %request.buyer_id,
            expired_interests = expired,
            "sale asserted, awaiting finance review"
        );
        Ok(sale)
    }

    /// Review an asserted sale: one-shot confirm or reject.
    ///
    /// Finance role only. Confirmation marks the company account paid and
    /// creates exactly one commission for the listing admin at the
    /// configured percentage of the sale amount. Rejection marks the sale
    /// disputed and creates nothing. A sale that has already been reviewed
    /// cannot be reviewed again, so commission creation stays single-fire.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown sale or reviewer, and `Forbidden`
    /// for a non-finance actor or an already-reviewed sale.
    pub async fn review_sale(
        &self,
        reviewer_id: UserId,
        sale_id: SaleId,
        decision: ReviewDecision,
        now: DateTime<Utc>,
    ) -> Result<Sale> {
        let reviewer = self.users.get(reviewer_id).await?;
        if !reviewer.role.can_review_sales() {
            return Err(MarketError::forbidden(
                "only a finance reviewer may review sales",
            ));
        }

        let mut sale = self.sales.get(sale_id).await?;
        if sale.finance_status != FinanceStatus::Pending {
            return Err(MarketError::forbidden("sale has already been reviewed"));
        }

        sale.reviewed_by = Some(reviewer_id);
        sale.reviewed_at = Some(now);

        match decision {
            ReviewDecision::Confirm => {
                sale.status = SaleStatus::Confirmed;
                sale.finance_status = FinanceStatus::Confirmed;
                sale.company_account_paid = true;
                self.sales.update(&sale).await?;

                let commission = Commission {
                    id: CommissionId::new(),
                    sale_id,
                    admin_id: sale.seller_id,
                    amount: sale.amount.percent(self.config.commission_percentage),
                    status: CommissionStatus::Pending,
                    created_at: now,
                };
                self.commissions.create(&commission).await?;

                tracing::info!(
                    sale_id = %sale_id,
                    commission_id = %commission.id,
                    amount = commission.amount.minor(),
                    "sale confirmed, commission created"
                );
            }
            ReviewDecision::Reject => {
                sale.status = SaleStatus::Disputed;
                sale.finance_status = FinanceStatus::Rejected;
                self.sales.update(&sale).await?;

                tracing::warn!(sale_id = %sale_id, "sale rejected by finance review");
            }
        }

        Ok(sale)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::stores::memory::{
        MemoryCommissionStore, MemoryInterestStore, MemoryPropertyStore, MemorySaleStore,
        MemoryUserStore,
    };
    use crate::types::{FeeStatus, Property, PropertyStatus, Role, User};

    struct Fixture {
        service: SaleService,
        properties: Arc<MemoryPropertyStore>,
        interests: Arc<MemoryInterestStore>,
        commissions: Arc<MemoryCommissionStore>,
        users: Arc<MemoryUserStore>,
    }

    fn fixture() -> Fixture {
        let properties = Arc::new(MemoryPropertyStore::new());
        let interests = Arc::new(MemoryInterestStore::new());
        let commissions = Arc::new(MemoryCommissionStore::new());
        let users = Arc::new(MemoryUserStore::new());

        let service = SaleService::new(
            Arc::new(MemorySaleStore::new()),
            commissions.clone(),
            properties.clone(),
            interests.clone(),
            users.clone(),
            MarketplaceConfig::new(),
        );

        Fixture {
            service,
            properties,
            interests,
            commissions,
            users,
        }
    }

    async fn seed_user(f: &Fixture, role: Role) -> UserId {
        let user = User {
            id: UserId::new(),
            email: "someone@example.com".to_string(),
            display_name: "Someone".to_string(),
            role,
            created_at: Utc::now(),
        };
        f.users.create(&user).await.unwrap();
        user.id
    }

    async fn seed_property(f: &Fixture, listed_by: UserId) -> PropertyId {
        let now = Utc::now();
        let property = Property {
            id: PropertyId::new(),
            title: "Corner shop".to_string(),
            price: Money::from_major(500_000),
            listed_by,
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
        f.properties.create(&property).await.unwrap();
        property.id
    }

    #[tokio::test]
    async fn test_mark_sold_pipeline() {
        let f = fixture();
        let admin = seed_user(&f, Role::Admin).await;
        let buyer = seed_user(&f, Role::Buyer).await;
        let rival = seed_user(&f, Role::Buyer).await;
        let property = seed_property(&f, admin).await;
        let now = Utc::now();

        f.interests.upsert_active(buyer, property, now).await.unwrap();
        f.interests.upsert_active(rival, property, now).await.unwrap();

        let sale = f
            .service
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

        assert_eq!(sale.status, SaleStatus::PaymentSubmitted);
        assert_eq!(sale.finance_status, FinanceStatus::Pending);
        assert_eq!(sale.seller_id, admin);

        // Off-market before finance review.
        let updated = f.properties.get(property).await.unwrap();
        assert_eq!(updated.status, PropertyStatus::Sold);

        let interests = f.interests.list_for_property(property).await.unwrap();
        let buyer_interest = interests.iter().find(|i| i.user_id == buyer).unwrap();
        let rival_interest = interests.iter().find(|i| i.user_id == rival).unwrap();
        assert_eq!(buyer_interest.status, InterestStatus::Purchased);
        assert_eq!(rival_interest.status, InterestStatus::Expired);
    }

    #[tokio::test]
    async fn test_sold_property_cannot_be_sold_again() {
        let f = fixture();
        let admin = seed_user(&f, Role::Admin).await;
        let buyer = seed_user(&f, Role::Buyer).await;
        let second_buyer = seed_user(&f, Role::Buyer).await;
        let finance = seed_user(&f, Role::Finance).await;
        let property = seed_property(&f, admin).await;
        let now = Utc::now();

        let sale = f
            .service
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

        // A second assertion against the same property loses, even for a
        // different buyer.
        let err = f
            .service
            .mark_as_sold(
                admin,
                MarkSoldRequest {
                    property_id: property,
                    buyer_id: second_buyer,
                    amount: Money::from_major(480_000),
                    payment_proof_url: None,
                },
                now,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::Conflict { .. }));

        // Only the surviving sale can be confirmed, so exactly one
        // commission exists for the property.
        f.service
            .review_sale(finance, sale.id, ReviewDecision::Confirm, now)
            .await
            .unwrap();
        let commissions = f.commissions.list_for_sale(sale.id).await.unwrap();
        assert_eq!(commissions.len(), 1);
    }

    #[tokio::test]
    async fn test_non_owner_admin_cannot_mark_sold() {
        let f = fixture();
        let owner = seed_user(&f, Role::Admin).await;
        let agent = seed_user(&f, Role::Agent).await;
        let buyer = seed_user(&f, Role::Buyer).await;
        let property = seed_property(&f, owner).await;
        let now = Utc::now();

        let err = f
            .service
            .mark_as_sold(
                agent,
                MarkSoldRequest {
                    property_id: property,
                    buyer_id: buyer,
                    amount: Money::from_major(500_000),
                    payment_proof_url: None,
                },
                now,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::Forbidden { .. }));
    }

    #[tokio::test]
    async fn test_confirm_creates_one_commission() {
        let f = fixture();
        let admin = seed_user(&f, Role::Admin).await;
        let buyer = seed_user(&f, Role::Buyer).await;
        let finance = seed_user(&f, Role::Finance).await;
        let property = seed_property(&f, admin).await;
        let now = Utc::now();

        let sale = f
            .service
            .mark_as_sold(
                admin,
                MarkSoldRequest {
                    property_id: property,
                    buyer_id: buyer,
                    amount: Money::from_major(500_000),
                    payment_proof_url: Some("https://proofs.example/1.pdf".to_string()),
                },
                now,
            )
            .await
            .unwrap();

        let reviewed = f
            .service
            .review_sale(finance, sale.id, ReviewDecision::Confirm, now)
            .await
            .unwrap();
        assert_eq!(reviewed.status, SaleStatus::Confirmed);
        assert_eq!(reviewed.finance_status, FinanceStatus::Confirmed);
        assert!(reviewed.company_account_paid);
        assert_eq!(reviewed.reviewed_by, Some(finance));

        let commissions = f.commissions.list_for_sale(sale.id).await.unwrap();
        assert_eq!(commissions.len(), 1);
        // 5% of 500,000.
        assert_eq!(commissions[0].amount, Money::from_major(25_000));
        assert_eq!(commissions[0].admin_id, admin);
        assert_eq!(commissions[0].status, CommissionStatus::Pending);
    }

    #[tokio::test]
    async fn test_review_is_one_shot() {
        let f = fixture();
        let admin = seed_user(&f, Role::Admin).await;
        let buyer = seed_user(&f, Role::Buyer).await;
        let finance = seed_user(&f, Role::Finance).await;
        let property = seed_property(&f, admin).await;
        let now = Utc::now();

        let sale = f
            .service
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

        f.service
            .review_sale(finance, sale.id, ReviewDecision::Confirm, now)
            .await
            .unwrap();

        let err = f
            .service
            .review_sale(finance, sale.id, ReviewDecision::Confirm, now)
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::Forbidden { .. }));

        // Still exactly one commission.
        let commissions = f.commissions.list_for_sale(sale.id).await.unwrap();
        assert_eq!(commissions.len(), 1);
    }

    #[tokio::test]
    async fn test_reject_creates_no_commission() {
        let f = fixture();
        let admin = seed_user(&f, Role::Admin).await;
        let buyer = seed_user(&f, Role::Buyer).await;
        let finance = seed_user(&f, Role::Finance).await;
        let property = seed_property(&f, admin).await;
        let now = Utc::now();

        let sale = f
            .service
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

        let reviewed = f
            .service
            .review_sale(finance, sale.id, ReviewDecision::Reject, now)
            .await
            .unwrap();
        assert_eq!(reviewed.status, SaleStatus::Disputed);
        assert_eq!(reviewed.finance_status, FinanceStatus::Rejected);
        assert!(!reviewed.company_account_paid);

        let commissions = f.commissions.list_for_sale(sale.id).await.unwrap();
        assert!(commissions.is_empty());
    }

    #[tokio::test]
    async fn test_only_finance_may_review() {
        let f = fixture();
        let admin = seed_user(&f, Role::Admin).await;
        let buyer = seed_user(&f, Role::Buyer).await;
        let property = seed_property(&f, admin).await;
        let now = Utc::now();

        let sale = f
            .service
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

        let err = f
            .service
            .review_sale(admin, sale.id, ReviewDecision::Confirm, now)
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::Forbidden { .. }));
    }

    #[tokio::test]
    async fn test_payment_instructions_require_configuration() {
        let f = fixture();
        let err = f.service.payment_instructions().unwrap_err();
        assert!(matches!(err, MarketError::Unconfigured { .. }));
    }
}
