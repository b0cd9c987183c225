//! Reservation ledger.
//!
//! Guarantees exclusive, time-bounded possession of a property by a single
//! paying user, plus the lighter-weight non-paid soft hold used while a user
//! is mid-chat. Mutual exclusion is delegated to the property repository's
//! compare-and-set operations; this service never does a blind overwrite of
//! the holder fields.

use crate::config::MarketplaceConfig;
use crate::error::{MarketError, Result};
use crate::gateway::{InitializedPayment, PaymentGateway};
use crate::stores::{PaymentRepository, PropertyRepository, UserRepository};
use crate::types::{
    PaymentId, PaymentStatus, Property, PropertyId, ReservationFeePayment, UserId,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Outcome of a successful reservation-fee verification.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct VerifiedReservation {
    /// The settled payment record
    pub payment: ReservationFeePayment,
    /// The property with the lock committed
    pub property: Property,
    /// When the reservation lapses
    pub expires_at: DateTime<Utc>,
}

/// The reservation-lock lifecycle service.
pub struct ReservationService {
    properties: Arc<dyn PropertyRepository>,
    payments: Arc<dyn PaymentRepository>,
    users: Arc<dyn UserRepository>,
    gateway: Arc<dyn PaymentGateway>,
    config: MarketplaceConfig,
}

impl ReservationService {
    /// Create the service over its repositories and collaborators.
    #[must_use]
    pub fn new(
        properties: Arc<dyn PropertyRepository>,
        payments: Arc<dyn PaymentRepository>,
        users: Arc<dyn UserRepository>,
        gateway: Arc<dyn PaymentGateway>,
        config: MarketplaceConfig,
    ) -> Self {
        Self {
            properties,
            payments,
            users,
            gateway,
            config,
        }
    }

    /// Initialize a reservation-fee payment with the gateway.
    ///
    /// Creates a `Pending` payment record under a fresh globally unique
    /// reference and returns the gateway's hosted checkout handle. Rejected
    /// while any live reservation exists on the property: a different
    /// holder blocks the caller outright, and the caller's own live
    /// reservation blocks re-payment.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown property or user, `BadRequest`
    /// when another user holds the reservation, `Conflict` when the caller
    /// already holds it, and `ExternalFailure` if the gateway call fails
    /// (the local record is marked `Failed` first, so the reference never
    /// dangles as `Pending`).
    pub async fn initialize_reservation_fee(
        &self,
        user_id: UserId,
        property_id: PropertyId,
        now: DateTime<Utc>,
    ) -> Result<InitializedPayment> {
        let property = self.properties.get(property_id).await?;
        let user = self.users.get(user_id).await?;

        if let Some(holder) = property.reservation_holder_at(now) {
            if holder != user_id {
                return Err(MarketError::bad_request(
                    "property is already reserved by another user",
                ));
            }
            return Err(MarketError::conflict(
                "you already hold an active reservation for this property",
            ));
        }

        let reference = payment_reference(user_id, now);
        let payment = ReservationFeePayment {
            id: PaymentId::new(),
            user_id,
            property_id,
            amount: self.config.reservation_fee,
            status: PaymentStatus::Pending,
            reference: reference.clone(),
            paid_at: None,
            failure_reason: None,
            metadata: serde_json::json!({
                "property_id": property_id.to_string(),
                "purpose": "reservation_fee",
            }),
            created_at: now,
        };
        self.payments.create(&payment).await?;

        let initialized = match self
            .gateway
            .initialize(
                &user.email,
                payment.amount,
                &reference,
                payment.metadata.clone(),
            )
            .await
        {
            Ok(initialized) => initialized,
            Err(e) => {
                self.payments
                    .mark_failed(&reference, "gateway initialization failed")
                    .await?;
                return Err(e);
            }
        };

        tracing::info!(
            user_id = %user_id,
            property_id = %property_id,
            reference = %reference,
            "reservation fee initialized"
        );
        Ok(initialized)
    }

    /// Verify a reservation-fee payment and commit the property lock.
    ///
    /// Idempotent for settled references: a record already `Success` is
    /// returned unchanged with no further property mutation. Otherwise the
    /// gateway is consulted; a non-success report marks the record `Failed`
    /// (terminal for this reference). On success the property lock is
    /// committed through the repository compare-and-set — if a different
    /// user won the race since initialization, this payment is marked
    /// `Failed` with a conflict annotation and the call fails, so a second
    /// settled charge can never overwrite an existing holder.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown reference, `BadRequest` for an
    /// already-failed reference, `Conflict` when the lock race is lost, and
    /// `ExternalFailure` when the gateway is unreachable or reports a
    /// non-success status.
    pub async fn verify_reservation_fee(
        &self,
        reference: &str,
        now: DateTime<Utc>,
    ) -> Result<VerifiedReservation> {
        let payment = self.payments.get_by_reference(reference).await?;

        match payment.status {
            PaymentStatus::Success => {
                // Already settled: return the committed state unchanged.
                let property = self.properties.get(payment.property_id).await?;
                let expires_at = property
                    .reservation_expires_at
                    .unwrap_or_else(|| now + self.config.reservation_ttl);
                return Ok(VerifiedReservation {
                    payment,
                    property,
                    expires_at,
                });
            }
            PaymentStatus::Failed => {
                return Err(MarketError::bad_request(
                    "payment already failed; initialize a new reservation fee",
                ));
            }
            PaymentStatus::Pending => {}
        }

        let verified = match self.gateway.verify(reference).await {
            Ok(verified) => verified,
            Err(e) => {
                // Never leave the record Pending after a failed verification
                // attempt; the user retries via a fresh initialize.
                self.payments
                    .mark_failed(reference, "gateway verification failed")
                    .await?;
                return Err(e);
            }
        };

        if !verified.status.is_success() {
            self.payments
                .mark_failed(reference, "gateway reported non-success status")
                .await?;
            return Err(MarketError::external(
                "payment was not successful; initialize a new reservation fee",
            ));
        }

        let expires_at = now + self.config.reservation_ttl;
        let committed = self
            .properties
            .try_reserve(payment.property_id, payment.user_id, now, expires_at)
            .await?;

        let Some(property) = committed else {
            // A racing payer locked the property first. This charge settled
            // at the gateway but must not displace the holder.
            self.payments
                .mark_failed(reference, "property was reserved by another user")
                .await?;
            tracing::warn!(
                reference = %reference,
                property_id = %payment.property_id,
                "reservation verification lost the lock race"
            );
            return Err(MarketError::conflict(
                "property was reserved by another user while the payment settled",
            ));
        };

        let paid_at = verified.paid_at.unwrap_or(now);
        let payment = self.payments.mark_success(reference, paid_at).await?;

        tracing::info!(
            reference = %reference,
            property_id = %payment.property_id,
            user_id = %payment.user_id,
            expires_at = %expires_at,
            "reservation lock committed"
        );

        Ok(VerifiedReservation {
            payment,
            property,
            expires_at,
        })
    }

    /// Does `user_id` hold a live, fee-backed reservation on the property?
    ///
    /// True iff a `Success` payment exists for the pair and the property's
    /// reservation window still covers `now`. This is the gate consulted
    /// before chat creation.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the property is absent.
    pub async fn has_user_active_reservation(
        &self,
        user_id: UserId,
        property_id: PropertyId,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let property = self.properties.get(property_id).await?;
        if property.reservation_holder_at(now) != Some(user_id) {
            return Ok(false);
        }
        let payment = self.payments.latest_success_for(user_id, property_id).await?;
        Ok(payment.is_some())
    }

    /// Cancel the caller's reservation and release the property.
    ///
    /// The fee is non-refundable: the settled payment record is left
    /// untouched.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown property and `Forbidden` when the
    /// caller is not the current holder.
    pub async fn cancel_reservation(
        &self,
        user_id: UserId,
        property_id: PropertyId,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Property> {
        let property = self.properties.get(property_id).await?;

        if property.reservation_holder_at(now) != Some(user_id) {
            return Err(MarketError::forbidden(
                "only the current reservation holder may cancel",
            ));
        }

        let released = self.properties.release_reservation(property_id, now).await?;

        tracing::info!(
            user_id = %user_id,
            property_id = %property_id,
            reason = reason.unwrap_or("none given"),
            "reservation cancelled; fee is non-refundable"
        );
        Ok(released)
    }

    /// Place or renew the short-lived soft hold for a user mid-chat.
    ///
    /// Best-effort UX lock, not authoritative: expiry alone reclaims it and
    /// no payment is involved. The client places and renews it around chat
    /// screen activity; no chat operation requires it.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown property and `Conflict` when
    /// another user holds a live soft hold.
    pub async fn soft_hold_for_chat(
        &self,
        user_id: UserId,
        property_id: PropertyId,
        now: DateTime<Utc>,
    ) -> Result<Property> {
        let expires_at = now + self.config.soft_hold_ttl;
        let held = self
            .properties
            .try_soft_hold(property_id, user_id, now, expires_at)
            .await?;

        held.ok_or_else(|| {
            MarketError::conflict("property is currently held by another user")
        })
    }

    /// Extend the caller's soft hold on chat activity.
    ///
    /// Same commit rule as [`Self::soft_hold_for_chat`]: the holder (or
    /// anyone, once the hold has lapsed) gets a fresh window from `now`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown property and `Conflict` when
    /// another user holds a live soft hold.
    pub async fn renew_soft_hold_for_chat(
        &self,
        user_id: UserId,
        property_id: PropertyId,
        now: DateTime<Utc>,
    ) -> Result<Property> {
        self.soft_hold_for_chat(user_id, property_id, now).await
    }

    /// Release the caller's soft hold; a no-op if the caller does not hold
    /// one.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the property is absent.
    pub async fn release_soft_hold_for_chat(
        &self,
        user_id: UserId,
        property_id: PropertyId,
        now: DateTime<Utc>,
    ) -> Result<Property> {
        self.properties
            .release_soft_hold(property_id, user_id, now)
            .await
    }
}

/// Globally unique payment reference: a monotonic clock value plus a
/// truncated user identifier. Collision probability is treated as
/// negligible at this traffic level.
fn payment_reference(user_id: UserId, now: DateTime<Utc>) -> String {
    let user = user_id.to_string();
    let prefix = user.get(..8).unwrap_or(&user);
    format!("RSV-{}-{}", now.timestamp_millis(), prefix)
}
